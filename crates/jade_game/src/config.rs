use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use jade_platform::PlatformConfig;
use jade_render::ClearColor;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read engine config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse engine config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub window: PlatformConfig,
    /// Initial framebuffer clear color, RGBA.
    pub clear_color: [f32; 4],
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window: PlatformConfig::default(),
            clear_color: [1.0, 1.0, 1.0, 1.0],
        }
    }
}

impl EngineConfig {
    pub fn clear_color(&self) -> ClearColor {
        ClearColor::from(self.clear_color)
    }
}

/// Loads the engine config. A missing file is not an error; the defaults apply.
pub fn load_config_from_path(path: &Path) -> Result<EngineConfig, ConfigError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            log::info!("No engine config at '{}', using defaults", path.display());
            return Ok(EngineConfig::default());
        }
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    let config = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    log::info!("Engine config loaded from '{}'", path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_file_path(name_hint: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before unix epoch")
            .as_nanos();
        std::env::temp_dir().join(format!(
            "jade_config_test_{}_{}_{}.json",
            name_hint,
            std::process::id(),
            nanos
        ))
    }

    #[test]
    fn missing_file_yields_defaults() {
        let path = temp_file_path("missing");
        let config = load_config_from_path(&path).expect("missing config is fine");
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.clear_color(), ClearColor::WHITE);
    }

    #[test]
    fn partial_file_overrides_only_given_fields() {
        let path = temp_file_path("partial");
        fs::write(
            &path,
            r#"{ "window": { "width": 800, "height": 600 }, "clear_color": [0.0, 0.0, 0.0, 1.0] }"#,
        )
        .expect("failed to write temp config");

        let config = load_config_from_path(&path).expect("config should parse");
        assert_eq!((config.window.width, config.window.height), (800, 600));
        assert_eq!(config.window.title, "Mario");
        assert_eq!(config.clear_color(), ClearColor::BLACK);

        let _ = fs::remove_file(path);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let path = temp_file_path("malformed");
        fs::write(&path, "{ \"window\": ").expect("failed to write temp config");

        let err = load_config_from_path(&path).expect_err("truncated JSON");
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("failed to parse engine config"));

        let _ = fs::remove_file(path);
    }

    #[test]
    fn shipped_config_parses() {
        let raw = include_str!("../../../assets/config/engine.json");
        let config: EngineConfig = serde_json::from_str(raw).expect("shipped config parses");
        assert_eq!(config, EngineConfig::default());
    }
}
