use std::sync::Arc;

use serde::Deserialize;
use winit::error::OsError;
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window, WindowAttributes};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub maximized: bool,
    pub resizable: bool,
    pub vsync: bool,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            title: "Mario".to_string(),
            width: 1920,
            height: 1080,
            maximized: true,
            resizable: true,
            vsync: true,
        }
    }
}

/// Creates the native window hidden; the caller shows it once the GPU
/// surface is ready so the first visible frame is not garbage.
pub fn create_window(
    event_loop: &ActiveEventLoop,
    config: &PlatformConfig,
) -> Result<Arc<Window>, OsError> {
    let attrs = WindowAttributes::default()
        .with_title(&config.title)
        .with_inner_size(winit::dpi::LogicalSize::new(config.width, config.height))
        .with_resizable(config.resizable)
        .with_maximized(config.maximized)
        .with_visible(false);

    let window = event_loop.create_window(attrs)?;
    log::info!(
        "Window created: '{}' {}x{}",
        config.title,
        config.width,
        config.height
    );
    Ok(Arc::new(window))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_engine_defaults() {
        let config = PlatformConfig::default();
        assert_eq!(config.title, "Mario");
        assert_eq!((config.width, config.height), (1920, 1080));
        assert!(config.maximized);
        assert!(config.vsync);
    }

    #[test]
    fn partial_json_keeps_defaults_for_missing_fields() {
        let config: PlatformConfig =
            serde_json::from_str(r#"{ "title": "Editor", "vsync": false }"#)
                .expect("partial config should parse");
        assert_eq!(config.title, "Editor");
        assert!(!config.vsync);
        assert_eq!(config.width, 1920);
        assert!(config.resizable);
    }
}
