//! Splits one shader asset into its vertex and fragment stage sources.
//!
//! An asset holds two sections, each introduced by a marker line:
//!
//! ```text
//! #type vertex
//! ...vertex stage...
//! #type fragment
//! ...fragment stage...
//! ```
//!
//! Sections are classified by tag, not by position. A section's body is the
//! text after its marker line up to the next marker line (or end of file).
//! Anything before the first marker is ignored, as is a leading byte-order
//! mark. Marker lines may end in `\n` or `\r\n`; bodies are kept byte-for-byte.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::shader::ShaderError;

const MARKER: &str = "#type";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub fn tag(self) -> &'static str {
        match self {
            Self::Vertex => "vertex",
            Self::Fragment => "fragment",
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for ShaderStage {
    type Err = ShaderError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag {
            "vertex" => Ok(Self::Vertex),
            "fragment" => Ok(Self::Fragment),
            other => Err(ShaderError::UnknownTag(other.to_string())),
        }
    }
}

/// Stage sources of a not-yet-linked shader program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSources {
    /// Where the sources came from; used in diagnostics.
    pub label: String,
    pub vertex: String,
    pub fragment: String,
}

impl ShaderSources {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ShaderError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ShaderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path.display().to_string(), &text)
    }

    pub fn parse(label: impl Into<String>, text: &str) -> Result<Self, ShaderError> {
        let label = label.into();
        let text = text.strip_prefix('\u{FEFF}').unwrap_or(text);
        let mut vertex: Option<String> = None;
        let mut fragment: Option<String> = None;
        let mut current: Option<(ShaderStage, String)> = None;

        for (index, line) in text.split_inclusive('\n').enumerate() {
            let Some(tag) = marker_tag(line) else {
                if let Some((_, body)) = current.as_mut() {
                    body.push_str(line);
                }
                continue;
            };
            if tag.is_empty() {
                return Err(ShaderError::MissingTag { line: index + 1 });
            }
            let stage: ShaderStage = tag.parse()?;
            if let Some((finished, body)) = current.replace((stage, String::new())) {
                store_section(&mut vertex, &mut fragment, finished, body)?;
            }
        }
        if let Some((finished, body)) = current {
            store_section(&mut vertex, &mut fragment, finished, body)?;
        }

        let sources = Self {
            vertex: vertex.ok_or(ShaderError::MissingSection(ShaderStage::Vertex))?,
            fragment: fragment.ok_or(ShaderError::MissingSection(ShaderStage::Fragment))?,
            label,
        };
        log::debug!("vertex shader ({}):\n{}", sources.label, sources.vertex);
        log::debug!("fragment shader ({}):\n{}", sources.label, sources.fragment);
        Ok(sources)
    }

    pub fn stage(&self, stage: ShaderStage) -> &str {
        match stage {
            ShaderStage::Vertex => &self.vertex,
            ShaderStage::Fragment => &self.fragment,
        }
    }
}

/// Returns the trimmed remainder of a marker line, or `None` for other lines.
fn marker_tag(line: &str) -> Option<&str> {
    let rest = line.trim_start().strip_prefix(MARKER)?;
    if rest.starts_with(|c: char| !c.is_whitespace()) {
        // e.g. "#typedef", not a marker
        return None;
    }
    Some(rest.trim())
}

fn store_section(
    vertex: &mut Option<String>,
    fragment: &mut Option<String>,
    stage: ShaderStage,
    body: String,
) -> Result<(), ShaderError> {
    let slot = match stage {
        ShaderStage::Vertex => vertex,
        ShaderStage::Fragment => fragment,
    };
    if slot.is_some() {
        return Err(ShaderError::DuplicateSection(stage));
    }
    *slot = Some(body);
    Ok(())
}
