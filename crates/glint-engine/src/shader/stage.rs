use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use super::ShaderError;

/// Pipeline stage a source text is compiled for.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub(crate) fn to_naga(self) -> naga::ShaderStage {
        match self {
            ShaderStage::Vertex => naga::ShaderStage::Vertex,
            ShaderStage::Fragment => naga::ShaderStage::Fragment,
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Source language of one stage.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ShaderLanguage {
    Wgsl,
    /// GLSL 440+ with explicit `layout(location = N)` qualifiers.
    Glsl,
}

impl ShaderLanguage {
    /// GLSL when the first non-blank line is a `#version` directive, WGSL otherwise.
    pub fn detect(source: &str) -> Self {
        let first = source.lines().map(str::trim).find(|l| !l.is_empty());
        match first {
            Some(line) if line.starts_with("#version") => ShaderLanguage::Glsl,
            _ => ShaderLanguage::Wgsl,
        }
    }
}

impl fmt::Display for ShaderLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderLanguage::Wgsl => f.write_str("WGSL"),
            ShaderLanguage::Glsl => f.write_str("GLSL"),
        }
    }
}

/// Vertex + fragment source texts for one program.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ShaderSources {
    pub vertex: String,
    pub fragment: String,
}

impl ShaderSources {
    pub fn new(vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            vertex: vertex.into(),
            fragment: fragment.into(),
        }
    }

    /// Same text for both stages (a WGSL file with both entry points).
    pub fn shared(source: impl Into<String>) -> Self {
        let source = source.into();
        Self {
            vertex: source.clone(),
            fragment: source,
        }
    }

    /// Reads both stages from files below `dir`.
    pub fn load(
        dir: impl AsRef<Path>,
        vertex_file: impl AsRef<Path>,
        fragment_file: impl AsRef<Path>,
    ) -> Result<Self, ShaderError> {
        let dir = dir.as_ref();
        let vertex = read_source(dir.join(vertex_file))?;
        let fragment = read_source(dir.join(fragment_file))?;
        Ok(Self { vertex, fragment })
    }
}

fn read_source(path: PathBuf) -> Result<String, ShaderError> {
    log::debug!("loading shader source {}", path.display());
    fs::read_to_string(&path).map_err(|e| ShaderError::Io {
        path,
        message: e.to_string(),
    })
}
