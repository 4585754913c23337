use std::fmt;
use std::path::PathBuf;

use super::{ShaderStage, UniformKind};
use crate::device::DeviceError;

/// Errors reported by shader program construction and use.
#[derive(Debug, Clone, PartialEq)]
pub enum ShaderError {
    /// A stage failed to compile; `log` holds the compiler diagnostic.
    Compile { stage: ShaderStage, log: String },
    /// Both stages compiled but the program failed to link.
    Link { log: String },
    /// The program failed to build and cannot be used.
    NotLinked,
    /// The program was released.
    Released,
    /// No active uniform with this name (strict policy only).
    UnknownUniform { name: String },
    /// Value type does not match the declared uniform type (strict policy only).
    UniformType {
        name: String,
        expected: UniformKind,
        found: &'static str,
    },
    /// A source file could not be read.
    Io { path: PathBuf, message: String },
    /// The device rejected an operation on a valid program.
    Device(DeviceError),
}

impl fmt::Display for ShaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderError::Compile { stage, log } => {
                write!(f, "{stage} shader failed to compile:\n{log}")
            }
            ShaderError::Link { log } => write!(f, "shader program failed to link:\n{log}"),
            ShaderError::NotLinked => f.write_str("shader program is not linked"),
            ShaderError::Released => f.write_str("shader program was released"),
            ShaderError::UnknownUniform { name } => write!(f, "unknown uniform '{name}'"),
            ShaderError::UniformType { name, expected, found } => write!(
                f,
                "uniform '{name}' expects {expected}, got {found}"
            ),
            ShaderError::Io { path, message } => {
                write!(f, "failed to read shader {}: {message}", path.display())
            }
            ShaderError::Device(e) => write!(f, "device error: {e}"),
        }
    }
}

impl std::error::Error for ShaderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ShaderError::Device(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DeviceError> for ShaderError {
    fn from(e: DeviceError) -> Self {
        ShaderError::Device(e)
    }
}
