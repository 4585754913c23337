use std::fmt;

use crate::shader::UniformWriteError;

/// Errors reported by a `GraphicsDevice`.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceError {
    /// Handle does not name a live object of the expected kind.
    InvalidHandle { kind: &'static str, id: u32 },
    /// The operation is not valid for the object's current state.
    InvalidOperation(String),
    /// A uniform write was rejected.
    Uniform(UniformWriteError),
    /// Buffer creation or binding failed.
    Buffer(String),
    /// Feature not implemented by this backend.
    Unsupported(String),
    /// The presentation surface is gone; rendering cannot continue.
    SurfaceLost(String),
    /// Any other backend failure.
    Backend(String),
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::InvalidHandle { kind, id } => write!(f, "invalid {kind} handle {id}"),
            DeviceError::InvalidOperation(msg) => write!(f, "invalid operation: {msg}"),
            DeviceError::Uniform(e) => write!(f, "{e}"),
            DeviceError::Buffer(msg) => write!(f, "buffer error: {msg}"),
            DeviceError::Unsupported(msg) => write!(f, "unsupported: {msg}"),
            DeviceError::SurfaceLost(msg) => write!(f, "surface lost: {msg}"),
            DeviceError::Backend(msg) => write!(f, "backend error: {msg}"),
        }
    }
}

impl std::error::Error for DeviceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DeviceError::Uniform(e) => Some(e),
            _ => None,
        }
    }
}

impl From<UniformWriteError> for DeviceError {
    fn from(e: UniformWriteError) -> Self {
        DeviceError::Uniform(e)
    }
}

pub type DeviceResult<T> = Result<T, DeviceError>;
