use std::fmt;

use crate::device::DeviceError;
use crate::shader::ShaderError;
use crate::vertex::VertexError;

/// Errors that prevent the loop from starting or a frame from drawing.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderError {
    /// The vertex binding does not satisfy the program's vertex inputs.
    Layout(VertexError),
    Shader(ShaderError),
    Device(DeviceError),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Layout(e) => write!(f, "vertex layout does not match program: {e}"),
            RenderError::Shader(e) => write!(f, "{e}"),
            RenderError::Device(e) => write!(f, "device error: {e}"),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Layout(e) => Some(e),
            RenderError::Shader(e) => Some(e),
            RenderError::Device(e) => Some(e),
        }
    }
}

impl From<VertexError> for RenderError {
    fn from(e: VertexError) -> Self {
        RenderError::Layout(e)
    }
}

impl From<ShaderError> for RenderError {
    fn from(e: ShaderError) -> Self {
        RenderError::Shader(e)
    }
}

impl From<DeviceError> for RenderError {
    fn from(e: DeviceError) -> Self {
        RenderError::Device(e)
    }
}
