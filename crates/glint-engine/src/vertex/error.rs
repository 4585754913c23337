use std::fmt;

use super::VertexFormat;
use crate::device::DeviceError;
use crate::shader::IoType;

/// Violations of the vertex layout invariants.
#[derive(Debug, Clone, PartialEq)]
pub enum VertexError {
    ZeroStride,
    /// Stride is not a multiple of 4 bytes.
    MisalignedStride(u32),
    /// Attribute offset is not a multiple of 4 bytes.
    Misaligned { location: u32, offset: u32 },
    /// `offset + size` exceeds the stride.
    AttributeOutOfBounds {
        location: u32,
        offset: u32,
        size: u32,
        stride: u32,
    },
    /// Two attributes share bytes.
    Overlap { first: u32, second: u32 },
    DuplicateLocation(u32),
    /// Buffer length is not a multiple of the stride.
    BufferLength { len: usize, stride: u32 },
    NoVertices,
    IndexOutOfRange { index: u32, vertex_count: u32 },
    /// The program reads a location the layout does not provide.
    MissingInput { location: u32 },
    /// The attribute format cannot feed the declared input type.
    InputType {
        location: u32,
        format: VertexFormat,
        input: IoType,
    },
    Device(DeviceError),
}

impl fmt::Display for VertexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VertexError::ZeroStride => f.write_str("vertex stride must be greater than zero"),
            VertexError::MisalignedStride(stride) => {
                write!(f, "vertex stride {stride} is not a multiple of 4 bytes")
            }
            VertexError::Misaligned { location, offset } => write!(
                f,
                "attribute at location {location} starts at offset {offset}, which is not a multiple of 4 bytes"
            ),
            VertexError::AttributeOutOfBounds {
                location,
                offset,
                size,
                stride,
            } => write!(
                f,
                "attribute at location {location} (offset {offset}, size {size}) does not fit in stride {stride}"
            ),
            VertexError::Overlap { first, second } => {
                write!(f, "attributes at locations {first} and {second} overlap")
            }
            VertexError::DuplicateLocation(l) => write!(f, "location {l} is declared twice"),
            VertexError::BufferLength { len, stride } => write!(
                f,
                "vertex buffer length {len} is not a multiple of the stride {stride}"
            ),
            VertexError::NoVertices => f.write_str("vertex buffer is empty"),
            VertexError::IndexOutOfRange {
                index,
                vertex_count,
            } => write!(f, "index {index} is out of range for {vertex_count} vertices"),
            VertexError::MissingInput { location } => write!(
                f,
                "program reads vertex input location {location} but the layout has no such attribute"
            ),
            VertexError::InputType {
                location,
                format,
                input,
            } => write!(
                f,
                "attribute at location {location} is {format:?} but the program expects {input}"
            ),
            VertexError::Device(e) => write!(f, "device error: {e}"),
        }
    }
}

impl std::error::Error for VertexError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            VertexError::Device(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DeviceError> for VertexError {
    fn from(e: DeviceError) -> Self {
        VertexError::Device(e)
    }
}
