use bytemuck::Pod;

use crate::device::{BufferHandle, BufferUsage, GraphicsDevice};
use crate::shader::VertexInput;

use super::{PrimitiveTopology, VertexError, VertexLayout};

/// Uploaded vertex (and optional index) data with its layout and topology.
///
/// Immutable once created. Buffers are freed by `release`; dropping the value
/// without releasing leaves them to the device.
#[derive(Debug)]
pub struct VertexLayoutBinding {
    layout: VertexLayout,
    topology: PrimitiveTopology,
    vertex_buffer: BufferHandle,
    index_buffer: Option<BufferHandle>,
    vertex_count: u32,
    index_count: u32,
}

impl VertexLayoutBinding {
    /// Validates `bytes` / `indices` against `layout` and uploads them.
    pub fn upload(
        device: &mut dyn GraphicsDevice,
        layout: VertexLayout,
        bytes: &[u8],
        indices: Option<&[u32]>,
        topology: PrimitiveTopology,
    ) -> Result<Self, VertexError> {
        let stride = layout.stride();
        if bytes.is_empty() {
            return Err(VertexError::NoVertices);
        }
        if bytes.len() % stride as usize != 0 {
            return Err(VertexError::BufferLength {
                len: bytes.len(),
                stride,
            });
        }
        let vertex_count = (bytes.len() / stride as usize) as u32;

        if let Some(indices) = indices {
            if let Some(&index) = indices.iter().find(|&&i| i >= vertex_count) {
                return Err(VertexError::IndexOutOfRange {
                    index,
                    vertex_count,
                });
            }
        }

        let vertex_buffer = device.create_buffer(BufferUsage::Vertex, bytes)?;
        let index_buffer = match indices {
            Some(indices) => {
                match device.create_buffer(BufferUsage::Index, bytemuck::cast_slice(indices)) {
                    Ok(h) => Some(h),
                    Err(e) => {
                        device.delete_buffer(vertex_buffer);
                        return Err(e.into());
                    }
                }
            }
            None => None,
        };

        log::debug!(
            "uploaded {vertex_count} vertices (stride {stride}, {} indices, {:?})",
            indices.map_or(0, <[u32]>::len),
            topology
        );

        Ok(Self {
            layout,
            topology,
            vertex_buffer,
            index_buffer,
            vertex_count,
            index_count: indices.map_or(0, |i| i.len() as u32),
        })
    }

    /// Uploads a slice of plain-old-data vertex structs.
    pub fn from_vertices<V: Pod>(
        device: &mut dyn GraphicsDevice,
        layout: VertexLayout,
        vertices: &[V],
        indices: Option<&[u32]>,
        topology: PrimitiveTopology,
    ) -> Result<Self, VertexError> {
        Self::upload(
            device,
            layout,
            bytemuck::cast_slice(vertices),
            indices,
            topology,
        )
    }

    pub fn layout(&self) -> &VertexLayout {
        &self.layout
    }

    pub fn topology(&self) -> PrimitiveTopology {
        self.topology
    }

    pub fn vertex_buffer(&self) -> BufferHandle {
        self.vertex_buffer
    }

    pub fn index_buffer(&self) -> Option<BufferHandle> {
        self.index_buffer
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn is_indexed(&self) -> bool {
        self.index_buffer.is_some()
    }

    /// Number of vertices a draw consumes: the index count when indexed.
    pub fn draw_count(&self) -> u32 {
        if self.is_indexed() {
            self.index_count
        } else {
            self.vertex_count
        }
    }

    /// Checks the layout against a program's vertex inputs.
    pub fn check_inputs(&self, inputs: &[VertexInput]) -> Result<(), VertexError> {
        self.layout.check_inputs(inputs)
    }

    /// Frees the device buffers.
    pub fn release(self, device: &mut dyn GraphicsDevice) {
        device.delete_buffer(self.vertex_buffer);
        if let Some(index) = self.index_buffer {
            device.delete_buffer(index);
        }
    }
}
