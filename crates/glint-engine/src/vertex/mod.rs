//! Vertex layouts and uploaded vertex state.
//!
//! A `VertexLayout` describes interleaved attributes inside one buffer. A
//! `VertexLayoutBinding` owns the device buffers built from raw bytes (and an
//! optional `u32` index list) together with their layout and topology.

mod binding;
mod error;
mod layout;

pub use binding::VertexLayoutBinding;
pub use error::VertexError;
pub use layout::{PrimitiveTopology, VertexAttribute, VertexFormat, VertexLayout};
