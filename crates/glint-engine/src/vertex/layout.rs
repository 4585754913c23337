use crate::shader::{IoScalar, IoType, VertexInput};

use super::VertexError;

/// Component type × component count of one attribute.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum VertexFormat {
    Float32,
    Float32x2,
    Float32x3,
    Float32x4,
    Uint32,
    Uint32x2,
    Sint32,
    Sint32x2,
}

impl VertexFormat {
    pub fn components(self) -> u32 {
        match self {
            VertexFormat::Float32 | VertexFormat::Uint32 | VertexFormat::Sint32 => 1,
            VertexFormat::Float32x2 | VertexFormat::Uint32x2 | VertexFormat::Sint32x2 => 2,
            VertexFormat::Float32x3 => 3,
            VertexFormat::Float32x4 => 4,
        }
    }

    pub fn scalar(self) -> IoScalar {
        match self {
            VertexFormat::Float32
            | VertexFormat::Float32x2
            | VertexFormat::Float32x3
            | VertexFormat::Float32x4 => IoScalar::Float,
            VertexFormat::Uint32 | VertexFormat::Uint32x2 => IoScalar::Uint,
            VertexFormat::Sint32 | VertexFormat::Sint32x2 => IoScalar::Sint,
        }
    }

    /// Size in bytes.
    pub fn size(self) -> u32 {
        self.components() * 4
    }

    pub(crate) fn to_wgpu(self) -> wgpu::VertexFormat {
        match self {
            VertexFormat::Float32 => wgpu::VertexFormat::Float32,
            VertexFormat::Float32x2 => wgpu::VertexFormat::Float32x2,
            VertexFormat::Float32x3 => wgpu::VertexFormat::Float32x3,
            VertexFormat::Float32x4 => wgpu::VertexFormat::Float32x4,
            VertexFormat::Uint32 => wgpu::VertexFormat::Uint32,
            VertexFormat::Uint32x2 => wgpu::VertexFormat::Uint32x2,
            VertexFormat::Sint32 => wgpu::VertexFormat::Sint32,
            VertexFormat::Sint32x2 => wgpu::VertexFormat::Sint32x2,
        }
    }
}

/// One attribute inside an interleaved vertex.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct VertexAttribute {
    /// Shader input location.
    pub location: u32,
    pub format: VertexFormat,
    /// Byte offset from the start of the vertex.
    pub offset: u32,
}

impl VertexAttribute {
    pub const fn new(location: u32, format: VertexFormat, offset: u32) -> Self {
        Self {
            location,
            format,
            offset,
        }
    }
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum PrimitiveTopology {
    #[default]
    TriangleList,
    TriangleStrip,
}

impl PrimitiveTopology {
    pub(crate) fn to_wgpu(self) -> wgpu::PrimitiveTopology {
        match self {
            PrimitiveTopology::TriangleList => wgpu::PrimitiveTopology::TriangleList,
            PrimitiveTopology::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
        }
    }

    /// Number of triangles assembled from `count` vertices.
    pub fn triangle_count(self, count: u32) -> u32 {
        match self {
            PrimitiveTopology::TriangleList => count / 3,
            PrimitiveTopology::TriangleStrip => count.saturating_sub(2),
        }
    }
}

/// Required alignment of strides and attribute offsets, in bytes.
const VERTEX_ALIGNMENT: u32 = 4;

/// Validated stride + attribute list.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct VertexLayout {
    stride: u32,
    attributes: Vec<VertexAttribute>,
}

impl VertexLayout {
    pub fn new(
        stride: u32,
        attributes: impl IntoIterator<Item = VertexAttribute>,
    ) -> Result<Self, VertexError> {
        if stride == 0 {
            return Err(VertexError::ZeroStride);
        }
        if stride % VERTEX_ALIGNMENT != 0 {
            return Err(VertexError::MisalignedStride(stride));
        }
        let attributes: Vec<VertexAttribute> = attributes.into_iter().collect();

        for a in &attributes {
            if a.offset % VERTEX_ALIGNMENT != 0 {
                return Err(VertexError::Misaligned {
                    location: a.location,
                    offset: a.offset,
                });
            }
            let size = a.format.size();
            if a.offset.checked_add(size).is_none_or(|end| end > stride) {
                return Err(VertexError::AttributeOutOfBounds {
                    location: a.location,
                    offset: a.offset,
                    size,
                    stride,
                });
            }
        }

        for (i, a) in attributes.iter().enumerate() {
            for b in &attributes[i + 1..] {
                if a.location == b.location {
                    return Err(VertexError::DuplicateLocation(a.location));
                }
                let a_end = a.offset + a.format.size();
                let b_end = b.offset + b.format.size();
                if a.offset < b_end && b.offset < a_end {
                    return Err(VertexError::Overlap {
                        first: a.location,
                        second: b.location,
                    });
                }
            }
        }

        Ok(Self { stride, attributes })
    }

    /// Tightly packed attributes at locations 0, 1, 2, ... in order.
    pub fn packed(formats: &[VertexFormat]) -> Result<Self, VertexError> {
        let mut offset = 0;
        let mut attributes = Vec::with_capacity(formats.len());
        for (location, format) in formats.iter().enumerate() {
            attributes.push(VertexAttribute::new(location as u32, *format, offset));
            offset += format.size();
        }
        Self::new(offset, attributes)
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }

    pub fn attribute(&self, location: u32) -> Option<&VertexAttribute> {
        self.attributes.iter().find(|a| a.location == location)
    }

    /// Checks that every program input is fed by a compatible attribute.
    ///
    /// Float inputs accept float attributes of any width (missing components
    /// default to `0, 0, 0, 1`); integer inputs need the same scalar type.
    pub fn check_inputs(&self, inputs: &[VertexInput]) -> Result<(), VertexError> {
        for input in inputs {
            let attr = self
                .attribute(input.location)
                .ok_or(VertexError::MissingInput {
                    location: input.location,
                })?;
            let Some(ty) = input.ty else { continue };
            if !format_feeds(attr.format, ty) {
                return Err(VertexError::InputType {
                    location: input.location,
                    format: attr.format,
                    input: ty,
                });
            }
        }
        Ok(())
    }
}

fn format_feeds(format: VertexFormat, input: IoType) -> bool {
    match input.scalar {
        IoScalar::Float => format.scalar() == IoScalar::Float,
        IoScalar::Bool => false,
        scalar => format.scalar() == scalar && format.components() >= input.components,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn float_input(location: u32, components: u32) -> VertexInput {
        VertexInput {
            location,
            name: None,
            ty: Some(IoType {
                scalar: IoScalar::Float,
                components,
            }),
        }
    }

    #[test]
    fn packed_position_color_layout() {
        let layout = VertexLayout::packed(&[VertexFormat::Float32x3, VertexFormat::Float32x3]).unwrap();
        assert_eq!(layout.stride(), 24);
        assert_eq!(layout.attribute(1).unwrap().offset, 12);
    }

    #[test]
    fn zero_stride_is_rejected() {
        assert_eq!(VertexLayout::new(0, []), Err(VertexError::ZeroStride));
    }

    #[test]
    fn attribute_past_stride_is_rejected() {
        let err = VertexLayout::new(16, [VertexAttribute::new(0, VertexFormat::Float32x3, 8)])
            .unwrap_err();
        assert!(matches!(err, VertexError::AttributeOutOfBounds { location: 0, .. }));
    }

    #[test]
    fn unaligned_stride_is_rejected() {
        let err = VertexLayout::new(13, [VertexAttribute::new(0, VertexFormat::Float32x3, 1)])
            .unwrap_err();
        assert_eq!(err, VertexError::MisalignedStride(13));
    }

    #[test]
    fn unaligned_offset_is_rejected() {
        let err = VertexLayout::new(
            28,
            [
                VertexAttribute::new(0, VertexFormat::Float32x3, 0),
                VertexAttribute::new(1, VertexFormat::Float32x3, 14),
            ],
        )
        .unwrap_err();
        assert_eq!(err, VertexError::Misaligned { location: 1, offset: 14 });
    }

    #[test]
    fn overlapping_attributes_are_rejected() {
        let err = VertexLayout::new(
            24,
            [
                VertexAttribute::new(0, VertexFormat::Float32x3, 0),
                VertexAttribute::new(1, VertexFormat::Float32x3, 8),
            ],
        )
        .unwrap_err();
        assert_eq!(err, VertexError::Overlap { first: 0, second: 1 });
    }

    #[test]
    fn duplicate_locations_are_rejected() {
        let err = VertexLayout::new(
            24,
            [
                VertexAttribute::new(2, VertexFormat::Float32x3, 0),
                VertexAttribute::new(2, VertexFormat::Float32x3, 12),
            ],
        )
        .unwrap_err();
        assert_eq!(err, VertexError::DuplicateLocation(2));
    }

    #[test]
    fn inputs_must_be_covered() {
        let layout = VertexLayout::packed(&[VertexFormat::Float32x3]).unwrap();
        assert!(layout.check_inputs(&[float_input(0, 3)]).is_ok());
        assert_eq!(
            layout.check_inputs(&[float_input(0, 3), float_input(1, 3)]),
            Err(VertexError::MissingInput { location: 1 })
        );
    }

    #[test]
    fn float_input_accepts_narrower_float_attribute() {
        let layout = VertexLayout::packed(&[VertexFormat::Float32x2]).unwrap();
        assert!(layout.check_inputs(&[float_input(0, 4)]).is_ok());
    }

    #[test]
    fn integer_input_rejects_float_attribute() {
        let layout = VertexLayout::packed(&[VertexFormat::Float32]).unwrap();
        let input = VertexInput {
            location: 0,
            name: Some("id".into()),
            ty: Some(IoType {
                scalar: IoScalar::Uint,
                components: 1,
            }),
        };
        assert!(matches!(
            layout.check_inputs(&[input]),
            Err(VertexError::InputType { location: 0, .. })
        ));
    }
}
