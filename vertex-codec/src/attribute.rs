//! Typed encode/decode of one attribute stream against a packed buffer
//!
//! Every entry point validates the full contract before touching the buffer:
//! 1. source length equals the vertex count
//! 2. declared dimension matches the role
//! 3. format is allowed for the role
//! 4. `offset + component_size * dimension <= stride`
//! 5. the last vertex's element ends inside the buffer
//!
//! A call that fails leaves the destination untouched.

use glam::{Vec2, Vec3, Vec4};

use crate::error::CodecError;
use crate::format::{VertexAttribute, VertexFormat};
use crate::quantize::*;
use crate::view::{StridedView, StridedViewMut, StrideLayout};

// ============================================================================
// In-memory Vector Types
// ============================================================================

/// Float vector type that can be transcoded through the codec
pub trait AttributeVector: Copy + Default + Send + Sync {
    /// Number of components (2, 3 or 4)
    const DIM: usize;

    /// Components padded to four lanes; lanes past `DIM` are ignored
    fn components(&self) -> [f32; 4];

    /// Build from four lanes, reading only the first `DIM`
    fn from_components(components: [f32; 4]) -> Self;
}

impl AttributeVector for Vec2 {
    const DIM: usize = 2;

    #[inline]
    fn components(&self) -> [f32; 4] {
        [self.x, self.y, 0.0, 0.0]
    }

    #[inline]
    fn from_components(c: [f32; 4]) -> Self {
        Vec2::new(c[0], c[1])
    }
}

impl AttributeVector for Vec3 {
    const DIM: usize = 3;

    #[inline]
    fn components(&self) -> [f32; 4] {
        [self.x, self.y, self.z, 0.0]
    }

    #[inline]
    fn from_components(c: [f32; 4]) -> Self {
        Vec3::new(c[0], c[1], c[2])
    }
}

impl AttributeVector for Vec4 {
    const DIM: usize = 4;

    #[inline]
    fn components(&self) -> [f32; 4] {
        self.to_array()
    }

    #[inline]
    fn from_components(c: [f32; 4]) -> Self {
        Vec4::from_array(c)
    }
}

impl AttributeVector for [f32; 2] {
    const DIM: usize = 2;

    #[inline]
    fn components(&self) -> [f32; 4] {
        [self[0], self[1], 0.0, 0.0]
    }

    #[inline]
    fn from_components(c: [f32; 4]) -> Self {
        [c[0], c[1]]
    }
}

impl AttributeVector for [f32; 3] {
    const DIM: usize = 3;

    #[inline]
    fn components(&self) -> [f32; 4] {
        [self[0], self[1], self[2], 0.0]
    }

    #[inline]
    fn from_components(c: [f32; 4]) -> Self {
        [c[0], c[1], c[2]]
    }
}

impl AttributeVector for [f32; 4] {
    const DIM: usize = 4;

    #[inline]
    fn components(&self) -> [f32; 4] {
        *self
    }

    #[inline]
    fn from_components(c: [f32; 4]) -> Self {
        c
    }
}

// ============================================================================
// Slot Description
// ============================================================================

/// Where and how one attribute is stored inside a single stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeSlot {
    pub format: VertexFormat,
    /// Declared component count
    pub dimension: usize,
    /// Byte offset within a vertex
    pub offset: usize,
    /// Bytes between consecutive vertices
    pub stride: usize,
}

impl AttributeSlot {
    /// Bytes occupied by one element of this slot
    #[inline]
    pub const fn element_size(&self) -> usize {
        self.format.component_size() * self.dimension
    }

    fn stride_layout(&self) -> StrideLayout {
        StrideLayout {
            offset: self.offset,
            stride: self.stride,
            element_size: self.element_size(),
        }
    }

    /// Validate dimension, format and layout for `V` (contract steps 2 to 5).
    fn check<V: AttributeVector>(
        &self,
        attribute: VertexAttribute,
        buffer_len: usize,
        vertex_count: usize,
    ) -> Result<StrideLayout, CodecError> {
        let expected = attribute.required_dimension().unwrap_or(V::DIM);
        if V::DIM != expected {
            return Err(CodecError::Dimension {
                attribute,
                expected,
                actual: V::DIM,
            });
        }
        if self.dimension != expected {
            return Err(CodecError::Dimension {
                attribute,
                expected,
                actual: self.dimension,
            });
        }
        if !attribute.allows(self.format) {
            return Err(CodecError::UnsupportedFormat {
                attribute,
                format: self.format,
            });
        }
        let layout = self.stride_layout();
        layout.validate(attribute, buffer_len, vertex_count)?;
        Ok(layout)
    }
}

// ============================================================================
// Encode / Decode
// ============================================================================

/// Encode `src` into `buffer` at `slot`, one element per vertex.
pub fn encode<V: AttributeVector>(
    attribute: VertexAttribute,
    slot: AttributeSlot,
    src: &[V],
    buffer: &mut [u8],
    vertex_count: usize,
) -> Result<(), CodecError> {
    if src.len() != vertex_count {
        return Err(CodecError::LengthMismatch {
            attribute,
            expected: vertex_count,
            actual: src.len(),
        });
    }
    let layout = slot.check::<V>(attribute, buffer.len(), vertex_count)?;
    if vertex_count == 0 {
        return Ok(());
    }
    let mut view = StridedViewMut::new(attribute, buffer, layout, vertex_count)?;

    let size = slot.format.component_size();
    for (element, value) in view.elements_mut().zip(src) {
        let components = value.components();
        for (out, &component) in element
            .chunks_exact_mut(size)
            .zip(components.iter().take(V::DIM))
        {
            write_component(slot.format, component, out);
        }
    }
    Ok(())
}

/// Decode `vertex_count` elements from `buffer` at `slot`.
pub fn decode<V: AttributeVector>(
    attribute: VertexAttribute,
    slot: AttributeSlot,
    buffer: &[u8],
    vertex_count: usize,
) -> Result<Vec<V>, CodecError> {
    let mut out = vec![V::default(); vertex_count];
    decode_into(attribute, slot, buffer, &mut out)?;
    Ok(out)
}

/// Decode into an existing array; `dst.len()` is the vertex count.
pub fn decode_into<V: AttributeVector>(
    attribute: VertexAttribute,
    slot: AttributeSlot,
    buffer: &[u8],
    dst: &mut [V],
) -> Result<(), CodecError> {
    let vertex_count = dst.len();
    let layout = slot.check::<V>(attribute, buffer.len(), vertex_count)?;
    if vertex_count == 0 {
        return Ok(());
    }
    let view = StridedView::new(attribute, buffer, layout, vertex_count)?;

    let size = slot.format.component_size();
    for (element, value) in view.elements().zip(dst.iter_mut()) {
        let mut components = [0.0f32; 4];
        for (lane, bytes) in components.iter_mut().zip(element.chunks_exact(size)) {
            *lane = read_component(slot.format, bytes);
        }
        *value = V::from_components(components);
    }
    Ok(())
}

// ============================================================================
// Component Codecs
// ============================================================================

/// Write one little-endian component. `out` is exactly `format.component_size()` bytes
/// and `format` has already been checked against the role.
#[inline]
fn write_component(format: VertexFormat, value: f32, out: &mut [u8]) {
    match format {
        VertexFormat::Float32 => out.copy_from_slice(&sanitize(value).to_le_bytes()),
        VertexFormat::Float16 => out.copy_from_slice(&f32_to_f16_bits(value).to_le_bytes()),
        VertexFormat::SNorm8 => out.copy_from_slice(&f32_to_snorm8(value).to_le_bytes()),
        VertexFormat::SNorm16 => out.copy_from_slice(&f32_to_snorm16(value).to_le_bytes()),
        VertexFormat::UNorm8 => out.copy_from_slice(&f32_to_unorm8(value).to_le_bytes()),
        VertexFormat::UNorm16 => out.copy_from_slice(&f32_to_unorm16(value).to_le_bytes()),
        // Rejected by `VertexAttribute::allows`
        VertexFormat::UInt8
        | VertexFormat::SInt8
        | VertexFormat::UInt16
        | VertexFormat::SInt16
        | VertexFormat::UInt32
        | VertexFormat::SInt32 => out.fill(0),
    }
}

#[inline]
fn read_component(format: VertexFormat, bytes: &[u8]) -> f32 {
    match format {
        VertexFormat::Float32 => f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        VertexFormat::Float16 => f16_bits_to_f32(u16::from_le_bytes([bytes[0], bytes[1]])),
        VertexFormat::SNorm8 => snorm8_to_f32(bytes[0] as i8),
        VertexFormat::SNorm16 => snorm16_to_f32(i16::from_le_bytes([bytes[0], bytes[1]])),
        VertexFormat::UNorm8 => unorm8_to_f32(bytes[0]),
        VertexFormat::UNorm16 => unorm16_to_f32(u16::from_le_bytes([bytes[0], bytes[1]])),
        VertexFormat::UInt8
        | VertexFormat::SInt8
        | VertexFormat::UInt16
        | VertexFormat::SInt16
        | VertexFormat::UInt32
        | VertexFormat::SInt32 => 0.0,
    }
}
