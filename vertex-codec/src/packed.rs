//! Packed multi-stream vertex buffers
//!
//! [`VertexLayout`] names which attribute lives in which stream at which offset.
//! [`PackedVertexData`] owns the stream bytes and exposes typed read/write for
//! each role, validating through [`crate::attribute`].

use glam::{Vec3, Vec4};
use smallvec::SmallVec;

use crate::attribute::{self, AttributeSlot, AttributeVector};
use crate::error::CodecError;
use crate::format::{VertexAttribute, VertexFormat};

/// One attribute entry of a layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeDescriptor {
    pub attribute: VertexAttribute,
    pub format: VertexFormat,
    pub dimension: usize,
    /// Stream index
    pub stream: usize,
    /// Byte offset within the stream's vertex
    pub offset: usize,
}

/// Attribute placement across one or more vertex streams
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VertexLayout {
    descriptors: SmallVec<[AttributeDescriptor; 8]>,
    strides: SmallVec<[usize; 4]>,
}

impl VertexLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-stream layout with attributes packed back to back, in order.
    ///
    /// The stride is rounded up to a multiple of 4 bytes.
    pub fn interleaved(attributes: &[(VertexAttribute, VertexFormat, usize)]) -> Self {
        let mut layout = Self::new();
        let mut offset = 0;
        for &(attribute, format, dimension) in attributes {
            layout.descriptors.push(AttributeDescriptor {
                attribute,
                format,
                dimension,
                stream: 0,
                offset,
            });
            offset += format.component_size() * dimension;
        }
        layout.strides.push(offset.next_multiple_of(4));
        layout
    }

    /// Append a stream with the given stride, returning its index
    pub fn add_stream(&mut self, stride: usize) -> usize {
        self.strides.push(stride);
        self.strides.len() - 1
    }

    /// Add or replace the descriptor for `descriptor.attribute`
    pub fn set_attribute(&mut self, descriptor: AttributeDescriptor) {
        match self
            .descriptors
            .iter_mut()
            .find(|d| d.attribute == descriptor.attribute)
        {
            Some(existing) => *existing = descriptor,
            None => self.descriptors.push(descriptor),
        }
    }

    pub fn with_attribute(mut self, descriptor: AttributeDescriptor) -> Self {
        self.set_attribute(descriptor);
        self
    }

    pub fn descriptor(&self, attribute: VertexAttribute) -> Option<&AttributeDescriptor> {
        self.descriptors.iter().find(|d| d.attribute == attribute)
    }

    pub fn descriptors(&self) -> &[AttributeDescriptor] {
        &self.descriptors
    }

    pub fn has_attribute(&self, attribute: VertexAttribute) -> bool {
        self.descriptor(attribute).is_some()
    }

    pub fn stream_count(&self) -> usize {
        self.strides.len()
    }

    pub fn stride(&self, stream: usize) -> Option<usize> {
        self.strides.get(stream).copied()
    }

    /// Resolve the slot for `attribute`, checking the descriptor and its stream exist.
    pub fn slot(&self, attribute: VertexAttribute) -> Result<(usize, AttributeSlot), CodecError> {
        let descriptor = self
            .descriptor(attribute)
            .ok_or(CodecError::MissingAttribute { attribute })?;
        let stride = self
            .stride(descriptor.stream)
            .ok_or(CodecError::StreamOutOfRange {
                attribute,
                stream: descriptor.stream,
                stream_count: self.stream_count(),
            })?;
        Ok((
            descriptor.stream,
            AttributeSlot {
                format: descriptor.format,
                dimension: descriptor.dimension,
                offset: descriptor.offset,
                stride,
            },
        ))
    }
}

/// Vertex streams plus the layout describing them
#[derive(Debug, Clone, PartialEq)]
pub struct PackedVertexData {
    layout: VertexLayout,
    streams: Vec<Vec<u8>>,
    vertex_count: usize,
}

impl PackedVertexData {
    /// Zero-filled streams sized for `vertex_count` vertices
    pub fn new(layout: VertexLayout, vertex_count: usize) -> Self {
        let streams = (0..layout.stream_count())
            .map(|stream| vec![0u8; layout.strides[stream] * vertex_count])
            .collect();
        Self {
            layout,
            streams,
            vertex_count,
        }
    }

    /// Wrap existing stream bytes. Sizes are checked on each access.
    pub fn from_streams(layout: VertexLayout, streams: Vec<Vec<u8>>, vertex_count: usize) -> Self {
        Self {
            layout,
            streams,
            vertex_count,
        }
    }

    /// Single stream built from a slice of `#[repr(C)]` vertex structs
    pub fn from_pod_vertices<T: bytemuck::Pod>(layout: VertexLayout, vertices: &[T]) -> Self {
        let bytes: &[u8] = bytemuck::cast_slice(vertices);
        Self {
            layout,
            streams: vec![bytes.to_vec()],
            vertex_count: vertices.len(),
        }
    }

    pub fn layout(&self) -> &VertexLayout {
        &self.layout
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    pub fn stream(&self, index: usize) -> Option<&[u8]> {
        self.streams.get(index).map(Vec::as_slice)
    }

    pub fn into_streams(self) -> Vec<Vec<u8>> {
        self.streams
    }

    pub fn has_attribute(&self, attribute: VertexAttribute) -> bool {
        self.layout.has_attribute(attribute)
    }

    // ========================================================================
    // Generic Access
    // ========================================================================

    /// Encode `src` into the stream holding `attribute`
    pub fn write_attribute<V: AttributeVector>(
        &mut self,
        attribute: VertexAttribute,
        src: &[V],
    ) -> Result<(), CodecError> {
        if src.len() != self.vertex_count {
            return Err(CodecError::LengthMismatch {
                attribute,
                expected: self.vertex_count,
                actual: src.len(),
            });
        }
        let (stream, slot) = self.layout.slot(attribute)?;
        let stream_count = self.streams.len();
        let bytes = self
            .streams
            .get_mut(stream)
            .ok_or(CodecError::StreamOutOfRange {
                attribute,
                stream,
                stream_count,
            })?;
        attribute::encode(attribute, slot, src, bytes, self.vertex_count)
    }

    /// Decode the stream holding `attribute`
    pub fn read_attribute<V: AttributeVector>(
        &self,
        attribute: VertexAttribute,
    ) -> Result<Vec<V>, CodecError> {
        let (stream, slot) = self.layout.slot(attribute)?;
        let bytes = self.streams.get(stream).ok_or(CodecError::StreamOutOfRange {
            attribute,
            stream,
            stream_count: self.streams.len(),
        })?;
        attribute::decode(attribute, slot, bytes, self.vertex_count)
    }

    // ========================================================================
    // Typed Access
    // ========================================================================

    pub fn write_positions(&mut self, positions: &[Vec3]) -> Result<(), CodecError> {
        self.write_attribute(VertexAttribute::Position, positions)
    }

    pub fn read_positions(&self) -> Result<Vec<Vec3>, CodecError> {
        self.read_attribute(VertexAttribute::Position)
    }

    pub fn write_normals(&mut self, normals: &[Vec3]) -> Result<(), CodecError> {
        self.write_attribute(VertexAttribute::Normal, normals)
    }

    pub fn read_normals(&self) -> Result<Vec<Vec3>, CodecError> {
        self.read_attribute(VertexAttribute::Normal)
    }

    /// Tangents are xyz direction plus w handedness
    pub fn write_tangents(&mut self, tangents: &[Vec4]) -> Result<(), CodecError> {
        self.write_attribute(VertexAttribute::Tangent, tangents)
    }

    pub fn read_tangents(&self) -> Result<Vec<Vec4>, CodecError> {
        self.read_attribute(VertexAttribute::Tangent)
    }

    pub fn write_colors(&mut self, colors: &[Vec4]) -> Result<(), CodecError> {
        self.write_attribute(VertexAttribute::Color, colors)
    }

    pub fn read_colors(&self) -> Result<Vec<Vec4>, CodecError> {
        self.read_attribute(VertexAttribute::Color)
    }

    /// UVs in channel 0..=7; 2, 3 or 4 components
    pub fn write_uvs<V: AttributeVector>(&mut self, channel: u8, uvs: &[V]) -> Result<(), CodecError> {
        let attribute = VertexAttribute::tex_coord(channel)?;
        self.write_attribute(attribute, uvs)
    }

    pub fn read_uvs<V: AttributeVector>(&self, channel: u8) -> Result<Vec<V>, CodecError> {
        let attribute = VertexAttribute::tex_coord(channel)?;
        self.read_attribute(attribute)
    }
}
