//! Bounds-checked strided views over packed vertex streams
//!
//! A view is a byte slice plus `(offset, stride, element_size, count)`. The
//! constructor performs the whole layout validation, so iteration afterwards
//! only ever hands out element slices that are known to be in range.

use crate::error::CodecError;
use crate::format::VertexAttribute;

/// Placement of one attribute inside a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrideLayout {
    /// Byte offset of the attribute within a vertex
    pub offset: usize,
    /// Bytes between consecutive vertices
    pub stride: usize,
    /// Bytes occupied by one attribute element (component size × dimension)
    pub element_size: usize,
}

impl StrideLayout {
    /// Validate the layout against a buffer of `len` bytes holding `count` vertices.
    ///
    /// Checks, in order: the element fits inside the stride, then the last
    /// vertex's element ends inside the buffer.
    pub fn validate(
        &self,
        attribute: VertexAttribute,
        len: usize,
        count: usize,
    ) -> Result<(), CodecError> {
        let end = match self.offset.checked_add(self.element_size) {
            Some(end) if end <= self.stride => end,
            _ => {
                return Err(CodecError::LayoutOverrun {
                    attribute,
                    offset: self.offset,
                    size: self.element_size,
                    stride: self.stride,
                });
            }
        };
        if count == 0 {
            return Ok(());
        }
        let required = (count - 1)
            .checked_mul(self.stride)
            .and_then(|bytes| bytes.checked_add(end))
            .unwrap_or(usize::MAX);
        if required > len {
            return Err(CodecError::BufferTooSmall {
                attribute,
                required,
                available: len,
            });
        }
        Ok(())
    }
}

/// Read-only strided view
#[derive(Debug, Clone, Copy)]
pub struct StridedView<'a> {
    bytes: &'a [u8],
    layout: StrideLayout,
    count: usize,
}

impl<'a> StridedView<'a> {
    pub fn new(
        attribute: VertexAttribute,
        bytes: &'a [u8],
        layout: StrideLayout,
        count: usize,
    ) -> Result<Self, CodecError> {
        layout.validate(attribute, bytes.len(), count)?;
        Ok(Self {
            bytes,
            layout,
            count,
        })
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Element bytes of each vertex, in order
    pub fn elements(&self) -> impl Iterator<Item = &'a [u8]> + 'a {
        let element_size = self.layout.element_size;
        let tail: &'a [u8] = if self.count == 0 {
            &[]
        } else {
            &self.bytes[self.layout.offset..]
        };
        tail.chunks(self.layout.stride)
            .take(self.count)
            .map(move |chunk| &chunk[..element_size])
    }
}

/// Mutable strided view
#[derive(Debug)]
pub struct StridedViewMut<'a> {
    bytes: &'a mut [u8],
    layout: StrideLayout,
    count: usize,
}

impl<'a> StridedViewMut<'a> {
    pub fn new(
        attribute: VertexAttribute,
        bytes: &'a mut [u8],
        layout: StrideLayout,
        count: usize,
    ) -> Result<Self, CodecError> {
        layout.validate(attribute, bytes.len(), count)?;
        Ok(Self {
            bytes,
            layout,
            count,
        })
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Mutable element bytes of each vertex, in order
    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut [u8]> + '_ {
        let element_size = self.layout.element_size;
        let tail: &mut [u8] = if self.count == 0 {
            &mut []
        } else {
            &mut self.bytes[self.layout.offset..]
        };
        tail.chunks_mut(self.layout.stride)
            .take(self.count)
            .map(move |chunk| &mut chunk[..element_size])
    }
}
