//! Codec contract violations

use crate::format::{VertexAttribute, VertexFormat};

/// Error raised when a transcode request breaks the codec contract.
///
/// All checks run before any byte of the destination buffer is written.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Source array length differs from the destination vertex count
    #[error("[{attribute}] source length {actual} must equal vertex count {expected}")]
    LengthMismatch {
        attribute: VertexAttribute,
        expected: usize,
        actual: usize,
    },

    /// Declared attribute dimension differs from the role's dimension
    #[error("[{attribute}] dimension must be {expected}, but was {actual}")]
    Dimension {
        attribute: VertexAttribute,
        expected: usize,
        actual: usize,
    },

    /// `offset + component_size * dimension` exceeds the stride
    #[error("[{attribute}] attribute overruns stride (offset {offset} + size {size} > stride {stride})")]
    LayoutOverrun {
        attribute: VertexAttribute,
        offset: usize,
        size: usize,
        stride: usize,
    },

    /// Buffer ends before the last vertex's element
    #[error("[{attribute}] vertex buffer too small for computed layout ({required} bytes required, {available} available)")]
    BufferTooSmall {
        attribute: VertexAttribute,
        required: usize,
        available: usize,
    },

    /// Format is not allowed for this attribute role
    #[error("[{attribute}] unsupported format: {format}")]
    UnsupportedFormat {
        attribute: VertexAttribute,
        format: VertexFormat,
    },

    /// Layout has no descriptor for the attribute
    #[error("[{attribute}] vertex layout has no such attribute")]
    MissingAttribute { attribute: VertexAttribute },

    /// Texture coordinate channel outside 0..=7
    #[error("[TexCoord] channel must be 0..7, but was {channel}")]
    InvalidChannel { channel: u8 },

    /// Descriptor references a stream that does not exist
    #[error("[{attribute}] stream {stream} does not exist ({stream_count} streams)")]
    StreamOutOfRange {
        attribute: VertexAttribute,
        stream: usize,
        stream_count: usize,
    },
}
