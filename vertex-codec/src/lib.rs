//! Strict vertex attribute codec
//!
//! Reads and writes position, normal, tangent, color and UV0-7 data against
//! packed strided buffers in any of the supported component encodings
//! (Float32, Float16, SNorm8/16, UNorm8/16). The codec never owns caller
//! memory beyond [`PackedVertexData`]; the free functions in [`attribute`]
//! transcode directly into borrowed byte slices.
//!
//! All layout validation runs before the first byte is written, and no encoder
//! emits a non-finite value.

pub mod attribute;
pub mod error;
pub mod format;
pub mod packed;
pub mod quantize;
pub mod view;

pub use attribute::{AttributeSlot, AttributeVector, decode, decode_into, encode};
pub use error::CodecError;
pub use format::{MAX_TEX_COORD_CHANNELS, VertexAttribute, VertexFormat};
pub use packed::{AttributeDescriptor, PackedVertexData, VertexLayout};
pub use view::{StrideLayout, StridedView, StridedViewMut};
