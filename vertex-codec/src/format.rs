//! Vertex formats and attribute roles
//!
//! A [`VertexFormat`] describes how a single component is stored in a packed
//! buffer. A [`VertexAttribute`] is the semantic role of a stream (position,
//! normal, ...). Each role accepts a fixed set of formats; see
//! [`VertexAttribute::allows`].

use std::fmt;

use crate::error::CodecError;

/// Number of texture coordinate channels (`TexCoord(0)` .. `TexCoord(7)`)
pub const MAX_TEX_COORD_CHANNELS: u8 = 8;

/// Storage format of one vertex attribute component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    /// IEEE 754 binary32
    Float32,
    /// IEEE 754 binary16
    Float16,
    /// Signed normalized 8-bit, [-1, 1] ↔ [-127, 127]
    SNorm8,
    /// Signed normalized 16-bit, [-1, 1] ↔ [-32767, 32767]
    SNorm16,
    /// Unsigned normalized 8-bit, [0, 1] ↔ [0, 255]
    UNorm8,
    /// Unsigned normalized 16-bit, [0, 1] ↔ [0, 65535]
    UNorm16,
    // Integer formats are recognized so layouts can describe them, but no
    // float attribute can be transcoded through them.
    UInt8,
    SInt8,
    UInt16,
    SInt16,
    UInt32,
    SInt32,
}

impl VertexFormat {
    /// Size of one component in bytes
    #[inline]
    pub const fn component_size(self) -> usize {
        match self {
            Self::Float32 | Self::UInt32 | Self::SInt32 => 4,
            Self::Float16 | Self::SNorm16 | Self::UNorm16 | Self::UInt16 | Self::SInt16 => 2,
            Self::SNorm8 | Self::UNorm8 | Self::UInt8 | Self::SInt8 => 1,
        }
    }

    /// Short display name, as used in error messages
    pub const fn name(self) -> &'static str {
        match self {
            Self::Float32 => "Float32",
            Self::Float16 => "Float16",
            Self::SNorm8 => "SNorm8",
            Self::SNorm16 => "SNorm16",
            Self::UNorm8 => "UNorm8",
            Self::UNorm16 => "UNorm16",
            Self::UInt8 => "UInt8",
            Self::SInt8 => "SInt8",
            Self::UInt16 => "UInt16",
            Self::SInt16 => "SInt16",
            Self::UInt32 => "UInt32",
            Self::SInt32 => "SInt32",
        }
    }
}

impl fmt::Display for VertexFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Semantic role of a vertex attribute stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexAttribute {
    Position,
    Normal,
    Tangent,
    Color,
    /// Texture coordinate channel 0..=7
    TexCoord(u8),
}

impl VertexAttribute {
    /// Texture coordinate attribute for `channel`, rejecting channels above 7
    pub fn tex_coord(channel: u8) -> Result<Self, CodecError> {
        if channel >= MAX_TEX_COORD_CHANNELS {
            return Err(CodecError::InvalidChannel { channel });
        }
        Ok(Self::TexCoord(channel))
    }

    /// Component count this role requires, or `None` when it follows the source
    /// data (texture coordinates may be 2, 3 or 4 wide).
    pub const fn required_dimension(self) -> Option<usize> {
        match self {
            Self::Position | Self::Normal => Some(3),
            Self::Tangent | Self::Color => Some(4),
            Self::TexCoord(_) => None,
        }
    }

    /// Whether this role may be stored in `format`.
    ///
    /// | Role      | Float32 | Float16 | SNorm8/16 | UNorm8/16 |
    /// |-----------|---------|---------|-----------|-----------|
    /// | Position  | yes     | yes     | no        | no        |
    /// | Normal    | yes     | yes     | yes       | no        |
    /// | Tangent   | yes     | yes     | yes       | no        |
    /// | Color     | yes     | yes     | no        | yes       |
    /// | TexCoord  | yes     | yes     | no        | no        |
    pub const fn allows(self, format: VertexFormat) -> bool {
        use VertexFormat::*;
        match (self, format) {
            (_, Float32 | Float16) => true,
            (Self::Normal | Self::Tangent, SNorm8 | SNorm16) => true,
            (Self::Color, UNorm8 | UNorm16) => true,
            _ => false,
        }
    }
}

impl fmt::Display for VertexAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Position => f.write_str("Position"),
            Self::Normal => f.write_str("Normal"),
            Self::Tangent => f.write_str("Tangent"),
            Self::Color => f.write_str("Color"),
            Self::TexCoord(channel) => write!(f, "TexCoord{channel}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_sizes() {
        assert_eq!(VertexFormat::Float32.component_size(), 4);
        assert_eq!(VertexFormat::Float16.component_size(), 2);
        assert_eq!(VertexFormat::SNorm16.component_size(), 2);
        assert_eq!(VertexFormat::UNorm8.component_size(), 1);
        assert_eq!(VertexFormat::SInt32.component_size(), 4);
    }

    #[test]
    fn test_positions_reject_normalized_formats() {
        let position = VertexAttribute::Position;
        assert!(position.allows(VertexFormat::Float32));
        assert!(position.allows(VertexFormat::Float16));
        assert!(!position.allows(VertexFormat::SNorm16));
        assert!(!position.allows(VertexFormat::UNorm8));
    }

    #[test]
    fn test_colors_reject_signed_normalized() {
        let color = VertexAttribute::Color;
        assert!(color.allows(VertexFormat::UNorm8));
        assert!(color.allows(VertexFormat::UNorm16));
        assert!(!color.allows(VertexFormat::SNorm8));
        assert!(!color.allows(VertexFormat::SNorm16));
    }

    #[test]
    fn test_integer_formats_never_allowed() {
        for attribute in [
            VertexAttribute::Position,
            VertexAttribute::Normal,
            VertexAttribute::Tangent,
            VertexAttribute::Color,
            VertexAttribute::TexCoord(0),
        ] {
            assert!(!attribute.allows(VertexFormat::UInt8));
            assert!(!attribute.allows(VertexFormat::SInt16));
            assert!(!attribute.allows(VertexFormat::UInt32));
        }
    }

    #[test]
    fn test_tex_coord_channel_range() {
        assert_eq!(VertexAttribute::tex_coord(7).unwrap(), VertexAttribute::TexCoord(7));
        assert!(matches!(
            VertexAttribute::tex_coord(8),
            Err(CodecError::InvalidChannel { channel: 8 })
        ));
    }

    #[test]
    fn test_display_names() {
        assert_eq!(VertexAttribute::TexCoord(3).to_string(), "TexCoord3");
        assert_eq!(VertexFormat::SNorm8.to_string(), "SNorm8");
    }
}
