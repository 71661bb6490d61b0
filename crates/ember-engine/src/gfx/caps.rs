//! Portable capability vocabulary.
//!
//! Every backend translates these values through its own lookup tables; values a
//! backend cannot express are rejected at the call site.

/// Pipeline features toggled with `enable_feature` / `disable_feature`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Feature {
    Blend,
    Depth,
    CullFace,
}

impl Feature {
    pub const ALL: [Feature; 3] = [Feature::Blend, Feature::Depth, Feature::CullFace];

    pub(crate) const fn index(self) -> usize {
        match self {
            Feature::Blend => 0,
            Feature::Depth => 1,
            Feature::CullFace => 2,
        }
    }
}

/// Framebuffer attachment point.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Attachment {
    Color,
    Depth,
}

/// Storage format of a texture.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum InternalFormat {
    Rgb8,
    Rgba8,
    Rgb16,
    Rgba16,
    Rgba16F,
    Rgba32F,
    Depth16,
    Depth24,
    Depth32,
}

impl InternalFormat {
    /// Bytes per texel expected by `upload`.
    pub const fn texel_size(self) -> usize {
        match self {
            InternalFormat::Rgb8 => 3,
            InternalFormat::Rgba8 => 4,
            InternalFormat::Rgb16 => 6,
            InternalFormat::Rgba16 => 8,
            InternalFormat::Rgba16F => 8,
            InternalFormat::Rgba32F => 16,
            InternalFormat::Depth16 => 2,
            InternalFormat::Depth24 => 4,
            InternalFormat::Depth32 => 4,
        }
    }

    pub const fn is_depth(self) -> bool {
        matches!(
            self,
            InternalFormat::Depth16 | InternalFormat::Depth24 | InternalFormat::Depth32
        )
    }

    /// Channel layout of the pixels this format accepts as upload input.
    pub const fn pixel_format(self) -> Format {
        match self {
            InternalFormat::Rgb8 | InternalFormat::Rgb16 => Format::Rgb,
            InternalFormat::Rgba8
            | InternalFormat::Rgba16
            | InternalFormat::Rgba16F
            | InternalFormat::Rgba32F => Format::Rgba,
            InternalFormat::Depth16 | InternalFormat::Depth24 | InternalFormat::Depth32 => {
                Format::Depth
            }
        }
    }
}

/// Channel order of client-side pixel data.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Format {
    Rgb,
    Rgba,
    Bgr,
    Bgra,
    Depth,
}

impl Format {
    /// Returns the format with red and blue swapped back, if this is a BGR layout.
    pub const fn unswizzled(self) -> Option<Format> {
        match self {
            Format::Bgr => Some(Format::Rgb),
            Format::Bgra => Some(Format::Rgba),
            _ => None,
        }
    }

    pub const fn channels(self) -> usize {
        match self {
            Format::Rgb | Format::Bgr => 3,
            Format::Rgba | Format::Bgra => 4,
            Format::Depth => 1,
        }
    }
}

/// Scalar component type of a vertex attribute or pixel channel.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ScalarType {
    Ubyte,
    Uint,
    Float,
}

impl ScalarType {
    pub const fn size(self) -> u64 {
        match self {
            ScalarType::Ubyte => 1,
            ScalarType::Uint | ScalarType::Float => 4,
        }
    }
}

/// Blend equation.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BlendFunc {
    Add,
    Subtract,
}

/// Blend factor.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BlendValue {
    One,
    SrcAlpha,
    OneMinusSrcAlpha,
}

/// Which faces are culled when `Feature::CullFace` is enabled.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Face {
    Front,
    Back,
    Both,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub const COUNT: usize = 2;
    pub const ALL: [ShaderStage; 2] = [ShaderStage::Vertex, ShaderStage::Fragment];

    pub(crate) const fn index(self) -> usize {
        match self {
            ShaderStage::Vertex => 0,
            ShaderStage::Fragment => 1,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        }
    }

    /// Entry point every stage source must define.
    pub const fn entry_point(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vs_main",
            ShaderStage::Fragment => "fs_main",
        }
    }
}

/// Primitive assembly mode of a draw.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum Primitive {
    #[default]
    TriangleList,
    TriangleStrip,
    LineList,
    LineStrip,
    PointList,
}

impl Primitive {
    pub const fn is_strip(self) -> bool {
        matches!(self, Primitive::TriangleStrip | Primitive::LineStrip)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum IndexFormat {
    U16,
    U32,
}

impl IndexFormat {
    pub const fn size(self) -> u64 {
        match self {
            IndexFormat::U16 => 2,
            IndexFormat::U32 => 4,
        }
    }
}

/// Cubemap face, in GPU layer order.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum CubeFace {
    PositiveX,
    NegativeX,
    PositiveY,
    NegativeY,
    PositiveZ,
    NegativeZ,
}

impl CubeFace {
    pub const ALL: [CubeFace; 6] = [
        CubeFace::PositiveX,
        CubeFace::NegativeX,
        CubeFace::PositiveY,
        CubeFace::NegativeY,
        CubeFace::PositiveZ,
        CubeFace::NegativeZ,
    ];

    pub const fn layer(self) -> u32 {
        match self {
            CubeFace::PositiveX => 0,
            CubeFace::NegativeX => 1,
            CubeFace::PositiveY => 2,
            CubeFace::NegativeY => 3,
            CubeFace::PositiveZ => 4,
            CubeFace::NegativeZ => 5,
        }
    }
}

/// Kind of sampled texture a program slot expects.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TextureKind {
    D2,
    Cube,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn texel_sizes_follow_channel_width() {
        assert_eq!(InternalFormat::Rgba8.texel_size(), 4);
        assert_eq!(InternalFormat::Rgb16.texel_size(), 6);
        assert_eq!(InternalFormat::Rgba32F.texel_size(), 16);
        assert_eq!(InternalFormat::Depth16.texel_size(), 2);
    }

    #[test]
    fn depth_formats_accept_depth_pixels_only() {
        for f in [InternalFormat::Depth16, InternalFormat::Depth24, InternalFormat::Depth32] {
            assert!(f.is_depth());
            assert_eq!(f.pixel_format(), Format::Depth);
        }
        assert!(!InternalFormat::Rgba8.is_depth());
    }

    #[test]
    fn bgr_layouts_unswizzle_to_rgb() {
        assert_eq!(Format::Bgra.unswizzled(), Some(Format::Rgba));
        assert_eq!(Format::Bgr.unswizzled(), Some(Format::Rgb));
        assert_eq!(Format::Rgba.unswizzled(), None);
    }

    #[test]
    fn cube_faces_cover_all_layers() {
        let layers: Vec<u32> = CubeFace::ALL.iter().map(|f| f.layer()).collect();
        assert_eq!(layers, vec![0, 1, 2, 3, 4, 5]);
    }
}
