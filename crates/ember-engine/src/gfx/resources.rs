//! GPU resource interfaces.
//!
//! Each backend provides one concrete type per trait. Handles are created
//! exclusively through the `GraphicsDevice` factory and own their GPU allocation.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use glam::{Mat4, Vec3, Vec4};

use crate::error::{GraphicsError, Result};
use crate::gfx::caps::{Attachment, CubeFace, Format, InternalFormat, ShaderStage, TextureKind};
use crate::gfx::program::{ProgramState, VertexInput};
use crate::gfx::sync::ResourceSync;
use crate::gfx::uniform::{UniformLayout, UniformValue};

/// Device-unique handle id.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ResourceId(pub u64);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Native display surface plus its rendering context.
pub trait Canvas {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn title(&self) -> &str;

    fn should_close(&self) -> bool;
    fn request_close(&mut self);

    fn aspect_ratio(&self) -> f32 {
        self.width().max(1) as f32 / self.height().max(1) as f32
    }
}

pub trait ShaderProgram {
    fn id(&self) -> ResourceId;
    fn state(&self) -> ProgramState;

    /// Stages a source for `stage`. Replaces a previously staged source.
    fn add_stage(&mut self, stage: ShaderStage, source: &str) -> Result<()>;
    fn set_uniform_layout(&mut self, layout: UniformLayout) -> Result<()>;
    fn add_texture_slot(&mut self, name: &str, kind: TextureKind) -> Result<()>;

    /// Declares a vertex input without binding a buffer; returns its slot.
    fn add_input(&mut self, input: VertexInput) -> Result<u32>;

    fn compile(&mut self) -> Result<()>;
    fn use_program(&mut self) -> Result<()>;

    /// Writes a uniform. Unknown names and writes before compile are ignored.
    fn set_uniform(&mut self, name: &str, value: UniformValue);

    fn set_int(&mut self, name: &str, value: i32) {
        self.set_uniform(name, UniformValue::Int(value));
    }

    fn set_float(&mut self, name: &str, value: f32) {
        self.set_uniform(name, UniformValue::Float(value));
    }

    fn set_vec3(&mut self, name: &str, value: Vec3) {
        self.set_uniform(name, UniformValue::Vec3(value));
    }

    fn set_vec4(&mut self, name: &str, value: Vec4) {
        self.set_uniform(name, UniformValue::Vec4(value));
    }

    fn set_mat4(&mut self, name: &str, value: Mat4) {
        self.set_uniform(name, UniformValue::Mat4(value));
    }
}

/// Resource kinds a compute shader can bind.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ComputeBinding {
    UniformBuffer,
    StorageBuffer { read_only: bool },
    StorageImage { format: InternalFormat },
}

pub trait ComputeShader {
    fn id(&self) -> ResourceId;
    fn set_source(&mut self, source: &str) -> Result<()>;
    fn declare_binding(&mut self, binding: u32, kind: ComputeBinding) -> Result<()>;
    fn compile(&mut self) -> Result<()>;
    fn is_compiled(&self) -> bool;
}

/// Usage a texture is allocated for.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct TextureUsage {
    pub sampled: bool,
    pub storage: bool,
    pub render_target: bool,
}

impl Default for TextureUsage {
    fn default() -> Self {
        Self {
            sampled: true,
            storage: false,
            render_target: false,
        }
    }
}

impl TextureUsage {
    pub const STORAGE: Self = Self {
        sampled: true,
        storage: true,
        render_target: false,
    };

    pub const RENDER_TARGET: Self = Self {
        sampled: true,
        storage: false,
        render_target: true,
    };
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub format: InternalFormat,
    pub usage: TextureUsage,
}

impl TextureDesc {
    pub fn new(width: u32, height: u32, format: InternalFormat) -> Self {
        Self {
            width,
            height,
            format,
            usage: TextureUsage::default(),
        }
    }

    pub fn with_usage(mut self, usage: TextureUsage) -> Self {
        self.usage = usage;
        self
    }

    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.texel_size()
    }
}

pub trait Texture2D {
    fn id(&self) -> ResourceId;
    fn desc(&self) -> Option<&TextureDesc>;

    /// (Re)allocates storage. Contents are undefined until uploaded or written.
    fn allocate(&mut self, desc: TextureDesc) -> Result<()>;

    /// Uploads a full image; `pixels` must match the allocated size and format.
    fn upload(&mut self, format: Format, pixels: &[u8]) -> Result<()>;

    fn sync(&self) -> &Arc<ResourceSync>;

    fn width(&self) -> u32 {
        self.desc().map(|d| d.width).unwrap_or(0)
    }

    fn height(&self) -> u32 {
        self.desc().map(|d| d.height).unwrap_or(0)
    }
}

pub trait Cubemap {
    fn id(&self) -> ResourceId;
    fn size(&self) -> Option<u32>;
    fn allocate(&mut self, size: u32, format: InternalFormat) -> Result<()>;
    fn upload_face(&mut self, face: CubeFace, format: Format, pixels: &[u8]) -> Result<()>;
}

/// Role a buffer was created for.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BufferKind {
    Vertex,
    Uniform,
    Storage,
}

pub trait GpuBuffer {
    fn id(&self) -> ResourceId;
    fn kind(&self) -> BufferKind;

    /// Size of the last upload in bytes.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replaces the buffer contents, growing the allocation when needed.
    fn set_data(&mut self, data: &[u8]) -> Result<()>;
}

pub trait VertexBuffer: GpuBuffer {}
pub trait UniformBuffer: GpuBuffer {}
pub trait ShaderBuffer: GpuBuffer {}

pub trait Framebuffer {
    fn id(&self) -> ResourceId;
    fn size(&self) -> Option<(u32, u32)>;
    fn has_attachment(&self, attachment: Attachment) -> bool;

    fn is_complete(&self) -> bool {
        self.has_attachment(Attachment::Color)
    }
}

/// Checks that `binding` was declared with a kind `accepts` allows.
pub(crate) fn check_compute_binding(
    declared: &BTreeMap<u32, ComputeBinding>,
    binding: u32,
    accepts: impl Fn(&ComputeBinding) -> bool,
) -> Result<()> {
    match declared.get(&binding) {
        Some(kind) if accepts(kind) => Ok(()),
        Some(kind) => Err(GraphicsError::FormatMismatch(format!(
            "compute binding {binding} is declared as {kind:?}"
        ))),
        None => Err(GraphicsError::UnboundResource(format!(
            "compute binding {binding} is not declared"
        ))),
    }
}

/// Normalizes client pixels to the layout `format` stores.
///
/// BGR input is swizzled to RGB; any other channel mismatch is rejected.
pub(crate) fn normalize_pixels<'a>(
    internal: InternalFormat,
    width: u32,
    height: u32,
    format: Format,
    pixels: &'a [u8],
) -> Result<Cow<'a, [u8]>> {
    let expected_layout = internal.pixel_format();
    let swizzle = match format.unswizzled() {
        Some(base) if base == expected_layout => true,
        _ if format == expected_layout => false,
        _ => {
            return Err(GraphicsError::FormatMismatch(format!(
                "{format:?} pixels cannot fill a {internal:?} texture"
            )));
        }
    };

    let expected = width as usize * height as usize * internal.texel_size();
    if pixels.len() != expected {
        return Err(GraphicsError::FormatMismatch(format!(
            "expected {expected} bytes for {width}x{height} {internal:?}, got {}",
            pixels.len()
        )));
    }

    if !swizzle {
        return Ok(Cow::Borrowed(pixels));
    }

    let texel = internal.texel_size();
    let channel = texel / format.channels();
    let mut out = pixels.to_vec();
    for px in out.chunks_exact_mut(texel) {
        let (r, rest) = px.split_at_mut(channel);
        let b = &mut rest[channel..2 * channel];
        r.swap_with_slice(b);
    }
    Ok(Cow::Owned(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bgra_pixels_are_swizzled() {
        let px = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let out = normalize_pixels(InternalFormat::Rgba8, 2, 1, Format::Bgra, &px).unwrap();
        assert_eq!(&out[..], &[3, 2, 1, 4, 7, 6, 5, 8]);
    }

    #[test]
    fn matching_pixels_are_borrowed() {
        let px = [0u8; 16];
        let out = normalize_pixels(InternalFormat::Rgba8, 2, 2, Format::Rgba, &px).unwrap();
        assert!(matches!(out, Cow::Borrowed(_)));
    }

    #[test]
    fn wrong_length_or_layout_is_rejected() {
        let px = [0u8; 15];
        assert!(matches!(
            normalize_pixels(InternalFormat::Rgba8, 2, 2, Format::Rgba, &px),
            Err(GraphicsError::FormatMismatch(_))
        ));
        let px = [0u8; 12];
        assert!(matches!(
            normalize_pixels(InternalFormat::Rgba8, 2, 2, Format::Rgb, &px),
            Err(GraphicsError::FormatMismatch(_))
        ));
    }
}
