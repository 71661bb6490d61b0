//! Portable enum → wgpu lookup tables.
//!
//! Values without a wgpu counterpart are rejected with `UnsupportedEnumValue`.

use crate::error::{GraphicsError, Result};
use crate::gfx::caps::{
    BlendFunc, BlendValue, Face, IndexFormat, InternalFormat, Primitive, ScalarType,
};
use crate::gfx::device::BlendSettings;

pub fn blend_operation(func: BlendFunc) -> wgpu::BlendOperation {
    match func {
        BlendFunc::Add => wgpu::BlendOperation::Add,
        BlendFunc::Subtract => wgpu::BlendOperation::Subtract,
    }
}

pub fn blend_factor(value: BlendValue) -> wgpu::BlendFactor {
    match value {
        BlendValue::One => wgpu::BlendFactor::One,
        BlendValue::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
        BlendValue::OneMinusSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
    }
}

pub fn blend_state(settings: BlendSettings) -> wgpu::BlendState {
    let component = wgpu::BlendComponent {
        src_factor: blend_factor(settings.src),
        dst_factor: blend_factor(settings.dst),
        operation: blend_operation(settings.func),
    };
    wgpu::BlendState {
        color: component,
        alpha: component,
    }
}

/// wgpu culls a single face per pipeline; `Face::Both` has no equivalent.
pub fn cull_face(face: Face) -> Result<wgpu::Face> {
    match face {
        Face::Front => Ok(wgpu::Face::Front),
        Face::Back => Ok(wgpu::Face::Back),
        Face::Both => Err(GraphicsError::unsupported("Face", face)),
    }
}

pub fn texture_format(format: InternalFormat) -> Result<wgpu::TextureFormat> {
    match format {
        InternalFormat::Rgba8 => Ok(wgpu::TextureFormat::Rgba8Unorm),
        InternalFormat::Rgba16F => Ok(wgpu::TextureFormat::Rgba16Float),
        InternalFormat::Rgba32F => Ok(wgpu::TextureFormat::Rgba32Float),
        InternalFormat::Depth16 => Ok(wgpu::TextureFormat::Depth16Unorm),
        InternalFormat::Depth24 => Ok(wgpu::TextureFormat::Depth24Plus),
        InternalFormat::Depth32 => Ok(wgpu::TextureFormat::Depth32Float),
        // 16-bit normalized formats need an optional device feature.
        InternalFormat::Rgb8 | InternalFormat::Rgb16 | InternalFormat::Rgba16 => {
            Err(GraphicsError::unsupported("InternalFormat", format))
        }
    }
}

/// WGSL texel format name used in `texture_storage_2d` declarations.
pub fn storage_texel_format(format: InternalFormat) -> Result<&'static str> {
    match format {
        InternalFormat::Rgba8 => Ok("rgba8unorm"),
        InternalFormat::Rgba16F => Ok("rgba16float"),
        InternalFormat::Rgba32F => Ok("rgba32float"),
        _ => Err(GraphicsError::unsupported("storage texture format", format)),
    }
}

pub fn vertex_format(components: u8, scalar: ScalarType) -> Result<wgpu::VertexFormat> {
    use wgpu::VertexFormat as F;

    let format = match (scalar, components) {
        (ScalarType::Float, 1) => F::Float32,
        (ScalarType::Float, 2) => F::Float32x2,
        (ScalarType::Float, 3) => F::Float32x3,
        (ScalarType::Float, 4) => F::Float32x4,
        (ScalarType::Uint, 1) => F::Uint32,
        (ScalarType::Uint, 2) => F::Uint32x2,
        (ScalarType::Uint, 3) => F::Uint32x3,
        (ScalarType::Uint, 4) => F::Uint32x4,
        (ScalarType::Ubyte, 2) => F::Unorm8x2,
        (ScalarType::Ubyte, 4) => F::Unorm8x4,
        _ => {
            return Err(GraphicsError::unsupported(
                "vertex attribute",
                format!("{components}x{scalar:?}"),
            ));
        }
    };
    Ok(format)
}

pub fn primitive_topology(primitive: Primitive) -> wgpu::PrimitiveTopology {
    match primitive {
        Primitive::TriangleList => wgpu::PrimitiveTopology::TriangleList,
        Primitive::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
        Primitive::LineList => wgpu::PrimitiveTopology::LineList,
        Primitive::LineStrip => wgpu::PrimitiveTopology::LineStrip,
        Primitive::PointList => wgpu::PrimitiveTopology::PointList,
    }
}

pub fn index_format(format: IndexFormat) -> wgpu::IndexFormat {
    match format {
        IndexFormat::U16 => wgpu::IndexFormat::Uint16,
        IndexFormat::U32 => wgpu::IndexFormat::Uint32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_faces_cannot_be_culled() {
        assert_eq!(cull_face(Face::Back).unwrap(), wgpu::Face::Back);
        assert!(matches!(
            cull_face(Face::Both),
            Err(GraphicsError::UnsupportedEnumValue { kind: "Face", .. })
        ));
    }

    #[test]
    fn three_channel_formats_are_unsupported() {
        assert!(texture_format(InternalFormat::Rgb8).is_err());
        assert!(texture_format(InternalFormat::Rgb16).is_err());
        assert!(texture_format(InternalFormat::Rgba16).is_err());
        assert_eq!(
            texture_format(InternalFormat::Depth32).unwrap(),
            wgpu::TextureFormat::Depth32Float
        );
    }

    #[test]
    fn vertex_formats_cover_float_vectors() {
        assert_eq!(
            vertex_format(3, ScalarType::Float).unwrap(),
            wgpu::VertexFormat::Float32x3
        );
        assert_eq!(
            vertex_format(4, ScalarType::Ubyte).unwrap(),
            wgpu::VertexFormat::Unorm8x4
        );
        assert!(vertex_format(3, ScalarType::Ubyte).is_err());
        assert!(vertex_format(5, ScalarType::Float).is_err());
    }

    #[test]
    fn default_blend_is_straight_alpha() {
        let state = blend_state(BlendSettings::default());
        assert_eq!(state.color, wgpu::BlendState::ALPHA_BLENDING.color);
    }
}
