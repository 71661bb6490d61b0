use glam::Vec3;

use crate::assets::AssetRef;

/// Surface parameters of the forward shading model.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub color: Vec3,
    pub specular: f32,
    pub shine_exponent: f32,
    pub emissive: Vec3,
    /// Resolved against the scene's textures at draw time.
    pub diffuse_texture: Option<AssetRef>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            color: Vec3::ONE,
            specular: 0.5,
            shine_exponent: 32.0,
            emissive: Vec3::ZERO,
            diffuse_texture: None,
        }
    }
}

impl Material {
    pub fn new(color: Vec3, specular: f32, shine_exponent: f32) -> Self {
        Self {
            color,
            specular,
            shine_exponent,
            ..Self::default()
        }
    }

    pub fn with_diffuse_texture(mut self, texture: AssetRef) -> Self {
        self.diffuse_texture = Some(texture);
        self
    }

    pub fn with_emissive(mut self, emissive: Vec3) -> Self {
        self.emissive = emissive;
        self
    }
}
