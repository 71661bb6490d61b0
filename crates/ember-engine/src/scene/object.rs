use glam::Mat4;

/// Index of a material in its scene.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct MaterialId(pub usize);

/// Index of a mesh slot in its scene.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct MeshId(pub usize);

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ObjectId(pub usize);

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct LightId(pub usize);

/// One drawable instance: a mesh placed in the world with a material.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RenderObject {
    pub mesh: MeshId,
    pub transform: Mat4,
    pub material: MaterialId,
}

impl RenderObject {
    pub fn new(mesh: MeshId, material: MaterialId) -> Self {
        Self {
            mesh,
            transform: Mat4::IDENTITY,
            material,
        }
    }

    pub fn with_transform(mut self, transform: Mat4) -> Self {
        self.transform = transform;
        self
    }
}
