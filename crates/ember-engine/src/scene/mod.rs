//! Scene graph consumed by the forward renderer.
//!
//! The scene owns everything a frame needs: materials, meshes, lights, render
//! objects, resolved textures and the active camera. Every table hands out
//! index ids that stay valid forever; removal leaves a tombstone, so a removed
//! id resolves to `None` instead of aliasing a newer entry.

mod camera;
mod light;
mod material;
mod mesh;
mod object;

use std::collections::HashMap;

use glam::Mat4;

use crate::assets::AssetRef;
use crate::error::{GraphicsError, Result};
use crate::gfx::GraphicsDevice;

pub use camera::{Camera, CameraMove};
pub use light::{Light, PointLight, Spotlight};
pub use material::Material;
pub use mesh::{Mesh, MeshSlot};
pub use object::{LightId, MaterialId, MeshId, ObjectId, RenderObject};

pub struct Scene<D: GraphicsDevice> {
    materials: Vec<Option<Material>>,
    meshes: Vec<MeshSlot<D>>,
    objects: Vec<Option<RenderObject>>,
    lights: Vec<Option<Light>>,
    textures: HashMap<AssetRef, D::Texture2D>,
    camera: Camera,
}

impl<D: GraphicsDevice> Default for Scene<D> {
    fn default() -> Self {
        Self::new(Camera::default())
    }
}

impl<D: GraphicsDevice> Scene<D> {
    pub fn new(camera: Camera) -> Self {
        Self {
            materials: Vec::new(),
            meshes: Vec::new(),
            objects: Vec::new(),
            lights: Vec::new(),
            textures: HashMap::new(),
            camera,
        }
    }

    // ── camera ──

    pub fn set_camera(&mut self, camera: Camera) {
        self.camera = camera;
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    // ── materials ──

    pub fn add_material(&mut self, material: Material) -> MaterialId {
        self.materials.push(Some(material));
        MaterialId(self.materials.len() - 1)
    }

    pub fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id.0)?.as_ref()
    }

    pub fn material_mut(&mut self, id: MaterialId) -> Option<&mut Material> {
        self.materials.get_mut(id.0)?.as_mut()
    }

    /// Removes a material no live render object references.
    pub fn remove_material(&mut self, id: MaterialId) -> Result<Material> {
        if self.render_objects().any(|(_, o)| o.material == id) {
            return Err(GraphicsError::MaterialInUse(id.0));
        }
        self.materials
            .get_mut(id.0)
            .and_then(Option::take)
            .ok_or(GraphicsError::InvalidMaterialIndex(id.0))
    }

    // ── meshes ──

    pub fn add_mesh(&mut self, mesh: Mesh<D>) -> MeshId {
        self.meshes.push(MeshSlot::Ready(mesh));
        MeshId(self.meshes.len() - 1)
    }

    /// Reserves an id for a mesh that could not be loaded; objects using it are skipped.
    pub fn add_failed_mesh(&mut self, label: impl Into<String>, reason: impl Into<String>) -> MeshId {
        let label = label.into();
        let reason = reason.into();
        log::warn!("mesh `{label}` unavailable: {reason}");
        self.meshes.push(MeshSlot::Failed { label, reason });
        MeshId(self.meshes.len() - 1)
    }

    pub fn mesh(&self, id: MeshId) -> Option<&Mesh<D>> {
        match self.meshes.get(id.0)? {
            MeshSlot::Ready(mesh) => Some(mesh),
            MeshSlot::Failed { .. } => None,
        }
    }

    pub fn mesh_failure(&self, id: MeshId) -> Option<&str> {
        match self.meshes.get(id.0)? {
            MeshSlot::Failed { reason, .. } => Some(reason),
            MeshSlot::Ready(_) => None,
        }
    }

    // ── render objects ──

    pub fn add_render_object(&mut self, object: RenderObject) -> Result<ObjectId> {
        if self.material(object.material).is_none() {
            return Err(GraphicsError::InvalidMaterialIndex(object.material.0));
        }
        if object.mesh.0 >= self.meshes.len() {
            return Err(GraphicsError::InvalidMeshId(object.mesh.0));
        }
        self.objects.push(Some(object));
        Ok(ObjectId(self.objects.len() - 1))
    }

    pub fn render_object(&self, id: ObjectId) -> Option<&RenderObject> {
        self.objects.get(id.0)?.as_ref()
    }

    fn live_object_mut(&mut self, id: ObjectId) -> Result<&mut RenderObject> {
        self.objects
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(GraphicsError::InvalidObjectId(id.0))
    }

    pub fn set_transform(&mut self, id: ObjectId, transform: Mat4) -> Result<()> {
        self.live_object_mut(id)?.transform = transform;
        Ok(())
    }

    /// Points a live object at another material, checked like `add_render_object`.
    pub fn set_material(&mut self, id: ObjectId, material: MaterialId) -> Result<()> {
        if self.material(material).is_none() {
            return Err(GraphicsError::InvalidMaterialIndex(material.0));
        }
        self.live_object_mut(id)?.material = material;
        Ok(())
    }

    pub fn remove_render_object(&mut self, id: ObjectId) -> Option<RenderObject> {
        self.objects.get_mut(id.0)?.take()
    }

    /// Live objects in insertion order.
    pub fn render_objects(&self) -> impl Iterator<Item = (ObjectId, &RenderObject)> {
        self.objects
            .iter()
            .enumerate()
            .filter_map(|(i, o)| o.as_ref().map(|o| (ObjectId(i), o)))
    }

    pub fn resolve_material(&self, object: &RenderObject) -> Option<&Material> {
        self.material(object.material)
    }

    // ── lights ──

    pub fn add_light(&mut self, light: impl Into<Light>) -> LightId {
        self.lights.push(Some(light.into()));
        LightId(self.lights.len() - 1)
    }

    pub fn light(&self, id: LightId) -> Option<&Light> {
        self.lights.get(id.0)?.as_ref()
    }

    pub fn remove_light(&mut self, id: LightId) -> Option<Light> {
        self.lights.get_mut(id.0)?.take()
    }

    /// Live lights in insertion order.
    pub fn lights(&self) -> impl Iterator<Item = &Light> {
        self.lights.iter().flatten()
    }

    pub fn light_count(&self) -> usize {
        self.lights().count()
    }

    pub fn point_light_count(&self) -> usize {
        self.lights().filter(|l| matches!(l, Light::Point(_))).count()
    }

    pub fn spot_light_count(&self) -> usize {
        self.lights().filter(|l| matches!(l, Light::Spot(_))).count()
    }

    // ── textures ──

    /// Registers the GPU texture backing `asset`, replacing any previous one.
    pub fn add_texture(&mut self, asset: AssetRef, texture: D::Texture2D) {
        self.textures.insert(asset, texture);
    }

    pub fn texture(&self, asset: AssetRef) -> Option<&D::Texture2D> {
        self.textures.get(&asset)
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::assets::MeshData;
    use crate::gfx::recording::RecordingDevice;

    fn scene_with_mesh() -> (RecordingDevice, Scene<RecordingDevice>, MeshId) {
        let mut device = RecordingDevice::create_canvas(640, 480, "scene");
        let mesh = Mesh::upload(&mut device, "tri", &MeshData::triangle()).unwrap();
        let mut scene = Scene::default();
        let id = scene.add_mesh(mesh);
        (device, scene, id)
    }

    #[test]
    fn material_round_trips() {
        let mut scene: Scene<RecordingDevice> = Scene::default();
        let m = Material::new(Vec3::new(0.0, 0.2, 0.2), 0.5, 10.0);
        let id = scene.add_material(m.clone());
        assert_eq!(scene.material(id), Some(&m));
        assert_eq!(scene.material(MaterialId(7)), None);
    }

    #[test]
    fn objects_validate_their_ids() {
        let (_device, mut scene, mesh) = scene_with_mesh();
        let mat = scene.add_material(Material::default());

        assert!(matches!(
            scene.add_render_object(RenderObject::new(mesh, MaterialId(3))),
            Err(GraphicsError::InvalidMaterialIndex(3))
        ));
        assert!(matches!(
            scene.add_render_object(RenderObject::new(MeshId(9), mat)),
            Err(GraphicsError::InvalidMeshId(9))
        ));
        assert!(scene.add_render_object(RenderObject::new(mesh, mat)).is_ok());
    }

    #[test]
    fn shared_material_resolves_identically() {
        let (_device, mut scene, mesh) = scene_with_mesh();
        let mat = scene.add_material(Material::new(Vec3::new(0.7, 0.2, 0.2), 1.0, 10.0));
        let a = scene
            .add_render_object(RenderObject::new(mesh, mat))
            .unwrap();
        let b = scene
            .add_render_object(
                RenderObject::new(mesh, mat).with_transform(Mat4::from_translation(Vec3::X)),
            )
            .unwrap();

        let ma = scene.resolve_material(scene.render_object(a).unwrap()).unwrap();
        let mb = scene.resolve_material(scene.render_object(b).unwrap()).unwrap();
        assert_eq!(ma, mb);
    }

    #[test]
    fn removal_leaves_tombstones() {
        let (_device, mut scene, mesh) = scene_with_mesh();
        let mat = scene.add_material(Material::default());
        let first = scene.add_render_object(RenderObject::new(mesh, mat)).unwrap();
        let second = scene.add_render_object(RenderObject::new(mesh, mat)).unwrap();

        assert!(scene.remove_render_object(first).is_some());
        assert!(scene.remove_render_object(first).is_none());
        assert!(scene.render_object(first).is_none());
        assert!(scene.render_object(second).is_some());

        let ids: Vec<ObjectId> = scene.render_objects().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![second]);

        let third = scene.add_render_object(RenderObject::new(mesh, mat)).unwrap();
        assert_eq!(third, ObjectId(2));
    }

    #[test]
    fn materials_in_use_cannot_be_removed() {
        let (_device, mut scene, mesh) = scene_with_mesh();
        let mat = scene.add_material(Material::default());
        let obj = scene.add_render_object(RenderObject::new(mesh, mat)).unwrap();

        assert!(matches!(scene.remove_material(mat), Err(GraphicsError::MaterialInUse(0))));
        scene.remove_render_object(obj);
        assert!(scene.remove_material(mat).is_ok());
        assert!(scene.material(mat).is_none());
        assert!(matches!(
            scene.remove_material(mat),
            Err(GraphicsError::InvalidMaterialIndex(0))
        ));
    }

    #[test]
    fn object_updates_keep_ids_valid() {
        let (_device, mut scene, mesh) = scene_with_mesh();
        let first = scene.add_material(Material::default());
        let second = scene.add_material(Material::new(Vec3::X, 1.0, 4.0));
        let obj = scene.add_render_object(RenderObject::new(mesh, first)).unwrap();

        let moved = Mat4::from_translation(Vec3::Y);
        scene.set_transform(obj, moved).unwrap();
        assert_eq!(scene.render_object(obj).unwrap().transform, moved);

        assert!(matches!(
            scene.set_material(obj, MaterialId(8)),
            Err(GraphicsError::InvalidMaterialIndex(8))
        ));
        assert_eq!(scene.render_object(obj).unwrap().material, first);

        scene.set_material(obj, second).unwrap();
        assert!(scene.remove_material(first).is_ok());
        assert!(matches!(
            scene.remove_material(second),
            Err(GraphicsError::MaterialInUse(1))
        ));

        scene.remove_render_object(obj);
        assert!(matches!(
            scene.set_transform(obj, Mat4::IDENTITY),
            Err(GraphicsError::InvalidObjectId(0))
        ));
    }

    #[test]
    fn lights_keep_insertion_order() {
        let mut scene: Scene<RecordingDevice> = Scene::default();
        let a = scene.add_light(PointLight::new(Vec3::X, Vec3::ONE));
        scene.add_light(Spotlight::new(Vec3::Y, Vec3::NEG_Y, Vec3::ONE, 0.2, 0.3));
        scene.add_light(PointLight::new(Vec3::Z, Vec3::ONE));

        assert_eq!(scene.light_count(), 3);
        assert_eq!(scene.point_light_count(), 2);
        assert_eq!(scene.spot_light_count(), 1);

        scene.remove_light(a);
        let positions: Vec<Vec3> = scene.lights().map(Light::position).collect();
        assert_eq!(positions, vec![Vec3::Y, Vec3::Z]);
    }

    #[test]
    fn failed_meshes_keep_their_slot() {
        let (_device, mut scene, ready) = scene_with_mesh();
        let failed = scene.add_failed_mesh("pistol", "file not found");
        assert_eq!(failed, MeshId(1));
        assert!(scene.mesh(ready).is_some());
        assert!(scene.mesh(failed).is_none());
        assert_eq!(scene.mesh_failure(failed), Some("file not found"));

        let mat = scene.add_material(Material::default());
        assert!(scene.add_render_object(RenderObject::new(failed, mat)).is_ok());
    }

    #[test]
    fn camera_is_owned_by_the_scene() {
        let mut scene: Scene<RecordingDevice> = Scene::default();
        scene.camera_mut().position = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(scene.camera().position, Vec3::new(1.0, 2.0, 3.0));

        scene.set_camera(Camera::new(Vec3::ZERO, 1.0, 1.0));
        assert_eq!(scene.camera().position, Vec3::ZERO);
    }
}
