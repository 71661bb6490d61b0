//! Forward renderer.
//!
//! One program shades every render object in a single pass. Per frame the
//! renderer uploads the light tables, then walks the live objects in insertion
//! order, writing transforms and material parameters before issuing one draw per
//! object. No sorting, culling or batching takes place.

use crate::error::Result;
use crate::gfx::{
    DrawDesc, GraphicsDevice, IndexFormat, ScalarType, ShaderProgram, ShaderStage, TextureKind,
    UniformLayout, UniformType, VertexInput,
};
use crate::scene::{Light, Material, Mesh, Scene};

pub const MAX_LIGHTS: u32 = 16;
pub const MAX_POINT_LIGHTS: u32 = 16;
pub const MAX_SPOT_LIGHTS: u32 = 8;

/// Texture slot sampled for the material's diffuse color.
pub const DIFFUSE_SLOT: &str = "DiffuseTexture";

const VERTEX_SHADER: &str = include_str!("shaders/forward.vert.wgsl");
const FRAGMENT_SHADER: &str = include_str!("shaders/forward.frag.wgsl");

/// Uniform block shared by both forward stages.
pub fn forward_layout() -> UniformLayout {
    use UniformType::{Float, Int, Mat4, Vec3};

    UniformLayout::new("ForwardUniforms")
        .field("model", Mat4)
        .field("view", Mat4)
        .field("projection", Mat4)
        .field("CameraPosition", Vec3)
        .field("LightsCount", Int)
        .field("PointLightsCount", Int)
        .field("SpotLightsCount", Int)
        .structure(
            "material",
            "MaterialData",
            &[
                ("Color", Vec3),
                ("Specular", Float),
                ("Emissive", Vec3),
                ("ShineExponent", Float),
                ("HasDiffuseTexture", Int),
            ],
        )
        .struct_array(
            "LightsArray",
            "LightData",
            &[("Position", Vec3), ("Color", Vec3)],
            MAX_LIGHTS,
        )
        .struct_array(
            "PointLightsArray",
            "PointLightData",
            &[
                ("Position", Vec3),
                ("Color", Vec3),
                ("Linear", Float),
                ("Quadratic", Float),
                ("Constant", Float),
            ],
            MAX_POINT_LIGHTS,
        )
        .struct_array(
            "SpotLightsArray",
            "SpotLightData",
            &[
                ("Position", Vec3),
                ("Direction", Vec3),
                ("Color", Vec3),
                ("CutOff", Float),
                ("OuterCutOff", Float),
            ],
            MAX_SPOT_LIGHTS,
        )
}

/// What one `update` managed to draw.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct FrameReport {
    pub drawn: usize,
    /// Objects not drawn: unresolved mesh or material, or a failed draw.
    pub skipped: usize,
    /// Objects drawn untextured because their diffuse texture could not be bound.
    pub texture_fallbacks: usize,
}

impl FrameReport {
    fn same_failures(&self, other: &FrameReport) -> bool {
        self.skipped == other.skipped && self.texture_fallbacks == other.texture_fallbacks
    }
}

/// Uniform names of the light arrays, built once instead of formatted per frame.
struct LightNames {
    lights: Vec<[String; 2]>,
    points: Vec<[String; 5]>,
    spots: Vec<[String; 5]>,
}

impl LightNames {
    fn new() -> Self {
        let slot = |array: &str, i: u32, field: &str| format!("{array}[{i}].{field}");
        Self {
            lights: (0..MAX_LIGHTS)
                .map(|i| ["Position", "Color"].map(|f| slot("LightsArray", i, f)))
                .collect(),
            points: (0..MAX_POINT_LIGHTS)
                .map(|i| {
                    ["Position", "Color", "Linear", "Quadratic", "Constant"]
                        .map(|f| slot("PointLightsArray", i, f))
                })
                .collect(),
            spots: (0..MAX_SPOT_LIGHTS)
                .map(|i| {
                    ["Position", "Direction", "Color", "CutOff", "OuterCutOff"]
                        .map(|f| slot("SpotLightsArray", i, f))
                })
                .collect(),
        }
    }
}

pub struct ForwardRenderer<D: GraphicsDevice> {
    program: D::Program,
    names: LightNames,
    warned_capacity: bool,
    program_unusable: bool,
    last_report: FrameReport,
}

impl<D: GraphicsDevice> ForwardRenderer<D> {
    /// Creates and compiles the forward program.
    pub fn initialize(device: &mut D) -> Result<Self> {
        let mut program = device.create_shader_program()?;
        program.add_stage(ShaderStage::Vertex, VERTEX_SHADER)?;
        program.add_stage(ShaderStage::Fragment, FRAGMENT_SHADER)?;
        program.set_uniform_layout(forward_layout())?;
        program.add_texture_slot(DIFFUSE_SLOT, TextureKind::D2)?;
        program.add_input(VertexInput::single(0, 3, ScalarType::Float))?;
        program.add_input(VertexInput::single(1, 3, ScalarType::Float))?;
        program.add_input(VertexInput::single(2, 2, ScalarType::Float))?;
        program.compile()?;

        log::info!("forward renderer ready (program {})", program.id());
        Ok(Self {
            program,
            names: LightNames::new(),
            warned_capacity: false,
            program_unusable: false,
            last_report: FrameReport::default(),
        })
    }

    pub fn program(&self) -> &D::Program {
        &self.program
    }

    /// Shades every live render object of `scene`. Never aborts the frame.
    ///
    /// Per-object failures are counted in the returned report; a warning is
    /// logged only when the counts differ from the previous frame.
    pub fn update(&mut self, device: &mut D, scene: &Scene<D>, _dt: f32) -> FrameReport {
        let mut report = FrameReport::default();
        if let Err(err) = self.program.use_program() {
            if !self.program_unusable {
                log::error!("forward program unusable: {err}");
                self.program_unusable = true;
            }
            return report;
        }
        self.program_unusable = false;

        self.write_lights(scene);

        let view = scene.camera().view_matrix();
        let projection = scene.camera().projection_matrix();
        let camera_position = scene.camera().position;

        let mut first_error: Option<String> = None;
        for (id, object) in scene.render_objects() {
            let (Some(mesh), Some(material)) =
                (scene.mesh(object.mesh), scene.resolve_material(object))
            else {
                report.skipped += 1;
                continue;
            };

            self.program.set_mat4("model", object.transform);
            self.program.set_mat4("view", view);
            self.program.set_mat4("projection", projection);
            self.program.set_vec3("CameraPosition", camera_position);
            if let Err(err) = self.write_material(device, scene, material) {
                report.texture_fallbacks += 1;
                first_error.get_or_insert_with(|| format!("object {}: {err}", id.0));
            }

            match self.draw_mesh(device, mesh) {
                Ok(()) => report.drawn += 1,
                Err(err) => {
                    report.skipped += 1;
                    first_error.get_or_insert_with(|| format!("object {}: {err}", id.0));
                }
            }
        }

        if !report.same_failures(&self.last_report) {
            match &first_error {
                Some(err) => log::warn!(
                    "forward pass: {} skipped, {} untextured ({err})",
                    report.skipped,
                    report.texture_fallbacks
                ),
                None if report.skipped > 0 => {
                    log::warn!("forward pass: {} object(s) skipped", report.skipped)
                }
                None => log::info!("forward pass draws every object again"),
            }
        }
        self.last_report = report;
        report
    }

    fn write_lights(&mut self, scene: &Scene<D>) {
        let total = scene.light_count();
        let points = scene.point_light_count();
        let spots = scene.spot_light_count();

        let over = total > MAX_LIGHTS as usize
            || points > MAX_POINT_LIGHTS as usize
            || spots > MAX_SPOT_LIGHTS as usize;
        if over && !self.warned_capacity {
            log::warn!(
                "scene has {total} lights ({points} point, {spots} spot); extra lights are ignored"
            );
            self.warned_capacity = true;
        }

        let program = &mut self.program;
        program.set_int("LightsCount", total.min(MAX_LIGHTS as usize) as i32);
        program.set_int("PointLightsCount", points.min(MAX_POINT_LIGHTS as usize) as i32);
        program.set_int("SpotLightsCount", spots.min(MAX_SPOT_LIGHTS as usize) as i32);

        let (mut j, mut k) = (0usize, 0usize);
        for (i, light) in scene.lights().enumerate() {
            if let Some([position, color]) = self.names.lights.get(i) {
                program.set_vec3(position, light.position());
                program.set_vec3(color, light.color());
            }
            match light {
                Light::Point(p) => {
                    if let Some([position, color, linear, quadratic, constant]) =
                        self.names.points.get(j)
                    {
                        program.set_vec3(position, p.position);
                        program.set_vec3(color, p.color);
                        program.set_float(linear, p.linear);
                        program.set_float(quadratic, p.quadratic);
                        program.set_float(constant, p.constant);
                    }
                    j += 1;
                }
                Light::Spot(s) => {
                    if let Some([position, direction, color, cut_off, outer]) =
                        self.names.spots.get(k)
                    {
                        program.set_vec3(position, s.position);
                        program.set_vec3(direction, s.direction);
                        program.set_vec3(color, s.color);
                        program.set_float(cut_off, s.cut_off.cos());
                        program.set_float(outer, s.outer_cut_off.cos());
                    }
                    k += 1;
                }
            }
        }
    }

    /// Writes material uniforms and binds the diffuse texture. A texture that
    /// fails to bind is replaced by the untextured path and the error returned.
    fn write_material(&mut self, device: &mut D, scene: &Scene<D>, material: &Material) -> Result<()> {
        self.program.set_vec3("material.Color", material.color);
        self.program.set_float("material.Specular", material.specular);
        self.program.set_float("material.ShineExponent", material.shine_exponent);
        self.program.set_vec3("material.Emissive", material.emissive);

        let texture = material
            .diffuse_texture
            .and_then(|asset| scene.texture(asset));
        let bound = match texture {
            Some(texture) => device
                .set_program_texture(&mut self.program, DIFFUSE_SLOT, texture)
                .map(|()| true),
            None => Ok(false),
        };
        let has_texture = matches!(bound, Ok(true));
        if !has_texture {
            device.unbind_program_texture(&mut self.program, DIFFUSE_SLOT);
        }
        self.program.set_int("material.HasDiffuseTexture", i32::from(has_texture));
        bound.map(|_| ())
    }

    fn draw_mesh(&self, device: &mut D, mesh: &Mesh<D>) -> Result<()> {
        let buffers = [&mesh.positions, &mesh.normals, &mesh.uvs];
        let mut desc = DrawDesc::triangles(mesh.vertex_count).with_vertex_buffers(&buffers);
        if let Some((indices, count)) = &mesh.index {
            desc = desc.with_index(indices, IndexFormat::U32, *count);
        }
        device.draw(&self.program, &desc)
    }
}

#[cfg(test)]
mod tests {
    use glam::{Mat4, Vec3};

    use super::*;
    use crate::assets::MeshData;
    use crate::gfx::recording::{Command, RecordingDevice};
    use crate::gfx::{InternalFormat, Texture2D, TextureDesc, UniformValue};
    use crate::scene::{MaterialId, MeshId, PointLight, RenderObject, Spotlight};

    fn setup() -> (RecordingDevice, ForwardRenderer<RecordingDevice>, Scene<RecordingDevice>) {
        let mut device = RecordingDevice::create_canvas(800, 600, "forward");
        let renderer = ForwardRenderer::initialize(&mut device).unwrap();
        (device, renderer, Scene::default())
    }

    fn add_triangle(device: &mut RecordingDevice, scene: &mut Scene<RecordingDevice>) -> MeshId {
        let mesh = Mesh::upload(device, "triangle", &MeshData::triangle()).unwrap();
        scene.add_mesh(mesh)
    }

    fn frame(
        device: &mut RecordingDevice,
        renderer: &mut ForwardRenderer<RecordingDevice>,
        scene: &Scene<RecordingDevice>,
    ) -> FrameReport {
        device.take_commands();
        device.begin_frame().unwrap();
        let report = renderer.update(device, scene, 0.016);
        device.end_frame().unwrap();
        report
    }

    #[test]
    fn single_point_light_and_triangle() {
        let (mut device, mut renderer, mut scene) = setup();
        scene.add_light(PointLight::new(Vec3::new(1.2, 1.0, 2.0), Vec3::ONE));
        let mesh = add_triangle(&mut device, &mut scene);
        let mat = scene.add_material(Material::default());
        scene.add_render_object(RenderObject::new(mesh, mat)).unwrap();

        let report = frame(&mut device, &mut renderer, &scene);
        assert_eq!(report, FrameReport { drawn: 1, ..FrameReport::default() });

        let draws = device.draws();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].vertex_count, 3);
        assert_eq!(draws[0].index_count, None);
        assert_eq!(device.last_uniform("LightsCount"), Some(UniformValue::Int(1)));
        assert_eq!(device.last_uniform("PointLightsCount"), Some(UniformValue::Int(1)));
        assert_eq!(
            device.last_uniform("LightsArray[0].Position"),
            Some(UniformValue::Vec3(Vec3::new(1.2, 1.0, 2.0)))
        );
        assert_eq!(
            device.last_uniform("PointLightsArray[0].Position"),
            Some(UniformValue::Vec3(Vec3::new(1.2, 1.0, 2.0)))
        );
        assert_eq!(
            device.last_uniform("PointLightsArray[0].Linear"),
            Some(UniformValue::Float(0.09))
        );
    }

    #[test]
    fn light_slots_follow_insertion_order() {
        let (mut device, mut renderer, mut scene) = setup();
        let positions = [Vec3::X, Vec3::Y, Vec3::Z, Vec3::NEG_X];
        scene.add_light(PointLight::new(positions[0], Vec3::ONE));
        scene.add_light(Spotlight::new(positions[1], Vec3::NEG_Y, Vec3::ONE, 0.2, 0.3));
        scene.add_light(PointLight::new(positions[2], Vec3::ONE));
        scene.add_light(Spotlight::new(positions[3], Vec3::NEG_Y, Vec3::ONE, 0.2, 0.3));

        frame(&mut device, &mut renderer, &scene);

        for (i, p) in positions.iter().enumerate() {
            assert_eq!(
                device.last_uniform(&format!("LightsArray[{i}].Position")),
                Some(UniformValue::Vec3(*p))
            );
        }
        assert_eq!(
            device.last_uniform("PointLightsArray[1].Position"),
            Some(UniformValue::Vec3(Vec3::Z))
        );
        assert_eq!(
            device.last_uniform("SpotLightsArray[1].Position"),
            Some(UniformValue::Vec3(Vec3::NEG_X))
        );
        assert_eq!(device.last_uniform("SpotLightsCount"), Some(UniformValue::Int(2)));
        assert_eq!(
            device.last_uniform("SpotLightsArray[0].CutOff"),
            Some(UniformValue::Float(0.2f32.cos()))
        );
    }

    #[test]
    fn each_draw_follows_its_own_model_write() {
        let (mut device, mut renderer, mut scene) = setup();
        let mesh = add_triangle(&mut device, &mut scene);
        let mat = scene.add_material(Material::default());
        let a = Mat4::from_translation(Vec3::new(-1.0, 0.0, 0.0));
        let b = Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0));
        scene.add_render_object(RenderObject::new(mesh, mat).with_transform(a)).unwrap();
        scene.add_render_object(RenderObject::new(mesh, mat).with_transform(b)).unwrap();

        frame(&mut device, &mut renderer, &scene);

        let mut last_model = None;
        let mut models_at_draw = Vec::new();
        for cmd in device.commands() {
            match cmd {
                Command::SetUniform { name, value, .. } if name == "model" => {
                    last_model = Some(value);
                }
                Command::Draw(_) => models_at_draw.push(last_model.take()),
                _ => {}
            }
        }
        assert_eq!(
            models_at_draw,
            vec![Some(UniformValue::Mat4(a)), Some(UniformValue::Mat4(b))]
        );
    }

    #[test]
    fn uniforms_precede_the_draw_in_order() {
        let (mut device, mut renderer, mut scene) = setup();
        scene.add_light(PointLight::new(Vec3::ONE, Vec3::ONE));
        let mesh = add_triangle(&mut device, &mut scene);
        let mat = scene.add_material(Material::default());
        scene.add_render_object(RenderObject::new(mesh, mat)).unwrap();

        frame(&mut device, &mut renderer, &scene);

        let names: Vec<String> = device.uniform_writes().into_iter().map(|(n, _)| n).collect();
        let pos = |n: &str| names.iter().position(|x| x == n).unwrap();
        assert!(pos("LightsCount") < pos("PointLightsCount"));
        assert!(pos("PointLightsCount") < pos("SpotLightsCount"));
        assert!(pos("SpotLightsCount") < pos("LightsArray[0].Position"));
        assert!(pos("LightsArray[0].Color") < pos("PointLightsArray[0].Position"));
        assert!(pos("PointLightsArray[0].Constant") < pos("model"));
        assert!(pos("model") < pos("view"));
        assert!(pos("projection") < pos("CameraPosition"));
        assert!(pos("CameraPosition") < pos("material.Color"));
        assert_eq!(names.last().map(String::as_str), Some("material.HasDiffuseTexture"));

        let commands = device.commands();
        assert!(matches!(commands[2], Command::UseProgram(_)));
        assert!(matches!(commands[commands.len() - 2], Command::Draw(_)));
    }

    #[test]
    fn objects_with_failed_meshes_are_skipped() {
        let (mut device, mut renderer, mut scene) = setup();
        let good = add_triangle(&mut device, &mut scene);
        let bad = scene.add_failed_mesh("pistol", "missing file");
        let mat = scene.add_material(Material::default());
        scene.add_render_object(RenderObject::new(bad, mat)).unwrap();
        scene.add_render_object(RenderObject::new(good, mat)).unwrap();

        let report = frame(&mut device, &mut renderer, &scene);
        assert_eq!(report, FrameReport { drawn: 1, skipped: 1, texture_fallbacks: 0 });
        assert_eq!(device.draws().len(), 1);
    }

    #[test]
    fn shared_material_writes_identical_values() {
        let (mut device, mut renderer, mut scene) = setup();
        let mesh = add_triangle(&mut device, &mut scene);
        let mat = scene.add_material(Material::new(Vec3::new(0.7, 0.2, 0.2), 1.0, 10.0));
        scene.add_render_object(RenderObject::new(mesh, mat)).unwrap();
        scene
            .add_render_object(
                RenderObject::new(mesh, mat).with_transform(Mat4::from_scale(Vec3::splat(2.0))),
            )
            .unwrap();

        frame(&mut device, &mut renderer, &scene);

        let colors: Vec<UniformValue> = device
            .uniform_writes()
            .into_iter()
            .filter(|(n, _)| n == "material.Color")
            .map(|(_, v)| v)
            .collect();
        assert_eq!(colors.len(), 2);
        assert_eq!(colors[0], colors[1]);
        assert_eq!(colors[0], UniformValue::Vec3(Vec3::new(0.7, 0.2, 0.2)));
    }

    #[test]
    fn diffuse_texture_is_bound_when_resolved() {
        let (mut device, mut renderer, mut scene) = setup();
        let mesh = add_triangle(&mut device, &mut scene);

        let asset = crate::assets::AssetRef(4);
        let mut texture = device.create_texture2d().unwrap();
        texture.allocate(TextureDesc::new(1, 1, InternalFormat::Rgba8)).unwrap();
        let texture_id = texture.id();
        scene.add_texture(asset, texture);

        let textured = scene.add_material(Material::default().with_diffuse_texture(asset));
        let missing =
            scene.add_material(Material::default().with_diffuse_texture(crate::assets::AssetRef(9)));
        scene.add_render_object(RenderObject::new(mesh, textured)).unwrap();
        scene.add_render_object(RenderObject::new(mesh, missing)).unwrap();

        let report = frame(&mut device, &mut renderer, &scene);
        assert_eq!(report.drawn, 2);

        let binds: Vec<Option<crate::gfx::ResourceId>> = device
            .commands()
            .into_iter()
            .filter_map(|c| match c {
                Command::BindTexture { texture, .. } => Some(texture),
                _ => None,
            })
            .collect();
        assert_eq!(binds, vec![Some(texture_id), None]);

        let flags: Vec<UniformValue> = device
            .uniform_writes()
            .into_iter()
            .filter(|(n, _)| n == "material.HasDiffuseTexture")
            .map(|(_, v)| v)
            .collect();
        assert_eq!(flags, vec![UniformValue::Int(1), UniformValue::Int(0)]);
    }

    #[test]
    fn unsynchronized_diffuse_textures_are_counted_every_frame() {
        use crate::gfx::{ComputeBinding, ComputeShader, TextureUsage};

        let (mut device, mut renderer, mut scene) = setup();
        let mesh = add_triangle(&mut device, &mut scene);

        let mut texture = device.create_texture2d().unwrap();
        texture
            .allocate(TextureDesc::new(4, 4, InternalFormat::Rgba8).with_usage(TextureUsage::STORAGE))
            .unwrap();
        let mut cs = device.create_compute_shader().unwrap();
        cs.set_source("fn cs_main() {}").unwrap();
        cs.declare_binding(0, ComputeBinding::StorageImage { format: InternalFormat::Rgba8 })
            .unwrap();
        cs.compile().unwrap();
        device.bind_compute_image(&mut cs, 0, &texture).unwrap();
        // Never passed to memory_barrier: the texture stays unreadable.
        let _fence = device.dispatch_compute(&mut cs, [1, 1, 1]).unwrap();

        let asset = crate::assets::AssetRef(1);
        scene.add_texture(asset, texture);
        let mat = scene.add_material(Material::default().with_diffuse_texture(asset));
        for _ in 0..3 {
            scene.add_render_object(RenderObject::new(mesh, mat)).unwrap();
        }

        for _ in 0..5 {
            let report = frame(&mut device, &mut renderer, &scene);
            assert_eq!(
                report,
                FrameReport { drawn: 3, skipped: 0, texture_fallbacks: 3 }
            );
            let flags: Vec<UniformValue> = device
                .uniform_writes()
                .into_iter()
                .filter(|(n, _)| n == "material.HasDiffuseTexture")
                .map(|(_, v)| v)
                .collect();
            assert_eq!(flags, vec![UniformValue::Int(0); 3]);
        }
        assert_eq!(renderer.last_report.texture_fallbacks, 3);
    }

    #[test]
    fn light_counts_are_clamped() {
        let (mut device, mut renderer, mut scene) = setup();
        for i in 0..(MAX_SPOT_LIGHTS + 2) {
            scene.add_light(Spotlight::new(
                Vec3::new(i as f32, 0.0, 0.0),
                Vec3::NEG_Y,
                Vec3::ONE,
                0.2,
                0.3,
            ));
        }
        frame(&mut device, &mut renderer, &scene);
        assert_eq!(
            device.last_uniform("SpotLightsCount"),
            Some(UniformValue::Int(MAX_SPOT_LIGHTS as i32))
        );
        assert_eq!(
            device.last_uniform("LightsCount"),
            Some(UniformValue::Int(MAX_SPOT_LIGHTS as i32 + 2))
        );
    }

    #[test]
    fn material_ids_must_be_live() {
        let (mut device, _renderer, mut scene) = setup();
        let mesh = add_triangle(&mut device, &mut scene);
        assert!(scene.add_render_object(RenderObject::new(mesh, MaterialId(0))).is_err());
    }
}
