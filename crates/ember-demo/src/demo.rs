use std::f32::consts::PI;
use std::time::Duration;

use anyhow::{Context, Result};
use glam::{Mat4, Vec2, Vec3};

use ember_engine::app::{App, AppControl, FrameCtx, StartCtx};
use ember_engine::assets::{AssetManager, AssetRef, MeshData, TextureData};
use ember_engine::config::EngineConfig;
use ember_engine::gfx::wgpu_backend::{WgpuDevice, WgpuTexture2D};
use ember_engine::gfx::{Format, GraphicsDevice, InternalFormat, Texture2D, TextureDesc};
use ember_engine::input::{Axis, AxisBindings, Key};
use ember_engine::render::ForwardRenderer;
use ember_engine::scene::{
    Camera, CameraMove, Material, Mesh, PointLight, RenderObject, Scene, Spotlight,
};
use ember_engine::time::Stopwatch;

use crate::pattern::FloorPattern;

const PISTOL_MESH: &str = "meshes/pistol/pistol.obj";
const PISTOL_TEXTURE: &str = "meshes/pistol/textures/handgun_C.jpg";
const FLOOR_TEXTURE: &str = "generated/floor_pattern";

const STATS_INTERVAL: Duration = Duration::from_secs(5);

struct Refs {
    pistol_mesh: AssetRef,
    pistol_texture: AssetRef,
    floor_texture: AssetRef,
}

pub struct Demo {
    config: EngineConfig,
    bindings: AxisBindings,
    assets: AssetManager,
    scene: Scene<WgpuDevice>,
    renderer: Option<ForwardRenderer<WgpuDevice>>,
    stats: Stopwatch,
}

impl Demo {
    pub fn new(config: EngineConfig) -> Self {
        let assets = AssetManager::new(config.assets_root.clone());
        Self {
            config,
            bindings: AxisBindings::default(),
            assets,
            scene: Scene::default(),
            renderer: None,
            stats: Stopwatch::start(),
        }
    }

    fn load_assets(&mut self) -> Refs {
        let refs = Refs {
            pistol_mesh: self.assets.require_asset_ref(PISTOL_MESH),
            pistol_texture: self.assets.require_asset_ref(PISTOL_TEXTURE),
            floor_texture: self
                .assets
                .insert_image(FLOOR_TEXTURE, TextureData::solid(1, 1, [0, 51, 51, 255])),
        };

        let report = self.assets.load();
        log::info!(
            "assets loaded in {:.2} ms ({} ok, {} failed)",
            report.elapsed.as_secs_f64() * 1000.0,
            report.loaded,
            report.failed.len()
        );
        refs
    }

    fn upload_image(&self, device: &mut WgpuDevice, asset: AssetRef) -> Result<WgpuTexture2D> {
        let image = self.assets.image(asset)?;
        let mut texture = device.create_texture2d()?;
        texture.allocate(TextureDesc::new(image.width, image.height, InternalFormat::Rgba8))?;
        texture.upload(Format::Rgba, &image.pixels)?;
        Ok(texture)
    }

    fn build_scene(&mut self, device: &mut WgpuDevice, refs: &Refs) -> Result<()> {
        let mut camera = Camera::default();
        self.config.apply_to_camera(&mut camera);
        let size = device.gpu().size();
        camera.set_aspect(size.width, size.height);
        self.scene.set_camera(camera);

        // Floor: generated on the GPU, falls back to the flat CPU copy.
        let floor_texture = match FloorPattern::default().generate(device) {
            Ok(texture) => texture,
            Err(err) => {
                log::warn!("floor pattern unavailable, using flat color: {err}");
                self.upload_image(device, refs.floor_texture)?
            }
        };
        self.scene.add_texture(refs.floor_texture, floor_texture);

        let floor_material = self.scene.add_material(
            Material::new(Vec3::new(0.0, 0.2, 0.2), 0.5, 10.0)
                .with_diffuse_texture(refs.floor_texture),
        );

        let mut pistol_material = Material::new(Vec3::new(0.7, 0.2, 0.2), 1.0, 10.0);
        match self.upload_image(device, refs.pistol_texture) {
            Ok(texture) => {
                self.scene.add_texture(refs.pistol_texture, texture);
                pistol_material = pistol_material.with_diffuse_texture(refs.pistol_texture);
            }
            Err(err) => log::warn!("pistol texture unavailable: {err:#}"),
        }
        let pistol_material = self.scene.add_material(pistol_material);

        let pistol_mesh = match self.assets.mesh(refs.pistol_mesh) {
            Ok(data) => Mesh::upload(device, PISTOL_MESH, data)?,
            Err(err) => {
                log::warn!("pistol mesh unavailable, drawing a cube instead: {err}");
                Mesh::upload(device, "pistol fallback", &MeshData::cube())?
            }
        };
        let pistol_mesh = self.scene.add_mesh(pistol_mesh);
        let floor_mesh = self
            .scene
            .add_mesh(Mesh::upload(device, "floor", &MeshData::cube())?);

        self.scene
            .add_render_object(RenderObject::new(pistol_mesh, pistol_material))?;
        self.scene.add_render_object(
            RenderObject::new(floor_mesh, floor_material).with_transform(
                Mat4::from_translation(Vec3::new(0.0, -2.0, 0.0))
                    * Mat4::from_scale(Vec3::new(5.0, 1.0, 5.0)),
            ),
        )?;

        self.scene
            .add_light(PointLight::new(Vec3::new(1.2, 1.0, 2.0), Vec3::ONE));
        self.scene.add_light(Spotlight::new(
            Vec3::new(0.0, 10.0, 0.0),
            Vec3::NEG_Y,
            Vec3::ONE,
            PI / 12.0,
            PI / 15.0,
        ));
        Ok(())
    }

    fn drive_camera(&mut self, ctx: &FrameCtx<'_>) {
        let dt = ctx.time.dt;
        let camera = self.scene.camera_mut();

        for axis in Axis::ALL {
            let value = self.bindings.value(ctx.input, axis);
            if value != 0.0 {
                camera.move_by(camera_move(axis), value, dt);
            }
        }

        let delta = ctx.input_frame.mouse_delta;
        if delta != Vec2::ZERO {
            camera.rotate(delta.x, delta.y);
        }
    }
}

fn camera_move(axis: Axis) -> CameraMove {
    match axis {
        Axis::MoveForward => CameraMove::Forward,
        Axis::MoveRight => CameraMove::Right,
        Axis::MoveUp => CameraMove::Up,
    }
}

impl App for Demo {
    fn on_start(&mut self, ctx: &mut StartCtx<'_>) -> Result<()> {
        let refs = self.load_assets();

        self.build_scene(ctx.device, &refs)
            .context("failed to build the demo scene")?;
        self.renderer = Some(
            ForwardRenderer::initialize(ctx.device).context("forward renderer unavailable")?,
        );

        log::info!(
            "scene: {} lights ({} point, {} spot)",
            self.scene.light_count(),
            self.scene.point_light_count(),
            self.scene.spot_light_count()
        );
        Ok(())
    }

    fn on_resize(&mut self, width: u32, height: u32) {
        self.scene.camera_mut().set_aspect(width, height);
    }

    fn on_frame(&mut self, ctx: &mut FrameCtx<'_>) -> AppControl {
        if ctx.input_frame.pressed(Key::Escape) {
            return AppControl::Exit;
        }

        self.drive_camera(ctx);

        let Some(renderer) = self.renderer.as_mut() else {
            return AppControl::Exit;
        };
        let report = renderer.update(ctx.device, &self.scene, ctx.time.dt);

        if self.stats.elapsed() >= STATS_INTERVAL {
            self.stats.lap();
            log::info!(
                "frame {}: {:.0} fps, {} drawn, {} skipped, {} untextured",
                ctx.time.frame_index,
                ctx.time.fps,
                report.drawn,
                report.skipped,
                report.texture_fallbacks
            );
        }
        AppControl::Continue
    }
}
