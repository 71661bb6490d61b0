use std::cell::RefCell;
use std::rc::Rc;

use glam::{IVec2, Vec4};

use crate::error::{GraphicsError, Result};
use crate::gfx::caps::{Attachment, BlendFunc, BlendValue, Face, Feature, TextureKind};
use crate::gfx::device::{BlendSettings, DeviceState, DrawDesc, GraphicsDevice, Viewport};
use crate::gfx::program::VertexInput;
use crate::gfx::resources::{
    BufferKind, ComputeBinding, ComputeShader, Cubemap, Framebuffer, GpuBuffer, ResourceId,
    ShaderProgram, Texture2D, check_compute_binding,
};
use crate::gfx::sync::ComputeFence;
use crate::gfx::uniform::UniformValue;

use super::commands::{Command, CommandLog, DrawRecord};
use super::resources::{
    AttachedTexture, ComputeBound, RecordingBuffer, RecordingCanvas, RecordingCompute,
    RecordingCubemap, RecordingFramebuffer, RecordingProgram, RecordingTexture,
};

/// Device that records commands instead of executing them.
#[derive(Debug)]
pub struct RecordingDevice {
    canvas: RecordingCanvas,
    log: CommandLog,
    state: DeviceState,
    next_id: u64,
    next_fence: u64,
    frame_active: bool,
}

impl RecordingDevice {
    /// Creates the device together with its canvas.
    pub fn create_canvas(width: u32, height: u32, title: &str) -> Self {
        Self {
            canvas: RecordingCanvas::new(width, height, title),
            log: Rc::new(RefCell::new(Vec::new())),
            state: DeviceState::default(),
            next_id: 1,
            next_fence: 1,
            frame_active: false,
        }
    }

    pub fn commands(&self) -> Vec<Command> {
        self.log.borrow().clone()
    }

    pub fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut *self.log.borrow_mut())
    }

    pub fn draws(&self) -> Vec<DrawRecord> {
        self.log
            .borrow()
            .iter()
            .filter_map(|c| match c {
                Command::Draw(d) => Some(d.clone()),
                _ => None,
            })
            .collect()
    }

    /// Every uniform write, in order.
    pub fn uniform_writes(&self) -> Vec<(String, UniformValue)> {
        self.log
            .borrow()
            .iter()
            .filter_map(|c| match c {
                Command::SetUniform { name, value, .. } => Some((name.clone(), *value)),
                _ => None,
            })
            .collect()
    }

    pub fn last_uniform(&self, name: &str) -> Option<UniformValue> {
        self.log.borrow().iter().rev().find_map(|c| match c {
            Command::SetUniform { name: n, value, .. } if n == name => Some(*value),
            _ => None,
        })
    }

    pub fn is_frame_active(&self) -> bool {
        self.frame_active
    }

    fn allocate_id(&mut self) -> ResourceId {
        let id = ResourceId(self.next_id);
        self.next_id += 1;
        id
    }

    fn record(&self, cmd: Command) {
        self.log.borrow_mut().push(cmd);
    }

    fn resolve_vertex_buffers(
        program: &RecordingProgram,
        desc: &DrawDesc<'_, RecordingBuffer>,
    ) -> Result<Vec<ResourceId>> {
        let expected = program.staged().inputs().len();

        if !desc.vertex_buffers.is_empty() {
            if desc.vertex_buffers.len() != expected {
                return Err(GraphicsError::UnboundResource(format!(
                    "vertex buffers: program declares {expected}, draw supplied {}",
                    desc.vertex_buffers.len()
                )));
            }
            return Ok(desc.vertex_buffers.iter().map(|b| b.id()).collect());
        }

        program
            .bound_inputs
            .iter()
            .enumerate()
            .map(|(slot, b)| {
                b.ok_or_else(|| GraphicsError::UnboundResource(format!("vertex input {slot}")))
            })
            .collect()
    }
}

impl GraphicsDevice for RecordingDevice {
    type Canvas = RecordingCanvas;
    type Program = RecordingProgram;
    type Compute = RecordingCompute;
    type Texture2D = RecordingTexture;
    type Cubemap = RecordingCubemap;
    type VertexBuffer = RecordingBuffer;
    type UniformBuffer = RecordingBuffer;
    type ShaderBuffer = RecordingBuffer;
    type Framebuffer = RecordingFramebuffer;

    fn device_info(&self) -> String {
        "recording device (headless)".to_owned()
    }

    fn canvas(&self) -> &Self::Canvas {
        &self.canvas
    }

    fn canvas_mut(&mut self) -> &mut Self::Canvas {
        &mut self.canvas
    }

    fn state(&self) -> &DeviceState {
        &self.state
    }

    fn create_shader_program(&mut self) -> Result<Self::Program> {
        let id = self.allocate_id();
        Ok(RecordingProgram::new(id, self.log.clone()))
    }

    fn create_compute_shader(&mut self) -> Result<Self::Compute> {
        let id = self.allocate_id();
        Ok(RecordingCompute::new(id, self.log.clone()))
    }

    fn create_texture2d(&mut self) -> Result<Self::Texture2D> {
        let id = self.allocate_id();
        Ok(RecordingTexture::new(id, self.log.clone()))
    }

    fn create_cubemap(&mut self) -> Result<Self::Cubemap> {
        let id = self.allocate_id();
        Ok(RecordingCubemap::new(id, self.log.clone()))
    }

    fn create_vbo(&mut self) -> Result<Self::VertexBuffer> {
        let id = self.allocate_id();
        Ok(RecordingBuffer::new(id, BufferKind::Vertex, self.log.clone()))
    }

    fn create_ubo(&mut self) -> Result<Self::UniformBuffer> {
        let id = self.allocate_id();
        Ok(RecordingBuffer::new(id, BufferKind::Uniform, self.log.clone()))
    }

    fn create_sbo(&mut self) -> Result<Self::ShaderBuffer> {
        let id = self.allocate_id();
        Ok(RecordingBuffer::new(id, BufferKind::Storage, self.log.clone()))
    }

    fn create_fbo(&mut self) -> Result<Self::Framebuffer> {
        let id = self.allocate_id();
        Ok(RecordingFramebuffer::new(id))
    }

    fn enable_feature(&mut self, feature: Feature) -> Result<()> {
        self.state.set_feature(feature, true);
        self.record(Command::EnableFeature(feature));
        Ok(())
    }

    fn disable_feature(&mut self, feature: Feature) -> Result<()> {
        self.state.set_feature(feature, false);
        self.record(Command::DisableFeature(feature));
        Ok(())
    }

    fn set_blend_settings(&mut self, func: BlendFunc, src: BlendValue, dst: BlendValue) -> Result<()> {
        self.state.blend = BlendSettings { func, src, dst };
        self.record(Command::SetBlend { func, src, dst });
        Ok(())
    }

    fn set_culling_face(&mut self, face: Face) -> Result<()> {
        self.state.cull_face = face;
        self.record(Command::SetCullFace(face));
        Ok(())
    }

    fn set_viewport(&mut self, origin: IVec2, size: IVec2) {
        self.state.viewport = Some(Viewport { origin, size });
        self.record(Command::SetViewport { origin, size });
    }

    fn set_clear_color(&mut self, color: Vec4) {
        self.state.clear_color = color;
        self.record(Command::SetClearColor(color));
    }

    fn clear(&mut self) {
        self.record(Command::Clear {
            color: self.state.clear_color,
        });
    }

    fn begin_frame(&mut self) -> Result<()> {
        if self.frame_active {
            log::warn!("begin_frame called twice; previous frame discarded");
        }
        self.frame_active = true;
        self.record(Command::BeginFrame);
        self.clear();
        Ok(())
    }

    fn end_frame(&mut self) -> Result<()> {
        if !self.frame_active {
            return Err(GraphicsError::NoActiveFrame);
        }
        self.frame_active = false;
        self.state.framebuffer = None;
        self.record(Command::EndFrame);
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.canvas.width = width;
        self.canvas.height = height;
        self.record(Command::Resize { width, height });
    }

    fn add_input_buffer(
        &mut self,
        program: &mut Self::Program,
        buffer: &Self::VertexBuffer,
        input: VertexInput,
    ) -> Result<()> {
        let slot = program.add_input(input)? as usize;
        program.bound_inputs[slot] = Some(buffer.id());
        Ok(())
    }

    fn set_program_texture(
        &mut self,
        program: &mut Self::Program,
        name: &str,
        texture: &Self::Texture2D,
    ) -> Result<()> {
        program.staged().ensure_compiled()?;
        let Some(slot) = program.staged().texture_index(name) else {
            return Ok(());
        };
        if program.staged().textures()[slot].kind != TextureKind::D2 {
            return Err(GraphicsError::FormatMismatch(format!(
                "slot `{name}` expects a cubemap"
            )));
        }
        texture.sync().ensure_readable(texture.id())?;
        if texture.desc().is_none() {
            return Err(GraphicsError::UnboundResource(format!(
                "storage of texture {}",
                texture.id()
            )));
        }

        program.bound_textures[slot] = Some(texture.id());
        self.record(Command::BindTexture {
            program: program.id(),
            name: name.to_owned(),
            texture: Some(texture.id()),
        });
        Ok(())
    }

    fn set_program_cubemap(
        &mut self,
        program: &mut Self::Program,
        name: &str,
        cubemap: &Self::Cubemap,
    ) -> Result<()> {
        program.staged().ensure_compiled()?;
        let Some(slot) = program.staged().texture_index(name) else {
            return Ok(());
        };
        if program.staged().textures()[slot].kind != TextureKind::Cube {
            return Err(GraphicsError::FormatMismatch(format!(
                "slot `{name}` expects a 2D texture"
            )));
        }
        if cubemap.size().is_none() {
            return Err(GraphicsError::UnboundResource(format!(
                "storage of cubemap {}",
                cubemap.id()
            )));
        }

        program.bound_textures[slot] = Some(cubemap.id());
        self.record(Command::BindTexture {
            program: program.id(),
            name: name.to_owned(),
            texture: Some(cubemap.id()),
        });
        Ok(())
    }

    fn unbind_program_texture(&mut self, program: &mut Self::Program, name: &str) {
        let Some(slot) = program.staged().texture_index(name) else {
            return;
        };
        if let Some(bound) = program.bound_textures.get_mut(slot) {
            *bound = None;
            self.record(Command::BindTexture {
                program: program.id(),
                name: name.to_owned(),
                texture: None,
            });
        }
    }

    fn attach_to_framebuffer(
        &mut self,
        framebuffer: &mut Self::Framebuffer,
        attachment: Attachment,
        texture: &Self::Texture2D,
    ) -> Result<()> {
        let desc = texture.desc().ok_or_else(|| {
            GraphicsError::UnboundResource(format!("storage of texture {}", texture.id()))
        })?;
        if desc.format.is_depth() != (attachment == Attachment::Depth) {
            return Err(GraphicsError::FormatMismatch(format!(
                "{:?} cannot be used as a {attachment:?} attachment",
                desc.format
            )));
        }
        if let Some((w, h)) = framebuffer.size() {
            if (w, h) != (desc.width, desc.height) {
                return Err(GraphicsError::IncompleteFramebuffer("attachment sizes differ"));
            }
        }

        let attached = Some(AttachedTexture {
            texture: texture.id(),
            width: desc.width,
            height: desc.height,
        });
        match attachment {
            Attachment::Color => framebuffer.color = attached,
            Attachment::Depth => framebuffer.depth = attached,
        }
        self.record(Command::Attach {
            framebuffer: framebuffer.id(),
            attachment,
            texture: texture.id(),
        });
        Ok(())
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<&Self::Framebuffer>) -> Result<()> {
        if let Some(fb) = framebuffer {
            if !fb.is_complete() {
                return Err(GraphicsError::IncompleteFramebuffer("no color attachment"));
            }
        }
        let id = framebuffer.map(|fb| fb.id());
        self.state.framebuffer = id;
        self.record(Command::BindFramebuffer(id));
        Ok(())
    }

    fn draw(&mut self, program: &Self::Program, desc: &DrawDesc<'_, Self::VertexBuffer>) -> Result<()> {
        program.staged().ensure_compiled()?;
        if program.staged().is_noop() {
            log::trace!("skipping draw with empty program {}", program.id());
            return Ok(());
        }
        if !self.frame_active {
            return Err(GraphicsError::NoActiveFrame);
        }

        let vertex_buffers = Self::resolve_vertex_buffers(program, desc)?;
        self.record(Command::Draw(DrawRecord {
            program: program.id(),
            primitive: desc.primitive,
            vertex_count: desc.vertex_count,
            first_vertex: desc.first_vertex,
            instance_count: desc.instance_count,
            index_count: desc.index.map(|i| i.count),
            vertex_buffers,
            framebuffer: self.state.framebuffer,
        }));
        Ok(())
    }

    fn bind_compute_uniform_buffer(
        &mut self,
        shader: &mut Self::Compute,
        binding: u32,
        buffer: &Self::UniformBuffer,
    ) -> Result<()> {
        check_compute_binding(&shader.declared, binding, |k| matches!(k, ComputeBinding::UniformBuffer))?;
        shader.bound.insert(
            binding,
            ComputeBound {
                resource: buffer.id(),
                image_sync: None,
            },
        );
        Ok(())
    }

    fn bind_compute_storage_buffer(
        &mut self,
        shader: &mut Self::Compute,
        binding: u32,
        buffer: &Self::ShaderBuffer,
    ) -> Result<()> {
        check_compute_binding(&shader.declared, binding, |k| {
            matches!(k, ComputeBinding::StorageBuffer { .. })
        })?;
        shader.bound.insert(
            binding,
            ComputeBound {
                resource: buffer.id(),
                image_sync: None,
            },
        );
        Ok(())
    }

    fn bind_compute_image(
        &mut self,
        shader: &mut Self::Compute,
        binding: u32,
        texture: &Self::Texture2D,
    ) -> Result<()> {
        let desc = texture.desc().ok_or_else(|| {
            GraphicsError::UnboundResource(format!("storage of texture {}", texture.id()))
        })?;
        if !desc.usage.storage {
            return Err(GraphicsError::FormatMismatch(format!(
                "texture {} was not allocated for storage",
                texture.id()
            )));
        }
        check_compute_binding(&shader.declared, binding, |k| {
            matches!(k, ComputeBinding::StorageImage { format } if *format == desc.format)
        })?;
        shader.bound.insert(
            binding,
            ComputeBound {
                resource: texture.id(),
                image_sync: Some(texture.sync().clone()),
            },
        );
        Ok(())
    }

    fn dispatch_compute(&mut self, shader: &mut Self::Compute, groups: [u32; 3]) -> Result<ComputeFence> {
        if !shader.is_compiled() {
            return Err(GraphicsError::NotCompiled);
        }
        if let Some(missing) = shader.declared.keys().find(|b| !shader.bound.contains_key(*b)) {
            return Err(GraphicsError::UnboundResource(format!("compute binding {missing}")));
        }

        let written = shader
            .bound
            .values()
            .filter_map(|b| b.image_sync.clone())
            .collect();
        let fence = ComputeFence::new(self.next_fence, written);
        self.next_fence += 1;

        self.record(Command::Dispatch {
            shader: shader.id(),
            groups,
            bindings: shader.bound.iter().map(|(b, r)| (*b, r.resource)).collect(),
            fence: fence.id(),
        });
        Ok(fence)
    }

    fn memory_barrier(&mut self, fence: ComputeFence) {
        self.record(Command::MemoryBarrier { fence: fence.id() });
        fence.signal();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::caps::{Format, InternalFormat, ScalarType, ShaderStage};
    use crate::gfx::program::ProgramState;
    use crate::gfx::resources::{TextureDesc, TextureUsage};
    use crate::gfx::uniform::{UniformLayout, UniformType};

    const VS: &str = "fn vs_main() {}";
    const FS: &str = "fn fs_main() {}";

    fn device() -> RecordingDevice {
        RecordingDevice::create_canvas(640, 480, "test")
    }

    fn compiled_program(dev: &mut RecordingDevice) -> (RecordingProgram, RecordingBuffer) {
        let mut p = dev.create_shader_program().unwrap();
        p.add_stage(ShaderStage::Vertex, VS).unwrap();
        p.add_stage(ShaderStage::Fragment, FS).unwrap();
        p.set_uniform_layout(UniformLayout::new("U").field("model", UniformType::Mat4))
            .unwrap();
        let vbo = dev.create_vbo().unwrap();
        dev.add_input_buffer(&mut p, &vbo, VertexInput::single(0, 3, ScalarType::Float))
            .unwrap();
        p.compile().unwrap();
        (p, vbo)
    }

    fn storage_texture(dev: &mut RecordingDevice) -> RecordingTexture {
        let mut t = dev.create_texture2d().unwrap();
        t.allocate(TextureDesc::new(4, 4, InternalFormat::Rgba8).with_usage(TextureUsage::STORAGE))
            .unwrap();
        t
    }

    #[test]
    fn use_before_compile_is_an_error_not_a_crash() {
        let mut dev = device();
        let mut p = dev.create_shader_program().unwrap();
        assert!(matches!(p.use_program(), Err(GraphicsError::NotCompiled)));
    }

    #[test]
    fn compiling_without_stages_yields_noop_program() {
        let mut dev = device();
        let mut p = dev.create_shader_program().unwrap();
        p.compile().unwrap();
        assert_eq!(p.state(), ProgramState::Compiled);

        dev.begin_frame().unwrap();
        dev.draw_triangles(&p, 3).unwrap();
        assert!(dev.draws().is_empty());
    }

    #[test]
    fn compiling_twice_fails() {
        let mut dev = device();
        let (mut p, _vbo) = compiled_program(&mut dev);
        assert!(matches!(p.compile(), Err(GraphicsError::AlreadyCompiled)));
    }

    #[test]
    fn missing_entry_point_fails_compilation() {
        let mut dev = device();
        let mut p = dev.create_shader_program().unwrap();
        p.add_stage(ShaderStage::Vertex, "fn main() {}").unwrap();
        assert!(matches!(
            p.compile(),
            Err(GraphicsError::ShaderCompilation { stage: "vertex", .. })
        ));
    }

    #[test]
    fn viewport_is_idempotent() {
        let mut once = device();
        once.set_viewport(IVec2::ZERO, IVec2::new(640, 480));

        let mut twice = device();
        twice.set_viewport(IVec2::ZERO, IVec2::new(640, 480));
        twice.set_viewport(IVec2::ZERO, IVec2::new(640, 480));

        assert_eq!(once.state(), twice.state());
    }

    #[test]
    fn feature_toggles_update_state() {
        let mut dev = device();
        dev.enable_feature(Feature::CullFace).unwrap();
        dev.disable_feature(Feature::Blend).unwrap();
        assert!(dev.state().is_enabled(Feature::CullFace));
        assert!(!dev.state().is_enabled(Feature::Blend));
    }

    #[test]
    fn unknown_uniform_is_silently_ignored() {
        let mut dev = device();
        let (mut p, _vbo) = compiled_program(&mut dev);
        p.set_float("NotInTheLayout", 1.0);
        p.set_mat4("model", glam::Mat4::IDENTITY);

        let writes = dev.uniform_writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].0, "model");
    }

    #[test]
    fn draw_uses_bound_inputs_or_overrides() {
        let mut dev = device();
        let (p, vbo) = compiled_program(&mut dev);
        let other = dev.create_vbo().unwrap();

        dev.begin_frame().unwrap();
        dev.draw_triangles(&p, 3).unwrap();
        let bufs = [&other];
        dev.draw(&p, &DrawDesc::triangles(6).with_vertex_buffers(&bufs))
            .unwrap();
        dev.end_frame().unwrap();

        let draws = dev.draws();
        assert_eq!(draws[0].vertex_buffers, vec![vbo.id()]);
        assert_eq!(draws[1].vertex_buffers, vec![other.id()]);
        assert_eq!(draws[1].vertex_count, 6);
    }

    #[test]
    fn draw_outside_frame_is_rejected() {
        let mut dev = device();
        let (p, _vbo) = compiled_program(&mut dev);
        assert!(matches!(dev.draw_triangles(&p, 3), Err(GraphicsError::NoActiveFrame)));
        assert!(matches!(dev.end_frame(), Err(GraphicsError::NoActiveFrame)));
    }

    #[test]
    fn compute_output_is_gated_by_fence() {
        let mut dev = device();
        let target = storage_texture(&mut dev);

        let mut cs = dev.create_compute_shader().unwrap();
        cs.set_source("fn cs_main() {}").unwrap();
        cs.declare_binding(0, ComputeBinding::StorageImage { format: InternalFormat::Rgba8 })
            .unwrap();
        cs.compile().unwrap();
        dev.bind_compute_image(&mut cs, 0, &target).unwrap();

        let mut p = dev.create_shader_program().unwrap();
        p.add_texture_slot("Tex", TextureKind::D2).unwrap();
        p.compile().unwrap();

        let fence = dev.dispatch_compute(&mut cs, [1, 1, 1]).unwrap();
        let bindings = dev.commands().into_iter().find_map(|c| match c {
            Command::Dispatch { bindings, .. } => Some(bindings),
            _ => None,
        });
        assert_eq!(bindings, Some(vec![(0, target.id())]));
        assert!(matches!(
            dev.set_program_texture(&mut p, "Tex", &target),
            Err(GraphicsError::UnsynchronizedTexture(_))
        ));

        dev.memory_barrier(fence);
        dev.set_program_texture(&mut p, "Tex", &target).unwrap();
    }

    #[test]
    fn dispatch_requires_all_declared_bindings() {
        let mut dev = device();
        let mut cs = dev.create_compute_shader().unwrap();
        cs.set_source("fn cs_main() {}").unwrap();
        cs.declare_binding(0, ComputeBinding::UniformBuffer).unwrap();
        cs.compile().unwrap();

        assert!(matches!(
            dev.dispatch_compute(&mut cs, [1, 1, 1]),
            Err(GraphicsError::UnboundResource(_))
        ));
    }

    #[test]
    fn framebuffer_needs_color_before_binding() {
        let mut dev = device();
        let mut fbo = dev.create_fbo().unwrap();
        assert!(matches!(
            dev.bind_framebuffer(Some(&fbo)),
            Err(GraphicsError::IncompleteFramebuffer(_))
        ));

        let mut color = dev.create_texture2d().unwrap();
        color
            .allocate(TextureDesc::new(8, 8, InternalFormat::Rgba8).with_usage(TextureUsage::RENDER_TARGET))
            .unwrap();
        let mut depth = dev.create_texture2d().unwrap();
        depth.allocate(TextureDesc::new(4, 4, InternalFormat::Depth32)).unwrap();

        assert!(matches!(
            dev.attach_to_framebuffer(&mut fbo, Attachment::Depth, &color),
            Err(GraphicsError::FormatMismatch(_))
        ));
        dev.attach_to_framebuffer(&mut fbo, Attachment::Color, &color).unwrap();
        assert!(matches!(
            dev.attach_to_framebuffer(&mut fbo, Attachment::Depth, &depth),
            Err(GraphicsError::IncompleteFramebuffer(_))
        ));

        dev.bind_framebuffer(Some(&fbo)).unwrap();
        assert_eq!(dev.state().framebuffer, Some(fbo.id()));
    }

    #[test]
    fn texture_upload_checks_size() {
        let mut dev = device();
        let mut t = dev.create_texture2d().unwrap();
        assert!(t.upload(Format::Rgba, &[0; 4]).is_err());

        t.allocate(TextureDesc::new(1, 1, InternalFormat::Rgba8)).unwrap();
        t.upload(Format::Rgba, &[255; 4]).unwrap();
        assert!(t.upload(Format::Rgba, &[255; 8]).is_err());
    }
}
