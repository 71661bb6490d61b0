use std::collections::HashMap;
use std::num::NonZeroU64;
use std::sync::Arc;

use glam::{IVec2, Vec4};
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::error::{GraphicsError, Result};
use crate::gfx::caps::{
    Attachment, BlendFunc, BlendValue, Face, Feature, InternalFormat, TextureKind,
};
use crate::gfx::device::{BlendSettings, DeviceState, DrawDesc, GraphicsDevice, Viewport};
use crate::gfx::program::VertexInput;
use crate::gfx::resources::{
    BufferKind, ComputeBinding, ComputeShader, Cubemap, Framebuffer, ResourceId,
    ShaderProgram, Texture2D, check_compute_binding,
};
use crate::gfx::sync::ComputeFence;

use super::compute::{ComputeResource, WgpuCompute};
use super::frame::{DrawCall, FrameRecording, PassTarget, PipelineKey, UniformArena, flip_viewport};
use super::gpu::{DEPTH_FORMAT, Gpu, GpuInit, SurfaceErrorAction};
use super::lookup;
use super::program::{BoundTexture, WgpuProgram, create_pipeline};
use super::resources::{
    AttachedView, WgpuBuffer, WgpuCanvas, WgpuCubemap, WgpuFramebuffer, WgpuTexture2D,
    resolve_cell,
};

/// Draw with every GPU object it needs resolved.
struct PreparedDraw {
    pipeline: wgpu::RenderPipeline,
    uniforms: wgpu::BindGroup,
    textures: Option<wgpu::BindGroup>,
    call: DrawCall,
}

/// `GraphicsDevice` backed by wgpu and a winit window.
pub struct WgpuDevice {
    gpu: Gpu,
    canvas: WgpuCanvas,
    state: DeviceState,
    target: PassTarget,
    frame: Option<FrameRecording>,
    arena: UniformArena,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    uniform_groups: HashMap<ResourceId, (u64, wgpu::BindGroup)>,
    sampler: wgpu::Sampler,
    white_2d: wgpu::TextureView,
    white_cube: wgpu::TextureView,
    next_id: u64,
    next_fence: u64,
}

impl WgpuDevice {
    /// Creates the GPU context for `window`; the window becomes the device canvas.
    pub fn create(window: Arc<Window>, init: &GpuInit, title: &str) -> Result<Self> {
        let gpu = pollster::block_on(Gpu::new(window.clone(), init))?;
        log::info!("graphics device: {}", gpu.adapter_summary());

        let device = gpu.device();
        let queue = gpu.queue();
        let alignment = device.limits().min_uniform_buffer_offset_alignment;

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("ember linear sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });
        let white_2d = white_texture(device, queue, 1);
        let white_cube = white_texture(device, queue, 6);

        Ok(Self {
            canvas: WgpuCanvas::new(window, title),
            gpu,
            state: DeviceState::default(),
            target: PassTarget::Canvas,
            frame: None,
            arena: UniformArena::new(alignment),
            pipelines: HashMap::new(),
            uniform_groups: HashMap::new(),
            sampler,
            white_2d,
            white_cube,
            next_id: 1,
            next_fence: 1,
        })
    }

    pub fn gpu(&self) -> &Gpu {
        &self.gpu
    }

    fn allocate_id(&mut self) -> ResourceId {
        let id = ResourceId(self.next_id);
        self.next_id += 1;
        id
    }

    fn target_formats(&self) -> (wgpu::TextureFormat, Option<wgpu::TextureFormat>) {
        match &self.target {
            PassTarget::Canvas => (self.gpu.surface_format(), Some(DEPTH_FORMAT)),
            PassTarget::Framebuffer {
                color_format,
                depth,
                ..
            } => (*color_format, depth.as_ref().map(|(_, f)| *f)),
        }
    }

    fn target_size(&self) -> (u32, u32) {
        match &self.target {
            PassTarget::Canvas => {
                let size = self.gpu.size();
                (size.width, size.height)
            }
            PassTarget::Framebuffer { size, .. } => *size,
        }
    }

    fn resolve_vertex_buffers(
        program: &WgpuProgram,
        desc: &DrawDesc<'_, WgpuBuffer>,
    ) -> Result<Vec<wgpu::Buffer>> {
        let expected = program.staged().inputs().len();

        if !desc.vertex_buffers.is_empty() {
            if desc.vertex_buffers.len() != expected {
                return Err(GraphicsError::UnboundResource(format!(
                    "vertex buffers: program declares {expected}, draw supplied {}",
                    desc.vertex_buffers.len()
                )));
            }
            return desc.vertex_buffers.iter().map(|b| b.raw()).collect();
        }

        program
            .bound_inputs
            .iter()
            .enumerate()
            .map(|(slot, cell)| match cell {
                Some(cell) => resolve_cell(cell, &format!("vertex input {slot}")),
                None => Err(GraphicsError::UnboundResource(format!("vertex input {slot}"))),
            })
            .collect()
    }

    fn uniform_group(
        &mut self,
        device: &wgpu::Device,
        arena: &wgpu::Buffer,
        call: &DrawCall,
    ) -> wgpu::BindGroup {
        let generation = self.arena.generation();
        if let Some((g, group)) = self.uniform_groups.get(&call.key.program) {
            if *g == generation {
                return group.clone();
            }
        }

        let group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("ember uniforms"),
            layout: &call.program.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: arena,
                    offset: 0,
                    size: NonZeroU64::new(call.program.uniform_size),
                }),
            }],
        });
        self.uniform_groups
            .insert(call.key.program, (generation, group.clone()));
        group
    }

    fn texture_group(&self, device: &wgpu::Device, call: &DrawCall) -> Option<wgpu::BindGroup> {
        let layout = call.program.texture_layout.as_ref()?;
        let entries: Vec<wgpu::BindGroupEntry<'_>> = call
            .textures
            .iter()
            .enumerate()
            .flat_map(|(k, view)| {
                let binding = 2 * k as u32;
                [
                    wgpu::BindGroupEntry {
                        binding,
                        resource: wgpu::BindingResource::TextureView(view),
                    },
                    wgpu::BindGroupEntry {
                        binding: binding + 1,
                        resource: wgpu::BindingResource::Sampler(&self.sampler),
                    },
                ]
            })
            .collect();
        Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("ember textures"),
            layout,
            entries: &entries,
        }))
    }

    fn prepare(
        &mut self,
        device: &wgpu::Device,
        arena: &wgpu::Buffer,
        call: DrawCall,
    ) -> PreparedDraw {
        let pipeline = self
            .pipelines
            .entry(call.key.clone())
            .or_insert_with(|| {
                log::debug!("creating pipeline for {:?}", call.key);
                create_pipeline(device, &call.program, &call.key)
            })
            .clone();
        let uniforms = self.uniform_group(device, arena, &call);
        let textures = self.texture_group(device, &call);
        PreparedDraw {
            pipeline,
            uniforms,
            textures,
            call,
        }
    }
}

impl GraphicsDevice for WgpuDevice {
    type Canvas = WgpuCanvas;
    type Program = WgpuProgram;
    type Compute = WgpuCompute;
    type Texture2D = WgpuTexture2D;
    type Cubemap = WgpuCubemap;
    type VertexBuffer = WgpuBuffer;
    type UniformBuffer = WgpuBuffer;
    type ShaderBuffer = WgpuBuffer;
    type Framebuffer = WgpuFramebuffer;

    fn device_info(&self) -> String {
        self.gpu.adapter_summary()
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
        Ok(WgpuProgram::new(id, self.gpu.device().clone()))
    }

    fn create_compute_shader(&mut self) -> Result<Self::Compute> {
        let id = self.allocate_id();
        Ok(WgpuCompute::new(id, self.gpu.device().clone()))
    }

    fn create_texture2d(&mut self) -> Result<Self::Texture2D> {
        let id = self.allocate_id();
        Ok(WgpuTexture2D::new(
            id,
            self.gpu.device().clone(),
            self.gpu.queue().clone(),
        ))
    }

    fn create_cubemap(&mut self) -> Result<Self::Cubemap> {
        let id = self.allocate_id();
        Ok(WgpuCubemap::new(
            id,
            self.gpu.device().clone(),
            self.gpu.queue().clone(),
        ))
    }

    fn create_vbo(&mut self) -> Result<Self::VertexBuffer> {
        let id = self.allocate_id();
        Ok(WgpuBuffer::new(
            id,
            BufferKind::Vertex,
            self.gpu.device().clone(),
            self.gpu.queue().clone(),
        ))
    }

    fn create_ubo(&mut self) -> Result<Self::UniformBuffer> {
        let id = self.allocate_id();
        Ok(WgpuBuffer::new(
            id,
            BufferKind::Uniform,
            self.gpu.device().clone(),
            self.gpu.queue().clone(),
        ))
    }

    fn create_sbo(&mut self) -> Result<Self::ShaderBuffer> {
        let id = self.allocate_id();
        Ok(WgpuBuffer::new(
            id,
            BufferKind::Storage,
            self.gpu.device().clone(),
            self.gpu.queue().clone(),
        ))
    }

    fn create_fbo(&mut self) -> Result<Self::Framebuffer> {
        let id = self.allocate_id();
        Ok(WgpuFramebuffer::new(id))
    }

    fn enable_feature(&mut self, feature: Feature) -> Result<()> {
        self.state.set_feature(feature, true);
        Ok(())
    }

    fn disable_feature(&mut self, feature: Feature) -> Result<()> {
        self.state.set_feature(feature, false);
        Ok(())
    }

    fn set_blend_settings(
        &mut self,
        func: BlendFunc,
        src: BlendValue,
        dst: BlendValue,
    ) -> Result<()> {
        self.state.blend = BlendSettings { func, src, dst };
        Ok(())
    }

    fn set_culling_face(&mut self, face: Face) -> Result<()> {
        lookup::cull_face(face)?;
        self.state.cull_face = face;
        Ok(())
    }

    fn set_viewport(&mut self, origin: IVec2, size: IVec2) {
        self.state.viewport = Some(Viewport { origin, size });
    }

    fn set_clear_color(&mut self, color: Vec4) {
        self.state.clear_color = color;
    }

    fn clear(&mut self) {
        let c = self.state.clear_color.as_dvec4();
        if let Some(frame) = &mut self.frame {
            frame.clear(wgpu::Color {
                r: c.x,
                g: c.y,
                b: c.z,
                a: c.w,
            });
        } else {
            log::trace!("clear outside a frame ignored");
        }
    }

    fn begin_frame(&mut self) -> Result<()> {
        if self.frame.take().is_some() {
            log::warn!("begin_frame called twice; previous frame discarded");
        }
        self.arena.reset();

        match self.gpu.acquire() {
            Ok(acquired) => {
                self.frame = Some(FrameRecording::new(acquired, self.target.clone()));
                self.clear();
                Ok(())
            }
            Err(err) => {
                let action = self.gpu.handle_surface_error(&err);
                if action == SurfaceErrorAction::Fatal {
                    log::error!("surface error: {err:?}");
                } else {
                    log::debug!("surface error: {err:?} -> {action:?}");
                }
                Err(GraphicsError::Surface {
                    message: err.to_string(),
                    fatal: action == SurfaceErrorAction::Fatal,
                })
            }
        }
    }

    fn end_frame(&mut self) -> Result<()> {
        let Some(mut frame) = self.frame.take() else {
            return Err(GraphicsError::NoActiveFrame);
        };
        let device = self.gpu.device().clone();
        let queue = self.gpu.queue().clone();

        let arena = self.arena.flush(&device, &queue).cloned();
        let passes = std::mem::take(&mut frame.passes);

        let mut prepared = Vec::with_capacity(passes.len());
        for pass in passes {
            let draws: Vec<PreparedDraw> = match &arena {
                Some(arena) => pass
                    .draws
                    .into_iter()
                    .map(|call| self.prepare(&device, arena, call))
                    .collect(),
                None => Vec::new(),
            };
            prepared.push((pass.target, pass.clear, draws));
        }

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("ember frame encoder"),
        });

        for (target, clear, draws) in &prepared {
            let (color_view, depth_view) = match target {
                PassTarget::Canvas => (&frame.acquired.view, Some(self.gpu.depth_view())),
                PassTarget::Framebuffer { color, depth, .. } => {
                    (color, depth.as_ref().map(|(v, _)| v))
                }
            };
            let color_load = match clear {
                Some(c) => wgpu::LoadOp::Clear(*c),
                None => wgpu::LoadOp::Load,
            };
            let depth_load = match clear {
                Some(_) => wgpu::LoadOp::Clear(1.0),
                None => wgpu::LoadOp::Load,
            };

            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("ember pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: color_load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: depth_view.map(|view| {
                    wgpu::RenderPassDepthStencilAttachment {
                        view,
                        depth_ops: Some(wgpu::Operations {
                            load: depth_load,
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            for draw in draws {
                let call = &draw.call;
                let [x, y, w, h] = call.viewport;
                rpass.set_viewport(x, y, w, h, 0.0, 1.0);
                rpass.set_pipeline(&draw.pipeline);
                rpass.set_bind_group(0, &draw.uniforms, &[call.uniform_offset]);
                if let Some(textures) = &draw.textures {
                    rpass.set_bind_group(1, textures, &[]);
                }
                for (slot, buffer) in call.vertex_buffers.iter().enumerate() {
                    rpass.set_vertex_buffer(slot as u32, buffer.slice(..));
                }
                match &call.index {
                    Some((buffer, format, count)) => {
                        rpass.set_index_buffer(buffer.slice(..), *format);
                        rpass.draw_indexed(0..*count, 0, 0..call.instances);
                    }
                    None => rpass.draw(
                        call.first_vertex..call.first_vertex + call.vertex_count,
                        0..call.instances,
                    ),
                }
            }
        }

        queue.submit(Some(encoder.finish()));
        // Lets winit throttle redraws to the compositor.
        self.canvas.window().pre_present_notify();
        frame.acquired.surface_texture.present();

        self.arena.reset();
        self.state.framebuffer = None;
        self.target = PassTarget::Canvas;
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.gpu.resize(PhysicalSize::new(width, height));
    }

    fn add_input_buffer(
        &mut self,
        program: &mut Self::Program,
        buffer: &Self::VertexBuffer,
        input: VertexInput,
    ) -> Result<()> {
        let slot = program.add_input(input)? as usize;
        program.bound_inputs[slot] = Some(buffer.cell());
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
        let view = texture.view()?;
        if let Some(desc) = texture.desc() {
            if !sampleable(desc.format) || !desc.usage.sampled {
                return Err(GraphicsError::FormatMismatch(format!(
                    "texture {} ({:?}) cannot be sampled",
                    texture.id(),
                    desc.format
                )));
            }
        }

        program.bound_textures[slot] = Some(BoundTexture {
            id: texture.id(),
            view: view.clone(),
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

        program.bound_textures[slot] = Some(BoundTexture {
            id: cubemap.id(),
            view: cubemap.view()?.clone(),
        });
        Ok(())
    }

    fn unbind_program_texture(&mut self, program: &mut Self::Program, name: &str) {
        let Some(slot) = program.staged().texture_index(name) else {
            return;
        };
        if let Some(bound) = program.bound_textures.get_mut(slot) {
            if let Some(prev) = bound.take() {
                log::trace!("unbound texture {} from `{name}`", prev.id);
            }
        }
    }

    fn attach_to_framebuffer(
        &mut self,
        framebuffer: &mut Self::Framebuffer,
        attachment: Attachment,
        texture: &Self::Texture2D,
    ) -> Result<()> {
        let desc = *texture.desc().ok_or_else(|| {
            GraphicsError::UnboundResource(format!("storage of texture {}", texture.id()))
        })?;
        if desc.format.is_depth() != (attachment == Attachment::Depth) {
            return Err(GraphicsError::FormatMismatch(format!(
                "{:?} cannot be used as a {attachment:?} attachment",
                desc.format
            )));
        }
        if attachment == Attachment::Color && !desc.usage.render_target {
            return Err(GraphicsError::FormatMismatch(format!(
                "texture {} was not allocated as a render target",
                texture.id()
            )));
        }
        if let Some((w, h)) = framebuffer.size() {
            if (w, h) != (desc.width, desc.height) {
                return Err(GraphicsError::IncompleteFramebuffer("attachment sizes differ"));
            }
        }

        let attached = Some(AttachedView {
            id: texture.id(),
            view: texture.view()?.clone(),
            format: lookup::texture_format(desc.format)?,
            width: desc.width,
            height: desc.height,
        });
        match attachment {
            Attachment::Color => framebuffer.color = attached,
            Attachment::Depth => framebuffer.depth = attached,
        }
        Ok(())
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<&Self::Framebuffer>) -> Result<()> {
        let target = match framebuffer {
            None => PassTarget::Canvas,
            Some(fb) => {
                let Some(color) = &fb.color else {
                    return Err(GraphicsError::IncompleteFramebuffer("no color attachment"));
                };
                log::trace!("binding framebuffer {} (color {})", fb.id(), color.id);
                PassTarget::Framebuffer {
                    color: color.view.clone(),
                    color_format: color.format,
                    depth: fb.depth.as_ref().map(|d| (d.view.clone(), d.format)),
                    size: (color.width, color.height),
                }
            }
        };

        self.state.framebuffer = framebuffer.map(|fb| fb.id());
        if let Some(frame) = &mut self.frame {
            frame.retarget(target.clone());
        }
        self.target = target;
        Ok(())
    }

    fn draw(
        &mut self,
        program: &Self::Program,
        desc: &DrawDesc<'_, Self::VertexBuffer>,
    ) -> Result<()> {
        program.staged().ensure_compiled()?;
        let Some(compiled) = program.compiled.clone() else {
            log::trace!("skipping draw with empty program {}", program.id());
            return Ok(());
        };
        if self.frame.is_none() {
            return Err(GraphicsError::NoActiveFrame);
        }

        let vertex_buffers = Self::resolve_vertex_buffers(program, desc)?;
        let index = match desc.index {
            Some(i) => Some((i.buffer.raw()?, lookup::index_format(i.format), i.count)),
            None => None,
        };

        let textures = program
            .bound_textures
            .iter()
            .zip(&compiled.texture_kinds)
            .map(|(bound, kind)| match (bound, kind) {
                (Some(b), _) => b.view.clone(),
                (None, TextureKind::D2) => self.white_2d.clone(),
                (None, TextureKind::Cube) => self.white_cube.clone(),
            })
            .collect();

        let (color_format, depth_format) = self.target_formats();
        let cull = if self.state.is_enabled(Feature::CullFace) {
            Some(lookup::cull_face(self.state.cull_face)?)
        } else {
            None
        };
        let key = PipelineKey {
            program: program.id(),
            topology: lookup::primitive_topology(desc.primitive),
            strip_index: index
                .as_ref()
                .filter(|_| desc.primitive.is_strip())
                .map(|(_, f, _)| *f),
            blend: self
                .state
                .is_enabled(Feature::Blend)
                .then(|| lookup::blend_state(self.state.blend)),
            depth_test: self.state.is_enabled(Feature::Depth) && depth_format.is_some(),
            cull,
            color_format,
            depth_format,
        };

        let size = self.target_size();
        let viewport = match self.state.viewport {
            Some(v) => flip_viewport(v.origin.to_array(), v.size.to_array(), size),
            None => [0.0, 0.0, size.0.max(1) as f32, size.1.max(1) as f32],
        };

        let block = program.block.as_ref().map(|b| b.bytes()).unwrap_or(&[0; 16]);
        let uniform_offset = self.arena.push(block);

        let call = DrawCall {
            program: compiled,
            key,
            uniform_offset,
            vertex_buffers,
            index,
            first_vertex: desc.first_vertex,
            vertex_count: desc.vertex_count,
            instances: desc.instance_count,
            textures,
            viewport,
        };
        if let Some(frame) = &mut self.frame {
            frame.push_draw(call);
        }
        Ok(())
    }

    fn bind_compute_uniform_buffer(
        &mut self,
        shader: &mut Self::Compute,
        binding: u32,
        buffer: &Self::UniformBuffer,
    ) -> Result<()> {
        check_compute_binding(&shader.declared, binding, |k| {
            matches!(k, ComputeBinding::UniformBuffer)
        })?;
        shader
            .bound
            .insert(binding, ComputeResource::Buffer(buffer.cell()));
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
        shader
            .bound
            .insert(binding, ComputeResource::Buffer(buffer.cell()));
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
            ComputeResource::Image {
                view: texture.view()?.clone(),
                sync: texture.sync().clone(),
            },
        );
        Ok(())
    }

    fn dispatch_compute(
        &mut self,
        shader: &mut Self::Compute,
        groups: [u32; 3],
    ) -> Result<ComputeFence> {
        let Some(compiled) = &shader.compiled else {
            return Err(GraphicsError::NotCompiled);
        };
        if let Some(missing) = shader.declared.keys().find(|b| !shader.bound.contains_key(*b)) {
            return Err(GraphicsError::UnboundResource(format!(
                "compute binding {missing}"
            )));
        }

        let mut buffers = Vec::new();
        for (&binding, resource) in &shader.bound {
            if let ComputeResource::Buffer(cell) = resource {
                buffers.push((binding, resolve_cell(cell, &format!("compute binding {binding}"))?));
            }
        }

        let mut entries: Vec<wgpu::BindGroupEntry<'_>> = buffers
            .iter()
            .map(|(binding, buffer)| wgpu::BindGroupEntry {
                binding: *binding,
                resource: buffer.as_entire_binding(),
            })
            .collect();
        let mut written = Vec::new();
        for (&binding, resource) in &shader.bound {
            if let ComputeResource::Image { view, sync } = resource {
                entries.push(wgpu::BindGroupEntry {
                    binding,
                    resource: wgpu::BindingResource::TextureView(view),
                });
                written.push(sync.clone());
            }
        }

        let device = self.gpu.device();
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("ember compute bindings"),
            layout: &compiled.layout,
            entries: &entries,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("ember compute encoder"),
        });
        {
            let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("ember compute pass"),
                timestamp_writes: None,
            });
            cpass.set_pipeline(&compiled.pipeline);
            cpass.set_bind_group(0, &bind_group, &[]);
            cpass.dispatch_workgroups(groups[0], groups[1], groups[2]);
        }
        self.gpu.queue().submit(Some(encoder.finish()));

        let fence = ComputeFence::new(self.next_fence, written);
        self.next_fence += 1;
        log::trace!("dispatched compute {} as fence {}", shader.id(), fence.id());
        Ok(fence)
    }

    fn memory_barrier(&mut self, fence: ComputeFence) {
        // Submissions on one queue execute in order; the fence only gates CPU-side binding.
        fence.signal();
    }
}

/// Float-filterable formats the shared linear sampler can read.
fn sampleable(format: InternalFormat) -> bool {
    matches!(format, InternalFormat::Rgba8 | InternalFormat::Rgba16F)
}

fn white_texture(device: &wgpu::Device, queue: &wgpu::Queue, layers: u32) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("ember fallback texture"),
        size: wgpu::Extent3d {
            width: 1,
            height: 1,
            depth_or_array_layers: layers,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    let pixels = vec![255u8; 4 * layers as usize];
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &pixels,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4),
            rows_per_image: Some(1),
        },
        wgpu::Extent3d {
            width: 1,
            height: 1,
            depth_or_array_layers: layers,
        },
    );

    let dimension = if layers == 6 {
        wgpu::TextureViewDimension::Cube
    } else {
        wgpu::TextureViewDimension::D2
    };
    texture.create_view(&wgpu::TextureViewDescriptor {
        label: Some("ember fallback view"),
        dimension: Some(dimension),
        ..Default::default()
    })
}
