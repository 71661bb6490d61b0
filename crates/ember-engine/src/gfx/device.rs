//! Graphics device contract.
//!
//! A `GraphicsDevice` is the exclusive factory for GPU resources and the single
//! issuer of render commands. One instance exists per application; the runtime
//! owns it and lends it to the app each frame.

use glam::{IVec2, Vec4};

use crate::error::Result;
use crate::gfx::caps::{
    Attachment, BlendFunc, BlendValue, Face, Feature, IndexFormat, Primitive,
};
use crate::gfx::program::VertexInput;
use crate::gfx::resources::{
    Canvas, ComputeShader, Cubemap, Framebuffer, ResourceId, ShaderBuffer, ShaderProgram,
    Texture2D, UniformBuffer, VertexBuffer,
};
use crate::gfx::sync::ComputeFence;

/// Viewport rectangle in framebuffer pixels, origin at the bottom-left corner.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Viewport {
    pub origin: IVec2,
    pub size: IVec2,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct BlendSettings {
    pub func: BlendFunc,
    pub src: BlendValue,
    pub dst: BlendValue,
}

impl Default for BlendSettings {
    fn default() -> Self {
        Self {
            func: BlendFunc::Add,
            src: BlendValue::SrcAlpha,
            dst: BlendValue::OneMinusSrcAlpha,
        }
    }
}

/// Global pipeline state mutated by device commands.
///
/// Commands overwrite fields; issuing the same command twice leaves the state
/// exactly as issuing it once.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceState {
    features: [bool; 3],
    pub blend: BlendSettings,
    pub cull_face: Face,
    pub viewport: Option<Viewport>,
    pub clear_color: Vec4,
    pub framebuffer: Option<ResourceId>,
}

impl Default for DeviceState {
    /// Canvas defaults: alpha blending and depth testing on, culling off.
    fn default() -> Self {
        let mut features = [false; 3];
        features[Feature::Blend.index()] = true;
        features[Feature::Depth.index()] = true;
        Self {
            features,
            blend: BlendSettings::default(),
            cull_face: Face::Back,
            viewport: None,
            clear_color: Vec4::new(0.0, 0.0, 0.0, 1.0),
            framebuffer: None,
        }
    }
}

impl DeviceState {
    pub fn is_enabled(&self, feature: Feature) -> bool {
        self.features[feature.index()]
    }

    pub(crate) fn set_feature(&mut self, feature: Feature, enabled: bool) {
        self.features[feature.index()] = enabled;
    }
}

/// Index data for an indexed draw.
#[derive(Debug)]
pub struct IndexedDraw<'a, VB> {
    pub buffer: &'a VB,
    pub format: IndexFormat,
    pub count: u32,
}

// Manual impls: derive would require `VB: Clone`.
impl<VB> Clone for IndexedDraw<'_, VB> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<VB> Copy for IndexedDraw<'_, VB> {}

/// Parameters of one draw call.
#[derive(Debug)]
pub struct DrawDesc<'a, VB> {
    pub primitive: Primitive,
    pub vertex_count: u32,
    pub first_vertex: u32,
    pub instance_count: u32,
    pub index: Option<IndexedDraw<'a, VB>>,
    /// Per-slot buffers overriding the program's bound inputs; empty keeps the bindings.
    pub vertex_buffers: &'a [&'a VB],
}

impl<'a, VB> DrawDesc<'a, VB> {
    /// Non-indexed triangle list starting at vertex 0.
    pub fn triangles(vertex_count: u32) -> Self {
        Self {
            primitive: Primitive::TriangleList,
            vertex_count,
            first_vertex: 0,
            instance_count: 1,
            index: None,
            vertex_buffers: &[],
        }
    }

    pub fn with_primitive(mut self, primitive: Primitive) -> Self {
        self.primitive = primitive;
        self
    }

    pub fn with_vertex_buffers(mut self, buffers: &'a [&'a VB]) -> Self {
        self.vertex_buffers = buffers;
        self
    }

    pub fn with_index(mut self, buffer: &'a VB, format: IndexFormat, count: u32) -> Self {
        self.index = Some(IndexedDraw {
            buffer,
            format,
            count,
        });
        self
    }

    pub fn instanced(mut self, count: u32) -> Self {
        self.instance_count = count;
        self
    }

    /// Number of elements the draw consumes (indices when indexed).
    pub fn element_count(&self) -> u32 {
        self.index.map(|i| i.count).unwrap_or(self.vertex_count)
    }
}

/// Factory and command issuer for one backend.
pub trait GraphicsDevice {
    type Canvas: Canvas;
    type Program: ShaderProgram;
    type Compute: ComputeShader;
    type Texture2D: Texture2D;
    type Cubemap: Cubemap;
    type VertexBuffer: VertexBuffer;
    type UniformBuffer: UniformBuffer;
    type ShaderBuffer: ShaderBuffer;
    type Framebuffer: Framebuffer;

    /// Vendor, backend and adapter description.
    fn device_info(&self) -> String;

    fn canvas(&self) -> &Self::Canvas;
    fn canvas_mut(&mut self) -> &mut Self::Canvas;
    fn state(&self) -> &DeviceState;

    // ── factory ──

    fn create_shader_program(&mut self) -> Result<Self::Program>;
    fn create_compute_shader(&mut self) -> Result<Self::Compute>;
    fn create_texture2d(&mut self) -> Result<Self::Texture2D>;
    fn create_cubemap(&mut self) -> Result<Self::Cubemap>;
    fn create_vbo(&mut self) -> Result<Self::VertexBuffer>;
    fn create_ubo(&mut self) -> Result<Self::UniformBuffer>;
    fn create_sbo(&mut self) -> Result<Self::ShaderBuffer>;
    fn create_fbo(&mut self) -> Result<Self::Framebuffer>;

    // ── global state ──

    fn enable_feature(&mut self, feature: Feature) -> Result<()>;
    fn disable_feature(&mut self, feature: Feature) -> Result<()>;
    fn set_blend_settings(&mut self, func: BlendFunc, src: BlendValue, dst: BlendValue)
        -> Result<()>;
    fn set_culling_face(&mut self, face: Face) -> Result<()>;
    fn set_viewport(&mut self, origin: IVec2, size: IVec2);
    fn set_clear_color(&mut self, color: Vec4);

    /// Clears the bound target's color and depth with the current clear color.
    fn clear(&mut self);

    // ── frame ──

    fn begin_frame(&mut self) -> Result<()>;
    fn end_frame(&mut self) -> Result<()>;
    fn resize(&mut self, width: u32, height: u32);

    // ── cross-resource binding ──

    /// Declares `input` on `program` and binds `buffer` to the new slot.
    fn add_input_buffer(
        &mut self,
        program: &mut Self::Program,
        buffer: &Self::VertexBuffer,
        input: VertexInput,
    ) -> Result<()>;

    fn set_program_texture(
        &mut self,
        program: &mut Self::Program,
        name: &str,
        texture: &Self::Texture2D,
    ) -> Result<()>;

    fn set_program_cubemap(
        &mut self,
        program: &mut Self::Program,
        name: &str,
        cubemap: &Self::Cubemap,
    ) -> Result<()>;

    /// Resets a texture slot to the backend's neutral texture.
    fn unbind_program_texture(&mut self, program: &mut Self::Program, name: &str);

    fn attach_to_framebuffer(
        &mut self,
        framebuffer: &mut Self::Framebuffer,
        attachment: Attachment,
        texture: &Self::Texture2D,
    ) -> Result<()>;

    /// Redirects subsequent draws; `None` targets the canvas.
    fn bind_framebuffer(&mut self, framebuffer: Option<&Self::Framebuffer>) -> Result<()>;

    // ── draw ──

    fn draw(&mut self, program: &Self::Program, desc: &DrawDesc<'_, Self::VertexBuffer>)
        -> Result<()>;

    fn draw_triangles(&mut self, program: &Self::Program, vertex_count: u32) -> Result<()> {
        self.draw(program, &DrawDesc::triangles(vertex_count))
    }

    // ── compute ──

    fn bind_compute_uniform_buffer(
        &mut self,
        shader: &mut Self::Compute,
        binding: u32,
        buffer: &Self::UniformBuffer,
    ) -> Result<()>;

    fn bind_compute_storage_buffer(
        &mut self,
        shader: &mut Self::Compute,
        binding: u32,
        buffer: &Self::ShaderBuffer,
    ) -> Result<()>;

    fn bind_compute_image(
        &mut self,
        shader: &mut Self::Compute,
        binding: u32,
        texture: &Self::Texture2D,
    ) -> Result<()>;

    fn dispatch_compute(&mut self, shader: &mut Self::Compute, groups: [u32; 3])
        -> Result<ComputeFence>;

    /// Makes every write covered by `fence` visible to later sampling.
    fn memory_barrier(&mut self, fence: ComputeFence);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_matches_canvas_setup() {
        let s = DeviceState::default();
        assert!(s.is_enabled(Feature::Blend));
        assert!(s.is_enabled(Feature::Depth));
        assert!(!s.is_enabled(Feature::CullFace));
        assert_eq!(s.blend, BlendSettings::default());
        assert_eq!(s.viewport, None);
    }

    #[test]
    fn element_count_prefers_index_count() {
        let vb = 0u8;
        let plain: DrawDesc<'_, u8> = DrawDesc::triangles(3);
        assert_eq!(plain.element_count(), 3);

        let indexed = DrawDesc::triangles(4).with_index(&vb, IndexFormat::U16, 6);
        assert_eq!(indexed.element_count(), 6);
        assert_eq!(indexed.instance_count, 1);
    }
}
