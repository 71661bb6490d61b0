//! Compute-generated floor texture.
//!
//! Parameters go through a uniform buffer and the palette through a storage
//! buffer; the shader writes a tiled gradient into a storage texture which the
//! floor material samples once the dispatch has been fenced.

use bytemuck::{Pod, Zeroable};

use ember_engine::Result;
use ember_engine::gfx::{
    ComputeBinding, ComputeShader, GpuBuffer, GraphicsDevice, InternalFormat, Texture2D,
    TextureDesc, TextureUsage,
};

const SOURCE: &str = include_str!("shaders/floor_pattern.wgsl");
const WORKGROUP: u32 = 8;

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct PatternParams {
    size: [u32; 2],
    tiles: [u32; 2],
    blend: f32,
    _pad: [f32; 3],
}

pub struct FloorPattern {
    pub size: u32,
    pub tiles: u32,
    pub blend: f32,
    pub palette: Vec<[f32; 4]>,
}

impl Default for FloorPattern {
    fn default() -> Self {
        Self {
            size: 256,
            tiles: 8,
            blend: 0.25,
            palette: vec![
                [0.05, 0.35, 0.40, 1.0],
                [0.80, 0.85, 0.85, 1.0],
                [0.10, 0.20, 0.25, 1.0],
            ],
        }
    }
}

impl FloorPattern {
    /// Runs the compute pass and returns the finished texture, ready to sample.
    pub fn generate<D: GraphicsDevice>(&self, device: &mut D) -> Result<D::Texture2D> {
        let mut texture = device.create_texture2d()?;
        texture.allocate(
            TextureDesc::new(self.size, self.size, InternalFormat::Rgba8)
                .with_usage(TextureUsage::STORAGE),
        )?;

        let params = PatternParams {
            size: [self.size, self.size],
            tiles: [self.tiles, self.tiles],
            blend: self.blend,
            _pad: [0.0; 3],
        };
        let mut ubo = device.create_ubo()?;
        ubo.set_data(bytemuck::bytes_of(&params))?;

        let mut sbo = device.create_sbo()?;
        sbo.set_data(bytemuck::cast_slice(&self.palette))?;

        let mut shader = device.create_compute_shader()?;
        shader.set_source(SOURCE)?;
        shader.declare_binding(0, ComputeBinding::UniformBuffer)?;
        shader.declare_binding(1, ComputeBinding::StorageBuffer { read_only: true })?;
        shader.declare_binding(
            2,
            ComputeBinding::StorageImage {
                format: InternalFormat::Rgba8,
            },
        )?;
        shader.compile()?;

        device.bind_compute_uniform_buffer(&mut shader, 0, &ubo)?;
        device.bind_compute_storage_buffer(&mut shader, 1, &sbo)?;
        device.bind_compute_image(&mut shader, 2, &texture)?;

        let groups = self.size.div_ceil(WORKGROUP);
        let fence = device.dispatch_compute(&mut shader, [groups, groups, 1])?;
        log::debug!(
            "floor pattern dispatched ({groups}x{groups} groups, fence {})",
            fence.id()
        );
        device.memory_barrier(fence);

        Ok(texture)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_engine::gfx::recording::{Command, RecordingDevice};

    #[test]
    fn params_match_the_uniform_block() {
        assert_eq!(std::mem::size_of::<PatternParams>(), 32);
    }

    #[test]
    fn dispatch_is_fenced_before_sampling() {
        let mut device = RecordingDevice::create_canvas(64, 64, "pattern");
        let texture = FloorPattern::default().generate(&mut device).unwrap();

        assert!(texture.sync().pending_fence().is_none());
        assert_eq!(texture.width(), 256);

        let commands = device.commands();
        let dispatch = commands
            .iter()
            .position(|c| matches!(c, Command::Dispatch { groups: [32, 32, 1], .. }))
            .expect("dispatch recorded");
        let barrier = commands
            .iter()
            .position(|c| matches!(c, Command::MemoryBarrier { .. }))
            .expect("barrier recorded");
        assert!(dispatch < barrier);
    }
}
