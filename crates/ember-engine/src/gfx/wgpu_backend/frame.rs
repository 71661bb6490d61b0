//! Per-frame command recording for the wgpu backend.
//!
//! Draws issued between `begin_frame` and `end_frame` are captured here and
//! replayed into render passes when the frame ends. Each draw snapshots the
//! program's uniform block into a shared arena addressed with dynamic offsets.

use std::sync::Arc;

use crate::gfx::resources::ResourceId;

use super::gpu::AcquiredFrame;
use super::program::CompiledProgram;

const MIN_ARENA_SIZE: u64 = 64 * 1024;

/// Everything a render pipeline depends on besides the program's own layouts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(super) struct PipelineKey {
    pub program: ResourceId,
    pub topology: wgpu::PrimitiveTopology,
    pub strip_index: Option<wgpu::IndexFormat>,
    pub blend: Option<wgpu::BlendState>,
    pub depth_test: bool,
    pub cull: Option<wgpu::Face>,
    pub color_format: wgpu::TextureFormat,
    pub depth_format: Option<wgpu::TextureFormat>,
}

/// Growable uniform buffer filled once per frame.
pub(super) struct UniformArena {
    staging: Vec<u8>,
    buffer: Option<wgpu::Buffer>,
    generation: u64,
    alignment: u64,
}

impl UniformArena {
    pub fn new(alignment: u32) -> Self {
        Self {
            staging: Vec::new(),
            buffer: None,
            generation: 0,
            alignment: u64::from(alignment.max(16)),
        }
    }

    /// Appends a block snapshot; returns its dynamic offset.
    pub fn push(&mut self, bytes: &[u8]) -> u32 {
        let offset = (self.staging.len() as u64).div_ceil(self.alignment) * self.alignment;
        self.staging.resize(offset as usize, 0);
        self.staging.extend_from_slice(bytes);
        offset as u32
    }

    /// Bumped whenever the backing buffer is replaced; bind groups keyed on it go stale.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Uploads the staged bytes, growing the buffer when needed.
    pub fn flush(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) -> Option<&wgpu::Buffer> {
        if self.staging.is_empty() {
            return self.buffer.as_ref();
        }
        let needed = self.staging.len() as u64;
        let too_small = self.buffer.as_ref().is_none_or(|b| b.size() < needed);
        if too_small {
            let size = needed.next_power_of_two().max(MIN_ARENA_SIZE);
            log::debug!("uniform arena grows to {size} bytes");
            self.buffer = Some(device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("ember uniform arena"),
                size,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
            self.generation += 1;
        }

        // Uniform reads past the last block must stay in bounds.
        let pad = self.staging.len().next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT as usize);
        self.staging.resize(pad, 0);

        let buffer = self.buffer.as_ref()?;
        queue.write_buffer(buffer, 0, &self.staging);
        Some(buffer)
    }

    pub fn reset(&mut self) {
        self.staging.clear();
    }

    #[cfg(test)]
    fn staged_len(&self) -> usize {
        self.staging.len()
    }
}

/// Color/depth destination of a pass.
#[derive(Clone)]
pub(super) enum PassTarget {
    Canvas,
    Framebuffer {
        color: wgpu::TextureView,
        color_format: wgpu::TextureFormat,
        depth: Option<(wgpu::TextureView, wgpu::TextureFormat)>,
        size: (u32, u32),
    },
}

pub(super) struct DrawCall {
    pub program: Arc<CompiledProgram>,
    pub key: PipelineKey,
    pub uniform_offset: u32,
    pub vertex_buffers: Vec<wgpu::Buffer>,
    pub index: Option<(wgpu::Buffer, wgpu::IndexFormat, u32)>,
    pub first_vertex: u32,
    pub vertex_count: u32,
    pub instances: u32,
    pub textures: Vec<wgpu::TextureView>,
    /// x, y, width, height in wgpu (top-left origin) coordinates.
    pub viewport: [f32; 4],
}

pub(super) struct Pass {
    pub target: PassTarget,
    pub clear: Option<wgpu::Color>,
    pub draws: Vec<DrawCall>,
}

impl Pass {
    fn new(target: PassTarget) -> Self {
        Self {
            target,
            clear: None,
            draws: Vec::new(),
        }
    }
}

/// Recording of the frame in flight.
pub(super) struct FrameRecording {
    pub acquired: AcquiredFrame,
    pub passes: Vec<Pass>,
}

impl FrameRecording {
    pub fn new(acquired: AcquiredFrame, target: PassTarget) -> Self {
        Self {
            acquired,
            passes: vec![Pass::new(target)],
        }
    }

    fn current(&mut self) -> &mut Pass {
        if self.passes.is_empty() {
            self.passes.push(Pass::new(PassTarget::Canvas));
        }
        let last = self.passes.len() - 1;
        &mut self.passes[last]
    }

    /// Clears the current target; draws already recorded keep their output.
    pub fn clear(&mut self, color: wgpu::Color) {
        let pass = self.current();
        if pass.draws.is_empty() {
            pass.clear = Some(color);
            return;
        }
        let target = pass.target.clone();
        let mut next = Pass::new(target);
        next.clear = Some(color);
        self.passes.push(next);
    }

    pub fn retarget(&mut self, target: PassTarget) {
        let pass = self.current();
        if pass.draws.is_empty() && pass.clear.is_none() {
            pass.target = target;
        } else {
            self.passes.push(Pass::new(target));
        }
    }

    pub fn push_draw(&mut self, draw: DrawCall) {
        self.current().draws.push(draw);
    }
}

/// Converts a bottom-left-origin viewport to wgpu coordinates, clamped to the target.
pub(super) fn flip_viewport(origin: [i32; 2], size: [i32; 2], target: (u32, u32)) -> [f32; 4] {
    let (tw, th) = (target.0 as i64, target.1 as i64);
    let x0 = (origin[0] as i64).clamp(0, tw);
    let x1 = (origin[0] as i64 + size[0].max(0) as i64).clamp(0, tw);
    let top = th - (origin[1] as i64 + size[1].max(0) as i64);
    let y0 = top.clamp(0, th);
    let y1 = (th - origin[1] as i64).clamp(0, th);
    [
        x0 as f32,
        y0 as f32,
        (x1 - x0).max(1) as f32,
        (y1 - y0).max(1) as f32,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arena_offsets_respect_alignment() {
        let mut arena = UniformArena::new(256);
        assert_eq!(arena.push(&[1; 80]), 0);
        assert_eq!(arena.push(&[2; 16]), 256);
        assert_eq!(arena.push(&[3; 300]), 512);
        assert_eq!(arena.staged_len(), 812);

        arena.reset();
        assert_eq!(arena.push(&[4; 16]), 0);
    }

    #[test]
    fn arena_alignment_has_a_floor() {
        let mut arena = UniformArena::new(4);
        arena.push(&[0; 4]);
        assert_eq!(arena.push(&[0; 4]), 16);
    }

    #[test]
    fn viewport_is_flipped_to_top_left() {
        let v = flip_viewport([0, 0], [100, 50], (200, 100));
        assert_eq!(v, [0.0, 50.0, 100.0, 50.0]);

        let full = flip_viewport([0, 0], [200, 100], (200, 100));
        assert_eq!(full, [0.0, 0.0, 200.0, 100.0]);
    }

    #[test]
    fn viewport_is_clamped_to_target() {
        let v = flip_viewport([150, -20], [100, 100], (200, 100));
        assert_eq!(v, [150.0, 20.0, 50.0, 80.0]);
    }
}
