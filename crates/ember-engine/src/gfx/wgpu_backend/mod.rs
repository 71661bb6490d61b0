//! wgpu implementation of `GraphicsDevice`.
//!
//! Immediate-mode commands are recorded per frame (`frame`) and replayed into
//! render passes on `end_frame`. Pipelines are cached per program and state.

mod compute;
mod device;
mod frame;
mod gpu;
mod lookup;
mod program;
mod resources;

pub use compute::WgpuCompute;
pub use device::WgpuDevice;
pub use gpu::{DEPTH_FORMAT, Gpu, GpuInit, SurfaceErrorAction};
pub use program::WgpuProgram;
pub use resources::{WgpuBuffer, WgpuCanvas, WgpuCubemap, WgpuFramebuffer, WgpuTexture2D};
