//! Graphics device abstraction.
//!
//! - `caps`: portable enums (features, formats, blend/cull values)
//! - `resources`: resource traits implemented per backend
//! - `device`: the `GraphicsDevice` factory + command contract
//! - `program` / `uniform`: shader program state machine and uniform layouts
//! - `sync`: compute fences
//!
//! Backends: `wgpu_backend` (windowed, real GPU) and `recording` (headless command log).

pub mod caps;
pub mod device;
pub mod program;
pub mod recording;
pub mod resources;
pub mod sync;
pub mod uniform;
pub mod wgpu_backend;

pub use caps::{
    Attachment, BlendFunc, BlendValue, CubeFace, Face, Feature, Format, IndexFormat,
    InternalFormat, Primitive, ScalarType, ShaderStage, TextureKind,
};
pub use device::{BlendSettings, DeviceState, DrawDesc, GraphicsDevice, IndexedDraw, Viewport};
pub use program::{ProgramState, StagedProgram, TextureSlot, VertexAttrib, VertexInput};
pub use resources::{
    BufferKind, Canvas, ComputeBinding, ComputeShader, Cubemap, Framebuffer, GpuBuffer,
    ResourceId, ShaderBuffer, ShaderProgram, Texture2D, TextureDesc, TextureUsage, UniformBuffer,
    VertexBuffer,
};
pub use sync::{ComputeFence, ResourceSync};
pub use uniform::{UniformBlock, UniformLayout, UniformSlot, UniformTable, UniformType, UniformValue};
