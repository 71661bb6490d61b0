use std::cell::RefCell;
use std::rc::Rc;

use glam::{IVec2, Vec4};

use crate::gfx::caps::{Attachment, BlendFunc, BlendValue, CubeFace, Face, Feature, Primitive};
use crate::gfx::resources::{BufferKind, ResourceId};
use crate::gfx::uniform::UniformValue;

/// Shared, single-threaded command log.
pub type CommandLog = Rc<RefCell<Vec<Command>>>;

/// A draw as it reached the device.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub program: ResourceId,
    pub primitive: Primitive,
    pub vertex_count: u32,
    pub first_vertex: u32,
    pub instance_count: u32,
    pub index_count: Option<u32>,
    pub vertex_buffers: Vec<ResourceId>,
    pub framebuffer: Option<ResourceId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    BeginFrame,
    EndFrame,
    Resize {
        width: u32,
        height: u32,
    },

    EnableFeature(Feature),
    DisableFeature(Feature),
    SetBlend {
        func: BlendFunc,
        src: BlendValue,
        dst: BlendValue,
    },
    SetCullFace(Face),
    SetViewport {
        origin: IVec2,
        size: IVec2,
    },
    SetClearColor(Vec4),
    Clear {
        color: Vec4,
    },

    CompileProgram {
        program: ResourceId,
        stages: usize,
    },
    UseProgram(ResourceId),
    SetUniform {
        program: ResourceId,
        name: String,
        value: UniformValue,
    },
    BindTexture {
        program: ResourceId,
        name: String,
        texture: Option<ResourceId>,
    },

    UploadBuffer {
        buffer: ResourceId,
        kind: BufferKind,
        bytes: usize,
    },
    UploadTexture {
        texture: ResourceId,
        bytes: usize,
    },
    UploadCubeFace {
        cubemap: ResourceId,
        face: CubeFace,
        bytes: usize,
    },

    Attach {
        framebuffer: ResourceId,
        attachment: Attachment,
        texture: ResourceId,
    },
    BindFramebuffer(Option<ResourceId>),

    Draw(DrawRecord),

    CompileCompute(ResourceId),
    Dispatch {
        shader: ResourceId,
        groups: [u32; 3],
        /// Resource bound at each binding index.
        bindings: Vec<(u32, ResourceId)>,
        fence: u64,
    },
    MemoryBarrier {
        fence: u64,
    },
}
