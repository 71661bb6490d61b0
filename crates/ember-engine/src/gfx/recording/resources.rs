use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{GraphicsError, Result};
use crate::gfx::caps::{Attachment, CubeFace, Format, InternalFormat, ShaderStage, TextureKind};
use crate::gfx::program::{ProgramState, StagedProgram, VertexInput};
use crate::gfx::resources::{
    BufferKind, Canvas, ComputeBinding, ComputeShader, Cubemap, Framebuffer, GpuBuffer,
    ResourceId, ShaderBuffer, ShaderProgram, Texture2D, TextureDesc, UniformBuffer, VertexBuffer,
    normalize_pixels,
};
use crate::gfx::sync::ResourceSync;
use crate::gfx::uniform::{UniformLayout, UniformTable, UniformValue};

use super::commands::{Command, CommandLog};

// ── canvas ──

#[derive(Debug, Clone)]
pub struct RecordingCanvas {
    pub(super) width: u32,
    pub(super) height: u32,
    title: String,
    close_requested: bool,
}

impl RecordingCanvas {
    pub(super) fn new(width: u32, height: u32, title: &str) -> Self {
        Self {
            width,
            height,
            title: title.to_owned(),
            close_requested: false,
        }
    }
}

impl Canvas for RecordingCanvas {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn should_close(&self) -> bool {
        self.close_requested
    }

    fn request_close(&mut self) {
        self.close_requested = true;
    }
}

// ── shader program ──

#[derive(Debug)]
pub struct RecordingProgram {
    id: ResourceId,
    staged: StagedProgram,
    table: Option<UniformTable>,
    pub(super) bound_inputs: Vec<Option<ResourceId>>,
    pub(super) bound_textures: Vec<Option<ResourceId>>,
    log: CommandLog,
}

impl RecordingProgram {
    pub(super) fn new(id: ResourceId, log: CommandLog) -> Self {
        Self {
            id,
            staged: StagedProgram::default(),
            table: None,
            bound_inputs: Vec::new(),
            bound_textures: Vec::new(),
            log,
        }
    }

    pub fn staged(&self) -> &StagedProgram {
        &self.staged
    }

    pub fn uniform_table(&self) -> Option<&UniformTable> {
        self.table.as_ref()
    }
}

impl ShaderProgram for RecordingProgram {
    fn id(&self) -> ResourceId {
        self.id
    }

    fn state(&self) -> ProgramState {
        self.staged.state()
    }

    fn add_stage(&mut self, stage: ShaderStage, source: &str) -> Result<()> {
        self.staged.add_stage(stage, source)
    }

    fn set_uniform_layout(&mut self, layout: UniformLayout) -> Result<()> {
        self.staged.set_layout(layout)
    }

    fn add_texture_slot(&mut self, name: &str, kind: TextureKind) -> Result<()> {
        self.staged.add_texture_slot(name, kind)
    }

    fn add_input(&mut self, input: VertexInput) -> Result<u32> {
        let slot = self.staged.add_input(input)?;
        self.bound_inputs.push(None);
        Ok(slot)
    }

    fn compile(&mut self) -> Result<()> {
        let table = self.staged.begin_compile()?;

        let mut stages = 0;
        for stage in ShaderStage::ALL {
            let Some(source) = self.staged.stage(stage) else {
                continue;
            };
            let entry = format!("fn {}", stage.entry_point());
            if !source.contains(&entry) {
                return Err(GraphicsError::ShaderCompilation {
                    stage: stage.name(),
                    message: format!("missing entry point `{}`", stage.entry_point()),
                });
            }
            stages += 1;
        }

        self.bound_textures = vec![None; self.staged.textures().len()];
        self.table = Some(table);
        self.staged.mark_compiled();
        self.log.borrow_mut().push(Command::CompileProgram {
            program: self.id,
            stages,
        });
        Ok(())
    }

    fn use_program(&mut self) -> Result<()> {
        self.staged.ensure_compiled()?;
        self.log.borrow_mut().push(Command::UseProgram(self.id));
        Ok(())
    }

    fn set_uniform(&mut self, name: &str, value: UniformValue) {
        let Some(table) = &self.table else {
            return;
        };
        if table.lookup(name, &value).is_none() {
            return;
        }
        self.log.borrow_mut().push(Command::SetUniform {
            program: self.id,
            name: name.to_owned(),
            value,
        });
    }
}

// ── compute ──

#[derive(Debug, Clone)]
pub(super) struct ComputeBound {
    pub resource: ResourceId,
    pub image_sync: Option<Arc<ResourceSync>>,
}

#[derive(Debug)]
pub struct RecordingCompute {
    id: ResourceId,
    source: Option<String>,
    pub(super) declared: BTreeMap<u32, ComputeBinding>,
    pub(super) bound: BTreeMap<u32, ComputeBound>,
    compiled: bool,
    log: CommandLog,
}

impl RecordingCompute {
    pub(super) fn new(id: ResourceId, log: CommandLog) -> Self {
        Self {
            id,
            source: None,
            declared: BTreeMap::new(),
            bound: BTreeMap::new(),
            compiled: false,
            log,
        }
    }
}

impl ComputeShader for RecordingCompute {
    fn id(&self) -> ResourceId {
        self.id
    }

    fn set_source(&mut self, source: &str) -> Result<()> {
        if self.compiled {
            return Err(GraphicsError::AlreadyCompiled);
        }
        self.source = Some(source.to_owned());
        Ok(())
    }

    fn declare_binding(&mut self, binding: u32, kind: ComputeBinding) -> Result<()> {
        if self.compiled {
            return Err(GraphicsError::AlreadyCompiled);
        }
        self.declared.insert(binding, kind);
        Ok(())
    }

    fn compile(&mut self) -> Result<()> {
        if self.compiled {
            return Err(GraphicsError::AlreadyCompiled);
        }
        let source = self.source.as_deref().unwrap_or_default();
        if !source.contains("fn cs_main") {
            return Err(GraphicsError::ShaderCompilation {
                stage: "compute",
                message: "missing entry point `cs_main`".to_owned(),
            });
        }
        self.compiled = true;
        self.log.borrow_mut().push(Command::CompileCompute(self.id));
        Ok(())
    }

    fn is_compiled(&self) -> bool {
        self.compiled
    }
}

// ── textures ──

#[derive(Debug)]
pub struct RecordingTexture {
    id: ResourceId,
    desc: Option<TextureDesc>,
    sync: Arc<ResourceSync>,
    log: CommandLog,
}

impl RecordingTexture {
    pub(super) fn new(id: ResourceId, log: CommandLog) -> Self {
        Self {
            id,
            desc: None,
            sync: ResourceSync::new(),
            log,
        }
    }
}

impl Texture2D for RecordingTexture {
    fn id(&self) -> ResourceId {
        self.id
    }

    fn desc(&self) -> Option<&TextureDesc> {
        self.desc.as_ref()
    }

    fn allocate(&mut self, desc: TextureDesc) -> Result<()> {
        if desc.width == 0 || desc.height == 0 {
            return Err(GraphicsError::creation("texture", "zero-sized extent"));
        }
        self.desc = Some(desc);
        Ok(())
    }

    fn upload(&mut self, format: Format, pixels: &[u8]) -> Result<()> {
        let desc = self
            .desc
            .ok_or_else(|| GraphicsError::UnboundResource(format!("storage of texture {}", self.id)))?;
        let data = normalize_pixels(desc.format, desc.width, desc.height, format, pixels)?;
        self.log.borrow_mut().push(Command::UploadTexture {
            texture: self.id,
            bytes: data.len(),
        });
        Ok(())
    }

    fn sync(&self) -> &Arc<ResourceSync> {
        &self.sync
    }
}

#[derive(Debug)]
pub struct RecordingCubemap {
    id: ResourceId,
    size: Option<u32>,
    format: InternalFormat,
    log: CommandLog,
}

impl RecordingCubemap {
    pub(super) fn new(id: ResourceId, log: CommandLog) -> Self {
        Self {
            id,
            size: None,
            format: InternalFormat::Rgba8,
            log,
        }
    }
}

impl Cubemap for RecordingCubemap {
    fn id(&self) -> ResourceId {
        self.id
    }

    fn size(&self) -> Option<u32> {
        self.size
    }

    fn allocate(&mut self, size: u32, format: InternalFormat) -> Result<()> {
        if size == 0 {
            return Err(GraphicsError::creation("cubemap", "zero-sized extent"));
        }
        self.size = Some(size);
        self.format = format;
        Ok(())
    }

    fn upload_face(&mut self, face: CubeFace, format: Format, pixels: &[u8]) -> Result<()> {
        let size = self
            .size
            .ok_or_else(|| GraphicsError::UnboundResource(format!("storage of cubemap {}", self.id)))?;
        let data = normalize_pixels(self.format, size, size, format, pixels)?;
        self.log.borrow_mut().push(Command::UploadCubeFace {
            cubemap: self.id,
            face,
            bytes: data.len(),
        });
        Ok(())
    }
}

// ── buffers ──

/// One buffer type serves every buffer role; `kind` records which.
#[derive(Debug)]
pub struct RecordingBuffer {
    id: ResourceId,
    kind: BufferKind,
    data: Vec<u8>,
    log: CommandLog,
}

impl RecordingBuffer {
    pub(super) fn new(id: ResourceId, kind: BufferKind, log: CommandLog) -> Self {
        Self {
            id,
            kind,
            data: Vec::new(),
            log,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl GpuBuffer for RecordingBuffer {
    fn id(&self) -> ResourceId {
        self.id
    }

    fn kind(&self) -> BufferKind {
        self.kind
    }

    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn set_data(&mut self, data: &[u8]) -> Result<()> {
        self.data.clear();
        self.data.extend_from_slice(data);
        self.log.borrow_mut().push(Command::UploadBuffer {
            buffer: self.id,
            kind: self.kind,
            bytes: data.len(),
        });
        Ok(())
    }
}

impl VertexBuffer for RecordingBuffer {}
impl UniformBuffer for RecordingBuffer {}
impl ShaderBuffer for RecordingBuffer {}

// ── framebuffer ──

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(super) struct AttachedTexture {
    pub texture: ResourceId,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug)]
pub struct RecordingFramebuffer {
    id: ResourceId,
    pub(super) color: Option<AttachedTexture>,
    pub(super) depth: Option<AttachedTexture>,
}

impl RecordingFramebuffer {
    pub(super) fn new(id: ResourceId) -> Self {
        Self {
            id,
            color: None,
            depth: None,
        }
    }
}

impl Framebuffer for RecordingFramebuffer {
    fn id(&self) -> ResourceId {
        self.id
    }

    fn size(&self) -> Option<(u32, u32)> {
        self.color.or(self.depth).map(|a| (a.width, a.height))
    }

    fn has_attachment(&self, attachment: Attachment) -> bool {
        match attachment {
            Attachment::Color => self.color.is_some(),
            Attachment::Depth => self.depth.is_some(),
        }
    }
}
