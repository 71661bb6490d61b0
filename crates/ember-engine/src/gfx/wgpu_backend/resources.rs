use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use winit::window::Window;

use crate::error::{GraphicsError, Result};
use crate::gfx::caps::{Attachment, CubeFace, Format, InternalFormat};
use crate::gfx::resources::{
    BufferKind, Canvas, Cubemap, Framebuffer, GpuBuffer, ResourceId, ShaderBuffer, Texture2D,
    TextureDesc, UniformBuffer, VertexBuffer, normalize_pixels,
};
use crate::gfx::sync::ResourceSync;

use super::lookup;

// ── canvas ──

/// Window-backed canvas. Size always reflects the live window.
pub struct WgpuCanvas {
    window: Arc<Window>,
    title: String,
    close_requested: bool,
}

impl WgpuCanvas {
    pub(super) fn new(window: Arc<Window>, title: &str) -> Self {
        Self {
            window,
            title: title.to_owned(),
            close_requested: false,
        }
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }
}

impl Canvas for WgpuCanvas {
    fn width(&self) -> u32 {
        self.window.inner_size().width
    }

    fn height(&self) -> u32 {
        self.window.inner_size().height
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

// ── buffers ──

/// Allocation shared with the programs and compute shaders a buffer is bound to,
/// so a regrown buffer is picked up without rebinding.
pub(super) type BufferCell = Rc<RefCell<Option<wgpu::Buffer>>>;

pub(super) fn resolve_cell(cell: &BufferCell, what: &str) -> Result<wgpu::Buffer> {
    cell.borrow()
        .clone()
        .ok_or_else(|| GraphicsError::UnboundResource(format!("data of {what}")))
}

/// GPU buffer serving every buffer role; usage flags follow `kind`.
pub struct WgpuBuffer {
    id: ResourceId,
    kind: BufferKind,
    device: wgpu::Device,
    queue: wgpu::Queue,
    buffer: BufferCell,
    len: u64,
}

impl WgpuBuffer {
    pub(super) fn new(
        id: ResourceId,
        kind: BufferKind,
        device: wgpu::Device,
        queue: wgpu::Queue,
    ) -> Self {
        Self {
            id,
            kind,
            device,
            queue,
            buffer: Rc::new(RefCell::new(None)),
            len: 0,
        }
    }

    pub(super) fn cell(&self) -> BufferCell {
        self.buffer.clone()
    }

    pub(super) fn raw(&self) -> Result<wgpu::Buffer> {
        resolve_cell(&self.buffer, &format!("buffer {}", self.id))
    }

    fn usage(&self) -> wgpu::BufferUsages {
        let role = match self.kind {
            BufferKind::Vertex => wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::INDEX,
            BufferKind::Uniform => wgpu::BufferUsages::UNIFORM,
            BufferKind::Storage => wgpu::BufferUsages::STORAGE,
        };
        role | wgpu::BufferUsages::COPY_DST
    }

    fn alignment(&self) -> u64 {
        match self.kind {
            BufferKind::Uniform => 16,
            _ => wgpu::COPY_BUFFER_ALIGNMENT,
        }
    }
}

impl GpuBuffer for WgpuBuffer {
    fn id(&self) -> ResourceId {
        self.id
    }

    fn kind(&self) -> BufferKind {
        self.kind
    }

    fn len(&self) -> u64 {
        self.len
    }

    fn set_data(&mut self, data: &[u8]) -> Result<()> {
        self.len = data.len() as u64;
        if data.is_empty() {
            return Ok(());
        }

        let align = self.alignment();
        let padded_len = (data.len() as u64).div_ceil(align) * align;

        let mut slot = self.buffer.borrow_mut();
        let buffer = match slot.as_ref() {
            Some(b) if b.size() >= padded_len => b.clone(),
            _ => {
                let b = self.device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("ember buffer"),
                    size: padded_len.next_power_of_two(),
                    usage: self.usage(),
                    mapped_at_creation: false,
                });
                *slot = Some(b.clone());
                b
            }
        };

        if padded_len == data.len() as u64 {
            self.queue.write_buffer(&buffer, 0, data);
        } else {
            let mut padded = data.to_vec();
            padded.resize(padded_len as usize, 0);
            self.queue.write_buffer(&buffer, 0, &padded);
        }
        Ok(())
    }
}

impl VertexBuffer for WgpuBuffer {}
impl UniformBuffer for WgpuBuffer {}
impl ShaderBuffer for WgpuBuffer {}

// ── 2D texture ──

pub struct WgpuTexture2D {
    id: ResourceId,
    device: wgpu::Device,
    queue: wgpu::Queue,
    desc: Option<TextureDesc>,
    texture: Option<wgpu::Texture>,
    view: Option<wgpu::TextureView>,
    sync: Arc<ResourceSync>,
}

impl WgpuTexture2D {
    pub(super) fn new(id: ResourceId, device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self {
            id,
            device,
            queue,
            desc: None,
            texture: None,
            view: None,
            sync: ResourceSync::new(),
        }
    }

    pub(super) fn view(&self) -> Result<&wgpu::TextureView> {
        self.view
            .as_ref()
            .ok_or_else(|| GraphicsError::UnboundResource(format!("storage of texture {}", self.id)))
    }
}

impl Texture2D for WgpuTexture2D {
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
        let format = lookup::texture_format(desc.format)?;

        let mut usage = wgpu::TextureUsages::empty();
        if desc.usage.sampled {
            usage |= wgpu::TextureUsages::TEXTURE_BINDING;
        }
        if desc.usage.storage {
            usage |= wgpu::TextureUsages::STORAGE_BINDING;
        }
        if desc.usage.render_target || desc.format.is_depth() {
            usage |= wgpu::TextureUsages::RENDER_ATTACHMENT;
        }
        if !desc.format.is_depth() {
            usage |= wgpu::TextureUsages::COPY_DST;
        }

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("ember texture2d"),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });

        self.view = Some(texture.create_view(&wgpu::TextureViewDescriptor::default()));
        self.texture = Some(texture);
        self.desc = Some(desc);
        Ok(())
    }

    fn upload(&mut self, format: Format, pixels: &[u8]) -> Result<()> {
        let (Some(desc), Some(texture)) = (self.desc, self.texture.as_ref()) else {
            return Err(GraphicsError::UnboundResource(format!(
                "storage of texture {}",
                self.id
            )));
        };
        if desc.format.is_depth() {
            return Err(GraphicsError::unsupported("depth texture upload", desc.format));
        }

        let data = normalize_pixels(desc.format, desc.width, desc.height, format, pixels)?;
        write_layer(&self.queue, texture, desc.format, desc.width, desc.height, 0, &data);
        Ok(())
    }

    fn sync(&self) -> &Arc<ResourceSync> {
        &self.sync
    }
}

// ── cubemap ──

pub struct WgpuCubemap {
    id: ResourceId,
    device: wgpu::Device,
    queue: wgpu::Queue,
    size: Option<u32>,
    format: InternalFormat,
    texture: Option<wgpu::Texture>,
    view: Option<wgpu::TextureView>,
}

impl WgpuCubemap {
    pub(super) fn new(id: ResourceId, device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self {
            id,
            device,
            queue,
            size: None,
            format: InternalFormat::Rgba8,
            texture: None,
            view: None,
        }
    }

    pub(super) fn view(&self) -> Result<&wgpu::TextureView> {
        self.view
            .as_ref()
            .ok_or_else(|| GraphicsError::UnboundResource(format!("storage of cubemap {}", self.id)))
    }
}

impl Cubemap for WgpuCubemap {
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
        if format.is_depth() {
            return Err(GraphicsError::unsupported("cubemap format", format));
        }
        let wgpu_format = lookup::texture_format(format)?;

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("ember cubemap"),
            size: wgpu::Extent3d {
                width: size,
                height: size,
                depth_or_array_layers: 6,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu_format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        self.view = Some(texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("ember cubemap view"),
            dimension: Some(wgpu::TextureViewDimension::Cube),
            ..Default::default()
        }));
        self.texture = Some(texture);
        self.size = Some(size);
        self.format = format;
        Ok(())
    }

    fn upload_face(&mut self, face: CubeFace, format: Format, pixels: &[u8]) -> Result<()> {
        let (Some(size), Some(texture)) = (self.size, self.texture.as_ref()) else {
            return Err(GraphicsError::UnboundResource(format!(
                "storage of cubemap {}",
                self.id
            )));
        };
        let data = normalize_pixels(self.format, size, size, format, pixels)?;
        write_layer(&self.queue, texture, self.format, size, size, face.layer(), &data);
        Ok(())
    }
}

fn write_layer(
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    format: InternalFormat,
    width: u32,
    height: u32,
    layer: u32,
    data: &[u8],
) {
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d { x: 0, y: 0, z: layer },
            aspect: wgpu::TextureAspect::All,
        },
        data,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(width * format.texel_size() as u32),
            rows_per_image: Some(height),
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
}

// ── framebuffer ──

#[derive(Clone)]
pub(super) struct AttachedView {
    pub id: ResourceId,
    pub view: wgpu::TextureView,
    pub format: wgpu::TextureFormat,
    pub width: u32,
    pub height: u32,
}

pub struct WgpuFramebuffer {
    id: ResourceId,
    pub(super) color: Option<AttachedView>,
    pub(super) depth: Option<AttachedView>,
}

impl WgpuFramebuffer {
    pub(super) fn new(id: ResourceId) -> Self {
        Self {
            id,
            color: None,
            depth: None,
        }
    }
}

impl Framebuffer for WgpuFramebuffer {
    fn id(&self) -> ResourceId {
        self.id
    }

    fn size(&self) -> Option<(u32, u32)> {
        self.color
            .as_ref()
            .or(self.depth.as_ref())
            .map(|a| (a.width, a.height))
    }

    fn has_attachment(&self, attachment: Attachment) -> bool {
        match attachment {
            Attachment::Color => self.color.is_some(),
            Attachment::Depth => self.depth.is_some(),
        }
    }
}
