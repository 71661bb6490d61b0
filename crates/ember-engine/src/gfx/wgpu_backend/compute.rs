use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{GraphicsError, Result};
use crate::gfx::resources::{ComputeBinding, ComputeShader, ResourceId};
use crate::gfx::sync::ResourceSync;

use super::lookup;
use super::program::create_module;
use super::resources::BufferCell;

pub(super) enum ComputeResource {
    Buffer(BufferCell),
    Image {
        view: wgpu::TextureView,
        sync: Arc<ResourceSync>,
    },
}

pub(super) struct CompiledCompute {
    pub pipeline: wgpu::ComputePipeline,
    pub layout: wgpu::BindGroupLayout,
}

/// Compute shader; the source declares its own `@group(0)` bindings.
pub struct WgpuCompute {
    id: ResourceId,
    device: wgpu::Device,
    source: Option<String>,
    pub(super) declared: BTreeMap<u32, ComputeBinding>,
    pub(super) bound: BTreeMap<u32, ComputeResource>,
    pub(super) compiled: Option<CompiledCompute>,
}

impl WgpuCompute {
    pub(super) fn new(id: ResourceId, device: wgpu::Device) -> Self {
        Self {
            id,
            device,
            source: None,
            declared: BTreeMap::new(),
            bound: BTreeMap::new(),
            compiled: None,
        }
    }

    fn layout_entry(binding: u32, kind: ComputeBinding) -> Result<wgpu::BindGroupLayoutEntry> {
        let ty = match kind {
            ComputeBinding::UniformBuffer => wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            ComputeBinding::StorageBuffer { read_only } => wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            ComputeBinding::StorageImage { format } => wgpu::BindingType::StorageTexture {
                access: wgpu::StorageTextureAccess::WriteOnly,
                format: lookup::texture_format(format)?,
                view_dimension: wgpu::TextureViewDimension::D2,
            },
        };
        Ok(wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty,
            count: None,
        })
    }
}

impl ComputeShader for WgpuCompute {
    fn id(&self) -> ResourceId {
        self.id
    }

    fn set_source(&mut self, source: &str) -> Result<()> {
        if self.compiled.is_some() {
            return Err(GraphicsError::AlreadyCompiled);
        }
        self.source = Some(source.to_owned());
        Ok(())
    }

    fn declare_binding(&mut self, binding: u32, kind: ComputeBinding) -> Result<()> {
        if self.compiled.is_some() {
            return Err(GraphicsError::AlreadyCompiled);
        }
        if let ComputeBinding::StorageImage { format } = kind {
            lookup::storage_texel_format(format)?;
        }
        self.declared.insert(binding, kind);
        Ok(())
    }

    fn compile(&mut self) -> Result<()> {
        if self.compiled.is_some() {
            return Err(GraphicsError::AlreadyCompiled);
        }
        let source = self.source.as_deref().ok_or_else(|| GraphicsError::ShaderCompilation {
            stage: "compute",
            message: "no source staged".to_owned(),
        })?;
        let module = create_module(&self.device, "compute", source)?;

        let entries = self
            .declared
            .iter()
            .map(|(&binding, &kind)| Self::layout_entry(binding, kind))
            .collect::<Result<Vec<_>>>()?;
        let layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("ember compute layout"),
                entries: &entries,
            });
        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("ember compute pipeline layout"),
                bind_group_layouts: &[&layout],
                immediate_size: 0,
            });
        let pipeline = self
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("ember compute pipeline"),
                layout: Some(&pipeline_layout),
                module: &module,
                entry_point: Some("cs_main"),
                compilation_options: Default::default(),
                cache: None,
            });

        self.compiled = Some(CompiledCompute { pipeline, layout });
        log::debug!("compiled compute shader {}", self.id);
        Ok(())
    }

    fn is_compiled(&self) -> bool {
        self.compiled.is_some()
    }
}
