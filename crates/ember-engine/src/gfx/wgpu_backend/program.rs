use std::num::NonZeroU64;
use std::sync::Arc;

use crate::error::{GraphicsError, Result};
use crate::gfx::caps::{ShaderStage, TextureKind};
use crate::gfx::program::{ProgramState, StagedProgram, VertexInput};
use crate::gfx::resources::{ResourceId, ShaderProgram};
use crate::gfx::uniform::{UniformBlock, UniformLayout, UniformValue};

use super::frame::PipelineKey;
use super::lookup;
use super::resources::BufferCell;

/// Vertex buffer layout owned by a compiled program.
pub(super) struct VertexLayout {
    pub stride: u64,
    pub attributes: Vec<wgpu::VertexAttribute>,
}

/// GPU objects produced by a successful compile.
pub(super) struct CompiledProgram {
    pub vertex: wgpu::ShaderModule,
    pub fragment: Option<wgpu::ShaderModule>,
    pub pipeline_layout: wgpu::PipelineLayout,
    pub uniform_layout: wgpu::BindGroupLayout,
    pub texture_layout: Option<wgpu::BindGroupLayout>,
    pub texture_kinds: Vec<TextureKind>,
    pub vertex_layouts: Vec<VertexLayout>,
    pub uniform_size: u64,
}

#[derive(Clone)]
pub(super) struct BoundTexture {
    pub id: ResourceId,
    pub view: wgpu::TextureView,
}

pub struct WgpuProgram {
    id: ResourceId,
    staged: StagedProgram,
    device: wgpu::Device,
    pub(super) compiled: Option<Arc<CompiledProgram>>,
    pub(super) block: Option<UniformBlock>,
    pub(super) bound_inputs: Vec<Option<BufferCell>>,
    pub(super) bound_textures: Vec<Option<BoundTexture>>,
}

impl WgpuProgram {
    pub(super) fn new(id: ResourceId, device: wgpu::Device) -> Self {
        Self {
            id,
            staged: StagedProgram::default(),
            device,
            compiled: None,
            block: None,
            bound_inputs: Vec::new(),
            bound_textures: Vec::new(),
        }
    }

    pub fn staged(&self) -> &StagedProgram {
        &self.staged
    }

    fn build(&self) -> Result<CompiledProgram> {
        let vertex_src = self
            .staged
            .stage_source_with_prelude(ShaderStage::Vertex)
            .ok_or_else(|| GraphicsError::ShaderCompilation {
                stage: ShaderStage::Vertex.name(),
                message: "a vertex stage is required to draw".to_owned(),
            })?;
        let vertex = create_module(&self.device, ShaderStage::Vertex.name(), &vertex_src)?;

        let fragment = match self.staged.stage_source_with_prelude(ShaderStage::Fragment) {
            Some(src) => Some(create_module(
                &self.device,
                ShaderStage::Fragment.name(),
                &src,
            )?),
            None => None,
        };

        let uniform_size = self.block.as_ref().map_or(16, |b| b.table().size()) as u64;
        let uniform_layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("ember uniform layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: NonZeroU64::new(uniform_size),
                    },
                    count: None,
                }],
            });

        let texture_kinds: Vec<TextureKind> =
            self.staged.textures().iter().map(|t| t.kind).collect();
        let texture_layout = (!texture_kinds.is_empty())
            .then(|| create_texture_layout(&self.device, &texture_kinds));

        let mut layouts = vec![&uniform_layout];
        if let Some(l) = &texture_layout {
            layouts.push(l);
        }
        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("ember program layout"),
                bind_group_layouts: &layouts,
                immediate_size: 0,
            });

        let vertex_layouts = self
            .staged
            .inputs()
            .iter()
            .map(vertex_layout)
            .collect::<Result<Vec<_>>>()?;

        Ok(CompiledProgram {
            vertex,
            fragment,
            pipeline_layout,
            uniform_layout,
            texture_layout,
            texture_kinds,
            vertex_layouts,
            uniform_size,
        })
    }
}

impl ShaderProgram for WgpuProgram {
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
        self.block = Some(UniformBlock::new(table));

        if !self.staged.is_noop() {
            let compiled = self.build().inspect_err(|_| self.block = None)?;
            self.compiled = Some(Arc::new(compiled));
        }

        self.bound_textures = vec![None; self.staged.textures().len()];
        self.staged.mark_compiled();
        log::debug!(
            "compiled program {} ({} texture slots, {} inputs)",
            self.id,
            self.staged.textures().len(),
            self.staged.inputs().len()
        );
        Ok(())
    }

    fn use_program(&mut self) -> Result<()> {
        self.staged.ensure_compiled()
    }

    fn set_uniform(&mut self, name: &str, value: UniformValue) {
        if let Some(block) = &mut self.block {
            block.write(name, value);
        }
    }
}

/// Compiles WGSL into a module, surfacing validation errors instead of panicking.
pub(super) fn create_module(
    device: &wgpu::Device,
    stage: &'static str,
    source: &str,
) -> Result<wgpu::ShaderModule> {
    let scope = device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(stage),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });
    match pollster::block_on(scope.pop()) {
        Some(err) => Err(GraphicsError::ShaderCompilation {
            stage,
            message: err.to_string(),
        }),
        None => Ok(module),
    }
}

fn create_texture_layout(device: &wgpu::Device, kinds: &[TextureKind]) -> wgpu::BindGroupLayout {
    let entries: Vec<wgpu::BindGroupLayoutEntry> = kinds
        .iter()
        .enumerate()
        .flat_map(|(k, kind)| {
            let view_dimension = match kind {
                TextureKind::D2 => wgpu::TextureViewDimension::D2,
                TextureKind::Cube => wgpu::TextureViewDimension::Cube,
            };
            let binding = 2 * k as u32;
            [
                wgpu::BindGroupLayoutEntry {
                    binding,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: binding + 1,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ]
        })
        .collect();

    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("ember texture layout"),
        entries: &entries,
    })
}

fn vertex_layout(input: &VertexInput) -> Result<VertexLayout> {
    let attributes = input
        .attribs
        .iter()
        .map(|a| {
            Ok(wgpu::VertexAttribute {
                format: lookup::vertex_format(a.components, a.scalar)?,
                offset: a.offset,
                shader_location: a.location,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(VertexLayout {
        stride: input.stride,
        attributes,
    })
}

/// Builds the render pipeline for one program/state combination.
pub(super) fn create_pipeline(
    device: &wgpu::Device,
    program: &CompiledProgram,
    key: &PipelineKey,
) -> wgpu::RenderPipeline {
    let buffers: Vec<wgpu::VertexBufferLayout<'_>> = program
        .vertex_layouts
        .iter()
        .map(|l| wgpu::VertexBufferLayout {
            array_stride: l.stride,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &l.attributes,
        })
        .collect();

    let targets = [Some(wgpu::ColorTargetState {
        format: key.color_format,
        blend: key.blend,
        write_mask: wgpu::ColorWrites::ALL,
    })];

    let depth_stencil = key.depth_format.map(|format| wgpu::DepthStencilState {
        format,
        depth_write_enabled: key.depth_test,
        depth_compare: if key.depth_test {
            wgpu::CompareFunction::Less
        } else {
            wgpu::CompareFunction::Always
        },
        stencil: wgpu::StencilState::default(),
        bias: wgpu::DepthBiasState::default(),
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("ember pipeline"),
        layout: Some(&program.pipeline_layout),
        vertex: wgpu::VertexState {
            module: &program.vertex,
            entry_point: Some(ShaderStage::Vertex.entry_point()),
            compilation_options: Default::default(),
            buffers: &buffers,
        },
        fragment: program.fragment.as_ref().map(|module| wgpu::FragmentState {
            module,
            entry_point: Some(ShaderStage::Fragment.entry_point()),
            compilation_options: Default::default(),
            targets: &targets,
        }),
        primitive: wgpu::PrimitiveState {
            topology: key.topology,
            strip_index_format: key.strip_index,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: key.cull,
            unclipped_depth: false,
            polygon_mode: wgpu::PolygonMode::Fill,
            conservative: false,
        },
        depth_stencil,
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    })
}
