//! Backend-independent half of a shader program.
//!
//! `StagedProgram` owns the state machine (`Empty → Staged → Compiled`) and the
//! declarations gathered before compilation. Backends wrap it and attach their
//! compiled GPU objects once `compile` succeeds.

use std::fmt::Write as _;

use crate::error::{GraphicsError, Result};
use crate::gfx::caps::{ScalarType, ShaderStage, TextureKind};
use crate::gfx::uniform::{UniformLayout, UniformTable};

/// Bind group holding the uniform block.
pub const UNIFORM_GROUP: u32 = 0;
/// Bind group holding sampled textures; slot `k` uses bindings `2k` (texture) and `2k + 1` (sampler).
pub const TEXTURE_GROUP: u32 = 1;
/// Name of the uniform block variable visible to stage sources.
pub const UNIFORM_VAR: &str = "u";

#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum ProgramState {
    #[default]
    Empty,
    Staged,
    Compiled,
}

/// One attribute read from a vertex buffer.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct VertexAttrib {
    pub location: u32,
    pub components: u8,
    pub scalar: ScalarType,
    pub offset: u64,
}

/// Layout of one vertex buffer.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct VertexInput {
    pub stride: u64,
    pub attribs: Vec<VertexAttrib>,
}

impl VertexInput {
    /// Tightly packed buffer carrying a single attribute.
    pub fn single(location: u32, components: u8, scalar: ScalarType) -> Self {
        Self {
            stride: components as u64 * scalar.size(),
            attribs: vec![VertexAttrib {
                location,
                components,
                scalar,
                offset: 0,
            }],
        }
    }

    pub fn interleaved(stride: u64, attribs: Vec<VertexAttrib>) -> Self {
        Self { stride, attribs }
    }
}

/// Sampled texture declared by a program.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TextureSlot {
    pub name: String,
    pub kind: TextureKind,
}

#[derive(Debug, Default)]
pub struct StagedProgram {
    state: ProgramState,
    stages: [Option<String>; ShaderStage::COUNT],
    layout: UniformLayout,
    textures: Vec<TextureSlot>,
    inputs: Vec<VertexInput>,
}

impl StagedProgram {
    pub fn state(&self) -> ProgramState {
        self.state
    }

    pub fn add_stage(&mut self, stage: ShaderStage, source: &str) -> Result<()> {
        self.ensure_open()?;
        self.stages[stage.index()] = Some(source.to_owned());
        self.state = ProgramState::Staged;
        Ok(())
    }

    pub fn set_layout(&mut self, layout: UniformLayout) -> Result<()> {
        self.ensure_open()?;
        self.layout = layout;
        Ok(())
    }

    pub fn add_texture_slot(&mut self, name: &str, kind: TextureKind) -> Result<()> {
        self.ensure_open()?;
        match self.textures.iter_mut().find(|t| t.name == name) {
            Some(slot) => slot.kind = kind,
            None => self.textures.push(TextureSlot {
                name: name.to_owned(),
                kind,
            }),
        }
        Ok(())
    }

    pub fn add_input(&mut self, input: VertexInput) -> Result<u32> {
        self.ensure_open()?;
        self.inputs.push(input);
        Ok(self.inputs.len() as u32 - 1)
    }

    /// Validates that a compile may start and returns the uniform table to cache.
    pub fn begin_compile(&self) -> Result<UniformTable> {
        self.ensure_open()?;
        Ok(self.layout.resolve())
    }

    pub fn mark_compiled(&mut self) {
        self.state = ProgramState::Compiled;
    }

    pub fn ensure_compiled(&self) -> Result<()> {
        match self.state {
            ProgramState::Compiled => Ok(()),
            _ => Err(GraphicsError::NotCompiled),
        }
    }

    /// True when the program compiled without any stage and draws must be skipped.
    pub fn is_noop(&self) -> bool {
        self.stages.iter().all(Option::is_none)
    }

    pub fn stage(&self, stage: ShaderStage) -> Option<&str> {
        self.stages[stage.index()].as_deref()
    }

    pub fn layout(&self) -> &UniformLayout {
        &self.layout
    }

    pub fn textures(&self) -> &[TextureSlot] {
        &self.textures
    }

    pub fn texture_index(&self, name: &str) -> Option<usize> {
        self.textures.iter().position(|t| t.name == name)
    }

    pub fn inputs(&self) -> &[VertexInput] {
        &self.inputs
    }

    /// Stage source with the generated resource declarations prepended.
    pub fn stage_source_with_prelude(&self, stage: ShaderStage) -> Option<String> {
        let source = self.stage(stage)?;
        let mut out = wgsl_prelude(&self.layout, &self.textures);
        out.push('\n');
        out.push_str(source);
        Some(out)
    }

    fn ensure_open(&self) -> Result<()> {
        match self.state {
            ProgramState::Compiled => Err(GraphicsError::AlreadyCompiled),
            _ => Ok(()),
        }
    }
}

/// WGSL declarations for the uniform block and every texture slot.
pub fn wgsl_prelude(layout: &UniformLayout, textures: &[TextureSlot]) -> String {
    let mut out = layout.wgsl_declarations(UNIFORM_GROUP, 0, UNIFORM_VAR);
    for (k, slot) in textures.iter().enumerate() {
        let ty = match slot.kind {
            TextureKind::D2 => "texture_2d<f32>",
            TextureKind::Cube => "texture_cube<f32>",
        };
        let binding = 2 * k as u32;
        let _ = writeln!(
            out,
            "@group({TEXTURE_GROUP}) @binding({binding}) var {}: {ty};",
            slot.name
        );
        let _ = writeln!(
            out,
            "@group({TEXTURE_GROUP}) @binding({}) var {}Sampler: sampler;",
            binding + 1,
            slot.name
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::uniform::UniformType;

    #[test]
    fn stages_move_empty_to_staged() {
        let mut p = StagedProgram::default();
        assert_eq!(p.state(), ProgramState::Empty);

        p.add_stage(ShaderStage::Vertex, "fn vs_main() {}").unwrap();
        assert_eq!(p.state(), ProgramState::Staged);
        assert!(!p.is_noop());
    }

    #[test]
    fn declarations_close_after_compile() {
        let mut p = StagedProgram::default();
        p.add_stage(ShaderStage::Vertex, "a").unwrap();
        p.begin_compile().unwrap();
        p.mark_compiled();

        assert!(matches!(
            p.add_stage(ShaderStage::Fragment, "b"),
            Err(GraphicsError::AlreadyCompiled)
        ));
        assert!(matches!(p.begin_compile(), Err(GraphicsError::AlreadyCompiled)));
        assert!(matches!(
            p.add_input(VertexInput::single(0, 3, ScalarType::Float)),
            Err(GraphicsError::AlreadyCompiled)
        ));
    }

    #[test]
    fn restaging_replaces_source() {
        let mut p = StagedProgram::default();
        p.add_stage(ShaderStage::Fragment, "old").unwrap();
        p.add_stage(ShaderStage::Fragment, "new").unwrap();
        assert_eq!(p.stage(ShaderStage::Fragment), Some("new"));
    }

    #[test]
    fn empty_program_compiles_as_noop() {
        let mut p = StagedProgram::default();
        assert!(matches!(p.ensure_compiled(), Err(GraphicsError::NotCompiled)));
        p.begin_compile().unwrap();
        p.mark_compiled();
        assert!(p.ensure_compiled().is_ok());
        assert!(p.is_noop());
    }

    #[test]
    fn inputs_get_sequential_slots() {
        let mut p = StagedProgram::default();
        assert_eq!(p.add_input(VertexInput::single(0, 3, ScalarType::Float)).unwrap(), 0);
        assert_eq!(p.add_input(VertexInput::single(1, 2, ScalarType::Float)).unwrap(), 1);
        assert_eq!(p.inputs()[1].stride, 8);
    }

    #[test]
    fn prelude_declares_uniforms_and_textures() {
        let mut p = StagedProgram::default();
        p.set_layout(UniformLayout::new("Block").field("model", UniformType::Mat4))
            .unwrap();
        p.add_texture_slot("DiffuseTexture", TextureKind::D2).unwrap();
        p.add_texture_slot("Sky", TextureKind::Cube).unwrap();
        p.add_stage(ShaderStage::Vertex, "// body").unwrap();

        let src = p.stage_source_with_prelude(ShaderStage::Vertex).unwrap();
        assert!(src.contains("var<uniform> u: Block;"));
        assert!(src.contains("@group(1) @binding(0) var DiffuseTexture: texture_2d<f32>;"));
        assert!(src.contains("@group(1) @binding(1) var DiffuseTextureSampler: sampler;"));
        assert!(src.contains("@group(1) @binding(2) var Sky: texture_cube<f32>;"));
        assert!(src.ends_with("// body"));
        assert_eq!(p.texture_index("Sky"), Some(1));
    }
}
