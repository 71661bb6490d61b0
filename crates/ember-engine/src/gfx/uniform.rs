//! Uniform block layout.
//!
//! A `UniformLayout` describes the single uniform block of a shader program. It
//! computes byte offsets following the WGSL uniform address space rules and
//! generates the matching WGSL declarations, so the CPU shadow copy and the
//! shader always agree on where each named value lives.
//!
//! Slots are keyed by their full access path (`model`, `material.Color`,
//! `LightsArray[2].Position`).

use std::collections::HashMap;
use std::fmt::Write as _;

use glam::{Mat4, Vec3, Vec4};

/// Alignment of structs and array elements in the uniform address space.
const STRUCT_ALIGN: u32 = 16;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum UniformType {
    Int,
    Float,
    Vec3,
    Vec4,
    Mat4,
}

impl UniformType {
    pub const fn size(self) -> u32 {
        match self {
            UniformType::Int | UniformType::Float => 4,
            UniformType::Vec3 => 12,
            UniformType::Vec4 => 16,
            UniformType::Mat4 => 64,
        }
    }

    pub const fn align(self) -> u32 {
        match self {
            UniformType::Int | UniformType::Float => 4,
            UniformType::Vec3 | UniformType::Vec4 | UniformType::Mat4 => 16,
        }
    }

    pub const fn wgsl(self) -> &'static str {
        match self {
            UniformType::Int => "i32",
            UniformType::Float => "f32",
            UniformType::Vec3 => "vec3<f32>",
            UniformType::Vec4 => "vec4<f32>",
            UniformType::Mat4 => "mat4x4<f32>",
        }
    }
}

/// A typed value written through the uniform setters.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat4(Mat4),
}

impl UniformValue {
    pub const fn ty(&self) -> UniformType {
        match self {
            UniformValue::Int(_) => UniformType::Int,
            UniformValue::Float(_) => UniformType::Float,
            UniformValue::Vec3(_) => UniformType::Vec3,
            UniformValue::Vec4(_) => UniformType::Vec4,
            UniformValue::Mat4(_) => UniformType::Mat4,
        }
    }

    /// Writes the value's bytes at the start of `dst`.
    ///
    /// `dst` must hold at least `self.ty().size()` bytes.
    pub(crate) fn write_to(&self, dst: &mut [u8]) {
        match self {
            UniformValue::Int(v) => dst[..4].copy_from_slice(bytemuck::bytes_of(v)),
            UniformValue::Float(v) => dst[..4].copy_from_slice(bytemuck::bytes_of(v)),
            UniformValue::Vec3(v) => dst[..12].copy_from_slice(bytemuck::bytes_of(v)),
            UniformValue::Vec4(v) => dst[..16].copy_from_slice(bytemuck::bytes_of(v)),
            UniformValue::Mat4(m) => {
                let cols = m.to_cols_array();
                dst[..64].copy_from_slice(bytemuck::cast_slice(&cols));
            }
        }
    }
}

impl From<i32> for UniformValue {
    fn from(v: i32) -> Self {
        UniformValue::Int(v)
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        UniformValue::Float(v)
    }
}

impl From<Vec3> for UniformValue {
    fn from(v: Vec3) -> Self {
        UniformValue::Vec3(v)
    }
}

impl From<Vec4> for UniformValue {
    fn from(v: Vec4) -> Self {
        UniformValue::Vec4(v)
    }
}

impl From<Mat4> for UniformValue {
    fn from(v: Mat4) -> Self {
        UniformValue::Mat4(v)
    }
}

/// Resolved location of a named uniform inside the block.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct UniformSlot {
    pub offset: u32,
    pub ty: UniformType,
}

#[derive(Debug, Clone, PartialEq)]
enum Member {
    Field {
        name: String,
        ty: UniformType,
    },
    Struct {
        name: String,
        type_name: String,
        fields: Vec<(String, UniformType)>,
        count: Option<u32>,
    },
}

impl Member {
    fn name(&self) -> &str {
        match self {
            Member::Field { name, .. } | Member::Struct { name, .. } => name,
        }
    }
}

/// Declarative description of a program's uniform block.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformLayout {
    type_name: String,
    members: Vec<Member>,
}

impl Default for UniformLayout {
    fn default() -> Self {
        Self::new("Uniforms")
    }
}

impl UniformLayout {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            members: Vec::new(),
        }
    }

    /// Appends a plain field.
    pub fn field(mut self, name: impl Into<String>, ty: UniformType) -> Self {
        self.members.push(Member::Field {
            name: name.into(),
            ty,
        });
        self
    }

    /// Appends a nested struct addressed as `name.Field`.
    pub fn structure(
        mut self,
        name: impl Into<String>,
        type_name: impl Into<String>,
        fields: &[(&str, UniformType)],
    ) -> Self {
        self.members.push(Member::Struct {
            name: name.into(),
            type_name: type_name.into(),
            fields: owned_fields(fields),
            count: None,
        });
        self
    }

    /// Appends a fixed-size struct array addressed as `name[i].Field`.
    pub fn struct_array(
        mut self,
        name: impl Into<String>,
        type_name: impl Into<String>,
        fields: &[(&str, UniformType)],
        count: u32,
    ) -> Self {
        self.members.push(Member::Struct {
            name: name.into(),
            type_name: type_name.into(),
            fields: owned_fields(fields),
            count: Some(count.max(1)),
        });
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Returns the capacity of a struct array member, if present.
    pub fn array_len(&self, name: &str) -> Option<u32> {
        self.members.iter().find_map(|m| match m {
            Member::Struct {
                name: n,
                count: Some(c),
                ..
            } if n == name => Some(*c),
            _ => None,
        })
    }

    /// Builds the name → slot table.
    pub fn resolve(&self) -> UniformTable {
        let placement = self.place();
        let mut slots = HashMap::new();

        for (member, placed) in self.members.iter().zip(&placement.members) {
            match member {
                Member::Field { name, ty } => {
                    slots.insert(
                        name.clone(),
                        UniformSlot {
                            offset: placed.offset,
                            ty: *ty,
                        },
                    );
                }
                Member::Struct {
                    name,
                    fields,
                    count,
                    ..
                } => {
                    let inner = struct_layout(fields);
                    let elements = count.unwrap_or(1);
                    for i in 0..elements {
                        let base = placed.offset + i * inner.size;
                        for ((field, ty), field_offset) in fields.iter().zip(&inner.offsets) {
                            let key = match count {
                                Some(_) => format!("{name}[{i}].{field}"),
                                None => format!("{name}.{field}"),
                            };
                            slots.insert(
                                key,
                                UniformSlot {
                                    offset: base + field_offset,
                                    ty: *ty,
                                },
                            );
                        }
                    }
                }
            }
        }

        UniformTable {
            slots,
            size: placement.size,
        }
    }

    /// Generates WGSL struct declarations and the uniform variable binding.
    ///
    /// Every member carries an explicit `@size` so WGSL offsets match `resolve()`.
    pub fn wgsl_declarations(&self, group: u32, binding: u32, var: &str) -> String {
        let placement = self.place();
        let mut out = String::new();
        let mut emitted: Vec<&str> = Vec::new();

        for member in &self.members {
            if let Member::Struct {
                type_name, fields, ..
            } = member
            {
                if emitted.contains(&type_name.as_str()) {
                    continue;
                }
                emitted.push(type_name);
                write_struct(&mut out, type_name, fields);
            }
        }

        let _ = writeln!(out, "struct {} {{", self.type_name);
        if self.members.is_empty() {
            let _ = writeln!(out, "    _reserved: vec4<f32>,");
        }
        for (i, (member, placed)) in self.members.iter().zip(&placement.members).enumerate() {
            let end = placement
                .members
                .get(i + 1)
                .map(|next| next.offset)
                .unwrap_or(placement.size);
            let span = end - placed.offset;
            let ty = match member {
                Member::Field { ty, .. } => ty.wgsl().to_string(),
                Member::Struct {
                    type_name,
                    count: Some(c),
                    ..
                } => format!("array<{type_name}, {c}>"),
                Member::Struct {
                    type_name,
                    count: None,
                    ..
                } => type_name.clone(),
            };
            let align = if i == 0 { "@align(16) " } else { "" };
            let _ = writeln!(out, "    {align}@size({span}) {}: {ty},", member.name());
        }
        let _ = writeln!(out, "}}");
        let _ = writeln!(
            out,
            "@group({group}) @binding({binding}) var<uniform> {var}: {};",
            self.type_name
        );
        out
    }

    fn place(&self) -> Placement {
        let mut cursor = 0u32;
        let mut members = Vec::with_capacity(self.members.len());

        for member in &self.members {
            let (offset, size) = match member {
                Member::Field { ty, .. } => (align_up(cursor, ty.align()), ty.size()),
                Member::Struct { fields, count, .. } => {
                    let inner = struct_layout(fields);
                    (
                        align_up(cursor, STRUCT_ALIGN),
                        inner.size * count.unwrap_or(1),
                    )
                }
            };
            members.push(Placed { offset });
            cursor = offset + size;
        }

        Placement {
            members,
            size: align_up(cursor.max(1), STRUCT_ALIGN),
        }
    }
}

struct Placed {
    offset: u32,
}

struct Placement {
    members: Vec<Placed>,
    size: u32,
}

struct StructLayout {
    offsets: Vec<u32>,
    size: u32,
}

fn struct_layout(fields: &[(String, UniformType)]) -> StructLayout {
    let mut cursor = 0u32;
    let mut offsets = Vec::with_capacity(fields.len());
    for (_, ty) in fields {
        let offset = align_up(cursor, ty.align());
        offsets.push(offset);
        cursor = offset + ty.size();
    }
    StructLayout {
        offsets,
        size: align_up(cursor.max(1), STRUCT_ALIGN),
    }
}

fn write_struct(out: &mut String, type_name: &str, fields: &[(String, UniformType)]) {
    let layout = struct_layout(fields);
    let _ = writeln!(out, "struct {type_name} {{");
    if fields.is_empty() {
        let _ = writeln!(out, "    _reserved: vec4<f32>,");
    }
    for (i, ((name, ty), offset)) in fields.iter().zip(&layout.offsets).enumerate() {
        let end = layout.offsets.get(i + 1).copied().unwrap_or(layout.size);
        let align = if i == 0 { "@align(16) " } else { "" };
        let _ = writeln!(out, "    {align}@size({}) {name}: {},", end - offset, ty.wgsl());
    }
    let _ = writeln!(out, "}}");
}

fn owned_fields(fields: &[(&str, UniformType)]) -> Vec<(String, UniformType)> {
    fields.iter().map(|(n, t)| (n.to_string(), *t)).collect()
}

pub(crate) const fn align_up(value: u32, align: u32) -> u32 {
    value.div_ceil(align) * align
}

/// Name → slot table built once when a program is compiled.
#[derive(Debug, Clone, Default)]
pub struct UniformTable {
    slots: HashMap<String, UniformSlot>,
    size: u32,
}

impl UniformTable {
    pub fn get(&self, name: &str) -> Option<UniformSlot> {
        self.slots.get(name).copied()
    }

    /// Total block size in bytes (multiple of 16, never zero).
    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Resolves `name` for a write of `value`.
    ///
    /// Unknown names resolve to `None` silently; a type mismatch is logged at debug level.
    pub fn lookup(&self, name: &str, value: &UniformValue) -> Option<UniformSlot> {
        let slot = self.get(name)?;
        if slot.ty != value.ty() {
            log::debug!(
                "uniform `{name}` is {:?}, ignoring {:?} write",
                slot.ty,
                value.ty()
            );
            return None;
        }
        Some(slot)
    }
}

/// CPU shadow copy of a uniform block.
#[derive(Debug, Clone)]
pub struct UniformBlock {
    table: UniformTable,
    bytes: Vec<u8>,
}

impl UniformBlock {
    pub fn new(table: UniformTable) -> Self {
        let bytes = vec![0; table.size() as usize];
        Self { table, bytes }
    }

    pub fn table(&self) -> &UniformTable {
        &self.table
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Writes `value` into the named slot. Returns whether a slot was written.
    pub fn write(&mut self, name: &str, value: UniformValue) -> bool {
        let Some(slot) = self.table.lookup(name, &value) else {
            return false;
        };
        let start = slot.offset as usize;
        value.write_to(&mut self.bytes[start..start + slot.ty.size() as usize]);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn light_fields() -> [(&'static str, UniformType); 2] {
        [("Position", UniformType::Vec3), ("Color", UniformType::Vec3)]
    }

    fn sample_layout() -> UniformLayout {
        UniformLayout::new("Sample")
            .field("model", UniformType::Mat4)
            .field("CameraPosition", UniformType::Vec3)
            .field("LightsCount", UniformType::Int)
            .field("Gain", UniformType::Float)
            .struct_array("LightsArray", "LightSlot", &light_fields(), 4)
            .structure(
                "material",
                "MaterialBlock",
                &[("Color", UniformType::Vec3), ("ShineExponent", UniformType::Float)],
            )
    }

    #[test]
    fn offsets_follow_uniform_rules() {
        let table = sample_layout().resolve();

        assert_eq!(table.get("model").map(|s| s.offset), Some(0));
        assert_eq!(table.get("CameraPosition").map(|s| s.offset), Some(64));
        // i32 packs into the tail of the vec3.
        assert_eq!(table.get("LightsCount").map(|s| s.offset), Some(76));
        assert_eq!(table.get("Gain").map(|s| s.offset), Some(80));
        assert_eq!(table.get("LightsArray[0].Position").map(|s| s.offset), Some(96));
        assert_eq!(table.get("LightsArray[0].Color").map(|s| s.offset), Some(112));
        assert_eq!(table.get("LightsArray[3].Color").map(|s| s.offset), Some(96 + 3 * 32 + 16));
        assert_eq!(table.get("material.Color").map(|s| s.offset), Some(224));
        assert_eq!(table.get("material.ShineExponent").map(|s| s.offset), Some(236));
        assert_eq!(table.size(), 240);
    }

    #[test]
    fn empty_layout_still_has_a_block() {
        let layout = UniformLayout::default();
        assert!(layout.is_empty());
        assert_eq!(layout.resolve().size(), 16);
        assert!(layout.wgsl_declarations(0, 0, "u").contains("_reserved: vec4<f32>"));
    }

    #[test]
    fn wgsl_spans_match_offsets() {
        let wgsl = sample_layout().wgsl_declarations(0, 0, "u");

        assert!(wgsl.contains("struct LightSlot {"));
        assert!(wgsl.contains("@align(16) @size(16) Position: vec3<f32>,"));
        assert!(wgsl.contains("@align(16) @size(64) model: mat4x4<f32>,"));
        assert!(wgsl.contains("@size(12) CameraPosition: vec3<f32>,"));
        assert!(wgsl.contains("@size(16) Gain: f32,"));
        assert!(wgsl.contains("@size(128) LightsArray: array<LightSlot, 4>,"));
        assert!(wgsl.contains("@size(16) material: MaterialBlock,"));
        assert!(wgsl.contains("@group(0) @binding(0) var<uniform> u: Sample;"));
    }

    #[test]
    fn shared_struct_type_is_declared_once() {
        let wgsl = UniformLayout::new("Twice")
            .struct_array("A", "Slot", &light_fields(), 2)
            .struct_array("B", "Slot", &light_fields(), 2)
            .wgsl_declarations(0, 0, "u");
        assert_eq!(wgsl.matches("struct Slot {").count(), 1);
    }

    #[test]
    fn unknown_and_mistyped_writes_are_ignored() {
        let mut block = UniformBlock::new(sample_layout().resolve());

        assert!(!block.write("DoesNotExist", UniformValue::Int(1)));
        assert!(!block.write("LightsCount", UniformValue::Float(1.0)));
        assert!(block.bytes().iter().all(|b| *b == 0));
    }

    #[test]
    fn writes_land_at_slot_offset() {
        let mut block = UniformBlock::new(sample_layout().resolve());

        assert!(block.write("LightsCount", UniformValue::Int(7)));
        assert!(block.write("LightsArray[1].Position", Vec3::new(1.0, 2.0, 3.0).into()));

        let bytes = block.bytes();
        assert_eq!(&bytes[76..80], &7i32.to_ne_bytes());
        let pos: &[f32] = bytemuck::cast_slice(&bytes[128..140]);
        assert_eq!(pos, &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn array_len_reports_capacity() {
        let layout = sample_layout();
        assert_eq!(layout.array_len("LightsArray"), Some(4));
        assert_eq!(layout.array_len("material"), None);
    }
}
