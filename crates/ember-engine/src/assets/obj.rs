//! Wavefront OBJ reader.
//!
//! Supports `v`, `vn`, `vt` and `f` records. Polygons are fan-triangulated and
//! expanded into non-indexed vertex streams; other records are ignored.

use glam::{Vec2, Vec3};

use super::AssetError;
use super::mesh::MeshData;

#[derive(Debug, Copy, Clone)]
struct Corner {
    position: usize,
    uv: Option<usize>,
    normal: Option<usize>,
}

pub fn parse_obj(source: &str) -> Result<MeshData, AssetError> {
    let mut positions = Vec::new();
    let mut normals = Vec::new();
    let mut uvs = Vec::new();
    let mut mesh = MeshData::default();

    for (i, raw) in source.lines().enumerate() {
        let line = i + 1;
        let content = raw.split('#').next().unwrap_or("").trim();
        let mut parts = content.split_whitespace();
        let Some(tag) = parts.next() else {
            continue;
        };

        match tag {
            "v" => positions.push(parse_vec3(parts, line)?),
            "vn" => normals.push(parse_vec3(parts, line)?),
            "vt" => {
                let u = parse_float(parts.next(), line)?;
                let v = parse_float(parts.next(), line)?;
                // OBJ puts v = 0 at the bottom of the image.
                uvs.push(Vec2::new(u, 1.0 - v));
            }
            "f" => {
                let corners = parts
                    .map(|c| parse_corner(c, line, positions.len(), uvs.len(), normals.len()))
                    .collect::<Result<Vec<_>, _>>()?;
                if corners.len() < 3 {
                    return Err(obj_error(line, "face needs at least three vertices"));
                }
                for k in 1..corners.len() - 1 {
                    emit_triangle(
                        &mut mesh,
                        [corners[0], corners[k], corners[k + 1]],
                        &positions,
                        &uvs,
                        &normals,
                    );
                }
            }
            _ => log::trace!("obj line {line}: ignoring `{tag}`"),
        }
    }

    Ok(mesh)
}

fn emit_triangle(
    mesh: &mut MeshData,
    corners: [Corner; 3],
    positions: &[Vec3],
    uvs: &[Vec2],
    normals: &[Vec3],
) {
    let p = corners.map(|c| positions[c.position]);
    let face_normal = (p[1] - p[0]).cross(p[2] - p[0]).normalize_or_zero();

    for (corner, position) in corners.iter().zip(p) {
        mesh.positions.push(position);
        mesh.normals
            .push(corner.normal.map_or(face_normal, |n| normals[n]));
        mesh.uvs.push(corner.uv.map_or(Vec2::ZERO, |t| uvs[t]));
    }
}

fn parse_corner(
    token: &str,
    line: usize,
    positions: usize,
    uvs: usize,
    normals: usize,
) -> Result<Corner, AssetError> {
    let mut fields = token.split('/');
    let position = resolve_index(fields.next(), positions, line, "position")?
        .ok_or_else(|| obj_error(line, "face vertex without a position index"))?;
    let uv = resolve_index(fields.next(), uvs, line, "uv")?;
    let normal = resolve_index(fields.next(), normals, line, "normal")?;
    Ok(Corner {
        position,
        uv,
        normal,
    })
}

/// Resolves a 1-based (or negative, relative) index into a 0-based one.
fn resolve_index(
    field: Option<&str>,
    len: usize,
    line: usize,
    what: &str,
) -> Result<Option<usize>, AssetError> {
    let Some(field) = field.filter(|f| !f.is_empty()) else {
        return Ok(None);
    };
    let raw: i64 = field
        .parse()
        .map_err(|_| obj_error(line, format!("invalid {what} index `{field}`")))?;
    let resolved = match raw {
        0 => None,
        r if r > 0 => Some(r as usize - 1),
        r => len.checked_sub(r.unsigned_abs() as usize),
    };
    match resolved {
        Some(idx) if idx < len => Ok(Some(idx)),
        _ => Err(obj_error(
            line,
            format!("{what} index {raw} out of range ({len} defined)"),
        )),
    }
}

fn parse_vec3<'a>(mut parts: impl Iterator<Item = &'a str>, line: usize) -> Result<Vec3, AssetError> {
    Ok(Vec3::new(
        parse_float(parts.next(), line)?,
        parse_float(parts.next(), line)?,
        parse_float(parts.next(), line)?,
    ))
}

fn parse_float(token: Option<&str>, line: usize) -> Result<f32, AssetError> {
    let token = token.ok_or_else(|| obj_error(line, "missing component"))?;
    token
        .parse()
        .map_err(|_| obj_error(line, format!("invalid number `{token}`")))
}

fn obj_error(line: usize, message: impl Into<String>) -> AssetError {
    AssetError::Obj {
        line,
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUAD: &str = "\
# unit quad
o quad
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
vn 0 0 1
s off
f 1/1/1 2/2/1 3/3/1 4/4/1
";

    #[test]
    fn quads_are_fan_triangulated() {
        let mesh = parse_obj(QUAD).unwrap();
        assert_eq!(mesh.vertex_count(), 6);
        assert!(mesh.indices.is_none());
        assert_eq!(mesh.positions[3], Vec3::ZERO);
        assert_eq!(mesh.positions[4], Vec3::new(1.0, 1.0, 0.0));
        assert_eq!(mesh.positions[5], Vec3::new(0.0, 1.0, 0.0));
        assert!(mesh.normals.iter().all(|n| *n == Vec3::Z));
        // v is flipped to a top-left origin.
        assert_eq!(mesh.uvs[0], Vec2::new(0.0, 1.0));
        assert_eq!(mesh.uvs[2], Vec2::new(1.0, 0.0));
    }

    #[test]
    fn missing_normals_use_the_face_normal() {
        let src = "v 0 0 0\nv 1 0 0\nv 0 0 -1\nf 1 2 3\n";
        let mesh = parse_obj(src).unwrap();
        assert_eq!(mesh.normals, vec![Vec3::Y; 3]);
        assert_eq!(mesh.uvs, vec![Vec2::ZERO; 3]);
    }

    #[test]
    fn negative_indices_are_relative() {
        let src = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3//  -2 -1\n";
        let mesh = parse_obj(src).unwrap();
        assert_eq!(mesh.positions[1], Vec3::X);
    }

    #[test]
    fn errors_carry_the_line_number() {
        let err = parse_obj("v 0 0 0\nv 1 0\n").unwrap_err();
        assert!(matches!(err, AssetError::Obj { line: 2, .. }));

        let err = parse_obj("v 0 0 0\nf 1 2 3\n").unwrap_err();
        assert!(matches!(err, AssetError::Obj { line: 2, .. }));

        let err = parse_obj("v 0 0 0\nv 1 0 0\nf 1 2\n").unwrap_err();
        assert!(matches!(err, AssetError::Obj { line: 3, .. }));
    }
}
