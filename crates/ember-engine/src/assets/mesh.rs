use glam::{Vec2, Vec3};

/// CPU-side mesh with one attribute stream per buffer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub indices: Option<Vec<u32>>,
}

impl MeshData {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Elements a draw consumes: indices when indexed, vertices otherwise.
    pub fn element_count(&self) -> usize {
        self.indices.as_ref().map_or(self.positions.len(), Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Single triangle facing +Z, centered on the origin.
    pub fn triangle() -> Self {
        Self {
            positions: vec![
                Vec3::new(-0.5, -0.5, 0.0),
                Vec3::new(0.5, -0.5, 0.0),
                Vec3::new(0.0, 0.5, 0.0),
            ],
            normals: vec![Vec3::Z; 3],
            uvs: vec![Vec2::new(0.0, 1.0), Vec2::new(1.0, 1.0), Vec2::new(0.5, 0.0)],
            indices: None,
        }
    }

    /// Unit cube with flat per-face normals, 36 non-indexed vertices.
    pub fn cube() -> Self {
        const FACES: [Vec3; 6] = [Vec3::X, Vec3::NEG_X, Vec3::Y, Vec3::NEG_Y, Vec3::Z, Vec3::NEG_Z];
        // Corner order of the two counter-clockwise triangles, in (u, v) units.
        const CORNERS: [(f32, f32); 6] = [
            (-1.0, -1.0),
            (1.0, -1.0),
            (1.0, 1.0),
            (-1.0, -1.0),
            (1.0, 1.0),
            (-1.0, 1.0),
        ];

        let mut mesh = Self::default();
        for n in FACES {
            let v = if n.y != 0.0 { Vec3::Z } else { Vec3::Y };
            let u = v.cross(n);
            for (cu, cv) in CORNERS {
                mesh.positions.push((n + u * cu + v * cv) * 0.5);
                mesh.normals.push(n);
                mesh.uvs.push(Vec2::new((cu + 1.0) * 0.5, (1.0 - cv) * 0.5));
            }
        }
        mesh
    }

    /// Unit quad in the XZ plane facing +Y, indexed.
    pub fn plane() -> Self {
        Self {
            positions: vec![
                Vec3::new(-0.5, 0.0, -0.5),
                Vec3::new(0.5, 0.0, -0.5),
                Vec3::new(0.5, 0.0, 0.5),
                Vec3::new(-0.5, 0.0, 0.5),
            ],
            normals: vec![Vec3::Y; 4],
            uvs: vec![
                Vec2::new(0.0, 0.0),
                Vec2::new(1.0, 0.0),
                Vec2::new(1.0, 1.0),
                Vec2::new(0.0, 1.0),
            ],
            indices: Some(vec![0, 3, 2, 0, 2, 1]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn winding_normals(mesh: &MeshData) -> Vec<(Vec3, Vec3)> {
        let order: Vec<u32> = match &mesh.indices {
            Some(i) => i.clone(),
            None => (0..mesh.positions.len() as u32).collect(),
        };
        order
            .chunks_exact(3)
            .map(|t| {
                let [a, b, c] = [t[0], t[1], t[2]].map(|i| mesh.positions[i as usize]);
                ((b - a).cross(c - a).normalize(), mesh.normals[t[0] as usize])
            })
            .collect()
    }

    #[test]
    fn procedural_meshes_wind_counter_clockwise() {
        for mesh in [MeshData::triangle(), MeshData::cube(), MeshData::plane()] {
            for (geometric, stored) in winding_normals(&mesh) {
                assert!(geometric.abs_diff_eq(stored, 1e-5), "{geometric} vs {stored}");
            }
        }
    }

    #[test]
    fn streams_have_matching_lengths() {
        let cube = MeshData::cube();
        assert_eq!(cube.vertex_count(), 36);
        assert_eq!(cube.normals.len(), 36);
        assert_eq!(cube.uvs.len(), 36);
        assert!(cube.positions.iter().all(|p| p.abs().max_element() == 0.5));

        let plane = MeshData::plane();
        assert_eq!(plane.vertex_count(), 4);
        assert_eq!(plane.element_count(), 6);
    }
}
