use crate::assets::MeshData;
use crate::error::{GraphicsError, Result};
use crate::gfx::{GpuBuffer, GraphicsDevice};

/// GPU copy of a `MeshData`: one vertex buffer per attribute stream.
pub struct Mesh<D: GraphicsDevice> {
    pub label: String,
    pub positions: D::VertexBuffer,
    pub normals: D::VertexBuffer,
    pub uvs: D::VertexBuffer,
    /// 32-bit index buffer and its index count.
    pub index: Option<(D::VertexBuffer, u32)>,
    pub vertex_count: u32,
}

impl<D: GraphicsDevice> Mesh<D> {
    pub fn upload(device: &mut D, label: impl Into<String>, data: &MeshData) -> Result<Self> {
        let label = label.into();
        let n = data.vertex_count();
        if data.normals.len() != n || data.uvs.len() != n {
            return Err(GraphicsError::FormatMismatch(format!(
                "mesh `{label}`: {n} positions, {} normals, {} uvs",
                data.normals.len(),
                data.uvs.len()
            )));
        }

        let positions = vertex_buffer(device, bytemuck::cast_slice(&data.positions))?;
        let normals = vertex_buffer(device, bytemuck::cast_slice(&data.normals))?;
        let uvs = vertex_buffer(device, bytemuck::cast_slice(&data.uvs))?;
        let index = match &data.indices {
            Some(indices) => Some((
                vertex_buffer(device, bytemuck::cast_slice(indices))?,
                indices.len() as u32,
            )),
            None => None,
        };

        log::debug!("uploaded mesh `{label}` ({n} vertices)");
        Ok(Self {
            label,
            positions,
            normals,
            uvs,
            index,
            vertex_count: n as u32,
        })
    }
}

fn vertex_buffer<D: GraphicsDevice>(device: &mut D, bytes: &[u8]) -> Result<D::VertexBuffer> {
    let mut buffer = device.create_vbo()?;
    buffer.set_data(bytes)?;
    Ok(buffer)
}

/// Mesh table entry. Failed loads keep their id so render objects stay valid.
pub enum MeshSlot<D: GraphicsDevice> {
    Ready(Mesh<D>),
    Failed { label: String, reason: String },
}
