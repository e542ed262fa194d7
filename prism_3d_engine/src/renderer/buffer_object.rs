/// Vertex + index buffer pair of one mesh
///
/// Vertex and index counts are fixed at creation. Immutable objects keep
/// their initial contents; dynamic ones accept vertex updates of the
/// same count. A CPU copy of the vertices is kept for the tangent frame
/// overlay.

use std::sync::Arc;
use crate::error::Result;
use crate::engine_bail;
use std::sync::RwLock;
use crate::graphics_device::{Buffer, BufferDesc, BufferKind, BufferUsage, GraphicsDevice, PrimitiveTopology};
use crate::resource::{MeshData, Vertex};

const SOURCE: &str = "prism3d::BufferObject";

pub struct BufferObject {
    vertex_buffer: Arc<dyn Buffer>,
    index_buffer: Arc<dyn Buffer>,
    vertices: RwLock<Vec<Vertex>>,
    vertex_count: u32,
    index_count: u32,
    topology: PrimitiveTopology,
    usage: BufferUsage,
}

impl BufferObject {
    pub fn create(device: &mut dyn GraphicsDevice, mesh: &MeshData, usage: BufferUsage) -> Result<Self> {
        if mesh.vertices.is_empty() || mesh.indices.is_empty() {
            engine_bail!(SOURCE, "Mesh has {} vertices and {} indices, both must be > 0",
                mesh.vertices.len(), mesh.indices.len());
        }
        if let Some(bad) = mesh.indices.iter().find(|&&i| i >= mesh.vertex_count()) {
            engine_bail!(SOURCE, "Index {} out of range for {} vertices", bad, mesh.vertex_count());
        }
        if mesh.topology == PrimitiveTopology::LineList && mesh.indices.len() % 2 != 0 {
            engine_bail!(SOURCE, "Line list with an odd index count ({})", mesh.indices.len());
        }

        let vertex_bytes: &[u8] = bytemuck::cast_slice(&mesh.vertices);
        let index_bytes: &[u8] = bytemuck::cast_slice(&mesh.indices);
        let vertex_buffer = device.create_buffer(
            BufferDesc { size: vertex_bytes.len() as u64, kind: BufferKind::Vertex, usage },
            Some(vertex_bytes),
        )?;
        // Indices never change, even for dynamic meshes
        let index_buffer = device.create_buffer(
            BufferDesc { size: index_bytes.len() as u64, kind: BufferKind::Index, usage: BufferUsage::Immutable },
            Some(index_bytes),
        )?;

        Ok(Self {
            vertex_buffer,
            index_buffer,
            vertices: RwLock::new(mesh.vertices.clone()),
            vertex_count: mesh.vertex_count(),
            index_count: mesh.index_count(),
            topology: mesh.topology,
            usage,
        })
    }

    /// Rewrite the vertices of a dynamic object
    pub fn update_vertices(&self, vertices: &[Vertex]) -> Result<()> {
        if self.usage != BufferUsage::Dynamic {
            engine_bail!(SOURCE, "Cannot update an immutable buffer object");
        }
        if vertices.len() as u32 != self.vertex_count {
            engine_bail!(SOURCE, "Vertex count is fixed at {} (got {})", self.vertex_count, vertices.len());
        }
        self.vertex_buffer.update(0, bytemuck::cast_slice(vertices))?;
        if let Ok(mut copy) = self.vertices.write() {
            copy.copy_from_slice(vertices);
        }
        Ok(())
    }

    /// CPU copy of the current vertices
    pub fn vertices(&self) -> Vec<Vertex> {
        self.vertices.read().map(|vertices| vertices.clone()).unwrap_or_default()
    }

    pub fn vertex_buffer(&self) -> &Arc<dyn Buffer> {
        &self.vertex_buffer
    }

    pub fn index_buffer(&self) -> &Arc<dyn Buffer> {
        &self.index_buffer
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn topology(&self) -> PrimitiveTopology {
        self.topology
    }

    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    pub fn stride(&self) -> u32 {
        std::mem::size_of::<Vertex>() as u32
    }
}
