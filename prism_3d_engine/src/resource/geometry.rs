//! Built-in procedural geometry.
//!
//! Every generator produces the engine's standard vertex (position,
//! normal, tangent, uv) and 32-bit indices. Triangles are wound clockwise
//! when seen from their front side, in a left-handed, y-up world.

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};
use std::f32::consts::{PI, TAU};
use crate::graphics_device::PrimitiveTopology;

// ============================================================================
// VERTEX
// ============================================================================

/// Standard vertex, matching `VertexLayout::standard()` (44 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tangent: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    pub fn new(position: Vec3, normal: Vec3, tangent: Vec3, uv: Vec2) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
            tangent: tangent.to_array(),
            uv: uv.to_array(),
        }
    }
}

/// CPU-side geometry: vertices and indices, triangle lists unless stated
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub topology: PrimitiveTopology,
}

impl MeshData {
    pub fn vertex_count(&self) -> u32 {
        self.vertices.len() as u32
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }
}

// ============================================================================
// BUILT-IN MESHES
// ============================================================================

/// Meshes uploaded once at start-up, addressable by name from scene files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinMesh {
    Triangle,
    Quad,
    Cube,
    Sphere,
    Grid,
    Cylinder,
    FullscreenQuad,
}

impl BuiltinMesh {
    pub const ALL: [BuiltinMesh; 7] = [
        BuiltinMesh::Triangle,
        BuiltinMesh::Quad,
        BuiltinMesh::Cube,
        BuiltinMesh::Sphere,
        BuiltinMesh::Grid,
        BuiltinMesh::Cylinder,
        BuiltinMesh::FullscreenQuad,
    ];

    /// Scene-file name lookup (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "triangle" => Some(Self::Triangle),
            "quad" => Some(Self::Quad),
            "cube" => Some(Self::Cube),
            "sphere" => Some(Self::Sphere),
            "grid" => Some(Self::Grid),
            "cylinder" => Some(Self::Cylinder),
            "fullscreen_quad" | "fullscreenquad" => Some(Self::FullscreenQuad),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Triangle => "triangle",
            Self::Quad => "quad",
            Self::Cube => "cube",
            Self::Sphere => "sphere",
            Self::Grid => "grid",
            Self::Cylinder => "cylinder",
            Self::FullscreenQuad => "fullscreen_quad",
        }
    }

    /// Geometry with the engine's default tessellation
    pub fn generate(self) -> MeshData {
        match self {
            Self::Triangle => GeometryGenerator::triangle(),
            Self::Quad => GeometryGenerator::quad(1.0),
            Self::Cube => GeometryGenerator::cube(1.0),
            Self::Sphere => GeometryGenerator::sphere(1.0, 20, 20),
            Self::Grid => GeometryGenerator::grid(10.0, 10.0, 10, 10),
            Self::Cylinder => GeometryGenerator::cylinder(3.0, 1.0, 1.0, 20, 1),
            Self::FullscreenQuad => GeometryGenerator::fullscreen_quad(),
        }
    }
}

// ============================================================================
// GENERATORS
// ============================================================================

pub struct GeometryGenerator;

impl GeometryGenerator {
    pub fn triangle() -> MeshData {
        let normal = Vec3::NEG_Z;
        let tangent = Vec3::X;
        MeshData {
            vertices: vec![
                Vertex::new(Vec3::new(-1.0, -1.0, 0.0), normal, tangent, Vec2::new(0.0, 1.0)),
                Vertex::new(Vec3::new(0.0, 1.0, 0.0), normal, tangent, Vec2::new(0.5, 0.0)),
                Vertex::new(Vec3::new(1.0, -1.0, 0.0), normal, tangent, Vec2::new(1.0, 1.0)),
            ],
            indices: vec![0, 1, 2],
            topology: PrimitiveTopology::TriangleList,
        }
    }

    /// Square in the XY plane spanning `[-half, half]`, facing -Z
    pub fn quad(half_extent: f32) -> MeshData {
        let mut mesh = MeshData::default();
        push_face(&mut mesh, Vec3::NEG_Z, Vec3::Y, half_extent, 0.0);
        mesh
    }

    /// Quad covering clip space; uv (0,0) at the top-left corner
    pub fn fullscreen_quad() -> MeshData {
        Self::quad(1.0)
    }

    /// Axis-aligned cube, 24 vertices so every face has its own normals
    pub fn cube(half_extent: f32) -> MeshData {
        let faces = [
            (Vec3::NEG_Z, Vec3::Y),
            (Vec3::Z, Vec3::Y),
            (Vec3::NEG_X, Vec3::Y),
            (Vec3::X, Vec3::Y),
            (Vec3::Y, Vec3::Z),
            (Vec3::NEG_Y, Vec3::NEG_Z),
        ];
        let mut mesh = MeshData::default();
        for (normal, up) in faces {
            push_face(&mut mesh, normal, up, half_extent, half_extent);
        }
        mesh
    }

    /// UV sphere: `rings` latitude bands, `slices` longitude bands
    pub fn sphere(radius: f32, rings: u32, slices: u32) -> MeshData {
        let rings = rings.max(2);
        let slices = slices.max(3);
        let mut mesh = MeshData::default();

        for ring in 0..=rings {
            let phi = PI * ring as f32 / rings as f32;
            for slice in 0..=slices {
                let theta = TAU * slice as f32 / slices as f32;
                let normal = Vec3::new(phi.sin() * theta.cos(), phi.cos(), phi.sin() * theta.sin());
                let tangent = Vec3::new(-theta.sin(), 0.0, theta.cos());
                let uv = Vec2::new(slice as f32 / slices as f32, ring as f32 / rings as f32);
                mesh.vertices.push(Vertex::new(normal * radius, normal, tangent, uv));
            }
        }

        let stride = slices + 1;
        for ring in 0..rings {
            for slice in 0..slices {
                let a = ring * stride + slice;
                let b = a + stride;
                mesh.indices.extend_from_slice(&[a, a + 1, b, a + 1, b + 1, b]);
            }
        }
        mesh
    }

    /// Flat grid in the XZ plane with `rows` x `cols` vertices, facing +Y
    pub fn grid(width: f32, depth: f32, rows: u32, cols: u32) -> MeshData {
        let rows = rows.max(2);
        let cols = cols.max(2);
        let mut mesh = MeshData::default();

        for i in 0..rows {
            let v = i as f32 / (rows - 1) as f32;
            let z = depth * 0.5 - v * depth;
            for j in 0..cols {
                let u = j as f32 / (cols - 1) as f32;
                let x = -width * 0.5 + u * width;
                mesh.vertices.push(Vertex::new(Vec3::new(x, 0.0, z), Vec3::Y, Vec3::X, Vec2::new(u, v)));
            }
        }

        for i in 0..rows - 1 {
            for j in 0..cols - 1 {
                let a = i * cols + j;
                let b = a + cols;
                mesh.indices.extend_from_slice(&[a, a + 1, b, b, a + 1, b + 1]);
            }
        }
        mesh
    }

    /// Capped cylinder along Y, centred on the origin
    pub fn cylinder(height: f32, top_radius: f32, bottom_radius: f32, slices: u32, stacks: u32) -> MeshData {
        let slices = slices.max(3);
        let stacks = stacks.max(1);
        let mut mesh = MeshData::default();

        // Side
        let slope = (bottom_radius - top_radius) / height;
        for stack in 0..=stacks {
            let t = stack as f32 / stacks as f32;
            let y = -height * 0.5 + t * height;
            let radius = bottom_radius + t * (top_radius - bottom_radius);
            for slice in 0..=slices {
                let theta = TAU * slice as f32 / slices as f32;
                let (sin, cos) = theta.sin_cos();
                let tangent = Vec3::new(-sin, 0.0, cos);
                let normal = Vec3::new(cos, slope, sin).normalize();
                let uv = Vec2::new(slice as f32 / slices as f32, 1.0 - t);
                mesh.vertices.push(Vertex::new(Vec3::new(radius * cos, y, radius * sin), normal, tangent, uv));
            }
        }
        let stride = slices + 1;
        for stack in 0..stacks {
            for slice in 0..slices {
                let a = stack * stride + slice;
                let b = a + stride;
                mesh.indices.extend_from_slice(&[a, b, a + 1, a + 1, b, b + 1]);
            }
        }

        push_cap(&mut mesh, height * 0.5, top_radius, slices, true);
        push_cap(&mut mesh, -height * 0.5, bottom_radius, slices, false);
        mesh
    }

    /// Line lists of the tangent frames of `mesh`: tangents, bitangents and
    /// normals, in that order
    ///
    /// Every vertex gets one segment per axis, starting at the vertex and
    /// `length` long. The bitangent is `normal x tangent`, as the lighting
    /// shaders rebuild it.
    pub fn tangent_frame_lines(mesh: &MeshData, length: f32) -> [MeshData; 3] {
        let mut axes: [MeshData; 3] = Default::default();
        for axis in &mut axes {
            axis.topology = PrimitiveTopology::LineList;
            axis.vertices.reserve(mesh.vertices.len() * 2);
            axis.indices.reserve(mesh.vertices.len() * 2);
        }
        for vertex in &mesh.vertices {
            let position = Vec3::from(vertex.position);
            let normal = Vec3::from(vertex.normal).normalize_or_zero();
            let tangent = Vec3::from(vertex.tangent).normalize_or_zero();
            let bitangent = normal.cross(tangent);
            for (axis, direction) in axes.iter_mut().zip([tangent, bitangent, normal]) {
                let base = axis.vertices.len() as u32;
                let end = position + direction * length;
                axis.vertices.push(Vertex::new(position, normal, tangent, Vec2::ZERO));
                axis.vertices.push(Vertex::new(end, normal, tangent, Vec2::ONE));
                axis.indices.extend_from_slice(&[base, base + 1]);
            }
        }
        axes
    }
}

/// Four-vertex face with outward `normal`, `up` being the face's screen-up
fn push_face(mesh: &mut MeshData, normal: Vec3, up: Vec3, half_extent: f32, offset: f32) {
    let right = normal.cross(up);
    let center = normal * offset;
    let base = mesh.vertices.len() as u32;
    let corners = [
        (-right + up, Vec2::new(0.0, 0.0)),
        (right + up, Vec2::new(1.0, 0.0)),
        (right - up, Vec2::new(1.0, 1.0)),
        (-right - up, Vec2::new(0.0, 1.0)),
    ];
    for (corner, uv) in corners {
        mesh.vertices.push(Vertex::new(center + corner * half_extent, normal, right, uv));
    }
    mesh.indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
}

fn push_cap(mesh: &mut MeshData, y: f32, radius: f32, slices: u32, top: bool) {
    let normal = if top { Vec3::Y } else { Vec3::NEG_Y };
    let center_index = mesh.vertices.len() as u32;
    mesh.vertices.push(Vertex::new(Vec3::new(0.0, y, 0.0), normal, Vec3::X, Vec2::splat(0.5)));

    for slice in 0..=slices {
        let theta = TAU * slice as f32 / slices as f32;
        let (sin, cos) = theta.sin_cos();
        let uv = Vec2::new(cos * 0.5 + 0.5, sin * 0.5 + 0.5);
        mesh.vertices.push(Vertex::new(Vec3::new(radius * cos, y, radius * sin), normal, Vec3::X, uv));
    }

    for slice in 0..slices {
        let a = center_index + 1 + slice;
        if top {
            mesh.indices.extend_from_slice(&[center_index, a + 1, a]);
        } else {
            mesh.indices.extend_from_slice(&[center_index, a, a + 1]);
        }
    }
}

#[cfg(test)]
#[path = "geometry_tests.rs"]
mod tests;
