//! Resource module
//!
//! Opaque handles, the tables they index, and built-in geometry.

pub mod handle;
pub mod resource_table;
pub mod geometry;

pub use handle::{
    ResourceHandle, TextureId, BufferId, SamplerId, RenderTargetId,
    DepthTargetId, RasterizerStateId, DepthStencilStateId, ShaderId,
};
pub use resource_table::ResourceTable;
pub use geometry::{Vertex, MeshData, BuiltinMesh, GeometryGenerator};
