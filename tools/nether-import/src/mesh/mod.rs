//! Mesh conversion (imported mesh -> engine streams)

mod bones;
mod packing;
mod tangent;
mod types;

// Re-export public API
pub use bones::{pack_bone_influences, BoneInfluences, MAX_INFLUENCES};
pub use packing::pack_mesh;
pub use tangent::{reconstruct_tangents, TangentRepairs, FALLBACK_NORMAL};
pub use types::{
    AttributeStream, BoundingVolumes, ElementFormat, Mesh, MeshDescriptor, MeshError, MeshFeature,
    StreamData,
};
