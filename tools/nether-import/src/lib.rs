//! nether-import library
//!
//! Converts imported scenes (glTF/GLB) into engine models: packed mesh
//! streams per LOD stage, materials, and a skeleton with merged animations.

pub mod animation;
pub mod error;
pub mod loader;
pub mod material;
pub mod math;
pub mod mesh;
pub mod model;
pub mod scene;
pub mod settings;
pub mod skeleton;

pub use error::ConvertError;
pub use loader::{build_skeleton, load_stage, lod_path, ModelLoader};
pub use material::{Material, TextureRef};
pub use math::ImportMatrix;
pub use model::{LodStage, MeshGroup, Model, DEFAULT_LOD_FACTORS};
pub use scene::{GltfImporter, ImportOptions, ImportedScene, SceneImporter};
pub use settings::{load_settings, ConvertSettings};

// Re-export animation and skeleton types
pub use animation::{merge_node_track, Animation, Keyframe, KeyframeChain};
pub use skeleton::{reconstruct_skeleton, Bone, BoneNodes, Skeleton, SkeletonBuilder};
