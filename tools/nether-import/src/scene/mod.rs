//! Imported scene description
//!
//! An owned, index-based copy of whatever the external importer produced.
//! Nothing here borrows from the importer, so a scene can be moved into the
//! converter and dropped once the model is built.

mod gltf;
mod postprocess;

use std::path::Path;

use glam::{Quat, Vec3};

use crate::error::ConvertError;
use crate::math::ImportMatrix;

pub use self::gltf::GltfImporter;
pub use postprocess::{calc_tangent_space, generate_smooth_normals};

/// Options forwarded to the importer before conversion
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ImportOptions {
    /// Drop imported normals/tangents and regenerate them
    pub recalculate_normals: bool,
    /// Maximum angle (degrees) between faces that still share a smooth normal
    pub smooth_normal_angle: f32,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            recalculate_normals: false,
            smooth_normal_angle: 20.0,
        }
    }
}

/// Source of imported scenes (glTF reader, test fakes, ...)
pub trait SceneImporter {
    /// Parse and post-process the file at `path`.
    fn import(&self, path: &Path, options: &ImportOptions) -> Result<ImportedScene, ConvertError>;

    /// Lowercase file extensions this importer understands.
    fn extensions(&self) -> &[&str];
}

/// Node of the scene hierarchy
#[derive(Clone, Debug)]
pub struct SceneNode {
    pub name: String,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    /// Transform relative to the parent node
    pub transform: ImportMatrix,
}

/// Single (vertex, weight) pair declared by a bone
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VertexWeight {
    pub vertex: u32,
    pub weight: f32,
}

/// Bone reference of one mesh
#[derive(Clone, Debug)]
pub struct MeshBone {
    /// Name of the hierarchy node driving this bone
    pub name: String,
    /// Mesh space to bone space at rest pose
    pub offset: ImportMatrix,
    pub weights: Vec<VertexWeight>,
}

/// Polygon as a list of vertex indices
pub type Face = Vec<u32>;

/// Raw per-vertex arrays of one mesh
#[derive(Clone, Debug, Default)]
pub struct ImportedMesh {
    pub name: String,
    pub positions: Vec<[f32; 3]>,
    pub normals: Option<Vec<[f32; 3]>>,
    /// Up to two UV sets
    pub uv_sets: [Option<Vec<[f32; 2]>>; 2],
    pub tangents: Option<Vec<[f32; 3]>>,
    pub bitangents: Option<Vec<[f32; 3]>>,
    pub bones: Vec<MeshBone>,
    pub faces: Vec<Face>,
    pub material: Option<usize>,
}

impl ImportedMesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn has_bones(&self) -> bool {
        !self.bones.is_empty()
    }

    /// Number of faces with exactly three indices
    pub fn triangle_count(&self) -> usize {
        self.faces.iter().filter(|f| f.len() == 3).count()
    }
}

/// Texture semantic channel
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureChannel {
    Diffuse,
    Normals,
    Specular,
    Height,
    Displacement,
    Emissive,
    Ambient,
}

impl TextureChannel {
    /// Channels holding non-colour data are sampled linearly
    pub fn is_linear(self) -> bool {
        matches!(self, Self::Normals | Self::Height | Self::Displacement)
    }
}

/// Material as seen by the importer: texture references per channel
#[derive(Clone, Debug, Default)]
pub struct ImportedMaterial {
    pub name: String,
    pub textures: Vec<(TextureChannel, String)>,
}

impl ImportedMaterial {
    pub fn texture_count(&self, channel: TextureChannel) -> usize {
        self.textures.iter().filter(|(c, _)| *c == channel).count()
    }

    /// The `index`-th texture uri bound to `channel`
    pub fn texture(&self, channel: TextureChannel, index: usize) -> Option<&str> {
        self.textures
            .iter()
            .filter(|(c, _)| *c == channel)
            .nth(index)
            .map(|(_, uri)| uri.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VectorKey {
    pub time: f32,
    pub value: Vec3,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QuatKey {
    pub time: f32,
    pub value: Quat,
}

/// Independently sampled key tracks of one animated node.
///
/// Keys are sorted by time within each track.
#[derive(Clone, Debug, Default)]
pub struct NodeTrack {
    pub node_name: String,
    pub position_keys: Vec<VectorKey>,
    pub rotation_keys: Vec<QuatKey>,
    pub scale_keys: Vec<VectorKey>,
}

#[derive(Clone, Debug, Default)]
pub struct ImportedAnimation {
    pub name: String,
    /// Declared duration in seconds
    pub duration: f32,
    pub tracks: Vec<NodeTrack>,
}

/// Complete imported scene. Node 0 is the root.
#[derive(Clone, Debug)]
pub struct ImportedScene {
    pub nodes: Vec<SceneNode>,
    pub meshes: Vec<ImportedMesh>,
    pub materials: Vec<ImportedMaterial>,
    pub animations: Vec<ImportedAnimation>,
}

impl ImportedScene {
    /// Scene with only a root node named `root_name`
    pub fn new(root_name: impl Into<String>) -> Self {
        Self {
            nodes: vec![SceneNode {
                name: root_name.into(),
                parent: None,
                children: Vec::new(),
                transform: ImportMatrix::IDENTITY,
            }],
            meshes: Vec::new(),
            materials: Vec::new(),
            animations: Vec::new(),
        }
    }

    pub const ROOT: usize = 0;

    /// Append a node under `parent` and return its index
    pub fn add_node(
        &mut self,
        name: impl Into<String>,
        parent: usize,
        transform: ImportMatrix,
    ) -> usize {
        let index = self.nodes.len();
        self.nodes.push(SceneNode {
            name: name.into(),
            parent: Some(parent),
            children: Vec::new(),
            transform,
        });
        self.nodes[parent].children.push(index);
        index
    }

    /// Depth-first pre-order search from the root; duplicate names resolve
    /// to the first node visited.
    pub fn find_node(&self, name: &str) -> Option<usize> {
        let mut stack = vec![Self::ROOT];
        while let Some(index) = stack.pop() {
            let node = self.nodes.get(index)?;
            if node.name == name {
                return Some(index);
            }
            stack.extend(node.children.iter().rev());
        }
        None
    }

    /// Transform from node space to root space
    pub fn global_transform(&self, node: usize) -> glam::Mat4 {
        let mut transform = self.nodes[node].transform.to_engine();
        let mut parent = self.nodes[node].parent;
        while let Some(p) = parent {
            transform = self.nodes[p].transform.to_engine() * transform;
            parent = self.nodes[p].parent;
        }
        transform
    }
}
