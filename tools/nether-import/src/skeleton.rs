//! Skeleton reconstruction from mesh bone references
//!
//! Bones are identified by their index in the flat bone list. Names come from
//! the source file and may repeat.

use glam::Mat4;
use hashbrown::{HashMap, HashSet};

use crate::animation::Animation;
use crate::error::ConvertError;
use crate::scene::ImportedScene;

/// One bone of the flat bone list
#[derive(Clone, Debug, PartialEq)]
pub struct Bone {
    pub name: String,
    /// Mesh space to bone space at rest pose
    pub offset: Mat4,
    pub is_root: bool,
    /// Indices of direct children in the flat bone list
    pub children: Vec<usize>,
    /// Parent index, derived when the skeleton is finished
    pub parent: Option<usize>,
    /// Bone space to mesh space at rest pose (inverse of `offset`)
    pub bind: Mat4,
    /// Rest transform relative to the parent bone
    pub local_bind: Mat4,
}

impl Bone {
    pub fn new(name: impl Into<String>, offset: Mat4, is_root: bool) -> Self {
        Self {
            name: name.into(),
            offset,
            is_root,
            children: Vec::new(),
            parent: None,
            bind: Mat4::IDENTITY,
            local_bind: Mat4::IDENTITY,
        }
    }
}

/// Collects bones; [`SkeletonBuilder::finish`] derives per-bone state once.
#[derive(Debug, Default)]
pub struct SkeletonBuilder {
    bones: Vec<Bone>,
}

impl SkeletonBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a bone and return its index
    pub fn push(&mut self, bone: Bone) -> usize {
        self.bones.push(bone);
        self.bones.len() - 1
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    /// Resolve parents and bind matrices. Consumes the builder, so no bone
    /// can be appended after finalization.
    pub fn finish(mut self) -> Skeleton {
        let count = self.bones.len();
        for index in 0..count {
            let children = self.bones[index].children.clone();
            for child in children {
                match self.bones.get_mut(child) {
                    Some(bone) => bone.parent = Some(index),
                    None => tracing::warn!("Bone {} lists missing child {}", index, child),
                }
            }
        }

        for bone in &mut self.bones {
            bone.bind = bone.offset.inverse();
        }
        for index in 0..count {
            let local = match self.bones[index].parent {
                Some(parent) => self.bones[parent].offset * self.bones[index].bind,
                None => self.bones[index].bind,
            };
            self.bones[index].local_bind = local;
        }

        Skeleton {
            bones: self.bones,
            animations: HashMap::new(),
        }
    }
}

/// Flat bone list plus the animations that drive it
#[derive(Clone, Debug, Default)]
pub struct Skeleton {
    bones: Vec<Bone>,
    animations: HashMap<String, Animation>,
}

impl Skeleton {
    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    pub fn bone(&self, index: usize) -> Option<&Bone> {
        self.bones.get(index)
    }

    /// Index of the first bone called `name`
    pub fn bone_index(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|b| b.name == name)
    }

    /// Indices of root bones
    pub fn roots(&self) -> impl Iterator<Item = usize> + '_ {
        self.bones
            .iter()
            .enumerate()
            .filter(|(_, b)| b.is_root)
            .map(|(i, _)| i)
    }

    pub fn animations(&self) -> &HashMap<String, Animation> {
        &self.animations
    }

    pub fn animation(&self, name: &str) -> Option<&Animation> {
        self.animations.get(name)
    }

    /// Add an animation under its name. An existing animation with the same
    /// name is kept and `false` is returned.
    pub fn insert_animation(&mut self, animation: Animation) -> bool {
        match self.animations.entry(animation.name().to_string()) {
            hashbrown::hash_map::Entry::Occupied(_) => false,
            hashbrown::hash_map::Entry::Vacant(slot) => {
                slot.insert(animation);
                true
            }
        }
    }
}

/// Scene nodes backing the flat bone list, in bone order.
///
/// The first `skinned` entries are one per (mesh, bone) reference; the rest
/// are ancestors recovered so the hierarchy reaches a root.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BoneNodes {
    nodes: Vec<usize>,
    skinned: usize,
    bones_of_node: HashMap<usize, Vec<usize>>,
}

impl BoneNodes {
    fn new(nodes: Vec<usize>, skinned: usize) -> Self {
        let mut bones_of_node: HashMap<usize, Vec<usize>> = HashMap::new();
        for (bone, &node) in nodes.iter().enumerate() {
            bones_of_node.entry(node).or_default().push(bone);
        }
        Self {
            nodes,
            skinned,
            bones_of_node,
        }
    }

    pub fn nodes(&self) -> &[usize] {
        &self.nodes
    }

    pub fn skinned_count(&self) -> usize {
        self.skinned
    }

    pub fn recovered_count(&self) -> usize {
        self.nodes.len() - self.skinned
    }

    /// Every bone index backed by `node`, ascending
    pub fn bones_of(&self, node: usize) -> &[usize] {
        self.bones_of_node
            .get(&node)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Resolve every mesh bone to its node and recover unskinned ancestors.
///
/// A node referenced by several meshes appears once per reference.
pub fn collect_bone_nodes(scene: &ImportedScene) -> Result<BoneNodes, ConvertError> {
    let mut nodes = Vec::new();
    for bone in scene.meshes.iter().flat_map(|m| &m.bones) {
        let node = scene
            .find_node(&bone.name)
            .ok_or_else(|| ConvertError::UnresolvedBone {
                name: bone.name.clone(),
            })?;
        nodes.push(node);
    }
    let skinned = nodes.len();

    let mut known: HashSet<usize> = nodes.iter().copied().collect();
    for i in 0..skinned {
        let mut ancestor = scene.nodes[nodes[i]].parent;
        while let Some(node) = ancestor {
            if !known.insert(node) {
                break;
            }
            nodes.push(node);
            ancestor = scene.nodes[node].parent;
        }
    }

    Ok(BoneNodes::new(nodes, skinned))
}

/// Rebuild the flat bone list from the scene's mesh bones.
pub fn reconstruct_skeleton(scene: &ImportedScene) -> Result<(Skeleton, BoneNodes), ConvertError> {
    let bone_nodes = collect_bone_nodes(scene)?;
    let mut linked: HashSet<usize> = HashSet::new();
    let mut builder = SkeletonBuilder::new();

    let mesh_bones = scene.meshes.iter().flat_map(|m| &m.bones);
    for (mesh_bone, &node) in mesh_bones.zip(bone_nodes.nodes()) {
        let mut bone = Bone::new(
            mesh_bone.name.clone(),
            mesh_bone.offset.to_engine(),
            scene.nodes[node].parent.is_none(),
        );
        bone.children = link_children(scene, &bone_nodes, node, &mut linked);
        builder.push(bone);
    }

    for &node in &bone_nodes.nodes()[bone_nodes.skinned_count()..] {
        let scene_node = &scene.nodes[node];
        let mut bone = Bone::new(
            scene_node.name.clone(),
            scene.global_transform(node).inverse(),
            scene_node.parent.is_none(),
        );
        bone.children = link_children(scene, &bone_nodes, node, &mut linked);
        builder.push(bone);
    }

    tracing::debug!(
        "Reconstructed skeleton: {} bones ({} recovered ancestors)",
        builder.len(),
        bone_nodes.recovered_count()
    );

    Ok((builder.finish(), bone_nodes))
}

/// Child bone indices of `node` that no other bone has claimed yet
fn link_children(
    scene: &ImportedScene,
    bone_nodes: &BoneNodes,
    node: usize,
    linked: &mut HashSet<usize>,
) -> Vec<usize> {
    let mut children = Vec::new();
    for &child in &scene.nodes[node].children {
        for &bone in bone_nodes.bones_of(child) {
            if linked.insert(bone) {
                children.push(bone);
            }
        }
    }
    children
}
