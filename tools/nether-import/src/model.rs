//! Converted model: LOD stages of (mesh, material) pairs plus an optional skeleton

use std::sync::Arc;

use crate::material::Material;
use crate::mesh::Mesh;
use crate::skeleton::Skeleton;

/// LOD factors for stages 1..=5; the base stage uses 0.0
pub const DEFAULT_LOD_FACTORS: [f32; 5] = [0.05, 0.125, 0.5, 0.75, 0.9];

#[derive(Debug, Clone)]
pub struct MeshGroup {
    pub mesh: Arc<Mesh>,
    pub material: Arc<Material>,
}

#[derive(Debug, Clone, Default)]
pub struct LodStage {
    /// Screen-size factor below which this stage is used
    pub lod_factor: f32,
    pub meshes: Vec<MeshGroup>,
}

impl LodStage {
    pub fn new(lod_factor: f32) -> Self {
        Self {
            lod_factor,
            meshes: Vec::new(),
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.meshes.iter().map(|g| g.mesh.vertex_count()).sum()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Model {
    pub stages: Vec<LodStage>,
    pub skeleton: Option<Arc<Skeleton>>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage and return its index
    pub fn add_stage(&mut self, stage: LodStage) -> usize {
        self.stages.push(stage);
        self.stages.len() - 1
    }

    pub fn stage(&self, index: usize) -> Option<&LodStage> {
        self.stages.get(index)
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn skeleton(&self) -> Option<&Skeleton> {
        self.skeleton.as_deref()
    }
}
