//! Bone influence packing into four slots per vertex

use crate::scene::MeshBone;

/// Number of influence slots per vertex
pub const MAX_INFLUENCES: usize = 4;

#[derive(Clone, Copy, Debug, Default)]
struct InfluenceSlot {
    bone: u32,
    weight: f32,
    used: bool,
}

/// Packed bone influences as two parallel 4-component streams
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BoneInfluences {
    pub indices: Vec<[u32; MAX_INFLUENCES]>,
    pub weights: Vec<[f32; MAX_INFLUENCES]>,
    /// Influences dropped because their vertex already had four
    pub dropped: usize,
}

/// Pack the weights declared by `bones` into four slots per vertex.
///
/// Bones are visited in declaration order and slots fill first come, first
/// served; a fifth influence on a vertex is dropped. Stored bone indices are
/// `bone_index_offset + position in bones`. Unused slots are `(0, 0.0)`.
pub fn pack_bone_influences(
    vertex_count: usize,
    bones: &[MeshBone],
    bone_index_offset: u32,
) -> BoneInfluences {
    let mut slots = vec![[InfluenceSlot::default(); MAX_INFLUENCES]; vertex_count];
    let mut dropped = 0;

    for (bone_index, bone) in bones.iter().enumerate() {
        let global_index = bone_index_offset + bone_index as u32;
        for w in &bone.weights {
            let Some(vertex) = slots.get_mut(w.vertex as usize) else {
                tracing::warn!(
                    "Bone '{}' weights vertex {} but the mesh has {} vertices",
                    bone.name,
                    w.vertex,
                    vertex_count
                );
                continue;
            };
            if !w.weight.is_finite() {
                tracing::warn!(
                    "Bone '{}' has a non-finite weight on vertex {}, ignoring it",
                    bone.name,
                    w.vertex
                );
                continue;
            }
            match vertex.iter_mut().find(|slot| !slot.used) {
                Some(slot) => {
                    *slot = InfluenceSlot {
                        bone: global_index,
                        weight: w.weight.clamp(0.0, 1.0),
                        used: true,
                    }
                }
                None => dropped += 1,
            }
        }
    }

    // Unused slots are already (0, 0.0) from Default
    let indices = slots.iter().map(|v| v.map(|slot| slot.bone)).collect();
    let weights = slots.iter().map(|v| v.map(|slot| slot.weight)).collect();

    BoneInfluences {
        indices,
        weights,
        dropped,
    }
}
