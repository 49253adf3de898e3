//! Attribute packing: imported mesh -> engine mesh streams

use super::bones::pack_bone_influences;
use super::tangent::reconstruct_tangents;
use super::types::{
    ElementFormat, Mesh, MeshDescriptor, MeshError, MeshFeature, StreamData, MAX_INDEX16_COUNT,
};
use crate::scene::ImportedMesh;

/// Convert one imported mesh into an engine mesh.
///
/// Only streams for attributes present on the mesh are declared. Bone
/// indices are offset by `bone_index_offset` so they stay unique across all
/// meshes of a model. NaN normals are repaired in `imported` as well.
pub fn pack_mesh(imported: &mut ImportedMesh, bone_index_offset: u32) -> Result<Mesh, MeshError> {
    let vertex_count = imported.vertex_count();

    let tangent_frames = match (&imported.normals, &imported.tangents, &imported.bitangents) {
        (Some(_), Some(_), Some(_)) => true,
        (None, Some(_), _) => {
            tracing::warn!("Mesh '{}' has tangents but no normals, ignoring tangents", imported.name);
            false
        }
        _ => false,
    };

    let mut descriptors = vec![MeshDescriptor::new(MeshFeature::Vertices, ElementFormat::Float3)];
    if imported.normals.is_some() {
        descriptors.push(MeshDescriptor::new(MeshFeature::Normals, ElementFormat::Float3));
    }
    if imported.uv_sets[0].is_some() {
        descriptors.push(MeshDescriptor::new(MeshFeature::UVSet0, ElementFormat::Float2));
    }
    if imported.uv_sets[1].is_some() {
        descriptors.push(MeshDescriptor::new(MeshFeature::UVSet1, ElementFormat::Float2));
    }
    if tangent_frames {
        descriptors.push(MeshDescriptor::new(MeshFeature::Tangents, ElementFormat::Float4));
    }
    if imported.has_bones() {
        descriptors.push(MeshDescriptor::new(MeshFeature::BoneIndices, ElementFormat::UInt4));
        descriptors.push(MeshDescriptor::new(MeshFeature::BoneWeights, ElementFormat::Float4));
    }

    // Index count comes from valid triangles only, before anything is allocated
    let has_faces = !imported.faces.is_empty();
    let triangle_count = imported.triangle_count();
    let index_count = triangle_count * 3;
    let skipped_faces = imported.faces.len() - triangle_count;
    if skipped_faces > 0 {
        tracing::debug!(
            "Mesh '{}': skipped {} non-triangular faces",
            imported.name,
            skipped_faces
        );
    }
    // 16-bit indices need both the count and every referenced vertex to fit
    let max_index = triangles(imported).copied().max().unwrap_or(0);
    let wide_indices = index_count > MAX_INDEX16_COUNT || max_index > u32::from(u16::MAX);
    if has_faces {
        let format = if wide_indices {
            ElementFormat::UInt32
        } else {
            ElementFormat::UInt16
        };
        descriptors.push(MeshDescriptor::new(MeshFeature::Indices, format));
    }

    let mut mesh = Mesh::new(descriptors, vertex_count, index_count);

    mesh.set_data(
        MeshFeature::Vertices,
        StreamData::Float3(imported.positions.clone()),
    )?;
    for (set, feature) in [MeshFeature::UVSet0, MeshFeature::UVSet1].into_iter().enumerate() {
        if let Some(uvs) = &imported.uv_sets[set] {
            mesh.set_data(feature, StreamData::Float2(uvs.clone()))?;
        }
    }

    // Tangents before normals: reconstruction may repair the normal array
    if tangent_frames {
        if let (Some(normals), Some(tangents), Some(bitangents)) = (
            imported.normals.as_mut(),
            imported.tangents.as_ref(),
            imported.bitangents.as_ref(),
        ) {
            let (signed, repairs) = reconstruct_tangents(normals, tangents, bitangents);
            if repairs.normals > 0 || repairs.tangents > 0 {
                tracing::debug!(
                    "Mesh '{}': repaired {} NaN normals, {} NaN tangents",
                    imported.name,
                    repairs.normals,
                    repairs.tangents
                );
            }
            mesh.set_data(MeshFeature::Tangents, StreamData::Float4(signed))?;
        }
    }

    if let Some(normals) = &imported.normals {
        mesh.set_data(MeshFeature::Normals, StreamData::Float3(normals.clone()))?;
    }

    if imported.has_bones() {
        let influences = pack_bone_influences(vertex_count, &imported.bones, bone_index_offset);
        if influences.dropped > 0 {
            tracing::debug!(
                "Mesh '{}': dropped {} bone influences beyond 4 per vertex",
                imported.name,
                influences.dropped
            );
        }
        mesh.set_data(MeshFeature::BoneIndices, StreamData::UInt4(influences.indices))?;
        mesh.set_data(MeshFeature::BoneWeights, StreamData::Float4(influences.weights))?;
    }

    if has_faces {
        let data = if wide_indices {
            StreamData::UInt32(triangles(imported).copied().collect())
        } else {
            StreamData::UInt16(triangles(imported).map(|&i| i as u16).collect())
        };
        mesh.set_data(MeshFeature::Indices, data)?;
    }

    mesh.calculate_bounds();

    tracing::debug!(
        "Packed mesh '{}': {} vertices, {} indices, {} streams",
        imported.name,
        mesh.vertex_count(),
        mesh.index_count(),
        mesh.attribute_streams().count()
    );

    Ok(mesh)
}

/// Vertex indices of the valid triangles, in face order
fn triangles(imported: &ImportedMesh) -> impl Iterator<Item = &u32> {
    imported.faces.iter().filter(|f| f.len() == 3).flatten()
}
