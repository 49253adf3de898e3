//! glTF/GLB scene importer
//!
//! Reads the document and its buffers (images are never decoded) and copies
//! everything the converter needs into an [`ImportedScene`].

use std::path::Path;

use glam::{Mat4, Quat, Vec3};
use gltf::animation::util::ReadOutputs;
use gltf::animation::Interpolation;
use gltf::mesh::Mode;
use hashbrown::HashMap;

use super::postprocess::{calc_tangent_space, generate_smooth_normals};
use super::{
    Face, ImportOptions, ImportedAnimation, ImportedMaterial, ImportedMesh, ImportedScene,
    MeshBone, NodeTrack, QuatKey, SceneImporter, TextureChannel, VectorKey, VertexWeight,
};
use crate::error::ConvertError;
use crate::math::ImportMatrix;

/// Name of the synthetic node parenting every scene root
const ROOT_NODE_NAME: &str = "RootNode";

/// Scene importer backed by the `gltf` crate
#[derive(Clone, Copy, Debug, Default)]
pub struct GltfImporter;

impl SceneImporter for GltfImporter {
    fn import(&self, path: &Path, options: &ImportOptions) -> Result<ImportedScene, ConvertError> {
        let gltf::Gltf { document, blob } =
            gltf::Gltf::open(path).map_err(|e| ConvertError::import(path, e))?;
        let buffers = gltf::import_buffers(&document, path.parent(), blob)
            .map_err(|e| ConvertError::import(path, e))?;

        let mut scene = ImportedScene::new(ROOT_NODE_NAME);
        let node_map = read_hierarchy(&document, &mut scene);

        scene.materials = document.materials().map(|m| read_material(&m)).collect();
        scene.meshes = read_meshes(&document, &buffers, &scene, &node_map);
        scene.animations = document
            .animations()
            .map(|a| read_animation(&a, &buffers, &scene, &node_map))
            .collect();

        for mesh in &mut scene.meshes {
            if options.recalculate_normals {
                mesh.normals = None;
                mesh.tangents = None;
                mesh.bitangents = None;
                generate_smooth_normals(mesh, options.smooth_normal_angle);
            }
            if mesh.tangents.is_none() {
                calc_tangent_space(mesh);
            }
        }

        tracing::debug!(
            "Imported {:?}: {} nodes, {} meshes, {} materials, {} animations",
            path,
            scene.nodes.len(),
            scene.meshes.len(),
            scene.materials.len(),
            scene.animations.len()
        );

        Ok(scene)
    }

    fn extensions(&self) -> &[&str] {
        &["gltf", "glb"]
    }
}

/// Copy the node hierarchy of the default scene under the synthetic root.
///
/// Returns a map from glTF node index to scene node index.
fn read_hierarchy(document: &gltf::Document, scene: &mut ImportedScene) -> Vec<Option<usize>> {
    let mut node_map = vec![None; document.nodes().count()];

    let roots: Vec<gltf::Node> = match document.default_scene().or_else(|| document.scenes().next())
    {
        Some(s) => s.nodes().collect(),
        None => {
            // No scene: every node that is nobody's child is a root
            let mut is_child = vec![false; node_map.len()];
            for node in document.nodes() {
                for child in node.children() {
                    is_child[child.index()] = true;
                }
            }
            document.nodes().filter(|n| !is_child[n.index()]).collect()
        }
    };

    let mut stack: Vec<(gltf::Node, usize)> = roots
        .into_iter()
        .rev()
        .map(|n| (n, ImportedScene::ROOT))
        .collect();
    while let Some((node, parent)) = stack.pop() {
        if node_map[node.index()].is_some() {
            continue;
        }
        let name = node
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("node_{}", node.index()));
        let transform = ImportMatrix::from_engine(&Mat4::from_cols_array_2d(
            &node.transform().matrix(),
        ));
        let index = scene.add_node(name, parent, transform);
        node_map[node.index()] = Some(index);

        let children: Vec<_> = node.children().collect();
        stack.extend(children.into_iter().rev().map(|c| (c, index)));
    }

    node_map
}

fn read_material(material: &gltf::Material) -> ImportedMaterial {
    let mut textures = Vec::new();
    let mut push = |channel: TextureChannel, texture: gltf::Texture| {
        match texture.source().source() {
            gltf::image::Source::Uri { uri, .. } => textures.push((channel, uri.to_string())),
            gltf::image::Source::View { .. } => {
                tracing::debug!("Skipping embedded {:?} texture", channel);
            }
        }
    };

    if let Some(info) = material.pbr_metallic_roughness().base_color_texture() {
        push(TextureChannel::Diffuse, info.texture());
    }
    if let Some(normal) = material.normal_texture() {
        push(TextureChannel::Normals, normal.texture());
    }
    if let Some(info) = material.emissive_texture() {
        push(TextureChannel::Emissive, info.texture());
    }
    if let Some(occlusion) = material.occlusion_texture() {
        push(TextureChannel::Ambient, occlusion.texture());
    }

    ImportedMaterial {
        name: material.name().unwrap_or("unnamed").to_string(),
        textures,
    }
}

fn read_meshes(
    document: &gltf::Document,
    buffers: &[gltf::buffer::Data],
    scene: &ImportedScene,
    node_map: &[Option<usize>],
) -> Vec<ImportedMesh> {
    // Visit mesh nodes in hierarchy order so mesh (and bone) order is stable
    let mut mesh_nodes: Vec<(usize, gltf::Node)> = document
        .nodes()
        .filter(|n| n.mesh().is_some())
        .filter_map(|n| node_map[n.index()].map(|idx| (idx, n)))
        .collect();
    mesh_nodes.sort_by_key(|(idx, _)| *idx);

    let mut meshes = Vec::new();
    for (scene_index, node) in mesh_nodes {
        let Some(mesh) = node.mesh() else {
            continue;
        };
        for primitive in mesh.primitives() {
            let name = mesh
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| scene.nodes[scene_index].name.clone());
            match read_primitive(&primitive, node.skin(), buffers, scene, node_map, name) {
                Some(m) => meshes.push(m),
                None => tracing::warn!(
                    "Primitive {} of mesh {} has no positions, skipping",
                    primitive.index(),
                    mesh.index()
                ),
            }
        }
    }
    meshes
}

fn read_primitive(
    primitive: &gltf::Primitive,
    skin: Option<gltf::Skin>,
    buffers: &[gltf::buffer::Data],
    scene: &ImportedScene,
    node_map: &[Option<usize>],
    name: String,
) -> Option<ImportedMesh> {
    let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

    let positions: Vec<[f32; 3]> = reader.read_positions()?.collect();
    let vertex_count = positions.len();

    let normals: Option<Vec<[f32; 3]>> = reader
        .read_normals()
        .map(|iter| iter.collect())
        .filter(|n: &Vec<[f32; 3]>| n.len() == vertex_count);
    let uv_sets = [0, 1].map(|set| {
        reader
            .read_tex_coords(set)
            .map(|iter| iter.into_f32().collect::<Vec<_>>())
            .filter(|uv| uv.len() == vertex_count)
    });

    // glTF stores handedness in w; the bitangent is rebuilt from it
    let (tangents, bitangents) = match (&normals, reader.read_tangents()) {
        (Some(normals), Some(iter)) => {
            let raw: Vec<[f32; 4]> = iter.collect();
            if raw.len() == vertex_count {
                let bitangents = raw
                    .iter()
                    .zip(normals)
                    .map(|(t, n)| {
                        (Vec3::from_array(*n).cross(Vec3::new(t[0], t[1], t[2])) * t[3]).to_array()
                    })
                    .collect();
                let tangents = raw.iter().map(|t| [t[0], t[1], t[2]]).collect();
                (Some(tangents), Some(bitangents))
            } else {
                (None, None)
            }
        }
        _ => (None, None),
    };

    let indices: Vec<u32> = reader
        .read_indices()
        .map(|iter| iter.into_u32().collect())
        .unwrap_or_else(|| (0..vertex_count as u32).collect());
    let faces = build_faces(primitive.mode(), &indices);

    let bones = match (skin, reader.read_joints(0), reader.read_weights(0)) {
        (Some(skin), Some(joints), Some(weights)) => {
            let joints: Vec<[u16; 4]> = joints.into_u16().collect();
            let weights: Vec<[f32; 4]> = weights.into_f32().collect();
            read_skin_bones(&skin, &joints, &weights, buffers, scene, node_map)
        }
        (None, Some(_), _) => {
            tracing::warn!("Mesh '{}' has joints but its node has no skin, ignoring skinning", name);
            Vec::new()
        }
        _ => Vec::new(),
    };

    Some(ImportedMesh {
        name,
        positions,
        normals,
        uv_sets,
        tangents,
        bitangents,
        bones,
        faces,
        material: primitive.material().index(),
    })
}

/// One bone per skin joint, carrying the (vertex, weight) pairs that name it
fn read_skin_bones(
    skin: &gltf::Skin,
    joints: &[[u16; 4]],
    weights: &[[f32; 4]],
    buffers: &[gltf::buffer::Data],
    scene: &ImportedScene,
    node_map: &[Option<usize>],
) -> Vec<MeshBone> {
    let skin_joints: Vec<gltf::Node> = skin.joints().collect();
    let inverse_bind: Vec<[[f32; 4]; 4]> = skin
        .reader(|buffer| Some(&buffers[buffer.index()]))
        .read_inverse_bind_matrices()
        .map(|iter| iter.collect())
        .unwrap_or_default();

    let mut bones: Vec<MeshBone> = skin_joints
        .iter()
        .enumerate()
        .map(|(j, joint)| MeshBone {
            name: node_map[joint.index()]
                .map(|idx| scene.nodes[idx].name.clone())
                .unwrap_or_else(|| joint.name().unwrap_or("unnamed").to_string()),
            offset: inverse_bind
                .get(j)
                .map(|m| ImportMatrix::from_engine(&Mat4::from_cols_array_2d(m)))
                .unwrap_or(ImportMatrix::IDENTITY),
            weights: Vec::new(),
        })
        .collect();

    for (vertex, (js, ws)) in joints.iter().zip(weights).enumerate() {
        for (&joint, &weight) in js.iter().zip(ws) {
            if weight <= 0.0 {
                continue;
            }
            match bones.get_mut(joint as usize) {
                Some(bone) => bone.weights.push(VertexWeight {
                    vertex: vertex as u32,
                    weight,
                }),
                None => tracing::warn!(
                    "Vertex {} references joint {} but the skin has {} joints",
                    vertex,
                    joint,
                    skin_joints.len()
                ),
            }
        }
    }

    bones
}

/// Split an index list into faces according to the primitive topology
fn build_faces(mode: Mode, indices: &[u32]) -> Vec<Face> {
    match mode {
        Mode::Triangles => indices.chunks_exact(3).map(<[u32]>::to_vec).collect(),
        Mode::TriangleStrip => (0..indices.len().saturating_sub(2))
            .map(|i| {
                if i % 2 == 0 {
                    vec![indices[i], indices[i + 1], indices[i + 2]]
                } else {
                    vec![indices[i + 1], indices[i], indices[i + 2]]
                }
            })
            .collect(),
        Mode::TriangleFan => (1..indices.len().saturating_sub(1))
            .map(|i| vec![indices[0], indices[i], indices[i + 1]])
            .collect(),
        Mode::Points => indices.iter().map(|&i| vec![i]).collect(),
        Mode::Lines => indices.chunks_exact(2).map(<[u32]>::to_vec).collect(),
        Mode::LineStrip => indices.windows(2).map(<[u32]>::to_vec).collect(),
        Mode::LineLoop => {
            let mut faces: Vec<Face> = indices.windows(2).map(<[u32]>::to_vec).collect();
            if let (Some(&first), Some(&last)) = (indices.first(), indices.last()) {
                if indices.len() > 2 {
                    faces.push(vec![last, first]);
                }
            }
            faces
        }
    }
}

fn read_animation(
    animation: &gltf::Animation,
    buffers: &[gltf::buffer::Data],
    scene: &ImportedScene,
    node_map: &[Option<usize>],
) -> ImportedAnimation {
    let mut tracks: Vec<NodeTrack> = Vec::new();
    let mut track_of_node: HashMap<usize, usize> = HashMap::new();
    let mut duration = 0.0f32;

    for channel in animation.channels() {
        let target = channel.target().node();
        let Some(scene_index) = node_map[target.index()] else {
            continue;
        };
        let reader = channel.reader(|buffer| Some(&buffers[buffer.index()]));
        let (Some(inputs), Some(outputs)) = (reader.read_inputs(), reader.read_outputs()) else {
            continue;
        };
        let times: Vec<f32> = inputs.collect();
        if let Some(&last) = times.last() {
            duration = duration.max(last);
        }
        let cubic = channel.sampler().interpolation() == Interpolation::CubicSpline;

        let track_index = *track_of_node.entry(scene_index).or_insert_with(|| {
            tracks.push(NodeTrack {
                node_name: scene.nodes[scene_index].name.clone(),
                ..Default::default()
            });
            tracks.len() - 1
        });
        let track = &mut tracks[track_index];

        match outputs {
            ReadOutputs::Translations(iter) => {
                track.position_keys = vector_keys(&times, keyframe_values(iter.collect(), cubic));
            }
            ReadOutputs::Scales(iter) => {
                track.scale_keys = vector_keys(&times, keyframe_values(iter.collect(), cubic));
            }
            ReadOutputs::Rotations(rotations) => {
                let values = keyframe_values(rotations.into_f32().collect(), cubic);
                track.rotation_keys = times
                    .iter()
                    .zip(values)
                    .map(|(&time, q)| QuatKey {
                        time,
                        value: Quat::from_array(q),
                    })
                    .collect();
            }
            ReadOutputs::MorphTargetWeights(_) => {}
        }
    }

    ImportedAnimation {
        name: animation
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("animation_{}", animation.index())),
        duration,
        tracks,
    }
}

/// Cubic-spline samplers store (in-tangent, value, out-tangent) triples
fn keyframe_values<T: Copy>(values: Vec<T>, cubic: bool) -> Vec<T> {
    if cubic {
        values.chunks_exact(3).map(|c| c[1]).collect()
    } else {
        values
    }
}

fn vector_keys(times: &[f32], values: Vec<[f32; 3]>) -> Vec<VectorKey> {
    times
        .iter()
        .zip(values)
        .map(|(&time, v)| VectorKey {
            time,
            value: Vec3::from_array(v),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_and_fans_become_triangles() {
        let strip = build_faces(Mode::TriangleStrip, &[0, 1, 2, 3]);
        assert_eq!(strip, vec![vec![0, 1, 2], vec![2, 1, 3]]);

        let fan = build_faces(Mode::TriangleFan, &[0, 1, 2, 3]);
        assert_eq!(fan, vec![vec![0, 1, 2], vec![0, 2, 3]]);
    }

    #[test]
    fn line_primitives_yield_two_index_faces() {
        let lines = build_faces(Mode::LineLoop, &[0, 1, 2]);
        assert_eq!(lines, vec![vec![0, 1], vec![1, 2], vec![2, 0]]);
        assert!(lines.iter().all(|f| f.len() == 2));
    }

    #[test]
    fn cubic_spline_keeps_middle_value() {
        let values = keyframe_values(vec![1, 2, 3, 4, 5, 6], true);
        assert_eq!(values, vec![2, 5]);
    }
}
