//! glTF fixture generation for integration tests.
//!
//! Writes a `.gltf` document plus an external `.bin` buffer containing:
//! - one skinned mesh (two triangles, normals, UVs, joints, weights)
//! - hierarchy RootNode -> Armature -> Hip -> Spine, plus the mesh node
//! - a material with base colour and normal textures
//! - animation "wave" (Spine rotation, Hip translation) and a zero-length "idle"

use serde_json::{json, Value};
use std::path::{Path, PathBuf};

/// Skin joints, in joint order
pub const JOINTS: [&str; 2] = ["Hip", "Spine"];
pub const VERTEX_COUNT: usize = 6;

const FLOAT: u32 = 5126;
const UNSIGNED_BYTE: u32 = 5121;
const UNSIGNED_SHORT: u32 = 5123;

#[derive(Default)]
struct BufferBuilder {
    data: Vec<u8>,
    views: Vec<Value>,
    accessors: Vec<Value>,
}

impl BufferBuilder {
    fn push(
        &mut self,
        bytes: &[u8],
        component_type: u32,
        ty: &str,
        count: usize,
        bounds: Option<(Value, Value)>,
    ) -> usize {
        while self.data.len() % 4 != 0 {
            self.data.push(0);
        }
        let offset = self.data.len();
        self.data.extend_from_slice(bytes);
        self.views.push(json!({
            "buffer": 0,
            "byteOffset": offset,
            "byteLength": bytes.len(),
        }));

        let mut accessor = json!({
            "bufferView": self.views.len() - 1,
            "componentType": component_type,
            "count": count,
            "type": ty,
        });
        if let Some((min, max)) = bounds {
            accessor["min"] = min;
            accessor["max"] = max;
        }
        self.accessors.push(accessor);
        self.accessors.len() - 1
    }

    fn push_vec3(&mut self, values: &[[f32; 3]], bounds: bool) -> usize {
        let bounds = bounds.then(|| {
            let mut min = [f32::MAX; 3];
            let mut max = [f32::MIN; 3];
            for v in values {
                for i in 0..3 {
                    min[i] = min[i].min(v[i]);
                    max[i] = max[i].max(v[i]);
                }
            }
            (json!(min), json!(max))
        });
        self.push(bytemuck::cast_slice(values), FLOAT, "VEC3", values.len(), bounds)
    }

    fn push_times(&mut self, times: &[f32]) -> usize {
        let min = times.iter().copied().fold(f32::MAX, f32::min);
        let max = times.iter().copied().fold(f32::MIN, f32::max);
        self.push(
            bytemuck::cast_slice(times),
            FLOAT,
            "SCALAR",
            times.len(),
            Some((json!([min]), json!([max]))),
        )
    }
}

/// Column-major translation matrix
fn translation(x: f32, y: f32, z: f32) -> [f32; 16] {
    [
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        x, y, z, 1.0,
    ]
}

fn rotation_z(angle: f32) -> [f32; 4] {
    [0.0, 0.0, (angle * 0.5).sin(), (angle * 0.5).cos()]
}

/// Write `<dir>/<name>.gltf` and `<dir>/<name>.bin`, returning the `.gltf` path
pub fn write_skinned_gltf(dir: &Path, name: &str) -> PathBuf {
    let mut buffer = BufferBuilder::default();

    let positions: [[f32; 3]; VERTEX_COUNT] = [
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, 1.0, 0.0],
        [1.0, 1.0, 0.0],
        [0.0, 2.0, 0.0],
    ];
    let normals = [[0.0f32, 0.0, 1.0]; VERTEX_COUNT];
    let uvs: [[f32; 2]; VERTEX_COUNT] = [
        [0.0, 0.0],
        [1.0, 0.0],
        [0.0, 1.0],
        [0.0, 0.0],
        [1.0, 0.0],
        [0.0, 1.0],
    ];
    // Lower triangle follows Hip, upper triangle is shared between Hip and Spine
    let joints: [[u8; 4]; VERTEX_COUNT] = [
        [0, 0, 0, 0],
        [0, 0, 0, 0],
        [0, 0, 0, 0],
        [0, 1, 0, 0],
        [0, 1, 0, 0],
        [0, 1, 0, 0],
    ];
    let weights: [[f32; 4]; VERTEX_COUNT] = [
        [1.0, 0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0, 0.0],
        [0.5, 0.5, 0.0, 0.0],
        [0.5, 0.5, 0.0, 0.0],
        [0.5, 0.5, 0.0, 0.0],
    ];
    let indices: [u16; 6] = [0, 1, 2, 3, 4, 5];
    let inverse_bind = [translation(0.0, -1.0, 0.0), translation(0.0, -2.0, 0.0)];

    let position_acc = buffer.push_vec3(&positions, true);
    let normal_acc = buffer.push_vec3(&normals, false);
    let uv_acc = buffer.push(bytemuck::cast_slice(&uvs), FLOAT, "VEC2", VERTEX_COUNT, None);
    let joints_acc = buffer.push(
        bytemuck::cast_slice(&joints),
        UNSIGNED_BYTE,
        "VEC4",
        VERTEX_COUNT,
        None,
    );
    let weights_acc = buffer.push(
        bytemuck::cast_slice(&weights),
        FLOAT,
        "VEC4",
        VERTEX_COUNT,
        None,
    );
    let ibm_acc = buffer.push(
        bytemuck::cast_slice(&inverse_bind),
        FLOAT,
        "MAT4",
        inverse_bind.len(),
        None,
    );

    // "wave": Spine rotates over three keys, Hip moves over two
    let spine_times = buffer.push_times(&[0.0, 0.5, 1.0]);
    let spine_rotations = [rotation_z(0.0), rotation_z(0.5), rotation_z(1.0)];
    let spine_rot_acc = buffer.push(
        bytemuck::cast_slice(&spine_rotations),
        FLOAT,
        "VEC4",
        spine_rotations.len(),
        None,
    );
    let hip_times = buffer.push_times(&[0.0, 1.0]);
    let hip_pos_acc = buffer.push_vec3(&[[0.0, 1.0, 0.0], [0.0, 1.5, 0.0]], false);

    // "idle": a single key at t = 0
    let idle_times = buffer.push_times(&[0.0]);
    let idle_pos_acc = buffer.push_vec3(&[[0.0, 1.0, 0.0]], false);

    // Indices go last; u16 data keeps the 4-byte alignment of the views above
    let index_acc = buffer.push(
        bytemuck::cast_slice(&indices),
        UNSIGNED_SHORT,
        "SCALAR",
        indices.len(),
        None,
    );

    let bin_name = format!("{}.bin", name);
    let document = json!({
        "asset": { "version": "2.0", "generator": "nether-import tests" },
        "scene": 0,
        "scenes": [{ "nodes": [0, 3] }],
        "nodes": [
            { "name": "Armature", "children": [1] },
            { "name": "Hip", "translation": [0.0, 1.0, 0.0], "children": [2] },
            { "name": "Spine", "translation": [0.0, 1.0, 0.0] },
            { "name": "Body", "mesh": 0, "skin": 0 },
        ],
        "meshes": [{
            "name": "body",
            "primitives": [{
                "attributes": {
                    "POSITION": position_acc,
                    "NORMAL": normal_acc,
                    "TEXCOORD_0": uv_acc,
                    "JOINTS_0": joints_acc,
                    "WEIGHTS_0": weights_acc,
                },
                "indices": index_acc,
                "material": 0,
            }],
        }],
        "skins": [{ "joints": [1, 2], "inverseBindMatrices": ibm_acc, "skeleton": 1 }],
        "materials": [{
            "name": "skin",
            "pbrMetallicRoughness": { "baseColorTexture": { "index": 0 } },
            "normalTexture": { "index": 1 },
        }],
        "textures": [{ "source": 0 }, { "source": 1 }],
        "images": [{ "uri": "tex/albedo.png" }, { "uri": "normal.png" }],
        "animations": [
            {
                "name": "wave",
                "samplers": [
                    { "input": spine_times, "output": spine_rot_acc, "interpolation": "LINEAR" },
                    { "input": hip_times, "output": hip_pos_acc, "interpolation": "LINEAR" },
                ],
                "channels": [
                    { "sampler": 0, "target": { "node": 2, "path": "rotation" } },
                    { "sampler": 1, "target": { "node": 1, "path": "translation" } },
                ],
            },
            {
                "name": "idle",
                "samplers": [
                    { "input": idle_times, "output": idle_pos_acc, "interpolation": "LINEAR" },
                ],
                "channels": [
                    { "sampler": 0, "target": { "node": 1, "path": "translation" } },
                ],
            },
        ],
        "buffers": [{ "uri": bin_name, "byteLength": buffer.data.len() }],
        "bufferViews": buffer.views,
        "accessors": buffer.accessors,
    });

    std::fs::write(dir.join(&bin_name), &buffer.data).expect("Failed to write buffer");
    let path = dir.join(format!("{}.gltf", name));
    std::fs::write(
        &path,
        serde_json::to_vec_pretty(&document).expect("Failed to serialize glTF"),
    )
    .expect("Failed to write glTF");
    path
}
