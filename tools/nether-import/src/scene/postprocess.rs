//! Importer-side post-processing of imported meshes

use glam::{Vec2, Vec3};

use super::ImportedMesh;

/// Replace the mesh normals with smooth per-vertex normals.
///
/// Each vertex averages the area-weighted normals of its incident triangles,
/// keeping only faces within `max_angle_deg` of the vertex's largest face.
pub fn generate_smooth_normals(mesh: &mut ImportedMesh, max_angle_deg: f32) {
    let vertex_count = mesh.positions.len();
    let mut incident: Vec<Vec<Vec3>> = vec![Vec::new(); vertex_count];

    for face in mesh.faces.iter().filter(|f| f.len() == 3) {
        let [a, b, c] = [face[0] as usize, face[1] as usize, face[2] as usize];
        if a >= vertex_count || b >= vertex_count || c >= vertex_count {
            continue;
        }
        let pa = Vec3::from_array(mesh.positions[a]);
        let pb = Vec3::from_array(mesh.positions[b]);
        let pc = Vec3::from_array(mesh.positions[c]);
        let weighted = (pb - pa).cross(pc - pa);
        if weighted.length_squared() <= f32::MIN_POSITIVE {
            continue;
        }
        for v in [a, b, c] {
            incident[v].push(weighted);
        }
    }

    let cos_limit = max_angle_deg.to_radians().cos();
    let normals = incident
        .iter()
        .map(|faces| {
            let Some(dominant) = faces
                .iter()
                .copied()
                .max_by(|x, y| x.length_squared().total_cmp(&y.length_squared()))
            else {
                return [0.0, 1.0, 0.0];
            };
            let dir = dominant.normalize();
            let sum = faces
                .iter()
                .filter(|f| f.normalize().dot(dir) >= cos_limit)
                .fold(Vec3::ZERO, |acc, f| acc + *f);
            sum.try_normalize().unwrap_or(dir).to_array()
        })
        .collect();

    mesh.normals = Some(normals);
}

/// Generate tangents and bitangents from normals and UV set 0.
///
/// Vertices touched only by triangles with a degenerate UV mapping end up
/// with NaN tangents; mesh conversion repairs those.
pub fn calc_tangent_space(mesh: &mut ImportedMesh) {
    let (Some(normals), Some(uvs)) = (&mesh.normals, &mesh.uv_sets[0]) else {
        return;
    };
    let vertex_count = mesh.positions.len();
    if normals.len() != vertex_count || uvs.len() != vertex_count {
        return;
    }

    let mut tan_accum = vec![Vec3::ZERO; vertex_count];
    let mut bitan_accum = vec![Vec3::ZERO; vertex_count];
    let mut valid = vec![false; vertex_count];

    for face in mesh.faces.iter().filter(|f| f.len() == 3) {
        let [a, b, c] = [face[0] as usize, face[1] as usize, face[2] as usize];
        if a >= vertex_count || b >= vertex_count || c >= vertex_count {
            continue;
        }
        let pa = Vec3::from_array(mesh.positions[a]);
        let e1 = Vec3::from_array(mesh.positions[b]) - pa;
        let e2 = Vec3::from_array(mesh.positions[c]) - pa;
        let uva = Vec2::from_array(uvs[a]);
        let duv1 = Vec2::from_array(uvs[b]) - uva;
        let duv2 = Vec2::from_array(uvs[c]) - uva;

        let det = duv1.x * duv2.y - duv2.x * duv1.y;
        if det.abs() <= f32::EPSILON * 1e-3 {
            continue;
        }
        let r = 1.0 / det;
        let tangent = (e1 * duv2.y - e2 * duv1.y) * r;
        let bitangent = (e2 * duv1.x - e1 * duv2.x) * r;

        for v in [a, b, c] {
            tan_accum[v] += tangent;
            bitan_accum[v] += bitangent;
            valid[v] = true;
        }
    }

    let nan = [f32::NAN; 3];
    let mut tangents = Vec::with_capacity(vertex_count);
    let mut bitangents = Vec::with_capacity(vertex_count);
    for i in 0..vertex_count {
        if !valid[i] {
            tangents.push(nan);
            bitangents.push(nan);
            continue;
        }
        let n = Vec3::from_array(normals[i]);
        // Gram-Schmidt against the normal
        let t = (tan_accum[i] - n * n.dot(tan_accum[i]))
            .try_normalize()
            .map_or(nan, |v| v.to_array());
        let b = bitan_accum[i].try_normalize().map_or(nan, |v| v.to_array());
        tangents.push(t);
        bitangents.push(b);
    }

    mesh.tangents = Some(tangents);
    mesh.bitangents = Some(bitangents);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> ImportedMesh {
        ImportedMesh {
            positions: vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [1.0, 1.0, 0.0],
                [0.0, 1.0, 0.0],
            ],
            uv_sets: [
                Some(vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]),
                None,
            ],
            faces: vec![vec![0, 1, 2], vec![0, 2, 3]],
            ..Default::default()
        }
    }

    #[test]
    fn flat_quad_gets_face_normal() {
        let mut mesh = quad();
        generate_smooth_normals(&mut mesh, 20.0);
        for n in mesh.normals.unwrap() {
            assert!((Vec3::from_array(n) - Vec3::Z).length() < 1e-5);
        }
    }

    #[test]
    fn sharp_edge_is_not_smoothed() {
        // Two triangles folded 90 degrees along the shared edge 0-1
        let mut mesh = ImportedMesh {
            positions: vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [0.0, 0.0, 2.0],
            ],
            faces: vec![vec![0, 1, 2], vec![1, 0, 3]],
            ..Default::default()
        };
        generate_smooth_normals(&mut mesh, 20.0);
        let normals = mesh.normals.unwrap();
        // Vertex 2 only touches the first face
        assert!((Vec3::from_array(normals[2]) - Vec3::Z).length() < 1e-5);
        // Vertex 0 keeps the larger face's normal instead of averaging to 45 degrees
        assert!((Vec3::from_array(normals[0]) - Vec3::Y).length() < 1e-5);
    }

    #[test]
    fn uv_aligned_quad_has_x_tangent() {
        let mut mesh = quad();
        generate_smooth_normals(&mut mesh, 20.0);
        calc_tangent_space(&mut mesh);
        let tangents = mesh.tangents.unwrap();
        let bitangents = mesh.bitangents.unwrap();
        for (t, b) in tangents.iter().zip(&bitangents) {
            assert!((Vec3::from_array(*t) - Vec3::X).length() < 1e-5);
            assert!((Vec3::from_array(*b) - Vec3::Y).length() < 1e-5);
        }
    }

    #[test]
    fn degenerate_uvs_produce_nan_tangents() {
        let mut mesh = quad();
        mesh.uv_sets[0] = Some(vec![[0.5, 0.5]; 4]);
        generate_smooth_normals(&mut mesh, 20.0);
        calc_tangent_space(&mut mesh);
        assert!(mesh.tangents.unwrap().iter().all(|t| t[0].is_nan()));
    }
}
