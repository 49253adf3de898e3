//! Tangent reconstruction with handedness sign
//!
//! Output tangents are `[x, y, z, w]` where `w` is +1 or -1.

use glam::{Vec3, Vec4};

/// Normal substituted for vertices whose normal contains NaN
pub const FALLBACK_NORMAL: [f32; 3] = [0.0, -1.0, 0.0];

/// Counts of repaired vertices, for logging
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TangentRepairs {
    pub normals: usize,
    pub tangents: usize,
}

/// Build signed tangents from normal/tangent/bitangent triples.
///
/// NaN normals are replaced by [`FALLBACK_NORMAL`] in `normals` itself, so
/// anything reading the normals afterwards sees the repaired value. NaN
/// tangents are replaced by a synthetic tangent orthogonal to the (repaired)
/// normal with a positive sign.
pub fn reconstruct_tangents(
    normals: &mut [[f32; 3]],
    tangents: &[[f32; 3]],
    bitangents: &[[f32; 3]],
) -> (Vec<[f32; 4]>, TangentRepairs) {
    let mut repairs = TangentRepairs::default();
    let mut out = Vec::with_capacity(normals.len());

    for ((normal_slot, tangent), bitangent) in normals.iter_mut().zip(tangents).zip(bitangents) {
        let mut normal = Vec3::from_array(*normal_slot);
        let mut tangent = Vec4::new(tangent[0], tangent[1], tangent[2], 0.0);
        let bitangent = Vec3::from_array(*bitangent);

        // NaN comparisons are false, so a NaN triple falls through to -1
        let inverse_bitangent = normal.cross(tangent.truncate());
        tangent.w = if bitangent.dot(inverse_bitangent) > 0.0 {
            1.0
        } else {
            -1.0
        };

        if normal.is_nan() {
            normal = Vec3::from_array(FALLBACK_NORMAL);
            *normal_slot = FALLBACK_NORMAL;
            repairs.normals += 1;
        }

        if tangent.truncate().is_nan() {
            tangent = synthetic_tangent(normal).extend(1.0);
            repairs.tangents += 1;
        }

        out.push(tangent.to_array());
    }

    (out, repairs)
}

/// Tangent orthogonal to `normal`: perturb along +X and cross with the normal
fn synthetic_tangent(normal: Vec3) -> Vec3 {
    (normal + Vec3::X)
        .cross(normal)
        .try_normalize()
        // Normal parallel to X: perturb along +Z instead
        .or_else(|| (normal + Vec3::Z).cross(normal).try_normalize())
        .unwrap_or(Vec3::Z)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_follows_bitangent_orientation() {
        let mut normals = vec![[0.0, 0.0, 1.0], [0.0, 0.0, 1.0]];
        let tangents = [[1.0, 0.0, 0.0], [1.0, 0.0, 0.0]];
        let bitangents = [[0.0, 1.0, 0.0], [0.0, -1.0, 0.0]];

        let (out, repairs) = reconstruct_tangents(&mut normals, &tangents, &bitangents);
        assert_eq!(out, vec![[1.0, 0.0, 0.0, 1.0], [1.0, 0.0, 0.0, -1.0]]);
        assert_eq!(repairs, TangentRepairs::default());
    }

    #[test]
    fn nan_normal_is_patched_in_source() {
        let mut normals = vec![[f32::NAN, 0.0, 0.0]];
        let tangents = [[1.0, 0.0, 0.0]];
        let bitangents = [[0.0, 0.0, 1.0]];

        let (out, repairs) = reconstruct_tangents(&mut normals, &tangents, &bitangents);
        assert_eq!(normals[0], FALLBACK_NORMAL);
        assert_eq!(repairs.normals, 1);
        assert!(out[0][3] == 1.0 || out[0][3] == -1.0);
        assert_eq!(&out[0][..3], &[1.0, 0.0, 0.0]);
    }

    #[test]
    fn nan_tangent_is_synthesized_from_repaired_normal() {
        let mut normals = vec![[f32::NAN, f32::NAN, f32::NAN]];
        let tangents = [[f32::NAN, 0.0, 0.0]];
        let bitangents = [[f32::NAN, 0.0, 0.0]];

        let (out, repairs) = reconstruct_tangents(&mut normals, &tangents, &bitangents);
        assert_eq!(repairs.normals, 1);
        assert_eq!(repairs.tangents, 1);

        let t = Vec4::from_array(out[0]);
        assert_eq!(t.w, 1.0);
        assert!(!t.is_nan());
        assert!((t.truncate().length() - 1.0).abs() < 1e-5);
        assert!(t.truncate().dot(Vec3::from_array(FALLBACK_NORMAL)).abs() < 1e-5);
    }

    #[test]
    fn synthetic_tangent_handles_x_aligned_normal() {
        let t = synthetic_tangent(Vec3::X);
        assert!(!t.is_nan());
        assert!(t.dot(Vec3::X).abs() < 1e-5);
    }
}
