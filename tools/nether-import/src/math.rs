//! Matrix convention bridging between importer data and engine math
//!
//! Importers hand out matrices row-major (`rows[r][c]`, translation in the
//! last column). The engine uses `glam::Mat4`, which is column-major.

use glam::Mat4;

/// 4x4 matrix in the importer's row-major convention
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ImportMatrix {
    /// `rows[r][c]` is the element at row `r`, column `c`
    pub rows: [[f32; 4]; 4],
}

impl ImportMatrix {
    pub const IDENTITY: Self = Self {
        rows: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    pub const fn from_rows(rows: [[f32; 4]; 4]) -> Self {
        Self { rows }
    }

    /// Convert into the engine convention.
    ///
    /// Element `rows[r][c]` lands in column `c`, row `r` of the result.
    pub fn to_engine(&self) -> Mat4 {
        let r = &self.rows;
        Mat4::from_cols_array(&[
            r[0][0], r[1][0], r[2][0], r[3][0], // col0
            r[0][1], r[1][1], r[2][1], r[3][1], // col1
            r[0][2], r[1][2], r[2][2], r[3][2], // col2
            r[0][3], r[1][3], r[2][3], r[3][3], // col3
        ])
    }

    /// Convert an engine matrix back into the importer convention.
    pub fn from_engine(m: &Mat4) -> Self {
        let c = m.to_cols_array_2d();
        let mut rows = [[0.0f32; 4]; 4];
        for (r, row) in rows.iter_mut().enumerate() {
            for (col, value) in row.iter_mut().enumerate() {
                *value = c[col][r];
            }
        }
        Self { rows }
    }
}

impl Default for ImportMatrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec3, Vec4};

    #[test]
    fn translation_column_becomes_w_axis() {
        let m = ImportMatrix::from_rows([
            [1.0, 0.0, 0.0, 5.0],
            [0.0, 1.0, 0.0, 6.0],
            [0.0, 0.0, 1.0, 7.0],
            [0.0, 0.0, 0.0, 1.0],
        ]);
        let engine = m.to_engine();
        assert_eq!(engine.w_axis, Vec4::new(5.0, 6.0, 7.0, 1.0));
        assert_eq!(
            engine.transform_point3(Vec3::ZERO),
            Vec3::new(5.0, 6.0, 7.0)
        );
    }

    #[test]
    fn reverse_conversion_restores_every_element() {
        let mut rows = [[0.0f32; 4]; 4];
        for (r, row) in rows.iter_mut().enumerate() {
            for (c, value) in row.iter_mut().enumerate() {
                *value = (r * 4 + c) as f32;
            }
        }
        let m = ImportMatrix::from_rows(rows);
        assert_eq!(ImportMatrix::from_engine(&m.to_engine()), m);
    }
}
