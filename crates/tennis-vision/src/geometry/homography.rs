//! Planar homography estimation (normalized DLT).

use nalgebra::{DMatrix, Matrix3, SymmetricEigen, Vector3};
use tennis_models::Point2;

use crate::error::{CalibrationError, CalibrationResult};

const EPS: f64 = 1e-12;

/// Projective transform between two planes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography {
    matrix: Matrix3<f64>,
}

impl Homography {
    pub fn identity() -> Self {
        Self {
            matrix: Matrix3::identity(),
        }
    }

    pub fn from_matrix(matrix: Matrix3<f64>) -> Self {
        Self { matrix }
    }

    pub fn from_rows(rows: [[f64; 3]; 3]) -> Self {
        Self {
            matrix: Matrix3::new(
                rows[0][0], rows[0][1], rows[0][2], rows[1][0], rows[1][1], rows[1][2],
                rows[2][0], rows[2][1], rows[2][2],
            ),
        }
    }

    pub fn to_rows(&self) -> [[f64; 3]; 3] {
        let m = &self.matrix;
        [
            [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
            [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
            [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
        ]
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }

    /// Least-squares homography mapping `src[i]` onto `dst[i]`.
    ///
    /// Needs at least four correspondences, no three of them collinear.
    /// Points are Hartley-normalized before solving and the result is scaled
    /// so that `h33 = 1`.
    pub fn estimate(src: &[Point2], dst: &[Point2]) -> CalibrationResult<Self> {
        let n = src.len().min(dst.len());
        if n < 4 {
            return Err(CalibrationError::InsufficientCorners { found: n });
        }

        let t_src = normalization(&src[..n])
            .ok_or_else(|| CalibrationError::degenerate("coincident source points"))?;
        let t_dst = normalization(&dst[..n])
            .ok_or_else(|| CalibrationError::degenerate("coincident target points"))?;

        let mut a = DMatrix::<f64>::zeros(2 * n, 9);
        for (i, (s, d)) in src.iter().zip(dst.iter()).take(n).enumerate() {
            let s = transform(&t_src, s).ok_or_else(|| CalibrationError::degenerate("bad source"))?;
            let d = transform(&t_dst, d).ok_or_else(|| CalibrationError::degenerate("bad target"))?;
            let r = 2 * i;
            let row0 = [-s.x, -s.y, -1.0, 0.0, 0.0, 0.0, d.x * s.x, d.x * s.y, d.x];
            let row1 = [0.0, 0.0, 0.0, -s.x, -s.y, -1.0, d.y * s.x, d.y * s.y, d.y];
            for c in 0..9 {
                a[(r, c)] = row0[c];
                a[(r + 1, c)] = row1[c];
            }
        }

        // Null vector of A = eigenvector of AᵀA with the smallest eigenvalue.
        let eigen = SymmetricEigen::new(a.transpose() * &a);
        let min_idx = eigen
            .eigenvalues
            .iter()
            .enumerate()
            .min_by(|x, y| x.1.total_cmp(y.1))
            .map(|(i, _)| i)
            .ok_or_else(|| CalibrationError::degenerate("empty eigen decomposition"))?;
        let h = eigen.eigenvectors.column(min_idx);
        let normalized = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]);

        let t_dst_inv = t_dst
            .try_inverse()
            .ok_or_else(|| CalibrationError::degenerate("singular normalization"))?;
        let m = t_dst_inv * normalized * t_src;

        let h33 = m[(2, 2)];
        if h33.abs() < EPS || !m.iter().all(|v| v.is_finite()) {
            return Err(CalibrationError::degenerate("homography at infinity"));
        }
        let m = m / h33;
        if m.determinant().abs() < EPS {
            return Err(CalibrationError::degenerate("singular homography"));
        }

        Ok(Self { matrix: m })
    }

    /// Map a point; `None` on the line at infinity.
    pub fn project(&self, p: Point2) -> Option<Point2> {
        transform(&self.matrix, &p)
    }

    pub fn inverse(&self) -> Option<Self> {
        let inv = self.matrix.try_inverse()?;
        let h33 = inv[(2, 2)];
        let matrix = if h33.abs() > EPS { inv / h33 } else { inv };
        Some(Self { matrix })
    }

    /// Mean distance between projected `src` points and `dst`.
    pub fn mean_reprojection_error(&self, src: &[Point2], dst: &[Point2]) -> f64 {
        let mut total = 0.0;
        let mut count = 0usize;
        for (s, d) in src.iter().zip(dst) {
            total += match self.project(*s) {
                Some(p) => p.distance(d),
                None => f64::INFINITY,
            };
            count += 1;
        }
        if count == 0 {
            f64::INFINITY
        } else {
            total / count as f64
        }
    }
}

fn transform(m: &Matrix3<f64>, p: &Point2) -> Option<Point2> {
    let v = m * Vector3::new(p.x, p.y, 1.0);
    if v.z.abs() < EPS {
        return None;
    }
    let out = Point2::new(v.x / v.z, v.y / v.z);
    out.is_finite().then_some(out)
}

/// Similarity moving the centroid to the origin with mean distance √2.
fn normalization(points: &[Point2]) -> Option<Matrix3<f64>> {
    let n = points.len() as f64;
    let cx = points.iter().map(|p| p.x).sum::<f64>() / n;
    let cy = points.iter().map(|p| p.y).sum::<f64>() / n;
    let mean_dist = points
        .iter()
        .map(|p| ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;
    if !mean_dist.is_finite() || mean_dist < 1e-9 {
        return None;
    }
    let s = std::f64::consts::SQRT_2 / mean_dist;
    Some(Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0))
}
