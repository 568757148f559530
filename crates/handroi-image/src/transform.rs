//! Perspective transforms between pixel coordinate systems.

use nalgebra::{Matrix3, Point2, SMatrix, SVector, Vector3};

/// A 3x3 projective transform (homography) mapping points from one image plane to another.
///
/// The bottom-right matrix entry is always normalized to 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography {
    matrix: Matrix3<f64>,
}

impl Homography {
    /// Creates a homography from a raw matrix, normalizing it so that the last entry is 1.
    ///
    /// Returns [`None`] if the last entry is zero or the matrix contains non-finite values.
    pub fn from_matrix(matrix: Matrix3<f64>) -> Option<Self> {
        let w = matrix[(2, 2)];
        if w == 0.0 || !matrix.iter().all(|v| v.is_finite()) {
            return None;
        }
        Some(Self { matrix: matrix / w })
    }

    /// Computes the homography that maps each point in `src` to the point at the same index in
    /// `dst`.
    ///
    /// Returns [`None`] when the correspondences do not determine a unique transform, which
    /// happens when three of the points are collinear.
    pub fn from_correspondences(src: [Point2<f32>; 4], dst: [Point2<f32>; 4]) -> Option<Self> {
        let mut a = SMatrix::<f64, 8, 8>::zeros();
        let mut b = SVector::<f64, 8>::zeros();

        for (i, (s, d)) in src.iter().zip(&dst).enumerate() {
            let (x, y) = (f64::from(s.x), f64::from(s.y));
            let (u, v) = (f64::from(d.x), f64::from(d.y));

            let r = i * 2;
            a.set_row(
                r,
                &SMatrix::<f64, 1, 8>::from_row_slice(&[x, y, 1.0, 0.0, 0.0, 0.0, -u * x, -u * y]),
            );
            a.set_row(
                r + 1,
                &SMatrix::<f64, 1, 8>::from_row_slice(&[0.0, 0.0, 0.0, x, y, 1.0, -v * x, -v * y]),
            );
            b[r] = u;
            b[r + 1] = v;
        }

        let h = a.lu().solve(&b)?;
        let matrix = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0);
        Self::from_matrix(matrix)
    }

    /// Returns the inverse transform, or [`None`] if `self` is singular.
    pub fn inverse(&self) -> Option<Self> {
        Self::from_matrix(self.matrix.try_inverse()?)
    }

    /// Applies this transform to a point.
    ///
    /// Points mapped to infinity (on the horizon line of the transform) produce non-finite
    /// coordinates.
    pub fn apply(&self, pt: Point2<f32>) -> Point2<f32> {
        let p = self.matrix * Vector3::new(f64::from(pt.x), f64::from(pt.y), 1.0);
        Point2::new((p.x / p.z) as f32, (p.y / p.z) as f32)
    }

    /// Returns the normalized 3x3 matrix.
    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn pt(x: f32, y: f32) -> Point2<f32> {
        Point2::new(x, y)
    }

    #[test]
    fn identity_correspondences() {
        let pts = [pt(0.0, 0.0), pt(1.0, 0.0), pt(1.0, 1.0), pt(0.0, 1.0)];
        let h = Homography::from_correspondences(pts, pts).unwrap();
        assert_abs_diff_eq!(*h.matrix(), Matrix3::identity(), epsilon = 1e-9);
    }

    #[test]
    fn maps_correspondences() {
        let src = [pt(10.0, 20.0), pt(50.0, 15.0), pt(60.0, 70.0), pt(5.0, 60.0)];
        let dst = [pt(0.0, 0.0), pt(256.0, 0.0), pt(256.0, 256.0), pt(0.0, 256.0)];
        let h = Homography::from_correspondences(src, dst).unwrap();
        for (s, d) in src.iter().zip(&dst) {
            assert_abs_diff_eq!(h.apply(*s), *d, epsilon = 1e-3);
        }

        let inv = h.inverse().unwrap();
        for (s, d) in src.iter().zip(&dst) {
            assert_abs_diff_eq!(inv.apply(*d), *s, epsilon = 1e-3);
        }
    }

    #[test]
    fn scale_and_translate() {
        let src = [pt(0.0, 0.0), pt(2.0, 0.0), pt(2.0, 2.0), pt(0.0, 2.0)];
        let dst = [pt(5.0, 5.0), pt(9.0, 5.0), pt(9.0, 9.0), pt(5.0, 9.0)];
        let h = Homography::from_correspondences(src, dst).unwrap();
        assert_abs_diff_eq!(h.apply(pt(1.0, 0.5)), pt(7.0, 6.0), epsilon = 1e-5);
    }

    #[test]
    fn collinear_points_are_rejected() {
        let src = [pt(0.0, 0.0), pt(1.0, 0.0), pt(2.0, 0.0), pt(3.0, 0.0)];
        let dst = [pt(0.0, 0.0), pt(1.0, 0.0), pt(1.0, 1.0), pt(0.0, 1.0)];
        assert!(Homography::from_correspondences(src, dst).is_none());
    }
}
