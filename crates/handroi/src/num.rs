//! Utilities for numerics.

use std::f32::consts::{PI, TAU};

/// Wraps an angle in radians into the range `[-π, π)`.
///
/// Computed as `θ - 2π * floor((θ + π) / 2π)`, so the result differs from the input by a whole
/// number of turns.
pub fn normalize_radians(radians: f32) -> f32 {
    let mut wrapped = radians - TAU * ((radians + PI) / TAU).floor();
    // Rounding in the division can push the result just outside of the range.
    if wrapped < -PI {
        wrapped += TAU;
    }
    if wrapped >= PI {
        wrapped -= TAU;
    }
    wrapped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_fixed_points() {
        assert_eq!(normalize_radians(0.0), 0.0);
        assert_eq!(normalize_radians(1.0), 1.0);
        assert_eq!(normalize_radians(-1.0), -1.0);
        assert_eq!(normalize_radians(-PI), -PI);
    }

    #[test]
    fn normalize_wraps() {
        assert!((normalize_radians(PI) + PI).abs() < 1e-6);
        assert!((normalize_radians(3.0 * PI / 2.0) + PI / 2.0).abs() < 1e-6);
        assert!((normalize_radians(-3.0 * PI / 2.0) - PI / 2.0).abs() < 1e-6);
        assert!((normalize_radians(TAU + 0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn normalize_range_and_period() {
        let mut rng = fastrand::Rng::with_seed(0x5eed);
        for _ in 0..10_000 {
            let angle = (rng.f32() - 0.5) * 40.0;
            let n = normalize_radians(angle);
            assert!((-PI..PI).contains(&n), "{angle} -> {n}");

            let shifted = normalize_radians(angle + TAU);
            // Compare modulo a full turn, values near ±π may land on opposite ends.
            let diff = normalize_radians(shifted - n).abs();
            assert!(diff < 1e-4, "{angle}: {n} vs {shifted}");
        }
    }
}
