//! Rectangles derived from a pair of alignment points.
//!
//! The re-crop network predicts two points on the hand: one that becomes the center of the refined
//! region and one whose distance from the center determines the region's size. The same derivation
//! is used on the final landmarks to produce a region suitable for the next frame.

use std::f32::consts::FRAC_PI_2;

use nalgebra::Point2;

use crate::image::rect::{Rect, RotatedRect};
use crate::num::normalize_radians;
use crate::roi::{check_box_size, RoiRejection};

/// Parameters for [`alignment_rect`].
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentParams {
    rotation_offset: f32,
    scale: f32,
    min_box_size: f32,
}

impl Default for AlignmentParams {
    fn default() -> Self {
        Self {
            rotation_offset: -FRAC_PI_2,
            scale: 2.0,
            min_box_size: 1.0,
        }
    }
}

impl AlignmentParams {
    /// Sets the factor applied to the distance between the points to get the box size.
    ///
    /// Defaults to 2.0.
    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    /// Sets the minimum box size in pixels. Smaller regions are rejected as degenerate.
    ///
    /// Defaults to 1.0.
    pub fn with_min_box_size(mut self, min_box_size: f32) -> Self {
        self.min_box_size = min_box_size;
        self
    }

    pub fn min_box_size(&self) -> f32 {
        self.min_box_size
    }
}

/// Derives a square region from a center point and a scale point, both in pixel coordinates.
///
/// The region is centered on `center`, has a side length of `scale * |scale_point - center|` and
/// a rotation of `rotation_offset - atan2(-(dy), dx)`, normalized to `[-π, π)`. It is not shifted.
///
/// This is a pure function: calling it twice with the same inputs produces bit-identical results.
pub fn alignment_rect(
    center: Point2<f32>,
    scale_point: Point2<f32>,
    params: &AlignmentParams,
) -> Result<RotatedRect, RoiRejection> {
    let rel = scale_point - center;
    let box_size = rel.norm() * params.scale;
    check_box_size(box_size, params.min_box_size)?;

    let rotation = normalize_radians(params.rotation_offset - f32::atan2(-rel.y, rel.x));
    let rect = RotatedRect::new(
        Rect::from_center(center.x, center.y, box_size, box_size),
        rotation,
    );
    if !rect.is_finite() {
        return Err(RoiRejection::Degenerate { box_size });
    }

    log::trace!(
        "alignment rect: {:?} -> {:?} = {:?}",
        center,
        scale_point,
        rect
    );
    Ok(rect)
}
