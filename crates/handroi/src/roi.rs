//! Oriented hand region of interest from sparse keypoints.
//!
//! A hand is described by three keypoints: the wrist, the pinky and the index finger. From these,
//! the position of the middle finger knuckle is estimated, and a square region is placed around it
//! so that the fingers point up in the crop extracted from it.

use std::f32::consts::FRAC_PI_2;

use nalgebra::{Point2, Rotation2, Vector2};

use crate::image::{
    rect::{Rect, RotatedRect},
    Resolution,
};
use crate::num::normalize_radians;

/// Reasons why no region of interest could be computed for a set of keypoints.
///
/// These are not failures: they signal that there is no usable hand in the frame, which should
/// then be skipped.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum RoiRejection {
    /// The detection confidence was not above the acceptance threshold.
    #[error("hand confidence {confidence} does not exceed threshold {threshold}")]
    BelowThreshold { confidence: f32, threshold: f32 },
    /// The keypoints are too close together (or not finite) to define an orientation and size.
    #[error("degenerate hand region (box size {box_size} px)")]
    Degenerate { box_size: f32 },
}

/// Parameters for [`hand_roi`].
#[derive(Debug, Clone, PartialEq)]
pub struct RoiParams {
    threshold: f32,
    scale: f32,
    expand: f32,
    shift: Vector2<f32>,
    min_box_size: f32,
}

impl Default for RoiParams {
    fn default() -> Self {
        Self {
            threshold: 0.1,
            scale: 2.0,
            expand: 2.7,
            shift: Vector2::new(0.0, -0.1),
            min_box_size: 1.0,
        }
    }
}

impl RoiParams {
    /// Sets the confidence threshold. Keypoints are accepted only if their confidence is strictly
    /// greater than this value.
    ///
    /// By default, a threshold of 0.1 is used.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Sets the factor applied to the wrist to middle finger distance to get the box size.
    ///
    /// Defaults to 2.0.
    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    /// Sets the factor applied to the box size to get the side length of the final square.
    ///
    /// Defaults to 2.7.
    pub fn with_expand(mut self, expand: f32) -> Self {
        self.expand = expand;
        self
    }

    /// Sets the center offset, relative to the box size, along the rotated X and Y axes.
    ///
    /// Defaults to `(0.0, -0.1)`, which moves the region towards the fingertips.
    pub fn with_shift(mut self, shift_x: f32, shift_y: f32) -> Self {
        self.shift = Vector2::new(shift_x, shift_y);
        self
    }

    /// Sets the minimum box size in pixels. Smaller regions are rejected as degenerate.
    ///
    /// Defaults to 1.0.
    pub fn with_min_box_size(mut self, min_box_size: f32) -> Self {
        self.min_box_size = min_box_size;
        self
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn expand(&self) -> f32 {
        self.expand
    }

    pub fn shift(&self) -> Vector2<f32> {
        self.shift
    }

    pub fn min_box_size(&self) -> f32 {
        self.min_box_size
    }
}

/// Wrist, pinky and index finger keypoints of one hand, in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandKeypoints {
    pub wrist: Point2<f32>,
    pub pinky: Point2<f32>,
    pub index: Point2<f32>,
    pub confidence: f32,
}

impl HandKeypoints {
    /// Builds keypoints from rows of a normalized pose keypoint array.
    ///
    /// Each row is `[x, y, z, score]`, with `x` and `y` normalized to the image size. Row 0 is the
    /// wrist, row 1 the pinky, row 2 the index finger. The wrist's score is used as the confidence.
    pub fn from_normalized(rows: &[[f32; 4]], res: Resolution) -> anyhow::Result<Self> {
        let [wrist, pinky, index] = match rows {
            [wrist, pinky, index, ..] => [wrist, pinky, index],
            _ => anyhow::bail!("expected at least 3 hand keypoints, got {}", rows.len()),
        };

        let (w, h) = (res.width() as f32, res.height() as f32);
        let to_pixels = |row: &[f32; 4]| Point2::new(row[0] * w, row[1] * h);
        Ok(Self {
            wrist: to_pixels(wrist),
            pinky: to_pixels(pinky),
            index: to_pixels(index),
            confidence: wrist[3],
        })
    }

    /// Estimates the position of the middle finger knuckle, a third of the way from the index
    /// finger to the pinky.
    pub fn middle(&self) -> Point2<f32> {
        Point2::from((self.index.coords * 2.0 + self.pinky.coords) / 3.0)
    }
}

/// Computes the oriented square region of interest containing the hand.
///
/// The returned rectangle is in pixel coordinates, centered near the middle finger knuckle and
/// rotated so that the direction from the wrist to the knuckle points up in the rectangle's
/// coordinate system.
pub fn hand_roi(keypoints: &HandKeypoints, params: &RoiParams) -> Result<RotatedRect, RoiRejection> {
    // Written so that NaN confidences are rejected too.
    if !(keypoints.confidence > params.threshold) {
        return Err(RoiRejection::BelowThreshold {
            confidence: keypoints.confidence,
            threshold: params.threshold,
        });
    }

    let middle = keypoints.middle();
    let rel = middle - keypoints.wrist;
    let box_size = rel.norm() * params.scale;
    check_box_size(box_size, params.min_box_size)?;

    let rotation = normalize_radians(FRAC_PI_2 - f32::atan2(-rel.y, rel.x));
    let shift = Rotation2::new(rotation) * (params.shift * box_size);
    let center = middle + shift;
    let size = box_size * params.expand;

    let rect = RotatedRect::new(Rect::from_center(center.x, center.y, size, size), rotation);
    if !rect.is_finite() {
        return Err(RoiRejection::Degenerate { box_size });
    }

    log::trace!(
        "hand roi: middle={:?} box={} rotation={:.1}deg -> {:?}",
        middle,
        box_size,
        rotation.to_degrees(),
        rect,
    );
    Ok(rect)
}

pub(crate) fn check_box_size(box_size: f32, min_box_size: f32) -> Result<(), RoiRejection> {
    if !box_size.is_finite() || box_size < min_box_size {
        return Err(RoiRejection::Degenerate { box_size });
    }
    Ok(())
}
