//! Projection of crop-relative points back into the full image.

use nalgebra::{Point2, Vector2};

use crate::image::{
    rect::{Rect, RotatedRect},
    Resolution,
};
use crate::landmark::Landmarks;

/// A rotated rectangle in normalized image coordinates.
///
/// Center and size are divided by the image width and height. The rotation is the same as the one
/// of the pixel-space [`RotatedRect`] it was created from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedRect {
    center: Point2<f32>,
    size: Vector2<f32>,
    rotation: f32,
}

impl NormalizedRect {
    pub fn new(center: Point2<f32>, size: Vector2<f32>, rotation: f32) -> Self {
        Self {
            center,
            size,
            rotation,
        }
    }

    /// Normalizes a pixel-space rectangle by the size of the image it belongs to.
    pub fn from_pixel_rect(rect: &RotatedRect, res: Resolution) -> Self {
        let (w, h) = (res.width() as f32, res.height() as f32);
        Self {
            center: Point2::new(rect.center().x / w, rect.center().y / h),
            size: Vector2::new(rect.size().x / w, rect.size().y / h),
            rotation: rect.rotation_radians(),
        }
    }

    /// Converts this rectangle back into pixel coordinates of an image of resolution `res`.
    pub fn to_pixel_rect(&self, res: Resolution) -> RotatedRect {
        let (w, h) = (res.width() as f32, res.height() as f32);
        RotatedRect::new(
            Rect::from_center(
                self.center.x * w,
                self.center.y * h,
                self.size.x * w,
                self.size.y * h,
            ),
            self.rotation,
        )
    }

    #[inline]
    pub fn center(&self) -> Point2<f32> {
        self.center
    }

    #[inline]
    pub fn size(&self) -> Vector2<f32> {
        self.size
    }

    #[inline]
    pub fn rotation_radians(&self) -> f32 {
        self.rotation
    }

    /// Projects a point normalized to the crop of this rectangle into normalized image
    /// coordinates.
    ///
    /// The point is moved so that the crop center is the origin, rotated by the rectangle's
    /// rotation, scaled by the rectangle size and moved to the rectangle center. This is the
    /// inverse of the crop extraction for rectangles that are square in pixel space.
    pub fn project_point(&self, pt: Point2<f32>) -> Point2<f32> {
        let (x, y) = (pt.x - 0.5, pt.y - 0.5);
        let (sin, cos) = self.rotation.sin_cos();
        let rx = cos * x - sin * y;
        let ry = sin * x + cos * y;
        Point2::new(
            rx * self.size.x + self.center.x,
            ry * self.size.y + self.center.y,
        )
    }

    /// Projects all landmarks in-place from crop-normalized to image-normalized coordinates.
    ///
    /// Z coordinates are scaled by the rectangle width, so that they keep the same scale as X.
    pub fn project_landmarks(&self, landmarks: &mut Landmarks) {
        landmarks.map_positions(|[x, y, z]| {
            let p = self.project_point(Point2::new(x, y));
            [p.x, p.y, z * self.size.x]
        });
    }
}
