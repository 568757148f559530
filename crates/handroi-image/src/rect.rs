//! Axis-aligned and rotated rectangles in pixel space.
//!
//! The origin is the top left corner of the image and Y points down, so a positive rotation turns
//! a rectangle clockwise on screen.

use std::fmt;

use approx::{AbsDiffEq, RelativeEq};
use nalgebra::{Point2, Rotation2, Vector2};

/// An axis-aligned rectangle, stored as center and size.
///
/// Zero width or height is allowed.
#[derive(Clone, Copy, PartialEq)]
pub struct Rect {
    center: Point2<f32>,
    size: Vector2<f32>,
}

impl Rect {
    #[inline]
    pub fn from_center(x_center: f32, y_center: f32, width: f32, height: f32) -> Self {
        Self {
            center: Point2::new(x_center, y_center),
            size: Vector2::new(width, height),
        }
    }

    #[inline]
    pub fn from_top_left(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self::from_center(left + width * 0.5, top + height * 0.5, width, height)
    }

    #[inline]
    pub fn top_left(&self) -> Point2<f32> {
        self.center - self.size * 0.5
    }

    /// Returns the X coordinate of the left edge.
    #[inline]
    pub fn x(&self) -> f32 {
        self.top_left().x
    }

    /// Returns the Y coordinate of the top edge.
    #[inline]
    pub fn y(&self) -> f32 {
        self.top_left().y
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.size.x
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.size.y
    }

    #[inline]
    pub fn center(&self) -> Point2<f32> {
        self.center
    }

    #[inline]
    pub fn size(&self) -> Vector2<f32> {
        self.size
    }

    /// Returns the corners in the order top-left, top-right, bottom-right, bottom-left.
    pub fn corners(&self) -> [Point2<f32>; 4] {
        let tl = self.top_left();
        let (w, h) = (self.width(), self.height());
        [
            tl,
            Point2::new(tl.x + w, tl.y),
            Point2::new(tl.x + w, tl.y + h),
            Point2::new(tl.x, tl.y + h),
        ]
    }
}

impl fmt::Debug for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Rect @ ({},{})/{}x{}",
            self.center.x, self.center.y, self.size.x, self.size.y
        )
    }
}

impl AbsDiffEq for Rect {
    type Epsilon = f32;

    fn default_epsilon() -> f32 {
        f32::default_epsilon()
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: f32) -> bool {
        self.center.abs_diff_eq(&other.center, epsilon)
            && self.size.abs_diff_eq(&other.size, epsilon)
    }
}

impl RelativeEq for Rect {
    fn default_max_relative() -> f32 {
        f32::default_max_relative()
    }

    fn relative_eq(&self, other: &Self, epsilon: f32, max_relative: f32) -> bool {
        self.center.relative_eq(&other.center, epsilon, max_relative)
            && self.size.relative_eq(&other.size, epsilon, max_relative)
    }
}

/// A [`Rect`] rotated clockwise around its center.
///
/// This is the oriented region of interest around a hand. The rectangle's own coordinate system
/// has its origin in the top left corner of the unrotated rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotatedRect {
    rect: Rect,
    radians: f32,
}

impl RotatedRect {
    #[inline]
    pub fn new(rect: Rect, radians: f32) -> Self {
        Self { rect, radians }
    }

    #[inline]
    pub fn rotation_radians(&self) -> f32 {
        self.radians
    }

    #[inline]
    pub fn center(&self) -> Point2<f32> {
        self.rect.center()
    }

    #[inline]
    pub fn size(&self) -> Vector2<f32> {
        self.rect.size()
    }

    /// Returns whether center, size and rotation are all finite.
    pub fn is_finite(&self) -> bool {
        self.rect.center.iter().all(|c| c.is_finite())
            && self.rect.size.iter().all(|c| c.is_finite())
            && self.radians.is_finite()
    }

    /// Returns the corners in image coordinates.
    ///
    /// The order is top-left, top-right, bottom-right, bottom-left of the unrotated rectangle, no
    /// matter where the rotation moves them.
    pub fn rotated_corners(&self) -> [Point2<f32>; 4] {
        let (w, h) = (self.rect.width(), self.rect.height());
        [
            Point2::new(0.0, 0.0),
            Point2::new(w, 0.0),
            Point2::new(w, h),
            Point2::new(0.0, h),
        ]
        .map(|p| self.transform_out(p))
    }

    /// Maps a point from image coordinates into the rectangle's coordinate system.
    pub fn transform_in(&self, pt: Point2<f32>) -> Point2<f32> {
        let rel = pt - self.rect.center();
        Point2::from(Rotation2::new(-self.radians) * rel + self.rect.size() * 0.5)
    }

    /// Maps a point from the rectangle's coordinate system into image coordinates.
    pub fn transform_out(&self, pt: Point2<f32>) -> Point2<f32> {
        self.rect.center() + Rotation2::new(self.radians) * (pt.coords - self.rect.size() * 0.5)
    }
}

impl AbsDiffEq for RotatedRect {
    type Epsilon = f32;

    fn default_epsilon() -> f32 {
        f32::default_epsilon()
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: f32) -> bool {
        self.rect.abs_diff_eq(&other.rect, epsilon)
            && self.radians.abs_diff_eq(&other.radians, epsilon)
    }
}

impl RelativeEq for RotatedRect {
    fn default_max_relative() -> f32 {
        f32::default_max_relative()
    }

    fn relative_eq(&self, other: &Self, epsilon: f32, max_relative: f32) -> bool {
        self.rect.relative_eq(&other.rect, epsilon, max_relative)
            && self.radians.relative_eq(&other.radians, epsilon, max_relative)
    }
}

impl From<Rect> for RotatedRect {
    fn from(rect: Rect) -> Self {
        Self::new(rect, 0.0)
    }
}
