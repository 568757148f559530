use std::fmt;

use crate::rect::Rect;

/// Size of an image or network input, in pixels.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    width: u32,
    height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Creates a `size x size` resolution, the shape of every hand crop.
    pub const fn square(size: u32) -> Self {
        Self::new(size, size)
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns whether either dimension is zero.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Returns the largest square [`Rect`] centered in `self`.
    ///
    /// The shorter side is kept, the longer one is cut evenly on both ends.
    pub fn center_square(&self) -> Rect {
        let side = self.width.min(self.height);
        let rect = Rect::from_top_left(
            ((self.width - side) / 2) as f32,
            ((self.height - side) / 2) as f32,
            side as f32,
            side as f32,
        );
        log::trace!("center square of {} -> {:?}", self, rect);
        rect
    }
}

impl From<(u32, u32)> for Resolution {
    fn from((width, height): (u32, u32)) -> Self {
        Self::new(width, height)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn center_square() {
        assert_eq!(
            Resolution::new(300, 200).center_square(),
            Rect::from_top_left(50.0, 0.0, 200.0, 200.0)
        );
        assert_eq!(
            Resolution::new(16, 21).center_square(),
            Rect::from_top_left(0.0, 2.0, 16.0, 16.0)
        );
        assert_eq!(
            Resolution::square(8).center_square(),
            Rect::from_top_left(0.0, 0.0, 8.0, 8.0)
        );
        assert_eq!(
            Resolution::new(0, 5).center_square(),
            Rect::from_top_left(0.0, 2.0, 0.0, 0.0)
        );
    }

    #[test]
    fn display() {
        assert_eq!(Resolution::new(640, 480).to_string(), "640x480");
        assert_eq!(format!("{:?}", Resolution::from((3, 4))), "3x4");
        assert!(Resolution::new(16, 0).is_empty());
        assert!(!Resolution::square(1).is_empty());
    }
}
