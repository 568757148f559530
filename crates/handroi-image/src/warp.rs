use nalgebra::Point2;

use crate::{
    rect::RotatedRect,
    transform::Homography,
    Color, Image, Resolution,
};

/// Resamples `src` through a perspective transform into a new image of resolution `res`.
///
/// `transform` maps *source* pixel coordinates to *destination* pixel coordinates. Every
/// destination pixel is computed by mapping it back through the inverse transform and sampling the
/// source bilinearly. Positions outside of `src` replicate the nearest edge pixel, so this never
/// fails for out-of-bounds regions.
///
/// If `transform` is not invertible, the output is filled with [`Color::NULL`].
pub fn warp_perspective(src: &Image, transform: &Homography, res: Resolution) -> Image {
    let inverse = match transform.inverse() {
        Some(inv) => inv,
        None => {
            log::warn!("non-invertible transform {:?}", transform.matrix());
            return Image::filled(res, Color::NULL);
        }
    };

    Image::from_fn(res, |x, y| {
        let p = inverse.apply(Point2::new(x as f32, y as f32));
        if !p.x.is_finite() || !p.y.is_finite() {
            return Color::NULL;
        }
        let s = src.sample_bilinear(p.x, p.y);
        Color(s.map(|c| (c + 0.5).clamp(0.0, 255.0) as u8))
    })
}

/// A square crop of a [`RotatedRect`] region, together with the transform that produced it.
#[derive(Debug, Clone)]
pub struct Crop {
    image: Image,
    rect: RotatedRect,
    transform: Homography,
}

impl Crop {
    /// Extracts the area covered by `rect` from `image` into a `size x size` image.
    ///
    /// The top edge of the (unrotated) rectangle becomes the top edge of the crop, so the crop is
    /// upright relative to the rectangle's orientation. The crop rectangle may extend past the image
    /// bounds; edge pixels are replicated in that case.
    pub fn extract(image: &Image, rect: &RotatedRect, size: u32) -> anyhow::Result<Self> {
        if size == 0 {
            anyhow::bail!("crop size must be non-zero");
        }
        if !rect.is_finite() {
            anyhow::bail!("cannot crop non-finite rectangle {:?}", rect);
        }

        let s = size as f32;
        let dst = [
            Point2::new(0.0, 0.0),
            Point2::new(s, 0.0),
            Point2::new(s, s),
            Point2::new(0.0, s),
        ];
        let transform = Homography::from_correspondences(rect.rotated_corners(), dst)
            .ok_or_else(|| anyhow::anyhow!("degenerate crop rectangle {:?}", rect))?;

        let image = warp_perspective(image, &transform, Resolution::square(size));
        log::trace!("extracted {}x{} crop of {:?}", size, size, rect);

        Ok(Self {
            image,
            rect: *rect,
            transform,
        })
    }

    /// Returns the cropped pixels.
    pub fn image(&self) -> &Image {
        &self.image
    }

    /// Returns the rectangle this crop was taken from, in source image coordinates.
    pub fn rect(&self) -> &RotatedRect {
        &self.rect
    }

    /// Returns the transform mapping source image pixels to crop pixels.
    pub fn transform(&self) -> &Homography {
        &self.transform
    }

    /// Returns the side length of the crop, in pixels.
    pub fn size(&self) -> u32 {
        self.image.width()
    }

    /// Maps a point in crop pixel coordinates back into source image coordinates.
    pub fn crop_to_image(&self, pt: Point2<f32>) -> Option<Point2<f32>> {
        Some(self.transform.inverse()?.apply(pt))
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::PI;

    use approx::assert_abs_diff_eq;

    use crate::rect::Rect;

    use super::*;

    fn gradient(res: Resolution) -> Image {
        Image::from_fn(res, |x, y| Color([x as u8, y as u8, 0, 255]))
    }

    #[test]
    fn uniform_image_stays_uniform() {
        let image = Image::filled(Resolution::new(40, 30), Color::from_rgb8(10, 20, 30));
        let rect = RotatedRect::new(Rect::from_center(20.0, 15.0, 25.0, 25.0), 0.7);
        let crop = Crop::extract(&image, &rect, 16).unwrap();
        assert_eq!(crop.image().resolution(), Resolution::square(16));
        assert!(crop.image().pixels().all(|c| c == Color::from_rgb8(10, 20, 30)));
    }

    #[test]
    fn axis_aligned_crop_copies_pixels() {
        let image = gradient(Resolution::new(64, 64));
        let rect = RotatedRect::from(Rect::from_top_left(10.0, 20.0, 16.0, 16.0));
        let crop = Crop::extract(&image, &rect, 16).unwrap();
        for y in 0..16 {
            for x in 0..16 {
                assert_eq!(crop.image().get(x, y), image.get(x + 10, y + 20));
            }
        }
    }

    #[test]
    fn out_of_bounds_replicates_edges() {
        let image = gradient(Resolution::new(8, 8));
        let rect = RotatedRect::from(Rect::from_top_left(-8.0, -8.0, 8.0, 8.0));
        let crop = Crop::extract(&image, &rect, 8).unwrap();
        assert!(crop.image().pixels().all(|c| c == image.get(0, 0)));

        let rect = RotatedRect::from(Rect::from_top_left(100.0, 4.0, 4.0, 4.0));
        let crop = Crop::extract(&image, &rect, 4).unwrap();
        for y in 0..4 {
            assert_eq!(crop.image().get(0, y), image.get(7, y + 4));
        }
    }

    #[test]
    fn half_turn_flips_crop() {
        let image = gradient(Resolution::new(32, 32));
        let rect = RotatedRect::new(Rect::from_top_left(8.0, 8.0, 16.0, 16.0), PI);
        let crop = Crop::extract(&image, &rect, 16).unwrap();
        // The rect's top left corner is now the bottom right one in the image.
        assert_eq!(crop.image().get(0, 0), image.get(24, 24));
        assert_eq!(crop.image().get(15, 15), image.get(9, 9));
    }

    #[test]
    fn transform_maps_corners() {
        let image = gradient(Resolution::new(32, 32));
        let rect = RotatedRect::new(Rect::from_center(16.0, 16.0, 10.0, 10.0), 0.3);
        let crop = Crop::extract(&image, &rect, 20).unwrap();
        let [tl, tr, br, bl] = rect.rotated_corners();
        assert_abs_diff_eq!(crop.transform().apply(tl), Point2::new(0.0, 0.0), epsilon = 1e-3);
        assert_abs_diff_eq!(crop.transform().apply(tr), Point2::new(20.0, 0.0), epsilon = 1e-3);
        assert_abs_diff_eq!(crop.transform().apply(br), Point2::new(20.0, 20.0), epsilon = 1e-3);
        assert_abs_diff_eq!(crop.transform().apply(bl), Point2::new(0.0, 20.0), epsilon = 1e-3);
        assert_abs_diff_eq!(
            crop.crop_to_image(Point2::new(10.0, 10.0)).unwrap(),
            Point2::new(16.0, 16.0),
            epsilon = 1e-3
        );
    }

    #[test]
    fn invalid_crops_are_errors() {
        let image = gradient(Resolution::new(8, 8));
        let rect = RotatedRect::from(Rect::from_center(4.0, 4.0, 4.0, 4.0));
        assert!(Crop::extract(&image, &rect, 0).is_err());

        let zero = RotatedRect::from(Rect::from_center(4.0, 4.0, 0.0, 0.0));
        assert!(Crop::extract(&image, &zero, 8).is_err());

        let nan = RotatedRect::from(Rect::from_center(f32::NAN, 4.0, 4.0, 4.0));
        assert!(Crop::extract(&image, &nan, 8).is_err());
    }
}
