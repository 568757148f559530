use std::{fmt, ops::Index, path::Path};

use embedded_graphics::{pixelcolor::raw::RawU32, prelude::PixelColor};
use image::{imageops::FilterType, DynamicImage, ImageBuffer, Rgba, RgbaImage};

use crate::{rect::Rect, Resolution};

#[derive(Debug, Clone, Copy)]
enum ImageFormat {
    Jpeg,
    Png,
}

impl ImageFormat {
    fn from_path(path: &Path) -> anyhow::Result<Self> {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("jpg" | "jpeg") => Ok(Self::Jpeg),
            Some("png") => Ok(Self::Png),
            _ => anyhow::bail!(
                "invalid image path '{}' (must have one of the supported extensions)",
                path.display()
            ),
        }
    }

    fn to_image_format(self) -> image::ImageFormat {
        match self {
            Self::Jpeg => image::ImageFormat::Jpeg,
            Self::Png => image::ImageFormat::Png,
        }
    }
}

/// Returns whether `path` has the extension of an image format that [`Image::load`] supports.
pub fn is_supported_image_path(path: &Path) -> bool {
    ImageFormat::from_path(path).is_ok()
}

/// An 8-bit sRGB image with alpha channel.
#[derive(Clone, PartialEq)]
pub struct Image {
    buf: RgbaImage,
}

impl Image {
    /// Loads an image from the filesystem.
    ///
    /// The path must have a supported file extension (`jpeg`, `jpg` or `png`).
    pub fn load<A: AsRef<Path>>(path: A) -> anyhow::Result<Self> {
        Self::load_impl(path.as_ref())
    }

    fn load_impl(path: &Path) -> anyhow::Result<Self> {
        let format = ImageFormat::from_path(path)?;
        let data = std::fs::read(path)?;
        let buf = image::load_from_memory_with_format(&data, format.to_image_format())?.to_rgba8();
        log::trace!("loaded {}x{} image from {}", buf.width(), buf.height(), path.display());
        Ok(Self { buf })
    }

    /// Saves an image to the file system.
    ///
    /// The path must have a supported file extension (`jpeg`, `jpg` or `png`). JPEG files do not
    /// support an alpha channel, so it is dropped when saving one.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        self.save_impl(path.as_ref())
    }

    fn save_impl(&self, path: &Path) -> anyhow::Result<()> {
        match ImageFormat::from_path(path)? {
            ImageFormat::Jpeg => {
                let rgb = DynamicImage::ImageRgba8(self.buf.clone()).to_rgb8();
                rgb.save_with_format(path, image::ImageFormat::Jpeg)?;
            }
            ImageFormat::Png => self.buf.save_with_format(path, image::ImageFormat::Png)?,
        }
        Ok(())
    }

    /// Creates an empty image of a specified size.
    ///
    /// The image will start out black and fully transparent.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            buf: ImageBuffer::new(width, height),
        }
    }

    /// Creates an image of the given size with every pixel set to `color`.
    pub fn filled(res: Resolution, color: Color) -> Self {
        Self {
            buf: ImageBuffer::from_pixel(res.width(), res.height(), Rgba(color.0)),
        }
    }

    /// Creates an image by evaluating `f` at every pixel position.
    pub fn from_fn(res: Resolution, mut f: impl FnMut(u32, u32) -> Color) -> Self {
        Self {
            buf: ImageBuffer::from_fn(res.width(), res.height(), |x, y| Rgba(f(x, y).0)),
        }
    }

    /// Returns the width of this image, in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.buf.width()
    }

    /// Returns the height of this image, in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.buf.height()
    }

    /// Returns the size of this image.
    #[inline]
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width(), self.height())
    }

    /// Gets the image color at the given pixel coordinates.
    ///
    /// # Panics
    ///
    /// This will panic if `(x, y)` is outside the bounds of this image.
    pub fn get(&self, x: u32, y: u32) -> Color {
        Color(self.buf[(x, y)].0)
    }

    /// Sets the image color at the given pixel coordinates.
    ///
    /// # Panics
    ///
    /// This will panic if `(x, y)` is outside the bounds of this image.
    pub fn set(&mut self, x: u32, y: u32, color: Color) {
        self.buf[(x, y)] = Rgba(color.0);
    }

    /// Gets the color at `(x, y)`, replicating the nearest edge pixel for coordinates outside the
    /// image.
    ///
    /// Returns [`Color::NULL`] if the image is empty.
    pub fn get_clamped(&self, x: i64, y: i64) -> Color {
        if self.resolution().is_empty() {
            return Color::NULL;
        }
        let x = x.clamp(0, i64::from(self.width()) - 1) as u32;
        let y = y.clamp(0, i64::from(self.height()) - 1) as u32;
        self.get(x, y)
    }

    /// Samples the image at a fractional position using bilinear interpolation.
    ///
    /// Pixel centers are located at integer coordinates. Neighbors outside of the image replicate
    /// the closest edge pixel. All four channels are interpolated and returned unrounded.
    pub fn sample_bilinear(&self, x: f32, y: f32) -> [f32; 4] {
        let (x0, y0) = (x.floor(), y.floor());
        let (fx, fy) = (x - x0, y - y0);
        let (x0, y0) = (x0 as i64, y0 as i64);

        let tl = self.get_clamped(x0, y0);
        let (x1, y1) = (x0.saturating_add(1), y0.saturating_add(1));
        let tr = self.get_clamped(x1, y0);
        let bl = self.get_clamped(x0, y1);
        let br = self.get_clamped(x1, y1);

        let mut out = [0.0; 4];
        for (c, out) in out.iter_mut().enumerate() {
            let top = f32::from(tl[c]) * (1.0 - fx) + f32::from(tr[c]) * fx;
            let bottom = f32::from(bl[c]) * (1.0 - fx) + f32::from(br[c]) * fx;
            *out = top * (1.0 - fy) + bottom * fy;
        }
        out
    }

    /// Resizes the image to exactly `res`, ignoring its aspect ratio.
    #[must_use]
    pub fn resize_exact(&self, res: Resolution) -> Image {
        Image {
            buf: image::imageops::resize(&self.buf, res.width(), res.height(), FilterType::Triangle),
        }
    }

    /// Copies the axis-aligned `rect` out of this image.
    ///
    /// The rectangle's coordinates are rounded to whole pixels and clipped to the image bounds.
    #[must_use]
    pub fn crop(&self, rect: Rect) -> Image {
        let x = (rect.x().round().max(0.0) as u32).min(self.width());
        let y = (rect.y().round().max(0.0) as u32).min(self.height());
        let w = (rect.width().round().max(0.0) as u32).min(self.width() - x);
        let h = (rect.height().round().max(0.0) as u32).min(self.height() - y);
        Image {
            buf: image::imageops::crop_imm(&self.buf, x, y, w, h).to_image(),
        }
    }

    /// Returns an iterator over all pixels in row-major order.
    pub fn pixels(&self) -> impl Iterator<Item = Color> + '_ {
        self.buf.pixels().map(|pix| Color(pix.0))
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} Image", self.width(), self.height())
    }
}

/// An 8-bit RGBA color.
///
/// Colors are always in the sRGB color space and use non-premultiplied alpha.
#[derive(PartialEq, Eq, Clone, Copy)]
pub struct Color(pub [u8; 4]);

impl Color {
    /// Fully transparent black (all components are 0).
    pub const NULL: Self = Self([0, 0, 0, 0]);
    pub const BLACK: Self = Self([0, 0, 0, 255]);
    pub const WHITE: Self = Self([255, 255, 255, 255]);
    pub const RED: Self = Self([255, 0, 0, 255]);
    pub const GREEN: Self = Self([0, 255, 0, 255]);
    pub const BLUE: Self = Self([0, 0, 255, 255]);
    pub const YELLOW: Self = Self([255, 255, 0, 255]);

    #[inline]
    pub const fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b, 255])
    }

    #[inline]
    pub fn r(&self) -> u8 {
        self.0[0]
    }

    #[inline]
    pub fn g(&self) -> u8 {
        self.0[1]
    }

    #[inline]
    pub fn b(&self) -> u8 {
        self.0[2]
    }

    #[inline]
    pub fn a(&self) -> u8 {
        self.0[3]
    }
}

impl fmt::Debug for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{:02x}{:02x}{:02x}{:02x}",
            self.r(),
            self.g(),
            self.b(),
            self.a(),
        )
    }
}

impl Index<usize> for Color {
    type Output = u8;

    #[inline]
    fn index(&self, index: usize) -> &u8 {
        &self.0[index]
    }
}

impl PixelColor for Color {
    type Raw = RawU32;
}
