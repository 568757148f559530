//! Visualization of hand regions, alignment points and landmarks.
//!
//! Each function returns a guard. The shape is drawn when the guard is dropped, so its color and
//! other options can be adjusted in the same expression.

use std::convert::Infallible;

use embedded_graphics::{
    draw_target::DrawTarget,
    mono_font::{ascii, MonoTextStyle},
    prelude::*,
    primitives::{Line, PrimitiveStyle, Rectangle},
    text::{Alignment, Baseline, Text, TextStyleBuilder},
};
use itertools::Itertools;

use crate::{rect::RotatedRect, Color, Image};

/// Outline of a [`RotatedRect`], drawn when dropped.
pub struct DrawRotatedRect<'a> {
    image: &'a mut Image,
    rect: RotatedRect,
    color: Color,
}

impl DrawRotatedRect<'_> {
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }
}

impl Drop for DrawRotatedRect<'_> {
    fn drop(&mut self) {
        // NaN corners would turn into lines from/to the origin.
        if !self.rect.is_finite() {
            return;
        }
        let style = PrimitiveStyle::with_stroke(self.color, 1);
        let corners = self.rect.rotated_corners().map(|p| to_point(p.x, p.y));
        for (start, end) in corners.into_iter().circular_tuple_windows() {
            draw_infallible(Line::new(start, end).into_styled(style), self.image);
        }
    }
}

/// X-shaped point marker, drawn when dropped.
pub struct DrawMarker<'a> {
    image: &'a mut Image,
    at: Point,
    color: Color,
    size: u32,
}

impl DrawMarker<'_> {
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Sets the side length of the marker, which must be odd. Defaults to 5.
    pub fn size(&mut self, size: u32) -> &mut Self {
        assert!(size % 2 == 1, "marker size must be odd, got {size}");
        self.size = size;
        self
    }
}

impl Drop for DrawMarker<'_> {
    fn drop(&mut self) {
        let r = (self.size / 2) as i32;
        let (at, color) = (self.at, self.color);
        let pixels = (-r..=r)
            .flat_map(|d| [Point::new(d, d), Point::new(d, -d)])
            .map(|offset| Pixel(at + offset, color));
        match Target(&mut *self.image).draw_iter(pixels) {
            Ok(()) => {}
            Err(infallible) => match infallible {},
        }
    }
}

/// Straight line, drawn when dropped.
pub struct DrawLine<'a> {
    image: &'a mut Image,
    start: Point,
    end: Point,
    color: Color,
}

impl DrawLine<'_> {
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }
}

impl Drop for DrawLine<'_> {
    fn drop(&mut self) {
        let line = Line::new(self.start, self.end).into_styled(PrimitiveStyle::with_stroke(self.color, 1));
        draw_infallible(line, self.image);
    }
}

/// Text label, drawn when dropped.
pub struct DrawText<'a> {
    image: &'a mut Image,
    at: Point,
    text: &'a str,
    color: Color,
    baseline: Baseline,
}

impl DrawText<'_> {
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Places the top of the text at the anchor instead of its vertical center.
    pub fn align_top(&mut self) -> &mut Self {
        self.baseline = Baseline::Top;
        self
    }
}

impl Drop for DrawText<'_> {
    fn drop(&mut self) {
        let style = TextStyleBuilder::new()
            .alignment(Alignment::Center)
            .baseline(self.baseline)
            .build();
        let text = Text::with_text_style(
            self.text,
            self.at,
            MonoTextStyle::new(&ascii::FONT_6X10, self.color),
            style,
        );
        draw_infallible(text, self.image);
    }
}

/// Draws the outline of `rect`, red by default.
///
/// Rectangles with non-finite components are skipped.
pub fn rotated_rect(image: &mut Image, rect: RotatedRect) -> DrawRotatedRect<'_> {
    DrawRotatedRect {
        image,
        rect,
        color: Color::RED,
    }
}

/// Draws an X-shaped marker centered on `(x, y)`, red by default.
pub fn marker(image: &mut Image, x: i32, y: i32) -> DrawMarker<'_> {
    DrawMarker {
        image,
        at: Point::new(x, y),
        color: Color::RED,
        size: 5,
    }
}

/// Draws a line, blue by default.
pub fn line(image: &mut Image, start_x: i32, start_y: i32, end_x: i32, end_y: i32) -> DrawLine<'_> {
    DrawLine {
        image,
        start: Point::new(start_x, start_y),
        end: Point::new(end_x, end_y),
        color: Color::BLUE,
    }
}

/// Draws `text` centered on `(x, y)`, red by default.
pub fn text<'a>(image: &'a mut Image, x: i32, y: i32, text: &'a str) -> DrawText<'a> {
    DrawText {
        image,
        at: Point::new(x, y),
        text,
        color: Color::RED,
        baseline: Baseline::Middle,
    }
}

fn to_point(x: f32, y: f32) -> Point {
    Point::new(x.round() as i32, y.round() as i32)
}

fn draw_infallible<D: Drawable<Color = Color>>(drawable: D, image: &mut Image) {
    match drawable.draw(&mut Target(image)) {
        Ok(_) => {}
        Err(infallible) => match infallible {},
    }
}

/// Clipping adapter that lets embedded-graphics draw into an [`Image`].
struct Target<'a>(&'a mut Image);

impl Dimensions for Target<'_> {
    fn bounding_box(&self) -> Rectangle {
        Rectangle::new(Point::zero(), Size::new(self.0.width(), self.0.height()))
    }
}

impl DrawTarget for Target<'_> {
    type Color = Color;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Infallible>
    where
        I: IntoIterator<Item = Pixel<Color>>,
    {
        let (w, h) = (self.0.width(), self.0.height());
        for Pixel(pos, color) in pixels {
            if let (Ok(x), Ok(y)) = (u32::try_from(pos.x), u32::try_from(pos.y)) {
                if x < w && y < h {
                    self.0.set(x, y, color);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{rect::Rect, Resolution};

    use super::*;

    #[test]
    fn marker_draws_diagonals() {
        let mut image = Image::filled(Resolution::square(5), Color::BLACK);
        marker(&mut image, 2, 2).color(Color::GREEN).size(3);
        assert_eq!(image.get(2, 2), Color::GREEN);
        assert_eq!(image.get(1, 1), Color::GREEN);
        assert_eq!(image.get(3, 1), Color::GREEN);
        assert_eq!(image.get(1, 3), Color::GREEN);
        assert_eq!(image.get(2, 1), Color::BLACK);
        assert_eq!(image.get(0, 0), Color::BLACK);
    }

    #[test]
    fn drawing_outside_is_clipped() {
        let mut image = Image::filled(Resolution::square(4), Color::BLACK);
        marker(&mut image, -10, -10);
        line(&mut image, -5, 1, 10, 1).color(Color::WHITE);
        assert_eq!(image.get(0, 1), Color::WHITE);
        assert_eq!(image.get(3, 1), Color::WHITE);
        assert_eq!(image.get(0, 0), Color::BLACK);
    }

    #[test]
    fn rotated_rect_outline() {
        let mut image = Image::filled(Resolution::square(10), Color::BLACK);
        rotated_rect(&mut image, Rect::from_top_left(2.0, 2.0, 5.0, 5.0).into());
        assert_eq!(image.get(2, 2), Color::RED);
        assert_eq!(image.get(7, 7), Color::RED);
        assert_eq!(image.get(4, 4), Color::BLACK);

        let before = image.clone();
        rotated_rect(&mut image, Rect::from_center(f32::NAN, 0.0, 1.0, 1.0).into());
        assert_eq!(image, before);
    }

    #[test]
    fn text_is_drawn() {
        let mut image = Image::filled(Resolution::new(40, 20), Color::BLACK);
        text(&mut image, 20, 10, "42").color(Color::WHITE);
        assert!(image.pixels().any(|c| c == Color::WHITE));
    }
}
