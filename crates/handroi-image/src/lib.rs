//! CPU image manipulation for hand region-of-interest processing.
//!
//! # Overview
//!
//! ## Images
//!
//! [`Image`] is an owned 8-bit sRGBA image. It can be loaded from and saved to JPEG and PNG files,
//! and individual pixels can be read either exactly ([`Image::get`]), with edge replication
//! ([`Image::get_clamped`]), or with bilinear interpolation ([`Image::sample_bilinear`]).
//!
//! ## Rectangles
//!
//! The [`rect`] module provides axis-aligned [`rect::Rect`]s and [`rect::RotatedRect`]s. All
//! rectangles live in pixel space, with X pointing right and Y pointing *down*. Rotations are
//! clockwise as seen on screen, which is the counterclockwise rotation matrix applied in a Y-down
//! coordinate system.
//!
//! ## Warping
//!
//! [`transform::Homography`] describes a 3x3 perspective transform between two pixel spaces.
//! [`warp_perspective`] resamples an image through such a transform, and [`Crop::extract`] uses it
//! to cut an arbitrarily rotated rectangle out of an image into a fixed-size square.
//!
//! ## Drawing
//!
//! A few primitive drawing operations are available in the [`draw`] module. They are meant for
//! quickly visualizing regions and landmarks on output frames.

pub mod draw;
pub mod rect;
pub mod transform;

mod image;
mod resolution;
mod warp;

pub use crate::image::*;
pub use resolution::Resolution;
pub use warp::{warp_perspective, Crop};
