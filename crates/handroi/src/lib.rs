//! Hand region-of-interest geometry.
//!
//! This library turns sparse hand keypoints (wrist, pinky and index finger) into an oriented
//! square region of interest, cuts that region out of the image as an upright fixed-size crop,
//! and projects points predicted on the crop back into the image. Chaining these steps with two
//! neural networks yields the full hand landmark pipeline implemented by [`hand::HandLandmarker`].
//!
//! # Coordinate Systems
//!
//! Pixel coordinates have their origin in the top left corner of the image, with X pointing right
//! and Y pointing *down*. Normalized coordinates are pixel coordinates divided by the image width
//! and height, so that `(0, 0)` is the top left and `(1, 1)` is the bottom right corner.
//!
//! Angles are in radians and normalized to `[-π, π)`. A positive angle rotates clockwise as seen on
//! screen.
//!
//! # Environment Variables
//!
//! Some defaults can be overridden by setting environment variables:
//!
//! * `HANDROI_THRESHOLD`: keypoint confidence that must be exceeded for a hand to be accepted.
//! * `HANDROI_MIN_BOX_SIZE`: minimum hand box size in pixels. Smaller regions are rejected as
//!   degenerate.
//!
//! Invalid values are logged and ignored.

use log::LevelFilter;

pub use handroi_image as image;

pub mod anomaly;
pub mod app;
pub mod config;
pub mod hand;
pub mod keypoints;
pub mod landmark;
pub mod nn;
pub mod num;
pub mod pipeline;
pub mod projection;
pub mod recrop;
pub mod roi;
pub mod timer;

/// macro-use only, not part of public API.
#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    let log_level = LevelFilter::Debug;
    env_logger::Builder::new()
        .filter(Some(calling_crate), log_level)
        .filter(Some(env!("CARGO_CRATE_NAME")), log_level)
        .filter(Some("handroi_image"), log_level)
        .filter(Some("tract_onnx"), LevelFilter::Warn)
        .parse_default_env()
        .try_init()
        .ok();
}

/// Initializes logging to *stderr*.
///
/// The calling crate and this library will log at *debug* level, the inference runtime at *warn*
/// level. `RUST_LOG` overrides these defaults.
///
/// If a global logger is already registered, this macro will do nothing.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}
