//! Anomaly score map preprocessing, caching and post-processing.
//!
//! A scoring network maps a preprocessed image to a per-pixel anomaly score map. Score maps are
//! cached per image path for the duration of a run, since recomputing them is expensive and the
//! threshold is usually tuned interactively over the same set of images.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use itertools::{Itertools, MinMaxResult};
use ndarray::{Array2, Array4, ArrayView2};

use crate::image::{Image, Resolution};
use crate::nn::{image_to_nchw, ColorMapper, Network};

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Side length of the network input after preprocessing.
pub const INPUT_SIZE: u32 = 224;

/// Image preprocessing settings that affect the computed score maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PreprocessConfig {
    /// Cut the largest centered square out of the image before resizing, instead of stretching it.
    pub keep_aspect: bool,
    /// Resize to 256 and cut out the center 224x224 pixels, instead of resizing to 224 directly.
    pub center_crop: bool,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            keep_aspect: true,
            center_crop: false,
        }
    }
}

impl PreprocessConfig {
    /// Returns the side length the image is resized to.
    pub fn resize(&self) -> u32 {
        if self.center_crop {
            256
        } else {
            INPUT_SIZE
        }
    }
}

/// Resizes and crops `image` according to `config`, producing a `INPUT_SIZE` square image.
pub fn preprocess_image(image: &Image, config: &PreprocessConfig) -> Image {
    let source = if config.keep_aspect {
        image.crop(image.resolution().center_square())
    } else {
        image.clone()
    };

    let resize = config.resize();
    let resized = source.resize_exact(Resolution::square(resize));
    if resize == INPUT_SIZE {
        return resized;
    }

    let offset = ((resize - INPUT_SIZE) / 2) as f32;
    resized.crop(crate::image::rect::Rect::from_top_left(
        offset,
        offset,
        INPUT_SIZE as f32,
        INPUT_SIZE as f32,
    ))
}

/// Preprocesses `image` into a normalized `[1, 3, 224, 224]` tensor.
///
/// Colors are mapped to `[0, 1]` and then standardized with the ImageNet channel statistics.
pub fn preprocess(image: &Image, config: &PreprocessConfig) -> Array4<f32> {
    let mut tensor = image_to_nchw(
        &preprocess_image(image, config),
        &ColorMapper::linear(0.0..=1.0),
    );
    for (c, mut channel) in tensor.axis_iter_mut(ndarray::Axis(1)).enumerate() {
        channel.mapv_inplace(|v| (v - IMAGENET_MEAN[c]) / IMAGENET_STD[c]);
    }
    tensor
}

/// Runs a scoring network and returns its first output as a 2D score map.
pub fn score_map<N: Network + ?Sized>(net: &N, input: &Array4<f32>) -> anyhow::Result<Array2<f32>> {
    let outputs = net.forward(input)?;
    let map = outputs
        .get(0)
        .ok_or_else(|| anyhow::anyhow!("scoring network produced no outputs"))?;

    // Drop leading unit dimensions (batch, channel).
    let shape = map.shape();
    let unit_prefix = shape.len().saturating_sub(2);
    if shape.len() < 2 || shape[..unit_prefix].iter().any(|&d| d != 1) {
        anyhow::bail!("score map must have shape [1, .., H, W], got {:?}", shape);
    }
    let (h, w) = (shape[unit_prefix], shape[unit_prefix + 1]);
    Ok(map.to_shape((h, w))?.to_owned())
}

/// Per-path cache of score maps, valid for a single [`PreprocessConfig`].
#[derive(Debug, Default)]
pub struct ScoreCache {
    config: Option<PreprocessConfig>,
    maps: HashMap<PathBuf, Array2<f32>>,
}

impl ScoreCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `config` the active configuration, discarding all cached maps if it differs from
    /// the previous one.
    pub fn sync_config(&mut self, config: PreprocessConfig) {
        if self.config.is_some_and(|c| c != config) {
            log::debug!(
                "preprocessing changed to {:?}, dropping {} cached score maps",
                config,
                self.maps.len()
            );
            self.maps.clear();
        }
        self.config = Some(config);
    }

    /// Returns the cached score map for `path`, computing it with `compute` on a miss.
    ///
    /// Errors from `compute` are returned and nothing is cached.
    pub fn get_or_compute(
        &mut self,
        path: &Path,
        config: PreprocessConfig,
        compute: impl FnOnce() -> anyhow::Result<Array2<f32>>,
    ) -> anyhow::Result<&Array2<f32>> {
        self.sync_config(config);
        if !self.maps.contains_key(path) {
            let map = compute()?;
            self.maps.insert(path.to_path_buf(), map);
        } else {
            log::trace!("score cache hit for {}", path.display());
        }
        Ok(&self.maps[path])
    }

    /// Returns the range spanned by all cached maps.
    pub fn score_range(&self) -> Option<ScoreRange> {
        ScoreRange::of(self.maps.values().map(|m| m.view()))
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.maps.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }
}

/// Global minimum and maximum of a set of score maps, used for min-max normalization.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScoreRange {
    pub min: f32,
    pub max: f32,
}

impl ScoreRange {
    /// Computes the range spanned by all values of all `maps`.
    ///
    /// Returns [`None`] if the maps contain no values.
    pub fn of<'a>(maps: impl IntoIterator<Item = ArrayView2<'a, f32>>) -> Option<Self> {
        match maps
            .into_iter()
            .flat_map(|m| m.into_iter().copied())
            .minmax_by(f32::total_cmp)
        {
            MinMaxResult::NoElements => None,
            MinMaxResult::OneElement(v) => Some(Self { min: v, max: v }),
            MinMaxResult::MinMax(min, max) => Some(Self { min, max }),
        }
    }

    /// Maps `map` into `[0, 1]` relative to this range.
    ///
    /// If the range is empty, every normalized score is 0.
    pub fn normalize(&self, map: &ArrayView2<'_, f32>) -> Array2<f32> {
        let range = self.max - self.min;
        if range > 0.0 {
            map.mapv(|v| (v - self.min) / range)
        } else {
            Array2::zeros(map.raw_dim())
        }
    }
}

/// Returns the image-level anomaly score of a score map: its maximum value.
pub fn anomaly_score(map: &ArrayView2<'_, f32>) -> f32 {
    map.iter().copied().fold(f32::NEG_INFINITY, f32::max)
}

/// Marks pixels whose score exceeds `threshold`.
pub fn threshold_mask(map: &ArrayView2<'_, f32>, threshold: f32) -> Array2<bool> {
    map.mapv(|v| v > threshold)
}

/// Renders a normalized score map as an image: the mask in red, blended over `image`.
///
/// `image` must have the resolution of the score map.
pub fn overlay_mask(image: &Image, mask: &Array2<bool>) -> anyhow::Result<Image> {
    let (h, w) = mask.dim();
    if image.resolution() != Resolution::new(w as u32, h as u32) {
        anyhow::bail!(
            "mask of size {}x{} does not match {} image",
            w,
            h,
            image.resolution()
        );
    }

    let mut out = image.clone();
    for ((y, x), &hit) in mask.indexed_iter() {
        if hit {
            let c = out.get(x as u32, y as u32);
            let blend = |a: u8, b: u8| ((u16::from(a) + u16::from(b)) / 2) as u8;
            out.set(
                x as u32,
                y as u32,
                crate::image::Color([blend(c.r(), 255), blend(c.g(), 0), blend(c.b(), 0), 255]),
            );
        }
    }
    Ok(out)
}
