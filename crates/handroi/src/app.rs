//! Per-run application state for the command line tools.

use std::fmt;

use anyhow::Context;
use ndarray::Array2;

use crate::anomaly::{self, PreprocessConfig, ScoreCache, ScoreRange};
use crate::hand::{HandEstimate, HandLandmarker};
use crate::image::Resolution;
use crate::keypoints::KeypointTable;
use crate::nn::Network;
use crate::pipeline::{CancelToken, Frame};
use crate::timer::FpsCounter;

/// State of a hand landmark run over a sequence of frames.
pub struct RunState {
    landmarker: HandLandmarker,
    keypoints: KeypointTable,
    fps: FpsCounter,
}

impl RunState {
    pub fn new(landmarker: HandLandmarker, keypoints: KeypointTable) -> Self {
        Self {
            landmarker,
            keypoints,
            fps: FpsCounter::new("hand"),
        }
    }

    /// Runs the hand pipeline on `frame` and draws the result onto its image.
    ///
    /// Fails if the keypoint table has no entry for the frame.
    pub fn process(&mut self, frame: &mut Frame) -> anyhow::Result<HandEstimate> {
        let record = self
            .keypoints
            .get(frame.name())
            .with_context(|| format!("no keypoints for '{}'", frame.name()))?;
        let keypoints = record.to_keypoints(frame.image.resolution())?;

        let estimate = self
            .landmarker
            .estimate(&frame.image, &keypoints)
            .with_context(|| format!("failed to process '{}'", frame.name()))?;
        log::trace!("{}: {:?}", frame.name(), estimate.refined_rect());

        estimate.draw(&mut frame.image);
        self.fps.tick_with(self.landmarker.timers());
        Ok(estimate)
    }
}

/// State of an anomaly scoring run.
///
/// Score maps are cached by path, so reprocessing the same frames with a different threshold does
/// not run the network again.
///
/// Runs over a set of frames take two passes: [`AnomalyState::score_all`] scores every frame and
/// fixes the global score range, then [`AnomalyState::process`] normalizes each map with that
/// range, so one threshold means the same thing for every frame.
pub struct AnomalyState {
    net: Box<dyn Network>,
    config: PreprocessConfig,
    threshold: f32,
    cache: ScoreCache,
    range: Option<ScoreRange>,
}

impl AnomalyState {
    pub fn new<N: Network + 'static>(net: N, config: PreprocessConfig, threshold: f32) -> Self {
        Self {
            net: Box::new(net),
            config,
            threshold,
            cache: ScoreCache::new(),
            range: None,
        }
    }

    pub fn set_threshold(&mut self, threshold: f32) {
        self.threshold = threshold;
    }

    /// Changes the preprocessing configuration. Cached maps are dropped on the next access.
    pub fn set_config(&mut self, config: PreprocessConfig) {
        if config != self.config {
            self.range = None;
        }
        self.config = config;
    }

    /// Returns the score range fixed by the last [`AnomalyState::score_all`] call.
    pub fn range(&self) -> Option<ScoreRange> {
        self.range
    }

    pub fn cache(&self) -> &ScoreCache {
        &self.cache
    }

    /// Computes (or fetches) the score map of `frame`.
    pub fn score_map(&mut self, frame: &Frame) -> anyhow::Result<&Array2<f32>> {
        let (net, config) = (&self.net, self.config);
        self.cache.get_or_compute(frame.path(), config, || {
            let input = anomaly::preprocess(&frame.image, &config);
            anomaly::score_map(net, &input)
        })
    }

    /// Scores all `frames` and fixes the normalization range to the global minimum and maximum
    /// of their maps.
    ///
    /// Frames that fail to load or score are logged and skipped. Stops early if `cancel` is
    /// triggered. Returns the number of frames scored.
    pub fn score_all<I>(&mut self, frames: I, cancel: &CancelToken) -> usize
    where
        I: IntoIterator<Item = anyhow::Result<Frame>>,
    {
        let mut scored = 0;
        for frame in frames {
            if cancel.is_cancelled() {
                log::info!("scoring cancelled after {} frames", scored);
                break;
            }
            match frame.and_then(|frame| self.score_map(&frame).map(drop)) {
                Ok(()) => scored += 1,
                Err(e) => log::error!("{:#}", e),
            }
        }

        self.range = self.cache.score_range();
        log::debug!("scored {} frames, score range {:?}", scored, self.range);
        scored
    }

    /// Scores `frame` and replaces its image with the preprocessed image overlaid with the mask
    /// of pixels above the threshold.
    ///
    /// The score map is normalized with the range fixed by [`AnomalyState::score_all`], or with
    /// its own range if no range has been fixed.
    pub fn process(&mut self, frame: &mut Frame) -> anyhow::Result<AnomalyReport> {
        let threshold = self.threshold;
        let config = self.config;
        let fixed = self.range;
        let map = self.score_map(frame)?;
        let raw_score = anomaly::anomaly_score(&map.view());
        let range = fixed
            .or_else(|| ScoreRange::of([map.view()]))
            .unwrap_or_default();
        let normalized = range.normalize(&map.view());

        let input = anomaly::preprocess_image(&frame.image, &config);
        let (h, w) = normalized.dim();
        let base = if input.resolution() == Resolution::new(w as u32, h as u32) {
            input
        } else {
            input.resize_exact(Resolution::new(w as u32, h as u32))
        };
        let mask = anomaly::threshold_mask(&normalized.view(), threshold);
        let flagged = mask.iter().filter(|&&m| m).count();
        frame.image = anomaly::overlay_mask(&base, &mask)?;

        Ok(AnomalyReport {
            score: raw_score,
            flagged,
            total: mask.len(),
        })
    }
}

/// Summary of an anomaly scoring pass over one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnomalyReport {
    /// Maximum raw score of the map.
    pub score: f32,
    /// Number of pixels above the threshold.
    pub flagged: usize,
    pub total: usize,
}

impl fmt::Display for AnomalyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "score {:.3}, {}/{} pixels flagged",
            self.score, self.flagged, self.total
        )
    }
}
