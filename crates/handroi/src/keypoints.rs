//! Per-frame keypoint files.
//!
//! Keypoints are stored as one whitespace-separated line per frame:
//!
//! ```text
//! # file        wrist x y   pinky x y   index x y   score
//! frame001.png  0.51 0.80   0.42 0.55   0.58 0.52   0.93
//! ```
//!
//! Coordinates are normalized to the image size. `#` starts a comment that extends to the end of
//! the line, and empty lines are ignored.

use std::{collections::HashMap, path::Path};

use anyhow::Context;

use crate::image::Resolution;
use crate::roi::HandKeypoints;

/// Normalized wrist, pinky and index keypoints plus confidence of one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeypointRecord {
    pub rows: [[f32; 4]; 3],
}

impl KeypointRecord {
    /// Converts the record to pixel-space keypoints for an image of resolution `res`.
    pub fn to_keypoints(&self, res: Resolution) -> anyhow::Result<HandKeypoints> {
        HandKeypoints::from_normalized(&self.rows, res)
    }
}

/// Keypoint records keyed by frame file name.
#[derive(Debug, Default, Clone)]
pub struct KeypointTable {
    records: HashMap<String, KeypointRecord>,
}

impl KeypointTable {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read keypoints from '{}'", path.display()))?;
        text.parse()
            .with_context(|| format!("invalid keypoint file '{}'", path.display()))
    }

    pub fn get(&self, name: &str) -> Option<&KeypointRecord> {
        self.records.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, record: KeypointRecord) {
        self.records.insert(name.into(), record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl std::str::FromStr for KeypointTable {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let mut table = Self::default();
        for (lineno, line) in s.lines().enumerate() {
            let line = match line.split_once('#') {
                Some((content, _comment)) => content,
                None => line,
            };
            let mut fields = line.split_whitespace();
            let Some(name) = fields.next() else {
                continue;
            };

            let values = fields
                .map(|f| f.parse::<f32>())
                .collect::<Result<Vec<_>, _>>()
                .with_context(|| format!("line {}: invalid number", lineno + 1))?;
            let [wx, wy, px, py, ix, iy, score] = values[..] else {
                anyhow::bail!(
                    "line {}: expected 7 values after the file name, got {}",
                    lineno + 1,
                    values.len()
                );
            };

            let record = KeypointRecord {
                rows: [
                    [wx, wy, 0.0, score],
                    [px, py, 0.0, score],
                    [ix, iy, 0.0, score],
                ],
            };
            if table.records.insert(name.to_string(), record).is_some() {
                log::warn!("line {}: duplicate entry for '{}'", lineno + 1, name);
            }
        }
        Ok(table)
    }
}
