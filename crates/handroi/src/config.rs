//! Defaults overridable through environment variables.
//!
//! Each variable is read once, the first time it is needed. Values that fail to parse are logged
//! and ignored.

use std::{env, str::FromStr, sync::OnceLock};

use crate::roi::RoiParams;

pub const THRESHOLD_VAR: &str = "HANDROI_THRESHOLD";
pub const MIN_BOX_SIZE_VAR: &str = "HANDROI_MIN_BOX_SIZE";

/// Returns the confidence threshold set via `HANDROI_THRESHOLD`, if any.
pub fn threshold_override() -> Option<f32> {
    static THRESHOLD: OnceLock<Option<f32>> = OnceLock::new();
    *THRESHOLD.get_or_init(|| read_var(THRESHOLD_VAR, |v: &f32| (0.0..=1.0).contains(v)))
}

/// Returns the minimum box size set via `HANDROI_MIN_BOX_SIZE`, if any.
pub fn min_box_size_override() -> Option<f32> {
    static MIN_BOX_SIZE: OnceLock<Option<f32>> = OnceLock::new();
    *MIN_BOX_SIZE.get_or_init(|| read_var(MIN_BOX_SIZE_VAR, |v: &f32| *v >= 0.0))
}

impl RoiParams {
    /// Returns the default parameters with any environment overrides applied.
    pub fn from_env() -> Self {
        apply_overrides(
            RoiParams::default(),
            threshold_override(),
            min_box_size_override(),
        )
    }
}

fn apply_overrides(
    mut params: RoiParams,
    threshold: Option<f32>,
    min_box_size: Option<f32>,
) -> RoiParams {
    if let Some(threshold) = threshold {
        params = params.with_threshold(threshold);
    }
    if let Some(min_box_size) = min_box_size {
        params = params.with_min_box_size(min_box_size);
    }
    params
}

fn read_var<T>(name: &str, valid: impl Fn(&T) -> bool) -> Option<T>
where
    T: FromStr + std::fmt::Debug,
{
    let value = env::var(name).ok()?;
    parse_value(name, &value, valid)
}

fn parse_value<T>(name: &str, value: &str, valid: impl Fn(&T) -> bool) -> Option<T>
where
    T: FromStr + std::fmt::Debug,
{
    match value.trim().parse::<T>() {
        Ok(v) if valid(&v) => {
            log::debug!("using {}={:?}", name, v);
            Some(v)
        }
        Ok(v) => {
            log::warn!("ignoring out-of-range value {:?} for {}", v, name);
            None
        }
        Err(_) => {
            log::warn!("ignoring invalid value '{}' for {}", value, name);
            None
        }
    }
}
