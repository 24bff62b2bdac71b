//! # Signal and Distance Smoothing
//!
//! Two fixed filters run per channel over bounded histories of the last
//! [`HISTORY_CAPACITY`] samples.
//!
//! **Strength** (dBm): a sample further than [`OUTLIER_THRESHOLD_DBM`] from
//! the history median is clamped to that median before it is stored. The
//! output is a weighted mean with weights ramping linearly from
//! [`WEIGHT_OLDEST`] to [`WEIGHT_NEWEST`], truncated to whole dBm.
//!
//! **Distance** (m): no rejection at this stage; once
//! [`MIN_TRIMMED_SAMPLES`] are held the output is a trimmed mean that drops
//! the lowest and highest 10 % (at least one sample each side).

use serde::{Deserialize, Serialize};

use crate::history::History;

/// Samples kept per history.
pub const HISTORY_CAPACITY: usize = 10;
/// Maximum distance from the median before a strength sample is clamped.
pub const OUTLIER_THRESHOLD_DBM: f64 = 15.0;
/// Strength history length from which the weighted mean is used.
pub const MIN_WEIGHTED_SAMPLES: usize = 3;
pub const WEIGHT_OLDEST: f64 = 0.5;
pub const WEIGHT_NEWEST: f64 = 1.0;
/// Distance history length from which the trimmed mean is used.
pub const MIN_TRIMMED_SAMPLES: usize = 5;

/// How a channel's samples are smoothed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmoothingMode {
    /// Outlier clamping plus weighted / trimmed means.
    #[default]
    Filtered,
    /// Deprecated legacy mode: smoothed values equal raw values and no history
    /// is kept. Only selectable from a config file.
    Passthrough,
}

impl std::fmt::Display for SmoothingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SmoothingMode::Filtered => write!(f, "filtered"),
            SmoothingMode::Passthrough => write!(f, "passthrough"),
        }
    }
}

// ─── Strength ───────────────────────────────────────────────────────────────

/// Result of feeding one strength sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrengthUpdate {
    /// Value actually stored in the history (the median when clamped).
    pub stored: i32,
    pub smoothed: i32,
}

impl StrengthUpdate {
    pub fn was_clamped(&self, raw: i32) -> bool {
        self.stored != raw
    }
}

#[derive(Debug, Clone, Default)]
pub struct StrengthSmoother {
    history: History<i32, HISTORY_CAPACITY>,
}

impl StrengthSmoother {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, sample: i32) -> StrengthUpdate {
        let stored = match median(self.history.iter().map(f64::from)) {
            Some(m) if (f64::from(sample) - m).abs() > OUTLIER_THRESHOLD_DBM => {
                round_half_toward_zero(m)
            }
            _ => sample,
        };
        self.history.push(stored);

        let smoothed = if self.history.len() >= MIN_WEIGHTED_SAMPLES {
            truncate_dbm(weighted_mean(&self.history))
        } else {
            stored
        };

        StrengthUpdate { stored, smoothed }
    }

    pub fn history(&self) -> &History<i32, HISTORY_CAPACITY> {
        &self.history
    }
}

/// Weighted mean with a linear weight ramp, oldest → newest.
fn weighted_mean(history: &History<i32, HISTORY_CAPACITY>) -> f64 {
    let n = history.len();
    let step = if n > 1 {
        (WEIGHT_NEWEST - WEIGHT_OLDEST) / (n - 1) as f64
    } else {
        0.0
    };

    let (sum, weight_sum) = history
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(sum, weight_sum), (i, v)| {
            let w = WEIGHT_OLDEST + step * i as f64;
            (sum + w * f64::from(v), weight_sum + w)
        });
    sum / weight_sum
}

/// Truncate toward zero, snapping values within float noise of an integer
/// so a constant input reproduces itself.
fn truncate_dbm(value: f64) -> i32 {
    let nearest = value.round();
    if (value - nearest).abs() < 1e-9 {
        nearest as i32
    } else {
        value.trunc() as i32
    }
}

/// Nearest integer; an exact .5 goes toward zero.
fn round_half_toward_zero(m: f64) -> i32 {
    if m.fract().abs() == 0.5 {
        m.trunc() as i32
    } else {
        m.round() as i32
    }
}

fn median(values: impl Iterator<Item = f64>) -> Option<f64> {
    let mut sorted: Vec<f64> = values.collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

// ─── Distance ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct DistanceSmoother {
    history: History<f64, HISTORY_CAPACITY>,
}

impl DistanceSmoother {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, sample: f64) -> f64 {
        self.history.push(sample);
        if self.history.len() < MIN_TRIMMED_SAMPLES {
            return sample;
        }
        trimmed_mean(self.history.to_vec())
    }

    pub fn history(&self) -> &History<f64, HISTORY_CAPACITY> {
        &self.history
    }
}

fn trimmed_mean(mut samples: Vec<f64>) -> f64 {
    samples.sort_by(f64::total_cmp);
    let n = samples.len();
    let trim = (n / 10).max(1);
    let kept = if trim < n / 2 {
        &samples[trim..n - trim]
    } else {
        &samples[..]
    };
    kept.iter().sum::<f64>() / kept.len() as f64
}

// ─── Per-channel state ──────────────────────────────────────────────────────

/// Filter state owned by one channel. Never shared between channels.
#[derive(Debug, Clone, Default)]
pub struct ChannelFilterState {
    strength: StrengthSmoother,
    distance: DistanceSmoother,
}

impl ChannelFilterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn smooth_strength(&mut self, sample: i32) -> StrengthUpdate {
        self.strength.update(sample)
    }

    pub fn smooth_distance(&mut self, sample: f64) -> f64 {
        self.distance.update(sample)
    }

    pub fn strength_history(&self) -> &History<i32, HISTORY_CAPACITY> {
        self.strength.history()
    }

    pub fn distance_history(&self) -> &History<f64, HISTORY_CAPACITY> {
        self.distance.history()
    }
}
