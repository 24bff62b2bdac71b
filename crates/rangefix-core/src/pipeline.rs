//! # Estimation Pipeline
//!
//! Per line: parse → resolve distance → smooth → classify → [`Reading`].
//!
//! Each channel owns a [`ChannelEstimator`] holding its filter state; two
//! channels never see each other's history. [`Pipeline`] is the
//! single-threaded form. [`SharedPipeline`] can be fed from one thread per
//! source: a call locks only the channel it is for.
//!
//! Nothing here fails. Malformed lines are dropped (logged at `debug`) and the
//! stream keeps flowing; stopping is the caller's business and leaves every
//! channel's state consistent.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::channel::ChannelId;
use crate::parser::{self, ParsedLine, ParsedMeasurement};
use crate::propagation::estimate_distance;
use crate::quality::classify;
use crate::reading::{Estimate, Reading};
use crate::smoother::{ChannelFilterState, SmoothingMode};

/// What became of one line.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    Measurement(Reading),
    /// Firmware status report, passed through as text.
    Status(String),
    /// Not a measurement, or a malformed one.
    Ignored,
}

impl PipelineOutcome {
    pub fn reading(&self) -> Option<&Reading> {
        match self {
            PipelineOutcome::Measurement(r) => Some(r),
            _ => None,
        }
    }
}

// ─── Per-channel estimator ──────────────────────────────────────────────────

/// Filter state and processing for a single channel.
#[derive(Debug, Clone)]
pub struct ChannelEstimator {
    channel: ChannelId,
    mode: SmoothingMode,
    state: ChannelFilterState,
}

impl ChannelEstimator {
    pub fn new(channel: ChannelId, mode: SmoothingMode) -> Self {
        Self {
            channel,
            mode,
            state: ChannelFilterState::new(),
        }
    }

    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }

    pub fn mode(&self) -> SmoothingMode {
        self.mode
    }

    pub fn state(&self) -> &ChannelFilterState {
        &self.state
    }

    pub fn process_line(&mut self, line: &str, now: DateTime<Utc>) -> PipelineOutcome {
        match parser::parse_line(line) {
            Ok(ParsedLine::Measurement(m)) => {
                let estimate = self.estimate(m);
                PipelineOutcome::Measurement(Reading::new(
                    now,
                    self.channel.clone(),
                    estimate,
                    line,
                ))
            }
            Ok(ParsedLine::Status) => PipelineOutcome::Status(line.to_string()),
            Ok(ParsedLine::NotAMeasurement) => PipelineOutcome::Ignored,
            Err(e) => {
                tracing::debug!(
                    channel = %self.channel,
                    error = %e,
                    line,
                    "dropping malformed measurement"
                );
                PipelineOutcome::Ignored
            }
        }
    }

    fn estimate(&mut self, m: ParsedMeasurement) -> Estimate {
        let raw_strength = m.raw_strength;

        let (smoothed_strength, raw_distance, smoothed_distance) = match self.mode {
            SmoothingMode::Filtered => {
                let update = self.state.smooth_strength(raw_strength);
                if update.was_clamped(raw_strength) {
                    tracing::trace!(
                        channel = %self.channel,
                        raw_strength,
                        stored = update.stored,
                        "strength outlier clamped to median"
                    );
                }
                // Derived distances come from the smoothed strength so they
                // inherit the outlier protection.
                let raw_distance = m
                    .raw_distance
                    .unwrap_or_else(|| estimate_distance(update.smoothed));
                let smoothed_distance = self.state.smooth_distance(raw_distance);
                (update.smoothed, raw_distance, smoothed_distance)
            }
            SmoothingMode::Passthrough => {
                let raw_distance = m
                    .raw_distance
                    .unwrap_or_else(|| estimate_distance(raw_strength));
                (raw_strength, raw_distance, raw_distance)
            }
        };

        Estimate {
            raw_strength,
            smoothed_strength,
            raw_distance,
            smoothed_distance,
            quality: classify(smoothed_strength),
        }
    }
}

// ─── Single-threaded pipeline ───────────────────────────────────────────────

/// Channel-partitioned pipeline for a single caller thread.
///
/// Channels are created lazily on their first line.
#[derive(Debug, Default)]
pub struct Pipeline {
    mode: SmoothingMode,
    channels: HashMap<ChannelId, ChannelEstimator>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mode: SmoothingMode) -> Self {
        Self {
            mode,
            channels: HashMap::new(),
        }
    }

    pub fn mode(&self) -> SmoothingMode {
        self.mode
    }

    pub fn process_line(
        &mut self,
        line: &str,
        channel: &ChannelId,
        now: DateTime<Utc>,
    ) -> PipelineOutcome {
        let mode = self.mode;
        self.channels
            .entry(channel.clone())
            .or_insert_with(|| ChannelEstimator::new(channel.clone(), mode))
            .process_line(line, now)
    }

    pub fn channel_state(&self, channel: &ChannelId) -> Option<&ChannelFilterState> {
        self.channels.get(channel).map(ChannelEstimator::state)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

// ─── Shared pipeline ────────────────────────────────────────────────────────

/// Channel-partitioned pipeline callable from several threads at once.
///
/// Each channel sits behind its own lock; the map lock is held only long
/// enough to find or create the channel entry.
#[derive(Debug, Default)]
pub struct SharedPipeline {
    mode: SmoothingMode,
    channels: DashMap<ChannelId, Arc<Mutex<ChannelEstimator>>>,
}

impl SharedPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mode: SmoothingMode) -> Self {
        Self {
            mode,
            channels: DashMap::new(),
        }
    }

    pub fn mode(&self) -> SmoothingMode {
        self.mode
    }

    pub fn process_line(
        &self,
        line: &str,
        channel: &ChannelId,
        now: DateTime<Utc>,
    ) -> PipelineOutcome {
        let estimator = self.estimator(channel);
        // Histories are valid between any two pushes; recover from poisoning.
        let mut guard = estimator.lock().unwrap_or_else(|e| e.into_inner());
        guard.process_line(line, now)
    }

    /// Snapshot of one channel's filter state.
    pub fn channel_state(&self, channel: &ChannelId) -> Option<ChannelFilterState> {
        let estimator = self.channels.get(channel).map(|e| Arc::clone(e.value()))?;
        let guard = estimator.lock().unwrap_or_else(|e| e.into_inner());
        Some(guard.state().clone())
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    fn estimator(&self, channel: &ChannelId) -> Arc<Mutex<ChannelEstimator>> {
        if let Some(existing) = self.channels.get(channel) {
            return Arc::clone(existing.value());
        }
        let mode = self.mode;
        let entry = self
            .channels
            .entry(channel.clone())
            .or_insert_with(|| Arc::new(Mutex::new(ChannelEstimator::new(channel.clone(), mode))));
        Arc::clone(entry.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::QualityLabel;
    use crate::smoother::HISTORY_CAPACITY;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap()
    }

    fn measured(outcome: PipelineOutcome) -> Reading {
        match outcome {
            PipelineOutcome::Measurement(r) => r,
            other => panic!("expected measurement, got {other:?}"),
        }
    }

    #[test]
    fn measurement_line_with_distance() {
        let mut p = Pipeline::new();
        let ch = ChannelId::coordinator();
        let r = measured(p.process_line("RSSI: -55 dBm Distance: 3.20m", &ch, t0()));
        assert_eq!(r.raw_strength(), -55);
        assert_eq!(r.smoothed_strength(), -55);
        assert_eq!(r.raw_distance(), 3.20);
        assert_eq!(r.smoothed_distance(), 3.20);
        assert_eq!(r.quality(), QualityLabel::Fair);
        assert_eq!(r.channel(), &ch);
        assert_eq!(r.timestamp(), t0());
        assert_eq!(r.source_text(), "RSSI: -55 dBm Distance: 3.20m");
    }

    #[test]
    fn missing_distance_uses_model_on_smoothed_strength() {
        let mut p = Pipeline::new();
        let ch = ChannelId::end_device();
        p.process_line("RSSI: 40 dBm", &ch, t0());
        // Second sample is an outlier (|60 − 40| > 15) and is clamped to 40,
        // so the derived distance stays at the 1 m reference.
        let r = measured(p.process_line("RSSI: 60 dBm", &ch, t0()));
        assert_eq!(r.raw_strength(), 60);
        assert_eq!(r.smoothed_strength(), 40);
        assert_eq!(r.raw_distance(), 1.0);
    }

    #[test]
    fn status_and_ignored_lines() {
        let mut p = Pipeline::new();
        let ch = ChannelId::coordinator();
        assert_eq!(
            p.process_line("Send Status: OK", &ch, t0()),
            PipelineOutcome::Status("Send Status: OK".into())
        );
        assert_eq!(p.process_line("garbage", &ch, t0()), PipelineOutcome::Ignored);
        assert_eq!(p.process_line("RSSI: abc dBm", &ch, t0()), PipelineOutcome::Ignored);
    }

    #[test]
    fn malformed_lines_leave_state_untouched() {
        let mut p = Pipeline::new();
        let ch = ChannelId::coordinator();
        p.process_line("RSSI: -50 dBm", &ch, t0());
        p.process_line("RSSI: -50 dBm Distance: ??m", &ch, t0());
        let state = p.channel_state(&ch).unwrap();
        assert_eq!(state.strength_history().len(), 1);
        assert_eq!(state.distance_history().len(), 1);
    }

    #[test]
    fn channels_are_independent() {
        let mut p = Pipeline::new();
        let a = ChannelId::coordinator();
        let b = ChannelId::end_device();
        for _ in 0..5 {
            p.process_line("RSSI: -40 dBm Distance: 1.00m", &a, t0());
        }
        let r = measured(p.process_line("RSSI: -90 dBm Distance: 40.00m", &b, t0()));
        // b has no history, so nothing clamps its first sample.
        assert_eq!(r.smoothed_strength(), -90);
        assert_eq!(p.channel_count(), 2);
        assert_eq!(p.channel_state(&a).unwrap().strength_history().len(), 5);
        assert_eq!(p.channel_state(&b).unwrap().strength_history().len(), 1);
    }

    #[test]
    fn channel_created_lazily() {
        let mut p = Pipeline::new();
        assert_eq!(p.channel_count(), 0);
        p.process_line("boot: esp32 ready", &ChannelId::new("x"), t0());
        assert_eq!(p.channel_count(), 1);
        assert!(p.channel_state(&ChannelId::new("x")).unwrap().strength_history().is_empty());
    }

    #[test]
    fn histories_stay_bounded() {
        let mut p = Pipeline::new();
        let ch = ChannelId::coordinator();
        for i in 0..40 {
            p.process_line(&format!("RSSI: -{} dBm", 45 + i % 4), &ch, t0());
        }
        let state = p.channel_state(&ch).unwrap();
        assert_eq!(state.strength_history().len(), HISTORY_CAPACITY);
        assert_eq!(state.distance_history().len(), HISTORY_CAPACITY);
    }

    #[test]
    fn passthrough_mode_reports_raw_values() {
        let mut p = Pipeline::with_mode(SmoothingMode::Passthrough);
        let ch = ChannelId::coordinator();
        p.process_line("RSSI: -50 dBm Distance: 2.00m", &ch, t0());
        p.process_line("RSSI: -50 dBm Distance: 2.00m", &ch, t0());
        let r = measured(p.process_line("RSSI: -95 dBm", &ch, t0()));
        assert_eq!(r.smoothed_strength(), -95);
        assert_eq!(r.raw_distance(), 100.0);
        assert_eq!(r.smoothed_distance(), 100.0);
        assert_eq!(r.quality(), QualityLabel::VeryPoor);
        assert!(p.channel_state(&ch).unwrap().strength_history().is_empty());
    }

    #[test]
    fn shared_pipeline_matches_single_threaded() {
        let lines = [
            "RSSI: -44 dBm Distance: 1.10m",
            "Send Status: OK",
            "RSSI: -46 dBm Distance: 1.30m",
            "RSSI: -93 dBm Distance: 30.00m",
            "noise",
            "RSSI: -45 dBm Distance: 1.20m",
        ];
        let ch = ChannelId::coordinator();
        let mut single = Pipeline::new();
        let shared = SharedPipeline::new();
        for line in lines {
            assert_eq!(
                single.process_line(line, &ch, t0()),
                shared.process_line(line, &ch, t0())
            );
        }
        assert_eq!(
            shared.channel_state(&ch).unwrap().strength_history().to_vec(),
            single.channel_state(&ch).unwrap().strength_history().to_vec()
        );
        assert!(shared.channel_state(&ChannelId::end_device()).is_none());
    }
}
