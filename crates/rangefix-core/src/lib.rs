//! Streaming range estimation for ESP-NOW style radio endpoints.
//!
//! This crate contains:
//! - **Record parser**: loose marker scanning of device console lines
//! - **Propagation model**: log-distance path loss, RSSI → metres
//! - **Smoothers**: outlier-clamping weighted RSSI filter and trimmed-mean
//!   distance filter over bounded per-channel histories
//! - **Quality classifier**: RSSI → discrete link quality label
//! - **Pipeline**: per-channel orchestration emitting immutable [`Reading`]s
//!
//! The crate performs no I/O and never reads the clock; callers supply the
//! line, the channel it came from, and the timestamp.

pub mod channel;
pub mod error;
pub mod history;
pub mod parser;
pub mod pipeline;
pub mod propagation;
pub mod quality;
pub mod reading;
pub mod smoother;

pub use channel::ChannelId;
pub use error::ParseError;
pub use pipeline::{ChannelEstimator, Pipeline, PipelineOutcome, SharedPipeline};
pub use quality::QualityLabel;
pub use reading::Reading;
pub use smoother::SmoothingMode;
