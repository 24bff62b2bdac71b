//! Rangefix monitor.
//!
//! The thin collaborator around `rangefix-core`:
//! - **Config**: TOML file plus CLI overrides, resolved into [`MonitorConfig`]
//! - **Sources**: line readers over files, FIFOs or stdin, one per channel
//! - **Session**: one reader thread per channel feeding a shared pipeline,
//!   a collector on the calling thread, JSON persistence and a summary
//!
//! [`MonitorConfig`]: config::MonitorConfig

pub mod config;
pub mod session;
pub mod source;
