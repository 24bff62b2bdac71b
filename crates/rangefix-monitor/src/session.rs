//! Monitoring session.
//!
//! One reader thread per channel pulls lines from its source and pushes them
//! through a [`SharedPipeline`]; outcomes travel over a crossbeam channel to
//! the collector on the calling thread, which logs them and builds the
//! [`SessionReport`].
//!
//! The session ends when every source has closed, the configured duration
//! elapses, or the stop flag is raised (Ctrl+C). Readers blocked on a quiet
//! source are left detached; they exit with the process.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::Context;
use chrono::Utc;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use rangefix_core::{ChannelId, PipelineOutcome, Reading, SharedPipeline};

use crate::config::MonitorConfig;
use crate::source::{self, LineReader, SourceLine};

type SourceLines = LineReader<Box<dyn BufRead + Send>>;

/// How often the collector re-checks the stop flag and deadline.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Message from a reader thread to the collector.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    Outcome {
        channel: ChannelId,
        outcome: PipelineOutcome,
    },
    DecodeFailure {
        channel: ChannelId,
    },
    Closed {
        channel: ChannelId,
    },
}

// ─── Report ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelCounters {
    pub readings: usize,
    pub status_lines: usize,
    pub ignored: usize,
    pub decode_failures: usize,
}

impl std::ops::AddAssign for ChannelCounters {
    fn add_assign(&mut self, rhs: Self) {
        self.readings += rhs.readings;
        self.status_lines += rhs.status_lines;
        self.ignored += rhs.ignored;
        self.decode_failures += rhs.decode_failures;
    }
}

/// Min / max / mean of smoothed distance over a set of readings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceSummary {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl DistanceSummary {
    pub fn from_readings<'a>(readings: impl IntoIterator<Item = &'a Reading>) -> Option<Self> {
        let (count, min, max, sum) = readings.into_iter().map(Reading::smoothed_distance).fold(
            (0usize, f64::INFINITY, f64::NEG_INFINITY, 0.0),
            |(n, lo, hi, sum), d| (n + 1, lo.min(d), hi.max(d), sum + d),
        );
        (count > 0).then(|| DistanceSummary {
            count,
            min,
            max,
            mean: sum / count as f64,
        })
    }
}

impl fmt::Display for DistanceSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Min={:.2}m, Max={:.2}m, Avg={:.2}m",
            self.min, self.max, self.mean
        )
    }
}

/// Everything collected during one session.
#[derive(Debug, Clone, Default)]
pub struct SessionReport {
    /// Accepted readings in arrival order.
    pub readings: Vec<Reading>,
    pub counters: BTreeMap<ChannelId, ChannelCounters>,
}

impl SessionReport {
    /// Log and account one event from a reader.
    pub fn record(&mut self, event: SourceEvent) {
        match event {
            SourceEvent::Outcome { channel, outcome } => {
                let counters = self.counters.entry(channel.clone()).or_default();
                match outcome {
                    PipelineOutcome::Measurement(reading) => {
                        counters.readings += 1;
                        tracing::info!(
                            channel = %channel,
                            line = reading.source_text(),
                            rssi = reading.smoothed_strength(),
                            "Signal: {} | Smoothed Distance: {:.2}m",
                            reading.quality(),
                            reading.smoothed_distance()
                        );
                        self.readings.push(reading);
                    }
                    PipelineOutcome::Status(text) => {
                        counters.status_lines += 1;
                        tracing::info!(channel = %channel, "-> {text}");
                    }
                    PipelineOutcome::Ignored => counters.ignored += 1,
                }
            }
            SourceEvent::DecodeFailure { channel } => {
                self.counters.entry(channel).or_default().decode_failures += 1;
            }
            SourceEvent::Closed { channel } => {
                self.counters.entry(channel).or_default();
            }
        }
    }

    pub fn totals(&self) -> ChannelCounters {
        self.counters
            .values()
            .fold(ChannelCounters::default(), |mut acc, c| {
                acc += *c;
                acc
            })
    }

    pub fn distance_summary(&self) -> Option<DistanceSummary> {
        DistanceSummary::from_readings(&self.readings)
    }

    pub fn channel_distance_summary(&self, channel: &ChannelId) -> Option<DistanceSummary> {
        DistanceSummary::from_readings(self.readings.iter().filter(|r| r.channel() == channel))
    }

    /// Log the end-of-session summary.
    pub fn log_summary(&self) {
        let totals = self.totals();
        tracing::info!(
            readings = totals.readings,
            status_lines = totals.status_lines,
            ignored = totals.ignored,
            "Monitoring complete. Collected {} position data points.",
            totals.readings
        );
        if totals.decode_failures > 0 {
            tracing::warn!(
                decode_failures = totals.decode_failures,
                "dropped lines that were not valid UTF-8"
            );
        }
        for channel in self.counters.keys() {
            if let Some(summary) = self.channel_distance_summary(channel) {
                tracing::info!(
                    channel = %channel,
                    samples = summary.count,
                    "Distance stats: {summary}"
                );
            }
        }
        if let Some(summary) = self.distance_summary() {
            tracing::info!("Distance stats: {summary}");
        }
    }
}

// ─── Readers ────────────────────────────────────────────────────────────────

/// Spawn a thread feeding `lines` for `channel` through `pipeline`.
///
/// The thread ends when the source ends, fails, or the collector hangs up.
/// Unless the collector is gone, its last event is [`SourceEvent::Closed`].
pub fn spawn_reader<I>(
    channel: ChannelId,
    lines: I,
    pipeline: Arc<SharedPipeline>,
    tx: Sender<SourceEvent>,
) -> io::Result<JoinHandle<()>>
where
    I: Iterator<Item = io::Result<SourceLine>> + Send + 'static,
{
    thread::Builder::new()
        .name(format!("reader-{channel}"))
        .spawn(move || {
            for line in lines {
                let event = match line {
                    Ok(SourceLine::Text(text)) => {
                        let outcome = pipeline.process_line(&text, &channel, Utc::now());
                        if outcome == PipelineOutcome::Ignored {
                            tracing::debug!(channel = %channel, line = %text, "ignored line");
                        }
                        SourceEvent::Outcome {
                            channel: channel.clone(),
                            outcome,
                        }
                    }
                    Ok(SourceLine::Undecodable) => {
                        tracing::debug!(channel = %channel, "skipping undecodable line");
                        SourceEvent::DecodeFailure {
                            channel: channel.clone(),
                        }
                    }
                    Err(e) => {
                        tracing::warn!(channel = %channel, error = %e, "source read failed");
                        break;
                    }
                };
                if tx.send(event).is_err() {
                    return;
                }
            }
            let _ = tx.send(SourceEvent::Closed { channel });
        })
}

// ─── Session ────────────────────────────────────────────────────────────────

/// Run a session to completion and return what was collected.
pub fn run(config: &MonitorConfig, stop: &AtomicBool) -> anyhow::Result<SessionReport> {
    if config.channels.is_empty() {
        anyhow::bail!("no channels configured");
    }

    let pipeline = Arc::new(SharedPipeline::with_mode(config.smoothing));
    let (tx, rx) = crossbeam_channel::unbounded();

    let sources = open_sources(config)?;
    let mut handles = Vec::with_capacity(sources.len());
    for (channel, lines) in sources {
        let handle = spawn_reader(channel, lines, Arc::clone(&pipeline), tx.clone())
            .context("spawning reader thread")?;
        handles.push(handle);
    }
    drop(tx);

    tracing::info!(
        channels = config.channels.len(),
        smoothing = %config.smoothing,
        duration_s = config.duration.map(|d| d.as_secs()),
        "monitoring started"
    );

    let deadline = config.duration.map(|d| Instant::now() + d);
    let report = collect(&rx, config.channels.len(), deadline, stop);

    for handle in handles {
        if handle.is_finished() {
            let _ = handle.join();
        }
    }
    Ok(report)
}

/// Open every configured source; no reader starts unless all of them open.
fn open_sources(config: &MonitorConfig) -> anyhow::Result<Vec<(ChannelId, SourceLines)>> {
    config
        .channels
        .iter()
        .map(|channel| {
            let lines = source::open(&channel.source).with_context(|| {
                format!("opening {} for channel {}", channel.source, channel.id)
            })?;
            tracing::info!(channel = %channel.id, source = %channel.source, "reading channel");
            Ok((channel.id.clone(), lines))
        })
        .collect()
}

fn collect(
    rx: &Receiver<SourceEvent>,
    sources: usize,
    deadline: Option<Instant>,
    stop: &AtomicBool,
) -> SessionReport {
    let mut report = SessionReport::default();
    let mut open = sources;

    while open > 0 {
        if stop.load(Ordering::Relaxed) {
            tracing::info!("monitoring stopped by user");
            break;
        }
        let wait = match deadline {
            Some(d) => {
                let now = Instant::now();
                if now >= d {
                    break;
                }
                POLL_INTERVAL.min(d - now)
            }
            None => POLL_INTERVAL,
        };
        match rx.recv_timeout(wait) {
            Ok(event) => {
                if let SourceEvent::Closed { channel } = &event {
                    tracing::info!(channel = %channel, "source closed");
                    open -= 1;
                }
                report.record(event);
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    report
}

/// Persist readings as a pretty-printed JSON array.
pub fn write_readings(path: &Path, readings: &[Reading]) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut out = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut out, readings)
        .with_context(|| format!("writing readings to {}", path.display()))?;
    out.write_all(b"\n")?;
    out.flush()?;
    tracing::info!(path = %path.display(), count = readings.len(), "Data saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rangefix_core::Pipeline;

    fn outcomes(channel: &ChannelId, lines: &[&str]) -> Vec<SourceEvent> {
        let mut p = Pipeline::new();
        lines
            .iter()
            .map(|l| SourceEvent::Outcome {
                channel: channel.clone(),
                outcome: p.process_line(l, channel, Utc::now()),
            })
            .collect()
    }

    #[test]
    fn report_counts_and_keeps_readings() {
        let coord = ChannelId::coordinator();
        let mut report = SessionReport::default();
        for ev in outcomes(
            &coord,
            &[
                "RSSI: -50 dBm Distance: 2.00m",
                "Send Status: OK",
                "hello",
                "RSSI: -52 dBm Distance: 4.00m",
            ],
        ) {
            report.record(ev);
        }
        report.record(SourceEvent::DecodeFailure {
            channel: ChannelId::end_device(),
        });

        assert_eq!(report.readings.len(), 2);
        let c = report.counters[&coord];
        assert_eq!(
            c,
            ChannelCounters {
                readings: 2,
                status_lines: 1,
                ignored: 1,
                decode_failures: 0
            }
        );
        assert_eq!(report.totals().decode_failures, 1);

        let s = report.distance_summary().unwrap();
        assert_eq!(s.count, 2);
        assert_eq!(s.min, 2.0);
        assert_eq!(s.max, 4.0);
        assert_eq!(s.mean, 3.0);
        assert_eq!(s.to_string(), "Min=2.00m, Max=4.00m, Avg=3.00m");
        assert!(report
            .channel_distance_summary(&ChannelId::end_device())
            .is_none());
    }

    #[test]
    fn empty_summary_is_none() {
        assert!(DistanceSummary::from_readings(&Vec::<Reading>::new()).is_none());
    }

    #[test]
    fn collector_stops_on_flag() {
        let (_tx, rx) = crossbeam_channel::unbounded::<SourceEvent>();
        let stop = AtomicBool::new(true);
        let report = collect(&rx, 1, None, &stop);
        assert!(report.readings.is_empty());
    }

    #[test]
    fn collector_stops_at_deadline() {
        let (_tx, rx) = crossbeam_channel::unbounded::<SourceEvent>();
        let stop = AtomicBool::new(false);
        let started = Instant::now();
        collect(&rx, 1, Some(started + Duration::from_millis(150)), &stop);
        assert!(started.elapsed() >= Duration::from_millis(150));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn sources_open_all_or_nothing() {
        use crate::config::{ChannelConfig, SourcePath};

        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("coord.log");
        std::fs::write(&present, "RSSI: -50 dBm\n").unwrap();
        let mut config = MonitorConfig::default();
        config.channels = vec![
            ChannelConfig {
                id: ChannelId::coordinator(),
                source: SourcePath::File(present),
            },
            ChannelConfig {
                id: ChannelId::end_device(),
                source: SourcePath::File(dir.path().join("absent.log")),
            },
        ];

        let Err(err) = open_sources(&config) else {
            panic!("a missing source must fail the whole open");
        };
        assert!(format!("{err:#}").contains("enddevice"), "{err:#}");

        config.channels.truncate(1);
        let Ok(opened) = open_sources(&config) else {
            panic!("present source failed to open");
        };
        assert_eq!(opened.len(), 1);
        assert_eq!(opened[0].0, ChannelId::coordinator());
    }

    #[test]
    fn reader_thread_reports_and_closes() {
        let ch = ChannelId::coordinator();
        let pipeline = Arc::new(SharedPipeline::new());
        let (tx, rx) = crossbeam_channel::unbounded();
        let lines = vec![
            Ok(SourceLine::Text("RSSI: -47 dBm".into())),
            Ok(SourceLine::Undecodable),
            Err(io::Error::other("port vanished")),
            Ok(SourceLine::Text("RSSI: -48 dBm".into())),
        ];
        let handle = spawn_reader(ch.clone(), lines.into_iter(), pipeline, tx).unwrap();
        handle.join().unwrap();

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.len(), 3);
        assert!(matches!(
            &events[0],
            SourceEvent::Outcome { outcome: PipelineOutcome::Measurement(_), .. }
        ));
        assert_eq!(events[1], SourceEvent::DecodeFailure { channel: ch.clone() });
        assert_eq!(events[2], SourceEvent::Closed { channel: ch });
    }
}
