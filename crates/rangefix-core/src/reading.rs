//! The measurement record emitted for every accepted line.
//!
//! Serialised field names follow the legacy measurement log so existing
//! consumers keep working:
//!
//! | field               | key            |
//! |---------------------|----------------|
//! | `timestamp`         | `timestamp`    |
//! | `channel`           | `device`       |
//! | `smoothed_strength` | `rssi`         |
//! | `raw_strength`      | `raw_rssi`     |
//! | `smoothed_distance` | `distance`     |
//! | `raw_distance`      | `raw_distance` |
//! | `quality`           | `quality`      |
//! | `source_text`       | `raw_data`     |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::channel::ChannelId;
use crate::quality::QualityLabel;

/// One processed measurement. Fields are read-only once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    timestamp: DateTime<Utc>,
    #[serde(rename = "device")]
    channel: ChannelId,
    #[serde(rename = "rssi")]
    smoothed_strength: i32,
    #[serde(rename = "raw_rssi")]
    raw_strength: i32,
    #[serde(rename = "distance")]
    smoothed_distance: f64,
    raw_distance: f64,
    quality: QualityLabel,
    #[serde(rename = "raw_data")]
    source_text: String,
}

/// Values the pipeline computed for one line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    pub raw_strength: i32,
    pub smoothed_strength: i32,
    pub raw_distance: f64,
    pub smoothed_distance: f64,
    pub quality: QualityLabel,
}

impl Reading {
    pub fn new(
        timestamp: DateTime<Utc>,
        channel: ChannelId,
        estimate: Estimate,
        source_text: impl Into<String>,
    ) -> Self {
        Reading {
            timestamp,
            channel,
            smoothed_strength: estimate.smoothed_strength,
            raw_strength: estimate.raw_strength,
            smoothed_distance: estimate.smoothed_distance,
            raw_distance: estimate.raw_distance,
            quality: estimate.quality,
            source_text: source_text.into(),
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }

    pub fn raw_strength(&self) -> i32 {
        self.raw_strength
    }

    pub fn smoothed_strength(&self) -> i32 {
        self.smoothed_strength
    }

    pub fn raw_distance(&self) -> f64 {
        self.raw_distance
    }

    pub fn smoothed_distance(&self) -> f64 {
        self.smoothed_distance
    }

    pub fn quality(&self) -> QualityLabel {
        self.quality
    }

    pub fn source_text(&self) -> &str {
        &self.source_text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> Reading {
        Reading::new(
            Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap(),
            ChannelId::coordinator(),
            Estimate {
                raw_strength: -58,
                smoothed_strength: -55,
                raw_distance: 3.2,
                smoothed_distance: 3.05,
                quality: QualityLabel::Fair,
            },
            "RSSI: -58 dBm Distance: 3.20m",
        )
    }

    #[test]
    fn serializes_with_legacy_keys() {
        let v = serde_json::to_value(sample()).unwrap();
        assert_eq!(v["timestamp"], "2026-03-14T09:26:53Z");
        assert_eq!(v["device"], "coordinator");
        assert_eq!(v["rssi"], -55);
        assert_eq!(v["raw_rssi"], -58);
        assert_eq!(v["distance"], 3.05);
        assert_eq!(v["raw_distance"], 3.2);
        assert_eq!(v["quality"], "Fair");
        assert_eq!(v["raw_data"], "RSSI: -58 dBm Distance: 3.20m");
        assert_eq!(v.as_object().unwrap().len(), 8);
    }

    #[test]
    fn reads_back_from_log() {
        let json = serde_json::to_string(&sample()).unwrap();
        let back: Reading = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sample());
    }
}
