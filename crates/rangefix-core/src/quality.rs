//! Link quality bands from smoothed signal strength.

use serde::{Deserialize, Serialize};

/// Discrete link quality, strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum QualityLabel {
    Excellent,
    Good,
    Fair,
    Poor,
    #[serde(rename = "Very Poor")]
    VeryPoor,
}

/// Lower bound (inclusive, dBm) of each band, checked top-down.
const BANDS: &[(i32, QualityLabel)] = &[
    (-30, QualityLabel::Excellent),
    (-50, QualityLabel::Good),
    (-60, QualityLabel::Fair),
    (-70, QualityLabel::Poor),
];

/// Classify a strength in dBm. Total over `i32`.
pub fn classify(strength: i32) -> QualityLabel {
    BANDS
        .iter()
        .find(|(floor, _)| strength >= *floor)
        .map_or(QualityLabel::VeryPoor, |(_, label)| *label)
}

impl QualityLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityLabel::Excellent => "Excellent",
            QualityLabel::Good => "Good",
            QualityLabel::Fair => "Fair",
            QualityLabel::Poor => "Poor",
            QualityLabel::VeryPoor => "Very Poor",
        }
    }
}

impl std::fmt::Display for QualityLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
