use thiserror::Error;

/// Numeric field of a measurement line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasurementField {
    Strength,
    Distance,
}

impl std::fmt::Display for MeasurementField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MeasurementField::Strength => write!(f, "strength"),
            MeasurementField::Distance => write!(f, "distance"),
        }
    }
}

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The line carried measurement markers but a numeric field did not
    /// parse. The whole line is discarded.
    #[error("malformed {field} field: {value:?}")]
    MalformedMeasurement {
        field: MeasurementField,
        value: String,
    },
}

impl ParseError {
    pub(crate) fn malformed(field: MeasurementField, value: &str) -> Self {
        ParseError::MalformedMeasurement {
            field,
            value: value.to_string(),
        }
    }
}
