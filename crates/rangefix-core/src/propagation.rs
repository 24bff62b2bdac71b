//! # Propagation Model
//!
//! Log-distance path loss, used when a line carries RSSI but no distance:
//!
//! $$d = 10^{(T_x - \text{RSSI} - A) / (10 \cdot n)}$$
//!
//! The calibration constants are fixed for the ESP32 deployment and the
//! result is clamped to the usable ESP-NOW range.

/// Transmit power in dBm.
pub const TX_POWER_DBM: f64 = 0.0;
/// Received strength at the 1 m reference distance, in dBm.
pub const REFERENCE_STRENGTH_DBM: f64 = -40.0;
/// Indoor path loss exponent (2.0 is free space).
pub const PATH_LOSS_EXPONENT: f64 = 2.5;

/// Lower clamp of an estimate, metres.
pub const MIN_DISTANCE_M: f64 = 0.1;
/// Upper clamp of an estimate, metres.
pub const MAX_DISTANCE_M: f64 = 100.0;

/// Estimate distance in metres from a strength in dBm.
///
/// A strength of exactly 0 is the firmware's "no reading" value and maps to
/// `0.0` without going through the model. Every other input lands in
/// `[MIN_DISTANCE_M, MAX_DISTANCE_M]`, rounded to centimetres.
pub fn estimate_distance(strength: i32) -> f64 {
    if strength == 0 {
        return 0.0;
    }

    let exponent = (TX_POWER_DBM - f64::from(strength) - REFERENCE_STRENGTH_DBM)
        / (10.0 * PATH_LOSS_EXPONENT);
    let distance = 10f64
        .powf(exponent)
        .clamp(MIN_DISTANCE_M, MAX_DISTANCE_M);

    round_centi(distance)
}

fn round_centi(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
