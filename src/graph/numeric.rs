//! Shared clamp/round helpers for every score in the graph (pure math).
//!
//! All signal functions finish through [`clamp01`] so that rounding and NaN
//! handling cannot drift between them.

/// Round to a fixed number of decimal places.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Clamp to `[0, 1]`, then round to 4 decimal places. `NaN` maps to 0.
pub fn clamp01(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    round_to(value.clamp(0.0, 1.0), 4)
}

/// Map a blended `[0, 1]` score onto the 0-100 risk scale, 2 decimals.
pub fn to_risk_scale(blended: f64) -> f64 {
    if blended.is_nan() {
        return 0.0;
    }
    round_to(blended.clamp(0.0, 1.0) * 100.0, 2)
}
