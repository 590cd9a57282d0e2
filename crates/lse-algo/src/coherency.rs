//! Cross-device coherency of two voltage phasors.
//!
//! Two nodes are coherent when their positive-sequence voltages agree within
//! a threshold under one of three metrics:
//! ```text
//! AngleDelta        |∠a − ∠b|            degrees
//! MagnitudeDelta    ||a| − |b||          per-unit
//! TotalVectorDelta  |a − b|              per-unit
//! ```
//! The angle metric goes through the chord between the unit phasors,
//! `Δ = 2·asin(|â − b̂| / 2)`, so 179° and −179° are 2° apart.

use lse_core::{CoherencyMethod, VoltagePhasorGroup};
use num_complex::Complex64;

/// Angle between two phasors in degrees, in `[0, 180]`.
///
/// A zero phasor has no angle and is treated as maximally distant.
pub fn angle_delta_deg(a: Complex64, b: Complex64) -> f64 {
    let (ma, mb) = (a.norm(), b.norm());
    if ma <= f64::EPSILON || mb <= f64::EPSILON {
        return 180.0;
    }
    let chord = (a / ma - b / mb).norm();
    (2.0 * (chord / 2.0).min(1.0).asin()).to_degrees()
}

pub fn magnitude_delta_pu(a: Complex64, b: Complex64) -> f64 {
    (a.norm() - b.norm()).abs()
}

pub fn total_vector_delta_pu(a: Complex64, b: Complex64) -> f64 {
    (a - b).norm()
}

/// Difference between two per-unit phasors under `method`.
pub fn delta(method: CoherencyMethod, a: Complex64, b: Complex64) -> f64 {
    match method {
        CoherencyMethod::AngleDelta => angle_delta_deg(a, b),
        CoherencyMethod::MagnitudeDelta => magnitude_delta_pu(a, b),
        CoherencyMethod::TotalVectorDelta => total_vector_delta_pu(a, b),
    }
}

pub fn is_coherent(method: CoherencyMethod, a: Complex64, b: Complex64, threshold: f64) -> bool {
    delta(method, a, b) <= threshold
}

/// Compare two voltage groups; `None` when either has no usable
/// positive-sequence value.
pub fn groups_coherent(
    from: &VoltagePhasorGroup,
    to: &VoltagePhasorGroup,
    method: CoherencyMethod,
    threshold: f64,
) -> Option<bool> {
    let a = from.positive_sequence_pu()?;
    let b = to.positive_sequence_pu()?;
    Some(is_coherent(method, a, b, threshold))
}
