//! Community pooling: geometric mean of odds.
//!
//! Each contributor's percentage is clamped away from 0 and 100, then the
//! pooled value is `100 * G(p) / (G(p) + G(1 - p))` where `G` is the
//! geometric mean across contributors. Every current vote counts equally.

/// Result for an empty contributor set. A policy choice (no information,
/// so even odds), not a value derived from data.
pub const NO_INFORMATION_PRIOR: f64 = 50.0;

/// Lower clamp bound, in percent. Keeps `ln(p)` finite.
pub const CLAMP_MIN: f64 = 0.01;

/// Upper clamp bound, in percent. Keeps `ln(1 - p)` finite.
pub const CLAMP_MAX: f64 = 99.99;

/// Pool percentages in [0, 100] into one community percentage.
///
/// Never fails. Out-of-range values are clamped rather than rejected, and a
/// NaN contributes as an even-odds vote so the result stays finite. The result
/// depends only on the multiset of inputs: they are sorted before summing, so
/// any permutation produces a bit-identical value.
pub fn pool_probabilities(probabilities: &[f64]) -> f64 {
    if probabilities.is_empty() {
        return NO_INFORMATION_PRIOR;
    }

    let mut fractions: Vec<f64> = probabilities
        .iter()
        .map(|&p| clamp_percent(p) / 100.0)
        .collect();
    fractions.sort_by(f64::total_cmp);

    let n = fractions.len() as f64;
    let mean_ln_p = fractions.iter().map(|p| p.ln()).sum::<f64>() / n;
    let mean_ln_1_minus_p = fractions.iter().map(|p| (1.0 - p).ln()).sum::<f64>() / n;

    let num = mean_ln_p.exp();
    let den = num + mean_ln_1_minus_p.exp();

    100.0 * num / den
}

/// `max(0.01, min(99.99, p))`, with NaN mapped to even odds.
pub fn clamp_percent(p: f64) -> f64 {
    if p.is_nan() {
        return NO_INFORMATION_PRIOR;
    }
    p.clamp(CLAMP_MIN, CLAMP_MAX)
}
