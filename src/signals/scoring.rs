//! Score normalization and confidence calculation

/// Normalize a value to the 0..1 range, clamped
pub fn normalize_score(value: f64, min: f64, max: f64) -> f64 {
    if max == min {
        return 0.0;
    }
    ((value - min) / (max - min)).clamp(0.0, 1.0)
}

/// Confidence proportional to EMA separation
///
/// A separation of `scale` (relative, e.g. 0.02 = 2%) or more maps to 1.0.
pub fn separation_confidence(separation: f64, scale: f64) -> f64 {
    normalize_score(separation.abs(), 0.0, scale)
}

/// Confidence of a golden cross from trend strength
///
/// Starts at `base` for a bare crossover and climbs towards 1.0 as the short
/// EMA pulls away from the long EMA.
pub fn trend_confidence(separation: f64, base: f64, scale: f64) -> f64 {
    let strength = separation_confidence(separation.max(0.0), scale);
    (base + (1.0 - base) * strength).clamp(0.0, 1.0)
}
