//! EMA (Exponential Moving Average) math

use crate::models::signal::CrossoverKind;

/// Smoothing factor `2 / (period + 1)`
pub fn smoothing_factor(period: usize) -> f64 {
    2.0 / (period as f64 + 1.0)
}

/// Simple average used to seed an EMA
pub fn sma(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Advance an EMA by one sample
pub fn ema_from_previous(value: f64, previous: f64, period: usize) -> f64 {
    let alpha = smoothing_factor(period);
    alpha * value + (1.0 - alpha) * previous
}

/// Calculate the EMA of a full series: SMA over the first `period` values,
/// then exponential steps over the rest.
pub fn calculate_ema(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }

    let seed = sma(&values[..period])?;
    Some(
        values[period..]
            .iter()
            .fold(seed, |ema, &value| ema_from_previous(value, ema, period)),
    )
}

/// Check whether fast/slow EMAs crossed between two consecutive samples.
///
/// A golden cross requires the fast line to move from at-or-below to
/// strictly above; a death cross from at-or-above to strictly below.
pub fn check_ema_cross(
    previous_fast: f64,
    previous_slow: f64,
    fast: f64,
    slow: f64,
) -> Option<CrossoverKind> {
    if previous_fast >= previous_slow && fast < slow {
        Some(CrossoverKind::Death)
    } else if previous_fast <= previous_slow && fast > slow {
        Some(CrossoverKind::Golden)
    } else {
        None
    }
}

/// Relative distance of the fast line over the slow line
pub fn separation(fast: f64, slow: f64) -> f64 {
    if slow == 0.0 {
        return 0.0;
    }
    (fast - slow) / slow
}
