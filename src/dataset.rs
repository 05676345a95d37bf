use crate::error::{ForecastError, Result};

/// Chronological split: the first `floor(len * fraction)` items train, the
/// rest are held out. No shuffling.
pub fn split<T>(data: &[T], fraction: f64) -> Result<(&[T], &[T])> {
    if !(fraction.is_finite() && fraction > 0.0 && fraction <= 1.0) {
        return Err(ForecastError::Configuration(format!(
            "split fraction must be in (0, 1], got {}",
            fraction
        )));
    }
    let first = ((data.len() as f64 * fraction).floor() as usize).min(data.len());
    Ok(data.split_at(first))
}
