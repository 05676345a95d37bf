use crate::error::{ForecastError, Result};
use tracing::warn;

/// Static rescale by a fixed divisor.
///
/// Not data adaptive: instruments priced far from the divisor end up with
/// very small or very large normalized values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalizer {
    divisor: f64,
}

impl Normalizer {
    pub fn new(divisor: f64) -> Result<Self> {
        if !(divisor.is_finite() && divisor > 0.0) {
            return Err(ForecastError::Configuration(format!(
                "normalization divisor must be positive and finite, got {}",
                divisor
            )));
        }
        Ok(Self { divisor })
    }

    pub fn normalize(&self, x: f64) -> f64 {
        x / self.divisor
    }

    pub fn denormalize(&self, x: f64) -> f64 {
        x * self.divisor
    }

    /// Flattens rows into a normalized `f32` buffer ready for a tensor.
    pub fn normalize_rows(&self, rows: &[Vec<f64>]) -> Vec<f32> {
        rows.iter()
            .flat_map(|row| row.iter().map(|&v| self.normalize(v) as f32))
            .collect()
    }

    pub fn normalize_values(&self, values: &[f64]) -> Vec<f32> {
        values.iter().map(|&v| self.normalize(v) as f32).collect()
    }

    /// Logs a warning when `reference` lands outside a comfortable range
    /// after scaling.
    pub fn check_scale(&self, reference: f64) -> bool {
        let scaled = self.normalize(reference).abs();
        let ok = (0.01..=1000.0).contains(&scaled);
        if !ok {
            warn!(
                "Price {:.4} scales to {:.6} with divisor {}; forecasts may be poor for this price level",
                reference, scaled, self.divisor
            );
        }
        ok
    }
}
