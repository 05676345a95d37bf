use crate::error::{ForecastError, Result};
use crate::normalize::Normalizer;
use candle_core::{Device, Module, Tensor};

/// Runs a model on raw price rows and returns prices on the original scale.
pub struct Predictor<'a, M: Module> {
    model: &'a M,
    normalizer: Normalizer,
    width: usize,
    device: Device,
}

impl<'a, M: Module> Predictor<'a, M> {
    pub fn new(model: &'a M, divisor: f64, width: usize) -> Result<Self> {
        Ok(Self {
            model,
            normalizer: Normalizer::new(divisor)?,
            width,
            device: Device::Cpu,
        })
    }

    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    /// One denormalized prediction per input row.
    pub fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(row) = rows.iter().find(|r| r.len() != self.width) {
            return Err(ForecastError::Configuration(format!(
                "prediction row width {} does not match window size {}",
                row.len(),
                self.width
            )));
        }
        let xs = Tensor::from_vec(self.normalizer.normalize_rows(rows), (rows.len(), self.width), &self.device)?;
        let out = self.model.forward(&xs)?.flatten_all()?.to_vec1::<f32>()?;
        Ok(out.into_iter().map(|v| self.normalizer.denormalize(v as f64)).collect())
    }
}

/// Error of a model on the holdout segment, in price units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoldoutReport {
    pub rows: usize,
    pub mse: f64,
    pub mae: f64,
}

pub fn evaluate<M: Module>(
    predictor: &Predictor<'_, M>,
    features: &[Vec<f64>],
    targets: &[f64],
) -> Result<Option<HoldoutReport>> {
    if features.is_empty() {
        return Ok(None);
    }
    if features.len() != targets.len() {
        return Err(ForecastError::Data(format!(
            "{} holdout rows but {} targets",
            features.len(),
            targets.len()
        )));
    }
    let predictions = predictor.predict(features)?;
    let n = predictions.len() as f64;
    let (se, ae) = predictions
        .iter()
        .zip(targets)
        .fold((0.0, 0.0), |(se, ae), (p, t)| (se + (p - t).powi(2), ae + (p - t).abs()));
    Ok(Some(HoldoutReport {
        rows: predictions.len(),
        mse: se / n,
        mae: ae / n,
    }))
}
