use crate::config::ModelConfig;
use crate::error::{ForecastError, Result};
use crate::inference::Predictor;
use crate::models::price_lstm::{ModelBuilder, PriceLstm};
use crate::normalize::Normalizer;
use crate::progress::{ProgressObserver, TrainingProgress};
use candle_core::{Device, Module, Tensor};
use candle_nn::{AdamW, Optimizer, ParamsAdamW, VarMap};
use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// A fitted network together with the configuration it was trained under.
pub struct TrainedModel {
    pub(crate) varmap: VarMap,
    pub(crate) network: PriceLstm,
    pub(crate) config: ModelConfig,
    pub(crate) device: Device,
}

impl TrainedModel {
    #[cfg(test)]
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Predictor bound to this model's own normalization divisor.
    pub fn predictor(&self) -> Result<Predictor<'_, PriceLstm>> {
        Ok(Predictor::new(&self.network, self.config.normalization_divisor, self.config.window_size)?
            .with_device(self.device.clone()))
    }
}

pub struct TrainingReport {
    pub model: TrainedModel,
    /// Mean loss per epoch, on the normalized scale.
    pub loss_history: Vec<f64>,
    pub elapsed: Duration,
}

pub struct Trainer {
    config: ModelConfig,
    device: Device,
}

impl Trainer {
    pub fn new(config: ModelConfig, device: Device) -> Self {
        Self { config, device }
    }

    /// Fits a new model on raw (un-normalized) rows and targets.
    ///
    /// Batches are visited in array order on every epoch.
    pub fn fit(
        &self,
        features: &[Vec<f64>],
        targets: &[f64],
        observer: &mut dyn ProgressObserver,
    ) -> Result<TrainingReport> {
        let config = &self.config;
        config.validate()?;
        if features.is_empty() {
            return Err(ForecastError::Data("no training rows available".into()));
        }
        if features.len() != targets.len() {
            return Err(ForecastError::Data(format!(
                "{} feature rows but {} targets",
                features.len(),
                targets.len()
            )));
        }
        if let Some(row) = features.iter().find(|r| r.len() != config.window_size) {
            return Err(ForecastError::Configuration(format!(
                "feature row width {} does not match window size {}",
                row.len(),
                config.window_size
            )));
        }

        let normalizer = Normalizer::new(config.normalization_divisor)?;
        if let Some(&last) = targets.last() {
            normalizer.check_scale(last);
        }

        let rows = features.len();
        let xs = Tensor::from_vec(normalizer.normalize_rows(features), (rows, config.window_size), &self.device)?; // [Rows, Window]
        let ys = Tensor::from_vec(normalizer.normalize_values(targets), (rows, 1), &self.device)?; // [Rows, 1]

        let varmap = VarMap::new();
        let network = ModelBuilder::new(config).build(&varmap, &self.device)?;
        let params = ParamsAdamW {
            lr: config.learning_rate,
            weight_decay: 0.0,
            ..Default::default()
        };
        let mut opt = AdamW::new(varmap.all_vars(), params)?;

        let batches = rows.div_ceil(config.batch_size);
        let mut loss_history = Vec::with_capacity(config.epochs);
        info!(
            "Training on {} rows: {} epochs x {} batches of {}",
            rows, config.epochs, batches, config.batch_size
        );

        let started = Instant::now();
        for epoch in 0..config.epochs {
            let mut progress = TrainingProgress {
                epoch: epoch + 1,
                epochs: config.epochs,
                batch: 1,
                batches,
            };
            notify("on_epoch_begin", || observer.on_epoch_begin(&progress));

            let mut total_loss = 0.0;
            for (batch_idx, range) in batch_ranges(rows, config.batch_size).enumerate() {
                progress.batch = batch_idx + 1;
                notify("on_batch_begin", || observer.on_batch_begin(&progress));

                let len = range.len();
                let x = xs.narrow(0, range.start, len)?; // [Batch, Window]
                let y = ys.narrow(0, range.start, len)?; // [Batch, 1]

                let pred = network.forward(&x)?; // [Batch, 1]
                let loss = candle_nn::loss::mse(&pred, &y)?;
                opt.backward_step(&loss)?;
                total_loss += loss.to_scalar::<f32>()? as f64 * len as f64;
            }

            let epoch_loss = total_loss / rows as f64;
            loss_history.push(epoch_loss);
            notify("on_epoch_end", || observer.on_epoch_end(&progress, epoch_loss));
        }
        let elapsed = started.elapsed();
        info!("Training finished in {:.2?}", elapsed);

        Ok(TrainingReport {
            model: TrainedModel {
                varmap,
                network,
                config: config.clone(),
                device: self.device.clone(),
            },
            loss_history,
            elapsed,
        })
    }
}

/// Consecutive row ranges of at most `batch_size`, in array order. The last
/// range may be shorter.
pub fn batch_ranges(rows: usize, batch_size: usize) -> impl Iterator<Item = Range<usize>> {
    (0..rows)
        .step_by(batch_size.max(1))
        .map(move |start| start..(start + batch_size.max(1)).min(rows))
}

/// Runs an observer callback, swallowing both errors and panics.
fn notify<F>(hook: &str, f: F)
where
    F: FnOnce() -> anyhow::Result<()>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Progress observer {} failed: {}", hook, e),
        Err(_) => warn!("Progress observer {} panicked", hook),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoopObserver;

    fn tiny_config() -> ModelConfig {
        ModelConfig {
            window_size: 4,
            input_neurons: 4,
            recurrent_feature_width: 2,
            recurrent_layer_count: 1,
            recurrent_output_width: 3,
            learning_rate: 0.01,
            epochs: 3,
            batch_size: 3,
            normalization_divisor: 10.0,
        }
    }

    fn synthetic(rows: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
        let series: Vec<f64> = (0..rows + 4).map(|i| 20.0 + (i as f64 * 0.3).sin()).collect();
        let features = (0..rows).map(|i| series[i..i + 4].to_vec()).collect();
        let targets = (0..rows).map(|i| series[i + 4]).collect();
        (features, targets)
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl ProgressObserver for Recorder {
        fn on_epoch_begin(&mut self, p: &TrainingProgress) -> anyhow::Result<()> {
            self.events.push(format!("begin {}", p.epoch));
            Ok(())
        }

        fn on_batch_begin(&mut self, p: &TrainingProgress) -> anyhow::Result<()> {
            self.events.push(format!("batch {}.{}/{}", p.epoch, p.batch, p.batches));
            Ok(())
        }

        fn on_epoch_end(&mut self, p: &TrainingProgress, loss: f64) -> anyhow::Result<()> {
            assert!(loss.is_finite());
            self.events.push(format!("end {}", p.epoch));
            Ok(())
        }
    }

    struct Faulty;

    impl ProgressObserver for Faulty {
        fn on_batch_begin(&mut self, _p: &TrainingProgress) -> anyhow::Result<()> {
            panic!("observer blew up");
        }

        fn on_epoch_end(&mut self, _p: &TrainingProgress, _loss: f64) -> anyhow::Result<()> {
            Err(anyhow::anyhow!("cannot render"))
        }
    }

    #[test]
    fn test_fit_reports_history_and_progress() {
        let (features, targets) = synthetic(7);
        let trainer = Trainer::new(tiny_config(), Device::Cpu);
        let mut recorder = Recorder::default();
        let report = trainer.fit(&features, &targets, &mut recorder).unwrap();

        assert_eq!(report.loss_history.len(), 3);
        assert!(report.loss_history.iter().all(|l| l.is_finite()));
        assert_eq!(report.model.config().normalization_divisor, 10.0);

        // 7 rows in batches of 3 -> 3 batches per epoch, in order.
        let expected: Vec<String> = (1..=3)
            .flat_map(|e| {
                let mut v = vec![format!("begin {}", e)];
                v.extend((1..=3).map(|b| format!("batch {}.{}/3", e, b)));
                v.push(format!("end {}", e));
                v
            })
            .collect();
        assert_eq!(recorder.events, expected);
    }

    #[test]
    fn test_batch_ranges_follow_array_order() {
        let first: Vec<Range<usize>> = batch_ranges(7, 3).collect();
        assert_eq!(first, vec![0..3, 3..6, 6..7]);
        // Identical on every epoch: nothing is shuffled between passes.
        for _ in 0..3 {
            assert_eq!(batch_ranges(7, 3).collect::<Vec<_>>(), first);
        }

        assert_eq!(batch_ranges(6, 3).collect::<Vec<_>>(), vec![0..3, 3..6]);
        assert_eq!(batch_ranges(2, 12).collect::<Vec<_>>(), vec![0..2]);
        assert_eq!(batch_ranges(0, 3).count(), 0);

        let covered: Vec<usize> = batch_ranges(25, 4).flatten().collect();
        assert_eq!(covered, (0..25).collect::<Vec<_>>());
    }

    #[test]
    fn test_faulty_observer_does_not_interrupt() {
        let (features, targets) = synthetic(5);
        let trainer = Trainer::new(tiny_config(), Device::Cpu);
        let report = trainer.fit(&features, &targets, &mut Faulty).unwrap();
        assert_eq!(report.loss_history.len(), 3);
    }

    #[test]
    fn test_empty_rows_is_data_error() {
        let trainer = Trainer::new(tiny_config(), Device::Cpu);
        let res = trainer.fit(&[], &[], &mut NoopObserver);
        assert!(matches!(res, Err(ForecastError::Data(_))));
    }

    #[test]
    fn test_mismatched_targets_is_data_error() {
        let (features, _) = synthetic(4);
        let trainer = Trainer::new(tiny_config(), Device::Cpu);
        let res = trainer.fit(&features, &[1.0], &mut NoopObserver);
        assert!(matches!(res, Err(ForecastError::Data(_))));
    }

    #[test]
    fn test_wrong_width_is_configuration_error() {
        let trainer = Trainer::new(tiny_config(), Device::Cpu);
        let res = trainer.fit(&[vec![1.0, 2.0, 3.0]], &[4.0], &mut NoopObserver);
        assert!(matches!(res, Err(ForecastError::Configuration(_))));
    }

    #[test]
    fn test_trained_model_predicts() {
        let (features, targets) = synthetic(6);
        let trainer = Trainer::new(tiny_config(), Device::Cpu);
        let report = trainer.fit(&features, &targets, &mut NoopObserver).unwrap();
        let predictor = report.model.predictor().unwrap();
        let out = predictor.predict(&features[..2]).unwrap();
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|v| v.is_finite()));
        // Stateless across calls.
        assert_eq!(out, predictor.predict(&features[..2]).unwrap());
    }
}
