use crate::config::RunConfig;
use crate::data::Observation;
use crate::dataset;
use crate::error::{ForecastError, Result};
use crate::features::FeatureExtractor;
use crate::inference::{self, HoldoutReport};
use crate::progress::ProgressObserver;
use crate::train::{TrainedModel, Trainer, TrainingReport};
use crate::window::create_windows;
use candle_core::Device;
use tracing::info;

/// Output of the fitting half of the pipeline; the forecast itself is made
/// later with [`predict_next`].
pub struct TrainedRun {
    pub training: TrainingReport,
    pub holdout: Option<HoldoutReport>,
    /// Feature row of the most recent window, never used for training.
    pub forecast_row: Vec<f64>,
}

/// Window, split, extract, train and evaluate `observations`.
pub fn train(
    observations: &[Observation],
    config: &RunConfig,
    device: Device,
    observer: &mut dyn ProgressObserver,
) -> Result<TrainedRun> {
    let window_size = config.model.window_size;
    let aggregate_with = config.labelling.aggregate_mode().map(|mode| (config.price_field, mode));
    let windows = create_windows(observations, window_size, aggregate_with);
    if windows.is_empty() {
        return Err(ForecastError::Data(format!(
            "{} observations are not enough for a window of {}",
            observations.len(),
            window_size
        )));
    }

    let (train, test) = dataset::split(&windows, config.split_fraction)?;
    info!("{} windows: {} train, {} holdout", windows.len(), train.len(), test.len());

    let extractor = FeatureExtractor::new(config.price_field, config.labelling);
    let train_set = extractor.pairs(train)?;
    let test_set = extractor.pairs(test)?;
    let forecast_row = extractor
        .forecast_row(&windows)
        .ok_or_else(|| ForecastError::Data("no window left to forecast from".into()))?;

    let training = Trainer::new(config.model.clone(), device).fit(&train_set.features, &train_set.targets, observer)?;

    let predictor = training.model.predictor()?;
    let holdout = inference::evaluate(&predictor, &test_set.features, &test_set.targets)?;

    Ok(TrainedRun {
        training,
        holdout,
        forecast_row,
    })
}

/// Next-period price for `row`, on the original scale.
pub fn predict_next(model: &TrainedModel, row: &[f64]) -> Result<f64> {
    model
        .predictor()?
        .predict(&[row.to_vec()])?
        .first()
        .copied()
        .ok_or_else(|| ForecastError::Data("model returned no prediction".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AggregateMode, LabelStrategy, ModelConfig};
    use crate::data::{mock_series, PriceField};
    use crate::progress::NoopObserver;

    fn small_run() -> RunConfig {
        RunConfig {
            model: ModelConfig {
                window_size: 5,
                input_neurons: 6,
                recurrent_feature_width: 2,
                recurrent_layer_count: 2,
                recurrent_output_width: 4,
                epochs: 2,
                batch_size: 4,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn tail(data: &[Observation], size: usize, field: PriceField) -> Vec<f64> {
        data[data.len() - size..].iter().map(|o| field.of(o)).collect()
    }

    #[test]
    fn test_empty_series_is_data_error() {
        let res = train(&[], &small_run(), Device::Cpu, &mut NoopObserver);
        assert!(matches!(res, Err(ForecastError::Data(_))));
    }

    #[test]
    fn test_single_window_is_data_error() {
        let res = train(&mock_series(5), &small_run(), Device::Cpu, &mut NoopObserver);
        assert!(matches!(res, Err(ForecastError::Data(_))));
    }

    #[test]
    fn test_end_to_end_forecast() {
        let data = mock_series(40);
        let run = train(&data, &small_run(), Device::Cpu, &mut NoopObserver).unwrap();
        assert_eq!(run.training.loss_history.len(), 2);
        // 36 windows -> 28 train (27 pairs), 8 holdout (7 pairs).
        assert_eq!(run.holdout.unwrap().rows, 7);

        // Forecast input is the last window of the whole series, not of the train segment.
        assert_eq!(run.forecast_row, tail(&data, 5, PriceField::AdjClose));

        let prediction = predict_next(&run.training.model, &run.forecast_row).unwrap();
        assert!(prediction.is_finite());
    }

    #[test]
    fn test_full_split_skips_holdout() {
        let data = mock_series(20);
        let config = RunConfig {
            split_fraction: 1.0,
            labelling: LabelStrategy::WindowAggregate(AggregateMode::Literal),
            price_field: PriceField::Close,
            ..small_run()
        };
        let run = train(&data, &config, Device::Cpu, &mut NoopObserver).unwrap();
        assert!(run.holdout.is_none());
        assert_eq!(run.forecast_row, tail(&data, 5, PriceField::Close));
        assert!(predict_next(&run.training.model, &run.forecast_row).unwrap().is_finite());
    }

    #[test]
    fn test_predict_next_rejects_wrong_width() {
        let run = train(&mock_series(20), &small_run(), Device::Cpu, &mut NoopObserver).unwrap();
        let res = predict_next(&run.training.model, &[1.0, 2.0]);
        assert!(matches!(res, Err(ForecastError::Configuration(_))));
    }
}
