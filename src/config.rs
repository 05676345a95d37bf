use crate::data::PriceField;
use crate::error::{ForecastError, Result};
use candle_core::Device;
use serde::{Deserialize, Serialize};
use tracing::info;

pub fn get_device() -> Device {
    #[cfg(feature = "cuda")]
    {
        match Device::new_cuda(0) {
            Ok(device) => {
                info!("Using CUDA device 0");
                return device;
            }
            Err(e) => {
                tracing::warn!("Failed to initialize CUDA: {}. Falling back to CPU.", e);
            }
        }
    }
    info!("Using CPU device");
    Device::Cpu
}

pub const DATA_ENDPOINT_URL: &str =
    "https://api.tiingo.com/tiingo/daily/{ticker}/prices?startDate=1000-1-1&endDate=9999-1-1&token={token}";
pub const METADATA_ENDPOINT_URL: &str = "https://api.tiingo.com/tiingo/daily/{ticker}?token={token}";
pub const TOKEN_ENV_VAR: &str = "TIINGO_API_TOKEN";

pub const DEFAULT_TICKER: &str = "TSLA";
pub const MODELS_ROOT: &str = "models";

pub const WINDOW_SIZE: usize = 12;
pub const INPUT_NEURONS: usize = 100;
pub const RNN_FEATURE_WIDTH: usize = 10;
pub const RNN_LAYERS: usize = 3;
pub const RNN_OUTPUT_NEURONS: usize = 20;
pub const LEARNING_RATE: f64 = 0.0016;
pub const EPOCHS: usize = 100;
pub const BATCH_SIZE: usize = WINDOW_SIZE;
pub const NORMALIZATION_DIVISOR: f64 = 10.0;
pub const SPLIT_FRACTION: f64 = 0.8;

/// Architecture and fitting hyperparameters of one model.
///
/// Persisted next to the weights, so the divisor used for training is the one
/// every later prediction uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfig {
    pub window_size: usize,
    pub input_neurons: usize,
    pub recurrent_feature_width: usize,
    pub recurrent_layer_count: usize,
    pub recurrent_output_width: usize,
    pub learning_rate: f64,
    pub epochs: usize,
    pub batch_size: usize,
    pub normalization_divisor: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            window_size: WINDOW_SIZE,
            input_neurons: INPUT_NEURONS,
            recurrent_feature_width: RNN_FEATURE_WIDTH,
            recurrent_layer_count: RNN_LAYERS,
            recurrent_output_width: RNN_OUTPUT_NEURONS,
            learning_rate: LEARNING_RATE,
            epochs: EPOCHS,
            batch_size: BATCH_SIZE,
            normalization_divisor: NORMALIZATION_DIVISOR,
        }
    }
}

impl ModelConfig {
    /// Checks every derived shape and returns the LSTM timestep count.
    pub fn validate(&self) -> Result<usize> {
        let sizes = [
            ("windowSize", self.window_size),
            ("inputNeurons", self.input_neurons),
            ("recurrentFeatureWidth", self.recurrent_feature_width),
            ("recurrentLayerCount", self.recurrent_layer_count),
            ("recurrentOutputWidth", self.recurrent_output_width),
            ("epochs", self.epochs),
            ("batchSize", self.batch_size),
        ];
        if let Some((name, _)) = sizes.iter().find(|(_, v)| *v == 0) {
            return Err(ForecastError::Configuration(format!("{} must be non-zero", name)));
        }
        if self.input_neurons % self.recurrent_feature_width != 0 {
            return Err(ForecastError::Configuration(format!(
                "inputNeurons ({}) is not divisible by recurrentFeatureWidth ({})",
                self.input_neurons, self.recurrent_feature_width
            )));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(ForecastError::Configuration(format!(
                "learningRate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !(self.normalization_divisor.is_finite() && self.normalization_divisor > 0.0) {
            return Err(ForecastError::Configuration(format!(
                "normalizationDivisor must be positive, got {}",
                self.normalization_divisor
            )));
        }
        Ok(self.input_neurons / self.recurrent_feature_width)
    }
}

/// How the aggregate label of a window is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregateMode {
    /// Sums the first element `W` times and divides by `W`, matching models
    /// trained with the historic moving-average routine.
    Literal,
    /// Arithmetic mean over the whole window.
    Mean,
}

/// Target assigned to each supervised window. Chosen once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LabelStrategy {
    /// Price of the observation right after the window.
    NextValue,
    /// Aggregate attached to the window when it was built.
    WindowAggregate(AggregateMode),
}

impl LabelStrategy {
    pub fn aggregate_mode(&self) -> Option<AggregateMode> {
        match self {
            LabelStrategy::NextValue => None,
            LabelStrategy::WindowAggregate(mode) => Some(*mode),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub model: ModelConfig,
    pub split_fraction: f64,
    pub price_field: PriceField,
    pub labelling: LabelStrategy,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            split_fraction: SPLIT_FRACTION,
            price_field: PriceField::AdjClose,
            labelling: LabelStrategy::NextValue,
        }
    }
}

/// Reads the API token from the environment.
pub fn api_token() -> Result<String> {
    token_from(std::env::var(TOKEN_ENV_VAR).ok())
}

fn token_from(value: Option<String>) -> Result<String> {
    match value.map(|v| v.trim().to_string()) {
        Some(token) if !token.is_empty() => Ok(token),
        _ => Err(ForecastError::Configuration(format!(
            "{} is not set; the price feed rejects unauthenticated requests",
            TOKEN_ENV_VAR
        ))),
    }
}
