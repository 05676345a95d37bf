use thiserror::Error;

/// Errors raised by the forecasting pipeline.
#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("network error: {0}")]
    Network(String),

    #[error("data error: {0}")]
    Data(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("model error: {0}")]
    Model(#[from] candle_core::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<reqwest::Error> for ForecastError {
    fn from(e: reqwest::Error) -> Self {
        ForecastError::Network(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ForecastError>;
