use crate::config::{DATA_ENDPOINT_URL, METADATA_ENDPOINT_URL};
use crate::error::{ForecastError, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// One trading day as served by the price feed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(dead_code)]
pub struct Observation {
    pub date: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    #[serde(default)]
    pub adj_open: f64,
    #[serde(default)]
    pub adj_high: f64,
    #[serde(default)]
    pub adj_low: f64,
    #[serde(default)]
    pub adj_close: f64,
    #[serde(default)]
    pub adj_volume: f64,
    #[serde(default)]
    pub div_cash: f64,
    #[serde(default = "default_split_factor")]
    pub split_factor: f64,
}

fn default_split_factor() -> f64 {
    1.0
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceField {
    Open,
    High,
    Low,
    Close,
    AdjOpen,
    AdjHigh,
    AdjLow,
    AdjClose,
}

impl PriceField {
    pub fn of(&self, obs: &Observation) -> f64 {
        match self {
            PriceField::Open => obs.open,
            PriceField::High => obs.high,
            PriceField::Low => obs.low,
            PriceField::Close => obs.close,
            PriceField::AdjOpen => obs.adj_open,
            PriceField::AdjHigh => obs.adj_high,
            PriceField::AdjLow => obs.adj_low,
            PriceField::AdjClose => obs.adj_close,
        }
    }
}

/// Descriptive fields for a ticker, used for display only.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(dead_code)]
pub struct TickerMetadata {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    pub name: String,
    #[serde(default)]
    pub exchange_code: String,
    pub ticker: String,
}

#[derive(Clone, Debug)]
pub struct PriceHistory {
    pub observations: Vec<Observation>,
    /// Size of the raw response body.
    pub size_bytes: usize,
}

impl PriceHistory {
    pub fn parse(body: &[u8]) -> Result<Self> {
        let observations: Vec<Observation> = serde_json::from_slice(body)
            .map_err(|e| ForecastError::Network(format!("malformed price history: {}", e)))?;
        Ok(Self { observations, size_bytes: body.len() })
    }
}

pub fn format_endpoint(template: &str, ticker: &str, token: &str) -> String {
    template.replace("{ticker}", ticker).replace("{token}", token)
}

/// Client for the daily price and metadata endpoints.
///
/// Lookups return `None` on any failure; the cause is logged, never retried.
#[derive(Clone, Debug)]
pub struct TiingoClient {
    client: reqwest::Client,
    token: String,
    data_template: String,
    metadata_template: String,
}

impl TiingoClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            token: token.into(),
            data_template: DATA_ENDPOINT_URL.to_string(),
            metadata_template: METADATA_ENDPOINT_URL.to_string(),
        }
    }

    pub async fn metadata(&self, ticker: &str) -> Option<TickerMetadata> {
        let url = format_endpoint(&self.metadata_template, ticker, &self.token);
        match self.get_json::<TickerMetadata>(&url).await {
            Ok(meta) => Some(meta),
            Err(e) => {
                warn!("Metadata lookup for {} failed: {}", ticker, e);
                None
            }
        }
    }

    pub async fn history(&self, ticker: &str) -> Option<PriceHistory> {
        let url = format_endpoint(&self.data_template, ticker, &self.token);
        match self.get_bytes(&url).await.and_then(|body| PriceHistory::parse(&body)) {
            Ok(history) => Some(history),
            Err(e) => {
                warn!("History fetch for {} failed: {}", ticker, e);
                None
            }
        }
    }

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        debug!("GET {}", url.split('?').next().unwrap_or(url));
        let resp = self
            .client
            .get(url)
            .header("Content-Type", "application/json")
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.bytes().await?.to_vec())
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let body = self.get_bytes(url).await?;
        serde_json::from_slice(&body).map_err(|e| ForecastError::Network(e.to_string()))
    }
}

#[cfg(test)]
pub fn mock_series(days: usize) -> Vec<Observation> {
    use chrono::Duration;
    use rand::prelude::*;

    let mut rng = StdRng::seed_from_u64(7);
    let mut history = Vec::with_capacity(days);
    let mut current_price: f64 = 100.0;
    let start = Utc::now() - Duration::days(days as i64);

    for i in 0..days {
        let change_pct: f64 = rng.gen_range(-0.02..0.02);
        let open = current_price;
        let close = open * (1.0 + change_pct);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
        let volume = rng.gen_range(1000.0..10000.0);

        history.push(Observation {
            date: start + Duration::days(i as i64),
            open,
            high,
            low,
            close,
            volume,
            adj_open: open,
            adj_high: high,
            adj_low: low,
            adj_close: close,
            adj_volume: volume,
            div_cash: 0.0,
            split_factor: 1.0,
        });

        current_price = close;
    }

    history
}
