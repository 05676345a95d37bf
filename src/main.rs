mod config;
mod data;
mod dataset;
mod error;
mod features;
mod inference;
mod models;
mod normalize;
mod pipeline;
mod progress;
mod store;
mod train;
mod window;

use chrono::{Duration, Utc};
use clap::Parser;
use config::{RunConfig, DEFAULT_TICKER, MODELS_ROOT};
use data::TiingoClient;
use progress::LogObserver;
use store::ModelStore;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Forecast the next closing price of a stock with an LSTM regressor",
    after_help = "The API token is read from the TIINGO_API_TOKEN environment variable.

EXAMPLES:
    cargo run --release
    cargo run --release -- AAPL"
)]
struct Args {
    /// Ticker symbol to forecast
    #[arg(default_value = DEFAULT_TICKER)]
    ticker: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let token = match config::api_token() {
        Ok(token) => token,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };
    let client = TiingoClient::new(token);
    info!("Fetching data for {}", args.ticker);

    let Some(company) = client.metadata(&args.ticker).await else {
        error!("The ticker {} is invalid", args.ticker);
        std::process::exit(1);
    };

    let Some(history) = client.history(&company.ticker).await else {
        error!("Could not fetch price history for {}", company.ticker);
        std::process::exit(1);
    };
    info!(
        "Fetched {} entries ({:.2} KB) for {} ({})",
        history.observations.len(),
        history.size_bytes as f64 / 1024.0,
        company.ticker,
        company.name
    );

    let run_config = RunConfig::default();
    let device = config::get_device();
    let run = pipeline::train(&history.observations, &run_config, device, &mut LogObserver)?;
    if let Some(loss) = run.training.loss_history.last() {
        info!(
            "Trained {} epochs in {:.2?}, final loss = {:.6}",
            run.training.loss_history.len(),
            run.training.elapsed,
            loss
        );
    }
    match &run.holdout {
        Some(h) => info!("Holdout over {} rows: MSE = {:.4}, MAE = {:.4}", h.rows, h.mse, h.mae),
        None => info!("No holdout rows; skipped evaluation"),
    }

    let store = ModelStore::new(MODELS_ROOT);
    store.save(&run.training.model, &company.ticker, Utc::now().timestamp_millis())?;

    let prediction = pipeline::predict_next(&run.training.model, &run.forecast_row)?;

    let tomorrow = history
        .observations
        .last()
        .map(|o| (o.date + Duration::days(1)).format("%Y-%m-%d").to_string())
        .unwrap_or_default();
    info!(
        "The price of {} for {} EOD is estimated at ${:.2}",
        company.ticker, tomorrow, prediction
    );

    Ok(())
}
