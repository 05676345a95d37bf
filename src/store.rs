use crate::config::ModelConfig;
use crate::error::Result;
use crate::models::price_lstm::ModelBuilder;
use crate::train::TrainedModel;
use candle_core::Device;
use candle_nn::VarMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

const WEIGHTS_FILE: &str = "weights.safetensors";
const CONFIG_FILE: &str = "config.json";

/// `<ticker-lowercase>_<unix-epoch-ms>`
pub fn model_dir_name(ticker: &str, epoch_ms: i64) -> String {
    format!("{}_{}", ticker.to_lowercase(), epoch_ms)
}

/// Saves and restores trained models under a root directory.
pub struct ModelStore {
    root: PathBuf,
}

impl ModelStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Writes weights and config to a fresh directory and returns its path.
    pub fn save(&self, model: &TrainedModel, ticker: &str, epoch_ms: i64) -> Result<PathBuf> {
        let dir = self.root.join(model_dir_name(ticker, epoch_ms));
        fs::create_dir_all(&dir)?;
        model.varmap.save(dir.join(WEIGHTS_FILE))?;
        fs::write(dir.join(CONFIG_FILE), serde_json::to_vec_pretty(&model.config)?)?;
        info!("Saved model to {}", dir.display());
        Ok(dir)
    }

    #[allow(dead_code)]
    pub fn load(dir: &Path, device: &Device) -> Result<TrainedModel> {
        let config: ModelConfig = serde_json::from_slice(&fs::read(dir.join(CONFIG_FILE))?)?;
        let mut varmap = VarMap::new();
        let network = ModelBuilder::new(&config).build(&varmap, device)?;
        varmap.load(dir.join(WEIGHTS_FILE))?;
        Ok(TrainedModel {
            varmap,
            network,
            config,
            device: device.clone(),
        })
    }
}
