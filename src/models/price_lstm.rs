use crate::config::ModelConfig;
use crate::error::Result;
use candle_core::{DType, Device, Module, Tensor};
use candle_nn::{LSTMConfig, Linear, VarBuilder, VarMap, LSTM, RNN};

/// Dense -> reshape -> stacked LSTM -> dense regressor over one price window.
pub struct PriceLstm {
    input_projection: Linear,
    lstm_layers: Vec<LSTM>,
    output_projection: Linear,
    feature_width: usize,
    timesteps: usize,
}

impl PriceLstm {
    fn new(config: &ModelConfig, timesteps: usize, vb: VarBuilder) -> candle_core::Result<Self> {
        let input_projection =
            candle_nn::linear(config.window_size, config.input_neurons, vb.pp("input_projection"))?;

        let mut lstm_layers = Vec::with_capacity(config.recurrent_layer_count);
        for i in 0..config.recurrent_layer_count {
            let in_dim = if i == 0 { timesteps } else { config.recurrent_output_width };
            let cfg = LSTMConfig {
                layer_idx: i,
                ..Default::default()
            };
            lstm_layers.push(candle_nn::lstm(
                in_dim,
                config.recurrent_output_width,
                cfg,
                vb.pp(format!("lstm_{}", i)),
            )?);
        }

        let output_projection =
            candle_nn::linear(config.recurrent_output_width, 1, vb.pp("output_projection"))?;

        Ok(Self {
            input_projection,
            lstm_layers,
            output_projection,
            feature_width: config.recurrent_feature_width,
            timesteps,
        })
    }
}

impl Module for PriceLstm {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        // xs: [batch, window]
        let batch = xs.dim(0)?;
        let h = self.input_projection.forward(xs)?;
        // [batch, feature_width, timesteps]; the LSTM walks the feature_width axis.
        let mut seq = h.reshape((batch, self.feature_width, self.timesteps))?;

        let (final_layer, inner_layers) = self
            .lstm_layers
            .split_last()
            .ok_or_else(|| candle_core::Error::Msg("PriceLstm has no recurrent layers".into()))?;
        for lstm in inner_layers {
            let states = lstm.seq(&seq)?;
            seq = lstm.states_to_tensor(&states)?;
        }

        // Only the final timestep feeds the output layer.
        let states = final_layer.seq(&seq)?;
        let last_state = states
            .last()
            .ok_or_else(|| candle_core::Error::Msg("Empty LSTM sequence".into()))?;
        self.output_projection.forward(&last_state.h)
    }
}

/// Validates a [`ModelConfig`] and assembles the network it describes.
pub struct ModelBuilder<'a> {
    config: &'a ModelConfig,
}

impl<'a> ModelBuilder<'a> {
    pub fn new(config: &'a ModelConfig) -> Self {
        Self { config }
    }

    /// Builds a freshly initialised network whose variables live in `varmap`.
    ///
    /// Shape problems are reported as configuration errors before any
    /// variable is allocated.
    pub fn build(&self, varmap: &VarMap, device: &Device) -> Result<PriceLstm> {
        let timesteps = self.config.validate()?;
        let vb = VarBuilder::from_varmap(varmap, DType::F32, device);
        Ok(PriceLstm::new(self.config, timesteps, vb)?)
    }
}
