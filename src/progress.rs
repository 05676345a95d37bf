use tracing::{debug, info};

/// Position of the fitting loop when a notification is sent. Counters are
/// 1-based.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrainingProgress {
    pub epoch: usize,
    pub epochs: usize,
    pub batch: usize,
    pub batches: usize,
}

/// Receives training notifications for display purposes.
///
/// Returned errors and panics are logged by the trainer and otherwise
/// ignored.
pub trait ProgressObserver {
    fn on_epoch_begin(&mut self, _progress: &TrainingProgress) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_batch_begin(&mut self, _progress: &TrainingProgress) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_epoch_end(&mut self, _progress: &TrainingProgress, _loss: f64) -> anyhow::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
pub struct NoopObserver;

#[cfg(test)]
impl ProgressObserver for NoopObserver {}

/// Reports progress through `tracing`: batches at debug, epochs at info.
#[derive(Default)]
pub struct LogObserver;

impl ProgressObserver for LogObserver {
    fn on_batch_begin(&mut self, p: &TrainingProgress) -> anyhow::Result<()> {
        debug!("Epoch #{}/{} | Batch #{}/{}", p.epoch, p.epochs, p.batch, p.batches);
        Ok(())
    }

    fn on_epoch_end(&mut self, p: &TrainingProgress, loss: f64) -> anyhow::Result<()> {
        info!("Epoch #{}/{} | Batch #{}/{} | Loss = {:.6}", p.epoch, p.epochs, p.batches, p.batches, loss);
        Ok(())
    }
}
