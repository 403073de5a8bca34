use serde::{Serialize, Deserialize};

use crate::error::{Error, Result};
use crate::optim::adam::AdamConfig;

/// How much the training loop prints to stdout. Presentation only; the
/// trained result does not depend on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verbosity {
    /// Nothing.
    Silent,
    /// A progress bar redrawn per batch, finished with the epoch metrics.
    #[default]
    ProgressBar,
    /// One line per epoch.
    PerEpoch,
}

impl TryFrom<u8> for Verbosity {
    type Error = Error;

    fn try_from(level: u8) -> Result<Verbosity> {
        match level {
            0 => Ok(Verbosity::Silent),
            1 => Ok(Verbosity::ProgressBar),
            2 => Ok(Verbosity::PerEpoch),
            other => Err(Error::InvalidConfig(format!(
                "verbosity must be 0, 1 or 2, got {other}"
            ))),
        }
    }
}

/// Configuration for a training run.
///
/// # Fields
/// - `epochs`     — total number of full passes over the training split
/// - `batch_size` — samples per mini-batch; gradients are averaged per batch
/// - `verbosity`  — console output level
/// - `optimizer`  — Adam hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub verbosity: Verbosity,
    #[serde(default)]
    pub optimizer: AdamConfig,
}

impl TrainConfig {
    pub fn new(epochs: usize, batch_size: usize, verbosity: Verbosity) -> Self {
        TrainConfig {
            epochs,
            batch_size,
            verbosity,
            optimizer: AdamConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::InvalidConfig("batch_size must be at least 1".into()));
        }
        if !(self.optimizer.learning_rate > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "learning rate must be positive, got {}",
                self.optimizer.learning_rate
            )));
        }
        Ok(())
    }
}

impl Default for TrainConfig {
    fn default() -> Self {
        TrainConfig::new(10, 200, Verbosity::ProgressBar)
    }
}
