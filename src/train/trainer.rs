use rand::Rng;
use serde::{Serialize, Deserialize};
use tracing::info;

use crate::data::corpus::Corpus;
use crate::data::image::{IMAGE_COLS, IMAGE_ROWS, NUM_CLASSES};
use crate::error::{Error, Result};
use crate::layers::Shape;
use crate::network::network::Network;
use crate::network::spec::NetworkSpec;
use crate::train::epoch_stats::EpochStats;
use crate::train::loop_fn::{evaluate, train_loop};
use crate::train::train_config::TrainConfig;

/// Outcome of a training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub epochs: Vec<EpochStats>,
    /// Mean cross-entropy on the test split after the final epoch.
    pub test_loss: f64,
    /// Test accuracy in [0, 1] after the final epoch.
    pub test_accuracy: f64,
}

impl TrainingReport {
    /// Misclassification rate on the test split, in percent.
    pub fn error_percent(&self) -> f64 {
        100.0 - self.test_accuracy * 100.0
    }
}

#[derive(Debug)]
pub struct TrainedModel {
    pub network: Network,
    pub report: TrainingReport,
}

/// Builds the reference digit classifier and trains it on `corpus`,
/// validating on the test split after every epoch. Prints
/// `Baseline Error: X.XX%` once training ends.
pub fn create_and_train(corpus: &Corpus, config: &TrainConfig) -> Result<TrainedModel> {
    let network = NetworkSpec::mnist_cnn().build()?;
    train_network(network, corpus, config, &mut rand::thread_rng())
}

/// Trains an already-built classifier. Its input must be one 28×28 channel
/// and its output one score per digit class.
pub fn train_network<R: Rng + ?Sized>(
    mut network: Network,
    corpus: &Corpus,
    config: &TrainConfig,
    rng: &mut R,
) -> Result<TrainedModel> {
    config.validate()?;
    let expected_input = Shape::new(1, IMAGE_ROWS, IMAGE_COLS);
    if network.input_shape != expected_input {
        return Err(Error::shape(expected_input, network.input_shape));
    }
    if network.output_len() != NUM_CLASSES {
        return Err(Error::shape(
            format!("{NUM_CLASSES} class scores"),
            network.output_len(),
        ));
    }
    if corpus.train.is_empty() || corpus.test.is_empty() {
        return Err(Error::EmptyCorpus);
    }

    info!(
        train = corpus.train.len(),
        test = corpus.test.len(),
        parameters = network.parameter_count(),
        epochs = config.epochs,
        batch_size = config.batch_size,
        "training started"
    );

    let epochs = train_loop(&mut network, &corpus.train, &corpus.test, config, rng)?;
    let (test_loss, test_accuracy) = match epochs.last() {
        Some(last) => (last.val_loss, last.val_accuracy),
        None => evaluate(&mut network, &corpus.test),
    };

    let report = TrainingReport { epochs, test_loss, test_accuracy };
    println!("Baseline Error: {:.2}%", report.error_percent());
    info!(test_loss, test_accuracy, "training finished");

    Ok(TrainedModel { network, report })
}
