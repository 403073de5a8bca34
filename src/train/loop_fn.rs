use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info};

use crate::data::corpus::Dataset;
use crate::error::{Error, Result};
use crate::layers::ParamGrads;
use crate::loss::cross_entropy::CrossEntropyLoss;
use crate::network::network::Network;
use crate::optim::adam::Adam;
use crate::train::epoch_stats::EpochStats;
use crate::train::preprocess::{image_to_input, label_to_target};
use crate::train::train_config::{TrainConfig, Verbosity};

// ---------------------------------------------------------------------------
// Public entry points
// ---------------------------------------------------------------------------

/// Trains `network` for `config.epochs` epochs of mini-batch Adam, scoring
/// the `validation` split after each one.
///
/// # Arguments
/// - `network`    — modified in place
/// - `train`      — samples to fit, reshuffled every epoch with `rng`
/// - `validation` — samples scored after each epoch; never trained on
/// - `config`     — epochs, batch size, verbosity and Adam hyperparameters
///
/// Returns the statistics of every completed epoch.
pub fn train_loop<R: Rng + ?Sized>(
    network: &mut Network,
    train: &Dataset,
    validation: &Dataset,
    config: &TrainConfig,
    rng: &mut R,
) -> Result<Vec<EpochStats>> {
    config.validate()?;
    if train.is_empty() {
        return Err(Error::EmptyCorpus);
    }

    let mut optimizer = Adam::new(config.optimizer);
    let mut history = Vec::with_capacity(config.epochs);

    for epoch in 1..=config.epochs {
        let t_start = Instant::now();
        let progress = Progress::new(config.verbosity, epoch, config.epochs, train.len());

        // ── One full pass over the training data ───────────────────────────
        let (train_loss, train_accuracy) =
            run_one_epoch(network, train, &mut optimizer, config.batch_size, rng, &progress);

        // ── Validation ────────────────────────────────────────────────────
        let (val_loss, val_accuracy) = evaluate(network, validation);

        let stats = EpochStats {
            epoch,
            total_epochs: config.epochs,
            train_loss,
            train_accuracy,
            val_loss,
            val_accuracy,
            elapsed_ms: t_start.elapsed().as_millis() as u64,
        };
        progress.finish(&stats);
        info!(
            epoch,
            train_loss,
            train_accuracy,
            val_loss,
            val_accuracy,
            elapsed_ms = stats.elapsed_ms,
            "epoch finished"
        );
        history.push(stats);
    }

    Ok(history)
}

/// Mean cross-entropy and accuracy over a dataset, without touching the
/// weights. An empty dataset scores `(0.0, 0.0)`.
pub fn evaluate(network: &mut Network, dataset: &Dataset) -> (f64, f64) {
    if dataset.is_empty() {
        return (0.0, 0.0);
    }

    let mut total_loss = 0.0;
    let mut correct = 0usize;
    for (image, label) in dataset.iter() {
        let output = network.forward(&image_to_input(image));
        total_loss += CrossEntropyLoss::loss_for_class(&output, label.value() as usize);
        if argmax(&output) == label.value() as usize {
            correct += 1;
        }
    }

    let n = dataset.len() as f64;
    (total_loss / n, correct as f64 / n)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

/// Runs one epoch over the shuffled training data. Returns the mean loss and
/// the accuracy measured as the weights moved.
fn run_one_epoch<R: Rng + ?Sized>(
    network: &mut Network,
    train: &Dataset,
    optimizer: &mut Adam,
    batch_size: usize,
    rng: &mut R,
    progress: &Progress,
) -> (f64, f64) {
    let n = train.len();
    let mut total_loss = 0.0;
    let mut correct = 0usize;

    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);

    for (batch_no, batch) in indices.chunks(batch_size).enumerate() {
        let mut acc_grads: Vec<Option<ParamGrads>> = network
            .layers
            .iter()
            .map(|layer| layer.params().map(|(w, b)| ParamGrads::zeros_like(w, b)))
            .collect();

        for &idx in batch {
            let (image, label) = match train.get(idx) {
                Some(sample) => sample,
                None => continue,
            };
            let target = label_to_target(label);

            let output = network.forward(&image_to_input(image));
            total_loss += CrossEntropyLoss::loss(&output, &target);
            if argmax(&output) == label.value() as usize {
                correct += 1;
            }

            let grads = network.backward(CrossEntropyLoss::derivative(&output, &target));
            for (acc, grad) in acc_grads.iter_mut().zip(grads.iter()) {
                if let (Some(acc), Some(grad)) = (acc.as_mut(), grad.as_ref()) {
                    acc.accumulate(grad);
                }
            }
        }

        let inv_batch = 1.0 / batch.len() as f64;
        let averaged: Vec<Option<ParamGrads>> = acc_grads
            .iter()
            .map(|g| g.as_ref().map(|g| g.scale(inv_batch)))
            .collect();
        optimizer.step(&mut network.layers, &averaged);

        let seen = (batch_no * batch_size + batch.len()).min(n);
        debug!(batch = batch_no + 1, seen, "batch applied");
        progress.update(seen, total_loss / seen as f64);
    }

    (total_loss / n as f64, correct as f64 / n as f64)
}

/// Index of the maximum element in a slice.
fn argmax(v: &[f64]) -> usize {
    v.iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Console output for one epoch at the configured verbosity. Only
/// `Verbosity::ProgressBar` owns a bar; drawing never fails the epoch.
struct Progress {
    verbosity: Verbosity,
    epoch: usize,
    total_epochs: usize,
    bar: Option<ProgressBar>,
}

impl Progress {
    fn new(verbosity: Verbosity, epoch: usize, total_epochs: usize, samples: usize) -> Progress {
        let bar = (verbosity == Verbosity::ProgressBar).then(|| ProgressBar::new(samples as u64));
        Progress::with_bar(verbosity, epoch, total_epochs, bar)
    }

    fn with_bar(
        verbosity: Verbosity,
        epoch: usize,
        total_epochs: usize,
        bar: Option<ProgressBar>,
    ) -> Progress {
        if let Some(bar) = &bar {
            bar.set_style(bar_style());
            bar.set_prefix(format!("Epoch {epoch}/{total_epochs}"));
        }
        Progress { verbosity, epoch, total_epochs, bar }
    }

    fn update(&self, seen: usize, running_loss: f64) {
        if let Some(bar) = &self.bar {
            bar.set_position(seen as u64);
            bar.set_message(format!("loss: {running_loss:.4}"));
        }
    }

    fn finish(&self, stats: &EpochStats) {
        let metrics = format!(
            "{}ms - loss: {:.4} - accuracy: {:.4} - val_loss: {:.4} - val_accuracy: {:.4}",
            stats.elapsed_ms, stats.train_loss, stats.train_accuracy, stats.val_loss, stats.val_accuracy,
        );
        match (&self.bar, self.verbosity) {
            (Some(bar), _) => bar.finish_with_message(metrics),
            (None, Verbosity::PerEpoch) => {
                println!("Epoch {}/{} - {metrics}", self.epoch, self.total_epochs)
            }
            (None, _) => {}
        }
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template("{prefix} {pos:>7}/{len:7} [{bar:30}] {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use indicatif::ProgressDrawTarget;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use crate::data::image::{Image, Label, IMAGE_PIXELS};
    use crate::layers::Shape;
    use crate::network::spec::{LayerSpec, NetworkSpec};
    use crate::activation::activation::ActivationFunction;

    /// Two trivially separable classes: blank images are 0, bright images are 1.
    fn two_class_dataset(per_class: usize) -> Dataset {
        let mut images = Vec::new();
        let mut labels = Vec::new();
        for i in 0..per_class {
            images.push(Image::from_pixels([0; IMAGE_PIXELS]));
            labels.push(Label::new(0).unwrap());
            images.push(Image::from_pixels([200 + (i % 50) as u8; IMAGE_PIXELS]));
            labels.push(Label::new(1).unwrap());
        }
        Dataset::new(images, labels).unwrap()
    }

    fn small_network() -> Network {
        NetworkSpec {
            name: "tiny".into(),
            input: Shape::new(1, 28, 28),
            layers: vec![
                LayerSpec::MaxPool2d { pool: 4 },
                LayerSpec::Flatten,
                LayerSpec::Dense { units: 10, activation: ActivationFunction::Softmax },
            ],
        }
        .build()
        .unwrap()
    }

    #[test]
    fn loss_decreases_on_a_separable_problem() {
        let data = two_class_dataset(20);
        let mut network = small_network();
        let (before, _) = evaluate(&mut network, &data);

        let mut config = TrainConfig::new(10, 8, Verbosity::Silent);
        config.optimizer.learning_rate = 0.01;
        let history = train_loop(&mut network, &data, &data, &config, &mut StdRng::seed_from_u64(7)).unwrap();

        assert_eq!(history.len(), 10);
        assert_eq!(history[9].epoch, 10);
        assert_eq!(history[9].total_epochs, 10);
        let last = history.last().unwrap();
        assert!(last.val_loss < before, "{} !< {before}", last.val_loss);
        assert_eq!(last.val_accuracy, 1.0);
    }

    #[test]
    fn zero_epochs_leave_the_network_alone() {
        let data = two_class_dataset(2);
        let mut network = small_network();
        let before = network.predict(&vec![0.5; IMAGE_PIXELS]).unwrap();

        let config = TrainConfig::new(0, 4, Verbosity::Silent);
        let history = train_loop(&mut network, &data, &data, &config, &mut StdRng::seed_from_u64(1)).unwrap();

        assert!(history.is_empty());
        assert_eq!(network.predict(&vec![0.5; IMAGE_PIXELS]).unwrap(), before);
    }

    #[test]
    fn empty_training_split_is_an_error() {
        let empty = Dataset::new(Vec::new(), Vec::new()).unwrap();
        let mut network = small_network();
        let config = TrainConfig::new(1, 4, Verbosity::Silent);
        let result = train_loop(&mut network, &empty, &empty, &config, &mut StdRng::seed_from_u64(1));
        assert!(matches!(result, Err(Error::EmptyCorpus)));
    }

    #[test]
    fn evaluate_on_empty_dataset_is_zero() {
        let empty = Dataset::new(Vec::new(), Vec::new()).unwrap();
        assert_eq!(evaluate(&mut small_network(), &empty), (0.0, 0.0));
    }

    #[test]
    fn progress_bar_tracks_samples_and_ends_with_metrics() {
        let bar = ProgressBar::with_draw_target(Some(10), ProgressDrawTarget::hidden());
        let progress = Progress::with_bar(Verbosity::ProgressBar, 2, 5, Some(bar.clone()));
        assert_eq!(bar.prefix(), "Epoch 2/5");

        progress.update(4, 0.5);
        assert_eq!(bar.position(), 4);
        assert_eq!(bar.message(), "loss: 0.5000");

        progress.update(10, 0.25);
        progress.finish(&EpochStats {
            epoch: 2,
            total_epochs: 5,
            train_loss: 0.25,
            train_accuracy: 0.9,
            val_loss: 0.3,
            val_accuracy: 0.8,
            elapsed_ms: 12,
        });
        assert!(bar.is_finished());
        assert_eq!(bar.position(), 10);
        assert_eq!(
            bar.message(),
            "12ms - loss: 0.2500 - accuracy: 0.9000 - val_loss: 0.3000 - val_accuracy: 0.8000"
        );
    }

    #[test]
    fn only_the_progress_bar_verbosity_owns_a_bar() {
        assert!(Progress::new(Verbosity::ProgressBar, 1, 1, 10).bar.is_some());
        assert!(Progress::new(Verbosity::PerEpoch, 1, 1, 10).bar.is_none());
        assert!(Progress::new(Verbosity::Silent, 1, 1, 10).bar.is_none());
    }

    #[test]
    fn verbosity_does_not_change_training() {
        let data = two_class_dataset(6);
        let run = |verbosity| {
            let mut network = small_network();
            let config = TrainConfig::new(2, 4, verbosity);
            let history =
                train_loop(&mut network, &data, &data, &config, &mut StdRng::seed_from_u64(3)).unwrap();
            history
                .iter()
                .map(|s| (s.train_loss, s.train_accuracy, s.val_loss, s.val_accuracy))
                .collect::<Vec<_>>()
        };
        let silent = run(Verbosity::Silent);
        assert_eq!(run(Verbosity::ProgressBar), silent);
        assert_eq!(run(Verbosity::PerEpoch), silent);
    }

    #[test]
    fn argmax_picks_the_largest() {
        assert_eq!(argmax(&[0.1, 0.7, 0.2]), 1);
    }
}
