use serde::{Serialize, Deserialize};

use crate::layers::{Layer, ParamGrads};
use crate::math::matrix::Matrix;

/// Adam hyperparameters. Defaults match the Keras optimizer defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdamConfig {
    pub learning_rate: f64,
    pub beta_1: f64,
    pub beta_2: f64,
    /// Added to the denominator for numerical stability.
    pub epsilon: f64,
}

impl Default for AdamConfig {
    fn default() -> Self {
        AdamConfig {
            learning_rate: 0.001,
            beta_1: 0.9,
            beta_2: 0.999,
            epsilon: 1e-7,
        }
    }
}

/// First and second moment estimates for one layer's parameters.
#[derive(Debug)]
struct Moments {
    weights_m: Matrix,
    weights_v: Matrix,
    biases_m: Matrix,
    biases_v: Matrix,
}

impl Moments {
    fn zeros_like(weights: &Matrix, biases: &Matrix) -> Moments {
        Moments {
            weights_m: Matrix::zeros(weights.rows, weights.cols),
            weights_v: Matrix::zeros(weights.rows, weights.cols),
            biases_m: Matrix::zeros(biases.rows, biases.cols),
            biases_v: Matrix::zeros(biases.rows, biases.cols),
        }
    }
}

/// Adam optimizer, as described in
/// [Adam: A Method for Stochastic Optimization](https://arxiv.org/pdf/1412.6980.pdf).
///
/// Moment state is created lazily per layer on the first step that carries
/// gradients for it.
#[derive(Debug)]
pub struct Adam {
    pub config: AdamConfig,
    time: i32,
    moments: Vec<Option<Moments>>,
}

impl Adam {
    pub fn new(config: AdamConfig) -> Adam {
        Adam { config, time: 0, moments: Vec::new() }
    }

    /// Number of updates applied so far.
    pub fn steps(&self) -> i32 {
        self.time
    }

    /// Applies one update to every layer; `grads[i]` belongs to `layers[i]`.
    pub fn step(&mut self, layers: &mut [Layer], grads: &[Option<ParamGrads>]) {
        assert_eq!(layers.len(), grads.len(), "one gradient slot per layer");
        if self.moments.len() < layers.len() {
            self.moments.resize_with(layers.len(), || None);
        }

        self.time += 1;
        let AdamConfig { learning_rate, beta_1, beta_2, epsilon } = self.config;
        let lr_t = learning_rate * (1.0 - beta_2.powi(self.time)).sqrt()
            / (1.0 - beta_1.powi(self.time));

        for (i, (layer, grad)) in layers.iter_mut().zip(grads).enumerate() {
            let (Some((weights, biases)), Some(grad)) = (layer.params_mut(), grad) else {
                continue;
            };
            let state = self.moments[i]
                .get_or_insert_with(|| Moments::zeros_like(weights, biases));

            let rule = Rule { lr_t, beta_1, beta_2, epsilon };
            rule.apply(
                weights.as_mut_slice(),
                grad.weights.as_slice(),
                state.weights_m.as_mut_slice(),
                state.weights_v.as_mut_slice(),
            );
            rule.apply(
                biases.as_mut_slice(),
                grad.biases.as_slice(),
                state.biases_m.as_mut_slice(),
                state.biases_v.as_mut_slice(),
            );
        }
    }
}

struct Rule {
    lr_t: f64,
    beta_1: f64,
    beta_2: f64,
    epsilon: f64,
}

impl Rule {
    fn apply(&self, params: &mut [f64], grads: &[f64], m: &mut [f64], v: &mut [f64]) {
        for (((p, &g), m), v) in params.iter_mut().zip(grads).zip(m.iter_mut()).zip(v.iter_mut()) {
            *m = self.beta_1 * *m + (1.0 - self.beta_1) * g;
            *v = self.beta_2 * *v + (1.0 - self.beta_2) * g * g;
            *p -= self.lr_t * *m / (v.sqrt() + self.epsilon);
        }
    }
}
