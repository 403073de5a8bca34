use serde::{Serialize, Deserialize};

use crate::{math::matrix::Matrix, activation::activation::ActivationFunction};
use crate::layers::ParamGrads;

/// Standard deviation of the normal initializer used for dense kernels.
pub const DENSE_INIT_STD: f64 = 0.05;

/// Fully connected layer: `a = σ(x·W + b)` with `x` a 1×input_size row.
#[derive(Debug, Serialize, Deserialize)]
pub struct Dense {
    pub size: usize,
    pub input_size: usize,
    /// `input_size × size`.
    pub weights: Matrix,
    /// `1 × size`.
    pub biases: Matrix,
    pub activator: ActivationFunction,
    #[serde(skip)]
    inputs: Matrix,
    // pre-activation values (z = xW + b) needed for correct derivative
    #[serde(skip)]
    pre_neurons: Matrix,
}

impl Dense {
    pub fn new(size: usize, input_size: usize, activation: ActivationFunction) -> Dense {
        Dense {
            size,
            input_size,
            weights: Matrix::normal(input_size, size, DENSE_INIT_STD),
            biases: Matrix::zeros(1, size),
            activator: activation,
            inputs: Matrix::default(),
            pre_neurons: Matrix::default(),
        }
    }

    pub fn forward(&mut self, input: &Matrix) -> Matrix {
        let z = &(input * &self.weights) + &self.biases;
        let a = Matrix::row(self.activator.apply(z.as_slice()));
        self.inputs = input.clone();
        self.pre_neurons = z;
        a
    }

    /// `grad_output` is ∂L/∂a for this layer (error in activation space).
    /// Returns ∂L/∂x and the parameter gradients.
    pub fn backward(&self, grad_output: &Matrix) -> (Matrix, ParamGrads) {
        // Use pre-activation z so that derivative(z) = σ'(z) is computed correctly
        let act_derivative = self.pre_neurons.map(|x| self.activator.derivative(x));
        // δ = error ⊙ σ'(z)
        let layer_delta = grad_output.hadamard(&act_derivative);

        let weights = &self.inputs.transpose() * &layer_delta;
        let grad_input = &layer_delta * &self.weights.transpose();

        (grad_input, ParamGrads { weights, biases: layer_delta })
    }
}
