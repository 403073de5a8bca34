pub mod conv2d;
pub mod dense;
pub mod flatten;
pub mod max_pool;

use serde::{Serialize, Deserialize};

use crate::math::matrix::Matrix;

pub use conv2d::Conv2d;
pub use dense::Dense;
pub use flatten::Flatten;
pub use max_pool::MaxPool2d;

/// Dimensions of an activation volume.
///
/// Volumes travel between layers as a `Matrix` with one row per channel and
/// `height * width` columns. A flattened vector is `1×1×n` and travels as a
/// single `1×n` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shape {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
}

impl Shape {
    pub fn new(channels: usize, height: usize, width: usize) -> Shape {
        Shape { channels, height, width }
    }

    pub fn flat(len: usize) -> Shape {
        Shape::new(1, 1, len)
    }

    pub fn len(&self) -> usize {
        self.channels * self.height * self.width
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn spatial(&self) -> usize {
        self.height * self.width
    }
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}x{}", self.height, self.width, self.channels)
    }
}

/// Gradients for one layer's trainable parameters, shaped like the parameters.
#[derive(Debug, Clone)]
pub struct ParamGrads {
    pub weights: Matrix,
    pub biases: Matrix,
}

impl ParamGrads {
    pub fn zeros_like(weights: &Matrix, biases: &Matrix) -> ParamGrads {
        ParamGrads {
            weights: Matrix::zeros(weights.rows, weights.cols),
            biases: Matrix::zeros(biases.rows, biases.cols),
        }
    }

    pub fn accumulate(&mut self, other: &ParamGrads) {
        self.weights += &other.weights;
        self.biases += &other.biases;
    }

    pub fn scale(&self, factor: f64) -> ParamGrads {
        ParamGrads {
            weights: self.weights.scale(factor),
            biases: self.biases.scale(factor),
        }
    }
}

/// One stage of a sequential network.
///
/// `forward` caches whatever the matching `backward` call needs, so the two
/// must be called in pairs for the same sample.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Layer {
    Conv2d(Conv2d),
    MaxPool2d(MaxPool2d),
    Flatten(Flatten),
    Dense(Dense),
}

impl Layer {
    pub fn forward(&mut self, input: &Matrix) -> Matrix {
        match self {
            Layer::Conv2d(l) => l.forward(input),
            Layer::MaxPool2d(l) => l.forward(input),
            Layer::Flatten(l) => l.forward(input),
            Layer::Dense(l) => l.forward(input),
        }
    }

    /// Takes ∂L/∂output and returns ∂L/∂input plus parameter gradients for
    /// layers that have parameters.
    pub fn backward(&self, grad_output: &Matrix) -> (Matrix, Option<ParamGrads>) {
        match self {
            Layer::Conv2d(l) => {
                let (grad_input, grads) = l.backward(grad_output);
                (grad_input, Some(grads))
            }
            Layer::MaxPool2d(l) => (l.backward(grad_output), None),
            Layer::Flatten(l) => (l.backward(grad_output), None),
            Layer::Dense(l) => {
                let (grad_input, grads) = l.backward(grad_output);
                (grad_input, Some(grads))
            }
        }
    }

    pub fn params(&self) -> Option<(&Matrix, &Matrix)> {
        match self {
            Layer::Conv2d(l) => Some((&l.weights, &l.biases)),
            Layer::Dense(l) => Some((&l.weights, &l.biases)),
            _ => None,
        }
    }

    pub fn params_mut(&mut self) -> Option<(&mut Matrix, &mut Matrix)> {
        match self {
            Layer::Conv2d(l) => Some((&mut l.weights, &mut l.biases)),
            Layer::Dense(l) => Some((&mut l.weights, &mut l.biases)),
            _ => None,
        }
    }

    pub fn input_shape(&self) -> Shape {
        match self {
            Layer::Conv2d(l) => l.input_shape,
            Layer::MaxPool2d(l) => l.input_shape,
            Layer::Flatten(l) => l.input_shape,
            Layer::Dense(l) => Shape::flat(l.input_size),
        }
    }

    pub fn output_shape(&self) -> Shape {
        match self {
            Layer::Conv2d(l) => l.output_shape(),
            Layer::MaxPool2d(l) => l.output_shape(),
            Layer::Flatten(l) => Shape::flat(l.input_shape.len()),
            Layer::Dense(l) => Shape::flat(l.size),
        }
    }

    /// Expected `(rows, cols)` of the weight and bias matrices, derived from
    /// the layer's geometry.
    pub fn param_shapes(&self) -> Option<((usize, usize), (usize, usize))> {
        match self {
            Layer::Conv2d(l) => Some((
                (l.filters, l.input_shape.channels * l.kernel * l.kernel),
                (l.filters, 1),
            )),
            Layer::Dense(l) => Some(((l.input_size, l.size), (1, l.size))),
            _ => None,
        }
    }

    /// Base name used for this layer kind in exported artifacts.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Layer::Conv2d(_) => "conv2d",
            Layer::MaxPool2d(_) => "max_pooling2d",
            Layer::Flatten(_) => "flatten",
            Layer::Dense(_) => "dense",
        }
    }
}
