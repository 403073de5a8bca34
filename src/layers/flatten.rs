use serde::{Serialize, Deserialize};

use crate::layers::Shape;
use crate::math::matrix::Matrix;

/// Reshapes a channels × h*w volume into one row, channel-major.
#[derive(Debug, Serialize, Deserialize)]
pub struct Flatten {
    pub input_shape: Shape,
}

impl Flatten {
    pub fn new(input_shape: Shape) -> Flatten {
        Flatten { input_shape }
    }

    pub fn forward(&mut self, input: &Matrix) -> Matrix {
        input.clone().reshape(1, self.input_shape.len())
    }

    pub fn backward(&self, grad_output: &Matrix) -> Matrix {
        grad_output
            .clone()
            .reshape(self.input_shape.channels, self.input_shape.spatial())
    }
}
