use serde::{Serialize, Deserialize};

use crate::layers::Shape;
use crate::math::matrix::Matrix;

/// Non-overlapping max pooling (stride equals the window). Trailing rows and
/// columns that do not fill a whole window are dropped.
#[derive(Debug, Serialize, Deserialize)]
pub struct MaxPool2d {
    pub input_shape: Shape,
    pub pool: usize,
    /// Input column that won each output cell, per channel row.
    #[serde(skip)]
    switches: Vec<usize>,
}

impl MaxPool2d {
    pub fn new(input_shape: Shape, pool: usize) -> MaxPool2d {
        MaxPool2d { input_shape, pool, switches: Vec::new() }
    }

    pub fn output_shape(&self) -> Shape {
        Shape::new(
            self.input_shape.channels,
            self.input_shape.height / self.pool,
            self.input_shape.width / self.pool,
        )
    }

    pub fn forward(&mut self, input: &Matrix) -> Matrix {
        let out_shape = self.output_shape();
        let in_width = self.input_shape.width;
        let mut out = Matrix::zeros(out_shape.channels, out_shape.spatial());
        let mut switches = Vec::with_capacity(out_shape.len());

        for c in 0..out_shape.channels {
            for oy in 0..out_shape.height {
                for ox in 0..out_shape.width {
                    let mut best_col = (oy * self.pool) * in_width + ox * self.pool;
                    let mut best = input[(c, best_col)];
                    for dy in 0..self.pool {
                        for dx in 0..self.pool {
                            let col = (oy * self.pool + dy) * in_width + ox * self.pool + dx;
                            if input[(c, col)] > best {
                                best = input[(c, col)];
                                best_col = col;
                            }
                        }
                    }
                    out[(c, oy * out_shape.width + ox)] = best;
                    switches.push(best_col);
                }
            }
        }

        self.switches = switches;
        out
    }

    /// Routes each output gradient to the input cell that produced the maximum.
    pub fn backward(&self, grad_output: &Matrix) -> Matrix {
        let out_spatial = self.output_shape().spatial();
        let mut grad_input = Matrix::zeros(self.input_shape.channels, self.input_shape.spatial());
        for (i, &col) in self.switches.iter().enumerate() {
            let c = i / out_spatial;
            grad_input[(c, col)] += grad_output[(c, i % out_spatial)];
        }
        grad_input
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::test_util::{check_gradients, wavy};
    use crate::layers::Layer;

    #[test]
    fn picks_window_maxima() {
        let mut pool = MaxPool2d::new(Shape::new(1, 4, 4), 2);
        let input = Matrix::from_vec(1, 16, vec![
            1.0, 2.0, 5.0, 0.0,
            3.0, 4.0, 1.0, 1.0,
            0.0, 0.0, 9.0, 8.0,
            7.0, 0.0, 6.0, 5.0,
        ]);
        let out = pool.forward(&input);
        assert_eq!(out.as_slice(), &[4.0, 5.0, 7.0, 9.0]);

        let grad = pool.backward(&Matrix::from_vec(1, 4, vec![1.0, 2.0, 3.0, 4.0]));
        let mut expected = vec![0.0; 16];
        expected[5] = 1.0;
        expected[2] = 2.0;
        expected[12] = 3.0;
        expected[10] = 4.0;
        assert_eq!(grad.as_slice(), expected.as_slice());
    }

    #[test]
    fn odd_sizes_floor_like_the_mnist_stack() {
        let pool = MaxPool2d::new(Shape::new(50, 7, 7), 2);
        assert_eq!(pool.output_shape(), Shape::new(50, 3, 3));
        let pool = MaxPool2d::new(Shape::new(20, 28, 28), 2);
        assert_eq!(pool.output_shape(), Shape::new(20, 14, 14));
    }

    #[test]
    fn gradients_match_finite_differences() {
        let mut layer = Layer::MaxPool2d(MaxPool2d::new(Shape::new(2, 4, 4), 2));
        check_gradients(&mut layer, &wavy(2, 16, 0.4));
    }
}
