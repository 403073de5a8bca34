use serde::{Serialize, Deserialize};

use crate::activation::activation::ActivationFunction;
use crate::layers::{ParamGrads, Shape};
use crate::math::matrix::Matrix;

/// 2-D convolution, stride 1, "same" zero padding, square odd kernel.
///
/// Implemented as im2col + matrix product: each output position becomes a
/// column of `in_channels * kernel * kernel` input taps, so the forward pass is
/// `weights (filters × taps) * patches (taps × height*width)`.
#[derive(Debug, Serialize, Deserialize)]
pub struct Conv2d {
    pub input_shape: Shape,
    pub filters: usize,
    pub kernel: usize,
    pub activation: ActivationFunction,
    /// Row `f` holds filter `f` laid out `[in_channel][ky][kx]`.
    pub weights: Matrix,
    /// `filters × 1`.
    pub biases: Matrix,
    #[serde(skip)]
    patches: Matrix,
    #[serde(skip)]
    pre_activation: Matrix,
}

impl Conv2d {
    pub fn new(
        input_shape: Shape,
        filters: usize,
        kernel: usize,
        activation: ActivationFunction,
    ) -> Conv2d {
        let taps = input_shape.channels * kernel * kernel;
        Conv2d {
            input_shape,
            filters,
            kernel,
            activation,
            weights: Matrix::he(filters, taps),
            biases: Matrix::zeros(filters, 1),
            patches: Matrix::default(),
            pre_activation: Matrix::default(),
        }
    }

    pub fn output_shape(&self) -> Shape {
        Shape::new(self.filters, self.input_shape.height, self.input_shape.width)
    }

    fn pad(&self) -> isize {
        (self.kernel / 2) as isize
    }

    /// Unfolds `input` (channels × h*w) into a taps × h*w patch matrix.
    fn im2col(&self, input: &Matrix) -> Matrix {
        let Shape { channels, height, width } = self.input_shape;
        let k = self.kernel;
        let pad = self.pad();
        let mut patches = Matrix::zeros(channels * k * k, height * width);

        for c in 0..channels {
            for ky in 0..k {
                for kx in 0..k {
                    let tap = (c * k + ky) * k + kx;
                    for y in 0..height {
                        let sy = y as isize + ky as isize - pad;
                        if sy < 0 || sy >= height as isize {
                            continue;
                        }
                        for x in 0..width {
                            let sx = x as isize + kx as isize - pad;
                            if sx < 0 || sx >= width as isize {
                                continue;
                            }
                            patches[(tap, y * width + x)] =
                                input[(c, sy as usize * width + sx as usize)];
                        }
                    }
                }
            }
        }

        patches
    }

    /// Folds a taps × h*w gradient back onto the input grid, summing
    /// overlapping contributions.
    fn col2im(&self, grad_patches: &Matrix) -> Matrix {
        let Shape { channels, height, width } = self.input_shape;
        let k = self.kernel;
        let pad = self.pad();
        let mut grad_input = Matrix::zeros(channels, height * width);

        for c in 0..channels {
            for ky in 0..k {
                for kx in 0..k {
                    let tap = (c * k + ky) * k + kx;
                    for y in 0..height {
                        let sy = y as isize + ky as isize - pad;
                        if sy < 0 || sy >= height as isize {
                            continue;
                        }
                        for x in 0..width {
                            let sx = x as isize + kx as isize - pad;
                            if sx < 0 || sx >= width as isize {
                                continue;
                            }
                            grad_input[(c, sy as usize * width + sx as usize)] +=
                                grad_patches[(tap, y * width + x)];
                        }
                    }
                }
            }
        }

        grad_input
    }

    pub fn forward(&mut self, input: &Matrix) -> Matrix {
        let patches = self.im2col(input);
        let mut z = &self.weights * &patches;
        for f in 0..self.filters {
            let bias = self.biases[(f, 0)];
            for j in 0..z.cols {
                z[(f, j)] += bias;
            }
        }
        let a = Matrix::from_vec(z.rows, z.cols, self.activation.apply(z.as_slice()));
        self.patches = patches;
        self.pre_activation = z;
        a
    }

    pub fn backward(&self, grad_output: &Matrix) -> (Matrix, ParamGrads) {
        let act_derivative = self.pre_activation.map(|x| self.activation.derivative(x));
        let delta = grad_output.hadamard(&act_derivative);

        let weights = &delta * &self.patches.transpose();
        let biases = delta.sum_rows();
        let grad_patches = &self.weights.transpose() * &delta;

        (self.col2im(&grad_patches), ParamGrads { weights, biases })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::test_util::{check_gradients, wavy};
    use crate::layers::Layer;

    #[test]
    fn same_padding_keeps_spatial_size() {
        let mut conv = Conv2d::new(Shape::new(1, 28, 28), 20, 5, ActivationFunction::ReLU);
        let out = conv.forward(&Matrix::zeros(1, 784));
        assert_eq!((out.rows, out.cols), (20, 784));
        assert_eq!(conv.output_shape(), Shape::new(20, 28, 28));
        assert_eq!((conv.weights.rows, conv.weights.cols), (20, 25));
    }

    #[test]
    fn identity_kernel_copies_input() {
        let mut conv = Conv2d::new(Shape::new(1, 3, 3), 1, 3, ActivationFunction::ReLU);
        let mut kernel = vec![0.0; 9];
        kernel[4] = 1.0;
        conv.weights = Matrix::from_vec(1, 9, kernel);
        let input = Matrix::from_vec(1, 9, (1..=9).map(f64::from).collect());
        assert_eq!(conv.forward(&input), input);
    }

    #[test]
    fn box_kernel_sums_neighbourhood_with_zero_border() {
        let mut conv = Conv2d::new(Shape::new(1, 3, 3), 1, 3, ActivationFunction::ReLU);
        conv.weights = Matrix::from_vec(1, 9, vec![1.0; 9]);
        conv.biases = Matrix::from_vec(1, 1, vec![0.5]);
        let out = conv.forward(&Matrix::from_vec(1, 9, vec![1.0; 9]));
        // Corners see 4 cells, edges 6, centre 9.
        assert_eq!(
            out.as_slice(),
            &[4.5, 6.5, 4.5, 6.5, 9.5, 6.5, 4.5, 6.5, 4.5]
        );
    }

    #[test]
    fn gradients_match_finite_differences() {
        let mut conv = Conv2d::new(Shape::new(2, 4, 4), 3, 3, ActivationFunction::ReLU);
        conv.weights = wavy(3, 18, 1.1);
        conv.biases = wavy(3, 1, 2.0);
        let mut layer = Layer::Conv2d(conv);
        check_gradients(&mut layer, &wavy(2, 16, 0.0));
    }
}
