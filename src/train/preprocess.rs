//! Turns corpus samples into network inputs and targets.
//!
//! Intensities are scaled by 1/255 in floating point. Labels become one-hot
//! 10-vectors.

use crate::data::image::{Image, Label, IMAGE_PIXELS};
use crate::math::matrix::Matrix;

/// A 1-channel 28×28 input volume (one row of 784 values).
pub fn image_to_input(image: &Image) -> Matrix {
    Matrix::from_vec(1, IMAGE_PIXELS, image.normalized())
}

pub fn label_to_target(label: Label) -> Vec<f64> {
    label.one_hot()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_is_single_channel_and_scaled() {
        let input = image_to_input(&Image::from_pixels([255; IMAGE_PIXELS]));
        assert_eq!((input.rows, input.cols), (1, 784));
        assert!(input.as_slice().iter().all(|&v| v == 1.0));
    }

    #[test]
    fn target_is_one_hot() {
        assert_eq!(
            label_to_target(Label::new(0).unwrap()),
            vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]
        );
    }
}
