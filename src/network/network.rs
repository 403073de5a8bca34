use std::path::Path;

use serde::{Serialize, Deserialize};

use crate::error::{Error, Result};
use crate::layers::{Layer, ParamGrads, Shape};
use crate::math::matrix::Matrix;

/// A sequential stack of layers.
#[derive(Debug, Serialize, Deserialize)]
pub struct Network {
    pub input_shape: Shape,
    pub layers: Vec<Layer>,
}

impl Network {
    /// Wraps already-built layers. Use `NetworkSpec::build` to get shape
    /// validation.
    pub fn from_layers(input_shape: Shape, layers: Vec<Layer>) -> Network {
        Network { input_shape, layers }
    }

    pub fn output_len(&self) -> usize {
        self.layers
            .last()
            .map(|l| l.output_shape().len())
            .unwrap_or_else(|| self.input_shape.len())
    }

    /// Forward pass on a channels × h*w input; stores activations in each
    /// layer for backprop.
    pub fn forward(&mut self, input: &Matrix) -> Vec<f64> {
        let mut current = input.clone();
        for layer in &mut self.layers {
            current = layer.forward(&current);
        }
        current.into_vec()
    }

    /// Checked forward pass over a flat, channel-major input.
    pub fn predict(&mut self, input: &[f64]) -> Result<Vec<f64>> {
        if input.len() != self.input_shape.len() {
            return Err(Error::shape(
                format!("{} input values ({})", self.input_shape.len(), self.input_shape),
                input.len(),
            ));
        }
        let input = Matrix::from_vec(
            self.input_shape.channels,
            self.input_shape.spatial(),
            input.to_vec(),
        );
        Ok(self.forward(&input))
    }

    /// Backward pass from ∂L/∂output of the most recent `forward` call.
    /// Returns one gradient slot per layer (`None` for parameterless layers).
    pub fn backward(&self, output_grad: Vec<f64>) -> Vec<Option<ParamGrads>> {
        let mut delta = Matrix::row(output_grad);
        let mut grads: Vec<Option<ParamGrads>> = Vec::with_capacity(self.layers.len());

        for layer in self.layers.iter().rev() {
            let (grad_input, layer_grads) = layer.backward(&delta);
            delta = grad_input;
            grads.push(layer_grads);
        }

        grads.reverse();
        grads
    }

    /// Total number of trainable scalars.
    pub fn parameter_count(&self) -> usize {
        self.layers
            .iter()
            .filter_map(Layer::params)
            .map(|(w, b)| w.as_slice().len() + b.as_slice().len())
            .sum()
    }

    /// Serializes the network weights to a pretty-printed JSON file.
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Deserializes a network from a JSON file previously written by
    /// `save_json`, then checks it with `validate`.
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Network> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        let network: Network = serde_json::from_reader(reader)?;
        network.validate()?;
        Ok(network)
    }

    /// Checks that consecutive layers agree on shapes and that every weight
    /// and bias matrix matches its layer's geometry.
    pub fn validate(&self) -> Result<()> {
        let mut shape = self.input_shape;
        for (i, layer) in self.layers.iter().enumerate() {
            match layer {
                Layer::MaxPool2d(pool) if pool.pool == 0 => {
                    return Err(Error::InvalidConfig(format!("layer {i}: pool size is 0")));
                }
                Layer::Conv2d(conv) if conv.kernel % 2 == 0 => {
                    return Err(Error::InvalidConfig(format!(
                        "layer {i}: kernel size {} is not odd",
                        conv.kernel
                    )));
                }
                _ => {}
            }

            if layer.input_shape() != shape {
                return Err(Error::shape(
                    format!("layer {i} ({}) input {shape}", layer.kind_name()),
                    layer.input_shape(),
                ));
            }

            if let (Some((weights, biases)), Some((w_shape, b_shape))) = (layer.params(), layer.param_shapes()) {
                for (what, m, (rows, cols)) in [("weights", weights, w_shape), ("biases", biases, b_shape)] {
                    if !m.has_shape(rows, cols) {
                        return Err(Error::shape(
                            format!("layer {i} {what} {rows}x{cols}"),
                            format!("{}x{} holding {} values", m.rows, m.cols, m.as_slice().len()),
                        ));
                    }
                }
            }

            shape = layer.output_shape();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::spec::NetworkSpec;

    #[test]
    fn mnist_cnn_outputs_a_ten_way_distribution() {
        let mut network = NetworkSpec::mnist_cnn().build().unwrap();
        let input: Vec<f64> = (0..784).map(|i| (i % 256) as f64 / 255.0).collect();
        let output = network.predict(&input).unwrap();
        assert_eq!(output.len(), 10);
        assert!((output.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(output.iter().all(|&p| p >= 0.0));
    }

    #[test]
    fn predict_rejects_wrong_input_length() {
        let mut network = NetworkSpec::mnist_cnn().build().unwrap();
        assert!(matches!(network.predict(&[0.0; 10]), Err(Error::Shape { .. })));
    }

    #[test]
    fn parameter_count_matches_memory_layout() {
        let network = NetworkSpec::mnist_cnn().build().unwrap();
        assert_eq!(network.parameter_count(), 58_800);
    }

    #[test]
    fn backward_yields_gradient_per_parametrized_layer() {
        let mut network = NetworkSpec::mnist_cnn().build().unwrap();
        let output = network.predict(&[0.5; 784]).unwrap();
        let mut target = vec![0.0; 10];
        target[3] = 1.0;
        let error: Vec<f64> = output.iter().zip(&target).map(|(p, t)| p - t).collect();
        let grads = network.backward(error);
        let present: Vec<bool> = grads.iter().map(Option::is_some).collect();
        assert_eq!(present, vec![true, false, true, false, false, true, true]);
    }

    #[test]
    fn freshly_built_network_validates() {
        assert!(NetworkSpec::mnist_cnn().build().unwrap().validate().is_ok());
    }

    #[test]
    fn load_rejects_weights_that_disagree_with_the_layer() {
        let mut network = NetworkSpec::mnist_cnn().build().unwrap();
        if let Layer::Dense(dense) = &mut network.layers[6] {
            dense.weights = Matrix::zeros(3, 3);
        }
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        network.save_json(&path).unwrap();

        assert!(matches!(Network::load_json(&path), Err(Error::Shape { .. })));
    }

    #[test]
    fn load_rejects_truncated_weight_storage() {
        let network = NetworkSpec::mnist_cnn().build().unwrap();
        let mut json = serde_json::to_value(&network).unwrap();
        json["layers"][0]["weights"]["data"].as_array_mut().unwrap().pop();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, serde_json::to_vec(&json).unwrap()).unwrap();

        assert!(matches!(Network::load_json(&path), Err(Error::Shape { .. })));
    }

    #[test]
    fn load_rejects_broken_layer_chaining() {
        let mut network = NetworkSpec::mnist_cnn().build().unwrap();
        if let Layer::Conv2d(conv) = &mut network.layers[2] {
            conv.input_shape = Shape::new(20, 28, 28);
        }
        assert!(matches!(network.validate(), Err(Error::Shape { .. })));
    }

    #[test]
    fn saved_network_reloads_with_identical_predictions() {
        let mut network = NetworkSpec::mnist_cnn().build().unwrap();
        let input = vec![0.25; 784];
        let before = network.predict(&input).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        network.save_json(&path).unwrap();
        let mut reloaded = Network::load_json(&path).unwrap();

        let after = reloaded.predict(&input).unwrap();
        for (a, b) in before.iter().zip(&after) {
            assert!((a - b).abs() < 1e-12);
        }
    }
}
