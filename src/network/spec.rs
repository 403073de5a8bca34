use std::path::Path;

use serde::{Serialize, Deserialize};

use crate::activation::activation::ActivationFunction;
use crate::error::{Error, Result};
use crate::layers::{Conv2d, Dense, Flatten, Layer, MaxPool2d, Shape};
use crate::network::network::Network;

/// Describes one layer in a network specification. Input sizes are not
/// stored; they follow from the previous layer when the spec is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerSpec {
    /// Stride-1 "same"-padded convolution with a square, odd kernel.
    Conv2d { filters: usize, kernel: usize, activation: ActivationFunction },
    MaxPool2d { pool: usize },
    Flatten,
    Dense { units: usize, activation: ActivationFunction },
}

/// A fully serializable description of a network architecture.
///
/// `NetworkSpec` can be saved to / loaded from JSON independently of the
/// trained weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSpec {
    /// Human-readable name used as the model file stem.
    pub name: String,
    pub input: Shape,
    /// Ordered list of layer descriptions (input → output).
    pub layers: Vec<LayerSpec>,
}

impl NetworkSpec {
    /// The digit classifier the testbench is built around:
    ///
    /// ```text
    /// 28x28x1 → conv 20@5x5 relu → pool 2 → conv 50@3x3 relu → pool 2
    ///         → flatten → dense 20 relu → dense 10 softmax
    /// ```
    pub fn mnist_cnn() -> NetworkSpec {
        use ActivationFunction::{ReLU, Softmax};
        NetworkSpec {
            name: "mnist_cnn".to_owned(),
            input: Shape::new(1, 28, 28),
            layers: vec![
                LayerSpec::Conv2d { filters: 20, kernel: 5, activation: ReLU },
                LayerSpec::MaxPool2d { pool: 2 },
                LayerSpec::Conv2d { filters: 50, kernel: 3, activation: ReLU },
                LayerSpec::MaxPool2d { pool: 2 },
                LayerSpec::Flatten,
                LayerSpec::Dense { units: 20, activation: ReLU },
                LayerSpec::Dense { units: 10, activation: Softmax },
            ],
        }
    }

    /// Instantiates freshly initialized layers, threading shapes through the
    /// stack and rejecting combinations the layers cannot handle.
    pub fn build(&self) -> Result<Network> {
        if self.input.is_empty() {
            return Err(Error::InvalidConfig(format!("input shape {} is empty", self.input)));
        }

        let mut shape = self.input;
        let mut layers = Vec::with_capacity(self.layers.len());

        for (i, spec) in self.layers.iter().enumerate() {
            let layer = match *spec {
                LayerSpec::Conv2d { filters, kernel, activation } => {
                    if kernel % 2 == 0 || filters == 0 {
                        return Err(Error::InvalidConfig(format!(
                            "layer {i}: convolution needs an odd kernel and at least one filter \
                             (got {filters} filters of {kernel}x{kernel})"
                        )));
                    }
                    if activation == ActivationFunction::Softmax {
                        return Err(Error::InvalidConfig(format!(
                            "layer {i}: softmax is only supported on dense layers"
                        )));
                    }
                    Layer::Conv2d(Conv2d::new(shape, filters, kernel, activation))
                }
                LayerSpec::MaxPool2d { pool } => {
                    if pool == 0 || pool > shape.height || pool > shape.width {
                        return Err(Error::InvalidConfig(format!(
                            "layer {i}: pool size {pool} does not fit input {shape}"
                        )));
                    }
                    Layer::MaxPool2d(MaxPool2d::new(shape, pool))
                }
                LayerSpec::Flatten => Layer::Flatten(Flatten::new(shape)),
                LayerSpec::Dense { units, activation } => {
                    if shape.channels != 1 || shape.height != 1 {
                        return Err(Error::InvalidConfig(format!(
                            "layer {i}: dense layer needs a flattened input, got {shape}"
                        )));
                    }
                    Layer::Dense(Dense::new(units, shape.width, activation))
                }
            };
            shape = layer.output_shape();
            layers.push(layer);
        }

        Ok(Network::from_layers(self.input, layers))
    }

    /// Serializes the spec to a pretty-printed JSON file.
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Deserializes a `NetworkSpec` from a JSON file.
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<NetworkSpec> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}

impl Default for NetworkSpec {
    fn default() -> Self {
        NetworkSpec::mnist_cnn()
    }
}
