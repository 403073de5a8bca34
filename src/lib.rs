pub mod error;
pub mod math;
pub mod activation;
pub mod layers;
pub mod network;
pub mod loss;
pub mod optim;
pub mod train;
pub mod data;
pub mod stimulus;
pub mod render;
pub mod export;

// Convenience re-exports
pub use error::{Error, Result};
pub use math::matrix::Matrix;
pub use activation::activation::ActivationFunction;
pub use layers::{Layer, Shape};
pub use network::{Network, NetworkSpec};
pub use data::{Corpus, Dataset, Image, Label};
pub use train::{create_and_train, TrainConfig, TrainedModel, Verbosity};
pub use stimulus::{make_stimulus_file, make_stimulus_file_with, read_stimulus_file, FixedIndices, IndexSource};
pub use render::{print_image, render_image};
