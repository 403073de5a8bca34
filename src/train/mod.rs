pub mod trainer;
pub mod epoch_stats;
pub mod train_config;
pub mod loop_fn;
pub mod preprocess;

pub use trainer::{create_and_train, train_network, TrainedModel, TrainingReport};
pub use epoch_stats::EpochStats;
pub use train_config::{TrainConfig, Verbosity};
pub use loop_fn::{evaluate, train_loop};
