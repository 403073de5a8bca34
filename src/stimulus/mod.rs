pub mod format;
pub mod sampler;

pub use format::{read_stimulus_file, FILE_LEN, RECORD_COUNT, RECORD_LEN};
pub use sampler::{make_stimulus_file, make_stimulus_file_with, FixedIndices, IndexSource};
