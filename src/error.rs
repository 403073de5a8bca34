use std::path::PathBuf;

/// Errors surfaced by the library. Nothing is retried locally; every failure
/// propagates to the caller unchanged.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("IDX file {path:?}: {reason}")]
    Idx { path: PathBuf, reason: String },

    #[error("label {0} is outside the digit range 0..=9")]
    InvalidLabel(u8),

    #[error("shape mismatch: expected {expected}, got {actual}")]
    Shape { expected: String, actual: String },

    #[error("corpus has no samples to draw from")]
    EmptyCorpus,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("stimulus file: {0}")]
    StimulusFormat(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn shape(expected: impl ToString, actual: impl ToString) -> Self {
        Error::Shape {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}
