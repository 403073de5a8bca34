pub mod corpus;
pub mod idx;
pub mod image;

pub use corpus::{Corpus, Dataset};
pub use image::{Image, Label, IMAGE_COLS, IMAGE_PIXELS, IMAGE_ROWS, NUM_CLASSES};
