use crate::error::{Error, Result};

pub const IMAGE_ROWS: usize = 28;
pub const IMAGE_COLS: usize = 28;
pub const IMAGE_PIXELS: usize = IMAGE_ROWS * IMAGE_COLS;
pub const NUM_CLASSES: usize = 10;

/// One 28×28 grayscale digit, row-major, one byte per pixel.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Image {
    pixels: [u8; IMAGE_PIXELS],
}

impl Image {
    /// Validates that exactly 784 bytes were supplied.
    pub fn from_bytes(bytes: &[u8]) -> Result<Image> {
        let pixels: [u8; IMAGE_PIXELS] = bytes
            .try_into()
            .map_err(|_| Error::shape(format!("{IMAGE_PIXELS} pixel bytes"), bytes.len()))?;
        Ok(Image { pixels })
    }

    pub fn from_pixels(pixels: [u8; IMAGE_PIXELS]) -> Image {
        Image { pixels }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel(&self, row: usize, col: usize) -> u8 {
        self.pixels[row * IMAGE_COLS + col]
    }

    /// Pixels scaled into [0, 1] by dividing by 255 in floating point.
    pub fn normalized(&self) -> Vec<f64> {
        self.pixels.iter().map(|&p| p as f64 / 255.0).collect()
    }
}

/// A digit class in 0..=9.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, PartialOrd, Ord)]
pub struct Label(u8);

impl Label {
    pub fn new(value: u8) -> Result<Label> {
        if (value as usize) < NUM_CLASSES {
            Ok(Label(value))
        } else {
            Err(Error::InvalidLabel(value))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// 10-dimensional one-hot vector with a 1 at the class index.
    pub fn one_hot(self) -> Vec<f64> {
        let mut v = vec![0.0; NUM_CLASSES];
        v[self.0 as usize] = 1.0;
        v
    }
}

impl TryFrom<u8> for Label {
    type Error = Error;

    fn try_from(value: u8) -> Result<Label> {
        Label::new(value)
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
