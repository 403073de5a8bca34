use std::path::Path;

use image::GrayImage;

use crate::data::image::{Image, IMAGE_COLS, IMAGE_ROWS};
use crate::error::{Error, Result};

/// Converts a digit into an 8-bit grayscale buffer.
pub fn to_gray_image(digit: &Image) -> Result<GrayImage> {
    GrayImage::from_raw(IMAGE_COLS as u32, IMAGE_ROWS as u32, digit.as_bytes().to_vec())
        .ok_or_else(|| Error::shape(format!("{IMAGE_COLS}x{IMAGE_ROWS} buffer"), digit.as_bytes().len()))
}

/// Saves a digit as a grayscale PNG for eyeballing.
pub fn save_png<P: AsRef<Path>>(digit: &Image, path: P) -> Result<()> {
    to_gray_image(digit)?.save_with_format(path, image::ImageFormat::Png)?;
    Ok(())
}
