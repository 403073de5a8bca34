use std::fmt::Write as _;
use std::io::{self, Write};

use crate::data::image::{IMAGE_COLS, IMAGE_PIXELS, IMAGE_ROWS};
use crate::error::{Error, Result};

/// Inverse of the trainer's normalization: back to an integer intensity.
pub fn denormalize(value: f64) -> i64 {
    (value * 255.0).round() as i64
}

/// Renders a normalized 28×28 image as rows of right-aligned 3-wide
/// intensities separated by spaces, followed by a blank line.
pub fn render_image(pixels: &[f64]) -> Result<String> {
    if pixels.len() != IMAGE_PIXELS {
        return Err(Error::shape(format!("{IMAGE_PIXELS} normalized pixels"), pixels.len()));
    }

    let mut out = String::with_capacity(IMAGE_ROWS * (IMAGE_COLS * 4 + 1) + 1);
    for row in pixels.chunks_exact(IMAGE_COLS) {
        for (col, &value) in row.iter().enumerate() {
            if col > 0 {
                out.push(' ');
            }
            // Writing into a String cannot fail.
            let _ = write!(out, "{:>3}", denormalize(value));
        }
        out.push('\n');
    }
    out.push('\n');
    Ok(out)
}

/// Writes the rendering of `pixels` to stdout.
pub fn print_image(pixels: &[f64]) -> Result<()> {
    let rendered = render_image(pixels)?;
    let mut stdout = io::stdout().lock();
    stdout.write_all(rendered.as_bytes())?;
    stdout.flush()?;
    Ok(())
}
