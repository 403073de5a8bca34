//! Byte layout of the testbench stimulus file.
//!
//! The file has no header, length prefix, or delimiter. It is `RECORD_COUNT`
//! records back to back, each the 784 image bytes (row-major, one byte per
//! pixel) immediately followed by the label byte.

use std::io::Write;
use std::path::Path;

use crate::data::image::{Image, Label, IMAGE_PIXELS};
use crate::error::{Error, Result};

/// Records written per stimulus file.
pub const RECORD_COUNT: usize = 20;
pub const RECORD_LEN: usize = IMAGE_PIXELS + 1;
pub const FILE_LEN: usize = RECORD_COUNT * RECORD_LEN;

pub fn write_record<W: Write + ?Sized>(writer: &mut W, image: &Image, label: Label) -> Result<()> {
    writer.write_all(image.as_bytes())?;
    writer.write_all(&[label.value()])?;
    Ok(())
}

/// Splits stimulus bytes back into records. Accepts any whole number of
/// records so truncated or hand-built files can be inspected too.
pub fn parse_stimulus(bytes: &[u8]) -> Result<Vec<(Image, Label)>> {
    if bytes.len() % RECORD_LEN != 0 {
        return Err(Error::StimulusFormat(format!(
            "{} bytes is not a whole number of {RECORD_LEN}-byte records",
            bytes.len()
        )));
    }

    bytes
        .chunks_exact(RECORD_LEN)
        .enumerate()
        .map(|(i, record)| {
            let image = Image::from_bytes(&record[..IMAGE_PIXELS])?;
            let label = Label::new(record[IMAGE_PIXELS]).map_err(|_| {
                Error::StimulusFormat(format!(
                    "record {i}: label byte {} is not a digit",
                    record[IMAGE_PIXELS]
                ))
            })?;
            Ok((image, label))
        })
        .collect()
}

pub fn read_stimulus_file<P: AsRef<Path>>(path: P) -> Result<Vec<(Image, Label)>> {
    parse_stimulus(&std::fs::read(path)?)
}
