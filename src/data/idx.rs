//! Parsing of the IDX binary files MNIST ships in, into fixed-shape
//! `Image` / `Label` values.
//!
//! # IDX3 image file layout
//! ```text
//! bytes  0-1:   0x00 0x00   (reserved, must be zero)
//! byte   2:     0x08        (dtype = uint8)
//! byte   3:     0x03        (number of dimensions = 3)
//! bytes  4-7:   N           (number of images, big-endian u32)
//! bytes  8-11:  rows        (image height in pixels, big-endian u32)
//! bytes 12-15:  cols        (image width in pixels, big-endian u32)
//! bytes 16..:   N * rows * cols bytes, row-major, uint8
//! ```
//!
//! # IDX1 label file layout
//! ```text
//! bytes  0-1:   0x00 0x00   (reserved, must be zero)
//! byte   2:     0x08        (dtype = uint8)
//! byte   3:     0x01        (number of dimensions = 1)
//! bytes  4-7:   N           (number of labels, big-endian u32)
//! bytes  8..:   N bytes, each a class index in [0, 10)
//! ```
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use flate2::read::GzDecoder;

use crate::data::image::{Image, Label, IMAGE_COLS, IMAGE_PIXELS, IMAGE_ROWS};
use crate::error::{Error, Result};

const IMAGE_MAGIC: u32 = 0x0000_0803;
const LABEL_MAGIC: u32 = 0x0000_0801;

fn be_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3],
    ])
}

/// Parses an IDX3 image file. Only 28×28 images are accepted.
pub fn parse_images(bytes: &[u8]) -> std::result::Result<Vec<Image>, String> {
    if bytes.len() < 16 {
        return Err(format!(
            "image file too short: expected at least 16 header bytes, got {}",
            bytes.len()
        ));
    }

    let magic = be_u32(bytes, 0);
    if magic != IMAGE_MAGIC {
        return Err(format!(
            "image file magic number mismatch: expected {IMAGE_MAGIC:#010x}, got {magic:#010x}"
        ));
    }

    let n_items = be_u32(bytes, 4) as usize;
    let rows = be_u32(bytes, 8) as usize;
    let cols = be_u32(bytes, 12) as usize;

    if rows != IMAGE_ROWS || cols != IMAGE_COLS {
        return Err(format!(
            "expected {IMAGE_ROWS}x{IMAGE_COLS} images, header declares {rows}x{cols}"
        ));
    }

    let data_len = n_items
        .checked_mul(IMAGE_PIXELS)
        .ok_or_else(|| format!("image count {n_items} overflows the data length"))?;
    let data = bytes.get(16..16 + data_len).ok_or_else(|| {
        format!(
            "image file too short: header declares {} images ({} data bytes), \
             but only {} bytes follow the header",
            n_items,
            data_len,
            bytes.len() - 16
        )
    })?;

    data.chunks_exact(IMAGE_PIXELS)
        .map(|chunk| Image::from_bytes(chunk).map_err(|e| e.to_string()))
        .collect()
}

/// Parses an IDX1 label file, rejecting class indices above 9.
pub fn parse_labels(bytes: &[u8]) -> std::result::Result<Vec<Label>, String> {
    if bytes.len() < 8 {
        return Err(format!(
            "label file too short: expected at least 8 header bytes, got {}",
            bytes.len()
        ));
    }

    let magic = be_u32(bytes, 0);
    if magic != LABEL_MAGIC {
        return Err(format!(
            "label file magic number mismatch: expected {LABEL_MAGIC:#010x}, got {magic:#010x}"
        ));
    }

    let n_items = be_u32(bytes, 4) as usize;
    let data = bytes.get(8..8 + n_items).ok_or_else(|| {
        format!(
            "label file too short: header declares {} labels but only {} bytes follow the header",
            n_items,
            bytes.len() - 8
        )
    })?;

    data.iter()
        .enumerate()
        .map(|(i, &class)| {
            Label::new(class).map_err(|_| format!("label at index {i}: class {class} is not a digit"))
        })
        .collect()
}

/// Reads a whole file, transparently gunzipping paths ending in `.gz`.
pub fn read_maybe_gz(path: &Path) -> Result<Vec<u8>> {
    let mut file = BufReader::new(File::open(path)?);
    let mut bytes = Vec::new();
    if path.extension().map_or(false, |ext| ext == "gz") {
        GzDecoder::new(file).read_to_end(&mut bytes)?;
    } else {
        file.read_to_end(&mut bytes)?;
    }
    Ok(bytes)
}

pub fn load_images(path: &Path) -> Result<Vec<Image>> {
    let bytes = read_maybe_gz(path)?;
    parse_images(&bytes).map_err(|reason| Error::Idx { path: path.to_owned(), reason })
}

pub fn load_labels(path: &Path) -> Result<Vec<Label>> {
    let bytes = read_maybe_gz(path)?;
    parse_labels(&bytes).map_err(|reason| Error::Idx { path: path.to_owned(), reason })
}

/// Encodes images in IDX3 form. Used to write fixtures and subsets.
pub fn encode_images(images: &[Image]) -> Vec<u8> {
    let mut out = Vec::with_capacity(16 + images.len() * IMAGE_PIXELS);
    out.extend_from_slice(&IMAGE_MAGIC.to_be_bytes());
    out.extend_from_slice(&(images.len() as u32).to_be_bytes());
    out.extend_from_slice(&(IMAGE_ROWS as u32).to_be_bytes());
    out.extend_from_slice(&(IMAGE_COLS as u32).to_be_bytes());
    for image in images {
        out.extend_from_slice(image.as_bytes());
    }
    out
}

/// Encodes labels in IDX1 form.
pub fn encode_labels(labels: &[Label]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + labels.len());
    out.extend_from_slice(&LABEL_MAGIC.to_be_bytes());
    out.extend_from_slice(&(labels.len() as u32).to_be_bytes());
    out.extend(labels.iter().map(|l| l.value()));
    out
}
