use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};
use crate::export::memory_map::{MemoryMap, Region, RegionKind};
use crate::layers::Layer;
use crate::network::network::Network;

/// Q8.8 fixed point: `trunc(value * 256)` as a 16-bit two's complement word.
pub fn q8_8(value: f32) -> u16 {
    ((value * 256.0).trunc() as i64 & 0xFFFF) as u16
}

/// Parameters of a region in memory order. Convolution kernels are
/// `[out][in][kh][kw]`; dense kernels are transposed to `[out][in]`.
pub fn region_words(network: &Network, region: &Region) -> Result<Vec<f32>> {
    let layer = region
        .layer
        .and_then(|i| network.layers.get(i))
        .ok_or_else(|| Error::InvalidConfig(format!("region {} has no layer", region.name)))?;

    let values: Vec<f64> = match (region.kind, layer) {
        (RegionKind::Weights, Layer::Conv2d(conv)) => conv.weights.as_slice().to_vec(),
        (RegionKind::Weights, Layer::Dense(dense)) => dense.weights.transpose().into_vec(),
        (RegionKind::Biases, Layer::Conv2d(conv)) => conv.biases.as_slice().to_vec(),
        (RegionKind::Biases, Layer::Dense(dense)) => dense.biases.as_slice().to_vec(),
        _ => {
            return Err(Error::InvalidConfig(format!(
                "region {} does not hold parameters",
                region.name
            )))
        }
    };

    if Some(values.len()) != region.len {
        return Err(Error::shape(
            format!("{:?} words for {}", region.len, region.name),
            values.len(),
        ));
    }
    Ok(values.into_iter().map(|v| v as f32).collect())
}

/// Hex dump of `words`: four lowercase hex digits each, `per_line` words
/// concatenated per line.
pub fn render_hex(words: &[f32], per_line: usize) -> String {
    let per_line = per_line.max(1);
    let mut out = String::with_capacity(words.len() * 4 + words.len() / per_line + 1);
    for line in words.chunks(per_line) {
        for &w in line {
            out.push_str(&format!("{:04x}", q8_8(w)));
        }
        out.push('\n');
    }
    out
}

/// Writes `<layer>_weights.hex` and `<layer>_biases.hex` for every
/// parametrized layer into `dir`. Returns the files written.
pub fn write_hex_files<P: AsRef<Path>>(network: &Network, dir: P) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let map = MemoryMap::from_network(network);
    let mut written = Vec::new();

    for entry in &map.layers {
        for region in map.parameter_regions().filter(|r| r.layer == Some(entry.layer)) {
            let suffix = match region.kind {
                RegionKind::Weights => "weights",
                _ => "biases",
            };
            let path = dir.join(format!("{}_{suffix}.hex", entry.file_stem));
            let words = region_words(network, region)?;

            let mut writer = BufWriter::new(File::create(&path)?);
            writer.write_all(render_hex(&words, region.words_per_line).as_bytes())?;
            writer.flush()?;

            debug!(path = %path.display(), words = words.len(), "hex region written");
            written.push(path);
        }
    }

    Ok(written)
}

/// Writes every parameter as little-endian `f32`, in region order.
/// Returns the number of words written.
pub fn write_weights_bin<P: AsRef<Path>>(network: &Network, path: P) -> Result<usize> {
    let map = MemoryMap::from_network(network);
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    let mut count = 0;

    for region in map.parameter_regions() {
        for w in region_words(network, region)? {
            writer.write_all(&w.to_le_bytes())?;
            count += 1;
        }
    }
    writer.flush()?;
    Ok(count)
}

/// Reads a file written by `write_weights_bin`.
pub fn read_weights_bin<P: AsRef<Path>>(path: P) -> Result<Vec<f32>> {
    let mut bytes = Vec::new();
    File::open(path.as_ref())?.read_to_end(&mut bytes)?;
    if bytes.len() % 4 != 0 {
        return Err(Error::shape("a multiple of 4 bytes", bytes.len()));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}
