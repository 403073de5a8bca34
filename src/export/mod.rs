pub mod hex;
pub mod memory_map;
pub mod softmax_q8;

use std::fs;
use std::path::Path;

use tracing::info;

use crate::error::Result;
use crate::network::network::Network;

pub use hex::{q8_8, read_weights_bin, write_hex_files, write_weights_bin};
pub use memory_map::{render_regions_header, render_weights_header, MemoryMap, DEFAULT_MEMORY_SIZE};
pub use softmax_q8::softmax_q8;

/// Writes the full hardware bundle into `dir`: `regions.h`, `weights.h`,
/// the per-region hex files and `weights_float.bin`.
///
/// Both headers are rendered, and `memory_size` checked, before anything
/// touches the filesystem.
pub fn export_all<P: AsRef<Path>>(network: &Network, dir: P, memory_size: usize) -> Result<()> {
    let dir = dir.as_ref();
    let map = MemoryMap::from_network(network);
    let regions_h = render_regions_header(&map);
    let weights_h = render_weights_header(&map, memory_size)?;

    fs::create_dir_all(dir)?;
    fs::write(dir.join("regions.h"), regions_h)?;
    fs::write(dir.join("weights.h"), weights_h)?;
    let hex_files = write_hex_files(network, dir)?;
    let words = write_weights_bin(network, dir.join("weights_float.bin"))?;

    info!(
        dir = %dir.display(),
        hex_files = hex_files.len(),
        words,
        size_of_outputs = map.size_of_outputs(),
        "hardware bundle exported"
    );
    Ok(())
}
