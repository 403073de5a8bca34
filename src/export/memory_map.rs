//! Word-addressed memory layout of a network for the hardware testbench.
//!
//! Regions are laid out back to back: weights then biases for every layer
//! with parameters, the input image, one outputs region per parametrized
//! layer, and a sentinel marking the end of mapped memory.

use std::fmt::Write as _;

use crate::error::{Error, Result};
use crate::layers::Layer;
use crate::network::network::Network;

/// Default number of words in the accelerator's memory.
pub const DEFAULT_MEMORY_SIZE: usize = 75_264;

/// Length printed for the sentinel region.
const UNBOUNDED: u64 = u32::MAX as u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    Weights,
    Biases,
    InputImage,
    Outputs,
    OutOfBounds,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub name: String,
    pub kind: RegionKind,
    pub offset: usize,
    /// `None` for the sentinel.
    pub len: Option<usize>,
    /// Words per line in the hex dump; 0 for regions that are not dumped.
    pub words_per_line: usize,
    /// Index into `Network::layers` for weight, bias and output regions.
    pub layer: Option<usize>,
}

/// Geometry of one parametrized layer as the hardware sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerGeometry {
    Convolution { input_images: usize, output_images: usize, kernel: usize },
    /// Weights stored `[rows = outputs][cols = inputs]`.
    Dense { rows: usize, cols: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerEntry {
    /// Conventional name, e.g. `conv2d`, `conv2d_1`, `dense`.
    pub name: String,
    /// 1-based name used for hex files, e.g. `conv2d_1`, `conv2d_2`.
    pub file_stem: String,
    pub layer: usize,
    pub geometry: LayerGeometry,
    pub num_weights: usize,
    pub weight_offset: usize,
    pub num_biases: usize,
    pub bias_offset: usize,
    /// Activation length after any directly following pooling layer.
    pub out_size: usize,
    pub out_offset: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryMap {
    pub regions: Vec<Region>,
    pub layers: Vec<LayerEntry>,
    pub image_height: usize,
    pub image_width: usize,
    pub num_images: usize,
}

impl MemoryMap {
    pub fn from_network(network: &Network) -> MemoryMap {
        let mut entries: Vec<LayerEntry> = Vec::new();
        let mut conv_seen = 0;
        let mut dense_seen = 0;
        let mut offset = 0;

        for (i, layer) in network.layers.iter().enumerate() {
            let (weights, biases) = match layer.params() {
                Some(params) => params,
                None => continue,
            };
            let (geometry, ordinal) = match layer {
                Layer::Conv2d(conv) => {
                    conv_seen += 1;
                    let geometry = LayerGeometry::Convolution {
                        input_images: conv.input_shape.channels,
                        output_images: conv.filters,
                        kernel: conv.kernel,
                    };
                    (geometry, conv_seen)
                }
                Layer::Dense(dense) => {
                    dense_seen += 1;
                    let geometry = LayerGeometry::Dense { rows: dense.size, cols: dense.input_size };
                    (geometry, dense_seen)
                }
                _ => continue,
            };

            let kind = layer.kind_name();
            let name = if ordinal == 1 { kind.to_owned() } else { format!("{kind}_{}", ordinal - 1) };
            let num_weights = weights.as_slice().len();
            let num_biases = biases.as_slice().len();

            let mut out_size = layer.output_shape().len();
            if let Some(Layer::MaxPool2d(pool)) = network.layers.get(i + 1) {
                out_size = pool.output_shape().len();
            }

            entries.push(LayerEntry {
                name,
                file_stem: format!("{kind}_{ordinal}"),
                layer: i,
                geometry,
                num_weights,
                weight_offset: offset,
                num_biases,
                bias_offset: offset + num_weights,
                out_size,
                out_offset: 0,
            });
            offset += num_weights + num_biases;
        }

        let mut regions = Vec::with_capacity(entries.len() * 3 + 2);
        for entry in &entries {
            let words_per_line = match entry.geometry {
                LayerGeometry::Convolution { kernel, .. } => kernel * kernel,
                LayerGeometry::Dense { .. } => 1,
            };
            regions.push(Region {
                name: format!("{} weights", entry.name),
                kind: RegionKind::Weights,
                offset: entry.weight_offset,
                len: Some(entry.num_weights),
                words_per_line,
                layer: Some(entry.layer),
            });
            regions.push(Region {
                name: format!("{} biases", entry.name),
                kind: RegionKind::Biases,
                offset: entry.bias_offset,
                len: Some(entry.num_biases),
                words_per_line: 1,
                layer: Some(entry.layer),
            });
        }

        let input = network.input_shape;
        regions.push(Region {
            name: "input image".to_owned(),
            kind: RegionKind::InputImage,
            offset,
            len: Some(input.len()),
            words_per_line: 0,
            layer: None,
        });
        offset += input.len();

        for entry in &mut entries {
            entry.out_offset = offset;
            regions.push(Region {
                name: format!("{} outputs", entry.name),
                kind: RegionKind::Outputs,
                offset,
                len: Some(entry.out_size),
                words_per_line: 0,
                layer: Some(entry.layer),
            });
            offset += entry.out_size;
        }

        regions.push(Region {
            name: "out of bounds".to_owned(),
            kind: RegionKind::OutOfBounds,
            offset,
            len: None,
            words_per_line: 0,
            layer: None,
        });

        MemoryMap {
            regions,
            layers: entries,
            image_height: input.height,
            image_width: input.width,
            num_images: input.channels,
        }
    }

    /// Words taken by all weights and biases.
    pub fn size_of_weights(&self) -> usize {
        self.layers
            .last()
            .map(|l| l.bias_offset + l.num_biases)
            .unwrap_or(0)
    }

    /// First word past the last outputs region.
    pub fn size_of_outputs(&self) -> usize {
        self.regions.last().map(|r| r.offset).unwrap_or(0)
    }

    /// Rejects a memory size that cannot hold every mapped region.
    pub fn check_memory_size(&self, memory_size: usize) -> Result<()> {
        if memory_size < self.size_of_outputs() {
            return Err(Error::InvalidConfig(format!(
                "memory size {memory_size} is smaller than the {} mapped words",
                self.size_of_outputs()
            )));
        }
        Ok(())
    }

    pub fn image_size(&self) -> usize {
        self.image_height * self.image_width
    }

    /// Regions that are dumped to hex files, in memory order.
    pub fn parameter_regions(&self) -> impl Iterator<Item = &Region> + '_ {
        self.regions
            .iter()
            .filter(|r| matches!(r.kind, RegionKind::Weights | RegionKind::Biases))
    }
}

/// Renders the `regions.h` C header: the region table and its names.
pub fn render_regions_header(map: &MemoryMap) -> String {
    let mut out = String::new();
    out.push_str("#ifndef REGIONS_H_INCLUDED\n#define REGIONS_H_INCLUDED\n\n\n");

    out.push_str("static unsigned int region_map[][2] = {\n");
    let last = map.regions.len().saturating_sub(1);
    for (i, region) in map.regions.iter().enumerate() {
        let len = region.len.map(|l| l as u64).unwrap_or(UNBOUNDED);
        let sep = if i == last { ' ' } else { ',' };
        let _ = writeln!(out, "  {{ {:>10}, {:>10} }}{sep}  // {}", region.offset, len, region.name);
    }
    out.push_str("};\n\n\n");

    out.push_str("static char region_names[][40] = {\n");
    for (i, region) in map.regions.iter().enumerate() {
        let sep = if i == last { "" } else { "," };
        let _ = writeln!(out, "  {{ \"{}\" }}{sep}", region.name);
    }
    out.push_str("};\n\n#endif\n");
    out
}

/// Renders the `weights.h` C header with per-layer constants.
/// `memory_size` must cover every mapped region.
pub fn render_weights_header(map: &MemoryMap, memory_size: usize) -> Result<String> {
    map.check_memory_size(memory_size)?;

    let mut out = String::new();
    out.push_str("#ifndef WEIGHTS_H_INCLUDED\n#define WEIGHTS_H_INCLUDED\n\n");

    for (n, entry) in map.layers.iter().enumerate() {
        let n = n + 1;
        let constant = |out: &mut String, field: &str, value: usize| {
            let _ = writeln!(out, "   static const int {:<26}= {value};", format!("layer{n}_{field}"));
        };

        let kind = match entry.geometry {
            LayerGeometry::Convolution { .. } => "convolution",
            LayerGeometry::Dense { .. } => "dense",
        };
        let _ = writeln!(out, "\n   {:=<61}\n", format!("//=======layer {n} - {kind}"));

        match entry.geometry {
            LayerGeometry::Convolution { input_images, output_images, kernel } => {
                constant(&mut out, "input_images", input_images);
                constant(&mut out, "output_images", output_images);
                constant(&mut out, "weights_rows", kernel);
                constant(&mut out, "weights_cols", kernel);
            }
            LayerGeometry::Dense { rows, cols } => {
                constant(&mut out, "weights_rows", rows);
                constant(&mut out, "weights_cols", cols);
            }
        }
        out.push('\n');
        constant(&mut out, "num_weights", entry.num_weights);
        out.push('\n');
        constant(&mut out, "weight_offset", entry.weight_offset);
        constant(&mut out, "out_size", entry.out_size);
        out.push('\n');
        constant(&mut out, "num_bias_values", entry.num_biases);
        constant(&mut out, "bias_offset", entry.bias_offset);
    }

    let _ = writeln!(out, "\n   {:=<64}\n", "//=======End of layers");
    let image = |out: &mut String, field: &str, value: usize| {
        let _ = writeln!(out, "   static int const {field:<26}= {value};");
    };
    image(&mut out, "image_height", map.image_height);
    image(&mut out, "image_width", map.image_width);
    image(&mut out, "image_size", map.image_size());
    image(&mut out, "num_images", map.num_images);
    out.push('\n');
    image(&mut out, "size_of_weights", map.size_of_weights());
    image(&mut out, "size_of_outputs", map.size_of_outputs());

    let _ = write!(out, "\n\n#define MEMORY_SIZE {memory_size}\n\n#endif\n");
    Ok(out)
}
