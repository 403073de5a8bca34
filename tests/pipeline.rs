use std::fs;
use std::io::Write;
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;

use mnist_testbench::data::corpus::{TEST_IMAGES, TEST_LABELS, TRAIN_IMAGES, TRAIN_LABELS};
use mnist_testbench::data::idx::{encode_images, encode_labels};
use mnist_testbench::data::image::IMAGE_PIXELS;
use mnist_testbench::export::{export_all, read_weights_bin, DEFAULT_MEMORY_SIZE};
use mnist_testbench::{
    create_and_train, render_image, Corpus, Error, Image, Label, Network, TrainConfig, Verbosity,
};

fn digits(n: usize) -> (Vec<Image>, Vec<Label>) {
    let images = (0..n)
        .map(|i| {
            let mut px = [0u8; IMAGE_PIXELS];
            for (j, p) in px.iter_mut().enumerate() {
                *p = ((i * 37 + j * 13) % 256) as u8;
            }
            Image::from_pixels(px)
        })
        .collect();
    let labels = (0..n).map(|i| Label::new((i % 10) as u8).unwrap()).collect();
    (images, labels)
}

fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}

/// Lays out a tiny MNIST directory: training files gzipped, test files plain.
fn write_mnist_dir(dir: &Path, train: usize, test: usize) {
    let (images, labels) = digits(train);
    fs::write(dir.join(format!("{TRAIN_IMAGES}.gz")), gzip(&encode_images(&images))).unwrap();
    fs::write(dir.join(format!("{TRAIN_LABELS}.gz")), gzip(&encode_labels(&labels))).unwrap();

    let (images, labels) = digits(test);
    fs::write(dir.join(TEST_IMAGES), encode_images(&images)).unwrap();
    fs::write(dir.join(TEST_LABELS), encode_labels(&labels)).unwrap();
}

#[test]
fn corpus_loads_plain_and_gzipped_files() {
    let dir = tempfile::tempdir().unwrap();
    write_mnist_dir(dir.path(), 6, 3);

    let corpus = Corpus::load_dir(dir.path()).unwrap();
    assert_eq!(corpus.train.len(), 6);
    assert_eq!(corpus.test.len(), 3);
    assert_eq!(corpus.pool_len(), 9);

    let (expected, _) = digits(3);
    let (image, label) = corpus.pool_get(6 + 2).unwrap();
    assert_eq!(image, &expected[2]);
    assert_eq!(label.value(), 2);
}

#[test]
fn missing_corpus_files_are_reported() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(Corpus::load_dir(dir.path()), Err(Error::Io(_))));
}

#[test]
fn train_save_reload_and_export() {
    let dir = tempfile::tempdir().unwrap();
    write_mnist_dir(dir.path(), 4, 2);
    let corpus = Corpus::load_dir(dir.path()).unwrap();

    let config = TrainConfig::new(1, 2, Verbosity::Silent);
    let mut model = create_and_train(&corpus, &config).unwrap();
    assert_eq!(model.report.epochs.len(), 1);
    assert_eq!(model.network.parameter_count(), 58_800);

    let (image, _) = corpus.test.get(0).unwrap();
    let before = model.network.predict(&image.normalized()).unwrap();
    assert_eq!(before.len(), 10);

    let model_path = dir.path().join("model.json");
    model.network.save_json(&model_path).unwrap();
    let mut reloaded = Network::load_json(&model_path).unwrap();
    let after = reloaded.predict(&image.normalized()).unwrap();
    for (a, b) in before.iter().zip(&after) {
        assert!((a - b).abs() < 1e-12);
    }

    let out = dir.path().join("hw");
    export_all(&reloaded, &out, DEFAULT_MEMORY_SIZE).unwrap();
    for name in [
        "regions.h",
        "weights.h",
        "weights_float.bin",
        "conv2d_1_weights.hex",
        "conv2d_2_biases.hex",
        "dense_2_weights.hex",
    ] {
        assert!(out.join(name).is_file(), "{name} missing");
    }
    assert_eq!(read_weights_bin(out.join("weights_float.bin")).unwrap().len(), 58_800);
    let header = fs::read_to_string(out.join("weights.h")).unwrap();
    assert!(header.contains("size_of_weights           = 58800;"));
}

#[test]
fn corpus_digits_print_at_their_stored_intensities() {
    let (images, _) = digits(1);
    let rendered = render_image(&images[0].normalized()).unwrap();
    let values: Vec<u8> = rendered
        .split_whitespace()
        .map(|v| v.parse().unwrap())
        .collect();
    assert_eq!(values.as_slice(), images[0].as_bytes());
}
