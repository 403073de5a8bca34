use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::data::idx;
use crate::data::image::{Image, Label};
use crate::error::{Error, Result};

pub const TRAIN_IMAGES: &str = "train-images-idx3-ubyte";
pub const TRAIN_LABELS: &str = "train-labels-idx1-ubyte";
pub const TEST_IMAGES: &str = "t10k-images-idx3-ubyte";
pub const TEST_LABELS: &str = "t10k-labels-idx1-ubyte";

/// Positionally paired images and labels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    images: Vec<Image>,
    labels: Vec<Label>,
}

impl Dataset {
    pub fn new(images: Vec<Image>, labels: Vec<Label>) -> Result<Dataset> {
        if images.len() != labels.len() {
            return Err(Error::shape(
                format!("{} labels (one per image)", images.len()),
                labels.len(),
            ));
        }
        Ok(Dataset { images, labels })
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<(&Image, Label)> {
        Some((self.images.get(index)?, *self.labels.get(index)?))
    }

    pub fn images(&self) -> &[Image] {
        &self.images
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Image, Label)> + '_ {
        self.images.iter().zip(self.labels.iter().copied())
    }
}

/// The canonical training and test splits.
///
/// For sampling, the two splits form one pool: indices below `train.len()`
/// address the training split and the rest address the test split.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Corpus {
    pub train: Dataset,
    pub test: Dataset,
}

impl Corpus {
    pub fn new(train: Dataset, test: Dataset) -> Corpus {
        Corpus { train, test }
    }

    /// Loads the four MNIST IDX files from `dir`. Each file may also be
    /// present gzip-compressed with a `.gz` suffix.
    pub fn load_dir<P: AsRef<Path>>(dir: P) -> Result<Corpus> {
        let dir = dir.as_ref();
        info!(dir = %dir.display(), "loading MNIST corpus");

        let train = Dataset::new(
            idx::load_images(&locate(dir, TRAIN_IMAGES)?)?,
            idx::load_labels(&locate(dir, TRAIN_LABELS)?)?,
        )?;
        let test = Dataset::new(
            idx::load_images(&locate(dir, TEST_IMAGES)?)?,
            idx::load_labels(&locate(dir, TEST_LABELS)?)?,
        )?;

        info!(train = train.len(), test = test.len(), "corpus loaded");
        Ok(Corpus { train, test })
    }

    /// Size of the combined train + test pool.
    pub fn pool_len(&self) -> usize {
        self.train.len() + self.test.len()
    }

    /// Sample at `index` of the combined pool.
    pub fn pool_get(&self, index: usize) -> Option<(&Image, Label)> {
        if index < self.train.len() {
            self.train.get(index)
        } else {
            self.test.get(index - self.train.len())
        }
    }
}

/// Resolves `name` or `name.gz` inside `dir`, preferring the uncompressed file.
fn locate(dir: &Path, name: &str) -> Result<PathBuf> {
    let plain = dir.join(name);
    if plain.is_file() {
        return Ok(plain);
    }
    let gz = dir.join(format!("{name}.gz"));
    if gz.is_file() {
        debug!(path = %gz.display(), "using gzip-compressed IDX file");
        return Ok(gz);
    }
    Err(Error::Io(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        format!("neither {} nor {} exists", plain.display(), gz.display()),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::image::IMAGE_PIXELS;

    fn dataset(values: &[u8]) -> Dataset {
        Dataset::new(
            values.iter().map(|&v| Image::from_pixels([v; IMAGE_PIXELS])).collect(),
            values.iter().map(|&v| Label::new(v % 10).unwrap()).collect(),
        )
        .unwrap()
    }

    #[test]
    fn dataset_requires_paired_lengths() {
        let err = Dataset::new(vec![Image::from_pixels([0; IMAGE_PIXELS])], vec![]);
        assert!(matches!(err, Err(Error::Shape { .. })));
    }

    #[test]
    fn pool_concatenates_train_then_test() {
        let corpus = Corpus::new(dataset(&[1, 2]), dataset(&[3, 4, 5]));
        assert_eq!(corpus.pool_len(), 5);
        assert_eq!(corpus.pool_get(1).unwrap().1.value(), 2);
        assert_eq!(corpus.pool_get(2).unwrap().1.value(), 3);
        assert_eq!(corpus.pool_get(4).unwrap().0.pixel(0, 0), 5);
        assert!(corpus.pool_get(5).is_none());
    }

    #[test]
    fn load_dir_reads_plain_and_gzipped_splits() {
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let train = dataset(&[1, 2, 3]);
        let test = dataset(&[4]);

        std::fs::write(dir.path().join(TRAIN_IMAGES), idx::encode_images(train.images())).unwrap();
        std::fs::write(dir.path().join(TRAIN_LABELS), idx::encode_labels(train.labels())).unwrap();
        std::fs::write(dir.path().join(TEST_IMAGES), idx::encode_images(test.images())).unwrap();

        let gz = std::fs::File::create(dir.path().join(format!("{TEST_LABELS}.gz"))).unwrap();
        let mut encoder = flate2::write::GzEncoder::new(gz, flate2::Compression::fast());
        encoder.write_all(&idx::encode_labels(test.labels())).unwrap();
        encoder.finish().unwrap();

        let corpus = Corpus::load_dir(dir.path()).unwrap();
        assert_eq!(corpus, Corpus::new(train, test));
    }

    #[test]
    fn load_dir_reports_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        match Corpus::load_dir(dir.path()) {
            Err(Error::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }
}
