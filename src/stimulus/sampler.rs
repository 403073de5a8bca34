use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use rand::Rng;
use tracing::{debug, info};

use crate::data::corpus::Corpus;
use crate::data::image::{Image, Label};
use crate::error::{Error, Result};
use crate::stimulus::format::{write_record, RECORD_COUNT};

/// Supplies the pool indices the sampler draws.
///
/// Every `rand::Rng` is an `IndexSource` drawing uniformly from
/// `0..bound`; seed one (e.g. `StdRng::seed_from_u64`) for reproducible files.
pub trait IndexSource {
    fn next_index(&mut self, bound: usize) -> usize;
}

impl<R: Rng + ?Sized> IndexSource for R {
    fn next_index(&mut self, bound: usize) -> usize {
        self.gen_range(0..bound)
    }
}

/// Replays a fixed list of indices, wrapping around when exhausted.
#[derive(Debug, Clone)]
pub struct FixedIndices {
    indices: Vec<usize>,
    position: usize,
}

impl FixedIndices {
    /// Panics if `indices` is empty.
    pub fn new(indices: Vec<usize>) -> FixedIndices {
        assert!(!indices.is_empty(), "FixedIndices needs at least one index");
        FixedIndices { indices, position: 0 }
    }
}

impl IndexSource for FixedIndices {
    fn next_index(&mut self, _bound: usize) -> usize {
        let index = self.indices[self.position % self.indices.len()];
        self.position += 1;
        index
    }
}

/// Writes a fresh stimulus file at `output` from `RECORD_COUNT` uniformly
/// random draws (with replacement) over the combined corpus pool.
///
/// Output is intentionally non-deterministic: the thread-local RNG is used and
/// never seeded. Use [`make_stimulus_file_with`] to control the draws.
///
/// Returns the drawn pool indices in draw order.
pub fn make_stimulus_file<P: AsRef<Path>>(output: P, corpus: &Corpus) -> Result<Vec<usize>> {
    make_stimulus_file_with(output, corpus, &mut rand::thread_rng())
}

/// [`make_stimulus_file`] with an explicit index source.
pub fn make_stimulus_file_with<P, S>(output: P, corpus: &Corpus, source: &mut S) -> Result<Vec<usize>>
where
    P: AsRef<Path>,
    S: IndexSource + ?Sized,
{
    let output = output.as_ref();
    // Every draw is resolved before the output path is opened, so a failed
    // draw leaves an existing file untouched.
    let records = draw_records(corpus, source)?;

    let mut writer = BufWriter::new(File::create(output)?);
    let drawn = write_records(&mut writer, &records)?;
    writer.flush()?;

    info!(path = %output.display(), records = drawn.len(), "stimulus file written");
    Ok(drawn)
}

/// Draws `RECORD_COUNT` records into `writer`, printing each label as it goes.
/// Nothing is written unless every draw lands inside the pool.
pub fn write_stimulus<W, S>(writer: &mut W, corpus: &Corpus, source: &mut S) -> Result<Vec<usize>>
where
    W: Write + ?Sized,
    S: IndexSource + ?Sized,
{
    let records = draw_records(corpus, source)?;
    write_records(writer, &records)
}

/// One drawn record: pool index, image and label.
type Drawn<'a> = (usize, &'a Image, Label);

fn draw_records<'a, S>(corpus: &'a Corpus, source: &mut S) -> Result<Vec<Drawn<'a>>>
where
    S: IndexSource + ?Sized,
{
    let pool = corpus.pool_len();
    if pool == 0 {
        return Err(Error::EmptyCorpus);
    }

    (0..RECORD_COUNT)
        .map(|_| {
            let index = source.next_index(pool);
            let (image, label) = corpus.pool_get(index).ok_or_else(|| {
                Error::InvalidConfig(format!("index source produced {index}, pool has {pool} samples"))
            })?;
            Ok((index, image, label))
        })
        .collect()
}

fn write_records<W: Write + ?Sized>(writer: &mut W, records: &[Drawn<'_>]) -> Result<Vec<usize>> {
    let mut drawn = Vec::with_capacity(records.len());
    for &(index, image, label) in records {
        write_record(writer, image, label)?;
        debug!(index, %label, "drew sample");
        println!("label: {label}");
        drawn.push(index);
    }
    Ok(drawn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::corpus::Dataset;
    use crate::data::image::IMAGE_PIXELS;
    use crate::stimulus::format::{FILE_LEN, RECORD_LEN};
    use rand::{rngs::StdRng, SeedableRng};

    fn corpus(n: usize) -> Corpus {
        let images = (0..n)
            .map(|i| {
                let mut px = [0u8; IMAGE_PIXELS];
                px[0] = (i % 256) as u8;
                px[1] = (i / 256) as u8;
                px[IMAGE_PIXELS - 1] = 0xAA;
                Image::from_pixels(px)
            })
            .collect();
        let labels = (0..n).map(|i| Label::new((i % 10) as u8).unwrap()).collect();
        Corpus::new(Dataset::new(images, labels).unwrap(), Dataset::default())
    }

    #[test]
    fn writes_twenty_records_in_draw_order() {
        let corpus = corpus(50);
        let mut out = Vec::<u8>::new();
        let drawn = write_stimulus(&mut out, &corpus, &mut StdRng::seed_from_u64(7)).unwrap();

        assert_eq!(drawn.len(), RECORD_COUNT);
        assert_eq!(out.len(), FILE_LEN);
        for (record, &index) in out.chunks(RECORD_LEN).zip(&drawn) {
            let (image, label) = corpus.pool_get(index).unwrap();
            assert_eq!(&record[..IMAGE_PIXELS], image.as_bytes());
            assert_eq!(record[IMAGE_PIXELS], label.value());
        }
    }

    #[test]
    fn fixed_indices_cycle() {
        let mut source = FixedIndices::new(vec![0, 1, 2]);
        let got: Vec<usize> = (0..7).map(|_| source.next_index(3)).collect();
        assert_eq!(got, vec![0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn same_seed_same_draws() {
        let corpus = corpus(1000);
        let (mut a, mut b) = (Vec::<u8>::new(), Vec::<u8>::new());
        write_stimulus(&mut a, &corpus, &mut StdRng::seed_from_u64(42)).unwrap();
        write_stimulus(&mut b, &corpus, &mut StdRng::seed_from_u64(42)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn pool_indices_past_train_address_the_test_split() {
        let test = Dataset::new(
            vec![Image::from_pixels([1; IMAGE_PIXELS])],
            vec![Label::new(9).unwrap()],
        )
        .unwrap();
        let corpus = Corpus::new(corpus(5).train, test);
        let mut out = Vec::<u8>::new();
        let drawn = write_stimulus(&mut out, &corpus, &mut FixedIndices::new(vec![5])).unwrap();
        assert!(drawn.iter().all(|&i| i == 5));
        assert_eq!(out[0], 1);
        assert_eq!(out[RECORD_LEN - 1], 9);
    }

    #[test]
    fn empty_corpus_is_an_error() {
        let mut out = Vec::<u8>::new();
        let err = write_stimulus(&mut out, &Corpus::default(), &mut rand::thread_rng());
        assert!(matches!(err, Err(Error::EmptyCorpus)));
        assert!(out.is_empty());
    }

    #[test]
    fn out_of_range_fixed_index_is_reported() {
        let err = write_stimulus(&mut Vec::<u8>::new(), &corpus(3), &mut FixedIndices::new(vec![3]));
        assert!(matches!(err, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn late_bad_draw_writes_no_records() {
        let mut out = Vec::<u8>::new();
        let err = write_stimulus(&mut out, &corpus(3), &mut FixedIndices::new(vec![0, 1, 7]));
        assert!(matches!(err, Err(Error::InvalidConfig(_))));
        assert!(out.is_empty());
    }

    #[test]
    fn unwritable_output_propagates_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("digits.bin");
        let err = make_stimulus_file(&path, &corpus(3));
        assert!(matches!(err, Err(Error::Io(_))));
    }
}
