use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::EnvFilter;

use mnist_testbench::export::{export_all, MemoryMap, DEFAULT_MEMORY_SIZE};
use mnist_testbench::render::save_png;
use mnist_testbench::{
    create_and_train, make_stimulus_file, make_stimulus_file_with, print_image, Corpus, Network,
    NetworkSpec, TrainConfig, Verbosity,
};

/// MNIST tooling for the inference accelerator testbench
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Directory holding the four MNIST IDX files (optionally gzipped).
    #[clap(long, env = "MNIST_DATA_DIR", default_value = "data/mnist", global = true)]
    data_dir: PathBuf,
    /// Log filter, e.g. `warn`, `info` or `mnist_testbench=debug`.
    #[clap(long, default_value = "warn", global = true)]
    log_level: String,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Draw 20 random digits into a binary stimulus file.
    Stimulus {
        #[clap(long, default_value = "../data/testbench_digits.bin")]
        output: PathBuf,
        /// Seed for reproducible draws; unseeded runs differ.
        #[clap(long)]
        seed: Option<u64>,
    },
    /// Train the reference CNN and report its test error.
    Train {
        #[clap(long, default_value_t = 10)]
        epochs: usize,
        #[clap(long, default_value_t = 200)]
        batch_size: usize,
        /// 0 = silent, 1 = progress bar, 2 = one line per epoch.
        #[clap(long, default_value_t = 1)]
        verbose: u8,
        /// Save the trained network as JSON.
        #[clap(long)]
        model_out: Option<PathBuf>,
        /// Also write the hardware bundle (headers, hex files, weights_float.bin).
        #[clap(long)]
        export_dir: Option<PathBuf>,
        #[clap(long, default_value_t = DEFAULT_MEMORY_SIZE)]
        memory_size: usize,
    },
    /// Print one digit of the pool as ASCII intensities.
    Print {
        #[clap(long)]
        index: usize,
        /// Also save the digit as a PNG.
        #[clap(long)]
        png: Option<PathBuf>,
    },
    /// Write the hardware bundle for a saved model.
    Export {
        #[clap(long)]
        model: PathBuf,
        #[clap(long)]
        out_dir: PathBuf,
        #[clap(long, default_value_t = DEFAULT_MEMORY_SIZE)]
        memory_size: usize,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&args.log_level).context("invalid --log-level")?)
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Command::Stimulus { output, seed } => {
            let corpus = load_corpus(&args.data_dir)?;
            let drawn = match seed {
                Some(seed) => make_stimulus_file_with(&output, &corpus, &mut StdRng::seed_from_u64(seed)),
                None => make_stimulus_file(&output, &corpus),
            }
            .with_context(|| format!("failed to write stimulus file {}", output.display()))?;
            tracing::info!("wrote {} digits to {}", drawn.len(), output.display());
        }
        Command::Train { epochs, batch_size, verbose, model_out, export_dir, memory_size } => {
            let verbosity = Verbosity::try_from(verbose)?;
            if export_dir.is_some() {
                // Reject an undersized memory before spending a training run on it.
                MemoryMap::from_network(&NetworkSpec::mnist_cnn().build()?)
                    .check_memory_size(memory_size)
                    .context("invalid --memory-size")?;
            }
            let corpus = load_corpus(&args.data_dir)?;
            let config = TrainConfig::new(epochs, batch_size, verbosity);
            let model = create_and_train(&corpus, &config).context("training failed")?;

            if let Some(path) = model_out {
                model
                    .network
                    .save_json(&path)
                    .with_context(|| format!("failed to save model to {}", path.display()))?;
                tracing::info!("saved model to {}", path.display());
            }
            if let Some(dir) = export_dir {
                export_all(&model.network, &dir, memory_size)
                    .with_context(|| format!("failed to export to {}", dir.display()))?;
            }
        }
        Command::Print { index, png } => {
            let corpus = load_corpus(&args.data_dir)?;
            let Some((image, label)) = corpus.pool_get(index) else {
                bail!("index {index} is outside the pool of {} digits", corpus.pool_len());
            };
            println!("label: {label}");
            print_image(&image.normalized())?;
            if let Some(path) = png {
                save_png(image, &path).with_context(|| format!("failed to save {}", path.display()))?;
            }
        }
        Command::Export { model, out_dir, memory_size } => {
            let network = Network::load_json(&model)
                .with_context(|| format!("failed to load model {}", model.display()))?;
            export_all(&network, &out_dir, memory_size)
                .with_context(|| format!("failed to export to {}", out_dir.display()))?;
        }
    }

    Ok(())
}

fn load_corpus(dir: &std::path::Path) -> Result<Corpus> {
    Corpus::load_dir(dir).with_context(|| format!("failed to load MNIST from {}", dir.display()))
}
