//! CLI entry point for akshar-train.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use candle_core::Device;
use clap::{Parser, Subcommand};

use akshar_core::GanConfig;
use akshar_train::gan::{Gan, NoiseSampler};
use akshar_train::{checkpoint, data::LetterImages, logging, render};

const LOSS_PLOT_SIZE: (u32, u32) = (800, 500);

fn resolve_device(device: &str) -> Result<Device> {
    match device {
        "cpu" => Ok(Device::Cpu),
        #[cfg(feature = "cuda")]
        "cuda" => Device::new_cuda(0).context("failed to initialize CUDA device 0"),
        #[cfg(feature = "cuda")]
        s if s.starts_with("cuda:") => {
            let id: usize = s["cuda:".len()..]
                .parse()
                .with_context(|| format!("invalid CUDA device id in '{}'", s))?;
            Device::new_cuda(id).with_context(|| format!("failed to initialize CUDA device {}", id))
        }
        other => bail!("unknown device: {}. Use 'cpu', 'cuda', or 'cuda:N'.", other),
    }
}

#[derive(Parser)]
#[command(
    name = "akshar-train",
    about = "Train a DCGAN on handwritten Nepali letters"
)]
struct Cli {
    /// Emit JSON log lines instead of console output
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train the GAN and save the generator
    Train {
        /// Dataset file (.npy, .safetensors, or raw u8 pixels)
        #[arg(long)]
        data: PathBuf,
        /// TOML config; CLI flags override its values
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        batch_size: Option<usize>,
        #[arg(long)]
        epochs: Option<usize>,
        /// Images to skip at the start of the dataset
        #[arg(long)]
        offset: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long, default_value = "cpu")]
        device: String,
        /// Per-epoch sample grids
        #[arg(long, default_value = "progress")]
        progress_dir: PathBuf,
        #[arg(long, default_value = "checkpoints")]
        checkpoint_dir: PathBuf,
        /// Final samples and loss curves
        #[arg(long, default_value = "output")]
        output_dir: PathBuf,
        /// Also save the discriminator weights
        #[arg(long)]
        save_discriminator: bool,
    },
    /// Generate a sample grid from a saved generator
    Generate {
        /// Checkpoint directory
        #[arg(long)]
        checkpoint: PathBuf,
        #[arg(long, default_value = "samples.png")]
        output: PathBuf,
        /// Number of images (defaults to the checkpoint's final_samples)
        #[arg(long)]
        count: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long, default_value = "cpu")]
        device: String,
    },
}

struct TrainArgs {
    data: PathBuf,
    progress_dir: PathBuf,
    checkpoint_dir: PathBuf,
    output_dir: PathBuf,
    save_discriminator: bool,
}

/// Rows needed to lay out `count` images `cols` wide.
fn grid_rows(count: usize, cols: usize) -> usize {
    count.div_ceil(cols.max(1)).max(1)
}

fn run_train(config: GanConfig, device: Device, args: TrainArgs) -> Result<()> {
    tracing::info!("=== akshar-train ===");
    tracing::info!("Device: {:?}", device);
    tracing::info!("Batch size: {}", config.batch_size);
    tracing::info!("Epochs: {}", config.epochs);
    tracing::info!("Seed: {}", config.seed);

    let data = LetterImages::load(&args.data, config.image_size, config.dataset_offset, &device)
        .context("failed to load dataset")?;

    let mut gan = Gan::new(config, device).context("failed to build networks")?;
    gan.train(&data, Some(args.progress_dir.as_path())).context("training failed")?;

    checkpoint::save_generator(&gan, &args.checkpoint_dir).context("failed to save generator")?;
    if args.save_discriminator {
        checkpoint::save_discriminator(&gan, &args.checkpoint_dir)
            .context("failed to save discriminator")?;
    }

    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("failed to create {}", args.output_dir.display()))?;

    let count = gan.config().final_samples;
    let cols = gan.config().grid_cols;
    let samples = gan.sample(count)?;
    let samples_path = args.output_dir.join("samples.png");
    render::save_grid(&samples, grid_rows(count, cols), cols, &samples_path)?;
    tracing::info!(path = %samples_path.display(), count = count, "Final samples saved");

    let history = gan.loss_history();
    let (w, h) = LOSS_PLOT_SIZE;
    render::save_loss_curves(&history, w, h, &args.output_dir.join("losses.png"))?;
    render::save_loss_history_json(&history, &args.output_dir.join("losses.json"))?;

    checkpoint::save_generator(&gan, &args.checkpoint_dir).context("failed to save generator")?;

    tracing::info!(
        discriminator_steps = gan.discriminator().step_count(),
        generator_steps = gan.generator().step_count(),
        "Training complete"
    );
    Ok(())
}

fn run_generate(
    checkpoint_dir: &Path,
    output: &Path,
    count: Option<usize>,
    seed: Option<u64>,
    device: Device,
) -> Result<()> {
    let (generator, meta) = checkpoint::load_generator(checkpoint_dir, &device)
        .with_context(|| format!("failed to load checkpoint {}", checkpoint_dir.display()))?;

    let mut config = meta.config;
    if let Some(seed) = seed {
        config.seed = seed;
    }
    let count = count.unwrap_or(config.final_samples);
    if count == 0 {
        bail!("--count must be > 0");
    }

    let noise = NoiseSampler::new(&config, &device)?.sample(count)?;
    let images = generator.forward(&noise)?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    render::save_grid(&images, grid_rows(count, config.grid_cols), config.grid_cols, output)?;
    tracing::info!(path = %output.display(), count = count, "Samples generated");
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.json_logs {
        logging::init_logging();
    } else {
        logging::init_console_logging();
    }

    match cli.command {
        Commands::Train {
            data,
            config,
            batch_size,
            epochs,
            offset,
            seed,
            device,
            progress_dir,
            checkpoint_dir,
            output_dir,
            save_discriminator,
        } => {
            let device = resolve_device(&device)?;

            let mut cfg = match config {
                Some(path) => GanConfig::from_toml_file(&path)
                    .with_context(|| format!("failed to load config {}", path.display()))?,
                None => GanConfig::nepali_letters(),
            };
            if let Some(bs) = batch_size {
                cfg.batch_size = bs;
            }
            if let Some(epochs) = epochs {
                cfg.epochs = epochs;
            }
            if let Some(offset) = offset {
                cfg.dataset_offset = offset;
            }
            if let Some(seed) = seed {
                cfg.seed = seed;
            }
            cfg.ensure_valid()?;

            run_train(
                cfg,
                device,
                TrainArgs {
                    data,
                    progress_dir,
                    checkpoint_dir,
                    output_dir,
                    save_discriminator,
                },
            )
        }
        Commands::Generate {
            checkpoint,
            output,
            count,
            seed,
            device,
        } => {
            let device = resolve_device(&device)?;
            run_generate(&checkpoint, &output, count, seed, device)
        }
    }
}
