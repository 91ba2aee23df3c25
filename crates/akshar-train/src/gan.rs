//! Adversarial training loop: alternating discriminator and generator steps.
//!
//! Each batch runs three steps in a fixed order:
//!
//! 1. discriminator on real images against `real_label`,
//! 2. discriminator on detached generated images against `fake_label`,
//! 3. generator through the just-updated discriminator against `real_label`.
//!
//! After every epoch one diagnostic batch is generated, kept in memory and
//! optionally rendered to the progress directory.

use std::path::Path;
use std::time::Instant;

use candle_core::{Device, Tensor};
use candle_nn::ModuleT;
use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use akshar_core::error::{config_error, GanResult, IoResultExt};
use akshar_core::GanConfig;

use crate::data::{BatchLoader, LetterImages};
use crate::discriminator::{Discriminator, StepStats};
use crate::generator::Generator;
use crate::logging::{self, EpochMetrics};
use crate::render;
use crate::trace::LossHistory;

/// Losses of the three steps run on one batch.
#[derive(Debug, Clone, Copy)]
pub struct BatchStats {
    pub d_real: StepStats,
    pub d_fake: StepStats,
    pub g: StepStats,
}

/// File name of the grid saved after `epoch`, e.g. `epoch_007_batch_0042.png`.
///
/// Both counters are 1-based and zero-padded to the digit count of their
/// respective totals.
pub fn sample_file_name(epoch: usize, epochs: usize, batch: usize, n_batches: usize) -> String {
    let epoch_width = epochs.to_string().len();
    let batch_width = n_batches.to_string().len();
    format!(
        "epoch_{:0ew$}_batch_{:0bw$}.png",
        epoch,
        batch,
        ew = epoch_width,
        bw = batch_width
    )
}

/// Seeded source of generator input vectors.
pub struct NoiseSampler {
    rng: StdRng,
    dist: Normal<f64>,
    dim: usize,
    device: Device,
}

impl NoiseSampler {
    pub fn new(config: &GanConfig, device: &Device) -> GanResult<Self> {
        let dist = Normal::new(config.noise_mean, config.noise_std)
            .map_err(|e| config_error(format!("invalid noise distribution: {}", e)))?;
        Ok(Self {
            rng: StdRng::seed_from_u64(config.seed),
            dist,
            dim: config.noise_dim,
            device: device.clone(),
        })
    }

    /// `[n, noise_dim]` batch of independent draws.
    pub fn sample(&mut self, n: usize) -> GanResult<Tensor> {
        let values: Vec<f32> = (0..n * self.dim)
            .map(|_| self.dist.sample(&mut self.rng) as f32)
            .collect();
        Ok(Tensor::from_vec(values, (n, self.dim), &self.device)?)
    }
}

/// Owns both networks and drives training.
pub struct Gan {
    discriminator: Discriminator,
    generator: Generator,
    config: GanConfig,
    device: Device,
    noise: NoiseSampler,
    samples: Vec<Tensor>,
    epochs_completed: usize,
}

impl Gan {
    pub fn new(config: GanConfig, device: Device) -> GanResult<Self> {
        config.ensure_valid()?;
        let noise = NoiseSampler::new(&config, &device)?;
        let discriminator = Discriminator::new(&config, &device)?;
        let generator = Generator::new(&config, &device)?;

        tracing::info!(
            discriminator_vars = discriminator.trainable_vars().len(),
            generator_vars = generator.trainable_vars().len(),
            discriminator_lr = discriminator.learning_rate(),
            generator_lr = generator.learning_rate(),
            seed = config.seed,
            device = ?device,
            "GAN initialized"
        );

        Ok(Self {
            discriminator,
            generator,
            noise,
            samples: Vec::new(),
            epochs_completed: 0,
            config,
            device,
        })
    }

    /// `[n, noise_dim]` batch drawn from the configured normal distribution.
    pub fn random_noise(&mut self, n: usize) -> GanResult<Tensor> {
        self.noise.sample(n)
    }

    fn targets(&self, label: f64, n: usize) -> GanResult<Tensor> {
        Ok(Tensor::full(label as f32, (n, 1), &self.device)?)
    }

    /// Run the three alternating steps on one batch of real images.
    pub fn train_batch(&mut self, real: &Tensor) -> GanResult<BatchStats> {
        let real = real.to_device(&self.device)?;
        let n = real.dim(0)?;
        let real_targets = self.targets(self.config.real_label, n)?;
        let fake_targets = self.targets(self.config.fake_label, n)?;

        let d_real = self.discriminator.train_step(&real, &real_targets)?;

        let noise = self.random_noise(n)?;
        let fake = self.generator.forward_t(&noise, true)?.detach();
        let d_fake = self.discriminator.train_step(&fake, &fake_targets)?;

        let noise = self.random_noise(n)?;
        let g = self
            .generator
            .train_step(&self.discriminator, &noise, &real_targets)?;

        for (network, stats) in [
            ("discriminator", d_real),
            ("discriminator", d_fake),
            ("generator", g),
        ] {
            if !stats.loss.is_finite() {
                logging::log_divergence(network, stats.step, stats.loss);
            }
        }

        Ok(BatchStats { d_real, d_fake, g })
    }

    /// Train for `config.epochs` epochs over `data`.
    ///
    /// When `progress_dir` is given it is created if missing and receives
    /// one sample grid per epoch.
    pub fn train(
        &mut self,
        data: &LetterImages,
        progress_dir: Option<&Path>,
    ) -> GanResult<Vec<EpochMetrics>> {
        if data.image_size() != self.config.image_size {
            return Err(config_error(format!(
                "dataset holds {}x{} images, networks expect {}x{}",
                data.image_size(),
                data.image_size(),
                self.config.image_size,
                self.config.image_size
            )));
        }
        let batch_size = self.config.batch_size;
        if data.len() < batch_size {
            return Err(config_error(format!(
                "dataset of {} images yields no batch of {}",
                data.len(),
                batch_size
            )));
        }
        if let Some(dir) = progress_dir {
            std::fs::create_dir_all(dir).with_path(dir)?;
        }

        let epochs = self.config.epochs;
        tracing::info!(
            images = data.len(),
            batch_size = batch_size,
            epochs = epochs,
            batches_per_epoch = data.len() / batch_size,
            "Starting training"
        );

        let mut history = Vec::with_capacity(epochs);
        for epoch in 1..=epochs {
            let metrics = self.train_epoch(data, epoch, progress_dir)?;
            history.push(metrics);
        }
        Ok(history)
    }

    fn train_epoch(
        &mut self,
        data: &LetterImages,
        epoch: usize,
        progress_dir: Option<&Path>,
    ) -> GanResult<EpochMetrics> {
        let epochs = self.config.epochs;
        let seed = self.config.seed.wrapping_add(epoch as u64);
        let loader = BatchLoader::new(data, self.config.batch_size, true, seed);
        let n_batches = loader.n_batches();

        let pb = ProgressBar::new(n_batches as u64);
        let style = ProgressStyle::with_template(
            "[{elapsed_precise}] {prefix} {bar:40.cyan/blue} {pos}/{len} {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");
        pb.set_style(style);
        pb.set_prefix(format!("epoch {}/{}", epoch, epochs));

        let start = Instant::now();
        let (mut d_real, mut d_fake, mut g) = (0.0, 0.0, 0.0);
        let mut batches = 0;
        for batch in loader {
            let stats = self.train_batch(&batch?)?;
            d_real += stats.d_real.loss;
            d_fake += stats.d_fake.loss;
            g += stats.g.loss;
            batches += 1;

            pb.set_message(format!(
                "D: {:.4} G: {:.4}",
                (stats.d_real.loss + stats.d_fake.loss) / 2.0,
                stats.g.loss
            ));
            pb.inc(1);
        }
        pb.finish_and_clear();

        let denom = batches.max(1) as f64;
        let metrics = EpochMetrics {
            d_real_loss: d_real / denom,
            d_fake_loss: d_fake / denom,
            g_loss: g / denom,
            batches,
            seconds: start.elapsed().as_secs_f64(),
        };
        logging::log_epoch(epoch, epochs, &metrics);

        let sample = self.sample(self.config.batch_size)?;
        if let Some(dir) = progress_dir {
            let path = dir.join(sample_file_name(epoch, epochs, batches, n_batches));
            render::save_grid(&sample, self.config.grid_rows, self.config.grid_cols, &path)?;
            logging::log_sample_saved(epoch, &path);
        }
        self.samples.push(sample);
        self.epochs_completed += 1;

        Ok(metrics)
    }

    /// Generator output for `noise`, detached from the graph.
    ///
    /// Runs with batch statistics, the same mode used while training.
    pub fn generate(&self, noise: &Tensor) -> GanResult<Tensor> {
        Ok(self.generator.forward_t(noise, true)?.detach())
    }

    /// `n` images from fresh noise.
    pub fn sample(&mut self, n: usize) -> GanResult<Tensor> {
        let noise = self.random_noise(n)?;
        self.generate(&noise)
    }

    pub fn loss_history(&self) -> LossHistory {
        LossHistory {
            discriminator: self.discriminator.progress().clone(),
            generator: self.generator.progress().clone(),
        }
    }

    /// Per-epoch diagnostic batches, oldest first.
    pub fn samples(&self) -> &[Tensor] {
        &self.samples
    }

    pub fn epochs_completed(&self) -> usize {
        self.epochs_completed
    }

    pub fn discriminator(&self) -> &Discriminator {
        &self.discriminator
    }

    pub fn generator(&self) -> &Generator {
        &self.generator
    }

    pub fn config(&self) -> &GanConfig {
        &self.config
    }

    pub fn device(&self) -> &Device {
        &self.device
    }
}
