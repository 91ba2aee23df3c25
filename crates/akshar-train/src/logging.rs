//! Structured logging for GAN training with tracing.
//!
//! JSON output for long runs, a pretty console layer for interactive use,
//! and per-epoch events with warnings for degenerate loss values.

use std::path::Path;

use tracing::{debug, error, info, span, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Discriminator loss under which the generator is no longer learning anything.
const SATURATION_THRESHOLD: f64 = 1e-3;

/// Initialize structured logging.
///
/// Reads the level from `RUST_LOG` (defaults to "info") and writes JSON lines.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,akshar_train=info,akshar_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Structured logging initialized");
}

/// Initialize human-readable console logging.
pub fn init_console_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,akshar_train=info".into()))
        .with(tracing_subscriber::fmt::layer().compact())
        .init();
}

/// Mean losses over one epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochMetrics {
    /// Discriminator loss on real batches.
    pub d_real_loss: f64,
    /// Discriminator loss on generated batches.
    pub d_fake_loss: f64,
    /// Generator loss against the fooling target.
    pub g_loss: f64,
    pub batches: usize,
    pub seconds: f64,
}

impl EpochMetrics {
    /// Mean discriminator loss over both of its steps.
    pub fn d_loss(&self) -> f64 {
        (self.d_real_loss + self.d_fake_loss) / 2.0
    }

    pub fn is_finite(&self) -> bool {
        self.d_real_loss.is_finite() && self.d_fake_loss.is_finite() && self.g_loss.is_finite()
    }
}

/// Log a completed epoch.
///
/// Non-finite losses are reported at error level; a saturated discriminator
/// emits a warning.
pub fn log_epoch(epoch: usize, epochs: usize, metrics: &EpochMetrics) {
    let span = span!(Level::INFO, "epoch", epoch = epoch);
    let _enter = span.enter();

    if !metrics.is_finite() {
        error!(
            epoch = epoch,
            d_real_loss = metrics.d_real_loss,
            d_fake_loss = metrics.d_fake_loss,
            g_loss = metrics.g_loss,
            "Training diverged! NaN or infinite loss detected"
        );
        return;
    }

    info!(
        epoch = epoch,
        epochs = epochs,
        d_loss = metrics.d_loss(),
        g_loss = metrics.g_loss,
        batches = metrics.batches,
        seconds = metrics.seconds,
        "Epoch completed"
    );

    if metrics.d_loss() < SATURATION_THRESHOLD {
        warn!(
            d_loss = metrics.d_loss(),
            threshold = SATURATION_THRESHOLD,
            "Discriminator saturated - generator gradients are vanishing"
        );
    }

    debug!(
        d_real_loss = metrics.d_real_loss,
        d_fake_loss = metrics.d_fake_loss,
        "Discriminator loss breakdown"
    );
}

/// Log a single non-finite step loss.
pub fn log_divergence(network: &str, step: usize, loss: f64) {
    error!(
        network = network,
        step = step,
        loss = loss,
        event = "divergence",
        "Non-finite loss"
    );
}

/// Log a sample grid written to disk.
pub fn log_sample_saved(epoch: usize, path: &Path) {
    info!(
        epoch = epoch,
        path = %path.display(),
        event = "sample_saved",
        "Sample grid saved"
    );
}

/// Log checkpoint save event for `network` after `steps` of its own updates.
pub fn log_checkpoint_save(path: &Path, network: &str, epochs_completed: usize, steps: usize) {
    info!(
        path = %path.display(),
        network = network,
        epochs_completed = epochs_completed,
        steps = steps,
        event = "checkpoint_saved",
        "Checkpoint saved successfully"
    );
}
