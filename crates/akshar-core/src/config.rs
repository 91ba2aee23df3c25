//! Training configuration for the letter GAN.
//!
//! The two values that define a run are `batch_size` and `epochs`; every
//! other field defaults to the hyperparameters the letter generator was
//! tuned with.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{config_error, GanError, GanResult, IoResultExt};

/// Spatial resolution the network topology is built for.
pub const IMAGE_SIZE: usize = 64;

fn default_image_size() -> usize {
    IMAGE_SIZE
}

fn default_noise_dim() -> usize {
    64
}

fn default_feature_maps() -> usize {
    16
}

fn default_noise_mean() -> f64 {
    -1.0 // samples are drawn from N(-1, 1)
}

fn default_noise_std() -> f64 {
    1.0
}

fn default_real_label() -> f64 {
    0.0
}

fn default_fake_label() -> f64 {
    1.0
}

fn default_leaky_slope() -> f64 {
    0.2
}

fn default_grid() -> usize {
    4
}

fn default_final_samples() -> usize {
    32
}

fn default_seed() -> u64 {
    42
}

fn default_adam_betas() -> (f64, f64) {
    (0.9, 0.999)
}

fn default_adam_eps() -> f64 {
    1e-8
}

/// Optimizer choice for one network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OptimizerConfig {
    /// Plain stochastic gradient descent.
    Sgd { lr: f64 },
    /// Adam (decoupled weight decay, 0 for plain Adam).
    Adam {
        lr: f64,
        #[serde(default = "default_adam_betas")]
        betas: (f64, f64),
        #[serde(default = "default_adam_eps")]
        eps: f64,
        #[serde(default)]
        weight_decay: f64,
    },
}

impl OptimizerConfig {
    pub fn sgd(lr: f64) -> Self {
        OptimizerConfig::Sgd { lr }
    }

    pub fn adam(lr: f64) -> Self {
        OptimizerConfig::Adam {
            lr,
            betas: default_adam_betas(),
            eps: default_adam_eps(),
            weight_decay: 0.0,
        }
    }

    pub fn lr(&self) -> f64 {
        match self {
            OptimizerConfig::Sgd { lr } | OptimizerConfig::Adam { lr, .. } => *lr,
        }
    }
}

/// Per-network training settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub optimizer: OptimizerConfig,
    /// Record the loss every N training steps.
    pub trace_interval: usize,
}

impl NetworkConfig {
    pub fn discriminator() -> Self {
        Self {
            optimizer: OptimizerConfig::sgd(0.01),
            trace_interval: 10,
        }
    }

    pub fn generator() -> Self {
        Self {
            optimizer: OptimizerConfig::adam(0.01),
            trace_interval: 5,
        }
    }
}

/// Full GAN configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GanConfig {
    pub batch_size: usize,
    pub epochs: usize,

    // Architecture
    #[serde(default = "default_image_size")]
    pub image_size: usize,
    #[serde(default = "default_noise_dim")]
    pub noise_dim: usize,
    /// Base channel count; stages scale it by 1, 2, 4, 8, 16.
    #[serde(default = "default_feature_maps")]
    pub feature_maps: usize,
    #[serde(default = "default_leaky_slope")]
    pub leaky_slope: f64,

    // Noise distribution
    #[serde(default = "default_noise_mean")]
    pub noise_mean: f64,
    #[serde(default = "default_noise_std")]
    pub noise_std: f64,

    /// Target used for dataset images and as the generator's fooling target.
    #[serde(default = "default_real_label")]
    pub real_label: f64,
    /// Target used for generated images in the discriminator step.
    #[serde(default = "default_fake_label")]
    pub fake_label: f64,

    #[serde(default = "NetworkConfig::discriminator")]
    pub discriminator: NetworkConfig,
    #[serde(default = "NetworkConfig::generator")]
    pub generator: NetworkConfig,

    // Diagnostics
    #[serde(default = "default_grid")]
    pub grid_rows: usize,
    #[serde(default = "default_grid")]
    pub grid_cols: usize,
    /// Size of the sample batch generated once training completes.
    #[serde(default = "default_final_samples")]
    pub final_samples: usize,

    /// Images skipped at the start of the dataset file.
    #[serde(default)]
    pub dataset_offset: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl GanConfig {
    /// Configuration from the two run parameters, everything else default.
    pub fn new(batch_size: usize, epochs: usize) -> Self {
        Self {
            batch_size,
            epochs,
            image_size: default_image_size(),
            noise_dim: default_noise_dim(),
            feature_maps: default_feature_maps(),
            leaky_slope: default_leaky_slope(),
            noise_mean: default_noise_mean(),
            noise_std: default_noise_std(),
            real_label: default_real_label(),
            fake_label: default_fake_label(),
            discriminator: NetworkConfig::discriminator(),
            generator: NetworkConfig::generator(),
            grid_rows: default_grid(),
            grid_cols: default_grid(),
            final_samples: default_final_samples(),
            dataset_offset: 0,
            seed: default_seed(),
        }
    }

    /// Full letter run: 64-image batches for 100 epochs over the letter
    /// portion of the combined dataset (the first 100k entries are digits).
    pub fn nepali_letters() -> Self {
        Self {
            dataset_offset: 100_000,
            ..Self::new(64, 100)
        }
    }

    /// Small configuration for CPU smoke tests.
    pub fn tiny_cpu() -> Self {
        Self {
            feature_maps: 2,
            final_samples: 4,
            ..Self::new(4, 1)
        }
    }

    /// Validate configuration and return the list of problems found.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.batch_size == 0 {
            errors.push("batch_size must be greater than 0".to_string());
        }
        if self.epochs == 0 {
            errors.push("epochs must be greater than 0".to_string());
        }
        if self.image_size != IMAGE_SIZE {
            errors.push(format!(
                "image_size must be {} (got {}); the conv stacks are fixed",
                IMAGE_SIZE, self.image_size
            ));
        }
        if self.noise_dim == 0 {
            errors.push("noise_dim must be greater than 0".to_string());
        }
        if self.feature_maps == 0 {
            errors.push("feature_maps must be greater than 0".to_string());
        }
        if !(self.noise_std.is_finite() && self.noise_std > 0.0) {
            errors.push(format!("noise_std must be finite and > 0 (got {})", self.noise_std));
        }
        if !self.noise_mean.is_finite() {
            errors.push("noise_mean must be finite".to_string());
        }
        for (name, net) in [("discriminator", &self.discriminator), ("generator", &self.generator)] {
            if net.trace_interval == 0 {
                errors.push(format!("{}.trace_interval must be greater than 0", name));
            }
            let lr = net.optimizer.lr();
            if !(lr.is_finite() && lr > 0.0) {
                errors.push(format!("{}.optimizer.lr must be finite and > 0 (got {})", name, lr));
            }
        }
        if self.grid_rows == 0 || self.grid_cols == 0 {
            errors.push("grid_rows and grid_cols must be greater than 0".to_string());
        }
        if self.final_samples == 0 {
            errors.push("final_samples must be greater than 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate, folding all problems into a single [`GanError::Config`].
    pub fn ensure_valid(&self) -> GanResult<()> {
        self.validate().map_err(|errors| config_error(errors.join("; ")))
    }

    /// Load a configuration from a TOML file.
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> GanResult<Self> {
        let content = std::fs::read_to_string(path.as_ref()).with_path(path.as_ref())?;
        let config: Self = toml::from_str(&content).map_err(|e| {
            config_error(format!("failed to parse {}: {}", path.as_ref().display(), e))
        })?;
        config.ensure_valid()?;
        Ok(config)
    }

    /// Save the configuration as TOML.
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> GanResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| GanError::Config(format!("failed to serialize config: {}", e)))?;
        std::fs::write(path.as_ref(), content).with_path(path.as_ref())
    }
}

impl Default for GanConfig {
    fn default() -> Self {
        Self::nepali_letters()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_letter_run() {
        let cfg = GanConfig::nepali_letters();
        assert_eq!(cfg.batch_size, 64);
        assert_eq!(cfg.epochs, 100);
        assert_eq!(cfg.noise_dim, 64);
        assert_eq!(cfg.feature_maps, 16);
        assert_eq!(cfg.dataset_offset, 100_000);
        assert_eq!(cfg.discriminator.optimizer, OptimizerConfig::sgd(0.01));
        assert_eq!(cfg.generator.optimizer, OptimizerConfig::adam(0.01));
        assert_eq!(cfg.discriminator.trace_interval, 10);
        assert_eq!(cfg.generator.trace_interval, 5);
        assert_eq!(cfg.real_label, 0.0);
        assert_eq!(cfg.fake_label, 1.0);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validation_catches_errors() {
        let mut cfg = GanConfig::new(0, 0);
        cfg.image_size = 32;
        cfg.generator.trace_interval = 0;
        cfg.discriminator.optimizer = OptimizerConfig::sgd(0.0);

        let errors = cfg.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("batch_size")));
        assert!(errors.iter().any(|e| e.contains("epochs")));
        assert!(errors.iter().any(|e| e.contains("image_size")));
        assert!(errors.iter().any(|e| e.contains("generator.trace_interval")));
        assert!(errors.iter().any(|e| e.contains("discriminator.optimizer.lr")));

        let err = cfg.ensure_valid().unwrap_err();
        assert!(matches!(err, GanError::Config(_)));
    }

    #[test]
    fn test_toml_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gan.toml");

        let mut cfg = GanConfig::new(16, 3);
        cfg.seed = 7;
        cfg.save_toml(&path).unwrap();

        let loaded = GanConfig::from_toml_file(&path).unwrap();
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let cfg: GanConfig = toml::from_str("batch_size = 8\nepochs = 2\n").unwrap();
        assert_eq!(cfg.batch_size, 8);
        assert_eq!(cfg.epochs, 2);
        assert_eq!(cfg.noise_mean, -1.0);
        assert_eq!(cfg.generator, NetworkConfig::generator());
        assert_eq!(cfg.dataset_offset, 0);
    }

    #[test]
    fn test_invalid_toml_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "batch_size = 0\nepochs = 1\n").unwrap();

        let err = GanConfig::from_toml_file(&path).unwrap_err();
        assert!(err.to_string().contains("batch_size"));
    }
}
