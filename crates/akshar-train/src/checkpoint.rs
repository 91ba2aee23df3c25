//! Network weight save/load.

use std::path::{Path, PathBuf};

use candle_core::Device;
use serde::{Deserialize, Serialize};

use akshar_core::error::{checkpoint_error, GanResult, IoResultExt};
use akshar_core::GanConfig;

use crate::gan::Gan;
use crate::generator::Generator;
use crate::logging;

pub const GENERATOR_WEIGHTS: &str = "generator.safetensors";
pub const DISCRIMINATOR_WEIGHTS: &str = "discriminator.safetensors";
pub const META_FILE: &str = "meta.json";

/// Metadata stored alongside network weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointMeta {
    pub config: GanConfig,
    pub epochs_completed: usize,
    pub discriminator_steps: usize,
    pub generator_steps: usize,
}

impl CheckpointMeta {
    pub fn from_gan(gan: &Gan) -> Self {
        Self {
            config: gan.config().clone(),
            epochs_completed: gan.epochs_completed(),
            discriminator_steps: gan.discriminator().step_count(),
            generator_steps: gan.generator().step_count(),
        }
    }
}

fn write_meta(gan: &Gan, dir: &Path) -> GanResult<()> {
    let path = dir.join(META_FILE);
    let json = serde_json::to_string_pretty(&CheckpointMeta::from_gan(gan))?;
    std::fs::write(&path, json).with_path(&path)
}

/// Save generator weights and run metadata to `dir`.
///
/// Creates:
///   - `<dir>/generator.safetensors`, all generator variables including
///     batch-norm running statistics
///   - `<dir>/meta.json`, config and step counters
pub fn save_generator(gan: &Gan, dir: &Path) -> GanResult<PathBuf> {
    std::fs::create_dir_all(dir).with_path(dir)?;

    let weights = dir.join(GENERATOR_WEIGHTS);
    gan.generator()
        .varmap()
        .save(&weights)
        .map_err(|e| checkpoint_error(e.to_string(), &weights))?;
    write_meta(gan, dir)?;

    logging::log_checkpoint_save(
        &weights,
        "generator",
        gan.epochs_completed(),
        gan.generator().step_count(),
    );
    Ok(weights)
}

/// Save discriminator weights and run metadata to `dir`.
pub fn save_discriminator(gan: &Gan, dir: &Path) -> GanResult<PathBuf> {
    std::fs::create_dir_all(dir).with_path(dir)?;

    let weights = dir.join(DISCRIMINATOR_WEIGHTS);
    gan.discriminator()
        .varmap()
        .save(&weights)
        .map_err(|e| checkpoint_error(e.to_string(), &weights))?;
    write_meta(gan, dir)?;

    logging::log_checkpoint_save(
        &weights,
        "discriminator",
        gan.epochs_completed(),
        gan.discriminator().step_count(),
    );
    Ok(weights)
}

pub fn load_meta(dir: &Path) -> GanResult<CheckpointMeta> {
    let path = dir.join(META_FILE);
    if !path.exists() {
        return Err(checkpoint_error("metadata not found", &path));
    }
    let json = std::fs::read_to_string(&path).with_path(&path)?;
    serde_json::from_str(&json).map_err(|e| checkpoint_error(e.to_string(), &path))
}

/// Rebuild the generator saved in `dir`.
///
/// The architecture comes from the stored config; every variable is then
/// overwritten from the weights file.
pub fn load_generator(dir: &Path, device: &Device) -> GanResult<(Generator, CheckpointMeta)> {
    let meta = load_meta(dir)?;
    meta.config.ensure_valid()?;

    let weights = dir.join(GENERATOR_WEIGHTS);
    if !weights.exists() {
        return Err(checkpoint_error("generator weights not found", &weights));
    }
    let mut generator = Generator::new(&meta.config, device)?;
    generator
        .varmap_mut()
        .load(&weights)
        .map_err(|e| checkpoint_error(e.to_string(), &weights))?;

    tracing::info!(
        path = %weights.display(),
        epochs_completed = meta.epochs_completed,
        "Generator loaded"
    );
    Ok((generator, meta))
}

#[cfg(test)]
mod tests {
    use super::*;
    use akshar_core::GanError;
    use candle_core::Tensor;

    #[test]
    fn test_save_creates_files() -> GanResult<()> {
        let dir = tempfile::tempdir().unwrap();
        let gan = Gan::new(GanConfig::tiny_cpu(), Device::Cpu)?;

        let g_path = save_generator(&gan, dir.path())?;
        let d_path = save_discriminator(&gan, dir.path())?;
        assert!(g_path.exists());
        assert!(d_path.exists());
        assert!(dir.path().join(META_FILE).exists());

        let meta = load_meta(dir.path())?;
        assert_eq!(meta.config, GanConfig::tiny_cpu());
        assert_eq!(meta.epochs_completed, 0);
        Ok(())
    }

    #[test]
    fn test_generator_roundtrip() -> GanResult<()> {
        let dir = tempfile::tempdir().unwrap();
        let device = Device::Cpu;
        let mut gan = Gan::new(GanConfig::tiny_cpu(), device.clone())?;
        // move the weights and running stats away from their init values
        let real = Tensor::zeros((4, 1, 64, 64), candle_core::DType::F32, &device)?;
        gan.train_batch(&real)?;
        save_generator(&gan, dir.path())?;

        let (loaded, meta) = load_generator(dir.path(), &device)?;
        assert_eq!(meta.generator_steps, 1);
        assert_eq!(meta.discriminator_steps, 2);

        let noise = gan.random_noise(2)?;
        let expected = gan.generator().forward(&noise)?.flatten_all()?.to_vec1::<f32>()?;
        let actual = loaded.forward(&noise)?.flatten_all()?.to_vec1::<f32>()?;
        assert_eq!(expected, actual);
        Ok(())
    }

    #[test]
    fn test_load_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_generator(&dir.path().join("nope"), &Device::Cpu);
        assert!(matches!(result, Err(GanError::Checkpoint { .. })));
    }
}
