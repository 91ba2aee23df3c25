//! Generator: noise vectors to 64x64 single-channel images in [-1, 1].

use candle_core::{DType, Device, Result, Tensor, Var};
use candle_nn::{ConvTranspose2d, ConvTranspose2dConfig, Module, ModuleT, VarBuilder, VarMap};

use akshar_core::{GanConfig, NetworkConfig};

use crate::discriminator::{Discriminator, StepStats};
use crate::init::{seeded_init, ConvKind, GENERATOR_STREAM};
use crate::layers::{UpBlock, KERNEL};
use crate::optim::{trainable_vars, NetOptimizer};
use crate::trace::LossTrace;

/// Transposed-conv generator with its own optimizer and loss trace.
pub struct Generator {
    blocks: Vec<UpBlock>,
    to_image: ConvTranspose2d,
    noise_dim: usize,
    varmap: VarMap,
    optimizer: NetOptimizer,
    counter: usize,
    progress: LossTrace,
}

impl Generator {
    /// Build a fresh generator whose weights depend only on `config.seed`.
    pub fn new(config: &GanConfig, device: &Device) -> Result<Self> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let net = Self::build(config, &config.generator, varmap, vb)?;
        seeded_init(&net.varmap, ConvKind::Transposed, config.seed ^ GENERATOR_STREAM)?;
        Ok(net)
    }

    fn build(
        config: &GanConfig,
        net: &NetworkConfig,
        varmap: VarMap,
        vb: VarBuilder,
    ) -> Result<Self> {
        let maps = config.feature_maps;

        // noise -> 16m @ 4x4, then 8m @ 8, 4m @ 16, 2m @ 32
        let mut blocks = Vec::with_capacity(4);
        blocks.push(UpBlock::new(config.noise_dim, 16 * maps, 1, 0, vb.pp("model.0"))?);
        let mut channels = 16 * maps;
        for i in 1..4 {
            blocks.push(UpBlock::doubling(channels, channels / 2, vb.pp(format!("model.{}", i)))?);
            channels /= 2;
        }

        let cfg = ConvTranspose2dConfig {
            stride: 2,
            padding: 1,
            ..Default::default()
        };
        let to_image = candle_nn::conv_transpose2d_no_bias(channels, 1, KERNEL, cfg, vb.pp("to_image"))?;

        let optimizer = NetOptimizer::from_config(trainable_vars(&varmap), &net.optimizer)?;

        Ok(Self {
            blocks,
            to_image,
            noise_dim: config.noise_dim,
            varmap,
            optimizer,
            counter: 0,
            progress: LossTrace::new(net.trace_interval),
        })
    }

    /// Evaluation-mode forward. `[N, noise_dim] -> [N, 1, 64, 64]`.
    pub fn forward(&self, noise: &Tensor) -> Result<Tensor> {
        self.forward_t(noise, false)
    }

    /// One optimization step: make the discriminator label fakes as `targets`.
    ///
    /// The discriminator is only read. Gradients reach its variables but its
    /// optimizer is never stepped here, so its weights stay as they were.
    pub fn train_step(
        &mut self,
        discriminator: &Discriminator,
        noise: &Tensor,
        targets: &Tensor,
    ) -> Result<StepStats> {
        let fake = self.forward_t(noise, true)?;
        let logits = discriminator.forward_t(&fake, true)?;
        let loss = discriminator.loss(&logits, targets)?;
        let loss_val = loss.to_scalar::<f32>()? as f64;

        self.counter += 1;
        self.progress.record(self.counter, loss_val);

        self.optimizer.backward_step(&loss)?;

        Ok(StepStats {
            loss: loss_val,
            step: self.counter,
        })
    }

    pub fn noise_dim(&self) -> usize {
        self.noise_dim
    }

    pub fn step_count(&self) -> usize {
        self.counter
    }

    pub fn progress(&self) -> &LossTrace {
        &self.progress
    }

    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    /// Mutable access for loading saved weights into the store.
    pub fn varmap_mut(&mut self) -> &mut VarMap {
        &mut self.varmap
    }

    pub fn trainable_vars(&self) -> Vec<Var> {
        trainable_vars(&self.varmap)
    }

    pub fn learning_rate(&self) -> f64 {
        self.optimizer.learning_rate()
    }
}

impl ModuleT for Generator {
    fn forward_t(&self, noise: &Tensor, train: bool) -> Result<Tensor> {
        let n = noise.dim(0)?;
        let mut xs = noise.reshape((n, self.noise_dim, 1, 1))?;
        for block in &self.blocks {
            xs = block.forward_t(&xs, train)?;
        }
        self.to_image.forward(&xs)?.tanh()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(vars: &[Var]) -> Result<Vec<Vec<f32>>> {
        vars.iter()
            .map(|v| v.as_tensor().flatten_all()?.to_vec1::<f32>())
            .collect()
    }

    #[test]
    fn test_forward_shape_and_range() -> Result<()> {
        let device = Device::Cpu;
        let cfg = GanConfig::tiny_cpu();
        let g = Generator::new(&cfg, &device)?;
        let noise = Tensor::randn(-1f32, 1.0, (3, cfg.noise_dim), &device)?;

        for train in [false, true] {
            let images = g.forward_t(&noise, train)?;
            assert_eq!(images.dims(), &[3, 1, 64, 64]);
            let min = images.min_all()?.to_scalar::<f32>()?;
            let max = images.max_all()?.to_scalar::<f32>()?;
            assert!(min >= -1.0 && max <= 1.0, "tanh range violated: [{}, {}]", min, max);
        }
        Ok(())
    }

    #[test]
    fn test_full_size_forward_shape() -> Result<()> {
        let device = Device::Cpu;
        let cfg = GanConfig::new(2, 1);
        let g = Generator::new(&cfg, &device)?;
        let noise = Tensor::randn(-1f32, 1.0, (2, 64), &device)?;
        assert_eq!(g.forward(&noise)?.dims(), &[2, 1, 64, 64]);
        Ok(())
    }

    #[test]
    fn test_train_step_moves_only_generator() -> Result<()> {
        let device = Device::Cpu;
        let cfg = GanConfig::tiny_cpu();
        let mut g = Generator::new(&cfg, &device)?;
        let d = Discriminator::new(&cfg, &device)?;
        let noise = Tensor::randn(-1f32, 1.0, (4, cfg.noise_dim), &device)?;
        let targets = Tensor::zeros((4, 1), DType::F32, &device)?;

        let g_before = snapshot(&g.trainable_vars())?;
        let d_before = snapshot(&d.trainable_vars())?;
        let stats = g.train_step(&d, &noise, &targets)?;

        assert!(stats.loss.is_finite());
        assert_ne!(g_before, snapshot(&g.trainable_vars())?);
        assert_eq!(d_before, snapshot(&d.trainable_vars())?);
        assert_eq!(d.step_count(), 0);
        Ok(())
    }

    #[test]
    fn test_trace_every_fifth_step() -> Result<()> {
        let device = Device::Cpu;
        let cfg = GanConfig::tiny_cpu();
        let mut g = Generator::new(&cfg, &device)?;
        let d = Discriminator::new(&cfg, &device)?;
        let noise = Tensor::randn(-1f32, 1.0, (2, cfg.noise_dim), &device)?;
        let targets = Tensor::zeros((2, 1), DType::F32, &device)?;

        for step in 1..=12 {
            g.train_step(&d, &noise, &targets)?;
            assert_eq!(g.progress().len(), step / 5);
        }
        assert_eq!(g.step_count(), 12);
        Ok(())
    }
}
