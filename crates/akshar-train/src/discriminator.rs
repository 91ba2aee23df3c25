//! Discriminator: image batch to one real/fake logit per image.

use candle_core::{DType, Device, Result, Tensor, Var};
use candle_nn::{Conv2d, Conv2dConfig, Module, ModuleT, VarBuilder, VarMap};

use akshar_core::{GanConfig, NetworkConfig};

use crate::init::{seeded_init, ConvKind, DISCRIMINATOR_STREAM};
use crate::layers::DownBlock;
use crate::loss::bce_with_logits;
use crate::optim::{trainable_vars, NetOptimizer};
use crate::trace::LossTrace;

/// Number of resolution-halving stages (64 -> 2).
const DOWN_STAGES: usize = 5;

/// Outcome of one training step.
#[derive(Debug, Clone, Copy)]
pub struct StepStats {
    pub loss: f64,
    /// 1-based step count of the network after this step.
    pub step: usize,
}

/// Convolutional real/fake classifier with its own optimizer and loss trace.
pub struct Discriminator {
    blocks: Vec<DownBlock>,
    head: Conv2d,
    varmap: VarMap,
    optimizer: NetOptimizer,
    counter: usize,
    progress: LossTrace,
}

impl Discriminator {
    /// Build a fresh discriminator whose weights depend only on `config.seed`.
    pub fn new(config: &GanConfig, device: &Device) -> Result<Self> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let net = Self::build(config, &config.discriminator, varmap, vb)?;
        seeded_init(&net.varmap, ConvKind::Forward, config.seed ^ DISCRIMINATOR_STREAM)?;
        Ok(net)
    }

    fn build(
        config: &GanConfig,
        net: &NetworkConfig,
        varmap: VarMap,
        vb: VarBuilder,
    ) -> Result<Self> {
        let maps = config.feature_maps;

        // 1 -> m -> 2m -> 4m -> 8m -> 16m channels, 64 -> 2 pixels
        let mut blocks = Vec::with_capacity(DOWN_STAGES);
        let mut in_channels = 1;
        for i in 0..DOWN_STAGES {
            let out_channels = maps << i;
            blocks.push(DownBlock::new(
                in_channels,
                out_channels,
                i > 0,
                config.leaky_slope,
                vb.pp(format!("features.{}", i)),
            )?);
            in_channels = out_channels;
        }

        let head = candle_nn::conv2d(in_channels, 1, 2, Conv2dConfig::default(), vb.pp("head"))?;

        let optimizer = NetOptimizer::from_config(trainable_vars(&varmap), &net.optimizer)?;

        Ok(Self {
            blocks,
            head,
            varmap,
            optimizer,
            counter: 0,
            progress: LossTrace::new(net.trace_interval),
        })
    }

    /// Evaluation-mode forward: uses batch-norm running statistics and
    /// leaves all state untouched. `[N, 1, 64, 64] -> [N, 1]`.
    pub fn forward(&self, images: &Tensor) -> Result<Tensor> {
        self.forward_t(images, false)
    }

    /// Binary cross-entropy between logits and targets.
    pub fn loss(&self, logits: &Tensor, targets: &Tensor) -> Result<Tensor> {
        bce_with_logits(logits, targets)
    }

    /// One optimization step on `images` against `targets`.
    pub fn train_step(&mut self, images: &Tensor, targets: &Tensor) -> Result<StepStats> {
        let logits = self.forward_t(images, true)?;
        let loss = self.loss(&logits, targets)?;
        let loss_val = loss.to_scalar::<f32>()? as f64;

        self.counter += 1;
        self.progress.record(self.counter, loss_val);

        self.optimizer.backward_step(&loss)?;

        Ok(StepStats {
            loss: loss_val,
            step: self.counter,
        })
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

    pub fn trainable_vars(&self) -> Vec<Var> {
        trainable_vars(&self.varmap)
    }

    pub fn learning_rate(&self) -> f64 {
        self.optimizer.learning_rate()
    }
}

impl ModuleT for Discriminator {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        let mut xs = xs.clone();
        for block in &self.blocks {
            xs = block.forward_t(&xs, train)?;
        }
        self.head.forward(&xs)?.flatten_from(1)
    }
}
