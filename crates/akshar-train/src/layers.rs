//! Convolutional stages shared by the discriminator and generator.

use candle_core::{Result, Tensor};
use candle_nn::{
    BatchNorm, BatchNormConfig, Conv2d, Conv2dConfig, ConvTranspose2d, ConvTranspose2dConfig,
    Module, ModuleT, VarBuilder,
};

/// Kernel size of every down/up-sampling stage.
pub const KERNEL: usize = 4;

fn halving_conv() -> Conv2dConfig {
    Conv2dConfig {
        stride: 2,
        padding: 1,
        ..Default::default()
    }
}

/// Strided conv that halves the resolution, optionally batch-normalized,
/// followed by LeakyReLU.
///
/// The normalized variant drops the conv bias since BN's shift replaces it.
pub struct DownBlock {
    conv: Conv2d,
    norm: Option<BatchNorm>,
    slope: f64,
}

impl DownBlock {
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        normalize: bool,
        slope: f64,
        vb: VarBuilder,
    ) -> Result<Self> {
        let (conv, norm) = if normalize {
            let conv = candle_nn::conv2d_no_bias(
                in_channels,
                out_channels,
                KERNEL,
                halving_conv(),
                vb.pp("conv"),
            )?;
            let norm = candle_nn::batch_norm(out_channels, BatchNormConfig::default(), vb.pp("bn"))?;
            (conv, Some(norm))
        } else {
            let conv = candle_nn::conv2d(in_channels, out_channels, KERNEL, halving_conv(), vb.pp("conv"))?;
            (conv, None)
        };
        Ok(Self { conv, norm, slope })
    }
}

impl ModuleT for DownBlock {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        let xs = self.conv.forward(xs)?;
        let xs = match &self.norm {
            Some(norm) => norm.forward_t(&xs, train)?,
            None => xs,
        };
        candle_nn::ops::leaky_relu(&xs, self.slope)
    }
}

/// Bias-free transposed conv, batch norm, ReLU.
pub struct UpBlock {
    conv: ConvTranspose2d,
    norm: BatchNorm,
}

impl UpBlock {
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        stride: usize,
        padding: usize,
        vb: VarBuilder,
    ) -> Result<Self> {
        let cfg = ConvTranspose2dConfig {
            stride,
            padding,
            ..Default::default()
        };
        let conv = candle_nn::conv_transpose2d_no_bias(in_channels, out_channels, KERNEL, cfg, vb.pp("conv"))?;
        let norm = candle_nn::batch_norm(out_channels, BatchNormConfig::default(), vb.pp("bn"))?;
        Ok(Self { conv, norm })
    }

    /// Stage that doubles the resolution (k4 s2 p1).
    pub fn doubling(in_channels: usize, out_channels: usize, vb: VarBuilder) -> Result<Self> {
        Self::new(in_channels, out_channels, 2, 1, vb)
    }
}

impl ModuleT for UpBlock {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        let xs = self.conv.forward(xs)?;
        self.norm.forward_t(&xs, train)?.relu()
    }
}
