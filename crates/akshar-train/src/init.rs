//! Seeded weight initialization.
//!
//! candle draws initial weights from its own global RNG, so two networks
//! built from the same config differ. [`seeded_init`] redraws every conv
//! weight and bias from a `StdRng` with the same distributions candle uses
//! by default, which makes construction a pure function of the seed.

use candle_core::{Result, Tensor, Var};
use candle_nn::VarMap;
use rand::distributions::Uniform;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Normal;

/// Seed offsets so the two networks never share a stream.
pub const DISCRIMINATOR_STREAM: u64 = 0xD15C;
pub const GENERATOR_STREAM: u64 = 0x6E7E;

/// Which candle constructor produced the rank-4 weights of a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvKind {
    /// `conv2d`: weight `[out, in, k, k]`, Kaiming normal over fan-in,
    /// bias uniform in `±1/sqrt(in)`.
    Forward,
    /// `conv_transpose2d`: weight `[in, out, k, k]`, uniform in
    /// `±1/(sqrt(out)*k)`.
    Transposed,
}

enum Draw {
    Normal(f32),
    Uniform(f32),
}

fn weight_draw(kind: ConvKind, dims: &[usize]) -> Draw {
    match kind {
        ConvKind::Forward => {
            let fan_in: usize = dims[1..].iter().product();
            Draw::Normal((2.0 / fan_in as f32).sqrt())
        }
        ConvKind::Transposed => Draw::Uniform(1.0 / (dims[1] as f32).sqrt() / dims[2] as f32),
    }
}

fn sample(rng: &mut StdRng, draw: &Draw, n: usize) -> Result<Vec<f32>> {
    match *draw {
        Draw::Normal(std) => {
            let dist = Normal::new(0f32, std).map_err(candle_core::Error::wrap)?;
            Ok((0..n).map(|_| rng.sample(dist)).collect())
        }
        Draw::Uniform(bound) => {
            let dist = Uniform::new_inclusive(-bound, bound);
            Ok((0..n).map(|_| rng.sample(dist)).collect())
        }
    }
}

fn redraw(var: &Var, rng: &mut StdRng, draw: &Draw) -> Result<()> {
    let values = sample(rng, draw, var.elem_count())?;
    let fresh = Tensor::from_vec(values, var.dims(), var.device())?.to_dtype(var.dtype())?;
    var.set(&fresh)
}

/// Redraw the conv parameters of `varmap` from `seed`.
///
/// Variables are visited in name order. Batch-norm parameters and running
/// statistics keep their constant initial values.
pub fn seeded_init(varmap: &VarMap, kind: ConvKind, seed: u64) -> Result<()> {
    let mut named: Vec<(String, Var)> = {
        let data = varmap.data().lock().unwrap_or_else(|e| e.into_inner());
        data.iter().map(|(n, v)| (n.clone(), v.clone())).collect()
    };
    named.sort_by(|a, b| a.0.cmp(&b.0));

    let rank4 = |name: &str| {
        named
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.dims().to_vec())
            .filter(|dims| dims.len() == 4)
    };

    let mut rng = StdRng::seed_from_u64(seed);
    for (name, var) in &named {
        let draw = if name.ends_with(".weight") {
            match rank4(name) {
                Some(dims) => weight_draw(kind, &dims),
                None => continue,
            }
        } else if let Some(prefix) = name.strip_suffix(".bias") {
            match (kind, rank4(&format!("{}.weight", prefix))) {
                (ConvKind::Forward, Some(dims)) => Draw::Uniform(1.0 / (dims[1] as f32).sqrt()),
                _ => continue,
            }
        } else {
            continue;
        };
        redraw(var, &mut rng, &draw)?;
    }
    Ok(())
}
