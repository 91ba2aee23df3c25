//! # Akshar Training Library
//!
//! DCGAN training for 64x64 handwritten Nepali letters on candle.
//!
//! ## Architecture Overview
//!
//! - **Data**: raw [0, 255] pixels normalized once to [-1, 1], shuffled
//!   mini-batches with the trailing partial batch dropped
//! - **Networks**: strided-conv discriminator (SGD) and transposed-conv
//!   generator (Adam), each owning its parameters, optimizer and loss trace
//! - **Training**: [`gan::Gan`] alternates discriminator-real,
//!   discriminator-fake and generator steps on every batch
//! - **Outputs**: per-epoch sample grids, loss curves and generator weights
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use akshar_core::GanConfig;
//! use akshar_train::{data::LetterImages, gan::Gan};
//! use candle_core::Device;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = GanConfig::nepali_letters();
//! let data = LetterImages::load(
//!     "letters.npy".as_ref(),
//!     config.image_size,
//!     config.dataset_offset,
//!     &Device::Cpu,
//! )?;
//! let mut gan = Gan::new(config, Device::Cpu)?;
//! gan.train(&data, Some("progress".as_ref()))?;
//! # Ok(())
//! # }
//! ```

pub mod checkpoint;
pub mod data;
pub mod discriminator;
pub mod gan;
pub mod generator;
pub mod init;
pub mod layers;
pub mod logging;
pub mod loss;
pub mod optim;
pub mod render;
pub mod trace;

pub use discriminator::{Discriminator, StepStats};
pub use gan::{BatchStats, Gan, NoiseSampler};
pub use generator::Generator;
