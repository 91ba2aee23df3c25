pub mod dataset;

pub use dataset::{normalize_pixel, normalize_pixels, BatchLoader, LetterImages};
