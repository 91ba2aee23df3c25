//! Property-based tests for the data pipeline using proptest.
//!
//! Validates invariants that must hold for ALL inputs:
//! - Pixel normalization maps [0, 255] into [-1, 1]
//! - Batch iteration yields floor(S / B) full batches
//! - Sample file names round-trip their counters

use akshar_train::data::{normalize_pixel, normalize_pixels, BatchLoader, LetterImages};
use akshar_train::gan::sample_file_name;
use akshar_train::render::to_pixel;
use candle_core::{Device, Tensor};
use proptest::prelude::*;

proptest! {
    /// Property: every pixel in [0, 255] normalizes into [-1, 1].
    #[test]
    fn normalized_pixel_in_range(v in 0.0f32..=255.0f32) {
        let n = normalize_pixel(v);
        prop_assert!((-1.0..=1.0).contains(&n), "{} -> {}", v, n);
    }

    /// Property: normalization is monotone.
    #[test]
    fn normalization_is_monotone(a in 0u8..=255, b in 0u8..=255) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(normalize_pixel(lo as f32) <= normalize_pixel(hi as f32));
    }

    /// Property: the tensor path agrees with the scalar formula.
    #[test]
    fn tensor_normalization_matches_scalar(bytes in prop::collection::vec(any::<u8>(), 1..64)) {
        let raw = Tensor::new(bytes.as_slice(), &Device::Cpu).unwrap();
        let vals = normalize_pixels(&raw).unwrap().to_vec1::<f32>().unwrap();
        for (&b, &v) in bytes.iter().zip(vals.iter()) {
            prop_assert!((v - normalize_pixel(b as f32)).abs() < 1e-5);
            prop_assert!(v >= -1.0 - 1e-6 && v <= 1.0 + 1e-6);
        }
    }

    /// Property: normalizing then rendering recovers the byte within one level.
    #[test]
    fn render_inverts_normalization(b in any::<u8>()) {
        let back = to_pixel(normalize_pixel(b as f32)) as i32;
        prop_assert!((back - b as i32).abs() <= 1);
    }

    /// Property: floor(S / B) batches of exactly B images, trailing remainder dropped.
    #[test]
    fn batch_count_is_floor(count in 1usize..40, batch in 1usize..12, seed in any::<u64>()) {
        let data = LetterImages::from_raw(vec![0u8; count * 4], 2, &Device::Cpu).unwrap();
        let loader = BatchLoader::new(&data, batch, true, seed);
        prop_assert_eq!(loader.n_batches(), count / batch);

        let sizes: Vec<usize> = loader.map(|b| b.unwrap().dim(0).unwrap()).collect();
        prop_assert_eq!(sizes.len(), count / batch);
        prop_assert!(sizes.iter().all(|&s| s == batch));
        let seen: usize = sizes.iter().sum();
        prop_assert!(seen <= count);
        prop_assert!(count - seen < batch);
    }

    /// Property: file names are zero-padded to the width of the totals and
    /// parse back to the same counters.
    #[test]
    fn sample_file_name_padding(epochs in 1usize..5000, n_batches in 1usize..5000, e in 0usize..5000, b in 0usize..5000) {
        let epoch = e % epochs + 1;
        let batch = b % n_batches + 1;
        let name = sample_file_name(epoch, epochs, batch, n_batches);

        let stem = name.strip_suffix(".png").unwrap();
        let parts: Vec<&str> = stem.split('_').collect();
        prop_assert_eq!(parts.len(), 4);
        prop_assert_eq!(parts[0], "epoch");
        prop_assert_eq!(parts[2], "batch");
        prop_assert_eq!(parts[1].len(), epochs.to_string().len());
        prop_assert_eq!(parts[3].len(), n_batches.to_string().len());
        prop_assert_eq!(parts[1].parse::<usize>().unwrap(), epoch);
        prop_assert_eq!(parts[3].parse::<usize>().unwrap(), batch);
    }
}
