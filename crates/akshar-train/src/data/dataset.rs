//! Letter image collection and batched iteration.

use candle_core::{DType, Device, Result, Tensor};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::path::Path;

use akshar_core::error::{dataset_error, GanResult};

/// Map a raw pixel in [0, 255] to [-1, 1].
pub fn normalize_pixel(v: f32) -> f32 {
    2.0 * v / 255.0 - 1.0
}

/// Element-wise [`normalize_pixel`] over a whole tensor, returned as f32.
pub fn normalize_pixels(raw: &Tensor) -> Result<Tensor> {
    raw.to_dtype(DType::F32)?.affine(2.0 / 255.0, -1.0)
}

/// Normalized single-channel images, shape `[N, 1, S, S]`, values in [-1, 1].
#[derive(Debug, Clone)]
pub struct LetterImages {
    images: Tensor,
    image_size: usize,
}

impl LetterImages {
    /// Build from raw pixels shaped `[N, S, S]` or `[N, 1, S, S]`, any dtype.
    pub fn from_pixels(pixels: &Tensor) -> Result<Self> {
        let pixels = match pixels.rank() {
            3 => pixels.unsqueeze(1)?,
            4 if pixels.dim(1)? == 1 => pixels.clone(),
            _ => candle_core::bail!(
                "expected images shaped [N, S, S] or [N, 1, S, S], got {:?}",
                pixels.dims()
            ),
        };
        let (_, _, h, w) = pixels.dims4()?;
        if h != w {
            candle_core::bail!("images must be square, got {}x{}", h, w);
        }
        Ok(Self {
            images: normalize_pixels(&pixels)?,
            image_size: h,
        })
    }

    /// Build from a flat buffer of `N * S * S` u8 pixels.
    pub fn from_raw(bytes: Vec<u8>, image_size: usize, device: &Device) -> Result<Self> {
        let per_image = image_size * image_size;
        if per_image == 0 || bytes.len() % per_image != 0 {
            candle_core::bail!(
                "{} bytes is not a whole number of {}x{} images",
                bytes.len(),
                image_size,
                image_size
            );
        }
        let count = bytes.len() / per_image;
        let pixels = Tensor::from_vec(bytes, (count, image_size, image_size), device)?;
        Self::from_pixels(&pixels)
    }

    /// Load a dataset file, skipping the first `offset` images.
    ///
    /// `.npy` and `.safetensors` files keep their dtype; anything else is
    /// read as flat u8 pixels.
    pub fn load(path: &Path, image_size: usize, offset: usize, device: &Device) -> GanResult<Self> {
        if !path.exists() {
            return Err(dataset_error("file not found", path));
        }
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let pixels = match ext {
            "npy" => Tensor::read_npy(path)
                .map_err(|e| dataset_error(e.to_string(), path))?
                .to_device(device)?,
            "safetensors" => {
                let mut tensors = candle_core::safetensors::load(path, device)
                    .map_err(|e| dataset_error(e.to_string(), path))?;
                match tensors.remove("images") {
                    Some(t) => t,
                    None if tensors.len() == 1 => {
                        tensors.into_values().next().ok_or_else(|| dataset_error("empty file", path))?
                    }
                    None => {
                        return Err(dataset_error(
                            "expected a tensor named 'images' or a single tensor",
                            path,
                        ))
                    }
                }
            }
            _ => {
                let bytes = std::fs::read(path).map_err(|e| dataset_error(e.to_string(), path))?;
                let per_image = image_size * image_size;
                if bytes.len() % per_image != 0 {
                    return Err(dataset_error(
                        format!(
                            "{} bytes is not a multiple of {} ({}x{} images)",
                            bytes.len(),
                            per_image,
                            image_size,
                            image_size
                        ),
                        path,
                    ));
                }
                let count = bytes.len() / per_image;
                Tensor::from_vec(bytes, (count, image_size, image_size), device)?
            }
        };

        let count = pixels.dim(0)?;
        if offset >= count {
            return Err(dataset_error(
                format!("offset {} leaves no images (file holds {})", offset, count),
                path,
            ));
        }
        let pixels = pixels.narrow(0, offset, count - offset)?;

        let images = Self::from_pixels(&pixels).map_err(|e| dataset_error(e.to_string(), path))?;
        if images.image_size != image_size {
            return Err(dataset_error(
                format!(
                    "expected {}x{} images, file holds {}x{}",
                    image_size, image_size, images.image_size, images.image_size
                ),
                path,
            ));
        }

        tracing::info!(
            path = %path.display(),
            images = images.len(),
            skipped = offset,
            "Dataset loaded"
        );
        Ok(images)
    }

    pub fn len(&self) -> usize {
        self.images.dims()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn image_size(&self) -> usize {
        self.image_size
    }

    pub fn device(&self) -> &Device {
        self.images.device()
    }

    /// The whole normalized collection.
    pub fn images(&self) -> &Tensor {
        &self.images
    }
}

/// Shuffled mini-batch iterator that drops the trailing partial batch.
pub struct BatchLoader<'a> {
    data: &'a LetterImages,
    batch_size: usize,
    indices: Vec<u32>,
    pos: usize,
}

impl<'a> BatchLoader<'a> {
    pub fn new(data: &'a LetterImages, batch_size: usize, shuffle: bool, seed: u64) -> Self {
        assert!(batch_size > 0, "batch_size must be > 0");
        let mut indices: Vec<u32> = (0..data.len() as u32).collect();
        if shuffle {
            let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
            indices.shuffle(&mut rng);
        }
        Self {
            data,
            batch_size,
            indices,
            pos: 0,
        }
    }

    /// Full batches per pass: `floor(len / batch_size)`.
    pub fn n_batches(&self) -> usize {
        self.indices.len() / self.batch_size
    }
}

impl Iterator for BatchLoader<'_> {
    type Item = Result<Tensor>;

    fn next(&mut self) -> Option<Self::Item> {
        let end = self.pos + self.batch_size;
        if end > self.indices.len() {
            return None;
        }
        let batch = &self.indices[self.pos..end];
        self.pos = end;

        let result = Tensor::from_slice(batch, self.batch_size, self.data.device())
            .and_then(|idx| self.data.images.index_select(&idx, 0));
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_images(count: usize, size: usize) -> Result<LetterImages> {
        // image i is filled with pixel value i
        let bytes: Vec<u8> = (0..count)
            .flat_map(|i| std::iter::repeat(i as u8).take(size * size))
            .collect();
        LetterImages::from_raw(bytes, size, &Device::Cpu)
    }

    #[test]
    fn test_normalize_pixel_endpoints() {
        assert_eq!(normalize_pixel(0.0), -1.0);
        assert_eq!(normalize_pixel(255.0), 1.0);
        assert!(normalize_pixel(127.5).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_pixels_tensor() -> Result<()> {
        let raw = Tensor::new(&[0u8, 51, 255], &Device::Cpu)?;
        let vals = normalize_pixels(&raw)?.to_vec1::<f32>()?;
        assert!((vals[0] + 1.0).abs() < 1e-6);
        assert!((vals[1] - normalize_pixel(51.0)).abs() < 1e-6);
        assert!((vals[2] - 1.0).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_from_raw_shape_and_range() -> Result<()> {
        let data = ramp_images(5, 4)?;
        assert_eq!(data.len(), 5);
        assert_eq!(data.images().dims(), &[5, 1, 4, 4]);
        let min = data.images().min_all()?.to_scalar::<f32>()?;
        let max = data.images().max_all()?.to_scalar::<f32>()?;
        assert!(min >= -1.0 && max <= 1.0);
        Ok(())
    }

    #[test]
    fn test_from_raw_rejects_partial_image() {
        assert!(LetterImages::from_raw(vec![0u8; 17], 4, &Device::Cpu).is_err());
    }

    #[test]
    fn test_from_pixels_rejects_multichannel() -> Result<()> {
        let pixels = Tensor::zeros((2, 3, 4, 4), DType::U8, &Device::Cpu)?;
        assert!(LetterImages::from_pixels(&pixels).is_err());
        Ok(())
    }

    #[test]
    fn test_loader_drops_partial_batch() -> Result<()> {
        let data = ramp_images(10, 4)?;
        let loader = BatchLoader::new(&data, 4, true, 7);
        assert_eq!(loader.n_batches(), 2);

        let batches = loader.collect::<Result<Vec<_>>>()?;
        assert_eq!(batches.len(), 2);
        for batch in &batches {
            assert_eq!(batch.dims(), &[4, 1, 4, 4]);
        }
        Ok(())
    }

    #[test]
    fn test_loader_unshuffled_preserves_order() -> Result<()> {
        let data = ramp_images(6, 2)?;
        let mut loader = BatchLoader::new(&data, 3, false, 0);
        let first = loader.next().unwrap()?;
        let firsts = first.flatten_from(1)?.narrow(1, 0, 1)?.squeeze(1)?.to_vec1::<f32>()?;
        let expected: Vec<f32> = (0..3).map(|i| normalize_pixel(i as f32)).collect();
        for (a, b) in firsts.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
        Ok(())
    }

    #[test]
    fn test_loader_shuffle_depends_on_seed() -> Result<()> {
        let data = ramp_images(32, 2)?;
        let order = |seed| -> Result<Vec<f32>> {
            let batch = BatchLoader::new(&data, 32, true, seed).next().unwrap()?;
            batch.flatten_from(1)?.narrow(1, 0, 1)?.squeeze(1)?.to_vec1::<f32>()
        };
        assert_eq!(order(1)?, order(1)?);
        assert_ne!(order(1)?, order(2)?);
        Ok(())
    }

    #[test]
    fn test_load_raw_file_with_offset() -> GanResult<()> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("letters.bin");
        let bytes: Vec<u8> = (0..4u8).flat_map(|i| vec![i * 50; 64 * 64]).collect();
        std::fs::write(&path, bytes).unwrap();

        let data = LetterImages::load(&path, 64, 1, &Device::Cpu)?;
        assert_eq!(data.len(), 3);
        let first = data.images().get(0)?.flatten_all()?.to_vec1::<f32>()?;
        assert!((first[0] - normalize_pixel(50.0)).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_load_safetensors() -> GanResult<()> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("letters.safetensors");
        let pixels = Tensor::full(255u8, (3, 64, 64), &Device::Cpu)?;
        candle_core::safetensors::save(
            &std::collections::HashMap::from([("images".to_string(), pixels)]),
            &path,
        )?;

        let data = LetterImages::load(&path, 64, 0, &Device::Cpu)?;
        assert_eq!(data.len(), 3);
        let min = data.images().min_all()?.to_scalar::<f32>()?;
        assert!((min - 1.0).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_load_missing_file_is_error() {
        let err = LetterImages::load(Path::new("/nonexistent/letters.npy"), 64, 0, &Device::Cpu)
            .unwrap_err();
        assert_eq!(err.path(), Some("/nonexistent/letters.npy"));
    }

    #[test]
    fn test_load_rejects_offset_past_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("letters.bin");
        std::fs::write(&path, vec![0u8; 2 * 64 * 64]).unwrap();
        assert!(LetterImages::load(&path, 64, 2, &Device::Cpu).is_err());
    }
}
