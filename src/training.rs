//! Fit a basis table to sample images with PCA.
//!
//! Random 8x8 blocks are drawn from every image, converted to value vectors,
//! and the leading eigenvectors of their covariance become the basis.

use nalgebra::{DMatrix, SymmetricEigen};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::basis::{BasisTable, ValueVector};
use crate::consts::{BLOCK_SIZE, NUM_COEFFICIENTS, VALUES_PER_BLOCK};
use crate::frame::RgbImage;
use crate::transform::block_to_vector;
use crate::{NanoError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FitConfig {
    /// Blocks drawn from each image.
    pub samples_per_image: usize,
    pub seed: u64,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            samples_per_image: 1024,
            seed: 0,
        }
    }
}

/// Draw `count` blocks at uniformly random positions. Images smaller than a
/// block yield nothing.
pub fn sample_blocks<R: Rng>(image: &RgbImage, count: usize, rng: &mut R) -> Vec<ValueVector> {
    let (width, height) = (image.width() as usize, image.height() as usize);
    if width < BLOCK_SIZE || height < BLOCK_SIZE {
        return Vec::new();
    }

    let stride = image.stride();
    (0..count)
        .map(|_| {
            let x = rng.gen_range(0..=width - BLOCK_SIZE);
            let y = rng.gen_range(0..=height - BLOCK_SIZE);
            let mut v = [0f32; VALUES_PER_BLOCK];
            block_to_vector(&image.data()[y * stride + x * 3..], stride, &mut v);
            v
        })
        .collect()
}

pub fn fit_basis(images: &[RgbImage], config: &FitConfig) -> Result<BasisTable> {
    let mut rng = StdRng::seed_from_u64(config.seed);

    let samples: Vec<ValueVector> = images
        .iter()
        .flat_map(|image| sample_blocks(image, config.samples_per_image, &mut rng))
        .collect();

    let n = samples.len();
    if n < 2 {
        return Err(NanoError::NotEnoughSamples { found: n });
    }
    debug!(images = images.len(), samples = n, "sampled training blocks");

    let mut mean = [0f64; VALUES_PER_BLOCK];
    for s in &samples {
        for (m, &v) in mean.iter_mut().zip(s.iter()) {
            *m += v as f64;
        }
    }
    for m in mean.iter_mut() {
        *m /= n as f64;
    }

    let centered = DMatrix::<f64>::from_fn(n, VALUES_PER_BLOCK, |i, j| samples[i][j] as f64 - mean[j]);
    let covariance = (centered.transpose() * &centered) / (n - 1) as f64;

    let eigen = SymmetricEigen::new(covariance);
    let mut order: Vec<usize> = (0..VALUES_PER_BLOCK).collect();
    order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));

    let total: f64 = eigen.eigenvalues.iter().map(|v| v.max(0.0)).sum();
    let kept: f64 = order[..NUM_COEFFICIENTS]
        .iter()
        .map(|&i| eigen.eigenvalues[i].max(0.0))
        .sum();
    info!(
        samples = n,
        retained = if total > 0.0 { kept / total } else { 0.0 },
        "fitted basis"
    );

    let mut vectors = [[0f32; VALUES_PER_BLOCK]; NUM_COEFFICIENTS];
    for (row, &idx) in vectors.iter_mut().zip(order.iter()) {
        let column = eigen.eigenvectors.column(idx);

        // Eigenvector sign is arbitrary; pin the largest component positive
        let pivot = column
            .iter()
            .copied()
            .max_by(|a, b| a.abs().total_cmp(&b.abs()))
            .unwrap_or(1.0);
        let sign = if pivot < 0.0 { -1.0 } else { 1.0 };

        for (dst, &v) in row.iter_mut().zip(column.iter()) {
            *dst = (sign * v) as f32;
        }
    }

    let mut mean_f32 = [0f32; VALUES_PER_BLOCK];
    for (dst, &m) in mean_f32.iter_mut().zip(mean.iter()) {
        *dst = m as f32;
    }

    BasisTable::from_parts(mean_f32, vectors)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Smooth synthetic image with some colour variation.
    fn synthetic_image(width: u32, height: u32, phase: f32) -> RgbImage {
        let mut image = RgbImage::new(width, height);
        let stride = image.stride();
        for y in 0..height as usize {
            for x in 0..width as usize {
                let fx = x as f32 / width as f32;
                let fy = y as f32 / height as f32;
                let i = y * stride + x * 3;
                let px = &mut image.data_mut()[i..i + 3];
                px[0] = (127.5 + 127.5 * (6.0 * fx + phase).sin()) as u8;
                px[1] = (127.5 + 127.5 * (4.0 * fy - phase).cos()) as u8;
                px[2] = (255.0 * (fx * fy)) as u8;
            }
        }
        image
    }

    #[test]
    fn test_sample_blocks_small_image() {
        let mut rng = StdRng::seed_from_u64(1);
        let image = RgbImage::new(7, 20);
        assert!(sample_blocks(&image, 10, &mut rng).is_empty());

        let image = RgbImage::new(8, 8);
        assert_eq!(sample_blocks(&image, 10, &mut rng).len(), 10);
    }

    #[test]
    fn test_fit_needs_two_samples() {
        let images = [synthetic_image(8, 8, 0.0)];
        let config = FitConfig {
            samples_per_image: 1,
            seed: 0,
        };
        assert!(matches!(
            fit_basis(&images, &config),
            Err(NanoError::NotEnoughSamples { found: 1 })
        ));
    }

    #[test]
    fn test_fit_is_deterministic_and_orthonormal() {
        let images = [synthetic_image(64, 48, 0.0), synthetic_image(40, 40, 1.3)];
        let config = FitConfig {
            samples_per_image: 200,
            seed: 7,
        };

        let a = fit_basis(&images, &config).unwrap();
        let b = fit_basis(&images, &config).unwrap();
        assert_eq!(a, b);

        // from_parts already rejects non-orthonormal sets; also check unit norm
        for v in a.vectors() {
            let norm: f32 = v.iter().map(|x| x * x).sum();
            assert!((norm - 1.0).abs() < 1e-3);
        }
        assert!(a.mean().iter().all(|&m| (0.0..=1.0).contains(&m)));
    }
}
