//! Block transform: RGB8 blocks to and from value space, and projection onto
//! the basis table.

use crate::basis::{BasisTable, ValueVector};
use crate::consts::{BLOCK_SIZE, CHANNELS, NUM_COEFFICIENTS, PIXELS_PER_BLOCK};

/// One weight per basis vector.
pub type CoefficientVector = [f32; NUM_COEFFICIENTS];

#[inline(always)]
fn u8_to_f32(x: u8) -> f32 {
    x as f32 * (1.0 / 255.0)
}

/// Clamp to `[0, 1]`, scale, round half to even. NaN maps to 0.
#[inline(always)]
fn f32_to_u8(x: f32) -> u8 {
    let y = if x >= 0.0 { x.min(1.0) } else { 0.0 };
    (y * 255.0).round_ties_even().clamp(0.0, 255.0) as u8
}

/// Read one block starting at the first byte of `src`.
///
/// `src` must hold `(BLOCK_SIZE - 1) * stride + BLOCK_SIZE * CHANNELS` bytes.
pub fn block_to_vector(src: &[u8], stride: usize, out: &mut ValueVector) {
    let (r, rest) = out.split_at_mut(PIXELS_PER_BLOCK);
    let (g, b) = rest.split_at_mut(PIXELS_PER_BLOCK);

    for y in 0..BLOCK_SIZE {
        let line = &src[y * stride..y * stride + BLOCK_SIZE * CHANNELS];
        for (x, px) in line.chunks_exact(CHANNELS).enumerate() {
            let idx = y * BLOCK_SIZE + x;
            r[idx] = u8_to_f32(px[0]);
            g[idx] = u8_to_f32(px[1]);
            b[idx] = u8_to_f32(px[2]);
        }
    }
}

/// Write one block starting at the first byte of `dst`. Only the
/// `BLOCK_SIZE * CHANNELS` leading bytes of each row are touched.
pub fn vector_to_block(v: &ValueVector, stride: usize, dst: &mut [u8]) {
    let (r, rest) = v.split_at(PIXELS_PER_BLOCK);
    let (g, b) = rest.split_at(PIXELS_PER_BLOCK);

    for y in 0..BLOCK_SIZE {
        let line = &mut dst[y * stride..y * stride + BLOCK_SIZE * CHANNELS];
        for (x, px) in line.chunks_exact_mut(CHANNELS).enumerate() {
            let idx = y * BLOCK_SIZE + x;
            px[0] = f32_to_u8(r[idx]);
            px[1] = f32_to_u8(g[idx]);
            px[2] = f32_to_u8(b[idx]);
        }
    }
}

/// Dot product of `(v - mean)` with every basis vector.
pub fn project_to_coefficients(v: &ValueVector, basis: &BasisTable) -> CoefficientVector {
    let mean = basis.mean();
    let mut out = [0f32; NUM_COEFFICIENTS];

    for (coeff, direction) in out.iter_mut().zip(basis.vectors().iter()) {
        *coeff = v
            .iter()
            .zip(mean.iter())
            .zip(direction.iter())
            .map(|((&x, &m), &d)| (x - m) * d)
            .sum();
    }
    out
}

/// `mean + sum(coefficient[i] * basis[i])`.
pub fn reconstruct_from_coefficients(coefficients: &CoefficientVector, basis: &BasisTable) -> ValueVector {
    let mut out = *basis.mean();
    for (&c, direction) in coefficients.iter().zip(basis.vectors().iter()) {
        for (o, &d) in out.iter_mut().zip(direction.iter()) {
            *o += c * d;
        }
    }
    out
}
