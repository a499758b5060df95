//! The basis table: one mean vector plus `NUM_COEFFICIENTS` orthonormal
//! directions in value space.
//!
//! A table is built once (either [`BasisTable::builtin`] or loaded from a file
//! produced by [`crate::training::fit_basis`]) and then shared read-only by
//! every encode and decode call.

use std::f64::consts::PI;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::consts::{BLOCK_SIZE, CHANNELS, NUM_COEFFICIENTS, PIXELS_PER_BLOCK, VALUES_PER_BLOCK};
use crate::{NanoError, Result};

/// File magic for serialized basis tables.
pub const BASIS_MAGIC: [u8; 4] = *b"NSBT";
pub const BASIS_FILE_VERSION: u32 = 1;

/// Maximum deviation from orthonormality accepted by [`BasisTable::from_parts`].
const ORTHONORMAL_TOLERANCE: f32 = 1e-3;

/// A value-space vector: channel-major, every sample in `[0, 1]` for real pixels.
pub type ValueVector = [f32; VALUES_PER_BLOCK];

#[derive(Debug, Clone, PartialEq)]
pub struct BasisTable {
    mean: ValueVector,
    vectors: [ValueVector; NUM_COEFFICIENTS],
}

impl BasisTable {
    /// Build a table from raw parts, checking that the vectors are finite and
    /// orthonormal.
    pub fn from_parts(mean: ValueVector, vectors: [ValueVector; NUM_COEFFICIENTS]) -> Result<Self> {
        if mean.iter().any(|v| !v.is_finite()) {
            return Err(NanoError::InvalidBasis("mean contains non-finite values".into()));
        }

        for (i, a) in vectors.iter().enumerate() {
            if a.iter().any(|v| !v.is_finite()) {
                return Err(NanoError::InvalidBasis(format!(
                    "basis vector {} contains non-finite values",
                    i
                )));
            }
            for (j, b) in vectors.iter().enumerate().skip(i) {
                let expected = if i == j { 1.0 } else { 0.0 };
                let d = dot(a, b);
                if (d - expected).abs() > ORTHONORMAL_TOLERANCE {
                    return Err(NanoError::InvalidBasis(format!(
                        "<b{}, b{}> = {} (expected {})",
                        i, j, d, expected
                    )));
                }
            }
        }

        Ok(Self { mean, vectors })
    }

    /// Analytic table used when no trained table is supplied.
    ///
    /// The mean is mid-gray. The directions are, in order: luma DC, luma
    /// horizontal and vertical first cosines, the two chroma-opponent DC
    /// directions (R-G and R+G-2B), then the luma cosines (1,1), (2,0) and
    /// (0,2). The three DC directions span every block of constant colour.
    pub fn builtin() -> Self {
        let mean = [0.5f32; VALUES_PER_BLOCK];

        let rgb = [1.0, 1.0, 1.0];
        let red_green = [1.0, -1.0, 0.0];
        let yellow_blue = [1.0, 1.0, -2.0];

        let vectors = [
            cosine_direction(0, 0, rgb),
            cosine_direction(1, 0, rgb),
            cosine_direction(0, 1, rgb),
            cosine_direction(0, 0, red_green),
            cosine_direction(0, 0, yellow_blue),
            cosine_direction(1, 1, rgb),
            cosine_direction(2, 0, rgb),
            cosine_direction(0, 2, rgb),
        ];

        Self { mean, vectors }
    }

    #[inline]
    pub fn mean(&self) -> &ValueVector {
        &self.mean
    }

    #[inline]
    pub fn vectors(&self) -> &[ValueVector; NUM_COEFFICIENTS] {
        &self.vectors
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::read_from(BufReader::new(file))
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Serialize as `magic, version, values-per-block, count`, then the mean
    /// and each vector, all little-endian.
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(&BASIS_MAGIC)?;
        writer.write_all(&BASIS_FILE_VERSION.to_le_bytes())?;
        writer.write_all(&(VALUES_PER_BLOCK as u32).to_le_bytes())?;
        writer.write_all(&(NUM_COEFFICIENTS as u32).to_le_bytes())?;

        for row in std::iter::once(&self.mean).chain(self.vectors.iter()) {
            for value in row {
                writer.write_all(&value.to_le_bytes())?;
            }
        }
        Ok(())
    }

    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != BASIS_MAGIC {
            return Err(NanoError::UnsupportedFormat);
        }

        let version = read_u32(&mut reader)?;
        if version != BASIS_FILE_VERSION {
            return Err(NanoError::UnsupportedFormat);
        }

        let values = read_u32(&mut reader)? as usize;
        let count = read_u32(&mut reader)? as usize;
        if values != VALUES_PER_BLOCK || count != NUM_COEFFICIENTS {
            return Err(NanoError::InvalidBasis(format!(
                "table is {} x {}, codec expects {} x {}",
                count, values, NUM_COEFFICIENTS, VALUES_PER_BLOCK
            )));
        }

        let mut mean = [0f32; VALUES_PER_BLOCK];
        read_row(&mut reader, &mut mean)?;

        let mut vectors = [[0f32; VALUES_PER_BLOCK]; NUM_COEFFICIENTS];
        for row in vectors.iter_mut() {
            read_row(&mut reader, row)?;
        }

        Self::from_parts(mean, vectors)
    }
}

impl Default for BasisTable {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Separable 2D cosine `(u, v)` replicated across channels with the given
/// per-channel weights, normalized to unit length.
fn cosine_direction(u: usize, v: usize, weights: [f64; CHANNELS]) -> ValueVector {
    let n = BLOCK_SIZE as f64;
    let scale = |k: usize| if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
    let weight_norm = weights.iter().map(|w| w * w).sum::<f64>().sqrt();

    let mut out = [0f32; VALUES_PER_BLOCK];
    for (c, &w) in weights.iter().enumerate() {
        for y in 0..BLOCK_SIZE {
            let cy = scale(v) * (((2 * y + 1) * v) as f64 * PI / (2.0 * n)).cos();
            for x in 0..BLOCK_SIZE {
                let cx = scale(u) * (((2 * x + 1) * u) as f64 * PI / (2.0 * n)).cos();
                out[c * PIXELS_PER_BLOCK + y * BLOCK_SIZE + x] = (w / weight_norm * cx * cy) as f32;
            }
        }
    }
    out
}

fn dot(a: &ValueVector, b: &ValueVector) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_row<R: Read>(reader: &mut R, row: &mut ValueVector) -> Result<()> {
    let mut buf = [0u8; 4];
    for value in row.iter_mut() {
        reader.read_exact(&mut buf)?;
        *value = f32::from_le_bytes(buf);
    }
    Ok(())
}
