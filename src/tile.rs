//! Tile encode/decode: runs the block transform and quantizer over every
//! block of a tile and lays the results out in a fixed-size packet.
//!
//! Packet layout:
//! - `NUM_COEFFICIENTS` x f32 LE: bounds minima
//! - `NUM_COEFFICIENTS` x f32 LE: bounds maxima
//! - `BLOCKS_PER_TILE` x `RECORD_SIZE` bytes: one record per block, row-major

use crate::basis::BasisTable;
use crate::consts::{
    BLOCKS_PER_COLUMN, BLOCKS_PER_ROW, BLOCKS_PER_TILE, BLOCK_SIZE, BOUNDS_SIZE, CHANNELS,
    NUM_COEFFICIENTS, PACKET_SIZE, RECORD_SIZE, TILE_HEIGHT, TILE_ROW_BYTES, VALUES_PER_BLOCK,
};
use crate::quantizer::{dequantize, quantize, QuantizedRecord, TileBounds};
use crate::transform::{
    block_to_vector, project_to_coefficients, reconstruct_from_coefficients, vector_to_block,
    CoefficientVector,
};
use crate::{NanoError, Result};

/// One encoded tile.
pub type Packet = [u8; PACKET_SIZE];

const F32_SIZE: usize = std::mem::size_of::<f32>();

/// Bytes a tile buffer with this stride must hold.
pub fn required_tile_len(stride: usize) -> usize {
    (TILE_HEIGHT - 1) * stride + TILE_ROW_BYTES
}

/// Validate a tile buffer once, before any per-block work.
pub fn check_tile_buffer(len: usize, stride: usize) -> Result<()> {
    if stride < TILE_ROW_BYTES {
        return Err(NanoError::InvalidStride {
            stride,
            min: TILE_ROW_BYTES,
        });
    }

    let required = required_tile_len(stride);
    if len < required {
        return Err(NanoError::BufferTooSmall {
            required,
            provided: len,
        });
    }
    Ok(())
}

#[inline(always)]
fn block_offset(block_x: usize, block_y: usize, stride: usize) -> usize {
    block_y * BLOCK_SIZE * stride + block_x * BLOCK_SIZE * CHANNELS
}

pub fn write_bounds(bounds: &TileBounds, packet: &mut Packet) {
    let (min_bytes, rest) = packet.split_at_mut(NUM_COEFFICIENTS * F32_SIZE);
    let max_bytes = &mut rest[..NUM_COEFFICIENTS * F32_SIZE];

    for (dst, v) in min_bytes.chunks_exact_mut(F32_SIZE).zip(bounds.min.iter()) {
        dst.copy_from_slice(&v.to_le_bytes());
    }
    for (dst, v) in max_bytes.chunks_exact_mut(F32_SIZE).zip(bounds.max.iter()) {
        dst.copy_from_slice(&v.to_le_bytes());
    }
}

pub fn read_bounds(packet: &Packet) -> TileBounds {
    let mut bounds = TileBounds::new();
    let (min_bytes, rest) = packet.split_at(NUM_COEFFICIENTS * F32_SIZE);
    let max_bytes = &rest[..NUM_COEFFICIENTS * F32_SIZE];

    for (v, src) in bounds.min.iter_mut().zip(min_bytes.chunks_exact(F32_SIZE)) {
        *v = f32::from_le_bytes([src[0], src[1], src[2], src[3]]);
    }
    for (v, src) in bounds.max.iter_mut().zip(max_bytes.chunks_exact(F32_SIZE)) {
        *v = f32::from_le_bytes([src[0], src[1], src[2], src[3]]);
    }
    bounds
}

/// The quantized record of block `index` (row-major).
pub fn record(packet: &Packet, index: usize) -> QuantizedRecord {
    let start = BOUNDS_SIZE + index * RECORD_SIZE;
    let mut out = [0u8; RECORD_SIZE];
    out.copy_from_slice(&packet[start..start + RECORD_SIZE]);
    out
}

/// Encode a tile. `src` must already be validated with [`check_tile_buffer`].
pub fn encode_tile(basis: &BasisTable, src: &[u8], stride: usize, packet: &mut Packet) {
    let mut v = [0f32; VALUES_PER_BLOCK];
    let mut coefficients = [[0f32; NUM_COEFFICIENTS]; BLOCKS_PER_TILE];
    let mut bounds = TileBounds::new();

    // First pass: project every block and widen the tile bounds
    for block_y in 0..BLOCKS_PER_COLUMN {
        for block_x in 0..BLOCKS_PER_ROW {
            block_to_vector(&src[block_offset(block_x, block_y, stride)..], stride, &mut v);
            let c = &mut coefficients[block_y * BLOCKS_PER_ROW + block_x];
            *c = project_to_coefficients(&v, basis);
            bounds.accumulate(c);
        }
    }

    write_bounds(&bounds, packet);

    // Second pass: quantize against the final bounds
    let records = &mut packet[BOUNDS_SIZE..];
    for (dst, c) in records.chunks_exact_mut(RECORD_SIZE).zip(coefficients.iter()) {
        dst.copy_from_slice(&quantize(c, &bounds));
    }
}

/// Decode a tile. `dst` must already be validated with [`check_tile_buffer`].
pub fn decode_tile(basis: &BasisTable, packet: &Packet, stride: usize, dst: &mut [u8]) {
    let bounds = read_bounds(packet);

    for block_y in 0..BLOCKS_PER_COLUMN {
        for block_x in 0..BLOCKS_PER_ROW {
            let rec = record(packet, block_y * BLOCKS_PER_ROW + block_x);
            let c: CoefficientVector = dequantize(&rec, &bounds);
            let v = reconstruct_from_coefficients(&c, basis);
            vector_to_block(&v, stride, &mut dst[block_offset(block_x, block_y, stride)..]);
        }
    }
}
