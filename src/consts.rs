//! Compile-time layout constants shared by the encoder and decoder.
//!
//! None of these values are stored in a packet. Changing any of them changes
//! the packet format and requires a matching basis table.

/// Side length of a transform block in pixels.
pub const BLOCK_SIZE: usize = 8;

/// Interleaved RGB8 samples per pixel.
pub const CHANNELS: usize = 3;

/// Tile width in pixels.
pub const TILE_WIDTH: usize = 160;

/// Tile height in pixels.
pub const TILE_HEIGHT: usize = 120;

/// Samples in one channel of a block.
pub const PIXELS_PER_BLOCK: usize = BLOCK_SIZE * BLOCK_SIZE;

/// Length of a value vector (all channels of one block).
pub const VALUES_PER_BLOCK: usize = PIXELS_PER_BLOCK * CHANNELS;

/// Number of basis vectors, and therefore coefficients per block.
pub const NUM_COEFFICIENTS: usize = 8;

/// Bits spent on each coefficient inside a quantized record.
pub const BIT_ALLOCATION: [u8; NUM_COEFFICIENTS] = [8, 8, 4, 4, 2, 2, 2, 2];

/// Bytes per quantized record.
pub const RECORD_SIZE: usize = 4;

pub const BLOCKS_PER_ROW: usize = TILE_WIDTH / BLOCK_SIZE;
pub const BLOCKS_PER_COLUMN: usize = TILE_HEIGHT / BLOCK_SIZE;
pub const BLOCKS_PER_TILE: usize = BLOCKS_PER_ROW * BLOCKS_PER_COLUMN;

/// Bytes used by the bounds header (minima then maxima, one f32 each).
pub const BOUNDS_SIZE: usize = 2 * std::mem::size_of::<f32>() * NUM_COEFFICIENTS;

/// Exact size of an encoded tile.
pub const PACKET_SIZE: usize = BOUNDS_SIZE + RECORD_SIZE * BLOCKS_PER_TILE;

/// Minimum row stride, in bytes, of a tile buffer.
pub const TILE_ROW_BYTES: usize = TILE_WIDTH * CHANNELS;

const fn allocated_bits() -> usize {
    let mut total = 0;
    let mut i = 0;
    while i < NUM_COEFFICIENTS {
        total += BIT_ALLOCATION[i] as usize;
        i += 1;
    }
    total
}

const _: () = assert!(allocated_bits() == RECORD_SIZE * 8);
const _: () = assert!(TILE_WIDTH % BLOCK_SIZE == 0 && TILE_HEIGHT % BLOCK_SIZE == 0);

/// Largest code representable with `bits` bits.
#[inline(always)]
pub const fn resolution(bits: u8) -> u32 {
    (1u32 << bits) - 1
}
