use thiserror::Error;

#[derive(Error, Debug)]
pub enum NanoError {
    #[error("Image {width}x{height} holds no whole {tile_width}x{tile_height} tile")]
    ImageDimensions {
        width: u32,
        height: u32,
        tile_width: usize,
        tile_height: usize,
    },
    #[error("Row stride {stride} is shorter than a tile row ({min} bytes)")]
    InvalidStride { stride: usize, min: usize },
    #[error("Buffer too small: need {required} bytes, got {provided}")]
    BufferTooSmall { required: usize, provided: usize },
    #[error("Image data is {actual} bytes, dimensions need {expected}")]
    DataLength { expected: usize, actual: usize },
    #[error("Invalid basis table: {0}")]
    InvalidBasis(String),
    #[error("Need at least 2 sample blocks to fit a basis, got {found}")]
    NotEnoughSamples { found: usize },
    #[error("Unsupported format")]
    UnsupportedFormat,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid compressed data")]
    InvalidData,
}

pub type Result<T> = std::result::Result<T, NanoError>;

/// Encoder/decoder bound to one basis table.
///
/// The table is never mutated, so a single codec can be shared by reference
/// across threads; every call works only on the buffers it is handed.
#[derive(Debug, Clone, Default)]
pub struct TileCodec {
    basis: BasisTable,
}

impl TileCodec {
    pub fn new(basis: BasisTable) -> Self {
        Self { basis }
    }

    pub fn basis(&self) -> &BasisTable {
        &self.basis
    }

    pub fn packet_size(&self) -> usize {
        PACKET_SIZE
    }

    /// Encode the `TILE_WIDTH x TILE_HEIGHT` RGB8 tile at the start of `src`.
    ///
    /// `stride` is the distance in bytes between the first pixels of two
    /// consecutive rows.
    pub fn encode_tile(&self, src: &[u8], stride: usize, packet: &mut Packet) -> Result<()> {
        tile::check_tile_buffer(src.len(), stride)?;
        tile::encode_tile(&self.basis, src, stride, packet);
        Ok(())
    }

    /// Decode `packet` into the tile at the start of `dst`. Bytes past
    /// `TILE_ROW_BYTES` in each row are left untouched.
    pub fn decode_tile(&self, packet: &Packet, stride: usize, dst: &mut [u8]) -> Result<()> {
        tile::check_tile_buffer(dst.len(), stride)?;
        tile::decode_tile(&self.basis, packet, stride, dst);
        Ok(())
    }
}

pub mod basis;
pub mod consts;
pub mod frame;
pub mod ppm;
pub mod quantizer;
pub mod stream;
pub mod tile;
pub mod training;
pub mod transform;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use basis::BasisTable;
pub use consts::{PACKET_SIZE, TILE_HEIGHT, TILE_WIDTH};
pub use frame::RgbImage;
pub use stream::{decode_file, encode_file};
pub use tile::Packet;
