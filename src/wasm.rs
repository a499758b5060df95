//! WebAssembly bindings for the nanostream tile codec.
//!
//! These use the built-in basis table; packets are only interchangeable with
//! native encoders that use the same table.

use wasm_bindgen::prelude::*;

use crate::consts::{TILE_HEIGHT, TILE_ROW_BYTES};
use crate::{TileCodec, PACKET_SIZE};

/// Encode one tightly packed `TILE_WIDTH x TILE_HEIGHT` RGB8 tile.
///
/// # Returns
/// The `PACKET_SIZE`-byte packet as Uint8Array
#[wasm_bindgen]
pub fn encode_tile(rgb: &[u8]) -> Result<Vec<u8>, JsError> {
    let codec = TileCodec::default();
    let mut packet = [0u8; PACKET_SIZE];
    codec
        .encode_tile(rgb, TILE_ROW_BYTES, &mut packet)
        .map_err(|e| JsError::new(&e.to_string()))?;
    Ok(packet.to_vec())
}

/// Decode one packet into a tightly packed RGB8 tile.
#[wasm_bindgen]
pub fn decode_tile(packet: &[u8]) -> Result<Vec<u8>, JsError> {
    let packet: &[u8; PACKET_SIZE] = packet
        .try_into()
        .map_err(|_| JsError::new(&format!("packet must be {} bytes", PACKET_SIZE)))?;

    let codec = TileCodec::default();
    let mut rgb = vec![0u8; TILE_ROW_BYTES * TILE_HEIGHT];
    codec
        .decode_tile(packet, TILE_ROW_BYTES, &mut rgb)
        .map_err(|e| JsError::new(&e.to_string()))?;
    Ok(rgb)
}

#[wasm_bindgen]
pub fn packet_size() -> usize {
    PACKET_SIZE
}

/// Get library version information.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
