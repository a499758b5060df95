//! Tile stream container.
//!
//! ```text
//! <width> <height>\n
//! <tile count>\n
//! <tile count * PACKET_SIZE bytes of packets, row-major>
//! ```
//!
//! The header carries the source image size; the tile grid is derived from
//! it the same way the encoder derived it.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;

use tracing::{info, warn};

use crate::frame::{FrameCodec, FrameLayout};
use crate::tile::Packet;
use crate::{ppm, NanoError, Result, PACKET_SIZE};

pub fn write_stream<W: Write>(mut writer: W, layout: &FrameLayout, packets: &[Packet]) -> Result<()> {
    if packets.len() != layout.tile_count() {
        return Err(NanoError::InvalidData);
    }

    writeln!(writer, "{} {}", layout.width, layout.height)?;
    writeln!(writer, "{}", packets.len())?;
    for packet in packets {
        writer.write_all(packet)?;
    }
    Ok(())
}

pub fn read_stream<R: BufRead>(mut reader: R) -> Result<(FrameLayout, Vec<Packet>)> {
    let mut line = String::new();
    reader.read_line(&mut line)?;
    let dims: Vec<u32> = line
        .split_whitespace()
        .map(|s| s.parse().map_err(|_| NanoError::InvalidData))
        .collect::<Result<Vec<u32>>>()?;

    if dims.len() != 2 {
        return Err(NanoError::InvalidData);
    }
    let layout = FrameLayout::for_image(dims[0], dims[1])?;

    line.clear();
    reader.read_line(&mut line)?;
    let tile_count: usize = line.trim().parse().map_err(|_| NanoError::InvalidData)?;
    if tile_count != layout.tile_count() {
        return Err(NanoError::InvalidData);
    }

    // The header is untrusted; grow only as packets actually arrive
    let mut packets = Vec::new();
    for _ in 0..tile_count {
        let mut packet = [0u8; PACKET_SIZE];
        reader.read_exact(&mut packet).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => NanoError::InvalidData,
            _ => NanoError::Io(e),
        })?;
        packets.push(packet);
    }

    let mut trailing = [0u8; 1];
    if reader.read(&mut trailing)? != 0 {
        return Err(NanoError::InvalidData);
    }

    Ok((layout, packets))
}

/// Encode a PPM image into a tile stream file.
pub fn encode_file<P: AsRef<Path>, Q: AsRef<Path>>(
    frame: &FrameCodec,
    input: P,
    output: Q,
) -> Result<FrameLayout> {
    let image = ppm::open(input)?;
    let (layout, packets) = frame.encode(&image)?;
    if !layout.is_aligned() {
        warn!(
            width = layout.width,
            height = layout.height,
            "image is not a multiple of the tile size; partial tiles are dropped"
        );
    }

    let mut writer = BufWriter::new(File::create(output)?);
    write_stream(&mut writer, &layout, &packets)?;
    writer.flush()?;

    info!(
        tiles = packets.len(),
        bytes = packets.len() * PACKET_SIZE,
        "encoded {}x{} image",
        layout.width,
        layout.height
    );
    Ok(layout)
}

/// Decode a tile stream file into a PPM image.
pub fn decode_file<P: AsRef<Path>, Q: AsRef<Path>>(
    frame: &FrameCodec,
    input: P,
    output: Q,
) -> Result<FrameLayout> {
    let reader = BufReader::new(File::open(input)?);
    let (layout, packets) = read_stream(reader)?;
    let image = frame.decode(&layout, &packets)?;
    ppm::save(&image, output, true)?;

    info!(
        tiles = packets.len(),
        "decoded {}x{} image",
        image.width(),
        image.height()
    );
    Ok(layout)
}
