use nanostream::consts::{TILE_HEIGHT, TILE_ROW_BYTES};
use nanostream::{TileCodec, PACKET_SIZE, TILE_WIDTH};

fn main() -> nanostream::Result<()> {
    let pixel_count = TILE_WIDTH * TILE_HEIGHT;

    // Generate gradient tile
    let mut tile = vec![0u8; TILE_ROW_BYTES * TILE_HEIGHT];
    for (i, px) in tile.chunks_exact_mut(3).enumerate() {
        let (x, y) = (i % TILE_WIDTH, i / TILE_WIDTH);
        px[0] = ((x + y) % 256) as u8;
        px[1] = ((x * 3) % 256) as u8;
        px[2] = ((y * 5) % 256) as u8;
    }

    let codec = TileCodec::default();
    let mut packet = [0u8; PACKET_SIZE];
    let mut decoded = vec![0u8; tile.len()];

    // Run the codec many times for profiling
    let iterations = 10000u32;
    let start = std::time::Instant::now();

    for _ in 0..iterations {
        codec.encode_tile(std::hint::black_box(&tile), TILE_ROW_BYTES, &mut packet)?;
        codec.decode_tile(std::hint::black_box(&packet), TILE_ROW_BYTES, &mut decoded)?;
    }

    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations;
    let throughput = (pixel_count as f64 / per_iter.as_secs_f64()) / 1_000_000.0;

    println!(
        "Elapsed: {:?}, per encode+decode: {:?}, throughput: {:.1} MPixels/sec",
        elapsed, per_iter, throughput
    );
    Ok(())
}
