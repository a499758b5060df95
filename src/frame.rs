//! Whole-image driver: cuts an RGB8 image into tiles, runs the tile codec on
//! each, and stitches decoded tiles back together.
//!
//! Only whole tiles are coded. Trailing columns and rows that do not fill a
//! tile are dropped, matching what a fixed-size tile stream can represent.

use std::thread;

use tracing::debug;

use crate::consts::{CHANNELS, TILE_HEIGHT, TILE_ROW_BYTES, TILE_WIDTH};
use crate::tile::Packet;
use crate::{NanoError, Result, TileCodec, PACKET_SIZE};

/// Tightly packed RGB8 image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbImage {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl RgbImage {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * CHANNELS],
        }
    }

    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let required = width as usize * height as usize * CHANNELS;
        if data.len() != required {
            return Err(NanoError::DataLength {
                expected: required,
                actual: data.len(),
            });
        }
        Ok(Self { width, height, data })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.width as usize * CHANNELS
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

/// Tile grid covering an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    pub width: u32,
    pub height: u32,
    pub tiles_x: usize,
    pub tiles_y: usize,
}

impl FrameLayout {
    pub fn for_image(width: u32, height: u32) -> Result<Self> {
        let tiles_x = width as usize / TILE_WIDTH;
        let tiles_y = height as usize / TILE_HEIGHT;

        if tiles_x == 0 || tiles_y == 0 {
            return Err(NanoError::ImageDimensions {
                width,
                height,
                tile_width: TILE_WIDTH,
                tile_height: TILE_HEIGHT,
            });
        }

        Ok(Self {
            width,
            height,
            tiles_x,
            tiles_y,
        })
    }

    pub fn tile_count(&self) -> usize {
        self.tiles_x * self.tiles_y
    }

    /// True when the image is an exact multiple of the tile size.
    pub fn is_aligned(&self) -> bool {
        self.width as usize % TILE_WIDTH == 0 && self.height as usize % TILE_HEIGHT == 0
    }

    /// Width of the decoded image (whole tiles only).
    pub fn coded_width(&self) -> u32 {
        (self.tiles_x * TILE_WIDTH) as u32
    }

    pub fn coded_height(&self) -> u32 {
        (self.tiles_y * TILE_HEIGHT) as u32
    }
}

/// Tile codec plus a worker count for whole-image work.
pub struct FrameCodec {
    codec: TileCodec,
    num_threads: usize,
}

impl FrameCodec {
    pub fn new(codec: TileCodec, num_threads: Option<usize>) -> Self {
        let num_threads = num_threads.unwrap_or_else(num_cpus::get).max(1);
        Self { codec, num_threads }
    }

    pub fn codec(&self) -> &TileCodec {
        &self.codec
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Encode every whole tile of `image`, row-major.
    pub fn encode(&self, image: &RgbImage) -> Result<(FrameLayout, Vec<Packet>)> {
        let layout = FrameLayout::for_image(image.width(), image.height())?;
        let mut packets = vec![[0u8; PACKET_SIZE]; layout.tile_count()];

        let per_worker = layout.tile_count().div_ceil(self.num_threads);
        let stride = image.stride();
        let src = image.data();

        debug!(
            tiles = layout.tile_count(),
            workers = layout.tile_count().div_ceil(per_worker),
            "encoding frame"
        );

        let mut results: Vec<Result<()>> = Vec::new();
        let chunks: Vec<_> = packets.chunks_mut(per_worker).enumerate().collect();
        results.resize_with(chunks.len(), || Ok(()));

        thread::scope(|s| {
            for ((chunk_idx, chunk), slot) in chunks.into_iter().zip(results.iter_mut()) {
                let codec = &self.codec;
                s.spawn(move || {
                    *slot = chunk.iter_mut().enumerate().try_for_each(|(i, packet)| {
                        let tile = chunk_idx * per_worker + i;
                        let (tx, ty) = (tile % layout.tiles_x, tile / layout.tiles_x);
                        let offset = ty * TILE_HEIGHT * stride + tx * TILE_ROW_BYTES;
                        codec.encode_tile(&src[offset..], stride, packet)
                    });
                });
            }
        });

        results.into_iter().collect::<Result<()>>()?;
        Ok((layout, packets))
    }

    /// Decode packets produced by [`FrameCodec::encode`] into a
    /// `coded_width x coded_height` image.
    pub fn decode(&self, layout: &FrameLayout, packets: &[Packet]) -> Result<RgbImage> {
        if packets.len() != layout.tile_count() {
            return Err(NanoError::InvalidData);
        }

        let mut image = RgbImage::new(layout.coded_width(), layout.coded_height());
        let stride = image.stride();
        let band_len = stride * TILE_HEIGHT;
        let bands_per_worker = layout.tiles_y.div_ceil(self.num_threads);

        debug!(
            tiles = layout.tile_count(),
            workers = layout.tiles_y.div_ceil(bands_per_worker),
            "decoding frame"
        );

        // Each worker owns a contiguous run of tile rows, so writes never overlap
        let mut results: Vec<Result<()>> = Vec::new();
        let chunks: Vec<_> = image
            .data_mut()
            .chunks_mut(band_len * bands_per_worker)
            .enumerate()
            .collect();
        results.resize_with(chunks.len(), || Ok(()));

        thread::scope(|s| {
            for ((chunk_idx, chunk), slot) in chunks.into_iter().zip(results.iter_mut()) {
                let codec = &self.codec;
                s.spawn(move || {
                    *slot = chunk.chunks_mut(band_len).enumerate().try_for_each(|(i, band)| {
                        let ty = chunk_idx * bands_per_worker + i;
                        (0..layout.tiles_x).try_for_each(|tx| {
                            let packet = &packets[ty * layout.tiles_x + tx];
                            codec.decode_tile(packet, stride, &mut band[tx * TILE_ROW_BYTES..])
                        })
                    });
                });
            }
        });

        results.into_iter().collect::<Result<()>>()?;
        Ok(image)
    }

    /// Encode then decode, as a quality check.
    pub fn roundtrip(&self, image: &RgbImage) -> Result<RgbImage> {
        let (layout, packets) = self.encode(image)?;
        self.decode(&layout, &packets)
    }
}

/// Peak signal-to-noise ratio of `decoded` against the same region of
/// `reference`, in dB. Identical images give infinity.
pub fn psnr(reference: &RgbImage, decoded: &RgbImage) -> f64 {
    let width = decoded.width().min(reference.width()) as usize;
    let height = decoded.height().min(reference.height()) as usize;
    if width == 0 || height == 0 {
        return 0.0;
    }

    let mut sum = 0.0f64;
    for y in 0..height {
        let a = &reference.data()[y * reference.stride()..][..width * CHANNELS];
        let b = &decoded.data()[y * decoded.stride()..][..width * CHANNELS];
        for (&p, &q) in a.iter().zip(b.iter()) {
            let d = p as f64 - q as f64;
            sum += d * d;
        }
    }

    let mse = sum / (width * height * CHANNELS) as f64;
    if mse == 0.0 {
        return f64::INFINITY;
    }
    10.0 * (255.0 * 255.0 / mse).log10()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_image(width: u32, height: u32) -> RgbImage {
        let mut image = RgbImage::new(width, height);
        let stride = image.stride();
        for y in 0..height as usize {
            for x in 0..width as usize {
                let i = y * stride + x * CHANNELS;
                let px = &mut image.data_mut()[i..i + CHANNELS];
                px[0] = (x % 256) as u8;
                px[1] = (y % 256) as u8;
                px[2] = ((x + y) / 2 % 256) as u8;
            }
        }
        image
    }

    #[test]
    fn test_layout() {
        let layout = FrameLayout::for_image(330, 250).unwrap();
        assert_eq!((layout.tiles_x, layout.tiles_y), (2, 2));
        assert!(!layout.is_aligned());
        assert_eq!((layout.coded_width(), layout.coded_height()), (320, 240));

        assert!(FrameLayout::for_image(320, 240).unwrap().is_aligned());
        assert!(matches!(
            FrameLayout::for_image(100, 100),
            Err(NanoError::ImageDimensions { .. })
        ));
    }

    #[test]
    fn test_from_raw_checks_length() {
        assert!(RgbImage::from_raw(2, 2, vec![0; 12]).is_ok());
        assert!(matches!(
            RgbImage::from_raw(2, 2, vec![0; 11]),
            Err(NanoError::DataLength { expected: 12, actual: 11 })
        ));
        assert!(matches!(
            RgbImage::from_raw(2, 2, vec![0; 13]),
            Err(NanoError::DataLength { expected: 12, actual: 13 })
        ));
    }

    #[test]
    fn test_thread_count_does_not_change_output() {
        let image = gradient_image(480, 360);
        let single = FrameCodec::new(TileCodec::default(), Some(1));
        let multi = FrameCodec::new(TileCodec::default(), Some(4));

        let (layout_a, packets_a) = single.encode(&image).unwrap();
        let (layout_b, packets_b) = multi.encode(&image).unwrap();
        assert_eq!(layout_a, layout_b);
        assert_eq!(packets_a, packets_b);

        assert_eq!(
            single.decode(&layout_a, &packets_a).unwrap(),
            multi.decode(&layout_b, &packets_b).unwrap()
        );
    }

    #[test]
    fn test_decode_rejects_wrong_packet_count() {
        let frame = FrameCodec::new(TileCodec::default(), Some(2));
        let layout = FrameLayout::for_image(320, 240).unwrap();
        let packets = vec![[0u8; PACKET_SIZE]; 3];
        assert!(matches!(frame.decode(&layout, &packets), Err(NanoError::InvalidData)));
    }

    #[test]
    fn test_psnr() {
        let a = gradient_image(16, 16);
        assert!(psnr(&a, &a).is_infinite());

        let mut b = a.clone();
        for p in b.data_mut().iter_mut() {
            *p = p.saturating_add(4);
        }
        let value = psnr(&a, &b);
        assert!(value > 30.0 && value < 40.0, "psnr {}", value);
    }
}
