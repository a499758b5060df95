//! End-to-end tests through the file formats: PPM in, tile stream, PPM out,
//! and basis tables trained from PPM files.

use std::fs;

use nanostream::frame::{psnr, FrameCodec};
use nanostream::training::{fit_basis, FitConfig};
use nanostream::{
    decode_file, encode_file, ppm, BasisTable, NanoError, RgbImage, TileCodec, PACKET_SIZE,
};

fn smooth_image(width: u32, height: u32) -> RgbImage {
    let mut image = RgbImage::new(width, height);
    let stride = image.stride();
    for y in 0..height as usize {
        for x in 0..width as usize {
            let i = y * stride + x * 3;
            let px = &mut image.data_mut()[i..i + 3];
            px[0] = ((x * 255) / width as usize) as u8;
            px[1] = ((y * 255) / height as usize) as u8;
            px[2] = (((x + y) * 255) / (width + height) as usize) as u8;
        }
    }
    image
}

#[test]
fn test_encode_decode_files() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input.ppm");
    let stream = dir.path().join("image.ns");
    let output = dir.path().join("output.ppm");

    // 330x250 is not tile aligned; the trailing pixels are dropped
    let image = smooth_image(330, 250);
    ppm::save(&image, &input, true).unwrap();

    let frame = FrameCodec::new(TileCodec::default(), Some(2));
    let layout = encode_file(&frame, &input, &stream).unwrap();
    assert_eq!(layout.tile_count(), 4);

    let header = b"330 250\n4\n".len();
    assert_eq!(
        fs::metadata(&stream).unwrap().len() as usize,
        header + 4 * PACKET_SIZE
    );

    decode_file(&frame, &stream, &output).unwrap();
    let decoded = ppm::open(&output).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (320, 240));
    assert!(psnr(&image, &decoded) > 28.0);
}

#[test]
fn test_encode_rejects_tiny_image() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("tiny.ppm");
    ppm::save(&smooth_image(100, 100), &input, false).unwrap();

    let frame = FrameCodec::new(TileCodec::default(), Some(1));
    let result = encode_file(&frame, &input, dir.path().join("tiny.ns"));
    assert!(matches!(result, Err(NanoError::ImageDimensions { .. })));
}

#[test]
fn test_trained_basis_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let basis_path = dir.path().join("trained.basis");

    let images = [smooth_image(160, 120), smooth_image(200, 150)];
    let config = FitConfig {
        samples_per_image: 256,
        seed: 3,
    };
    let basis = fit_basis(&images, &config).unwrap();
    basis.save(&basis_path).unwrap();

    let loaded = BasisTable::load(&basis_path).unwrap();
    assert_eq!(loaded, basis);

    let frame = FrameCodec::new(TileCodec::new(loaded), None);
    let image = smooth_image(320, 240);
    let decoded = frame.roundtrip(&image).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (320, 240));
    assert!(psnr(&image, &decoded) > 20.0);
}

#[test]
fn test_missing_files_surface_io_errors() {
    let dir = tempfile::tempdir().unwrap();
    let frame = FrameCodec::new(TileCodec::default(), Some(1));
    let result = decode_file(&frame, dir.path().join("absent.ns"), dir.path().join("out.ppm"));
    assert!(matches!(result, Err(NanoError::Io(_))));
}
