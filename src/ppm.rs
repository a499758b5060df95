use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::frame::RgbImage;
use crate::{NanoError, Result};

/// Read a binary (P6) or ASCII (P3) PPM with a max value of 255.
pub fn open<P: AsRef<Path>>(path: P) -> Result<RgbImage> {
    let file = File::open(path)?;
    read(BufReader::new(file))
}

pub fn read<R: BufRead>(mut reader: R) -> Result<RgbImage> {
    let mut line = String::new();

    reader.read_line(&mut line)?;
    if !line.starts_with("P6") && !line.starts_with("P3") {
        return Err(NanoError::UnsupportedFormat);
    }
    let binary = line.starts_with("P6");

    let dims = read_header_values(&mut reader, &mut line)?;
    if dims.len() != 2 {
        return Err(NanoError::InvalidData);
    }
    let (width, height) = (dims[0], dims[1]);

    let max_val = read_header_values(&mut reader, &mut line)?;
    if max_val != [255] {
        return Err(NanoError::UnsupportedFormat);
    }

    let len = (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(3))
        .ok_or(NanoError::InvalidData)?;

    // Sized by what the file holds, not by the header
    let data = if binary {
        let mut data = Vec::new();
        reader.take(len as u64).read_to_end(&mut data)?;
        data
    } else {
        let mut values = String::new();
        reader.read_to_string(&mut values)?;
        values
            .split_whitespace()
            .map(|s| s.parse().map_err(|_| NanoError::InvalidData))
            .collect::<Result<Vec<u8>>>()?
    };

    if data.len() != len {
        return Err(NanoError::InvalidData);
    }

    RgbImage::from_raw(width, height, data)
}

/// Next non-comment header line, parsed as whitespace-separated integers.
fn read_header_values<R: BufRead>(reader: &mut R, line: &mut String) -> Result<Vec<u32>> {
    loop {
        line.clear();
        if reader.read_line(line)? == 0 {
            return Err(NanoError::InvalidData);
        }
        if !line.starts_with('#') && !line.trim().is_empty() {
            break;
        }
    }

    line.split_whitespace()
        .map(|s| s.parse().map_err(|_| NanoError::InvalidData))
        .collect()
}

pub fn save<P: AsRef<Path>>(image: &RgbImage, path: P, binary: bool) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write(image, &mut writer, binary)?;
    writer.flush()?;
    Ok(())
}

pub fn write<W: Write>(image: &RgbImage, mut writer: W, binary: bool) -> Result<()> {
    if binary {
        writeln!(writer, "P6")?;
    } else {
        writeln!(writer, "P3")?;
    }

    writeln!(writer, "{} {}", image.width(), image.height())?;
    writeln!(writer, "255")?;

    if binary {
        writer.write_all(image.data())?;
    } else {
        for (i, &sample) in image.data().iter().enumerate() {
            if i > 0 && i % 15 == 0 {
                writeln!(writer)?;
            }
            write!(writer, "{} ", sample)?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_image() -> RgbImage {
        let data = (0..4 * 2 * 3).map(|i| (i * 10) as u8).collect();
        RgbImage::from_raw(4, 2, data).unwrap()
    }

    #[test]
    fn test_binary_roundtrip() {
        let image = small_image();
        let mut bytes = Vec::new();
        write(&image, &mut bytes, true).unwrap();
        assert!(bytes.starts_with(b"P6\n4 2\n255\n"));

        let back = read(bytes.as_slice()).unwrap();
        assert_eq!(back, image);
    }

    #[test]
    fn test_ascii_roundtrip() {
        let image = small_image();
        let mut bytes = Vec::new();
        write(&image, &mut bytes, false).unwrap();

        let back = read(bytes.as_slice()).unwrap();
        assert_eq!(back, image);
    }

    #[test]
    fn test_skips_comments() {
        let text = b"P3\n# created by hand\n1 1\n# depth\n255\n1 2 3\n";
        let image = read(&text[..]).unwrap();
        assert_eq!(image.data(), &[1, 2, 3]);
    }

    #[test]
    fn test_truncated_binary_data() {
        assert!(matches!(read(&b"P6\n2 1\n255\n\x01\x02\x03"[..]), Err(NanoError::InvalidData)));
        // Huge header with almost no pixel data
        let huge = b"P6\n4000000000 4000000000\n255\n\x01\x02";
        assert!(matches!(read(&huge[..]), Err(NanoError::InvalidData)));
    }

    #[test]
    fn test_rejects_other_formats() {
        assert!(matches!(read(&b"P5\n1 1\n255\n\0"[..]), Err(NanoError::UnsupportedFormat)));
        assert!(matches!(read(&b"P6\n1 1\n65535\n"[..]), Err(NanoError::UnsupportedFormat)));
        assert!(matches!(read(&b"P3\n1 1\n255\n1 2\n"[..]), Err(NanoError::InvalidData)));
    }
}
