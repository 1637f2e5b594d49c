// spriteforge-core/src/infrastructure/png.rs
//
// The only place the `image` crate appears. The domain sees raw RGBA
// buffers; this module converts at the boundary.

use std::path::Path;

use image::{DynamicImage, ImageFormat};

use crate::domain::image::Pixmap;
use crate::domain::metrics::gates::{CandidateFileInfo, DecodedInfo};
use crate::infrastructure::error::InfrastructureError;
use crate::infrastructure::fs::atomic_write;

pub fn decode_pixmap(bytes: &[u8]) -> Result<Pixmap, InfrastructureError> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| InfrastructureError::PngError(e.to_string()))?;
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(Pixmap {
        width,
        height,
        rgba: rgba.into_raw(),
    })
}

pub fn load_pixmap(path: &Path) -> Result<Pixmap, InfrastructureError> {
    let bytes = crate::infrastructure::fs::read_bytes(path)?;
    decode_pixmap(&bytes)
}

pub fn encode_png(pixmap: &Pixmap) -> Result<Vec<u8>, InfrastructureError> {
    let buffer: image::RgbaImage =
        image::ImageBuffer::from_raw(pixmap.width, pixmap.height, pixmap.rgba.clone())
            .ok_or_else(|| {
                InfrastructureError::PngError("RGBA buffer does not match dimensions".to_string())
            })?;

    let mut bytes = Vec::new();
    DynamicImage::ImageRgba8(buffer)
        .write_to(&mut std::io::Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|e| InfrastructureError::PngError(e.to_string()))?;
    Ok(bytes)
}

/// Encode and write atomically: a crashed write must never leave a
/// half-encoded frame where the auditor or the packer will find it.
pub fn save_pixmap(path: &Path, pixmap: &Pixmap) -> Result<(), InfrastructureError> {
    let bytes = encode_png(pixmap)?;
    atomic_write(path, bytes)
}

/// Gather what the hard gates need without assuming the file decodes.
pub fn inspect_candidate(path: &Path) -> Result<CandidateFileInfo, InfrastructureError> {
    let bytes = crate::infrastructure::fs::read_bytes(path)?;
    Ok(inspect_bytes(&bytes))
}

pub fn inspect_bytes(bytes: &[u8]) -> CandidateFileInfo {
    let decoded = image::load_from_memory(bytes).ok().map(|img| {
        let color = img.color();
        let channels = color.channel_count();
        let bits_per_channel = (color.bits_per_pixel() / channels as u16) as u8;
        DecodedInfo {
            width: img.width(),
            height: img.height(),
            channels,
            bits_per_channel,
        }
    });

    CandidateFileInfo {
        byte_len: bytes.len() as u64,
        decoded,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample() -> Pixmap {
        let mut img = Pixmap::new(16, 16);
        for y in 4..12 {
            for x in 4..12 {
                img.set_pixel(x, y, [200, 40, 40, 255]);
            }
        }
        img
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let original = sample();
        let bytes = encode_png(&original).unwrap();
        let decoded = decode_pixmap(&bytes).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame_0000.png");

        let original = sample();
        save_pixmap(&path, &original).unwrap();
        let loaded = load_pixmap(&path).unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_inspect_reports_rgba8() {
        let bytes = encode_png(&sample()).unwrap();
        let info = inspect_bytes(&bytes);

        let decoded = info.decoded.unwrap();
        assert_eq!(decoded.width, 16);
        assert_eq!(decoded.channels, 4);
        assert_eq!(decoded.bits_per_channel, 8);
        assert_eq!(info.byte_len, bytes.len() as u64);
    }

    #[test]
    fn test_inspect_garbage_has_no_decoded_info() {
        let info = inspect_bytes(b"definitely not a png");
        assert!(info.decoded.is_none());
    }

    #[test]
    fn test_decode_garbage_is_error() {
        assert!(decode_pixmap(b"nope").is_err());
    }
}
