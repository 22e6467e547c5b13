//! Snapshot file formats: encode raster buffers, decode cached bytes.

use std::io::Cursor;
use std::str::FromStr;

use image::codecs::png::PngEncoder;
use image::{ImageEncoder, RgbaImage};

use crate::error::{Error, Result};

/// Image file format of exported / cached snapshots.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SnapshotFormat {
    /// Lossless.
    Png,
    /// Lossy; `quality` in `0.0..=1.0`. Alpha is dropped.
    #[cfg(feature = "jpeg")]
    Jpeg { quality: f32 },
}

impl Default for SnapshotFormat {
    fn default() -> Self {
        SnapshotFormat::Png
    }
}

impl SnapshotFormat {
    pub fn file_extension(&self) -> &'static str {
        match self {
            SnapshotFormat::Png => "png",
            #[cfg(feature = "jpeg")]
            SnapshotFormat::Jpeg { .. } => "jpg",
        }
    }

    pub fn encode(&self, image: &RgbaImage) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        match self {
            SnapshotFormat::Png => PngEncoder::new(&mut out)
                .write_image(image.as_raw(), image.width(), image.height(), image::ExtendedColorType::Rgba8)
                .map_err(|e| Error::EncodeError(e.to_string()))?,
            #[cfg(feature = "jpeg")]
            SnapshotFormat::Jpeg { quality } => {
                let rgb = image::DynamicImage::ImageRgba8(image.clone()).to_rgb8();
                let q = (quality.clamp(0.0, 1.0) * 100.0).round().max(1.0) as u8;
                image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, q)
                    .write_image(rgb.as_raw(), rgb.width(), rgb.height(), image::ExtendedColorType::Rgb8)
                    .map_err(|e| Error::EncodeError(e.to_string()))?;
            }
        }
        Ok(out)
    }
}

impl FromStr for SnapshotFormat {
    type Err = Error;

    /// `png`, `jpeg` / `jpg` (quality 0.8), or `jpeg:<quality>`.
    fn from_str(s: &str) -> Result<Self> {
        let (kind, quality) = match s.split_once(':') {
            Some((k, q)) => (k, Some(q)),
            None => (s, None),
        };
        match (kind.to_ascii_lowercase().as_str(), quality) {
            ("png", None) => Ok(SnapshotFormat::Png),
            #[cfg(feature = "jpeg")]
            ("jpeg" | "jpg", q) => {
                let quality = match q {
                    Some(q) => q
                        .parse::<f32>()
                        .ok()
                        .filter(|q| (0.0..=1.0).contains(q))
                        .ok_or_else(|| Error::ConfigError(format!("invalid JPEG quality `{}`", q)))?,
                    None => 0.8,
                };
                Ok(SnapshotFormat::Jpeg { quality })
            }
            _ => Err(Error::ConfigError(format!("unsupported image format `{}`", s))),
        }
    }
}

/// Decode any supported image bytes to RGBA.
pub fn decode(bytes: &[u8]) -> Result<RgbaImage> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| Error::DecodeError(e.to_string()))?
        .decode()
        .map(|img| img.to_rgba8())
        .map_err(|e| Error::DecodeError(e.to_string()))
}
