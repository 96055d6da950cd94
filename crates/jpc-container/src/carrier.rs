//! Placeholder carrier images: one random colour, random size.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use jpc_core::config::CarrierConfig;
use jpc_core::{JpcError, JpcResult};
use rand::Rng;

/// Encode a solid-colour baseline JPEG.
pub fn encode_jpeg(width: u32, height: u32, color: [u8; 3], quality: u8) -> JpcResult<Vec<u8>> {
    let img = RgbImage::from_pixel(width, height, Rgb(color));
    let mut out = Vec::new();
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut out, quality);
        encoder
            .encode_image(&img)
            .map_err(|e| JpcError::Carrier(format!("JPEG encode {width}x{height}: {e}")))?;
    }
    Ok(out)
}

/// A carrier with dimensions drawn from the configured ranges.
pub fn random_carrier(config: &CarrierConfig) -> JpcResult<Vec<u8>> {
    let mut rng = rand::thread_rng();
    let width = rng.gen_range(config.min_width..=config.max_width);
    let height = rng.gen_range(config.min_height..=config.max_height);
    let color: [u8; 3] = rng.gen();
    encode_jpeg(width, height, color, config.quality)
}

/// Create `path` holding a fresh carrier. Never overwrites an existing file.
pub fn write_carrier(path: &Path, config: &CarrierConfig) -> JpcResult<u64> {
    let bytes = random_carrier(config)?;
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)?;
    file.write_all(&bytes)?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "carrier written");
    Ok(bytes.len() as u64)
}
