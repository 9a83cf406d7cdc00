//! Image encoding: `DynamicImage` → PNG bytes or a base64 data URL.
//!
//! Hosts that draw pages in a webview need something an `<img>` tag can
//! load. PNG keeps rendered text crisp; the data URL form avoids a round
//! trip through the filesystem.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a rasterised page as PNG bytes.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}

/// Encode a rasterised page as a `data:image/png;base64,…` URL.
pub fn encode_data_url(img: &DynamicImage) -> Result<String, image::ImageError> {
    let png = encode_png(img)?;
    let b64 = STANDARD.encode(&png);
    debug!("Encoded page → {} bytes base64", b64.len());
    Ok(format!("data:image/png;base64,{b64}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn encode_small_image() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));
        let url = encode_data_url(&img).expect("encode should succeed");
        let payload = url
            .strip_prefix("data:image/png;base64,")
            .expect("data url prefix");
        let decoded = STANDARD.decode(payload).expect("valid base64");
        assert_eq!(&decoded[1..4], b"PNG");
    }
}
