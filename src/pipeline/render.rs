//! Page rasterisation.
//!
//! Two renderers live here:
//!
//! * [`render_placeholder`] paints a blank sheet with a thin border at the
//!   page's display size. It needs nothing but the parsed geometry and is
//!   what [`crate::backend::LopdfBackend`] serves.
//! * `render_page_pdfium` (feature `pdfium`) rasterises the real page
//!   content through the pdfium C++ library.
//!
//! Both return a `DynamicImage` sized to the requested display width, with
//! the height following the page's aspect ratio.

use crate::pipeline::parse::PageSize;
use image::{DynamicImage, Rgba, RgbaImage};
use tracing::debug;

const SHEET: Rgba<u8> = Rgba([255, 255, 255, 255]);
const BORDER: Rgba<u8> = Rgba([220, 220, 220, 255]);

/// Pixel dimensions of a page laid out `display_width` wide.
pub fn pixel_size(size: PageSize, display_width: u32) -> (u32, u32) {
    let width = display_width.max(1);
    let height = size.display_height(width as f64).round().max(1.0) as u32;
    (width, height)
}

/// Blank page of the right proportions.
pub fn render_placeholder(size: PageSize, display_width: u32) -> DynamicImage {
    let (width, height) = pixel_size(size, display_width);
    let mut image = RgbaImage::from_pixel(width, height, SHEET);

    if width >= 4 && height >= 4 {
        for x in 0..width {
            image.put_pixel(x, 0, BORDER);
            image.put_pixel(x, height - 1, BORDER);
        }
        for y in 0..height {
            image.put_pixel(0, y, BORDER);
            image.put_pixel(width - 1, y, BORDER);
        }
    }

    debug!("Placeholder page → {}x{} px", width, height);
    DynamicImage::ImageRgba8(image)
}

/// Rasterise one page of `bytes` with pdfium.
///
/// pdfium keeps thread-local state and blocks; call this from
/// `spawn_blocking` when inside an async context.
#[cfg(feature = "pdfium")]
pub fn render_page_pdfium(
    pdfium: &pdfium_render::prelude::Pdfium,
    bytes: &[u8],
    page_index: usize,
    display_width: u32,
) -> Result<DynamicImage, crate::error::SignError> {
    use crate::error::SignError;
    use pdfium_render::prelude::*;

    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| SignError::unsupported(format!("{:?}", e)))?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    if page_index >= total_pages {
        return Err(SignError::Render {
            page: page_index,
            detail: format!("out of range (document has {} pages)", total_pages),
        });
    }

    let page = pages
        .get(page_index as u16)
        .map_err(|e| SignError::Render {
            page: page_index,
            detail: format!("{:?}", e),
        })?;

    let render_config = PdfRenderConfig::new().set_target_width(display_width.max(1) as i32);

    let bitmap = page
        .render_with_config(&render_config)
        .map_err(|e| SignError::Render {
            page: page_index,
            detail: format!("{:?}", e),
        })?;

    let image = bitmap.as_image();
    debug!(
        "Rendered page {} → {}x{} px",
        page_index,
        image.width(),
        image.height()
    );
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LETTER: PageSize = PageSize {
        width_pt: 612.0,
        height_pt: 792.0,
    };

    #[test]
    fn placeholder_matches_display_size() {
        let img = render_placeholder(LETTER, 600);
        assert_eq!(img.width(), 600);
        assert_eq!(img.height(), 776);
    }

    #[test]
    fn placeholder_has_border() {
        let img = render_placeholder(LETTER, 320).to_rgba8();
        assert_eq!(*img.get_pixel(0, 0), BORDER);
        assert_eq!(*img.get_pixel(160, 200), SHEET);
    }

    #[test]
    fn zero_width_is_clamped() {
        assert_eq!(pixel_size(LETTER, 0).0, 1);
    }
}
