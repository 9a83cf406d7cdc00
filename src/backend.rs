//! The document-rendering collaborator consumed by the render surface.
//!
//! A backend answers two questions about a byte buffer: what pages does it
//! have ([`DocumentBackend::parse`]) and what does page *n* look like at a
//! given width ([`DocumentBackend::render_page`]). The surface never touches
//! PDF internals itself.

use crate::error::SignError;
use crate::pipeline::parse::{self, ParsedDocument};
use crate::pipeline::render;
use image::DynamicImage;
#[cfg(feature = "pdfium")]
use std::path::PathBuf;
use std::sync::Arc;
#[cfg(feature = "pdfium")]
use tracing::info;

/// Parses and rasterises documents for a [`crate::surface::RenderSurface`].
///
/// Implementations must be `Send + Sync`; rendering runs on blocking worker
/// threads (see [`crate::stream::render_stream`]).
pub trait DocumentBackend: Send + Sync {
    /// Validate `bytes` and return per-page geometry.
    fn parse(&self, bytes: &[u8]) -> Result<ParsedDocument, SignError>;

    /// Rasterise page `page_index` (0-based) at `display_width` pixels.
    fn render_page(
        &self,
        bytes: &[u8],
        page_index: usize,
        display_width: u32,
    ) -> Result<DynamicImage, SignError>;
}

/// Geometry-only backend: lopdf for parsing, blank sheets for pages.
///
/// Enough to lay out pages and place a signature when no pdfium library is
/// available, and what the test suite runs against.
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfBackend;

impl DocumentBackend for LopdfBackend {
    fn parse(&self, bytes: &[u8]) -> Result<ParsedDocument, SignError> {
        parse::parse_document(bytes)
    }

    fn render_page(
        &self,
        bytes: &[u8],
        page_index: usize,
        display_width: u32,
    ) -> Result<DynamicImage, SignError> {
        let parsed = parse::parse_document(bytes)?;
        let size = parsed
            .pages
            .get(page_index)
            .copied()
            .ok_or_else(|| SignError::Render {
                page: page_index,
                detail: format!("out of range (document has {} pages)", parsed.page_count()),
            })?;
        Ok(render::render_placeholder(size, display_width))
    }
}

/// lopdf for parsing, pdfium for real page content.
///
/// pdfium's init and teardown are process-global, so the library is bound
/// once per process, on the first render, and every page of every document
/// is rendered through that one binding. It is loaded from `library_dir`
/// when set or from the system search path otherwise; the first backend to
/// render decides which.
#[cfg(feature = "pdfium")]
static PDFIUM: once_cell::sync::OnceCell<pdfium_render::prelude::Pdfium> =
    once_cell::sync::OnceCell::new();

#[cfg(feature = "pdfium")]
#[derive(Debug, Clone, Default)]
pub struct PdfiumBackend {
    library_dir: Option<PathBuf>,
}

#[cfg(feature = "pdfium")]
impl PdfiumBackend {
    pub fn new(library_dir: Option<PathBuf>) -> Self {
        Self { library_dir }
    }

    fn pdfium(&self) -> Result<&'static pdfium_render::prelude::Pdfium, SignError> {
        PDFIUM.get_or_try_init(|| self.bind())
    }

    fn bind(&self) -> Result<pdfium_render::prelude::Pdfium, SignError> {
        use pdfium_render::prelude::Pdfium;

        let bindings = match &self.library_dir {
            Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir)),
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| SignError::Internal(format!("Failed to bind to pdfium library: {:?}", e)))?;

        info!("pdfium bound");
        Ok(Pdfium::new(bindings))
    }
}

#[cfg(feature = "pdfium")]
impl DocumentBackend for PdfiumBackend {
    fn parse(&self, bytes: &[u8]) -> Result<ParsedDocument, SignError> {
        parse::parse_document(bytes)
    }

    fn render_page(
        &self,
        bytes: &[u8],
        page_index: usize,
        display_width: u32,
    ) -> Result<DynamicImage, SignError> {
        render::render_page_pdfium(self.pdfium()?, bytes, page_index, display_width)
    }
}

/// The backend a session uses when the caller does not pick one.
pub fn default_backend(config: &crate::config::SignerConfig) -> Arc<dyn DocumentBackend> {
    #[cfg(feature = "pdfium")]
    {
        Arc::new(PdfiumBackend::new(config.pdfium_library_dir.clone()))
    }
    #[cfg(not(feature = "pdfium"))]
    {
        let _ = config;
        Arc::new(LopdfBackend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::parse::tests::pdf_with_pages;

    #[test]
    fn lopdf_backend_renders_each_page() {
        let bytes = pdf_with_pages(&[(612, 792), (792, 612)]);
        let backend = LopdfBackend;
        let portrait = backend.render_page(&bytes, 0, 300).unwrap();
        let landscape = backend.render_page(&bytes, 1, 300).unwrap();
        assert!(portrait.height() > portrait.width());
        assert!(landscape.height() < landscape.width());
    }

    #[test]
    fn lopdf_backend_rejects_out_of_range_page() {
        let bytes = pdf_with_pages(&[(612, 792)]);
        let err = LopdfBackend.render_page(&bytes, 3, 300).unwrap_err();
        assert!(matches!(err, SignError::Render { page: 3, .. }));
    }

    #[cfg(feature = "pdfium")]
    #[test]
    fn pdfium_binding_is_shared_across_threads() {
        fn assert_send_sync<T: Send + Sync + 'static>() {}
        assert_send_sync::<pdfium_render::prelude::Pdfium>();
        assert_send_sync::<PdfiumBackend>();
    }

    #[cfg(feature = "pdfium")]
    #[test]
    fn failed_pdfium_bind_is_not_cached() {
        let backend = PdfiumBackend::new(Some(PathBuf::from("/nonexistent/pdfium")));
        let bytes = pdf_with_pages(&[(612, 792)]);
        for _ in 0..2 {
            let err = backend.render_page(&bytes, 0, 300).unwrap_err();
            assert!(matches!(err, SignError::Internal(_)), "got {err:?}");
        }
        assert!(PDFIUM.get().is_none());
    }

    #[test]
    fn backend_is_object_safe() {
        let b: Arc<dyn DocumentBackend> = Arc::new(LopdfBackend);
        let bytes = pdf_with_pages(&[(612, 792)]);
        assert_eq!(b.parse(&bytes).unwrap().page_count(), 1);
    }
}
