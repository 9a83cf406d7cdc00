//! The document render surface: owns the loaded document and lays its pages
//! out at the current display width.
//!
//! ## Document ownership
//!
//! The surface holds at most one [`Document`]. It is replaced wholesale on
//! every successful [`RenderSurface::load`] or save round trip, never edited
//! in place. A failed load leaves the previous document untouched.
//!
//! Every load starts a new *generation*. Export results are tagged with the
//! generation they were issued against, so a response that arrives after the
//! user uploaded a different file can be recognised and dropped.
//!
//! ## Layout
//!
//! Page display sizes are computed on demand from the page's aspect ratio
//! and the current display width, with heights snapped to the subpixel grid.
//! Nothing is cached, so a width change from a responsive reflow is visible
//! to the very next coordinate conversion.

use crate::backend::DocumentBackend;
use crate::error::SignError;
use crate::pipeline::parse::PageSize;
use crate::placement::Extent;
use crate::style::{FontFamily, HexColor};
use crate::transform::{snap, ScreenPoint};
use bytes::Bytes;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::info;

/// File name given to an upload when the host does not supply one.
pub const DEFAULT_FILE_NAME: &str = "document.pdf";

/// A loaded PDF: raw bytes plus the geometry derived from them.
#[derive(Debug, Clone)]
pub struct Document {
    bytes: Bytes,
    file_name: String,
    pages: Vec<PageSize>,
    generation: u64,
    revision: u32,
}

impl Document {
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn page_size(&self, index: usize) -> Option<PageSize> {
        self.pages.get(index).copied()
    }

    /// Load counter; changes only when a new file is uploaded.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of save round trips folded into this document since upload.
    pub fn revision(&self) -> u32 {
        self.revision
    }
}

/// Page width chosen from the viewport width.
///
/// Wide viewports get a comfortable reading width; narrow ones (phones) a
/// width that fits without horizontal scrolling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WidthPolicy {
    /// Viewports strictly wider than this use `wide`.
    pub breakpoint: f64,
    pub wide: f64,
    pub narrow: f64,
}

impl Default for WidthPolicy {
    fn default() -> Self {
        Self {
            breakpoint: 768.0,
            wide: 600.0,
            narrow: 320.0,
        }
    }
}

impl WidthPolicy {
    pub fn width_for(&self, viewport_width: f64) -> f64 {
        if viewport_width > self.breakpoint {
            self.wide
        } else {
            self.narrow
        }
    }
}

/// Everything a host needs to draw the signature on top of a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayView {
    pub page_index: usize,
    pub text: String,
    pub font_family: FontFamily,
    pub font_size_pt: u32,
    pub color: HexColor,
    pub position: ScreenPoint,
    /// `false` once the placement has been saved into the document; the
    /// overlay is then drawn static until the next edit.
    pub draggable: bool,
}

/// One laid-out page. Cheap to clone; holds a reference-counted handle to
/// the document bytes so it can be rasterised on another thread.
#[derive(Debug, Clone)]
pub struct PageView {
    pub index: usize,
    pub display: Extent,
    pub overlay: Option<OverlayView>,
    bytes: Bytes,
}

impl PageView {
    /// Rasterise this page through `backend` at its display width.
    pub fn rasterize(&self, backend: &dyn DocumentBackend) -> Result<DynamicImage, SignError> {
        let width = self.display.width.round().max(1.0) as u32;
        backend.render_page(&self.bytes, self.index, width)
    }
}

/// Lazy sequence of [`PageView`]s, one per page. Cloning restarts it.
#[derive(Debug, Clone)]
pub struct PageIter<'a> {
    surface: &'a RenderSurface,
    display_width: f64,
    overlay: Option<OverlayView>,
    next: usize,
}

impl Iterator for PageIter<'_> {
    type Item = PageView;

    fn next(&mut self) -> Option<PageView> {
        let view = self
            .surface
            .page_view(self.next, self.display_width, self.overlay.as_ref())?;
        self.next += 1;
        Some(view)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.surface.page_count().saturating_sub(self.next);
        (left, Some(left))
    }
}

impl ExactSizeIterator for PageIter<'_> {}

/// Owns the current document and the display width pages are laid out at.
#[derive(Debug, Clone)]
pub struct RenderSurface {
    document: Option<Document>,
    display_width: f64,
    width_policy: WidthPolicy,
    generations: u64,
}

impl RenderSurface {
    pub fn new(width_policy: WidthPolicy) -> Self {
        Self {
            document: None,
            display_width: width_policy.wide,
            width_policy,
            generations: 0,
        }
    }

    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    pub fn has_document(&self) -> bool {
        self.document.is_some()
    }

    pub fn page_count(&self) -> usize {
        self.document.as_ref().map_or(0, Document::page_count)
    }

    pub fn generation(&self) -> Option<u64> {
        self.document.as_ref().map(Document::generation)
    }

    /// Parse `bytes` and, on success, make them the current document.
    ///
    /// Returns the page count. On failure the previous document is kept.
    pub fn load(
        &mut self,
        backend: &dyn DocumentBackend,
        file_name: Option<&str>,
        bytes: Bytes,
    ) -> Result<usize, SignError> {
        let parsed = backend.parse(&bytes)?;
        self.generations += 1;
        let page_count = parsed.page_count();
        info!(
            "Loaded document generation {} ({} pages, {} bytes)",
            self.generations,
            page_count,
            bytes.len()
        );
        self.document = Some(Document {
            bytes,
            file_name: file_name.unwrap_or(DEFAULT_FILE_NAME).to_string(),
            pages: parsed.pages,
            generation: self.generations,
            revision: 0,
        });
        Ok(page_count)
    }

    /// Swap in bytes produced by a save round trip, keeping the generation.
    pub fn replace_saved(
        &mut self,
        backend: &dyn DocumentBackend,
        file_name: &str,
        bytes: Bytes,
    ) -> Result<usize, SignError> {
        let Some(current) = self.document.as_ref() else {
            return Err(SignError::Internal(
                "save result arrived with no document loaded".into(),
            ));
        };
        let parsed = backend.parse(&bytes)?;
        let page_count = parsed.page_count();
        let document = Document {
            bytes,
            file_name: file_name.to_string(),
            pages: parsed.pages,
            generation: current.generation,
            revision: current.revision + 1,
        };
        info!(
            "Document generation {} replaced by saved revision {}",
            document.generation, document.revision
        );
        self.document = Some(document);
        Ok(page_count)
    }

    pub fn display_width(&self) -> f64 {
        self.display_width
    }

    /// Set the page width directly (e.g. measured from the host layout).
    pub fn set_display_width(&mut self, width: f64) {
        if width.is_finite() && width > 0.0 {
            self.display_width = width;
        }
    }

    /// Pick the page width for a viewport using the configured policy.
    pub fn apply_viewport(&mut self, viewport_width: f64) -> f64 {
        self.display_width = self.width_policy.width_for(viewport_width);
        self.display_width
    }

    /// Current on-screen box of a page at the current display width.
    pub fn page_display_size(&self, index: usize) -> Option<Extent> {
        self.page_display_size_at(index, self.display_width)
    }

    pub fn page_display_size_at(&self, index: usize, display_width: f64) -> Option<Extent> {
        let size = self.document.as_ref()?.page_size(index)?;
        Some(Extent::new(display_width, snap(size.display_height(display_width))))
    }

    /// Lay out a single page at `display_width`. The overlay is attached
    /// only when it belongs to this page.
    pub fn page_view(
        &self,
        index: usize,
        display_width: f64,
        overlay: Option<&OverlayView>,
    ) -> Option<PageView> {
        let document = self.document.as_ref()?;
        let display = self.page_display_size_at(index, display_width)?;
        Some(PageView {
            index,
            display,
            overlay: overlay.filter(|o| o.page_index == index).cloned(),
            bytes: document.bytes.clone(),
        })
    }

    /// All pages at the current display width.
    pub fn pages(&self, overlay: Option<OverlayView>) -> PageIter<'_> {
        self.pages_at(self.display_width, overlay)
    }

    pub fn pages_at(&self, display_width: f64, overlay: Option<OverlayView>) -> PageIter<'_> {
        PageIter {
            surface: self,
            display_width,
            overlay,
            next: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LopdfBackend;
    use crate::pipeline::parse::tests::pdf_with_pages;

    fn loaded(sizes: &[(i64, i64)]) -> RenderSurface {
        let mut s = RenderSurface::new(WidthPolicy::default());
        s.load(&LopdfBackend, None, Bytes::from(pdf_with_pages(sizes)))
            .expect("load");
        s
    }

    fn overlay_on(page_index: usize) -> OverlayView {
        OverlayView {
            page_index,
            text: "Jane Doe".into(),
            font_family: FontFamily::Helvetica,
            font_size_pt: 24,
            color: HexColor::default(),
            position: ScreenPoint::new(120.0, 80.0),
            draggable: true,
        }
    }

    #[test]
    fn load_reports_page_count() {
        let s = loaded(&[(612, 792), (612, 792), (612, 792)]);
        assert_eq!(s.page_count(), 3);
        assert_eq!(s.generation(), Some(1));
        assert_eq!(s.document().unwrap().file_name(), DEFAULT_FILE_NAME);
    }

    #[test]
    fn failed_load_keeps_previous_document() {
        let mut s = loaded(&[(612, 792)]);
        let before = s.document().unwrap().bytes().clone();
        let err = s
            .load(&LopdfBackend, None, Bytes::from_static(b"not a pdf"))
            .unwrap_err();
        assert!(matches!(err, SignError::UnsupportedFormat { .. }));
        assert_eq!(s.document().unwrap().bytes(), &before);
        assert_eq!(s.generation(), Some(1));
    }

    #[test]
    fn pages_sequence_is_finite_and_restartable() {
        let s = loaded(&[(612, 792), (612, 792)]);
        let iter = s.pages(None);
        assert_eq!(iter.len(), 2);
        let first: Vec<usize> = iter.clone().map(|p| p.index).collect();
        let second: Vec<usize> = iter.map(|p| p.index).collect();
        assert_eq!(first, vec![0, 1]);
        assert_eq!(first, second);
    }

    #[test]
    fn overlay_is_attached_to_exactly_one_page() {
        let s = loaded(&[(612, 792), (612, 792), (612, 792)]);
        let with_overlay: Vec<usize> = s
            .pages(Some(overlay_on(1)))
            .filter(|p| p.overlay.is_some())
            .map(|p| p.index)
            .collect();
        assert_eq!(with_overlay, vec![1]);
    }

    #[test]
    fn layout_follows_display_width() {
        let mut s = loaded(&[(612, 792)]);
        assert_eq!(s.page_display_size(0).unwrap().width, 600.0);
        s.apply_viewport(375.0);
        let narrow = s.page_display_size(0).unwrap();
        assert_eq!(narrow.width, 320.0);
        assert_eq!(narrow.height, 414.125);

        s.set_display_width(-5.0);
        assert_eq!(s.display_width(), 320.0, "invalid widths are ignored");
    }

    #[test]
    fn width_policy_breakpoint_is_exclusive() {
        let p = WidthPolicy::default();
        assert_eq!(p.width_for(768.0), 320.0);
        assert_eq!(p.width_for(769.0), 600.0);
    }

    #[test]
    fn replace_saved_keeps_generation_and_bumps_revision() {
        let mut s = loaded(&[(612, 792)]);
        let signed = Bytes::from(pdf_with_pages(&[(612, 792)]));
        s.replace_saved(&LopdfBackend, "signed.pdf", signed.clone())
            .unwrap();
        let doc = s.document().unwrap();
        assert_eq!(doc.generation(), 1);
        assert_eq!(doc.revision(), 1);
        assert_eq!(doc.bytes(), &signed);
        assert_eq!(doc.file_name(), "signed.pdf");
    }

    #[test]
    fn page_view_rasterizes_through_backend() {
        let s = loaded(&[(612, 792)]);
        let view = s.pages_at(320.0, None).next().unwrap();
        let img = view.rasterize(&LopdfBackend).unwrap();
        assert_eq!(img.width(), 320);
        assert_eq!(img.height(), 414);
    }
}
