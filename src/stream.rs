//! Streaming page rasterisation: emit rendered pages as they are ready.
//!
//! Rasterising a long document takes a while, and pdfium blocks the calling
//! thread. [`render_stream`] moves each page onto `spawn_blocking` and yields
//! results through a `Stream`, so a host can paint page 1 while later pages
//! are still rendering.
//!
//! Unlike a plain fan-out, results come back in page order: the viewer lays
//! pages out top to bottom and cannot place page 3 before page 2 is sized.

use crate::backend::DocumentBackend;
use crate::error::SignError;
use crate::pipeline::encode;
use crate::surface::PageView;
use futures::stream::{self, StreamExt};
use image::DynamicImage;
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::debug;

/// One page, laid out and rasterised.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub view: PageView,
    pub image: DynamicImage,
}

impl RenderedPage {
    pub fn index(&self) -> usize {
        self.view.index
    }

    /// `data:image/png;base64,…` for hosts that draw into a webview.
    pub fn data_url(&self) -> Result<String, SignError> {
        encode::encode_data_url(&self.image).map_err(|e| SignError::Render {
            page: self.view.index,
            detail: format!("PNG encode: {}", e),
        })
    }
}

/// A boxed stream of rendered pages.
pub type PageImageStream = Pin<Box<dyn Stream<Item = Result<RenderedPage, SignError>> + Send>>;

/// Rasterise `pages` through `backend`, up to `concurrency` at a time.
///
/// A page that fails to render yields an `Err` item; the stream continues
/// with the next page.
pub fn render_stream(
    backend: Arc<dyn DocumentBackend>,
    pages: impl IntoIterator<Item = PageView>,
    concurrency: usize,
) -> PageImageStream {
    let views: Vec<PageView> = pages.into_iter().collect();
    debug!("Rendering {} pages (concurrency {})", views.len(), concurrency.max(1));

    let s = stream::iter(views.into_iter().map(move |view| {
        let backend = Arc::clone(&backend);
        async move {
            let task_view = view.clone();
            let image = tokio::task::spawn_blocking(move || task_view.rasterize(backend.as_ref()))
                .await
                .map_err(|e| SignError::Internal(format!("render task failed: {}", e)))??;
            Ok(RenderedPage { view, image })
        }
    }))
    .buffered(concurrency.max(1));

    Box::pin(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LopdfBackend;
    use crate::pipeline::parse::tests::pdf_with_pages;
    use crate::surface::{RenderSurface, WidthPolicy};
    use bytes::Bytes;

    #[tokio::test]
    async fn pages_arrive_in_order() {
        let mut surface = RenderSurface::new(WidthPolicy::default());
        surface
            .load(
                &LopdfBackend,
                None,
                Bytes::from(pdf_with_pages(&[(612, 792), (792, 612), (612, 792)])),
            )
            .unwrap();

        let backend: Arc<dyn DocumentBackend> = Arc::new(LopdfBackend);
        let rendered: Vec<RenderedPage> = render_stream(backend, surface.pages(None), 3)
            .map(|r| r.expect("page renders"))
            .collect()
            .await;

        let indices: Vec<usize> = rendered.iter().map(RenderedPage::index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert!(rendered[1].image.width() > rendered[1].image.height());
        assert!(rendered[0].data_url().unwrap().starts_with("data:image/png;base64,"));
    }

    #[tokio::test]
    async fn empty_input_yields_empty_stream() {
        let backend: Arc<dyn DocumentBackend> = Arc::new(LopdfBackend);
        let count = render_stream(backend, Vec::new(), 0).count().await;
        assert_eq!(count, 0);
    }
}
