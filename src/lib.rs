//! # edgequake-pdfsign
//!
//! Place a styled text signature on a PDF page and export the signed copy.
//!
//! A host application (desktop shell, webview, server-rendered UI) uploads a
//! document, lets the user type and style a signature, drag it onto a page,
//! then either **save** a signed draft back into the session or **submit**
//! for a final downloadable copy. The crate owns everything between the
//! upload and the network call: page layout, drag clamping, the coordinate
//! conversion each export target expects, and the lifecycle that decides
//! which export is allowed.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF bytes
//!  │
//!  ├─ 1. Parse     page count and sizes (lopdf)
//!  ├─ 2. Layout    page boxes at the responsive display width
//!  ├─ 3. Render    rasterise pages via pdfium (spawn_blocking stream)
//!  ├─ 4. Place     drag / release the overlay, clamped to the page
//!  ├─ 5. Convert   screen point → export target (flip or passthrough)
//!  └─ 6. Export    multipart POST, signed PDF back
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdfsign::{Outcome, SignerConfig, SigningSession};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SignerConfig::from_env()?;
//!     let mut session = SigningSession::new(config);
//!
//!     session.load(std::fs::read("contract.pdf")?)?;
//!     session.set_text("Jane Doe");
//!     session.set_font_size(32);
//!     session.on_drag_release(120.0, 80.0)?;
//!
//!     let exporter = session.exporter()?;
//!     if let Outcome::Applied(download) = session.submit(&exporter).await? {
//!         download.write_to(&download.filename).await?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `pdfium` | on      | Real page rasterisation through the pdfium shared library |
//!
//! Without `pdfium` the engine still parses and lays out documents; pages
//! render as blank sheets of the right size:
//! ```toml
//! edgequake-pdfsign = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backend;
pub mod config;
pub mod error;
pub mod export;
pub mod observer;
pub mod output;
pub mod pipeline;
pub mod placement;
pub mod session;
pub mod stream;
pub mod style;
pub mod surface;
pub mod transform;

// ── Re-exports ───────────────────────────────────────────────────────────

#[cfg(feature = "pdfium")]
pub use backend::PdfiumBackend;
pub use backend::{DocumentBackend, LopdfBackend};
pub use config::{SignerConfig, SignerConfigBuilder};
pub use error::{ErrorCategory, ExportError, SignError, ValidationError};
pub use export::{
    Credential, ExportCollaborator, ExportKind, ExportRequest, ExportResponse, ExportTicket,
    HttpExportClient,
};
pub use observer::{NoopObserver, SessionObserver};
pub use output::{Download, Outcome, SaveOutcome, SessionSnapshot};
pub use placement::{Extent, Placement};
pub use session::{lifecycle_state, LifecycleState, SigningSession};
pub use stream::{render_stream, RenderedPage};
pub use style::{FontFamily, HexColor, SignatureStyle};
pub use surface::{OverlayView, PageView, WidthPolicy};
pub use transform::{CoordinateTarget, ScreenPoint, TargetPoint};
