//! Document pipeline stages.
//!
//! Each submodule implements exactly one transformation step, so a stage
//! (e.g. the rasteriser) can be swapped without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! bytes ──▶ parse ──▶ render ──▶ encode
//!          (lopdf)   (pdfium)   (png / data URL)
//! ```
//!
//! 1. [`parse`]  — validate `%PDF` bytes and read page count and page sizes
//! 2. [`render`] — rasterise one page at a display width; blocking, so async
//!    callers go through [`crate::stream`]
//! 3. [`encode`] — PNG-encode a rendered page for the host UI

pub mod encode;
pub mod parse;
pub mod render;
