//! Output types handed back to the host.
//!
//! * [`Download`] — the signed copy produced by `submit`, ready to offer to
//!   the user or write to disk.
//! * [`SaveOutcome`] — what a successful `save` did to the session.
//! * [`Outcome`] — wraps export completions that may have been superseded.
//! * [`SessionSnapshot`] — serialisable view of the whole session, for host
//!   UIs that re-render from state.

use crate::error::SignError;
use crate::placement::Placement;
use crate::session::LifecycleState;
use crate::style::SignatureStyle;
use crate::surface::OverlayView;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// A finished document the user can download.
#[derive(Debug, Clone)]
pub struct Download {
    pub filename: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl Download {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Write the document to `path`.
    ///
    /// Uses atomic write (temp file + rename) so a reader never sees a
    /// partial file.
    pub async fn write_to(&self, path: impl AsRef<Path>) -> Result<(), SignError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SignError::OutputWriteFailed {
                    path: path.to_path_buf(),
                    source: e,
                })?;
        }

        let tmp_path = path.with_extension("pdf.tmp");
        tokio::fs::write(&tmp_path, &self.bytes)
            .await
            .map_err(|e| SignError::OutputWriteFailed {
                path: path.to_path_buf(),
                source: e,
            })?;

        tokio::fs::rename(&tmp_path, path)
            .await
            .map_err(|e| SignError::OutputWriteFailed {
                path: path.to_path_buf(),
                source: e,
            })?;

        info!("Wrote {} ({} bytes)", path.display(), self.bytes.len());
        Ok(())
    }
}

/// Result of a save whose response was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveOutcome {
    /// Pages in the returned document.
    pub page_count: usize,
    /// Saves folded into the document since it was uploaded.
    pub revision: u32,
    /// `false` when the user edited the signature while the request was in
    /// flight: the document was still replaced, but the session is not in
    /// the Saved state.
    pub marked_saved: bool,
}

/// Completion of an export that a later upload may have overtaken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The result was applied to the current document.
    Applied(T),
    /// A different document was loaded after the request was issued; the
    /// result was dropped.
    Discarded,
}

impl<T> Outcome<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied(_))
    }

    pub fn applied(self) -> Option<T> {
        match self {
            Outcome::Applied(value) => Some(value),
            Outcome::Discarded => None,
        }
    }
}

/// Serialisable view of a session at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub state: LifecycleState,
    pub page_count: usize,
    pub generation: Option<u64>,
    pub revision: Option<u32>,
    pub display_width: f64,
    pub style: SignatureStyle,
    pub placement: Placement,
    pub overlay: Option<OverlayView>,
    pub save_in_flight: bool,
    pub submit_in_flight: bool,
}
