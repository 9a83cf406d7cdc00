//! Error types for the edgequake-pdfsign library.
//!
//! Three kinds of failure reach the host, and each leaves the session in the
//! state it was in before the call:
//!
//! * [`ValidationError`] — the user asked for something the current state
//!   does not allow (no document, empty signature, nothing placed yet).
//!   No network call is made. Hosts surface these as a blocking prompt.
//!
//! * [`SignError::UnsupportedFormat`] — uploaded bytes are not a PDF the
//!   engine can lay out. The previously loaded document stays in place.
//!
//! * [`ExportError`] — the export service failed or answered with something
//!   other than a PDF. Placement and document are preserved so the user can
//!   retry without dragging again.
//!
//! [`SignError::category`] collapses the full enum onto these three buckets
//! (plus [`ErrorCategory::Internal`] for everything else).

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the edgequake-pdfsign library.
#[derive(Debug, Error)]
pub enum SignError {
    // ── User-facing validation ────────────────────────────────────────────
    /// The requested action is not allowed in the current session state.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    // ── Document errors ───────────────────────────────────────────────────
    /// The bytes could not be parsed as a PDF document.
    #[error("Unsupported document format: {detail}")]
    UnsupportedFormat { detail: String },

    /// The rendering backend failed for a specific page.
    #[error("Rendering failed for page {page}: {detail}")]
    Render { page: usize, detail: String },

    // ── Export errors ─────────────────────────────────────────────────────
    /// The export service call failed.
    #[error(transparent)]
    Export(#[from] ExportError),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not write a downloaded document to disk.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SignError {
    /// Coarse classification used by hosts to pick how a failure is shown.
    pub fn category(&self) -> ErrorCategory {
        match self {
            SignError::Validation(_) => ErrorCategory::Validation,
            SignError::UnsupportedFormat { .. } => ErrorCategory::UnsupportedFormat,
            SignError::Export(_) => ErrorCategory::Export,
            SignError::Render { .. }
            | SignError::OutputWriteFailed { .. }
            | SignError::InvalidConfig(_)
            | SignError::Internal(_) => ErrorCategory::Internal,
        }
    }

    pub(crate) fn unsupported(detail: impl Into<String>) -> Self {
        SignError::UnsupportedFormat {
            detail: detail.into(),
        }
    }
}

/// The buckets a host needs to tell apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ErrorCategory {
    Validation,
    UnsupportedFormat,
    Export,
    Internal,
}

/// An action was refused before any work was done.
///
/// The `Display` text is meant to be shown to the user as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum ValidationError {
    /// No document has been loaded.
    #[error("Upload a PDF before signing.")]
    MissingDocument,

    /// The signature text is empty.
    #[error("Enter your signature text first.")]
    EmptySignature,

    /// The signature has not been dropped onto the page since the last edit.
    #[error("Drag your signature onto the PDF before saving or submitting.")]
    NotPlaced,

    /// A request of the same kind is already running for this document.
    #[error("A {kind} request is already in progress for this document.")]
    OperationInFlight { kind: String },

    /// Font family outside the supported set.
    #[error("Unsupported font '{name}'. Choose Helvetica, Courier or Times-Roman.")]
    UnknownFont { name: String },

    /// Color is not a `#rgb` / `#rrggbb` hex string.
    #[error("Invalid color '{value}'. Use a hex color such as #1a2b3c.")]
    InvalidColor { value: String },

    /// Placement page does not exist in the loaded document.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    /// A completion was reported for a request this session never issued
    /// or has already completed.
    #[error("Unknown or already completed export request #{id}")]
    UnknownTicket { id: u64 },
}

/// A failed round trip to the export service.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum ExportError {
    /// The request could not be sent or the connection dropped.
    #[error("Export request to '{url}' failed: {reason}")]
    RequestFailed { url: String, reason: String },

    /// The request could not be built (bad header value, bad MIME type).
    #[error("Export request could not be built: {reason}")]
    InvalidRequest { reason: String },

    /// The request exceeded the configured timeout.
    #[error("Export request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The service answered with a non-success HTTP status.
    #[error("Export service returned HTTP {status}")]
    Status { status: u16 },

    /// The service answered 2xx but the body is not a PDF.
    #[error("Export service returned non-PDF content (content-type: {content_type:?})")]
    UnexpectedContent { content_type: Option<String> },
}

impl ExportError {
    /// Whether a retry has a reasonable chance of succeeding.
    pub fn is_transient(&self) -> bool {
        match self {
            ExportError::RequestFailed { .. } | ExportError::Timeout { .. } => true,
            ExportError::Status { status } => *status >= 500 || *status == 429,
            ExportError::InvalidRequest { .. } | ExportError::UnexpectedContent { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_display_is_user_facing() {
        let e = SignError::from(ValidationError::NotPlaced);
        assert!(e.to_string().contains("Drag your signature"), "got: {e}");
        assert_eq!(e.category(), ErrorCategory::Validation);
    }

    #[test]
    fn unsupported_format_category() {
        let e = SignError::unsupported("missing %PDF header");
        assert_eq!(e.category(), ErrorCategory::UnsupportedFormat);
        assert!(e.to_string().contains("%PDF"));
    }

    #[test]
    fn export_status_display() {
        let e = SignError::from(ExportError::Status { status: 502 });
        assert!(e.to_string().contains("502"));
        assert_eq!(e.category(), ErrorCategory::Export);
    }

    #[test]
    fn transient_classification() {
        assert!(ExportError::Timeout { secs: 30 }.is_transient());
        assert!(ExportError::Status { status: 503 }.is_transient());
        assert!(ExportError::Status { status: 429 }.is_transient());
        assert!(!ExportError::Status { status: 400 }.is_transient());
        assert!(!ExportError::UnexpectedContent { content_type: None }.is_transient());
        assert!(!ExportError::InvalidRequest {
            reason: "bad header".into()
        }
        .is_transient());
    }

    #[test]
    fn in_flight_mentions_kind() {
        let e = ValidationError::OperationInFlight {
            kind: "save".into(),
        };
        assert!(e.to_string().contains("save"));
    }
}
