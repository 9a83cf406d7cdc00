//! The export collaborator: turns a placed signature into a signed document.
//!
//! The engine never embeds text into PDF content itself. It snapshots the
//! document, style and transformed placement into an [`ExportRequest`] and
//! hands it to an [`ExportCollaborator`], which answers with the bytes of the
//! signed document.
//!
//! [`HttpExportClient`] is the production collaborator: one multipart `POST`
//! per request against a configurable endpoint.
//!
//! ## Retry Strategy
//!
//! Connection failures, timeouts, HTTP 429 and 5xx are retried with
//! exponential backoff (`retry_backoff_ms * 2^(attempt-1)`, capped at
//! [`MAX_RETRY_DELAY_MS`]); with the default 500 ms base and 2 retries the
//! waits are 500 ms then 1 s. Anything else (4xx, a request that cannot be
//! built, a 2xx body that is not a PDF) fails on the first attempt.

use crate::config::SignerConfig;
use crate::error::{ExportError, SignError};
use crate::pipeline::parse::has_pdf_magic;
use crate::style::{FontFamily, HexColor};
use crate::transform::TargetPoint;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// File name the document part is uploaded under.
pub const UPLOAD_FILE_NAME: &str = "document.pdf";

/// MIME type of both the uploaded and the returned document.
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Upper bound on a single backoff wait.
pub const MAX_RETRY_DELAY_MS: u64 = 30_000;

/// Upper bound on retries per request.
pub const MAX_RETRIES: u32 = 10;

/// Wait before retry number `attempt` (1-based).
fn backoff_delay_ms(base_ms: u64, attempt: u32) -> u64 {
    let factor = 2u64.checked_pow(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
    base_ms.saturating_mul(factor).min(MAX_RETRY_DELAY_MS)
}

/// Which finalize operation a request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportKind {
    /// Replace the in-session document with a signed draft.
    Save,
    /// Produce a final signed copy for download.
    Submit,
}

impl fmt::Display for ExportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExportKind::Save => "save",
            ExportKind::Submit => "submit",
        })
    }
}

/// Opaque session credential attached to `save` requests.
///
/// The engine reads it and sets it as a header; it never inspects the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    header: String,
    value: String,
}

impl Credential {
    pub fn new(header: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            value: value.into(),
        }
    }

    /// `Authorization: Bearer <token>`.
    pub fn bearer(token: impl AsRef<str>) -> Self {
        Self::new("Authorization", format!("Bearer {}", token.as_ref()))
    }

    /// Session cookie, as a browser would send it.
    pub fn cookie(cookie: impl Into<String>) -> Self {
        Self::new("Cookie", cookie)
    }

    pub fn header(&self) -> &str {
        &self.header
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("header", &self.header)
            .field("value", &"<redacted>")
            .finish()
    }
}

/// Everything the export service needs, captured at `begin_*` time.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub kind: ExportKind,
    pub document: Bytes,
    pub signature_text: String,
    /// Placement already converted to the target's coordinate system.
    pub point: TargetPoint,
    pub page_index: usize,
    pub color: HexColor,
    pub font_family: FontFamily,
    pub font_size_pt: u32,
    pub file_id: Option<String>,
    pub credential: Option<Credential>,
}

impl ExportRequest {
    /// Text fields of the multipart form, in wire order.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("signatureText", self.signature_text.clone()),
            ("x", self.point.x.to_string()),
            ("y", self.point.y.to_string()),
            ("page", self.page_index.to_string()),
            ("color", self.color.as_str().to_string()),
            ("fontStyle", self.font_family.wire_name().to_string()),
            ("fontSize", self.font_size_pt.to_string()),
        ];
        if let Some(id) = &self.file_id {
            fields.push(("fileId", id.clone()));
        }
        fields
    }

    fn to_form(&self) -> Result<Form, reqwest::Error> {
        let document = Part::bytes(self.document.to_vec())
            .file_name(UPLOAD_FILE_NAME)
            .mime_str(PDF_CONTENT_TYPE)?;
        let form = self
            .form_fields()
            .into_iter()
            .fold(Form::new().part("document", document), |form, (name, value)| {
                form.text(name, value)
            });
        Ok(form)
    }
}

/// Signed document returned by the export service.
#[derive(Debug, Clone)]
pub struct ExportResponse {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

/// Anything that can turn an [`ExportRequest`] into a signed document.
#[async_trait]
pub trait ExportCollaborator: Send + Sync {
    async fn export(&self, request: &ExportRequest) -> Result<ExportResponse, ExportError>;
}

/// An export issued by a session and not yet completed.
///
/// Returned by `begin_save` / `begin_submit`; pass it back to the matching
/// `complete_*` (or `abandon`) once [`ExportTicket::dispatch`] resolves.
#[derive(Debug)]
pub struct ExportTicket {
    pub(crate) id: u64,
    pub(crate) generation: u64,
    pub(crate) epoch: u64,
    pub(crate) request: ExportRequest,
}

impl ExportTicket {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> ExportKind {
        self.request.kind
    }

    pub fn request(&self) -> &ExportRequest {
        &self.request
    }

    /// Run the network round trip. Borrows nothing from the session.
    pub async fn dispatch(
        &self,
        collaborator: &dyn ExportCollaborator,
    ) -> Result<ExportResponse, ExportError> {
        info!(
            "Dispatching {} request #{} ({} bytes, page {})",
            self.request.kind,
            self.id,
            self.request.document.len(),
            self.request.page_index
        );
        collaborator.export(&self.request).await
    }
}

/// Multipart HTTP client for the signing endpoint.
#[derive(Debug, Clone)]
pub struct HttpExportClient {
    client: reqwest::Client,
    endpoint: String,
    timeout_secs: u64,
    max_retries: u32,
    retry_backoff_ms: u64,
}

impl HttpExportClient {
    pub fn new(endpoint: impl Into<String>, timeout_secs: u64) -> Result<Self, SignError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| SignError::InvalidConfig(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            timeout_secs,
            max_retries: 0,
            retry_backoff_ms: 0,
        })
    }

    pub fn from_config(config: &SignerConfig) -> Result<Self, SignError> {
        Ok(Self::new(&config.export_endpoint, config.request_timeout_secs)?
            .with_retries(config.max_retries, config.retry_backoff_ms))
    }

    /// Retry policy. `max_retries` is clamped to [`MAX_RETRIES`].
    pub fn with_retries(mut self, max_retries: u32, retry_backoff_ms: u64) -> Self {
        self.max_retries = max_retries.min(MAX_RETRIES);
        self.retry_backoff_ms = retry_backoff_ms;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send_once(&self, request: &ExportRequest) -> Result<ExportResponse, ExportError> {
        let form = request
            .to_form()
            .map_err(|e| ExportError::InvalidRequest {
                reason: e.to_string(),
            })?;

        let mut builder = self.client.post(&self.endpoint).multipart(form);
        if let Some(credential) = &request.credential {
            builder = builder.header(credential.header(), credential.value());
        }

        let response = builder.send().await.map_err(|e| self.request_failed(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExportError::Status {
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let bytes = response.bytes().await.map_err(|e| self.request_failed(e))?;

        if !has_pdf_magic(&bytes) {
            return Err(ExportError::UnexpectedContent { content_type });
        }

        Ok(ExportResponse {
            bytes,
            content_type,
        })
    }

    fn request_failed(&self, e: reqwest::Error) -> ExportError {
        if e.is_builder() {
            ExportError::InvalidRequest {
                reason: e.to_string(),
            }
        } else if e.is_timeout() {
            ExportError::Timeout {
                secs: self.timeout_secs,
            }
        } else {
            ExportError::RequestFailed {
                url: self.endpoint.clone(),
                reason: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl ExportCollaborator for HttpExportClient {
    async fn export(&self, request: &ExportRequest) -> Result<ExportResponse, ExportError> {
        let start = Instant::now();
        let mut attempt = 0u32;

        loop {
            if attempt > 0 {
                let backoff = backoff_delay_ms(self.retry_backoff_ms, attempt);
                warn!(
                    "{} request: retry {}/{} after {}ms",
                    request.kind, attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match self.send_once(request).await {
                Ok(response) => {
                    debug!(
                        "{} request: {} bytes back in {:?}",
                        request.kind,
                        response.bytes.len(),
                        start.elapsed()
                    );
                    return Ok(response);
                }
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    warn!("{} request: attempt {} failed: {}", request.kind, attempt + 1, e);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
