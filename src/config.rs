//! Configuration for a signing session.
//!
//! All session behaviour is controlled through [`SignerConfig`], built via
//! its [`SignerConfigBuilder`]. Callers set only what they care about and
//! rely on the documented defaults for the rest.

use crate::error::SignError;
use crate::export::{Credential, ExportKind, MAX_RETRIES};
use crate::observer::SharedObserver;
use crate::placement::DEFAULT_POSITION;
use crate::style::SignatureStyle;
use crate::surface::WidthPolicy;
use crate::transform::{CoordinateTarget, ScreenPoint};
use std::fmt;
use std::path::PathBuf;

/// Export endpoint used when none is configured.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:5000/api/sign";

/// Overrides [`SignerConfig::export_endpoint`].
pub const ENV_ENDPOINT: &str = "EDGEQUAKE_SIGN_ENDPOINT";
/// Overrides [`SignerConfig::request_timeout_secs`].
pub const ENV_TIMEOUT_SECS: &str = "EDGEQUAKE_SIGN_TIMEOUT_SECS";
/// Directory holding the pdfium shared library.
pub const ENV_PDFIUM_LIB_PATH: &str = "PDFIUM_LIB_PATH";

/// Configuration for a [`crate::session::SigningSession`].
///
/// Built via [`SignerConfig::builder()`] or using [`SignerConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_pdfsign::SignerConfig;
///
/// let config = SignerConfig::builder()
///     .export_endpoint("https://sign.example.com/api/sign")
///     .request_timeout_secs(30)
///     .file_id("contract-42")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct SignerConfig {
    /// URL the multipart export request is posted to.
    pub export_endpoint: String,

    /// Per-request timeout in seconds. Default: 60.
    pub request_timeout_secs: u64,

    /// Retries on a transient export failure. Default: 2, at most 10.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Style a new session (and every `reset`) starts from, minus the text.
    pub default_style: SignatureStyle,

    /// Where the overlay sits before the first drag and after `reset`.
    /// Default: (100, 100).
    pub default_position: ScreenPoint,

    /// Page the signature is placed on. Default: 0.
    pub placement_page: usize,

    /// Page width chosen per viewport width.
    pub width_policy: WidthPolicy,

    /// Coordinate convention of the renderer behind `save`.
    /// Default: [`CoordinateTarget::VerticalFlip`].
    pub save_target: CoordinateTarget,

    /// Coordinate convention of the renderer behind `submit`.
    /// Default: [`CoordinateTarget::Passthrough`].
    pub submit_target: CoordinateTarget,

    /// File name offered for the `submit` download.
    pub download_filename: String,

    /// File name the in-session document takes after a `save`.
    pub saved_filename: String,

    /// Server-side identifier of the uploaded file, sent as `fileId`.
    pub file_id: Option<String>,

    /// Session credential attached to `save` requests.
    pub credential: Option<Credential>,

    /// Where to look for the pdfium shared library. `None` uses the system
    /// search path.
    pub pdfium_library_dir: Option<PathBuf>,

    /// Lifecycle event sink.
    pub observer: Option<SharedObserver>,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            export_endpoint: DEFAULT_ENDPOINT.to_string(),
            request_timeout_secs: 60,
            max_retries: 2,
            retry_backoff_ms: 500,
            default_style: SignatureStyle::default(),
            default_position: DEFAULT_POSITION,
            placement_page: 0,
            width_policy: WidthPolicy::default(),
            save_target: CoordinateTarget::VerticalFlip,
            submit_target: CoordinateTarget::Passthrough,
            download_filename: "signed-document.pdf".to_string(),
            saved_filename: "signed.pdf".to_string(),
            file_id: None,
            credential: None,
            pdfium_library_dir: None,
            observer: None,
        }
    }
}

impl fmt::Debug for SignerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignerConfig")
            .field("export_endpoint", &self.export_endpoint)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("default_style", &self.default_style)
            .field("default_position", &self.default_position)
            .field("placement_page", &self.placement_page)
            .field("width_policy", &self.width_policy)
            .field("save_target", &self.save_target)
            .field("submit_target", &self.submit_target)
            .field("download_filename", &self.download_filename)
            .field("file_id", &self.file_id)
            .field("credential", &self.credential)
            .field("pdfium_library_dir", &self.pdfium_library_dir)
            .field("observer", &self.observer.as_ref().map(|_| "<dyn SessionObserver>"))
            .finish()
    }
}

impl SignerConfig {
    /// Create a new builder for `SignerConfig`.
    pub fn builder() -> SignerConfigBuilder {
        SignerConfigBuilder {
            config: Self::default(),
        }
    }

    /// Defaults overlaid with `EDGEQUAKE_SIGN_ENDPOINT`,
    /// `EDGEQUAKE_SIGN_TIMEOUT_SECS` and `PDFIUM_LIB_PATH`.
    pub fn from_env() -> Result<Self, SignError> {
        Self::builder().with_env().build()
    }

    /// Coordinate convention for an export kind.
    pub fn target_for(&self, kind: ExportKind) -> CoordinateTarget {
        match kind {
            ExportKind::Save => self.save_target,
            ExportKind::Submit => self.submit_target,
        }
    }
}

/// Builder for [`SignerConfig`].
#[derive(Debug)]
pub struct SignerConfigBuilder {
    config: SignerConfig,
}

impl SignerConfigBuilder {
    pub fn export_endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.export_endpoint = url.into();
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs.max(1);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n.min(MAX_RETRIES);
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn default_style(mut self, style: SignatureStyle) -> Self {
        self.config.default_style = SignatureStyle {
            text: String::new(),
            ..style
        };
        self
    }

    pub fn default_position(mut self, position: ScreenPoint) -> Self {
        self.config.default_position = position;
        self
    }

    pub fn placement_page(mut self, page: usize) -> Self {
        self.config.placement_page = page;
        self
    }

    pub fn width_policy(mut self, policy: WidthPolicy) -> Self {
        self.config.width_policy = policy;
        self
    }

    pub fn target(mut self, kind: ExportKind, target: CoordinateTarget) -> Self {
        match kind {
            ExportKind::Save => self.config.save_target = target,
            ExportKind::Submit => self.config.submit_target = target,
        }
        self
    }

    pub fn download_filename(mut self, name: impl Into<String>) -> Self {
        self.config.download_filename = name.into();
        self
    }

    pub fn saved_filename(mut self, name: impl Into<String>) -> Self {
        self.config.saved_filename = name.into();
        self
    }

    pub fn file_id(mut self, id: impl Into<String>) -> Self {
        self.config.file_id = Some(id.into());
        self
    }

    pub fn credential(mut self, credential: Credential) -> Self {
        self.config.credential = Some(credential);
        self
    }

    pub fn pdfium_library_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_dir = Some(dir.into());
        self
    }

    pub fn observer(mut self, observer: SharedObserver) -> Self {
        self.config.observer = Some(observer);
        self
    }

    /// Overlay values from the process environment.
    pub fn with_env(self) -> Self {
        self.with_lookup(|key| std::env::var(key).ok())
    }

    /// Overlay values from `lookup`; unset or unparsable values are skipped.
    pub fn with_lookup(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(ENV_ENDPOINT).filter(|v| !v.trim().is_empty()) {
            self = self.export_endpoint(url.trim());
        }
        if let Some(secs) = lookup(ENV_TIMEOUT_SECS).and_then(|v| v.trim().parse().ok()) {
            self = self.request_timeout_secs(secs);
        }
        if let Some(dir) = lookup(ENV_PDFIUM_LIB_PATH).filter(|v| !v.is_empty()) {
            self = self.pdfium_library_dir(dir);
        }
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<SignerConfig, SignError> {
        let c = &self.config;
        if !(c.export_endpoint.starts_with("http://") || c.export_endpoint.starts_with("https://")) {
            return Err(SignError::InvalidConfig(format!(
                "Export endpoint must be an http(s) URL, got '{}'",
                c.export_endpoint
            )));
        }
        let p = &c.width_policy;
        if [p.breakpoint, p.wide, p.narrow]
            .iter()
            .any(|v| !v.is_finite() || *v <= 0.0)
        {
            return Err(SignError::InvalidConfig(format!(
                "Width policy values must be positive, got {:?}",
                p
            )));
        }
        if c.download_filename.trim().is_empty() || c.saved_filename.trim().is_empty() {
            return Err(SignError::InvalidConfig(
                "Output file names must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::FontFamily;

    #[test]
    fn defaults_match_documented_values() {
        let c = SignerConfig::default();
        assert_eq!(c.export_endpoint, DEFAULT_ENDPOINT);
        assert_eq!(c.request_timeout_secs, 60);
        assert_eq!(c.default_position, ScreenPoint::new(100.0, 100.0));
        assert_eq!(c.target_for(ExportKind::Save), CoordinateTarget::VerticalFlip);
        assert_eq!(c.target_for(ExportKind::Submit), CoordinateTarget::Passthrough);
        assert_eq!(c.download_filename, "signed-document.pdf");
    }

    #[test]
    fn builder_overrides_target_mapping() {
        let c = SignerConfig::builder()
            .target(ExportKind::Submit, CoordinateTarget::VerticalFlip)
            .build()
            .unwrap();
        assert_eq!(c.target_for(ExportKind::Submit), CoordinateTarget::VerticalFlip);
    }

    #[test]
    fn default_style_never_carries_text() {
        let style = SignatureStyle {
            text: "leftover".into(),
            font_family: FontFamily::Courier,
            ..SignatureStyle::default()
        };
        let c = SignerConfig::builder().default_style(style).build().unwrap();
        assert!(c.default_style.text.is_empty());
        assert_eq!(c.default_style.font_family, FontFamily::Courier);
    }

    #[test]
    fn rejects_non_http_endpoint() {
        let err = SignerConfig::builder()
            .export_endpoint("ftp://example.com")
            .build()
            .unwrap_err();
        assert!(matches!(err, SignError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_degenerate_width_policy() {
        let err = SignerConfig::builder()
            .width_policy(WidthPolicy {
                breakpoint: 768.0,
                wide: 0.0,
                narrow: 320.0,
            })
            .build()
            .unwrap_err();
        assert!(matches!(err, SignError::InvalidConfig(_)));
    }

    #[test]
    fn lookup_overlays_environment_values() {
        let c = SignerConfig::builder()
            .with_lookup(|key| match key {
                ENV_ENDPOINT => Some(" https://sign.example.com/api/sign ".into()),
                ENV_TIMEOUT_SECS => Some("15".into()),
                ENV_PDFIUM_LIB_PATH => Some("/opt/pdfium/lib".into()),
                _ => None,
            })
            .build()
            .unwrap();
        assert_eq!(c.export_endpoint, "https://sign.example.com/api/sign");
        assert_eq!(c.request_timeout_secs, 15);
        assert_eq!(c.pdfium_library_dir, Some(PathBuf::from("/opt/pdfium/lib")));
    }

    #[test]
    fn unparsable_timeout_is_ignored() {
        let c = SignerConfig::builder()
            .with_lookup(|key| (key == ENV_TIMEOUT_SECS).then(|| "soon".to_string()))
            .build()
            .unwrap();
        assert_eq!(c.request_timeout_secs, 60);
    }

    #[test]
    fn max_retries_is_clamped() {
        let config = SignerConfig::builder().max_retries(70).build().unwrap();
        assert_eq!(config.max_retries, MAX_RETRIES);
    }

    #[test]
    fn debug_hides_credential_value() {
        let c = SignerConfig::builder()
            .credential(Credential::cookie("sid=abc"))
            .build()
            .unwrap();
        assert!(!format!("{:?}", c).contains("sid=abc"));
    }
}
