//! The signing session: one document, one signature, one lifecycle.
//!
//! [`SigningSession`] ties the style model, the placement controller and the
//! render surface together and decides which export the user may run.
//!
//! ## Lifecycle
//!
//! ```text
//!  Empty ──load──▶ Loaded ──set_text──▶ Unplaced ──release──▶ Placed ──save──▶ Saved
//!                    ▲                     ▲                     │                │
//!                    │                     └──── any edit ───────┴────────────────┘
//!                    └──────────────────────── reset ────────────────────────────┘
//! ```
//!
//! The state is never stored. [`lifecycle_state`] derives it from four facts
//! on every read: is a document loaded, is the text non-empty, was the drag
//! released since the last edit, and did a save succeed since then.
//!
//! Every edit to the document, the style, the page index or the overlay
//! position withdraws the commit and the Saved mark. `submit` changes
//! nothing.
//!
//! ## Exports
//!
//! Exports are split in three so the host stays responsive while a request
//! is on the wire:
//!
//! 1. [`SigningSession::begin_save`] / [`SigningSession::begin_submit`]
//!    check the guards and snapshot everything into an [`ExportTicket`];
//! 2. [`ExportTicket::dispatch`] performs the round trip;
//! 3. [`SigningSession::complete_save`] / [`SigningSession::complete_submit`]
//!    apply the answer, unless a different document was loaded meanwhile.
//!
//! [`SigningSession::save`] and [`SigningSession::submit`] run all three.

use crate::backend::{default_backend, DocumentBackend};
use crate::config::SignerConfig;
use crate::error::{ExportError, SignError, ValidationError};
use crate::export::{
    ExportCollaborator, ExportKind, ExportRequest, ExportResponse, ExportTicket, HttpExportClient,
    PDF_CONTENT_TYPE,
};
use crate::observer::{NoopObserver, SharedObserver};
use crate::output::{Download, Outcome, SaveOutcome, SessionSnapshot};
use crate::placement::{Extent, Placement, PlacementController};
use crate::stream::{render_stream, PageImageStream};
use crate::style::{FontFamily, SignatureStyle};
use crate::surface::{OverlayView, PageIter, RenderSurface};
use crate::transform::ScreenPoint;
use bytes::Bytes;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where a session stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleState {
    /// No document loaded.
    Empty,
    /// Document loaded, no signature text.
    Loaded,
    /// Signature text present but not dropped onto the page since the last edit.
    Unplaced,
    /// Signature dropped; `save` and `submit` are allowed.
    Placed,
    /// The current placement has been saved into the document.
    Saved,
}

impl LifecycleState {
    /// Whether `save` / `submit` may be started from this state.
    pub fn can_export(self) -> bool {
        matches!(self, LifecycleState::Placed | LifecycleState::Saved)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleState::Empty => "empty",
            LifecycleState::Loaded => "loaded",
            LifecycleState::Unplaced => "unplaced",
            LifecycleState::Placed => "placed",
            LifecycleState::Saved => "saved",
        };
        f.write_str(s)
    }
}

/// Derive the lifecycle state from its inputs.
pub fn lifecycle_state(
    has_document: bool,
    has_text: bool,
    committed: bool,
    saved: bool,
) -> LifecycleState {
    match (has_document, has_text, committed, saved) {
        (false, ..) => LifecycleState::Empty,
        (true, false, ..) => LifecycleState::Loaded,
        (true, true, false, _) => LifecycleState::Unplaced,
        (true, true, true, false) => LifecycleState::Placed,
        (true, true, true, true) => LifecycleState::Saved,
    }
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
    kind: ExportKind,
    generation: u64,
}

/// An interactive signing session over one document at a time.
pub struct SigningSession {
    config: SignerConfig,
    backend: Arc<dyn DocumentBackend>,
    observer: SharedObserver,
    surface: RenderSurface,
    style: SignatureStyle,
    placement: PlacementController,
    saved: bool,
    edit_epoch: u64,
    next_ticket: u64,
    in_flight: HashMap<u64, InFlight>,
}

impl fmt::Debug for SigningSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningSession")
            .field("state", &self.state())
            .field("page_count", &self.surface.page_count())
            .field("style", &self.style)
            .field("placement", self.placement.placement())
            .field("in_flight", &self.in_flight.len())
            .finish()
    }
}

impl SigningSession {
    /// Session using the default document backend for `config`.
    pub fn new(config: SignerConfig) -> Self {
        let backend = default_backend(&config);
        Self::with_backend(config, backend)
    }

    pub fn with_backend(config: SignerConfig, backend: Arc<dyn DocumentBackend>) -> Self {
        let observer = config
            .observer
            .clone()
            .unwrap_or_else(|| Arc::new(NoopObserver) as SharedObserver);
        let surface = RenderSurface::new(config.width_policy);
        let placement = PlacementController::new(config.default_position, config.placement_page);
        let style = config.default_style.clone();

        Self {
            config,
            backend,
            observer,
            surface,
            style,
            placement,
            saved: false,
            edit_epoch: 0,
            next_ticket: 1,
            in_flight: HashMap::new(),
        }
    }

    // ── Reads ──────────────────────────────────────────────────────────────

    pub fn state(&self) -> LifecycleState {
        lifecycle_state(
            self.surface.has_document(),
            self.style.has_text(),
            self.placement.is_committed(),
            self.saved,
        )
    }

    pub fn config(&self) -> &SignerConfig {
        &self.config
    }

    pub fn style(&self) -> &SignatureStyle {
        &self.style
    }

    pub fn placement(&self) -> &Placement {
        self.placement.placement()
    }

    pub fn surface(&self) -> &RenderSurface {
        &self.surface
    }

    pub fn page_count(&self) -> usize {
        self.surface.page_count()
    }

    /// Bytes of the current document (the signed draft after a save).
    pub fn document_bytes(&self) -> Option<Bytes> {
        self.surface.document().map(|d| d.bytes().clone())
    }

    /// Live overlay position while a drag is in progress.
    pub fn drag_preview(&self) -> Option<ScreenPoint> {
        self.placement.drag_preview()
    }

    /// The overlay to draw, if any.
    ///
    /// Present only when the text is non-empty and the last drag was
    /// released after the last edit.
    pub fn overlay(&self) -> Option<OverlayView> {
        if !self.style.has_text() || !self.placement.is_committed() {
            return None;
        }
        Some(OverlayView {
            page_index: self.placement.page_index(),
            text: self.style.text.clone(),
            font_family: self.style.font_family,
            font_size_pt: self.style.font_size_pt,
            color: self.style.color.clone(),
            position: self.placement.position(),
            draggable: !self.saved,
        })
    }

    /// All pages at the current display width, overlay attached.
    pub fn pages(&self) -> PageIter<'_> {
        self.surface.pages(self.overlay())
    }

    /// Rasterise one page at the current display width, overlay excluded.
    pub fn render_page(&self, page_index: usize) -> Result<DynamicImage, SignError> {
        let view = self
            .surface
            .page_view(page_index, self.surface.display_width(), None)
            .ok_or(ValidationError::PageOutOfRange {
                page: page_index,
                total: self.surface.page_count(),
            })?;
        view.rasterize(self.backend.as_ref())
    }

    /// Rasterise every page through the session's backend.
    pub fn render_pages(&self, concurrency: usize) -> PageImageStream {
        render_stream(Arc::clone(&self.backend), self.pages(), concurrency)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let in_flight = |kind: ExportKind| {
            let generation = self.surface.generation();
            self.in_flight
                .values()
                .any(|f| f.kind == kind && Some(f.generation) == generation)
        };
        SessionSnapshot {
            state: self.state(),
            page_count: self.surface.page_count(),
            generation: self.surface.generation(),
            revision: self.surface.document().map(|d| d.revision()),
            display_width: self.surface.display_width(),
            style: self.style.clone(),
            placement: *self.placement.placement(),
            overlay: self.overlay(),
            save_in_flight: in_flight(ExportKind::Save),
            submit_in_flight: in_flight(ExportKind::Submit),
        }
    }

    // ── Document ───────────────────────────────────────────────────────────

    /// Load a new document. Returns its page count.
    ///
    /// On failure the previous document, style and placement are untouched.
    pub fn load(&mut self, bytes: impl Into<Bytes>) -> Result<usize, SignError> {
        self.load_named(None, bytes)
    }

    /// Like [`load`](Self::load), recording the uploaded file name.
    pub fn load_file(
        &mut self,
        file_name: &str,
        bytes: impl Into<Bytes>,
    ) -> Result<usize, SignError> {
        self.load_named(Some(file_name), bytes)
    }

    fn load_named(
        &mut self,
        file_name: Option<&str>,
        bytes: impl Into<Bytes>,
    ) -> Result<usize, SignError> {
        let before = self.state();
        let page_count = self
            .surface
            .load(self.backend.as_ref(), file_name, bytes.into())?;

        let page = if self.config.placement_page < page_count {
            self.config.placement_page
        } else {
            0
        };
        self.placement.cancel_drag();
        self.placement.set_page_index(page);
        self.sync_bounds();
        self.invalidate();

        if let Some(generation) = self.surface.generation() {
            self.observer.on_document_loaded(page_count, generation);
        }
        self.settle(before);
        Ok(page_count)
    }

    // ── Style ──────────────────────────────────────────────────────────────

    pub fn set_text(&mut self, text: impl Into<String>) {
        let before = self.state();
        self.style.set_text(text);
        self.invalidate();
        self.settle(before);
    }

    pub fn set_font(&mut self, family: FontFamily) {
        let before = self.state();
        self.style.set_font(family);
        self.invalidate();
        self.settle(before);
    }

    /// Set the font from its name (`Helvetica`, `Courier`, `Times-Roman`).
    pub fn set_font_name(&mut self, name: &str) -> Result<(), SignError> {
        let family: FontFamily = name.parse()?;
        self.set_font(family);
        Ok(())
    }

    /// Set the font size, clamped to 10–100. Returns the stored size.
    pub fn set_font_size(&mut self, size: u32) -> u32 {
        let before = self.state();
        let stored = self.style.set_size(size);
        self.invalidate();
        self.settle(before);
        stored
    }

    /// Set the color from `#rgb` / `#rrggbb`. Invalid input changes nothing.
    pub fn set_color(&mut self, hex: &str) -> Result<(), SignError> {
        let before = self.state();
        self.style.set_color(hex)?;
        self.invalidate();
        self.settle(before);
        Ok(())
    }

    // ── Placement ──────────────────────────────────────────────────────────

    /// Move the signature to another page of the current document.
    pub fn set_page_index(&mut self, page_index: usize) -> Result<(), SignError> {
        let total = self.surface.page_count();
        if !self.surface.has_document() {
            return Err(ValidationError::MissingDocument.into());
        }
        if page_index >= total {
            return Err(ValidationError::PageOutOfRange {
                page: page_index,
                total,
            }
            .into());
        }
        let before = self.state();
        self.placement.set_page_index(page_index);
        self.sync_bounds();
        self.invalidate();
        self.settle(before);
        Ok(())
    }

    /// Rendered size of the overlay, so it stays fully inside the page.
    pub fn set_overlay_extent(&mut self, width: f64, height: f64) {
        self.placement.set_overlay_extent(Extent::new(width, height));
    }

    /// Lay pages out for a viewport. Returns the chosen page width.
    pub fn set_viewport_width(&mut self, viewport_width: f64) -> f64 {
        let width = self.surface.apply_viewport(viewport_width);
        self.sync_bounds();
        width
    }

    /// Lay pages out at an explicit width.
    pub fn set_display_width(&mut self, width: f64) {
        self.surface.set_display_width(width);
        self.sync_bounds();
    }

    /// One intermediate drag frame. Withdraws any earlier commit.
    pub fn on_drag_move(&mut self, dx: f64, dy: f64) -> Result<(), SignError> {
        self.check_draggable()?;
        let before = self.state();
        self.placement.on_drag_move(dx, dy);
        self.invalidate();
        self.settle(before);
        Ok(())
    }

    /// End of a drag at `(x, y)`. Commits the clamped position.
    pub fn on_drag_release(&mut self, x: f64, y: f64) -> Result<ScreenPoint, SignError> {
        self.check_draggable()?;
        let before = self.state();
        self.saved = false;
        self.edit_epoch += 1;
        let position = self.placement.on_drag_release(x, y);
        self.settle(before);
        Ok(position)
    }

    /// Clear the signature and put the overlay back at its default spot.
    /// The document, including a saved draft, is kept.
    pub fn reset(&mut self) {
        let before = self.state();
        self.style = self.config.default_style.clone();
        self.placement.reset();
        self.invalidate();
        self.settle(before);
    }

    // ── Exports ────────────────────────────────────────────────────────────

    /// HTTP collaborator built from this session's configuration.
    pub fn exporter(&self) -> Result<HttpExportClient, SignError> {
        HttpExportClient::from_config(&self.config)
    }

    pub fn begin_save(&mut self) -> Result<ExportTicket, SignError> {
        self.begin(ExportKind::Save)
    }

    pub fn begin_submit(&mut self) -> Result<ExportTicket, SignError> {
        self.begin(ExportKind::Submit)
    }

    fn begin(&mut self, kind: ExportKind) -> Result<ExportTicket, SignError> {
        let document = self
            .surface
            .document()
            .ok_or(ValidationError::MissingDocument)?;
        if !self.style.has_text() {
            return Err(ValidationError::EmptySignature.into());
        }
        if !self.placement.is_committed() {
            return Err(ValidationError::NotPlaced.into());
        }

        let generation = document.generation();
        if self
            .in_flight
            .values()
            .any(|f| f.kind == kind && f.generation == generation)
        {
            return Err(ValidationError::OperationInFlight {
                kind: kind.to_string(),
            }
            .into());
        }

        let page_index = self.placement.page_index();
        let page = self
            .surface
            .page_display_size(page_index)
            .ok_or(ValidationError::PageOutOfRange {
                page: page_index,
                total: document.page_count(),
            })?;
        let target = self.config.target_for(kind);
        let point = target.to_target(self.placement.position(), page.height);
        debug!(
            "{} placement ({}, {}) → ({}, {}) via {:?}, page height {}",
            kind,
            self.placement.position().x,
            self.placement.position().y,
            point.x,
            point.y,
            target,
            page.height
        );

        let request = ExportRequest {
            kind,
            document: document.bytes().clone(),
            signature_text: self.style.text.clone(),
            point,
            page_index,
            color: self.style.color.clone(),
            font_family: self.style.font_family,
            font_size_pt: self.style.font_size_pt,
            file_id: self.config.file_id.clone(),
            credential: match kind {
                ExportKind::Save => self.config.credential.clone(),
                ExportKind::Submit => None,
            },
        };

        let id = self.next_ticket;
        self.next_ticket += 1;
        self.in_flight.insert(id, InFlight { kind, generation });

        info!("Issued {} request #{} for document generation {}", kind, id, generation);
        self.observer.on_export_start(kind, id);

        Ok(ExportTicket {
            id,
            generation,
            epoch: self.edit_epoch,
            request,
        })
    }

    /// Apply the answer to a save.
    ///
    /// On success the returned bytes become the current document. The
    /// session is marked Saved only if nothing was edited while the request
    /// was in flight. A failure leaves document and placement as they were.
    pub fn complete_save(
        &mut self,
        ticket: ExportTicket,
        result: Result<ExportResponse, ExportError>,
    ) -> Result<Outcome<SaveOutcome>, SignError> {
        self.finish(&ticket, ExportKind::Save)?;
        if !self.is_current(&ticket) {
            return Ok(Outcome::Discarded);
        }
        let response = self.check_response(ExportKind::Save, result)?;

        let before = self.state();
        let content_type = response.content_type.clone();
        let page_count = match self.surface.replace_saved(
            self.backend.as_ref(),
            &self.config.saved_filename,
            response.bytes,
        ) {
            Ok(n) => n,
            Err(SignError::UnsupportedFormat { detail }) => {
                warn!("save response is not a usable PDF: {}", detail);
                let err = ExportError::UnexpectedContent { content_type };
                self.observer.on_export_error(ExportKind::Save, &err.to_string());
                return Err(err.into());
            }
            Err(e) => return Err(e),
        };

        if self.placement.page_index() >= page_count {
            self.placement.set_page_index(0);
        }
        self.sync_bounds();

        let marked_saved = ticket.epoch == self.edit_epoch && self.placement.is_committed();
        self.saved = marked_saved;

        let revision = self.surface.document().map_or(0, |d| d.revision());
        let bytes = self.surface.document().map_or(0, |d| d.bytes().len());
        info!(
            "Save #{} applied: revision {}, {} pages, saved={}",
            ticket.id, revision, page_count, marked_saved
        );
        self.observer.on_export_complete(ExportKind::Save, bytes);
        self.settle(before);

        Ok(Outcome::Applied(SaveOutcome {
            page_count,
            revision,
            marked_saved,
        }))
    }

    /// Turn the answer to a submit into a download. Session state is not
    /// touched.
    pub fn complete_submit(
        &mut self,
        ticket: ExportTicket,
        result: Result<ExportResponse, ExportError>,
    ) -> Result<Outcome<Download>, SignError> {
        self.finish(&ticket, ExportKind::Submit)?;
        if !self.is_current(&ticket) {
            return Ok(Outcome::Discarded);
        }
        let response = self.check_response(ExportKind::Submit, result)?;

        info!("Submit #{} produced {} bytes", ticket.id, response.bytes.len());
        self.observer
            .on_export_complete(ExportKind::Submit, response.bytes.len());

        Ok(Outcome::Applied(Download {
            filename: self.config.download_filename.clone(),
            content_type: PDF_CONTENT_TYPE.to_string(),
            bytes: response.bytes,
        }))
    }

    /// Forget a ticket whose round trip will never complete.
    /// Returns `false` if the ticket was already completed.
    pub fn abandon(&mut self, ticket: ExportTicket) -> bool {
        let known = self.in_flight.remove(&ticket.id).is_some();
        if known {
            debug!("{} request #{} abandoned", ticket.kind(), ticket.id);
        }
        known
    }

    /// Save through `collaborator`: begin, dispatch, complete.
    pub async fn save(
        &mut self,
        collaborator: &dyn ExportCollaborator,
    ) -> Result<Outcome<SaveOutcome>, SignError> {
        let ticket = self.begin_save()?;
        let result = ticket.dispatch(collaborator).await;
        self.complete_save(ticket, result)
    }

    /// Submit through `collaborator`: begin, dispatch, complete.
    pub async fn submit(
        &mut self,
        collaborator: &dyn ExportCollaborator,
    ) -> Result<Outcome<Download>, SignError> {
        let ticket = self.begin_submit()?;
        let result = ticket.dispatch(collaborator).await;
        self.complete_submit(ticket, result)
    }

    // ── Internals ──────────────────────────────────────────────────────────

    fn check_draggable(&self) -> Result<(), SignError> {
        if !self.surface.has_document() {
            return Err(ValidationError::MissingDocument.into());
        }
        if !self.style.has_text() {
            return Err(ValidationError::EmptySignature.into());
        }
        Ok(())
    }

    /// Withdraw the commit and the Saved mark.
    fn invalidate(&mut self) {
        self.placement.invalidate();
        self.saved = false;
        self.edit_epoch += 1;
    }

    fn sync_bounds(&mut self) {
        let bounds = self.surface.page_display_size(self.placement.page_index());
        self.placement.set_bounds(bounds);
    }

    fn settle(&self, before: LifecycleState) {
        let after = self.state();
        if after != before {
            debug!("Lifecycle {} → {}", before, after);
            self.observer.on_state_changed(before, after);
        }
    }

    fn finish(&mut self, ticket: &ExportTicket, kind: ExportKind) -> Result<(), SignError> {
        match self.in_flight.get(&ticket.id) {
            Some(f) if f.kind == kind => {
                self.in_flight.remove(&ticket.id);
                Ok(())
            }
            _ => Err(ValidationError::UnknownTicket { id: ticket.id }.into()),
        }
    }

    fn is_current(&self, ticket: &ExportTicket) -> bool {
        if self.surface.generation() == Some(ticket.generation) {
            return true;
        }
        warn!(
            "{} request #{} was issued for document generation {}; a newer document is loaded, discarding result",
            ticket.kind(),
            ticket.id,
            ticket.generation
        );
        self.observer
            .on_export_error(ticket.kind(), "superseded by a newer document");
        false
    }

    fn check_response(
        &self,
        kind: ExportKind,
        result: Result<ExportResponse, ExportError>,
    ) -> Result<ExportResponse, SignError> {
        result.map_err(|e| {
            warn!("{} failed: {}", kind, e);
            self.observer.on_export_error(kind, &e.to_string());
            SignError::Export(e)
        })
    }
}
