//! Observer trait for session lifecycle events.
//!
//! Inject an [`Arc<dyn SessionObserver>`] via
//! [`crate::config::SignerConfigBuilder::observer`] to hear about loads,
//! state transitions and export round trips as they happen.
//!
//! Callers can forward events to a UI event loop, a channel or a log sink
//! without the engine knowing how the host communicates.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdfsign::{LifecycleState, SessionObserver, SignerConfig};
//! use std::sync::{Arc, Mutex};
//!
//! #[derive(Default)]
//! struct Transitions(Mutex<Vec<(LifecycleState, LifecycleState)>>);
//!
//! impl SessionObserver for Transitions {
//!     fn on_state_changed(&self, old: LifecycleState, new: LifecycleState) {
//!         self.0.lock().unwrap().push((old, new));
//!     }
//! }
//!
//! let config = SignerConfig::builder()
//!     .observer(Arc::new(Transitions::default()) as Arc<dyn SessionObserver>)
//!     .build()
//!     .unwrap();
//! ```

use crate::export::ExportKind;
use crate::session::LifecycleState;
use std::sync::Arc;

/// Called by a [`crate::session::SigningSession`] as its state moves.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Export callbacks may fire from whichever task
/// completes the round trip, hence `Send + Sync`.
pub trait SessionObserver: Send + Sync {
    /// A document was parsed and is now current.
    ///
    /// # Arguments
    /// * `page_count` — pages in the new document
    /// * `generation` — load counter; export results from older generations
    ///   are discarded
    fn on_document_loaded(&self, page_count: usize, generation: u64) {
        let _ = (page_count, generation);
    }

    /// The derived lifecycle state differs after an operation.
    fn on_state_changed(&self, old: LifecycleState, new: LifecycleState) {
        let _ = (old, new);
    }

    /// An export ticket was issued.
    fn on_export_start(&self, kind: ExportKind, ticket_id: u64) {
        let _ = (kind, ticket_id);
    }

    /// An export result was applied.
    ///
    /// # Arguments
    /// * `bytes` — size of the signed document
    fn on_export_complete(&self, kind: ExportKind, bytes: usize) {
        let _ = (kind, bytes);
    }

    /// An export failed after all retries, or its result was discarded.
    fn on_export_error(&self, kind: ExportKind, error: &str) {
        let _ = (kind, error);
    }
}

/// The default when no observer is configured.
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

/// Type stored in [`crate::config::SignerConfig`].
pub type SharedObserver = Arc<dyn SessionObserver>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        loads: AtomicUsize,
        transitions: AtomicUsize,
        errors: AtomicUsize,
    }

    impl SessionObserver for Counting {
        fn on_document_loaded(&self, _page_count: usize, _generation: u64) {
            self.loads.fetch_add(1, Ordering::SeqCst);
        }

        fn on_state_changed(&self, _old: LifecycleState, _new: LifecycleState) {
            self.transitions.fetch_add(1, Ordering::SeqCst);
        }

        fn on_export_error(&self, _kind: ExportKind, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_observer_does_not_panic() {
        let o = NoopObserver;
        o.on_document_loaded(3, 1);
        o.on_state_changed(LifecycleState::Empty, LifecycleState::Loaded);
        o.on_export_start(ExportKind::Save, 1);
        o.on_export_complete(ExportKind::Save, 1024);
        o.on_export_error(ExportKind::Submit, "HTTP 502");
    }

    #[test]
    fn overridden_methods_receive_events() {
        let o = Counting::default();
        o.on_document_loaded(1, 1);
        o.on_state_changed(LifecycleState::Empty, LifecycleState::Loaded);
        o.on_state_changed(LifecycleState::Loaded, LifecycleState::Unplaced);
        o.on_export_error(ExportKind::Save, "timeout");
        o.on_export_complete(ExportKind::Save, 10);

        assert_eq!(o.loads.load(Ordering::SeqCst), 1);
        assert_eq!(o.transitions.load(Ordering::SeqCst), 2);
        assert_eq!(o.errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn shared_observer_works() {
        let o: SharedObserver = Arc::new(NoopObserver);
        o.on_export_start(ExportKind::Submit, 7);
    }
}
