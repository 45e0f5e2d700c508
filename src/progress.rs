//! Per-upload stage events.
//!
//! Every upload walks the same state machine:
//!
//! ```text
//! Received → Validated → Extracting → Normalizing → Deserializing → FieldValidated → Persisted
//!     └──────────┴───────────┴─────────────┴──────────────┴────────────────┴──→ Rejected
//!                            └──→ UpstreamFailed
//! ```
//!
//! Inject an [`Arc<dyn IngestProgressCallback>`] via
//! [`crate::ingest::BillIngestor::with_progress`] to observe it: the CLI
//! drives a progress bar with it, a server could forward events to a
//! websocket. Uploads run concurrently, so implementations must be
//! `Send + Sync` and synchronise their own state.
//!
//! # Example
//!
//! ```rust
//! use billscan::{Bill, IngestProgressCallback};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct Counter(AtomicUsize);
//!
//! impl IngestProgressCallback for Counter {
//!     fn on_persisted(&self, _upload: &str, _bill: &Bill) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!     }
//! }
//! ```

use crate::bill::Bill;
use crate::error::{BillScanError, ErrorKind};
use std::fmt;
use std::sync::Arc;

/// Position of an upload in the extraction pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IngestStage {
    Received,
    Validated,
    Extracting,
    Normalizing,
    Deserializing,
    FieldValidated,
    Persisted,
    /// Terminal: refused at some stage.
    Rejected,
    /// Terminal: the vision API failed or timed out.
    UpstreamFailed,
}

impl IngestStage {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            IngestStage::Persisted | IngestStage::Rejected | IngestStage::UpstreamFailed
        )
    }

    /// Terminal stage an upload ends in when it fails with `error`.
    pub fn failed_with(error: &BillScanError) -> Self {
        match error.kind() {
            ErrorKind::Upstream => IngestStage::UpstreamFailed,
            _ => IngestStage::Rejected,
        }
    }
}

impl fmt::Display for IngestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IngestStage::Received => "received",
            IngestStage::Validated => "validated",
            IngestStage::Extracting => "extracting",
            IngestStage::Normalizing => "normalizing",
            IngestStage::Deserializing => "deserializing",
            IngestStage::FieldValidated => "field-validated",
            IngestStage::Persisted => "persisted",
            IngestStage::Rejected => "rejected",
            IngestStage::UpstreamFailed => "upstream-failed",
        };
        f.write_str(name)
    }
}

/// Called by the pipeline as an upload moves between stages.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. `upload` is the uploaded file's name.
pub trait IngestProgressCallback: Send + Sync {
    /// Called on entering each non-terminal stage.
    fn on_stage(&self, upload: &str, stage: IngestStage) {
        let _ = (upload, stage);
    }

    /// Called once the bill has been inserted into the store.
    fn on_persisted(&self, upload: &str, bill: &Bill) {
        let _ = (upload, bill);
    }

    /// Called once when the upload ends in `Rejected` or `UpstreamFailed`.
    ///
    /// `stage` is the terminal stage, `error` the failure that caused it.
    fn on_rejected(&self, upload: &str, stage: IngestStage, error: &BillScanError) {
        let _ = (upload, stage, error);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl IngestProgressCallback for NoopProgressCallback {}

/// Convenience alias for the shared callback handle.
pub type ProgressCallback = Arc<dyn IngestProgressCallback>;

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records every event as a string, for asserting stage sequences.
    #[derive(Default)]
    pub(crate) struct RecordingCallback {
        pub events: Mutex<Vec<String>>,
        pub labels: Mutex<Vec<String>>,
    }

    impl RecordingCallback {
        pub fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }

        /// Upload labels seen by `on_stage`, in arrival order.
        pub fn labels(&self) -> Vec<String> {
            self.labels.lock().unwrap().clone()
        }
    }

    impl IngestProgressCallback for RecordingCallback {
        fn on_stage(&self, upload: &str, stage: IngestStage) {
            self.labels.lock().unwrap().push(upload.to_string());
            self.events.lock().unwrap().push(stage.to_string());
        }

        fn on_persisted(&self, _upload: &str, _bill: &Bill) {
            self.events.lock().unwrap().push(IngestStage::Persisted.to_string());
        }

        fn on_rejected(&self, _upload: &str, stage: IngestStage, _error: &BillScanError) {
            self.events.lock().unwrap().push(stage.to_string());
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_stage("r.png", IngestStage::Received);
        cb.on_rejected(
            "r.png",
            IngestStage::Rejected,
            &BillScanError::validation("nope"),
        );
    }

    #[test]
    fn terminal_stage_follows_error_kind() {
        let upstream = BillScanError::Upstream {
            status: Some(503),
            body: String::new(),
        };
        assert_eq!(IngestStage::failed_with(&upstream), IngestStage::UpstreamFailed);
        assert_eq!(
            IngestStage::failed_with(&BillScanError::UpstreamTimeout { secs: 1 }),
            IngestStage::UpstreamFailed
        );
        assert_eq!(
            IngestStage::failed_with(&BillScanError::ExtractionEmpty { reason: None }),
            IngestStage::Rejected
        );
        assert_eq!(
            IngestStage::failed_with(&BillScanError::storage("disk full")),
            IngestStage::Rejected
        );
    }

    #[test]
    fn only_end_states_are_terminal() {
        assert!(IngestStage::Persisted.is_terminal());
        assert!(IngestStage::Rejected.is_terminal());
        assert!(IngestStage::UpstreamFailed.is_terminal());
        assert!(!IngestStage::Extracting.is_terminal());
    }
}
