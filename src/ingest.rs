//! Upload entry points: one receipt image in, one persisted bill out.
//!
//! [`BillIngestor::upload_image`] runs the whole pipeline for a single
//! upload and either returns the stored [`Bill`] or the error that stopped
//! it. Stages fail fast and nothing is retried. The store is touched exactly
//! once, after field validation, so a rejected upload never leaves a partial
//! record behind.
//!
//! Uploads share no mutable state. Two uploads of the same receipt simply
//! produce two bills. Use [`crate::stream::ingest_stream`] to run many at
//! once.

use crate::bill::Bill;
use crate::config::ExtractorConfig;
use crate::error::BillScanError;
use crate::pipeline::intake::MAX_IMAGE_BYTES;
use crate::pipeline::vision::{GeminiClient, VisionClient};
use crate::pipeline::{deserialize, encode, intake, normalize};
use crate::progress::{IngestStage, ProgressCallback};
use crate::store::BillStore;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Drives uploads through intake → vision → normalise → validate → store.
///
/// Cheap to clone; clones share the same client, store and callback.
#[derive(Clone)]
pub struct BillIngestor {
    vision: Arc<dyn VisionClient>,
    store: Arc<dyn BillStore>,
    store_timeout_secs: u64,
    concurrency: usize,
    progress: Option<ProgressCallback>,
}

impl BillIngestor {
    /// Build an ingestor that talks to Gemini as configured.
    pub fn new(config: &ExtractorConfig, store: Arc<dyn BillStore>) -> Result<Self, BillScanError> {
        let vision: Arc<dyn VisionClient> = Arc::new(GeminiClient::new(config)?);
        Ok(Self::with_client(vision, store, config))
    }

    /// Build an ingestor around an existing vision client.
    pub fn with_client(
        vision: Arc<dyn VisionClient>,
        store: Arc<dyn BillStore>,
        config: &ExtractorConfig,
    ) -> Self {
        Self {
            vision,
            store,
            store_timeout_secs: config.store_timeout_secs,
            concurrency: config.concurrency,
            progress: None,
        }
    }

    /// Report stage transitions to `callback`.
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn store(&self) -> &Arc<dyn BillStore> {
        &self.store
    }

    /// Uploads run at once by batch ingestion.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Extract, validate and persist the bill in one uploaded image.
    ///
    /// # Arguments
    /// * `bytes` — the uploaded file content
    /// * `filename` — the client-declared file name (its extension picks the MIME type)
    /// * `declared_len` — the client-declared length in bytes
    ///
    /// # Errors
    /// `Validation` for an unusable file or an incomplete bill, `Upstream`
    /// when the vision API fails, `ExtractionEmpty` when the model returns no
    /// text, `Deserialization` for malformed model JSON, `Storage` when the
    /// insert fails.
    ///
    /// Dropping the returned future aborts an in-flight vision call. Nothing
    /// has been written at that point, so there is nothing to undo.
    pub async fn upload_image(
        &self,
        bytes: &[u8],
        filename: &str,
        declared_len: u64,
    ) -> Result<Bill, BillScanError> {
        let start = Instant::now();
        info!("Starting extraction: {}", filename);

        match self.run_pipeline(bytes, filename, declared_len).await {
            Ok(bill) => {
                info!(
                    "Persisted bill {} from '{}' ({}ms)",
                    bill.id,
                    filename,
                    start.elapsed().as_millis()
                );
                if let Some(ref cb) = self.progress {
                    cb.on_persisted(filename, &bill);
                }
                Ok(bill)
            }
            Err(e) => {
                let stage = IngestStage::failed_with(&e);
                warn!("Upload '{}' {}: {}", filename, stage, e);
                if let Some(ref cb) = self.progress {
                    cb.on_rejected(filename, stage, &e);
                }
                Err(e)
            }
        }
    }

    /// Read an image from disk and ingest it.
    ///
    /// The file's size stands in for the declared length. Files over the
    /// size limit are refused without being read. The full path is the
    /// upload label, so same-named files in different directories stay
    /// apart in logs and progress events.
    pub async fn ingest_file(&self, path: impl AsRef<Path>) -> Result<Bill, BillScanError> {
        let path = path.as_ref();
        let label = path.display().to_string();

        let cannot_read =
            |e: std::io::Error| BillScanError::validation(format!("Cannot read '{}': {e}", path.display()));
        let declared_len = tokio::fs::metadata(path).await.map_err(cannot_read)?.len();
        let bytes = if declared_len <= MAX_IMAGE_BYTES {
            tokio::fs::read(path).await.map_err(cannot_read)?
        } else {
            Vec::new()
        };

        self.upload_image(&bytes, &label, declared_len).await
    }

    async fn run_pipeline(
        &self,
        bytes: &[u8],
        filename: &str,
        declared_len: u64,
    ) -> Result<Bill, BillScanError> {
        // ── Step 1: Intake ───────────────────────────────────────────────
        self.enter(filename, IngestStage::Received);
        let upload = intake::validate_upload(bytes, filename, declared_len)?;
        self.enter(filename, IngestStage::Validated);

        // ── Step 2: Vision call ──────────────────────────────────────────
        let image = encode::encode_image(&upload);
        self.enter(filename, IngestStage::Extracting);
        let envelope = self.vision.generate(&image).await?;

        // ── Step 3: Normalise ────────────────────────────────────────────
        self.enter(filename, IngestStage::Normalizing);
        let json = normalize::normalize_response(&envelope)?;

        // ── Step 4: Deserialise + validate ───────────────────────────────
        self.enter(filename, IngestStage::Deserializing);
        let draft = deserialize::parse_bill_draft(&json)?;
        let bill = deserialize::validate_draft(draft)?;
        self.enter(filename, IngestStage::FieldValidated);

        // ── Step 5: Persist ──────────────────────────────────────────────
        self.persist(&bill).await?;
        Ok(bill)
    }

    async fn persist(&self, bill: &Bill) -> Result<(), BillScanError> {
        let secs = self.store_timeout_secs;
        match tokio::time::timeout(Duration::from_secs(secs), self.store.insert(bill)).await {
            Ok(result) => result,
            Err(_) => Err(BillScanError::StorageTimeout { secs }),
        }
    }

    fn enter(&self, filename: &str, stage: IngestStage) {
        if let Some(ref cb) = self.progress {
            cb.on_stage(filename, stage);
        }
    }
}
