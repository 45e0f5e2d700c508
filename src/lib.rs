//! # billscan
//!
//! Turn photos of receipts into structured, persisted bill records using a
//! vision model.
//!
//! ## Why this crate?
//!
//! Receipts are a poor fit for classic OCR: vendor names sit in logos, totals
//! hide among tax lines, and every shop lays things out differently. Instead
//! this crate sends the photo to Gemini with a fixed extraction prompt, then
//! treats whatever comes back as untrusted input: it unwraps the response
//! envelope, strips markdown fences, parses the JSON and refuses bills with
//! no vendor or a non-positive total before anything reaches the store.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload (bytes + filename + declared length)
//!  │
//!  ├─ 1. Intake       extension, size and content checks
//!  ├─ 2. Encode       base64 + generateContent request body
//!  ├─ 3. Vision       one POST to Gemini, bounded by a timeout
//!  ├─ 4. Normalise    envelope → model text → JSON without fences
//!  ├─ 5. Deserialise  JSON → Bill, business-rule validation
//!  └─ 6. Persist      single insert into the bill store
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use billscan::{BillIngestor, ExtractorConfig, FileBillStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // GEMINI_API_KEY and GEMINI_API_ENDPOINT must be set
//!     let config = ExtractorConfig::from_env()?;
//!     let ingestor = BillIngestor::new(&config, Arc::new(FileBillStore::new("bills")))?;
//!
//!     let bytes = std::fs::read("lunch.jpg")?;
//!     let bill = ingestor.upload_image(&bytes, "lunch.jpg", bytes.len() as u64).await?;
//!     println!("{} paid {} at {}", bill.id, bill.total_amount, bill.vendor);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `billscan` binary (clap + indicatif + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! billscan = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod bill;
pub mod config;
pub mod error;
pub mod ingest;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod store;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use bill::{Bill, LineItem};
pub use config::{ExtractorConfig, ExtractorConfigBuilder};
pub use error::{BillScanError, ErrorKind, ErrorResponse};
pub use ingest::BillIngestor;
pub use pipeline::vision::{GeminiClient, VisionClient};
pub use progress::{IngestProgressCallback, IngestStage, NoopProgressCallback, ProgressCallback};
pub use store::{BillStore, FileBillStore, MemoryBillStore};
pub use stream::{ingest_many, ingest_stream, FileOutcome, IngestStream};
