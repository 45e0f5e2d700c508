//! Batch ingestion API: emit outcomes as uploads complete.
//!
//! Each file is an independent upload, so a batch is just many
//! [`BillIngestor::ingest_file`] calls in flight at once, bounded by the
//! configured concurrency. [`ingest_stream`] yields each outcome as soon as
//! its upload finishes, which lets the CLI print results while the rest of
//! the batch is still talking to the model. Outcomes arrive in completion
//! order, not input order.
//!
//! One failed file never affects another: every path gets its own
//! [`FileOutcome`] carrying either the stored bill or the error.

use crate::bill::Bill;
use crate::error::BillScanError;
use crate::ingest::BillIngestor;
use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use std::pin::Pin;
use tokio_stream::Stream;
use tracing::info;

/// Result of ingesting one file of a batch.
#[derive(Debug)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub result: Result<Bill, BillScanError>,
}

/// A boxed stream of per-file outcomes.
pub type IngestStream = Pin<Box<dyn Stream<Item = FileOutcome> + Send>>;

/// Ingest `paths`, streaming each outcome as it completes.
///
/// # Example
/// ```rust,no_run
/// use billscan::{ingest_stream, BillIngestor, ExtractorConfig, FileBillStore};
/// use futures::StreamExt;
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ExtractorConfig::from_env()?;
/// let ingestor = BillIngestor::new(&config, Arc::new(FileBillStore::new("bills")))?;
/// let mut outcomes = ingest_stream(&ingestor, vec!["lunch.jpg".into(), "taxi.png".into()]);
/// while let Some(outcome) = outcomes.next().await {
///     match outcome.result {
///         Ok(bill) => println!("{}: {} {}", outcome.path.display(), bill.vendor, bill.total_amount),
///         Err(e) => eprintln!("{}: {e}", outcome.path.display()),
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub fn ingest_stream(ingestor: &BillIngestor, paths: Vec<PathBuf>) -> IngestStream {
    info!(
        "Starting batch of {} file(s), concurrency {}",
        paths.len(),
        ingestor.concurrency()
    );

    let concurrency = ingestor.concurrency().max(1);
    let ingestor = ingestor.clone();
    let s = stream::iter(paths.into_iter().map(move |path| {
        let ingestor = ingestor.clone();
        async move {
            let result = ingestor.ingest_file(&path).await;
            FileOutcome { path, result }
        }
    }))
    .buffer_unordered(concurrency);

    Box::pin(s)
}

/// Ingest `paths` and collect every outcome, in completion order.
pub async fn ingest_many(ingestor: &BillIngestor, paths: Vec<PathBuf>) -> Vec<FileOutcome> {
    ingest_stream(ingestor, paths).collect().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::ingest::test_support::{config, CountingStore, FakeVision};
    use crate::pipeline::intake::fixtures::{JPEG, PNG};
    use crate::store::BillStore;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn batch_isolates_failures() {
        let dir = TempDir::new().unwrap();
        let good_png = dir.path().join("a.png");
        let good_jpg = dir.path().join("b.JPG");
        let bad = dir.path().join("c.gif");
        std::fs::write(&good_png, PNG).unwrap();
        std::fs::write(&good_jpg, JPEG).unwrap();
        std::fs::write(&bad, PNG).unwrap();

        let vision = FakeVision::answering(r#"{"vendor":"Deli","totalAmount":"4.20"}"#);
        let store = Arc::new(CountingStore::default());
        let ingestor = BillIngestor::with_client(vision.clone(), store.clone(), &config());

        let mut outcomes = ingest_many(&ingestor, vec![good_png, good_jpg, bad.clone()]).await;
        outcomes.sort_by(|a, b| a.path.cmp(&b.path));

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].result.is_ok());
        assert!(outcomes[1].result.is_ok());
        assert_eq!(outcomes[2].path, bad);
        let err = outcomes[2].result.as_ref().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        assert_eq!(vision.call_count(), 2);
        assert_eq!(store.find_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn empty_batch_yields_nothing() {
        let ingestor = BillIngestor::with_client(
            FakeVision::answering("{}"),
            Arc::new(CountingStore::default()),
            &config(),
        );
        assert!(ingest_many(&ingestor, Vec::new()).await.is_empty());
    }
}
