//! Bill persistence.
//!
//! The pipeline only ever calls [`BillStore::insert`], once per accepted
//! upload. The remaining operations are plain pass-through CRUD for whatever
//! sits on top (the CLI here, a REST layer elsewhere).
//!
//! Two implementations ship with the crate:
//!
//! * [`MemoryBillStore`] — insertion-ordered map, for tests and embedding.
//! * [`FileBillStore`] — one JSON document per bill in a directory.

mod file;
mod memory;

pub use file::FileBillStore;
pub use memory::MemoryBillStore;

use crate::bill::Bill;
use crate::error::BillScanError;
use async_trait::async_trait;

/// Document-store operations over the bill collection.
#[async_trait]
pub trait BillStore: Send + Sync {
    /// Insert a new bill. Fails with `Storage` if the id already exists.
    async fn insert(&self, bill: &Bill) -> Result<(), BillScanError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Bill>, BillScanError>;

    async fn find_all(&self) -> Result<Vec<Bill>, BillScanError>;

    /// Replace the bill stored under `id`, returning whether one existed.
    ///
    /// The stored record keeps `id` even if `bill.id` differs.
    async fn replace(&self, id: &str, bill: &Bill) -> Result<bool, BillScanError>;

    /// Delete the bill stored under `id`, returning whether one existed.
    async fn delete(&self, id: &str) -> Result<bool, BillScanError>;
}

/// `bill` re-keyed under `id`.
pub(crate) fn with_id(id: &str, bill: &Bill) -> Bill {
    Bill {
        id: id.to_string(),
        ..bill.clone()
    }
}
