use super::{with_id, BillStore};
use crate::bill::Bill;
use crate::error::BillScanError;
use async_trait::async_trait;
use indexmap::IndexMap;
use tokio::sync::RwLock;

/// In-memory bill store; `find_all` returns bills in insertion order.
#[derive(Debug, Default)]
pub struct MemoryBillStore {
    bills: RwLock<IndexMap<String, Bill>>,
}

impl MemoryBillStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.bills.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.bills.read().await.is_empty()
    }
}

#[async_trait]
impl BillStore for MemoryBillStore {
    async fn insert(&self, bill: &Bill) -> Result<(), BillScanError> {
        let mut bills = self.bills.write().await;
        if bills.contains_key(&bill.id) {
            return Err(BillScanError::storage(format!(
                "duplicate bill id '{}'",
                bill.id
            )));
        }
        bills.insert(bill.id.clone(), bill.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Bill>, BillScanError> {
        Ok(self.bills.read().await.get(id).cloned())
    }

    async fn find_all(&self) -> Result<Vec<Bill>, BillScanError> {
        Ok(self.bills.read().await.values().cloned().collect())
    }

    async fn replace(&self, id: &str, bill: &Bill) -> Result<bool, BillScanError> {
        let mut bills = self.bills.write().await;
        match bills.get_mut(id) {
            Some(slot) => {
                *slot = with_id(id, bill);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: &str) -> Result<bool, BillScanError> {
        Ok(self.bills.write().await.shift_remove(id).is_some())
    }
}
