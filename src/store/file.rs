use super::{with_id, BillStore};
use crate::bill::Bill;
use crate::error::BillScanError;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Directory-backed bill store: each bill is `<dir>/<id>.json`.
///
/// Every write goes to a uniquely named temporary sibling first, so a crash
/// never leaves a half-written document behind and concurrent writers never
/// share a temp file. Inserts publish with a hard link, which fails when the
/// target exists, so two inserts of one id cannot both succeed. Ids are
/// restricted to ASCII letters, digits, `-` and `_` so they cannot name a
/// path outside `dir`.
#[derive(Debug, Clone)]
pub struct FileBillStore {
    dir: PathBuf,
}

impl FileBillStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> Result<PathBuf, BillScanError> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(BillScanError::storage(format!(
                "bill id '{id}' is not usable as a document key"
            )));
        }
        Ok(self.dir.join(format!("{id}.json")))
    }

    async fn read_bill(path: &Path) -> Result<Option<Bill>, BillScanError> {
        let text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(BillScanError::storage(format!(
                    "failed to read '{}': {e}",
                    path.display()
                )))
            }
        };
        serde_json::from_str(&text).map(Some).map_err(|e| {
            BillScanError::storage(format!("corrupt document '{}': {e}", path.display()))
        })
    }

    async fn exists(path: &Path) -> Result<bool, BillScanError> {
        tokio::fs::try_exists(path).await.map_err(|e| {
            BillScanError::storage(format!("failed to check '{}': {e}", path.display()))
        })
    }

    /// Write `bill` to a fresh temp file in the store directory.
    ///
    /// The name does not end in `.json`, so listings never pick it up.
    async fn write_temp(&self, bill: &Bill) -> Result<PathBuf, BillScanError> {
        let json = serde_json::to_vec_pretty(bill)
            .map_err(|e| BillScanError::storage(format!("failed to encode bill: {e}")))?;

        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            BillScanError::storage(format!("failed to create '{}': {e}", self.dir.display()))
        })?;

        let tmp_path = self
            .dir
            .join(format!(".{}.{}.tmp", bill.id, uuid::Uuid::new_v4().simple()));
        if let Err(e) = tokio::fs::write(&tmp_path, &json).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(BillScanError::storage(format!(
                "failed to write '{}': {e}",
                tmp_path.display()
            )));
        }
        Ok(tmp_path)
    }

    /// Publish a temp file under `path` only if nothing is there yet.
    async fn link_new(tmp_path: &Path, path: &Path, id: &str) -> Result<(), BillScanError> {
        let linked = tokio::fs::hard_link(tmp_path, path).await;
        let _ = tokio::fs::remove_file(tmp_path).await;
        match linked {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(BillScanError::storage(
                format!("duplicate bill id '{id}'"),
            )),
            Err(e) => Err(BillScanError::storage(format!(
                "failed to publish '{}': {e}",
                path.display()
            ))),
        }
    }

    /// Move a temp file over `path`, replacing what is there.
    async fn move_over(tmp_path: &Path, path: &Path) -> Result<(), BillScanError> {
        if let Err(e) = tokio::fs::rename(tmp_path, path).await {
            let _ = tokio::fs::remove_file(tmp_path).await;
            return Err(BillScanError::storage(format!(
                "failed to move '{}' into place: {e}",
                path.display()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl BillStore for FileBillStore {
    async fn insert(&self, bill: &Bill) -> Result<(), BillScanError> {
        let path = self.path_for(&bill.id)?;
        let tmp_path = self.write_temp(bill).await?;
        Self::link_new(&tmp_path, &path, &bill.id).await?;
        debug!("Wrote bill {} to {}", bill.id, path.display());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Bill>, BillScanError> {
        let path = self.path_for(id)?;
        Self::read_bill(&path).await
    }

    async fn find_all(&self) -> Result<Vec<Bill>, BillScanError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(BillScanError::storage(format!(
                    "failed to list '{}': {e}",
                    self.dir.display()
                )))
            }
        };

        let mut paths = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| BillScanError::storage(format!("failed to list bills: {e}")))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut bills = Vec::with_capacity(paths.len());
        for path in paths {
            match Self::read_bill(&path).await {
                Ok(Some(bill)) => bills.push(bill),
                // Deleted between listing and reading.
                Ok(None) => {}
                Err(e) => warn!("Skipping {}: {}", path.display(), e),
            }
        }
        Ok(bills)
    }

    async fn replace(&self, id: &str, bill: &Bill) -> Result<bool, BillScanError> {
        let path = self.path_for(id)?;
        if !Self::exists(&path).await? {
            return Ok(false);
        }
        let tmp_path = self.write_temp(&with_id(id, bill)).await?;
        Self::move_over(&tmp_path, &path).await?;
        debug!("Replaced bill {} at {}", id, path.display());
        Ok(true)
    }

    async fn delete(&self, id: &str) -> Result<bool, BillScanError> {
        let path = self.path_for(id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(BillScanError::storage(format!(
                "failed to delete '{}': {e}",
                path.display()
            ))),
        }
    }
}
