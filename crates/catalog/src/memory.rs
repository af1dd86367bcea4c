use std::collections::BTreeMap;

use chrono::Utc;
use netdisk_protocol::{FileKind, FileRecord, NewFileRecord};
use tokio::sync::RwLock;
use tracing::debug;

use crate::{CatalogError, CatalogFuture, MetadataCatalog};

#[derive(Debug, Default)]
struct State {
    next_id: i64,
    records: BTreeMap<i64, FileRecord>,
}

/// In-memory catalog. Records live as long as the process.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    state: RwLock<State>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records in insertion order.
    pub async fn records(&self) -> Vec<FileRecord> {
        self.state.read().await.records.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl MetadataCatalog for MemoryCatalog {
    fn insert(&self, record: NewFileRecord) -> CatalogFuture<'_, FileRecord> {
        Box::pin(async move {
            if record.name.trim().is_empty() {
                return Err(CatalogError::Rejected("record name is empty".into()));
            }

            let mut state = self.state.write().await;
            state.next_id += 1;
            let id = state.next_id;
            let stored = record.into_record(id, Utc::now());
            state.records.insert(id, stored.clone());

            debug!(id, name = %stored.name, kind = ?stored.kind, "catalog record inserted");
            Ok(stored)
        })
    }

    fn find_by_fingerprint<'a>(
        &'a self,
        fingerprint: &'a str,
    ) -> CatalogFuture<'a, Option<FileRecord>> {
        Box::pin(async move {
            let state = self.state.read().await;
            Ok(state
                .records
                .values()
                .find(|r| r.kind == FileKind::File && r.fingerprint.as_deref() == Some(fingerprint))
                .cloned())
        })
    }

    fn get(&self, id: i64) -> CatalogFuture<'_, Option<FileRecord>> {
        Box::pin(async move { Ok(self.state.read().await.records.get(&id).cloned()) })
    }
}
