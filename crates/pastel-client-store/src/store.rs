use crate::error::StoreError;
use pastel_client_core::messages::MessageKind;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

/// One persisted message, keyed by its envelope hash (spec §4.8: "Typed
/// record tables for every message kind... insert-on-seen and
/// lookup-by-hash").
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub identity: String,
    pub request_hash: String,
    pub block_height: u64,
    pub payload: Value,
}

/// Backing engine for the persistence façade. Implemented by [`SledStore`]
/// for production hosts and [`MemoryStore`] for tests.
pub trait Store: Send + Sync {
    fn put(&self, kind: MessageKind, record: Record) -> Result<(), StoreError>;
    fn get_by_hash(&self, kind: MessageKind, request_hash: &str) -> Result<Option<Record>, StoreError>;
    fn list_for_identity(&self, kind: MessageKind, identity: &str) -> Result<Vec<Record>, StoreError>;

    /// Fold every row for `identity` under `kind` down to the most recent
    /// by block height (spec §4.8 dedup helper).
    fn latest_for_identity(&self, kind: MessageKind, identity: &str) -> Result<Option<Record>, StoreError> {
        Ok(dedup_by_identity(self.list_for_identity(kind, identity)?).into_iter().next())
    }
}

/// Fold rows sharing `(identity, request_hash)` down to the single
/// highest-`block_height` row, then return the remaining rows ordered by
/// descending block height.
pub fn dedup_by_identity(records: Vec<Record>) -> Vec<Record> {
    let mut latest: HashMap<(String, String), Record> = HashMap::new();
    for record in records {
        let key = (record.identity.clone(), record.request_hash.clone());
        latest
            .entry(key)
            .and_modify(|existing| {
                if record.block_height > existing.block_height {
                    *existing = record.clone();
                }
            })
            .or_insert(record);
    }
    let mut out: Vec<Record> = latest.into_values().collect();
    out.sort_by(|a, b| b.block_height.cmp(&a.block_height));
    out
}

/// In-memory reference `Store`, used by tests and short-lived processes.
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<HashMap<MessageKind, Vec<Record>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn put(&self, kind: MessageKind, record: Record) -> Result<(), StoreError> {
        self.rows.lock().unwrap().entry(kind).or_default().push(record);
        Ok(())
    }

    fn get_by_hash(&self, kind: MessageKind, request_hash: &str) -> Result<Option<Record>, StoreError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .get(&kind)
            .and_then(|rows| rows.iter().find(|r| r.request_hash == request_hash).cloned()))
    }

    fn list_for_identity(&self, kind: MessageKind, identity: &str) -> Result<Vec<Record>, StoreError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .get(&kind)
            .map(|rows| rows.iter().filter(|r| r.identity == identity).cloned().collect())
            .unwrap_or_default())
    }
}

/// `sled`-backed `Store`: one tree per [`MessageKind`], so each record
/// family gets its own named tree rather than sharing a single keyspace.
/// Rows are serialized as JSON rather than bincode, since a row's
/// `payload` is the same `serde_json::Value` the canonicalizer and the
/// supernode HTTP façade already operate on.
pub struct SledStore {
    db: sled::Db,
}

#[derive(serde::Serialize, serde::Deserialize)]
struct StoredRow {
    identity: String,
    request_hash: String,
    block_height: u64,
    payload: Value,
}

impl From<Record> for StoredRow {
    fn from(r: Record) -> Self {
        StoredRow {
            identity: r.identity,
            request_hash: r.request_hash,
            block_height: r.block_height,
            payload: r.payload,
        }
    }
}

impl From<StoredRow> for Record {
    fn from(r: StoredRow) -> Self {
        Record {
            identity: r.identity,
            request_hash: r.request_hash,
            block_height: r.block_height,
            payload: r.payload,
        }
    }
}

impl SledStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path).map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(Self { db })
    }

    fn tree(&self, kind: MessageKind) -> Result<sled::Tree, StoreError> {
        self.db
            .open_tree(kind.tree_name())
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}

impl Store for SledStore {
    fn put(&self, kind: MessageKind, record: Record) -> Result<(), StoreError> {
        let tree = self.tree(kind)?;
        let row: StoredRow = record.into();
        let bytes = serde_json::to_vec(&row)?;
        tree.insert(row.request_hash.as_bytes(), bytes)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    fn get_by_hash(&self, kind: MessageKind, request_hash: &str) -> Result<Option<Record>, StoreError> {
        let tree = self.tree(kind)?;
        match tree.get(request_hash.as_bytes()).map_err(|e| StoreError::Backend(e.to_string()))? {
            Some(bytes) => {
                let row: StoredRow = serde_json::from_slice(&bytes)?;
                Ok(Some(row.into()))
            }
            None => Ok(None),
        }
    }

    fn list_for_identity(&self, kind: MessageKind, identity: &str) -> Result<Vec<Record>, StoreError> {
        let tree = self.tree(kind)?;
        let mut out = Vec::new();
        for item in tree.iter() {
            let (_, bytes) = item.map_err(|e| StoreError::Backend(e.to_string()))?;
            let row: StoredRow = serde_json::from_slice(&bytes)?;
            if row.identity == identity {
                out.push(row.into());
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(identity: &str, hash: &str, height: u64) -> Record {
        Record {
            identity: identity.to_string(),
            request_hash: hash.to_string(),
            block_height: height,
            payload: serde_json::json!({}),
        }
    }

    #[test]
    fn dedup_keeps_highest_block_height_per_identity_and_hash() {
        let records = vec![rec("id1", "h1", 10), rec("id1", "h1", 20), rec("id1", "h2", 5)];
        let deduped = dedup_by_identity(records);
        assert_eq!(deduped.len(), 2);
        let h1 = deduped.iter().find(|r| r.request_hash == "h1").unwrap();
        assert_eq!(h1.block_height, 20);
    }

    #[test]
    fn memory_store_roundtrip() {
        let store = MemoryStore::new();
        store.put(MessageKind::CreditPackPurchaseRequest, rec("id1", "h1", 10)).unwrap();
        store.put(MessageKind::CreditPackPurchaseRequest, rec("id1", "h1", 20)).unwrap();

        let found = store
            .get_by_hash(MessageKind::CreditPackPurchaseRequest, "h1")
            .unwrap()
            .unwrap();
        assert_eq!(found.block_height, 10);

        let latest = store
            .latest_for_identity(MessageKind::CreditPackPurchaseRequest, "id1")
            .unwrap()
            .unwrap();
        assert_eq!(latest.block_height, 20);
    }

    #[test]
    fn sled_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledStore::open(dir.path()).unwrap();
        store
            .put(MessageKind::InferenceUsageRequest, rec("id2", "hh", 100))
            .unwrap();
        let found = store
            .get_by_hash(MessageKind::InferenceUsageRequest, "hh")
            .unwrap()
            .unwrap();
        assert_eq!(found.identity, "id2");
    }
}
