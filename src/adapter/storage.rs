//! Document store implementations
//!
//! This module provides both in-memory and persistent (RocksDB) implementations
//! of the [`DocumentStore`] port.

use std::{
    collections::{BTreeMap, HashMap},
    path::Path,
    sync::{Arc, PoisonError, RwLock}
};

use rocksdb::{DB, Direction, IteratorMode, Options};
use serde_json::Value;

use crate::{domain::error::WorkflowError, port::storage::DocumentStore};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize, clap::ValueEnum)]
pub enum StorageType {
    #[default]
    #[serde(rename = "inmemory")]
    #[value(name = "inmemory")]
    InMemory,
    #[serde(rename = "rocksdb")]
    #[value(name = "rocksdb")]
    RocksDb
}

impl StorageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageType::InMemory => "inmemory",
            StorageType::RocksDb => "rocksdb"
        }
    }
}

impl std::str::FromStr for StorageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inmemory" => Ok(StorageType::InMemory),
            "rocksdb" => Ok(StorageType::RocksDb),
            other => Err(format!("Unknown storage backend: {}", other))
        }
    }
}

/// In-memory document store
///
/// Suitable for development and testing; data is lost when the process exits.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    collections: RwLock<HashMap<String, BTreeMap<String, Value>>>
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, WorkflowError> {
        let collections = self.collections.read().unwrap_or_else(PoisonError::into_inner);
        Ok(collections.get(collection).and_then(|documents| documents.get(id)).cloned())
    }

    fn scan(&self, collection: &str) -> Result<Vec<Value>, WorkflowError> {
        let collections = self.collections.read().unwrap_or_else(PoisonError::into_inner);
        Ok(collections.get(collection).map(|documents| documents.values().cloned().collect()).unwrap_or_default())
    }

    fn put(&self, collection: &str, id: &str, document: &Value) -> Result<(), WorkflowError> {
        let mut collections = self.collections.write().unwrap_or_else(PoisonError::into_inner);
        collections.entry(collection.to_string()).or_default().insert(id.to_string(), document.clone());
        Ok(())
    }

    fn remove(&self, collection: &str, id: &str) -> Result<bool, WorkflowError> {
        let mut collections = self.collections.write().unwrap_or_else(PoisonError::into_inner);
        Ok(collections.get_mut(collection).and_then(|documents| documents.remove(id)).is_some())
    }
}

/// RocksDB-backed document store
///
/// Storage layout:
/// - `{collection}:{id}` -> JSON document
///
/// Keys sort lexicographically, so a prefix scan returns a collection ordered by id.
pub struct RocksDbDocumentStore {
    db: Arc<DB>
}

impl RocksDbDocumentStore {
    /// Open (or create) a store at `path`
    pub fn open(path: &Path) -> Result<Self, WorkflowError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Snappy);
        let db = DB::open(&opts, path)
            .map_err(|e| WorkflowError::Persistence(format!("Failed to open RocksDB at {}: {}", path.display(), e)))?;
        Ok(Self::from_db(Arc::new(db)))
    }

    pub fn from_db(db: Arc<DB>) -> Self {
        Self { db }
    }

    fn key(collection: &str, id: &str) -> String {
        format!("{}:{}", collection, id)
    }
}

impl DocumentStore for RocksDbDocumentStore {
    fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, WorkflowError> {
        match self.db.get(Self::key(collection, id).as_bytes())? {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None)
        }
    }

    fn scan(&self, collection: &str) -> Result<Vec<Value>, WorkflowError> {
        let prefix = format!("{}:", collection);
        let mut documents = Vec::new();

        for item in self.db.iterator(IteratorMode::From(prefix.as_bytes(), Direction::Forward)) {
            let (key, value) = item?;
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }
            documents.push(serde_json::from_slice(&value)?);
        }

        Ok(documents)
    }

    fn put(&self, collection: &str, id: &str, document: &Value) -> Result<(), WorkflowError> {
        let data = serde_json::to_vec(document)?;
        self.db.put(Self::key(collection, id).as_bytes(), data)?;
        Ok(())
    }

    fn remove(&self, collection: &str, id: &str) -> Result<bool, WorkflowError> {
        let key = Self::key(collection, id);
        if self.db.get(key.as_bytes())?.is_none() {
            return Ok(false);
        }
        self.db.delete(key.as_bytes())?;
        Ok(true)
    }
}

/// Factory for creating document stores based on configuration
pub struct DocumentStoreFactory;

impl DocumentStoreFactory {
    pub fn create(storage: StorageType, db_path: Option<&Path>) -> Result<Arc<dyn DocumentStore>, WorkflowError> {
        match storage {
            StorageType::InMemory => Ok(Arc::new(InMemoryDocumentStore::new())),
            StorageType::RocksDb => {
                let path = db_path
                    .ok_or_else(|| WorkflowError::Configuration("RocksDB storage requires a data directory".to_string()))?;
                Ok(Arc::new(RocksDbDocumentStore::open(path)?))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;
    use crate::{
        domain::{
            project::{Commission, CommissionKind, Project},
            state::ProjectState
        },
        port::storage::Gateway
    };

    fn exercise_store(store: Arc<dyn DocumentStore>) {
        store.put("projects", "b", &json!({ "id": "b" })).unwrap();
        store.put("projects", "a", &json!({ "id": "a" })).unwrap();
        store.put("commissions", "a", &json!({ "id": "c" })).unwrap();

        let ids: Vec<Value> = store.scan("projects").unwrap().into_iter().map(|d| d["id"].clone()).collect();
        assert_eq!(ids, vec![json!("a"), json!("b")]);
        assert_eq!(store.get("commissions", "a").unwrap(), Some(json!({ "id": "c" })));
        assert_eq!(store.get("projects", "missing").unwrap(), None);

        assert!(store.remove("projects", "a").unwrap());
        assert!(!store.remove("projects", "a").unwrap());
        assert_eq!(store.scan("projects").unwrap().len(), 1);
        assert!(store.scan("unknown").unwrap().is_empty());
    }

    #[test]
    fn test_in_memory_store() {
        exercise_store(Arc::new(InMemoryDocumentStore::new()));
    }

    #[test]
    fn test_rocksdb_store() {
        let dir = TempDir::new().unwrap();
        exercise_store(DocumentStoreFactory::create(StorageType::RocksDb, Some(dir.path())).unwrap());
    }

    #[test]
    fn test_rocksdb_store_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let project = Project::new("Sawmill");
        {
            let gateway = Gateway::new(Arc::new(RocksDbDocumentStore::open(dir.path()).unwrap()));
            gateway.save(&project).unwrap();
        }

        let gateway = Gateway::new(Arc::new(RocksDbDocumentStore::open(dir.path()).unwrap()));
        let stored: Project = gateway.get(&project.id).unwrap().unwrap();
        assert_eq!(stored.name, "Sawmill");
    }

    #[test]
    fn test_rocksdb_requires_path() {
        assert!(matches!(
            DocumentStoreFactory::create(StorageType::RocksDb, None),
            Err(WorkflowError::Configuration(_))
        ));
    }

    #[test]
    fn test_gateway_queries() {
        let gateway = Gateway::new(Arc::new(InMemoryDocumentStore::new()));
        let open = Project::new("Brewery");
        let moved = Project::new("Bakery").with_state(ProjectState::OnIspolcom);
        gateway.save(&open).unwrap();
        gateway.save(&moved).unwrap();

        let found = gateway.find_one(|p: &Project| p.state == ProjectState::OnIspolcom).unwrap();
        assert_eq!(found.map(|p| p.name), Some("Bakery".to_string()));
        assert!(gateway.find_one(|_: &Project| true).is_err());
        assert_eq!(gateway.find_all(|_: &Project| true).unwrap().len(), 2);

        let unsaved = Commission::new(CommissionKind::Comission, chrono::Utc::now());
        assert!(!gateway.update(&unsaved).unwrap());
        gateway.save(&unsaved).unwrap();
        assert!(gateway.update(&unsaved).unwrap());

        assert_eq!(gateway.delete_where(|p: &Project| p.state == ProjectState::Open).unwrap(), 1);
        assert!(gateway.delete(&moved).unwrap());
        assert!(gateway.find_all(|_: &Project| true).unwrap().is_empty());
    }
}
