//! Storage ports - interfaces for data persistence
//!
//! Handlers never talk to a concrete store. They go through [`Gateway`], a
//! typed facade over the untyped [`DocumentStore`] port that keeps one JSON
//! document per entity, grouped by collection.

use std::sync::Arc;

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::domain::error::WorkflowError;

/// A persisted domain object
pub trait Entity: Serialize + DeserializeOwned + Send + Sync {
    /// Collection the entity is stored in
    const COLLECTION: &'static str;

    /// Stable identifier, unique within the collection
    fn id(&self) -> &str;
}

/// Port for storing JSON documents by collection and id
pub trait DocumentStore: Send + Sync {
    /// Load a single document
    fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, WorkflowError>;

    /// Load every document in a collection, ordered by id
    fn scan(&self, collection: &str) -> Result<Vec<Value>, WorkflowError>;

    /// Insert or replace a document
    fn put(&self, collection: &str, id: &str, document: &Value) -> Result<(), WorkflowError>;

    /// Remove a document; returns whether it existed
    fn remove(&self, collection: &str, id: &str) -> Result<bool, WorkflowError>;
}

/// Typed data-access gateway handed to workflow handlers
#[derive(Clone)]
pub struct Gateway {
    store: Arc<dyn DocumentStore>
}

impl Gateway {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Load an entity by id
    pub fn get<E: Entity>(&self, id: &str) -> Result<Option<E>, WorkflowError> {
        self.store.get(E::COLLECTION, id)?.map(decode).transpose()
    }

    /// Find the single entity matching `predicate`
    ///
    /// More than one match is an error rather than an arbitrary pick.
    pub fn find_one<E, P>(&self, predicate: P) -> Result<Option<E>, WorkflowError>
    where
        E: Entity,
        P: Fn(&E) -> bool
    {
        let mut matches = self.find_all(predicate)?;
        match matches.len() {
            0 => Ok(None),
            1 => Ok(matches.pop()),
            n => Err(WorkflowError::Persistence(format!(
                "expected at most one {} document, found {}",
                E::COLLECTION,
                n
            )))
        }
    }

    /// Find every entity matching `predicate`
    pub fn find_all<E, P>(&self, predicate: P) -> Result<Vec<E>, WorkflowError>
    where
        E: Entity,
        P: Fn(&E) -> bool
    {
        let mut found = Vec::new();
        for document in self.store.scan(E::COLLECTION)? {
            let entity: E = decode(document)?;
            if predicate(&entity) {
                found.push(entity);
            }
        }
        Ok(found)
    }

    /// Insert or replace an entity
    pub fn save<E: Entity>(&self, item: &E) -> Result<(), WorkflowError> {
        let document = serde_json::to_value(item)?;
        self.store.put(E::COLLECTION, item.id(), &document)
    }

    /// Replace an entity only if it is already stored
    pub fn update<E: Entity>(&self, item: &E) -> Result<bool, WorkflowError> {
        if self.store.get(E::COLLECTION, item.id())?.is_none() {
            return Ok(false);
        }
        self.save(item)?;
        Ok(true)
    }

    /// Delete a single entity
    pub fn delete<E: Entity>(&self, item: &E) -> Result<bool, WorkflowError> {
        self.store.remove(E::COLLECTION, item.id())
    }

    /// Delete every entity matching `predicate`, returning how many were removed
    pub fn delete_where<E, P>(&self, predicate: P) -> Result<usize, WorkflowError>
    where
        E: Entity,
        P: Fn(&E) -> bool
    {
        let mut removed = 0;
        for item in self.find_all(predicate)? {
            if self.delete(&item)? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

fn decode<E: Entity>(document: Value) -> Result<E, WorkflowError> {
    serde_json::from_value(document)
        .map_err(|e| WorkflowError::Serialization(format!("failed to decode {} document: {}", E::COLLECTION, e)))
}
