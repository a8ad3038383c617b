use crate::{Document, DocumentStore, Filter, STORAGE_ID_FIELD};
use alert_core::{outcome::UpdateOutcome, AlertError, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, AtomicU64, Ordering},
};
use tracing::debug;

/// Process-local document store used in development and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
    next_seq: AtomicU64,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent operation fail, simulating an outage.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map_or(0, Vec::len)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    fn ensure_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AlertError::Store("store unavailable".to_string()));
        }
        Ok(())
    }

    fn stamp(&self, mut document: Document) -> Document {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst) + 1;
        document.insert(STORAGE_ID_FIELD.to_string(), Value::String(seq.to_string()));
        document
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn ping(&self) -> Result<()> {
        self.ensure_available()
    }

    async fn insert_one(&self, collection: &str, document: Document) -> Result<()> {
        self.ensure_available()?;
        let document = self.stamp(document);
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .push(document);
        Ok(())
    }

    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> Result<u64> {
        self.ensure_available()?;
        let stamped: Vec<Document> = documents.into_iter().map(|d| self.stamp(d)).collect();
        let inserted = stamped.len() as u64;
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .extend(stamped);
        debug!(collection, inserted, "Inserted documents");
        Ok(inserted)
    }

    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>> {
        self.ensure_available()?;
        Ok(self
            .collections
            .read()
            .get(collection)
            .map(|documents| {
                documents
                    .iter()
                    .filter(|document| filter.matches(document))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64> {
        self.ensure_available()?;
        let mut collections = self.collections.write();
        let Some(documents) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let before = documents.len();
        documents.retain(|document| !filter.matches(document));
        Ok((before - documents.len()) as u64)
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        patch: Document,
    ) -> Result<UpdateOutcome> {
        self.ensure_available()?;
        let mut collections = self.collections.write();
        let Some(document) = collections
            .get_mut(collection)
            .and_then(|documents| documents.iter_mut().find(|d| filter.matches(d)))
        else {
            return Ok(UpdateOutcome::default());
        };

        let mut modified = false;
        for (field, value) in patch {
            if field == STORAGE_ID_FIELD {
                continue;
            }
            if document.get(&field) != Some(&value) {
                document.insert(field, value);
                modified = true;
            }
        }

        Ok(UpdateOutcome {
            matched_count: 1,
            modified_count: u64::from(modified),
        })
    }
}
