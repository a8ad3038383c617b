//! Cached access to alert rule collections.
//!
//! Each collection is mirrored in memory as an `Arc<Vec<R>>`. Every write goes
//! to the store first and then re-reads the whole collection, swapping the
//! cached list for a new one. Readers holding the previous `Arc` keep a
//! consistent snapshot.

use crate::{from_document, to_document, Document, DocumentStore, Filter};
use alert_core::{
    model::{AlertRule, RuleRecord},
    outcome::{RemovalReport, UpdateOutcome},
    report::ErrorReporter,
    AlertError, Collection, Result,
};
use dashmap::DashMap;
use serde_json::Value;
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};
use tracing::{debug, error, info, warn};

#[derive(Debug)]
pub struct AlertRepository<R: RuleRecord> {
    store: Arc<dyn DocumentStore>,
    reporter: Arc<dyn ErrorReporter>,
    cache: DashMap<Collection, Arc<Vec<R>>>,
}

impl<R: RuleRecord> AlertRepository<R> {
    /// Physical store collection, e.g. `alerts.working`.
    pub fn collection_name(collection: Collection) -> String {
        format!("{}.{}", R::NAMESPACE, collection)
    }

    /// Loads every collection into the cache. Any failure aborts startup.
    pub async fn initialize(
        store: Arc<dyn DocumentStore>,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Result<Self> {
        store.ping().await?;

        let repository = Self {
            store,
            reporter,
            cache: DashMap::new(),
        };

        for collection in Collection::ALL {
            let rules = repository.read_collection(collection).await?;
            info!(
                collection = %Self::collection_name(collection),
                count = rules.len(),
                "Collection loaded"
            );
            repository.cache.insert(collection, Arc::new(rules));
        }

        Ok(repository)
    }

    async fn read_collection(&self, collection: Collection) -> Result<Vec<R>> {
        let name = Self::collection_name(collection);
        let documents = self
            .store
            .find(&name, &Filter::all())
            .await
            .map_err(|e| e.in_collection(&name))?;

        let mut rules = Vec::with_capacity(documents.len());
        for document in documents {
            match from_document::<R>(document) {
                Ok(rule) => rules.push(rule),
                Err(e) => warn!(collection = %name, "Skipping undecodable document: {}", e),
            }
        }
        Ok(rules)
    }

    /// Cached rules of a collection. Never touches the store.
    pub fn get_alerts(&self, collection: Collection) -> Arc<Vec<R>> {
        self.cache
            .get(&collection)
            .map(|entry| Arc::clone(entry.value()))
            .unwrap_or_default()
    }

    pub fn active_alerts(&self, collection: Collection) -> Vec<R> {
        self.get_alerts(collection)
            .iter()
            .filter(|rule| rule.is_active())
            .cloned()
            .collect()
    }

    /// Replaces the cached list with the store contents. On failure the
    /// cached list becomes empty and the error is reported and returned.
    pub async fn refresh_repo(&self, collection: Collection) -> Result<()> {
        match self.read_collection(collection).await {
            Ok(rules) => {
                debug!(
                    collection = %Self::collection_name(collection),
                    count = rules.len(),
                    "Cache refreshed"
                );
                self.cache.insert(collection, Arc::new(rules));
                Ok(())
            }
            Err(e) => {
                self.cache.insert(collection, Arc::new(Vec::new()));
                error!("Failed to refresh cache: {}", e);
                self.reporter
                    .report(&format!("{}:refreshRepo", R::NAMESPACE), &e.to_string())
                    .await;
                Err(e)
            }
        }
    }

    /// Refreshes after a write attempt, whether or not it succeeded. The write
    /// error wins over a refresh error.
    async fn settle<T>(&self, collection: Collection, written: Result<T>) -> Result<T> {
        let name = Self::collection_name(collection);
        let refreshed = self.refresh_repo(collection).await;

        let value = match written {
            Ok(value) => value,
            Err(e) => {
                let e = e.in_collection(&name);
                error!("{}", e);
                return Err(e);
            }
        };
        refreshed?;
        Ok(value)
    }

    pub async fn add_alert(&self, collection: Collection, rule: &R) -> Result<()> {
        let document = to_document(rule)?;
        let written = self
            .store
            .insert_one(&Self::collection_name(collection), document)
            .await;
        self.settle(collection, written).await?;

        info!(id = rule.id(), symbol = rule.symbol(), "Alert added to {}", collection);
        Ok(())
    }

    pub async fn add_many_alerts(&self, collection: Collection, rules: &[R]) -> Result<u64> {
        if rules.is_empty() {
            return Ok(0);
        }

        let documents = rules.iter().map(to_document).collect::<Result<Vec<_>>>()?;
        let written = self
            .store
            .insert_many(&Self::collection_name(collection), documents)
            .await;
        let inserted = self.settle(collection, written).await?;

        info!("Successfully added {} alerts to {}", inserted, Self::collection_name(collection));
        Ok(inserted)
    }

    /// Deletes every listed id that exists and names the ones that did not.
    pub async fn remove_alerts(
        &self,
        collection: Collection,
        ids: &[String],
    ) -> Result<RemovalReport> {
        let name = Self::collection_name(collection);
        let mut seen = HashSet::new();
        let requested: Vec<String> = ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect();

        let filter = Filter::any_of("id", requested.iter().cloned());
        let present: HashSet<String> = self
            .store
            .find(&name, &filter)
            .await
            .map_err(|e| e.in_collection(&name))?
            .iter()
            .filter_map(|document| document.get("id").and_then(Value::as_str))
            .map(str::to_string)
            .collect();

        let missing: Vec<String> = requested
            .iter()
            .filter(|id| !present.contains(*id))
            .cloned()
            .collect();
        for id in &missing {
            warn!(id = %id, collection = %name, "Alert not found, nothing to delete");
        }

        let written = self.store.delete_many(&name, &filter).await;
        let deleted = self.settle(collection, written).await?;

        Ok(RemovalReport {
            requested: requested.len(),
            deleted,
            missing,
        })
    }

    pub async fn remove_alert(&self, collection: Collection, id: &str) -> Result<u64> {
        self.remove_by_filter(collection, &Filter::eq("id", id)).await
    }

    pub async fn remove_by_filter(&self, collection: Collection, filter: &Filter) -> Result<u64> {
        if filter.is_empty() {
            return Err(AlertError::Validation(
                "Refusing to delete with an empty filter".to_string(),
            ));
        }

        let written = self
            .store
            .delete_many(&Self::collection_name(collection), filter)
            .await;
        self.settle(collection, written).await
    }

    pub async fn update_alert(
        &self,
        collection: Collection,
        filter: &Filter,
        patch: Document,
    ) -> Result<UpdateOutcome> {
        let written = self
            .store
            .update_one(&Self::collection_name(collection), filter, patch)
            .await;
        self.settle(collection, written).await
    }

    pub async fn find_by_symbol(&self, collection: Collection, symbol: &str) -> Result<Vec<R>> {
        self.find(collection, &Filter::eq("symbol", symbol)).await
    }

    pub async fn find_by_ids(&self, collection: Collection, ids: &[String]) -> Result<Vec<R>> {
        self.find(collection, &Filter::any_of("id", ids.iter().cloned()))
            .await
    }

    async fn find(&self, collection: Collection, filter: &Filter) -> Result<Vec<R>> {
        let name = Self::collection_name(collection);
        self.store
            .find(&name, filter)
            .await
            .map_err(|e| e.in_collection(&name))?
            .into_iter()
            .map(from_document)
            .collect()
    }

    /// Keeps the most recent activation per cleanup key in `triggered` and
    /// deletes the rest. Returns the number of deleted rules.
    pub async fn clean_triggered(&self) -> Result<u64> {
        let rules = self.read_collection(Collection::Triggered).await?;

        let mut latest: HashMap<String, (Option<i64>, &str)> = HashMap::new();
        for rule in rules.iter() {
            let candidate = (rule.activation_time(), rule.id());
            latest
                .entry(rule.cleanup_key())
                .and_modify(|current| {
                    if candidate.0 > current.0 {
                        *current = candidate;
                    }
                })
                .or_insert(candidate);
        }

        let keep: HashSet<&str> = latest.values().map(|(_, id)| *id).collect();
        let stale: Vec<String> = rules
            .iter()
            .map(|rule| rule.id())
            .filter(|id| !keep.contains(id))
            .map(str::to_string)
            .collect();

        if stale.is_empty() {
            debug!(namespace = R::NAMESPACE, "No stale triggered alerts");
            return Ok(0);
        }

        let deleted = self
            .remove_by_filter(Collection::Triggered, &Filter::any_of("id", stale))
            .await?;
        info!(namespace = R::NAMESPACE, deleted, "Cleaned stale triggered alerts");
        Ok(deleted)
    }
}

impl AlertRepository<AlertRule> {
    /// Candidate names that already exist in `collection`, in store order.
    pub async fn find_duplicate_alert_names(
        &self,
        names: &[String],
        collection: Collection,
    ) -> Result<Vec<String>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let name = Self::collection_name(collection);
        let documents = self
            .store
            .find(&name, &Filter::any_of("alertName", names.iter().cloned()))
            .await
            .map_err(|e| e.in_collection(&name))?;

        let mut seen = HashSet::new();
        Ok(documents
            .iter()
            .filter_map(|document| document.get("alertName").and_then(Value::as_str))
            .filter(|alert_name| seen.insert(alert_name.to_string()))
            .map(str::to_string)
            .collect())
    }
}
