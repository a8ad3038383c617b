use crate::{from_document, to_document, DocumentStore, Filter};
use alert_core::{model::AnchorPoint, outcome::AnchorSave, Result};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

pub const ANCHORS_COLLECTION: &str = "general.anchored-vwaps";

/// Operator-recorded VWAP anchors. Not cached.
#[derive(Debug, Clone)]
pub struct AnchorPointRepository {
    store: Arc<dyn DocumentStore>,
}

impl AnchorPointRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Records `(symbol, anchor_time)` unless the pair already exists.
    pub async fn save(&self, symbol: &str, anchor_time: i64) -> Result<AnchorSave> {
        let filter = Filter::eq("symbol", symbol).and_eq("anchorTime", anchor_time);
        let existing = self
            .store
            .find_one(ANCHORS_COLLECTION, &filter)
            .await
            .map_err(|e| e.in_collection(ANCHORS_COLLECTION))?;
        if existing.is_some() {
            return Ok(AnchorSave::AlreadyExists);
        }

        let point = AnchorPoint {
            symbol: symbol.to_string(),
            anchor_time,
            timestamp: Utc::now().timestamp_millis(),
        };
        self.store
            .insert_one(ANCHORS_COLLECTION, to_document(&point)?)
            .await
            .map_err(|e| e.in_collection(ANCHORS_COLLECTION))?;

        info!(symbol, anchor_time, "Anchor point saved");
        Ok(AnchorSave::Created)
    }

    pub async fn list(&self, symbol: &str) -> Result<Vec<AnchorPoint>> {
        self.store
            .find(ANCHORS_COLLECTION, &Filter::eq("symbol", symbol))
            .await
            .map_err(|e| e.in_collection(ANCHORS_COLLECTION))?
            .into_iter()
            .map(from_document)
            .collect()
    }

    /// Removes every anchor of `symbol`, or only the one at `anchor_time`.
    pub async fn remove(&self, symbol: &str, anchor_time: Option<i64>) -> Result<u64> {
        let mut filter = Filter::eq("symbol", symbol);
        if let Some(anchor_time) = anchor_time {
            filter = filter.and_eq("anchorTime", anchor_time);
        }

        let deleted = self
            .store
            .delete_many(ANCHORS_COLLECTION, &filter)
            .await
            .map_err(|e| e.in_collection(ANCHORS_COLLECTION))?;
        info!(symbol, deleted, "Anchor points removed");
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    #[tokio::test]
    async fn test_save_is_idempotent_per_pair() {
        let repo = AnchorPointRepository::new(Arc::new(MemoryStore::new()));

        assert_eq!(repo.save("BTCUSDT", 1_000).await.unwrap(), AnchorSave::Created);
        assert_eq!(
            repo.save("BTCUSDT", 1_000).await.unwrap(),
            AnchorSave::AlreadyExists
        );
        assert_eq!(repo.save("BTCUSDT", 2_000).await.unwrap(), AnchorSave::Created);

        let points = repo.list("BTCUSDT").await.unwrap();
        assert_eq!(points.len(), 2);
        assert!(repo.list("ETHUSDT").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_one_or_all() {
        let repo = AnchorPointRepository::new(Arc::new(MemoryStore::new()));
        repo.save("BTCUSDT", 1_000).await.unwrap();
        repo.save("BTCUSDT", 2_000).await.unwrap();
        repo.save("BTCUSDT", 3_000).await.unwrap();

        assert_eq!(repo.remove("BTCUSDT", Some(2_000)).await.unwrap(), 1);
        assert_eq!(repo.remove("BTCUSDT", None).await.unwrap(), 2);
        assert!(repo.list("BTCUSDT").await.unwrap().is_empty());
    }
}
