use crate::{from_document, to_document, Document, DocumentStore, Filter};
use alert_core::{
    feed::CoinSource, model::Coin, outcome::UpdateOutcome, report::ErrorReporter, Result,
};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{error, info, warn};

pub const COINS_COLLECTION: &str = "general.working-coins";

/// Cached coin reference set.
#[derive(Debug)]
pub struct CoinRepository {
    store: Arc<dyn DocumentStore>,
    reporter: Arc<dyn ErrorReporter>,
    coins: RwLock<Arc<Vec<Coin>>>,
}

impl CoinRepository {
    pub async fn initialize(
        store: Arc<dyn DocumentStore>,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Result<Self> {
        let repository = Self {
            store,
            reporter,
            coins: RwLock::new(Arc::default()),
        };
        let coins = repository.read_coins().await?;
        info!(count = coins.len(), "Coin reference set loaded");
        *repository.coins.write() = Arc::new(coins);
        Ok(repository)
    }

    async fn read_coins(&self) -> Result<Vec<Coin>> {
        let documents = self
            .store
            .find(COINS_COLLECTION, &Filter::all())
            .await
            .map_err(|e| e.in_collection(COINS_COLLECTION))?;

        let mut coins = Vec::with_capacity(documents.len());
        for document in documents {
            match from_document::<Coin>(document) {
                Ok(coin) => coins.push(coin),
                Err(e) => warn!("Skipping undecodable coin: {}", e),
            }
        }
        Ok(coins)
    }

    pub fn get_coins(&self) -> Arc<Vec<Coin>> {
        Arc::clone(&*self.coins.read())
    }

    pub async fn refresh(&self) -> Result<()> {
        match self.read_coins().await {
            Ok(coins) => {
                *self.coins.write() = Arc::new(coins);
                Ok(())
            }
            Err(e) => {
                *self.coins.write() = Arc::default();
                error!("Failed to refresh coins: {}", e);
                self.reporter.report("coins:refresh", &e.to_string()).await;
                Err(e)
            }
        }
    }

    async fn settle<T>(&self, written: Result<T>) -> Result<T> {
        let refreshed = self.refresh().await;
        let value = written.map_err(|e| e.in_collection(COINS_COLLECTION))?;
        refreshed?;
        Ok(value)
    }

    pub async fn add_coin(&self, coin: &Coin) -> Result<()> {
        let written = self
            .store
            .insert_one(COINS_COLLECTION, to_document(coin)?)
            .await;
        self.settle(written).await
    }

    pub async fn add_many_coins(&self, coins: &[Coin]) -> Result<u64> {
        if coins.is_empty() {
            return Ok(0);
        }
        let documents = coins.iter().map(to_document).collect::<Result<Vec<_>>>()?;
        let written = self.store.insert_many(COINS_COLLECTION, documents).await;
        let inserted = self.settle(written).await?;
        info!("Added {} coins", inserted);
        Ok(inserted)
    }

    pub async fn remove_coins(&self, symbols: &[String]) -> Result<u64> {
        if symbols.is_empty() {
            return Ok(0);
        }
        let filter = Filter::any_of("symbol", symbols.iter().cloned());
        let written = self.store.delete_many(COINS_COLLECTION, &filter).await;
        let deleted = self.settle(written).await?;
        info!("Removed {} coins", deleted);
        Ok(deleted)
    }

    pub async fn update_coin(&self, filter: &Filter, patch: Document) -> Result<UpdateOutcome> {
        let written = self.store.update_one(COINS_COLLECTION, filter, patch).await;
        self.settle(written).await
    }
}

#[async_trait]
impl CoinSource for CoinRepository {
    async fn fetch_coins(&self) -> Result<Vec<Coin>> {
        Ok(self.get_coins().as_ref().clone())
    }
}
