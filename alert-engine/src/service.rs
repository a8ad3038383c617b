//! Boundary operations over alert rules, anchor points and coins.
//!
//! Every public method returns an [`OperationResult`]; nothing here panics or
//! propagates an error to the caller. Input is validated before any store
//! access.

use alert_core::{
    feed::CoinSource,
    ingest::{create_alerts, find_corrupted_symbols},
    model::{AlertBase, AlertRule, AnchorPoint, Coin, RuleRecord, VwapAlertRule},
    outcome::{
        AnchorSave, BatchReport, MoveReport, OperationResult, RemovalReport, UpdateOutcome,
    },
    report::ErrorReporter,
    AlertError, Collection, Result,
};
use alert_store::{
    anchor::AnchorPointRepository, coin::CoinRepository, repository::AlertRepository, Document,
    Filter, STORAGE_ID_FIELD,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, sync::Arc};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Rules removed by a triggered-collection cleanup, per rule type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    pub alerts: u64,
    pub vwap_alerts: u64,
}

#[derive(Debug)]
pub struct AlertService {
    alerts: Arc<AlertRepository<AlertRule>>,
    vwap_alerts: Arc<AlertRepository<VwapAlertRule>>,
    coins: Arc<CoinRepository>,
    coin_source: Arc<dyn CoinSource>,
    anchors: AnchorPointRepository,
    reporter: Arc<dyn ErrorReporter>,
}

fn parse_collection(name: &str) -> Result<Collection> {
    name.trim().parse()
}

fn validate_ids(ids: &[String]) -> Result<()> {
    if ids.is_empty() {
        return Err(AlertError::Validation("No ids provided".to_string()));
    }
    if ids.iter().any(|id| id.trim().is_empty()) {
        return Err(AlertError::Validation("Ids must not be blank".to_string()));
    }
    Ok(())
}

fn validate_symbol(symbol: &str) -> Result<()> {
    if symbol.trim().is_empty() {
        return Err(AlertError::Validation("Missing symbol".to_string()));
    }
    Ok(())
}

fn validate_patch(patch: &Document) -> Result<()> {
    if patch.is_empty() {
        return Err(AlertError::Validation("Empty update".to_string()));
    }
    if patch.contains_key("id") || patch.contains_key(STORAGE_ID_FIELD) {
        return Err(AlertError::Validation(
            "Update may not rewrite the record id".to_string(),
        ));
    }
    Ok(())
}

macro_rules! check {
    ($validation:expr, $message:expr) => {
        if let Err(e) = $validation {
            warn!("{}: {}", $message, e);
            return OperationResult::failure($message, e);
        }
    };
}

impl AlertService {
    pub fn new(
        alerts: Arc<AlertRepository<AlertRule>>,
        vwap_alerts: Arc<AlertRepository<VwapAlertRule>>,
        coins: Arc<CoinRepository>,
        coin_source: Arc<dyn CoinSource>,
        anchors: AnchorPointRepository,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Self {
        Self {
            alerts,
            vwap_alerts,
            coins,
            coin_source,
            anchors,
            reporter,
        }
    }

    pub fn alerts(&self) -> &Arc<AlertRepository<AlertRule>> {
        &self.alerts
    }

    pub fn vwap_alerts(&self) -> &Arc<AlertRepository<VwapAlertRule>> {
        &self.vwap_alerts
    }

    /// Logs the failure, sends it to the report channel and wraps it.
    async fn fail<T>(&self, scope: &str, message: &str, e: AlertError) -> OperationResult<T> {
        error!("{}: {}", message, e);
        self.reporter.report(scope, &e.to_string()).await;
        OperationResult::failure(message, e)
    }

    // Plain price alerts

    pub async fn get_alerts(&self, collection: &str) -> OperationResult<Vec<AlertRule>> {
        get_in(&self.alerts, collection)
    }

    pub async fn add_alert(&self, collection: &str, rule: AlertRule) -> OperationResult<AlertRule> {
        check!(validate_symbol(&rule.symbol), "Invalid alert.");
        let rule = AlertRule {
            id: if rule.id.trim().is_empty() {
                Uuid::new_v4().to_string()
            } else {
                rule.id
            },
            storage_id: None,
            creation_time: rule.creation_time.or(Some(Utc::now().timestamp_millis())),
            ..rule
        };
        self.add_in(&self.alerts, "addAlert", collection, rule).await
    }

    /// Validates a batch against the coin reference set and existing names,
    /// then inserts all of it or none of it.
    pub async fn add_alerts_batch(
        &self,
        collection: &str,
        bases: Vec<AlertBase>,
    ) -> OperationResult<BatchReport> {
        let target = match parse_collection(collection) {
            Ok(target) => target,
            Err(e) => return OperationResult::failure("Invalid collection.", e),
        };
        if bases.is_empty() {
            return OperationResult::failure(
                "Invalid batch.",
                AlertError::Validation("No alerts provided".to_string()),
            );
        }

        let coins = match self.coin_source.fetch_coins().await {
            Ok(coins) => coins,
            Err(e) => return self.fail("addAlertsBatch", "Failed to fetch coins.", e).await,
        };

        let names: Vec<String> = bases.iter().map(|base| base.alert_name.clone()).collect();
        let duplicated_alert_names = match self
            .alerts
            .find_duplicate_alert_names(&names, Collection::Working)
            .await
        {
            Ok(duplicates) => duplicates,
            Err(e) => {
                return self
                    .fail("addAlertsBatch", "Failed to check for duplicate alert names.", e)
                    .await
            }
        };
        let corrupted_symbols = find_corrupted_symbols(&bases, &coins);

        if !duplicated_alert_names.is_empty() || !corrupted_symbols.is_empty() {
            warn!(
                duplicates = duplicated_alert_names.len(),
                corrupted = corrupted_symbols.len(),
                "Alert batch rejected"
            );
            return OperationResult::rejected(
                "Batch rejected: duplicated alert names or corrupted symbols.",
                BatchReport {
                    alerts: Vec::new(),
                    duplicated_alert_names,
                    corrupted_symbols,
                    unmatched_symbols: Vec::new(),
                },
            );
        }

        let created = create_alerts(&bases, &coins, Utc::now());
        if let Err(e) = self.alerts.add_many_alerts(target, &created.alerts).await {
            return self.fail("addAlertsBatch", "Failed to add alerts.", e).await;
        }

        info!("Batch of {} alerts added to {}", created.alerts.len(), target);
        let report = BatchReport {
            alerts: created.alerts,
            duplicated_alert_names: Vec::new(),
            corrupted_symbols: Vec::new(),
            unmatched_symbols: created.unmatched,
        };
        if report.unmatched_symbols.is_empty() {
            OperationResult::success("Alerts added.", report)
        } else {
            OperationResult::partial("Some alerts had no matching coin.", report)
        }
    }

    pub async fn update_alert(
        &self,
        collection: &str,
        filter: Document,
        patch: Document,
    ) -> OperationResult<UpdateOutcome> {
        self.update_in(&self.alerts, "updateAlert", collection, filter, patch)
            .await
    }

    pub async fn delete_many(
        &self,
        collection: &str,
        ids: &[String],
    ) -> OperationResult<RemovalReport> {
        self.delete_many_in(&self.alerts, "deleteMany", collection, ids)
            .await
    }

    pub async fn move_many(
        &self,
        source: &str,
        target: &str,
        ids: &[String],
    ) -> OperationResult<MoveReport> {
        self.move_many_in(&self.alerts, "moveMany", source, target, ids)
            .await
    }

    pub async fn fetch_by_symbol(
        &self,
        collection: &str,
        symbol: &str,
    ) -> OperationResult<Vec<AlertRule>> {
        self.fetch_by_symbol_in(&self.alerts, "fetchAlertsBySymbol", collection, symbol)
            .await
    }

    /// Without a price, removes every price alert of the symbol.
    pub async fn delete_by_symbol_and_price(
        &self,
        collection: &str,
        symbol: &str,
        price: Option<f64>,
    ) -> OperationResult<u64> {
        check!(validate_symbol(symbol), "Invalid symbol.");
        let filter = match price {
            Some(price) => Filter::eq("symbol", symbol).and_eq("price", price),
            None => Filter::eq("symbol", symbol).and_exists("price"),
        };
        self.delete_by_filter_in(&self.alerts, "deleteBySymbolAndPrice", collection, filter)
            .await
    }

    // VWAP alerts

    pub async fn get_vwap_alerts(&self, collection: &str) -> OperationResult<Vec<VwapAlertRule>> {
        get_in(&self.vwap_alerts, collection)
    }

    pub async fn add_vwap_alert(
        &self,
        collection: &str,
        rule: VwapAlertRule,
    ) -> OperationResult<VwapAlertRule> {
        check!(validate_symbol(&rule.symbol), "Invalid VWAP alert.");
        let rule = VwapAlertRule {
            id: if rule.id.trim().is_empty() {
                Uuid::new_v4().to_string()
            } else {
                rule.id
            },
            storage_id: None,
            creation_time: rule.creation_time.or(Some(Utc::now().timestamp_millis())),
            ..rule
        };
        self.add_in(&self.vwap_alerts, "addVwapAlert", collection, rule)
            .await
    }

    pub async fn update_vwap_alert(
        &self,
        collection: &str,
        filter: Document,
        patch: Document,
    ) -> OperationResult<UpdateOutcome> {
        self.update_in(&self.vwap_alerts, "updateVwapAlert", collection, filter, patch)
            .await
    }

    pub async fn delete_many_vwap(
        &self,
        collection: &str,
        ids: &[String],
    ) -> OperationResult<RemovalReport> {
        self.delete_many_in(&self.vwap_alerts, "deleteManyVwap", collection, ids)
            .await
    }

    pub async fn move_many_vwap(
        &self,
        source: &str,
        target: &str,
        ids: &[String],
    ) -> OperationResult<MoveReport> {
        self.move_many_in(&self.vwap_alerts, "moveManyVwap", source, target, ids)
            .await
    }

    pub async fn fetch_vwap_by_symbol(
        &self,
        collection: &str,
        symbol: &str,
    ) -> OperationResult<Vec<VwapAlertRule>> {
        self.fetch_by_symbol_in(&self.vwap_alerts, "fetchVwapAlertsBySymbol", collection, symbol)
            .await
    }

    /// Without an open time, removes every VWAP alert of the symbol.
    pub async fn delete_by_symbol_and_open_time(
        &self,
        collection: &str,
        symbol: &str,
        open_time: Option<i64>,
    ) -> OperationResult<u64> {
        check!(validate_symbol(symbol), "Invalid symbol.");
        let mut filter = Filter::eq("symbol", symbol);
        if let Some(open_time) = open_time {
            filter = filter.and_eq("anchorTime", open_time);
        }
        self.delete_by_filter_in(
            &self.vwap_alerts,
            "deleteBySymbolAndOpenTime",
            collection,
            filter,
        )
        .await
    }

    // Anchor points

    pub async fn save_anchor_point(&self, symbol: &str, open_time: i64) -> OperationResult<AnchorSave> {
        check!(validate_symbol(symbol), "Invalid anchor point.");
        match self.anchors.save(symbol, open_time).await {
            Ok(AnchorSave::Created) => OperationResult::success("Anchor point saved.", AnchorSave::Created),
            Ok(AnchorSave::AlreadyExists) => OperationResult::success(
                "Anchor point already exists.",
                AnchorSave::AlreadyExists,
            ),
            Err(e) => self.fail("saveAnchorPoint", "Failed to save anchor point.", e).await,
        }
    }

    pub async fn anchor_points(&self, symbol: &str) -> OperationResult<Vec<AnchorPoint>> {
        check!(validate_symbol(symbol), "Invalid symbol.");
        match self.anchors.list(symbol).await {
            Ok(points) => OperationResult::success("Anchor points fetched.", points),
            Err(e) => self.fail("anchorPoints", "Failed to fetch anchor points.", e).await,
        }
    }

    pub async fn remove_anchor_points(
        &self,
        symbol: &str,
        anchor_time: Option<i64>,
    ) -> OperationResult<u64> {
        check!(validate_symbol(symbol), "Invalid symbol.");
        match self.anchors.remove(symbol, anchor_time).await {
            Ok(deleted) => OperationResult::success("Anchor points removed.", deleted),
            Err(e) => {
                self.fail("removeAnchorPoints", "Failed to remove anchor points.", e)
                    .await
            }
        }
    }

    // Coins

    pub async fn coins(&self) -> OperationResult<Vec<Coin>> {
        OperationResult::success("Coins fetched.", self.coins.get_coins().as_ref().clone())
    }

    /// Rejects the whole set when a symbol is blank, repeated or already known.
    pub async fn add_coins(&self, coins: Vec<Coin>) -> OperationResult<Vec<String>> {
        if coins.is_empty() {
            return OperationResult::failure(
                "Invalid coins.",
                AlertError::Validation("No coins provided".to_string()),
            );
        }
        check!(
            coins.iter().try_for_each(|coin| validate_symbol(&coin.symbol)),
            "Invalid coins."
        );

        let existing = self.coins.get_coins();
        let mut seen: HashSet<&str> = existing.iter().map(|c| c.symbol.as_str()).collect();
        let conflicts: Vec<String> = coins
            .iter()
            .filter(|coin| !seen.insert(coin.symbol.as_str()))
            .map(|coin| coin.symbol.clone())
            .collect();
        if !conflicts.is_empty() {
            return OperationResult::rejected("Coins already exist.", conflicts);
        }

        match self.coins.add_many_coins(&coins).await {
            Ok(_) => OperationResult::success(
                "Coins added.",
                coins.into_iter().map(|coin| coin.symbol).collect(),
            ),
            Err(e) => self.fail("addCoins", "Failed to add coins.", e).await,
        }
    }

    pub async fn remove_coins(&self, symbols: &[String]) -> OperationResult<u64> {
        check!(validate_ids(symbols), "Invalid symbols.");
        match self.coins.remove_coins(symbols).await {
            Ok(deleted) => OperationResult::success("Coins removed.", deleted),
            Err(e) => self.fail("removeCoins", "Failed to remove coins.", e).await,
        }
    }

    pub async fn update_coin(&self, symbol: &str, patch: Document) -> OperationResult<UpdateOutcome> {
        check!(validate_symbol(symbol), "Invalid symbol.");
        check!(validate_patch(&patch), "Invalid update.");
        if patch.contains_key("symbol") {
            return OperationResult::failure(
                "Invalid update.",
                AlertError::Validation("Update may not rewrite the coin symbol".to_string()),
            );
        }
        match self.coins.update_coin(&Filter::eq("symbol", symbol), patch).await {
            Ok(outcome) if outcome.matched_count == 0 => {
                OperationResult::rejected("Coin not found.", outcome)
            }
            Ok(outcome) => OperationResult::success("Coin updated.", outcome),
            Err(e) => self.fail("updateCoin", "Failed to update coin.", e).await,
        }
    }

    // Maintenance

    /// Keeps the latest triggered copy per rule in both rule types. Both
    /// sweeps run even when the first fails.
    pub async fn clean_triggered_alerts(&self) -> OperationResult<CleanupReport> {
        let alerts = self.alerts.clean_triggered().await;
        let vwap_alerts = self.vwap_alerts.clean_triggered().await;

        match (alerts, vwap_alerts) {
            (Ok(alerts), Ok(vwap_alerts)) => {
                info!(alerts, vwap_alerts, "Triggered alerts cleaned");
                OperationResult::success(
                    "Triggered alerts cleaned.",
                    CleanupReport { alerts, vwap_alerts },
                )
            }
            (Err(e), _) | (_, Err(e)) => {
                self.fail("cleanTriggeredAlerts", "Failed to clean triggered alerts.", e)
                    .await
            }
        }
    }

    // Shared by both rule types

    async fn add_in<R: RuleRecord>(
        &self,
        repository: &AlertRepository<R>,
        scope: &str,
        collection: &str,
        rule: R,
    ) -> OperationResult<R> {
        let collection = match parse_collection(collection) {
            Ok(collection) => collection,
            Err(e) => return OperationResult::failure("Invalid collection.", e),
        };
        match repository.add_alert(collection, &rule).await {
            Ok(()) => OperationResult::success("Alert added.", rule),
            Err(e) => self.fail(scope, "Failed to add alert.", e).await,
        }
    }

    async fn update_in<R: RuleRecord>(
        &self,
        repository: &AlertRepository<R>,
        scope: &str,
        collection: &str,
        filter: Document,
        patch: Document,
    ) -> OperationResult<UpdateOutcome> {
        let collection = match parse_collection(collection) {
            Ok(collection) => collection,
            Err(e) => return OperationResult::failure("Invalid collection.", e),
        };
        let filter = Filter::from_document(filter);
        if filter.is_empty() {
            return OperationResult::failure(
                "Invalid filter.",
                AlertError::Validation("Empty filter".to_string()),
            );
        }
        check!(validate_patch(&patch), "Invalid update.");

        match repository.update_alert(collection, &filter, patch).await {
            Ok(outcome) if outcome.matched_count == 0 => {
                OperationResult::rejected("No alert matched the filter.", outcome)
            }
            Ok(outcome) => OperationResult::success("Alert updated.", outcome),
            Err(e) => self.fail(scope, "Failed to update alert.", e).await,
        }
    }

    async fn delete_many_in<R: RuleRecord>(
        &self,
        repository: &AlertRepository<R>,
        scope: &str,
        collection: &str,
        ids: &[String],
    ) -> OperationResult<RemovalReport> {
        let collection = match parse_collection(collection) {
            Ok(collection) => collection,
            Err(e) => return OperationResult::failure("Invalid collection.", e),
        };
        check!(validate_ids(ids), "Invalid ids.");

        match repository.remove_alerts(collection, ids).await {
            Ok(report) if report.is_complete() => {
                OperationResult::success("Alerts deleted.", report)
            }
            Ok(report) if report.deleted > 0 => {
                OperationResult::partial("Not all requested alerts were deleted.", report)
            }
            Ok(report) => OperationResult::rejected("None of the requested alerts exist.", report),
            Err(e) => self.fail(scope, "Failed to delete alerts.", e).await,
        }
    }

    async fn delete_by_filter_in<R: RuleRecord>(
        &self,
        repository: &AlertRepository<R>,
        scope: &str,
        collection: &str,
        filter: Filter,
    ) -> OperationResult<u64> {
        let collection = match parse_collection(collection) {
            Ok(collection) => collection,
            Err(e) => return OperationResult::failure("Invalid collection.", e),
        };
        match repository.remove_by_filter(collection, &filter).await {
            Ok(deleted) => OperationResult::success("Alerts deleted.", deleted),
            Err(e) => self.fail(scope, "Failed to delete alerts.", e).await,
        }
    }

    /// Copies the rules into `target` and only then removes them from
    /// `source`. A failed insert leaves `source` untouched.
    async fn move_many_in<R: RuleRecord>(
        &self,
        repository: &AlertRepository<R>,
        scope: &str,
        source: &str,
        target: &str,
        ids: &[String],
    ) -> OperationResult<MoveReport> {
        let (source, target) = match (parse_collection(source), parse_collection(target)) {
            (Ok(source), Ok(target)) => (source, target),
            (Err(e), _) | (_, Err(e)) => return OperationResult::failure("Invalid collection.", e),
        };
        if source == target {
            return OperationResult::failure(
                "Invalid collection.",
                AlertError::Validation("Source and target collections are the same".to_string()),
            );
        }
        check!(validate_ids(ids), "Invalid ids.");

        let rules = match repository.find_by_ids(source, ids).await {
            Ok(rules) => rules,
            Err(e) => return self.fail(scope, "Failed to read alerts to move.", e).await,
        };
        let found: HashSet<&str> = rules.iter().map(|rule| rule.id()).collect();
        let missing: Vec<String> = ids
            .iter()
            .filter(|id| !found.contains(id.as_str()))
            .cloned()
            .collect();

        if rules.is_empty() {
            warn!("No matching alerts found for moving from {}", source);
            return OperationResult::rejected(
                "No matching alerts found for moving.",
                MoveReport {
                    missing,
                    ..MoveReport::default()
                },
            );
        }

        if let Err(e) = repository.add_many_alerts(target, &rules).await {
            return self.fail(scope, "Failed to copy alerts to target.", e).await;
        }
        let moved_ids: Vec<String> = rules.iter().map(|rule| rule.id().to_string()).collect();
        let removal = match repository.remove_alerts(source, &moved_ids).await {
            Ok(removal) => removal,
            Err(e) => {
                return self
                    .fail(scope, "Alerts copied but not removed from source.", e)
                    .await
            }
        };

        info!(
            "Moved {} alerts from {} to {}",
            rules.len(),
            source,
            target
        );
        let report = MoveReport {
            insert_count: rules.len(),
            delete_count: removal.deleted,
            missing,
        };
        if report.missing.is_empty() {
            OperationResult::success("Alerts moved.", report)
        } else {
            for id in &report.missing {
                warn!(id = %id, "Alert not found, not moved");
            }
            OperationResult::partial("Not all requested alerts were moved.", report)
        }
    }

    async fn fetch_by_symbol_in<R: RuleRecord>(
        &self,
        repository: &AlertRepository<R>,
        scope: &str,
        collection: &str,
        symbol: &str,
    ) -> OperationResult<Vec<R>> {
        let collection = match parse_collection(collection) {
            Ok(collection) => collection,
            Err(e) => return OperationResult::failure("Invalid collection.", e),
        };
        check!(validate_symbol(symbol), "Invalid symbol.");

        match repository.find_by_symbol(collection, symbol).await {
            Ok(rules) => OperationResult::success("Alerts fetched.", rules),
            Err(e) => self.fail(scope, "Failed to fetch alerts.", e).await,
        }
    }
}

fn get_in<R: RuleRecord>(
    repository: &AlertRepository<R>,
    collection: &str,
) -> OperationResult<Vec<R>> {
    match parse_collection(collection) {
        Ok(collection) => OperationResult::success(
            "Alerts fetched.",
            repository.get_alerts(collection).as_ref().clone(),
        ),
        Err(e) => OperationResult::failure("Invalid collection.", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{coin, price_rule, vwap_rule, Harness};
    use serde_json::{json, Value};

    fn document(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    fn base(symbol: &str, name: &str, price: f64) -> AlertBase {
        AlertBase {
            symbol: symbol.to_string(),
            alert_name: name.to_string(),
            action: "buy".to_string(),
            price,
            description: None,
            tv_screens_urls: Vec::new(),
        }
    }

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|id| id.to_string()).collect()
    }

    #[tokio::test]
    async fn test_batch_is_enriched_from_coins() {
        let harness = Harness::new().await;
        harness.seed_coins(&["BTCUSDT", "ETHUSDT"]).await;

        let result = harness
            .service()
            .add_alerts_batch(
                "working",
                vec![base("BTCUSDT", "btc top", 105.0), base("ETHUSDT", "eth low", 1_800.0)],
            )
            .await;

        assert!(result.success);
        assert!(!result.partial);
        let report = result.data.unwrap();
        assert_eq!(report.alerts.len(), 2);
        assert_eq!(report.alerts[0].exchanges, vec!["Binance"]);
        assert_eq!(report.alerts[0].category.as_deref(), Some("major"));
        assert_eq!(harness.alerts.get_alerts(Collection::Working).len(), 2);
    }

    #[tokio::test]
    async fn test_batch_with_unknown_symbol_inserts_nothing() {
        let harness = Harness::new().await;
        harness.seed_coins(&["BTCUSDT"]).await;

        let result = harness
            .service()
            .add_alerts_batch(
                "working",
                vec![base("BTCUSDT", "btc top", 105.0), base("FOOUSDT", "foo", 1.0)],
            )
            .await;

        assert!(!result.success);
        assert_eq!(result.data.unwrap().corrupted_symbols, vec!["FOOUSDT"]);
        assert!(harness.alerts.get_alerts(Collection::Working).is_empty());
    }

    #[tokio::test]
    async fn test_batch_with_existing_name_is_rejected() {
        let harness = Harness::new().await;
        harness.seed_coins(&["BTCUSDT"]).await;
        harness
            .alerts
            .add_alert(Collection::Working, &price_rule("btc top", "BTCUSDT", 100.0, true))
            .await
            .unwrap();

        let result = harness
            .service()
            .add_alerts_batch("working", vec![base("BTCUSDT", "btc top", 105.0)])
            .await;

        assert!(!result.success);
        let report = result.data.unwrap();
        assert_eq!(report.duplicated_alert_names, vec!["btc top"]);
        assert!(report.alerts.is_empty());
        assert_eq!(harness.alerts.get_alerts(Collection::Working).len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_input_never_reaches_the_store() {
        let harness = Harness::new().await;
        let service = harness.service();

        let result = service.get_alerts("bogus").await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("bogus"));

        assert!(!service.delete_many("working", &[]).await.success);
        assert!(!service.add_alerts_batch("working", Vec::new()).await.success);

        let result = service
            .update_alert(
                "working",
                document(json!({"id": "a"})),
                document(json!({"id": "b"})),
            )
            .await;
        assert!(!result.success);

        let result = service
            .update_alert("working", Document::new(), document(json!({"isActive": false})))
            .await;
        assert!(!result.success);
        assert!(harness.reported().is_empty());
    }

    #[tokio::test]
    async fn test_add_alert_assigns_id_and_creation_time() {
        let harness = Harness::new().await;
        let mut rule = price_rule("", "BTCUSDT", 100.0, true);
        rule.creation_time = None;

        let result = harness.service().add_alert("working", rule).await;

        let stored = result.data.unwrap();
        assert!(!stored.id.is_empty());
        assert!(stored.creation_time.is_some());
        assert_eq!(harness.alerts.get_alerts(Collection::Working)[0].id, stored.id);
    }

    #[tokio::test]
    async fn test_update_alert_by_filter() {
        let harness = Harness::new().await;
        harness
            .alerts
            .add_alert(Collection::Working, &price_rule("a", "BTCUSDT", 100.0, true))
            .await
            .unwrap();
        let service = harness.service();

        let result = service
            .update_alert(
                "working",
                document(json!({"id": "a"})),
                document(json!({"isActive": false})),
            )
            .await;
        assert!(result.success);
        assert!(!harness.alerts.get_alerts(Collection::Working)[0].is_active);

        let result = service
            .update_alert(
                "working",
                document(json!({"id": "missing"})),
                document(json!({"isActive": false})),
            )
            .await;
        assert!(!result.success);
        assert_eq!(result.data.unwrap().matched_count, 0);
    }

    #[tokio::test]
    async fn test_delete_many_reports_partial_removal() {
        let harness = Harness::new().await;
        harness
            .alerts
            .add_alert(Collection::Working, &price_rule("a", "BTCUSDT", 100.0, true))
            .await
            .unwrap();
        let service = harness.service();

        let result = service.delete_many("working", &ids(&["a", "b"])).await;
        assert!(result.is_partial());
        let report = result.data.unwrap();
        assert_eq!(report.deleted, 1);
        assert_eq!(report.missing, vec!["b"]);
        assert!(harness.alerts.get_alerts(Collection::Working).is_empty());

        let result = service.delete_many("working", &ids(&["a"])).await;
        assert!(!result.success);
        assert_eq!(result.data.unwrap().deleted, 0);
    }

    #[tokio::test]
    async fn test_move_many_copies_then_removes() {
        let harness = Harness::new().await;
        harness
            .alerts
            .add_many_alerts(
                Collection::Working,
                &[
                    price_rule("a", "BTCUSDT", 100.0, true),
                    price_rule("b", "ETHUSDT", 10.0, true),
                ],
            )
            .await
            .unwrap();
        let service = harness.service();

        let result = service
            .move_many("working", "archived", &ids(&["a", "zz"]))
            .await;

        assert!(result.is_partial());
        let report = result.data.unwrap();
        assert_eq!(report.insert_count, 1);
        assert_eq!(report.delete_count, 1);
        assert_eq!(report.missing, vec!["zz"]);
        let archived = harness.alerts.get_alerts(Collection::Archived);
        assert_eq!(archived.len(), 1);
        assert_eq!(archived[0].id, "a");
        assert_eq!(harness.alerts.get_alerts(Collection::Working).len(), 1);

        assert!(!service.move_many("working", "working", &ids(&["b"])).await.success);
        assert!(!service.move_many("working", "archived", &ids(&["zz"])).await.success);
    }

    #[tokio::test]
    async fn test_delete_by_symbol_and_price() {
        let harness = Harness::new().await;
        harness
            .alerts
            .add_many_alerts(
                Collection::Working,
                &[
                    price_rule("a", "BTCUSDT", 100.0, true),
                    price_rule("b", "BTCUSDT", 200.0, true),
                    price_rule("c", "ETHUSDT", 100.0, true),
                ],
            )
            .await
            .unwrap();
        let service = harness.service();

        let result = service
            .delete_by_symbol_and_price("working", "BTCUSDT", Some(100.0))
            .await;
        assert_eq!(result.data, Some(1));

        let result = service
            .delete_by_symbol_and_price("working", "BTCUSDT", None)
            .await;
        assert_eq!(result.data, Some(1));

        let left = harness.alerts.get_alerts(Collection::Working);
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].symbol, "ETHUSDT");
    }

    #[tokio::test]
    async fn test_vwap_operations() {
        let harness = Harness::new().await;
        let service = harness.service();
        for rule in [
            vwap_rule("v1", "BTCUSDT", 1_000),
            vwap_rule("v2", "BTCUSDT", 2_000),
            vwap_rule("v3", "ETHUSDT", 1_000),
        ] {
            assert!(service.add_vwap_alert("working", rule).await.success);
        }

        let btc = service.fetch_vwap_by_symbol("working", "BTCUSDT").await;
        assert_eq!(btc.data.unwrap().len(), 2);

        let result = service
            .delete_by_symbol_and_open_time("working", "BTCUSDT", Some(2_000))
            .await;
        assert_eq!(result.data, Some(1));

        let result = service
            .move_many_vwap("working", "archived", &ids(&["v1"]))
            .await;
        assert!(result.success);

        let result = service
            .delete_by_symbol_and_open_time("working", "ETHUSDT", None)
            .await;
        assert_eq!(result.data, Some(1));
        assert!(service.get_vwap_alerts("working").await.data.unwrap().is_empty());
        assert_eq!(service.get_vwap_alerts("archived").await.data.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_anchor_points() {
        let harness = Harness::new().await;
        let service = harness.service();

        let first = service.save_anchor_point("BTCUSDT", 1_000).await;
        let second = service.save_anchor_point("BTCUSDT", 1_000).await;
        assert_eq!(first.data, Some(AnchorSave::Created));
        assert_eq!(second.data, Some(AnchorSave::AlreadyExists));
        service.save_anchor_point("BTCUSDT", 2_000).await;

        let points = service.anchor_points("BTCUSDT").await.data.unwrap();
        assert_eq!(points.len(), 2);

        assert_eq!(
            service.remove_anchor_points("BTCUSDT", Some(1_000)).await.data,
            Some(1)
        );
        assert_eq!(
            service.remove_anchor_points("BTCUSDT", None).await.data,
            Some(1)
        );
        assert!(!service.save_anchor_point(" ", 1).await.success);
    }

    #[tokio::test]
    async fn test_coin_management() {
        let harness = Harness::new().await;
        harness.seed_coins(&["BTCUSDT"]).await;
        let service = harness.service();

        let result = service
            .add_coins(vec![coin("ETHUSDT"), coin("BTCUSDT")])
            .await;
        assert!(!result.success);
        assert_eq!(result.data.unwrap(), vec!["BTCUSDT"]);

        let result = service.add_coins(vec![coin("ETHUSDT")]).await;
        assert!(result.success);
        assert_eq!(service.coins().await.data.unwrap().len(), 2);

        let result = service
            .update_coin("ETHUSDT", document(json!({"category": "layer1"})))
            .await;
        assert!(result.success);
        assert!(service
            .coins()
            .await
            .data
            .unwrap()
            .iter()
            .any(|coin| coin.symbol == "ETHUSDT" && coin.category == "layer1"));

        let result = service
            .update_coin("ETHUSDT", document(json!({"symbol": "ETH"})))
            .await;
        assert!(!result.success);

        let result = service.remove_coins(&ids(&["ETHUSDT"])).await;
        assert_eq!(result.data, Some(1));
    }

    #[tokio::test]
    async fn test_clean_triggered_alerts_covers_both_rule_types() {
        let harness = Harness::new().await;
        let mut first = price_rule("t1", "BTCUSDT", 100.0, true);
        first.alert_name = "btc".to_string();
        first.activation_time = Some(1);
        let mut second = price_rule("t2", "BTCUSDT", 100.0, true);
        second.alert_name = "btc".to_string();
        second.activation_time = Some(2);
        harness
            .alerts
            .add_many_alerts(Collection::Triggered, &[first, second])
            .await
            .unwrap();

        let mut v1 = vwap_rule("v1", "BTCUSDT", 1_000);
        v1.activation_time = Some(5);
        let mut v2 = vwap_rule("v2", "BTCUSDT", 1_000);
        v2.activation_time = Some(3);
        harness
            .vwap_alerts
            .add_many_alerts(Collection::Triggered, &[v1, v2])
            .await
            .unwrap();

        let result = harness.service().clean_triggered_alerts().await;

        assert_eq!(
            result.data,
            Some(CleanupReport {
                alerts: 1,
                vwap_alerts: 1
            })
        );
        assert_eq!(harness.alerts.get_alerts(Collection::Triggered)[0].id, "t2");
        assert_eq!(harness.vwap_alerts.get_alerts(Collection::Triggered)[0].id, "v1");
    }

    #[tokio::test]
    async fn test_store_failure_is_reported() {
        let harness = Harness::new().await;
        harness.store.set_unavailable(true);

        let result = harness
            .service()
            .add_alert("working", price_rule("a", "BTCUSDT", 100.0, true))
            .await;

        assert!(!result.success);
        assert!(result.error.is_some());
        assert!(harness
            .reported()
            .iter()
            .any(|(scope, _)| scope == "addAlert"));
    }
}
