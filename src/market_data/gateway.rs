// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Quote Gateway
//!
//! Price and metadata lookups on top of a [`MarketDataProvider`], plus the
//! process-wide identifier-map cache and its search index.
//!
//! ## Identifier map
//!
//! The map is held as an immutable [`IdentifierMap`] snapshot behind an
//! `RwLock<Option<Arc<_>>>`. Readers clone the `Arc` and never see a partly
//! rebuilt index. A snapshot older than [`ID_MAP_MAX_AGE_MS`] is replaced on
//! the next access. Refreshes are serialised on a separate mutex and the
//! freshness check is repeated after acquiring it, so concurrent callers of
//! a stale map share one upstream fetch.
//!
//! ## Error policy
//!
//! Lookups that feed fee computation return `Result` and never swallow
//! errors. Only [`QuoteGateway::ohlcv`] and [`QuoteGateway::full_token_info`]
//! are best-effort: they go through [`best_effort`] and degrade to `{}`.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::try_join_all;
use serde_json::{Map, Value};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use super::client::{MarketDataError, MarketDataProvider, DEFAULT_OHLCV_COUNT};
use super::search::SearchIndex;
use super::types::{
    first_data_value, ApiStatus, GroupedQuotes, HistoricalQuery, IdentifierEntry, LatestQuote,
};
use crate::assets::AssetCatalog;
use crate::clock::Clock;

/// Maximum age of a served identifier map (1 hour).
pub const ID_MAP_MAX_AGE_MS: i64 = 3_600_000;

/// Maximum number of search hits expanded with metadata by `fetch_tokens`.
pub const SEARCH_LIMIT: usize = 10;

const SECONDS_PER_DAY: i64 = 86_400;

struct HistoricalRange {
    interval: &'static str,
    days: i64,
    count: u32,
}

const DAY_RANGE: HistoricalRange = HistoricalRange {
    interval: "5m",
    days: 1,
    count: 288,
};
const WEEK_RANGE: HistoricalRange = HistoricalRange {
    interval: "1h",
    days: 7,
    count: 168,
};
const MONTH_RANGE: HistoricalRange = HistoricalRange {
    interval: "6h",
    days: 30,
    count: 120,
};
const QUARTER_RANGE: HistoricalRange = HistoricalRange {
    interval: "1d",
    days: 90,
    count: 90,
};

/// One published identifier map with its search index.
#[derive(Debug)]
pub struct IdentifierMap {
    entries: Vec<IdentifierEntry>,
    by_id: HashMap<u64, usize>,
    index: SearchIndex,
    refreshed_at: chrono::DateTime<chrono::Utc>,
}

impl IdentifierMap {
    pub fn new(
        entries: Vec<IdentifierEntry>,
        refreshed_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<Self, MarketDataError> {
        let by_id = entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (entry.id, position))
            .collect();
        let index = SearchIndex::build(&entries)?;
        Ok(Self {
            entries,
            by_id,
            index,
            refreshed_at,
        })
    }

    pub fn entries(&self) -> &[IdentifierEntry] {
        &self.entries
    }

    pub fn get(&self, id: u64) -> Option<&IdentifierEntry> {
        self.by_id.get(&id).map(|&position| &self.entries[position])
    }

    pub fn refreshed_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.refreshed_at
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries matching `query`, in relevance order.
    pub fn search(&self, query: &str) -> Result<Vec<&IdentifierEntry>, MarketDataError> {
        Ok(self
            .index
            .search(query)?
            .into_iter()
            .filter_map(|hit| self.get(hit.reference))
            .collect())
    }
}

/// Await an informational lookup and degrade any failure to an empty object.
///
/// Financial paths must not call this.
pub async fn best_effort<F>(operation: &'static str, lookup: F) -> Value
where
    F: Future<Output = Result<Value, MarketDataError>>,
{
    match lookup.await {
        Ok(value) => value,
        Err(err) => {
            warn!(
                operation,
                error = %err,
                "Best-effort market data lookup failed, returning empty result"
            );
            Value::Object(Map::new())
        }
    }
}

/// Entry for `id` in a provider `data` object keyed by id.
fn entry_for(data: &Value, id: u64) -> Option<&Value> {
    match data.get(id.to_string())? {
        Value::Array(items) => items.first(),
        other => Some(other),
    }
}

pub struct QuoteGateway<P> {
    provider: P,
    clock: Arc<dyn Clock>,
    snapshot: RwLock<Option<Arc<IdentifierMap>>>,
    refresh: Mutex<()>,
}

impl<P: MarketDataProvider> QuoteGateway<P> {
    pub fn new(provider: P, clock: Arc<dyn Clock>) -> Self {
        Self {
            provider,
            clock,
            snapshot: RwLock::new(None),
            refresh: Mutex::new(()),
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    async fn fresh_snapshot(&self) -> Option<Arc<IdentifierMap>> {
        let now = self.clock.now();
        self.snapshot
            .read()
            .await
            .as_ref()
            .filter(|map| (now - map.refreshed_at).num_milliseconds() < ID_MAP_MAX_AGE_MS)
            .cloned()
    }

    /// Current identifier map, refreshed from upstream when stale.
    pub async fn identifier_map(&self) -> Result<Arc<IdentifierMap>, MarketDataError> {
        if let Some(map) = self.fresh_snapshot().await {
            return Ok(map);
        }

        let _refreshing = self.refresh.lock().await;
        if let Some(map) = self.fresh_snapshot().await {
            return Ok(map);
        }

        let envelope = self.provider.id_map().await?;
        let entries = envelope.data.ok_or_else(|| {
            let status = ApiStatus::describe(envelope.status.as_ref());
            error!(%status, "Identifier map response had no data");
            MarketDataError::MissingData(status)
        })?;

        let map = Arc::new(IdentifierMap::new(entries, self.clock.now())?);
        *self.snapshot.write().await = Some(map.clone());
        info!(entries = map.len(), "Identifier map refreshed");
        Ok(map)
    }

    /// Identifier-map entries matching `query`, in relevance order.
    pub async fn search_token(&self, query: &str) -> Result<Vec<IdentifierEntry>, MarketDataError> {
        let map = self.identifier_map().await?;
        Ok(map.search(query)?.into_iter().cloned().collect())
    }

    pub async fn latest_quote(&self, id: u64) -> Result<LatestQuote, MarketDataError> {
        let envelope = self.provider.latest_quotes(id).await?;
        let data = envelope.data.ok_or(MarketDataError::QuoteNotFound(id))?;
        let entry = entry_for(&data, id).ok_or(MarketDataError::QuoteNotFound(id))?;

        serde_json::from_value(entry.clone())
            .map_err(|e| MarketDataError::InvalidResponse(format!("quote for {id}: {e}")))
    }

    /// Latest USD price, failing with `QuoteNotFound` when unresolved.
    pub async fn latest_usd_price(&self, id: u64) -> Result<f64, MarketDataError> {
        self.latest_quote(id)
            .await?
            .usd_price()
            .ok_or(MarketDataError::QuoteNotFound(id))
    }

    async fn historical_range(
        &self,
        id: u64,
        range: &HistoricalRange,
        now: i64,
    ) -> Result<Value, MarketDataError> {
        let query = HistoricalQuery {
            id,
            interval: range.interval,
            time_start: now - range.days * SECONDS_PER_DAY,
            time_end: now,
            count: range.count,
        };
        let envelope = self.provider.historical_quotes(&query).await?;
        envelope
            .data
            .as_ref()
            .and_then(first_data_value)
            .cloned()
            .ok_or_else(|| {
                MarketDataError::MissingData(format!(
                    "historical quotes for {id} ({})",
                    range.interval
                ))
            })
    }

    /// 1d/7d/30d/90d quote series ending now, fetched one after another.
    pub async fn grouped_historical_quotes(
        &self,
        id: u64,
    ) -> Result<GroupedQuotes, MarketDataError> {
        let now = self.clock.now().timestamp();
        Ok(GroupedQuotes {
            day: self.historical_range(id, &DAY_RANGE, now).await?,
            week: self.historical_range(id, &WEEK_RANGE, now).await?,
            month: self.historical_range(id, &MONTH_RANGE, now).await?,
            quarter: self.historical_range(id, &QUARTER_RANGE, now).await?,
        })
    }

    /// OHLCV candles, or `{}` on any failure.
    pub async fn ohlcv(&self, id: u64) -> Value {
        best_effort("ohlcv", async {
            self.provider
                .ohlcv(id, DEFAULT_OHLCV_COUNT)
                .await?
                .data
                .ok_or_else(|| MarketDataError::MissingData(format!("ohlcv for {id}")))
        })
        .await
    }

    pub async fn metadata_batch(&self, ids: &[u64]) -> Result<Value, MarketDataError> {
        let envelope = self.provider.metadata_batch(ids).await?;
        envelope.data.ok_or_else(|| {
            let status = ApiStatus::describe(envelope.status.as_ref());
            error!(?ids, %status, "Metadata batch response had no data");
            MarketDataError::MissingData(status)
        })
    }

    /// Metadata for a contract address, `None` when the provider has none.
    pub async fn token_metadata(&self, address: &str) -> Result<Option<Value>, MarketDataError> {
        let envelope = self.provider.metadata_by_address(address).await?;
        match envelope.data {
            Some(data) => Ok(first_data_value(&data).cloned()),
            None => {
                warn!(
                    address,
                    status = %ApiStatus::describe(envelope.status.as_ref()),
                    "No metadata for token address"
                );
                Ok(None)
            }
        }
    }

    async fn try_full_token_info(&self, address: &str) -> Result<Value, MarketDataError> {
        let Some(metadata) = self.token_metadata(address).await? else {
            return Ok(Value::Object(Map::new()));
        };
        let Some(id) = metadata.get("id").and_then(Value::as_u64) else {
            return Ok(metadata);
        };

        debug!(address, id, "Fetching historical quotes for token");
        let quotes = self.grouped_historical_quotes(id).await?;
        let latest = self.latest_quote(id).await?;

        let mut merged = match metadata {
            Value::Object(fields) => fields,
            _ => Map::new(),
        };
        if let Value::Object(latest_fields) = serde_json::to_value(&latest)
            .map_err(|e| MarketDataError::InvalidResponse(e.to_string()))?
        {
            merged.extend(latest_fields);
        }
        merged.insert(
            "quotes".to_string(),
            serde_json::to_value(&quotes)
                .map_err(|e| MarketDataError::InvalidResponse(e.to_string()))?,
        );
        merged.insert("ohlcv".to_string(), self.ohlcv(id).await);

        Ok(Value::Object(merged))
    }

    /// Metadata, latest quote, historical series and OHLCV for a token
    /// address merged into one object. Best-effort: `{}` on failure.
    pub async fn full_token_info(&self, address: &str) -> Value {
        best_effort("full_token_info", self.try_full_token_info(address)).await
    }

    /// Search hits expanded with batch metadata and a `contract` field.
    pub async fn fetch_tokens(&self, query: &str) -> Result<Vec<Value>, MarketDataError> {
        let hits = self.search_token(query).await?;
        if hits.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<u64> = hits.iter().take(SEARCH_LIMIT).map(|entry| entry.id).collect();
        let metadata = self.metadata_batch(&ids).await?;

        Ok(ids
            .iter()
            .filter_map(|id| entry_for(&metadata, *id))
            .map(|token| {
                let mut token = token.clone();
                let contract = token
                    .pointer("/platform/token_address")
                    .cloned()
                    .unwrap_or(Value::Null);
                if let Value::Object(fields) = &mut token {
                    fields.insert("contract".to_string(), contract);
                }
                token
            })
            .collect())
    }

    /// Latest quotes for every asset in the catalog, fetched concurrently.
    pub async fn supported_token_prices(
        &self,
        catalog: &AssetCatalog,
    ) -> Result<Vec<LatestQuote>, MarketDataError> {
        let ids = catalog.market_data_ids();
        try_join_all(ids.iter().map(|id| self.latest_quote(*id))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::SUPPORTED_ASSETS;
    use crate::clock::ManualClock;
    use crate::market_data::types::ApiEnvelope;
    use chrono::{Duration, Utc};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeProvider {
        id_map_calls: AtomicUsize,
        historical_calls: AtomicUsize,
        metadata_calls: AtomicUsize,
        fail_historical_from: Option<usize>,
        fail_ohlcv: bool,
        prices: HashMap<u64, f64>,
    }

    fn envelope<T>(data: T) -> ApiEnvelope<T> {
        ApiEnvelope {
            status: None,
            data: Some(data),
        }
    }

    fn entry(id: u64, name: &str, symbol: &str) -> IdentifierEntry {
        IdentifierEntry {
            id,
            name: name.to_string(),
            symbol: symbol.to_string(),
            slug: name.to_lowercase(),
            rank: None,
            is_active: Some(1),
            platform: None,
        }
    }

    impl MarketDataProvider for FakeProvider {
        async fn id_map(&self) -> Result<ApiEnvelope<Vec<IdentifierEntry>>, MarketDataError> {
            self.id_map_calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            Ok(envelope(vec![
                entry(1, "Bitcoin", "BTC"),
                entry(1027, "Ethereum", "ETH"),
                entry(825, "Tether", "USDT"),
            ]))
        }

        async fn metadata_by_address(
            &self,
            address: &str,
        ) -> Result<ApiEnvelope<Value>, MarketDataError> {
            if address == "0xunknown" {
                return Ok(ApiEnvelope {
                    status: None,
                    data: None,
                });
            }
            Ok(envelope(json!({ "1027": { "id": 1027, "name": "Ethereum", "logo": "eth.png" } })))
        }

        async fn metadata_batch(&self, ids: &[u64]) -> Result<ApiEnvelope<Value>, MarketDataError> {
            self.metadata_calls.fetch_add(1, Ordering::SeqCst);
            let mut data = Map::new();
            for id in ids {
                data.insert(
                    id.to_string(),
                    json!({ "id": id, "platform": { "token_address": format!("0x{id}") } }),
                );
            }
            Ok(envelope(Value::Object(data)))
        }

        async fn latest_quotes(&self, id: u64) -> Result<ApiEnvelope<Value>, MarketDataError> {
            match self.prices.get(&id) {
                Some(price) => Ok(envelope(json!({
                    id.to_string(): {
                        "id": id,
                        "symbol": "X",
                        "quote": { "USD": { "price": price } }
                    }
                }))),
                None => Ok(envelope(json!({}))),
            }
        }

        async fn historical_quotes(
            &self,
            query: &HistoricalQuery,
        ) -> Result<ApiEnvelope<Value>, MarketDataError> {
            let call = self.historical_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_historical_from.is_some_and(|from| call >= from) {
                return Err(MarketDataError::Request("connection reset".into()));
            }
            Ok(envelope(json!({
                query.id.to_string(): {
                    "interval": query.interval,
                    "span": query.time_end - query.time_start,
                    "count": query.count
                }
            })))
        }

        async fn ohlcv(&self, id: u64, _count: u32) -> Result<ApiEnvelope<Value>, MarketDataError> {
            if self.fail_ohlcv {
                return Err(MarketDataError::RateLimited);
            }
            Ok(envelope(json!({ "id": id, "quotes": [] })))
        }
    }

    fn new_gateway(provider: FakeProvider) -> (QuoteGateway<FakeProvider>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        (QuoteGateway::new(provider, clock.clone()), clock)
    }

    #[tokio::test]
    async fn identifier_map_is_cached_for_an_hour() {
        let (gateway, clock) = new_gateway(FakeProvider::default());

        let first = gateway.identifier_map().await.unwrap();
        clock.advance(Duration::minutes(59));
        let second = gateway.identifier_map().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(gateway.provider().id_map_calls.load(Ordering::SeqCst), 1);

        clock.advance(Duration::minutes(2));
        let third = gateway.identifier_map().await.unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(gateway.provider().id_map_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn concurrent_refreshes_share_one_fetch() {
        let (gateway, _clock) = new_gateway(FakeProvider::default());

        let maps = futures::future::join_all((0..8).map(|_| gateway.identifier_map())).await;
        assert!(maps.iter().all(Result::is_ok));
        assert_eq!(gateway.provider().id_map_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn search_resolves_hits_to_entries() {
        let (gateway, _clock) = new_gateway(FakeProvider::default());
        let hits = gateway.search_token("ether").await.unwrap();
        assert_eq!(hits[0].id, 1027);
        assert_eq!(hits[0].symbol, "ETH");
    }

    #[tokio::test]
    async fn latest_quote_missing_entry_is_not_found() {
        let provider = FakeProvider {
            prices: HashMap::from([(1027, 3000.0)]),
            ..Default::default()
        };
        let (gateway, _clock) = new_gateway(provider);

        assert_eq!(gateway.latest_usd_price(1027).await.unwrap(), 3000.0);
        assert!(matches!(
            gateway.latest_quote(1).await,
            Err(MarketDataError::QuoteNotFound(1))
        ));
    }

    #[tokio::test]
    async fn grouped_quotes_cover_four_ranges() {
        let (gateway, _clock) = new_gateway(FakeProvider::default());
        let grouped = gateway.grouped_historical_quotes(1).await.unwrap();

        assert_eq!(grouped.day["interval"], "5m");
        assert_eq!(grouped.day["span"], 86_400);
        assert_eq!(grouped.week["count"], 168);
        assert_eq!(grouped.month["interval"], "6h");
        assert_eq!(grouped.quarter["span"], 90 * 86_400);
    }

    #[tokio::test]
    async fn grouped_quotes_abort_on_any_range_failure() {
        let provider = FakeProvider {
            fail_historical_from: Some(2),
            ..Default::default()
        };
        let (gateway, _clock) = new_gateway(provider);

        assert!(gateway.grouped_historical_quotes(1).await.is_err());
        assert_eq!(gateway.provider().historical_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn best_effort_paths_degrade_to_empty_object() {
        let provider = FakeProvider {
            fail_ohlcv: true,
            fail_historical_from: Some(0),
            ..Default::default()
        };
        let (gateway, _clock) = new_gateway(provider);

        assert_eq!(gateway.ohlcv(1).await, json!({}));
        assert_eq!(gateway.full_token_info("0xeth").await, json!({}));
    }

    #[tokio::test]
    async fn strict_paths_propagate_errors() {
        let provider = FakeProvider {
            fail_historical_from: Some(0),
            ..Default::default()
        };
        let (gateway, _clock) = new_gateway(provider);

        assert!(gateway.grouped_historical_quotes(1027).await.is_err());
        assert!(gateway.latest_usd_price(1027).await.is_err());
    }

    #[tokio::test]
    async fn full_token_info_merges_everything() {
        let provider = FakeProvider {
            prices: HashMap::from([(1027, 3000.0)]),
            ..Default::default()
        };
        let (gateway, _clock) = new_gateway(provider);

        let info = gateway.full_token_info("0xeth").await;
        assert_eq!(info["logo"], "eth.png");
        assert_eq!(info["quote"]["USD"]["price"], 3000.0);
        assert_eq!(info["quotes"]["7d"]["interval"], "1h");
        assert_eq!(info["ohlcv"]["id"], 1027);

        assert_eq!(gateway.full_token_info("0xunknown").await, json!({}));
    }

    #[tokio::test]
    async fn fetch_tokens_adds_contract_and_skips_empty_search() {
        let (gateway, _clock) = new_gateway(FakeProvider::default());

        let tokens = gateway.fetch_tokens("tether").await.unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0]["contract"], "0x825");

        assert!(gateway.fetch_tokens("dogecoin").await.unwrap().is_empty());
        assert_eq!(gateway.provider().metadata_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn supported_prices_fail_as_a_whole() {
        let catalog = AssetCatalog::new(SUPPORTED_ASSETS);
        let all_priced: HashMap<u64, f64> = catalog
            .market_data_ids()
            .into_iter()
            .map(|id| (id, 1.0))
            .collect();

        let (gateway, _clock) = new_gateway(FakeProvider {
            prices: all_priced.clone(),
            ..Default::default()
        });
        let quotes = gateway.supported_token_prices(&catalog).await.unwrap();
        assert_eq!(quotes.len(), catalog.market_data_ids().len());

        let mut missing_one = all_priced;
        missing_one.remove(&1);
        let (gateway, _clock) = new_gateway(FakeProvider {
            prices: missing_one,
            ..Default::default()
        });
        assert!(gateway.supported_token_prices(&catalog).await.is_err());
    }
}
