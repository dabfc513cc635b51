// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! CoinMarketCap Pro API client.
//!
//! Every request draws a key from the shared [`KeyPool`]. When the pool is
//! exhausted the request is sent without the key header and the provider's
//! rejection is surfaced as-is.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use super::key_pool::KeyPool;
use super::types::{ApiEnvelope, HistoricalQuery, IdentifierEntry};

pub const DEFAULT_API_BASE_URL: &str = "https://pro-api.coinmarketcap.com";
const API_KEY_HEADER: &str = "X-CMC_PRO_API_KEY";

/// Default number of OHLCV periods requested.
pub const DEFAULT_OHLCV_COUNT: u32 = 20;

#[derive(Debug, thiserror::Error)]
pub enum MarketDataError {
    #[error("Market data request failed: {0}")]
    Request(String),

    #[error("Market data provider rate limited the request")]
    RateLimited,

    #[error("Market data provider returned {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("Market data response was invalid: {0}")]
    InvalidResponse(String),

    #[error("Market data response had no data: {0}")]
    MissingData(String),

    #[error("No quote for market data id {0}")]
    QuoteNotFound(u64),

    #[error("Search index error: {0}")]
    SearchIndex(#[from] tantivy::TantivyError),
}

/// Upstream market-data operations used by the quote gateway.
pub trait MarketDataProvider: Send + Sync {
    /// Full identifier map (`/v1/cryptocurrency/map`).
    fn id_map(
        &self,
    ) -> impl Future<Output = Result<ApiEnvelope<Vec<IdentifierEntry>>, MarketDataError>> + Send;

    /// Metadata for a token contract address.
    fn metadata_by_address(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<ApiEnvelope<Value>, MarketDataError>> + Send;

    /// Metadata for a batch of ids.
    fn metadata_batch(
        &self,
        ids: &[u64],
    ) -> impl Future<Output = Result<ApiEnvelope<Value>, MarketDataError>> + Send;

    /// Latest USD quote for one id.
    fn latest_quotes(
        &self,
        id: u64,
    ) -> impl Future<Output = Result<ApiEnvelope<Value>, MarketDataError>> + Send;

    /// Historical quotes for one id and time range.
    fn historical_quotes(
        &self,
        query: &HistoricalQuery,
    ) -> impl Future<Output = Result<ApiEnvelope<Value>, MarketDataError>> + Send;

    /// OHLCV candles for one id.
    fn ohlcv(
        &self,
        id: u64,
        count: u32,
    ) -> impl Future<Output = Result<ApiEnvelope<Value>, MarketDataError>> + Send;
}

#[derive(Debug, Clone)]
pub struct CmcClient {
    base_url: String,
    keys: Arc<KeyPool>,
    http: Client,
}

impl CmcClient {
    pub fn new(base_url: impl Into<String>, keys: Arc<KeyPool>) -> Result<Self, MarketDataError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| MarketDataError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into(),
            keys,
            http,
        })
    }

    pub fn key_pool(&self) -> &Arc<KeyPool> {
        &self.keys
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<ApiEnvelope<T>, MarketDataError> {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), path);
        let mut request = self
            .http
            .get(&url)
            .query(query)
            .header("Accept", "application/json");

        match self.keys.acquire() {
            Some(key) => request = request.header(API_KEY_HEADER, key),
            None => warn!(path, "No market data key available, sending request without one"),
        }

        let response = request
            .send()
            .await
            .map_err(|e| MarketDataError::Request(format!("GET {path} failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(MarketDataError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MarketDataError::Rejected {
                status: status.as_u16(),
                message: body,
            });
        }

        debug!(path, "Market data request succeeded");
        response
            .json()
            .await
            .map_err(|e| MarketDataError::InvalidResponse(format!("GET {path} invalid JSON: {e}")))
    }
}

impl MarketDataProvider for CmcClient {
    async fn id_map(&self) -> Result<ApiEnvelope<Vec<IdentifierEntry>>, MarketDataError> {
        self.get_json("/v1/cryptocurrency/map", &[]).await
    }

    async fn metadata_by_address(
        &self,
        address: &str,
    ) -> Result<ApiEnvelope<Value>, MarketDataError> {
        self.get_json("/v2/cryptocurrency/info", &[("address", address.to_string())])
            .await
    }

    async fn metadata_batch(&self, ids: &[u64]) -> Result<ApiEnvelope<Value>, MarketDataError> {
        let id_list = ids
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(",");
        self.get_json("/v2/cryptocurrency/info", &[("id", id_list)])
            .await
    }

    async fn latest_quotes(&self, id: u64) -> Result<ApiEnvelope<Value>, MarketDataError> {
        self.get_json("/v2/cryptocurrency/quotes/latest", &[("id", id.to_string())])
            .await
    }

    async fn historical_quotes(
        &self,
        query: &HistoricalQuery,
    ) -> Result<ApiEnvelope<Value>, MarketDataError> {
        self.get_json("/v3/cryptocurrency/quotes/historical", &query.to_params())
            .await
    }

    async fn ohlcv(&self, id: u64, count: u32) -> Result<ApiEnvelope<Value>, MarketDataError> {
        self.get_json(
            "/v2/cryptocurrency/ohlcv/historical",
            &[("id", id.to_string()), ("count", count.to_string())],
        )
        .await
    }
}
