// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Market-data pricing: rate-limited key pool, provider client, and the
//! caching quote gateway.

pub mod client;
pub mod gateway;
pub mod key_pool;
pub mod search;
pub mod types;

pub use client::{CmcClient, MarketDataError, MarketDataProvider, DEFAULT_API_BASE_URL};
pub use gateway::{best_effort, IdentifierMap, QuoteGateway, SEARCH_LIMIT};
pub use key_pool::{ApiKey, KeyPool, RATE_LIMIT, RESET_INTERVAL};
pub use search::{SearchHit, SearchIndex};
pub use types::{GroupedQuotes, IdentifierEntry, LatestQuote, TokenPlatform};
