// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token search, prices and details from the market-data gateway.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use utoipa::IntoParams;

use crate::{
    error::{ApiError, PipelineError},
    market_data::LatestQuote,
    state::AppState,
};

#[derive(Debug, Deserialize, IntoParams)]
pub struct TokenSearchQuery {
    /// Free-text query over name, symbol and slug. A trailing `*` matches prefixes.
    pub query: String,
}

/// Search tokens and return their metadata, best match first.
#[utoipa::path(
    get,
    path = "/v1/tokens/search",
    tag = "Tokens",
    params(TokenSearchQuery),
    responses(
        (
            status = 200,
            description = "Metadata of up to 10 matching tokens, each with its `contract` address"
        ),
        (status = 429, description = "Market data rate limited"),
        (status = 503, description = "Market data unavailable")
    )
)]
pub async fn search_tokens(
    State(state): State<AppState>,
    Query(params): Query<TokenSearchQuery>,
) -> Result<Json<Vec<Value>>, ApiError> {
    let tokens = state
        .quotes
        .fetch_tokens(&params.query)
        .await
        .map_err(PipelineError::from)?;
    Ok(Json(tokens))
}

/// Latest quotes for every supported asset.
#[utoipa::path(
    get,
    path = "/v1/tokens/prices",
    tag = "Tokens",
    responses(
        (status = 200, description = "Latest quote per supported asset"),
        (status = 404, description = "A supported asset has no quote"),
        (status = 503, description = "Market data unavailable")
    )
)]
pub async fn token_prices(
    State(state): State<AppState>,
) -> Result<Json<Vec<LatestQuote>>, ApiError> {
    let quotes = state
        .quotes
        .supported_token_prices(&state.assets)
        .await
        .map_err(PipelineError::from)?;
    Ok(Json(quotes))
}

/// Metadata, latest quote, historical quotes and OHLCV for a contract.
///
/// Informational only: upstream failures yield an empty object.
#[utoipa::path(
    get,
    path = "/v1/tokens/{address}/info",
    tag = "Tokens",
    params(
        ("address" = String, Path, description = "Token contract address")
    ),
    responses(
        (status = 200, description = "Merged token details, `{}` when unavailable")
    )
)]
pub async fn token_info(State(state): State<AppState>, Path(address): Path<String>) -> Json<Value> {
    Json(state.quotes.full_token_info(&address).await)
}
