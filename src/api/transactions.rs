// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{error::ApiError, history::TransactionPage, state::AppState};

/// Query parameters for the transaction list.
#[derive(Debug, Deserialize, IntoParams)]
pub struct TransactionListQuery {
    /// Maximum number of results (default: 56). Values above 250 are
    /// clamped to 250, since each direction then fetches 500, the custody
    /// platform's per-request ceiling.
    #[param(maximum = 250)]
    pub limit: Option<u32>,
    /// Only transfers created before this time (epoch ms)
    pub before: Option<i64>,
    /// Only transfers created after this time (epoch ms)
    pub after: Option<i64>,
}

/// Sent and received transfers of a vault, newest first.
#[utoipa::path(
    get,
    path = "/v1/vaults/{vault_id}/transactions",
    tag = "Transactions",
    params(
        ("vault_id" = String, Path, description = "Custody vault ID"),
        TransactionListQuery
    ),
    responses(
        (status = 200, description = "Merged transaction page", body = TransactionPage),
        (status = 503, description = "Custody platform unavailable")
    )
)]
pub async fn list_transactions(
    State(state): State<AppState>,
    Path(vault_id): Path<String>,
    Query(params): Query<TransactionListQuery>,
) -> Result<Json<TransactionPage>, ApiError> {
    let page = state
        .history
        .list_transactions(&vault_id, params.limit, params.before, params.after)
        .await?;
    Ok(Json(page))
}
