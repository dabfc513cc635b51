// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::Path, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{assets::transaction_explorer_url, error::ApiError};

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExplorerLink {
    pub chain_id: u64,
    pub tx_hash: String,
    /// Block explorer page of the transaction
    pub explorer_url: String,
}

/// Block explorer link for an on-chain transaction hash.
#[utoipa::path(
    get,
    path = "/v1/explorer/{chain_id}/tx/{tx_hash}",
    tag = "Transactions",
    params(
        ("chain_id" = u64, Path, description = "EVM chain id (1, 56, 137 or 43114)"),
        ("tx_hash" = String, Path, description = "Transaction hash")
    ),
    responses(
        (status = 200, description = "Explorer link", body = ExplorerLink),
        (status = 400, description = "Unsupported chain id")
    )
)]
pub async fn transaction_link(
    Path((chain_id, tx_hash)): Path<(u64, String)>,
) -> Result<Json<ExplorerLink>, ApiError> {
    let explorer_url = transaction_explorer_url(chain_id, &tx_hash)?;
    Ok(Json(ExplorerLink {
        chain_id,
        tx_hash,
        explorer_url,
    }))
}
