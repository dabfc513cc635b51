// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Vault balances and deposit addresses.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    custody::{CustodyPlatform, DepositAddress, VaultAccount},
    error::{ApiError, PipelineError},
    state::AppState,
};

#[derive(Debug, Deserialize, IntoParams)]
pub struct DepositAddressQuery {
    /// Custody asset id (e.g. `ETH`)
    pub asset_id: String,
}

/// Current asset balances of a vault.
#[utoipa::path(
    get,
    path = "/v1/vaults/{vault_id}/balances",
    tag = "Vaults",
    params(
        ("vault_id" = String, Path, description = "Custody vault ID")
    ),
    responses(
        (status = 200, description = "Vault with balances", body = VaultAccount),
        (status = 400, description = "Invalid vault id"),
        (status = 503, description = "Custody platform unavailable")
    )
)]
pub async fn get_balances(
    State(state): State<AppState>,
    Path(vault_id): Path<String>,
) -> Result<Json<VaultAccount>, ApiError> {
    let account = state
        .custody
        .get_vault_account(&vault_id)
        .await
        .map_err(PipelineError::from)?;
    Ok(Json(account))
}

/// Deposit addresses of one asset in a vault.
#[utoipa::path(
    get,
    path = "/v1/vaults/{vault_id}/deposit-addresses",
    tag = "Vaults",
    params(
        ("vault_id" = String, Path, description = "Custody vault ID"),
        DepositAddressQuery
    ),
    responses(
        (status = 200, description = "Deposit addresses", body = [DepositAddress]),
        (status = 400, description = "Invalid vault or asset id"),
        (status = 422, description = "Unsupported asset"),
        (status = 503, description = "Custody platform unavailable")
    )
)]
pub async fn get_deposit_addresses(
    State(state): State<AppState>,
    Path(vault_id): Path<String>,
    Query(params): Query<DepositAddressQuery>,
) -> Result<Json<Vec<DepositAddress>>, ApiError> {
    let asset = state.assets.resolve(&params.asset_id)?;
    let addresses = state
        .custody
        .deposit_addresses(&vault_id, asset.id)
        .await
        .map_err(PipelineError::from)?;
    Ok(Json(addresses))
}
