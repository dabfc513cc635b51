// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Withdrawal fee quotes, withdrawals and card payments.

use axum::{
    extract::{Path, State},
    Json,
};

use crate::{
    error::ApiError,
    state::AppState,
    withdrawal::{FeeQuote, SubmittedTransfer, WithdrawalRequest},
};

/// Quote the service and network fees of a withdrawal.
#[utoipa::path(
    post,
    path = "/v1/vaults/{vault_id}/withdrawals/fee",
    tag = "Withdrawals",
    params(
        ("vault_id" = String, Path, description = "Custody vault ID")
    ),
    request_body = WithdrawalRequest,
    responses(
        (status = 200, description = "Fee quote", body = FeeQuote),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "No price for the asset"),
        (status = 422, description = "Unsupported asset or refused by the custody platform"),
        (status = 503, description = "Upstream unavailable")
    )
)]
pub async fn quote_fee(
    State(state): State<AppState>,
    Path(vault_id): Path<String>,
    Json(request): Json<WithdrawalRequest>,
) -> Result<Json<FeeQuote>, ApiError> {
    let quote = state
        .withdrawals
        .quote_withdrawal_fee(&vault_id, &request)
        .await?;
    Ok(Json(quote))
}

/// Withdraw to an external address. The service fee is transferred first.
#[utoipa::path(
    post,
    path = "/v1/vaults/{vault_id}/withdrawals",
    tag = "Withdrawals",
    params(
        ("vault_id" = String, Path, description = "Custody vault ID")
    ),
    request_body = WithdrawalRequest,
    responses(
        (status = 200, description = "Principal transfer record"),
        (status = 400, description = "Invalid request"),
        (status = 422, description = "Unsupported asset or refused by the custody platform"),
        (
            status = 502,
            description = "Fee transferred but principal failed; recorded for reconciliation"
        ),
        (status = 503, description = "Upstream unavailable")
    )
)]
pub async fn submit_withdrawal(
    State(state): State<AppState>,
    Path(vault_id): Path<String>,
    Json(request): Json<WithdrawalRequest>,
) -> Result<Json<SubmittedTransfer>, ApiError> {
    let submitted = state
        .withdrawals
        .submit_external_withdrawal(&vault_id, &request)
        .await?;
    Ok(Json(submitted))
}

/// Single transfer with no service fee.
#[utoipa::path(
    post,
    path = "/v1/vaults/{vault_id}/payments",
    tag = "Withdrawals",
    params(
        ("vault_id" = String, Path, description = "Custody vault ID")
    ),
    request_body = WithdrawalRequest,
    responses(
        (status = 200, description = "Payment transfer record"),
        (status = 400, description = "Invalid request"),
        (status = 422, description = "Unsupported asset or refused by the custody platform"),
        (status = 503, description = "Upstream unavailable")
    )
)]
pub async fn submit_payment(
    State(state): State<AppState>,
    Path(vault_id): Path<String>,
    Json(request): Json<WithdrawalRequest>,
) -> Result<Json<SubmittedTransfer>, ApiError> {
    let submitted = state
        .withdrawals
        .submit_card_payment(&vault_id, &request)
        .await?;
    Ok(Json(submitted))
}
