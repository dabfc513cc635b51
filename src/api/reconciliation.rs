// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Operator view of withdrawals whose fee leg went out without the principal.

use axum::{
    extract::{Path, State},
    Json,
};
use tracing::info;

use crate::{
    error::ApiError,
    state::AppState,
    storage::{PartialWithdrawalRecord, ReconciliationError},
};

fn store_error(err: ReconciliationError) -> ApiError {
    match err {
        ReconciliationError::NotFound(_) => ApiError::not_found("Record not found"),
        other => ApiError::internal(format!("Reconciliation store error: {other}")),
    }
}

/// Unresolved partial withdrawals, oldest first.
#[utoipa::path(
    get,
    path = "/v1/reconciliation/partial-withdrawals",
    tag = "Reconciliation",
    responses(
        (status = 200, description = "Unresolved records", body = [PartialWithdrawalRecord]),
        (status = 500, description = "Store unavailable")
    )
)]
pub async fn list_partial_withdrawals(
    State(state): State<AppState>,
) -> Result<Json<Vec<PartialWithdrawalRecord>>, ApiError> {
    let records = state.reconciliation.list_unresolved().map_err(store_error)?;
    Ok(Json(records))
}

/// Mark a partial withdrawal as handled. Repeating the call is harmless.
#[utoipa::path(
    post,
    path = "/v1/reconciliation/partial-withdrawals/{record_id}/resolve",
    tag = "Reconciliation",
    params(
        ("record_id" = String, Path, description = "Reconciliation record ID")
    ),
    responses(
        (status = 200, description = "Resolved record", body = PartialWithdrawalRecord),
        (status = 404, description = "Record not found")
    )
)]
pub async fn resolve_partial_withdrawal(
    State(state): State<AppState>,
    Path(record_id): Path<String>,
) -> Result<Json<PartialWithdrawalRecord>, ApiError> {
    let record = state
        .reconciliation
        .mark_resolved(&record_id)
        .map_err(store_error)?;
    info!(
        record_id = %record.record_id,
        fee_transfer_id = %record.fee_transfer_id,
        "Partial withdrawal resolved"
    );
    Ok(Json(record))
}
