// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use tracing::warn;
use utoipa::ToSchema;

use crate::state::AppState;

/// Health check response with individual component status.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Overall health status ("ok" or "degraded").
    pub status: String,
    pub checks: HealthChecks,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthChecks {
    /// Whether the service process is running.
    pub service: String,
    /// Reconciliation database readability.
    pub reconciliation_store: String,
    /// Partial withdrawals awaiting an operator, when the store is readable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unresolved_partial_withdrawals: Option<usize>,
}

/// Health check endpoint handler.
///
/// Returns 200 when the reconciliation store is readable, 503 otherwise.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Service is degraded", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let unresolved = match state.reconciliation.list_unresolved() {
        Ok(records) => Some(records.len()),
        Err(err) => {
            warn!(error = %err, "Reconciliation store unreadable");
            None
        }
    };
    let store_ok = unresolved.is_some();

    let response = HealthResponse {
        status: if store_ok { "ok" } else { "degraded" }.to_string(),
        checks: HealthChecks {
            service: "ok".to_string(),
            reconciliation_store: if store_ok { "ok" } else { "unavailable" }.to_string(),
            unresolved_partial_withdrawals: unresolved,
        },
    };

    let status = if store_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response))
}
