// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::custody::CustodyError;
use crate::market_data::MarketDataError;

/// Failures of the pricing and withdrawal pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Network or provider failure. Not retried internally.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The requested asset was absent from a provider response.
    #[error("Quote not found for market data id {0}")]
    QuoteNotFound(String),

    #[error("Unsupported asset: {0}")]
    UnsupportedAsset(String),

    /// The upstream provider refused the call for rate reasons.
    #[error("Rate limited by upstream provider")]
    RateLimited,

    /// The service-fee transfer went out but the principal transfer did not.
    /// On-chain state now needs operator reconciliation.
    #[error(
        "Partial withdrawal failure: fee transfer {fee_transfer_id} submitted, \
         principal failed: {reason}"
    )]
    PartialWithdrawalFailure {
        fee_transfer_id: String,
        record_id: Option<String>,
        reason: String,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The custody platform refused the request itself (insufficient
    /// balance, unknown vault, policy). Retrying unchanged will not help.
    #[error("Rejected by custody platform: {0}")]
    CustodyRejected(String),
}

impl PipelineError {
    pub fn error_code(&self) -> &'static str {
        match self {
            PipelineError::UpstreamUnavailable(_) => "upstream_unavailable",
            PipelineError::QuoteNotFound(_) => "quote_not_found",
            PipelineError::UnsupportedAsset(_) => "unsupported_asset",
            PipelineError::RateLimited => "rate_limited",
            PipelineError::PartialWithdrawalFailure { .. } => "partial_withdrawal_failure",
            PipelineError::InvalidRequest(_) => "invalid_request",
            PipelineError::CustodyRejected(_) => "custody_rejected",
        }
    }
}

impl From<MarketDataError> for PipelineError {
    fn from(err: MarketDataError) -> Self {
        match err {
            MarketDataError::RateLimited => PipelineError::RateLimited,
            MarketDataError::QuoteNotFound(id) => PipelineError::QuoteNotFound(id.to_string()),
            other => PipelineError::UpstreamUnavailable(other.to_string()),
        }
    }
}

impl From<CustodyError> for PipelineError {
    fn from(err: CustodyError) -> Self {
        match err {
            CustodyError::Rejected { status: 429, .. } => PipelineError::RateLimited,
            // 401/403 mean our credentials are wrong, which the caller cannot fix.
            CustodyError::Rejected { status, message }
                if (400..500).contains(&status) && status != 401 && status != 403 =>
            {
                PipelineError::CustodyRejected(format!("{status}: {message}"))
            }
            err @ CustodyError::TransferRejected { .. } => {
                PipelineError::CustodyRejected(err.to_string())
            }
            CustodyError::InvalidArgument(message) => PipelineError::InvalidRequest(message),
            other => PipelineError::UpstreamUnavailable(other.to_string()),
        }
    }
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub error_code: &'static str,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    error_code: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            error_code: "error",
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    fn with_code(mut self, error_code: &'static str) -> Self {
        self.error_code = error_code;
        self
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        let status = match &err {
            PipelineError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            PipelineError::UnsupportedAsset(_) | PipelineError::CustodyRejected(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            PipelineError::QuoteNotFound(_) => StatusCode::NOT_FOUND,
            PipelineError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            PipelineError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            PipelineError::PartialWithdrawalFailure { .. } => StatusCode::BAD_GATEWAY,
        };
        ApiError::new(status, err.to_string()).with_code(err.error_code())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
            error_code: self.error_code.to_string(),
        });
        (self.status, body).into_response()
    }
}
