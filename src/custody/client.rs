// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Fireblocks custody API client.
//!
//! Two credential sets are used. The signer submits and estimates transfers;
//! the viewer performs read-only queries.

use std::future::Future;
use std::time::Duration;

use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::form_urlencoded;

use super::signing::RequestSigner;
use super::types::{
    CreateTransferResponse, DepositAddress, DepositAddressPage, FeeEstimate, TransactionRecord,
    TransferQuery, TransferRequest, VaultAccount,
};

pub const DEFAULT_API_BASE_URL: &str = "https://api.fireblocks.io";

#[derive(Debug, thiserror::Error)]
pub enum CustodyError {
    #[error("Custody configuration invalid: {0}")]
    Config(String),

    #[error("Custody request signing failed: {0}")]
    Signing(String),

    #[error("Invalid custody request argument: {0}")]
    InvalidArgument(String),

    #[error("Custody request failed: {0}")]
    Request(String),

    #[error("Custody platform returned {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("Custody response was invalid: {0}")]
    InvalidResponse(String),

    #[error("Transfer {id} ended in status {status}")]
    TransferRejected { id: String, status: String },
}

/// Custody-platform operations used by the withdrawal and history pipeline.
pub trait CustodyPlatform: Send + Sync {
    /// Submit a vault transfer. The idempotency key, when given, makes
    /// resubmission of the same request a no-op on the platform.
    fn create_transfer(
        &self,
        request: &TransferRequest,
        idempotency_key: Option<&str>,
    ) -> impl Future<Output = Result<CreateTransferResponse, CustodyError>> + Send;

    fn estimate_transfer_fee(
        &self,
        request: &TransferRequest,
    ) -> impl Future<Output = Result<FeeEstimate, CustodyError>> + Send;

    fn get_transfer(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<TransactionRecord, CustodyError>> + Send;

    fn list_transfers(
        &self,
        query: &TransferQuery,
    ) -> impl Future<Output = Result<Vec<TransactionRecord>, CustodyError>> + Send;

    fn get_vault_account(
        &self,
        vault_id: &str,
    ) -> impl Future<Output = Result<VaultAccount, CustodyError>> + Send;

    fn deposit_addresses(
        &self,
        vault_id: &str,
        asset_id: &str,
    ) -> impl Future<Output = Result<Vec<DepositAddress>, CustodyError>> + Send;
}

/// Reject ids that would change the request path.
fn path_segment(raw: &str) -> Result<&str, CustodyError> {
    let valid = !raw.is_empty()
        && raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(raw)
    } else {
        Err(CustodyError::InvalidArgument(format!("invalid path segment {raw:?}")))
    }
}

fn with_query(path: &str, params: &[(&str, String)]) -> String {
    if params.is_empty() {
        return path.to_string();
    }
    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())))
        .finish();
    format!("{path}?{query}")
}

#[derive(Debug, Clone)]
pub struct FireblocksClient {
    base_url: String,
    signer: RequestSigner,
    viewer: RequestSigner,
    http: Client,
}

impl FireblocksClient {
    pub fn new(
        base_url: impl Into<String>,
        signer: RequestSigner,
        viewer: RequestSigner,
    ) -> Result<Self, CustodyError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| CustodyError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into(),
            signer,
            viewer,
            http,
        })
    }

    /// Send a signed request. `uri` is the path plus query and is what the
    /// token is bound to.
    async fn send<T: DeserializeOwned>(
        &self,
        credentials: &RequestSigner,
        method: Method,
        uri: &str,
        body: Option<String>,
        idempotency_key: Option<&str>,
    ) -> Result<T, CustodyError> {
        let body = body.unwrap_or_default();
        let token = credentials.sign(uri, &body, chrono::Utc::now().timestamp())?;

        let mut request = self
            .http
            .request(
                method.clone(),
                format!("{}{}", self.base_url.trim_end_matches('/'), uri),
            )
            .header("X-API-Key", credentials.api_key())
            .header("Authorization", format!("Bearer {token}"))
            .header("Content-Type", "application/json");
        if let Some(key) = idempotency_key {
            request = request.header("Idempotency-Key", key);
        }
        if !body.is_empty() {
            request = request.body(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CustodyError::Request(format!("{method} {uri} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(CustodyError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        debug!(%method, uri, "Custody request succeeded");
        response
            .json()
            .await
            .map_err(|e| CustodyError::InvalidResponse(format!("{method} {uri} invalid JSON: {e}")))
    }

    fn encode_body(request: &TransferRequest) -> Result<String, CustodyError> {
        serde_json::to_string(request)
            .map_err(|e| CustodyError::InvalidArgument(format!("serialize transfer failed: {e}")))
    }
}

impl CustodyPlatform for FireblocksClient {
    async fn create_transfer(
        &self,
        request: &TransferRequest,
        idempotency_key: Option<&str>,
    ) -> Result<CreateTransferResponse, CustodyError> {
        let body = Self::encode_body(request)?;
        self.send(
            &self.signer,
            Method::POST,
            "/v1/transactions",
            Some(body),
            idempotency_key,
        )
        .await
    }

    async fn estimate_transfer_fee(
        &self,
        request: &TransferRequest,
    ) -> Result<FeeEstimate, CustodyError> {
        let body = Self::encode_body(request)?;
        self.send(
            &self.signer,
            Method::POST,
            "/v1/transactions/estimate_fee",
            Some(body),
            None,
        )
        .await
    }

    async fn get_transfer(&self, id: &str) -> Result<TransactionRecord, CustodyError> {
        let uri = format!("/v1/transactions/{}", path_segment(id)?);
        self.send(&self.viewer, Method::GET, &uri, None, None).await
    }

    async fn list_transfers(
        &self,
        query: &TransferQuery,
    ) -> Result<Vec<TransactionRecord>, CustodyError> {
        let uri = with_query("/v1/transactions", &query.to_params());
        self.send(&self.viewer, Method::GET, &uri, None, None).await
    }

    async fn get_vault_account(&self, vault_id: &str) -> Result<VaultAccount, CustodyError> {
        let uri = format!("/v1/vault/accounts/{}", path_segment(vault_id)?);
        self.send(&self.viewer, Method::GET, &uri, None, None).await
    }

    async fn deposit_addresses(
        &self,
        vault_id: &str,
        asset_id: &str,
    ) -> Result<Vec<DepositAddress>, CustodyError> {
        let uri = format!(
            "/v1/vault/accounts/{}/{}/addresses_paginated",
            path_segment(vault_id)?,
            path_segment(asset_id)?
        );
        let page: DepositAddressPage = self
            .send(&self.viewer, Method::GET, &uri, None, None)
            .await?;
        Ok(page.addresses)
    }
}
