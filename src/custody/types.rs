// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Custody platform request and response payloads.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use crate::serde_utils::{f64_as_string, f64_from_number_or_string};

/// Kind of transfer endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PeerType {
    VaultAccount,
    OneTimeAddress,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneTimeAddress {
    pub address: String,
}

/// Source or destination of a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferPeerPath {
    #[serde(rename = "type")]
    pub peer_type: PeerType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub one_time_address: Option<OneTimeAddress>,
}

impl TransferPeerPath {
    pub fn vault(id: impl Into<String>) -> Self {
        Self {
            peer_type: PeerType::VaultAccount,
            id: Some(id.into()),
            one_time_address: None,
        }
    }

    pub fn one_time_address(address: impl Into<String>) -> Self {
        Self {
            peer_type: PeerType::OneTimeAddress,
            id: None,
            one_time_address: Some(OneTimeAddress {
                address: address.into(),
            }),
        }
    }
}

/// Network-fee priority tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FeeLevel {
    Low,
    Medium,
    High,
}

/// A vault transfer, submitted or estimated.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub asset_id: String,
    #[serde(serialize_with = "f64_as_string")]
    pub amount: f64,
    pub source: TransferPeerPath,
    pub destination: TransferPeerPath,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee_level: Option<FeeLevel>,
    /// Client-side idempotency reference, echoed back on the record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_tx_id: Option<String>,
}

impl TransferRequest {
    pub fn new(
        asset_id: impl Into<String>,
        amount: f64,
        source: TransferPeerPath,
        destination: TransferPeerPath,
    ) -> Self {
        Self {
            asset_id: asset_id.into(),
            amount,
            source,
            destination,
            fee_level: None,
            external_tx_id: None,
        }
    }

    pub fn with_fee_level(mut self, fee_level: FeeLevel) -> Self {
        self.fee_level = Some(fee_level);
        self
    }

    pub fn with_external_tx_id(mut self, external_tx_id: Option<String>) -> Self {
        self.external_tx_id = external_tx_id;
        self
    }
}

/// Result of submitting a transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CreateTransferResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Statuses after which a transfer will never complete.
pub const TERMINAL_FAILURE_STATUSES: &[&str] = &["REJECTED", "FAILED", "BLOCKED", "CANCELLED"];

impl CreateTransferResponse {
    pub fn is_terminal_failure(&self) -> bool {
        self.status
            .as_deref()
            .is_some_and(|status| TERMINAL_FAILURE_STATUSES.contains(&status))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelFee {
    #[serde(deserialize_with = "f64_from_number_or_string")]
    pub network_fee: f64,
}

/// Network-fee estimate per priority tier.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct FeeEstimate {
    pub low: LevelFee,
    pub medium: LevelFee,
    pub high: LevelFee,
}

/// A custody transaction as returned by the platform.
///
/// Only the fields the pipeline reads are typed; everything else is kept
/// verbatim in `extra` and passed through to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub id: String,
    /// Creation time in epoch milliseconds.
    pub created_at: i64,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Which side of a transfer a vault is on when listing transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
    Incoming,
    Outgoing,
}

/// Filter for listing transfers touching one vault, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferQuery {
    pub vault_id: String,
    pub direction: TransferDirection,
    pub limit: u32,
    pub before: Option<i64>,
    pub after: Option<i64>,
}

impl TransferQuery {
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let (type_key, id_key) = match self.direction {
            TransferDirection::Incoming => ("destType", "destId"),
            TransferDirection::Outgoing => ("sourceType", "sourceId"),
        };
        let mut params = vec![
            (type_key, "VAULT_ACCOUNT".to_string()),
            (id_key, self.vault_id.clone()),
            ("limit", self.limit.to_string()),
            ("orderBy", "createdAt".to_string()),
            ("sort", "DESC".to_string()),
        ];
        if let Some(before) = self.before {
            params.push(("before", before.to_string()));
        }
        if let Some(after) = self.after {
            params.push(("after", after.to_string()));
        }
        params
    }
}

/// Balance of one asset inside a vault.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VaultAsset {
    pub id: String,
    #[serde(default)]
    pub total: Option<String>,
    #[serde(default)]
    pub available: Option<String>,
    #[serde(default)]
    pub pending: Option<String>,
    #[serde(default)]
    pub frozen: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VaultAccount {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub assets: Vec<VaultAsset>,
}

/// A deposit address issued for a vault asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DepositAddress {
    pub asset_id: String,
    pub address: String,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub legacy_address: Option<String>,
    #[serde(default)]
    pub address_format: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct DepositAddressPage {
    #[serde(default)]
    pub addresses: Vec<DepositAddress>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn transfer_request_wire_shape() {
        let request = TransferRequest::new(
            "ETH",
            0.25,
            TransferPeerPath::vault("7"),
            TransferPeerPath::one_time_address("0xdead"),
        )
        .with_fee_level(FeeLevel::High)
        .with_external_tx_id(Some("wd-1".into()));

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "assetId": "ETH",
                "amount": "0.25",
                "source": { "type": "VAULT_ACCOUNT", "id": "7" },
                "destination": {
                    "type": "ONE_TIME_ADDRESS",
                    "oneTimeAddress": { "address": "0xdead" }
                },
                "feeLevel": "HIGH",
                "externalTxId": "wd-1"
            })
        );
    }

    #[test]
    fn fee_estimate_accepts_string_fees() {
        let estimate: FeeEstimate = serde_json::from_value(json!({
            "low": { "networkFee": "0.0001" },
            "medium": { "networkFee": 0.0002 },
            "high": { "networkFee": "0.0003", "gasPrice": "12" }
        }))
        .unwrap();
        assert_eq!(estimate.high.network_fee, 0.0003);
        assert_eq!(estimate.medium.network_fee, 0.0002);
    }

    #[test]
    fn terminal_statuses() {
        let rejected = CreateTransferResponse {
            id: Some("t".into()),
            status: Some("REJECTED".into()),
        };
        let submitted = CreateTransferResponse {
            id: Some("t".into()),
            status: Some("SUBMITTED".into()),
        };
        assert!(rejected.is_terminal_failure());
        assert!(!submitted.is_terminal_failure());
    }

    #[test]
    fn transfer_query_params() {
        let query = TransferQuery {
            vault_id: "12".into(),
            direction: TransferDirection::Outgoing,
            limit: 20,
            before: Some(1_700_000_000_000),
            after: None,
        };
        let params = query.to_params();
        assert!(params.contains(&("sourceType", "VAULT_ACCOUNT".to_string())));
        assert!(params.contains(&("sourceId", "12".to_string())));
        assert!(params.contains(&("before", "1700000000000".to_string())));
        assert!(!params.iter().any(|(k, _)| *k == "after"));
    }

    #[test]
    fn transaction_record_passes_unknown_fields_through() {
        let record: TransactionRecord = serde_json::from_value(json!({
            "id": "tx-1",
            "createdAt": 1_700_000_000_000_i64,
            "status": "COMPLETED",
            "assetId": "BTC",
            "destinationAddress": "bc1q..."
        }))
        .unwrap();
        assert_eq!(record.created_at, 1_700_000_000_000);
        assert_eq!(
            serde_json::to_value(&record).unwrap()["destinationAddress"],
            "bc1q..."
        );
    }
}
