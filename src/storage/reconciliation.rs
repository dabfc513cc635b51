// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Reconciliation log for partially executed withdrawals, backed by redb.
//!
//! A withdrawal whose service-fee transfer went out but whose principal
//! transfer failed leaves funds in the fee vault that the user did not get a
//! withdrawal for. Each such case is recorded here until an operator
//! resolves it.
//!
//! ## Table Layout
//!
//! - `partial_withdrawals`: record_id → serialized PartialWithdrawalRecord
//! - `unresolved_index`: (recorded_at_ms_be | record_id) → record_id, oldest first

use std::path::Path;

use chrono::{DateTime, Utc};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

const PARTIAL_WITHDRAWALS: TableDefinition<&str, &[u8]> =
    TableDefinition::new("partial_withdrawals");

/// Key format: `recorded_at_ms (u64 BE) | record_id` so a forward scan is
/// oldest first.
const UNRESOLVED_INDEX: TableDefinition<&[u8], &str> = TableDefinition::new("unresolved_index");

#[derive(Debug, thiserror::Error)]
pub enum ReconciliationError {
    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not found: {0}")]
    NotFound(String),
}

pub type ReconciliationResult<T> = Result<T, ReconciliationError>;

/// A withdrawal whose fee leg succeeded and principal leg failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PartialWithdrawalRecord {
    pub record_id: String,
    pub vault_id: String,
    pub asset_id: String,
    /// Principal amount that was not sent.
    pub amount: f64,
    pub withdrawal_address: Option<String>,
    /// Custody id of the fee transfer that did go out.
    pub fee_transfer_id: String,
    pub service_fee_in_asset: f64,
    /// Why the principal leg failed.
    pub reason: String,
    pub recorded_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl PartialWithdrawalRecord {
    pub fn new(
        vault_id: impl Into<String>,
        asset_id: impl Into<String>,
        amount: f64,
        fee_transfer_id: impl Into<String>,
    ) -> Self {
        Self {
            record_id: uuid::Uuid::new_v4().to_string(),
            vault_id: vault_id.into(),
            asset_id: asset_id.into(),
            amount,
            withdrawal_address: None,
            fee_transfer_id: fee_transfer_id.into(),
            service_fee_in_asset: 0.0,
            reason: String::new(),
            recorded_at: Utc::now(),
            resolved_at: None,
        }
    }

    pub fn with_withdrawal_address(mut self, address: Option<String>) -> Self {
        self.withdrawal_address = address;
        self
    }

    pub fn with_service_fee(mut self, service_fee_in_asset: f64) -> Self {
        self.service_fee_in_asset = service_fee_in_asset;
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved_at.is_some()
    }
}

fn index_key(record: &PartialWithdrawalRecord) -> Vec<u8> {
    let millis = record.recorded_at.timestamp_millis().max(0) as u64;
    let mut key = Vec::with_capacity(8 + 1 + record.record_id.len());
    key.extend_from_slice(&millis.to_be_bytes());
    key.push(b'|');
    key.extend_from_slice(record.record_id.as_bytes());
    key
}

/// Durable store of partial-withdrawal records.
pub struct ReconciliationStore {
    db: Database,
}

impl ReconciliationStore {
    /// Open (or create) the store at the given path.
    pub fn open(path: &Path) -> ReconciliationResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Pre-create tables so read transactions never fail on a fresh file
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(PARTIAL_WITHDRAWALS)?;
            let _ = write_txn.open_table(UNRESOLVED_INDEX)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Persist a new record.
    pub fn record(&self, record: &PartialWithdrawalRecord) -> ReconciliationResult<()> {
        let json = serde_json::to_vec(record)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut records = write_txn.open_table(PARTIAL_WITHDRAWALS)?;
            records.insert(record.record_id.as_str(), json.as_slice())?;

            if !record.is_resolved() {
                let mut index = write_txn.open_table(UNRESOLVED_INDEX)?;
                let key = index_key(record);
                index.insert(key.as_slice(), record.record_id.as_str())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn get(&self, record_id: &str) -> ReconciliationResult<Option<PartialWithdrawalRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PARTIAL_WITHDRAWALS)?;
        match table.get(record_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Records still awaiting an operator, oldest first.
    pub fn list_unresolved(&self) -> ReconciliationResult<Vec<PartialWithdrawalRecord>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(UNRESOLVED_INDEX)?;
        let records = read_txn.open_table(PARTIAL_WITHDRAWALS)?;

        let mut unresolved = Vec::new();
        for entry in index.iter()? {
            let (_, record_id) = entry?;
            if let Some(value) = records.get(record_id.value())? {
                unresolved.push(serde_json::from_slice(value.value())?);
            }
        }
        Ok(unresolved)
    }

    /// Mark a record resolved. Resolving twice keeps the first timestamp.
    pub fn mark_resolved(&self, record_id: &str) -> ReconciliationResult<PartialWithdrawalRecord> {
        let write_txn = self.db.begin_write()?;
        let record = {
            let mut records = write_txn.open_table(PARTIAL_WITHDRAWALS)?;
            let existing_bytes = {
                let existing = records
                    .get(record_id)?
                    .ok_or_else(|| ReconciliationError::NotFound(format!("record {record_id}")))?;
                existing.value().to_vec()
            };
            let mut record: PartialWithdrawalRecord = serde_json::from_slice(&existing_bytes)?;

            if record.resolved_at.is_none() {
                record.resolved_at = Some(Utc::now());
                let json = serde_json::to_vec(&record)?;
                records.insert(record_id, json.as_slice())?;

                let mut index = write_txn.open_table(UNRESOLVED_INDEX)?;
                index.remove(index_key(&record).as_slice())?;
            }
            record
        };
        write_txn.commit()?;
        Ok(record)
    }
}
