// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Transaction history for one vault.
//!
//! The custody platform filters transfers by either source or destination,
//! never both, so a vault's history is the merge of two queries: transfers it
//! received and transfers it sent. Both are fetched concurrently with the
//! same cursors, deduplicated by id, ordered newest first and truncated.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;
use utoipa::ToSchema;

use crate::custody::{CustodyPlatform, TransactionRecord, TransferDirection, TransferQuery};
use crate::error::PipelineError;

/// Page size when the caller gives none (or zero).
pub const DEFAULT_PAGE_SIZE: u32 = 56;

/// Largest page returned. Larger `limit` values are clamped, not rejected:
/// each side fetches twice the page size and the platform serves at most
/// 500 records per request.
pub const MAX_PAGE_SIZE: u32 = 250;

/// One page of merged history.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPage {
    #[schema(value_type = Vec<Object>)]
    pub transactions: Vec<TransactionRecord>,
    /// Creation time (ms) of the oldest entry on the page.
    pub next_before_timestamp: Option<i64>,
    /// Same value as `next_before_timestamp`.
    pub next_after_timestamp: Option<i64>,
}

pub struct TransactionHistory<C> {
    custody: Arc<C>,
}

impl<C: CustodyPlatform> TransactionHistory<C> {
    pub fn new(custody: Arc<C>) -> Self {
        Self { custody }
    }

    pub async fn list_transactions(
        &self,
        vault_id: &str,
        limit: Option<u32>,
        before: Option<i64>,
        after: Option<i64>,
    ) -> Result<TransactionPage, PipelineError> {
        let (page_size, fetch_size) = match limit.filter(|l| *l > 0) {
            Some(limit) => {
                let limit = limit.min(MAX_PAGE_SIZE);
                (limit, limit * 2)
            }
            None => (DEFAULT_PAGE_SIZE, DEFAULT_PAGE_SIZE),
        };

        let query = |direction| TransferQuery {
            vault_id: vault_id.to_string(),
            direction,
            limit: fetch_size,
            before,
            after,
        };
        let incoming = query(TransferDirection::Incoming);
        let outgoing = query(TransferDirection::Outgoing);

        let (received, sent) = tokio::try_join!(
            self.custody.list_transfers(&incoming),
            self.custody.list_transfers(&outgoing),
        )?;
        debug!(
            vault_id,
            received = received.len(),
            sent = sent.len(),
            "Fetched transfer history"
        );

        Ok(merge_page(received, sent, page_size as usize))
    }
}

/// Merge two result sets into one page. Later duplicates replace earlier ones.
fn merge_page(
    received: Vec<TransactionRecord>,
    sent: Vec<TransactionRecord>,
    page_size: usize,
) -> TransactionPage {
    let mut by_id: HashMap<String, TransactionRecord> = HashMap::new();
    for record in received.into_iter().chain(sent) {
        by_id.insert(record.id.clone(), record);
    }

    let mut transactions: Vec<TransactionRecord> = by_id.into_values().collect();
    transactions.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
    transactions.truncate(page_size);

    let cursor = transactions.last().map(|record| record.created_at);
    TransactionPage {
        transactions,
        next_before_timestamp: cursor,
        next_after_timestamp: cursor,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::custody::{
        CreateTransferResponse, CustodyError, DepositAddress, FeeEstimate, TransferRequest,
        VaultAccount,
    };
    use serde_json::{json, Map};
    use std::sync::Mutex;

    fn record(id: &str, created_at: i64, status: &str) -> TransactionRecord {
        TransactionRecord {
            id: id.to_string(),
            created_at,
            status: status.to_string(),
            asset_id: Some("ETH".into()),
            tx_hash: None,
            extra: Map::new(),
        }
    }

    #[derive(Default)]
    struct FakeCustody {
        received: Vec<TransactionRecord>,
        sent: Vec<TransactionRecord>,
        queries: Mutex<Vec<TransferQuery>>,
    }

    impl CustodyPlatform for FakeCustody {
        async fn create_transfer(
            &self,
            _: &TransferRequest,
            _: Option<&str>,
        ) -> Result<CreateTransferResponse, CustodyError> {
            Err(CustodyError::Request("unused".into()))
        }

        async fn estimate_transfer_fee(
            &self,
            _: &TransferRequest,
        ) -> Result<FeeEstimate, CustodyError> {
            Err(CustodyError::Request("unused".into()))
        }

        async fn get_transfer(&self, _: &str) -> Result<TransactionRecord, CustodyError> {
            Err(CustodyError::Request("unused".into()))
        }

        async fn list_transfers(
            &self,
            query: &TransferQuery,
        ) -> Result<Vec<TransactionRecord>, CustodyError> {
            self.queries.lock().unwrap().push(query.clone());
            Ok(match query.direction {
                TransferDirection::Incoming => self.received.clone(),
                TransferDirection::Outgoing => self.sent.clone(),
            })
        }

        async fn get_vault_account(&self, _: &str) -> Result<VaultAccount, CustodyError> {
            Err(CustodyError::Request("unused".into()))
        }

        async fn deposit_addresses(
            &self,
            _: &str,
            _: &str,
        ) -> Result<Vec<DepositAddress>, CustodyError> {
            Err(CustodyError::Request("unused".into()))
        }
    }

    fn history(custody: FakeCustody) -> (TransactionHistory<FakeCustody>, Arc<FakeCustody>) {
        let custody = Arc::new(custody);
        (TransactionHistory::new(custody.clone()), custody)
    }

    #[tokio::test]
    async fn merges_without_duplicates_newest_first() {
        let (history, _) = history(FakeCustody {
            received: vec![record("a", 300, "COMPLETED"), record("self", 200, "PENDING")],
            sent: vec![record("self", 200, "COMPLETED"), record("b", 100, "COMPLETED")],
            ..Default::default()
        });

        let page = history.list_transactions("7", Some(10), None, None).await.unwrap();
        let ids: Vec<&str> = page.transactions.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "self", "b"]);
        assert_eq!(page.transactions[1].status, "COMPLETED");
        assert_eq!(page.next_before_timestamp, Some(100));
        assert_eq!(page.next_after_timestamp, Some(100));
    }

    #[tokio::test]
    async fn page_is_truncated_and_cursor_is_oldest_kept() {
        let received = (0..5)
            .map(|i| record(&format!("r{i}"), 1_000 + i * 10, "COMPLETED"))
            .collect();
        let sent = (0..5).map(|i| record(&format!("s{i}"), 1_005 + i * 10, "COMPLETED")).collect();
        let (history, custody) = history(FakeCustody {
            received,
            sent,
            ..Default::default()
        });

        let page = history.list_transactions("7", Some(3), Some(9_999), None).await.unwrap();
        let ids: Vec<&str> = page.transactions.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["s4", "r4", "s3"]);
        assert_eq!(page.next_before_timestamp, Some(1_035));

        let queries = custody.queries.lock().unwrap().clone();
        assert_eq!(queries.len(), 2);
        assert!(queries.iter().all(|q| q.limit == 6 && q.before == Some(9_999)));
        assert!(queries.iter().any(|q| q.direction == TransferDirection::Incoming));
        assert!(queries.iter().any(|q| q.direction == TransferDirection::Outgoing));
    }

    #[tokio::test]
    async fn missing_limit_uses_default_page_size() {
        let received = (0..80).map(|i| record(&format!("r{i}"), i, "COMPLETED")).collect();
        let (history, custody) = history(FakeCustody {
            received,
            ..Default::default()
        });

        let page = history.list_transactions("7", None, None, None).await.unwrap();
        assert_eq!(page.transactions.len(), DEFAULT_PAGE_SIZE as usize);
        assert!(custody
            .queries
            .lock()
            .unwrap()
            .iter()
            .all(|q| q.limit == DEFAULT_PAGE_SIZE));

        let page = history.list_transactions("7", Some(0), None, None).await.unwrap();
        assert_eq!(page.transactions.len(), DEFAULT_PAGE_SIZE as usize);
    }

    #[tokio::test]
    async fn oversized_limit_is_capped() {
        let (history, custody) = history(FakeCustody::default());
        history.list_transactions("7", Some(10_000), None, None).await.unwrap();
        assert!(custody
            .queries
            .lock()
            .unwrap()
            .iter()
            .all(|q| q.limit == MAX_PAGE_SIZE * 2));
    }

    #[tokio::test]
    async fn empty_history_has_null_cursors() {
        let (history, _) = history(FakeCustody::default());
        let page = history.list_transactions("7", Some(5), None, None).await.unwrap();

        assert_eq!(
            serde_json::to_value(&page).unwrap(),
            json!({
                "transactions": [],
                "nextBeforeTimestamp": null,
                "nextAfterTimestamp": null
            })
        );
    }

    #[test]
    fn equal_timestamps_order_by_id() {
        let page = merge_page(
            vec![record("b", 5, "X"), record("a", 5, "X")],
            Vec::new(),
            10,
        );
        let ids: Vec<&str> = page.transactions.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
