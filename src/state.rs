// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::{
    assets::AssetCatalog,
    custody::FireblocksClient,
    history::TransactionHistory,
    market_data::{CmcClient, QuoteGateway},
    storage::ReconciliationStore,
    withdrawal::WithdrawalOrchestrator,
};

pub type Quotes = QuoteGateway<CmcClient>;
pub type Withdrawals = WithdrawalOrchestrator<FireblocksClient, CmcClient>;
pub type History = TransactionHistory<FireblocksClient>;

#[derive(Clone)]
pub struct AppState {
    pub quotes: Arc<Quotes>,
    pub withdrawals: Arc<Withdrawals>,
    pub history: Arc<History>,
    pub custody: Arc<FireblocksClient>,
    pub reconciliation: Arc<ReconciliationStore>,
    pub assets: AssetCatalog,
}

impl AppState {
    pub fn new(
        quotes: Arc<Quotes>,
        custody: Arc<FireblocksClient>,
        reconciliation: Arc<ReconciliationStore>,
        assets: AssetCatalog,
        fee_vault_id: impl Into<String>,
    ) -> Self {
        let withdrawals = WithdrawalOrchestrator::new(
            custody.clone(),
            quotes.clone(),
            assets,
            fee_vault_id,
            reconciliation.clone(),
        );
        Self {
            quotes,
            withdrawals: Arc::new(withdrawals),
            history: Arc::new(TransactionHistory::new(custody.clone())),
            custody,
            reconciliation,
            assets,
        }
    }
}
