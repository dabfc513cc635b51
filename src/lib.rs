// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Relational Custody - Custody-backed Wallet Backend
//!
//! Prices withdrawals against live market data, submits them as custody
//! platform transfers (service fee first, then principal) and merges vault
//! transaction history.
//!
//! ## Modules
//!
//! - `market_data` - Rate-limited, caching market-data gateway
//! - `fees` - Service fee schedule
//! - `withdrawal` - Two-leg withdrawal orchestration
//! - `history` - Merged vault transaction history
//! - `custody` - Signed custody platform client
//! - `storage` - Reconciliation log for partial withdrawals (redb)
//! - `api` - HTTP API handlers (Axum)

pub mod api;
pub mod assets;
pub mod clock;
pub mod config;
pub mod custody;
pub mod error;
pub mod fees;
pub mod history;
pub mod market_data;
pub mod serde_utils;
pub mod state;
pub mod storage;
pub mod withdrawal;
