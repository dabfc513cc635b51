// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Persistent Storage
//!
//! The service is stateless apart from the reconciliation log, an embedded
//! redb database under `DATA_DIR` recording withdrawals that need operator
//! attention.

pub mod reconciliation;

pub use reconciliation::{PartialWithdrawalRecord, ReconciliationError, ReconciliationStore};
