// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Custody platform integration: signed HTTP client and transfer payloads.

pub mod client;
pub mod signing;
pub mod types;

pub use client::{CustodyError, CustodyPlatform, FireblocksClient, DEFAULT_API_BASE_URL};
pub use signing::RequestSigner;
pub use types::{
    CreateTransferResponse, DepositAddress, FeeEstimate, FeeLevel, TransactionRecord,
    TransferDirection, TransferPeerPath, TransferQuery, TransferRequest, VaultAccount, VaultAsset,
};
