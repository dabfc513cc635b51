// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Withdrawal Orchestrator
//!
//! Prices withdrawals and submits them as custody transfers.
//!
//! ## Fee quote
//!
//! The service fee comes from the [`FeeSchedule`] applied to the USD notional
//! and is charged in the transfer asset. The network fee is the sum of the
//! high-priority estimates for both legs (principal and service fee), each
//! with a 10% margin, and is denominated in the asset that pays gas for the
//! transfer asset (ETH for ERC-20 tether).
//!
//! ## Submission order
//!
//! An external withdrawal sends the service-fee transfer first and the
//! principal transfer only after the fee leg was accepted. If the fee leg
//! fails nothing else is sent. If the principal leg fails after the fee leg
//! went out, the fee is not rolled back: a [`PartialWithdrawalRecord`] is
//! persisted for operator reconciliation and the call fails with
//! [`PipelineError::PartialWithdrawalFailure`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use utoipa::ToSchema;

use crate::assets::{AssetCatalog, AssetDescriptor};
use crate::custody::{
    CreateTransferResponse, CustodyError, CustodyPlatform, FeeLevel, TransactionRecord,
    TransferPeerPath, TransferRequest,
};
use crate::error::PipelineError;
use crate::fees::FeeSchedule;
use crate::market_data::{MarketDataProvider, QuoteGateway};
use crate::serde_utils::f64_from_number_or_string;
use crate::storage::{PartialWithdrawalRecord, ReconciliationStore};

/// Safety margin applied to each leg's high-priority network-fee estimate.
pub const NETWORK_FEE_MARGIN: f64 = 1.1;

/// Where a withdrawal goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum TransferType {
    /// To an external one-time address.
    External,
    /// To another user's vault; `withdrawalAddress` carries the vault id.
    #[serde(alias = "friend2friend")]
    Friend2Friend,
    /// To the service's fee-collection vault.
    ServicePayment,
}

/// Withdrawal or payment request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalRequest {
    #[serde(rename = "type")]
    pub transfer_type: TransferType,
    /// Custody asset id (e.g. `ETH`)
    pub asset_id: String,
    #[serde(default)]
    pub withdrawal_address: Option<String>,
    /// Amount in the transfer asset, as a number or numeric string
    #[serde(deserialize_with = "f64_from_number_or_string")]
    #[schema(value_type = String, example = "0.25")]
    pub amount: f64,
    /// Optional client key making resubmission safe
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

impl WithdrawalRequest {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.asset_id.trim().is_empty() {
            return Err(PipelineError::InvalidRequest("assetId is required".into()));
        }
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(PipelineError::InvalidRequest(
                "amount must be a positive number".into(),
            ));
        }
        let needs_address = matches!(
            self.transfer_type,
            TransferType::External | TransferType::Friend2Friend
        );
        if needs_address && self.address().is_none() {
            return Err(PipelineError::InvalidRequest(
                "withdrawalAddress is required for this transfer type".into(),
            ));
        }
        Ok(())
    }

    fn address(&self) -> Option<&str> {
        self.withdrawal_address
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
    }

    /// Per-leg idempotency key derived from the client key.
    fn leg_key(&self, leg: &str) -> Option<String> {
        self.idempotency_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(|k| format!("{k}-{leg}"))
    }
}

/// One fee component of a quote.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct FeeComponent {
    #[serde(rename = "amountInAsset")]
    pub amount_in_asset: f64,
    #[serde(rename = "amountInUSD")]
    pub amount_in_usd: f64,
    #[serde(rename = "assetId")]
    pub asset_id: String,
    #[serde(rename = "assetUSDPrice")]
    pub asset_usd_price: f64,
}

/// Computed fees for a prospective withdrawal. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct FeeQuote {
    #[serde(rename = "serviceFee")]
    pub service_fee: FeeComponent,
    #[serde(rename = "networkFee")]
    pub network_fee: FeeComponent,
    #[serde(rename = "totalFeeUSD")]
    pub total_fee_usd: f64,
}

/// Outcome of a submitted transfer: the full record when the platform
/// assigned an id and it could be read back, otherwise the raw submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SubmittedTransfer {
    Record(TransactionRecord),
    Pending(CreateTransferResponse),
}

pub struct WithdrawalOrchestrator<C, P> {
    custody: Arc<C>,
    quotes: Arc<QuoteGateway<P>>,
    assets: AssetCatalog,
    fees: FeeSchedule,
    fee_vault_id: String,
    reconciliation: Arc<ReconciliationStore>,
}

impl<C, P> WithdrawalOrchestrator<C, P>
where
    C: CustodyPlatform,
    P: MarketDataProvider,
{
    pub fn new(
        custody: Arc<C>,
        quotes: Arc<QuoteGateway<P>>,
        assets: AssetCatalog,
        fee_vault_id: impl Into<String>,
        reconciliation: Arc<ReconciliationStore>,
    ) -> Self {
        Self {
            custody,
            quotes,
            assets,
            fees: FeeSchedule::default(),
            fee_vault_id: fee_vault_id.into(),
            reconciliation,
        }
    }

    pub fn assets(&self) -> AssetCatalog {
        self.assets
    }

    /// Principal destination for a withdrawal or fee quote.
    fn destination(&self, request: &WithdrawalRequest) -> Result<TransferPeerPath, PipelineError> {
        Ok(match request.transfer_type {
            TransferType::External => {
                TransferPeerPath::one_time_address(required_address(request)?)
            }
            TransferType::ServicePayment => TransferPeerPath::vault(self.fee_vault_id.as_str()),
            TransferType::Friend2Friend => TransferPeerPath::vault(required_address(request)?),
        })
    }

    /// Service fee in USD and in units of the transfer asset.
    ///
    /// Fails when the notional does not fit in an `f64` or the fee rounds to
    /// nothing, so no withdrawal is ever priced at zero.
    fn service_fee(&self, amount: f64, asset_usd_price: f64) -> Result<(f64, f64), PipelineError> {
        let notional = amount * asset_usd_price;
        if !notional.is_finite() {
            return Err(PipelineError::InvalidRequest(
                "amount is too large to price".into(),
            ));
        }
        let service_fee_usd = self.fees.service_fee(notional);
        let service_fee_in_asset = service_fee_usd / asset_usd_price;
        if !service_fee_in_asset.is_finite() || service_fee_in_asset <= 0.0 {
            return Err(PipelineError::InvalidRequest(format!(
                "service fee for {amount} at ${asset_usd_price} is not a positive amount"
            )));
        }
        Ok((service_fee_usd, service_fee_in_asset))
    }

    fn fee_leg(&self, vault_id: &str, asset: &AssetDescriptor, amount: f64) -> TransferRequest {
        TransferRequest::new(
            asset.id,
            amount,
            TransferPeerPath::vault(vault_id),
            TransferPeerPath::vault(self.fee_vault_id.as_str()),
        )
    }

    /// Quote service and network fees for a withdrawal without submitting it.
    pub async fn quote_withdrawal_fee(
        &self,
        vault_id: &str,
        request: &WithdrawalRequest,
    ) -> Result<FeeQuote, PipelineError> {
        request.validate()?;
        let asset = self.assets.resolve(&request.asset_id)?;
        let fee_asset = self.assets.fee_asset_for(&asset)?;

        let (asset_usd_price, fee_asset_usd_price) = tokio::try_join!(
            self.quotes.latest_usd_price(asset.cmc_id),
            self.quotes.latest_usd_price(fee_asset.cmc_id),
        )?;

        let (service_fee_usd, service_fee_in_asset) =
            self.service_fee(request.amount, asset_usd_price)?;

        let principal = TransferRequest::new(
            asset.id,
            request.amount,
            TransferPeerPath::vault(vault_id),
            self.destination(request)?,
        );
        let fee_leg = self.fee_leg(vault_id, &asset, service_fee_in_asset);

        let (principal_estimate, fee_leg_estimate) = tokio::try_join!(
            self.custody.estimate_transfer_fee(&principal),
            self.custody.estimate_transfer_fee(&fee_leg),
        )?;

        let network_fee_in_fee_asset = NETWORK_FEE_MARGIN * principal_estimate.high.network_fee
            + NETWORK_FEE_MARGIN * fee_leg_estimate.high.network_fee;
        let network_fee_usd = network_fee_in_fee_asset * fee_asset_usd_price;

        Ok(FeeQuote {
            service_fee: FeeComponent {
                amount_in_asset: service_fee_in_asset,
                amount_in_usd: service_fee_usd,
                asset_id: asset.id.to_string(),
                asset_usd_price,
            },
            network_fee: FeeComponent {
                amount_in_asset: network_fee_in_fee_asset,
                amount_in_usd: network_fee_usd,
                asset_id: fee_asset.id.to_string(),
                asset_usd_price: fee_asset_usd_price,
            },
            total_fee_usd: service_fee_usd + network_fee_usd,
        })
    }

    /// Send the service fee, then the principal, to an external address.
    pub async fn submit_external_withdrawal(
        &self,
        vault_id: &str,
        request: &WithdrawalRequest,
    ) -> Result<SubmittedTransfer, PipelineError> {
        request.validate()?;
        if request.transfer_type != TransferType::External {
            return Err(PipelineError::InvalidRequest(
                "withdrawals require type external".into(),
            ));
        }
        let asset = self.assets.resolve(&request.asset_id)?;
        let asset_usd_price = self.quotes.latest_usd_price(asset.cmc_id).await?;
        let (service_fee_usd, service_fee_in_asset) =
            self.service_fee(request.amount, asset_usd_price)?;

        let fee_leg = self
            .fee_leg(vault_id, &asset, service_fee_in_asset)
            .with_fee_level(FeeLevel::High)
            .with_external_tx_id(request.leg_key("fee"));
        let fee_key = request.leg_key("fee");

        let fee_transfer = self
            .custody
            .create_transfer(&fee_leg, fee_key.as_deref())
            .await
            .and_then(reject_terminal)
            .map_err(|err| {
                error!(
                    vault_id,
                    asset_id = asset.id,
                    error = %err,
                    "Service fee transfer failed, principal not sent"
                );
                PipelineError::from(err)
            })?;
        let fee_transfer_id = fee_transfer.id.clone().unwrap_or_default();
        info!(
            vault_id,
            asset_id = asset.id,
            fee_transfer_id = %fee_transfer_id,
            service_fee_usd,
            "Service fee transfer accepted"
        );

        let principal = TransferRequest::new(
            asset.id,
            request.amount,
            TransferPeerPath::vault(vault_id),
            self.destination(request)?,
        )
        .with_fee_level(FeeLevel::High)
        .with_external_tx_id(request.leg_key("principal"));
        let principal_key = request.leg_key("principal");

        match self
            .custody
            .create_transfer(&principal, principal_key.as_deref())
            .await
            .and_then(reject_terminal)
        {
            Ok(submitted) => {
                info!(
                    vault_id,
                    asset_id = asset.id,
                    transfer_id = ?submitted.id,
                    "Withdrawal submitted"
                );
                Ok(self.read_back(submitted).await)
            }
            Err(err) => Err(self.record_partial_failure(
                vault_id,
                request,
                fee_transfer_id,
                service_fee_in_asset,
                err.to_string(),
            )),
        }
    }

    /// Send a single transfer with no service-fee leg.
    ///
    /// `external` pays a one-time address; every other type pays the vault
    /// named by `withdrawalAddress`.
    pub async fn submit_card_payment(
        &self,
        vault_id: &str,
        request: &WithdrawalRequest,
    ) -> Result<SubmittedTransfer, PipelineError> {
        request.validate()?;
        let address = required_address(request)?;
        let asset = self.assets.resolve(&request.asset_id)?;

        let destination = match request.transfer_type {
            TransferType::External => TransferPeerPath::one_time_address(address),
            TransferType::ServicePayment | TransferType::Friend2Friend => {
                TransferPeerPath::vault(address)
            }
        };
        let transfer = TransferRequest::new(
            asset.id,
            request.amount,
            TransferPeerPath::vault(vault_id),
            destination,
        )
        .with_external_tx_id(request.leg_key("payment"));
        let key = request.leg_key("payment");

        let submitted = self
            .custody
            .create_transfer(&transfer, key.as_deref())
            .await
            .and_then(reject_terminal)?;
        info!(
            vault_id,
            asset_id = asset.id,
            transfer_id = ?submitted.id,
            "Card payment submitted"
        );
        Ok(self.read_back(submitted).await)
    }

    /// Fetch the full record of a submitted transfer, falling back to the
    /// submission result when it has no id or cannot be read.
    async fn read_back(&self, submitted: CreateTransferResponse) -> SubmittedTransfer {
        let Some(id) = submitted.id.as_deref() else {
            return SubmittedTransfer::Pending(submitted);
        };
        match self.custody.get_transfer(id).await {
            Ok(record) => SubmittedTransfer::Record(record),
            Err(err) => {
                warn!(transfer_id = id, error = %err, "Submitted transfer could not be read back");
                SubmittedTransfer::Pending(submitted)
            }
        }
    }

    fn record_partial_failure(
        &self,
        vault_id: &str,
        request: &WithdrawalRequest,
        fee_transfer_id: String,
        service_fee_in_asset: f64,
        reason: String,
    ) -> PipelineError {
        let record = PartialWithdrawalRecord::new(
            vault_id,
            request.asset_id.as_str(),
            request.amount,
            fee_transfer_id.as_str(),
        )
        .with_withdrawal_address(request.withdrawal_address.clone())
        .with_service_fee(service_fee_in_asset)
        .with_reason(reason.as_str());

        let record_id = match self.reconciliation.record(&record) {
            Ok(()) => Some(record.record_id.clone()),
            Err(err) => {
                error!(
                    target: "reconciliation",
                    fee_transfer_id = %fee_transfer_id,
                    error = %err,
                    "Failed to persist reconciliation record"
                );
                None
            }
        };

        error!(
            target: "reconciliation",
            vault_id,
            asset_id = %request.asset_id,
            amount = request.amount,
            fee_transfer_id = %fee_transfer_id,
            record_id = ?record_id,
            reason = %reason,
            "partial withdrawal failure"
        );

        PipelineError::PartialWithdrawalFailure {
            fee_transfer_id,
            record_id,
            reason,
        }
    }
}

fn required_address(request: &WithdrawalRequest) -> Result<&str, PipelineError> {
    request
        .address()
        .ok_or_else(|| PipelineError::InvalidRequest("withdrawalAddress is required".into()))
}

/// Treat a submission that came back already failed as an error.
fn reject_terminal(
    response: CreateTransferResponse,
) -> Result<CreateTransferResponse, CustodyError> {
    if response.is_terminal_failure() {
        return Err(CustodyError::TransferRejected {
            id: response.id.unwrap_or_default(),
            status: response.status.unwrap_or_default(),
        });
    }
    Ok(response)
}
