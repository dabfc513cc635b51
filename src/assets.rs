// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Supported custody assets and their market-data identifiers.
//!
//! The catalog is chosen once at startup from the deployment stage and is
//! read-only afterwards.

use crate::error::PipelineError;

/// A tradable asset known to the custody platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetDescriptor {
    /// Custody platform asset id (e.g. `ETH`, `USDT_ERC20`)
    pub id: &'static str,
    /// Market-data provider id used for USD quotes
    pub cmc_id: u64,
    /// Asset that pays this asset's network fee, when it cannot pay its own.
    pub fee_asset: Option<&'static str>,
}

impl AssetDescriptor {
    const fn native(id: &'static str, cmc_id: u64) -> Self {
        Self {
            id,
            cmc_id,
            fee_asset: None,
        }
    }

    const fn routed(id: &'static str, cmc_id: u64, fee_asset: &'static str) -> Self {
        Self {
            id,
            cmc_id,
            fee_asset: Some(fee_asset),
        }
    }
}

/// Mainnet asset list (`STAGE=prod`).
pub const SUPPORTED_ASSETS: &[AssetDescriptor] = &[
    AssetDescriptor::native("BTC", 1),
    AssetDescriptor::native("ETH", 1027),
    // ERC-20 tether pays gas in ETH
    AssetDescriptor::routed("USDT_ERC20", 825, "ETH"),
    AssetDescriptor::native("SOL", 5426),
    AssetDescriptor::native("BNB_BSC", 1839),
    AssetDescriptor::native("MATIC_POLYGON", 3890),
    AssetDescriptor::native("AVAX", 5805),
    AssetDescriptor::native("XLM", 512),
    AssetDescriptor::native("LTC", 2),
];

/// Testnet asset list (every other stage).
pub const SUPPORTED_ASSETS_TESTNET: &[AssetDescriptor] = &[
    AssetDescriptor::native("BTC_TEST", 1),
    AssetDescriptor::native("ETH_TEST5", 1027),
    AssetDescriptor::routed("USDT_BSC_TEST", 825, "ETH_TEST5"),
    AssetDescriptor::native("SOL_TEST", 5426),
    AssetDescriptor::native("BNB_TEST", 1839),
    AssetDescriptor::native("AVAXTEST", 5805),
    AssetDescriptor::native("XLM_TEST", 512),
];

/// Read-only view over the configured asset list.
#[derive(Debug, Clone, Copy)]
pub struct AssetCatalog {
    assets: &'static [AssetDescriptor],
}

impl AssetCatalog {
    pub const fn new(assets: &'static [AssetDescriptor]) -> Self {
        Self { assets }
    }

    /// Select the catalog for a deployment stage.
    pub fn for_stage(stage: &str) -> Self {
        if stage.trim().eq_ignore_ascii_case("prod") {
            Self::new(SUPPORTED_ASSETS)
        } else {
            Self::new(SUPPORTED_ASSETS_TESTNET)
        }
    }

    pub fn assets(&self) -> &'static [AssetDescriptor] {
        self.assets
    }

    /// Resolve a custody asset id.
    pub fn resolve(&self, asset_id: &str) -> Result<AssetDescriptor, PipelineError> {
        self.assets
            .iter()
            .find(|asset| asset.id == asset_id)
            .copied()
            .ok_or_else(|| PipelineError::UnsupportedAsset(asset_id.to_string()))
    }

    /// Resolve the asset a transfer's network fee is denominated in.
    pub fn fee_asset_for(&self, asset: &AssetDescriptor) -> Result<AssetDescriptor, PipelineError> {
        match asset.fee_asset {
            Some(fee_asset_id) => self.resolve(fee_asset_id),
            None => Ok(*asset),
        }
    }

    /// Distinct market-data ids, in catalog order.
    pub fn market_data_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = Vec::with_capacity(self.assets.len());
        for asset in self.assets {
            if !ids.contains(&asset.cmc_id) {
                ids.push(asset.cmc_id);
            }
        }
        ids
    }
}

/// Block explorer transaction URL for an EVM chain id.
pub fn transaction_explorer_url(chain_id: u64, tx_hash: &str) -> Result<String, PipelineError> {
    let base = match chain_id {
        1 => "https://etherscan.io/tx/",
        56 => "https://bscscan.com/tx/",
        137 => "https://polygonscan.com/tx/",
        43114 => "https://snowtrace.io/tx/",
        other => {
            return Err(PipelineError::InvalidRequest(format!(
                "Unsupported chainId: {other}"
            )))
        }
    };
    Ok(format!("{base}{tx_hash}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_selects_catalog() {
        assert!(AssetCatalog::for_stage("prod").resolve("ETH").is_ok());
        assert!(AssetCatalog::for_stage("PROD").resolve("USDT_ERC20").is_ok());
        assert!(AssetCatalog::for_stage("dev").resolve("ETH").is_err());
        assert!(AssetCatalog::for_stage("staging")
            .resolve("ETH_TEST5")
            .is_ok());
    }

    #[test]
    fn unknown_asset_is_unsupported() {
        let catalog = AssetCatalog::new(SUPPORTED_ASSETS);
        match catalog.resolve("DOGE") {
            Err(PipelineError::UnsupportedAsset(id)) => assert_eq!(id, "DOGE"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn routed_stable_tokens_pay_fees_in_gas_asset() {
        let mainnet = AssetCatalog::new(SUPPORTED_ASSETS);
        let usdt = mainnet.resolve("USDT_ERC20").unwrap();
        assert_eq!(mainnet.fee_asset_for(&usdt).unwrap().id, "ETH");

        let testnet = AssetCatalog::new(SUPPORTED_ASSETS_TESTNET);
        let usdt = testnet.resolve("USDT_BSC_TEST").unwrap();
        assert_eq!(testnet.fee_asset_for(&usdt).unwrap().id, "ETH_TEST5");

        let btc = mainnet.resolve("BTC").unwrap();
        assert_eq!(mainnet.fee_asset_for(&btc).unwrap(), btc);
    }

    #[test]
    fn every_fee_asset_is_in_its_catalog() {
        for list in [SUPPORTED_ASSETS, SUPPORTED_ASSETS_TESTNET] {
            let catalog = AssetCatalog::new(list);
            for asset in list {
                assert!(catalog.fee_asset_for(asset).is_ok(), "{}", asset.id);
            }
        }
    }

    #[test]
    fn market_data_ids_are_distinct() {
        let ids = AssetCatalog::new(SUPPORTED_ASSETS_TESTNET).market_data_ids();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(ids.len(), sorted.len());
    }

    #[test]
    fn explorer_urls() {
        assert_eq!(
            transaction_explorer_url(1, "0xabc").unwrap(),
            "https://etherscan.io/tx/0xabc"
        );
        assert_eq!(
            transaction_explorer_url(43114, "0xdef").unwrap(),
            "https://snowtrace.io/tx/0xdef"
        );
        assert!(transaction_explorer_url(10, "0x1").is_err());
    }
}
