// tessera/core/execution/src/config.rs

use serde::{Deserialize, Serialize};
use tessera_primitives::{
    gas::{REFUND_QUOTIENT, REFUND_QUOTIENT_EIP3529},
    Address, ChainRules, Forks, H256, U256,
};
use tracing::warn;

use crate::error::ExecutionError;

/// Governance-settable VM parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvmParams {
    /// Denomination gas fees are paid in.
    #[serde(default = "default_evm_denom")]
    pub evm_denom: String,

    #[serde(default = "default_true")]
    pub enable_create: bool,

    #[serde(default = "default_true")]
    pub enable_call: bool,

    #[serde(default)]
    pub chain: ChainRules,
}

fn default_evm_denom() -> String {
    "wei".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for EvmParams {
    fn default() -> Self {
        Self {
            evm_denom: default_evm_denom(),
            enable_create: true,
            enable_call: true,
            chain: ChainRules::default(),
        }
    }
}

impl EvmParams {
    pub fn from_toml_str(source: &str) -> Result<Self, ExecutionError> {
        let params: Self =
            toml::from_str(source).map_err(|e| ExecutionError::Config(e.to_string()))?;
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), ExecutionError> {
        if self.evm_denom.is_empty() {
            return Err(ExecutionError::Config("evm_denom must not be empty".into()));
        }
        if let (Some(berlin), Some(london)) = (self.chain.berlin_block, self.chain.london_block) {
            if london < berlin {
                return Err(ExecutionError::Config(
                    "london must not activate before berlin".into(),
                ));
            }
        }
        Ok(())
    }
}

/// EIP-1559 base fee parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeMarketParams {
    pub no_base_fee: bool,
    pub base_fee_change_denominator: u32,
    pub elasticity_multiplier: u32,
    pub initial_base_fee: U256,
    pub min_gas_price: U256,
}

impl Default for FeeMarketParams {
    fn default() -> Self {
        Self {
            no_base_fee: false,
            base_fee_change_denominator: 8,
            elasticity_multiplier: 2,
            initial_base_fee: U256::from(1_000_000_000u64),
            min_gas_price: U256::zero(),
        }
    }
}

impl FeeMarketParams {
    /// Replace zero divisors with defaults.
    pub fn sanitize(mut self) -> Self {
        let defaults = Self::default();
        if self.base_fee_change_denominator == 0 {
            warn!("Sanitizing invalid base_fee_change_denominator");
            self.base_fee_change_denominator = defaults.base_fee_change_denominator;
        }
        if self.elasticity_multiplier == 0 {
            warn!("Sanitizing invalid elasticity_multiplier");
            self.elasticity_multiplier = defaults.elasticity_multiplier;
        }
        self
    }
}

/// Header fields of the block being applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub height: u64,
    pub hash: H256,
    pub time: u64,
    pub proposer: Address,
    pub gas_limit: u64,
}

/// Immutable per-block execution configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionConfig {
    pub params: EvmParams,
    pub forks: Forks,
    /// `None` when the fee market is disabled.
    pub base_fee: Option<U256>,
    pub coinbase: Address,
    pub block_number: u64,
    pub block_time: u64,
    pub block_gas_limit: u64,
    pub block_hash: H256,
}

impl ExecutionConfig {
    pub fn new(params: EvmParams, header: &BlockHeader, base_fee: Option<U256>) -> Self {
        Self {
            forks: params.chain.forks_at(header.height),
            params,
            base_fee,
            coinbase: header.proposer,
            block_number: header.height,
            block_time: header.time,
            block_gas_limit: header.gas_limit,
            block_hash: header.hash,
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.params.chain.chain_id
    }

    pub fn refund_quotient(&self) -> u64 {
        if self.forks.london {
            REFUND_QUOTIENT_EIP3529
        } else {
            REFUND_QUOTIENT
        }
    }
}

/// Per-transaction position within the block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TxConfig {
    pub block_hash: H256,
    pub tx_hash: H256,
    pub tx_index: u64,
    pub log_index: u64,
}

impl TxConfig {
    /// Configuration for calls outside any transaction.
    pub fn empty(block_hash: H256) -> Self {
        Self {
            block_hash,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_from_toml() {
        let params = EvmParams::from_toml_str(
            r#"
            enable_create = false

            [chain]
            chain_id = 42
            berlin_block = 0
            london_block = 100
            "#,
        )
        .unwrap();
        assert!(!params.enable_create);
        assert!(params.enable_call);
        assert_eq!(params.evm_denom, "wei");
        assert_eq!(params.chain.chain_id, 42);
        assert_eq!(params.chain.london_block, Some(100));
        assert_eq!(params.chain.shanghai_block, None);
    }

    #[test]
    fn test_london_before_berlin_rejected() {
        let result = EvmParams::from_toml_str(
            r#"
            [chain]
            berlin_block = 10
            london_block = 5
            "#,
        );
        assert!(matches!(result, Err(ExecutionError::Config(_))));
    }

    #[test]
    fn test_refund_quotient_follows_london() {
        let header = BlockHeader {
            height: 5,
            hash: H256::zero(),
            time: 0,
            proposer: Address::zero(),
            gas_limit: 10_000_000,
        };
        let mut params = EvmParams::default();
        params.chain.london_block = Some(10);
        assert_eq!(ExecutionConfig::new(params.clone(), &header, None).refund_quotient(), 2);
        params.chain.london_block = Some(5);
        assert_eq!(ExecutionConfig::new(params, &header, None).refund_quotient(), 5);
    }

    #[test]
    fn test_fee_market_sanitize() {
        let params = FeeMarketParams {
            elasticity_multiplier: 0,
            ..Default::default()
        }
        .sanitize();
        assert_eq!(params.elasticity_multiplier, 2);
    }
}
