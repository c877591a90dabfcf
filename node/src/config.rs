// tessera/node/src/config.rs

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tessera_execution::{CouncilConfig, EvmParams, FeeMarketParams};
use tessera_sequencer::TxPoolConfig;

use crate::logging::LogConfig;

/// Node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// VM parameters, including fork activation heights
    pub evm: EvmParams,

    pub fee_market: FeeMarketParams,

    pub txpool: TxPoolConfig,

    pub council: CouncilConfig,

    /// Consensus block gas cap; -1 means unlimited
    pub max_block_gas: i64,

    pub log: LogConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            evm: EvmParams::default(),
            fee_market: FeeMarketParams::default(),
            txpool: TxPoolConfig::default(),
            council: CouncilConfig::default(),
            max_block_gas: -1,
            log: LogConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Loads the configuration at `path`, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&source)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn from_toml_str(source: &str) -> anyhow::Result<Self> {
        let mut config: Self = toml::from_str(source)?;
        config.evm.validate()?;
        config.fee_market = config.fee_market.sanitize();
        config.txpool = config.txpool.validate();
        Ok(config)
    }
}
