// tessera/core/sequencer/src/config.rs

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tessera_primitives::U256;
use tracing::warn;

/// Transaction pool configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxPoolConfig {
    /// Minimum fee increase, in percent, for replacing a same-nonce transaction
    #[serde(default = "default_price_bump")]
    pub price_bump: u64,

    /// Executable transactions guaranteed per account when trimming
    #[serde(default = "default_account_slots")]
    pub account_slots: usize,

    /// Ceiling of executable transactions across all accounts
    #[serde(default = "default_global_slots")]
    pub global_slots: usize,

    /// Ceiling of non-executable transactions across all accounts
    #[serde(default = "default_global_queue")]
    pub global_queue: usize,

    /// Idle time after which an account's queued transactions are evicted
    #[serde(default = "default_lifetime_secs")]
    pub lifetime_secs: u64,

    /// Maximum encoded transaction size in bytes
    #[serde(default = "default_max_tx_size")]
    pub max_tx_size: usize,

    /// Gas price reported when no minimum is configured
    #[serde(default = "default_gas_price")]
    pub default_gas_price: U256,

    /// Operator minimum gas price; zero means unset
    #[serde(default)]
    pub min_gas_price: U256,

    /// Denomination of the fee carried in broadcast ledger transactions
    #[serde(default = "default_evm_denom")]
    pub evm_denom: String,

    #[serde(default = "default_stats_interval")]
    pub stats_interval_secs: u64,

    #[serde(default = "default_evict_interval")]
    pub evict_interval_secs: u64,

    #[serde(default = "default_process_queue_interval")]
    pub process_queue_interval_secs: u64,

    #[serde(default = "default_process_pending_interval")]
    pub process_pending_interval_secs: u64,
}

fn default_price_bump() -> u64 {
    10
}

fn default_account_slots() -> usize {
    16
}

fn default_global_slots() -> usize {
    4096
}

fn default_global_queue() -> usize {
    1024
}

fn default_lifetime_secs() -> u64 {
    3 * 3600 // 3 hours
}

fn default_max_tx_size() -> usize {
    128 * 1024
}

fn default_gas_price() -> U256 {
    U256::from(1_000_000_000u64) // 1 gwei
}

fn default_evm_denom() -> String {
    "wei".to_string()
}

fn default_stats_interval() -> u64 {
    8
}

fn default_evict_interval() -> u64 {
    60
}

fn default_process_queue_interval() -> u64 {
    5
}

fn default_process_pending_interval() -> u64 {
    5
}

impl Default for TxPoolConfig {
    fn default() -> Self {
        Self {
            price_bump: default_price_bump(),
            account_slots: default_account_slots(),
            global_slots: default_global_slots(),
            global_queue: default_global_queue(),
            lifetime_secs: default_lifetime_secs(),
            max_tx_size: default_max_tx_size(),
            default_gas_price: default_gas_price(),
            min_gas_price: U256::zero(),
            evm_denom: default_evm_denom(),
            stats_interval_secs: default_stats_interval(),
            evict_interval_secs: default_evict_interval(),
            process_queue_interval_secs: default_process_queue_interval(),
            process_pending_interval_secs: default_process_pending_interval(),
        }
    }
}

impl TxPoolConfig {
    /// Replaces unusable values with their defaults.
    pub fn validate(mut self) -> Self {
        let defaults = Self::default();
        if self.price_bump < 1 {
            warn!(provided = self.price_bump, updated = defaults.price_bump, "Sanitizing invalid txpool price bump");
            self.price_bump = defaults.price_bump;
        }
        if self.account_slots < 1 {
            warn!(provided = self.account_slots, updated = defaults.account_slots, "Sanitizing invalid txpool account slots");
            self.account_slots = defaults.account_slots;
        }
        if self.global_slots < 1 {
            warn!(provided = self.global_slots, updated = defaults.global_slots, "Sanitizing invalid txpool global slots");
            self.global_slots = defaults.global_slots;
        }
        if self.global_queue < 1 {
            warn!(provided = self.global_queue, updated = defaults.global_queue, "Sanitizing invalid txpool global queue");
            self.global_queue = defaults.global_queue;
        }
        if self.lifetime_secs < 1 {
            warn!(provided = self.lifetime_secs, updated = defaults.lifetime_secs, "Sanitizing invalid txpool lifetime");
            self.lifetime_secs = defaults.lifetime_secs;
        }
        if self.max_tx_size < 1 {
            warn!(provided = self.max_tx_size, updated = defaults.max_tx_size, "Sanitizing invalid txpool max tx size");
            self.max_tx_size = defaults.max_tx_size;
        }
        for (interval, default, name) in [
            (&mut self.stats_interval_secs, defaults.stats_interval_secs, "stats"),
            (&mut self.evict_interval_secs, defaults.evict_interval_secs, "evict"),
            (&mut self.process_queue_interval_secs, defaults.process_queue_interval_secs, "process queue"),
            (&mut self.process_pending_interval_secs, defaults.process_pending_interval_secs, "process pending"),
        ] {
            if *interval < 1 {
                warn!(provided = *interval, updated = default, interval = name, "Sanitizing invalid txpool interval");
                *interval = default;
            }
        }
        self
    }

    pub fn lifetime(&self) -> Duration {
        Duration::from_secs(self.lifetime_secs)
    }
}
