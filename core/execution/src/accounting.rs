// tessera/core/execution/src/accounting.rs

//! Block-scoped gas and log bookkeeping.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tessera_primitives::Bloom;

use crate::error::ExecutionError;

/// Counters cleared at every block start.
#[derive(Debug, Clone, Default)]
struct Transient {
    tx_index: u64,
    log_size: u64,
    gas_used: u64,
    bloom: Bloom,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSummary {
    pub height: u64,
    pub gas_used: u64,
    pub bloom: Bloom,
}

#[derive(Debug, Default)]
pub struct BlockAccounting {
    height: u64,
    transient: Transient,
    blooms: BTreeMap<u64, Bloom>,
    gas_used: BTreeMap<u64, u64>,
}

impl BlockAccounting {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self, height: u64) {
        self.height = height;
        self.transient = Transient::default();
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn tx_index(&self) -> u64 {
        self.transient.tx_index
    }

    pub fn log_size(&self) -> u64 {
        self.transient.log_size
    }

    pub fn transient_gas_used(&self) -> u64 {
        self.transient.gas_used
    }

    pub fn transient_bloom(&self) -> Bloom {
        self.transient.bloom
    }

    pub fn increment_tx_index(&mut self) {
        self.transient.tx_index += 1;
    }

    pub fn add_log_size(&mut self, logs: u64) {
        self.transient.log_size += logs;
    }

    pub fn accrue_bloom(&mut self, bloom: &Bloom) {
        self.transient.bloom.accrue_bloom(bloom);
    }

    /// Adds `gas` to the block total, failing rather than wrapping.
    pub fn add_transient_gas_used(&mut self, gas: u64) -> Result<u64, ExecutionError> {
        let total = self
            .transient
            .gas_used
            .checked_add(gas)
            .ok_or(ExecutionError::GasOverflow("transient gas used"))?;
        self.transient.gas_used = total;
        Ok(total)
    }

    /// Moves the block bloom and gas into the per-height index.
    pub fn finalize(&mut self, block_gas_limit: u64) -> BlockSummary {
        let gas_used = self.transient.gas_used.min(block_gas_limit);
        let bloom = std::mem::take(&mut self.transient.bloom);
        self.blooms.insert(self.height, bloom);
        self.gas_used.insert(self.height, gas_used);
        BlockSummary {
            height: self.height,
            gas_used,
            bloom,
        }
    }

    pub fn block_bloom(&self, height: u64) -> Option<Bloom> {
        self.blooms.get(&height).copied()
    }

    pub fn block_gas_used(&self, height: u64) -> Option<u64> {
        self.gas_used.get(&height).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_primitives::BloomInput;

    #[test]
    fn test_gas_overflow_is_an_error() {
        let mut accounting = BlockAccounting::new();
        accounting.add_transient_gas_used(u64::MAX - 1).unwrap();
        assert!(matches!(
            accounting.add_transient_gas_used(2),
            Err(ExecutionError::GasOverflow(_))
        ));
        assert_eq!(accounting.transient_gas_used(), u64::MAX - 1);
    }

    #[test]
    fn test_reset_and_finalize() {
        let mut accounting = BlockAccounting::new();
        accounting.reset(3);
        let mut bloom = Bloom::zero();
        bloom.accrue(BloomInput::Raw(b"topic"));
        accounting.accrue_bloom(&bloom);
        accounting.add_log_size(2);
        accounting.increment_tx_index();
        accounting.add_transient_gas_used(50_000).unwrap();

        let summary = accounting.finalize(30_000);
        assert_eq!(summary.gas_used, 30_000);
        assert_eq!(summary.bloom, bloom);
        assert_eq!(accounting.block_bloom(3), Some(bloom));
        assert_eq!(accounting.transient_bloom(), Bloom::zero());

        accounting.reset(4);
        assert_eq!(accounting.tx_index(), 0);
        assert_eq!(accounting.log_size(), 0);
        assert_eq!(accounting.transient_gas_used(), 0);
        assert_eq!(accounting.block_bloom(3), Some(bloom));
    }
}
