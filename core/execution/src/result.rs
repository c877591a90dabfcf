// tessera/core/execution/src/result.rs

use serde::{Deserialize, Serialize};
use tessera_primitives::{Address, Bloom, Log, H256};

use crate::revm_adapter::ERR_EXECUTION_REVERTED;

/// VM error reported when a post-transaction hook rejects the transaction.
pub const ERR_POST_TX_PROCESSING: &str = "failed to execute post processing";

/// Outcome of one applied message. VM faults are data here, not errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub hash: H256,
    pub gas_used: u64,
    /// Empty on success.
    pub vm_error: String,
    /// Return data, revert data, or the deployed code of a create.
    pub ret: Vec<u8>,
    pub logs: Vec<Log>,
    pub bloom: Bloom,
    pub contract_address: Option<Address>,
}

impl ExecutionResult {
    pub fn failed(&self) -> bool {
        !self.vm_error.is_empty()
    }

    /// Revert payload when the VM stopped on REVERT.
    pub fn revert(&self) -> Option<&[u8]> {
        (self.vm_error == ERR_EXECUTION_REVERTED).then_some(self.ret.as_slice())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub tx_hash: H256,
    pub tx_index: u64,
    pub block_number: u64,
    pub status: bool,
    pub gas_used: u64,
    pub cumulative_gas_used: u64,
    pub logs: Vec<Log>,
    pub bloom: Bloom,
    pub contract_address: Option<Address>,
}
