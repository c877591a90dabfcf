// tessera/core/execution/src/events.rs

use serde::{Deserialize, Serialize};
use tessera_primitives::{Address, Bloom, H256, U256};

/// Typed events emitted during block application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvmEvent {
    EthereumTx {
        amount: U256,
        hash: H256,
        index: u64,
        gas_used: u64,
        recipient: Option<Address>,
        contract: Option<Address>,
        /// VM error of a failed transaction.
        failed: Option<String>,
    },
    BlockBloom {
        height: u64,
        bloom: Bloom,
    },
    BlockGasUsed {
        height: u64,
        amount: u64,
    },
    BaseFee {
        height: u64,
        base_fee: U256,
    },
    NativeMessage {
        type_url: String,
        attributes: Vec<(String, String)>,
    },
    ProposalExecuted {
        proxy: Address,
        implementation: Address,
    },
}

#[derive(Debug, Default)]
pub struct EventManager {
    events: Vec<EvmEvent>,
}

impl EventManager {
    pub fn emit(&mut self, event: EvmEvent) {
        self.events.push(event);
    }

    pub fn extend(&mut self, events: impl IntoIterator<Item = EvmEvent>) {
        self.events.extend(events);
    }

    pub fn events(&self) -> &[EvmEvent] {
        &self.events
    }

    pub fn drain(&mut self) -> Vec<EvmEvent> {
        std::mem::take(&mut self.events)
    }
}
