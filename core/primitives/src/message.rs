// tessera/core/primitives/src/message.rs

use serde::{Deserialize, Serialize};

use crate::transaction::AccessList;
use crate::types::{Address, U256};

/// Sender-resolved call handed to the executors. `to == None` creates a
/// contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub from: Address,
    pub to: Option<Address>,
    pub nonce: u64,
    pub value: U256,
    pub gas_limit: u64,
    pub gas_price: U256,
    pub gas_fee_cap: U256,
    pub gas_tip_cap: U256,
    pub data: Vec<u8>,
    pub access_list: AccessList,
}

impl Message {
    pub fn is_create(&self) -> bool {
        self.to.is_none()
    }

    /// Zero-priced call, used for simulation.
    pub fn call(from: Address, to: Option<Address>, nonce: u64, gas_limit: u64, data: Vec<u8>) -> Self {
        Self {
            from,
            to,
            nonce,
            value: U256::zero(),
            gas_limit,
            gas_price: U256::zero(),
            gas_fee_cap: U256::zero(),
            gas_tip_cap: U256::zero(),
            data,
            access_list: Vec::new(),
        }
    }
}
