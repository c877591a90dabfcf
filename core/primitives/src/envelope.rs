// tessera/core/primitives/src/envelope.rs

//! Binary envelopes exchanged with the host ledger: native messages carried
//! inside transaction payloads, and the ledger transaction the pool submits
//! to consensus.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Address, H256, U256};

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("malformed envelope: {0}")]
    Malformed(#[from] bincode::Error),

    #[error("envelope has no type url")]
    MissingTypeUrl,
}

/// A ledger-native message wrapped in a VM transaction's payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeMessage {
    pub type_url: String,
    pub signers: Vec<Address>,
    pub body: Vec<u8>,
}

impl NativeMessage {
    /// Type URL of the VM transaction message itself.
    pub const ETHEREUM_TX_TYPE_URL: &'static str = "/tessera.evm.v1.MsgEthereumTx";

    pub fn new(type_url: impl Into<String>, signer: Address, body: Vec<u8>) -> Self {
        Self {
            type_url: type_url.into(),
            signers: vec![signer],
            body,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, EnvelopeError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(payload: &[u8]) -> Result<Self, EnvelopeError> {
        let msg: NativeMessage = bincode::deserialize(payload)?;
        if msg.type_url.is_empty() {
            return Err(EnvelopeError::MissingTypeUrl);
        }
        Ok(msg)
    }

    pub fn is_vm_transaction(&self) -> bool {
        self.type_url == Self::ETHEREUM_TX_TYPE_URL
    }

    pub fn signer(&self) -> Option<Address> {
        self.signers.first().copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerTxMessage {
    EthereumTx {
        raw: Vec<u8>,
        hash: H256,
        from: Address,
    },
}

/// Ledger-native transaction the pool submits to the consensus queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTx {
    pub messages: Vec<LedgerTxMessage>,
    pub fee: Coin,
    pub gas_limit: u64,
}

impl LedgerTx {
    pub fn encode(&self) -> Result<Vec<u8>, EnvelopeError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(raw: &[u8]) -> Result<Self, EnvelopeError> {
        Ok(bincode::deserialize(raw)?)
    }
}
