// tessera/core/sequencer/src/broadcast.rs

//! Hand-off of executable transactions to the consensus transaction queue.

use async_trait::async_trait;
use tessera_primitives::{Coin, LedgerTx, LedgerTxMessage, VerifiedTransaction, U256};
use tokio::sync::mpsc;

use crate::error::SubmitError;

#[async_trait]
pub trait ConsensusQueue: Send + Sync {
    async fn submit(&self, payload: Vec<u8>) -> Result<(), SubmitError>;
}

/// Wraps `tx` in the ledger's transaction envelope. The fee covers the full
/// gas limit at the fee cap.
pub fn build_ledger_tx(tx: &VerifiedTransaction, denom: &str) -> LedgerTx {
    LedgerTx {
        messages: vec![LedgerTxMessage::EthereumTx {
            raw: tx.encode(),
            hash: tx.hash(),
            from: tx.sender,
        }],
        fee: Coin {
            denom: denom.to_string(),
            amount: U256::from(tx.gas_limit).saturating_mul(tx.fee_cap),
        },
        gas_limit: tx.gas_limit,
    }
}

/// Queue forwarding payloads over an unbounded channel.
pub struct ChannelQueue {
    sender: mpsc::UnboundedSender<Vec<u8>>,
}

impl ChannelQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Vec<u8>>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl ConsensusQueue for ChannelQueue {
    async fn submit(&self, payload: Vec<u8>) -> Result<(), SubmitError> {
        self.sender.send(payload).map_err(|_| SubmitError::Closed)
    }
}
