// tessera/core/execution/src/error.rs

use tessera_primitives::{Address, EnvelopeError, GasError};
use thiserror::Error;

use crate::ledger::LedgerError;

/// Hard failures of transaction application. VM-level faults (revert, out
/// of gas, invalid opcode) are not errors; they are reported in
/// [`ExecutionResult::vm_error`](crate::ExecutionResult).
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("intrinsic gas too low: have {have}, want {want}")]
    IntrinsicGas { have: u64, want: u64 },

    #[error("contract creation is disabled")]
    CreateDisabled,

    #[error("contract call is disabled")]
    CallDisabled,

    #[error("gas overflow: {0}")]
    GasOverflow(&'static str),

    #[error(transparent)]
    Gas(#[from] GasError),

    #[error("failed to decode native message: {0}")]
    Decode(#[from] EnvelopeError),

    #[error("message signer {signer:?} does not match transaction sender {sender:?}")]
    SignerMismatch {
        signer: Option<Address>,
        sender: Address,
    },

    #[error("native message must not wrap a VM transaction")]
    NestedVmTransaction,

    #[error("can't route message {0}")]
    UnroutableMessage(String),

    #[error("route {0} already registered")]
    DuplicateRoute(String),

    #[error("invalid native message: {0:#}")]
    InvalidMessage(anyhow::Error),

    #[error("native message failed: {0:#}")]
    MessageFailed(anyhow::Error),

    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("state database error: {0}")]
    State(String),

    #[error("failed to refund leftover gas: {0}")]
    RefundFailed(LedgerError),

    #[error("no block in progress")]
    NoActiveBlock,

    #[error("invalid config: {0}")]
    Config(String),
}
