// tessera/core/sequencer/src/error.rs

use tessera_primitives::{GasError, H256, U256};
use thiserror::Error;

/// Admission failures. A rejected transaction leaves the pool untouched.
#[derive(Error, Debug)]
pub enum PoolError {
    #[error("already known: {0:?}")]
    AlreadyKnown(H256),

    #[error("replacement transaction underpriced")]
    ReplaceUnderpriced,

    #[error("transaction type not supported")]
    TxTypeNotSupported,

    #[error("oversized data: {size} > {max}")]
    OversizedData { size: usize, max: usize },

    #[error("exceeds block gas limit: {gas} > {limit}")]
    GasLimit { gas: u64, limit: u64 },

    #[error("max priority fee per gas higher than max fee per gas")]
    TipAboveFeeCap,

    #[error("invalid chain id: expected {expected}, got {got}")]
    InvalidChainId { expected: u64, got: u64 },

    #[error("invalid sender")]
    InvalidSender,

    #[error("nonce too low: next nonce {expected}, tx nonce {got}")]
    NonceTooLow { expected: u64, got: u64 },

    #[error("insufficient funds for gas * price + value: balance {balance}, cost {cost}")]
    InsufficientFunds { balance: U256, cost: U256 },

    #[error("intrinsic gas too low: have {have}, want {want}")]
    IntrinsicGas { have: u64, want: u64 },

    #[error(transparent)]
    Gas(#[from] GasError),
}

impl PoolError {
    /// Label for the rejection metric.
    pub fn reason(&self) -> &'static str {
        match self {
            PoolError::AlreadyKnown(_) => "already_known",
            PoolError::ReplaceUnderpriced => "replace_underpriced",
            PoolError::TxTypeNotSupported => "tx_type_not_supported",
            PoolError::OversizedData { .. } => "oversized_data",
            PoolError::GasLimit { .. } => "gas_limit",
            PoolError::TipAboveFeeCap => "tip_above_fee_cap",
            PoolError::InvalidChainId { .. } => "invalid_chain_id",
            PoolError::InvalidSender => "invalid_sender",
            PoolError::NonceTooLow { .. } => "nonce_too_low",
            PoolError::InsufficientFunds { .. } => "insufficient_funds",
            PoolError::IntrinsicGas { .. } | PoolError::Gas(_) => "intrinsic_gas",
        }
    }
}

/// Failure handing a ledger transaction to consensus.
#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("failed to encode ledger transaction: {0}")]
    Encode(#[from] tessera_primitives::EnvelopeError),

    #[error("consensus queue rejected transaction: {0}")]
    Rejected(String),

    #[error("consensus queue closed")]
    Closed,
}
