// tessera/core/primitives/src/lib.rs

//! Shared types for the tessera execution core and transaction pool.

pub mod chain;
pub mod envelope;
pub mod gas;
pub mod message;
pub mod transaction;
pub mod types;

pub use chain::{ChainRules, Forks};
pub use envelope::{Coin, EnvelopeError, LedgerTx, LedgerTxMessage, NativeMessage};
pub use gas::{gas_to_refund, intrinsic_gas, GasError};
pub use message::Message;
pub use transaction::{
    AccessList, AccessListItem, Signature, SignedTransaction, Transaction, TxError, TxType,
    VerifiedTransaction,
};
pub use types::{
    create_address, keccak256, logs_bloom, Address, Bloom, BloomInput, Log, H256, U256,
    EMPTY_CODE_HASH, NATIVE_MESSAGE_ADDRESS,
};
