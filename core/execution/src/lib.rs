// tessera/core/execution/src/lib.rs

// Re-export modules
pub mod accounting;
pub mod config;
pub mod council;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod executor;
pub mod fee_market;
pub mod hooks;
pub mod ledger;
pub mod metrics;
pub mod native;
pub mod result;
pub mod state;
pub mod tracer;

mod revm_adapter;
mod vm;

pub use accounting::{BlockAccounting, BlockSummary};
pub use config::{BlockHeader, EvmParams, ExecutionConfig, FeeMarketParams, TxConfig};
pub use council::{
    CouncilConfig, CouncilError, DirectiveOutcome, ImplementationSource, ProposalCouncil,
    UpgradeDirective,
};
pub use dispatch::Dispatch;
pub use error::ExecutionError;
pub use events::{EventManager, EvmEvent};
pub use executor::{default_fee_collector, Executor};
pub use fee_market::{calculate_base_fee, ParentBlock};
pub use hooks::PostTxHook;
pub use ledger::{AccountState, LedgerError, LedgerState, MemoryLedger};
pub use native::{HandlerResponse, MessageHandler, MessageRouter, MsgServiceRouter};
pub use result::{ExecutionResult, Receipt, ERR_POST_TX_PROCESSING};
pub use revm_adapter::{ERR_EXECUTION_REVERTED, ERR_INSUFFICIENT_BALANCE};
pub use state::{BlockHashContext, Checkpoint, StateError, StateView};
pub use tracer::{NoopTracer, Tracer};
