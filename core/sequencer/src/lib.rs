// tessera/core/sequencer/src/lib.rs

pub mod backend;
pub mod broadcast;
pub mod config;
pub mod error;
pub mod list;
pub mod lookup;
pub mod metrics;
pub mod pool;
pub mod scheduler;

pub use backend::{block_max_gas_from_consensus, LedgerPoolState, PoolState};
pub use broadcast::{build_ledger_tx, ChannelQueue, ConsensusQueue};
pub use config::TxPoolConfig;
pub use error::{PoolError, SubmitError};
pub use list::{PoolTx, TxList};
pub use lookup::TxLookup;
pub use pool::{PoolContent, PoolStats, TxPool};
pub use scheduler::{PoolScheduler, PoolTask};
