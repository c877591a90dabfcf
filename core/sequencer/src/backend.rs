// tessera/core/sequencer/src/backend.rs

//! Chain state the pool validates against.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;
use tessera_execution::LedgerState;
use tessera_primitives::{Address, ChainRules, H256, U256};

/// Read access the pool needs. Every call observes the latest state.
pub trait PoolState: Send + Sync {
    fn nonce(&self, address: &Address) -> u64;
    fn balance(&self, address: &Address) -> U256;
    fn block_gas_limit(&self) -> u64;
    fn head_height(&self) -> u64;
    fn chain_rules(&self) -> ChainRules;
    /// Whether the ledger already includes a transaction with `hash`.
    fn is_included(&self, hash: &H256) -> bool;
}

/// Block gas cap from consensus parameters, where -1 means unlimited.
pub fn block_max_gas_from_consensus(max_gas: i64) -> u64 {
    if max_gas < 0 {
        u64::from(u32::MAX)
    } else {
        max_gas as u64
    }
}

#[derive(Debug, Clone, Copy)]
struct ChainHead {
    height: u64,
    block_gas_limit: u64,
}

/// [`PoolState`] reading accounts straight from the ledger.
pub struct LedgerPoolState {
    ledger: Arc<dyn LedgerState>,
    rules: ChainRules,
    head: RwLock<ChainHead>,
    included: RwLock<HashSet<H256>>,
}

impl LedgerPoolState {
    pub fn new(ledger: Arc<dyn LedgerState>, rules: ChainRules, max_gas: i64) -> Self {
        Self {
            ledger,
            rules,
            head: RwLock::new(ChainHead {
                height: 0,
                block_gas_limit: block_max_gas_from_consensus(max_gas),
            }),
            included: RwLock::new(HashSet::new()),
        }
    }

    /// Advances the head after a block commit.
    pub fn set_head(&self, height: u64, max_gas: i64) {
        *self.head.write() = ChainHead {
            height,
            block_gas_limit: block_max_gas_from_consensus(max_gas),
        };
    }

    pub fn mark_included(&self, hashes: impl IntoIterator<Item = H256>) {
        self.included.write().extend(hashes);
    }
}

impl PoolState for LedgerPoolState {
    fn nonce(&self, address: &Address) -> u64 {
        self.ledger.nonce(address)
    }

    fn balance(&self, address: &Address) -> U256 {
        self.ledger.balance(address)
    }

    fn block_gas_limit(&self) -> u64 {
        self.head.read().block_gas_limit
    }

    fn head_height(&self) -> u64 {
        self.head.read().height
    }

    fn chain_rules(&self) -> ChainRules {
        self.rules.clone()
    }

    fn is_included(&self, hash: &H256) -> bool {
        self.included.read().contains(hash)
    }
}
