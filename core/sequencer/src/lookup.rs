// tessera/core/sequencer/src/lookup.rs

use std::collections::HashMap;

use tessera_primitives::H256;

use crate::list::PoolTx;

/// Every transaction tracked by the pool, pending or queued, by hash.
#[derive(Debug, Default)]
pub struct TxLookup {
    txs: HashMap<H256, PoolTx>,
}

impl TxLookup {
    pub fn get(&self, hash: &H256) -> Option<&PoolTx> {
        self.txs.get(hash)
    }

    pub fn contains(&self, hash: &H256) -> bool {
        self.txs.contains_key(hash)
    }

    pub fn add(&mut self, tx: PoolTx) {
        self.txs.insert(tx.hash(), tx);
    }

    pub fn remove(&mut self, hash: &H256) -> Option<PoolTx> {
        self.txs.remove(hash)
    }

    pub fn len(&self) -> usize {
        self.txs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.txs.is_empty()
    }

    pub fn hashes(&self) -> impl Iterator<Item = &H256> {
        self.txs.keys()
    }
}
