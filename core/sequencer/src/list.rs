// tessera/core/sequencer/src/list.rs

//! Nonce-sorted transactions of a single account.

use std::collections::BTreeMap;
use std::sync::Arc;

use tessera_primitives::{VerifiedTransaction, U256};

pub type PoolTx = Arc<VerifiedTransaction>;

/// Transactions of one account keyed by nonce. A strict list (pending)
/// invalidates every later nonce when one is filtered out, since they can
/// no longer execute.
#[derive(Debug, Clone)]
pub struct TxList {
    strict: bool,
    txs: BTreeMap<u64, PoolTx>,
}

impl TxList {
    pub fn new(strict: bool) -> Self {
        Self {
            strict,
            txs: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.txs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.txs.is_empty()
    }

    pub fn get(&self, nonce: u64) -> Option<&PoolTx> {
        self.txs.get(&nonce)
    }

    pub fn overlaps(&self, tx: &VerifiedTransaction) -> bool {
        self.txs.contains_key(&tx.nonce())
    }

    pub fn first_nonce(&self) -> Option<u64> {
        self.txs.keys().next().copied()
    }

    pub fn last(&self) -> Option<&PoolTx> {
        self.txs.values().next_back()
    }

    /// Inserts `tx`, replacing a same-nonce transaction only when both its
    /// fee cap and tip cap beat the old ones by `price_bump` percent.
    /// Returns whether it was inserted and the replaced transaction.
    pub fn add(&mut self, tx: PoolTx, price_bump: u64) -> (bool, Option<PoolTx>) {
        if let Some(old) = self.txs.get(&tx.nonce()) {
            if !meets_price_bump(old, &tx, price_bump) {
                return (false, None);
            }
        }
        let old = self.txs.insert(tx.nonce(), tx);
        (true, old)
    }

    /// Removes every transaction with a nonce below `threshold`.
    pub fn forward(&mut self, threshold: u64) -> Vec<PoolTx> {
        let keep = self.txs.split_off(&threshold);
        std::mem::replace(&mut self.txs, keep).into_values().collect()
    }

    /// Removes transactions costing more than `cost_limit` or using more
    /// than `gas_limit`. For strict lists every transaction after the
    /// lowest removed nonce is returned separately as invalidated.
    pub fn filter(&mut self, cost_limit: U256, gas_limit: u64) -> (Vec<PoolTx>, Vec<PoolTx>) {
        let dropped: Vec<u64> = self
            .txs
            .iter()
            .filter(|(_, tx)| tx.cost() > cost_limit || tx.gas_limit > gas_limit)
            .map(|(nonce, _)| *nonce)
            .collect();
        let Some(lowest) = dropped.first().copied() else {
            return (Vec::new(), Vec::new());
        };
        let removed = dropped
            .iter()
            .filter_map(|nonce| self.txs.remove(nonce))
            .collect();
        let invalids = if self.strict {
            self.txs.split_off(&lowest).into_values().collect()
        } else {
            Vec::new()
        };
        (removed, invalids)
    }

    /// Keeps the `threshold` lowest nonces and returns the rest.
    pub fn cap(&mut self, threshold: usize) -> Vec<PoolTx> {
        match self.txs.keys().nth(threshold).copied() {
            Some(nonce) => self.txs.split_off(&nonce).into_values().collect(),
            None => Vec::new(),
        }
    }

    /// Removes the highest nonce.
    pub fn pop_last(&mut self) -> Option<PoolTx> {
        self.txs.pop_last().map(|(_, tx)| tx)
    }

    /// Removes the transaction with `nonce`. For strict lists later nonces
    /// are removed too and returned as invalidated.
    pub fn remove(&mut self, nonce: u64) -> (bool, Vec<PoolTx>) {
        if self.txs.remove(&nonce).is_none() {
            return (false, Vec::new());
        }
        let invalids = if self.strict {
            self.txs.split_off(&nonce).into_values().collect()
        } else {
            Vec::new()
        };
        (true, invalids)
    }

    /// Pops the nonce-contiguous run starting at the lowest nonce, provided
    /// that nonce is not above `start`.
    pub fn ready(&mut self, start: u64) -> Vec<PoolTx> {
        let Some(mut next) = self.first_nonce() else {
            return Vec::new();
        };
        if next > start {
            return Vec::new();
        }
        let mut ready = Vec::new();
        while let Some(tx) = self.txs.remove(&next) {
            ready.push(tx);
            next += 1;
        }
        ready
    }

    /// All transactions in nonce order.
    pub fn flatten(&self) -> Vec<PoolTx> {
        self.txs.values().cloned().collect()
    }
}

fn meets_price_bump(old: &VerifiedTransaction, new: &VerifiedTransaction, price_bump: u64) -> bool {
    if new.fee_cap <= old.fee_cap || new.tip_cap <= old.tip_cap {
        return false;
    }
    let bump = U256::from(100 + price_bump);
    let fee_threshold = old.fee_cap.saturating_mul(bump) / 100;
    let tip_threshold = old.tip_cap.saturating_mul(bump) / 100;
    new.fee_cap >= fee_threshold && new.tip_cap >= tip_threshold
}
