// tessera/core/sequencer/src/pool.rs

//! Nonce-ordered transaction pool feeding the consensus queue.
//!
//! Every account keeps two lists: `pending` holds the nonce-contiguous run
//! starting at the account's ledger nonce, `queue` holds everything waiting
//! on a gap or on funds. A transaction lives in at most one of them and is
//! indexed by hash in `all` exactly while it does.

use std::collections::HashMap;
use std::sync::Arc;

use tessera_primitives::{
    intrinsic_gas, Address, SignedTransaction, TxType, VerifiedTransaction, H256, U256,
};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::backend::PoolState;
use crate::broadcast::{build_ledger_tx, ConsensusQueue};
use crate::config::TxPoolConfig;
use crate::error::{PoolError, SubmitError};
use crate::list::{PoolTx, TxList};
use crate::lookup::TxLookup;
use crate::metrics::{record_dropped, record_occupancy, POOL_BROADCAST_TOTAL, POOL_REJECTIONS_TOTAL};

/// Pool statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    pub pending: usize,
    pub queued: usize,
}

/// Snapshot of pooled transactions per account, in nonce order.
#[derive(Debug, Clone, Default)]
pub struct PoolContent {
    pub pending: HashMap<Address, Vec<PoolTx>>,
    pub queued: HashMap<Address, Vec<PoolTx>>,
}

#[derive(Default)]
struct PoolInner {
    pending: HashMap<Address, TxList>,
    queue: HashMap<Address, TxList>,
    /// Last activity per account, consulted by eviction.
    beats: HashMap<Address, Instant>,
    all: TxLookup,
}

pub struct TxPool {
    config: TxPoolConfig,
    state: Arc<dyn PoolState>,
    consensus: Arc<dyn ConsensusQueue>,
    inner: RwLock<PoolInner>,
}

impl TxPool {
    pub fn new(
        config: TxPoolConfig,
        state: Arc<dyn PoolState>,
        consensus: Arc<dyn ConsensusQueue>,
    ) -> Self {
        Self {
            config: config.validate(),
            state,
            consensus,
            inner: RwLock::new(PoolInner::default()),
        }
    }

    pub fn config(&self) -> &TxPoolConfig {
        &self.config
    }

    /// Operator minimum gas price, falling back to the default price.
    pub fn min_gas_price(&self) -> U256 {
        if self.config.min_gas_price.is_zero() {
            self.config.default_gas_price
        } else {
            self.config.min_gas_price
        }
    }

    /// Validates `tx` and adds it to the pool. Returns whether it replaced
    /// a pooled transaction with the same nonce.
    pub async fn add(&self, tx: SignedTransaction) -> Result<bool, PoolError> {
        let hash = tx.hash();
        let result = self.add_inner(tx).await;
        match &result {
            Ok(replaced) => debug!(?hash, replaced, "Pooled transaction"),
            Err(err) => {
                debug!(?hash, error = %err, "Rejected transaction");
                POOL_REJECTIONS_TOTAL.with_label_values(&[err.reason()]).inc();
            }
        }
        result
    }

    async fn add_inner(&self, tx: SignedTransaction) -> Result<bool, PoolError> {
        let hash = tx.hash();
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        if inner.all.contains(&hash) || self.state.is_included(&hash) {
            return Err(PoolError::AlreadyKnown(hash));
        }
        let tx = Arc::new(self.validate_tx(tx)?);
        let from = tx.sender;

        if let Some(list) = inner.pending.get_mut(&from) {
            if list.overlaps(&tx) {
                let (inserted, old) = list.add(tx.clone(), self.config.price_bump);
                if !inserted {
                    return Err(PoolError::ReplaceUnderpriced);
                }
                if let Some(old) = &old {
                    inner.all.remove(&old.hash());
                }
                inner.all.add(tx);
                inner.beats.insert(from, Instant::now());
                return Ok(old.is_some());
            }
        }
        inner.enqueue(tx, self.config.price_bump)
    }

    fn validate_tx(&self, tx: SignedTransaction) -> Result<VerifiedTransaction, PoolError> {
        let rules = self.state.chain_rules();
        let height = self.state.head_height();
        match tx.tx_type {
            TxType::Legacy if !tx.is_protected() => return Err(PoolError::TxTypeNotSupported),
            TxType::AccessList => return Err(PoolError::TxTypeNotSupported),
            TxType::DynamicFee if !rules.is_london(height) => {
                return Err(PoolError::TxTypeNotSupported)
            }
            _ => {}
        }
        match tx.chain_id {
            Some(got) if got != rules.chain_id => {
                return Err(PoolError::InvalidChainId {
                    expected: rules.chain_id,
                    got,
                })
            }
            _ => {}
        }

        let size = tx.size();
        if size > self.config.max_tx_size {
            return Err(PoolError::OversizedData {
                size,
                max: self.config.max_tx_size,
            });
        }
        let limit = self.state.block_gas_limit();
        if tx.gas_limit > limit {
            return Err(PoolError::GasLimit {
                gas: tx.gas_limit,
                limit,
            });
        }
        if tx.tip_cap > tx.fee_cap {
            return Err(PoolError::TipAboveFeeCap);
        }

        let tx = VerifiedTransaction::recover(tx).map_err(|_| PoolError::InvalidSender)?;
        let expected = self.state.nonce(&tx.sender);
        if tx.nonce() < expected {
            return Err(PoolError::NonceTooLow {
                expected,
                got: tx.nonce(),
            });
        }
        let balance = self.state.balance(&tx.sender);
        let cost = tx.cost();
        if balance < cost {
            return Err(PoolError::InsufficientFunds { balance, cost });
        }
        let want = intrinsic_gas(
            &tx.data,
            Some(&tx.access_list),
            tx.to.is_none(),
            rules.is_shanghai(height),
        )?;
        if tx.gas_limit < want {
            return Err(PoolError::IntrinsicGas {
                have: tx.gas_limit,
                want,
            });
        }
        Ok(tx)
    }

    pub async fn get(&self, hash: &H256) -> Option<PoolTx> {
        self.inner.read().await.all.get(hash).cloned()
    }

    /// Whether the pool holds `hash` or the ledger already included it.
    pub async fn has(&self, hash: &H256) -> bool {
        self.inner.read().await.all.contains(hash) || self.state.is_included(hash)
    }

    /// Next nonce for `address`, counting its pending transactions.
    pub async fn nonce(&self, address: &Address) -> u64 {
        let inner = self.inner.read().await;
        pending_nonce(&inner.pending, self.state.as_ref(), address)
    }

    pub async fn stats(&self) -> PoolStats {
        self.inner.read().await.stats()
    }

    /// Number of transactions indexed by hash.
    pub async fn len(&self) -> usize {
        self.inner.read().await.all.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.all.is_empty()
    }

    pub async fn content(&self) -> PoolContent {
        let inner = self.inner.read().await;
        PoolContent {
            pending: flatten_lists(&inner.pending),
            queued: flatten_lists(&inner.queue),
        }
    }

    /// Removes `hash` from the pool. Later pending transactions of the same
    /// account can no longer execute and move back to the queue.
    pub async fn remove(&self, hash: &H256) -> bool {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        let Some(tx) = inner.all.remove(hash) else {
            return false;
        };
        let from = tx.sender;
        let nonce = tx.nonce();

        if let Some(list) = inner.pending.get_mut(&from) {
            if list.get(nonce).is_some_and(|pooled| pooled.hash() == *hash) {
                let (_, invalids) = list.remove(nonce);
                if list.is_empty() {
                    inner.pending.remove(&from);
                }
                for invalid in invalids {
                    inner.demote(invalid, self.config.price_bump);
                }
                return true;
            }
        }
        if let Some(list) = inner.queue.get_mut(&from) {
            list.remove(nonce);
            if list.is_empty() {
                inner.queue.remove(&from);
                inner.beats.remove(&from);
            }
        }
        true
    }

    /// Moves executable queued transactions to pending, returns no longer
    /// executable pending ones to the queue and trims both to capacity.
    pub async fn process_queue(&self) {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        let state = self.state.as_ref();
        let gas_limit = state.block_gas_limit();
        let bump = self.config.price_bump;

        let accounts: Vec<Address> = inner.queue.keys().copied().collect();
        inner.promote_executables(state, &accounts, gas_limit, bump);
        inner.demote_unexecutables(state, gas_limit, bump);
        inner.truncate_pending(self.config.global_slots, self.config.account_slots);
        inner.truncate_queue(self.config.global_queue);

        let stats = inner.stats();
        record_occupancy(stats.pending, stats.queued);
    }

    /// Hands the contiguous head of every pending list to the consensus
    /// queue. Submitted transactions leave the pool whatever the outcome.
    pub async fn process_pending(&self) {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        let accounts: Vec<Address> = inner.pending.keys().copied().collect();

        for address in accounts {
            let start = pending_nonce(&inner.pending, self.state.as_ref(), &address);
            let ready = match inner.pending.get_mut(&address) {
                Some(list) => list.ready(start),
                None => continue,
            };
            for tx in ready {
                inner.all.remove(&tx.hash());
                match self.broadcast(&tx).await {
                    Ok(()) => {
                        POOL_BROADCAST_TOTAL.with_label_values(&["success"]).inc();
                        debug!(hash = ?tx.hash(), sender = ?address, nonce = tx.nonce(), "Broadcast transaction");
                    }
                    Err(err) => {
                        POOL_BROADCAST_TOTAL.with_label_values(&["failed"]).inc();
                        warn!(hash = ?tx.hash(), sender = ?address, error = %err, "Failed to broadcast transaction");
                    }
                }
            }
            if inner.pending.get(&address).is_some_and(TxList::is_empty) {
                inner.pending.remove(&address);
            }
        }

        let stats = inner.stats();
        record_occupancy(stats.pending, stats.queued);
    }

    async fn broadcast(&self, tx: &VerifiedTransaction) -> Result<(), SubmitError> {
        let payload = build_ledger_tx(tx, &self.config.evm_denom).encode()?;
        self.consensus.submit(payload).await
    }

    /// Drops the queued transactions of every account idle for longer than
    /// the configured lifetime.
    pub async fn evict_stale(&self) {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        let lifetime = self.config.lifetime();
        let now = Instant::now();

        let stale: Vec<Address> = inner
            .queue
            .keys()
            .filter(|address| {
                inner
                    .beats
                    .get(address)
                    .map_or(true, |beat| now.duration_since(*beat) > lifetime)
            })
            .copied()
            .collect();

        let mut evicted = 0;
        for address in stale {
            if let Some(list) = inner.queue.remove(&address) {
                for tx in list.flatten() {
                    inner.all.remove(&tx.hash());
                    evicted += 1;
                }
            }
            inner.beats.remove(&address);
            debug!(sender = ?address, "Evicted stale queued transactions");
        }
        record_dropped("evicted", evicted);
    }

    pub async fn report_stats(&self) {
        let stats = self.stats().await;
        record_occupancy(stats.pending, stats.queued);
        info!(pending = stats.pending, queued = stats.queued, "Transaction pool status");
    }
}

impl PoolInner {
    fn stats(&self) -> PoolStats {
        PoolStats {
            pending: self.pending.values().map(TxList::len).sum(),
            queued: self.queue.values().map(TxList::len).sum(),
        }
    }

    /// Inserts `tx` into its sender's queue, subject to price-bump
    /// replacement of a same-nonce queued transaction.
    fn enqueue(&mut self, tx: PoolTx, bump: u64) -> Result<bool, PoolError> {
        let from = tx.sender;
        let list = self.queue.entry(from).or_insert_with(|| TxList::new(false));
        let (inserted, old) = list.add(tx.clone(), bump);
        if !inserted {
            return Err(PoolError::ReplaceUnderpriced);
        }
        if let Some(old) = &old {
            self.all.remove(&old.hash());
        }
        self.all.add(tx);
        self.beats.entry(from).or_insert_with(Instant::now);
        Ok(old.is_some())
    }

    /// Returns a pending transaction to the queue, dropping it when the
    /// queue holds a better-priced one with the same nonce.
    fn demote(&mut self, tx: PoolTx, bump: u64) {
        let hash = tx.hash();
        if self.enqueue(tx, bump).is_err() {
            self.all.remove(&hash);
            record_dropped("demotion_underpriced", 1);
        }
    }

    /// Moves `tx` into pending. Returns false when an existing pending
    /// transaction outbids it, in which case `tx` is dropped.
    fn promote_tx(&mut self, address: Address, tx: PoolTx, bump: u64) -> bool {
        let list = self
            .pending
            .entry(address)
            .or_insert_with(|| TxList::new(true));
        let (inserted, old) = list.add(tx.clone(), bump);
        if !inserted {
            self.all.remove(&tx.hash());
            return false;
        }
        if let Some(old) = old {
            self.all.remove(&old.hash());
        }
        self.beats.insert(address, Instant::now());
        true
    }

    fn promote_executables(
        &mut self,
        state: &dyn PoolState,
        accounts: &[Address],
        gas_limit: u64,
        bump: u64,
    ) {
        for address in accounts {
            let start = pending_nonce(&self.pending, state, address);
            let ledger_nonce = state.nonce(address);
            let balance = state.balance(address);
            let Some(list) = self.queue.get_mut(address) else {
                continue;
            };

            let stale = list.forward(ledger_nonce);
            let (unaffordable, _) = list.filter(balance, gas_limit);
            let ready = list.ready(start);
            let emptied = list.is_empty();

            for tx in stale.iter().chain(unaffordable.iter()) {
                self.all.remove(&tx.hash());
            }
            record_dropped("stale", stale.len());
            record_dropped("unaffordable", unaffordable.len());

            let mut promoted = 0;
            for tx in ready {
                if self.promote_tx(*address, tx, bump) {
                    promoted += 1;
                }
            }
            if promoted > 0 {
                debug!(sender = ?address, promoted, "Promoted queued transactions");
            }
            if emptied {
                self.queue.remove(address);
                self.beats.remove(address);
            }
        }
    }

    fn demote_unexecutables(&mut self, state: &dyn PoolState, gas_limit: u64, bump: u64) {
        let accounts: Vec<Address> = self.pending.keys().copied().collect();
        for address in accounts {
            let nonce = state.nonce(&address);
            let balance = state.balance(&address);
            let Some(list) = self.pending.get_mut(&address) else {
                continue;
            };

            let stale = list.forward(nonce);
            let (unaffordable, invalids) = list.filter(balance, gas_limit);
            // A gap at the ledger nonce strands the whole list.
            let gapped = if !list.is_empty() && list.get(nonce).is_none() {
                list.cap(0)
            } else {
                Vec::new()
            };
            if list.is_empty() {
                self.pending.remove(&address);
            }

            for tx in stale.iter().chain(unaffordable.iter()) {
                self.all.remove(&tx.hash());
            }
            record_dropped("stale", stale.len());
            record_dropped("unaffordable", unaffordable.len());

            if !invalids.is_empty() || !gapped.is_empty() {
                debug!(
                    sender = ?address,
                    demoted = invalids.len() + gapped.len(),
                    "Demoted pending transactions"
                );
            }
            for tx in invalids.into_iter().chain(gapped) {
                self.demote(tx, bump);
            }
        }
    }

    /// Trims pending down to `global_slots`, taking the highest nonce of the
    /// largest account each round and never leaving an account with fewer
    /// than `account_slots`.
    fn truncate_pending(&mut self, global_slots: usize, account_slots: usize) {
        let mut total: usize = self.pending.values().map(TxList::len).sum();
        let mut dropped = 0;
        while total > global_slots {
            let Some(address) = largest_account(&self.pending, account_slots) else {
                break;
            };
            let Some(list) = self.pending.get_mut(&address) else {
                break;
            };
            let Some(tx) = list.pop_last() else {
                break;
            };
            self.all.remove(&tx.hash());
            total -= 1;
            dropped += 1;
        }
        record_dropped("pending_overflow", dropped);
    }

    /// Trims the queue down to `global_queue` the same way, without a
    /// per-account floor.
    fn truncate_queue(&mut self, global_queue: usize) {
        let mut total: usize = self.queue.values().map(TxList::len).sum();
        let mut dropped = 0;
        while total > global_queue {
            let Some(address) = largest_account(&self.queue, 0) else {
                break;
            };
            let Some(list) = self.queue.get_mut(&address) else {
                break;
            };
            if let Some(tx) = list.pop_last() {
                self.all.remove(&tx.hash());
                total -= 1;
                dropped += 1;
            }
            if list.is_empty() {
                self.queue.remove(&address);
                self.beats.remove(&address);
            }
        }
        record_dropped("queue_overflow", dropped);
    }
}

fn pending_nonce(
    pending: &HashMap<Address, TxList>,
    state: &dyn PoolState,
    address: &Address,
) -> u64 {
    let ledger = state.nonce(address);
    match pending.get(address).and_then(TxList::last) {
        Some(last) => ledger.max(last.nonce() + 1),
        None => ledger,
    }
}

/// Account holding the most transactions above `floor`, ties going to the
/// larger address.
fn largest_account(lists: &HashMap<Address, TxList>, floor: usize) -> Option<Address> {
    lists
        .iter()
        .filter(|(_, list)| list.len() > floor)
        .max_by(|a, b| a.1.len().cmp(&b.1.len()).then_with(|| a.0.cmp(b.0)))
        .map(|(address, _)| *address)
}

fn flatten_lists(lists: &HashMap<Address, TxList>) -> HashMap<Address, Vec<PoolTx>> {
    lists
        .iter()
        .map(|(address, list)| (*address, list.flatten()))
        .collect()
}
