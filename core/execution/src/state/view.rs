// tessera/core/execution/src/state/view.rs

//! Write-buffering view over a [`LedgerState`]. Execution mutates the view;
//! nothing reaches the ledger until [`StateView::flush`].

use std::collections::{BTreeSet, HashMap, HashSet};

use revm::{
    primitives::{
        Account, AccountInfo, Address as RevmAddress, Bytecode, Bytes, HashMap as RevmHashMap,
        B256, KECCAK_EMPTY, U256 as RevmU256,
    },
    Database, DatabaseCommit,
};
use tessera_primitives::{keccak256, Address, H256, U256, EMPTY_CODE_HASH};
use thiserror::Error;
use tracing::trace;

use super::journal::{Checkpoint, Journal, JournalEntry};
use crate::ledger::{AccountState, LedgerState};
use crate::revm_adapter::{from_revm_address, from_revm_u256, to_revm_u256};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("code {0:?} not found")]
    MissingCode(H256),

    #[error("insufficient balance for {address:?}: have {balance}, need {required}")]
    InsufficientBalance {
        address: Address,
        balance: U256,
        required: U256,
    },

    #[error("balance overflow for {0:?}")]
    BalanceOverflow(Address),

    #[error("stale checkpoint")]
    StaleCheckpoint,
}

/// Block position used to answer BLOCKHASH.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockHashContext {
    pub height: u64,
    pub hash: H256,
}

pub struct StateView<'a> {
    ledger: &'a dyn LedgerState,
    block: BlockHashContext,
    accounts: HashMap<Address, Option<AccountState>>,
    storage: HashMap<(Address, H256), H256>,
    codes: HashMap<H256, Vec<u8>>,
    wiped: HashSet<Address>,
    journal: Journal,
    dirty_accounts: BTreeSet<Address>,
    dirty_storage: BTreeSet<(Address, H256)>,
}

impl<'a> StateView<'a> {
    pub fn new(ledger: &'a dyn LedgerState, block: BlockHashContext) -> Self {
        Self {
            ledger,
            block,
            accounts: HashMap::new(),
            storage: HashMap::new(),
            codes: HashMap::new(),
            wiped: HashSet::new(),
            journal: Journal::default(),
            dirty_accounts: BTreeSet::new(),
            dirty_storage: BTreeSet::new(),
        }
    }

    pub fn account(&self, address: &Address) -> Option<AccountState> {
        match self.accounts.get(address) {
            Some(cached) => cached.clone(),
            None => self.ledger.account(address),
        }
    }

    pub fn exists(&self, address: &Address) -> bool {
        self.account(address).is_some()
    }

    pub fn nonce(&self, address: &Address) -> u64 {
        self.account(address).map(|a| a.nonce).unwrap_or_default()
    }

    pub fn balance(&self, address: &Address) -> U256 {
        self.account(address).map(|a| a.balance).unwrap_or_default()
    }

    pub fn code_hash(&self, address: &Address) -> H256 {
        self.account(address)
            .map(|a| a.code_hash)
            .unwrap_or(EMPTY_CODE_HASH)
    }

    pub fn code_for_hash(&self, code_hash: &H256) -> Option<Vec<u8>> {
        if *code_hash == EMPTY_CODE_HASH {
            return Some(Vec::new());
        }
        self.codes
            .get(code_hash)
            .cloned()
            .or_else(|| self.ledger.code(code_hash))
    }

    pub fn code(&self, address: &Address) -> Vec<u8> {
        self.code_for_hash(&self.code_hash(address))
            .unwrap_or_default()
    }

    pub fn get_state(&self, address: &Address, key: &H256) -> H256 {
        if let Some(value) = self.storage.get(&(*address, *key)) {
            return *value;
        }
        if self.wiped.contains(address) {
            return H256::zero();
        }
        self.ledger.storage(address, key)
    }

    /// BLOCKHASH semantics: the current height answers with the current
    /// header hash, lower heights come from the ledger, higher ones are zero.
    pub fn block_hash_at(&self, number: u64) -> H256 {
        if number == self.block.height {
            self.block.hash
        } else if number < self.block.height {
            self.ledger
                .historical_block_hash(number)
                .unwrap_or_default()
        } else {
            H256::zero()
        }
    }

    fn put_account(&mut self, address: Address, account: Option<AccountState>) {
        let prev = self.accounts.insert(address, account);
        self.journal.record(JournalEntry::Account { address, prev });
        self.dirty_accounts.insert(address);
    }

    fn update_account(&mut self, address: Address, f: impl FnOnce(&mut AccountState)) {
        let mut account = self.account(&address).unwrap_or_default();
        f(&mut account);
        self.put_account(address, Some(account));
    }

    pub fn create_account(&mut self, address: Address) {
        if !self.exists(&address) {
            self.put_account(address, Some(AccountState::default()));
        }
    }

    pub fn set_nonce(&mut self, address: Address, nonce: u64) {
        self.update_account(address, |a| a.nonce = nonce);
    }

    pub fn set_balance(&mut self, address: Address, balance: U256) {
        self.update_account(address, |a| a.balance = balance);
    }

    pub fn add_balance(&mut self, address: Address, amount: U256) -> Result<(), StateError> {
        let balance = self
            .balance(&address)
            .checked_add(amount)
            .ok_or(StateError::BalanceOverflow(address))?;
        self.set_balance(address, balance);
        Ok(())
    }

    pub fn sub_balance(&mut self, address: Address, amount: U256) -> Result<(), StateError> {
        let balance = self.balance(&address);
        let remaining = balance
            .checked_sub(amount)
            .ok_or(StateError::InsufficientBalance {
                address,
                balance,
                required: amount,
            })?;
        self.set_balance(address, remaining);
        Ok(())
    }

    pub fn transfer(&mut self, from: Address, to: Address, amount: U256) -> Result<(), StateError> {
        self.sub_balance(from, amount)?;
        self.add_balance(to, amount)
    }

    pub fn set_code(&mut self, address: Address, code: Vec<u8>) {
        let code_hash = if code.is_empty() {
            EMPTY_CODE_HASH
        } else {
            let hash = keccak256(&code);
            self.codes.insert(hash, code);
            hash
        };
        self.update_account(address, |a| a.code_hash = code_hash);
    }

    pub fn set_state(&mut self, address: Address, key: H256, value: H256) {
        let prev = self.storage.insert((address, key), value);
        self.journal.record(JournalEntry::Storage { address, key, prev });
        self.dirty_storage.insert((address, key));
    }

    /// Forget every slot of `address`, including those still in the ledger.
    pub fn wipe_storage(&mut self, address: Address) {
        let keys: Vec<H256> = self
            .storage
            .keys()
            .filter(|(a, _)| *a == address)
            .map(|(_, k)| *k)
            .collect();
        let mut slots = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(value) = self.storage.remove(&(address, key)) {
                slots.push((key, value));
            }
        }
        let was_wiped = !self.wiped.insert(address);
        self.journal.record(JournalEntry::StorageWiped {
            address,
            was_wiped,
            slots,
        });
    }

    pub fn destroy(&mut self, address: Address) {
        self.wipe_storage(address);
        self.put_account(address, None);
    }

    pub fn checkpoint(&mut self) -> Checkpoint {
        self.journal.checkpoint()
    }

    /// Undo every change made since `checkpoint`.
    pub fn revert_to(&mut self, checkpoint: Checkpoint) -> Result<(), StateError> {
        let undone = self
            .journal
            .revert_to(checkpoint)
            .ok_or(StateError::StaleCheckpoint)?;
        for entry in undone {
            match entry {
                JournalEntry::Account { address, prev } => match prev {
                    Some(account) => {
                        self.accounts.insert(address, account);
                    }
                    None => {
                        self.accounts.remove(&address);
                    }
                },
                JournalEntry::Storage { address, key, prev } => match prev {
                    Some(value) => {
                        self.storage.insert((address, key), value);
                    }
                    None => {
                        self.storage.remove(&(address, key));
                    }
                },
                JournalEntry::StorageWiped {
                    address,
                    was_wiped,
                    slots,
                } => {
                    if !was_wiped {
                        self.wiped.remove(&address);
                    }
                    for (key, value) in slots {
                        self.storage.insert((address, key), value);
                    }
                }
            }
        }
        Ok(())
    }

    pub fn is_dirty(&self) -> bool {
        self.journal.len() > 0
    }

    /// Write every buffered change to the ledger and reset the view.
    pub fn flush(&mut self) {
        for address in self.wiped.drain() {
            self.ledger.clear_storage(&address);
        }
        for (address, key) in std::mem::take(&mut self.dirty_storage) {
            if let Some(value) = self.storage.get(&(address, key)) {
                self.ledger.set_storage(address, key, *value);
            }
        }
        for address in std::mem::take(&mut self.dirty_accounts) {
            match self.accounts.get(&address) {
                Some(Some(account)) => {
                    if let Some(code) = self.codes.remove(&account.code_hash) {
                        self.ledger.insert_code(account.code_hash, code);
                    }
                    self.ledger.set_account(address, account.clone());
                }
                Some(None) => self.ledger.remove_account(&address),
                // reverted before flush
                None => {}
            }
        }
        trace!(entries = self.journal.len(), "Flushed state view");
        self.accounts.clear();
        self.storage.clear();
        self.codes.clear();
        self.journal.clear();
    }
}

impl Database for StateView<'_> {
    type Error = StateError;

    fn basic(&mut self, address: RevmAddress) -> Result<Option<AccountInfo>, Self::Error> {
        let address = from_revm_address(address);
        let Some(account) = self.account(&address) else {
            return Ok(None);
        };
        let (code_hash, code) = if account.has_code() {
            let code = self
                .code_for_hash(&account.code_hash)
                .ok_or(StateError::MissingCode(account.code_hash))?;
            (
                B256::from(account.code_hash.0),
                Some(Bytecode::new_raw(Bytes::from(code))),
            )
        } else {
            (KECCAK_EMPTY, None)
        };
        Ok(Some(AccountInfo {
            balance: to_revm_u256(account.balance),
            nonce: account.nonce,
            code_hash,
            code,
        }))
    }

    fn code_by_hash(&mut self, code_hash: B256) -> Result<Bytecode, Self::Error> {
        if code_hash == KECCAK_EMPTY {
            return Ok(Bytecode::default());
        }
        let hash = H256(code_hash.0);
        self.code_for_hash(&hash)
            .map(|code| Bytecode::new_raw(Bytes::from(code)))
            .ok_or(StateError::MissingCode(hash))
    }

    fn storage(&mut self, address: RevmAddress, index: RevmU256) -> Result<RevmU256, Self::Error> {
        let value = self.get_state(
            &from_revm_address(address),
            &H256(index.to_be_bytes::<32>()),
        );
        Ok(RevmU256::from_be_bytes(value.0))
    }

    fn block_hash(&mut self, number: RevmU256) -> Result<B256, Self::Error> {
        let number = from_revm_u256(number);
        if number > U256::from(u64::MAX) {
            return Ok(B256::ZERO);
        }
        Ok(B256::from(self.block_hash_at(number.as_u64()).0))
    }
}

impl DatabaseCommit for StateView<'_> {
    fn commit(&mut self, changes: RevmHashMap<RevmAddress, Account>) {
        let mut changes: Vec<_> = changes.into_iter().collect();
        changes.sort_by_key(|(address, _)| *address);

        for (address, account) in changes {
            if !account.is_touched() {
                continue;
            }
            let address = from_revm_address(address);

            if account.is_selfdestructed() {
                self.destroy(address);
                continue;
            }
            if account.is_created() {
                self.wipe_storage(address);
            }
            // EIP-161: touched empty accounts are removed
            if account.is_empty() {
                if self.exists(&address) {
                    self.put_account(address, None);
                }
                continue;
            }

            let code_hash = H256(account.info.code_hash.0);
            if code_hash != EMPTY_CODE_HASH && self.code_for_hash(&code_hash).is_none() {
                if let Some(code) = &account.info.code {
                    self.codes
                        .insert(code_hash, code.original_bytes().to_vec());
                }
            }
            self.put_account(
                address,
                Some(AccountState {
                    nonce: account.info.nonce,
                    balance: from_revm_u256(account.info.balance),
                    code_hash,
                }),
            );

            let mut slots: Vec<_> = account
                .storage
                .into_iter()
                .filter(|(_, slot)| slot.is_changed())
                .collect();
            slots.sort_by_key(|(key, _)| *key);
            for (key, slot) in slots {
                self.set_state(
                    address,
                    H256(key.to_be_bytes::<32>()),
                    H256(slot.present_value.to_be_bytes::<32>()),
                );
            }
        }
    }
}
