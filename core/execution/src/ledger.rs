// tessera/core/execution/src/ledger.rs

//! Interface to the host ledger's account store, plus an in-memory
//! implementation used by the node and the tests.

use std::collections::HashMap;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tessera_primitives::{keccak256, Address, H256, U256, EMPTY_CODE_HASH};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("insufficient funds: {address:?} has {balance}, needs {required}")]
    InsufficientFunds {
        address: Address,
        balance: U256,
        required: U256,
    },

    #[error("balance overflow for {0:?}")]
    BalanceOverflow(Address),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    pub nonce: u64,
    pub balance: U256,
    pub code_hash: H256,
}

impl Default for AccountState {
    fn default() -> Self {
        Self {
            nonce: 0,
            balance: U256::zero(),
            code_hash: EMPTY_CODE_HASH,
        }
    }
}

impl AccountState {
    pub fn has_code(&self) -> bool {
        self.code_hash != EMPTY_CODE_HASH && !self.code_hash.is_zero()
    }

    pub fn is_empty(&self) -> bool {
        self.nonce == 0 && self.balance.is_zero() && !self.has_code()
    }
}

/// Authoritative account store owned by the host ledger.
///
/// Methods take `&self`; implementations use interior mutability so one
/// store can be shared by the executor and the pool.
pub trait LedgerState: Send + Sync {
    fn account(&self, address: &Address) -> Option<AccountState>;
    fn code(&self, code_hash: &H256) -> Option<Vec<u8>>;
    fn storage(&self, address: &Address, key: &H256) -> H256;
    /// Hash of a committed block below the current height.
    fn historical_block_hash(&self, height: u64) -> Option<H256>;

    fn set_account(&self, address: Address, account: AccountState);
    fn remove_account(&self, address: &Address);
    fn insert_code(&self, code_hash: H256, code: Vec<u8>);
    fn set_storage(&self, address: Address, key: H256, value: H256);
    fn clear_storage(&self, address: &Address);

    fn nonce(&self, address: &Address) -> u64 {
        self.account(address).map(|a| a.nonce).unwrap_or_default()
    }

    fn balance(&self, address: &Address) -> U256 {
        self.account(address).map(|a| a.balance).unwrap_or_default()
    }

    fn send_coins(&self, from: &Address, to: &Address, amount: U256) -> Result<(), LedgerError> {
        if amount.is_zero() {
            return Ok(());
        }
        self.burn(from, amount)?;
        self.mint(to, amount)
    }

    fn burn(&self, from: &Address, amount: U256) -> Result<(), LedgerError> {
        let mut account = self.account(from).unwrap_or_default();
        account.balance = account
            .balance
            .checked_sub(amount)
            .ok_or(LedgerError::InsufficientFunds {
                address: *from,
                balance: account.balance,
                required: amount,
            })?;
        self.set_account(*from, account);
        Ok(())
    }

    fn mint(&self, to: &Address, amount: U256) -> Result<(), LedgerError> {
        let mut account = self.account(to).unwrap_or_default();
        account.balance = account
            .balance
            .checked_add(amount)
            .ok_or(LedgerError::BalanceOverflow(*to))?;
        self.set_account(*to, account);
        Ok(())
    }
}

/// DashMap-backed ledger.
#[derive(Default)]
pub struct MemoryLedger {
    accounts: DashMap<Address, AccountState>,
    codes: DashMap<H256, Vec<u8>>,
    storage: DashMap<Address, HashMap<H256, H256>>,
    block_hashes: DashMap<u64, H256>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Genesis helper: credit `balance` to `address`.
    pub fn fund(&self, address: Address, balance: U256) {
        let mut account = self.account(&address).unwrap_or_default();
        account.balance = balance;
        self.set_account(address, account);
    }

    pub fn set_nonce(&self, address: Address, nonce: u64) {
        let mut account = self.account(&address).unwrap_or_default();
        account.nonce = nonce;
        self.set_account(address, account);
    }

    /// Install code directly, bypassing execution.
    pub fn deploy_code(&self, address: Address, code: Vec<u8>) -> H256 {
        let code_hash = keccak256(&code);
        self.insert_code(code_hash, code);
        let mut account = self.account(&address).unwrap_or_default();
        account.code_hash = code_hash;
        self.set_account(address, account);
        code_hash
    }

    pub fn account_code(&self, address: &Address) -> Vec<u8> {
        self.account(address)
            .filter(AccountState::has_code)
            .and_then(|a| self.code(&a.code_hash))
            .unwrap_or_default()
    }

    pub fn record_block_hash(&self, height: u64, hash: H256) {
        self.block_hashes.insert(height, hash);
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }
}

impl LedgerState for MemoryLedger {
    fn account(&self, address: &Address) -> Option<AccountState> {
        self.accounts.get(address).map(|a| a.clone())
    }

    fn code(&self, code_hash: &H256) -> Option<Vec<u8>> {
        self.codes.get(code_hash).map(|c| c.clone())
    }

    fn storage(&self, address: &Address, key: &H256) -> H256 {
        self.storage
            .get(address)
            .and_then(|slots| slots.get(key).copied())
            .unwrap_or_default()
    }

    fn historical_block_hash(&self, height: u64) -> Option<H256> {
        self.block_hashes.get(&height).map(|h| *h)
    }

    fn set_account(&self, address: Address, account: AccountState) {
        self.accounts.insert(address, account);
    }

    fn remove_account(&self, address: &Address) {
        debug!(?address, "Removing account");
        self.accounts.remove(address);
    }

    fn insert_code(&self, code_hash: H256, code: Vec<u8>) {
        self.codes.insert(code_hash, code);
    }

    fn set_storage(&self, address: Address, key: H256, value: H256) {
        let mut slots = self.storage.entry(address).or_default();
        if value.is_zero() {
            slots.remove(&key);
        } else {
            slots.insert(key, value);
        }
    }

    fn clear_storage(&self, address: &Address) {
        self.storage.remove(address);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_coins() {
        let ledger = MemoryLedger::new();
        let a = Address::repeat_byte(1);
        let b = Address::repeat_byte(2);
        ledger.fund(a, U256::from(100u64));

        ledger.send_coins(&a, &b, U256::from(40u64)).unwrap();
        assert_eq!(ledger.balance(&a), U256::from(60u64));
        assert_eq!(ledger.balance(&b), U256::from(40u64));

        let err = ledger.send_coins(&a, &b, U256::from(61u64)).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
        assert_eq!(ledger.balance(&a), U256::from(60u64));
    }

    #[test]
    fn test_storage_zero_deletes() {
        let ledger = MemoryLedger::new();
        let a = Address::repeat_byte(1);
        let key = H256::repeat_byte(7);
        ledger.set_storage(a, key, H256::repeat_byte(9));
        assert_eq!(ledger.storage(&a, &key), H256::repeat_byte(9));
        ledger.set_storage(a, key, H256::zero());
        assert_eq!(ledger.storage(&a, &key), H256::zero());
    }

    #[test]
    fn test_deploy_code() {
        let ledger = MemoryLedger::new();
        let a = Address::repeat_byte(3);
        let hash = ledger.deploy_code(a, vec![0x60, 0x00]);
        assert_eq!(ledger.account(&a).unwrap().code_hash, hash);
        assert_eq!(ledger.account_code(&a), vec![0x60, 0x00]);
        assert!(ledger.account(&a).unwrap().has_code());
    }
}
