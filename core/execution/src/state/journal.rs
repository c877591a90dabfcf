// tessera/core/execution/src/state/journal.rs

//! Undo log for [`StateView`](super::StateView). Entries live in one arena;
//! a checkpoint is an index into it.

use tessera_primitives::{Address, H256};

use crate::ledger::AccountState;

#[derive(Debug, Clone)]
pub(crate) enum JournalEntry {
    /// `prev == None` means the overlay held nothing for the address.
    Account {
        address: Address,
        prev: Option<Option<AccountState>>,
    },
    Storage {
        address: Address,
        key: H256,
        prev: Option<H256>,
    },
    StorageWiped {
        address: Address,
        was_wiped: bool,
        slots: Vec<(H256, H256)>,
    },
}

/// Handle returned by [`StateView::checkpoint`](super::StateView::checkpoint).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint(usize);

#[derive(Debug, Default)]
pub(crate) struct Journal {
    entries: Vec<JournalEntry>,
    checkpoints: Vec<usize>,
}

impl Journal {
    pub(crate) fn record(&mut self, entry: JournalEntry) {
        self.entries.push(entry);
    }

    pub(crate) fn checkpoint(&mut self) -> Checkpoint {
        self.checkpoints.push(self.entries.len());
        Checkpoint(self.checkpoints.len() - 1)
    }

    /// Pops every entry recorded since `checkpoint`, newest first. Later
    /// checkpoints are invalidated. Returns `None` for a stale handle.
    pub(crate) fn revert_to(&mut self, checkpoint: Checkpoint) -> Option<Vec<JournalEntry>> {
        let start = *self.checkpoints.get(checkpoint.0)?;
        self.checkpoints.truncate(checkpoint.0);
        let mut undone = self.entries.split_off(start);
        undone.reverse();
        Some(undone)
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.checkpoints.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
