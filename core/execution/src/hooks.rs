// tessera/core/execution/src/hooks.rs

use tessera_primitives::Message;

use crate::result::Receipt;
use crate::state::StateView;

/// Runs after a successful VM transaction, inside the transaction's state
/// view. An error discards the view and marks the transaction failed.
pub trait PostTxHook: Send + Sync {
    fn post_tx_processing(
        &self,
        state: &mut StateView<'_>,
        msg: &Message,
        receipt: &Receipt,
    ) -> anyhow::Result<()>;
}
