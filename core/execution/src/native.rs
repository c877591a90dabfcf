// tessera/core/execution/src/native.rs

//! Execution path for transactions whose payload wraps a native ledger
//! message.

use std::collections::HashMap;
use std::sync::Arc;

use tessera_primitives::{gas::TX_GAS, Bloom, Message, NativeMessage};
use tracing::debug;

use crate::config::TxConfig;
use crate::error::ExecutionError;
use crate::events::EvmEvent;
use crate::result::ExecutionResult;
use crate::state::StateView;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandlerResponse {
    pub data: Vec<u8>,
    pub gas_consumed: u64,
    pub attributes: Vec<(String, String)>,
}

/// Handler for one native message type.
pub trait MessageHandler: Send + Sync {
    /// Stateless checks. Run before dispatch when simulating.
    fn validate_basic(&self, _msg: &NativeMessage) -> anyhow::Result<()> {
        Ok(())
    }

    fn handle(
        &self,
        state: &mut StateView<'_>,
        msg: &NativeMessage,
    ) -> anyhow::Result<HandlerResponse>;
}

pub trait MessageRouter: Send + Sync {
    fn route(&self, type_url: &str) -> Option<Arc<dyn MessageHandler>>;
}

/// Router keyed by message type URL.
#[derive(Default)]
pub struct MsgServiceRouter {
    handlers: HashMap<String, Arc<dyn MessageHandler>>,
}

impl MsgServiceRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        type_url: impl Into<String>,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<(), ExecutionError> {
        let type_url = type_url.into();
        if self.handlers.contains_key(&type_url) {
            return Err(ExecutionError::DuplicateRoute(type_url));
        }
        self.handlers.insert(type_url, handler);
        Ok(())
    }
}

impl MessageRouter for MsgServiceRouter {
    fn route(&self, type_url: &str) -> Option<Arc<dyn MessageHandler>> {
        self.handlers.get(type_url).cloned()
    }
}

pub(crate) struct NativeOutcome {
    pub result: ExecutionResult,
    pub event: EvmEvent,
}

/// Decodes and dispatches the native message in `msg.data`. Gas used is
/// floored at [`TX_GAS`].
pub(crate) fn apply_native_message(
    view: &mut StateView<'_>,
    router: &dyn MessageRouter,
    tx: &TxConfig,
    msg: &Message,
    simulate: bool,
) -> Result<NativeOutcome, ExecutionError> {
    let native = NativeMessage::decode(&msg.data)?;
    if native.is_vm_transaction() {
        return Err(ExecutionError::NestedVmTransaction);
    }
    if native.signer() != Some(msg.from) {
        return Err(ExecutionError::SignerMismatch {
            signer: native.signer(),
            sender: msg.from,
        });
    }

    let handler = router
        .route(&native.type_url)
        .ok_or_else(|| ExecutionError::UnroutableMessage(native.type_url.clone()))?;
    if simulate {
        handler
            .validate_basic(&native)
            .map_err(ExecutionError::InvalidMessage)?;
    }

    let response = handler
        .handle(view, &native)
        .map_err(ExecutionError::MessageFailed)?;

    let gas_used = response.gas_consumed.max(TX_GAS);
    if msg.gas_limit < gas_used {
        return Err(ExecutionError::GasOverflow("gas limit below native message gas"));
    }
    debug!(type_url = %native.type_url, gas_used, "Applied native message");

    Ok(NativeOutcome {
        result: ExecutionResult {
            hash: tx.tx_hash,
            gas_used,
            vm_error: String::new(),
            ret: response.data,
            logs: Vec::new(),
            bloom: Bloom::zero(),
            contract_address: None,
        },
        event: EvmEvent::NativeMessage {
            type_url: native.type_url,
            attributes: response.attributes,
        },
    })
}
