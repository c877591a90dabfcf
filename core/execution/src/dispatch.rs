// tessera/core/execution/src/dispatch.rs

use tessera_primitives::{Message, NATIVE_MESSAGE_ADDRESS};

/// Execution path of a message, fixed once when the message is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Plain call or contract creation.
    Vm(Message),
    /// Payload carries a native ledger message.
    Native(Message),
}

impl Dispatch {
    pub fn route(message: Message) -> Self {
        if message.to == Some(NATIVE_MESSAGE_ADDRESS) {
            Dispatch::Native(message)
        } else {
            Dispatch::Vm(message)
        }
    }

    pub fn message(&self) -> &Message {
        match self {
            Dispatch::Vm(message) | Dispatch::Native(message) => message,
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Dispatch::Vm(_) => "vm",
            Dispatch::Native(_) => "native",
        }
    }
}
