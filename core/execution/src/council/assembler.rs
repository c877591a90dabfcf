// tessera/core/execution/src/council/assembler.rs

//! Minimal EVM assembler with forward-reference labels.

use std::collections::HashMap;

use thiserror::Error;

pub mod op {
    pub const STOP: u8 = 0x00;
    pub const SUB: u8 = 0x03;
    pub const LT: u8 = 0x10;
    pub const GT: u8 = 0x11;
    pub const EQ: u8 = 0x14;
    pub const ISZERO: u8 = 0x15;
    pub const CALLER: u8 = 0x33;
    pub const CALLVALUE: u8 = 0x34;
    pub const CALLDATALOAD: u8 = 0x35;
    pub const CALLDATASIZE: u8 = 0x36;
    pub const CALLDATACOPY: u8 = 0x37;
    pub const CODESIZE: u8 = 0x38;
    pub const CODECOPY: u8 = 0x39;
    pub const RETURNDATASIZE: u8 = 0x3d;
    pub const RETURNDATACOPY: u8 = 0x3e;
    pub const POP: u8 = 0x50;
    pub const MLOAD: u8 = 0x51;
    pub const MSTORE: u8 = 0x52;
    pub const SLOAD: u8 = 0x54;
    pub const SSTORE: u8 = 0x55;
    pub const JUMP: u8 = 0x56;
    pub const JUMPI: u8 = 0x57;
    pub const GAS: u8 = 0x5a;
    pub const JUMPDEST: u8 = 0x5b;
    pub const PUSH1: u8 = 0x60;
    pub const PUSH2: u8 = 0x61;
    pub const DUP1: u8 = 0x80;
    pub const DUP3: u8 = 0x82;
    pub const LOG1: u8 = 0xa1;
    pub const CALL: u8 = 0xf1;
    pub const RETURN: u8 = 0xf3;
    pub const DELEGATECALL: u8 = 0xf4;
    pub const REVERT: u8 = 0xfd;
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AssemblerError {
    #[error("unknown label {0}")]
    UnknownLabel(String),
    #[error("label {0} defined twice")]
    DuplicateLabel(String),
    #[error("push of {0} bytes")]
    PushTooWide(usize),
    #[error("code offset {0} does not fit a PUSH2")]
    OffsetTooLarge(usize),
}

/// Builds bytecode with labels resolved on [`Assembler::assemble`]. Label
/// references are always encoded as `PUSH2`.
#[derive(Debug, Default, Clone)]
pub struct Assembler {
    code: Vec<u8>,
    labels: HashMap<String, usize>,
    fixups: Vec<(usize, String)>,
    error: Option<AssemblerError>,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn op(&mut self, opcode: u8) -> &mut Self {
        self.code.push(opcode);
        self
    }

    pub fn ops(&mut self, opcodes: &[u8]) -> &mut Self {
        self.code.extend_from_slice(opcodes);
        self
    }

    /// Pushes `bytes` with the narrowest PUSHn. Leading zeros are stripped;
    /// zero is encoded as `PUSH1 0x00`.
    pub fn push(&mut self, bytes: &[u8]) -> &mut Self {
        let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
        let bytes = if start == bytes.len() { &[0u8][..] } else { &bytes[start..] };
        if bytes.len() > 32 {
            self.error.get_or_insert(AssemblerError::PushTooWide(bytes.len()));
            return self;
        }
        self.code.push(op::PUSH1 + (bytes.len() as u8 - 1));
        self.code.extend_from_slice(bytes);
        self
    }

    pub fn push_u64(&mut self, value: u64) -> &mut Self {
        self.push(&value.to_be_bytes())
    }

    /// Pushes a 32-byte word verbatim.
    pub fn push_word(&mut self, word: [u8; 32]) -> &mut Self {
        self.code.push(op::PUSH1 + 31);
        self.code.extend_from_slice(&word);
        self
    }

    pub fn push_label(&mut self, name: &str) -> &mut Self {
        self.code.push(op::PUSH2);
        self.fixups.push((self.code.len(), name.to_string()));
        self.code.extend_from_slice(&[0, 0]);
        self
    }

    /// Defines a jump target: records the offset and emits `JUMPDEST`.
    pub fn label(&mut self, name: &str) -> &mut Self {
        self.mark(name);
        self.code.push(op::JUMPDEST);
        self
    }

    /// Records the current offset under `name` without emitting code.
    pub fn mark(&mut self, name: &str) -> &mut Self {
        if self.labels.insert(name.to_string(), self.code.len()).is_some() {
            self.error
                .get_or_insert(AssemblerError::DuplicateLabel(name.to_string()));
        }
        self
    }

    /// Appends raw bytes, e.g. a runtime body after its constructor.
    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.code.extend_from_slice(bytes);
        self
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub fn assemble(&self) -> Result<Vec<u8>, AssemblerError> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        let mut code = self.code.clone();
        for (at, name) in &self.fixups {
            let target = *self
                .labels
                .get(name)
                .ok_or_else(|| AssemblerError::UnknownLabel(name.clone()))?;
            let target = u16::try_from(target).map_err(|_| AssemblerError::OffsetTooLarge(target))?;
            code[*at..*at + 2].copy_from_slice(&target.to_be_bytes());
        }
        Ok(code)
    }
}
