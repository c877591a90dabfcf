// tessera/core/execution/src/council/contracts.rs

//! Bytecode of the council's admin contract and the upgradeable proxy.

use tessera_primitives::{keccak256, Address, H256, U256};

use super::assembler::{op, Assembler, AssemblerError};

/// EIP-1967 slot: `keccak256("eip1967.proxy.implementation") - 1`.
pub fn implementation_slot() -> H256 {
    eip1967_slot(b"eip1967.proxy.implementation")
}

/// EIP-1967 slot: `keccak256("eip1967.proxy.admin") - 1`.
pub fn admin_slot() -> H256 {
    eip1967_slot(b"eip1967.proxy.admin")
}

fn eip1967_slot(label: &[u8]) -> H256 {
    let slot = U256::from_big_endian(keccak256(label).as_bytes()) - U256::one();
    let mut out = [0u8; 32];
    slot.to_big_endian(&mut out);
    H256(out)
}

/// Left-pads an address into an ABI word.
pub fn address_word(address: &Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address.as_bytes());
    word
}

/// Reads an address stored right-aligned in a storage word.
pub fn word_address(word: &H256) -> Address {
    Address::from_slice(&word.as_bytes()[12..])
}

/// Wraps `runtime` in a constructor that copies the trailing `args_len`
/// bytes of its own code to memory 0, runs `setup`, then returns `runtime`.
fn with_constructor(
    args_len: u64,
    setup: impl FnOnce(&mut Assembler),
    runtime: &[u8],
) -> Result<Vec<u8>, AssemblerError> {
    let mut asm = Assembler::new();
    asm.push_u64(args_len)
        .push_u64(args_len)
        .op(op::CODESIZE)
        .op(op::SUB)
        .push_u64(0)
        .op(op::CODECOPY);
    setup(&mut asm);
    asm.push_u64(runtime.len() as u64)
        .op(op::DUP1)
        .push_label("runtime")
        .push_u64(0)
        .op(op::CODECOPY)
        .push_u64(0)
        .op(op::RETURN)
        .mark("runtime")
        .raw(runtime);
    asm.assemble()
}

/// Runtime of the admin contract. Only the owner in slot 0 may call it.
/// Calldata is `proxy word || payload`; the payload and call value are
/// forwarded to the proxy and a revert is bubbled up.
pub fn admin_runtime() -> Result<Vec<u8>, AssemblerError> {
    let mut asm = Assembler::new();
    asm.op(op::CALLER)
        .push_u64(0)
        .op(op::SLOAD)
        .op(op::EQ)
        .op(op::ISZERO)
        .push_label("deny")
        .op(op::JUMPI)
        .push_u64(64)
        .op(op::CALLDATASIZE)
        .op(op::LT)
        .push_label("deny")
        .op(op::JUMPI);

    // payload -> memory 0, length kept on the stack
    asm.push_u64(32)
        .op(op::CALLDATASIZE)
        .op(op::SUB)
        .op(op::DUP1)
        .push_u64(32)
        .push_u64(0)
        .op(op::CALLDATACOPY);

    asm.push_u64(0)
        .push_u64(0)
        .op(op::DUP3)
        .push_u64(0)
        .op(op::CALLVALUE)
        .push_u64(0)
        .op(op::CALLDATALOAD)
        .op(op::GAS)
        .op(op::CALL);
    copy_return_data(&mut asm);
    asm.push_label("ok")
        .op(op::JUMPI)
        .op(op::RETURNDATASIZE)
        .push_u64(0)
        .op(op::REVERT)
        .label("ok")
        .op(op::RETURNDATASIZE)
        .push_u64(0)
        .op(op::RETURN);
    deny(&mut asm);
    asm.assemble()
}

/// Init code of the admin contract owned by `owner`.
pub fn admin_init_code(owner: &Address) -> Result<Vec<u8>, AssemblerError> {
    let mut code = with_constructor(
        32,
        |asm| {
            asm.push_u64(0).op(op::MLOAD).push_u64(0).op(op::SSTORE);
        },
        &admin_runtime()?,
    )?;
    code.extend_from_slice(&address_word(owner));
    Ok(code)
}

/// Runtime of the upgradeable proxy. A call from the admin stores
/// calldata word 0 as the new implementation and, when more calldata
/// follows, delegates it to the new implementation. Every other caller is
/// delegated to the implementation with the full calldata.
pub fn proxy_runtime() -> Result<Vec<u8>, AssemblerError> {
    let implementation = implementation_slot().0;
    let mut asm = Assembler::new();
    asm.push_word(admin_slot().0)
        .op(op::SLOAD)
        .op(op::CALLER)
        .op(op::EQ)
        .push_label("upgrade")
        .op(op::JUMPI);

    // fallback
    asm.op(op::CALLDATASIZE)
        .push_u64(0)
        .push_u64(0)
        .op(op::CALLDATACOPY)
        .push_u64(0)
        .push_u64(0)
        .op(op::CALLDATASIZE)
        .push_u64(0)
        .push_word(implementation)
        .op(op::SLOAD)
        .op(op::GAS)
        .op(op::DELEGATECALL);
    copy_return_data(&mut asm);
    asm.push_label("done")
        .op(op::JUMPI)
        .op(op::RETURNDATASIZE)
        .push_u64(0)
        .op(op::REVERT)
        .label("done")
        .op(op::RETURNDATASIZE)
        .push_u64(0)
        .op(op::RETURN);

    // upgradeToAndCall(implementation, data)
    asm.label("upgrade")
        .push_u64(32)
        .op(op::CALLDATASIZE)
        .op(op::LT)
        .push_label("deny")
        .op(op::JUMPI)
        .push_u64(0)
        .op(op::CALLDATALOAD)
        .push_word(implementation)
        .op(op::SSTORE)
        .push_u64(32)
        .op(op::CALLDATASIZE)
        .op(op::GT)
        .push_label("init")
        .op(op::JUMPI)
        .op(op::STOP);

    asm.label("init")
        .push_u64(32)
        .op(op::CALLDATASIZE)
        .op(op::SUB)
        .op(op::DUP1)
        .push_u64(32)
        .push_u64(0)
        .op(op::CALLDATACOPY)
        .push_u64(0)
        .push_u64(0)
        .op(op::DUP3)
        .push_u64(0)
        .push_word(implementation)
        .op(op::SLOAD)
        .op(op::GAS)
        .op(op::DELEGATECALL)
        .push_label("initialized")
        .op(op::JUMPI);
    copy_return_data(&mut asm);
    asm.op(op::RETURNDATASIZE)
        .push_u64(0)
        .op(op::REVERT)
        .label("initialized")
        .op(op::STOP);
    deny(&mut asm);
    asm.assemble()
}

/// Init code of a proxy administered by `admin` and pointing at
/// `implementation`.
pub fn proxy_init_code(
    admin: &Address,
    implementation: &Address,
) -> Result<Vec<u8>, AssemblerError> {
    let mut code = with_constructor(
        64,
        |asm| {
            asm.push_u64(0)
                .op(op::MLOAD)
                .push_word(admin_slot().0)
                .op(op::SSTORE)
                .push_u64(32)
                .op(op::MLOAD)
                .push_word(implementation_slot().0)
                .op(op::SSTORE);
        },
        &proxy_runtime()?,
    )?;
    code.extend_from_slice(&address_word(admin));
    code.extend_from_slice(&address_word(implementation));
    Ok(code)
}

/// Admin calldata for `upgradeToAndCall(implementation, data)` on `proxy`.
pub fn upgrade_to_and_call(proxy: &Address, implementation: &Address, data: &[u8]) -> Vec<u8> {
    let mut calldata = Vec::with_capacity(64 + data.len());
    calldata.extend_from_slice(&address_word(proxy));
    calldata.extend_from_slice(&address_word(implementation));
    calldata.extend_from_slice(data);
    calldata
}

fn copy_return_data(asm: &mut Assembler) {
    asm.op(op::RETURNDATASIZE)
        .push_u64(0)
        .push_u64(0)
        .op(op::RETURNDATACOPY);
}

fn deny(asm: &mut Assembler) {
    asm.label("deny").push_u64(0).op(op::DUP1).op(op::REVERT);
}
