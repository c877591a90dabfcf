// tessera/core/execution/src/revm_adapter.rs

use revm::{
    primitives::{
        Address as RevmAddress, Bytes, EVMError, ExecutionResult as RevmExecutionResult,
        HaltReason, Log as RevmLog, Output, ResultAndState, SpecId, TransactTo, B256,
        U256 as RevmU256,
    },
    Evm,
};
use tessera_primitives::{AccessList, Address, Forks, Log, H256, U256};
use tracing::trace;

use crate::config::{ExecutionConfig, TxConfig};
use crate::error::ExecutionError;
use crate::state::StateView;

pub(crate) fn to_revm_address(address: &Address) -> RevmAddress {
    RevmAddress::from(address.0)
}

pub(crate) fn from_revm_address(address: RevmAddress) -> Address {
    Address::from(address.0 .0)
}

pub(crate) fn to_revm_u256(value: U256) -> RevmU256 {
    RevmU256::from_limbs(value.0)
}

pub(crate) fn from_revm_u256(value: RevmU256) -> U256 {
    U256(value.into_limbs())
}

pub(crate) fn spec_id(forks: &Forks) -> SpecId {
    if forks.shanghai {
        SpecId::SHANGHAI
    } else if forks.london {
        SpecId::LONDON
    } else if forks.berlin {
        SpecId::BERLIN
    } else {
        SpecId::ISTANBUL
    }
}

/// One VM invocation. Fees are settled outside the VM, so the in-VM gas
/// price is always zero.
pub(crate) struct VmCall<'a> {
    pub caller: Address,
    pub to: Option<Address>,
    pub value: U256,
    pub data: &'a [u8],
    pub gas_limit: u64,
    /// Checked against the caller's nonce when set.
    pub nonce: Option<u64>,
    pub access_list: Option<&'a AccessList>,
}

/// Runs `call` against `view` without committing. The caller decides
/// whether to apply the returned state diff.
pub(crate) fn transact(
    view: &mut StateView<'_>,
    config: &ExecutionConfig,
    call: &VmCall<'_>,
) -> Result<ResultAndState, ExecutionError> {
    let access_list: Vec<(RevmAddress, Vec<RevmU256>)> = call
        .access_list
        .map(|list| {
            list.iter()
                .map(|item| {
                    (
                        to_revm_address(&item.address),
                        item.storage_keys
                            .iter()
                            .map(|key| RevmU256::from_be_bytes(key.0))
                            .collect(),
                    )
                })
                .collect()
        })
        .unwrap_or_default();

    trace!(caller = ?call.caller, to = ?call.to, gas = call.gas_limit, "Entering VM");

    let mut evm = Evm::builder()
        .with_db(&mut *view)
        .modify_cfg_env(|cfg| {
            cfg.chain_id = config.chain_id();
            cfg.disable_base_fee = true;
        })
        .with_spec_id(spec_id(&config.forks))
        .modify_block_env(|block| {
            block.number = RevmU256::from(config.block_number);
            block.timestamp = RevmU256::from(config.block_time);
            block.coinbase = to_revm_address(&config.coinbase);
            block.gas_limit = RevmU256::from(config.block_gas_limit.max(call.gas_limit));
            block.basefee = to_revm_u256(config.base_fee.unwrap_or_default());
            block.difficulty = RevmU256::ZERO;
            block.prevrandao = Some(B256::ZERO);
        })
        .modify_tx_env(|tx| {
            tx.caller = to_revm_address(&call.caller);
            tx.transact_to = match call.to {
                Some(to) => TransactTo::Call(to_revm_address(&to)),
                None => TransactTo::Create,
            };
            tx.data = Bytes::copy_from_slice(call.data);
            tx.value = to_revm_u256(call.value);
            tx.gas_limit = call.gas_limit;
            tx.gas_price = RevmU256::ZERO;
            tx.gas_priority_fee = None;
            tx.nonce = call.nonce;
            tx.chain_id = Some(config.chain_id());
            tx.access_list = access_list;
        })
        .build();

    let outcome = evm.transact();
    drop(evm);
    outcome.map_err(|e| match e {
        EVMError::Transaction(err) => ExecutionError::InvalidTransaction(format!("{err:?}")),
        EVMError::Database(err) => ExecutionError::State(err.to_string()),
        other => ExecutionError::InvalidTransaction(format!("{other:?}")),
    })
}

/// VM result before refund capping.
#[derive(Debug)]
pub(crate) struct VmOutcome {
    /// Gas spent, refunds not yet deducted.
    pub gas_spent: u64,
    pub refund_counter: u64,
    pub output: Vec<u8>,
    pub logs: Vec<RevmLog>,
    pub vm_error: String,
    pub created: Option<Address>,
}

pub const ERR_EXECUTION_REVERTED: &str = "execution reverted";
pub const ERR_INSUFFICIENT_BALANCE: &str = "insufficient balance for transfer";

pub(crate) fn vm_outcome(result: RevmExecutionResult) -> VmOutcome {
    match result {
        RevmExecutionResult::Success {
            gas_used,
            gas_refunded,
            logs,
            output,
            ..
        } => {
            let (output, created) = match output {
                Output::Create(code, address) => (code.to_vec(), address.map(from_revm_address)),
                Output::Call(data) => (data.to_vec(), None),
            };
            VmOutcome {
                gas_spent: gas_used.saturating_add(gas_refunded),
                refund_counter: gas_refunded,
                output,
                logs,
                vm_error: String::new(),
                created,
            }
        }
        RevmExecutionResult::Revert { gas_used, output } => VmOutcome {
            gas_spent: gas_used,
            refund_counter: 0,
            output: output.to_vec(),
            logs: Vec::new(),
            vm_error: ERR_EXECUTION_REVERTED.to_string(),
            created: None,
        },
        RevmExecutionResult::Halt { reason, gas_used } => VmOutcome {
            gas_spent: gas_used,
            refund_counter: 0,
            output: Vec::new(),
            logs: Vec::new(),
            vm_error: halt_message(&reason),
            created: None,
        },
    }
}

fn halt_message(reason: &HaltReason) -> String {
    match reason {
        HaltReason::OutOfGas(_) => "out of gas".to_string(),
        HaltReason::OpcodeNotFound | HaltReason::InvalidEFOpcode => "invalid opcode".to_string(),
        HaltReason::InvalidJump => "invalid jump destination".to_string(),
        HaltReason::StackUnderflow => "stack underflow".to_string(),
        HaltReason::StackOverflow => "stack limit reached 1024".to_string(),
        HaltReason::CreateCollision => "contract address collision".to_string(),
        HaltReason::CreateContractSizeLimit => "max code size exceeded".to_string(),
        HaltReason::CreateContractStartingWithEF => {
            "invalid code: must not begin with 0xef".to_string()
        }
        HaltReason::OutOfFunds => ERR_INSUFFICIENT_BALANCE.to_string(),
        HaltReason::CallTooDeep => "max call depth exceeded".to_string(),
        other => format!("{other:?}"),
    }
}

/// Attaches block and transaction position to the VM's logs.
pub(crate) fn convert_logs(logs: &[RevmLog], config: &ExecutionConfig, tx: &TxConfig) -> Vec<Log> {
    logs.iter()
        .enumerate()
        .map(|(i, log)| Log {
            address: from_revm_address(log.address),
            topics: log.data.topics().iter().map(|t| H256(t.0)).collect(),
            data: log.data.data.to_vec(),
            block_number: config.block_number,
            block_hash: tx.block_hash,
            tx_hash: tx.tx_hash,
            tx_index: tx.tx_index,
            index: tx.log_index + i as u64,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions() {
        let value = U256::from_dec_str("123456789012345678901234567890").unwrap();
        assert_eq!(from_revm_u256(to_revm_u256(value)), value);
        let address = Address::repeat_byte(0x42);
        assert_eq!(from_revm_address(to_revm_address(&address)), address);
    }

    #[test]
    fn test_spec_selection() {
        let mut forks = Forks::default();
        assert_eq!(spec_id(&forks), SpecId::ISTANBUL);
        forks.berlin = true;
        assert_eq!(spec_id(&forks), SpecId::BERLIN);
        forks.london = true;
        assert_eq!(spec_id(&forks), SpecId::LONDON);
        forks.shanghai = true;
        assert_eq!(spec_id(&forks), SpecId::SHANGHAI);
    }

    #[test]
    fn test_halt_messages() {
        assert_eq!(halt_message(&HaltReason::InvalidEFOpcode), "invalid opcode");
        assert_eq!(halt_message(&HaltReason::OpcodeNotFound), "invalid opcode");
        assert_eq!(
            halt_message(&HaltReason::OutOfFunds),
            "insufficient balance for transfer"
        );
    }
}
