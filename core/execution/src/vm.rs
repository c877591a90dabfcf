// tessera/core/execution/src/vm.rs

//! VM execution path: feature gates, intrinsic gas, nonce handling and
//! refund capping around one revm invocation.

use revm::{primitives::ResultAndState, DatabaseCommit};
use tessera_primitives::{create_address, gas_to_refund, intrinsic_gas, logs_bloom, Message};
use tracing::debug;

use crate::config::{ExecutionConfig, TxConfig};
use crate::error::ExecutionError;
use crate::result::ExecutionResult;
use crate::revm_adapter::{
    convert_logs, transact, vm_outcome, VmCall, ERR_INSUFFICIENT_BALANCE,
};
use crate::state::StateView;
use crate::tracer::Tracer;

/// Applies `msg` to `view`. Only pre-execution checks fail hard; VM faults
/// come back in [`ExecutionResult::vm_error`].
pub(crate) fn apply_vm_message(
    view: &mut StateView<'_>,
    config: &ExecutionConfig,
    tx: &TxConfig,
    msg: &Message,
    tracer: &mut dyn Tracer,
) -> Result<ExecutionResult, ExecutionError> {
    let create = msg.is_create();
    if create && !config.params.enable_create {
        return Err(ExecutionError::CreateDisabled);
    }
    if !create && !config.params.enable_call {
        return Err(ExecutionError::CallDisabled);
    }

    let access_list = config.forks.berlin.then_some(&msg.access_list);
    let intrinsic = intrinsic_gas(&msg.data, access_list, create, config.forks.shanghai)?;
    if msg.gas_limit < intrinsic {
        return Err(ExecutionError::IntrinsicGas {
            have: msg.gas_limit,
            want: intrinsic,
        });
    }

    // Upstream already consumed the nonce. Rewind it so the VM sees the
    // transaction nonce; the VM increments it again for calls and creates.
    view.set_nonce(msg.from, msg.nonce);

    tracer.capture_start(msg.from, msg.to, &msg.data, msg.gas_limit, msg.value);

    // revm rejects an unaffordable value transfer as an invalid transaction.
    // Report it as a VM fault that only consumes intrinsic gas instead.
    if view.balance(&msg.from) < msg.value {
        view.set_nonce(msg.from, msg.nonce.saturating_add(1));
        tracer.capture_end(&[], intrinsic, Some(ERR_INSUFFICIENT_BALANCE));
        debug!(
            hash = ?tx.tx_hash,
            gas_used = intrinsic,
            vm_error = ERR_INSUFFICIENT_BALANCE,
            "Applied VM message"
        );
        return Ok(ExecutionResult {
            hash: tx.tx_hash,
            gas_used: intrinsic,
            vm_error: ERR_INSUFFICIENT_BALANCE.to_string(),
            ret: Vec::new(),
            logs: Vec::new(),
            bloom: Default::default(),
            contract_address: create.then(|| create_address(&msg.from, msg.nonce)),
        });
    }

    let ResultAndState { result, state } = transact(
        view,
        config,
        &VmCall {
            caller: msg.from,
            to: msg.to,
            value: msg.value,
            data: &msg.data,
            gas_limit: msg.gas_limit,
            nonce: Some(msg.nonce),
            access_list,
        },
    )?;
    view.commit(state);
    let outcome = vm_outcome(result);

    let leftover = msg
        .gas_limit
        .checked_sub(outcome.gas_spent)
        .ok_or(ExecutionError::GasOverflow("leftover gas exceeds gas limit"))?;
    let gas_used = msg.gas_limit - leftover;
    let refund = gas_to_refund(outcome.refund_counter, gas_used, config.refund_quotient());
    if refund > gas_used {
        return Err(ExecutionError::GasOverflow("refund exceeds gas used"));
    }
    let gas_used = gas_used - refund;

    let logs = convert_logs(&outcome.logs, config, tx);
    for log in &logs {
        tracer.capture_log(log);
    }
    let error = (!outcome.vm_error.is_empty()).then_some(outcome.vm_error.as_str());
    tracer.capture_end(&outcome.output, gas_used, error);

    debug!(
        hash = ?tx.tx_hash,
        gas_used,
        refund,
        vm_error = %outcome.vm_error,
        "Applied VM message"
    );

    Ok(ExecutionResult {
        hash: tx.tx_hash,
        gas_used,
        bloom: logs_bloom(&logs),
        logs,
        ret: outcome.output,
        contract_address: if create {
            outcome.created.or(Some(create_address(&msg.from, msg.nonce)))
        } else {
            None
        },
        vm_error: outcome.vm_error,
    })
}
