// Integration tests for the execution module

use std::sync::Arc;

use secp256k1::{PublicKey, Secp256k1, SecretKey};
use tessera_execution::council::assembler::{op, Assembler};
use tessera_execution::{
    BlockHeader, EvmEvent, EvmParams, ExecutionError, ExecutionResult, Executor, FeeMarketParams,
    HandlerResponse, LedgerState, MemoryLedger, MessageHandler, MsgServiceRouter, PostTxHook,
    Receipt, StateView, Tracer, ERR_INSUFFICIENT_BALANCE, ERR_POST_TX_PROCESSING,
};
use tessera_primitives::{
    create_address, keccak256, Address, Bloom, BloomInput, Log, Message, NativeMessage,
    SignedTransaction, Transaction, VerifiedTransaction, H256, NATIVE_MESSAGE_ADDRESS, U256,
};

const CHAIN_ID: u64 = 9000;
const BANK_SEND: &str = "/tessera.bank.v1.MsgSend";
const TOPIC: [u8; 32] = [0x42; 32];

fn create_test_header(height: u64) -> BlockHeader {
    BlockHeader {
        height,
        hash: H256::repeat_byte(height as u8),
        time: 1_700_000_000 + height * 2,
        proposer: Address::repeat_byte(0xcb),
        gas_limit: 30_000_000,
    }
}

fn address_of(key: &SecretKey) -> Address {
    let public = PublicKey::from_secret_key(&Secp256k1::new(), key);
    let hash = keccak256(&public.serialize_uncompressed()[1..]);
    Address::from_slice(&hash.as_bytes()[12..])
}

/// Stores calldata word 0 in slot 0, logs it under `TOPIC` and returns it.
fn store_and_log_runtime() -> Vec<u8> {
    let mut asm = Assembler::new();
    asm.push_u64(0)
        .op(op::CALLDATALOAD)
        .op(op::DUP1)
        .push_u64(0)
        .op(op::SSTORE)
        .push_u64(0)
        .op(op::MSTORE)
        .push_word(TOPIC)
        .push_u64(32)
        .push_u64(0)
        .op(op::LOG1)
        .push_u64(32)
        .push_u64(0)
        .op(op::RETURN);
    asm.assemble().unwrap()
}

/// Writes slot 1 and then reverts with `0xdeadbeef`.
fn reverting_runtime() -> Vec<u8> {
    let mut asm = Assembler::new();
    asm.push_u64(1)
        .push_u64(1)
        .op(op::SSTORE)
        .push_u64(0xdeadbeef)
        .push_u64(0)
        .op(op::MSTORE)
        .push_u64(4)
        .push_u64(28)
        .op(op::REVERT);
    asm.assemble().unwrap()
}

/// Init code returning `runtime`.
fn init_code(runtime: &[u8]) -> Vec<u8> {
    let mut asm = Assembler::new();
    asm.push_u64(runtime.len() as u64)
        .op(op::DUP1)
        .push_label("runtime")
        .push_u64(0)
        .op(op::CODECOPY)
        .push_u64(0)
        .op(op::RETURN)
        .mark("runtime")
        .raw(runtime);
    asm.assemble().unwrap()
}

fn word(value: u64) -> Vec<u8> {
    let mut out = [0u8; 32];
    U256::from(value).to_big_endian(&mut out);
    out.to_vec()
}

/// Moves `body = recipient || amount` from the signer to the recipient.
struct BankSend {
    gas: u64,
}

impl MessageHandler for BankSend {
    fn validate_basic(&self, msg: &NativeMessage) -> anyhow::Result<()> {
        anyhow::ensure!(msg.body.len() == 52, "body must be 52 bytes");
        Ok(())
    }

    fn handle(&self, state: &mut StateView<'_>, msg: &NativeMessage) -> anyhow::Result<HandlerResponse> {
        let from = msg.signer().ok_or_else(|| anyhow::anyhow!("no signer"))?;
        let to = Address::from_slice(&msg.body[..20]);
        let amount = U256::from_big_endian(&msg.body[20..52]);
        state.transfer(from, to, amount)?;
        Ok(HandlerResponse {
            data: Vec::new(),
            gas_consumed: self.gas,
            attributes: vec![("recipient".into(), format!("{to:?}"))],
        })
    }
}

struct FailingHook;

impl PostTxHook for FailingHook {
    fn post_tx_processing(
        &self,
        _state: &mut StateView<'_>,
        _msg: &Message,
        _receipt: &Receipt,
    ) -> anyhow::Result<()> {
        anyhow::bail!("hook rejected transaction")
    }
}

#[derive(Default)]
struct RecordingTracer {
    starts: usize,
    logs: usize,
    gas_used: Option<u64>,
}

impl Tracer for RecordingTracer {
    fn capture_start(&mut self, _: Address, _: Option<Address>, _: &[u8], _: u64, _: U256) {
        self.starts += 1;
    }

    fn capture_log(&mut self, _log: &Log) {
        self.logs += 1;
    }

    fn capture_end(&mut self, _output: &[u8], gas_used: u64, _error: Option<&str>) {
        self.gas_used = Some(gas_used);
    }
}

struct Harness {
    ledger: Arc<MemoryLedger>,
    executor: Executor,
    key: SecretKey,
    sender: Address,
}

impl Harness {
    fn new() -> Self {
        Self::with_params(EvmParams::default())
    }

    fn with_params(params: EvmParams) -> Self {
        Self::build(params, |executor| executor)
    }

    fn build(params: EvmParams, configure: impl FnOnce(Executor) -> Executor) -> Self {
        let ledger = Arc::new(MemoryLedger::new());
        let mut router = MsgServiceRouter::new();
        router
            .register(BANK_SEND, Arc::new(BankSend { gas: 30_000 }))
            .unwrap();
        let executor = Executor::new(ledger.clone(), Arc::new(router), params).with_fee_market(
            FeeMarketParams {
                no_base_fee: true,
                ..Default::default()
            },
        );
        let mut executor = configure(executor);
        executor.begin_block(create_test_header(1));

        let key = SecretKey::from_slice(&[0x11; 32]).unwrap();
        let sender = address_of(&key);
        ledger.fund(sender, U256::from(10u64).pow(U256::from(21)));
        ledger.fund(executor.fee_collector(), U256::zero());
        Self {
            ledger,
            executor,
            key,
            sender,
        }
    }

    fn nonce(&self) -> u64 {
        self.ledger.nonce(&self.sender)
    }

    fn legacy(&self, gas_price: u64, gas_limit: u64, to: Option<Address>, value: U256, data: Vec<u8>) -> Transaction {
        Transaction::legacy(
            Some(CHAIN_ID),
            self.nonce(),
            U256::from(gas_price),
            gas_limit,
            to,
            value,
            data,
        )
    }

    /// Signs `tx`, applies the upstream fee deduction and nonce increment,
    /// then executes it.
    fn submit(&mut self, tx: Transaction) -> Result<ExecutionResult, ExecutionError> {
        let signed = SignedTransaction::sign(tx, &self.key).unwrap();
        let verified = VerifiedTransaction::recover(signed).unwrap();
        let fee = U256::from(verified.gas_limit)
            * verified.effective_gas_price(self.executor.base_fee());
        self.ledger
            .send_coins(&self.sender, &self.executor.fee_collector(), fee)
            .unwrap();
        self.ledger.set_nonce(self.sender, verified.nonce() + 1);
        self.executor.apply_transaction(&verified)
    }

    fn deploy(&mut self, runtime: &[u8]) -> Address {
        let tx = self.legacy(0, 1_000_000, None, U256::zero(), init_code(runtime));
        let result = self.submit(tx).unwrap();
        assert!(!result.failed(), "deploy failed: {}", result.vm_error);
        result.contract_address.unwrap()
    }

    fn native_tx(&self, native: &NativeMessage, gas_limit: u64) -> Transaction {
        self.legacy(
            0,
            gas_limit,
            Some(NATIVE_MESSAGE_ADDRESS),
            U256::zero(),
            native.encode().unwrap(),
        )
    }
}

fn bank_send_body(to: Address, amount: u64) -> Vec<u8> {
    let mut body = to.as_bytes().to_vec();
    body.extend_from_slice(&word(amount));
    body
}

#[cfg(test)]
mod vm_path_tests {
    use super::*;

    #[test]
    fn test_exact_balance_transfer_without_gas_price() {
        let mut h = Harness::new();
        let key = SecretKey::from_slice(&[0x22; 32]).unwrap();
        h.key = key;
        h.sender = address_of(&key);
        h.ledger.fund(h.sender, U256::from(1_000));

        let recipient = Address::repeat_byte(0x99);
        let tx = h.legacy(0, 21_000, Some(recipient), U256::from(1_000), vec![]);
        let result = h.submit(tx).unwrap();

        assert!(!result.failed());
        assert_eq!(result.gas_used, 21_000);
        assert_eq!(h.ledger.balance(&recipient), U256::from(1_000));
        assert_eq!(h.ledger.balance(&h.sender), U256::zero());
        assert_eq!(h.ledger.nonce(&h.sender), 1);
    }

    #[test]
    fn test_unaffordable_value_is_a_vm_error() {
        let mut h = Harness::new();
        let key = SecretKey::from_slice(&[0x23; 32]).unwrap();
        h.key = key;
        h.sender = address_of(&key);
        h.ledger.fund(h.sender, U256::from(5));

        let recipient = Address::repeat_byte(0x98);
        let tx = h.legacy(0, 50_000, Some(recipient), U256::from(1_000), vec![]);
        let result = h.submit(tx).unwrap();

        assert!(result.failed());
        assert_eq!(result.vm_error, ERR_INSUFFICIENT_BALANCE);
        assert_eq!(result.gas_used, 21_000);
        assert!(result.logs.is_empty());
        assert_eq!(h.ledger.balance(&h.sender), U256::from(5));
        assert_eq!(h.ledger.balance(&recipient), U256::zero());
        assert_eq!(h.ledger.nonce(&h.sender), 1);
    }

    #[test]
    fn test_unaffordable_value_in_simulation() {
        let mut h = Harness::new();
        let poor = Address::repeat_byte(0x77);
        h.ledger.fund(poor, U256::from(5));

        let mut msg = Message::call(poor, Some(Address::repeat_byte(0x98)), 0, 100_000, vec![]);
        msg.value = U256::from(1_000);
        let mut tracer = RecordingTracer::default();
        let result = h
            .executor
            .apply_message(&msg, Some(&mut tracer), false)
            .unwrap();

        assert_eq!(result.vm_error, ERR_INSUFFICIENT_BALANCE);
        assert_eq!(result.gas_used, 21_000);
        assert_eq!(tracer.starts, 1);
        assert_eq!(tracer.gas_used, Some(21_000));
        assert_eq!(h.ledger.balance(&poor), U256::from(5));
        assert_eq!(h.ledger.nonce(&poor), 0);
    }

    #[test]
    fn test_leftover_gas_refunded_from_fee_collector() {
        let mut h = Harness::new();
        let before = h.ledger.balance(&h.sender);
        let tx = h.legacy(10, 50_000, Some(Address::repeat_byte(0x99)), U256::zero(), vec![]);
        let result = h.submit(tx).unwrap();

        assert_eq!(result.gas_used, 21_000);
        assert_eq!(h.ledger.balance(&h.sender), before - U256::from(21_000 * 10));
        assert_eq!(
            h.ledger.balance(&h.executor.fee_collector()),
            U256::from(21_000 * 10)
        );
    }

    #[test]
    fn test_refund_failure_when_collector_is_short() {
        let mut h = Harness::new();
        let tx = h.legacy(10, 50_000, Some(Address::repeat_byte(0x99)), U256::zero(), vec![]);
        let signed = SignedTransaction::sign(tx, &h.key).unwrap();
        let verified = VerifiedTransaction::recover(signed).unwrap();
        h.ledger.set_nonce(h.sender, 1);

        let err = h.executor.apply_transaction(&verified).unwrap_err();
        assert!(matches!(err, ExecutionError::RefundFailed(_)));
    }

    #[test]
    fn test_disabled_create_and_call() {
        let mut h = Harness::with_params(EvmParams {
            enable_create: false,
            ..Default::default()
        });
        let tx = h.legacy(0, 100_000, None, U256::zero(), init_code(&[0x00]));
        assert!(matches!(h.submit(tx), Err(ExecutionError::CreateDisabled)));

        let mut h = Harness::with_params(EvmParams {
            enable_call: false,
            ..Default::default()
        });
        let tx = h.legacy(0, 21_000, Some(Address::repeat_byte(1)), U256::zero(), vec![]);
        assert!(matches!(h.submit(tx), Err(ExecutionError::CallDisabled)));
    }

    #[test]
    fn test_intrinsic_gas_checked_before_state_changes() {
        let mut h = Harness::new();
        let recipient = Address::repeat_byte(0x99);
        let tx = h.legacy(0, 21_010, Some(recipient), U256::from(5), vec![1, 0]);
        let err = h.submit(tx).unwrap_err();

        match err {
            ExecutionError::IntrinsicGas { have, want } => {
                assert_eq!(have, 21_010);
                assert_eq!(want, 21_000 + 16 + 4);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(h.ledger.balance(&recipient), U256::zero());
        assert_eq!(h.executor.accounting().tx_index(), 0);
    }

    #[test]
    fn test_create_reports_contract_address() {
        let mut h = Harness::new();
        let nonce = h.nonce();
        let runtime = store_and_log_runtime();
        let address = h.deploy(&runtime);

        assert_eq!(address, create_address(&h.sender, nonce));
        assert_eq!(h.ledger.account_code(&address), runtime);
        assert_eq!(h.ledger.nonce(&h.sender), nonce + 1);
    }

    #[test]
    fn test_call_writes_storage_and_logs() {
        let mut h = Harness::new();
        let contract = h.deploy(&store_and_log_runtime());
        let tx = h.legacy(0, 100_000, Some(contract), U256::zero(), word(7));
        let result = h.submit(tx).unwrap();

        assert!(!result.failed());
        assert_eq!(result.ret, word(7));
        assert_eq!(result.logs.len(), 1);
        let log = &result.logs[0];
        assert_eq!(log.address, contract);
        assert_eq!(log.topics, vec![H256(TOPIC)]);
        assert_eq!(log.block_number, 1);
        assert_eq!(log.tx_index, 1);
        assert_eq!(log.index, 0);
        assert!(result.bloom.contains_input(BloomInput::Raw(contract.as_bytes())));
        assert_eq!(
            h.ledger.storage(&contract, &H256::zero()),
            H256::from_low_u64_be(7)
        );
        assert_eq!(h.executor.accounting().log_size(), 1);
        assert_eq!(h.executor.accounting().tx_index(), 2);
    }

    #[test]
    fn test_identical_inputs_give_identical_results() {
        let run = || {
            let mut h = Harness::new();
            let contract = h.deploy(&store_and_log_runtime());
            let tx = h.legacy(3, 100_000, Some(contract), U256::zero(), word(42));
            h.submit(tx).unwrap()
        };
        let first = run();
        let second = run();
        assert_eq!(first, second);
        assert!(first.gas_used <= 100_000);
    }

    #[test]
    fn test_revert_is_data_not_error() {
        let mut h = Harness::new();
        let contract = h.deploy(&reverting_runtime());
        let tx = h.legacy(0, 100_000, Some(contract), U256::zero(), vec![]);
        let result = h.submit(tx).unwrap();

        assert!(result.failed());
        assert_eq!(result.revert(), Some(&[0xde, 0xad, 0xbe, 0xef][..]));
        assert!(result.logs.is_empty());
        assert!(result.gas_used > 21_000);
        assert_eq!(h.ledger.storage(&contract, &H256::from_low_u64_be(1)), H256::zero());
        // the failed transaction still occupies an index
        assert_eq!(h.executor.accounting().tx_index(), 2);
    }

    #[test]
    fn test_out_of_gas_consumes_whole_limit() {
        let mut h = Harness::new();
        let contract = h.deploy(&store_and_log_runtime());
        let tx = h.legacy(0, 25_000, Some(contract), U256::zero(), word(1));
        let result = h.submit(tx).unwrap();

        assert!(result.failed());
        assert_eq!(result.gas_used, 25_000);
        assert_eq!(h.ledger.storage(&contract, &H256::zero()), H256::zero());
    }

    #[test]
    fn test_apply_message_commit_is_the_only_difference() {
        let mut h = Harness::new();
        let contract = h.deploy(&store_and_log_runtime());
        let nonce = h.nonce();
        let msg = Message::call(h.sender, Some(contract), nonce, 100_000, word(9));

        let simulated = h.executor.apply_message(&msg, None, false).unwrap();
        assert_eq!(h.ledger.storage(&contract, &H256::zero()), H256::zero());
        assert_eq!(h.ledger.nonce(&h.sender), nonce);

        let mut tracer = RecordingTracer::default();
        let applied = h
            .executor
            .apply_message(&msg, Some(&mut tracer), true)
            .unwrap();
        assert_eq!(simulated, applied);
        assert_eq!(
            h.ledger.storage(&contract, &H256::zero()),
            H256::from_low_u64_be(9)
        );
        assert_eq!(tracer.starts, 1);
        assert_eq!(tracer.logs, 1);
        assert_eq!(tracer.gas_used, Some(applied.gas_used));
    }

    #[test]
    fn test_post_tx_hook_failure_discards_state() {
        let mut h = Harness::build(EvmParams::default(), |e| {
            e.with_post_tx_hook(Arc::new(FailingHook))
        });
        let contract = Address::repeat_byte(0x77);
        h.ledger.deploy_code(contract, store_and_log_runtime());

        let tx = h.legacy(0, 100_000, Some(contract), U256::zero(), word(3));
        let result = h.submit(tx).unwrap();

        assert_eq!(result.vm_error, ERR_POST_TX_PROCESSING);
        assert!(result.logs.is_empty());
        assert_eq!(result.bloom, Bloom::zero());
        assert_eq!(h.ledger.storage(&contract, &H256::zero()), H256::zero());
        // upstream nonce bump survives
        assert_eq!(h.ledger.nonce(&h.sender), 1);
        assert_eq!(h.executor.accounting().tx_index(), 1);
        assert_eq!(h.executor.accounting().log_size(), 0);
    }

    #[test]
    fn test_blockhash_sees_current_and_past_headers() {
        let mut h = Harness::new();
        h.ledger.record_block_hash(0, H256::repeat_byte(0xaa));
        // BLOCKHASH(calldata word 0) returned as one word
        let mut asm = Assembler::new();
        asm.push_u64(0)
            .op(op::CALLDATALOAD)
            .op(0x40)
            .push_u64(0)
            .op(op::MSTORE)
            .push_u64(32)
            .push_u64(0)
            .op(op::RETURN);
        let contract = Address::repeat_byte(0x66);
        h.ledger.deploy_code(contract, asm.assemble().unwrap());

        let past = Message::call(h.sender, Some(contract), h.nonce(), 100_000, word(0));
        let result = h.executor.apply_message(&past, None, false).unwrap();
        assert_eq!(result.ret, H256::repeat_byte(0xaa).as_bytes());

        let future = Message::call(h.sender, Some(contract), h.nonce(), 100_000, word(5));
        let result = h.executor.apply_message(&future, None, false).unwrap();
        assert_eq!(result.ret, vec![0u8; 32]);
    }
}

#[cfg(test)]
mod native_path_tests {
    use super::*;

    #[test]
    fn test_native_message_applies_and_floors_gas() {
        let mut h = Harness::new();
        let recipient = Address::repeat_byte(0x55);
        let native = NativeMessage::new(BANK_SEND, h.sender, bank_send_body(recipient, 500));
        let tx = h.native_tx(&native, 60_000);
        let result = h.submit(tx).unwrap();

        assert!(!result.failed());
        assert_eq!(result.gas_used, 30_000);
        assert_eq!(h.ledger.balance(&recipient), U256::from(500));
        assert!(h.executor.events().iter().any(|e| matches!(
            e,
            EvmEvent::NativeMessage { type_url, .. } if type_url == BANK_SEND
        )));
    }

    #[test]
    fn test_native_gas_below_floor_is_raised() {
        let ledger = Arc::new(MemoryLedger::new());
        let mut router = MsgServiceRouter::new();
        router.register(BANK_SEND, Arc::new(BankSend { gas: 10 })).unwrap();
        let mut executor = Executor::new(ledger.clone(), Arc::new(router), EvmParams::default());
        executor.begin_block(create_test_header(1));

        let from = Address::repeat_byte(0x01);
        ledger.fund(from, U256::from(100));
        let native = NativeMessage::new(BANK_SEND, from, bank_send_body(Address::repeat_byte(2), 1));
        let msg = Message::call(from, Some(NATIVE_MESSAGE_ADDRESS), 0, 50_000, native.encode().unwrap());
        let result = executor.apply_message(&msg, None, true).unwrap();
        assert_eq!(result.gas_used, 21_000);
    }

    #[test]
    fn test_native_gas_above_limit_fails_hard() {
        let mut h = Harness::new();
        let native = NativeMessage::new(BANK_SEND, h.sender, bank_send_body(Address::repeat_byte(3), 1));
        let tx = h.native_tx(&native, 25_000);
        assert!(matches!(h.submit(tx), Err(ExecutionError::GasOverflow(_))));
        assert_eq!(h.ledger.balance(&Address::repeat_byte(3)), U256::zero());
    }

    #[test]
    fn test_native_validation_errors() {
        let mut h = Harness::new();

        let mismatch = NativeMessage::new(BANK_SEND, Address::repeat_byte(9), bank_send_body(Address::repeat_byte(3), 1));
        let tx = h.native_tx(&mismatch, 60_000);
        assert!(matches!(h.submit(tx), Err(ExecutionError::SignerMismatch { .. })));

        let unroutable = NativeMessage::new("/tessera.unknown.v1.Msg", h.sender, vec![]);
        let tx = h.native_tx(&unroutable, 60_000);
        assert!(matches!(h.submit(tx), Err(ExecutionError::UnroutableMessage(url)) if url == "/tessera.unknown.v1.Msg"));

        let nested = NativeMessage::new(NativeMessage::ETHEREUM_TX_TYPE_URL, h.sender, vec![]);
        let tx = h.native_tx(&nested, 60_000);
        assert!(matches!(h.submit(tx), Err(ExecutionError::NestedVmTransaction)));

        let tx = h.legacy(0, 60_000, Some(NATIVE_MESSAGE_ADDRESS), U256::zero(), vec![0xff; 3]);
        assert!(matches!(h.submit(tx), Err(ExecutionError::Decode(_))));
    }

    #[test]
    fn test_simulation_runs_validate_basic() {
        let mut h = Harness::new();
        let native = NativeMessage::new(BANK_SEND, h.sender, vec![1, 2, 3]);
        let msg = Message::call(h.sender, Some(NATIVE_MESSAGE_ADDRESS), h.nonce(), 60_000, native.encode().unwrap());
        let err = h.executor.apply_message(&msg, None, false).unwrap_err();
        assert!(matches!(err, ExecutionError::InvalidMessage(_)));
    }

    #[test]
    fn test_duplicate_route_rejected() {
        let mut router = MsgServiceRouter::new();
        router.register(BANK_SEND, Arc::new(BankSend { gas: 1 })).unwrap();
        let err = router.register(BANK_SEND, Arc::new(BankSend { gas: 1 })).unwrap_err();
        assert!(matches!(err, ExecutionError::DuplicateRoute(_)));
    }
}

#[cfg(test)]
mod block_lifecycle_tests {
    use super::*;

    #[test]
    fn test_end_block_records_bloom_and_gas() {
        let mut h = Harness::new();
        let contract = h.deploy(&store_and_log_runtime());
        let tx = h.legacy(0, 100_000, Some(contract), U256::zero(), word(1));
        let call = h.submit(tx).unwrap();

        let summary = h.executor.end_block().unwrap();
        assert_eq!(summary.height, 1);
        assert!(summary.gas_used > call.gas_used);
        assert_eq!(summary.bloom, call.bloom);
        assert_eq!(h.executor.accounting().block_bloom(1), Some(call.bloom));
        assert_eq!(h.executor.accounting().block_gas_used(1), Some(summary.gas_used));

        let events = h.executor.take_events();
        assert!(events.contains(&EvmEvent::BlockGasUsed {
            height: 1,
            amount: summary.gas_used
        }));
        assert!(events.contains(&EvmEvent::BlockBloom {
            height: 1,
            bloom: summary.bloom
        }));
        let tx_events = events
            .iter()
            .filter(|e| matches!(e, EvmEvent::EthereumTx { .. }))
            .count();
        assert_eq!(tx_events, 2);
    }

    #[test]
    fn test_counters_reset_per_block() {
        let mut h = Harness::new();
        let tx = h.legacy(0, 21_000, Some(Address::repeat_byte(1)), U256::zero(), vec![]);
        h.submit(tx).unwrap();
        assert_eq!(h.executor.accounting().transient_gas_used(), 21_000);

        h.executor.end_block().unwrap();
        h.executor.begin_block(create_test_header(2));
        assert_eq!(h.executor.accounting().tx_index(), 0);
        assert_eq!(h.executor.accounting().transient_gas_used(), 0);
    }

    #[test]
    fn test_no_active_block() {
        let mut h = Harness::new();
        h.executor.end_block().unwrap();
        let msg = Message::call(h.sender, Some(Address::repeat_byte(1)), 0, 21_000, vec![]);
        assert!(matches!(
            h.executor.apply_message(&msg, None, false),
            Err(ExecutionError::NoActiveBlock)
        ));
        assert!(matches!(h.executor.end_block(), Err(ExecutionError::NoActiveBlock)));
    }

    #[test]
    fn test_base_fee_follows_parent_usage() {
        let ledger = Arc::new(MemoryLedger::new());
        let mut executor = Executor::new(
            ledger,
            Arc::new(MsgServiceRouter::new()),
            EvmParams::default(),
        );
        executor.begin_block(create_test_header(1));
        let initial = executor.base_fee().unwrap();
        assert_eq!(initial, FeeMarketParams::default().initial_base_fee);
        executor.end_block().unwrap();

        // empty parent block: base fee falls by 1/8
        executor.begin_block(create_test_header(2));
        assert_eq!(executor.base_fee(), Some(initial - initial / 8));
        assert!(executor
            .events()
            .iter()
            .any(|e| matches!(e, EvmEvent::BaseFee { height: 2, .. })));
    }
}
