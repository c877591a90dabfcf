// tessera/core/execution/src/executor.rs

use std::sync::Arc;

use tessera_primitives::{Address, Bloom, Message, VerifiedTransaction, H256, U256};
use tracing::{debug, info, warn};

use crate::accounting::{BlockAccounting, BlockSummary};
use crate::config::{BlockHeader, EvmParams, ExecutionConfig, FeeMarketParams, TxConfig};
use crate::dispatch::Dispatch;
use crate::error::ExecutionError;
use crate::events::{EventManager, EvmEvent};
use crate::fee_market::{calculate_base_fee, ParentBlock};
use crate::hooks::PostTxHook;
use crate::ledger::{LedgerError, LedgerState};
use crate::metrics::record_execution;
use crate::native::{apply_native_message, MessageRouter};
use crate::result::{ExecutionResult, Receipt, ERR_POST_TX_PROCESSING};
use crate::state::{BlockHashContext, StateView};
use crate::tracer::{NoopTracer, Tracer};
use crate::vm::apply_vm_message;

/// Account collecting fees upstream; leftover gas is refunded from it.
pub fn default_fee_collector() -> Address {
    Address::from_low_u64_be(0xfee)
}

#[derive(Debug, Clone)]
struct ActiveBlock {
    header: BlockHeader,
    base_fee: Option<U256>,
}

/// Applies transactions of one block at a time against the ledger.
pub struct Executor {
    ledger: Arc<dyn LedgerState>,
    router: Arc<dyn MessageRouter>,
    params: EvmParams,
    fee_market: FeeMarketParams,
    fee_collector: Address,
    hook: Option<Arc<dyn PostTxHook>>,
    block: Option<ActiveBlock>,
    parent: Option<ParentBlock>,
    accounting: BlockAccounting,
    events: EventManager,
}

impl Executor {
    pub fn new(
        ledger: Arc<dyn LedgerState>,
        router: Arc<dyn MessageRouter>,
        params: EvmParams,
    ) -> Self {
        Self {
            ledger,
            router,
            params,
            fee_market: FeeMarketParams::default(),
            fee_collector: default_fee_collector(),
            hook: None,
            block: None,
            parent: None,
            accounting: BlockAccounting::new(),
            events: EventManager::default(),
        }
    }

    pub fn with_fee_market(mut self, params: FeeMarketParams) -> Self {
        self.fee_market = params.sanitize();
        self
    }

    pub fn with_fee_collector(mut self, fee_collector: Address) -> Self {
        self.fee_collector = fee_collector;
        self
    }

    pub fn with_post_tx_hook(mut self, hook: Arc<dyn PostTxHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn ledger(&self) -> Arc<dyn LedgerState> {
        Arc::clone(&self.ledger)
    }

    pub fn params(&self) -> &EvmParams {
        &self.params
    }

    /// Governance update; takes effect from the next configuration built.
    pub fn set_params(&mut self, params: EvmParams) {
        self.params = params;
    }

    pub fn fee_collector(&self) -> Address {
        self.fee_collector
    }

    pub fn accounting(&self) -> &BlockAccounting {
        &self.accounting
    }

    pub fn events(&self) -> &[EvmEvent] {
        self.events.events()
    }

    pub fn take_events(&mut self) -> Vec<EvmEvent> {
        self.events.drain()
    }

    pub(crate) fn emit(&mut self, event: EvmEvent) {
        self.events.emit(event);
    }

    pub fn base_fee(&self) -> Option<U256> {
        self.block.as_ref().and_then(|b| b.base_fee)
    }

    /// Starts a block: clears transient counters and prices its base fee
    /// from the previous block.
    pub fn begin_block(&mut self, header: BlockHeader) {
        let base_fee = calculate_base_fee(
            &self.fee_market,
            &self.params.chain,
            header.height,
            self.parent.as_ref(),
        );
        if let Some(base_fee) = base_fee {
            self.events.emit(EvmEvent::BaseFee {
                height: header.height,
                base_fee,
            });
        }
        self.accounting.reset(header.height);
        debug!(height = header.height, ?base_fee, "Began block");
        self.block = Some(ActiveBlock { header, base_fee });
    }

    /// Closes the block: stores its bloom and gas under its height and
    /// emits the block-level events.
    pub fn end_block(&mut self) -> Result<BlockSummary, ExecutionError> {
        let block = self.block.take().ok_or(ExecutionError::NoActiveBlock)?;
        let summary = self.accounting.finalize(block.header.gas_limit);

        self.events.emit(EvmEvent::BlockGasUsed {
            height: summary.height,
            amount: summary.gas_used,
        });
        self.events.emit(EvmEvent::BlockBloom {
            height: summary.height,
            bloom: summary.bloom,
        });
        self.parent = Some(ParentBlock {
            height: summary.height,
            gas_used: summary.gas_used,
            gas_limit: block.header.gas_limit,
            base_fee: block.base_fee,
        });

        info!(
            height = summary.height,
            gas_used = summary.gas_used,
            txs = self.accounting.tx_index(),
            "Block applied"
        );
        Ok(summary)
    }

    fn active_block(&self) -> Result<&ActiveBlock, ExecutionError> {
        self.block.as_ref().ok_or(ExecutionError::NoActiveBlock)
    }

    pub fn evm_config(&self) -> Result<ExecutionConfig, ExecutionError> {
        let block = self.active_block()?;
        Ok(ExecutionConfig::new(
            self.params.clone(),
            &block.header,
            block.base_fee,
        ))
    }

    pub fn tx_config(&self, tx_hash: H256) -> Result<TxConfig, ExecutionError> {
        let block = self.active_block()?;
        Ok(TxConfig {
            block_hash: block.header.hash,
            tx_hash,
            tx_index: self.accounting.tx_index(),
            log_index: self.accounting.log_size(),
        })
    }

    pub fn block_hash_context(&self) -> Result<BlockHashContext, ExecutionError> {
        let block = self.active_block()?;
        Ok(BlockHashContext {
            height: block.header.height,
            hash: block.header.hash,
        })
    }

    /// Block-application entry point for an authenticated, fee-deducted
    /// transaction.
    pub fn apply_transaction(
        &mut self,
        tx: &VerifiedTransaction,
    ) -> Result<ExecutionResult, ExecutionError> {
        let config = self.evm_config()?;
        let tx_config = self.tx_config(tx.hash())?;
        let dispatch = Dispatch::route(tx.as_message(config.base_fee));
        let msg = dispatch.message();

        let ledger = Arc::clone(&self.ledger);
        let mut view = StateView::new(ledger.as_ref(), self.block_hash_context()?);
        let (mut result, native_event) = self.execute(
            &mut view,
            &dispatch,
            &mut NoopTracer,
            false,
            &config,
            &tx_config,
        )?;

        let cumulative_gas_used = self
            .accounting
            .transient_gas_used()
            .saturating_add(result.gas_used)
            .min(config.block_gas_limit);
        let receipt = Receipt {
            tx_hash: tx_config.tx_hash,
            tx_index: tx_config.tx_index,
            block_number: config.block_number,
            status: !result.failed(),
            gas_used: result.gas_used,
            cumulative_gas_used,
            logs: result.logs.clone(),
            bloom: result.bloom,
            contract_address: result.contract_address,
        };

        let mut commit = true;
        let hook = match dispatch {
            Dispatch::Vm(_) if !result.failed() => self.hook.as_ref(),
            _ => None,
        };
        if let Some(hook) = hook {
            if let Err(err) = hook.post_tx_processing(&mut view, msg, &receipt) {
                warn!(hash = ?tx_config.tx_hash, error = %err, "Post-transaction hook failed");
                result.vm_error = ERR_POST_TX_PROCESSING.to_string();
                result.logs.clear();
                result.bloom = Bloom::zero();
                commit = false;
            }
        }

        let leftover = msg
            .gas_limit
            .checked_sub(result.gas_used)
            .ok_or(ExecutionError::GasOverflow("gas used above gas limit"))?;
        let refund = U256::from(leftover).saturating_mul(msg.gas_price);
        let collector_balance = if commit {
            view.balance(&self.fee_collector)
        } else {
            self.ledger.balance(&self.fee_collector)
        };
        if collector_balance < refund {
            return Err(ExecutionError::RefundFailed(LedgerError::InsufficientFunds {
                address: self.fee_collector,
                balance: collector_balance,
                required: refund,
            }));
        }
        self.accounting.add_transient_gas_used(result.gas_used)?;

        if commit {
            view.flush();
            if let Some(event) = native_event {
                self.events.emit(event);
            }
        }
        drop(view);
        self.refund_gas(msg, leftover)?;

        if !result.logs.is_empty() {
            self.accounting.accrue_bloom(&result.bloom);
            self.accounting.add_log_size(result.logs.len() as u64);
        }
        self.accounting.increment_tx_index();

        self.events.emit(EvmEvent::EthereumTx {
            amount: msg.value,
            hash: tx_config.tx_hash,
            index: tx_config.tx_index,
            gas_used: result.gas_used,
            recipient: msg.to,
            contract: result.contract_address,
            failed: result.failed().then(|| result.vm_error.clone()),
        });
        record_execution(dispatch.path(), result.failed(), result.gas_used);

        Ok(result)
    }

    /// Simulates or applies `msg` against the current block, outside any
    /// transaction.
    pub fn apply_message(
        &mut self,
        msg: &Message,
        tracer: Option<&mut dyn Tracer>,
        commit: bool,
    ) -> Result<ExecutionResult, ExecutionError> {
        let config = self.evm_config()?;
        let tx_config = TxConfig::empty(config.block_hash);
        self.apply_message_with_config(msg, tracer, commit, &config, &tx_config)
    }

    /// Routes `msg` and applies it with explicit configuration. `commit`
    /// selects between flushing to the ledger and discarding; the returned
    /// result is the same either way.
    pub fn apply_message_with_config(
        &mut self,
        msg: &Message,
        tracer: Option<&mut dyn Tracer>,
        commit: bool,
        config: &ExecutionConfig,
        tx_config: &TxConfig,
    ) -> Result<ExecutionResult, ExecutionError> {
        let dispatch = Dispatch::route(msg.clone());
        let ledger = Arc::clone(&self.ledger);
        let mut view = StateView::new(
            ledger.as_ref(),
            BlockHashContext {
                height: config.block_number,
                hash: config.block_hash,
            },
        );

        let mut noop = NoopTracer;
        let tracer: &mut dyn Tracer = match tracer {
            Some(tracer) => tracer,
            None => &mut noop,
        };
        let (result, native_event) =
            self.execute(&mut view, &dispatch, tracer, !commit, config, tx_config)?;

        if commit {
            view.flush();
            if let Some(event) = native_event {
                self.events.emit(event);
            }
        }
        Ok(result)
    }

    fn execute(
        &self,
        view: &mut StateView<'_>,
        dispatch: &Dispatch,
        tracer: &mut dyn Tracer,
        simulate: bool,
        config: &ExecutionConfig,
        tx_config: &TxConfig,
    ) -> Result<(ExecutionResult, Option<EvmEvent>), ExecutionError> {
        match dispatch {
            Dispatch::Vm(msg) => {
                let result = apply_vm_message(view, config, tx_config, msg, tracer)?;
                Ok((result, None))
            }
            Dispatch::Native(msg) => {
                let outcome =
                    apply_native_message(view, self.router.as_ref(), tx_config, msg, simulate)?;
                Ok((outcome.result, Some(outcome.event)))
            }
        }
    }

    /// Returns `leftover * gas_price` from the fee collector to the sender.
    pub fn refund_gas(&self, msg: &Message, leftover: u64) -> Result<(), ExecutionError> {
        let refund = U256::from(leftover).saturating_mul(msg.gas_price);
        if refund.is_zero() {
            return Ok(());
        }
        self.ledger
            .send_coins(&self.fee_collector, &msg.from, refund)
            .map_err(ExecutionError::RefundFailed)
    }
}
