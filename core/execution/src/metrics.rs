// tessera/core/execution/src/metrics.rs

// Metrics for tracking transaction execution and governance directives
use once_cell::sync::Lazy;
use prometheus::{register_counter_vec, register_histogram, CounterVec, Histogram};

pub static TX_EXECUTIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tessera_tx_executions_total",
        "Number of applied transactions",
        &["path", "status"]
    )
    .expect("register tessera_tx_executions_total")
});

pub static TX_GAS_USED: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!("tessera_tx_gas_used", "Gas used by applied transactions")
        .expect("register tessera_tx_gas_used")
});

pub static PROPOSAL_DIRECTIVES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tessera_proposal_directives_total",
        "Proposal council directives by outcome",
        &["status"]
    )
    .expect("register tessera_proposal_directives_total")
});

pub(crate) fn record_execution(path: &str, failed: bool, gas_used: u64) {
    let status = if failed { "vm_error" } else { "success" };
    TX_EXECUTIONS_TOTAL.with_label_values(&[path, status]).inc();
    TX_GAS_USED.observe(gas_used as f64);
}
