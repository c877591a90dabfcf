// tessera/core/sequencer/src/metrics.rs

// Metrics for tracking transaction pool occupancy and broadcast
use once_cell::sync::Lazy;
use prometheus::{register_counter_vec, register_int_gauge, CounterVec, IntGauge};

pub static POOL_PENDING: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("tessera_txpool_pending", "Executable transactions in the pool")
        .expect("register tessera_txpool_pending")
});

pub static POOL_QUEUED: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("tessera_txpool_queued", "Non-executable transactions in the pool")
        .expect("register tessera_txpool_queued")
});

pub static POOL_BROADCAST_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tessera_txpool_broadcast_total",
        "Transactions handed to the consensus queue by outcome",
        &["status"]
    )
    .expect("register tessera_txpool_broadcast_total")
});

pub static POOL_REJECTIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tessera_txpool_rejections_total",
        "Transactions refused admission by reason",
        &["reason"]
    )
    .expect("register tessera_txpool_rejections_total")
});

pub static POOL_DROPPED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tessera_txpool_dropped_total",
        "Transactions dropped from the pool by cause",
        &["cause"]
    )
    .expect("register tessera_txpool_dropped_total")
});

pub(crate) fn record_occupancy(pending: usize, queued: usize) {
    POOL_PENDING.set(pending as i64);
    POOL_QUEUED.set(queued as i64);
}

pub(crate) fn record_dropped(cause: &str, count: usize) {
    if count > 0 {
        POOL_DROPPED_TOTAL
            .with_label_values(&[cause])
            .inc_by(count as f64);
    }
}
