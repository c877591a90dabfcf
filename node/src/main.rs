// tessera/node/src/main.rs

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use clap::Parser;
use tessera_execution::{Executor, LedgerState, MemoryLedger, MsgServiceRouter, ProposalCouncil};
use tessera_primitives::{Address, LedgerTx, U256};
use tessera_sequencer::{ConsensusQueue, LedgerPoolState, PoolScheduler, SubmitError, TxPool};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

mod config;
pub mod logging;

use config::NodeConfig;

#[derive(Parser)]
#[command(name = "tessera")]
#[command(about = "Tessera execution and transaction pool node")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Genesis accounts to fund (hex address, can be specified multiple times)
    #[arg(long = "fund", value_name = "ADDRESS")]
    fund: Vec<String>,
}

/// Consensus queue stand-in that logs every submitted ledger transaction.
struct LoggingQueue;

#[async_trait]
impl ConsensusQueue for LoggingQueue {
    async fn submit(&self, payload: Vec<u8>) -> Result<(), SubmitError> {
        let tx = LedgerTx::decode(&payload).map_err(|e| SubmitError::Rejected(e.to_string()))?;
        info!(
            messages = tx.messages.len(),
            gas_limit = tx.gas_limit,
            fee = %tx.fee.amount,
            denom = %tx.fee.denom,
            payload = %hex::encode(&payload[..payload.len().min(16)]),
            "Submitted ledger transaction"
        );
        Ok(())
    }
}

fn parse_address(raw: &str) -> Result<Address> {
    let bytes = hex::decode(raw.trim_start_matches("0x"))
        .with_context(|| format!("Invalid hex address {}", raw))?;
    if bytes.len() != 20 {
        bail!("Address {} must be 20 bytes, got {}", raw, bytes.len());
    }
    Ok(Address::from_slice(&bytes))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = NodeConfig::load(cli.config.as_deref())?;
    logging::init_logging(&config.log)?;

    info!(
        chain_id = config.evm.chain.chain_id,
        london = ?config.evm.chain.london_block,
        "Starting tessera node"
    );

    let ledger = Arc::new(MemoryLedger::new());
    for raw in &cli.fund {
        let address = parse_address(raw)?;
        ledger.fund(address, U256::from(10).pow(U256::from(24)));
        info!(?address, "Funded genesis account");
    }
    let ledger: Arc<dyn LedgerState> = ledger;

    let executor = Executor::new(
        ledger.clone(),
        Arc::new(MsgServiceRouter::new()),
        config.evm.clone(),
    )
    .with_fee_market(config.fee_market.clone());
    let council = ProposalCouncil::new(config.council.clone());
    info!(
        fee_collector = ?executor.fee_collector(),
        trusted_proxies = council.config().trusted_proxies.len(),
        "Execution core ready"
    );

    let state = Arc::new(LedgerPoolState::new(
        ledger,
        config.evm.chain.clone(),
        config.max_block_gas,
    ));
    let pool = Arc::new(TxPool::new(config.txpool.clone(), state, Arc::new(LoggingQueue)));
    info!(min_gas_price = %pool.min_gas_price(), "Transaction pool ready");

    let cancel = CancellationToken::new();
    let scheduler = PoolScheduler::new(pool.clone(), cancel.clone()).spawn();

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received");
    cancel.cancel();
    if let Err(e) = scheduler.await {
        warn!("Pool scheduler terminated abnormally: {}", e);
    }

    let stats = pool.stats().await;
    info!(pending = stats.pending, queued = stats.queued, "Node stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address() {
        let address = parse_address("0x00000000000000000000000000000000000000ad").unwrap();
        assert_eq!(address, Address::from_low_u64_be(0xad));
        assert!(parse_address("0xabcd").is_err());
        assert!(parse_address("zz").is_err());
    }

    #[tokio::test]
    async fn test_logging_queue_rejects_garbage() {
        assert!(matches!(
            LoggingQueue.submit(vec![0xff]).await,
            Err(SubmitError::Rejected(_))
        ));
    }
}
