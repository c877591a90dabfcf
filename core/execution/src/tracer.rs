// tessera/core/execution/src/tracer.rs

use tessera_primitives::{Address, Log, U256};

/// Observer invoked by the VM executor around each message.
pub trait Tracer {
    fn capture_start(
        &mut self,
        _from: Address,
        _to: Option<Address>,
        _input: &[u8],
        _gas: u64,
        _value: U256,
    ) {
    }

    fn capture_log(&mut self, _log: &Log) {}

    fn capture_end(&mut self, _output: &[u8], _gas_used: u64, _error: Option<&str>) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTracer;

impl Tracer for NoopTracer {}
