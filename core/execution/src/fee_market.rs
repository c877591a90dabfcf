// tessera/core/execution/src/fee_market.rs

//! EIP-1559 base fee.

use tessera_primitives::{ChainRules, U256};

use crate::config::FeeMarketParams;

/// Gas figures of the parent block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentBlock {
    pub height: u64,
    pub gas_used: u64,
    pub gas_limit: u64,
    pub base_fee: Option<U256>,
}

/// Base fee for the block at `height`, or `None` when the fee market is off.
pub fn calculate_base_fee(
    params: &FeeMarketParams,
    rules: &ChainRules,
    height: u64,
    parent: Option<&ParentBlock>,
) -> Option<U256> {
    if params.no_base_fee || !rules.is_london(height) {
        return None;
    }

    let (parent, parent_base_fee) = match parent {
        Some(p) if rules.london_block != Some(height) => match p.base_fee {
            Some(fee) => (p, fee),
            None => return Some(params.initial_base_fee),
        },
        _ => return Some(params.initial_base_fee),
    };

    let elasticity = u64::from(params.elasticity_multiplier.max(1));
    let denominator = U256::from(params.base_fee_change_denominator.max(1));
    let target = parent.gas_limit / elasticity;
    if target == 0 || parent.gas_used == target {
        return Some(parent_base_fee.max(params.min_gas_price));
    }

    let next = if parent.gas_used > target {
        let delta = parent_base_fee.saturating_mul(U256::from(parent.gas_used - target))
            / U256::from(target)
            / denominator;
        parent_base_fee.saturating_add(delta.max(U256::one()))
    } else {
        let delta = parent_base_fee.saturating_mul(U256::from(target - parent.gas_used))
            / U256::from(target)
            / denominator;
        parent_base_fee.saturating_sub(delta)
    };
    Some(next.max(params.min_gas_price))
}
