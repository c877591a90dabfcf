// tessera/core/primitives/src/gas.rs

use thiserror::Error;

use crate::transaction::AccessList;

pub const TX_GAS: u64 = 21_000;
pub const TX_GAS_CONTRACT_CREATION: u64 = 53_000;
pub const TX_DATA_ZERO_GAS: u64 = 4;
pub const TX_DATA_NON_ZERO_GAS: u64 = 16;
pub const TX_ACCESS_LIST_ADDRESS_GAS: u64 = 2_400;
pub const TX_ACCESS_LIST_STORAGE_KEY_GAS: u64 = 1_900;
pub const INIT_CODE_WORD_GAS: u64 = 2;

/// Refund cap divisor before London.
pub const REFUND_QUOTIENT: u64 = 2;
/// Refund cap divisor once London (EIP-3529) is active.
pub const REFUND_QUOTIENT_EIP3529: u64 = 5;

pub const MAX_CODE_SIZE: usize = 24_576;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GasError {
    #[error("gas uint64 overflow")]
    Overflow,
}

/// Gas charged before any opcode runs.
///
/// Access list costs are only charged when the caller passes a list, so
/// pre-Berlin callers pass `None`.
pub fn intrinsic_gas(
    data: &[u8],
    access_list: Option<&AccessList>,
    is_create: bool,
    is_shanghai: bool,
) -> Result<u64, GasError> {
    let mut gas = if is_create {
        TX_GAS_CONTRACT_CREATION
    } else {
        TX_GAS
    };

    if !data.is_empty() {
        let non_zero = data.iter().filter(|b| **b != 0).count() as u64;
        let zero = data.len() as u64 - non_zero;

        if (u64::MAX - gas) / TX_DATA_NON_ZERO_GAS < non_zero {
            return Err(GasError::Overflow);
        }
        gas += non_zero * TX_DATA_NON_ZERO_GAS;

        if (u64::MAX - gas) / TX_DATA_ZERO_GAS < zero {
            return Err(GasError::Overflow);
        }
        gas += zero * TX_DATA_ZERO_GAS;

        if is_create && is_shanghai {
            let words = (data.len() as u64).div_ceil(32);
            if (u64::MAX - gas) / INIT_CODE_WORD_GAS < words {
                return Err(GasError::Overflow);
            }
            gas += words * INIT_CODE_WORD_GAS;
        }
    }

    if let Some(list) = access_list {
        let addresses = list.len() as u64;
        let keys: u64 = list.iter().map(|item| item.storage_keys.len() as u64).sum();
        gas = addresses
            .checked_mul(TX_ACCESS_LIST_ADDRESS_GAS)
            .and_then(|g| gas.checked_add(g))
            .ok_or(GasError::Overflow)?;
        gas = keys
            .checked_mul(TX_ACCESS_LIST_STORAGE_KEY_GAS)
            .and_then(|g| gas.checked_add(g))
            .ok_or(GasError::Overflow)?;
    }

    Ok(gas)
}

/// Gas returned to the sender from the refund counter, capped at
/// `gas_used / quotient`.
pub fn gas_to_refund(available_refund: u64, gas_used: u64, quotient: u64) -> u64 {
    available_refund.min(gas_used / quotient)
}
