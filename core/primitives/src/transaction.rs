// tessera/core/primitives/src/transaction.rs

//! Typed Ethereum transactions: legacy (with and without EIP-155 replay
//! protection), EIP-2930 access-list and EIP-1559 dynamic-fee.

use std::ops::Deref;

use rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream};
use secp256k1::{
    ecdsa::{RecoverableSignature, RecoveryId},
    Secp256k1, SecretKey,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::message::Message;
use crate::types::{keccak256, Address, H256, U256};

/// secp256k1n / 2, the upper bound for `s` (EIP-2).
const SECP256K1_HALF_N: [u8; 32] = [
    0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0x5d, 0x57, 0x6e, 0x73, 0x57, 0xa4, 0x50, 0x1d, 0xdf, 0xe9, 0x2f, 0x46, 0x68, 0x1b, 0x20, 0xa0,
];

#[derive(Debug, Error)]
pub enum TxError {
    #[error("empty transaction payload")]
    Empty,

    #[error("transaction type {0:#04x} not supported")]
    UnsupportedType(u8),

    #[error("rlp: {0}")]
    Rlp(#[from] DecoderError),

    #[error("invalid transaction v, r, s values")]
    InvalidSignature,

    #[error("secp256k1: {0}")]
    Secp256k1(#[from] secp256k1::Error),

    #[error("chain id {0} too large for a legacy signature")]
    ChainIdOverflow(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxType {
    Legacy,
    AccessList,
    DynamicFee,
}

impl TxType {
    fn type_byte(self) -> Option<u8> {
        match self {
            TxType::Legacy => None,
            TxType::AccessList => Some(0x01),
            TxType::DynamicFee => Some(0x02),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessListItem {
    pub address: Address,
    pub storage_keys: Vec<H256>,
}

pub type AccessList = Vec<AccessListItem>;

impl Encodable for AccessListItem {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(2);
        s.append(&self.address);
        s.append_list(&self.storage_keys);
    }
}

impl Decodable for AccessListItem {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        if rlp.item_count()? != 2 {
            return Err(DecoderError::RlpIncorrectListLen);
        }
        Ok(Self {
            address: rlp.val_at(0)?,
            storage_keys: rlp.list_at(1)?,
        })
    }
}

/// Unsigned transaction body.
///
/// Legacy and access-list transactions carry a single gas price, stored in
/// both `fee_cap` and `tip_cap`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub tx_type: TxType,
    pub chain_id: Option<u64>,
    pub nonce: u64,
    pub tip_cap: U256,
    pub fee_cap: U256,
    pub gas_limit: u64,
    pub to: Option<Address>,
    pub value: U256,
    pub data: Vec<u8>,
    pub access_list: AccessList,
}

impl Transaction {
    pub fn legacy(
        chain_id: Option<u64>,
        nonce: u64,
        gas_price: U256,
        gas_limit: u64,
        to: Option<Address>,
        value: U256,
        data: Vec<u8>,
    ) -> Self {
        Self {
            tx_type: TxType::Legacy,
            chain_id,
            nonce,
            tip_cap: gas_price,
            fee_cap: gas_price,
            gas_limit,
            to,
            value,
            data,
            access_list: Vec::new(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn dynamic_fee(
        chain_id: u64,
        nonce: u64,
        tip_cap: U256,
        fee_cap: U256,
        gas_limit: u64,
        to: Option<Address>,
        value: U256,
        data: Vec<u8>,
        access_list: AccessList,
    ) -> Self {
        Self {
            tx_type: TxType::DynamicFee,
            chain_id: Some(chain_id),
            nonce,
            tip_cap,
            fee_cap,
            gas_limit,
            to,
            value,
            data,
            access_list,
        }
    }

    pub fn gas_price(&self) -> U256 {
        self.fee_cap
    }

    /// Fields shared by the signing payload and the signed encoding.
    fn append_body(&self, s: &mut RlpStream) {
        let chain_id = self.chain_id.unwrap_or_default();
        match self.tx_type {
            TxType::Legacy => {
                s.append(&self.nonce);
                s.append(&self.fee_cap);
                s.append(&self.gas_limit);
                append_to(s, &self.to);
                s.append(&self.value);
                s.append(&self.data);
            }
            TxType::AccessList => {
                s.append(&chain_id);
                s.append(&self.nonce);
                s.append(&self.fee_cap);
                s.append(&self.gas_limit);
                append_to(s, &self.to);
                s.append(&self.value);
                s.append(&self.data);
                s.append_list(&self.access_list);
            }
            TxType::DynamicFee => {
                s.append(&chain_id);
                s.append(&self.nonce);
                s.append(&self.tip_cap);
                s.append(&self.fee_cap);
                s.append(&self.gas_limit);
                append_to(s, &self.to);
                s.append(&self.value);
                s.append(&self.data);
                s.append_list(&self.access_list);
            }
        }
    }

    fn body_len(&self) -> usize {
        match self.tx_type {
            TxType::Legacy => 6,
            TxType::AccessList => 8,
            TxType::DynamicFee => 9,
        }
    }

    /// Hash the sender signs.
    pub fn signing_hash(&self) -> H256 {
        let mut out = Vec::new();
        let mut s = match (self.tx_type, self.chain_id) {
            (TxType::Legacy, Some(_)) => RlpStream::new_list(9),
            _ => RlpStream::new_list(self.body_len()),
        };
        self.append_body(&mut s);
        if let (TxType::Legacy, Some(chain_id)) = (self.tx_type, self.chain_id) {
            s.append(&chain_id);
            s.append(&0u8);
            s.append(&0u8);
        }
        if let Some(byte) = self.tx_type.type_byte() {
            out.push(byte);
        }
        out.extend_from_slice(&s.out());
        keccak256(&out)
    }
}

fn append_to(s: &mut RlpStream, to: &Option<Address>) {
    match to {
        Some(address) => {
            s.append(address);
        }
        None => {
            s.append_empty_data();
        }
    }
}

fn decode_to(rlp: &Rlp, index: usize) -> Result<Option<Address>, DecoderError> {
    let item = rlp.at(index)?;
    if item.is_empty() {
        Ok(None)
    } else {
        item.as_val().map(Some)
    }
}

/// `v` holds the raw legacy value (27/28 or EIP-155 encoded) or the y parity
/// of a typed transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub v: u64,
    pub r: U256,
    pub s: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    tx: Transaction,
    signature: Signature,
    hash: H256,
    size: usize,
}

impl SignedTransaction {
    pub fn new(tx: Transaction, signature: Signature) -> Self {
        let mut signed = Self {
            tx,
            signature,
            hash: H256::zero(),
            size: 0,
        };
        let encoded = signed.encode();
        signed.hash = keccak256(&encoded);
        signed.size = encoded.len();
        signed
    }

    /// Signs `tx` with `secret`. Legacy transactions with a chain id get
    /// EIP-155 replay protection.
    pub fn sign(tx: Transaction, secret: &SecretKey) -> Result<Self, TxError> {
        let hash = tx.signing_hash();
        let message = secp256k1::Message::from_slice(hash.as_bytes())?;
        let (recovery_id, bytes) = Secp256k1::signing_only()
            .sign_ecdsa_recoverable(&message, secret)
            .serialize_compact();
        let parity = recovery_id.to_i32() as u64;
        let v = match (tx.tx_type, tx.chain_id) {
            (TxType::Legacy, Some(chain_id)) => eip155_offset(chain_id)?
                .checked_add(parity)
                .ok_or(TxError::ChainIdOverflow(chain_id))?,
            (TxType::Legacy, None) => parity + 27,
            _ => parity,
        };
        let signature = Signature {
            v,
            r: U256::from_big_endian(&bytes[..32]),
            s: U256::from_big_endian(&bytes[32..]),
        };
        Ok(Self::new(tx, signature))
    }

    pub fn decode(raw: &[u8]) -> Result<Self, TxError> {
        let first = *raw.first().ok_or(TxError::Empty)?;
        let (tx, signature) = match first {
            0xc0..=0xff => decode_legacy(&Rlp::new(raw))?,
            0x01 => decode_typed(TxType::AccessList, &Rlp::new(&raw[1..]))?,
            0x02 => decode_typed(TxType::DynamicFee, &Rlp::new(&raw[1..]))?,
            other => return Err(TxError::UnsupportedType(other)),
        };
        Ok(Self {
            tx,
            signature,
            hash: keccak256(raw),
            size: raw.len(),
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut s = RlpStream::new_list(self.tx.body_len() + 3);
        self.tx.append_body(&mut s);
        s.append(&self.signature.v);
        s.append(&self.signature.r);
        s.append(&self.signature.s);

        let mut out = Vec::new();
        if let Some(byte) = self.tx.tx_type.type_byte() {
            out.push(byte);
        }
        out.extend_from_slice(&s.out());
        out
    }

    pub fn transaction(&self) -> &Transaction {
        &self.tx
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn hash(&self) -> H256 {
        self.hash
    }

    /// Encoded length in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether the signature commits to a chain id. Typed transactions
    /// always do.
    pub fn is_protected(&self) -> bool {
        self.tx.tx_type != TxType::Legacy || self.tx.chain_id.is_some()
    }

    /// Maximum amount the sender can be charged: `value + gas * fee_cap`.
    pub fn cost(&self) -> U256 {
        U256::from(self.tx.gas_limit)
            .saturating_mul(self.tx.fee_cap)
            .saturating_add(self.tx.value)
    }

    pub fn effective_gas_price(&self, base_fee: Option<U256>) -> U256 {
        match (self.tx.tx_type, base_fee) {
            (TxType::DynamicFee, Some(base_fee)) => {
                self.tx.tip_cap.saturating_add(base_fee).min(self.tx.fee_cap)
            }
            _ => self.tx.fee_cap,
        }
    }

    fn recovery_id(&self) -> Result<i32, TxError> {
        let v = self.signature.v;
        let parity = match (self.tx.tx_type, self.tx.chain_id) {
            (TxType::Legacy, None) if v == 27 || v == 28 => v - 27,
            (TxType::Legacy, Some(chain_id)) => v
                .checked_sub(eip155_offset(chain_id)?)
                .ok_or(TxError::InvalidSignature)?,
            (TxType::Legacy, None) => return Err(TxError::InvalidSignature),
            _ => v,
        };
        if parity > 1 {
            return Err(TxError::InvalidSignature);
        }
        Ok(parity as i32)
    }

    pub fn recover_sender(&self) -> Result<Address, TxError> {
        let Signature { r, s, .. } = self.signature;
        if r.is_zero() || s.is_zero() || s > U256::from_big_endian(&SECP256K1_HALF_N) {
            return Err(TxError::InvalidSignature);
        }

        let mut compact = [0u8; 64];
        r.to_big_endian(&mut compact[..32]);
        s.to_big_endian(&mut compact[32..]);
        let recovery_id = RecoveryId::from_i32(self.recovery_id()?)?;
        let signature = RecoverableSignature::from_compact(&compact, recovery_id)?;

        let hash = self.tx.signing_hash();
        let message = secp256k1::Message::from_slice(hash.as_bytes())?;
        let public = Secp256k1::verification_only().recover_ecdsa(&message, &signature)?;
        let uncompressed = public.serialize_uncompressed();
        Ok(Address::from_slice(
            &keccak256(&uncompressed[1..]).as_bytes()[12..],
        ))
    }
}

/// `35 + 2 * chain_id`, the EIP-155 base for a protected legacy `v`.
fn eip155_offset(chain_id: u64) -> Result<u64, TxError> {
    chain_id
        .checked_mul(2)
        .and_then(|v| v.checked_add(35))
        .ok_or(TxError::ChainIdOverflow(chain_id))
}

fn decode_signature(rlp: &Rlp, offset: usize) -> Result<Signature, DecoderError> {
    Ok(Signature {
        v: rlp.val_at(offset)?,
        r: rlp.val_at(offset + 1)?,
        s: rlp.val_at(offset + 2)?,
    })
}

fn decode_legacy(rlp: &Rlp) -> Result<(Transaction, Signature), TxError> {
    if rlp.item_count()? != 9 {
        return Err(DecoderError::RlpIncorrectListLen.into());
    }
    let signature = decode_signature(rlp, 6)?;
    let chain_id = match signature.v {
        27 | 28 => None,
        v if v >= 35 => Some((v - 35) / 2),
        _ => return Err(TxError::InvalidSignature),
    };
    let gas_price: U256 = rlp.val_at(1)?;
    let tx = Transaction {
        tx_type: TxType::Legacy,
        chain_id,
        nonce: rlp.val_at(0)?,
        tip_cap: gas_price,
        fee_cap: gas_price,
        gas_limit: rlp.val_at(2)?,
        to: decode_to(rlp, 3)?,
        value: rlp.val_at(4)?,
        data: rlp.val_at(5)?,
        access_list: Vec::new(),
    };
    Ok((tx, signature))
}

fn decode_typed(tx_type: TxType, rlp: &Rlp) -> Result<(Transaction, Signature), TxError> {
    let (fields, fee_offset) = match tx_type {
        TxType::AccessList => (11, 0),
        _ => (12, 1),
    };
    if rlp.item_count()? != fields {
        return Err(DecoderError::RlpIncorrectListLen.into());
    }
    let tip_cap: U256 = rlp.val_at(2)?;
    let fee_cap: U256 = rlp.val_at(2 + fee_offset)?;
    let tx = Transaction {
        tx_type,
        chain_id: Some(rlp.val_at(0)?),
        nonce: rlp.val_at(1)?,
        tip_cap,
        fee_cap,
        gas_limit: rlp.val_at(3 + fee_offset)?,
        to: decode_to(rlp, 4 + fee_offset)?,
        value: rlp.val_at(5 + fee_offset)?,
        data: rlp.val_at(6 + fee_offset)?,
        access_list: rlp.list_at(7 + fee_offset)?,
    };
    Ok((tx, decode_signature(rlp, 8 + fee_offset)?))
}

/// A signed transaction together with the sender recovered from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedTransaction {
    pub tx: SignedTransaction,
    pub sender: Address,
}

impl VerifiedTransaction {
    pub fn recover(tx: SignedTransaction) -> Result<Self, TxError> {
        let sender = tx.recover_sender()?;
        Ok(Self { tx, sender })
    }

    pub fn nonce(&self) -> u64 {
        self.tx.tx.nonce
    }

    /// Core message for execution, priced at the effective gas price for
    /// `base_fee`.
    pub fn as_message(&self, base_fee: Option<U256>) -> Message {
        let tx = &self.tx.tx;
        Message {
            from: self.sender,
            to: tx.to,
            nonce: tx.nonce,
            value: tx.value,
            gas_limit: tx.gas_limit,
            gas_price: self.tx.effective_gas_price(base_fee),
            gas_fee_cap: tx.fee_cap,
            gas_tip_cap: tx.tip_cap,
            data: tx.data.clone(),
            access_list: tx.access_list.clone(),
        }
    }
}

impl Deref for VerifiedTransaction {
    type Target = SignedTransaction;

    fn deref(&self) -> &Self::Target {
        &self.tx
    }
}

impl Deref for SignedTransaction {
    type Target = Transaction;

    fn deref(&self) -> &Self::Target {
        &self.tx
    }
}
