// tessera/core/primitives/src/types.rs

use rlp::RlpStream;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

pub use ethereum_types::{Address, Bloom, BloomInput, H256, U256};

/// keccak256 of the empty byte string, the code hash of every account without code.
pub const EMPTY_CODE_HASH: H256 = H256([
    0xc5, 0xd2, 0x46, 0x01, 0x86, 0xf7, 0x23, 0x3c, 0x92, 0x7e, 0x7d, 0xb2, 0xdc, 0xc7, 0x03, 0xc0,
    0xe5, 0x00, 0xb6, 0x53, 0xca, 0x82, 0x27, 0x3b, 0x7b, 0xfa, 0xd8, 0x04, 0x5d, 0x85, 0xa4, 0x70,
]);

/// Reserved recipient marking a payload as a native ledger message rather
/// than VM input. The ASCII bytes of `ledger-native`, right aligned.
pub const NATIVE_MESSAGE_ADDRESS: Address = ethereum_types::H160([
    0, 0, 0, 0, 0, 0, 0, b'l', b'e', b'd', b'g', b'e', b'r', b'-', b'n', b'a', b't', b'i', b'v',
    b'e',
]);

pub fn keccak256(data: &[u8]) -> H256 {
    H256::from_slice(&Keccak256::digest(data))
}

/// Address of a contract created by `sender` at `nonce`.
pub fn create_address(sender: &Address, nonce: u64) -> Address {
    let mut stream = RlpStream::new_list(2);
    stream.append(sender);
    stream.append(&nonce);
    let hash = keccak256(&stream.out());
    Address::from_slice(&hash.as_bytes()[12..])
}

/// A log emitted during execution, enriched with its position in the block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    pub address: Address,
    pub topics: Vec<H256>,
    pub data: Vec<u8>,
    pub block_number: u64,
    pub block_hash: H256,
    pub tx_hash: H256,
    pub tx_index: u64,
    pub index: u64,
}

impl Log {
    pub fn accrue_into(&self, bloom: &mut Bloom) {
        bloom.accrue(BloomInput::Raw(self.address.as_bytes()));
        for topic in &self.topics {
            bloom.accrue(BloomInput::Raw(topic.as_bytes()));
        }
    }
}

pub fn logs_bloom<'a>(logs: impl IntoIterator<Item = &'a Log>) -> Bloom {
    let mut bloom = Bloom::zero();
    for log in logs {
        log.accrue_into(&mut bloom);
    }
    bloom
}
