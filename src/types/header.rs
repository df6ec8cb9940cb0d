use ethereum_types::{Bloom, H256, H64, U256};
use rlp::RlpStream;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

use super::{Address, Transaction};
use crate::header_extra::EXTRA_SEAL;

/// Ethereum-style block header. The consensus payload lives in `extra`
/// between the 32 byte vanity prefix and the trailing 65 byte seal.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub parent_hash: H256,
    pub uncle_hash: H256,
    pub coinbase: Address,
    pub state_root: H256,
    pub tx_root: H256,
    pub receipt_root: H256,
    pub bloom: Bloom,
    pub difficulty: U256,
    pub number: u64,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub time: u64,
    pub extra: Vec<u8>,
    pub mix_digest: H256,
    pub nonce: H64,
}

impl Header {
    /// Hash of the full header, seal included.
    pub fn hash(&self) -> H256 {
        let mut stream = RlpStream::new();
        self.rlp_append_inner(&mut stream, self.extra.len());
        keccak256(&stream.out())
    }

    /// Hash of the header with the trailing seal bytes stripped. This is the
    /// digest the block producer signs, so the seal cannot cover itself.
    pub fn seal_hash(&self) -> H256 {
        keccak256(&self.sealing_rlp())
    }

    /// RLP of the header minus the 65 byte seal, as handed to the signer.
    pub fn sealing_rlp(&self) -> Vec<u8> {
        let mut stream = RlpStream::new();
        let extra_len = self.extra.len().saturating_sub(EXTRA_SEAL);
        self.rlp_append_inner(&mut stream, extra_len);
        stream.out().to_vec()
    }

    fn rlp_append_inner(&self, stream: &mut RlpStream, extra_len: usize) {
        stream.begin_list(15);
        stream.append(&self.parent_hash);
        stream.append(&self.uncle_hash);
        stream.append(&self.coinbase);
        stream.append(&self.state_root);
        stream.append(&self.tx_root);
        stream.append(&self.receipt_root);
        stream.append(&self.bloom);
        stream.append(&self.difficulty);
        stream.append(&self.number);
        stream.append(&self.gas_limit);
        stream.append(&self.gas_used);
        stream.append(&self.time);
        stream.append(&self.extra[..extra_len.min(self.extra.len())].to_vec());
        stream.append(&self.mix_digest);
        stream.append(&self.nonce);
    }
}

/// Keccak256(RLP([])), the uncle hash of every block under this engine.
pub fn empty_uncle_hash() -> H256 {
    let mut stream = RlpStream::new();
    stream.begin_list(0);
    keccak256(&stream.out())
}

fn keccak256(data: &[u8]) -> H256 {
    H256::from_slice(&Keccak256::digest(data))
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Block {
    pub header: Header,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn new(header: Header, transactions: Vec<Transaction>) -> Self {
        Self {
            header,
            transactions,
        }
    }

    pub fn hash(&self) -> H256 {
        self.header.hash()
    }

    /// Returns the block with its header replaced by the sealed header.
    pub fn with_seal(&self, header: Header) -> Self {
        Self {
            header,
            transactions: self.transactions.clone(),
        }
    }
}
