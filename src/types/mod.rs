mod header;
mod transaction;

pub use header::{empty_uncle_hash, Block, Header};
pub use transaction::Transaction;

use std::cmp::Ordering;

use ethereum_types::{H160, H256, U256};
use rlp::{DecoderError, Rlp, RlpStream};
use serde::{Deserialize, Serialize};

pub type Address = H160;
pub type Hash = H256;

/// Candidate registration record. The security deposit is debited from the
/// candidate at registration and refunded when the candidacy is cancelled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub security: U256,
    pub block_number: u64,
}

impl rlp::Encodable for Candidate {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(2);
        s.append(&self.security);
        s.append(&self.block_number);
    }
}

impl rlp::Decodable for Candidate {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        Ok(Self {
            security: rlp.val_at(0)?,
            block_number: rlp.val_at(1)?,
        })
    }
}

/// An address weighted for sorting, by vote balance or by mint count.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortableAddress {
    pub address: Address,
    pub weight: U256,
}

impl SortableAddress {
    pub fn new(address: Address, weight: U256) -> Self {
        Self { address, weight }
    }
}

impl Ord for SortableAddress {
    /// Descending by weight, ties broken ascending by address.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .weight
            .cmp(&self.weight)
            .then_with(|| self.address.cmp(&other.address))
    }
}

impl PartialOrd for SortableAddress {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl rlp::Encodable for SortableAddress {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(2);
        s.append(&self.address);
        s.append(&self.weight);
    }
}

impl rlp::Decodable for SortableAddress {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        Ok(Self {
            address: rlp.val_at(0)?,
            weight: rlp.val_at(1)?,
        })
    }
}

/// A delegator pointing its stake at a candidate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Delegate {
    pub delegator: Address,
    pub candidate: Address,
}

impl rlp::Encodable for Delegate {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(2);
        s.append(&self.delegator);
        s.append(&self.candidate);
    }
}

impl rlp::Decodable for Delegate {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        Ok(Self {
            delegator: rlp.val_at(0)?,
            candidate: rlp.val_at(1)?,
        })
    }
}

/// Removes duplicate addresses while preserving first-seen order.
pub fn addresses_distinct(addresses: Vec<Address>) -> Vec<Address> {
    let mut seen = std::collections::HashSet::new();
    addresses
        .into_iter()
        .filter(|address| seen.insert(*address))
        .collect()
}

/// Removes duplicate delegate pairs while preserving first-seen order.
pub fn delegates_distinct(delegates: Vec<Delegate>) -> Vec<Delegate> {
    let mut seen = std::collections::HashSet::new();
    delegates
        .into_iter()
        .filter(|delegate| seen.insert(*delegate))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    #[test]
    fn sortable_addresses_order_by_weight_then_address() {
        let mut list = vec![
            SortableAddress::new(addr(0x0b), U256::from(2)),
            SortableAddress::new(addr(0x0c), U256::from(4)),
            SortableAddress::new(addr(0x0a), U256::from(3)),
        ];
        list.sort();
        assert_eq!(list[0].address, addr(0x0c));
        assert_eq!(list[1].address, addr(0x0a));
        assert_eq!(list[2].address, addr(0x0b));
    }

    #[test]
    fn sortable_addresses_tie_breaks_ascending() {
        let mut list = vec![
            SortableAddress::new(addr(0x02), U256::one()),
            SortableAddress::new(addr(0x01), U256::one()),
        ];
        list.sort();
        assert_eq!(list[0].address, addr(0x01));
        assert_eq!(list[1].address, addr(0x02));
    }

    #[test]
    fn distinct_preserves_first_occurrence() {
        let result = addresses_distinct(vec![addr(1), addr(2), addr(1), addr(3), addr(2)]);
        assert_eq!(result, vec![addr(1), addr(2), addr(3)]);
    }
}
