use ethereum_types::H256;
use serde::{Deserialize, Serialize};

use super::Address;

/// The consensus engine's view of a transaction. Signature checking and
/// sender recovery happen in the transaction pool; by the time a transaction
/// reaches the engine its sender is already resolved.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub hash: H256,
    pub from: Address,
    pub to: Option<Address>,
    pub data: Vec<u8>,
}

impl Transaction {
    pub fn new(hash: H256, from: Address, to: Option<Address>, data: Vec<u8>) -> Self {
        Self {
            hash,
            from,
            to,
            data,
        }
    }
}
