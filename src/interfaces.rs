use std::collections::HashMap;

use ethereum_types::{H256, U256};
use parking_lot::RwLock;

use crate::types::{Address, Header};

/// Read access to the header chain, the only chain surface the engine needs.
pub trait HeaderReader: Send + Sync {
    /// Header with the given hash at the given height, if known.
    fn header(&self, hash: H256, number: u64) -> Option<Header>;
    fn header_by_number(&self, number: u64) -> Option<Header>;
    fn current_header(&self) -> Option<Header>;
}

/// Balance view of the world state. The engine only ever reads balances and
/// credits or debits consensus amounts; everything else about the state
/// database is out of scope.
pub trait StateDb {
    fn balance(&self, address: &Address) -> U256;
    fn add_balance(&mut self, address: &Address, amount: U256);
    fn sub_balance(&mut self, address: &Address, amount: U256);
}

/// In-memory balance table, used by tests and local tooling.
#[derive(Clone, Debug, Default)]
pub struct MemoryState {
    balances: HashMap<Address, U256>,
}

impl MemoryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_balance(&mut self, address: Address, amount: U256) {
        self.balances.insert(address, amount);
    }
}

impl StateDb for MemoryState {
    fn balance(&self, address: &Address) -> U256 {
        self.balances.get(address).copied().unwrap_or_default()
    }

    fn add_balance(&mut self, address: &Address, amount: U256) {
        let balance = self.balances.entry(*address).or_default();
        *balance = balance.saturating_add(amount);
    }

    fn sub_balance(&mut self, address: &Address, amount: U256) {
        let balance = self.balances.entry(*address).or_default();
        *balance = balance.saturating_sub(amount);
    }
}

/// In-memory header chain keyed by height, enough to drive the engine hooks
/// outside a full node.
#[derive(Default)]
pub struct MemoryChain {
    headers: RwLock<Vec<Header>>,
}

impl MemoryChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, header: Header) {
        self.headers.write().push(header);
    }
}

impl HeaderReader for MemoryChain {
    fn header(&self, hash: H256, number: u64) -> Option<Header> {
        self.headers
            .read()
            .iter()
            .find(|header| header.number == number && header.hash() == hash)
            .cloned()
    }

    fn header_by_number(&self, number: u64) -> Option<Header> {
        self.headers
            .read()
            .iter()
            .find(|header| header.number == number)
            .cloned()
    }

    fn current_header(&self) -> Option<Header> {
        self.headers.read().last().cloned()
    }
}
