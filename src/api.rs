use std::sync::Arc;

use ethereum_types::U256;
use serde::{Deserialize, Serialize};

use crate::engine::Equality;
use crate::errors::{EngineError, EngineResult};
use crate::header_extra::HeaderExtra;
use crate::interfaces::HeaderReader;
use crate::snapshot::Snapshot;
use crate::types::{Address, Header};

/// Read-only consensus queries, resolved against the snapshot a header's
/// payload points at. Results are stable views and never block producers.
pub struct Api {
    chain: Arc<dyn HeaderReader>,
    engine: Equality,
}

/// Consensus status of an address at a block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressStatus {
    pub is_candidate: bool,
    pub is_validator: bool,
    pub staked: U256,
    pub since_block: u64,
}

impl Api {
    pub fn new(chain: Arc<dyn HeaderReader>, engine: Equality) -> Self {
        Self { chain, engine }
    }

    /// The candidate set at the given block, or at the chain head.
    pub fn candidates(&self, number: Option<u64>) -> EngineResult<Vec<Address>> {
        let mut snap = self.snapshot_at(number)?;
        snap.candidates()
    }

    /// The validator set at the given block, or at the chain head.
    pub fn validators(&self, number: Option<u64>) -> EngineResult<Vec<Address>> {
        let mut snap = self.snapshot_at(number)?;
        snap.validators()
    }

    /// Candidate/validator status of an address at the given block.
    pub fn address_status(
        &self,
        address: Address,
        number: Option<u64>,
    ) -> EngineResult<AddressStatus> {
        let mut snap = self.snapshot_at(number)?;
        let candidate = snap.candidate(address)?;
        let is_validator = snap.validators()?.contains(&address);
        Ok(AddressStatus {
            is_candidate: candidate.is_some(),
            is_validator,
            staked: candidate.as_ref().map(|c| c.security).unwrap_or_default(),
            since_block: candidate.map(|c| c.block_number).unwrap_or_default(),
        })
    }

    fn resolve_header(&self, number: Option<u64>) -> EngineResult<Header> {
        let header = match number {
            Some(number) => self.chain.header_by_number(number),
            None => self.chain.current_header(),
        };
        header.ok_or(EngineError::UnknownBlock)
    }

    fn snapshot_at(&self, number: Option<u64>) -> EngineResult<Snapshot> {
        let header = self.resolve_header(number)?;
        let extra = HeaderExtra::decode_from_header(&header)?;
        Ok(Snapshot::load(self.engine.trie_db(), extra.root))
    }
}
