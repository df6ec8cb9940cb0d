use std::io::{Read, Write};

use ethereum_types::H256;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use rlp::{DecoderError, Rlp, RlpStream};
use tracing::warn;

use crate::config::ChainConfig;
use crate::errors::{EngineError, EngineResult};
use crate::events::{Declare, Proposal};
use crate::types::{Address, Delegate, Header};

/// Fixed number of extra-data prefix bytes reserved for signer vanity.
pub const EXTRA_VANITY: usize = 32;
/// Fixed number of extra-data suffix bytes reserved for the signer seal.
pub const EXTRA_SEAL: usize = 65;

/// Per-table commit hashes of a snapshot. A zero hash means the table is
/// empty. The tuple shape is part of the wire format and frozen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Root {
    pub epoch_hash: H256,
    pub delegate_hash: H256,
    pub vote_hash: H256,
    pub candidate_hash: H256,
    pub mint_cnt_hash: H256,
    pub config_hash: H256,
    pub proposal_hash: H256,
    pub declare_hash: H256,
}

impl Root {
    /// Logs the per-table differences against another root, the diagnostic
    /// emitted when replay produces a different root than the header claims.
    pub fn log_differences(&self, number: u64, other: &Root) {
        let tables = [
            ("epoch", self.epoch_hash, other.epoch_hash),
            ("delegate", self.delegate_hash, other.delegate_hash),
            ("vote", self.vote_hash, other.vote_hash),
            ("candidate", self.candidate_hash, other.candidate_hash),
            ("mintCnt", self.mint_cnt_hash, other.mint_cnt_hash),
            ("config", self.config_hash, other.config_hash),
            ("proposal", self.proposal_hash, other.proposal_hash),
            ("declare", self.declare_hash, other.declare_hash),
        ];
        for (table, ours, theirs) in tables {
            if ours != theirs {
                warn!(number, table, ?ours, ?theirs, "snapshot root differs");
            }
        }
    }
}

impl rlp::Encodable for Root {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(8);
        s.append(&self.epoch_hash);
        s.append(&self.delegate_hash);
        s.append(&self.vote_hash);
        s.append(&self.candidate_hash);
        s.append(&self.mint_cnt_hash);
        s.append(&self.config_hash);
        s.append(&self.proposal_hash);
        s.append(&self.declare_hash);
    }
}

impl rlp::Decodable for Root {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        Ok(Self {
            epoch_hash: rlp.val_at(0)?,
            delegate_hash: rlp.val_at(1)?,
            vote_hash: rlp.val_at(2)?,
            candidate_hash: rlp.val_at(3)?,
            mint_cnt_hash: rlp.val_at(4)?,
            config_hash: rlp.val_at(5)?,
            proposal_hash: rlp.val_at(6)?,
            declare_hash: rlp.val_at(7)?,
        })
    }
}

/// The consensus payload embedded in `header.extra` between the vanity
/// prefix and the trailing seal, gzip-compressed RLP on the wire.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeaderExtra {
    pub root: Root,
    pub epoch: u64,
    pub epoch_block: u64,
    /// Zero or one chain-config records: the genesis bootstrap or the
    /// block's single accepted proposal outcome.
    pub chain_config: Vec<ChainConfig>,
    pub current_block_delegates: Vec<Delegate>,
    pub current_block_candidates: Vec<Address>,
    pub current_block_kick_out_candidates: Vec<Address>,
    pub current_block_cancel_candidates: Vec<Address>,
    pub current_block_proposals: Vec<Proposal>,
    pub current_block_declares: Vec<Declare>,
    /// Elected validators for the new epoch; non-empty only in the first
    /// block of an epoch.
    pub current_epoch_validators: Vec<Address>,
}

impl HeaderExtra {
    /// Encodes as gzip-compressed RLP.
    pub fn encode(&self) -> EngineResult<Vec<u8>> {
        let data = rlp::encode(self);
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(&data)
            .and_then(|_| encoder.finish())
            .map_err(|err| EngineError::Codec(format!("gzip encode failed: {err}")))
    }

    /// Decodes from gzip-compressed RLP.
    pub fn decode(data: &[u8]) -> EngineResult<Self> {
        let mut decoder = GzDecoder::new(data);
        let mut buffer = Vec::new();
        decoder
            .read_to_end(&mut buffer)
            .map_err(|err| EngineError::Codec(format!("gzip decode failed: {err}")))?;
        rlp::decode(&buffer).map_err(|err| EngineError::Codec(format!("rlp decode failed: {err}")))
    }

    /// Extracts the payload from a header's extra region, enforcing the
    /// vanity and seal reservations.
    pub fn decode_from_header(header: &Header) -> EngineResult<Self> {
        let extra = &header.extra;
        if extra.len() < EXTRA_VANITY {
            return Err(EngineError::MissingVanity);
        }
        if extra.len() < EXTRA_VANITY + EXTRA_SEAL {
            return Err(EngineError::MissingSignature);
        }
        Self::decode(&extra[EXTRA_VANITY..extra.len() - EXTRA_SEAL])
    }
}

impl rlp::Encodable for HeaderExtra {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(11);
        s.append(&self.root);
        s.append(&self.epoch);
        s.append(&self.epoch_block);
        s.append_list(&self.chain_config);
        s.append_list(&self.current_block_delegates);
        s.append_list(&self.current_block_candidates);
        s.append_list(&self.current_block_kick_out_candidates);
        s.append_list(&self.current_block_cancel_candidates);
        s.append_list(&self.current_block_proposals);
        s.append_list(&self.current_block_declares);
        s.append_list(&self.current_epoch_validators);
    }
}

impl rlp::Decodable for HeaderExtra {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        Ok(Self {
            root: rlp.val_at(0)?,
            epoch: rlp.val_at(1)?,
            epoch_block: rlp.val_at(2)?,
            chain_config: rlp.list_at(3)?,
            current_block_delegates: rlp.list_at(4)?,
            current_block_candidates: rlp.list_at(5)?,
            current_block_kick_out_candidates: rlp.list_at(6)?,
            current_block_cancel_candidates: rlp.list_at(7)?,
            current_block_proposals: rlp.list_at(8)?,
            current_block_declares: rlp.list_at(9)?,
            current_epoch_validators: rlp.list_at(10)?,
        })
    }
}

/// Rebuilds a header's extra region around a freshly encoded payload,
/// preserving the vanity prefix and zeroing the seal slot.
pub fn write_header_extra(header: &mut Header, extra: &HeaderExtra) -> EngineResult<()> {
    let payload = extra.encode()?;
    if header.extra.len() < EXTRA_VANITY {
        header.extra.resize(EXTRA_VANITY, 0);
    }
    header.extra.truncate(EXTRA_VANITY);
    header.extra.extend_from_slice(&payload);
    header.extra.extend_from_slice(&[0u8; EXTRA_SEAL]);
    Ok(())
}
