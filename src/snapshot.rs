use ethereum_types::{H256, U256};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::ChainConfig;
use crate::errors::{EngineError, EngineResult};
use crate::events::{Declare, Proposal};
use crate::header_extra::{HeaderExtra, Root};
use crate::interfaces::StateDb;
use crate::trie::{PrefixedTrie, TrieDb};
use crate::types::{Address, Candidate, Header, SortableAddress};

// Table prefixes. Every key of a table carries its prefix, so a single
// physical trie could host them all; here each table gets its own trie
// pinned to the matching hash of the root record.
const EPOCH_PREFIX: &[u8] = b"epoch-"; // epoch-validator: {validators}
const DELEGATE_PREFIX: &[u8] = b"delegate-"; // delegate-{candidate}{delegator}: {delegator}
const VOTE_PREFIX: &[u8] = b"vote-"; // vote-{delegator}: {candidate}
const CANDIDATE_PREFIX: &[u8] = b"candidate-"; // candidate-{candidate}: {Candidate}
const MINT_CNT_PREFIX: &[u8] = b"mintCnt-"; // mintCnt-{epoch}{number}: {validator}
const CONFIG_PREFIX: &[u8] = b"config"; // config: {ChainConfig}
const PROPOSAL_PREFIX: &[u8] = b"proposal-"; // proposal-{hash}: {Proposal}
const DECLARE_PREFIX: &[u8] = b"declare-"; // declare-{hash}{epoch}{declarer}: {Declare}

const VALIDATOR_KEY: &[u8] = b"validator";
const CONFIG_KEY: &[u8] = b"config";

/// The consensus state at a block, a typed facade over one prefixed trie per
/// table. Tries materialize lazily on first access; tables never touched
/// keep their pinned root hash verbatim, which is how no-op blocks preserve
/// stable table hashes.
pub struct Snapshot {
    root: Root,
    db: TrieDb,
    epoch_trie: Option<PrefixedTrie>,
    delegate_trie: Option<PrefixedTrie>,
    vote_trie: Option<PrefixedTrie>,
    candidate_trie: Option<PrefixedTrie>,
    mint_cnt_trie: Option<PrefixedTrie>,
    config_trie: Option<PrefixedTrie>,
    proposal_trie: Option<PrefixedTrie>,
    declare_trie: Option<PrefixedTrie>,
}

fn ensure<'a>(
    slot: &'a mut Option<PrefixedTrie>,
    db: &TrieDb,
    root: H256,
    prefix: &[u8],
) -> EngineResult<&'a mut PrefixedTrie> {
    if slot.is_none() {
        *slot = Some(PrefixedTrie::new(db, root, prefix)?);
    }
    slot.as_mut()
        .ok_or_else(|| EngineError::Trie("trie not materialized".into()))
}

impl Snapshot {
    /// Creates an empty snapshot; only ever used for the genesis block.
    pub fn new_empty(db: &TrieDb) -> Self {
        Self::load(db, Root::default())
    }

    /// Pins a snapshot to an existing root. Tries are opened on demand.
    pub fn load(db: &TrieDb, root: Root) -> Self {
        Self {
            root,
            db: db.clone(),
            epoch_trie: None,
            delegate_trie: None,
            vote_trie: None,
            candidate_trie: None,
            mint_cnt_trie: None,
            config_trie: None,
            proposal_trie: None,
            declare_trie: None,
        }
    }

    /// Replays a block's declared events in a fixed category order:
    /// candidate registrations, kick-outs, cancellations, then delegations,
    /// proposals and declarations, followed by the validator rotation, the
    /// config update and the mint record. A block whose transaction walk
    /// only makes sense in another interleaving (say, a delegation to a
    /// candidate kicked out in the same block) fails the replay here.
    pub fn apply(
        &mut self,
        config: &ChainConfig,
        header: &Header,
        extra: &HeaderExtra,
    ) -> EngineResult<()> {
        let number = header.number;
        for candidate in &extra.current_block_candidates {
            let security = if number > 1 {
                config.min_candidate_balance
            } else {
                U256::zero()
            };
            self.become_candidate(*candidate, number, security)?;
        }

        for candidate in &extra.current_block_kick_out_candidates {
            self.kick_out_candidate(*candidate)?;
        }

        for candidate in &extra.current_block_cancel_candidates {
            self.cancel_candidate(*candidate)?;
        }

        for delegate in &extra.current_block_delegates {
            self.delegate(delegate.delegator, delegate.candidate)?;
        }

        for proposal in &extra.current_block_proposals {
            self.submit_proposal(proposal)?;
        }

        // The genesis bootstrap counts as the block's one config write;
        // past that, only the first quorum-crossing declaration may update
        // the chain config in a given block.
        let mut config_updated = number <= 1;
        for declare in &extra.current_block_declares {
            let updated = self.apply_declare(config, extra.epoch, declare, !config_updated)?;
            config_updated = config_updated || updated.is_some();
        }

        if number == extra.epoch_block {
            self.set_validators(&extra.current_epoch_validators)?;
        }

        if let Some(last) = extra.chain_config.last() {
            self.set_chain_config(last)?;
        }

        self.mint_block(extra.epoch, number, header.coinbase)
    }

    /// Commits every materialized trie and returns the resulting root
    /// record. Unmaterialized tables retain their pinned hashes.
    pub fn root(&mut self) -> EngineResult<Root> {
        let mut root = self.root;
        if let Some(trie) = &mut self.epoch_trie {
            root.epoch_hash = trie.commit()?;
        }
        if let Some(trie) = &mut self.delegate_trie {
            root.delegate_hash = trie.commit()?;
        }
        if let Some(trie) = &mut self.vote_trie {
            root.vote_hash = trie.commit()?;
        }
        if let Some(trie) = &mut self.candidate_trie {
            root.candidate_hash = trie.commit()?;
        }
        if let Some(trie) = &mut self.mint_cnt_trie {
            root.mint_cnt_hash = trie.commit()?;
        }
        if let Some(trie) = &mut self.config_trie {
            root.config_hash = trie.commit()?;
        }
        if let Some(trie) = &mut self.proposal_trie {
            root.proposal_hash = trie.commit()?;
        }
        if let Some(trie) = &mut self.declare_trie {
            root.declare_hash = trie.commit()?;
        }
        Ok(root)
    }

    /// Persists every table whose hash changed since the snapshot was
    /// pinned, then re-pins to the new root.
    pub fn commit(&mut self, root: Root) -> EngineResult<()> {
        if self.root.epoch_hash != root.epoch_hash {
            self.db.persist(root.epoch_hash)?;
        }
        if self.root.delegate_hash != root.delegate_hash {
            self.db.persist(root.delegate_hash)?;
        }
        if self.root.vote_hash != root.vote_hash {
            self.db.persist(root.vote_hash)?;
        }
        if self.root.candidate_hash != root.candidate_hash {
            self.db.persist(root.candidate_hash)?;
        }
        if self.root.mint_cnt_hash != root.mint_cnt_hash {
            self.db.persist(root.mint_cnt_hash)?;
        }
        if self.root.config_hash != root.config_hash {
            self.db.persist(root.config_hash)?;
        }
        if self.root.proposal_hash != root.proposal_hash {
            self.db.persist(root.proposal_hash)?;
        }
        if self.root.declare_hash != root.declare_hash {
            self.db.persist(root.declare_hash)?;
        }
        self.root = root;
        Ok(())
    }

    /// Returns the chain config stored in the snapshot.
    pub fn chain_config(&mut self) -> EngineResult<ChainConfig> {
        let trie = ensure(
            &mut self.config_trie,
            &self.db,
            self.root.config_hash,
            CONFIG_PREFIX,
        )?;
        let data = trie
            .get(CONFIG_KEY)
            .ok_or(EngineError::ChainConfigMissing)?;
        serde_json::from_slice(&data)
            .map_err(|err| EngineError::Codec(format!("failed to decode chain config: {err}")))
    }

    /// Writes the chain config to the snapshot.
    pub fn set_chain_config(&mut self, config: &ChainConfig) -> EngineResult<()> {
        let data = serde_json::to_vec(config)
            .map_err(|err| EngineError::Codec(format!("failed to encode chain config: {err}")))?;
        let trie = ensure(
            &mut self.config_trie,
            &self.db,
            self.root.config_hash,
            CONFIG_PREFIX,
        )?;
        trie.insert(CONFIG_KEY, data);
        Ok(())
    }

    /// Returns the validators of the current epoch.
    pub fn validators(&mut self) -> EngineResult<Vec<Address>> {
        let trie = ensure(
            &mut self.epoch_trie,
            &self.db,
            self.root.epoch_hash,
            EPOCH_PREFIX,
        )?;
        let data = trie
            .get(VALIDATOR_KEY)
            .ok_or_else(|| EngineError::Snapshot("failed to decode validators".into()))?;
        rlp::Rlp::new(&data)
            .as_list()
            .map_err(|err| EngineError::Snapshot(format!("failed to decode validators: {err}")))
    }

    /// Writes the validators of the current epoch.
    pub fn set_validators(&mut self, validators: &[Address]) -> EngineResult<()> {
        let data = rlp::encode_list::<Address, _>(validators).to_vec();
        let trie = ensure(
            &mut self.epoch_trie,
            &self.db,
            self.root.epoch_hash,
            EPOCH_PREFIX,
        )?;
        trie.insert(VALIDATOR_KEY, data);
        Ok(())
    }

    /// Records who sealed a block. One entry per block, ever.
    pub fn mint_block(&mut self, epoch: u64, number: u64, validator: Address) -> EngineResult<()> {
        let mut key = [0u8; 16];
        key[..8].copy_from_slice(&epoch.to_be_bytes());
        key[8..].copy_from_slice(&number.to_be_bytes());
        let trie = ensure(
            &mut self.mint_cnt_trie,
            &self.db,
            self.root.mint_cnt_hash,
            MINT_CNT_PREFIX,
        )?;
        trie.insert(&key, validator.as_bytes().to_vec());
        Ok(())
    }

    /// Counts how many blocks each current validator sealed in the given
    /// epoch, sorted descending by count. Validators that sealed nothing
    /// are included with weight zero.
    pub fn count_minted(&mut self, epoch: u64) -> EngineResult<Vec<SortableAddress>> {
        let validators = self.validators()?;
        let trie = ensure(
            &mut self.mint_cnt_trie,
            &self.db,
            self.root.mint_cnt_hash,
            MINT_CNT_PREFIX,
        )?;

        let mut mapper = std::collections::HashMap::new();
        for (_, value) in trie.prefix_iter(&epoch.to_be_bytes()) {
            if value.len() == 20 {
                *mapper.entry(Address::from_slice(&value)).or_insert(0u64) += 1;
            }
        }

        let mut addresses: Vec<SortableAddress> = validators
            .into_iter()
            .map(|validator| {
                let count = mapper.get(&validator).copied().unwrap_or_default();
                SortableAddress::new(validator, U256::from(count))
            })
            .collect();
        addresses.sort();
        Ok(addresses)
    }

    /// Returns all candidate addresses in trie order.
    pub fn candidates(&mut self) -> EngineResult<Vec<Address>> {
        let trie = ensure(
            &mut self.candidate_trie,
            &self.db,
            self.root.candidate_hash,
            CANDIDATE_PREFIX,
        )?;
        Ok(trie
            .iter()
            .filter(|(key, _)| key.len() == 20)
            .map(|(key, _)| Address::from_slice(&key))
            .collect())
    }

    /// Returns the registration record of a candidate, if present.
    pub fn candidate(&mut self, address: Address) -> EngineResult<Option<Candidate>> {
        let trie = ensure(
            &mut self.candidate_trie,
            &self.db,
            self.root.candidate_hash,
            CANDIDATE_PREFIX,
        )?;
        match trie.get(address.as_bytes()) {
            Some(data) => rlp::decode(&data)
                .map(Some)
                .map_err(|err| EngineError::Codec(format!("failed to decode candidate: {err}"))),
            None => Ok(None),
        }
    }

    /// Counts candidates, stopping as soon as `n` are found.
    pub fn enough_candidates(&mut self, n: usize) -> EngineResult<(usize, bool)> {
        if n == 0 {
            return Ok((0, true));
        }
        let trie = ensure(
            &mut self.candidate_trie,
            &self.db,
            self.root.candidate_hash,
            CANDIDATE_PREFIX,
        )?;
        let mut count = 0;
        for _ in trie.iter() {
            count += 1;
            if count >= n {
                return Ok((count, true));
            }
        }
        Ok((count, false))
    }

    /// Deterministically shuffles the candidate set and returns the first
    /// `n`. Same seed and candidate set, same output.
    pub fn rand_candidates(&mut self, seed: u64, n: usize) -> EngineResult<Vec<Address>> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let mut candidates = self.candidates()?;
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let mut rng = StdRng::seed_from_u64(seed);
        for i in (1..candidates.len()).rev() {
            let j = rng.gen_range(0..=i);
            candidates.swap(i, j);
        }
        candidates.truncate(n);
        Ok(candidates)
    }

    /// Ranks candidates by the balance-weighted votes of their delegators
    /// and returns the top `n`. Candidates without delegations weigh zero.
    pub fn top_candidates(
        &mut self,
        state: &dyn StateDb,
        n: usize,
    ) -> EngineResult<Vec<SortableAddress>> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let candidates = self.candidates()?;
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let delegate_trie = ensure(
            &mut self.delegate_trie,
            &self.db,
            self.root.delegate_hash,
            DELEGATE_PREFIX,
        )?;
        let mut ranked: Vec<SortableAddress> = candidates
            .into_iter()
            .map(|candidate| {
                let mut votes = U256::zero();
                for (_, value) in delegate_trie.prefix_iter(candidate.as_bytes()) {
                    if value.len() == 20 {
                        votes = votes.saturating_add(state.balance(&Address::from_slice(&value)));
                    }
                }
                SortableAddress::new(candidate, votes)
            })
            .collect();
        ranked.sort();
        ranked.truncate(n);
        Ok(ranked)
    }

    /// Sums the balances of every delegator of a candidate.
    pub fn count_votes(&mut self, state: &dyn StateDb, candidate: Address) -> EngineResult<U256> {
        if self.candidate(candidate)?.is_none() {
            return Err(EngineError::Snapshot("no candidate".into()));
        }
        let delegate_trie = ensure(
            &mut self.delegate_trie,
            &self.db,
            self.root.delegate_hash,
            DELEGATE_PREFIX,
        )?;
        let mut votes = U256::zero();
        for (_, value) in delegate_trie.prefix_iter(candidate.as_bytes()) {
            if value.len() == 20 {
                votes = votes.saturating_add(state.balance(&Address::from_slice(&value)));
            }
        }
        Ok(votes)
    }

    /// Registers a candidate. Idempotent: returns true without touching the
    /// existing record when the address is already a candidate.
    pub fn become_candidate(
        &mut self,
        address: Address,
        block_number: u64,
        security: U256,
    ) -> EngineResult<bool> {
        let trie = ensure(
            &mut self.candidate_trie,
            &self.db,
            self.root.candidate_hash,
            CANDIDATE_PREFIX,
        )?;
        if trie.get(address.as_bytes()).is_some() {
            return Ok(true);
        }
        let candidate = Candidate {
            security,
            block_number,
        };
        trie.insert(address.as_bytes(), rlp::encode(&candidate).to_vec());
        Ok(false)
    }

    /// Removes a candidate and returns its security deposit for refunding.
    pub fn cancel_candidate(&mut self, address: Address) -> EngineResult<U256> {
        let candidate = self
            .candidate(address)?
            .ok_or_else(|| EngineError::Snapshot("failed to decode candidate".into()))?;
        let trie = ensure(
            &mut self.candidate_trie,
            &self.db,
            self.root.candidate_hash,
            CANDIDATE_PREFIX,
        )?;
        trie.remove(address.as_bytes());
        Ok(candidate.security)
    }

    /// Points a delegator's vote at a candidate, retracting any prior vote.
    pub fn delegate(&mut self, delegator: Address, candidate: Address) -> EngineResult<()> {
        if self.candidate(candidate)?.is_none() {
            return Err(EngineError::Snapshot("invalid candidate to delegate".into()));
        }

        let vote_trie = ensure(&mut self.vote_trie, &self.db, self.root.vote_hash, VOTE_PREFIX)?;
        let old_candidate = vote_trie.get(delegator.as_bytes());
        let delegate_trie = ensure(
            &mut self.delegate_trie,
            &self.db,
            self.root.delegate_hash,
            DELEGATE_PREFIX,
        )?;
        if let Some(old) = old_candidate {
            let mut key = old;
            key.extend_from_slice(delegator.as_bytes());
            delegate_trie.remove(&key);
        }

        let mut key = candidate.as_bytes().to_vec();
        key.extend_from_slice(delegator.as_bytes());
        delegate_trie.insert(&key, delegator.as_bytes().to_vec());

        let vote_trie = ensure(&mut self.vote_trie, &self.db, self.root.vote_hash, VOTE_PREFIX)?;
        vote_trie.insert(delegator.as_bytes(), candidate.as_bytes().to_vec());
        Ok(())
    }

    /// Retracts a delegator's vote; the given candidate must be its current
    /// pick.
    pub fn un_delegate(&mut self, delegator: Address, candidate: Address) -> EngineResult<()> {
        if self.candidate(candidate)?.is_none() {
            return Err(EngineError::Snapshot(
                "invalid candidate to undelegate".into(),
            ));
        }

        let vote_trie = ensure(&mut self.vote_trie, &self.db, self.root.vote_hash, VOTE_PREFIX)?;
        let old_candidate = vote_trie
            .get(delegator.as_bytes())
            .ok_or_else(|| EngineError::Snapshot("mismatch candidate to undelegate".into()))?;
        if old_candidate != candidate.as_bytes() {
            return Err(EngineError::Snapshot(
                "mismatch candidate to undelegate".into(),
            ));
        }

        let delegate_trie = ensure(
            &mut self.delegate_trie,
            &self.db,
            self.root.delegate_hash,
            DELEGATE_PREFIX,
        )?;
        let mut key = candidate.as_bytes().to_vec();
        key.extend_from_slice(delegator.as_bytes());
        delegate_trie.remove(&key);

        let vote_trie = ensure(&mut self.vote_trie, &self.db, self.root.vote_hash, VOTE_PREFIX)?;
        vote_trie.remove(delegator.as_bytes());
        Ok(())
    }

    /// Removes a candidate together with every delegation pointing at it.
    /// The security deposit is forfeited. Deleting absent entries is
    /// tolerated.
    pub fn kick_out_candidate(&mut self, candidate: Address) -> EngineResult<()> {
        let candidate_trie = ensure(
            &mut self.candidate_trie,
            &self.db,
            self.root.candidate_hash,
            CANDIDATE_PREFIX,
        )?;
        candidate_trie.remove(candidate.as_bytes());

        let delegate_trie = ensure(
            &mut self.delegate_trie,
            &self.db,
            self.root.delegate_hash,
            DELEGATE_PREFIX,
        )?;
        let delegators: Vec<Vec<u8>> = delegate_trie
            .prefix_iter(candidate.as_bytes())
            .map(|(_, value)| value)
            .collect();

        for delegator in delegators {
            let mut key = candidate.as_bytes().to_vec();
            key.extend_from_slice(&delegator);
            let delegate_trie = ensure(
                &mut self.delegate_trie,
                &self.db,
                self.root.delegate_hash,
                DELEGATE_PREFIX,
            )?;
            delegate_trie.remove(&key);

            let vote_trie =
                ensure(&mut self.vote_trie, &self.db, self.root.vote_hash, VOTE_PREFIX)?;
            if vote_trie.get(&delegator).as_deref() == Some(candidate.as_bytes()) {
                vote_trie.remove(&delegator);
            }
        }
        Ok(())
    }

    /// Stores a governance proposal keyed by its transaction hash.
    pub fn submit_proposal(&mut self, proposal: &Proposal) -> EngineResult<()> {
        let data = serde_json::to_vec(proposal)
            .map_err(|err| EngineError::Codec(format!("failed to encode proposal: {err}")))?;
        let trie = ensure(
            &mut self.proposal_trie,
            &self.db,
            self.root.proposal_hash,
            PROPOSAL_PREFIX,
        )?;
        trie.insert(proposal.hash.as_bytes(), data);
        Ok(())
    }

    /// Returns the proposal stored under the given transaction hash.
    pub fn proposal(&mut self, hash: H256) -> EngineResult<Option<Proposal>> {
        let trie = ensure(
            &mut self.proposal_trie,
            &self.db,
            self.root.proposal_hash,
            PROPOSAL_PREFIX,
        )?;
        match trie.get(hash.as_bytes()) {
            Some(data) => serde_json::from_slice(&data)
                .map(Some)
                .map_err(|err| EngineError::Codec(format!("failed to decode proposal: {err}"))),
            None => Ok(None),
        }
    }

    /// Marks a proposal approved by the declare transaction `tx_hash`.
    pub fn approve_proposal(&mut self, hash: H256, tx_hash: H256) -> EngineResult<Proposal> {
        let mut proposal = self
            .proposal(hash)?
            .ok_or_else(|| EngineError::Snapshot(format!("proposal not found, hash: {hash:?}")))?;
        proposal.approved_hash = Some(tx_hash);
        self.submit_proposal(&proposal)?;
        Ok(proposal)
    }

    /// Records a validator's declaration for the given epoch.
    pub fn declare(&mut self, epoch: u64, declare: &Declare) -> EngineResult<()> {
        let mut key = declare.proposal_hash.as_bytes().to_vec();
        key.extend_from_slice(&epoch.to_be_bytes());
        key.extend_from_slice(declare.declarer.as_bytes());

        let data = serde_json::to_vec(declare)
            .map_err(|err| EngineError::Codec(format!("failed to encode declare: {err}")))?;
        let trie = ensure(
            &mut self.declare_trie,
            &self.db,
            self.root.declare_hash,
            DECLARE_PREFIX,
        )?;
        trie.insert(&key, data);
        Ok(())
    }

    /// Returns every declaration on a proposal within an epoch.
    pub fn declarations(&mut self, proposal_hash: H256, epoch: u64) -> EngineResult<Vec<Declare>> {
        let mut prefix = proposal_hash.as_bytes().to_vec();
        prefix.extend_from_slice(&epoch.to_be_bytes());

        let trie = ensure(
            &mut self.declare_trie,
            &self.db,
            self.root.declare_hash,
            DECLARE_PREFIX,
        )?;
        Ok(trie
            .prefix_iter(&prefix)
            .filter_map(|(_, value)| serde_json::from_slice(&value).ok())
            .collect())
    }

    /// Records a declaration and, when a config update is still permitted
    /// this block and the declaration carries the proposal past a
    /// two-thirds majority of the current validators, approves the proposal
    /// and returns the updated chain config. At most one chain-config
    /// record may land per block; callers pass `allow_config_update =
    /// false` once that slot is taken.
    pub fn apply_declare(
        &mut self,
        config: &ChainConfig,
        epoch: u64,
        declare: &Declare,
        allow_config_update: bool,
    ) -> EngineResult<Option<ChainConfig>> {
        self.declare(epoch, declare)?;
        if !allow_config_update || !declare.decision {
            return Ok(None);
        }

        let proposal = match self.proposal(declare.proposal_hash)? {
            Some(proposal) if proposal.approved_hash.is_none() => proposal,
            _ => return Ok(None),
        };

        let validators = self.validators()?;
        let yes = self
            .declarations(declare.proposal_hash, epoch)?
            .iter()
            .filter(|declare| declare.decision)
            .count();
        if yes * 3 <= validators.len() * 2 {
            return Ok(None);
        }

        self.approve_proposal(proposal.hash, declare.hash)?;
        let mut updated = config.clone();
        proposal.apply_to(&mut updated)?;
        Ok(Some(updated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interfaces::MemoryState;

    fn addr(hex: &str) -> Address {
        hex.parse().expect("valid address literal")
    }

    #[test]
    fn set_chain_config_round_trip() {
        let db = TrieDb::memory();
        let mut snap = Snapshot::new_empty(&db);

        let config = ChainConfig {
            period: 1024,
            max_validators_count: 21,
            min_candidate_balance: U256::from(1000),
            ..ChainConfig::default()
        };
        snap.set_chain_config(&config).unwrap();
        assert_eq!(snap.chain_config().unwrap(), config);
    }

    #[test]
    fn chain_config_missing() {
        let db = TrieDb::memory();
        let mut snap = Snapshot::new_empty(&db);
        assert!(matches!(
            snap.chain_config(),
            Err(EngineError::ChainConfigMissing)
        ));
    }

    #[test]
    fn load_snapshot_after_commit() {
        let db = TrieDb::memory();
        let mut snap = Snapshot::new_empty(&db);

        let validator1 = addr("44d1ce0b7cb3588bca96151fe1bc05af38f91b6c");
        snap.set_validators(&[validator1]).unwrap();

        let root = snap.root().unwrap();
        snap.commit(root).unwrap();

        let mut reloaded = Snapshot::load(&db, root);
        assert_eq!(reloaded.validators().unwrap(), vec![validator1]);
    }

    #[test]
    fn set_validators_preserves_order() {
        let db = TrieDb::memory();
        let mut snap = Snapshot::new_empty(&db);

        let validators = vec![
            addr("44d1ce0b7cb3588bca96151fe1bc05af38f91b6c"),
            addr("cc7c8317b21e1cea6139700c3c46c21af998d14c"),
            addr("10702d5b794d97fb720e02506ecfdb1186a804b1"),
            addr("19e28f4ca35205a5060d8375c9fca1a315f4d7b6"),
        ];
        snap.set_validators(&validators).unwrap();
        assert_eq!(snap.validators().unwrap(), validators);
    }

    #[test]
    fn count_minted_sorts_descending_with_zero_weights() {
        let db = TrieDb::memory();
        let mut snap = Snapshot::new_empty(&db);

        let validator1 = addr("cc7c8317b21e1cea6139700c3c46c21af998d14c");
        let validator2 = addr("44d1ce0b7cb3588bca96151fe1bc05af38f91b6c");
        let validator3 = addr("f541c3cd1d2df407fb9bb52b3489fc2aaeedd97e");
        snap.set_validators(&[validator1, validator2, validator3])
            .unwrap();

        snap.mint_block(1, 1, validator1).unwrap();
        snap.mint_block(1, 2, validator1).unwrap();
        snap.mint_block(1, 3, validator1).unwrap();
        snap.mint_block(1, 4, validator2).unwrap();
        snap.mint_block(1, 5, validator2).unwrap();
        snap.mint_block(1, 6, validator3).unwrap();
        snap.mint_block(1, 7, validator3).unwrap();
        snap.mint_block(1, 8, validator3).unwrap();
        snap.mint_block(1, 9, validator3).unwrap();

        let result = snap.count_minted(1).unwrap();
        assert_eq!(result[0], SortableAddress::new(validator3, U256::from(4)));
        assert_eq!(result[1], SortableAddress::new(validator1, U256::from(3)));
        assert_eq!(result[2], SortableAddress::new(validator2, U256::from(2)));

        let other_epoch = snap.count_minted(2).unwrap();
        assert!(other_epoch.iter().all(|entry| entry.weight.is_zero()));
    }

    #[test]
    fn become_candidate_is_idempotent() {
        let db = TrieDb::memory();
        let mut snap = Snapshot::new_empty(&db);

        let candidate = addr("cc7c8317b21e1cea6139700c3c46c21af998d14c");
        assert!(!snap
            .become_candidate(candidate, 1, U256::from(50))
            .unwrap());
        let once = snap.root().unwrap();

        assert!(snap.become_candidate(candidate, 2, U256::from(99)).unwrap());
        assert_eq!(snap.root().unwrap(), once);

        let record = snap.candidate(candidate).unwrap().unwrap();
        assert_eq!(record.block_number, 1);
        assert_eq!(record.security, U256::from(50));
    }

    #[test]
    fn cancel_candidate_refunds_security() {
        let db = TrieDb::memory();
        let mut snap = Snapshot::new_empty(&db);

        let candidate = addr("cc7c8317b21e1cea6139700c3c46c21af998d14c");
        snap.become_candidate(candidate, 1, U256::from(42)).unwrap();
        assert_eq!(snap.cancel_candidate(candidate).unwrap(), U256::from(42));
        assert!(snap.candidates().unwrap().is_empty());
        assert!(snap.cancel_candidate(candidate).is_err());

        snap.become_candidate(candidate, 7, U256::from(9)).unwrap();
        let record = snap.candidate(candidate).unwrap().unwrap();
        assert_eq!(record.block_number, 7);
        assert_eq!(record.security, U256::from(9));
    }

    #[test]
    fn rand_candidates_is_deterministic_prefix() {
        let db = TrieDb::memory();
        let mut snap = Snapshot::new_empty(&db);

        let candidates = [
            addr("cc7c8317b21e1cea6139700c3c46c21af998d14c"),
            addr("19e28f4ca35205a5060d8375c9fca1a315f4d7b6"),
            addr("08317854e853facf0bff9e360583d80c1596ed7a"),
            addr("7bee0c6d5132e39622bdb6c0fc9f16b350f09453"),
            addr("f541c3cd1d2df407fb9bb52b3489fc2aaeedd97e"),
        ];
        for candidate in candidates {
            snap.become_candidate(candidate, 1, U256::zero()).unwrap();
        }

        let picked = snap.rand_candidates(100, 3).unwrap();
        assert_eq!(picked.len(), 3);
        assert_eq!(picked, snap.rand_candidates(100, 3).unwrap());
        for candidate in &picked {
            assert!(candidates.contains(candidate));
        }

        let all = snap.rand_candidates(100, 10).unwrap();
        assert_eq!(all.len(), 5);
        assert_eq!(all[..3], picked[..]);

        assert!(snap.rand_candidates(100, 0).unwrap().is_empty());
    }

    #[test]
    fn enough_candidates_short_circuits() {
        let db = TrieDb::memory();
        let mut snap = Snapshot::new_empty(&db);
        assert_eq!(snap.enough_candidates(0).unwrap(), (0, true));
        assert_eq!(snap.enough_candidates(1).unwrap(), (0, false));

        snap.become_candidate(addr("cc7c8317b21e1cea6139700c3c46c21af998d14c"), 1, U256::zero())
            .unwrap();
        snap.become_candidate(addr("44d1ce0b7cb3588bca96151fe1bc05af38f91b6c"), 1, U256::zero())
            .unwrap();
        assert_eq!(snap.enough_candidates(2).unwrap(), (2, true));
        assert_eq!(snap.enough_candidates(3).unwrap(), (2, false));
    }

    #[test]
    fn delegate_and_undelegate_keep_indices_in_sync() {
        let db = TrieDb::memory();
        let mut snap = Snapshot::new_empty(&db);
        let mut state = MemoryState::new();

        let candidate = addr("cc7c8317b21e1cea6139700c3c46c21af998d14c");
        let delegator = addr("44d1ce0b7cb3588bca96151fe1bc05af38f91b6c");
        state.set_balance(delegator, U256::from(10000));

        assert!(snap.delegate(delegator, candidate).is_err());

        snap.become_candidate(candidate, 1, U256::zero()).unwrap();
        snap.delegate(delegator, candidate).unwrap();
        assert_eq!(
            snap.count_votes(&state, candidate).unwrap(),
            U256::from(10000)
        );

        let top = snap.top_candidates(&state, 1).unwrap();
        assert_eq!(top[0].address, candidate);
        assert_eq!(top[0].weight, U256::from(10000));

        snap.un_delegate(delegator, candidate).unwrap();
        let top = snap.top_candidates(&state, 1).unwrap();
        assert_eq!(top[0].address, candidate);
        assert!(top[0].weight.is_zero());
        assert!(snap.un_delegate(delegator, candidate).is_err());
    }

    #[test]
    fn delegate_replaces_prior_vote() {
        let db = TrieDb::memory();
        let mut snap = Snapshot::new_empty(&db);
        let mut state = MemoryState::new();

        let first = addr("cc7c8317b21e1cea6139700c3c46c21af998d14c");
        let second = addr("19e28f4ca35205a5060d8375c9fca1a315f4d7b6");
        let delegator = addr("44d1ce0b7cb3588bca96151fe1bc05af38f91b6c");
        state.set_balance(delegator, U256::from(500));

        snap.become_candidate(first, 1, U256::zero()).unwrap();
        snap.become_candidate(second, 1, U256::zero()).unwrap();

        snap.delegate(delegator, first).unwrap();
        snap.delegate(delegator, second).unwrap();

        assert!(snap.count_votes(&state, first).unwrap().is_zero());
        assert_eq!(snap.count_votes(&state, second).unwrap(), U256::from(500));
    }

    #[test]
    fn top_candidates_ranks_by_delegated_balance() {
        let db = TrieDb::memory();
        let mut snap = Snapshot::new_empty(&db);
        let mut state = MemoryState::new();

        let pairs = [
            ("44d1ce0b7cb3588bca96151fe1bc05af38f91b6c", "cc7c8317b21e1cea6139700c3c46c21af998d14c", 10000u64),
            ("10702d5b794d97fb720e02506ecfdb1186a804b1", "19e28f4ca35205a5060d8375c9fca1a315f4d7b6", 52264),
            ("b1706a41a42a129914194261e3fe6a081719ed48", "08317854e853facf0bff9e360583d80c1596ed7a", 1231231),
            ("47746e8acb5dafe9c00b7195d0c2d830fcc04910", "7bee0c6d5132e39622bdb6c0fc9f16b350f09453", 562),
            ("3c8d2bbc0b9b93f396d4831ca24ea023a0acae5b", "f541c3cd1d2df407fb9bb52b3489fc2aaeedd97e", 5523),
        ];
        for (delegator, candidate, balance) in pairs {
            let delegator = addr(delegator);
            let candidate = addr(candidate);
            state.set_balance(delegator, U256::from(balance));
            snap.become_candidate(candidate, 1, U256::zero()).unwrap();
            snap.delegate(delegator, candidate).unwrap();
        }

        let top = snap.top_candidates(&state, 5).unwrap();
        assert_eq!(top.len(), 5);
        assert_eq!(top[0].address, addr("08317854e853facf0bff9e360583d80c1596ed7a"));
        assert_eq!(top[1].address, addr("19e28f4ca35205a5060d8375c9fca1a315f4d7b6"));
        assert_eq!(top[2].address, addr("cc7c8317b21e1cea6139700c3c46c21af998d14c"));
        assert_eq!(top[3].address, addr("f541c3cd1d2df407fb9bb52b3489fc2aaeedd97e"));
        assert_eq!(top[4].address, addr("7bee0c6d5132e39622bdb6c0fc9f16b350f09453"));

        let top3 = snap.top_candidates(&state, 3).unwrap();
        assert_eq!(top3.len(), 3);
        assert_eq!(top3[0].address, addr("08317854e853facf0bff9e360583d80c1596ed7a"));
    }

    #[test]
    fn kick_out_candidate_clears_delegations() {
        let db = TrieDb::memory();
        let mut snap = Snapshot::new_empty(&db);
        let mut state = MemoryState::new();

        let candidate = addr("cc7c8317b21e1cea6139700c3c46c21af998d14c");
        let delegator = addr("44d1ce0b7cb3588bca96151fe1bc05af38f91b6c");
        state.set_balance(delegator, U256::from(10000));

        snap.become_candidate(candidate, 1, U256::zero()).unwrap();
        snap.delegate(delegator, candidate).unwrap();

        snap.kick_out_candidate(candidate).unwrap();
        assert!(snap.candidates().unwrap().is_empty());
        assert!(snap.top_candidates(&state, 1).unwrap().is_empty());

        // Kicking an address that is no longer a candidate is tolerated.
        snap.kick_out_candidate(candidate).unwrap();
    }

    #[test]
    fn proposal_and_declare_round_trip() {
        let db = TrieDb::memory();
        let mut snap = Snapshot::new_empty(&db);

        let proposal = Proposal {
            key: "period".into(),
            value: "8".into(),
            hash: crate::crypto::keccak256(b"proposal"),
            proposer: addr("cc7c8317b21e1cea6139700c3c46c21af998d14c"),
            approved_hash: None,
        };
        snap.submit_proposal(&proposal).unwrap();
        assert_eq!(snap.proposal(proposal.hash).unwrap(), Some(proposal.clone()));
        assert_eq!(snap.proposal(H256::repeat_byte(9)).unwrap(), None);

        let declare = Declare {
            hash: crate::crypto::keccak256(b"declare"),
            proposal_hash: proposal.hash,
            declarer: addr("44d1ce0b7cb3588bca96151fe1bc05af38f91b6c"),
            decision: true,
        };
        snap.declare(2, &declare).unwrap();
        assert_eq!(snap.declarations(proposal.hash, 2).unwrap(), vec![declare]);
        assert!(snap.declarations(proposal.hash, 3).unwrap().is_empty());
    }

    #[test]
    fn apply_declare_approves_past_two_thirds() {
        let db = TrieDb::memory();
        let mut snap = Snapshot::new_empty(&db);
        let config = ChainConfig::default();

        let validators = [
            addr("cc7c8317b21e1cea6139700c3c46c21af998d14c"),
            addr("44d1ce0b7cb3588bca96151fe1bc05af38f91b6c"),
            addr("f541c3cd1d2df407fb9bb52b3489fc2aaeedd97e"),
        ];
        snap.set_validators(&validators).unwrap();

        let proposal = Proposal {
            key: "period".into(),
            value: "8".into(),
            hash: crate::crypto::keccak256(b"proposal"),
            proposer: validators[0],
            approved_hash: None,
        };
        snap.submit_proposal(&proposal).unwrap();

        let declare = |declarer: Address, decision: bool, tag: &str| Declare {
            hash: crate::crypto::keccak256(tag.as_bytes()),
            proposal_hash: proposal.hash,
            declarer,
            decision,
        };

        // Two yes votes out of three validators do not clear two thirds.
        let updated = snap
            .apply_declare(&config, 1, &declare(validators[0], true, "d1"), true)
            .unwrap();
        assert!(updated.is_none());

        let updated = snap
            .apply_declare(&config, 1, &declare(validators[1], true, "d2"), true)
            .unwrap();
        assert!(updated.is_none());

        // The third yes pushes the count past two thirds.
        let updated = snap
            .apply_declare(&config, 1, &declare(validators[2], true, "d3"), true)
            .unwrap()
            .expect("proposal approved");
        assert_eq!(updated.period, 8);

        let stored = snap.proposal(proposal.hash).unwrap().unwrap();
        assert_eq!(
            stored.approved_hash,
            Some(crate::crypto::keccak256(b"d3"))
        );
    }

    #[test]
    fn apply_declare_refuses_second_config_update() {
        let db = TrieDb::memory();
        let mut snap = Snapshot::new_empty(&db);
        let config = ChainConfig::default();

        let validator = addr("cc7c8317b21e1cea6139700c3c46c21af998d14c");
        snap.set_validators(&[validator]).unwrap();

        let proposal = Proposal {
            key: "period".into(),
            value: "8".into(),
            hash: crate::crypto::keccak256(b"proposal"),
            proposer: validator,
            approved_hash: None,
        };
        snap.submit_proposal(&proposal).unwrap();

        let declare = Declare {
            hash: crate::crypto::keccak256(b"d1"),
            proposal_hash: proposal.hash,
            declarer: validator,
            decision: true,
        };

        // One yes out of one validator crosses the quorum, but the block's
        // config slot is already taken: the vote is recorded, nothing more.
        let updated = snap.apply_declare(&config, 1, &declare, false).unwrap();
        assert!(updated.is_none());
        assert_eq!(snap.declarations(proposal.hash, 1).unwrap(), vec![declare.clone()]);
        let stored = snap.proposal(proposal.hash).unwrap().unwrap();
        assert_eq!(stored.approved_hash, None);

        // With the slot free the same declaration approves the proposal.
        let updated = snap
            .apply_declare(&config, 1, &declare, true)
            .unwrap()
            .expect("proposal approved");
        assert_eq!(updated.period, 8);
    }
}
