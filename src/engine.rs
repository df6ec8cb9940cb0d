use std::num::NonZeroUsize;
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use ethereum_types::{H256, U256};
use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, trace, warn};

use crate::config::{ChainConfig, ElectionMode};
use crate::crypto::{keccak512, recover_signer, SIGNATURE_LENGTH};
use crate::errors::{EngineError, EngineResult};
use crate::events::ConsensusEvent;
use crate::header_extra::{write_header_extra, HeaderExtra, Root, EXTRA_SEAL, EXTRA_VANITY};
use crate::interfaces::{HeaderReader, StateDb};
use crate::snapshot::Snapshot;
use crate::trie::TrieDb;
use crate::types::{
    addresses_distinct, delegates_distinct, empty_uncle_hash, Address, Block, Delegate, Header,
    SortableAddress, Transaction,
};

/// Difficulty of every block under this engine.
pub const DEFAULT_DIFFICULTY: u64 = 1;
/// Number of recent block signatures to keep in memory.
const INMEMORY_SIGNATURES: usize = 4096;
/// Mime type handed to the signer callback alongside the sealing RLP.
pub const MIMETYPE_CLIQUE: &str = "application/x-clique-header";

/// Callback that authorizes hashes on behalf of the local signer.
pub type SignerFn = Box<dyn Fn(Address, &str, &[u8]) -> EngineResult<Vec<u8>> + Send + Sync>;

struct SignerEntry {
    address: Address,
    sign: SignerFn,
}

struct EngineInner {
    config: ChainConfig,
    db: TrieDb,
    signatures: Mutex<LruCache<H256, Address>>,
    signer: RwLock<Option<SignerEntry>>,
}

/// The delegated-proof-of-stake consensus engine. Cheap to clone; clones
/// share the signature cache, the signer registration and the trie store.
#[derive(Clone)]
pub struct Equality {
    inner: Arc<EngineInner>,
}

impl Equality {
    /// Builds an engine over the genesis chain parameters and a trie store.
    pub fn new(mut config: ChainConfig, db: TrieDb) -> EngineResult<Self> {
        if config.period == 0 || config.epoch == 0 || config.max_validators_count == 0 {
            return Err(EngineError::ChainConfigMissing);
        }
        config.sort_rewards();
        let capacity = NonZeroUsize::new(INMEMORY_SIGNATURES)
            .ok_or_else(|| EngineError::Snapshot("signature cache capacity".into()))?;
        Ok(Self {
            inner: Arc::new(EngineInner {
                config,
                db,
                signatures: Mutex::new(LruCache::new(capacity)),
                signer: RwLock::new(None),
            }),
        })
    }

    pub(crate) fn trie_db(&self) -> &TrieDb {
        &self.inner.db
    }

    /// Injects the local signing credentials used to mint new blocks.
    pub fn authorize(&self, address: Address, sign: SignerFn) {
        *self.inner.signer.write() = Some(SignerEntry { address, sign });
    }

    /// Recovers the address that sealed the given header.
    pub fn author(&self, header: &Header) -> EngineResult<Address> {
        self.ecrecover(header)
    }

    fn ecrecover(&self, header: &Header) -> EngineResult<Address> {
        let hash = header.hash();
        if let Some(address) = self.inner.signatures.lock().get(&hash) {
            return Ok(*address);
        }
        if header.extra.len() < EXTRA_SEAL {
            return Err(EngineError::MissingSignature);
        }
        let signature = &header.extra[header.extra.len() - EXTRA_SEAL..];
        let signer = recover_signer(header.seal_hash(), signature)?;
        self.inner.signatures.lock().put(hash, signer);
        Ok(signer)
    }

    /// Whether the local signer is in-turn for the slot following the given
    /// chain head.
    pub fn in_turn(&self, last_header: &Header, now: u64) -> bool {
        let config = match self.chain_config_for(Some(last_header)) {
            Ok(config) => config,
            Err(_) => return false,
        };
        if now + config.period <= config.genesis_timestamp {
            return false;
        }

        let next_block_time = (last_header.time + config.period).max(now);
        let signer = match self.inner.signer.read().as_ref() {
            Some(entry) => entry.address,
            None => return false,
        };
        self.slot_check(&config, Some(last_header), next_block_time, signer)
    }

    /// Whether `signer` owns the slot at `time`. The slot index counts
    /// periods since the genesis timestamp, modulo the validator count.
    fn slot_check(
        &self,
        config: &ChainConfig,
        last_header: Option<&Header>,
        time: u64,
        signer: Address,
    ) -> bool {
        let validators = match last_header {
            Some(header) if header.number > 0 => {
                let extra = match HeaderExtra::decode_from_header(header) {
                    Ok(extra) => extra,
                    Err(_) => return false,
                };
                let mut snap = Snapshot::load(&self.inner.db, extra.root);
                match snap.validators() {
                    Ok(validators) => validators,
                    Err(_) => return false,
                }
            }
            _ => config.validators.clone(),
        };
        if validators.is_empty() {
            return false;
        }

        let index = time.saturating_sub(config.genesis_timestamp) / config.period
            % validators.len() as u64;
        validators[index as usize] == signer
    }

    /// Resolves the chain config in effect after the given header.
    pub fn chain_config_for(&self, header: Option<&Header>) -> EngineResult<ChainConfig> {
        match header {
            None => Ok(self.inner.config.clone()),
            Some(header) if header.number == 0 => Ok(self.inner.config.clone()),
            Some(header) => {
                let extra = HeaderExtra::decode_from_header(header)?;
                self.chain_config_by_hash(extra.root.config_hash)
            }
        }
    }

    /// Resolves a chain config by its config-table hash. A zero hash means
    /// the genesis parameters are still in effect.
    pub fn chain_config_by_hash(&self, config_hash: H256) -> EngineResult<ChainConfig> {
        if config_hash.is_zero() {
            return Ok(self.inner.config.clone());
        }
        let mut snap = Snapshot::load(
            &self.inner.db,
            Root {
                config_hash,
                ..Root::default()
            },
        );
        snap.chain_config()
            .map_err(|_| EngineError::ChainConfigMissing)
    }

    /// Initializes the consensus fields of a block header: constant
    /// difficulty, zero mix digest, the slot timestamp, and a skeleton
    /// payload carrying the parent's root and epoch bookkeeping.
    pub fn prepare(&self, chain: &dyn HeaderReader, header: &mut Header) -> EngineResult<()> {
        trace!(number = header.number, "prepare");
        if header.number == 0 {
            return Err(EngineError::UnknownBlock);
        }

        header.mix_digest = H256::zero();
        header.difficulty = U256::from(DEFAULT_DIFFICULTY);

        let number = header.number;
        let parent = chain
            .header(header.parent_hash, number - 1)
            .ok_or(EngineError::UnknownAncestor)?;

        let mut extra = HeaderExtra::default();
        if number == 1 {
            let config = self.inner.config.clone();
            header.time = (parent.time + config.period).max(unix_now());
            extra.epoch = 1;
            extra.epoch_block = number;
        } else {
            let parent_extra = HeaderExtra::decode_from_header(&parent)?;
            let config = self.chain_config_by_hash(parent_extra.root.config_hash)?;
            header.time = (parent.time + config.period).max(unix_now());

            extra.root = parent_extra.root;
            extra.epoch = parent_extra.epoch;
            extra.epoch_block = parent_extra.epoch_block;
            if number - extra.epoch_block == config.epoch {
                extra.epoch = parent_extra.epoch + 1;
                extra.epoch_block = number;
            }
        }

        write_header_extra(header, &extra)
    }

    /// Checks a single header against the consensus rules.
    pub fn verify_header(&self, chain: &dyn HeaderReader, header: &Header) -> EngineResult<()> {
        self.verify_header_inner(chain, header, &[])
    }

    /// Verifies a batch of headers. Results arrive on the returned channel
    /// in input order; sending on the abort channel stops the remaining
    /// work.
    pub fn verify_headers(
        &self,
        chain: Arc<dyn HeaderReader>,
        headers: Vec<Header>,
    ) -> (Sender<()>, Receiver<EngineResult<()>>) {
        let (abort_tx, abort_rx) = channel();
        let (results_tx, results_rx) = channel();

        let engine = self.clone();
        thread::spawn(move || {
            for index in 0..headers.len() {
                let result =
                    engine.verify_header_inner(chain.as_ref(), &headers[index], &headers[..index]);
                if let Ok(()) = abort_rx.try_recv() {
                    return;
                }
                if results_tx.send(result).is_err() {
                    return;
                }
            }
        });
        (abort_tx, results_rx)
    }

    fn verify_header_inner(
        &self,
        chain: &dyn HeaderReader,
        header: &Header,
        parents: &[Header],
    ) -> EngineResult<()> {
        trace!(number = header.number, "verify header");

        // Don't waste time checking blocks from the future.
        if header.time > unix_now() {
            return Err(EngineError::FutureBlock);
        }

        // The extra-data must hold both the vanity and the signature.
        if header.extra.len() < EXTRA_VANITY {
            return Err(EngineError::MissingVanity);
        }
        if header.extra.len() < EXTRA_VANITY + EXTRA_SEAL {
            return Err(EngineError::MissingSignature);
        }

        if !header.mix_digest.is_zero() {
            return Err(EngineError::InvalidMixDigest);
        }

        // Uncles are meaningless in DPoS.
        if header.uncle_hash != empty_uncle_hash() {
            return Err(EngineError::InvalidUncleHash);
        }

        let result = self.verify_cascading_fields(chain, header, parents);
        if let Err(err) = &result {
            warn!(number = header.number, %err, "failed to verify cascading fields");
        }
        result
    }

    fn verify_cascading_fields(
        &self,
        chain: &dyn HeaderReader,
        header: &Header,
        parents: &[Header],
    ) -> EngineResult<()> {
        // The genesis block is the always valid dead-end.
        let number = header.number;
        if number == 0 {
            return Ok(());
        }

        let parent = match parents.last() {
            Some(parent) => parent.clone(),
            None => chain
                .header(header.parent_hash, number - 1)
                .ok_or(EngineError::UnknownAncestor)?,
        };
        if parent.number != number - 1 || parent.hash() != header.parent_hash {
            return Err(EngineError::UnknownAncestor);
        }
        if parent.time > header.time {
            return Err(EngineError::InvalidTimestamp);
        }

        let extra = HeaderExtra::decode_from_header(header)?;

        let mut config = self.inner.config.clone();
        let mut parent_extra = extra.clone();
        let mut snap = if parent.number == 0 {
            Snapshot::new_empty(&self.inner.db)
        } else {
            parent_extra = HeaderExtra::decode_from_header(&parent)?;
            config = self.chain_config_by_hash(parent_extra.root.config_hash)?;
            Snapshot::load(&self.inner.db, parent_extra.root)
        };

        // Epoch bookkeeping either carries over or advances by one at this
        // exact block.
        if extra.epoch != parent_extra.epoch || extra.epoch_block != parent_extra.epoch_block {
            if extra.epoch != parent_extra.epoch + 1 || extra.epoch_block != number {
                return Err(EngineError::InvalidTimestamp);
            }
        }

        // Replay the declared events and require a bit-exact root.
        snap.apply(&config, header, &extra)?;
        let root = snap.root()?;
        if root != extra.root {
            root.log_differences(number, &extra.root);
            parent_extra.root.log_differences(number, &extra.root);
            return Err(EngineError::InvalidRoot {
                coinbase: format!("{:?}", header.coinbase),
            });
        }

        self.verify_seal_inner(&config, header, Some(&parent))?;

        // All checks passed, retain the snapshot.
        snap.commit(root)
    }

    /// Uncles are rejected outright.
    pub fn verify_uncles(&self, uncles: &[Header]) -> EngineResult<()> {
        if !uncles.is_empty() {
            return Err(EngineError::UnclesNotAllowed);
        }
        Ok(())
    }

    /// Checks the seal signature of a header against the slot schedule.
    pub fn verify_seal(&self, chain: &dyn HeaderReader, header: &Header) -> EngineResult<()> {
        trace!(number = header.number, "verify seal");

        let parent = if header.number > 0 {
            chain.header(header.parent_hash, header.number - 1)
        } else {
            None
        };
        let config = if header.number > 1 {
            self.chain_config_for(parent.as_ref())?
        } else {
            self.inner.config.clone()
        };
        self.verify_seal_inner(&config, header, parent.as_ref())
    }

    fn verify_seal_inner(
        &self,
        config: &ChainConfig,
        header: &Header,
        parent: Option<&Header>,
    ) -> EngineResult<()> {
        // Verifying the genesis block is not supported.
        if header.number == 0 {
            return Err(EngineError::UnknownBlock);
        }

        let signer = self.ecrecover(header)?;
        if !self.slot_check(config, parent, header.time, signer) {
            return Err(EngineError::Unauthorized);
        }
        Ok(())
    }

    /// Credits the block reward: everything to the coinbase, or a 10/90
    /// split between coinbase and pool when a pool address is configured.
    fn accumulate_rewards(&self, config: &ChainConfig, state: &mut dyn StateDb, header: &Header) {
        let reward = config.reward_for(header.number);
        if reward.is_zero() {
            return;
        }

        match config.pool {
            Some(pool) => {
                let base = reward / U256::from(10);
                state.add_balance(&header.coinbase, base);
                state.add_balance(&pool, reward - base);
                debug!(coinbase = ?header.coinbase, ?pool, %reward, "accumulate rewards");
            }
            None => {
                state.add_balance(&header.coinbase, reward);
                debug!(coinbase = ?header.coinbase, %reward, "accumulate rewards");
            }
        }
    }

    /// Walks the block's transactions and turns recognised payloads into
    /// snapshot updates and header-extra event lists.
    fn process_transactions(
        &self,
        config: &ChainConfig,
        state: &mut dyn StateDb,
        header: &Header,
        snap: &mut Snapshot,
        extra: &mut HeaderExtra,
        txs: &[Transaction],
    ) -> EngineResult<()> {
        let number = header.number;
        if number <= 1 {
            snap.set_chain_config(config)?;
            extra.chain_config = vec![config.clone()];
        }

        let mut count = 0usize;
        for tx in txs {
            let event = match ConsensusEvent::decode(tx) {
                Ok(event) => event,
                Err(_) => continue,
            };
            count += 1;

            match event {
                ConsensusEvent::BecomeCandidate { candidate } => {
                    if state.balance(&candidate) < config.min_candidate_balance {
                        continue;
                    }
                    let already =
                        snap.become_candidate(candidate, number, config.min_candidate_balance)?;
                    if !already {
                        state.sub_balance(&candidate, config.min_candidate_balance);
                        extra.current_block_candidates.push(candidate);
                    }
                }
                ConsensusEvent::CancelCandidate { candidate } => {
                    if let Ok(security) = snap.cancel_candidate(candidate) {
                        state.add_balance(&candidate, security);
                        extra.current_block_cancel_candidates.push(candidate);
                    }
                }
                ConsensusEvent::Delegate {
                    delegator,
                    candidate,
                } => {
                    if state.balance(&delegator) < config.min_delegator_balance {
                        continue;
                    }
                    if snap.delegate(delegator, candidate).is_ok() {
                        extra.current_block_delegates.push(Delegate {
                            delegator,
                            candidate,
                        });
                    }
                }
                ConsensusEvent::Proposal(proposal) => {
                    if snap.submit_proposal(&proposal).is_ok() {
                        extra.current_block_proposals.push(proposal);
                    }
                }
                ConsensusEvent::Declare(declare) => {
                    // At most one chain-config record may land per block;
                    // the genesis bootstrap or a prior approval takes the
                    // slot.
                    let allow_update = extra.chain_config.is_empty();
                    if let Ok(updated) =
                        snap.apply_declare(config, extra.epoch, &declare, allow_update)
                    {
                        extra.current_block_declares.push(declare);
                        if let Some(updated) = updated {
                            snap.set_chain_config(&updated)?;
                            extra.chain_config.push(updated);
                        }
                    }
                }
            }
        }

        extra.current_block_candidates =
            addresses_distinct(std::mem::take(&mut extra.current_block_candidates));
        extra.current_block_delegates =
            delegates_distinct(std::mem::take(&mut extra.current_block_delegates));

        trace!(txs = count, "processing transactions done");
        Ok(())
    }

    /// Runs the epoch election; a no-op unless this block starts an epoch.
    /// Inactive validators are kicked while the candidate pool stays above
    /// the safe size, then the configured election body picks the new set.
    fn try_elect(
        &self,
        config: &ChainConfig,
        state: &dyn StateDb,
        header: &Header,
        snap: &mut Snapshot,
        extra: &mut HeaderExtra,
    ) -> EngineResult<()> {
        let number = header.number;
        if number != extra.epoch_block {
            return Ok(());
        }

        // Find validators that were not active enough in the prior epoch.
        let mut need_kick_out = Vec::new();
        if number <= 1 {
            for validator in &config.validators {
                snap.become_candidate(*validator, 1, U256::zero())?;
                snap.delegate(*validator, *validator)?;
                extra.current_block_delegates.push(Delegate {
                    delegator: *validator,
                    candidate: *validator,
                });
                extra.current_block_candidates.push(*validator);
            }
            extra.current_block_candidates =
                addresses_distinct(std::mem::take(&mut extra.current_block_candidates));
            extra.current_block_delegates =
                delegates_distinct(std::mem::take(&mut extra.current_block_delegates));
        } else {
            let min_mint = U256::from(config.min_mint());
            need_kick_out = snap
                .count_minted(extra.epoch - 1)?
                .into_iter()
                .filter(|validator| validator.weight < min_mint)
                .collect::<Vec<SortableAddress>>();
        }

        if !need_kick_out.is_empty() {
            let safe_size = config.safe_size();
            let (mut candidate_count, _) =
                snap.enough_candidates(safe_size + need_kick_out.len())?;
            for (index, validator) in need_kick_out.iter().enumerate() {
                // Never shrink the candidate pool below the safe size.
                if candidate_count <= safe_size {
                    info!(
                        prev_epoch = extra.epoch - 1,
                        candidate_count,
                        remaining = need_kick_out.len() - index,
                        "no more candidates can be kicked out"
                    );
                    break;
                }

                snap.kick_out_candidate(validator.address)?;
                candidate_count -= 1;
                extra
                    .current_block_kick_out_candidates
                    .push(validator.address);
                info!(
                    prev_epoch = extra.epoch - 1,
                    candidate = ?validator.address,
                    mint_cnt = %validator.weight,
                    "kick out candidate"
                );
            }
        }

        let elected = match config.election {
            ElectionMode::Shuffle => {
                let seed = shuffle_seed(header.parent_hash);
                snap.rand_candidates(seed, config.max_validators_count as usize)?
            }
            ElectionMode::Votes => snap
                .top_candidates(state, config.max_validators_count as usize)?
                .into_iter()
                .map(|candidate| candidate.address)
                .collect(),
        };

        extra.current_epoch_validators.extend(elected);
        debug!(
            number,
            epoch = extra.epoch,
            validators = ?extra.current_epoch_validators,
            "come to next epoch"
        );
        snap.set_validators(&extra.current_epoch_validators)
    }

    /// Verifier-side finalization: replays rewards and events against the
    /// parent snapshot and requires the recomputed event lists to match the
    /// header's payload exactly.
    pub fn finalize(
        &self,
        chain: &dyn HeaderReader,
        header: &Header,
        state: &mut dyn StateDb,
        txs: &[Transaction],
    ) -> EngineResult<()> {
        trace!(number = header.number, "finalize");

        let extra = HeaderExtra::decode_from_header(header)?;
        let number = header.number;
        let parent = chain.header(header.parent_hash, number.saturating_sub(1));
        let mut snap = if number <= 1 {
            Snapshot::new_empty(&self.inner.db)
        } else {
            let parent = parent.as_ref().ok_or(EngineError::UnknownAncestor)?;
            let parent_extra = HeaderExtra::decode_from_header(parent)?;
            Snapshot::load(&self.inner.db, parent_extra.root)
        };

        let config = self.chain_config_for(parent.as_ref())?;
        self.accumulate_rewards(&config, state, header);

        let mut computed = HeaderExtra {
            root: extra.root,
            epoch: extra.epoch,
            epoch_block: extra.epoch_block,
            ..HeaderExtra::default()
        };
        self.process_transactions(&config, state, header, &mut snap, &mut computed, txs)?;
        self.try_elect(&config, state, header, &mut snap, &mut computed)?;
        if computed != extra {
            return Err(EngineError::InvalidRoot {
                coinbase: format!("{:?}", header.coinbase),
            });
        }
        Ok(())
    }

    /// Producer-side finalization: credits rewards, records the mint,
    /// replays the block's transactions, possibly runs the election, then
    /// commits the snapshot and embeds the payload and new root into the
    /// header.
    pub fn finalize_and_assemble(
        &self,
        chain: &dyn HeaderReader,
        header: &mut Header,
        state: &mut dyn StateDb,
        txs: Vec<Transaction>,
    ) -> EngineResult<Block> {
        trace!(number = header.number, "finalize and assemble");

        let old_extra = HeaderExtra::decode_from_header(header)?;
        let mut extra = HeaderExtra {
            epoch: old_extra.epoch,
            epoch_block: old_extra.epoch_block,
            ..HeaderExtra::default()
        };

        let number = header.number;
        let parent = chain.header(header.parent_hash, number.saturating_sub(1));
        if number > 1 {
            let parent = parent.as_ref().ok_or(EngineError::UnknownAncestor)?;
            extra.root = HeaderExtra::decode_from_header(parent)?.root;
        }
        let mut snap = Snapshot::load(&self.inner.db, extra.root);

        let config = self.chain_config_for(parent.as_ref())?;
        self.accumulate_rewards(&config, state, header);

        snap.mint_block(extra.epoch, number, header.coinbase)?;
        self.process_transactions(&config, state, header, &mut snap, &mut extra, &txs)?;
        if let Err(err) = self.try_elect(&config, state, header, &mut snap, &mut extra) {
            warn!(number, %err, "failed to elect validators");
            return Err(err);
        }

        extra.root = snap.root()?;
        snap.commit(extra.root)?;

        write_header_extra(header, &extra)?;
        header.uncle_hash = empty_uncle_hash();
        Ok(Block::new(header.clone(), txs))
    }

    /// Signs the block and, after waiting out the slot (or an early stop),
    /// emits the sealed block on the results channel.
    pub fn seal(
        &self,
        chain: &dyn HeaderReader,
        block: &Block,
        results: Sender<Block>,
        stop: Receiver<()>,
    ) -> EngineResult<()> {
        trace!(number = block.header.number, "seal");

        // Sealing the genesis block is not supported.
        let mut header = block.header.clone();
        let number = header.number;
        if number == 0 {
            return Err(EngineError::UnknownBlock);
        }
        if header.extra.len() < EXTRA_VANITY {
            return Err(EngineError::MissingVanity);
        }
        if header.extra.len() < EXTRA_VANITY + EXTRA_SEAL {
            return Err(EngineError::MissingSignature);
        }

        let parent = chain.header(header.parent_hash, number - 1);
        let config = self.chain_config_for(parent.as_ref())?;

        // Bail out if we're unauthorized to sign the block.
        if !self.slot_check(&config, parent.as_ref(), header.time, header.coinbase) {
            return Err(EngineError::Unauthorized);
        }

        let signature = {
            let signer = self.inner.signer.read();
            let entry = signer.as_ref().ok_or(EngineError::Unauthorized)?;
            (entry.sign)(entry.address, MIMETYPE_CLIQUE, &header.sealing_rlp())?
        };
        if signature.len() != SIGNATURE_LENGTH {
            return Err(EngineError::Crypto(format!(
                "invalid seal signature length: {}",
                signature.len()
            )));
        }
        let offset = header.extra.len() - EXTRA_SEAL;
        header.extra[offset..].copy_from_slice(&signature);

        // Wait until sealing is terminated or the slot time arrives.
        let delay = header.time.saturating_sub(unix_now());
        info!(number, delay, "waiting for slot to sign and propagate");

        let sealed = block.with_seal(header.clone());
        let seal_hash = header.seal_hash();
        thread::spawn(move || {
            match stop.recv_timeout(Duration::from_secs(delay)) {
                Err(RecvTimeoutError::Timeout) => {}
                // Stop requested or the caller went away.
                _ => return,
            }
            if results.send(sealed).is_err() {
                warn!(?seal_hash, "sealing result is not read by miner");
            }
        });
        Ok(())
    }

    /// Hash of the header with its seal bytes stripped.
    pub fn seal_hash(&self, header: &Header) -> H256 {
        header.seal_hash()
    }

    /// The difficulty every new block should carry.
    pub fn calc_difficulty(&self) -> U256 {
        U256::from(DEFAULT_DIFFICULTY)
    }
}

/// Shuffle seed for the epoch election: the first four bytes of
/// Keccak-512 of the parent hash as a little-endian integer. Narrow, but
/// reproducible from the header chain alone.
pub fn shuffle_seed(parent_hash: H256) -> u64 {
    let digest = keccak512(parent_hash.as_bytes());
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&digest.as_bytes()[..4]);
    u32::from_le_bytes(bytes) as u64
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
