use ethereum_types::U256;
use rlp::{DecoderError, Rlp, RlpStream};
use serde::{Deserialize, Serialize};

use crate::types::Address;

/// Reward rule of mint block: from deployment the effective reward of a
/// height is taken from the entry with the greatest `number` at or below it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reward {
    pub number: u64,
    pub reward: U256,
}

/// Which election body fills the validator set at an epoch boundary. Frozen
/// at genesis; changing it mid-chain would change every subsequent root.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElectionMode {
    /// Deterministic shuffle of the candidate set, seeded from the parent
    /// block hash.
    #[default]
    Shuffle,
    /// Candidates ranked by the balance-weighted votes of their delegators.
    Votes,
}

/// The consensus engine parameters. The record is stored JSON-encoded in the
/// config table of the snapshot and is immutable after genesis unless an
/// accepted governance proposal rewrites it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainConfig {
    /// Number of seconds between blocks to enforce.
    pub period: u64,
    /// Epoch length in blocks.
    pub epoch: u64,
    /// Max count of validators.
    pub max_validators_count: u64,
    /// Min balance required to register as candidate; doubles as the
    /// security deposit.
    pub min_candidate_balance: U256,
    /// Min balance required to delegate.
    #[serde(default)]
    pub min_delegator_balance: U256,
    /// The timestamp of the first block.
    pub genesis_timestamp: u64,
    /// Genesis validator list.
    #[serde(default)]
    pub validators: Vec<Address>,
    /// Deposit pool address. When set, 90% of each block reward accrues
    /// here and 10% to the coinbase.
    #[serde(default)]
    pub pool: Option<Address>,
    /// Reward rule of mint block, ascending by number.
    #[serde(default)]
    pub rewards: Vec<Reward>,
    #[serde(default)]
    pub election: ElectionMode,
}

impl ChainConfig {
    /// The reward credited for a block at `number`: the entry with the
    /// greatest `number` at or below it, zero when none applies.
    pub fn reward_for(&self, number: u64) -> U256 {
        self.rewards
            .iter()
            .take_while(|reward| reward.number <= number)
            .last()
            .map(|reward| reward.reward)
            .unwrap_or_default()
    }

    /// Sorts the reward schedule; called once when the engine is built so
    /// lookups can rely on ascending order.
    pub fn sort_rewards(&mut self) {
        self.rewards.sort_by_key(|reward| reward.number);
    }

    /// The kick-out threshold: the minimum number of blocks a validator must
    /// have sealed in the previous epoch to keep its candidacy.
    pub fn min_mint(&self) -> u64 {
        self.epoch / self.period / self.max_validators_count / 2
    }

    /// Two thirds of the validator cap plus one; kick-outs never push the
    /// candidate count below this.
    pub fn safe_size(&self) -> usize {
        (self.max_validators_count * 2 / 3 + 1) as usize
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            period: 3,
            epoch: 28800,
            max_validators_count: 21,
            min_candidate_balance: U256::zero(),
            min_delegator_balance: U256::zero(),
            genesis_timestamp: 0,
            validators: Vec::new(),
            pool: None,
            rewards: Vec::new(),
            election: ElectionMode::Shuffle,
        }
    }
}

impl rlp::Encodable for Reward {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(2);
        s.append(&self.number);
        s.append(&self.reward);
    }
}

impl rlp::Decodable for Reward {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        Ok(Self {
            number: rlp.val_at(0)?,
            reward: rlp.val_at(1)?,
        })
    }
}

impl rlp::Encodable for ChainConfig {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(10);
        s.append(&self.period);
        s.append(&self.epoch);
        s.append(&self.max_validators_count);
        s.append(&self.min_candidate_balance);
        s.append(&self.min_delegator_balance);
        s.append(&self.genesis_timestamp);
        s.append_list(&self.validators);
        s.append(&self.pool.unwrap_or_default());
        s.append_list(&self.rewards);
        s.append(&match self.election {
            ElectionMode::Shuffle => 0u8,
            ElectionMode::Votes => 1u8,
        });
    }
}

impl rlp::Decodable for ChainConfig {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        let pool: Address = rlp.val_at(7)?;
        let election: u8 = rlp.val_at(9)?;
        Ok(Self {
            period: rlp.val_at(0)?,
            epoch: rlp.val_at(1)?,
            max_validators_count: rlp.val_at(2)?,
            min_candidate_balance: rlp.val_at(3)?,
            min_delegator_balance: rlp.val_at(4)?,
            genesis_timestamp: rlp.val_at(5)?,
            validators: rlp.list_at(6)?,
            pool: if pool.is_zero() { None } else { Some(pool) },
            rewards: rlp.list_at(8)?,
            election: match election {
                0 => ElectionMode::Shuffle,
                1 => ElectionMode::Votes,
                _ => return Err(DecoderError::Custom("unknown election mode")),
            },
        })
    }
}
