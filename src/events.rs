use ethereum_types::{H256, U256};
use rlp::{DecoderError, Rlp, RlpStream};
use serde::{Deserialize, Serialize};

use crate::config::{ChainConfig, Reward};
use crate::errors::{EngineError, EngineResult};
use crate::types::{Address, Transaction};

/// Payload prefixes recognised by the decoder.
const PREFIXES: [&str; 2] = ["senate", "equality"];
const VERSION: &str = "1";
const EVENT_KIND: &str = "event";

/// A consensus event decoded from the text payload of an ordinary value
/// transfer. Payload grammar: `<prefix>:1:event:<action>[:args]`, where the
/// final segment keeps any further colons.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConsensusEvent {
    /// `candidate` — the sender registers as candidate.
    BecomeCandidate { candidate: Address },
    /// `candidateQuit` — the sender cancels its candidacy.
    CancelCandidate { candidate: Address },
    /// `delegate` — the sender re-points its vote at the recipient.
    Delegate { delegator: Address, candidate: Address },
    /// `proposal:key:value` — a governance proposal.
    Proposal(Proposal),
    /// `declare:proposalHash:yes|no` — a validator's vote on a proposal.
    Declare(Declare),
}

impl ConsensusEvent {
    /// Decodes the payload of a transaction. Transactions whose payload is
    /// not a well-formed consensus event yield an error and are treated as
    /// ordinary transfers by the caller.
    pub fn decode(tx: &Transaction) -> EngineResult<Self> {
        let text = std::str::from_utf8(&tx.data)
            .map_err(|_| EngineError::Payload("payload is not utf-8".into()))?;
        let slice: Vec<&str> = text.split(':').collect();
        if slice.len() < 4 {
            return Err(EngineError::Payload("invalid custom transaction data".into()));
        }

        let (prefix, version, kind, action) = (slice[0], slice[1], slice[2], slice[3]);
        if !PREFIXES.contains(&prefix) {
            return Err(EngineError::Payload("invalid custom transaction prefix".into()));
        }
        if version != VERSION {
            return Err(EngineError::Payload(
                "invalid custom transaction version".into(),
            ));
        }
        if kind != EVENT_KIND {
            return Err(EngineError::Payload(
                "undefined custom transaction type".into(),
            ));
        }
        let args = if slice.len() > 4 {
            slice[4..].join(":")
        } else {
            String::new()
        };

        match action {
            "candidate" => Ok(Self::BecomeCandidate { candidate: tx.from }),
            "candidateQuit" => Ok(Self::CancelCandidate { candidate: tx.from }),
            "delegate" => {
                let candidate = tx
                    .to
                    .ok_or_else(|| EngineError::Payload("missing candidate".into()))?;
                Ok(Self::Delegate {
                    delegator: tx.from,
                    candidate,
                })
            }
            "proposal" => Proposal::decode(tx, &args).map(Self::Proposal),
            "declare" => Declare::decode(tx, &args).map(Self::Declare),
            _ => Err(EngineError::Payload(
                "undefined custom transaction action".into(),
            )),
        }
    }
}

/// Proposal to modify the chain configuration. Stored JSON-encoded in the
/// proposal table keyed by the hash of the proposing transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub key: String,
    pub value: String,
    pub hash: H256,
    pub proposer: Address,
    #[serde(default)]
    pub approved_hash: Option<H256>,
}

impl Proposal {
    fn decode(tx: &Transaction, args: &str) -> EngineResult<Self> {
        let (key, value) = args
            .split_once(':')
            .ok_or_else(|| EngineError::Payload("invalid proposal".into()))?;

        let proposal = Self {
            key: key.to_string(),
            value: value.to_string(),
            hash: tx.hash,
            proposer: tx.from,
            approved_hash: None,
        };
        // Reject proposals whose value would not apply cleanly.
        proposal.apply_to(&mut ChainConfig::default())?;
        Ok(proposal)
    }

    /// Folds the proposal into a chain configuration, validating ranges and
    /// formats per parameter.
    pub fn apply_to(&self, config: &mut ChainConfig) -> EngineResult<()> {
        if self.key.is_empty() || self.value.is_empty() {
            return Err(EngineError::Payload("invalid proposal".into()));
        }

        match self.key.as_str() {
            "period" => {
                config.period = parse_positive_u64(&self.value, "period")?;
            }
            "epoch" => {
                config.epoch = parse_positive_u64(&self.value, "epoch")?;
            }
            "maxValidatorsCount" => {
                config.max_validators_count =
                    parse_positive_u64(&self.value, "maxValidatorsCount")?;
            }
            "minDelegatorBalance" => {
                config.min_delegator_balance = parse_hex_u256(&self.value, "minDelegatorBalance")?;
            }
            "minCandidateBalance" => {
                config.min_candidate_balance = parse_hex_u256(&self.value, "minCandidateBalance")?;
            }
            "rewards" => {
                let mut rewards = Vec::new();
                let mut last_height = U256::zero();
                for pair in self.value.split(',') {
                    let (height, reward) = pair
                        .split_once(':')
                        .ok_or_else(|| EngineError::Payload("invalid value: rewards".into()))?;
                    let height = parse_hex_u256(height, "rewards")?;
                    if height.is_zero() || (!rewards.is_empty() && height <= last_height) {
                        return Err(EngineError::Payload("invalid value: rewards".into()));
                    }
                    let reward = parse_hex_u256(reward, "rewards")?;
                    last_height = height;
                    rewards.push(Reward {
                        number: height.low_u64(),
                        reward,
                    });
                }
                config.rewards = rewards;
            }
            key => {
                return Err(EngineError::Payload(format!("unknown key: {key}")));
            }
        }
        Ok(())
    }
}

impl rlp::Encodable for Proposal {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(6);
        s.append(&self.key);
        s.append(&self.value);
        s.append(&self.hash);
        s.append(&self.proposer);
        s.append(&self.approved_hash.is_some());
        s.append(&self.approved_hash.unwrap_or_default());
    }
}

impl rlp::Decodable for Proposal {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        let approved: bool = rlp.val_at(4)?;
        let approved_hash: H256 = rlp.val_at(5)?;
        Ok(Self {
            key: rlp.val_at(0)?,
            value: rlp.val_at(1)?,
            hash: rlp.val_at(2)?,
            proposer: rlp.val_at(3)?,
            approved_hash: approved.then_some(approved_hash),
        })
    }
}

/// A validator's yes/no on a proposal, keyed in the declare table by
/// proposal hash, epoch and declarer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declare {
    pub hash: H256,
    pub proposal_hash: H256,
    pub declarer: Address,
    pub decision: bool,
}

impl Declare {
    fn decode(tx: &Transaction, args: &str) -> EngineResult<Self> {
        let (hash, decision) = args
            .split_once(':')
            .ok_or_else(|| EngineError::Payload("invalid declare".into()))?;
        Ok(Self {
            hash: tx.hash,
            proposal_hash: parse_hash(hash)?,
            declarer: tx.from,
            decision: decision == "yes",
        })
    }
}

impl rlp::Encodable for Declare {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(4);
        s.append(&self.hash);
        s.append(&self.proposal_hash);
        s.append(&self.declarer);
        s.append(&self.decision);
    }
}

impl rlp::Decodable for Declare {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        Ok(Self {
            hash: rlp.val_at(0)?,
            proposal_hash: rlp.val_at(1)?,
            declarer: rlp.val_at(2)?,
            decision: rlp.val_at(3)?,
        })
    }
}

fn parse_positive_u64(value: &str, key: &str) -> EngineResult<u64> {
    match value.parse::<u64>() {
        Ok(parsed) if parsed > 0 => Ok(parsed),
        _ => Err(EngineError::Payload(format!("invalid value: {key}"))),
    }
}

fn parse_hex_u256(value: &str, key: &str) -> EngineResult<U256> {
    if value.len() <= 2 || !value[..2].eq_ignore_ascii_case("0x") {
        return Err(EngineError::Payload(format!("invalid value: {key}")));
    }
    U256::from_str_radix(&value[2..], 16)
        .map_err(|_| EngineError::Payload(format!("invalid value: {key}")))
}

fn parse_hash(value: &str) -> EngineResult<H256> {
    let stripped = value.strip_prefix("0x").unwrap_or(value);
    let bytes = hex::decode(stripped)
        .map_err(|_| EngineError::Payload("invalid hash".into()))?;
    if bytes.len() != 32 {
        return Err(EngineError::Payload("invalid hash".into()));
    }
    Ok(H256::from_slice(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(data: &str, to: Option<Address>) -> Transaction {
        Transaction::new(
            crate::crypto::keccak256(data.as_bytes()),
            Address::repeat_byte(0xaa),
            to,
            data.as_bytes().to_vec(),
        )
    }

    #[test]
    fn decodes_candidate_actions() {
        let event = ConsensusEvent::decode(&tx("equality:1:event:candidate", None)).unwrap();
        assert_eq!(
            event,
            ConsensusEvent::BecomeCandidate {
                candidate: Address::repeat_byte(0xaa)
            }
        );

        let event = ConsensusEvent::decode(&tx("equality:1:event:candidateQuit", None)).unwrap();
        assert_eq!(
            event,
            ConsensusEvent::CancelCandidate {
                candidate: Address::repeat_byte(0xaa)
            }
        );
    }

    #[test]
    fn decodes_delegate_with_recipient() {
        let candidate = Address::repeat_byte(0xbb);
        let event =
            ConsensusEvent::decode(&tx("senate:1:event:delegate", Some(candidate))).unwrap();
        assert_eq!(
            event,
            ConsensusEvent::Delegate {
                delegator: Address::repeat_byte(0xaa),
                candidate,
            }
        );
        assert!(ConsensusEvent::decode(&tx("senate:1:event:delegate", None)).is_err());
    }

    #[test]
    fn decodes_proposals() {
        let payloads = [
            "senate:1:event:proposal:period:8",
            "senate:1:event:proposal:epoch:86400",
            "senate:1:event:proposal:maxValidatorsCount:21",
            "senate:1:event:proposal:minDelegatorBalance:0xde0b6b3a7640000",
            "senate:1:event:proposal:minCandidateBalance:0x56bc75e2d63100000",
            "senate:1:event:proposal:rewards:0x69e10de76676d0800000:0x4563918244f40000,0x13da329b6336471800000:0x1bc16d674ec80000,0x422ca8b0a00a425000000:0xde0b6b3a7640000",
        ];
        for payload in payloads {
            let event = ConsensusEvent::decode(&tx(payload, None)).unwrap();
            assert!(matches!(event, ConsensusEvent::Proposal(_)), "{payload}");
        }
    }

    #[test]
    fn decodes_declare() {
        let proposal_hash = crate::crypto::keccak256(b"proposal");
        let payload = format!("senate:1:event:declare:{proposal_hash:?}:yes");
        let event = ConsensusEvent::decode(&tx(&payload, None)).unwrap();
        match event {
            ConsensusEvent::Declare(declare) => {
                assert_eq!(declare.proposal_hash, proposal_hash);
                assert!(declare.decision);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn rejects_malformed_payloads() {
        let bad = [
            "equality:1:event",
            "other:1:event:candidate",
            "equality:2:event:candidate",
            "equality:1:vote:candidate",
            "equality:1:event:unknown",
            "senate:1:event:proposal:period:0",
            "senate:1:event:proposal:period:abc",
            "senate:1:event:proposal:minCandidateBalance:1000",
            "senate:1:event:proposal:unknown:1",
            "senate:1:event:proposal:rewards:0x2:0x1,0x1:0x1",
            "senate:1:event:declare:nothex:yes",
        ];
        for payload in bad {
            assert!(ConsensusEvent::decode(&tx(payload, None)).is_err(), "{payload}");
        }
    }

    #[test]
    fn proposal_applies_to_config() {
        let event = ConsensusEvent::decode(&tx(
            "senate:1:event:proposal:rewards:0x64:0x4563918244f40000,0xc8:0x1bc16d674ec80000",
            None,
        ))
        .unwrap();
        let proposal = match event {
            ConsensusEvent::Proposal(proposal) => proposal,
            other => panic!("unexpected event: {other:?}"),
        };

        let mut config = ChainConfig::default();
        proposal.apply_to(&mut config).unwrap();
        assert_eq!(config.rewards.len(), 2);
        assert_eq!(config.rewards[0].number, 100);
        assert_eq!(config.rewards[1].number, 200);
    }
}
