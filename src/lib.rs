//! Delegated-proof-of-stake consensus engine with trie-backed snapshots.
//!
//! Every block header embeds a gzip-compressed RLP payload carrying the
//! Merkle roots of the consensus state (validators, candidates, delegations,
//! mint log, chain parameters and governance records) plus the per-block
//! event lists. Producers fold transactions and the epoch election into a
//! [`snapshot::Snapshot`] and commit its root into the header; verifiers
//! replay the declared events over the parent snapshot and require the
//! recomputed root to match byte for byte.
//!
//! The [`engine::Equality`] type implements the chain lifecycle hooks
//! (prepare, verify, finalize, seal); [`api::Api`] exposes the read-only
//! queries a node's RPC layer wraps. Storage is abstracted behind
//! [`trie::TrieDb`], and the world state behind [`interfaces::StateDb`].

pub mod api;
pub mod config;
pub mod crypto;
pub mod engine;
pub mod errors;
pub mod events;
pub mod header_extra;
pub mod interfaces;
pub mod snapshot;
pub mod trie;
pub mod types;

pub use api::{Api, AddressStatus};
pub use config::{ChainConfig, ElectionMode, Reward};
pub use engine::{Equality, SignerFn, DEFAULT_DIFFICULTY, MIMETYPE_CLIQUE};
pub use errors::{EngineError, EngineResult};
pub use events::{ConsensusEvent, Declare, Proposal};
pub use header_extra::{HeaderExtra, Root, EXTRA_SEAL, EXTRA_VANITY};
pub use interfaces::{HeaderReader, MemoryChain, MemoryState, StateDb};
pub use snapshot::Snapshot;
pub use trie::{PrefixedTrie, Trie, TrieDb};
pub use types::{Address, Block, Candidate, Delegate, Hash, Header, SortableAddress, Transaction};
