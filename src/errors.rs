use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// A header was sealed by a signer that is not in-turn for its slot.
    #[error("unauthorized")]
    Unauthorized,
    /// The requested block is not part of the local chain, or the operation
    /// does not apply to the genesis block.
    #[error("unknown block")]
    UnknownBlock,
    /// The parent of a header being verified is missing from the chain.
    #[error("unknown ancestor")]
    UnknownAncestor,
    /// The header's timestamp lies in the future.
    #[error("block in the future")]
    FutureBlock,
    #[error("extra-data 32 byte vanity prefix missing")]
    MissingVanity,
    #[error("extra-data 65 byte signature suffix missing")]
    MissingSignature,
    #[error("uncles not allowed")]
    UnclesNotAllowed,
    #[error("non-zero mix digest")]
    InvalidMixDigest,
    #[error("non empty uncle hash")]
    InvalidUncleHash,
    /// The timestamp or epoch bookkeeping of a header is not continuous with
    /// its parent.
    #[error("invalid timestamp")]
    InvalidTimestamp,
    #[error("chain config missing")]
    ChainConfigMissing,
    /// Replaying a block's events over the parent snapshot did not reproduce
    /// the root embedded in its header extra.
    #[error("invalid trie root, coinbase: {coinbase}")]
    InvalidRoot { coinbase: String },
    #[error("trie error: {0}")]
    Trie(String),
    #[error("snapshot error: {0}")]
    Snapshot(String),
    #[error("codec error: {0}")]
    Codec(String),
    #[error("cryptography error: {0}")]
    Crypto(String),
    /// A transaction payload is not a well-formed consensus event. Callers
    /// treat the transaction as ordinary.
    #[error("invalid payload: {0}")]
    Payload(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
