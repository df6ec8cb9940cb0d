use ethereum_types::{H256, H512};
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use sha3::{Digest, Keccak256, Keccak512};

use crate::errors::{EngineError, EngineResult};
use crate::types::Address;

/// Length of a recoverable secp256k1 signature: r ‖ s ‖ v.
pub const SIGNATURE_LENGTH: usize = 65;

pub fn keccak256(data: &[u8]) -> H256 {
    H256::from_slice(&Keccak256::digest(data))
}

pub fn keccak512(data: &[u8]) -> H512 {
    H512::from_slice(&Keccak512::digest(data))
}

/// Derives the Ethereum address of a public key: the last 20 bytes of the
/// Keccak-256 hash of the uncompressed key without its format prefix.
pub fn address_from_public_key(public_key: &PublicKey) -> Address {
    let uncompressed = public_key.serialize_uncompressed();
    let hash = Keccak256::digest(&uncompressed[1..]);
    Address::from_slice(&hash[12..])
}

/// Signs a 32 byte digest, returning the 65 byte recoverable signature.
pub fn sign_digest(digest: H256, secret: &SecretKey) -> EngineResult<[u8; SIGNATURE_LENGTH]> {
    let secp = Secp256k1::new();
    let message = Message::from_slice(digest.as_bytes())
        .map_err(|err| EngineError::Crypto(format!("invalid digest: {err}")))?;
    let (recovery_id, compact) = secp
        .sign_ecdsa_recoverable(&message, secret)
        .serialize_compact();
    let mut signature = [0u8; SIGNATURE_LENGTH];
    signature[..64].copy_from_slice(&compact);
    signature[64] = recovery_id.to_i32() as u8;
    Ok(signature)
}

/// Recovers the signer address of a 65 byte signature over a digest.
pub fn recover_signer(digest: H256, signature: &[u8]) -> EngineResult<Address> {
    if signature.len() != SIGNATURE_LENGTH {
        return Err(EngineError::Crypto(format!(
            "invalid signature length: {}",
            signature.len()
        )));
    }
    let recovery_id = RecoveryId::from_i32(signature[64] as i32)
        .map_err(|err| EngineError::Crypto(format!("invalid recovery id: {err}")))?;
    let recoverable = RecoverableSignature::from_compact(&signature[..64], recovery_id)
        .map_err(|err| EngineError::Crypto(format!("invalid signature: {err}")))?;
    let message = Message::from_slice(digest.as_bytes())
        .map_err(|err| EngineError::Crypto(format!("invalid digest: {err}")))?;
    let public_key = Secp256k1::new()
        .recover_ecdsa(&message, &recoverable)
        .map_err(|err| EngineError::Crypto(format!("signature recovery failed: {err}")))?;
    Ok(address_from_public_key(&public_key))
}

pub fn secret_key_from_hex(data: &str) -> EngineResult<SecretKey> {
    let bytes = hex::decode(data.trim_start_matches("0x"))
        .map_err(|err| EngineError::Crypto(format!("invalid secret key encoding: {err}")))?;
    SecretKey::from_slice(&bytes)
        .map_err(|err| EngineError::Crypto(format!("invalid secret key bytes: {err}")))
}

pub fn public_key_of(secret: &SecretKey) -> PublicKey {
    PublicKey::from_secret_key(&Secp256k1::new(), secret)
}
