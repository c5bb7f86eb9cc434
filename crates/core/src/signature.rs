//! secp256k1 signatures over prefixed keccak256 digests.
//!
//! Every user-facing signature in the system is 65 bytes (`r || s || v`)
//! over `keccak256(prefix || keccak256(message))`, where `prefix` is the
//! standard signed-message header for a 32-byte payload. Verification is
//! by public-key recovery and address comparison.

use alloy_primitives::{Address, B256};
use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use rollup_smt::Keccak256Hasher;
use thiserror::Error;

const SIGNED_MESSAGE_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n32";

/// Length of the wire signature: 64 bytes of `r || s` plus one recovery
/// byte (`v`, either 0/1 or 27/28).
pub const SIGNATURE_LENGTH: usize = 65;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature must be {SIGNATURE_LENGTH} bytes, got {0}")]
    Length(usize),
    #[error("invalid recovery byte {0}")]
    RecoveryByte(u8),
    #[error("signature does not recover to a public key")]
    Recovery,
    #[error("signing failed")]
    Signing,
}

/// Digest the message the way signers do: keccak the payload, then keccak
/// again under the signed-message prefix.
pub fn prefixed_digest(message: &[u8]) -> B256 {
    let inner = Keccak256Hasher::hash(message);
    let mut preimage = Vec::with_capacity(SIGNED_MESSAGE_PREFIX.len() + 32);
    preimage.extend_from_slice(SIGNED_MESSAGE_PREFIX);
    preimage.extend_from_slice(inner.as_slice());
    Keccak256Hasher::hash(&preimage)
}

/// Recover the signing address of a 65-byte signature over `message`.
pub fn recover_signer(message: &[u8], signature: &[u8]) -> Result<Address, SignatureError> {
    if signature.len() != SIGNATURE_LENGTH {
        return Err(SignatureError::Length(signature.len()));
    }
    let sig =
        EcdsaSignature::from_slice(&signature[..64]).map_err(|_| SignatureError::Recovery)?;
    let v = signature[64];
    let recovery = RecoveryId::from_byte(if v >= 27 { v - 27 } else { v })
        .ok_or(SignatureError::RecoveryByte(v))?;

    let digest = prefixed_digest(message);
    let key = VerifyingKey::recover_from_prehash(digest.as_slice(), &sig, recovery)
        .map_err(|_| SignatureError::Recovery)?;
    Ok(address_of(&key))
}

/// The address of a secp256k1 public key: the low 20 bytes of the keccak
/// hash of its uncompressed SEC1 encoding (sans the 0x04 header).
pub fn address_of(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let hash = Keccak256Hasher::hash(&point.as_bytes()[1..]);
    Address::from_slice(&hash.as_slice()[12..])
}

/// Produce a 65-byte signature over `message` with the prefix flow.
/// Used by sidechain clients and the test suite; the settlement core only
/// ever recovers.
pub fn sign_message(key: &SigningKey, message: &[u8]) -> Result<Vec<u8>, SignatureError> {
    let digest = prefixed_digest(message);
    let (sig, recovery) = key
        .sign_prehash_recoverable(digest.as_slice())
        .map_err(|_| SignatureError::Signing)?;
    let mut out = Vec::with_capacity(SIGNATURE_LENGTH);
    out.extend_from_slice(&sig.to_bytes());
    out.push(recovery.to_byte() + 27);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(tag: u8) -> SigningKey {
        SigningKey::from_slice(&[tag; 32]).unwrap()
    }

    #[test]
    fn sign_then_recover_round_trips() {
        let signer = key(0x42);
        let message = b"settle up";
        let sig = sign_message(&signer, message).unwrap();
        assert_eq!(sig.len(), SIGNATURE_LENGTH);
        assert_eq!(
            recover_signer(message, &sig).unwrap(),
            address_of(signer.verifying_key())
        );
    }

    #[test]
    fn recovery_byte_accepts_both_conventions() {
        let signer = key(0x07);
        let message = b"either works";
        let mut sig = sign_message(&signer, message).unwrap();
        let expected = address_of(signer.verifying_key());
        assert_eq!(recover_signer(message, &sig).unwrap(), expected);
        sig[64] -= 27;
        assert_eq!(recover_signer(message, &sig).unwrap(), expected);
    }

    #[test]
    fn other_message_recovers_a_different_address() {
        let signer = key(0x42);
        let sig = sign_message(&signer, b"message one").unwrap();
        let recovered = recover_signer(b"message two", &sig);
        assert_ne!(recovered, Ok(address_of(signer.verifying_key())));
    }

    #[test]
    fn malformed_signatures_are_rejected() {
        assert_eq!(
            recover_signer(b"m", &[0u8; 10]),
            Err(SignatureError::Length(10))
        );
        let mut sig = sign_message(&key(0x42), b"m").unwrap();
        sig[64] = 9;
        assert_eq!(recover_signer(b"m", &sig), Err(SignatureError::RecoveryByte(9)));
    }
}
