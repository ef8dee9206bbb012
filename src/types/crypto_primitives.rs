/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Cryptographic primitives.
//!
//! The definitions and re-exports in this module provide four categories of cryptographic primitives:
//! 1. **Cryptographic Hashes**: SHA256 (provided by the [`sha2`] crate) for header, checkpoint and
//!    consensus message digests, and Keccak256 (provided by the [`sha3`] crate) for address derivation.
//! 2. **Address-recoverable signatures**: secp256k1 ECDSA, provided by the [`k256`] crate.
//! 3. **Aggregatable signatures**: BLS over BLS12-381, provided by the [`bls12_381`] crate and wrapped
//!    in [`crate::signer::bls`].
//! 4. **Peer identities**: Ed25519 verifying keys, provided by the [`ed25519_dalek`] crate, identify
//!    peers on the gossip network.

use super::data_types::{Address, CryptoHash};

// re-exports below.
pub use sha2::Digest;
pub use sha2::Sha256 as CryptoHasher;
pub use sha3::Keccak256;

pub use k256::ecdsa::{
    RecoveryId, Signature as EcdsaSignature, SigningKey as EcdsaSigningKey,
    VerifyingKey as EcdsaVerifyingKey,
};

pub use ed25519_dalek::{SigningKey as PeerSigningKey, VerifyingKey as PeerId};

/// Compute the SHA256 hash of `bytes`.
pub fn sha256(bytes: &[u8]) -> CryptoHash {
    let mut hasher = CryptoHasher::new();
    hasher.update(bytes);
    CryptoHash::new(hasher.finalize().into())
}

/// Compute the Keccak256 hash of `bytes`.
pub fn keccak256(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

/// Derive the [`Address`] of a secp256k1 public key: the last 20 bytes of the Keccak256 hash of the
/// 64-byte uncompressed public key.
pub fn public_key_to_address(public_key: &EcdsaVerifyingKey) -> Address {
    let encoded = public_key.to_encoded_point(false);

    // Skip the 0x04 SEC1 tag.
    let digest = keccak256(&encoded.as_bytes()[1..]);
    let mut address = [0u8; 20];
    address.copy_from_slice(&digest[12..]);
    Address::new(address)
}
