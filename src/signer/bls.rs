/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! BLS signatures over the BLS12-381 curve.
//!
//! Public keys live in G1 (48 bytes compressed) and signatures in G2 (96 bytes compressed). A message
//! is signed under a [`Domain`], which is used as the domain separation tag of the hash-to-curve
//! function. Because the tag changes the point that a message hashes to, a signature produced under
//! one domain never verifies under another.
//!
//! Signatures over the same message and domain can be added up into one aggregated signature, which
//! verifies against the sum of the signers' public keys.

use bls12_381::{
    hash_to_curve::{ExpandMsgXmd, HashToCurve},
    pairing, G1Affine, G1Projective, G2Affine, G2Projective, Scalar,
};
use borsh::{BorshDeserialize, BorshSerialize};
use rand_core::{OsRng, RngCore};
use sha2_v09::Sha256 as XmdSha256;

/// Length of a compressed BLS public key.
pub const PUBLIC_KEY_LEN: usize = 48;

/// Length of a compressed BLS signature.
pub const SIGNATURE_LEN: usize = 96;

/// Purpose tag mixed into every BLS signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Domain(&'static str);

impl Domain {
    pub const fn new(tag: &'static str) -> Self {
        Self(tag)
    }

    pub fn as_bytes(&self) -> &'static [u8] {
        self.0.as_bytes()
    }
}

/// Domain of checkpoint commitments submitted to the root chain's checkpoint manager, and of the
/// committed seals that finalize blocks.
pub const DOMAIN_CHECKPOINT_MANAGER: Domain = Domain::new("DOMAIN_CHECKPOINT_MANAGER");

/// Domain of validator registrations on the root chain.
pub const DOMAIN_VALIDATOR_SET: Domain = Domain::new("DOMAIN_CHILD_VALIDATOR_SET");

/// Domain of bridge (state sync) commitments.
pub const DOMAIN_STATE_RECEIVER: Domain = Domain::new("DOMAIN_STATE_RECEIVER");

/// Errors from parsing BLS key material or signatures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlsError {
    /// The bytes are not a valid, non-identity, compressed G1 point.
    InvalidPublicKey,

    /// The bytes are not a valid compressed G2 point, or have the wrong length.
    InvalidSignature,

    /// The bytes are not a canonical, non-zero scalar.
    InvalidSecretKey,
}

fn hash_to_g2(message: &[u8], domain: Domain) -> G2Projective {
    <G2Projective as HashToCurve<ExpandMsgXmd<XmdSha256>>>::hash_to_curve(message, domain.as_bytes())
}

/// BLS secret key.
#[derive(Clone)]
pub struct BlsSecretKey(Scalar);

impl BlsSecretKey {
    /// Generate a fresh secret key from the operating system's random number generator.
    pub fn generate() -> BlsSecretKey {
        loop {
            let mut wide = [0u8; 64];
            OsRng.fill_bytes(&mut wide);
            let scalar = Scalar::from_bytes_wide(&wide);
            if scalar != Scalar::zero() {
                return BlsSecretKey(scalar);
            }
        }
    }

    /// Parse a secret key from its 32-byte little-endian canonical representation.
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<BlsSecretKey, BlsError> {
        let scalar: Option<Scalar> = Scalar::from_bytes(bytes).into();
        match scalar {
            Some(scalar) if scalar != Scalar::zero() => Ok(BlsSecretKey(scalar)),
            _ => Err(BlsError::InvalidSecretKey),
        }
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    pub fn public_key(&self) -> BlsPublicKey {
        BlsPublicKey(G1Affine::from(G1Projective::generator() * self.0))
    }

    /// Sign `message` under `domain`.
    pub fn sign(&self, message: &[u8], domain: Domain) -> BlsSignature {
        BlsSignature(G2Affine::from(hash_to_g2(message, domain) * self.0))
    }
}

/// BLS public key: a point in G1.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlsPublicKey(G1Affine);

impl BlsPublicKey {
    /// Parse a compressed public key, rejecting the identity point.
    pub fn from_bytes(bytes: &[u8; PUBLIC_KEY_LEN]) -> Result<BlsPublicKey, BlsError> {
        let point: Option<G1Affine> = G1Affine::from_compressed(bytes).into();
        match point {
            Some(point) if !bool::from(point.is_identity()) => Ok(BlsPublicKey(point)),
            _ => Err(BlsError::InvalidPublicKey),
        }
    }

    pub fn to_bytes(&self) -> BlsPublicKeyBytes {
        BlsPublicKeyBytes(self.0.to_compressed())
    }

    /// Sum `public_keys` into the key that verifies their aggregated signature. Returns `None` if
    /// `public_keys` is empty.
    pub fn aggregate<'a>(public_keys: impl IntoIterator<Item = &'a BlsPublicKey>) -> Option<BlsPublicKey> {
        let mut iter = public_keys.into_iter().peekable();
        iter.peek()?;
        let sum = iter.fold(G1Projective::identity(), |acc, pk| acc + G1Projective::from(pk.0));
        Some(BlsPublicKey(G1Affine::from(sum)))
    }
}

/// Compressed representation of a [`BlsPublicKey`], as it is stored in validator metadata and sent
/// over the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, BorshSerialize, BorshDeserialize)]
pub struct BlsPublicKeyBytes([u8; PUBLIC_KEY_LEN]);

impl BlsPublicKeyBytes {
    pub const fn new(bytes: [u8; PUBLIC_KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub const fn bytes(&self) -> [u8; PUBLIC_KEY_LEN] {
        self.0
    }

    /// Parse these bytes into a usable [`BlsPublicKey`].
    pub fn public_key(&self) -> Result<BlsPublicKey, BlsError> {
        BlsPublicKey::from_bytes(&self.0)
    }
}

/// BLS signature: a point in G2.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlsSignature(G2Affine);

impl BlsSignature {
    /// Parse a compressed signature.
    pub fn from_bytes(bytes: &[u8]) -> Result<BlsSignature, BlsError> {
        let bytes: &[u8; SIGNATURE_LEN] = bytes.try_into().map_err(|_| BlsError::InvalidSignature)?;
        let point: Option<G2Affine> = G2Affine::from_compressed(bytes).into();
        point.map(BlsSignature).ok_or(BlsError::InvalidSignature)
    }

    pub fn to_bytes(&self) -> [u8; SIGNATURE_LEN] {
        self.0.to_compressed()
    }

    /// Check that this is a signature by `public_key` over `message` under `domain`, i.e., that
    /// `e(pk, H(m)) == e(g1, sig)`.
    pub fn verify(&self, public_key: &BlsPublicKey, message: &[u8], domain: Domain) -> bool {
        let hashed = G2Affine::from(hash_to_g2(message, domain));
        pairing(&public_key.0, &hashed) == pairing(&G1Affine::generator(), &self.0)
    }

    /// Sum `signatures` into one aggregated signature. Returns `None` if `signatures` is empty.
    pub fn aggregate<'a>(signatures: impl IntoIterator<Item = &'a BlsSignature>) -> Option<BlsSignature> {
        let mut iter = signatures.into_iter().peekable();
        iter.peek()?;
        let sum = iter.fold(G2Projective::identity(), |acc, sig| acc + G2Projective::from(sig.0));
        Some(BlsSignature(G2Affine::from(sum)))
    }
}
