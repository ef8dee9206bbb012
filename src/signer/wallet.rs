/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Validator accounts and the signing handle built from them.
//!
//! An [`Account`] holds a validator's two secret keys:
//! 1. A secp256k1 ECDSA key, which identifies the validator by [`Address`] and signs consensus
//!    messages with address-recoverable signatures.
//! 2. A BLS key, which signs under a [`Domain`] and whose signatures can be aggregated.
//!
//! Accounts are obtained from a [`KeyProvider`], and wrapped in a [`Key`] that is passed explicitly to
//! whatever needs to sign. Nothing in this crate caches keys at process scope.

use rand_core::OsRng;

use crate::networking::messages::{ConsensusMessage, Payload};
use crate::types::{
    crypto_primitives::{
        keccak256, public_key_to_address, EcdsaSignature, EcdsaSigningKey, EcdsaVerifyingKey,
        RecoveryId,
    },
    data_types::{Address, CryptoHash, VotingPower},
    validator_set::ValidatorMetadata,
};

use super::bls::{BlsPublicKey, BlsSecretKey, BlsSignature, Domain, DOMAIN_CHECKPOINT_MANAGER};

/// Length of an address-recoverable ECDSA signature: `r || s || v`.
pub const ECDSA_SIGNATURE_LEN: usize = 65;

/// A validator's secret keys.
#[derive(Clone)]
pub struct Account {
    ecdsa: EcdsaSigningKey,
    bls: BlsSecretKey,
}

impl Account {
    /// Generate an account with fresh keys from the operating system's random number generator.
    pub fn generate() -> Account {
        Account {
            ecdsa: EcdsaSigningKey::random(&mut OsRng),
            bls: BlsSecretKey::generate(),
        }
    }

    /// Build an account from the raw bytes of its ECDSA and BLS secret keys.
    pub fn from_bytes(ecdsa: &[u8; 32], bls: &[u8; 32]) -> Result<Account, KeyProviderError> {
        let ecdsa =
            EcdsaSigningKey::from_slice(ecdsa).map_err(|_| KeyProviderError::InvalidEcdsaKey)?;
        let bls = BlsSecretKey::from_bytes(bls).map_err(|_| KeyProviderError::InvalidBlsKey)?;
        Ok(Account { ecdsa, bls })
    }

    /// Get the raw bytes of the ECDSA and BLS secret keys, in that order.
    pub fn to_bytes(&self) -> ([u8; 32], [u8; 32]) {
        (self.ecdsa.to_bytes().into(), self.bls.to_bytes())
    }

    pub fn address(&self) -> Address {
        public_key_to_address(self.ecdsa.verifying_key())
    }

    pub fn bls_public_key(&self) -> BlsPublicKey {
        self.bls.public_key()
    }

    /// Describe this account as a validator with `voting_power`.
    pub fn validator_metadata(&self, voting_power: VotingPower) -> ValidatorMetadata {
        ValidatorMetadata {
            address: self.address(),
            bls_key: self.bls_public_key().to_bytes(),
            voting_power,
        }
    }
}

/// Source of a validator's secret keys, e.g., local key files or an external secrets manager.
pub trait KeyProvider: Send {
    fn fetch_account(&self) -> Result<Account, KeyProviderError>;
}

/// A [`KeyProvider`] that holds raw key bytes in memory.
#[derive(Clone)]
pub struct LocalKeyProvider {
    ecdsa_key: [u8; 32],
    bls_key: [u8; 32],
}

impl LocalKeyProvider {
    pub fn new(ecdsa_key: [u8; 32], bls_key: [u8; 32]) -> Self {
        Self { ecdsa_key, bls_key }
    }
}

impl From<&Account> for LocalKeyProvider {
    fn from(account: &Account) -> Self {
        let (ecdsa_key, bls_key) = account.to_bytes();
        Self::new(ecdsa_key, bls_key)
    }
}

impl KeyProvider for LocalKeyProvider {
    fn fetch_account(&self) -> Result<Account, KeyProviderError> {
        Account::from_bytes(&self.ecdsa_key, &self.bls_key)
    }
}

/// Signing handle of a single validator.
#[derive(Clone)]
pub struct Key {
    account: Account,
    address: Address,
}

impl Key {
    pub fn new(account: Account) -> Key {
        let address = account.address();
        Key { account, address }
    }

    /// Fetch an account from `provider` and wrap it.
    pub fn from_provider(provider: &impl KeyProvider) -> Result<Key, KeyProviderError> {
        provider.fetch_account().map(Key::new)
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    /// Sign the Keccak256 hash of `payload` with the ECDSA key, producing a 65-byte `r || s || v`
    /// signature from which the signer's address can be [recovered](recover_address).
    pub fn sign(&self, payload: &[u8]) -> Result<Vec<u8>, SignerError> {
        let (signature, recovery_id) = self
            .account
            .ecdsa
            .sign_prehash_recoverable(&keccak256(payload))
            .map_err(|_| SignerError::SigningFailed)?;

        let mut bytes = Vec::with_capacity(ECDSA_SIGNATURE_LEN);
        bytes.extend_from_slice(&signature.to_bytes());
        bytes.push(recovery_id.to_byte());
        Ok(bytes)
    }

    /// Sign `message` with the BLS key under `domain`.
    pub fn sign_with_domain(&self, message: &[u8], domain: Domain) -> BlsSignature {
        self.account.bls.sign(message, domain)
    }

    /// Produce the committed seal for a proposal: a BLS signature over its hash under the
    /// checkpoint manager domain.
    pub fn sign_committed_seal(&self, proposal_hash: &CryptoHash) -> BlsSignature {
        self.sign_with_domain(&proposal_hash.bytes(), DOMAIN_CHECKPOINT_MANAGER)
    }

    /// Set `message.from` to this key's address, then sign the message's payload without signature.
    pub fn sign_consensus_message<P: Payload>(
        &self,
        mut message: ConsensusMessage<P>,
    ) -> Result<ConsensusMessage<P>, SignerError> {
        message.from = self.address;
        let payload = message
            .payload_no_sig()
            .map_err(|_| SignerError::EncodingFailed)?;
        message.signature = self.sign(&payload)?;
        Ok(message)
    }
}

/// Recover the address of the key that produced `signature` over `payload`.
pub fn recover_address(signature: &[u8], payload: &[u8]) -> Result<Address, SignerError> {
    if signature.len() != ECDSA_SIGNATURE_LEN {
        return Err(SignerError::InvalidSignatureLength(signature.len()));
    }

    let recovery_id =
        RecoveryId::from_byte(signature[64]).ok_or(SignerError::MalformedSignature)?;
    let signature =
        EcdsaSignature::from_slice(&signature[..64]).map_err(|_| SignerError::MalformedSignature)?;

    let public_key =
        EcdsaVerifyingKey::recover_from_prehash(&keccak256(payload), &signature, recovery_id)
            .map_err(|_| SignerError::RecoveryFailed)?;

    Ok(public_key_to_address(&public_key))
}

/// Recover the address that signed `message`, over its payload without signature.
pub fn recover_message_signer<P: Payload>(
    message: &ConsensusMessage<P>,
) -> Result<Address, SignerError> {
    let payload = message
        .payload_no_sig()
        .map_err(|_| SignerError::EncodingFailed)?;
    recover_address(&message.signature, &payload)
}

/// Errors from signing, or from recovering a signer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignerError {
    /// The message could not be encoded into its payload without signature.
    EncodingFailed,

    /// The ECDSA signer failed.
    SigningFailed,

    /// The signature is not 65 bytes long.
    InvalidSignatureLength(usize),

    /// The signature's `r`, `s` or `v` components are invalid.
    MalformedSignature,

    /// No public key could be recovered from the signature.
    RecoveryFailed,
}

/// Errors from obtaining a validator's secret keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyProviderError {
    /// The provider holds no key for this validator.
    NotFound,

    /// The ECDSA secret key bytes are not a valid secp256k1 scalar.
    InvalidEcdsaKey,

    /// The BLS secret key bytes are not a valid BLS12-381 scalar.
    InvalidBlsKey,
}
