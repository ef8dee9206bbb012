/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Aggregated BLS signatures with a bitmap of contributing validators.
//!
//! ## Strict verification
//!
//! [`AggregatedSignature::verify`] rebuilds the aggregated public key from exactly the validators
//! flagged in the bitmap. A flagged position that is not in the validator set, or whose BLS key does
//! not parse, fails verification. This is unlike
//! [`ValidatorSet::has_quorum`](crate::types::validator_set::ValidatorSet::has_quorum), which
//! ignores unknown signers when summing voting power.

use borsh::{BorshDeserialize, BorshSerialize};

use crate::types::{
    bitmap::Bitmap,
    data_types::{Address, BlockHeight},
    validator_set::ValidatorSet,
};

use super::bls::{BlsPublicKey, BlsSignature, Domain};

/// A BLS signature aggregated from the partial signatures of the validators flagged in `bitmap`.
///
/// The default (empty) `AggregatedSignature` has no signature bytes and no signers.
#[derive(Clone, Debug, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct AggregatedSignature {
    pub signature: Vec<u8>,
    pub bitmap: Bitmap,
}

impl AggregatedSignature {
    /// Combine `partials` into an aggregated signature. `bitmap` flags the positions of the
    /// contributing validators, and must flag exactly as many positions as there are partials.
    pub fn aggregate(
        partials: &[BlsSignature],
        bitmap: Bitmap,
    ) -> Result<AggregatedSignature, AggregationError> {
        if partials.len() != bitmap.count_ones() {
            return Err(AggregationError::SignerCountMismatch {
                signatures: partials.len(),
                signers: bitmap.count_ones(),
            });
        }

        let signature = BlsSignature::aggregate(partials).ok_or(AggregationError::NoSignatures)?;
        Ok(AggregatedSignature {
            signature: signature.to_bytes().to_vec(),
            bitmap,
        })
    }

    /// Combine `seals`, each a partial signature tagged with the address of its signer, into an
    /// aggregated signature whose bitmap is built from the signers' positions in `validator_set`.
    pub fn from_seals(
        validator_set: &ValidatorSet,
        seals: &[(Address, BlsSignature)],
    ) -> Result<AggregatedSignature, AggregationError> {
        let mut bitmap = Bitmap::new();
        for (signer, _) in seals {
            let index = validator_set
                .index_of(signer)
                .ok_or(AggregationError::UnknownSigner(*signer))?;
            if bitmap.is_set(index) {
                return Err(AggregationError::DuplicateSigner(*signer));
            }
            bitmap.set(index);
        }

        let partials: Vec<BlsSignature> = seals.iter().map(|(_, seal)| *seal).collect();
        Self::aggregate(&partials, bitmap)
    }

    /// Check whether this aggregated signature has no signers.
    pub fn is_empty(&self) -> bool {
        self.bitmap.is_empty()
    }

    /// Get the addresses of the validators flagged in the bitmap.
    pub fn signers(&self, validator_set: &ValidatorSet) -> Result<Vec<Address>, AggregationError> {
        validator_set
            .filter_by_bitmap(&self.bitmap)
            .map(|validators| validators.into_iter().map(|v| v.address).collect())
            .map_err(|_| AggregationError::BitmapOutOfRange)
    }

    /// Check that this is an aggregated signature over `message` under `domain` by exactly the
    /// validators of `validator_set` flagged in the bitmap.
    pub fn verify(&self, validator_set: &ValidatorSet, message: &[u8], domain: Domain) -> bool {
        match self.try_verify(validator_set, message, domain) {
            Ok(()) => true,
            Err(err) => {
                log::debug!("Aggregated signature rejected: {:?}", err);
                false
            }
        }
    }

    /// Check that this aggregated signature [verifies](Self::verify) and that its signers hold a
    /// quorum of voting power at `height`.
    pub fn verify_quorum(
        &self,
        height: BlockHeight,
        validator_set: &ValidatorSet,
        message: &[u8],
        domain: Domain,
    ) -> bool {
        if !self.verify(validator_set, message, domain) {
            return false;
        }
        match self.signers(validator_set) {
            Ok(signers) => validator_set.has_quorum(height, &signers),
            Err(_) => false,
        }
    }

    fn try_verify(
        &self,
        validator_set: &ValidatorSet,
        message: &[u8],
        domain: Domain,
    ) -> Result<(), AggregationError> {
        let signers = validator_set
            .filter_by_bitmap(&self.bitmap)
            .map_err(|_| AggregationError::BitmapOutOfRange)?;
        if signers.is_empty() {
            return Err(AggregationError::NoSignatures);
        }

        let public_keys = signers
            .iter()
            .map(|signer| {
                signer
                    .bls_key
                    .public_key()
                    .map_err(|_| AggregationError::InvalidPublicKey(signer.address))
            })
            .collect::<Result<Vec<BlsPublicKey>, AggregationError>>()?;
        let aggregated_key =
            BlsPublicKey::aggregate(&public_keys).ok_or(AggregationError::NoSignatures)?;

        let signature = BlsSignature::from_bytes(&self.signature)
            .map_err(|_| AggregationError::MalformedSignature)?;

        if signature.verify(&aggregated_key, message, domain) {
            Ok(())
        } else {
            Err(AggregationError::InvalidSignature)
        }
    }
}

/// Errors from building or checking an [`AggregatedSignature`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregationError {
    /// There are no partial signatures to aggregate, or no signers to verify against.
    NoSignatures,

    /// The number of partial signatures differs from the number of flagged signers.
    SignerCountMismatch { signatures: usize, signers: usize },

    /// A seal's signer is not in the validator set.
    UnknownSigner(Address),

    /// Two seals have the same signer.
    DuplicateSigner(Address),

    /// The bitmap flags a position beyond the end of the validator set.
    BitmapOutOfRange,

    /// A flagged validator's BLS public key does not parse.
    InvalidPublicKey(Address),

    /// The signature bytes do not parse.
    MalformedSignature,

    /// The signature does not verify against the flagged validators' aggregated public key.
    InvalidSignature,
}
