/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The consensus metadata embedded in a header's `extra_data`.
//!
//! ## Encoding
//!
//! `extra_data` is [`EXTRA_VANITY_LEN`] zero bytes followed by the Borsh encoding of [`Extra`], whose
//! fields are encoded in order: `validators`, `parent`, `checkpoint`, `committed`. Since `committed`
//! comes last, the bytes of every other field are the same whether or not it is populated.

use borsh::{BorshDeserialize, BorshSerialize};

use crate::signer::aggregation::AggregatedSignature;
use crate::types::{
    crypto_primitives::{CryptoHasher, Digest},
    data_types::{BlockHeight, ChainID, CryptoHash},
    validator_set::ValidatorSetDelta,
};

/// Number of (zero) bytes that prefix the encoded [`Extra`] in a header's `extra_data`.
pub const EXTRA_VANITY_LEN: usize = 32;

/// Consensus metadata of a block.
#[derive(Clone, Debug, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Extra {
    /// Changes to the validator set that take effect after this block.
    pub validators: ValidatorSetDelta,

    /// Aggregated committed seals of the parent block.
    pub parent: AggregatedSignature,

    pub checkpoint: CheckpointData,

    /// Aggregated committed seals of this block. Empty until the block is finalized.
    pub committed: AggregatedSignature,
}

impl Extra {
    /// Encode this `Extra` into `extra_data` bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; EXTRA_VANITY_LEN];
        bytes.extend(self.try_to_vec().unwrap());
        bytes
    }

    /// Decode `extra_data` bytes into an `Extra`.
    ///
    /// Fails if there are fewer bytes than the vanity prefix, if the prefix is not all zeros, or if the
    /// bytes after the prefix are not exactly the encoding of an `Extra`.
    pub fn decode(extra_data: &[u8]) -> Result<Extra, ExtraError> {
        if extra_data.len() < EXTRA_VANITY_LEN {
            return Err(ExtraError::TooShort {
                len: extra_data.len(),
                min: EXTRA_VANITY_LEN,
            });
        }

        let (vanity, encoded) = extra_data.split_at(EXTRA_VANITY_LEN);
        if vanity.iter().any(|byte| *byte != 0) {
            return Err(ExtraError::NonZeroVanity);
        }

        Extra::try_from_slice(encoded).map_err(|_| ExtraError::Malformed)
    }

    /// Get the part of this `Extra` that header hashes commit to: a copy with `committed` cleared.
    pub fn hash_projection(&self) -> Extra {
        Extra {
            committed: AggregatedSignature::default(),
            ..self.clone()
        }
    }
}

/// Commitment to the state of the chain at a block, which validators sign and the root chain's
/// checkpoint manager verifies.
#[derive(Clone, Debug, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct CheckpointData {
    pub block_round: u64,
    pub epoch_number: u64,
    pub current_validators_hash: CryptoHash,
    pub next_validators_hash: CryptoHash,
    pub event_root: CryptoHash,
}

impl CheckpointData {
    /// Compute the checkpoint hash of block `block_number` with hash `block_hash` on chain `chain_id`.
    pub fn hash(
        &self,
        chain_id: ChainID,
        block_number: BlockHeight,
        block_hash: &CryptoHash,
    ) -> CryptoHash {
        let mut hasher = CryptoHasher::new();
        hasher.update(&chain_id.try_to_vec().unwrap());
        hasher.update(&block_number.try_to_vec().unwrap());
        hasher.update(&block_hash.bytes());
        hasher.update(&self.try_to_vec().unwrap());
        CryptoHash::new(hasher.finalize().into())
    }
}

/// Errors from decoding `extra_data`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtraError {
    /// `extra_data` is shorter than the vanity prefix.
    TooShort { len: usize, min: usize },

    /// The vanity prefix has a non-zero byte.
    NonZeroVanity,

    /// The bytes after the vanity prefix are not the encoding of an [`Extra`].
    Malformed,
}
