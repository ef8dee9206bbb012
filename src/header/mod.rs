/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Header extra-data codec and the canonical header hash.
//!
//! ## Canonical header hash
//!
//! The hash of a header is the SHA256 hash of its Borsh encoding, with `extra_data` replaced by the
//! encoding of its [hash projection](Extra::hash_projection). The committed seals of a block are
//! therefore outside of the hash: a proposer computes the hash once, validators sign it, and the
//! aggregated seals are written into `extra_data` afterwards without changing the hash.
//!
//! A header whose `extra_data` does not decode hashes to [`CryptoHash::zero`]. Callers must treat a
//! zero hash as an invalid header.

mod extra;

pub use extra::{CheckpointData, Extra, ExtraError, EXTRA_VANITY_LEN};

use borsh::BorshSerialize;

use crate::types::{
    block::Header,
    crypto_primitives::{CryptoHasher, Digest},
    data_types::CryptoHash,
};

/// Compute the canonical hash of `header`.
pub fn header_hash(header: &Header) -> CryptoHash {
    let extra = match Extra::decode(&header.extra_data) {
        Ok(extra) => extra,
        Err(err) => {
            log::debug!("Cannot hash header {}: {:?}", header.number, err);
            return CryptoHash::zero();
        }
    };

    let projected = Header {
        extra_data: extra.hash_projection().encode(),
        ..header.clone()
    };

    let mut hasher = CryptoHasher::new();
    hasher.update(&projected.try_to_vec().unwrap());
    CryptoHash::new(hasher.finalize().into())
}
