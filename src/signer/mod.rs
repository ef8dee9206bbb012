/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Signing keys, domain-separated BLS signatures, address recovery and signature aggregation.

pub mod bls;

pub mod wallet;

pub mod aggregation;

pub use aggregation::{AggregatedSignature, AggregationError};
pub use bls::{
    BlsError, BlsPublicKey, BlsPublicKeyBytes, BlsSecretKey, BlsSignature, Domain,
    DOMAIN_CHECKPOINT_MANAGER, DOMAIN_STATE_RECEIVER, DOMAIN_VALIDATOR_SET,
};
pub use wallet::{
    recover_address, recover_message_signer, Account, Key, KeyProvider, KeyProviderError,
    LocalKeyProvider, SignerError,
};
