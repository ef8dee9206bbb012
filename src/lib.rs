/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! A Rust implementation of the validator-set, quorum and gossip core of an IBFT/PolyBFT consensus
//! engine for proof-of-stake chains bridged to a root chain.
//!
//! The core decides who may propose a block, how much voting power must agree before a block is
//! final, how that agreement is committed into the block header as an aggregated BLS signature, and
//! how consensus messages are disseminated and authenticated among validators.
//!
//! ## Getting started
//!
//! A replica is started from a [`ReplicaSpec`](replica::ReplicaSpec), which bundles:
//! 1. A [`KeyProvider`](signer::wallet::KeyProvider) holding the validator's ECDSA and BLS keys.
//! 2. A [`Network`](networking::network::Network) offering gossip topics.
//! 3. A [`Backend`](engine::backend::Backend) that builds, validates and stores blocks.
//! 4. A [`Configuration`](config::Configuration).
//!
//! The building blocks are usable on their own too: [`ValidatorSet`](types::validator_set::ValidatorSet)
//! and [`quorum`] for voting power arithmetic, [`proposer`] for proposer rotation, [`header`] for the
//! extra-data codec and the canonical header hash, and [`signer`] for ECDSA and BLS signatures.

pub mod types;

pub mod quorum;

pub mod proposer;

pub mod header;

pub mod signer;

pub mod networking;

pub mod engine;

pub mod bootstrap;

pub mod config;

pub mod events;

pub mod logging;

pub(crate) mod event_bus;

pub mod replica;
