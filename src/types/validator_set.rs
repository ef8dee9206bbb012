/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types that store information about validator sets or updates to validator sets.
//!
//! ## Snapshots
//!
//! A [`ValidatorSet`] is an immutable snapshot. Changing membership never mutates a set in place:
//! instead, a [`ValidatorSetDelta`] is [applied](ValidatorSet::apply_delta) to a snapshot to build
//! the next one, and the next one is [published](ValidatorSetHistory::publish) by swapping a single
//! reference. Readers on other threads therefore always see either the old snapshot or the new one,
//! never a half-updated mapping between addresses and voting powers.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    slice,
    sync::Arc,
};

use arc_swap::ArcSwap;
use borsh::{BorshDeserialize, BorshSerialize};

use crate::quorum::quorum_threshold;
use crate::signer::bls::BlsPublicKeyBytes;

use super::{
    bitmap::Bitmap,
    crypto_primitives::sha256,
    data_types::{Address, BlockHeight, CryptoHash, TotalPower, VotingPower},
};

/// Identity, BLS public key and voting power of a single validator.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct ValidatorMetadata {
    pub address: Address,
    pub bls_key: BlsPublicKeyBytes,
    pub voting_power: VotingPower,
}

/// Stores the identities of validators and their voting powers.
///
/// ## Ordering of validators
///
/// `ValidatorSet` keeps validators in the order they were given in. This order defines the rotation
/// index used by [proposer selection](crate::proposer::select_proposer) and the bit positions used by
/// [`Bitmap`]s in [deltas](ValidatorSetDelta) and [aggregated
/// signatures](crate::signer::aggregation::AggregatedSignature).
///
/// ## Invariants
///
/// 1. No two validators share an address.
/// 2. `total_voting_power` equals the sum of the validators' voting powers, and fits in a `u128`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatorSet {
    validators: Vec<ValidatorMetadata>,
    voting_powers: HashMap<Address, VotingPower>,
    total_voting_power: TotalPower,
}

impl Default for ValidatorSet {
    // Create an empty validator set.
    fn default() -> Self {
        Self {
            validators: Vec::new(),
            voting_powers: HashMap::new(),
            total_voting_power: TotalPower::new(0),
        }
    }
}

impl ValidatorSet {
    /// Create a validator set from an ordered roster of validators.
    ///
    /// Fails if two validators share an address, or if their total voting power overflows.
    pub fn new(validators: Vec<ValidatorMetadata>) -> Result<ValidatorSet, ValidatorSetError> {
        let mut voting_powers = HashMap::with_capacity(validators.len());
        let mut total_voting_power = TotalPower::new(0);
        for validator in &validators {
            if voting_powers
                .insert(validator.address, validator.voting_power)
                .is_some()
            {
                return Err(ValidatorSetError::DuplicateValidator(validator.address));
            }
            total_voting_power = total_voting_power
                .checked_add(validator.voting_power)
                .ok_or(ValidatorSetError::TotalPowerOverflow)?;
        }

        Ok(Self {
            validators,
            voting_powers,
            total_voting_power,
        })
    }

    /// Check whether the validator set contains `address`.
    pub fn includes(&self, address: &Address) -> bool {
        self.voting_powers.contains_key(address)
    }

    /// Get the number of validators in the validator set.
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    /// Check whether the validator set is empty (i.e., `self.len() == 0`).
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Get the position of `address` in the [ordering of validators](Self#ordering-of-validators).
    pub fn index_of(&self, address: &Address) -> Option<usize> {
        self.validators
            .iter()
            .position(|validator| validator.address == *address)
    }

    /// Get the validator at position `index`.
    pub fn at(&self, index: usize) -> Option<&ValidatorMetadata> {
        self.validators.get(index)
    }

    /// Get the validator with `address`.
    pub fn get(&self, address: &Address) -> Option<&ValidatorMetadata> {
        self.validators
            .iter()
            .find(|validator| validator.address == *address)
    }

    /// Get an iterator through the validators, in order.
    pub fn validators(&self) -> slice::Iter<ValidatorMetadata> {
        self.validators.iter()
    }

    /// Get the voting power of `address`, if it is in the validator set.
    pub fn voting_power_of(&self, address: &Address) -> Option<VotingPower> {
        self.voting_powers.get(address).copied()
    }

    /// Get the mapping from validator addresses to voting powers.
    pub fn voting_powers(&self) -> &HashMap<Address, VotingPower> {
        &self.voting_powers
    }

    /// Get the sum of the voting powers of all validators in the validator set.
    pub fn total_voting_power(&self) -> TotalPower {
        self.total_voting_power
    }

    /// Check whether `signers` together hold a quorum of voting power at block `height`.
    ///
    /// Addresses that are not in the validator set contribute no power and are otherwise ignored.
    /// Each address is counted at most once.
    pub fn has_quorum<'a>(
        &self,
        height: BlockHeight,
        signers: impl IntoIterator<Item = &'a Address>,
    ) -> bool {
        let signers: HashSet<&Address> = signers.into_iter().collect();
        let signers_power = signers
            .iter()
            .filter_map(|address| self.voting_powers.get(*address))
            .fold(TotalPower::new(0), |acc, power| acc.saturating_add(*power));

        let quorum = quorum_threshold(height, self.total_voting_power);
        let has_quorum = signers_power >= quorum;

        log::debug!(
            "HasQuorum: signers: {}, signers voting power: {}, quorum: {}, has quorum: {}",
            signers.len(),
            signers_power,
            quorum,
            has_quorum
        );

        has_quorum
    }

    /// Get the validators whose positions are set in `bitmap`, in order.
    ///
    /// Fails if `bitmap` sets a position beyond the end of the validator set.
    pub fn filter_by_bitmap(
        &self,
        bitmap: &Bitmap,
    ) -> Result<Vec<&ValidatorMetadata>, ValidatorSetError> {
        bitmap
            .indices()
            .map(|index| {
                self.validators
                    .get(index)
                    .ok_or(ValidatorSetError::IndexOutOfRange {
                        index,
                        len: self.len(),
                    })
            })
            .collect()
    }

    /// Build the snapshot that follows this one after `delta`.
    ///
    /// The validators at the positions flagged in `delta.removed` are dropped first, then the
    /// remaining validators listed in `delta.updated` get their new metadata, and finally
    /// `delta.added` is appended in order.
    pub fn apply_delta(&self, delta: &ValidatorSetDelta) -> Result<ValidatorSet, ValidatorSetError> {
        if let Some(index) = delta.removed.indices().find(|index| *index >= self.len()) {
            return Err(ValidatorSetError::IndexOutOfRange {
                index,
                len: self.len(),
            });
        }

        let mut validators: Vec<ValidatorMetadata> = self
            .validators
            .iter()
            .enumerate()
            .filter(|(index, _)| !delta.removed.is_set(*index))
            .map(|(_, validator)| validator.clone())
            .collect();

        for updated in &delta.updated {
            let validator = validators
                .iter_mut()
                .find(|validator| validator.address == updated.address)
                .ok_or(ValidatorSetError::UnknownValidator(updated.address))?;
            *validator = updated.clone();
        }

        validators.extend(delta.added.iter().cloned());

        ValidatorSet::new(validators)
    }

    /// Compute the hash that commits to this validator set: the SHA256 hash of its validators'
    /// Borsh encoding, in order.
    pub fn hash(&self) -> CryptoHash {
        sha256(&self.validators.try_to_vec().unwrap())
    }
}

/// Changes that turn one [`ValidatorSet`] snapshot into the next.
///
/// `removed` flags positions in the *previous* snapshot. `updated` and `added` are identified by
/// address. See [`ValidatorSet::apply_delta`] for the order in which the three are applied.
#[derive(Clone, Debug, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct ValidatorSetDelta {
    pub added: Vec<ValidatorMetadata>,
    pub updated: Vec<ValidatorMetadata>,
    pub removed: Bitmap,
}

impl ValidatorSetDelta {
    /// Compute the delta that takes `old` to a snapshot with the same members and metadata as `new`.
    ///
    /// Members that `old` and `new` share keep their order from `old`, and members that only `new` has
    /// are appended in their order in `new`.
    pub fn between(old: &ValidatorSet, new: &ValidatorSet) -> ValidatorSetDelta {
        let removed = old
            .validators()
            .enumerate()
            .filter(|(_, validator)| !new.includes(&validator.address))
            .map(|(index, _)| index)
            .collect();

        let mut updated = Vec::new();
        let mut added = Vec::new();
        for validator in new.validators() {
            match old.get(&validator.address) {
                Some(previous) if previous != validator => updated.push(validator.clone()),
                Some(_) => (),
                None => added.push(validator.clone()),
            }
        }

        ValidatorSetDelta {
            added,
            updated,
            removed,
        }
    }

    /// Check whether applying this delta would leave a validator set unchanged.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }
}

/// Every published [`ValidatorSet`] snapshot, keyed by the first block height it is active at.
///
/// Cloning a `ValidatorSetHistory` gives another handle to the same history. Loading the current
/// snapshot is lock-free. Snapshots are published by a single writer (the round engine).
#[derive(Clone)]
pub struct ValidatorSetHistory {
    snapshots: Arc<ArcSwap<Snapshots>>,
}

#[derive(Clone)]
struct Snapshots {
    latest_activation: BlockHeight,
    current: Arc<ValidatorSet>,
    by_activation: BTreeMap<BlockHeight, Arc<ValidatorSet>>,
}

impl ValidatorSetHistory {
    /// Start a history whose first snapshot, `genesis`, is active from `activation` onwards.
    pub fn new(activation: BlockHeight, genesis: ValidatorSet) -> Self {
        let genesis = Arc::new(genesis);
        let mut by_activation = BTreeMap::new();
        by_activation.insert(activation, genesis.clone());

        Self {
            snapshots: Arc::new(ArcSwap::from_pointee(Snapshots {
                latest_activation: activation,
                current: genesis,
                by_activation,
            })),
        }
    }

    /// Get the most recently published snapshot.
    pub fn current(&self) -> Arc<ValidatorSet> {
        self.snapshots.load().current.clone()
    }

    /// Get the snapshot that is active at `height`, if `height` is not before the first snapshot.
    pub fn at(&self, height: BlockHeight) -> Option<Arc<ValidatorSet>> {
        self.snapshots
            .load()
            .by_activation
            .range(..=height)
            .next_back()
            .map(|(_, validator_set)| validator_set.clone())
    }

    /// Apply `delta` to the current snapshot and publish the result as active from `activation`
    /// onwards.
    ///
    /// The new snapshot is fully built before it is swapped in. Fails without publishing anything if
    /// the delta does not apply, or if `activation` is not after the activation height of the current
    /// snapshot.
    pub fn publish(
        &self,
        activation: BlockHeight,
        delta: &ValidatorSetDelta,
    ) -> Result<Arc<ValidatorSet>, ValidatorSetError> {
        let snapshots = self.snapshots.load_full();
        if activation <= snapshots.latest_activation {
            return Err(ValidatorSetError::StaleActivationHeight {
                activation,
                latest: snapshots.latest_activation,
            });
        }

        let next = Arc::new(snapshots.current.apply_delta(delta)?);
        let mut by_activation = snapshots.by_activation.clone();
        by_activation.insert(activation, next.clone());

        self.snapshots.store(Arc::new(Snapshots {
            latest_activation: activation,
            current: next.clone(),
            by_activation,
        }));

        Ok(next)
    }
}

/// Errors from building a [`ValidatorSet`] snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidatorSetError {
    /// Two validators in a roster share an address.
    DuplicateValidator(Address),

    /// The validators' total voting power does not fit in a `u128`.
    TotalPowerOverflow,

    /// A bitmap flags a position beyond the end of the validator set.
    IndexOutOfRange { index: usize, len: usize },

    /// A delta updates a validator that is not in the validator set.
    UnknownValidator(Address),

    /// A snapshot was published with an activation height that is not after the current snapshot's.
    StaleActivationHeight {
        activation: BlockHeight,
        latest: BlockHeight,
    },
}
