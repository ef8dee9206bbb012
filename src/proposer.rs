/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Round-robin proposer rotation.
//!
//! Every honest replica computes the same proposer from public state: the validator set of the
//! height, the round, and the address of the proposer of the previous block.
//!
//! - If there is no previous proposer (the zero address), the seed is `round`.
//! - Otherwise, the seed is `index(last_proposer) + round + 1`, where the index of a previous proposer
//!   that has since left the validator set is taken to be 0.
//!
//! The proposer is the validator at position `seed mod len` in the validator set.

use crate::types::{
    data_types::{Address, Round},
    validator_set::{ValidatorMetadata, ValidatorSet},
};

/// Select the validator entitled to propose in `round`, given the proposer of the previous block.
///
/// Returns `None` only if `validator_set` is empty.
pub fn select_proposer<'a>(
    validator_set: &'a ValidatorSet,
    round: Round,
    last_proposer: &Address,
) -> Option<&'a ValidatorMetadata> {
    if validator_set.is_empty() {
        return None;
    }

    let seed = if last_proposer.is_zero() {
        round.int() as u128
    } else {
        let offset = validator_set.index_of(last_proposer).unwrap_or(0) as u128;
        offset + round.int() as u128 + 1
    };

    let pick = (seed % validator_set.len() as u128) as usize;
    validator_set.at(pick)
}
