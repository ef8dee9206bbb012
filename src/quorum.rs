/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Quorum thresholds.
//!
//! A decision is final once validators holding at least [`quorum_threshold`] of the total voting
//! power agree on it. The threshold is the smallest integer that is at least 60% of the total voting
//! power, computed with exact integer arithmetic.
//!
//! Thresholds are looked up by block height. Every [`QuorumRule`] has an activation height, and the
//! rule in force at a height is the one with the highest activation height not above it. Only one
//! rule exists today; a protocol upgrade that changes the percentage adds another entry to
//! [`QUORUM_RULES`].

use crate::types::data_types::{BlockHeight, TotalPower};

/// Rules for computing the quorum threshold from the total voting power.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuorumRule {
    /// `ceil(0.6 * total)`.
    ///
    /// Note that this is not the classical BFT bound of `ceil(2 * total / 3)`.
    SixtyPercent,
}

/// Quorum rules with their activation heights, in ascending order of activation height.
pub const QUORUM_RULES: &[(BlockHeight, QuorumRule)] =
    &[(BlockHeight::new(0), QuorumRule::SixtyPercent)];

impl QuorumRule {
    /// Get the rule in force at `height`.
    pub fn active_at(height: BlockHeight) -> QuorumRule {
        QUORUM_RULES
            .iter()
            .rev()
            .find(|(activation, _)| *activation <= height)
            .map(|(_, rule)| *rule)
            .unwrap_or(QuorumRule::SixtyPercent)
    }

    /// Compute the power that agreeing validators must match or exceed (`>=`) under this rule.
    pub fn threshold(&self, total: TotalPower) -> TotalPower {
        match self {
            QuorumRule::SixtyPercent => TotalPower::new(ceil_three_fifths(total.int())),
        }
    }
}

/// Compute the power that agreeing validators must match or exceed (`>=`) at block `height`, given
/// the `total` voting power of the validator set.
pub fn quorum_threshold(height: BlockHeight, total: TotalPower) -> TotalPower {
    QuorumRule::active_at(height).threshold(total)
}

/// Compute the largest number of faulty validators that a set of `validator_count` validators is
/// assumed to tolerate: `floor(0.4 * validator_count)`.
pub fn max_faulty_count(validator_count: usize) -> usize {
    // (4 * n) / 10 without overflowing for large n.
    (validator_count / 10) * 4 + ((validator_count % 10) * 4) / 10
}

/// Compute the number of equally weighted validators needed for a quorum among `validator_count`
/// validators: `ceil(0.6 * validator_count)`.
pub fn optimal_quorum_size(validator_count: usize) -> usize {
    (validator_count / 5) * 3 + ((validator_count % 5) * 3 + 4) / 5
}

// ceil(3n / 5) without overflowing: with n = 5a + b, this is 3a + ceil(3b / 5).
fn ceil_three_fifths(n: u128) -> u128 {
    (n / 5) * 3 + ((n % 5) * 3 + 4) / 5
}
