use log::LevelFilter;
use polybft_rs::{
    quorum::{max_faulty_count, optimal_quorum_size, quorum_threshold, QuorumRule},
    types::data_types::{BlockHeight, TotalPower},
};

mod common;

use crate::common::{
    keys::{accounts, validator_set_with_powers},
    logging::setup_logger,
};

#[test]
fn quorum_of_four_equal_validators_test() {
    setup_logger(LevelFilter::Debug);

    let accounts = accounts(4);
    let validator_set = validator_set_with_powers(&accounts, &[10, 10, 10, 10]);
    let [a, b, c, _d] = [0, 1, 2, 3].map(|i| accounts[i].address());
    let height = BlockHeight::new(1);

    assert_eq!(validator_set.total_voting_power(), TotalPower::new(40));
    assert_eq!(
        quorum_threshold(height, validator_set.total_voting_power()),
        TotalPower::new(24)
    );
    assert!(validator_set.has_quorum(height, &[a, b, c]));
    assert!(!validator_set.has_quorum(height, &[a, b]));
}

#[test]
fn quorum_threshold_is_exact_ceiling_test() {
    let height = BlockHeight::new(0);
    let cases: [(u128, u128); 8] = [
        (1, 1),
        (2, 2),
        (3, 2),
        (4, 3),
        (5, 3),
        (10, 6),
        (11, 7),
        (100, 60),
    ];
    for (total, expected) in cases {
        assert_eq!(
            quorum_threshold(height, TotalPower::new(total)),
            TotalPower::new(expected),
            "total = {}",
            total
        );
    }

    // Large totals must not lose precision or overflow.
    assert_eq!(
        quorum_threshold(height, TotalPower::new(u128::MAX)),
        TotalPower::new(u128::MAX / 5 * 3)
    );
    let total = 10u128.pow(30) + 1;
    assert_eq!(
        quorum_threshold(height, TotalPower::new(total)),
        TotalPower::new(6 * 10u128.pow(29) + 1)
    );
}

#[test]
fn quorum_threshold_monotonicity_test() {
    let height = BlockHeight::new(42);
    let mut previous = TotalPower::new(0);
    for total in 1..=1000u128 {
        let threshold = quorum_threshold(height, TotalPower::new(total));
        assert!(threshold.int() <= total);
        assert!(threshold >= previous);
        previous = threshold;
    }
}

#[test]
fn quorum_rule_is_addressable_by_height_test() {
    for height in [0, 1, 1_000_000, u64::MAX] {
        assert_eq!(
            QuorumRule::active_at(BlockHeight::new(height)),
            QuorumRule::SixtyPercent
        );
    }
}

#[test]
fn faulty_count_and_quorum_size_test() {
    assert_eq!(max_faulty_count(0), 0);
    assert_eq!(max_faulty_count(1), 0);
    assert_eq!(max_faulty_count(3), 1);
    assert_eq!(max_faulty_count(4), 1);
    assert_eq!(max_faulty_count(5), 2);
    assert_eq!(max_faulty_count(10), 4);
    assert_eq!(max_faulty_count(usize::MAX), usize::MAX / 10 * 4 + 2);

    assert_eq!(optimal_quorum_size(1), 1);
    assert_eq!(optimal_quorum_size(4), 3);
    assert_eq!(optimal_quorum_size(5), 3);
    assert_eq!(optimal_quorum_size(7), 5);
    assert_eq!(optimal_quorum_size(10), 6);
}
