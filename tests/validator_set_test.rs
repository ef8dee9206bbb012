use log::LevelFilter;
use polybft_rs::types::{
    bitmap::Bitmap,
    data_types::{Address, BlockHeight, TotalPower, VotingPower},
    validator_set::{ValidatorSet, ValidatorSetDelta, ValidatorSetError, ValidatorSetHistory},
};

mod common;

use crate::common::{
    keys::{accounts, validator_set, validator_set_with_powers},
    logging::setup_logger,
};

#[test]
fn has_quorum_ignores_unknown_and_repeated_signers_test() {
    setup_logger(LevelFilter::Debug);

    let accounts = accounts(4);
    let validator_set = validator_set_with_powers(&accounts, &[10, 10, 10, 10]);
    let height = BlockHeight::new(1);
    let a = accounts[0].address();
    let b = accounts[1].address();
    let c = accounts[2].address();
    let stranger = Address::new([0xab; 20]);

    // A signer outside the validator set contributes nothing but does not fail the check.
    assert!(validator_set.has_quorum(height, &[a, b, c, stranger]));
    assert!(!validator_set.has_quorum(height, &[a, b, stranger]));

    // Counting the same signer twice must not inflate the signers' power.
    assert!(!validator_set.has_quorum(height, &[a, b, a, b]));

    assert!(!validator_set.has_quorum(height, std::iter::empty()));
}

#[test]
fn has_quorum_with_uneven_powers_test() {
    let accounts = accounts(3);
    let validator_set = validator_set_with_powers(&accounts, &[60, 30, 10]);
    let height = BlockHeight::new(7);

    assert_eq!(validator_set.total_voting_power(), TotalPower::new(100));
    assert!(validator_set.has_quorum(height, &[accounts[0].address()]));
    assert!(!validator_set.has_quorum(
        height,
        &[accounts[1].address(), accounts[2].address()]
    ));
}

#[test]
fn duplicate_validator_is_rejected_test() {
    let accounts = accounts(2);
    let validators = vec![
        accounts[0].validator_metadata(VotingPower::new(1)),
        accounts[1].validator_metadata(VotingPower::new(1)),
        accounts[0].validator_metadata(VotingPower::new(5)),
    ];

    assert_eq!(
        ValidatorSet::new(validators),
        Err(ValidatorSetError::DuplicateValidator(accounts[0].address()))
    );
}

#[test]
fn total_power_overflow_is_rejected_test() {
    let accounts = accounts(2);
    let validators = vec![
        accounts[0].validator_metadata(VotingPower::new(u128::MAX)),
        accounts[1].validator_metadata(VotingPower::new(1)),
    ];

    assert_eq!(
        ValidatorSet::new(validators),
        Err(ValidatorSetError::TotalPowerOverflow)
    );
}

#[test]
fn validator_order_is_preserved_test() {
    let accounts = accounts(5);
    let validator_set = validator_set(&accounts);

    for (index, account) in accounts.iter().enumerate() {
        assert_eq!(validator_set.index_of(&account.address()), Some(index));
        assert_eq!(
            validator_set.at(index).map(|validator| validator.address),
            Some(account.address())
        );
    }
    assert_eq!(validator_set.len(), 5);
    assert_eq!(validator_set.index_of(&Address::ZERO), None);
}

#[test]
fn apply_delta_test() {
    let accounts = accounts(5);
    let old = validator_set_with_powers(&accounts[..4], &[1, 2, 3, 4]);

    let mut removed = Bitmap::new();
    removed.set(1);
    let delta = ValidatorSetDelta {
        added: vec![accounts[4].validator_metadata(VotingPower::new(5))],
        updated: vec![accounts[3].validator_metadata(VotingPower::new(40))],
        removed,
    };

    let new = old.apply_delta(&delta).unwrap();
    let addresses: Vec<Address> = new.validators().map(|validator| validator.address).collect();
    assert_eq!(
        addresses,
        vec![
            accounts[0].address(),
            accounts[2].address(),
            accounts[3].address(),
            accounts[4].address(),
        ]
    );
    assert_eq!(
        new.voting_power_of(&accounts[3].address()),
        Some(VotingPower::new(40))
    );
    assert_eq!(new.total_voting_power(), TotalPower::new(1 + 3 + 40 + 5));

    // The old snapshot is untouched.
    assert_eq!(old.len(), 4);
    assert!(old.includes(&accounts[1].address()));
}

#[test]
fn apply_invalid_delta_test() {
    let accounts = accounts(3);
    let old = validator_set(&accounts[..2]);

    let mut removed = Bitmap::new();
    removed.set(2);
    let out_of_range = ValidatorSetDelta {
        removed,
        ..Default::default()
    };
    assert_eq!(
        old.apply_delta(&out_of_range),
        Err(ValidatorSetError::IndexOutOfRange { index: 2, len: 2 })
    );

    let unknown_update = ValidatorSetDelta {
        updated: vec![accounts[2].validator_metadata(VotingPower::new(3))],
        ..Default::default()
    };
    assert_eq!(
        old.apply_delta(&unknown_update),
        Err(ValidatorSetError::UnknownValidator(accounts[2].address()))
    );

    let duplicate_add = ValidatorSetDelta {
        added: vec![accounts[0].validator_metadata(VotingPower::new(3))],
        ..Default::default()
    };
    assert_eq!(
        old.apply_delta(&duplicate_add),
        Err(ValidatorSetError::DuplicateValidator(accounts[0].address()))
    );
}

#[test]
fn delta_between_snapshots_test() {
    let accounts = accounts(5);
    let old = validator_set_with_powers(&accounts[..4], &[1, 1, 1, 1]);
    let new = validator_set_with_powers(
        &[
            accounts[0].clone(),
            accounts[2].clone(),
            accounts[3].clone(),
            accounts[4].clone(),
        ],
        &[1, 7, 1, 1],
    );

    let delta = ValidatorSetDelta::between(&old, &new);
    assert!(delta.removed.is_set(1));
    assert_eq!(delta.removed.count_ones(), 1);
    assert_eq!(delta.updated.len(), 1);
    assert_eq!(delta.updated[0].address, accounts[2].address());
    assert_eq!(delta.added.len(), 1);
    assert_eq!(delta.added[0].address, accounts[4].address());

    assert_eq!(old.apply_delta(&delta).unwrap(), new);
    assert!(ValidatorSetDelta::between(&new, &new).is_empty());
}

#[test]
fn validator_set_history_test() {
    let accounts = accounts(4);
    let genesis = validator_set(&accounts[..3]);
    let history = ValidatorSetHistory::new(BlockHeight::new(1), genesis.clone());

    assert!(history.at(BlockHeight::new(0)).is_none());
    assert_eq!(*history.at(BlockHeight::new(1)).unwrap(), genesis);
    assert_eq!(*history.current(), genesis);

    let delta = ValidatorSetDelta {
        added: vec![accounts[3].validator_metadata(VotingPower::new(1))],
        ..Default::default()
    };
    let next = history.publish(BlockHeight::new(5), &delta).unwrap();
    assert_eq!(next.len(), 4);

    // Heights before the activation height keep seeing the previous snapshot.
    assert_eq!(*history.at(BlockHeight::new(4)).unwrap(), genesis);
    assert_eq!(*history.at(BlockHeight::new(5)).unwrap(), *next);
    assert_eq!(*history.at(BlockHeight::new(100)).unwrap(), *next);
    assert_eq!(*history.current(), *next);

    // A clone is a handle to the same history.
    let handle = history.clone();
    assert_eq!(*handle.current(), *next);
}

#[test]
fn stale_publish_is_rejected_test() {
    let accounts = accounts(3);
    let genesis = validator_set(&accounts[..2]);
    let history = ValidatorSetHistory::new(BlockHeight::new(3), genesis.clone());

    let delta = ValidatorSetDelta {
        added: vec![accounts[2].validator_metadata(VotingPower::new(1))],
        ..Default::default()
    };
    assert_eq!(
        history.publish(BlockHeight::new(3), &delta),
        Err(ValidatorSetError::StaleActivationHeight {
            activation: BlockHeight::new(3),
            latest: BlockHeight::new(3),
        })
    );

    // A delta that fails to apply publishes nothing.
    let invalid = ValidatorSetDelta {
        updated: vec![accounts[2].validator_metadata(VotingPower::new(1))],
        ..Default::default()
    };
    assert!(history.publish(BlockHeight::new(4), &invalid).is_err());
    assert_eq!(*history.current(), genesis);
}

#[test]
fn validator_set_hash_depends_on_order_test() {
    let accounts = accounts(2);
    let forward = validator_set(&accounts);
    let backward = validator_set(&[accounts[1].clone(), accounts[0].clone()]);

    assert_eq!(forward.hash(), validator_set(&accounts).hash());
    assert_ne!(forward.hash(), backward.hash());
}
