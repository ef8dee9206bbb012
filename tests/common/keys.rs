use polybft_rs::{
    signer::wallet::{Account, Key},
    types::{
        data_types::VotingPower,
        validator_set::{ValidatorMetadata, ValidatorSet},
    },
};

/// Generate `n` fresh validator accounts.
pub(crate) fn accounts(n: usize) -> Vec<Account> {
    (0..n).map(|_| Account::generate()).collect()
}

pub(crate) fn keys(accounts: &[Account]) -> Vec<Key> {
    accounts.iter().cloned().map(Key::new).collect()
}

/// Build a validator set of `accounts`, in order, with the given voting powers.
pub(crate) fn validator_set_with_powers(accounts: &[Account], powers: &[u128]) -> ValidatorSet {
    let validators: Vec<ValidatorMetadata> = accounts
        .iter()
        .zip(powers)
        .map(|(account, power)| account.validator_metadata(VotingPower::new(*power)))
        .collect();
    ValidatorSet::new(validators).unwrap()
}

/// Build a validator set of `accounts`, in order, each with a voting power of 1.
pub(crate) fn validator_set(accounts: &[Account]) -> ValidatorSet {
    validator_set_with_powers(accounts, &vec![1; accounts.len()])
}
