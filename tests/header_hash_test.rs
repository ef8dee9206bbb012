use polybft_rs::{
    header::{header_hash, CheckpointData, Extra, ExtraError, EXTRA_VANITY_LEN},
    signer::aggregation::AggregatedSignature,
    types::{
        block::Header,
        data_types::{Address, BlockHeight, ChainID, CryptoHash, VotingPower},
        validator_set::ValidatorSetDelta,
    },
};

mod common;

use crate::common::keys::{accounts, keys, validator_set};

fn header_with_extra(extra: &Extra) -> Header {
    Header {
        parent_hash: CryptoHash::new([7; 32]),
        number: BlockHeight::new(12),
        timestamp: 1_700_000_000,
        miner: Address::new([3; 20]),
        gas_limit: 30_000_000,
        gas_used: 21_000,
        extra_data: extra.encode(),
        ..Default::default()
    }
}

#[test]
fn extra_encoding_test() {
    let accounts = accounts(2);
    let extra = Extra {
        validators: ValidatorSetDelta {
            added: vec![accounts[0].validator_metadata(VotingPower::new(3))],
            ..Default::default()
        },
        checkpoint: CheckpointData {
            block_round: 2,
            epoch_number: 9,
            ..Default::default()
        },
        ..Default::default()
    };

    let encoded = extra.encode();
    assert_eq!(&encoded[..EXTRA_VANITY_LEN], &[0u8; EXTRA_VANITY_LEN]);
    assert_eq!(Extra::decode(&encoded), Ok(extra));
}

#[test]
fn extra_decoding_failures_test() {
    assert_eq!(
        Extra::decode(&[1, 2, 3]),
        Err(ExtraError::TooShort {
            len: 3,
            min: EXTRA_VANITY_LEN
        })
    );

    let mut truncated = Extra::default().encode();
    truncated.pop();
    assert_eq!(Extra::decode(&truncated), Err(ExtraError::Malformed));

    let mut trailing = Extra::default().encode();
    trailing.push(0);
    assert_eq!(Extra::decode(&trailing), Err(ExtraError::Malformed));
}

#[test]
fn header_hash_ignores_committed_seals_test() {
    let accounts = accounts(3);
    let keys = keys(&accounts);
    let validator_set = validator_set(&accounts);

    let unsealed = Extra {
        checkpoint: CheckpointData {
            epoch_number: 1,
            ..Default::default()
        },
        ..Default::default()
    };
    let header = header_with_extra(&unsealed);
    let hash = header_hash(&header);
    assert!(!hash.is_zero());

    // Seal the header with signatures over its own hash, as finalization does.
    let seals: Vec<_> = keys
        .iter()
        .map(|key| (key.address(), key.sign_committed_seal(&hash)))
        .collect();
    let sealed = Extra {
        committed: AggregatedSignature::from_seals(&validator_set, &seals).unwrap(),
        ..unsealed.clone()
    };
    let sealed_header = header_with_extra(&sealed);

    assert_ne!(sealed_header.extra_data, header.extra_data);
    assert_eq!(header_hash(&sealed_header), hash);
    assert_eq!(sealed_header.hash(), hash);
}

#[test]
fn header_hash_commits_to_other_fields_test() {
    let extra = Extra::default();
    let header = header_with_extra(&extra);
    let hash = header_hash(&header);

    let mut other_number = header.clone();
    other_number.number = BlockHeight::new(13);
    assert_ne!(header_hash(&other_number), hash);

    let mut other_parent = header.clone();
    other_parent.parent_hash = CryptoHash::new([8; 32]);
    assert_ne!(header_hash(&other_parent), hash);

    let mut other_parent_seals = header.clone();
    other_parent_seals.extra_data = Extra {
        parent: AggregatedSignature {
            signature: vec![1; 96],
            bitmap: [0usize].into_iter().collect(),
        },
        ..Default::default()
    }
    .encode();
    assert_ne!(header_hash(&other_parent_seals), hash);

    // Hashing is deterministic.
    assert_eq!(header_hash(&header), hash);
}

#[test]
fn malformed_extra_hashes_to_zero_test() {
    let header = Header {
        number: BlockHeight::new(1),
        extra_data: vec![1, 2, 3, 4, 100, 200, 255],
        ..Default::default()
    };
    assert_eq!(header_hash(&header), CryptoHash::zero());

    let mut garbage = vec![0u8; EXTRA_VANITY_LEN];
    garbage.extend([0xff; 16]);
    let header = Header {
        extra_data: garbage,
        ..header
    };
    assert!(header_hash(&header).is_zero());
}

#[test]
fn vanity_prefix_must_be_zero_test() {
    let header = header_with_extra(&Extra::default());
    assert!(!header_hash(&header).is_zero());

    let mut vanity = header.clone();
    vanity.extra_data[..EXTRA_VANITY_LEN].fill(0xab);
    assert_eq!(Extra::decode(&vanity.extra_data), Err(ExtraError::NonZeroVanity));
    assert!(header_hash(&vanity).is_zero());

    let mut last_vanity_byte = header.clone();
    last_vanity_byte.extra_data[EXTRA_VANITY_LEN - 1] = 1;
    assert_eq!(
        Extra::decode(&last_vanity_byte.extra_data),
        Err(ExtraError::NonZeroVanity)
    );
    assert_ne!(header_hash(&last_vanity_byte), header_hash(&header));
}

#[test]
fn checkpoint_hash_test() {
    let checkpoint = CheckpointData {
        block_round: 0,
        epoch_number: 4,
        current_validators_hash: CryptoHash::new([1; 32]),
        next_validators_hash: CryptoHash::new([1; 32]),
        event_root: CryptoHash::zero(),
    };
    let block_hash = CryptoHash::new([9; 32]);

    let hash = checkpoint.hash(ChainID::new(100), BlockHeight::new(40), &block_hash);
    assert_eq!(
        checkpoint.hash(ChainID::new(100), BlockHeight::new(40), &block_hash),
        hash
    );
    assert_ne!(
        checkpoint.hash(ChainID::new(101), BlockHeight::new(40), &block_hash),
        hash
    );
    assert_ne!(
        checkpoint.hash(ChainID::new(100), BlockHeight::new(41), &block_hash),
        hash
    );
}
