use std::sync::{Arc, Mutex};

use polybft_rs::{
    engine::backend::{Backend, BackendError},
    header::Extra,
    types::{
        block::{Block, Header},
        data_types::{Address, BlockHeight, View},
        validator_set::{ValidatorSet, ValidatorSetDelta},
    },
};

/// An in-memory chain that proposes empty blocks.
///
/// Clones share the same chain, so tests can keep a clone to inspect what the replica finalized.
/// Backends created by [`mock_backends`] also share a pending validator set delta, which every one of
/// them includes in its proposals until a block carrying it is inserted.
#[derive(Clone)]
pub(crate) struct MockBackend {
    me: Address,
    genesis_validators: ValidatorSet,
    chain: Arc<Mutex<Vec<Block>>>,
    pending_delta: Arc<Mutex<Option<ValidatorSetDelta>>>,
}

impl MockBackend {
    fn new(
        me: Address,
        genesis_validators: ValidatorSet,
        pending_delta: Arc<Mutex<Option<ValidatorSetDelta>>>,
    ) -> MockBackend {
        let genesis = Block::new(
            Header {
                extra_data: Extra::default().encode(),
                ..Default::default()
            },
            Vec::new(),
        );

        MockBackend {
            me,
            genesis_validators,
            chain: Arc::new(Mutex::new(vec![genesis])),
            pending_delta,
        }
    }

    /// Include `delta` in the proposals of every backend of the cluster until it is finalized.
    pub(crate) fn schedule_delta(&self, delta: ValidatorSetDelta) {
        *self.pending_delta.lock().unwrap() = Some(delta);
    }

    /// Get the blocks of the chain, including the genesis block.
    pub(crate) fn blocks(&self) -> Vec<Block> {
        self.chain.lock().unwrap().clone()
    }

    pub(crate) fn height(&self) -> u64 {
        self.chain.lock().unwrap().len() as u64 - 1
    }
}

impl Backend for MockBackend {
    fn head_number(&self) -> BlockHeight {
        BlockHeight::new(self.height())
    }

    fn validators_at(&self, _height: BlockHeight) -> Result<ValidatorSet, BackendError> {
        Ok(self.genesis_validators.clone())
    }

    fn last_proposer(&self) -> Address {
        self.chain
            .lock()
            .unwrap()
            .last()
            .map(|block| block.header.miner)
            .unwrap_or(Address::ZERO)
    }

    fn build_proposal(&mut self, view: View) -> Result<Block, BackendError> {
        let parent_hash = self
            .chain
            .lock()
            .unwrap()
            .last()
            .map(|block| block.hash())
            .ok_or(BackendError::UnknownHeight(view.height))?;

        let extra = Extra {
            validators: self.pending_delta.lock().unwrap().clone().unwrap_or_default(),
            ..Default::default()
        };

        Ok(Block::new(
            Header {
                parent_hash,
                number: view.height,
                timestamp: view.round.int(),
                miner: self.me,
                extra_data: extra.encode(),
                ..Default::default()
            },
            Vec::new(),
        ))
    }

    fn is_valid_proposal(&self, block: &Block) -> bool {
        let chain = self.chain.lock().unwrap();
        match chain.last() {
            Some(head) => {
                block.header.parent_hash == head.hash()
                    && block.number() == head.number() + 1
            }
            None => false,
        }
    }

    fn insert_block(&mut self, block: Block) -> Result<(), BackendError> {
        let mut chain = self.chain.lock().unwrap();
        if chain.len() as u64 != block.number().int() {
            return Err(BackendError::InsertFailed(format!(
                "expected block {}, got block {}",
                chain.len(),
                block.number()
            )));
        }
        if let Ok(extra) = Extra::decode(&block.header.extra_data) {
            let mut pending_delta = self.pending_delta.lock().unwrap();
            if pending_delta.as_ref() == Some(&extra.validators) {
                *pending_delta = None;
            }
        }
        chain.push(block);
        Ok(())
    }
}

/// Create one backend per validator of `genesis_validators`, in order, all starting from the same
/// genesis block.
pub(crate) fn mock_backends(genesis_validators: &ValidatorSet) -> Vec<MockBackend> {
    let pending_delta = Arc::new(Mutex::new(None));
    genesis_validators
        .validators()
        .map(|validator| {
            MockBackend::new(
                validator.address,
                genesis_validators.clone(),
                pending_delta.clone(),
            )
        })
        .collect()
}
