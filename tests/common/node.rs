use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use polybft_rs::{
    config::Configuration,
    events::{DropMessageEvent, DropReason, FinalizeBlockEvent},
    replica::{Replica, ReplicaSpec},
    signer::wallet::{Account, LocalKeyProvider},
    types::{
        data_types::{Address, BlockHeight, ChainID, View},
        validator_set::ValidatorSet,
    },
};

use super::{
    backend::MockBackend,
    network::{GossipNetworkStub, TopicStub},
};

pub(crate) const CHAIN_ID: ChainID = ChainID::new(100);

/// A running replica together with a handle to the chain it finalizes blocks into.
pub(crate) struct Node {
    replica: Replica<TopicStub>,
    backend: MockBackend,
    finalized: Arc<Mutex<Vec<BlockHeight>>>,
    dropped: Arc<Mutex<Vec<(Address, View, DropReason)>>>,
}

impl Node {
    pub(crate) fn new(account: &Account, network: GossipNetworkStub, backend: MockBackend) -> Node {
        Node::with_message_buffer_capacity(account, network, backend, 1024)
    }

    pub(crate) fn with_message_buffer_capacity(
        account: &Account,
        network: GossipNetworkStub,
        backend: MockBackend,
        message_buffer_capacity: usize,
    ) -> Node {
        let configuration = Configuration::builder()
            .chain_id(CHAIN_ID)
            .base_round_timeout(Duration::from_millis(1000))
            .max_round_timeout(Duration::from_secs(8))
            .message_buffer_capacity(message_buffer_capacity)
            .log_events(true)
            .build();

        let finalized = Arc::new(Mutex::new(Vec::new()));
        let finalize_block_handler = {
            let finalized = finalized.clone();
            move |event: &FinalizeBlockEvent| finalized.lock().unwrap().push(event.number)
        };

        let dropped = Arc::new(Mutex::new(Vec::new()));
        let drop_message_handler = {
            let dropped = dropped.clone();
            move |event: &DropMessageEvent| {
                dropped
                    .lock()
                    .unwrap()
                    .push((event.origin, event.view, event.reason))
            }
        };

        let replica = ReplicaSpec::builder()
            .key_provider(LocalKeyProvider::from(account))
            .network(network)
            .backend(backend.clone())
            .configuration(configuration)
            .on_finalize_block(finalize_block_handler)
            .on_drop_message(drop_message_handler)
            .build()
            .start()
            .unwrap();

        Node {
            replica,
            backend,
            finalized,
            dropped,
        }
    }

    pub(crate) fn address(&self) -> Address {
        self.replica.address()
    }

    /// Get the height of the latest block this node finalized.
    pub(crate) fn height(&self) -> u64 {
        self.backend.height()
    }

    pub(crate) fn backend(&self) -> &MockBackend {
        &self.backend
    }

    /// Get the heights of the finalized blocks this node's event handler saw, in order.
    pub(crate) fn finalized_heights(&self) -> Vec<BlockHeight> {
        self.finalized.lock().unwrap().clone()
    }

    /// Get the sender, view and reason of every message this node's engine dropped, in order.
    pub(crate) fn dropped_messages(&self) -> Vec<(Address, View, DropReason)> {
        self.dropped.lock().unwrap().clone()
    }

    pub(crate) fn validator_set(&self) -> Arc<ValidatorSet> {
        self.replica.validator_sets().current()
    }

    pub(crate) fn is_active_validator(&self) -> bool {
        self.replica.is_active_validator()
    }
}
