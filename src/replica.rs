/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Methods to build and run a replica.
//!
//! The key components of this module are:
//! - The builder-pattern interface to construct a [specification of the replica](ReplicaSpec) with:
//!   1. `ReplicaSpec::builder` to construct a `ReplicaSpecBuilder`,
//!   2. The setters of the `ReplicaSpecBuilder`, and
//!   3. The `ReplicaSpecBuilder::build` method to construct a [ReplicaSpec],
//! - The function to [start](ReplicaSpec::start) a [Replica] given its specification,
//! - [The type](Replica) which keeps the replica alive.
//!
//! ## Validators and non-validators
//!
//! A replica whose address is not in the validator set of the current height does not take part in
//! consensus: the transport drops every consensus message it receives, and the round engine neither
//! proposes nor votes. It becomes active again as soon as a finalized block adds it to the validator
//! set.
//!
//! ## Starting a replica
//!
//! Here is an example that demonstrates how to build and start running a replica using the builder
//! pattern:
//!
//! ```ignore
//! let replica =
//!     ReplicaSpec::builder()
//!     .key_provider(key_provider)
//!     .network(network)
//!     .backend(backend)
//!     .configuration(configuration)
//!     .on_finalize_block(finalize_block_handler)
//!     .build()
//!     .start()?;
//! ```
//!
//! ### Required setters
//!
//! The required setters are for providing the trait implementations required to run a replica:
//! - `.key_provider(...)`
//! - `.network(...)`
//! - `.backend(...)`
//! - `.configuration(...)`
//!
//! ### Optional setters
//!
//! The optional setters are for registering user-defined event handlers for events from
//! [crate::events]:
//! - `.on_start_round(...)`
//! - `.on_round_timeout(...)`
//! - `.on_round_change(...)`
//! - `.on_propose(...)`
//! - `.on_receive_message(...)`
//! - `.on_drop_message(...)`
//! - `.on_collect_quorum(...)`
//! - `.on_finalize_block(...)`
//! - `.on_update_validator_set(...)`

use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc::{self, Sender},
    Arc,
};
use std::thread::JoinHandle;

use typed_builder::TypedBuilder;

use crate::config::Configuration;
use crate::engine::{backend::Backend, backend::BackendError, ibft::Ibft, start_engine};
use crate::event_bus::*;
use crate::events::*;
use crate::networking::{
    network::{Network, Topic},
    transport::{ConsensusTransport, TransportError},
};
use crate::signer::wallet::{Key, KeyProvider, KeyProviderError};
use crate::types::{data_types::Address, validator_set::ValidatorSetHistory};

/// Stores all necessary parameters and trait implementations required to run the [Replica].
#[derive(TypedBuilder)]
#[builder(builder_method(doc = "
    Create a builder for building a [ReplicaSpec]. On the builder call the following methods to construct a valid [ReplicaSpec].

    Required:
    - `.key_provider(...)`
    - `.network(...)`
    - `.backend(...)`
    - `.configuration(...)`

    Optional:
    - `.on_start_round(...)`
    - `.on_round_timeout(...)`
    - `.on_round_change(...)`
    - `.on_propose(...)`
    - `.on_receive_message(...)`
    - `.on_drop_message(...)`
    - `.on_collect_quorum(...)`
    - `.on_finalize_block(...)`
    - `.on_update_validator_set(...)`
"))]
pub struct ReplicaSpec<K: KeyProvider, N: Network, B: Backend> {
    // Required parameters
    #[builder(setter(doc = "Set the source of the replica's secret keys. The argument must implement the [KeyProvider](crate::signer::wallet::KeyProvider) trait. Required."))]
    key_provider: K,
    #[builder(setter(doc = "Set the implementation of peer-to-peer gossip. The argument must implement the [Network](crate::networking::network::Network) trait. Required."))]
    network: N,
    #[builder(setter(doc = "Set the chain that finalized blocks are inserted into. The argument must implement the [Backend](crate::engine::backend::Backend) trait. Required."))]
    backend: B,
    #[builder(setter(doc = "Set the [configuration](Configuration), which contains the necessary parameters to run a replica. Required."))]
    configuration: Configuration,
    // Optional parameters
    #[builder(default, setter(transform = |handler: impl Fn(&StartRoundEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<StartRoundEvent>),
    doc = "Register a handler closure to be invoked after the replica enters a new round. Optional."))]
    on_start_round: Option<HandlerPtr<StartRoundEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&RoundTimeoutEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<RoundTimeoutEvent>),
    doc = "Register a handler closure to be invoked after the replica's round times out. Optional."))]
    on_round_timeout: Option<HandlerPtr<RoundTimeoutEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&RoundChangeEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<RoundChangeEvent>),
    doc = "Register a handler closure to be invoked after the replica moves to a later round. Optional."))]
    on_round_change: Option<HandlerPtr<RoundChangeEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&ProposeEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<ProposeEvent>),
    doc = "Register a handler closure to be invoked after the replica multicasts a proposal. Optional."))]
    on_propose: Option<HandlerPtr<ProposeEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&ReceiveMessageEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<ReceiveMessageEvent>),
    doc = "Register a handler closure to be invoked after the replica accepts a consensus message. Optional."))]
    on_receive_message: Option<HandlerPtr<ReceiveMessageEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&DropMessageEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<DropMessageEvent>),
    doc = "Register a handler closure to be invoked after the replica drops a consensus message. Optional."))]
    on_drop_message: Option<HandlerPtr<DropMessageEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&CollectQuorumEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<CollectQuorumEvent>),
    doc = "Register a handler closure to be invoked after the replica collects a quorum of messages. Optional."))]
    on_collect_quorum: Option<HandlerPtr<CollectQuorumEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&FinalizeBlockEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<FinalizeBlockEvent>),
    doc = "Register a handler closure to be invoked after a block is finalized. Optional."))]
    on_finalize_block: Option<HandlerPtr<FinalizeBlockEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&UpdateValidatorSetEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<UpdateValidatorSetEvent>),
    doc = "Register a handler closure to be invoked after the replica publishes a new validator set. Optional."))]
    on_update_validator_set: Option<HandlerPtr<UpdateValidatorSetEvent>>,
}

impl<K: KeyProvider, N: Network, B: Backend> ReplicaSpec<K, N, B> {
    /// Opens the gossip topics, then starts all threads and channels associated with running a
    /// replica, and returns the handles to them in a [Replica] struct.
    ///
    /// Fails, without starting any thread, if the replica's keys cannot be fetched, if the backend
    /// cannot provide the validator set of the next height, or if a gossip topic cannot be opened.
    pub fn start(mut self) -> Result<Replica<N::Topic>, ReplicaStartError> {
        let key = Key::from_provider(&self.key_provider)?;
        let address = key.address();

        let next_height = self.backend.head_number() + 1;
        let validator_set = self.backend.validators_at(next_height)?;
        let validator_sets = ValidatorSetHistory::new(next_height, validator_set);

        let transport = ConsensusTransport::create_topics(
            &mut self.network,
            self.configuration.is_bridge_enabled(),
        )?;
        let is_active_validator = Arc::new(AtomicBool::new(false));
        let (inbox_sender, inbox) = mpsc::sync_channel(self.configuration.message_buffer_capacity);
        transport.subscribe(is_active_validator.clone(), inbox_sender)?;

        let event_handlers = EventHandlers {
            start_round_handlers: self.on_start_round.into_iter().collect(),
            round_timeout_handlers: self.on_round_timeout.into_iter().collect(),
            round_change_handlers: self.on_round_change.into_iter().collect(),
            propose_handlers: self.on_propose.into_iter().collect(),
            receive_message_handlers: self.on_receive_message.into_iter().collect(),
            drop_message_handlers: self.on_drop_message.into_iter().collect(),
            collect_quorum_handlers: self.on_collect_quorum.into_iter().collect(),
            finalize_block_handlers: self.on_finalize_block.into_iter().collect(),
            update_validator_set_handlers: self.on_update_validator_set.into_iter().collect(),
        };
        let event_handlers = if self.configuration.log_events {
            event_handlers.with_loggers()
        } else {
            event_handlers
        };

        let (event_publisher, event_subscriber) = if !event_handlers.is_empty() {
            let (publisher, subscriber) = mpsc::channel();
            (Some(publisher), Some(subscriber))
        } else {
            (None, None)
        };

        let ibft = Ibft::new(
            self.configuration,
            key,
            transport.clone(),
            self.backend,
            validator_sets.clone(),
            is_active_validator.clone(),
            event_publisher,
        );
        let (engine_shutdown, engine_shutdown_receiver) = mpsc::channel();
        let engine = start_engine(ibft, inbox, engine_shutdown_receiver);

        let (event_bus, event_bus_shutdown) = match event_subscriber {
            Some(event_subscriber) => {
                let (shutdown, shutdown_receiver) = mpsc::channel();
                let event_bus = start_event_bus(event_handlers, event_subscriber, shutdown_receiver);
                (Some(event_bus), Some(shutdown))
            }
            None => (None, None),
        };

        Ok(Replica {
            address,
            transport,
            validator_sets,
            is_active_validator,
            engine: Some(engine),
            engine_shutdown,
            event_bus,
            _event_bus_shutdown: event_bus_shutdown,
        })
    }
}

/// A handle to the background threads of a replica. When this value is dropped, all background
/// threads are gracefully shut down and the gossip topics are closed.
pub struct Replica<T: Topic> {
    address: Address,
    transport: ConsensusTransport<T>,
    validator_sets: ValidatorSetHistory,
    is_active_validator: Arc<AtomicBool>,
    engine: Option<JoinHandle<()>>,
    engine_shutdown: Sender<()>,
    event_bus: Option<JoinHandle<()>>,
    // Held so that the event bus keeps running until it has drained its events.
    _event_bus_shutdown: Option<Sender<()>>,
}

impl<T: Topic> Replica<T> {
    /// Get the address of this replica's validator key.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Get a handle to the validator set history that the round engine publishes into.
    pub fn validator_sets(&self) -> &ValidatorSetHistory {
        &self.validator_sets
    }

    /// Check whether this replica is in the validator set of the height it is working on.
    pub fn is_active_validator(&self) -> bool {
        self.is_active_validator.load(Ordering::Acquire)
    }

    /// Get the transport, e.g., to multicast bridge messages.
    pub fn transport(&self) -> &ConsensusTransport<T> {
        &self.transport
    }
}

impl<T: Topic> Drop for Replica<T> {
    fn drop(&mut self) {
        let _ = self.engine_shutdown.send(());
        if let Some(engine) = self.engine.take() {
            if engine.join().is_err() {
                log::error!("Round engine thread panicked");
            }
        }

        // The event bus stops by itself once it has handled every event the stopped engine
        // published.
        if let Some(event_bus) = self.event_bus.take() {
            if event_bus.join().is_err() {
                log::error!("Event bus thread panicked");
            }
        }
    }
}

/// Errors that prevent a replica from starting.
#[derive(Debug)]
pub enum ReplicaStartError {
    KeyProvider(KeyProviderError),
    Backend(BackendError),
    Transport(TransportError),
}

impl From<KeyProviderError> for ReplicaStartError {
    fn from(value: KeyProviderError) -> Self {
        ReplicaStartError::KeyProvider(value)
    }
}

impl From<BackendError> for ReplicaStartError {
    fn from(value: BackendError) -> Self {
        ReplicaStartError::Backend(value)
    }
}

impl From<TransportError> for ReplicaStartError {
    fn from(value: TransportError) -> Self {
        ReplicaStartError::Transport(value)
    }
}
