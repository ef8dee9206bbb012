/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Gossip transport for consensus and bridge messages.
//!
//! ## Inbound policy
//!
//! Messages received on the consensus topic are decoded and handed to the round engine through a
//! bounded channel. A message is dropped, with a log line and without an error, if:
//! 1. The local replica is not currently an active validator.
//! 2. The message does not decode as a [`ConsensusMessage`].
//! 3. The round engine's inbox is full.
//!
//! ## Outbound policy
//!
//! [`multicast`](ConsensusTransport::multicast) is best effort. A publish failure is logged as a
//! warning and otherwise ignored: the round engine recovers lost messages through round timeouts.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc::{SyncSender, TrySendError},
    Arc,
};

use borsh::{BorshDeserialize, BorshSerialize};

use crate::types::crypto_primitives::PeerId;

use super::{
    messages::{BridgeMessage, ConsensusMessage, BRIDGE_TOPIC, CONSENSUS_TOPIC},
    network::{Network, NetworkError, Topic},
};

/// Sends consensus messages to every validator.
pub trait Transport: Send + 'static {
    fn multicast(&self, message: &ConsensusMessage);
}

/// Sends bridge messages to every validator.
pub trait BridgeTransport: Send + 'static {
    fn multicast_bridge(&self, message: &BridgeMessage);
}

/// The topics a replica gossips on. The topics are closed when the last clone is dropped.
pub struct ConsensusTransport<T: Topic> {
    topics: Arc<Topics<T>>,
}

impl<T: Topic> Clone for ConsensusTransport<T> {
    fn clone(&self) -> Self {
        Self {
            topics: self.topics.clone(),
        }
    }
}

struct Topics<T: Topic> {
    consensus: T,
    bridge: Option<T>,
}

impl<T: Topic> Drop for Topics<T> {
    fn drop(&mut self) {
        self.consensus.close();
        if let Some(bridge) = &self.bridge {
            bridge.close();
        }
    }
}

impl<T: Topic> ConsensusTransport<T> {
    /// Open the consensus topic, and the bridge topic if `bridge_enabled`.
    ///
    /// Failing to open a topic is fatal: a replica cannot take part in consensus without it.
    pub fn create_topics<N: Network<Topic = T>>(
        network: &mut N,
        bridge_enabled: bool,
    ) -> Result<ConsensusTransport<T>, TransportError> {
        let bridge = if bridge_enabled {
            let topic = network
                .new_topic(BRIDGE_TOPIC)
                .map_err(TransportError::BridgeTopic)?;
            Some(topic)
        } else {
            None
        };

        let consensus = network
            .new_topic(CONSENSUS_TOPIC)
            .map_err(TransportError::ConsensusTopic)?;

        Ok(ConsensusTransport {
            topics: Arc::new(Topics { consensus, bridge }),
        })
    }

    /// Check whether the bridge topic is open.
    pub fn is_bridge_enabled(&self) -> bool {
        self.topics.bridge.is_some()
    }

    /// Deliver every decodable consensus message to `inbox`, as long as `is_active_validator` is set.
    pub fn subscribe(
        &self,
        is_active_validator: Arc<AtomicBool>,
        inbox: SyncSender<ConsensusMessage>,
    ) -> Result<(), TransportError> {
        let handler = move |bytes: &[u8], _peer: PeerId| {
            if !is_active_validator.load(Ordering::Acquire) {
                return;
            }

            let message = match <ConsensusMessage>::try_from_slice(bytes) {
                Ok(message) => message,
                Err(err) => {
                    log::error!("Consensus engine: cannot decode consensus message: {}", err);
                    return;
                }
            };

            log::debug!(
                "Validator message received: type: {:?}, view: {}, from: {}",
                message.message_type(),
                message.view,
                message.from
            );

            match inbox.try_send(message) {
                Ok(()) => (),
                Err(TrySendError::Full(message)) => log::debug!(
                    "Consensus engine inbox full, dropping {:?} from {}",
                    message.message_type(),
                    message.from
                ),
                Err(TrySendError::Disconnected(_)) => (),
            }
        };

        self.topics
            .consensus
            .subscribe(Box::new(handler))
            .map_err(TransportError::Subscribe)
    }
}

impl<T: Topic> Transport for ConsensusTransport<T> {
    fn multicast(&self, message: &ConsensusMessage) {
        let bytes = match message.try_to_vec() {
            Ok(bytes) => bytes,
            Err(err) => {
                log::warn!("Failed to encode consensus message: {}", err);
                return;
            }
        };

        if let Err(err) = self.topics.consensus.publish(bytes) {
            log::warn!("Failed to multicast consensus message: {:?}", err);
        }
    }
}

impl<T: Topic> BridgeTransport for ConsensusTransport<T> {
    fn multicast_bridge(&self, message: &BridgeMessage) {
        let Some(bridge_topic) = &self.topics.bridge else {
            log::debug!("Bridge is disabled, dropping bridge message from {}", message.from);
            return;
        };

        let bytes = match message.try_to_vec() {
            Ok(bytes) => bytes,
            Err(err) => {
                log::warn!("Failed to encode bridge message: {}", err);
                return;
            }
        };

        if let Err(err) = bridge_topic.publish(bytes) {
            log::warn!("Failed to multicast bridge message: {:?}", err);
        }
    }
}

/// Errors that prevent the transport from starting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    ConsensusTopic(NetworkError),
    BridgeTopic(NetworkError),
    Subscribe(NetworkError),
}
