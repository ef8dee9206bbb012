/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The pluggable gossip network.
//!
//! The consensus core does not discover peers or manage connections. It only needs a way to open
//! named publish/subscribe [`Topic`]s, which library users provide by implementing [`Network`].

use crate::types::crypto_primitives::PeerId;

/// Callback invoked once per message received on a topic, with the bytes of the message and the
/// peer that relayed it.
///
/// Handlers may be invoked concurrently from the gossip layer's delivery threads, and must not block.
pub type TopicHandler = Box<dyn Fn(&[u8], PeerId) + Send + Sync>;

pub trait Network: Clone + Send + 'static {
    type Topic: Topic;

    /// Open the gossip topic identified by `protocol`.
    fn new_topic(&mut self, protocol: &str) -> Result<Self::Topic, NetworkError>;
}

pub trait Topic: Send + Sync + 'static {
    /// Publish `message` to every peer subscribed to this topic, without blocking.
    fn publish(&self, message: Vec<u8>) -> Result<(), PublishError>;

    /// Register `handler` to be invoked on every message received on this topic.
    fn subscribe(&self, handler: TopicHandler) -> Result<(), NetworkError>;

    /// Stop delivering messages to this topic's handlers.
    fn close(&self);
}

/// Errors from opening or subscribing to a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    TopicUnavailable(String),
    SubscriptionFailed(String),
}

/// Errors from publishing a message to a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    TopicClosed,
    Other(String),
}
