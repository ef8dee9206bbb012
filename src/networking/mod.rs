/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Pluggable peer-to-peer (P2P) gossip networking.

pub mod network;

pub mod messages;

pub mod transport;

pub use network::{Network, NetworkError, PublishError, Topic, TopicHandler};
pub use transport::{BridgeTransport, ConsensusTransport, Transport, TransportError};
