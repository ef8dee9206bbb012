use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use polybft_rs::{
    networking::network::{Network, NetworkError, PublishError, Topic, TopicHandler},
    types::crypto_primitives::{PeerId, PeerSigningKey},
};
use rand_core::OsRng;

struct Subscription {
    peer: PeerId,
    handler: Arc<TopicHandler>,
    open: Arc<AtomicBool>,
}

#[derive(Default)]
struct Hub {
    subscriptions: HashMap<String, Vec<Subscription>>,
    opened_topics: Vec<(PeerId, String)>,
}

/// An in-memory gossip network. Publishing on a topic synchronously invokes the handlers of every
/// other peer subscribed to the same topic.
#[derive(Clone)]
pub(crate) struct GossipNetworkStub {
    peer: PeerId,
    hub: Arc<Mutex<Hub>>,
    failing_topics: HashSet<String>,
    failing_publish: bool,
}

impl GossipNetworkStub {
    /// Make opening the topic `protocol` fail on this peer.
    pub(crate) fn with_failing_topic(mut self, protocol: &str) -> Self {
        self.failing_topics.insert(protocol.to_string());
        self
    }

    /// Make every publish on this peer's topics fail.
    pub(crate) fn with_failing_publish(mut self) -> Self {
        self.failing_publish = true;
        self
    }

    pub(crate) fn peer(&self) -> PeerId {
        self.peer
    }

    /// Get the protocols of the topics this peer opened, in order.
    pub(crate) fn opened_topics(&self) -> Vec<String> {
        self.hub
            .lock()
            .unwrap()
            .opened_topics
            .iter()
            .filter(|(peer, _)| *peer == self.peer)
            .map(|(_, protocol)| protocol.clone())
            .collect()
    }
}

impl Network for GossipNetworkStub {
    type Topic = TopicStub;

    fn new_topic(&mut self, protocol: &str) -> Result<Self::Topic, NetworkError> {
        if self.failing_topics.contains(protocol) {
            return Err(NetworkError::TopicUnavailable(protocol.to_string()));
        }

        self.hub
            .lock()
            .unwrap()
            .opened_topics
            .push((self.peer, protocol.to_string()));

        Ok(TopicStub {
            protocol: protocol.to_string(),
            peer: self.peer,
            hub: self.hub.clone(),
            open: Arc::new(AtomicBool::new(true)),
            failing_publish: self.failing_publish,
        })
    }
}

pub(crate) struct TopicStub {
    protocol: String,
    peer: PeerId,
    hub: Arc<Mutex<Hub>>,
    open: Arc<AtomicBool>,
    failing_publish: bool,
}

impl TopicStub {
    pub(crate) fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

impl Topic for TopicStub {
    fn publish(&self, message: Vec<u8>) -> Result<(), PublishError> {
        if !self.is_open() {
            return Err(PublishError::TopicClosed);
        }
        if self.failing_publish {
            return Err(PublishError::Other("publish failed".to_string()));
        }

        // Collect the handlers first, so that handlers run without holding the hub's lock.
        let handlers: Vec<Arc<TopicHandler>> = self
            .hub
            .lock()
            .unwrap()
            .subscriptions
            .get(&self.protocol)
            .map(|subscriptions| {
                subscriptions
                    .iter()
                    .filter(|s| s.peer != self.peer && s.open.load(Ordering::SeqCst))
                    .map(|s| s.handler.clone())
                    .collect()
            })
            .unwrap_or_default();

        for handler in handlers {
            handler(&message, self.peer);
        }
        Ok(())
    }

    fn subscribe(&self, handler: TopicHandler) -> Result<(), NetworkError> {
        self.hub
            .lock()
            .unwrap()
            .subscriptions
            .entry(self.protocol.clone())
            .or_default()
            .push(Subscription {
                peer: self.peer,
                handler: Arc::new(handler),
                open: self.open.clone(),
            });
        Ok(())
    }

    fn close(&self) {
        self.open.store(false, Ordering::SeqCst)
    }
}

/// Create a gossip network connecting `n` peers.
pub(crate) fn mock_network(n: usize) -> Vec<GossipNetworkStub> {
    let hub = Arc::new(Mutex::new(Hub::default()));
    (0..n)
        .map(|_| GossipNetworkStub {
            peer: PeerSigningKey::generate(&mut OsRng).verifying_key(),
            hub: hub.clone(),
            failing_topics: HashSet::new(),
            failing_publish: false,
        })
        .collect()
}
