use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{sync_channel, TryRecvError},
        Arc, Barrier,
    },
    thread,
};

use borsh::{BorshDeserialize, BorshSerialize};
use log::LevelFilter;
use polybft_rs::{
    networking::{
        messages::{
            BridgeMessage, ConsensusMessage, MessagePayload, PrepareData, BRIDGE_TOPIC,
            CONSENSUS_TOPIC,
        },
        network::{Network, NetworkError, Topic},
        transport::{BridgeTransport, ConsensusTransport, Transport, TransportError},
    },
    types::data_types::{Address, BlockHeight, ChainID, CryptoHash, Round, View},
};

mod common;

use crate::common::{logging::setup_logger, network::mock_network};

fn prepare_message(height: u64) -> ConsensusMessage {
    ConsensusMessage::new(
        ChainID::new(100),
        View::new(BlockHeight::new(height), Round::new(0)),
        MessagePayload::Prepare(PrepareData {
            proposal_hash: CryptoHash::new([2; 32]),
        }),
    )
}

#[test]
fn bridge_topic_opened_only_when_enabled_test() {
    setup_logger(LevelFilter::Debug);

    let mut networks = mock_network(2);

    let without_bridge = ConsensusTransport::create_topics(&mut networks[0], false).unwrap();
    assert!(!without_bridge.is_bridge_enabled());
    assert_eq!(networks[0].opened_topics(), vec![CONSENSUS_TOPIC.to_string()]);

    let with_bridge = ConsensusTransport::create_topics(&mut networks[1], true).unwrap();
    assert!(with_bridge.is_bridge_enabled());
    assert_eq!(
        networks[1].opened_topics(),
        vec![BRIDGE_TOPIC.to_string(), CONSENSUS_TOPIC.to_string()]
    );
}

#[test]
fn failing_topic_is_fatal_test() {
    let mut networks = mock_network(1);

    let mut no_consensus = networks[0].clone().with_failing_topic(CONSENSUS_TOPIC);
    assert_eq!(
        ConsensusTransport::create_topics(&mut no_consensus, false).err(),
        Some(TransportError::ConsensusTopic(
            NetworkError::TopicUnavailable(CONSENSUS_TOPIC.to_string())
        ))
    );

    let mut no_bridge = networks.remove(0).with_failing_topic(BRIDGE_TOPIC);
    assert_eq!(
        ConsensusTransport::create_topics(&mut no_bridge, true).err(),
        Some(TransportError::BridgeTopic(NetworkError::TopicUnavailable(
            BRIDGE_TOPIC.to_string()
        )))
    );

    // The bridge topic is not needed when the bridge is disabled.
    assert!(ConsensusTransport::create_topics(&mut no_bridge, false).is_ok());
}

#[test]
fn multicast_delivers_to_other_peers_test() {
    let mut networks = mock_network(3);
    let transports: Vec<_> = networks
        .iter_mut()
        .map(|network| ConsensusTransport::create_topics(network, false).unwrap())
        .collect();

    let inboxes: Vec<_> = transports
        .iter()
        .map(|transport| {
            let (sender, receiver) = sync_channel(16);
            transport
                .subscribe(Arc::new(AtomicBool::new(true)), sender)
                .unwrap();
            receiver
        })
        .collect();

    let message = prepare_message(1);
    transports[0].multicast(&message);

    // The sender does not receive its own message.
    assert_eq!(inboxes[0].try_recv(), Err(TryRecvError::Empty));
    assert_eq!(inboxes[1].try_recv(), Ok(message.clone()));
    assert_eq!(inboxes[2].try_recv(), Ok(message));
}

#[test]
fn inactive_validator_drops_messages_test() {
    let mut networks = mock_network(2);
    let sender = ConsensusTransport::create_topics(&mut networks[0], false).unwrap();
    let receiver = ConsensusTransport::create_topics(&mut networks[1], false).unwrap();

    let is_active_validator = Arc::new(AtomicBool::new(false));
    let (inbox_sender, inbox) = sync_channel(16);
    receiver
        .subscribe(is_active_validator.clone(), inbox_sender)
        .unwrap();

    sender.multicast(&prepare_message(1));
    assert_eq!(inbox.try_recv(), Err(TryRecvError::Empty));

    is_active_validator.store(true, Ordering::Release);
    sender.multicast(&prepare_message(2));
    assert_eq!(inbox.try_recv(), Ok(prepare_message(2)));
}

#[test]
fn undecodable_and_overflowing_messages_are_dropped_test() {
    let mut networks = mock_network(2);
    let raw_topic = networks[0].clone().new_topic(CONSENSUS_TOPIC).unwrap();
    let receiver = ConsensusTransport::create_topics(&mut networks[1], false).unwrap();

    let (inbox_sender, inbox) = sync_channel(1);
    receiver
        .subscribe(Arc::new(AtomicBool::new(true)), inbox_sender)
        .unwrap();

    raw_topic.publish(vec![0xde, 0xad, 0xbe, 0xef]).unwrap();
    assert_eq!(inbox.try_recv(), Err(TryRecvError::Empty));

    // Only the first of two messages fits into an inbox of capacity 1.
    let sender = ConsensusTransport::create_topics(&mut networks[0], false).unwrap();
    sender.multicast(&prepare_message(1));
    sender.multicast(&prepare_message(2));
    assert_eq!(inbox.try_recv(), Ok(prepare_message(1)));
    assert_eq!(inbox.try_recv(), Err(TryRecvError::Empty));
}

#[test]
fn multicast_failure_is_not_fatal_test() {
    let mut networks = mock_network(1);
    let mut failing = networks.remove(0).with_failing_publish();
    let transport = ConsensusTransport::create_topics(&mut failing, true).unwrap();

    transport.multicast(&prepare_message(1));
    transport.multicast_bridge(&BridgeMessage {
        hash: CryptoHash::new([1; 32]),
        signature: vec![0; 96],
        from: Address::new([1; 20]),
        epoch_number: 1,
    });
}

#[test]
fn dropping_last_transport_closes_topics_test() {
    let mut networks = mock_network(2);
    let transport = ConsensusTransport::create_topics(&mut networks[0], false).unwrap();
    let receiver = ConsensusTransport::create_topics(&mut networks[1], false).unwrap();

    let (inbox_sender, inbox) = sync_channel(16);
    receiver
        .subscribe(Arc::new(AtomicBool::new(true)), inbox_sender)
        .unwrap();

    let handle = receiver.clone();
    drop(receiver);

    // A clone keeps the topics open.
    transport.multicast(&prepare_message(1));
    assert_eq!(inbox.try_recv(), Ok(prepare_message(1)));

    drop(handle);
    transport.multicast(&prepare_message(2));
    assert_eq!(inbox.try_recv(), Err(TryRecvError::Empty));
}

#[test]
fn deeply_nested_payload_is_dropped_test() {
    // Each level claims to be a round change whose prepared certificate holds another envelope.
    let mut level = (
        ChainID::new(100),
        View::new(BlockHeight::new(1), Round::new(1)),
        Address::new([9; 20]),
    )
        .try_to_vec()
        .unwrap();
    level.extend([3, 1]);
    let nested: Vec<u8> = level.repeat(20_000);

    // Decoding on a thread with a small stack, as gossip delivery threads may have.
    let decoded = {
        let nested = nested.clone();
        thread::Builder::new()
            .stack_size(256 * 1024)
            .spawn(move || <ConsensusMessage>::try_from_slice(&nested).is_ok())
            .unwrap()
            .join()
            .unwrap()
    };
    assert!(!decoded);

    let mut networks = mock_network(2);
    let raw_topic = networks[0].clone().new_topic(CONSENSUS_TOPIC).unwrap();
    let receiver = ConsensusTransport::create_topics(&mut networks[1], false).unwrap();

    let (inbox_sender, inbox) = sync_channel(16);
    receiver
        .subscribe(Arc::new(AtomicBool::new(true)), inbox_sender)
        .unwrap();

    raw_topic.publish(nested).unwrap();
    assert_eq!(inbox.try_recv(), Err(TryRecvError::Empty));

    // The receiver still accepts well-formed messages.
    let sender = ConsensusTransport::create_topics(&mut networks[0], false).unwrap();
    sender.multicast(&prepare_message(1));
    assert_eq!(inbox.try_recv(), Ok(prepare_message(1)));
}

#[test]
fn concurrently_dropped_clones_close_topics_test() {
    let mut networks = mock_network(2);
    let sender = ConsensusTransport::create_topics(&mut networks[0], false).unwrap();
    let receiver = ConsensusTransport::create_topics(&mut networks[1], false).unwrap();

    let (inbox_sender, inbox) = sync_channel(16);
    receiver
        .subscribe(Arc::new(AtomicBool::new(true)), inbox_sender)
        .unwrap();

    let clones = 8;
    let barrier = Arc::new(Barrier::new(clones));
    let handles: Vec<_> = (0..clones)
        .map(|_| {
            let transport = receiver.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                drop(transport);
            })
        })
        .collect();
    drop(receiver);
    for handle in handles {
        handle.join().unwrap();
    }

    sender.multicast(&prepare_message(1));
    assert_eq!(inbox.try_recv(), Err(TryRecvError::Empty));
}
