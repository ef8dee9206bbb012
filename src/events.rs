/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Events emitted by the round engine.
//!
//! An event for a given action indicates that the action has been completed. Every event carries the
//! time it was emitted. Events are passed to the [event bus](crate::event_bus) thread, which logs them
//! (if [enabled](crate::config::Configuration::log_events)) and invokes the handlers registered on the
//! [`ReplicaSpec`](crate::replica::ReplicaSpec).

use std::sync::mpsc::Sender;
use std::time::SystemTime;

use crate::networking::messages::MessageType;
use crate::types::{
    data_types::{Address, BlockHeight, CryptoHash, Round, View},
    validator_set::ValidatorSetDelta,
};

pub enum Event {
    // Round progress.
    StartRound(StartRoundEvent),
    RoundTimeout(RoundTimeoutEvent),
    RoundChange(RoundChangeEvent),
    // Messages.
    Propose(ProposeEvent),
    ReceiveMessage(ReceiveMessageEvent),
    DropMessage(DropMessageEvent),
    CollectQuorum(CollectQuorumEvent),
    // Finality.
    FinalizeBlock(FinalizeBlockEvent),
    UpdateValidatorSet(UpdateValidatorSetEvent),
}

impl Event {
    pub(crate) fn publish(event_publisher: &Option<Sender<Event>>, event: Event) {
        if let Some(event_publisher) = event_publisher {
            // The event bus only hangs up during shutdown.
            let _ = event_publisher.send(event);
        }
    }
}

/// The replica entered `view`.
pub struct StartRoundEvent {
    pub timestamp: SystemTime,
    pub view: View,
}

/// No block was finalized in `view` before its deadline.
pub struct RoundTimeoutEvent {
    pub timestamp: SystemTime,
    pub view: View,
}

/// A quorum of round change messages moved the replica from `view` to `new_round`.
pub struct RoundChangeEvent {
    pub timestamp: SystemTime,
    pub view: View,
    pub new_round: Round,
}

/// The replica, as proposer, multicast a proposal.
pub struct ProposeEvent {
    pub timestamp: SystemTime,
    pub view: View,
    pub proposal_hash: CryptoHash,
}

/// The round engine accepted a message from `origin`.
pub struct ReceiveMessageEvent {
    pub timestamp: SystemTime,
    pub origin: Address,
    pub view: View,
    pub message_type: MessageType,
}

/// Why a message was dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    WrongChain,
    StaleView,
    /// The message is for a height too far above the current one to be buffered.
    FarFutureView,
    BadSignature,
    NotAValidator,
    InvalidProposal,
    BufferFull,
}

/// The round engine dropped a message claiming to be from `origin`.
pub struct DropMessageEvent {
    pub timestamp: SystemTime,
    pub origin: Address,
    pub view: View,
    pub message_type: MessageType,
    pub reason: DropReason,
}

/// Enough messages of `message_type` were collected in `view` to reach a quorum.
pub struct CollectQuorumEvent {
    pub timestamp: SystemTime,
    pub view: View,
    pub message_type: MessageType,
    pub signers: usize,
}

/// A block was finalized and handed to the backend.
pub struct FinalizeBlockEvent {
    pub timestamp: SystemTime,
    pub number: BlockHeight,
    pub round: Round,
    pub hash: CryptoHash,
}

/// A new validator set snapshot was published.
pub struct UpdateValidatorSetEvent {
    pub timestamp: SystemTime,
    pub activation: BlockHeight,
    pub delta: ValidatorSetDelta,
}
