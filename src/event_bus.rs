/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The event bus thread, which invokes event handlers off the round engine's thread.

use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::events::*;
use crate::logging::Logger;

pub(crate) type HandlerPtr<T> = Box<dyn Fn(&T) + Send>;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Default)]
pub(crate) struct EventHandlers {
    pub(crate) start_round_handlers: Vec<HandlerPtr<StartRoundEvent>>,
    pub(crate) round_timeout_handlers: Vec<HandlerPtr<RoundTimeoutEvent>>,
    pub(crate) round_change_handlers: Vec<HandlerPtr<RoundChangeEvent>>,
    pub(crate) propose_handlers: Vec<HandlerPtr<ProposeEvent>>,
    pub(crate) receive_message_handlers: Vec<HandlerPtr<ReceiveMessageEvent>>,
    pub(crate) drop_message_handlers: Vec<HandlerPtr<DropMessageEvent>>,
    pub(crate) collect_quorum_handlers: Vec<HandlerPtr<CollectQuorumEvent>>,
    pub(crate) finalize_block_handlers: Vec<HandlerPtr<FinalizeBlockEvent>>,
    pub(crate) update_validator_set_handlers: Vec<HandlerPtr<UpdateValidatorSetEvent>>,
}

impl EventHandlers {
    /// Prepend the default logger of every event type to its handlers.
    pub(crate) fn with_loggers(mut self) -> Self {
        self.start_round_handlers.insert(0, StartRoundEvent::get_logger());
        self.round_timeout_handlers.insert(0, RoundTimeoutEvent::get_logger());
        self.round_change_handlers.insert(0, RoundChangeEvent::get_logger());
        self.propose_handlers.insert(0, ProposeEvent::get_logger());
        self.receive_message_handlers.insert(0, ReceiveMessageEvent::get_logger());
        self.drop_message_handlers.insert(0, DropMessageEvent::get_logger());
        self.collect_quorum_handlers.insert(0, CollectQuorumEvent::get_logger());
        self.finalize_block_handlers.insert(0, FinalizeBlockEvent::get_logger());
        self.update_validator_set_handlers
            .insert(0, UpdateValidatorSetEvent::get_logger());
        self
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.start_round_handlers.is_empty()
            && self.round_timeout_handlers.is_empty()
            && self.round_change_handlers.is_empty()
            && self.propose_handlers.is_empty()
            && self.receive_message_handlers.is_empty()
            && self.drop_message_handlers.is_empty()
            && self.collect_quorum_handlers.is_empty()
            && self.finalize_block_handlers.is_empty()
            && self.update_validator_set_handlers.is_empty()
    }

    pub(crate) fn fire_handlers(&self, event: Event) {
        match event {
            Event::StartRound(event) => self.start_round_handlers.iter().for_each(|h| h(&event)),
            Event::RoundTimeout(event) => self.round_timeout_handlers.iter().for_each(|h| h(&event)),
            Event::RoundChange(event) => self.round_change_handlers.iter().for_each(|h| h(&event)),
            Event::Propose(event) => self.propose_handlers.iter().for_each(|h| h(&event)),
            Event::ReceiveMessage(event) => {
                self.receive_message_handlers.iter().for_each(|h| h(&event))
            }
            Event::DropMessage(event) => self.drop_message_handlers.iter().for_each(|h| h(&event)),
            Event::CollectQuorum(event) => {
                self.collect_quorum_handlers.iter().for_each(|h| h(&event))
            }
            Event::FinalizeBlock(event) => {
                self.finalize_block_handlers.iter().for_each(|h| h(&event))
            }
            Event::UpdateValidatorSet(event) => self
                .update_validator_set_handlers
                .iter()
                .for_each(|h| h(&event)),
        }
    }
}

pub(crate) fn start_event_bus(
    event_handlers: EventHandlers,
    event_subscriber: Receiver<Event>,
    shutdown_signal: Receiver<()>,
) -> JoinHandle<()> {
    thread::spawn(move || loop {
        match shutdown_signal.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => return,
            Err(TryRecvError::Empty) => (),
        }

        match event_subscriber.recv_timeout(POLL_INTERVAL) {
            Ok(event) => event_handlers.fire_handlers(event),
            Err(RecvTimeoutError::Timeout) => (),
            // The round engine has exited.
            Err(RecvTimeoutError::Disconnected) => return,
        }
    })
}
