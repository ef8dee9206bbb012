/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Functions that log out events.
//!
//! The logs defined in this module are printed if the user enabled them via the replica's
//! [configuration](crate::config::Configuration).
//!
//! This crate logs using the [log](https://docs.rs/log/latest/log/) crate. To get these messages
//! printed onto a terminal or to a file, set up a
//! [logging implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
//!
//! ## Log message format
//!
//! Log messages are CSVs (Comma Separated Values) with at least two values. The first two values are
//! always:
//! 1. The name of the [event](crate::events) in PascalCase (defined in this module as constants).
//! 2. The time the event was emitted (as number of seconds since the Unix Epoch).
//!
//! The rest of the values differ depending on the kind of event. For example, the following snippet
//! is how a [FinalizeBlock](crate::events::FinalizeBlockEvent) is printed:
//!
//! ```text
//! FinalizeBlock, 1701329264, 12, 0, fNGCJyk
//! ```
//!
//! In the snippet:
//! - The third value is the number of the finalized block.
//! - The fourth value is the round in which it was finalized.
//! - The fifth value is the first seven characters of the Base64 encoding of the block's hash.

use std::time::SystemTime;

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};

use crate::events::*;

// Names of each event in PascalCase for printing:
pub const START_ROUND: &str = "StartRound";
pub const ROUND_TIMEOUT: &str = "RoundTimeout";
pub const ROUND_CHANGE: &str = "RoundChange";

pub const PROPOSE: &str = "Propose";
pub const RECEIVE_MESSAGE: &str = "ReceiveMessage";
pub const DROP_MESSAGE: &str = "DropMessage";
pub const COLLECT_QUORUM: &str = "CollectQuorum";

pub const FINALIZE_BLOCK: &str = "FinalizeBlock";
pub const UPDATE_VALIDATOR_SET: &str = "UpdateValidatorSet";

/// Implemented by event types. Used to get a closure that logs the event.
pub(crate) trait Logger {
    /// Returns a pointer to the default logging handler for a given event type.
    fn get_logger() -> Box<dyn Fn(&Self) + Send>;
}

impl Logger for StartRoundEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |start_round_event: &StartRoundEvent| {
            log::info!(
                "{}, {}, {}, {}",
                START_ROUND,
                secs_since_unix_epoch(start_round_event.timestamp),
                start_round_event.view.height,
                start_round_event.view.round
            )
        };
        Box::new(logger)
    }
}

impl Logger for RoundTimeoutEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |round_timeout_event: &RoundTimeoutEvent| {
            log::info!(
                "{}, {}, {}, {}",
                ROUND_TIMEOUT,
                secs_since_unix_epoch(round_timeout_event.timestamp),
                round_timeout_event.view.height,
                round_timeout_event.view.round
            )
        };
        Box::new(logger)
    }
}

impl Logger for RoundChangeEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |round_change_event: &RoundChangeEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                ROUND_CHANGE,
                secs_since_unix_epoch(round_change_event.timestamp),
                round_change_event.view.height,
                round_change_event.view.round,
                round_change_event.new_round
            )
        };
        Box::new(logger)
    }
}

impl Logger for ProposeEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |propose_event: &ProposeEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                PROPOSE,
                secs_since_unix_epoch(propose_event.timestamp),
                propose_event.view.height,
                propose_event.view.round,
                first_seven_base64_chars(&propose_event.proposal_hash.bytes())
            )
        };
        Box::new(logger)
    }
}

impl Logger for ReceiveMessageEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |receive_message_event: &ReceiveMessageEvent| {
            log::info!(
                "{}, {}, {}, {}, {}, {:?}",
                RECEIVE_MESSAGE,
                secs_since_unix_epoch(receive_message_event.timestamp),
                first_seven_base64_chars(&receive_message_event.origin.bytes()),
                receive_message_event.view.height,
                receive_message_event.view.round,
                receive_message_event.message_type
            )
        };
        Box::new(logger)
    }
}

impl Logger for DropMessageEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |drop_message_event: &DropMessageEvent| {
            log::info!(
                "{}, {}, {}, {}, {}, {:?}, {:?}",
                DROP_MESSAGE,
                secs_since_unix_epoch(drop_message_event.timestamp),
                first_seven_base64_chars(&drop_message_event.origin.bytes()),
                drop_message_event.view.height,
                drop_message_event.view.round,
                drop_message_event.message_type,
                drop_message_event.reason
            )
        };
        Box::new(logger)
    }
}

impl Logger for CollectQuorumEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |collect_quorum_event: &CollectQuorumEvent| {
            log::info!(
                "{}, {}, {}, {}, {:?}, {}",
                COLLECT_QUORUM,
                secs_since_unix_epoch(collect_quorum_event.timestamp),
                collect_quorum_event.view.height,
                collect_quorum_event.view.round,
                collect_quorum_event.message_type,
                collect_quorum_event.signers
            )
        };
        Box::new(logger)
    }
}

impl Logger for FinalizeBlockEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |finalize_block_event: &FinalizeBlockEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                FINALIZE_BLOCK,
                secs_since_unix_epoch(finalize_block_event.timestamp),
                finalize_block_event.number,
                finalize_block_event.round,
                first_seven_base64_chars(&finalize_block_event.hash.bytes())
            )
        };
        Box::new(logger)
    }
}

impl Logger for UpdateValidatorSetEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |update_validator_set_event: &UpdateValidatorSetEvent| {
            log::info!(
                "{}, {}, {}, {}, {}, {}",
                UPDATE_VALIDATOR_SET,
                secs_since_unix_epoch(update_validator_set_event.timestamp),
                update_validator_set_event.activation,
                update_validator_set_event.delta.added.len(),
                update_validator_set_event.delta.updated.len(),
                update_validator_set_event.delta.removed.count_ones()
            )
        };
        Box::new(logger)
    }
}

// Get a more readable representation of a bytesequence by base64-encoding it and taking the first 7
// characters.
pub(crate) fn first_seven_base64_chars(bytes: &[u8]) -> String {
    let encoded = STANDARD_NO_PAD.encode(bytes);
    if encoded.len() > 7 {
        encoded[0..7].to_string()
    } else {
        encoded
    }
}

// Events emitted before the Unix Epoch are printed with a timestamp of 0.
fn secs_since_unix_epoch(timestamp: SystemTime) -> u64 {
    timestamp
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or(0)
}
