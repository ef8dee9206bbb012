/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The IBFT round engine.
//!
//! The engine thread owns a single [`Ibft`](ibft::Ibft) participant and drains a single inbox of
//! consensus messages filled by the [transport](crate::networking::transport). Every height proceeds
//! through rounds numbered from 0. Round `r` lasts
//! [`round_timeout(r)`](crate::config::Configuration::round_timeout); if no block is finalized by then,
//! the engine moves to round `r + 1`.
//!
//! Messages are handled according to their view:
//! - Messages for earlier heights, or for earlier rounds of the current height, are dropped, and so are
//!   messages for heights more than [`MAX_FUTURE_HEIGHTS`](ibft::MAX_FUTURE_HEIGHTS) above the current
//!   one.
//! - Every remaining message must be signed by its `from` address, and `from` must be in the validator
//!   set of the current height.
//! - Messages for later heights, and messages other than round changes for later rounds of the current
//!   height, are buffered until the engine reaches their view. The buffer is bounded by
//!   [`message_buffer_capacity`](crate::config::Configuration::message_buffer_capacity), split evenly
//!   between the validators; messages that do not fit are dropped.
//!
//! The engine does not need a lock on the validator set: it is the only writer of the
//! [`ValidatorSetHistory`](crate::types::validator_set::ValidatorSetHistory), into which it publishes
//! the validator set changes of every block it finalizes.

pub mod backend;

pub(crate) mod ibft;

pub(crate) mod state;

pub(crate) mod validation;

pub use backend::{Backend, BackendError};

use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::networking::{messages::ConsensusMessage, transport::Transport};

use ibft::Ibft;

// Upper bound on how long the engine thread waits before checking the shutdown signal.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

pub(crate) fn start_engine<T: Transport, B: Backend>(
    mut ibft: Ibft<T, B>,
    inbox: Receiver<ConsensusMessage>,
    shutdown_signal: Receiver<()>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        ibft.start();

        loop {
            match shutdown_signal.try_recv() {
                Ok(()) | Err(TryRecvError::Disconnected) => return,
                Err(TryRecvError::Empty) => (),
            }

            let deadline = ibft.round_deadline();
            let wait = deadline
                .saturating_duration_since(Instant::now())
                .min(POLL_INTERVAL);

            match inbox.recv_timeout(wait) {
                Ok(message) => ibft.on_receive_msg(message),
                Err(RecvTimeoutError::Timeout) => (),
                // The transport has stopped delivering. Keep running rounds until shutdown.
                Err(RecvTimeoutError::Disconnected) => thread::sleep(wait),
            }

            if Instant::now() >= ibft.round_deadline() {
                ibft.on_round_timeout();
            }
        }
    })
}
