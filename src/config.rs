/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! User-defined parameters of a replica.
//!
//! The configuration can be defined using the builder pattern, for example:
//!
//! ```ignore
//! let configuration =
//!     Configuration::builder()
//!     .chain_id(ChainID::new(100))
//!     .base_round_timeout(Duration::from_secs(2))
//!     .max_round_timeout(Duration::from_secs(60))
//!     .message_buffer_capacity(1024)
//!     .log_events(true)
//!     .build()
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use typed_builder::TypedBuilder;

use crate::types::data_types::{Address, ChainID};

/// Stores the user-defined parameters required to start the replica, that is:
/// 1. The [chain ID](crate::types::data_types::ChainID) of the target blockchain.
/// 2. The bridge configuration, if the chain is bridged to a root chain.
/// 3. The base round timeout: the duration of round 0 of every height. Round `r` lasts
///    `base_round_timeout * 2^r`.
/// 4. The maximum round timeout, which caps the duration of late rounds.
/// 5. The message buffer capacity: how many messages for views the round engine has not reached yet
///    may be buffered, and how many messages may wait in the round engine's inbox. Each validator may
///    take up an equal share of the buffer.
/// 6. The "Log Events" flag, if set to "true" then logs should be printed.
///
/// ## Chain ID
///
/// Every consensus message and checkpoint commits to the chain ID, so that messages for one chain
/// are not mistaken for messages for another chain that shares validators.
///
/// ## Round timeouts
///
/// Durations stored in [`Configuration::max_round_timeout`] must be "well below" [u64::MAX] seconds,
/// since callers add them to [`Instant`](std::time::Instant)s.
#[derive(Clone, TypedBuilder)]
#[builder(builder_method(doc = "
    Create a builder for building a [Configuration]. On the builder call the following methods to construct a valid [Configuration].

    Required:
    - `.chain_id(...)`
    - `.base_round_timeout(...)`
    - `.max_round_timeout(...)`
    - `.message_buffer_capacity(...)`
    - `.log_events(...)`

    Optional:
    - `.bridge(...)`
"))]
pub struct Configuration {
    #[builder(setter(doc = "Set the chain ID of the blockchain. Required."))]
    pub chain_id: ChainID,
    #[builder(
        default,
        setter(
            strip_option,
            doc = "Enable the bridge to the root chain with the given configuration. Optional."
        )
    )]
    pub bridge: Option<BridgeConfig>,
    #[builder(setter(doc = "Set the duration of round 0 of every height. Required."))]
    pub base_round_timeout: Duration,
    #[builder(setter(doc = "Set the maximum duration of any round. Required."))]
    pub max_round_timeout: Duration,
    #[builder(setter(doc = "Set the maximum number of buffered consensus messages. Required."))]
    pub message_buffer_capacity: usize,
    #[builder(setter(doc = "Enable logging? Required."))]
    pub log_events: bool,
}

impl Configuration {
    /// Check whether the chain is bridged to a root chain.
    pub fn is_bridge_enabled(&self) -> bool {
        self.bridge.is_some()
    }

    /// Get the duration of `round`: `base_round_timeout * 2^round`, capped at `max_round_timeout`.
    pub fn round_timeout(&self, round: u64) -> Duration {
        let factor = match u32::try_from(round) {
            Ok(exponent) => 2u32.checked_pow(exponent),
            Err(_) => None,
        };
        factor
            .and_then(|factor| self.base_round_timeout.checked_mul(factor))
            .map_or(self.max_round_timeout, |timeout| {
                timeout.min(self.max_round_timeout)
            })
    }
}

/// Addresses of the root chain contracts that the bridge talks to, and the root chain blocks that
/// event tracking starts from.
///
/// Usually written by [`bootstrap_bridge`](crate::bootstrap::bootstrap_bridge) after the root chain
/// contracts are deployed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BridgeConfig {
    pub state_sender_address: Address,
    pub checkpoint_manager_address: Address,
    pub exit_helper_address: Address,
    pub root_erc20_predicate_address: Address,
    pub child_mintable_erc20_predicate_address: Address,
    pub root_native_erc20_address: Address,
    pub root_erc721_predicate_address: Address,
    pub child_mintable_erc721_predicate_address: Address,
    pub root_erc1155_predicate_address: Address,
    pub child_mintable_erc1155_predicate_address: Address,
    pub child_erc20_address: Address,
    pub child_erc721_address: Address,
    pub child_erc1155_address: Address,
    pub custom_supernet_manager_address: Address,
    pub stake_manager_address: Address,
    pub stake_token_address: Address,
    pub bls_address: Address,
    pub bn256_g2_address: Address,
    pub json_rpc_endpoint: String,
    pub event_tracker_start_blocks: BTreeMap<Address, u64>,
}
