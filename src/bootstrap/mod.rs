/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Bootstrap of the bridge between the child chain and its root chain.
//!
//! [`bootstrap_bridge`] deploys and initializes the root chain contracts of the bridge, registers the
//! child chain on the stake manager, and returns the [`BridgeConfig`](crate::config::BridgeConfig)
//! that a replica is then [configured](crate::config::Configuration) with. The consensus core only
//! consumes the resulting addresses and event tracker start blocks.

pub mod contracts;

pub mod deploy;

pub mod relayer;

pub use contracts::{child_chain, InitializeCall, InitializerSettings, RootContract, RootchainConfig};
pub use deploy::{
    bootstrap_bridge, deploy_contracts, initialize_contracts, register_chain_on_stake_manager,
    BridgeBootstrap, DeployError, DeployParams, DeployedContract, DeploymentFailure,
};
pub use relayer::{
    AbiError, ContractAbi, Log, Receipt, ReceiptStatus, RelayerError, Transaction, TxRelayer,
};
