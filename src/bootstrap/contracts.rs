/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The root chain contracts that the bridge needs, where their addresses are recorded, and how they
//! are initialized.
//!
//! Every contract is a variant of [`RootContract`]. Recording a deployed address
//! ([`RootchainConfig::record`]) and building a contract's initializer
//! ([`RootContract::initializer`]) are exhaustive matches over the enum, so every contract has a place
//! to record its address and an explicit initialization decision.

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use crate::config::BridgeConfig;
use crate::signer::bls::DOMAIN_VALIDATOR_SET;
use crate::types::data_types::Address;

/// Addresses of the system contracts predeployed on the child chain.
pub mod child_chain {
    use crate::types::data_types::Address;

    const fn system_address(low: u16) -> Address {
        let mut bytes = [0u8; 20];
        bytes[18] = (low >> 8) as u8;
        bytes[19] = low as u8;
        Address::new(bytes)
    }

    pub const VALIDATOR_SET: Address = system_address(0x101);
    pub const CHILD_ERC20: Address = system_address(0x1003);
    pub const CHILD_ERC20_PREDICATE: Address = system_address(0x1004);
    pub const CHILD_ERC721: Address = system_address(0x1005);
    pub const CHILD_ERC721_PREDICATE: Address = system_address(0x1006);
    pub const CHILD_ERC1155: Address = system_address(0x1007);
    pub const CHILD_ERC1155_PREDICATE: Address = system_address(0x1008);
    pub const ROOT_MINTABLE_ERC20_PREDICATE: Address = system_address(0x1009);
    pub const ROOT_MINTABLE_ERC721_PREDICATE: Address = system_address(0x100a);
    pub const ROOT_MINTABLE_ERC1155_PREDICATE: Address = system_address(0x100b);
}

/// Contracts deployed to the root chain by the bridge bootstrap.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RootContract {
    StateSender,
    CheckpointManager,
    Bls,
    Bn256G2,
    ExitHelper,
    RootErc20Predicate,
    ChildMintableErc20Predicate,
    RootErc20,
    Erc20Template,
    RootErc721Predicate,
    ChildMintableErc721Predicate,
    Erc721Template,
    RootErc1155Predicate,
    ChildMintableErc1155Predicate,
    Erc1155Template,
    CustomSupernetManager,
}

impl RootContract {
    /// Contracts that are always deployed, in deployment order. [`RootContract::RootErc20`] is
    /// deployed separately, and only if the child chain's native token is not mintable and no existing
    /// root token was given.
    pub const ALWAYS_DEPLOYED: [RootContract; 15] = [
        RootContract::StateSender,
        RootContract::CheckpointManager,
        RootContract::Bls,
        RootContract::Bn256G2,
        RootContract::ExitHelper,
        RootContract::RootErc20Predicate,
        RootContract::ChildMintableErc20Predicate,
        RootContract::Erc20Template,
        RootContract::RootErc721Predicate,
        RootContract::ChildMintableErc721Predicate,
        RootContract::Erc721Template,
        RootContract::RootErc1155Predicate,
        RootContract::ChildMintableErc1155Predicate,
        RootContract::Erc1155Template,
        RootContract::CustomSupernetManager,
    ];

    pub const fn name(&self) -> &'static str {
        match self {
            RootContract::StateSender => "StateSender",
            RootContract::CheckpointManager => "CheckpointManager",
            RootContract::Bls => "BLS",
            RootContract::Bn256G2 => "BN256G2",
            RootContract::ExitHelper => "ExitHelper",
            RootContract::RootErc20Predicate => "RootERC20Predicate",
            RootContract::ChildMintableErc20Predicate => "ChildERC20MintablePredicate",
            RootContract::RootErc20 => "RootERC20",
            RootContract::Erc20Template => "ERC20Template",
            RootContract::RootErc721Predicate => "RootERC721Predicate",
            RootContract::ChildMintableErc721Predicate => "ChildERC721MintablePredicate",
            RootContract::Erc721Template => "ERC721Template",
            RootContract::RootErc1155Predicate => "RootERC1155Predicate",
            RootContract::ChildMintableErc1155Predicate => "ChildERC1155MintablePredicate",
            RootContract::Erc1155Template => "ERC1155Template",
            RootContract::CustomSupernetManager => "CustomSupernetManager",
        }
    }

    /// Build the `initialize` call of this contract from the deployed addresses in `config`, or `None`
    /// if the contract needs no initialization.
    pub fn initializer(
        &self,
        config: &RootchainConfig,
        settings: &InitializerSettings,
    ) -> Option<InitializeCall> {
        match self {
            RootContract::CustomSupernetManager => Some(InitializeCall::CustomSupernetManager {
                contract: config.custom_supernet_manager_address,
                stake_manager: config.stake_manager_address,
                bls: config.bls_address,
                state_sender: config.state_sender_address,
                stake_token: settings.stake_token_address,
                child_validator_set: child_chain::VALIDATOR_SET,
                exit_helper: config.exit_helper_address,
                domain: DOMAIN_VALIDATOR_SET.as_bytes().to_vec(),
            }),
            RootContract::ExitHelper => Some(InitializeCall::ExitHelper {
                contract: config.exit_helper_address,
                checkpoint_manager: config.checkpoint_manager_address,
            }),
            RootContract::RootErc20Predicate => Some(InitializeCall::RootErc20Predicate {
                contract: config.root_erc20_predicate_address,
                state_sender: config.state_sender_address,
                exit_helper: config.exit_helper_address,
                child_erc20_predicate: child_chain::CHILD_ERC20_PREDICATE,
                child_token_template: child_chain::CHILD_ERC20,
                // The root native token is mapped only if the child chain's native token is not mintable.
                native_token_root: if settings.native_token_mintable {
                    Address::ZERO
                } else {
                    config.root_native_erc20_address
                },
            }),
            RootContract::ChildMintableErc20Predicate => {
                Some(InitializeCall::ChildMintablePredicate {
                    contract: config.child_mintable_erc20_predicate_address,
                    state_sender: config.state_sender_address,
                    exit_helper: config.exit_helper_address,
                    root_predicate: child_chain::ROOT_MINTABLE_ERC20_PREDICATE,
                    child_token_template: config.child_erc20_address,
                })
            }
            RootContract::RootErc721Predicate => Some(InitializeCall::RootPredicate {
                contract: config.root_erc721_predicate_address,
                state_sender: config.state_sender_address,
                exit_helper: config.exit_helper_address,
                child_predicate: child_chain::CHILD_ERC721_PREDICATE,
                child_token_template: child_chain::CHILD_ERC721,
            }),
            RootContract::ChildMintableErc721Predicate => {
                Some(InitializeCall::ChildMintablePredicate {
                    contract: config.child_mintable_erc721_predicate_address,
                    state_sender: config.state_sender_address,
                    exit_helper: config.exit_helper_address,
                    root_predicate: child_chain::ROOT_MINTABLE_ERC721_PREDICATE,
                    child_token_template: config.child_erc721_address,
                })
            }
            RootContract::RootErc1155Predicate => Some(InitializeCall::RootPredicate {
                contract: config.root_erc1155_predicate_address,
                state_sender: config.state_sender_address,
                exit_helper: config.exit_helper_address,
                child_predicate: child_chain::CHILD_ERC1155_PREDICATE,
                child_token_template: child_chain::CHILD_ERC1155,
            }),
            RootContract::ChildMintableErc1155Predicate => {
                Some(InitializeCall::ChildMintablePredicate {
                    contract: config.child_mintable_erc1155_predicate_address,
                    state_sender: config.state_sender_address,
                    exit_helper: config.exit_helper_address,
                    root_predicate: child_chain::ROOT_MINTABLE_ERC1155_PREDICATE,
                    child_token_template: config.child_erc1155_address,
                })
            }
            RootContract::StateSender
            | RootContract::CheckpointManager
            | RootContract::Bls
            | RootContract::Bn256G2
            | RootContract::RootErc20
            | RootContract::Erc20Template
            | RootContract::Erc721Template
            | RootContract::Erc1155Template => None,
        }
    }
}

impl Display for RootContract {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Deployment settings that initializers depend on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InitializerSettings {
    pub stake_token_address: Address,
    pub native_token_mintable: bool,
}

/// Arguments of a root chain contract's `initialize` function. `contract` is the address the call
/// is sent to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InitializeCall {
    CustomSupernetManager {
        contract: Address,
        stake_manager: Address,
        bls: Address,
        state_sender: Address,
        stake_token: Address,
        child_validator_set: Address,
        exit_helper: Address,
        domain: Vec<u8>,
    },
    ExitHelper {
        contract: Address,
        checkpoint_manager: Address,
    },
    RootErc20Predicate {
        contract: Address,
        state_sender: Address,
        exit_helper: Address,
        child_erc20_predicate: Address,
        child_token_template: Address,
        native_token_root: Address,
    },
    RootPredicate {
        contract: Address,
        state_sender: Address,
        exit_helper: Address,
        child_predicate: Address,
        child_token_template: Address,
    },
    ChildMintablePredicate {
        contract: Address,
        state_sender: Address,
        exit_helper: Address,
        root_predicate: Address,
        child_token_template: Address,
    },
}

impl InitializeCall {
    pub fn contract(&self) -> Address {
        match self {
            InitializeCall::CustomSupernetManager { contract, .. }
            | InitializeCall::ExitHelper { contract, .. }
            | InitializeCall::RootErc20Predicate { contract, .. }
            | InitializeCall::RootPredicate { contract, .. }
            | InitializeCall::ChildMintablePredicate { contract, .. } => *contract,
        }
    }
}

/// Addresses of the deployed root chain contracts.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RootchainConfig {
    pub json_rpc_address: String,
    pub state_sender_address: Address,
    pub checkpoint_manager_address: Address,
    pub bls_address: Address,
    pub bn256_g2_address: Address,
    pub exit_helper_address: Address,
    pub root_erc20_predicate_address: Address,
    pub child_mintable_erc20_predicate_address: Address,
    pub root_native_erc20_address: Address,
    pub child_erc20_address: Address,
    pub root_erc721_predicate_address: Address,
    pub child_mintable_erc721_predicate_address: Address,
    pub child_erc721_address: Address,
    pub root_erc1155_predicate_address: Address,
    pub child_mintable_erc1155_predicate_address: Address,
    pub child_erc1155_address: Address,
    pub custom_supernet_manager_address: Address,
    pub stake_manager_address: Address,
}

impl RootchainConfig {
    /// Record that `contract` is deployed at `address`.
    pub fn record(&mut self, contract: RootContract, address: Address) {
        let field = match contract {
            RootContract::StateSender => &mut self.state_sender_address,
            RootContract::CheckpointManager => &mut self.checkpoint_manager_address,
            RootContract::Bls => &mut self.bls_address,
            RootContract::Bn256G2 => &mut self.bn256_g2_address,
            RootContract::ExitHelper => &mut self.exit_helper_address,
            RootContract::RootErc20Predicate => &mut self.root_erc20_predicate_address,
            RootContract::ChildMintableErc20Predicate => {
                &mut self.child_mintable_erc20_predicate_address
            }
            RootContract::RootErc20 => &mut self.root_native_erc20_address,
            RootContract::Erc20Template => &mut self.child_erc20_address,
            RootContract::RootErc721Predicate => &mut self.root_erc721_predicate_address,
            RootContract::ChildMintableErc721Predicate => {
                &mut self.child_mintable_erc721_predicate_address
            }
            RootContract::Erc721Template => &mut self.child_erc721_address,
            RootContract::RootErc1155Predicate => &mut self.root_erc1155_predicate_address,
            RootContract::ChildMintableErc1155Predicate => {
                &mut self.child_mintable_erc1155_predicate_address
            }
            RootContract::Erc1155Template => &mut self.child_erc1155_address,
            RootContract::CustomSupernetManager => &mut self.custom_supernet_manager_address,
        };
        *field = address;
    }

    /// Build the bridge configuration of the child chain, with event tracking of the state sender
    /// starting from root chain block `start_block`.
    pub fn to_bridge_config(&self, stake_token_address: Address, start_block: u64) -> BridgeConfig {
        let mut event_tracker_start_blocks = BTreeMap::new();
        event_tracker_start_blocks.insert(self.state_sender_address, start_block);

        BridgeConfig {
            state_sender_address: self.state_sender_address,
            checkpoint_manager_address: self.checkpoint_manager_address,
            exit_helper_address: self.exit_helper_address,
            root_erc20_predicate_address: self.root_erc20_predicate_address,
            child_mintable_erc20_predicate_address: self.child_mintable_erc20_predicate_address,
            root_native_erc20_address: self.root_native_erc20_address,
            root_erc721_predicate_address: self.root_erc721_predicate_address,
            child_mintable_erc721_predicate_address: self.child_mintable_erc721_predicate_address,
            root_erc1155_predicate_address: self.root_erc1155_predicate_address,
            child_mintable_erc1155_predicate_address: self.child_mintable_erc1155_predicate_address,
            child_erc20_address: self.child_erc20_address,
            child_erc721_address: self.child_erc721_address,
            child_erc1155_address: self.child_erc1155_address,
            custom_supernet_manager_address: self.custom_supernet_manager_address,
            stake_manager_address: self.stake_manager_address,
            stake_token_address,
            bls_address: self.bls_address,
            bn256_g2_address: self.bn256_g2_address,
            json_rpc_endpoint: self.json_rpc_address.clone(),
            event_tracker_start_blocks,
        }
    }
}
