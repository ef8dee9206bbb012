/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Deployment, initialization and registration of the root chain contracts.
//!
//! Contracts are deployed concurrently, each on its own scoped thread. The threads share a
//! cancellation flag: the first deployment to fail raises it, and deployments that have not yet
//! sent their transaction see the flag and give up. Whatever did deploy is still returned in the
//! [`DeploymentFailure`] so that the operator can see what landed on the root chain.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crate::config::BridgeConfig;
use crate::signer::wallet::Key;
use crate::types::data_types::{Address, CryptoHash};

use super::contracts::{InitializeCall, InitializerSettings, RootContract, RootchainConfig};
use super::relayer::{AbiError, ContractAbi, Receipt, ReceiptStatus, RelayerError, Transaction, TxRelayer};

/// Parameters of a bridge bootstrap.
#[derive(Clone)]
pub struct DeployParams {
    /// Endpoint of the root chain node, recorded in the resulting [`BridgeConfig`].
    pub json_rpc_address: String,
    /// Whether the child chain's native token is minted on the child chain. If it is, no root chain
    /// token is mapped to it.
    pub native_token_mintable: bool,
    /// Address of an already deployed root chain token to map to the child chain's native token. If
    /// `None` and the native token is not mintable, a new root token is deployed.
    pub root_native_erc20_address: Option<Address>,
    pub stake_token_address: Address,
    pub stake_manager_address: Address,
    /// Key that deploys, initializes and registers the contracts.
    pub deployer: Key,
}

/// A contract deployed to the root chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeployedContract {
    pub contract: RootContract,
    pub address: Address,
    pub transaction_hash: CryptoHash,
    pub gas_used: u64,
}

/// Result of a successful bridge bootstrap.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BridgeBootstrap {
    pub bridge: BridgeConfig,
    /// ID the stake manager assigned to the child chain.
    pub supernet_id: u64,
    pub deployed: Vec<DeployedContract>,
}

/// Deploy the root chain contracts of the bridge, initialize them, register the child chain on the
/// stake manager, and return the bridge configuration of the child chain.
///
/// If `existing` names a state sender that already has code on the root chain, nothing is deployed.
pub fn bootstrap_bridge(
    relayer: &impl TxRelayer,
    abi: &impl ContractAbi,
    params: &DeployParams,
    existing: Option<&BridgeConfig>,
) -> Result<BridgeBootstrap, DeploymentFailure> {
    if let Some(existing) = existing {
        if is_deployed(relayer, existing.state_sender_address)? {
            log::info!("Bridge contracts are already deployed on the root chain, skipping deployment");
            return Err(DeployError::AlreadyDeployed.into());
        }
    }

    // Event tracking starts from the root chain block before the state sender is deployed.
    let start_block = relayer
        .block_number()
        .map_err(|error| DeployError::Relayer { contract: None, error })?;

    let mut config = RootchainConfig {
        json_rpc_address: params.json_rpc_address.clone(),
        stake_manager_address: params.stake_manager_address,
        ..Default::default()
    };

    let mut contracts = RootContract::ALWAYS_DEPLOYED.to_vec();
    if !params.native_token_mintable {
        match params.root_native_erc20_address {
            Some(token) => {
                if !is_deployed(relayer, token)? {
                    return Err(DeployError::TokenNotDeployed(token).into());
                }
                config.record(RootContract::RootErc20, token);
            }
            None => contracts.insert(0, RootContract::RootErc20),
        }
    }

    let deployed = deploy_contracts(relayer, abi, &contracts, &params.deployer)?;
    for contract in &deployed {
        config.record(contract.contract, contract.address);
    }

    let settings = InitializerSettings {
        stake_token_address: params.stake_token_address,
        native_token_mintable: params.native_token_mintable,
    };
    let failure = |error: DeployError| DeploymentFailure {
        partial: deployed.clone(),
        error,
    };

    initialize_contracts(relayer, abi, &config, &settings, &params.deployer).map_err(failure)?;
    let supernet_id =
        register_chain_on_stake_manager(relayer, abi, &config, &params.deployer).map_err(failure)?;

    log::info!("Child chain registered on the stake manager with supernet ID {}", supernet_id);

    Ok(BridgeBootstrap {
        bridge: config.to_bridge_config(params.stake_token_address, start_block),
        supernet_id,
        deployed,
    })
}

/// Deploy `contracts` concurrently.
///
/// Fails fast: once one deployment fails, the deployments that have not sent their transactions are
/// cancelled. The returned [`DeploymentFailure`] carries the error of the first failed deployment and
/// every contract that was deployed anyway.
pub fn deploy_contracts(
    relayer: &impl TxRelayer,
    abi: &impl ContractAbi,
    contracts: &[RootContract],
    deployer: &Key,
) -> Result<Vec<DeployedContract>, DeploymentFailure> {
    let cancelled = AtomicBool::new(false);

    let results: Vec<Result<DeployedContract, DeployError>> = thread::scope(|scope| {
        let workers: Vec<_> = contracts
            .iter()
            .map(|&contract| {
                let cancelled = &cancelled;
                scope.spawn(move || {
                    let result = deploy_contract(relayer, abi, contract, deployer, cancelled);
                    if result.is_err() {
                        cancelled.store(true, Ordering::SeqCst);
                    }
                    result
                })
            })
            .collect();

        workers
            .into_iter()
            .map(|worker| worker.join().unwrap_or(Err(DeployError::WorkerPanicked)))
            .collect()
    });

    collect_group(results)
}

/// Call the `initialize` function of every deployed contract that has one, concurrently.
pub fn initialize_contracts(
    relayer: &impl TxRelayer,
    abi: &impl ContractAbi,
    config: &RootchainConfig,
    settings: &InitializerSettings,
    deployer: &Key,
) -> Result<(), DeployError> {
    let calls: Vec<(RootContract, InitializeCall)> = RootContract::ALWAYS_DEPLOYED
        .iter()
        .filter_map(|contract| {
            contract
                .initializer(config, settings)
                .map(|call| (*contract, call))
        })
        .collect();

    let cancelled = AtomicBool::new(false);
    let results: Vec<Result<(), DeployError>> = thread::scope(|scope| {
        let workers: Vec<_> = calls
            .iter()
            .map(|(contract, call)| {
                let cancelled = &cancelled;
                scope.spawn(move || {
                    let result = initialize_contract(relayer, abi, *contract, call, deployer, cancelled);
                    if result.is_err() {
                        cancelled.store(true, Ordering::SeqCst);
                    }
                    result
                })
            })
            .collect();

        workers
            .into_iter()
            .map(|worker| worker.join().unwrap_or(Err(DeployError::WorkerPanicked)))
            .collect()
    });

    match first_error(results.into_iter().filter_map(Result::err)) {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

/// Register the child chain's supernet manager on the stake manager, and return the ID the stake
/// manager assigned to the chain.
pub fn register_chain_on_stake_manager(
    relayer: &impl TxRelayer,
    abi: &impl ContractAbi,
    config: &RootchainConfig,
    deployer: &Key,
) -> Result<u64, DeployError> {
    let input = abi.encode_register_child_chain(config.custom_supernet_manager_address)?;
    let transaction = Transaction {
        to: Some(config.stake_manager_address),
        input,
        value: 0,
    };
    let receipt = relayer
        .send_transaction(&transaction, deployer)
        .map_err(|error| DeployError::Relayer {
            contract: Some(RootContract::CustomSupernetManager),
            error,
        })?;
    if receipt.status != ReceiptStatus::Success {
        return Err(DeployError::RegistrationReverted);
    }

    for log in &receipt.logs {
        if let Some(id) = abi.parse_child_manager_registered(log)? {
            return Ok(id);
        }
    }
    Err(DeployError::RegistrationEventMissing)
}

fn deploy_contract(
    relayer: &impl TxRelayer,
    abi: &impl ContractAbi,
    contract: RootContract,
    deployer: &Key,
    cancelled: &AtomicBool,
) -> Result<DeployedContract, DeployError> {
    if cancelled.load(Ordering::SeqCst) {
        return Err(DeployError::Cancelled);
    }

    let transaction = Transaction {
        to: None,
        input: abi.bytecode(contract),
        value: 0,
    };
    let receipt = relayer
        .send_transaction(&transaction, deployer)
        .map_err(|error| DeployError::Relayer {
            contract: Some(contract),
            error,
        })?;
    let address = deployed_address(contract, &receipt)?;

    log::info!("Deployed {} at {}", contract, address);

    Ok(DeployedContract {
        contract,
        address,
        transaction_hash: receipt.transaction_hash,
        gas_used: receipt.gas_used,
    })
}

fn deployed_address(contract: RootContract, receipt: &Receipt) -> Result<Address, DeployError> {
    match (receipt.status, receipt.contract_address) {
        (ReceiptStatus::Success, Some(address)) => Ok(address),
        _ => Err(DeployError::Reverted(contract)),
    }
}

fn initialize_contract(
    relayer: &impl TxRelayer,
    abi: &impl ContractAbi,
    contract: RootContract,
    call: &InitializeCall,
    deployer: &Key,
    cancelled: &AtomicBool,
) -> Result<(), DeployError> {
    if cancelled.load(Ordering::SeqCst) {
        return Err(DeployError::Cancelled);
    }

    let transaction = Transaction {
        to: Some(call.contract()),
        input: abi.encode_initialize(call)?,
        value: 0,
    };
    let receipt = relayer
        .send_transaction(&transaction, deployer)
        .map_err(|error| DeployError::Relayer {
            contract: Some(contract),
            error,
        })?;
    if receipt.status != ReceiptStatus::Success {
        return Err(DeployError::Reverted(contract));
    }

    log::info!("Initialized {}", contract);
    Ok(())
}

fn is_deployed(relayer: &impl TxRelayer, address: Address) -> Result<bool, DeployError> {
    relayer
        .get_code(address)
        .map(|code| !code.is_empty())
        .map_err(|error| DeployError::Relayer { contract: None, error })
}

// Split the results of a fail-fast group into the successes and the error that caused the group to
// fail.
fn collect_group(
    results: Vec<Result<DeployedContract, DeployError>>,
) -> Result<Vec<DeployedContract>, DeploymentFailure> {
    let mut deployed = Vec::with_capacity(results.len());
    let mut errors = Vec::new();
    for result in results {
        match result {
            Ok(contract) => deployed.push(contract),
            Err(error) => errors.push(error),
        }
    }

    match first_error(errors) {
        Some(error) => Err(DeploymentFailure {
            partial: deployed,
            error,
        }),
        None => Ok(deployed),
    }
}

// Cancellations are a consequence of another error, so report the error that caused them.
fn first_error(errors: impl IntoIterator<Item = DeployError>) -> Option<DeployError> {
    let mut cancelled = None;
    for error in errors {
        if error == DeployError::Cancelled {
            cancelled = Some(error);
        } else {
            return Some(error);
        }
    }
    cancelled
}

/// A failed bridge bootstrap, with the contracts that were deployed before it failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentFailure {
    pub partial: Vec<DeployedContract>,
    pub error: DeployError,
}

impl From<DeployError> for DeploymentFailure {
    fn from(error: DeployError) -> Self {
        DeploymentFailure {
            partial: Vec::new(),
            error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployError {
    /// The relayer failed to send a transaction or read chain state. `contract` is the contract the
    /// transaction was for, if any.
    Relayer {
        contract: Option<RootContract>,
        error: RelayerError,
    },
    Abi(AbiError),
    /// The deployment or initialization transaction of the contract reverted.
    Reverted(RootContract),
    RegistrationReverted,
    /// The registration receipt carries no `ChildManagerRegistered` event.
    RegistrationEventMissing,
    /// The given root token has no code on the root chain.
    TokenNotDeployed(Address),
    AlreadyDeployed,
    /// Another deployment of the same group failed first.
    Cancelled,
    WorkerPanicked,
}

impl From<AbiError> for DeployError {
    fn from(value: AbiError) -> Self {
        DeployError::Abi(value)
    }
}
