/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Root chain collaborators used by the bridge bootstrap.
//!
//! The bootstrap does not talk to a root chain node itself. It sends transactions and reads chain
//! state through a [`TxRelayer`], and builds contract calls and parses event logs through a
//! [`ContractAbi`]. Both are provided by the library user.

use crate::signer::wallet::Key;
use crate::types::data_types::{Address, CryptoHash};

use super::contracts::{InitializeCall, RootContract};

/// A root chain transaction. `to == None` deploys a contract whose creation code is `input`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub to: Option<Address>,
    pub input: Vec<u8>,
    pub value: u128,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReceiptStatus {
    Success,
    Failed,
}

/// Receipt of an included root chain transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Receipt {
    pub status: ReceiptStatus,
    pub transaction_hash: CryptoHash,
    /// Address of the deployed contract, for contract deployments.
    pub contract_address: Option<Address>,
    pub gas_used: u64,
    pub logs: Vec<Log>,
}

/// An event log emitted by a root chain transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Log {
    pub address: Address,
    pub topics: Vec<CryptoHash>,
    pub data: Vec<u8>,
}

/// Sends transactions to, and reads state from, the root chain.
///
/// Implementations are called concurrently from several deployment threads.
pub trait TxRelayer: Sync {
    /// Sign `transaction` with `key`, send it, and wait for its receipt.
    fn send_transaction(&self, transaction: &Transaction, key: &Key) -> Result<Receipt, RelayerError>;

    /// Execute a read-only call against the latest root chain state.
    fn call(&self, from: Address, to: Address, input: &[u8]) -> Result<Vec<u8>, RelayerError>;

    /// Get the code deployed at `address`. Empty if no contract is deployed there.
    fn get_code(&self, address: Address) -> Result<Vec<u8>, RelayerError>;

    /// Get the number of the latest root chain block.
    fn block_number(&self) -> Result<u64, RelayerError>;
}

/// Contract artifacts, call encoders and event parsers of the root chain contracts.
pub trait ContractAbi: Sync {
    /// Get the creation code of `contract`.
    fn bytecode(&self, contract: RootContract) -> Vec<u8>;

    /// Encode a call to a contract's `initialize` function.
    fn encode_initialize(&self, call: &InitializeCall) -> Result<Vec<u8>, AbiError>;

    /// Encode a call to the stake manager's `registerChildChain(manager)` function.
    fn encode_register_child_chain(&self, manager: Address) -> Result<Vec<u8>, AbiError>;

    /// Parse `log` as the stake manager's `ChildManagerRegistered(id, manager)` event, returning the
    /// registered chain's ID if it is one.
    fn parse_child_manager_registered(&self, log: &Log) -> Result<Option<u64>, AbiError>;
}

/// Error reported by a [`TxRelayer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayerError(pub String);

/// Error reported by a [`ContractAbi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbiError(pub String);
