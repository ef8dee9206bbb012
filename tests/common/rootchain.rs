use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
};

use polybft_rs::{
    bootstrap::{
        AbiError, ContractAbi, InitializeCall, Log, Receipt, ReceiptStatus, RelayerError,
        RootContract, Transaction, TxRelayer,
    },
    signer::wallet::Key,
    types::data_types::{Address, CryptoHash},
};

/// Topic of the event the stake manager emits when a child chain registers.
pub(crate) const CHILD_MANAGER_REGISTERED: CryptoHash = CryptoHash::new([0xcc; 32]);

/// A root chain that deploys every contract creation transaction at a fresh address.
#[derive(Default)]
pub(crate) struct MockRootchain {
    state: Mutex<RootchainState>,
    reverting_bytecode: HashSet<Vec<u8>>,
    omit_registration_event: bool,
    supernet_id: u64,
}

#[derive(Default)]
struct RootchainState {
    next_address: u8,
    code: HashMap<Address, Vec<u8>>,
    initialized: Vec<Address>,
    transactions: u64,
}

impl MockRootchain {
    pub(crate) fn new(supernet_id: u64) -> MockRootchain {
        MockRootchain {
            supernet_id,
            ..Default::default()
        }
    }

    /// Make the deployment transaction of `contract` revert.
    pub(crate) fn with_reverting(mut self, contract: RootContract) -> Self {
        self.reverting_bytecode.insert(MockAbi.bytecode(contract));
        self
    }

    /// Make child chain registrations succeed without emitting the registration event.
    pub(crate) fn without_registration_event(mut self) -> Self {
        self.omit_registration_event = true;
        self
    }

    /// Put code at `address`, as if a contract was deployed there earlier.
    pub(crate) fn with_code_at(self, address: Address) -> Self {
        self.state
            .lock()
            .unwrap()
            .code
            .insert(address, b"existing".to_vec());
        self
    }

    pub(crate) fn has_code(&self, address: &Address) -> bool {
        self.state.lock().unwrap().code.contains_key(address)
    }

    /// Get the addresses of the contracts whose `initialize` function was called, in call order.
    pub(crate) fn initialized(&self) -> Vec<Address> {
        self.state.lock().unwrap().initialized.clone()
    }

    pub(crate) fn transaction_count(&self) -> u64 {
        self.state.lock().unwrap().transactions
    }
}

impl TxRelayer for MockRootchain {
    fn send_transaction(&self, transaction: &Transaction, _key: &Key) -> Result<Receipt, RelayerError> {
        let mut state = self.state.lock().unwrap();
        state.transactions += 1;
        let transaction_hash = CryptoHash::new([state.transactions as u8; 32]);

        let receipt = |status, contract_address, logs| Receipt {
            status,
            transaction_hash,
            contract_address,
            gas_used: 21_000,
            logs,
        };

        match transaction.to {
            None if self.reverting_bytecode.contains(&transaction.input) => {
                Ok(receipt(ReceiptStatus::Failed, None, Vec::new()))
            }
            None => {
                state.next_address += 1;
                let address = Address::new([state.next_address; 20]);
                state.code.insert(address, transaction.input.clone());
                Ok(receipt(ReceiptStatus::Success, Some(address), Vec::new()))
            }
            Some(to) if transaction.input.starts_with(b"register") => {
                let logs = if self.omit_registration_event {
                    Vec::new()
                } else {
                    vec![Log {
                        address: to,
                        topics: vec![CHILD_MANAGER_REGISTERED],
                        data: self.supernet_id.to_be_bytes().to_vec(),
                    }]
                };
                Ok(receipt(ReceiptStatus::Success, None, logs))
            }
            Some(to) => {
                if !state.code.contains_key(&to) {
                    return Ok(receipt(ReceiptStatus::Failed, None, Vec::new()));
                }
                state.initialized.push(to);
                Ok(receipt(ReceiptStatus::Success, None, Vec::new()))
            }
        }
    }

    fn call(&self, _from: Address, _to: Address, _input: &[u8]) -> Result<Vec<u8>, RelayerError> {
        Ok(Vec::new())
    }

    fn get_code(&self, address: Address) -> Result<Vec<u8>, RelayerError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .code
            .get(&address)
            .cloned()
            .unwrap_or_default())
    }

    fn block_number(&self) -> Result<u64, RelayerError> {
        Ok(100)
    }
}

/// Encodes calls as their debug representation, which is enough for the mock root chain to tell
/// them apart.
pub(crate) struct MockAbi;

impl ContractAbi for MockAbi {
    fn bytecode(&self, contract: RootContract) -> Vec<u8> {
        contract.name().as_bytes().to_vec()
    }

    fn encode_initialize(&self, call: &InitializeCall) -> Result<Vec<u8>, AbiError> {
        Ok(format!("initialize {:?}", call).into_bytes())
    }

    fn encode_register_child_chain(&self, manager: Address) -> Result<Vec<u8>, AbiError> {
        Ok(format!("register {}", manager).into_bytes())
    }

    fn parse_child_manager_registered(&self, log: &Log) -> Result<Option<u64>, AbiError> {
        if log.topics.first() != Some(&CHILD_MANAGER_REGISTERED) {
            return Ok(None);
        }
        let bytes: [u8; 8] = log
            .data
            .as_slice()
            .try_into()
            .map_err(|_| AbiError("malformed ChildManagerRegistered data".to_string()))?;
        Ok(Some(u64::from_be_bytes(bytes)))
    }
}
