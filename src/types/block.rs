/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions for the 'header' and 'block' types.
//!
//! The consensus core treats everything in a block except its header's `extra_data` as opaque. The
//! `extra_data` field carries the consensus metadata encoded by the [header codec](crate::header).

use borsh::{BorshDeserialize, BorshSerialize};

use crate::header::header_hash;

use super::data_types::{Address, BlockHeight, CryptoHash};

/// Block header.
#[derive(Clone, Debug, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Header {
    pub parent_hash: CryptoHash,
    pub number: BlockHeight,
    pub timestamp: u64,
    pub miner: Address,
    pub state_root: CryptoHash,
    pub tx_root: CryptoHash,
    pub receipts_root: CryptoHash,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub extra_data: Vec<u8>,
}

impl Header {
    /// Compute the canonical hash of this header. See [`header_hash`].
    pub fn hash(&self) -> CryptoHash {
        header_hash(self)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Block {
    pub header: Header,
    pub transactions: Vec<Vec<u8>>,
}

impl Block {
    pub fn new(header: Header, transactions: Vec<Vec<u8>>) -> Block {
        Block {
            header,
            transactions,
        }
    }

    pub fn number(&self) -> BlockHeight {
        self.header.number
    }

    pub fn hash(&self) -> CryptoHash {
        self.header.hash()
    }
}
