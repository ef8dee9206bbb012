/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The chain the round engine finalizes blocks into.
//!
//! The round engine does not execute transactions or store blocks. It asks a [`Backend`] to build and
//! validate proposals, and hands it every block it finalizes.

use crate::types::{
    block::Block,
    data_types::{Address, BlockHeight, View},
    validator_set::ValidatorSet,
};

/// Block production, validation and storage, as seen by the round engine.
///
/// ## Validator sets
///
/// [`validators_at`](Backend::validators_at) is only queried once, when the replica starts, for the
/// validator set of the first height the engine will finalize. From then on, the engine follows the
/// validator set changes recorded in the `extra_data` of the blocks it finalizes.
pub trait Backend: Send + 'static {
    /// Get the number of the latest block in the chain. The engine starts finalizing at the next
    /// height.
    fn head_number(&self) -> BlockHeight;

    /// Get the validator set that finalizes block `height`.
    fn validators_at(&self, height: BlockHeight) -> Result<ValidatorSet, BackendError>;

    /// Get the address of the validator that proposed the latest block in the chain, or
    /// [`Address::ZERO`] if the latest block is the genesis block.
    fn last_proposer(&self) -> Address;

    /// Build a block to propose in `view`. The block's `extra_data` must encode an
    /// [`Extra`](crate::header::Extra) whose `committed` signature is empty.
    fn build_proposal(&mut self, view: View) -> Result<Block, BackendError>;

    /// Check whether `block`, proposed by another validator, may be finalized on top of the latest
    /// block in the chain.
    fn is_valid_proposal(&self, block: &Block) -> bool;

    /// Append a finalized block, whose `extra_data` carries the aggregated committed seals, to the
    /// chain.
    fn insert_block(&mut self, block: Block) -> Result<(), BackendError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The chain has no state for the requested height.
    UnknownHeight(BlockHeight),

    /// A block could not be built on top of the latest block.
    BuildFailed(String),

    /// A finalized block could not be appended to the chain.
    InsertFailed(String),
}
