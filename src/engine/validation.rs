/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Checks on messages and certificates, relative to one height's validator set.

use std::collections::HashSet;

use crate::events::DropReason;
use crate::networking::messages::{
    ConsensusMessage, Payload, PreparedCertificate, RoundChangeCertificate,
};
use crate::proposer::select_proposer;
use crate::signer::wallet::recover_message_signer;
use crate::types::{
    data_types::{Address, BlockHeight, ChainID, CryptoHash, Round},
    validator_set::ValidatorSet,
};

use super::state::highest_prepared;

/// Everything needed to check the messages of a single height.
pub(crate) struct HeightContext<'a> {
    pub(crate) chain_id: ChainID,
    pub(crate) height: BlockHeight,
    pub(crate) validator_set: &'a ValidatorSet,
    pub(crate) last_proposer: Address,
}

impl<'a> HeightContext<'a> {
    /// Get the validator entitled to propose in `round`.
    pub(crate) fn proposer(&self, round: Round) -> Option<Address> {
        select_proposer(self.validator_set, round, &self.last_proposer).map(|v| v.address)
    }

    /// Check that `message` was signed by its `from` address, and that `from` is a validator.
    pub(crate) fn authenticate<P: Payload>(
        &self,
        message: &ConsensusMessage<P>,
    ) -> Result<(), DropReason> {
        match recover_message_signer(message) {
            Ok(signer) if signer == message.from => (),
            Ok(signer) => {
                log::debug!(
                    "Message claims to be from {} but is signed by {}",
                    message.from,
                    signer
                );
                return Err(DropReason::BadSignature);
            }
            Err(err) => {
                log::debug!("Cannot recover signer of message from {}: {:?}", message.from, err);
                return Err(DropReason::BadSignature);
            }
        }

        if !self.validator_set.includes(&message.from) {
            return Err(DropReason::NotAValidator);
        }

        Ok(())
    }

    /// Check that `certificate` proves that a quorum of validators moved to `round`, and that any
    /// proposal it carries as prepared is the one being proposed with it.
    pub(crate) fn verify_round_change_certificate(
        &self,
        certificate: &RoundChangeCertificate,
        round: Round,
        proposal_hash: &CryptoHash,
    ) -> bool {
        let mut senders = HashSet::new();
        for round_change in &certificate.round_change_messages {
            if round_change.chain_id != self.chain_id
                || round_change.view.height != self.height
                || round_change.view.round != round
                || self.authenticate(round_change).is_err()
                || !senders.insert(round_change.from)
            {
                return false;
            }

            if let Some(prepared) = &round_change.payload.prepared {
                if !self.verify_prepared_certificate(prepared, round) {
                    return false;
                }
            }
        }

        if !self.validator_set.has_quorum(self.height, &senders) {
            return false;
        }

        match highest_prepared(&certificate.round_change_messages) {
            Some(prepared) => prepared.proposal_message.payload.proposal_hash == *proposal_hash,
            None => true,
        }
    }

    /// Check that `certificate` proves that a quorum of validators prepared its proposal in a round
    /// before `before`.
    pub(crate) fn verify_prepared_certificate(
        &self,
        certificate: &PreparedCertificate,
        before: Round,
    ) -> bool {
        let proposal_message = &certificate.proposal_message;
        let proposal = &proposal_message.payload;
        let view = proposal_message.view;

        if proposal_message.chain_id != self.chain_id
            || view.height != self.height
            || view.round >= before
            || self.proposer(view.round) != Some(proposal_message.from)
            || self.authenticate(proposal_message).is_err()
            || proposal.proposal.hash() != proposal.proposal_hash
        {
            return false;
        }

        let mut signers = HashSet::new();
        signers.insert(proposal_message.from);
        for prepare in &certificate.prepare_messages {
            if prepare.chain_id != self.chain_id
                || prepare.view != view
                || prepare.payload.proposal_hash != proposal.proposal_hash
                || self.authenticate(prepare).is_err()
                || !signers.insert(prepare.from)
            {
                return false;
            }
        }

        self.validator_set.has_quorum(self.height, &signers)
    }
}
