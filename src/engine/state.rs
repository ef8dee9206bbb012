/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Messages the round engine has collected for the current height.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use crate::networking::messages::{
    ConsensusMessage, PreparedCertificate, RoundChangeCertificate, RoundChangeData,
};
use crate::signer::bls::BlsSignature;
use crate::types::data_types::{Address, CryptoHash, Round, View};

/// Messages of the current round.
pub(crate) struct RoundState {
    pub(crate) view: View,
    pub(crate) deadline: Instant,
    proposal: Option<ConsensusMessage>,
    prepares: HashMap<Address, ConsensusMessage>,
    commits: HashMap<Address, (CryptoHash, BlsSignature)>,
    prepared: bool,
    committed: bool,
}

impl RoundState {
    pub(crate) fn new(view: View, deadline: Instant) -> RoundState {
        RoundState {
            view,
            deadline,
            proposal: None,
            prepares: HashMap::new(),
            commits: HashMap::new(),
            prepared: false,
            committed: false,
        }
    }

    /// Get the accepted preprepare message of this round.
    pub(crate) fn proposal(&self) -> Option<&ConsensusMessage> {
        self.proposal.as_ref()
    }

    pub(crate) fn proposal_hash(&self) -> Option<CryptoHash> {
        self.proposal.as_ref().and_then(|proposal| proposal.proposal_hash())
    }

    pub(crate) fn accept_proposal(&mut self, preprepare: ConsensusMessage) {
        self.proposal = Some(preprepare);
    }

    /// Collect a prepare message. Returns whether it is the first prepare from its sender.
    pub(crate) fn add_prepare(&mut self, prepare: ConsensusMessage) -> bool {
        if self.prepares.contains_key(&prepare.from) {
            return false;
        }
        self.prepares.insert(prepare.from, prepare);
        true
    }

    /// Collect a verified committed seal. Returns whether it is the first seal from `from`.
    pub(crate) fn add_commit(
        &mut self,
        from: Address,
        proposal_hash: CryptoHash,
        seal: BlsSignature,
    ) -> bool {
        if self.commits.contains_key(&from) {
            return false;
        }
        self.commits.insert(from, (proposal_hash, seal));
        true
    }

    /// Get the proposer together with every sender of a prepare for the accepted proposal.
    pub(crate) fn prepare_signers(&self) -> Vec<Address> {
        let (Some(proposal), Some(proposal_hash)) = (&self.proposal, self.proposal_hash()) else {
            return Vec::new();
        };

        let mut signers = vec![proposal.from];
        signers.extend(
            self.matching_prepares(&proposal_hash)
                .map(|prepare| prepare.from)
                .filter(|from| *from != proposal.from),
        );
        signers
    }

    /// Get the committed seals over the accepted proposal.
    pub(crate) fn seals(&self) -> Vec<(Address, BlsSignature)> {
        let Some(proposal_hash) = self.proposal_hash() else {
            return Vec::new();
        };

        let mut seals: Vec<(Address, BlsSignature)> = self
            .commits
            .iter()
            .filter(|(_, (hash, _))| *hash == proposal_hash)
            .map(|(from, (_, seal))| (*from, *seal))
            .collect();
        seals.sort_by_key(|(from, _)| *from);
        seals
    }

    /// Build the certificate proving that the accepted proposal is prepared.
    pub(crate) fn prepared_certificate(&self) -> Option<PreparedCertificate> {
        let proposal = self.proposal.as_ref()?;
        let proposal_hash = proposal.proposal_hash()?;

        let mut prepare_messages: Vec<_> = self
            .matching_prepares(&proposal_hash)
            .filter(|prepare| prepare.from != proposal.from)
            .filter_map(|prepare| prepare.to_prepare_message())
            .collect();
        prepare_messages.sort_by_key(|prepare| prepare.from);

        Some(PreparedCertificate {
            proposal_message: proposal.to_proposal_message()?,
            prepare_messages,
        })
    }

    pub(crate) fn is_prepared(&self) -> bool {
        self.prepared
    }

    pub(crate) fn set_prepared(&mut self) {
        self.prepared = true
    }

    pub(crate) fn is_committed(&self) -> bool {
        self.committed
    }

    pub(crate) fn set_committed(&mut self) {
        self.committed = true
    }

    fn matching_prepares<'a>(
        &'a self,
        proposal_hash: &'a CryptoHash,
    ) -> impl Iterator<Item = &'a ConsensusMessage> + 'a {
        self.prepares
            .values()
            .filter(move |prepare| prepare.proposal_hash().as_ref() == Some(proposal_hash))
    }
}

/// Round change messages of the current height, by round.
#[derive(Default)]
pub(crate) struct RoundChanges {
    by_round: BTreeMap<Round, HashMap<Address, ConsensusMessage<RoundChangeData>>>,
}

impl RoundChanges {
    /// Collect a round change message. Returns whether it is the first one from its sender for its
    /// round.
    pub(crate) fn insert(&mut self, round_change: ConsensusMessage<RoundChangeData>) -> bool {
        let senders = self.by_round.entry(round_change.view.round).or_default();
        if senders.contains_key(&round_change.from) {
            return false;
        }
        senders.insert(round_change.from, round_change);
        true
    }

    pub(crate) fn senders(&self, round: Round) -> Vec<Address> {
        self.by_round
            .get(&round)
            .map(|senders| senders.keys().copied().collect())
            .unwrap_or_default()
    }

    pub(crate) fn certificate(&self, round: Round) -> RoundChangeCertificate {
        let mut round_change_messages: Vec<_> = self
            .by_round
            .get(&round)
            .map(|senders| senders.values().cloned().collect())
            .unwrap_or_default();
        round_change_messages.sort_by_key(|round_change| round_change.from);

        RoundChangeCertificate {
            round_change_messages,
        }
    }

    /// Forget the round change messages of rounds before `round`.
    pub(crate) fn prune_below(&mut self, round: Round) {
        self.by_round = self.by_round.split_off(&round);
    }
}

/// Get the prepared certificate of the latest round among `round_changes`.
pub(crate) fn highest_prepared(
    round_changes: &[ConsensusMessage<RoundChangeData>],
) -> Option<&PreparedCertificate> {
    round_changes
        .iter()
        .filter_map(|round_change| round_change.payload.prepared.as_ref())
        .max_by_key(|prepared| prepared.proposal_message.view.round)
}

/// Bounded buffer of messages for views the engine has not reached yet.
///
/// Every sender gets an equal share of the capacity, so that no single validator can fill the buffer
/// for the others.
pub(crate) struct MessageBuffer {
    capacity: usize,
    messages: Vec<ConsensusMessage>,
}

impl MessageBuffer {
    pub(crate) fn new(capacity: usize) -> MessageBuffer {
        MessageBuffer {
            capacity,
            messages: Vec::new(),
        }
    }

    /// Buffer `message` from one of `senders` possible senders, or give it back if the buffer or the
    /// sender's share of it is full.
    pub(crate) fn push(
        &mut self,
        message: ConsensusMessage,
        senders: usize,
    ) -> Result<(), ConsensusMessage> {
        let share = (self.capacity / senders.max(1)).max(1);
        let buffered_from_sender = self
            .messages
            .iter()
            .filter(|buffered| buffered.from == message.from)
            .count();

        if self.messages.len() >= self.capacity || buffered_from_sender >= share {
            return Err(message);
        }
        self.messages.push(message);
        Ok(())
    }

    /// Remove and return the messages for `view`, and discard the messages for views before it.
    pub(crate) fn take_view(&mut self, view: View) -> Vec<ConsensusMessage> {
        let (matching, rest): (Vec<_>, Vec<_>) = self
            .messages
            .drain(..)
            .filter(|message| message.view >= view)
            .partition(|message| message.view == view);
        self.messages = rest;
        matching
    }

    pub(crate) fn len(&self) -> usize {
        self.messages.len()
    }
}
