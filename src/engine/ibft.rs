/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Event-driven implementation of a single IBFT participant.
//!
//! Main type: [`Ibft`].

use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc::Sender,
    Arc,
};
use std::time::{Instant, SystemTime};

use crate::config::Configuration;
use crate::events::*;
use crate::header::Extra;
use crate::networking::{
    messages::{
        CommitData, ConsensusMessage, MessagePayload, MessageType, PrepareData, PreprepareData,
        PreparedCertificate, RoundChangeCertificate, RoundChangeData,
    },
    transport::Transport,
};
use crate::signer::{
    aggregation::AggregatedSignature,
    bls::{BlsSignature, DOMAIN_CHECKPOINT_MANAGER},
    wallet::Key,
};
use crate::types::{
    data_types::{Address, BlockHeight, Round, View},
    validator_set::{ValidatorSet, ValidatorSetHistory},
};

use super::backend::Backend;
use super::state::{highest_prepared, MessageBuffer, RoundChanges, RoundState};
use super::validation::HeightContext;

/// How many heights above the current one messages are buffered for.
pub(crate) const MAX_FUTURE_HEIGHTS: u64 = 10;

/// A single participant in IBFT.
///
/// # Usage
///
/// Like the rest of the round engine, `Ibft` is driven from the outside. Its three crate-public event
/// handlers are called by the engine thread:
/// 1. [`start`](Self::start): once, before anything else.
/// 2. [`on_receive_msg`](Self::on_receive_msg): when a consensus message arrives from the transport.
/// 3. [`on_round_timeout`](Self::on_round_timeout): when the current round passes its
///    [deadline](Self::round_deadline).
///
/// # Round structure
///
/// 1. The proposer of the round multicasts a preprepare carrying its proposal. In rounds after the
///    first, the preprepare also carries a certificate of round change messages from a quorum, and
///    must re-propose the proposal that the certificate shows was prepared in the latest round, if any.
/// 2. Other validators check the proposal and multicast a prepare for it.
/// 3. Once the proposer and the senders of prepares hold a quorum, a validator is prepared: it
///    remembers the proposal as prepared and multicasts a commit carrying its committed seal.
/// 4. Once the senders of valid committed seals hold a quorum, the seals are aggregated into the
///    proposal's `extra_data` and the block is finalized.
///
/// A validator whose round times out multicasts a round change for the next round, carrying the
/// proposal it most recently saw prepared at the current height. A quorum of round changes for a later
/// round moves a validator into that round.
pub(crate) struct Ibft<T: Transport, B: Backend> {
    config: Configuration,
    key: Key,
    transport: T,
    backend: B,
    validator_sets: ValidatorSetHistory,
    is_active_validator: Arc<AtomicBool>,
    event_publisher: Option<Sender<Event>>,

    height: BlockHeight,
    last_proposer: Address,
    validator_set: Arc<ValidatorSet>,
    round_state: RoundState,
    round_changes: RoundChanges,
    latest_prepared: Option<PreparedCertificate>,
    future_messages: MessageBuffer,
}

impl<T: Transport, B: Backend> Ibft<T, B> {
    pub(crate) fn new(
        config: Configuration,
        key: Key,
        transport: T,
        backend: B,
        validator_sets: ValidatorSetHistory,
        is_active_validator: Arc<AtomicBool>,
        event_publisher: Option<Sender<Event>>,
    ) -> Self {
        let height = backend.head_number() + 1;
        let validator_set = validator_sets.current();
        let future_messages = MessageBuffer::new(config.message_buffer_capacity);

        let mut ibft = Self {
            config,
            key,
            transport,
            backend,
            validator_sets,
            is_active_validator,
            event_publisher,
            height,
            last_proposer: Address::ZERO,
            validator_set,
            round_state: RoundState::new(View::new(height, Round::init()), Instant::now()),
            round_changes: RoundChanges::default(),
            latest_prepared: None,
            future_messages,
        };
        ibft.load_height();
        ibft
    }

    /// Enter the first round of the first height.
    pub(crate) fn start(&mut self) {
        self.enter_round(Round::init(), false)
    }

    pub(crate) fn round_deadline(&self) -> Instant {
        self.round_state.deadline
    }

    pub(crate) fn on_receive_msg(&mut self, message: ConsensusMessage) {
        if message.chain_id != self.config.chain_id {
            return self.drop_message(&message, DropReason::WrongChain);
        }

        let current_view = self.round_state.view;
        if message.view.height < self.height
            || (message.view.height == self.height && message.view.round < current_view.round)
        {
            return self.drop_message(&message, DropReason::StaleView);
        }
        if message.view.height > self.height + MAX_FUTURE_HEIGHTS {
            return self.drop_message(&message, DropReason::FarFutureView);
        }

        // Messages for later heights are checked against the current validator set.
        if let Err(reason) = self.context().authenticate(&message) {
            return self.drop_message(&message, reason);
        }

        // Round changes for later rounds of this height are what moves the engine into those rounds.
        if message.view.height > self.height
            || (message.view.round > current_view.round
                && message.message_type() != MessageType::RoundChange)
        {
            return self.buffer(message);
        }

        Event::publish(
            &self.event_publisher,
            Event::ReceiveMessage(ReceiveMessageEvent {
                timestamp: SystemTime::now(),
                origin: message.from,
                view: message.view,
                message_type: message.message_type(),
            }),
        );

        match message.message_type() {
            MessageType::Preprepare => self.on_receive_preprepare(message),
            MessageType::Prepare => self.on_receive_prepare(message),
            MessageType::Commit => self.on_receive_commit(message),
            MessageType::RoundChange => self.on_receive_round_change(message),
        }
    }

    /// Move to the next round, asking the other validators to do the same.
    pub(crate) fn on_round_timeout(&mut self) {
        let view = self.round_state.view;
        let next_round = view.round + 1;

        Event::publish(
            &self.event_publisher,
            Event::RoundTimeout(RoundTimeoutEvent {
                timestamp: SystemTime::now(),
                view,
            }),
        );
        Event::publish(
            &self.event_publisher,
            Event::RoundChange(RoundChangeEvent {
                timestamp: SystemTime::now(),
                view,
                new_round: next_round,
            }),
        );

        self.enter_round(next_round, true)
    }

    fn start_height(&mut self, height: BlockHeight) {
        self.height = height;
        self.round_changes = RoundChanges::default();
        self.latest_prepared = None;
        self.load_height();
        self.enter_round(Round::init(), false)
    }

    // Load the proposer of the previous block and the validator set of the current height.
    fn load_height(&mut self) {
        self.last_proposer = self.backend.last_proposer();
        self.validator_set = self
            .validator_sets
            .at(self.height)
            .unwrap_or_else(|| self.validator_sets.current());
        self.is_active_validator
            .store(self.is_validator(), Ordering::Release);
    }

    fn enter_round(&mut self, round: Round, send_round_change: bool) {
        let view = View::new(self.height, round);
        let deadline = Instant::now() + self.config.round_timeout(round.int());
        self.round_state = RoundState::new(view, deadline);
        self.round_changes.prune_below(round);

        Event::publish(
            &self.event_publisher,
            Event::StartRound(StartRoundEvent {
                timestamp: SystemTime::now(),
                view,
            }),
        );

        if !self.is_validator() {
            return;
        }

        if send_round_change {
            self.send_round_change(round);
        }

        if round == Round::init() {
            if self.is_proposer(round) {
                self.propose(None);
            }
        } else {
            self.try_propose_with_certificate();
        }

        let buffered = self.future_messages.take_view(view);
        if !buffered.is_empty() {
            log::debug!(
                "Replaying {} buffered messages for view {}, {} still buffered",
                buffered.len(),
                view,
                self.future_messages.len()
            );
        }
        for message in buffered {
            self.on_receive_msg(message);
        }
    }

    // Propose in the current round. With a round change certificate, re-propose the proposal that was
    // prepared in the latest round, if there is one.
    fn propose(&mut self, certificate: Option<RoundChangeCertificate>) {
        if self.round_state.proposal().is_some() {
            return;
        }
        let view = self.round_state.view;

        let reproposal = certificate
            .as_ref()
            .and_then(|certificate| highest_prepared(&certificate.round_change_messages))
            .map(|prepared| prepared.proposal_message.payload.proposal.clone());
        let proposal = match reproposal {
            Some(proposal) => proposal,
            None => match self.backend.build_proposal(view) {
                Ok(proposal) => proposal,
                Err(err) => {
                    log::error!("Failed to build a proposal for view {}: {:?}", view, err);
                    return;
                }
            },
        };

        let proposal_hash = proposal.hash();
        if proposal_hash.is_zero() {
            log::error!("Built a proposal for view {} with malformed extra data", view);
            return;
        }

        let preprepare = ConsensusMessage::new(
            self.config.chain_id,
            view,
            MessagePayload::Preprepare(PreprepareData {
                proposal,
                proposal_hash,
                certificate,
            }),
        );
        let Some(preprepare) = self.sign(preprepare) else {
            return;
        };
        self.transport.multicast(&preprepare);

        Event::publish(
            &self.event_publisher,
            Event::Propose(ProposeEvent {
                timestamp: SystemTime::now(),
                view,
                proposal_hash,
            }),
        );

        self.round_state.accept_proposal(preprepare);
        self.check_prepared();
    }

    fn try_propose_with_certificate(&mut self) {
        let round = self.round_state.view.round;
        if round == Round::init()
            || self.round_state.proposal().is_some()
            || !self.is_proposer(round)
        {
            return;
        }

        let senders = self.round_changes.senders(round);
        if !self.validator_set.has_quorum(self.height, &senders) {
            return;
        }

        self.publish_collect_quorum(MessageType::RoundChange, senders.len());
        let certificate = self.round_changes.certificate(round);
        self.propose(Some(certificate))
    }

    fn on_receive_preprepare(&mut self, preprepare: ConsensusMessage) {
        if self.round_state.proposal().is_some() {
            log::debug!(
                "Already accepted a proposal in view {}, ignoring preprepare from {}",
                self.round_state.view,
                preprepare.from
            );
            return;
        }

        if !self.is_valid_preprepare(&preprepare) {
            return self.drop_message(&preprepare, DropReason::InvalidProposal);
        }

        self.round_state.accept_proposal(preprepare);
        self.send_prepare();
        self.check_prepared();
        self.check_committed();
    }

    fn is_valid_preprepare(&self, message: &ConsensusMessage) -> bool {
        let MessagePayload::Preprepare(preprepare) = &message.payload else {
            return false;
        };
        let context = self.context();
        let round = message.view.round;

        if context.proposer(round) != Some(message.from) {
            log::debug!("{} is not the proposer of view {}", message.from, message.view);
            return false;
        }
        if preprepare.proposal.number() != self.height
            || preprepare.proposal_hash.is_zero()
            || preprepare.proposal.hash() != preprepare.proposal_hash
        {
            log::debug!("Proposal of view {} does not match its hash or height", message.view);
            return false;
        }

        if round != Round::init() {
            let Some(certificate) = &preprepare.certificate else {
                log::debug!("Proposal of view {} has no round change certificate", message.view);
                return false;
            };
            if !context.verify_round_change_certificate(certificate, round, &preprepare.proposal_hash)
            {
                log::debug!("Round change certificate of view {} is invalid", message.view);
                return false;
            }
        }

        self.backend.is_valid_proposal(&preprepare.proposal)
    }

    fn on_receive_prepare(&mut self, prepare: ConsensusMessage) {
        if self.round_state.add_prepare(prepare) {
            self.check_prepared();
        }
    }

    fn on_receive_commit(&mut self, commit: ConsensusMessage) {
        let MessagePayload::Commit(data) = &commit.payload else {
            return;
        };
        let Some(seal) = self.verify_seal(&commit.from, data) else {
            return self.drop_message(&commit, DropReason::BadSignature);
        };

        if self
            .round_state
            .add_commit(commit.from, data.proposal_hash, seal)
        {
            self.check_committed();
        }
    }

    fn verify_seal(&self, from: &Address, commit: &CommitData) -> Option<BlsSignature> {
        let public_key = self.validator_set.get(from)?.bls_key.public_key().ok()?;
        let seal = BlsSignature::from_bytes(&commit.committed_seal).ok()?;
        seal.verify(
            &public_key,
            &commit.proposal_hash.bytes(),
            DOMAIN_CHECKPOINT_MANAGER,
        )
        .then_some(seal)
    }

    fn on_receive_round_change(&mut self, message: ConsensusMessage) {
        let Some(round_change) = message.to_round_change_message() else {
            return;
        };
        let round = round_change.view.round;
        if let Some(prepared) = &round_change.payload.prepared {
            if !self.context().verify_prepared_certificate(prepared, round) {
                return self.drop_message(&message, DropReason::InvalidProposal);
            }
        }

        if !self.round_changes.insert(round_change) {
            return;
        }

        let current_view = self.round_state.view;
        if round > current_view.round {
            let senders = self.round_changes.senders(round);
            if self.validator_set.has_quorum(self.height, &senders) {
                Event::publish(
                    &self.event_publisher,
                    Event::RoundChange(RoundChangeEvent {
                        timestamp: SystemTime::now(),
                        view: current_view,
                        new_round: round,
                    }),
                );
                self.enter_round(round, true);
            }
        } else {
            self.try_propose_with_certificate();
        }
    }

    fn check_prepared(&mut self) {
        if self.round_state.is_prepared() {
            return;
        }

        let signers = self.round_state.prepare_signers();
        if signers.is_empty() || !self.validator_set.has_quorum(self.height, &signers) {
            return;
        }

        self.round_state.set_prepared();
        self.publish_collect_quorum(MessageType::Prepare, signers.len());
        self.latest_prepared = self.round_state.prepared_certificate();
        self.send_commit();
    }

    fn check_committed(&mut self) {
        if self.round_state.is_committed() {
            return;
        }

        let seals = self.round_state.seals();
        let signers: Vec<Address> = seals.iter().map(|(signer, _)| *signer).collect();
        if signers.is_empty() || !self.validator_set.has_quorum(self.height, &signers) {
            return;
        }

        self.round_state.set_committed();
        self.publish_collect_quorum(MessageType::Commit, signers.len());
        self.finalize(&seals);
    }

    // Write the aggregated committed seals into the proposal, hand it to the backend, and move to the
    // next height.
    fn finalize(&mut self, seals: &[(Address, BlsSignature)]) {
        let view = self.round_state.view;
        let (mut block, hash) = match self.round_state.proposal().map(|proposal| &proposal.payload) {
            Some(MessagePayload::Preprepare(preprepare)) => {
                (preprepare.proposal.clone(), preprepare.proposal_hash)
            }
            _ => return,
        };

        let mut extra = match Extra::decode(&block.header.extra_data) {
            Ok(extra) => extra,
            Err(err) => {
                log::error!("Cannot decode extra data of block {}: {:?}", view.height, err);
                return;
            }
        };
        extra.committed = match AggregatedSignature::from_seals(&self.validator_set, seals) {
            Ok(committed) => committed,
            Err(err) => {
                log::error!("Cannot aggregate committed seals of block {}: {:?}", view.height, err);
                return;
            }
        };
        block.header.extra_data = extra.encode();

        if let Err(err) = self.backend.insert_block(block) {
            log::error!("Failed to insert finalized block {}: {:?}", view.height, err);
            return;
        }

        Event::publish(
            &self.event_publisher,
            Event::FinalizeBlock(FinalizeBlockEvent {
                timestamp: SystemTime::now(),
                number: view.height,
                round: view.round,
                hash,
            }),
        );

        let next_height = self.height + 1;
        if !extra.validators.is_empty() {
            match self.validator_sets.publish(next_height, &extra.validators) {
                Ok(_) => Event::publish(
                    &self.event_publisher,
                    Event::UpdateValidatorSet(UpdateValidatorSetEvent {
                        timestamp: SystemTime::now(),
                        activation: next_height,
                        delta: extra.validators,
                    }),
                ),
                Err(err) => log::error!(
                    "Cannot apply validator set delta of block {}: {:?}",
                    view.height,
                    err
                ),
            }
        }

        self.start_height(next_height)
    }

    fn send_prepare(&mut self) {
        let Some(proposal_hash) = self.round_state.proposal_hash() else {
            return;
        };
        let prepare = ConsensusMessage::new(
            self.config.chain_id,
            self.round_state.view,
            MessagePayload::Prepare(PrepareData { proposal_hash }),
        );
        let Some(prepare) = self.sign(prepare) else {
            return;
        };

        self.transport.multicast(&prepare);
        self.round_state.add_prepare(prepare);
    }

    fn send_commit(&mut self) {
        let Some(proposal_hash) = self.round_state.proposal_hash() else {
            return;
        };
        let seal = self.key.sign_committed_seal(&proposal_hash);
        let commit = ConsensusMessage::new(
            self.config.chain_id,
            self.round_state.view,
            MessagePayload::Commit(CommitData {
                proposal_hash,
                committed_seal: seal.to_bytes().to_vec(),
            }),
        );
        let Some(commit) = self.sign(commit) else {
            return;
        };

        self.transport.multicast(&commit);
        self.round_state
            .add_commit(self.key.address(), proposal_hash, seal);
        self.check_committed();
    }

    fn send_round_change(&mut self, round: Round) {
        let round_change = ConsensusMessage::new(
            self.config.chain_id,
            View::new(self.height, round),
            MessagePayload::RoundChange(RoundChangeData {
                prepared: self.latest_prepared.clone(),
            }),
        );
        let Some(round_change) = self.sign(round_change) else {
            return;
        };

        self.transport.multicast(&round_change);
        if let Some(round_change) = round_change.to_round_change_message() {
            self.round_changes.insert(round_change);
        }
    }

    fn sign(&self, message: ConsensusMessage) -> Option<ConsensusMessage> {
        match self.key.sign_consensus_message(message) {
            Ok(message) => Some(message),
            Err(err) => {
                log::error!("Failed to sign consensus message: {:?}", err);
                None
            }
        }
    }

    fn buffer(&mut self, message: ConsensusMessage) {
        if let Err(message) = self.future_messages.push(message, self.validator_set.len()) {
            self.drop_message(&message, DropReason::BufferFull)
        }
    }

    fn drop_message(&self, message: &ConsensusMessage, reason: DropReason) {
        log::debug!(
            "Dropping {:?} for view {} from {}: {:?}",
            message.message_type(),
            message.view,
            message.from,
            reason
        );
        Event::publish(
            &self.event_publisher,
            Event::DropMessage(DropMessageEvent {
                timestamp: SystemTime::now(),
                origin: message.from,
                view: message.view,
                message_type: message.message_type(),
                reason,
            }),
        );
    }

    fn publish_collect_quorum(&self, message_type: MessageType, signers: usize) {
        Event::publish(
            &self.event_publisher,
            Event::CollectQuorum(CollectQuorumEvent {
                timestamp: SystemTime::now(),
                view: self.round_state.view,
                message_type,
                signers,
            }),
        );
    }

    fn context(&self) -> HeightContext<'_> {
        HeightContext {
            chain_id: self.config.chain_id,
            height: self.height,
            validator_set: &self.validator_set,
            last_proposer: self.last_proposer,
        }
    }

    fn is_validator(&self) -> bool {
        self.validator_set.includes(&self.key.address())
    }

    fn is_proposer(&self, round: Round) -> bool {
        self.context().proposer(round) == Some(self.key.address())
    }
}
