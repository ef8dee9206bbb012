/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Messages exchanged over the consensus and bridge gossip topics.
//!
//! Every [`ConsensusMessage`] is an envelope `{chain_id, view, from, payload, signature}`. The
//! signature is an address-recoverable ECDSA signature over the message's
//! [payload without signature](ConsensusMessage::payload_no_sig): the Borsh encoding of every field
//! except `signature` itself, and except the round change certificate of a preprepare, which is made
//! of signed messages and checked on its own.
//!
//! ## Certificates
//!
//! Certificates carry envelopes with narrower payloads: a [`PreparedCertificate`] holds a
//! [`ProposalData`] message and [`PrepareData`] messages, and a [`RoundChangeCertificate`] holds
//! [`RoundChangeData`] messages. None of these can carry another certificate of its own kind, so a
//! message nests at most three envelopes deep. A narrowed message has the same payload without
//! signature as the full message it was taken from, so its signature still recovers its sender.

use std::io;

use borsh::{BorshDeserialize, BorshSerialize};

use crate::types::{
    block::Block,
    data_types::{Address, ChainID, CryptoHash, View},
};

/// Protocol ID of the gossip topic carrying [`ConsensusMessage`]s.
pub const CONSENSUS_TOPIC: &str = "/pbft/0.2";

/// Protocol ID of the gossip topic carrying [`BridgeMessage`]s.
pub const BRIDGE_TOPIC: &str = "/bridge/0.2";

/// Kinds of consensus messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, BorshSerialize, BorshDeserialize)]
pub enum MessageType {
    Preprepare,
    Prepare,
    Commit,
    RoundChange,
}

/// Something that can be carried, and signed, in a [`ConsensusMessage`].
pub trait Payload: BorshSerialize + BorshDeserialize + Clone {
    fn message_type(&self) -> MessageType;

    /// Write the part of the payload that the sender signs, preceded by its message type.
    fn serialize_signed<W: io::Write>(&self, writer: &mut W) -> io::Result<()>;
}

/// A signed consensus message.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct ConsensusMessage<P = MessagePayload> {
    pub chain_id: ChainID,
    pub view: View,
    pub from: Address,
    pub payload: P,
    pub signature: Vec<u8>,
}

impl<P: Payload> ConsensusMessage<P> {
    /// Create an unsigned message. `from` is filled in when the message is signed.
    pub fn new(chain_id: ChainID, view: View, payload: P) -> ConsensusMessage<P> {
        ConsensusMessage {
            chain_id,
            view,
            from: Address::ZERO,
            payload,
            signature: Vec::new(),
        }
    }

    pub fn message_type(&self) -> MessageType {
        self.payload.message_type()
    }

    /// Get the bytes that the sender signs: the Borsh encoding of every field of the message except
    /// `signature`, with the payload written by [`Payload::serialize_signed`].
    pub fn payload_no_sig(&self) -> io::Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.chain_id.serialize(&mut bytes)?;
        self.view.serialize(&mut bytes)?;
        self.from.serialize(&mut bytes)?;
        self.payload.serialize_signed(&mut bytes)?;
        Ok(bytes)
    }

    fn with_payload<Q>(&self, payload: Q) -> ConsensusMessage<Q> {
        ConsensusMessage {
            chain_id: self.chain_id,
            view: self.view,
            from: self.from,
            payload,
            signature: self.signature.clone(),
        }
    }
}

impl ConsensusMessage {
    /// Get the proposal hash this message is about, if it is about one.
    pub fn proposal_hash(&self) -> Option<CryptoHash> {
        match &self.payload {
            MessagePayload::Preprepare(preprepare) => Some(preprepare.proposal_hash),
            MessagePayload::Prepare(prepare) => Some(prepare.proposal_hash),
            MessagePayload::Commit(commit) => Some(commit.proposal_hash),
            MessagePayload::RoundChange(_) => None,
        }
    }

    /// Narrow a preprepare down to its proposal, leaving out its round change certificate.
    pub fn to_proposal_message(&self) -> Option<ConsensusMessage<ProposalData>> {
        match &self.payload {
            MessagePayload::Preprepare(preprepare) => {
                Some(self.with_payload(preprepare.proposal_data()))
            }
            _ => None,
        }
    }

    pub fn to_prepare_message(&self) -> Option<ConsensusMessage<PrepareData>> {
        match &self.payload {
            MessagePayload::Prepare(prepare) => Some(self.with_payload(prepare.clone())),
            _ => None,
        }
    }

    pub fn to_round_change_message(&self) -> Option<ConsensusMessage<RoundChangeData>> {
        match &self.payload {
            MessagePayload::RoundChange(round_change) => {
                Some(self.with_payload(round_change.clone()))
            }
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum MessagePayload {
    Preprepare(PreprepareData),
    Prepare(PrepareData),
    Commit(CommitData),
    RoundChange(RoundChangeData),
}

impl Payload for MessagePayload {
    fn message_type(&self) -> MessageType {
        match self {
            MessagePayload::Preprepare(_) => MessageType::Preprepare,
            MessagePayload::Prepare(_) => MessageType::Prepare,
            MessagePayload::Commit(_) => MessageType::Commit,
            MessagePayload::RoundChange(_) => MessageType::RoundChange,
        }
    }

    fn serialize_signed<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        match self {
            MessagePayload::Preprepare(preprepare) => {
                preprepare.proposal_data().serialize_signed(writer)
            }
            MessagePayload::Prepare(prepare) => prepare.serialize_signed(writer),
            MessagePayload::Commit(commit) => commit.serialize_signed(writer),
            MessagePayload::RoundChange(round_change) => round_change.serialize_signed(writer),
        }
    }
}

/// A proposal. In rounds after the first, the proposal must justify itself with the round change
/// messages that moved a quorum of validators into its round.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct PreprepareData {
    pub proposal: Block,
    pub proposal_hash: CryptoHash,
    pub certificate: Option<RoundChangeCertificate>,
}

impl PreprepareData {
    pub fn proposal_data(&self) -> ProposalData {
        ProposalData {
            proposal: self.proposal.clone(),
            proposal_hash: self.proposal_hash,
        }
    }
}

/// The signed part of a preprepare.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct ProposalData {
    pub proposal: Block,
    pub proposal_hash: CryptoHash,
}

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct PrepareData {
    pub proposal_hash: CryptoHash,
}

/// A commit vote, carrying the sender's BLS committed seal over the proposal hash.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct CommitData {
    pub proposal_hash: CryptoHash,
    pub committed_seal: Vec<u8>,
}

/// A request to move to the round in the message's view, carrying the most recent proposal the
/// sender saw prepared at the message's height, if any.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct RoundChangeData {
    pub prepared: Option<PreparedCertificate>,
}

macro_rules! impl_payload {
    ($data:ty, $message_type:expr) => {
        impl Payload for $data {
            fn message_type(&self) -> MessageType {
                $message_type
            }

            fn serialize_signed<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
                $message_type.serialize(writer)?;
                self.serialize(writer)
            }
        }
    };
}

impl_payload!(ProposalData, MessageType::Preprepare);
impl_payload!(PrepareData, MessageType::Prepare);
impl_payload!(CommitData, MessageType::Commit);
impl_payload!(RoundChangeData, MessageType::RoundChange);

/// Proof that a proposal was prepared: its proposal message together with a quorum of prepare
/// messages for it.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct PreparedCertificate {
    pub proposal_message: ConsensusMessage<ProposalData>,
    pub prepare_messages: Vec<ConsensusMessage<PrepareData>>,
}

/// A quorum of round change messages for a single round.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct RoundChangeCertificate {
    pub round_change_messages: Vec<ConsensusMessage<RoundChangeData>>,
}

/// A validator's signature over a bridge (state sync) commitment, gossiped on the bridge topic.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct BridgeMessage {
    pub hash: CryptoHash,
    pub signature: Vec<u8>,
    pub from: Address,
    pub epoch_number: u64,
}
