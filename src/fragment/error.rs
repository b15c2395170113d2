//! Error and status types emitted by the fragment pools.
//!
//! These keep the outbound and inbound pools decoupled from the connection
//! facade while still surfacing precise diagnostics for tests and logs.

use thiserror::Error;

use super::{FragmentIndex, MessageId};
use crate::address::PeerAddress;

/// Result of feeding a fragment into a [`ReassemblyBuffer`](crate::fragment::ReassemblyBuffer).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FragmentStatus {
    /// The logical message still expects more fragments.
    Incomplete,
    /// The fragment completed the logical message.
    Complete,
    /// The fragment repeated an index that was already filled.
    Duplicate,
}

/// Not enough free slots remain in a fixed pool.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("fragment pool exhausted: requested {requested} slots, {available} free")]
pub struct PoolExhausted {
    /// Slots the operation needed.
    pub requested: usize,
    /// Slots that were free at the time.
    pub available: usize,
}

/// Errors produced by [`ReassemblyBuffer`](crate::fragment::ReassemblyBuffer).
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum ReassemblyError {
    /// Not enough free slots to reserve the message.
    #[error(transparent)]
    PoolExhausted(#[from] PoolExhausted),
    /// No reservation exists for the sender and message id.
    #[error("no reservation for message {message_id} from {sender}")]
    UnknownMessage {
        sender: PeerAddress,
        message_id: MessageId,
    },
    /// A reservation already exists for the sender and message id.
    #[error("message {message_id} from {sender} is already reserved")]
    AlreadyReserved {
        sender: PeerAddress,
        message_id: MessageId,
    },
    /// The payload was requested before every fragment arrived.
    #[error("message {message_id} from {sender} has {received} of {expected} fragments")]
    NotComplete {
        sender: PeerAddress,
        message_id: MessageId,
        received: usize,
        expected: usize,
    },
    /// The fragment index lies outside the reserved range.
    #[error("fragment index {index} outside 1..={count}")]
    IndexOutOfRange { index: FragmentIndex, count: u8 },
    /// A message cannot be reserved with zero fragments.
    #[error("fragment count must be at least one")]
    EmptyMessage,
    /// The fragment body exceeds the slot capacity.
    #[error("fragment of {len} bytes exceeds the {limit}-byte slot")]
    FragmentTooLarge { len: usize, limit: usize },
}

/// Errors produced while enqueueing an outbound message.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum OutboundError {
    /// Not enough free slots for every fragment of the message.
    #[error(transparent)]
    PoolExhausted(#[from] PoolExhausted),
    /// The message needs more fragments than the header can count.
    #[error("message of {len} bytes exceeds the {limit}-byte fragmentation limit")]
    PayloadTooLarge { len: usize, limit: usize },
}
