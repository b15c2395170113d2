//! Outbound entry points and their validation.

use log::warn;
use thiserror::Error;

use super::Connection;
use crate::{
    address::{AddressParseError, PeerAddress},
    config::Role,
    envelope::EnvelopeKind,
    fragment::{MessageId, OutboundError},
    message::Message,
    metrics::{self, ErrorKind},
    transport::Transport,
};

/// Preconditions a send failed before anything was queued.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A server must name the destination of every send.
    #[error("a destination address is required")]
    MissingDestination,
    /// A client has no counterpart to send to.
    #[error("no counterpart address configured")]
    MissingCounterpart,
    /// The address text is malformed.
    #[error(transparent)]
    InvalidAddress(#[from] AddressParseError),
    /// The payload needs more fragments than one message may span.
    #[error("payload of {len} bytes exceeds the {limit}-byte message limit")]
    PayloadTooLarge { len: usize, limit: usize },
    /// The operation is not available to this role.
    #[error("operation not available to a {role}")]
    WrongRole { role: Role },
}

/// Reasons a message could not be queued.
#[derive(Debug, Error)]
pub enum SendError {
    /// A precondition failed.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The outbound pool rejected the message.
    #[error(transparent)]
    Outbound(#[from] OutboundError),
    /// A typed message could not be serialised.
    #[error("message encoding failed: {0}")]
    Encode(#[from] bincode::error::EncodeError),
}

/// A complete message delivered by a peer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceivedMessage {
    sender: PeerAddress,
    payload: Vec<u8>,
}

impl ReceivedMessage {
    /// Pair a payload with its sender.
    #[must_use]
    pub const fn new(sender: PeerAddress, payload: Vec<u8>) -> Self { Self { sender, payload } }

    /// Peer that sent the message.
    #[must_use]
    pub const fn sender(&self) -> PeerAddress { self.sender }

    /// Borrow the reassembled payload.
    #[must_use]
    pub fn payload(&self) -> &[u8] { &self.payload }

    /// Consume the message, returning its payload.
    #[must_use]
    pub fn into_payload(self) -> Vec<u8> { self.payload }

    /// Decode the payload as a typed message.
    ///
    /// # Errors
    ///
    /// Returns a [`bincode::error::DecodeError`] if the payload does not
    /// hold an `M`.
    pub fn decode<M: Message>(&self) -> Result<M, bincode::error::DecodeError> {
        M::from_bytes(&self.payload).map(|(message, _)| message)
    }
}

impl<T: Transport> Connection<T> {
    /// Queue `payload` for delivery.
    ///
    /// A server must pass `destination`. A client sends to `destination`
    /// when given and to its counterpart otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::Validation`] when no destination can be
    /// resolved or the payload is too large, and [`SendError::Outbound`]
    /// when the outbound pool lacks free slots.
    pub fn send_message(
        &mut self,
        payload: &[u8],
        destination: Option<PeerAddress>,
    ) -> Result<MessageId, SendError> {
        let destination = self.resolve_destination(destination)?;
        self.enqueue(destination, EnvelopeKind::Data, payload)
    }

    /// Queue `payload` for the destination given as twelve hex characters.
    ///
    /// An empty string means no destination.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidAddress`] for malformed text and
    /// otherwise behaves like [`Connection::send_message`].
    pub fn send_message_to_str(&mut self, payload: &[u8], destination: &str) -> Result<MessageId, SendError> {
        let destination = if destination.is_empty() {
            None
        } else {
            Some(
                destination
                    .parse::<PeerAddress>()
                    .map_err(ValidationError::from)?,
            )
        };
        self.send_message(payload, destination)
    }

    /// Serialise `message` with bincode and queue it.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::Encode`] if serialisation fails and otherwise
    /// behaves like [`Connection::send_message`].
    pub fn send_typed<M: Message>(
        &mut self,
        message: &M,
        destination: Option<PeerAddress>,
    ) -> Result<MessageId, SendError> {
        let bytes = message.to_bytes()?;
        self.send_message(&bytes, destination)
    }

    /// Queue a CONNECT envelope telling the peer it was chosen.
    ///
    /// The payload carries the resolved destination, which is the address
    /// this station has chosen as its counterpart.
    ///
    /// # Errors
    ///
    /// See [`Connection::send_message`].
    pub fn announce_connect(&mut self, destination: Option<PeerAddress>) -> Result<MessageId, SendError> {
        let destination = self.resolve_destination(destination)?;
        self.enqueue(destination, EnvelopeKind::Connect, destination.as_bytes())
    }

    pub(super) fn enqueue(
        &mut self,
        destination: PeerAddress,
        kind: EnvelopeKind,
        payload: &[u8],
    ) -> Result<MessageId, SendError> {
        let limit = self.config.fragmentation().max_message_size();
        if payload.len() > limit {
            return Err(ValidationError::PayloadTooLarge {
                len: payload.len(),
                limit,
            }
            .into());
        }
        self.outbound
            .enqueue_kind(destination, kind, payload)
            .map_err(|e| {
                warn!("message not queued: destination={destination}, kind={kind}, error={e}");
                metrics::inc_errors(ErrorKind::PoolExhausted);
                SendError::from(e)
            })
    }

    fn resolve_destination(&self, destination: Option<PeerAddress>) -> Result<PeerAddress, ValidationError> {
        match self.config.role() {
            Role::Server => destination.ok_or(ValidationError::MissingDestination),
            Role::Client => destination
                .or(self.counterpart)
                .ok_or(ValidationError::MissingCounterpart),
        }
    }
}
