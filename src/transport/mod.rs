//! Collaborator interfaces consumed by the connection.
//!
//! The radio stack, timers and indicator GPIO live outside this crate.
//! [`Transport`] captures what the connection needs from the link layer and
//! [`IndicatorWriter`] the single output used for pairing feedback.
//!
//! Link-layer callbacks may run in interrupt context, so transports never
//! call into the connection directly. They push [`LinkEvent`]s into an
//! [`EventSink`]; the cooperative [`LinkDriver`](crate::driver::LinkDriver)
//! drains the queue and applies each event to the connection it owns.

pub mod loopback;
#[cfg(test)]
pub(crate) mod test_support;

use bytes::Bytes;
use log::warn;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::address::PeerAddress;

/// Outcome reported by the link for one transmitted frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendStatus {
    /// The link confirmed delivery.
    Delivered,
    /// The link gave up on the frame.
    Failed,
}

impl SendStatus {
    /// Whether the frame was delivered.
    #[must_use]
    pub const fn is_delivered(self) -> bool { matches!(self, Self::Delivered) }
}

/// Event raised by the link layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LinkEvent {
    /// A frame arrived from `sender`.
    Received { sender: PeerAddress, frame: Bytes },
    /// A previously submitted frame finished transmitting.
    SendComplete {
        destination: PeerAddress,
        status: SendStatus,
    },
}

/// Non-blocking producer side of the inbound event queue.
///
/// Safe to use from callback context: pushing never waits. When the queue
/// is full the event is dropped and a warning is logged.
#[derive(Clone, Debug)]
pub struct EventSink(mpsc::Sender<LinkEvent>);

impl EventSink {
    /// Wrap an existing channel sender.
    #[must_use]
    pub fn new(sender: mpsc::Sender<LinkEvent>) -> Self { Self(sender) }

    /// Create a bounded event queue, returning the sink and its receiver.
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<LinkEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self(tx), rx)
    }

    /// Queue an event without waiting.
    ///
    /// Returns `false` if the event was dropped.
    pub fn push(&self, event: LinkEvent) -> bool {
        match self.0.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                warn!("link event queue full; dropping event: event={event:?}");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Whether the receiving side has gone away.
    #[must_use]
    pub fn is_closed(&self) -> bool { self.0.is_closed() }

    /// Whether both sinks feed the same queue.
    #[must_use]
    pub fn same_channel(&self, other: &Self) -> bool { self.0.same_channel(&other.0) }
}

/// Errors reported synchronously by a [`Transport`].
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The transport has no event sink installed yet.
    #[error("transport not initialised")]
    NotInitialised,
    /// The destination must be registered before unicast.
    #[error("peer {0} is not registered")]
    UnknownPeer(PeerAddress),
    /// The peer table cannot hold another entry.
    #[error("peer table full ({capacity} entries)")]
    PeerTableFull { capacity: usize },
    /// The frame exceeds what the link can carry.
    #[error("frame of {len} bytes exceeds the link MTU of {mtu}")]
    FrameTooLarge { len: usize, mtu: usize },
    /// The link refused the operation.
    #[error("link rejected the request: {0}")]
    Rejected(String),
}

/// Link-layer capabilities required by the connection.
///
/// `send` only submits a frame; its outcome arrives later as a
/// [`LinkEvent::SendComplete`] through the installed [`EventSink`].
pub trait Transport: Send {
    /// Current link-layer address of this station.
    fn local_address(&self) -> PeerAddress;

    /// Change the station's link-layer address.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the link refuses the address.
    fn set_local_address(&mut self, address: PeerAddress) -> Result<(), TransportError>;

    /// Add `address` to the peer table. Registering twice is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::PeerTableFull`] when no entry is free.
    fn register_peer(&mut self, address: PeerAddress) -> Result<(), TransportError>;

    /// Remove `address` from the peer table.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the link refuses the removal.
    fn unregister_peer(&mut self, address: PeerAddress) -> Result<(), TransportError>;

    /// Submit one frame for transmission.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the frame could not be submitted; no
    /// completion event follows in that case.
    fn send(&mut self, destination: PeerAddress, frame: &[u8]) -> Result<(), TransportError>;

    /// Install the sink that receives frames and send completions.
    fn set_event_sink(&mut self, sink: EventSink);
}

/// Binary output used to signal pairing progress.
pub trait IndicatorWriter: Send {
    /// Drive `pin` high or low.
    fn write(&mut self, pin: u8, high: bool);
}

impl<F> IndicatorWriter for F
where
    F: FnMut(u8, bool) + Send,
{
    fn write(&mut self, pin: u8, high: bool) { self(pin, high); }
}
