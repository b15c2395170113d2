//! Cloneable handle for issuing commands to a running [`LinkDriver`].
//!
//! [`LinkDriver`]: super::LinkDriver

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::{
    address::PeerAddress,
    config::Role,
    connection::{SendError, ValidationError},
    flow::FlowState,
    fragment::MessageId,
    pairing::{PairingError, PairingState},
};

/// Errors returned by [`DriverHandle`] requests.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The driver has stopped.
    #[error("link driver is not running")]
    Closed,
    /// The connection refused the message.
    #[error(transparent)]
    Send(#[from] SendError),
    /// The pairing request failed.
    #[error(transparent)]
    Pairing(#[from] PairingError),
    /// The request carried an invalid argument.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Snapshot of the connection owned by a driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LinkStatus {
    /// Role of the station.
    pub role: Role,
    /// Current link-layer address.
    pub local_address: PeerAddress,
    /// Address a client sends to by default.
    pub counterpart: Option<PeerAddress>,
    /// Pairing phase.
    pub pairing: PairingState,
    /// Flow controller state.
    pub flow: FlowState,
    /// Fragments waiting in the outbound pool.
    pub queued_fragments: usize,
}

pub(super) enum Command {
    Send {
        payload: Vec<u8>,
        destination: Option<PeerAddress>,
        reply: oneshot::Sender<Result<MessageId, SendError>>,
    },
    AnnounceConnect {
        destination: Option<PeerAddress>,
        reply: oneshot::Sender<Result<MessageId, SendError>>,
    },
    StartPairing {
        timeout_secs: Option<u32>,
        reply: oneshot::Sender<Result<(), PairingError>>,
    },
    EndPairing {
        reply: oneshot::Sender<Result<(), PairingError>>,
    },
    SetCounterpart {
        address: PeerAddress,
        reply: oneshot::Sender<Result<(), ValidationError>>,
    },
    Status {
        reply: oneshot::Sender<LinkStatus>,
    },
}

/// Handle for talking to a [`LinkDriver`](super::LinkDriver).
///
/// Every request waits for the driver to apply it. Once the driver stops,
/// requests fail with [`DriverError::Closed`].
#[derive(Clone, Debug)]
pub struct DriverHandle {
    commands: mpsc::Sender<Command>,
    shutdown: CancellationToken,
}

impl DriverHandle {
    pub(super) const fn new(commands: mpsc::Sender<Command>, shutdown: CancellationToken) -> Self {
        Self { commands, shutdown }
    }

    /// Queue `payload` for `destination`, or for the counterpart on a client.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Send`] when the connection rejects the
    /// message and [`DriverError::Closed`] once the driver has stopped.
    pub async fn send_message(
        &self,
        payload: impl Into<Vec<u8>>,
        destination: Option<PeerAddress>,
    ) -> Result<MessageId, DriverError> {
        let payload = payload.into();
        let id = self
            .request(|reply| Command::Send {
                payload,
                destination,
                reply,
            })
            .await??;
        Ok(id)
    }

    /// Queue a CONNECT envelope.
    ///
    /// # Errors
    ///
    /// See [`DriverHandle::send_message`].
    pub async fn announce_connect(&self, destination: Option<PeerAddress>) -> Result<MessageId, DriverError> {
        let id = self
            .request(|reply| Command::AnnounceConnect { destination, reply })
            .await??;
        Ok(id)
    }

    /// Open a pairing session. `None` uses the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Pairing`] when a session already runs or the
    /// transport refuses the address switch.
    pub async fn start_pairing(&self, timeout_secs: Option<u32>) -> Result<(), DriverError> {
        self.request(|reply| Command::StartPairing { timeout_secs, reply })
            .await??;
        Ok(())
    }

    /// Close the running pairing session.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Pairing`] when no session exists.
    pub async fn end_pairing(&self) -> Result<(), DriverError> {
        self.request(|reply| Command::EndPairing { reply }).await??;
        Ok(())
    }

    /// Set a client's counterpart.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Validation`] on a server.
    pub async fn set_counterpart(&self, address: PeerAddress) -> Result<(), DriverError> {
        self.request(|reply| Command::SetCounterpart { address, reply })
            .await??;
        Ok(())
    }

    /// Snapshot the connection state.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Closed`] once the driver has stopped.
    pub async fn status(&self) -> Result<LinkStatus, DriverError> {
        self.request(|reply| Command::Status { reply }).await
    }

    /// Ask the driver to stop.
    pub fn shutdown(&self) { self.shutdown.cancel(); }

    /// Whether the driver has stopped accepting commands.
    #[must_use]
    pub fn is_closed(&self) -> bool { self.commands.is_closed() }

    async fn request<R>(&self, build: impl FnOnce(oneshot::Sender<R>) -> Command) -> Result<R, DriverError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| DriverError::Closed)?;
        response.await.map_err(|_| DriverError::Closed)
    }
}
