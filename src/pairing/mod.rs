//! Rendezvous pairing handshake.
//!
//! A server discovers an unknown client by repeatedly sending PAIR
//! envelopes, carrying its own address, to a well-known rendezvous address.
//! The client temporarily assumes that address, answers the first PAIR it
//! hears with a unicast PAIR of its own and then restores its real address.
//!
//! [`PairingMachine`] holds only the session state. It reports what should
//! happen through outcome values and leaves transport, indicator and
//! callback effects to the [`Connection`](crate::Connection) that owns it.

mod indicator;
mod timeout;

pub use indicator::{BLINK_INTERVAL, IndicatorBlink};
use log::{debug, info};
use thiserror::Error;
pub use timeout::{
    CLIENT_MAX_TIMEOUT_SECS,
    CLIENT_MIN_TIMEOUT_SECS,
    PAIRING_RETRY_INTERVAL,
    SERVER_MIN_TIMEOUT_SECS,
    normalize_timeout,
    retry_budget,
};

use crate::{
    address::PeerAddress,
    config::{IndicatorConfig, Role},
    metrics,
    transport::TransportError,
};

/// Phase of the pairing handshake.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PairingState {
    /// No session.
    Idle,
    /// Server sending PAIR envelopes on every retry tick.
    ServerBroadcasting,
    /// Client listening on the rendezvous address.
    ClientListening,
    /// Session over; returns to [`PairingState::Idle`] once finished.
    Ended,
}

/// Errors raised by pairing control operations.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PairingError {
    /// A session is already running.
    #[error("pairing already in progress")]
    AlreadyPairing,
    /// No session is running.
    #[error("pairing not started")]
    NotStarted,
    /// The transport refused an address change.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Transient state of one pairing attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PairingSession {
    timeout_secs: u32,
    retries: u32,
    retry_limit: Option<u32>,
    saved_address: Option<PeerAddress>,
}

impl PairingSession {
    /// Normalised timeout in seconds; zero means unbounded.
    #[must_use]
    pub const fn timeout_secs(&self) -> u32 { self.timeout_secs }

    /// Retry ticks consumed so far.
    #[must_use]
    pub const fn retries(&self) -> u32 { self.retries }

    /// Retry ticks allowed, if bounded.
    #[must_use]
    pub const fn retry_limit(&self) -> Option<u32> { self.retry_limit }

    /// Address the client held before pairing, until restored.
    #[must_use]
    pub const fn saved_address(&self) -> Option<PeerAddress> { self.saved_address }

    fn exhausted(&self) -> bool { self.retry_limit.is_some_and(|limit| self.retries >= limit) }
}

/// Action requested by a retry tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryOutcome {
    /// No session is listening or broadcasting.
    Inactive,
    /// Send a PAIR carrying the local address to `destination`. When `last`
    /// is set the budget is spent and the session has ended.
    Broadcast { destination: PeerAddress, last: bool },
    /// The client keeps listening.
    Listening,
    /// The client's window closed without a PAIR.
    Expired,
}

/// Reaction to an inbound PAIR envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PairOutcome {
    /// Announce `address` as paired; `finish` ends the running session.
    Paired {
        sender: PeerAddress,
        address: PeerAddress,
        finish: bool,
    },
    /// A listening client found its server and must reply to `sender`.
    Discovered {
        sender: PeerAddress,
        address: PeerAddress,
    },
    /// The envelope came from someone other than the configured partner.
    Ignored,
}

/// Pairing session state for one connection.
#[derive(Debug)]
pub struct PairingMachine {
    role: Role,
    rendezvous: PeerAddress,
    partner: Option<PeerAddress>,
    state: PairingState,
    session: Option<PairingSession>,
    indicator: IndicatorBlink,
}

impl PairingMachine {
    /// Create an idle machine.
    #[must_use]
    pub const fn new(
        role: Role,
        rendezvous: PeerAddress,
        partner: Option<PeerAddress>,
        indicator: Option<IndicatorConfig>,
    ) -> Self {
        Self {
            role,
            rendezvous,
            partner,
            state: PairingState::Idle,
            session: None,
            indicator: IndicatorBlink::new(indicator),
        }
    }

    /// Current phase.
    #[must_use]
    pub const fn state(&self) -> PairingState { self.state }

    /// Running session, if any.
    #[must_use]
    pub const fn session(&self) -> Option<&PairingSession> { self.session.as_ref() }

    /// Whether the handshake is listening or broadcasting.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(
            self.state,
            PairingState::ServerBroadcasting | PairingState::ClientListening
        )
    }

    /// Whether a session exists, including one that ended but is not yet
    /// finished.
    #[must_use]
    pub const fn has_session(&self) -> bool { self.session.is_some() }

    /// Address the client listens on while pairing.
    #[must_use]
    pub const fn rendezvous(&self) -> PeerAddress { self.rendezvous }

    /// Destination of server PAIR envelopes.
    #[must_use]
    pub const fn pairing_target(&self) -> PeerAddress {
        match self.partner {
            Some(partner) => partner,
            None => self.rendezvous,
        }
    }

    /// Open a session.
    ///
    /// `own_address` is saved so a client can restore it afterwards. The
    /// caller switches a client's address to [`PairingMachine::rendezvous`].
    ///
    /// # Errors
    ///
    /// Returns [`PairingError::AlreadyPairing`] unless the machine is idle.
    pub fn start(&mut self, timeout_secs: u32, own_address: PeerAddress) -> Result<&PairingSession, PairingError> {
        if self.state != PairingState::Idle {
            return Err(PairingError::AlreadyPairing);
        }
        let timeout_secs = normalize_timeout(self.role, timeout_secs);
        let (state, saved_address) = match self.role {
            Role::Server => (PairingState::ServerBroadcasting, None),
            Role::Client => (PairingState::ClientListening, Some(own_address)),
        };
        self.state = state;
        metrics::set_pairing_active(true);
        info!(
            "pairing started: role={}, timeout_secs={timeout_secs}",
            self.role
        );
        Ok(self.session.insert(PairingSession {
            timeout_secs,
            retries: 0,
            retry_limit: retry_budget(timeout_secs),
            saved_address,
        }))
    }

    /// Advance the session by one retry interval.
    pub fn retry_tick(&mut self) -> RetryOutcome {
        if !self.is_active() {
            return RetryOutcome::Inactive;
        }
        let Some(session) = self.session.as_mut() else {
            return RetryOutcome::Inactive;
        };
        session.retries = session.retries.saturating_add(1);
        let exhausted = session.exhausted();
        debug!(
            "pairing retry: role={}, attempt={}, limit={:?}",
            self.role, session.retries, session.retry_limit
        );

        match self.role {
            Role::Server => {
                if exhausted {
                    self.state = PairingState::Ended;
                }
                RetryOutcome::Broadcast {
                    destination: self.pairing_target(),
                    last: exhausted,
                }
            }
            Role::Client if exhausted => {
                info!("pairing window closed without a server");
                self.state = PairingState::Ended;
                RetryOutcome::Expired
            }
            Role::Client => RetryOutcome::Listening,
        }
    }

    /// React to a PAIR envelope from `sender` carrying `address`.
    pub fn on_pair_received(&mut self, sender: PeerAddress, address: PeerAddress) -> PairOutcome {
        match (self.role, self.state) {
            (Role::Client, PairingState::ClientListening) => {
                if self.partner.is_some_and(|partner| partner != sender) {
                    debug!("ignoring PAIR from non-partner: sender={sender}");
                    return PairOutcome::Ignored;
                }
                info!("pairing server discovered: sender={sender}, address={address}");
                self.state = PairingState::Ended;
                PairOutcome::Discovered { sender, address }
            }
            (_, state) => PairOutcome::Paired {
                sender,
                address,
                finish: state == PairingState::ServerBroadcasting,
            },
        }
    }

    /// Take the address a client must restore, if not yet restored.
    pub fn take_saved_address(&mut self) -> Option<PeerAddress> {
        self.session.as_mut().and_then(|s| s.saved_address.take())
    }

    /// Close the session and return to [`PairingState::Idle`].
    ///
    /// Returns any address still awaiting restoration.
    ///
    /// # Errors
    ///
    /// Returns [`PairingError::NotStarted`] when no session exists.
    pub fn finish(&mut self) -> Result<Option<PeerAddress>, PairingError> {
        let Some(mut session) = self.session.take() else {
            return Err(PairingError::NotStarted);
        };
        self.state = PairingState::Idle;
        metrics::set_pairing_active(false);
        info!(
            "pairing finished: role={}, retries={}",
            self.role, session.retries
        );
        Ok(session.saved_address.take())
    }

    /// Toggle the indicator while a session runs.
    pub fn blink_tick(&mut self) -> Option<(u8, bool)> {
        if self.is_active() {
            self.indicator.toggle()
        } else {
            None
        }
    }

    /// Return the indicator to its idle level.
    pub fn reset_indicator(&mut self) -> Option<(u8, bool)> { self.indicator.reset() }
}
