//! Single-in-flight gate between the outbound pool and the transport.
//!
//! [`SendFlowController`] submits at most one fragment at a time. A fragment
//! leaves the outbound pool as soon as the transport accepts it, and the
//! controller stays [`FlowState::InFlight`] until the matching completion
//! arrives or the completion deadline passes, whichever comes first. A
//! send whose completion never arrives is reported as failed once the
//! deadline passes. Completions for the pairing rendezvous address are
//! absorbed so broadcast traffic never reaches the application's
//! send-status hooks.

use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::{
    address::PeerAddress,
    envelope::{MAX_FRAME_LEN, encode_into},
    fragment::OutboundBuffer,
    metrics::{self, Direction, ErrorKind},
    transport::{SendStatus, Transport},
};

/// Transmission state of the controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlowState {
    /// No fragment is awaiting completion.
    Idle,
    /// One fragment was submitted and its completion is outstanding.
    InFlight {
        destination: PeerAddress,
        submitted_at: Instant,
    },
}

/// Send outcome surfaced to the application.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SendReport {
    /// Recipient of the fragment.
    pub destination: PeerAddress,
    /// Whether the link delivered it.
    pub status: SendStatus,
}

/// Default time allowed for a transport completion to arrive.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(1);

/// Result of one [`SendFlowController::drive`] pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrivePass {
    /// Fragments remain in the outbound pool.
    pub more_pending: bool,
    /// The outstanding send passed its deadline and was abandoned.
    pub expired: Option<SendReport>,
    /// The transport rejected the submission outright.
    pub rejected: Option<SendReport>,
}

/// Gate enforcing one outstanding transport send.
#[derive(Debug)]
pub struct SendFlowController {
    state: FlowState,
    min_spacing: Option<Duration>,
    send_timeout: Duration,
    last_completion: Option<Instant>,
    silent: PeerAddress,
}

impl SendFlowController {
    /// Create an idle controller that suppresses reports for `silent`.
    #[must_use]
    pub const fn new(silent: PeerAddress) -> Self {
        Self {
            state: FlowState::Idle,
            min_spacing: None,
            send_timeout: DEFAULT_SEND_TIMEOUT,
            last_completion: None,
            silent,
        }
    }

    /// Abandon an outstanding send after `timeout` without a completion.
    #[must_use]
    pub const fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Require at least `spacing` between a completion and the next submit.
    #[must_use]
    pub const fn with_min_spacing(mut self, spacing: Option<Duration>) -> Self {
        self.min_spacing = spacing;
        self
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> FlowState { self.state }

    /// Whether a fragment is awaiting completion.
    #[must_use]
    pub const fn is_in_flight(&self) -> bool { matches!(self.state, FlowState::InFlight { .. }) }

    /// Address whose completions are never reported.
    #[must_use]
    pub const fn silent_destination(&self) -> PeerAddress { self.silent }

    /// Time allowed for a completion before the send is abandoned.
    #[must_use]
    pub const fn send_timeout(&self) -> Duration { self.send_timeout }

    /// Whether a new fragment may be submitted at `now`.
    ///
    /// An outstanding send past its deadline no longer blocks the gate; its
    /// deadline counts as the completion time for spacing.
    #[must_use]
    pub fn can_send_now(&self, now: Instant) -> bool {
        let last = match self.state {
            FlowState::InFlight { submitted_at, .. } => match self.deadline(submitted_at) {
                Some(deadline) if now >= deadline => Some(deadline),
                _ => return false,
            },
            FlowState::Idle => self.last_completion,
        };
        self.min_spacing
            .zip(last)
            .is_none_or(|(spacing, last)| now.saturating_duration_since(last) >= spacing)
    }

    /// Submit the oldest pending fragment if the gate is open.
    ///
    /// An outstanding send past its deadline is first abandoned: its peer is
    /// unregistered and it is reported as failed. The destination is
    /// registered with the transport before the send. A fragment the
    /// transport rejects synchronously is still removed from the pool and
    /// reported as failed, leaving the controller idle.
    pub fn drive<T>(&mut self, outbound: &mut OutboundBuffer, transport: &mut T, now: Instant) -> DrivePass
    where
        T: Transport + ?Sized,
    {
        let expired = self.expire_overdue(transport, now);
        if !self.can_send_now(now) {
            return DrivePass {
                more_pending: !outbound.is_empty(),
                expired,
                rejected: None,
            };
        }
        let Some((slot_id, slot)) = outbound.next_pending_fragment() else {
            return DrivePass {
                expired,
                ..DrivePass::default()
            };
        };

        let destination = slot.peer();
        let mut frame = [0_u8; MAX_FRAME_LEN];
        let submitted = match encode_into(&slot.header(), slot.payload(), &mut frame) {
            Ok(len) => transport
                .register_peer(destination)
                .and_then(|()| transport.send(destination, &frame[..len]))
                .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        outbound.mark_sent(slot_id);

        let rejected = match submitted {
            Ok(()) => {
                metrics::inc_fragments(Direction::Outbound);
                self.state = FlowState::InFlight {
                    destination,
                    submitted_at: now,
                };
                None
            }
            Err(error) => {
                warn!("fragment submission failed: destination={destination}, error={error}");
                metrics::inc_errors(ErrorKind::Transport);
                if let Err(e) = transport.unregister_peer(destination) {
                    debug!("peer unregister failed: peer={destination}, error={e}");
                }
                self.last_completion = Some(now);
                self.report(destination, SendStatus::Failed)
            }
        };
        DrivePass {
            more_pending: !outbound.is_empty(),
            expired,
            rejected,
        }
    }

    /// Apply a transport completion and return to [`FlowState::Idle`].
    ///
    /// Returns the report to surface, or `None` when nothing was in flight
    /// or the destination is silent.
    pub fn on_transport_complete(
        &mut self,
        destination: PeerAddress,
        status: SendStatus,
        now: Instant,
    ) -> Option<SendReport> {
        let FlowState::InFlight {
            destination: expected,
            ..
        } = self.state
        else {
            debug!("completion with nothing in flight: destination={destination}");
            return None;
        };
        if expected != destination {
            warn!("completion for unexpected peer: expected={expected}, got={destination}");
        }
        self.state = FlowState::Idle;
        self.last_completion = Some(now);
        if !status.is_delivered() {
            metrics::inc_errors(ErrorKind::Transport);
        }
        self.report(destination, status)
    }

    /// Forget any outstanding transaction.
    pub fn reset(&mut self) {
        self.state = FlowState::Idle;
        self.last_completion = None;
    }

    fn expire_overdue<T>(&mut self, transport: &mut T, now: Instant) -> Option<SendReport>
    where
        T: Transport + ?Sized,
    {
        let FlowState::InFlight {
            destination,
            submitted_at,
        } = self.state
        else {
            return None;
        };
        let deadline = self.deadline(submitted_at).filter(|deadline| now >= *deadline)?;
        warn!(
            "completion overdue, abandoning send: destination={destination}, timeout_ms={}",
            self.send_timeout.as_millis()
        );
        metrics::inc_errors(ErrorKind::Transport);
        if let Err(e) = transport.unregister_peer(destination) {
            debug!("peer unregister failed: peer={destination}, error={e}");
        }
        self.state = FlowState::Idle;
        self.last_completion = Some(deadline);
        self.report(destination, SendStatus::Failed)
    }

    fn deadline(&self, submitted_at: Instant) -> Option<Instant> { submitted_at.checked_add(self.send_timeout) }

    fn report(&self, destination: PeerAddress, status: SendStatus) -> Option<SendReport> {
        (destination != self.silent).then_some(SendReport {
            destination,
            status,
        })
    }
}
