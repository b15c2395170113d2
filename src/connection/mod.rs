//! Connection facade tying codec, pools, flow control and pairing together.
//!
//! [`Connection`] is the single owner of every piece of mutable link state.
//! It is driven from outside: the application calls [`Connection::tick`] to
//! push queued fragments, [`Connection::pairing_retry_tick`] and
//! [`Connection::indicator_tick`] on their timers, and feeds link events
//! through [`Connection::handle_event`]. The
//! [`LinkDriver`](crate::driver::LinkDriver) does all of this on a tokio
//! runtime.

mod dispatch;
mod send;

use std::time::Instant;

use log::{debug, info, warn};
pub use send::{ReceivedMessage, SendError, ValidationError};

use crate::{
    address::PeerAddress,
    config::{ConnectionConfig, Role},
    envelope::EnvelopeKind,
    flow::{FlowState, SendFlowController, SendReport},
    fragment::{OutboundBuffer, ReassemblyBuffer},
    hooks::ConnectionHooks,
    metrics::{self, ErrorKind},
    pairing::{PairingError, PairingMachine, PairingState, RetryOutcome},
    transport::{EventSink, IndicatorWriter, LinkEvent, SendStatus, Transport},
};

/// Point-to-point messaging endpoint over one [`Transport`].
pub struct Connection<T: Transport> {
    config: ConnectionConfig,
    transport: T,
    hooks: ConnectionHooks,
    indicator: Option<Box<dyn IndicatorWriter>>,
    outbound: OutboundBuffer,
    inbound: ReassemblyBuffer,
    flow: SendFlowController,
    pairing: PairingMachine,
    counterpart: Option<PeerAddress>,
    started: bool,
}

impl<T: Transport> std::fmt::Debug for Connection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("role", &self.config.role())
            .field("local_address", &self.transport.local_address())
            .field("counterpart", &self.counterpart)
            .field("flow", &self.flow.state())
            .field("pairing", &self.pairing.state())
            .field("started", &self.started)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> Connection<T> {
    /// Create a connection over `transport`.
    #[must_use]
    pub fn new(config: ConnectionConfig, transport: T) -> Self {
        let fragmentation = config.fragmentation();
        let flow = SendFlowController::new(config.rendezvous())
            .with_min_spacing(config.min_send_spacing())
            .with_send_timeout(config.send_timeout());
        let pairing = PairingMachine::new(
            config.role(),
            config.rendezvous(),
            config.pairing_partner(),
            config.indicator(),
        );
        Self {
            outbound: OutboundBuffer::new(fragmentation),
            inbound: ReassemblyBuffer::new(fragmentation),
            counterpart: config.counterpart(),
            flow,
            pairing,
            config,
            transport,
            hooks: ConnectionHooks::default(),
            indicator: None,
            started: false,
        }
    }

    /// Install application callbacks.
    #[must_use]
    pub fn with_hooks(mut self, hooks: ConnectionHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Install the writer driving the pairing indicator.
    #[must_use]
    pub fn with_indicator<W>(mut self, writer: W) -> Self
    where
        W: IndicatorWriter + 'static,
    {
        self.indicator = Some(Box::new(writer));
        self
    }

    /// Route link events into `sink` and mark the connection started.
    pub fn begin(&mut self, sink: EventSink) {
        self.transport.set_event_sink(sink);
        self.started = true;
        self.write_indicator(self.pairing_idle_level());
        info!(
            "connection initialised: role={}, address={}",
            self.config.role(),
            self.transport.local_address()
        );
    }

    /// Stop pairing and drop every queued or partial message.
    pub fn end(&mut self) {
        if self.pairing.has_session() {
            self.finish_pairing();
        }
        self.outbound.clear();
        self.inbound.clear();
        self.flow.reset();
        self.started = false;
        info!("connection ended: role={}", self.config.role());
    }

    /// Whether [`Connection::begin`] ran without a later [`Connection::end`].
    #[must_use]
    pub const fn is_started(&self) -> bool { self.started }

    /// Validated configuration.
    #[must_use]
    pub const fn config(&self) -> &ConnectionConfig { &self.config }

    /// Role of this station.
    #[must_use]
    pub const fn role(&self) -> Role { self.config.role() }

    /// Current link-layer address.
    #[must_use]
    pub fn local_address(&self) -> PeerAddress { self.transport.local_address() }

    /// Address a client sends to by default.
    #[must_use]
    pub const fn counterpart(&self) -> Option<PeerAddress> { self.counterpart }

    /// Pairing phase.
    #[must_use]
    pub const fn pairing_state(&self) -> PairingState { self.pairing.state() }

    /// Flow controller state.
    #[must_use]
    pub const fn flow_state(&self) -> FlowState { self.flow.state() }

    /// Outbound fragment pool.
    #[must_use]
    pub const fn outbound(&self) -> &OutboundBuffer { &self.outbound }

    /// Inbound reassembly pool.
    #[must_use]
    pub const fn inbound(&self) -> &ReassemblyBuffer { &self.inbound }

    /// Borrow the transport.
    #[must_use]
    pub const fn transport(&self) -> &T { &self.transport }

    /// Mutably borrow the transport.
    pub fn transport_mut(&mut self) -> &mut T { &mut self.transport }

    /// Mutably borrow the application callbacks.
    pub fn hooks_mut(&mut self) -> &mut ConnectionHooks { &mut self.hooks }

    /// Set the address a client sends to.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::WrongRole`] on a server.
    pub fn set_counterpart(&mut self, address: PeerAddress) -> Result<(), ValidationError> {
        if self.config.role() == Role::Server {
            return Err(ValidationError::WrongRole {
                role: Role::Server,
            });
        }
        info!("counterpart set: address={address}");
        self.counterpart = Some(address);
        Ok(())
    }

    /// Set the counterpart from its twelve-character hexadecimal form.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidAddress`] for malformed text and
    /// [`ValidationError::WrongRole`] on a server.
    pub fn set_counterpart_str(&mut self, address: &str) -> Result<(), ValidationError> {
        let address = address.parse::<PeerAddress>()?;
        self.set_counterpart(address)
    }

    /// Open a pairing session lasting `timeout_secs`.
    ///
    /// A client switches to the rendezvous address until a server is found
    /// or the window closes.
    ///
    /// # Errors
    ///
    /// Returns [`PairingError::AlreadyPairing`] while a session runs and
    /// [`PairingError::Transport`] when the address switch is refused.
    pub fn start_pairing(&mut self, timeout_secs: u32) -> Result<(), PairingError> {
        let own = self.transport.local_address();
        self.pairing.start(timeout_secs, own)?;
        if self.config.role() == Role::Client {
            let rendezvous = self.pairing.rendezvous();
            if let Err(e) = self.transport.set_local_address(rendezvous) {
                warn!("cannot assume rendezvous address: address={rendezvous}, error={e}");
                if let Err(rollback) = self.pairing.finish() {
                    debug!("pairing rollback skipped: error={rollback}");
                }
                return Err(e.into());
            }
            debug!("listening on rendezvous address: address={rendezvous}");
        }
        Ok(())
    }

    /// Open a pairing session using the configured default timeout.
    ///
    /// # Errors
    ///
    /// See [`Connection::start_pairing`].
    pub fn start_pairing_with_default_timeout(&mut self) -> Result<(), PairingError> {
        self.start_pairing(self.config.pairing_timeout_secs())
    }

    /// Close the running pairing session.
    ///
    /// Restores a client's address, returns the indicator to idle and runs
    /// the pairing finished hook.
    ///
    /// # Errors
    ///
    /// Returns [`PairingError::NotStarted`] when no session exists.
    pub fn end_pairing(&mut self) -> Result<(), PairingError> {
        if !self.pairing.has_session() {
            return Err(PairingError::NotStarted);
        }
        self.finish_pairing();
        Ok(())
    }

    /// Whether a pairing session is running.
    #[must_use]
    pub const fn is_pairing(&self) -> bool { self.pairing.is_active() }

    /// Advance pairing by one retry interval.
    pub fn pairing_retry_tick(&mut self) {
        match self.pairing.retry_tick() {
            RetryOutcome::Broadcast { destination, last } => {
                let own = self.transport.local_address();
                if let Err(e) =
                    self.outbound
                        .enqueue_kind(destination, EnvelopeKind::Pair, own.as_bytes())
                {
                    warn!("cannot queue PAIR broadcast: destination={destination}, error={e}");
                    metrics::inc_errors(ErrorKind::PoolExhausted);
                }
                if last {
                    info!("pairing attempts exhausted");
                    self.finish_pairing();
                }
            }
            RetryOutcome::Expired => self.finish_pairing(),
            RetryOutcome::Listening | RetryOutcome::Inactive => {}
        }
    }

    /// Toggle the pairing indicator while a session runs.
    pub fn indicator_tick(&mut self) {
        if let Some(level) = self.pairing.blink_tick() {
            self.write_indicator(Some(level));
        }
    }

    /// Whether the flow controller would submit a fragment now.
    #[must_use]
    pub fn can_send_now(&self) -> bool { self.flow.can_send_now(Instant::now()) }

    /// Submit the next pending fragment if possible.
    ///
    /// Returns whether fragments remain queued.
    pub fn tick(&mut self) -> bool { self.tick_at(Instant::now()) }

    /// Submit the next pending fragment using an explicit clock reading.
    ///
    /// Returns whether fragments remain queued.
    pub fn tick_at(&mut self, now: Instant) -> bool {
        let pass = self.flow.drive(&mut self.outbound, &mut self.transport, now);
        for report in pass.expired.into_iter().chain(pass.rejected) {
            self.report_send(report);
        }
        pass.more_pending
    }

    /// Apply one link event.
    ///
    /// Returns the message completed by the event, if any.
    pub fn handle_event(&mut self, event: LinkEvent) -> Option<ReceivedMessage> {
        self.handle_event_at(event, Instant::now())
    }

    /// Apply one link event using an explicit clock reading.
    ///
    /// Returns the message completed by the event, if any.
    pub fn handle_event_at(&mut self, event: LinkEvent, now: Instant) -> Option<ReceivedMessage> {
        match event {
            LinkEvent::Received { sender, frame } => self.handle_frame_at(sender, &frame, now),
            LinkEvent::SendComplete {
                destination,
                status,
            } => {
                self.handle_send_complete_at(destination, status, now);
                None
            }
        }
    }

    /// Apply a transport completion for a fragment sent to `destination`.
    pub fn handle_send_complete(&mut self, destination: PeerAddress, status: SendStatus) {
        self.handle_send_complete_at(destination, status, Instant::now());
    }

    /// Apply a transport completion using an explicit clock reading.
    pub fn handle_send_complete_at(
        &mut self,
        destination: PeerAddress,
        status: SendStatus,
        now: Instant,
    ) {
        let awaited = self.flow.is_in_flight();
        let report = self.flow.on_transport_complete(destination, status, now);
        if awaited {
            if let Err(e) = self.transport.unregister_peer(destination) {
                debug!("peer unregister failed: peer={destination}, error={e}");
            }
        }
        if let Some(report) = report {
            self.report_send(report);
        }
    }

    /// Evict partial inbound messages older than the reassembly timeout.
    ///
    /// Returns the number of messages evicted.
    pub fn purge_expired(&mut self) -> usize { self.purge_expired_at(Instant::now()) }

    /// Evict stale partial messages using an explicit clock reading.
    ///
    /// Returns the number of messages evicted.
    pub fn purge_expired_at(&mut self, now: Instant) -> usize {
        let evicted = self.inbound.purge_expired_at(now);
        for (sender, message_id) in &evicted {
            warn!("evicted incomplete message: sender={sender}, message_id={message_id}");
        }
        evicted.len()
    }

    fn report_send(&mut self, report: SendReport) {
        match report.status {
            SendStatus::Delivered => self.hooks.send_done(report.destination),
            SendStatus::Failed => self.hooks.send_error(report.destination),
        }
    }

    fn finish_pairing(&mut self) {
        match self.pairing.finish() {
            Ok(Some(address)) => self.restore_address(address),
            Ok(None) => {}
            Err(e) => {
                debug!("pairing finish skipped: error={e}");
                return;
            }
        }
        let idle = self.pairing.reset_indicator();
        self.write_indicator(idle);
        self.hooks.pairing_finished();
    }

    fn restore_address(&mut self, address: PeerAddress) {
        match self.transport.set_local_address(address) {
            Ok(()) => debug!("local address restored: address={address}"),
            Err(e) => warn!("cannot restore local address: address={address}, error={e}"),
        }
    }

    fn pairing_idle_level(&self) -> Option<(u8, bool)> {
        self.config
            .indicator()
            .map(|indicator| (indicator.pin, indicator.idle_level()))
    }

    fn write_indicator(&mut self, level: Option<(u8, bool)>) {
        if let (Some(writer), Some((pin, high))) = (self.indicator.as_mut(), level) {
            writer.write(pin, high);
        }
    }
}

#[cfg(test)]
mod tests;
