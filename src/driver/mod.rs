//! Async driver owning a [`Connection`] on a tokio runtime.
//!
//! [`LinkDriver`] is the only task touching connection state. Transport
//! callbacks reach it through the bounded [`EventSink`] channel, and
//! application requests arrive over the [`DriverHandle`] command channel.
//! A biased `tokio::select!` loop gives shutdown priority, then link
//! events, then commands, then the periodic timers.

mod handle;
mod timer;

pub use handle::{DriverError, DriverHandle, LinkStatus};
use handle::Command;
pub use timer::PeriodicTimer;
use tokio::{
    sync::mpsc,
    time::{Duration, Instant},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    connection::{Connection, ReceivedMessage},
    flow::FlowState,
    pairing::{BLINK_INTERVAL, PAIRING_RETRY_INTERVAL},
    transport::{EventSink, LinkEvent, Transport},
};

/// Period of the send poll when no minimum spacing is configured.
pub const DEFAULT_SEND_POLL_INTERVAL: Duration = Duration::from_millis(10);

const COMMAND_QUEUE_CAPACITY: usize = 32;

enum Event {
    Shutdown,
    Link(LinkEvent),
    Command(Command),
    CommandsClosed,
    SendPoll,
    PairingRetry,
    Blink,
    Purge,
}

/// Task driving one [`Connection`].
pub struct LinkDriver<T: Transport> {
    connection: Connection<T>,
    events: mpsc::Receiver<LinkEvent>,
    commands: mpsc::Receiver<Command>,
    shutdown: CancellationToken,
    inbox: Option<mpsc::Sender<ReceivedMessage>>,
    send_poll: PeriodicTimer,
    pairing_retry: PeriodicTimer,
    blink: PeriodicTimer,
    purge: PeriodicTimer,
}

impl<T: Transport> std::fmt::Debug for LinkDriver<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkDriver")
            .field("connection", &self.connection)
            .field("inbox", &self.inbox.is_some())
            .finish_non_exhaustive()
    }
}

impl<T: Transport> LinkDriver<T> {
    /// Start `connection` and wrap it in a driver.
    ///
    /// The connection's transport is pointed at a fresh event channel sized
    /// by [`ConnectionConfig::event_queue_capacity`].
    ///
    /// [`ConnectionConfig::event_queue_capacity`]: crate::config::ConnectionConfig::event_queue_capacity
    #[must_use]
    pub fn new(mut connection: Connection<T>) -> (Self, DriverHandle) {
        let (sink, events) = EventSink::channel(connection.config().event_queue_capacity());
        connection.begin(sink);
        let (command_tx, commands) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let shutdown = CancellationToken::new();
        let send_poll = PeriodicTimer::new(
            connection
                .config()
                .min_send_spacing()
                .unwrap_or(DEFAULT_SEND_POLL_INTERVAL),
        );
        let purge = PeriodicTimer::new(connection.config().fragmentation().reassembly_timeout);
        let driver = Self {
            connection,
            events,
            commands,
            shutdown: shutdown.clone(),
            inbox: None,
            send_poll,
            pairing_retry: PeriodicTimer::new(PAIRING_RETRY_INTERVAL),
            blink: PeriodicTimer::new(BLINK_INTERVAL),
            purge,
        };
        (driver, DriverHandle::new(command_tx, shutdown))
    }

    /// Forward completed messages to `inbox`.
    #[must_use]
    pub fn with_inbox(mut self, inbox: mpsc::Sender<ReceivedMessage>) -> Self {
        self.inbox = Some(inbox);
        self
    }

    /// Override how often queued fragments are retried while the flow
    /// controller waits.
    #[must_use]
    pub fn with_send_poll_interval(mut self, period: Duration) -> Self {
        self.send_poll = PeriodicTimer::new(period);
        self
    }

    /// Borrow the driven connection.
    #[must_use]
    pub const fn connection(&self) -> &Connection<T> { &self.connection }

    /// Get a clone of the shutdown token.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken { self.shutdown.clone() }

    /// Run until shutdown is requested or every handle is dropped.
    ///
    /// The connection is ended and handed back so callers can inspect it.
    pub async fn run(mut self) -> Connection<T> {
        info!(
            role = %self.connection.role(),
            address = %self.connection.local_address(),
            "link driver started"
        );
        self.sync_timers();
        loop {
            match self.next_event().await {
                Event::Shutdown | Event::CommandsClosed => break,
                Event::Link(event) => {
                    let received = self.connection.handle_event_at(event, now());
                    if let Some(message) = received {
                        self.forward(message).await;
                    }
                }
                Event::Command(command) => self.apply(command),
                Event::SendPoll => {}
                Event::PairingRetry => self.connection.pairing_retry_tick(),
                Event::Blink => self.connection.indicator_tick(),
                Event::Purge => {
                    let evicted = self.connection.purge_expired_at(now());
                    if evicted > 0 {
                        debug!(evicted, "purge pass finished");
                    }
                }
            }
            self.connection.tick_at(now());
            self.sync_timers();
        }
        self.connection.end();
        info!(role = %self.connection.role(), "link driver stopped");
        self.connection
    }

    #[expect(
        clippy::integer_division_remainder_used,
        reason = "tokio::select! expands to modulus operations internally"
    )]
    async fn next_event(&mut self) -> Event {
        let send_poll_live = self.send_poll.is_attached();
        let pairing_live = self.pairing_retry.is_attached();
        let blink_live = self.blink.is_attached();
        tokio::select! {
            biased;

            () = self.shutdown.cancelled() => Event::Shutdown,
            Some(event) = self.events.recv() => Event::Link(event),
            command = self.commands.recv() => match command {
                Some(command) => Event::Command(command),
                None => Event::CommandsClosed,
            },
            _ = self.pairing_retry.tick(), if pairing_live => Event::PairingRetry,
            _ = self.blink.tick(), if blink_live => Event::Blink,
            _ = self.send_poll.tick(), if send_poll_live => Event::SendPoll,
            _ = self.purge.tick() => Event::Purge,
        }
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::Send {
                payload,
                destination,
                reply,
            } => {
                let _ = reply.send(self.connection.send_message(&payload, destination));
            }
            Command::AnnounceConnect { destination, reply } => {
                let _ = reply.send(self.connection.announce_connect(destination));
            }
            Command::StartPairing { timeout_secs, reply } => {
                let result = match timeout_secs {
                    Some(secs) => self.connection.start_pairing(secs),
                    None => self.connection.start_pairing_with_default_timeout(),
                };
                if result.is_ok() {
                    // First retry lands one full interval after the session opens.
                    self.pairing_retry.detach();
                    self.blink.detach();
                }
                let _ = reply.send(result);
            }
            Command::EndPairing { reply } => {
                let _ = reply.send(self.connection.end_pairing());
            }
            Command::SetCounterpart { address, reply } => {
                let _ = reply.send(self.connection.set_counterpart(address));
            }
            Command::Status { reply } => {
                let _ = reply.send(self.status());
            }
        }
    }

    fn status(&self) -> LinkStatus {
        LinkStatus {
            role: self.connection.role(),
            local_address: self.connection.local_address(),
            counterpart: self.connection.counterpart(),
            pairing: self.connection.pairing_state(),
            flow: self.connection.flow_state(),
            queued_fragments: self.connection.outbound().len(),
        }
    }

    async fn forward(&mut self, message: ReceivedMessage) {
        let Some(inbox) = &self.inbox else {
            return;
        };
        if inbox.send(message).await.is_err() {
            warn!(role = %self.connection.role(), "inbox receiver dropped; messages now reach hooks only");
            self.inbox = None;
        }
    }

    fn sync_timers(&mut self) {
        let pairing = self.connection.is_pairing();
        self.pairing_retry.set_attached(pairing);
        self.blink.set_attached(pairing);
        let awaiting = matches!(self.connection.flow_state(), FlowState::InFlight { .. });
        self.send_poll
            .set_attached(awaiting || !self.connection.outbound().is_empty());
        self.purge.attach();
    }
}

fn now() -> std::time::Instant { Instant::now().into_std() }
