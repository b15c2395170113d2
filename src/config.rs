//! Connection configuration.
//!
//! [`ConnectionConfig`] is assembled through [`ConnectionConfigBuilder`],
//! which validates pool and payload limits before a connection is created.

use std::{fmt, num::NonZeroUsize, time::Duration};

use thiserror::Error;

use crate::{
    address::PeerAddress,
    envelope::MAX_FRAGMENT_PAYLOAD,
    flow::DEFAULT_SEND_TIMEOUT,
    fragment::{DEFAULT_POOL_SLOTS, DEFAULT_REASSEMBLY_TIMEOUT, FragmentationConfig},
};

/// Default pairing timeout for clients, in seconds.
pub const DEFAULT_CLIENT_PAIRING_TIMEOUT_SECS: u32 = 30;

/// Default capacity of the inbound link event queue.
pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 64;

/// Side of the pairing handshake a station plays.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// Broadcasts PAIR envelopes to the rendezvous address.
    Server,
    /// Listens on the rendezvous address and replies to the server.
    Client,
}

impl Role {
    /// Lower-case name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Server => "server",
            Self::Client => "client",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Output used to blink pairing progress.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndicatorConfig {
    /// Output pin handed to the [`IndicatorWriter`](crate::IndicatorWriter).
    pub pin: u8,
    /// Whether driving the pin high lights the indicator.
    pub active_high: bool,
}

impl IndicatorConfig {
    /// Level that leaves the indicator dark.
    #[must_use]
    pub const fn idle_level(self) -> bool { !self.active_high }

    /// Level that lights the indicator.
    #[must_use]
    pub const fn lit_level(self) -> bool { self.active_high }
}

/// Errors raised while validating a [`ConnectionConfig`].
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A fragment pool was configured with no slots.
    #[error("{pool} pool needs at least one slot")]
    ZeroPoolCapacity { pool: &'static str },
    /// The fragment payload cap is zero or larger than an envelope carries.
    #[error("fragment payload cap {cap} must be between 1 and {max}")]
    PayloadCapOutOfRange { cap: usize, max: usize },
    /// Servers address every send explicitly and keep no counterpart.
    #[error("a server does not take a fixed counterpart address")]
    CounterpartOnServer,
    /// The inbound event queue needs room for at least one event.
    #[error("event queue capacity must be at least one")]
    ZeroEventQueue,
    /// A send must be allowed some time to complete.
    #[error("send timeout must be non-zero")]
    ZeroSendTimeout,
}

/// Validated settings for a [`Connection`](crate::Connection).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionConfig {
    role: Role,
    rendezvous: PeerAddress,
    pairing_partner: Option<PeerAddress>,
    counterpart: Option<PeerAddress>,
    indicator: Option<IndicatorConfig>,
    pairing_timeout_secs: u32,
    fragmentation: FragmentationConfig,
    min_send_spacing: Option<Duration>,
    send_timeout: Duration,
    event_queue_capacity: usize,
}

impl ConnectionConfig {
    /// Start building a configuration for `role`.
    #[must_use]
    pub fn builder(role: Role) -> ConnectionConfigBuilder { ConnectionConfigBuilder::new(role) }

    /// Role of the station.
    #[must_use]
    pub const fn role(&self) -> Role { self.role }

    /// Address clients assume while listening for a server.
    #[must_use]
    pub const fn rendezvous(&self) -> PeerAddress { self.rendezvous }

    /// Fixed pairing partner, if configured.
    #[must_use]
    pub const fn pairing_partner(&self) -> Option<PeerAddress> { self.pairing_partner }

    /// Address pairing traffic is sent to: the partner when set, otherwise
    /// the rendezvous address.
    #[must_use]
    pub const fn pairing_target(&self) -> PeerAddress {
        match self.pairing_partner {
            Some(partner) => partner,
            None => self.rendezvous,
        }
    }

    /// Counterpart a client sends to before any pairing.
    #[must_use]
    pub const fn counterpart(&self) -> Option<PeerAddress> { self.counterpart }

    /// Pairing indicator output.
    #[must_use]
    pub const fn indicator(&self) -> Option<IndicatorConfig> { self.indicator }

    /// Pairing timeout used when none is given explicitly.
    #[must_use]
    pub const fn pairing_timeout_secs(&self) -> u32 { self.pairing_timeout_secs }

    /// Fragment pool and size settings.
    #[must_use]
    pub const fn fragmentation(&self) -> &FragmentationConfig { &self.fragmentation }

    /// Minimum gap between a completion and the next submit.
    #[must_use]
    pub const fn min_send_spacing(&self) -> Option<Duration> { self.min_send_spacing }

    /// Capacity of the inbound link event queue.
    #[must_use]
    pub const fn event_queue_capacity(&self) -> usize { self.event_queue_capacity }

    /// Time a send may wait for its completion before it counts as failed.
    #[must_use]
    pub const fn send_timeout(&self) -> Duration { self.send_timeout }
}

/// Builder for [`ConnectionConfig`].
///
/// # Examples
///
/// ```
/// use pairwire::{ConnectionConfig, IndicatorConfig, Role};
///
/// let config = ConnectionConfig::builder(Role::Server)
///     .indicator(IndicatorConfig { pin: 2, active_high: false })
///     .pool_slots(16)
///     .build()
///     .expect("valid configuration");
/// assert_eq!(config.fragmentation().outbound_slots.get(), 16);
/// ```
#[derive(Clone, Debug)]
pub struct ConnectionConfigBuilder {
    role: Role,
    rendezvous: PeerAddress,
    pairing_partner: Option<PeerAddress>,
    counterpart: Option<PeerAddress>,
    indicator: Option<IndicatorConfig>,
    pairing_timeout_secs: u32,
    fragment_payload_cap: usize,
    outbound_slots: usize,
    inbound_slots: usize,
    reassembly_timeout: Duration,
    min_send_spacing: Option<Duration>,
    send_timeout: Duration,
    event_queue_capacity: usize,
}

impl ConnectionConfigBuilder {
    fn new(role: Role) -> Self {
        let pairing_timeout_secs = match role {
            Role::Server => 0,
            Role::Client => DEFAULT_CLIENT_PAIRING_TIMEOUT_SECS,
        };
        Self {
            role,
            rendezvous: PeerAddress::DEFAULT_RENDEZVOUS,
            pairing_partner: None,
            counterpart: None,
            indicator: None,
            pairing_timeout_secs,
            fragment_payload_cap: MAX_FRAGMENT_PAYLOAD,
            outbound_slots: DEFAULT_POOL_SLOTS,
            inbound_slots: DEFAULT_POOL_SLOTS,
            reassembly_timeout: DEFAULT_REASSEMBLY_TIMEOUT,
            min_send_spacing: None,
            send_timeout: DEFAULT_SEND_TIMEOUT,
            event_queue_capacity: DEFAULT_EVENT_QUEUE_CAPACITY,
        }
    }

    /// Override the rendezvous address.
    #[must_use]
    pub fn rendezvous(mut self, address: PeerAddress) -> Self {
        self.rendezvous = address;
        self
    }

    /// Pair only with `address`.
    ///
    /// A server sends its PAIR envelopes straight to the partner; a client
    /// ignores PAIR envelopes from anyone else.
    #[must_use]
    pub fn pairing_partner(mut self, address: Option<PeerAddress>) -> Self {
        self.pairing_partner = address;
        self
    }

    /// Preset the address a client sends to.
    #[must_use]
    pub fn counterpart(mut self, address: Option<PeerAddress>) -> Self {
        self.counterpart = address;
        self
    }

    /// Blink `indicator` while pairing.
    #[must_use]
    pub fn indicator(mut self, indicator: IndicatorConfig) -> Self {
        self.indicator = Some(indicator);
        self
    }

    /// Default pairing timeout in seconds; zero lets a server retry forever.
    #[must_use]
    pub fn pairing_timeout_secs(mut self, seconds: u32) -> Self {
        self.pairing_timeout_secs = seconds;
        self
    }

    /// Cap the payload bytes carried per fragment.
    #[must_use]
    pub fn fragment_payload_cap(mut self, cap: usize) -> Self {
        self.fragment_payload_cap = cap;
        self
    }

    /// Size both fragment pools.
    #[must_use]
    pub fn pool_slots(mut self, slots: usize) -> Self {
        self.outbound_slots = slots;
        self.inbound_slots = slots;
        self
    }

    /// Size the outbound fragment pool.
    #[must_use]
    pub fn outbound_slots(mut self, slots: usize) -> Self {
        self.outbound_slots = slots;
        self
    }

    /// Size the inbound fragment pool.
    #[must_use]
    pub fn inbound_slots(mut self, slots: usize) -> Self {
        self.inbound_slots = slots;
        self
    }

    /// Evict incomplete inbound messages after `timeout`.
    #[must_use]
    pub fn reassembly_timeout(mut self, timeout: Duration) -> Self {
        self.reassembly_timeout = timeout;
        self
    }

    /// Wait at least `spacing` after each completion before sending again.
    #[must_use]
    pub fn min_send_spacing(mut self, spacing: Option<Duration>) -> Self {
        self.min_send_spacing = spacing;
        self
    }

    /// Abandon a send whose completion has not arrived after `timeout`.
    #[must_use]
    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Size the inbound link event queue.
    #[must_use]
    pub fn event_queue_capacity(mut self, capacity: usize) -> Self {
        self.event_queue_capacity = capacity;
        self
    }

    /// Validate and build the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroPoolCapacity`] for an empty pool,
    /// [`ConfigError::PayloadCapOutOfRange`] for a cap outside
    /// `1..=MAX_FRAGMENT_PAYLOAD`, [`ConfigError::CounterpartOnServer`] when
    /// a server is given a counterpart, [`ConfigError::ZeroEventQueue`]
    /// for an empty event queue and [`ConfigError::ZeroSendTimeout`] for a
    /// zero send timeout.
    pub fn build(self) -> Result<ConnectionConfig, ConfigError> {
        let fragment_payload_cap = NonZeroUsize::new(self.fragment_payload_cap)
            .filter(|cap| cap.get() <= MAX_FRAGMENT_PAYLOAD)
            .ok_or(ConfigError::PayloadCapOutOfRange {
                cap: self.fragment_payload_cap,
                max: MAX_FRAGMENT_PAYLOAD,
            })?;
        let outbound_slots = NonZeroUsize::new(self.outbound_slots)
            .ok_or(ConfigError::ZeroPoolCapacity { pool: "outbound" })?;
        let inbound_slots = NonZeroUsize::new(self.inbound_slots)
            .ok_or(ConfigError::ZeroPoolCapacity { pool: "inbound" })?;
        if self.role == Role::Server && self.counterpart.is_some() {
            return Err(ConfigError::CounterpartOnServer);
        }
        if self.event_queue_capacity == 0 {
            return Err(ConfigError::ZeroEventQueue);
        }
        if self.send_timeout.is_zero() {
            return Err(ConfigError::ZeroSendTimeout);
        }

        Ok(ConnectionConfig {
            role: self.role,
            rendezvous: self.rendezvous,
            pairing_partner: self.pairing_partner,
            counterpart: self.counterpart,
            indicator: self.indicator,
            pairing_timeout_secs: self.pairing_timeout_secs,
            fragmentation: FragmentationConfig {
                fragment_payload_cap,
                outbound_slots,
                inbound_slots,
                reassembly_timeout: self.reassembly_timeout,
            },
            min_send_spacing: self.min_send_spacing,
            send_timeout: self.send_timeout,
            event_queue_capacity: self.event_queue_capacity,
        })
    }
}
