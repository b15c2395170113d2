#![doc(html_root_url = "https://docs.rs/pairwire/latest")]
//! Public API for the `pairwire` library.
//!
//! This crate provides point-to-point messaging over small-MTU, unreliable
//! datagram links: fragmentation and reassembly within fixed slot pools, a
//! single-in-flight send controller, and a rendezvous pairing handshake.

pub mod address;
pub mod byte_order;
pub mod config;
pub mod connection;
pub mod driver;
pub mod envelope;
pub mod error;
pub mod flow;
pub mod fragment;
pub mod hooks;
pub mod message;
pub mod metrics;
pub mod pairing;
pub mod transport;

pub use address::{AddressParseError, PeerAddress};
pub use config::{ConfigError, ConnectionConfig, ConnectionConfigBuilder, IndicatorConfig, Role};
pub use connection::{Connection, ReceivedMessage, SendError, ValidationError};
pub use driver::{DriverError, DriverHandle, LinkDriver, LinkStatus, PeriodicTimer};
pub use envelope::{
    DecodeError,
    EncodeError,
    Envelope,
    EnvelopeHeader,
    EnvelopeKind,
    HEADER_LEN,
    LINK_MTU,
    MAX_FRAGMENT_PAYLOAD,
    MAX_FRAME_LEN,
    decode,
    encode,
    encode_into,
};
/// Result type alias re-exported for convenience.
pub use error::{Error, Result};
pub use flow::{DrivePass, FlowState, SendFlowController, SendReport};
pub use fragment::{
    FragmentIndex,
    FragmentSlot,
    FragmentStatus,
    FragmentationConfig,
    MessageId,
    MessageIdSource,
    OutboundBuffer,
    OutboundError,
    PoolExhausted,
    ReassemblyBuffer,
    ReassemblyError,
    SlotId,
};
pub use hooks::ConnectionHooks;
pub use pairing::{
    PAIRING_RETRY_INTERVAL,
    PairOutcome,
    PairingError,
    PairingMachine,
    PairingSession,
    PairingState,
    RetryOutcome,
};
pub use transport::{
    EventSink,
    IndicatorWriter,
    LinkEvent,
    SendStatus,
    Transport,
    TransportError,
    loopback::{LoopbackAir, LoopbackTransport},
};
