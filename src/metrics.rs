//! Metric helpers for `pairwire`.
//!
//! This module defines metric names and thin helpers wrapping the
//! [`metrics`](https://docs.rs/metrics) crate. With the `metrics` feature
//! disabled every helper compiles to a no-op.

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

/// Name of the counter tracking fragments crossing the link.
pub const FRAGMENTS_TOTAL: &str = "pairwire_fragments_total";
/// Name of the counter tracking messages handed to the application.
pub const MESSAGES_DELIVERED: &str = "pairwire_messages_delivered_total";
/// Name of the counter tracking error occurrences.
pub const ERRORS_TOTAL: &str = "pairwire_errors_total";
/// Name of the gauge set while a pairing session runs.
pub const PAIRING_ACTIVE: &str = "pairwire_pairing_active";

/// Direction of fragment traffic.
#[derive(Clone, Copy, Debug)]
pub enum Direction {
    /// Fragments received from a peer.
    Inbound,
    /// Fragments handed to the transport.
    Outbound,
}

impl Direction {
    #[cfg_attr(not(feature = "metrics"), expect(dead_code, reason = "label unused without metrics"))]
    fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

/// Category attached to [`ERRORS_TOTAL`].
#[derive(Clone, Copy, Debug)]
pub enum ErrorKind {
    /// A frame failed to decode.
    Decode,
    /// Inbound reassembly rejected a fragment or reservation.
    Reassembly,
    /// The transport refused or failed a send.
    Transport,
    /// A pool had too few free slots.
    PoolExhausted,
}

impl ErrorKind {
    #[cfg_attr(not(feature = "metrics"), expect(dead_code, reason = "label unused without metrics"))]
    fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Decode => "decode",
            ErrorKind::Reassembly => "reassembly",
            ErrorKind::Transport => "transport",
            ErrorKind::PoolExhausted => "pool_exhausted",
        }
    }
}

/// Record one fragment for the given direction.
#[cfg(feature = "metrics")]
pub fn inc_fragments(direction: Direction) {
    counter!(FRAGMENTS_TOTAL, "direction" => direction.as_str()).increment(1);
}

/// Record one fragment for the given direction.
#[cfg(not(feature = "metrics"))]
pub fn inc_fragments(_direction: Direction) {}

/// Record a message delivered to the application.
#[cfg(feature = "metrics")]
pub fn inc_delivered() { counter!(MESSAGES_DELIVERED).increment(1); }

/// Record a message delivered to the application.
#[cfg(not(feature = "metrics"))]
pub fn inc_delivered() {}

/// Record an error occurrence.
#[cfg(feature = "metrics")]
pub fn inc_errors(kind: ErrorKind) {
    counter!(ERRORS_TOTAL, "kind" => kind.as_str()).increment(1);
}

/// Record an error occurrence.
#[cfg(not(feature = "metrics"))]
pub fn inc_errors(_kind: ErrorKind) {}

/// Flag whether a pairing session is running.
#[cfg(feature = "metrics")]
pub fn set_pairing_active(active: bool) {
    gauge!(PAIRING_ACTIVE).set(if active { 1.0 } else { 0.0 });
}

/// Flag whether a pairing session is running.
#[cfg(not(feature = "metrics"))]
pub fn set_pairing_active(_active: bool) {}
