//! Wire format for link frames.
//!
//! Every frame is a fixed seven-byte header followed by at most
//! [`MAX_FRAGMENT_PAYLOAD`] payload bytes, so one envelope always fits in a
//! single [`LINK_MTU`]-sized datagram.

mod codec;
mod header;
mod kind;

pub use codec::{Envelope, decode, encode, encode_into};
pub use header::EnvelopeHeader;
pub use kind::EnvelopeKind;
use thiserror::Error;

/// Largest datagram the link carries.
pub const LINK_MTU: usize = 250;

/// Bytes occupied by the fixed envelope header.
pub const HEADER_LEN: usize = 7;

/// Largest payload carried by a single envelope.
pub const MAX_FRAGMENT_PAYLOAD: usize = 235;

/// Largest encoded envelope.
pub const MAX_FRAME_LEN: usize = HEADER_LEN + MAX_FRAGMENT_PAYLOAD;

const _: () = assert!(MAX_FRAME_LEN <= LINK_MTU, "envelopes must fit the link MTU");

/// Errors produced while decoding a received frame.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// The frame is shorter than the fixed header.
    #[error("frame of {len} bytes is shorter than the {HEADER_LEN}-byte header")]
    Truncated { len: usize },
    /// The kind byte is not a known envelope kind.
    #[error("unknown envelope kind {0:#04x}")]
    UnknownKind(u8),
    /// The fragment index lies outside `1..=fragment_count`.
    #[error("fragment index {index} outside 1..={count}")]
    InvalidIndex { index: u8, count: u8 },
    /// The payload exceeds the per-envelope limit.
    #[error("payload of {len} bytes exceeds the {limit}-byte envelope limit")]
    PayloadTooLarge { len: usize, limit: usize },
}

/// Errors produced while encoding an outbound frame.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum EncodeError {
    /// The payload exceeds the per-envelope limit.
    #[error("payload of {len} bytes exceeds the {limit}-byte envelope limit")]
    PayloadTooLarge { len: usize, limit: usize },
    /// The fragment index lies outside `1..=fragment_count`.
    #[error("fragment index {index} outside 1..={count}")]
    InvalidIndex { index: u8, count: u8 },
}
