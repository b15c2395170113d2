//! Encoding and decoding of raw link frames.
//!
//! The frame layout is fixed:
//! `[kind: u8][fragment index: u8][fragment count: u8][message id: u32 BE][payload]`.
//! There are no optional fields, so the layout stays stable for every peer
//! sharing the link.

use super::{
    DecodeError,
    EncodeError,
    EnvelopeHeader,
    EnvelopeKind,
    HEADER_LEN,
    MAX_FRAGMENT_PAYLOAD,
    MAX_FRAME_LEN,
};
use crate::{
    byte_order::{read_network_u32_at, write_network_u32},
    fragment::{FragmentIndex, MessageId},
};

const KIND_OFFSET: usize = 0;
const INDEX_OFFSET: usize = 1;
const COUNT_OFFSET: usize = 2;
const ID_OFFSET: usize = 3;

/// A decoded envelope borrowing its payload from the received frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Envelope<'a> {
    header: EnvelopeHeader,
    payload: &'a [u8],
}

impl<'a> Envelope<'a> {
    /// Pair a header with a payload.
    #[must_use]
    pub const fn new(header: EnvelopeHeader, payload: &'a [u8]) -> Self { Self { header, payload } }

    /// Return the envelope header.
    #[must_use]
    pub const fn header(&self) -> &EnvelopeHeader { &self.header }

    /// Return the envelope kind.
    #[must_use]
    pub const fn kind(&self) -> EnvelopeKind { self.header.kind() }

    /// Borrow the payload bytes.
    #[must_use]
    pub const fn payload(&self) -> &'a [u8] { self.payload }
}

/// Encode a frame into `buf`, returning the number of bytes written.
///
/// # Errors
///
/// Returns [`EncodeError::PayloadTooLarge`] when `payload` exceeds
/// [`MAX_FRAGMENT_PAYLOAD`] and [`EncodeError::InvalidIndex`] when the header
/// index lies outside `1..=fragment_count`.
pub fn encode_into(
    header: &EnvelopeHeader,
    payload: &[u8],
    buf: &mut [u8; MAX_FRAME_LEN],
) -> Result<usize, EncodeError> {
    if payload.len() > MAX_FRAGMENT_PAYLOAD {
        return Err(EncodeError::PayloadTooLarge {
            len: payload.len(),
            limit: MAX_FRAGMENT_PAYLOAD,
        });
    }
    if !header.is_well_formed() {
        return Err(EncodeError::InvalidIndex {
            index: header.fragment_index().get(),
            count: header.fragment_count(),
        });
    }

    buf[KIND_OFFSET] = header.kind().as_u8();
    buf[INDEX_OFFSET] = header.fragment_index().get();
    buf[COUNT_OFFSET] = header.fragment_count();
    buf[ID_OFFSET..HEADER_LEN].copy_from_slice(&write_network_u32(header.message_id().get()));
    let end = HEADER_LEN + payload.len();
    buf[HEADER_LEN..end].copy_from_slice(payload);
    Ok(end)
}

/// Encode a frame into a newly allocated buffer.
///
/// # Errors
///
/// See [`encode_into`].
///
/// # Examples
///
/// ```
/// use pairwire::{EnvelopeHeader, EnvelopeKind, MessageId, decode, encode};
///
/// let header = EnvelopeHeader::single(EnvelopeKind::Data, MessageId::new(5));
/// let frame = encode(&header, b"hi").expect("encode");
/// let envelope = decode(&frame).expect("decode");
/// assert_eq!(envelope.header(), &header);
/// assert_eq!(envelope.payload(), b"hi");
/// ```
pub fn encode(header: &EnvelopeHeader, payload: &[u8]) -> Result<Vec<u8>, EncodeError> {
    let mut buf = [0_u8; MAX_FRAME_LEN];
    let len = encode_into(header, payload, &mut buf)?;
    Ok(buf[..len].to_vec())
}

/// Decode a raw link frame.
///
/// # Errors
///
/// Returns [`DecodeError::Truncated`] when `frame` is shorter than
/// [`HEADER_LEN`], [`DecodeError::UnknownKind`] for an unrecognised kind
/// byte, [`DecodeError::InvalidIndex`] when the index lies outside
/// `1..=fragment_count`, and [`DecodeError::PayloadTooLarge`] when the body
/// exceeds [`MAX_FRAGMENT_PAYLOAD`].
pub fn decode(frame: &[u8]) -> Result<Envelope<'_>, DecodeError> {
    let Some(message_id) = read_network_u32_at(frame, ID_OFFSET) else {
        return Err(DecodeError::Truncated { len: frame.len() });
    };
    let kind = EnvelopeKind::try_from(frame[KIND_OFFSET])?;
    let header = EnvelopeHeader::new(
        kind,
        FragmentIndex::new(frame[INDEX_OFFSET]),
        frame[COUNT_OFFSET],
        MessageId::new(message_id),
    );
    if !header.is_well_formed() {
        return Err(DecodeError::InvalidIndex {
            index: header.fragment_index().get(),
            count: header.fragment_count(),
        });
    }

    let payload = &frame[HEADER_LEN..];
    if payload.len() > MAX_FRAGMENT_PAYLOAD {
        return Err(DecodeError::PayloadTooLarge {
            len: payload.len(),
            limit: MAX_FRAGMENT_PAYLOAD,
        });
    }
    Ok(Envelope::new(header, payload))
}
