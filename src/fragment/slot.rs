//! Fixed-capacity storage for a single fragment.

use super::{FragmentIndex, MessageId, ReassemblyError};
use crate::{
    address::PeerAddress,
    envelope::{EnvelopeHeader, EnvelopeKind, MAX_FRAGMENT_PAYLOAD},
};

/// Position of a slot inside its pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(usize);

impl SlotId {
    pub(crate) const fn new(position: usize) -> Self { Self(position) }

    /// Return the position within the pool.
    #[must_use]
    pub const fn get(self) -> usize { self.0 }
}

/// One fragment held by a pool.
///
/// The payload lives in an inline buffer of [`MAX_FRAGMENT_PAYLOAD`] bytes
/// with an explicit length, so pools never allocate after construction.
/// `peer` is the recipient for outbound slots and the sender for inbound
/// ones.
#[derive(Clone, Debug)]
pub struct FragmentSlot {
    message_id: MessageId,
    peer: PeerAddress,
    kind: EnvelopeKind,
    fragment_index: FragmentIndex,
    fragment_count: u8,
    payload: [u8; MAX_FRAGMENT_PAYLOAD],
    payload_len: usize,
}

impl FragmentSlot {
    /// Create an empty slot tagged with its message coordinates.
    #[must_use]
    pub const fn new(
        peer: PeerAddress,
        kind: EnvelopeKind,
        message_id: MessageId,
        fragment_index: FragmentIndex,
        fragment_count: u8,
    ) -> Self {
        Self {
            message_id,
            peer,
            kind,
            fragment_index,
            fragment_count,
            payload: [0; MAX_FRAGMENT_PAYLOAD],
            payload_len: 0,
        }
    }

    /// Replace the slot payload.
    ///
    /// # Errors
    ///
    /// Returns [`ReassemblyError::FragmentTooLarge`] when `bytes` exceeds the
    /// slot capacity; the slot is left unchanged.
    pub fn write_payload(&mut self, bytes: &[u8]) -> Result<(), ReassemblyError> {
        let Some(target) = self.payload.get_mut(..bytes.len()) else {
            return Err(ReassemblyError::FragmentTooLarge {
                len: bytes.len(),
                limit: MAX_FRAGMENT_PAYLOAD,
            });
        };
        target.copy_from_slice(bytes);
        self.payload_len = bytes.len();
        Ok(())
    }

    /// Borrow the stored payload bytes.
    #[must_use]
    pub fn payload(&self) -> &[u8] { &self.payload[..self.payload_len] }

    /// Message this fragment belongs to.
    #[must_use]
    pub const fn message_id(&self) -> MessageId { self.message_id }

    /// Recipient (outbound) or sender (inbound) of the fragment.
    #[must_use]
    pub const fn peer(&self) -> PeerAddress { self.peer }

    /// Envelope kind the fragment travels as.
    #[must_use]
    pub const fn kind(&self) -> EnvelopeKind { self.kind }

    /// One-based position of the fragment.
    #[must_use]
    pub const fn fragment_index(&self) -> FragmentIndex { self.fragment_index }

    /// Total fragments in the message.
    #[must_use]
    pub const fn fragment_count(&self) -> u8 { self.fragment_count }

    /// Envelope header describing this fragment.
    #[must_use]
    pub const fn header(&self) -> EnvelopeHeader {
        EnvelopeHeader::new(
            self.kind,
            self.fragment_index,
            self.fragment_count,
            self.message_id,
        )
    }

    pub(crate) fn belongs_to(&self, peer: PeerAddress, message_id: MessageId) -> bool {
        self.peer == peer && self.message_id == message_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot() -> FragmentSlot {
        FragmentSlot::new(
            PeerAddress::new([1, 2, 3, 4, 5, 6]),
            EnvelopeKind::Data,
            MessageId::new(3),
            FragmentIndex::first(),
            2,
        )
    }

    #[test]
    fn stores_payload_up_to_capacity() {
        let mut slot = slot();
        slot.write_payload(&[4_u8; MAX_FRAGMENT_PAYLOAD])
            .expect("fits exactly");
        assert_eq!(slot.payload().len(), MAX_FRAGMENT_PAYLOAD);

        slot.write_payload(b"short").expect("fits");
        assert_eq!(slot.payload(), b"short");
    }

    #[test]
    fn rejects_oversized_payload_without_mutation() {
        let mut slot = slot();
        slot.write_payload(b"keep").expect("fits");
        let err = slot
            .write_payload(&[0_u8; MAX_FRAGMENT_PAYLOAD + 1])
            .expect_err("too large");
        assert_eq!(
            err,
            ReassemblyError::FragmentTooLarge {
                len: MAX_FRAGMENT_PAYLOAD + 1,
                limit: MAX_FRAGMENT_PAYLOAD,
            }
        );
        assert_eq!(slot.payload(), b"keep");
    }
}
