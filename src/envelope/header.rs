use super::EnvelopeKind;
use crate::fragment::{FragmentIndex, MessageId};

/// Fixed-width header preceding every envelope payload.
///
/// `EnvelopeHeader` captures just enough information for a receiver to
/// route the envelope by kind and stitch fragments back together, while
/// remaining small enough to copy by value.
///
/// # Examples
///
/// ```
/// use pairwire::{EnvelopeHeader, EnvelopeKind, FragmentIndex, MessageId};
/// let header = EnvelopeHeader::new(EnvelopeKind::Data, FragmentIndex::new(2), 3, MessageId::new(7));
/// assert_eq!(header.message_id().get(), 7);
/// assert_eq!(header.fragment_index().get(), 2);
/// assert!(!header.is_single_fragment());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EnvelopeHeader {
    kind: EnvelopeKind,
    fragment_index: FragmentIndex,
    fragment_count: u8,
    message_id: MessageId,
}

impl EnvelopeHeader {
    /// Create a new envelope header.
    #[must_use]
    pub const fn new(
        kind: EnvelopeKind,
        fragment_index: FragmentIndex,
        fragment_count: u8,
        message_id: MessageId,
    ) -> Self {
        Self {
            kind,
            fragment_index,
            fragment_count,
            message_id,
        }
    }

    /// Header for a message that fits in one envelope.
    #[must_use]
    pub const fn single(kind: EnvelopeKind, message_id: MessageId) -> Self {
        Self::new(kind, FragmentIndex::first(), 1, message_id)
    }

    /// Return the envelope kind.
    #[must_use]
    pub const fn kind(&self) -> EnvelopeKind { self.kind }

    /// Return the fragment position relative to the message.
    #[must_use]
    pub const fn fragment_index(&self) -> FragmentIndex { self.fragment_index }

    /// Return the total number of fragments in the message.
    #[must_use]
    pub const fn fragment_count(&self) -> u8 { self.fragment_count }

    /// Return the logical message identifier.
    #[must_use]
    pub const fn message_id(&self) -> MessageId { self.message_id }

    /// Whether the whole message travels in this one envelope.
    #[must_use]
    pub const fn is_single_fragment(&self) -> bool { self.fragment_count == 1 }

    /// Whether the fragment index lies within `1..=fragment_count`.
    #[must_use]
    pub const fn is_well_formed(&self) -> bool {
        self.fragment_count >= 1 && self.fragment_index.is_within(self.fragment_count)
    }
}
