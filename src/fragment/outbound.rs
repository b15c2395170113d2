//! Outbound pool that splits messages into fragments awaiting transmission.
//!
//! [`OutboundBuffer`] reserves one fixed slot per fragment when a message is
//! enqueued and serves fragments oldest-first across every destination. A
//! message is either enqueued whole or not at all.

use super::{
    FragmentIndex,
    FragmentSlot,
    FragmentationConfig,
    MessageId,
    MessageIdSource,
    OutboundError,
    PoolExhausted,
    SlotId,
};
use crate::{address::PeerAddress, envelope::EnvelopeKind};

#[derive(Clone, Debug)]
struct OutboundEntry {
    slot: FragmentSlot,
    sequence: u64,
}

/// Bounded pool of fragments waiting for the flow controller.
#[derive(Debug)]
pub struct OutboundBuffer {
    entries: Vec<Option<OutboundEntry>>,
    payload_cap: usize,
    max_message_size: usize,
    next_sequence: u64,
    ids: MessageIdSource,
}

impl OutboundBuffer {
    /// Create a pool sized by `config`, allocating identifiers from the clock.
    #[must_use]
    pub fn new(config: &FragmentationConfig) -> Self {
        Self::with_id_source(config, MessageIdSource::from_clock())
    }

    /// Create a pool that draws message identifiers from `ids`.
    #[must_use]
    pub fn with_id_source(config: &FragmentationConfig, ids: MessageIdSource) -> Self {
        Self {
            entries: (0..config.outbound_slots.get()).map(|_| None).collect(),
            payload_cap: config.fragment_payload_cap.get(),
            max_message_size: config.max_message_size(),
            next_sequence: 0,
            ids,
        }
    }

    /// Split `payload` into DATA fragments addressed to `destination`.
    ///
    /// # Errors
    ///
    /// Returns [`OutboundError::PoolExhausted`] when fewer free slots remain
    /// than fragments are needed, and [`OutboundError::PayloadTooLarge`] when
    /// the message exceeds the fragment count limit. Nothing is reserved on
    /// error.
    pub fn enqueue(
        &mut self,
        destination: PeerAddress,
        payload: &[u8],
    ) -> Result<MessageId, OutboundError> {
        self.enqueue_kind(destination, EnvelopeKind::Data, payload)
    }

    /// Split `payload` into fragments of `kind` addressed to `destination`.
    ///
    /// # Errors
    ///
    /// See [`OutboundBuffer::enqueue`].
    pub fn enqueue_kind(
        &mut self,
        destination: PeerAddress,
        kind: EnvelopeKind,
        payload: &[u8],
    ) -> Result<MessageId, OutboundError> {
        if payload.len() > self.max_message_size {
            return Err(OutboundError::PayloadTooLarge {
                len: payload.len(),
                limit: self.max_message_size,
            });
        }
        let needed = payload.len().div_ceil(self.payload_cap).max(1);
        let available = self.free_slots();
        if needed > available {
            return Err(PoolExhausted {
                requested: needed,
                available,
            }
            .into());
        }
        let Ok(fragment_count) = u8::try_from(needed) else {
            return Err(OutboundError::PayloadTooLarge {
                len: payload.len(),
                limit: self.max_message_size,
            });
        };

        let message_id = self.ids.next_id();
        let mut chunks = payload.chunks(self.payload_cap);
        let mut index = FragmentIndex::first();
        for position in 1..=fragment_count {
            let chunk = chunks.next().unwrap_or_default();
            let mut slot = FragmentSlot::new(destination, kind, message_id, index, fragment_count);
            // Chunks never exceed the configured cap, which never exceeds the slot.
            if slot.write_payload(chunk).is_err() {
                self.release_message(destination, message_id);
                return Err(OutboundError::PayloadTooLarge {
                    len: payload.len(),
                    limit: self.max_message_size,
                });
            }
            self.occupy(slot);
            if position < fragment_count {
                index = index.checked_increment().unwrap_or(index);
            }
        }
        Ok(message_id)
    }

    /// Peek at the oldest fragment not yet handed to the transport.
    #[must_use]
    pub fn next_pending_fragment(&self) -> Option<(SlotId, &FragmentSlot)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(position, entry)| entry.as_ref().map(|e| (position, e)))
            .min_by_key(|(_, entry)| entry.sequence)
            .map(|(position, entry)| (SlotId::new(position), &entry.slot))
    }

    /// Free the slot once the transport has accepted its fragment.
    ///
    /// Returns `false` if the slot was already free.
    pub fn mark_sent(&mut self, slot: SlotId) -> bool {
        self.entries
            .get_mut(slot.get())
            .and_then(Option::take)
            .is_some()
    }

    /// Drop every pending fragment of one message.
    ///
    /// Returns the number of slots freed.
    pub fn release_message(&mut self, destination: PeerAddress, message_id: MessageId) -> usize {
        let mut released = 0;
        for entry in &mut self.entries {
            if entry
                .as_ref()
                .is_some_and(|e| e.slot.belongs_to(destination, message_id))
            {
                *entry = None;
                released += 1;
            }
        }
        released
    }

    /// Drop every pending fragment.
    pub fn clear(&mut self) { self.entries.iter_mut().for_each(|entry| *entry = None); }

    /// Number of fragments waiting to be sent.
    #[must_use]
    pub fn len(&self) -> usize { self.entries.iter().filter(|e| e.is_some()).count() }

    /// Whether no fragments are waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.entries.iter().all(Option::is_none) }

    /// Number of free slots.
    #[must_use]
    pub fn free_slots(&self) -> usize { self.entries.len() - self.len() }

    /// Total number of slots in the pool.
    #[must_use]
    pub fn capacity(&self) -> usize { self.entries.len() }

    fn occupy(&mut self, slot: FragmentSlot) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        if let Some(free) = self.entries.iter_mut().find(|e| e.is_none()) {
            *free = Some(OutboundEntry { slot, sequence });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use super::*;

    const DEST: PeerAddress = PeerAddress::new([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
    const OTHER: PeerAddress = PeerAddress::new([1, 1, 1, 1, 1, 1]);

    fn config(cap: usize, slots: usize) -> FragmentationConfig {
        FragmentationConfig {
            fragment_payload_cap: NonZeroUsize::new(cap).expect("non-zero"),
            outbound_slots: NonZeroUsize::new(slots).expect("non-zero"),
            ..FragmentationConfig::default()
        }
    }

    fn buffer(cap: usize, slots: usize) -> OutboundBuffer {
        OutboundBuffer::with_id_source(
            &config(cap, slots),
            MessageIdSource::starting_at(MessageId::new(100)),
        )
    }

    fn drain(buffer: &mut OutboundBuffer) -> Vec<(u8, u8, Vec<u8>)> {
        let mut out = Vec::new();
        while let Some((id, slot)) = buffer.next_pending_fragment() {
            out.push((
                slot.fragment_index().get(),
                slot.fragment_count(),
                slot.payload().to_vec(),
            ));
            assert!(buffer.mark_sent(id));
        }
        out
    }

    #[test]
    fn splits_payload_in_index_order() {
        let mut buffer = buffer(3, 8);
        let id = buffer.enqueue(DEST, &[0, 1, 2, 3, 4, 5, 6, 7]).expect("enqueue");
        assert_eq!(id, MessageId::new(100));
        assert_eq!(buffer.len(), 3);

        assert_eq!(
            drain(&mut buffer),
            vec![
                (1, 3, vec![0, 1, 2]),
                (2, 3, vec![3, 4, 5]),
                (3, 3, vec![6, 7]),
            ]
        );
        assert!(buffer.is_empty());
    }

    #[test]
    fn empty_payload_still_occupies_one_fragment() {
        let mut buffer = buffer(8, 2);
        buffer
            .enqueue_kind(DEST, EnvelopeKind::Pair, &[])
            .expect("enqueue");
        let (_, slot) = buffer.next_pending_fragment().expect("one fragment");
        assert_eq!(slot.kind(), EnvelopeKind::Pair);
        assert_eq!(slot.fragment_count(), 1);
        assert!(slot.payload().is_empty());
    }

    #[test]
    fn serves_fragments_fifo_across_destinations() {
        let mut buffer = buffer(2, 8);
        buffer.enqueue(DEST, &[1, 2, 3]).expect("first");
        buffer.enqueue(OTHER, &[9]).expect("second");

        // Free a slot in the middle so the next enqueue reuses it.
        let (first, _) = buffer.next_pending_fragment().expect("pending");
        buffer.mark_sent(first);
        buffer.enqueue(DEST, &[7]).expect("third");

        let order: Vec<(PeerAddress, Vec<u8>)> = std::iter::from_fn(|| {
            let (id, slot) = buffer.next_pending_fragment()?;
            let item = (slot.peer(), slot.payload().to_vec());
            buffer.mark_sent(id);
            Some(item)
        })
        .collect();
        assert_eq!(
            order,
            vec![(DEST, vec![3]), (OTHER, vec![9]), (DEST, vec![7])]
        );
    }

    #[test]
    fn exhaustion_is_all_or_nothing() {
        let mut buffer = buffer(2, 4);
        let first = buffer.enqueue(DEST, &[1, 2, 3, 4]).expect("two slots");
        let err = buffer
            .enqueue(OTHER, &[0; 6])
            .expect_err("three slots do not fit in two");
        assert_eq!(
            err,
            OutboundError::PoolExhausted(PoolExhausted {
                requested: 3,
                available: 2,
            })
        );
        assert_eq!(buffer.len(), 2);
        let (_, slot) = buffer.next_pending_fragment().expect("untouched");
        assert_eq!(slot.message_id(), first);
    }

    #[test]
    fn rejects_messages_beyond_fragment_count_limit() {
        let mut buffer = buffer(1, 8);
        let err = buffer.enqueue(DEST, &[0; 256]).expect_err("too many fragments");
        assert_eq!(
            err,
            OutboundError::PayloadTooLarge {
                len: 256,
                limit: 255,
            }
        );
    }

    #[test]
    fn release_message_frees_only_matching_slots() {
        let mut buffer = buffer(1, 8);
        let dropped = buffer.enqueue(DEST, &[1, 2]).expect("enqueue");
        buffer.enqueue(OTHER, &[3]).expect("enqueue");
        assert_eq!(buffer.release_message(DEST, dropped), 2);
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.free_slots(), 7);
    }
}
