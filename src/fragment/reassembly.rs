//! Inbound pool that stitches fragments back into complete messages.
//!
//! [`ReassemblyBuffer`] reserves one fixed slot per expected fragment when
//! the first fragment of a message arrives, keyed by `(sender, MessageId)`.
//! Later fragments may then arrive in any order; the payload is assembled
//! strictly by fragment index once every slot is filled. Reservations that
//! never complete are purged after a configurable timeout so abandoned
//! messages cannot exhaust the pool.

use std::time::{Duration, Instant};

use super::{
    FragmentIndex,
    FragmentSlot,
    FragmentStatus,
    FragmentationConfig,
    MessageId,
    PoolExhausted,
    ReassemblyError,
};
use crate::{address::PeerAddress, envelope::EnvelopeKind};

#[derive(Clone, Debug)]
struct InboundEntry {
    slot: FragmentSlot,
    filled: bool,
    reserved_at: Instant,
}

/// Bounded pool of partially received messages.
#[derive(Debug)]
pub struct ReassemblyBuffer {
    entries: Vec<Option<InboundEntry>>,
    timeout: Duration,
}

impl ReassemblyBuffer {
    /// Create a pool sized by `config`.
    #[must_use]
    pub fn new(config: &FragmentationConfig) -> Self {
        Self {
            entries: (0..config.inbound_slots.get()).map(|_| None).collect(),
            timeout: config.reassembly_timeout,
        }
    }

    /// Reserve `fragment_count` slots for a new message using the current time.
    ///
    /// # Errors
    ///
    /// See [`ReassemblyBuffer::begin_message_at`].
    pub fn begin_message(
        &mut self,
        sender: PeerAddress,
        message_id: MessageId,
        fragment_count: u8,
    ) -> Result<(), ReassemblyError> {
        self.begin_message_at(sender, message_id, fragment_count, Instant::now())
    }

    /// Reserve `fragment_count` slots for a new message, stamping them with
    /// `now` for timeout-based eviction.
    ///
    /// # Errors
    ///
    /// Returns [`ReassemblyError::EmptyMessage`] for a zero count,
    /// [`ReassemblyError::AlreadyReserved`] when the key is already in use,
    /// and [`ReassemblyError::PoolExhausted`] when too few slots are free.
    /// Nothing is reserved on error.
    pub fn begin_message_at(
        &mut self,
        sender: PeerAddress,
        message_id: MessageId,
        fragment_count: u8,
        now: Instant,
    ) -> Result<(), ReassemblyError> {
        if fragment_count == 0 {
            return Err(ReassemblyError::EmptyMessage);
        }
        if self.reserved(sender, message_id).next().is_some() {
            return Err(ReassemblyError::AlreadyReserved { sender, message_id });
        }
        let requested = usize::from(fragment_count);
        let available = self.free_slots();
        if requested > available {
            return Err(PoolExhausted {
                requested,
                available,
            }
            .into());
        }

        let mut index = FragmentIndex::first();
        let free = self.entries.iter_mut().filter(|entry| entry.is_none());
        for entry in free.take(requested) {
            *entry = Some(InboundEntry {
                slot: FragmentSlot::new(
                    sender,
                    EnvelopeKind::Data,
                    message_id,
                    index,
                    fragment_count,
                ),
                filled: false,
                reserved_at: now,
            });
            index = index.checked_increment().unwrap_or(index);
        }
        Ok(())
    }

    /// Store the bytes of one fragment.
    ///
    /// Returns [`FragmentStatus::Complete`] when this fragment fills the last
    /// outstanding slot and [`FragmentStatus::Duplicate`] when the index was
    /// already filled; duplicates leave the stored bytes untouched.
    ///
    /// # Errors
    ///
    /// Returns [`ReassemblyError::UnknownMessage`] without a reservation,
    /// [`ReassemblyError::IndexOutOfRange`] for an index outside the reserved
    /// range, and [`ReassemblyError::FragmentTooLarge`] for oversized bytes.
    pub fn add_fragment(
        &mut self,
        sender: PeerAddress,
        message_id: MessageId,
        fragment_index: FragmentIndex,
        bytes: &[u8],
    ) -> Result<FragmentStatus, ReassemblyError> {
        let mut fragment_count = None;
        let mut target = None;
        for entry in self.entries.iter_mut().flatten() {
            if entry.slot.belongs_to(sender, message_id) {
                fragment_count = Some(entry.slot.fragment_count());
                if entry.slot.fragment_index() == fragment_index {
                    target = Some(entry);
                    break;
                }
            }
        }

        let Some(entry) = target else {
            return Err(match fragment_count {
                Some(count) => ReassemblyError::IndexOutOfRange {
                    index: fragment_index,
                    count,
                },
                None => ReassemblyError::UnknownMessage { sender, message_id },
            });
        };
        if entry.filled {
            return Ok(FragmentStatus::Duplicate);
        }
        entry.slot.write_payload(bytes)?;
        entry.filled = true;
        let count = entry.slot.fragment_count();

        if self.is_complete(sender, message_id, count) {
            Ok(FragmentStatus::Complete)
        } else {
            Ok(FragmentStatus::Incomplete)
        }
    }

    /// Whether every one of `fragment_count` fragments has arrived.
    #[must_use]
    pub fn is_complete(
        &self,
        sender: PeerAddress,
        message_id: MessageId,
        fragment_count: u8,
    ) -> bool {
        let (reserved, filled) = self.progress(sender, message_id);
        reserved == usize::from(fragment_count) && filled == reserved && reserved > 0
    }

    /// Concatenate the fragments in index order and release their slots.
    ///
    /// # Errors
    ///
    /// Returns [`ReassemblyError::UnknownMessage`] without a reservation and
    /// [`ReassemblyError::NotComplete`] while fragments are outstanding; the
    /// reservation is kept in the latter case.
    pub fn take_completed_payload(
        &mut self,
        sender: PeerAddress,
        message_id: MessageId,
        fragment_count: u8,
    ) -> Result<Vec<u8>, ReassemblyError> {
        let (reserved, filled) = self.progress(sender, message_id);
        if reserved == 0 {
            return Err(ReassemblyError::UnknownMessage { sender, message_id });
        }
        if !self.is_complete(sender, message_id, fragment_count) {
            return Err(ReassemblyError::NotComplete {
                sender,
                message_id,
                received: filled,
                expected: usize::from(fragment_count),
            });
        }

        let mut parts: Vec<(FragmentIndex, usize)> = self
            .entries
            .iter()
            .enumerate()
            .filter_map(|(position, entry)| {
                entry
                    .as_ref()
                    .filter(|e| e.slot.belongs_to(sender, message_id))
                    .map(|e| (e.slot.fragment_index(), position))
            })
            .collect();
        parts.sort_unstable_by_key(|(index, _)| *index);

        let total = parts
            .iter()
            .filter_map(|(_, position)| self.entries[*position].as_ref())
            .map(|e| e.slot.payload().len())
            .sum();
        let mut payload = Vec::with_capacity(total);
        for (_, position) in parts {
            if let Some(entry) = self.entries[position].take() {
                payload.extend_from_slice(entry.slot.payload());
            }
        }
        Ok(payload)
    }

    /// Evict a reservation early, returning the number of slots freed.
    pub fn release_message(&mut self, sender: PeerAddress, message_id: MessageId) -> usize {
        let mut released = 0;
        for entry in &mut self.entries {
            if entry
                .as_ref()
                .is_some_and(|e| e.slot.belongs_to(sender, message_id))
            {
                *entry = None;
                released += 1;
            }
        }
        released
    }

    /// Remove reservations older than the configured timeout.
    ///
    /// Returns the keys of the evicted messages.
    pub fn purge_expired(&mut self) -> Vec<(PeerAddress, MessageId)> {
        self.purge_expired_at(Instant::now())
    }

    /// Remove reservations older than the configured timeout using an
    /// explicit clock reading.
    ///
    /// Returns the keys of the evicted messages.
    pub fn purge_expired_at(&mut self, now: Instant) -> Vec<(PeerAddress, MessageId)> {
        let timeout = self.timeout;
        let mut evicted: Vec<(PeerAddress, MessageId)> = Vec::new();
        for entry in &mut self.entries {
            let Some(partial) = entry.as_ref() else {
                continue;
            };
            if now.saturating_duration_since(partial.reserved_at) >= timeout {
                let key = (partial.slot.peer(), partial.slot.message_id());
                if !evicted.contains(&key) {
                    evicted.push(key);
                }
                *entry = None;
            }
        }
        evicted
    }

    /// Drop every reservation.
    pub fn clear(&mut self) { self.entries.iter_mut().for_each(|entry| *entry = None); }

    /// Number of distinct messages currently reserved.
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        let mut keys: Vec<(PeerAddress, MessageId)> = self
            .entries
            .iter()
            .flatten()
            .map(|e| (e.slot.peer(), e.slot.message_id()))
            .collect();
        keys.sort_unstable();
        keys.dedup();
        keys.len()
    }

    /// Number of free slots.
    #[must_use]
    pub fn free_slots(&self) -> usize { self.entries.iter().filter(|e| e.is_none()).count() }

    /// Total number of slots in the pool.
    #[must_use]
    pub fn capacity(&self) -> usize { self.entries.len() }

    /// Whether a reservation exists for the key.
    #[must_use]
    pub fn has_reservation(&self, sender: PeerAddress, message_id: MessageId) -> bool {
        self.reserved(sender, message_id).next().is_some()
    }

    fn reserved(
        &self,
        sender: PeerAddress,
        message_id: MessageId,
    ) -> impl Iterator<Item = &InboundEntry> {
        self.entries
            .iter()
            .flatten()
            .filter(move |e| e.slot.belongs_to(sender, message_id))
    }

    fn progress(&self, sender: PeerAddress, message_id: MessageId) -> (usize, usize) {
        self.reserved(sender, message_id)
            .fold((0, 0), |(reserved, filled), e| {
                (reserved + 1, filled + usize::from(e.filled))
            })
    }
}
