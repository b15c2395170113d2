use std::time::{SystemTime, UNIX_EPOCH};

use derive_more::{Display, From, Into};

/// Identifier shared by every fragment of one logical message.
///
/// Receivers key partial messages by `(sender, MessageId)`, so an identifier
/// only needs to be unique among messages one sender has in flight at once.
///
/// # Examples
///
/// ```
/// use pairwire::MessageId;
/// let id = MessageId::new(42);
/// assert_eq!(id.get(), 42);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Display, From, Into)]
#[display("{_0}")]
pub struct MessageId(u32);

impl MessageId {
    /// Create a new identifier.
    #[must_use]
    pub const fn new(value: u32) -> Self { Self(value) }

    /// Return the inner numeric identifier.
    #[must_use]
    pub const fn get(self) -> u32 { self.0 }
}

/// Allocates message identifiers for one sender.
///
/// The counter is seeded from the wall clock so a restarted sender is
/// unlikely to reuse identifiers a receiver still holds partial state for.
/// After seeding it is strictly increasing (wrapping at `u32::MAX`), so two
/// messages from the same source never share an identifier while fewer than
/// 2^32 messages are in flight.
#[derive(Debug)]
pub struct MessageIdSource {
    next: u32,
}

impl MessageIdSource {
    /// Seed the counter from the current wall-clock time in milliseconds.
    #[must_use]
    pub fn from_clock() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_millis());
        #[expect(
            clippy::cast_possible_truncation,
            reason = "only the low 32 bits of the clock seed the counter"
        )]
        let seed = millis as u32;
        Self { next: seed }
    }

    /// Start the counter at a fixed identifier.
    #[must_use]
    pub const fn starting_at(start: MessageId) -> Self { Self { next: start.get() } }

    /// Return the next identifier.
    pub fn next_id(&mut self) -> MessageId {
        let id = MessageId::new(self.next);
        self.next = self.next.wrapping_add(1);
        id
    }
}

impl Default for MessageIdSource {
    fn default() -> Self { Self::from_clock() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_increase_and_wrap() {
        let mut source = MessageIdSource::starting_at(MessageId::new(u32::MAX - 1));
        assert_eq!(source.next_id(), MessageId::new(u32::MAX - 1));
        assert_eq!(source.next_id(), MessageId::new(u32::MAX));
        assert_eq!(source.next_id(), MessageId::new(0));
    }
}
