//! Configuration used by the outbound and inbound fragment pools.

use std::{num::NonZeroUsize, time::Duration};

use crate::envelope::MAX_FRAGMENT_PAYLOAD;

/// Default number of slots in each fragment pool.
pub const DEFAULT_POOL_SLOTS: usize = 40;

/// Default age after which an incomplete inbound reservation is evicted.
pub const DEFAULT_REASSEMBLY_TIMEOUT: Duration = Duration::from_secs(10);

/// Most fragments one message may span; the header counts them in a byte.
pub const MAX_FRAGMENTS: usize = u8::MAX as usize;

/// Settings that bound fragment sizes and pool resource usage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FragmentationConfig {
    /// Maximum number of payload bytes carried by a single fragment. Never
    /// larger than [`MAX_FRAGMENT_PAYLOAD`].
    pub fragment_payload_cap: NonZeroUsize,
    /// Fixed number of outbound fragment slots.
    pub outbound_slots: NonZeroUsize,
    /// Fixed number of inbound fragment slots.
    pub inbound_slots: NonZeroUsize,
    /// Duration after which incomplete reassembly reservations are evicted.
    pub reassembly_timeout: Duration,
}

impl FragmentationConfig {
    /// Largest logical message the configuration can fragment.
    #[must_use]
    pub fn max_message_size(&self) -> usize { self.fragment_payload_cap.get() * MAX_FRAGMENTS }

    /// Number of fragments needed for a payload of `len` bytes. Empty
    /// payloads still travel as one fragment.
    #[must_use]
    pub fn fragments_for(&self, len: usize) -> usize {
        len.div_ceil(self.fragment_payload_cap.get()).max(1)
    }
}

impl Default for FragmentationConfig {
    fn default() -> Self {
        Self {
            fragment_payload_cap: NonZeroUsize::new(MAX_FRAGMENT_PAYLOAD)
                .unwrap_or(NonZeroUsize::MIN),
            outbound_slots: NonZeroUsize::new(DEFAULT_POOL_SLOTS).unwrap_or(NonZeroUsize::MIN),
            inbound_slots: NonZeroUsize::new(DEFAULT_POOL_SLOTS).unwrap_or(NonZeroUsize::MIN),
            reassembly_timeout: DEFAULT_REASSEMBLY_TIMEOUT,
        }
    }
}
