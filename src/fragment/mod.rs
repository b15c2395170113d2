//! Fixed-pool fragmentation and reassembly.
//!
//! This module collects the types used to split outbound payloads into
//! MTU-sized fragments and to stitch inbound fragments back together. Both
//! directions hold fragments in preallocated slot pools, so memory use is
//! bounded by configuration rather than by traffic.

pub mod config;
pub mod error;
pub mod id;
pub mod index;
pub mod outbound;
pub mod reassembly;
pub mod slot;

pub use config::{DEFAULT_POOL_SLOTS, DEFAULT_REASSEMBLY_TIMEOUT, FragmentationConfig, MAX_FRAGMENTS};
pub use error::{FragmentStatus, OutboundError, PoolExhausted, ReassemblyError};
pub use id::{MessageId, MessageIdSource};
pub use index::FragmentIndex;
pub use outbound::OutboundBuffer;
pub use reassembly::ReassemblyBuffer;
pub use slot::{FragmentSlot, SlotId};
