//! Test utilities for `pairwire`.
//!
//! [`LoopbackPair`] pumps two synchronous connections over a shared
//! [`LoopbackAir`](pairwire::LoopbackAir) until the link goes quiet, and
//! [`spawn_station`] runs a connection under a
//! [`LinkDriver`](pairwire::LinkDriver) for tests using paused tokio time.
//!
//! ```rust
//! use pairwire::{ConnectionConfig, PeerAddress, Role};
//! use pairwire_testing::LoopbackPair;
//!
//! let server = PeerAddress::new([0x5e, 0, 0, 0, 0, 1]);
//! let client = PeerAddress::new([0xc1, 0, 0, 0, 0, 2]);
//! let mut pair = LoopbackPair::new(
//!     ConnectionConfig::builder(Role::Server).build().unwrap(),
//!     server,
//!     ConnectionConfig::builder(Role::Client).counterpart(Some(server)).build().unwrap(),
//!     client,
//! );
//! pair.client.send_message(b"ping", None).unwrap();
//! let delivered = pair.pump();
//! assert_eq!(delivered.server[0].payload(), b"ping");
//! ```

pub mod logging;
pub mod macros;
pub mod recorder;
pub mod stations;

pub use logging::{LoggerHandle, logger};
pub use recorder::{MetricsCapture, capture_metrics};
pub use stations::{Delivered, DriverStation, LoopbackPair, spawn_station};
