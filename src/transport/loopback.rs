//! In-memory shared medium for running several stations in one process.
//!
//! [`LoopbackAir`] stands in for the radio: every [`LoopbackTransport`]
//! attached to it is reachable by its current local address. Delivery is
//! immediate and the sender is told the outcome through its own event sink,
//! mirroring the asynchronous completion callback of a real link.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use bytes::Bytes;
use dashmap::DashMap;
use log::debug;

use super::{EventSink, LinkEvent, SendStatus, Transport, TransportError};
use crate::{address::PeerAddress, envelope::LINK_MTU};

/// Default size of each station's peer table.
pub const DEFAULT_PEER_CAPACITY: usize = 20;

#[derive(Debug, Default)]
struct Medium {
    stations: DashMap<PeerAddress, EventSink>,
    link_down: AtomicBool,
}

/// Shared medium connecting loopback stations.
#[derive(Clone, Debug, Default)]
pub struct LoopbackAir {
    medium: Arc<Medium>,
}

impl LoopbackAir {
    /// Create an empty medium.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Create a station that will listen on `address` once its sink is set.
    #[must_use]
    pub fn station(&self, address: PeerAddress) -> LoopbackTransport {
        LoopbackTransport {
            air: self.clone(),
            address,
            peers: Vec::new(),
            peer_capacity: DEFAULT_PEER_CAPACITY,
            sink: None,
        }
    }

    /// Simulate an outage: while down every send completes as failed.
    pub fn set_link_down(&self, down: bool) { self.medium.link_down.store(down, Ordering::Relaxed); }

    /// Whether a station currently listens on `address`.
    #[must_use]
    pub fn is_listening(&self, address: PeerAddress) -> bool {
        self.medium.stations.contains_key(&address)
    }

    fn attach(&self, address: PeerAddress, sink: EventSink) {
        self.medium.stations.insert(address, sink);
    }

    fn detach(&self, address: PeerAddress, sink: &EventSink) {
        self.medium
            .stations
            .remove_if(&address, |_, current| current.same_channel(sink));
    }

    fn deliver(&self, sender: PeerAddress, destination: PeerAddress, frame: &[u8]) -> SendStatus {
        if self.medium.link_down.load(Ordering::Relaxed) {
            return SendStatus::Failed;
        }
        let Some(station) = self.medium.stations.get(&destination) else {
            debug!("no station listening: destination={destination}");
            return SendStatus::Failed;
        };
        let delivered = station.push(LinkEvent::Received {
            sender,
            frame: Bytes::copy_from_slice(frame),
        });
        if delivered {
            SendStatus::Delivered
        } else {
            SendStatus::Failed
        }
    }
}

/// One station attached to a [`LoopbackAir`].
#[derive(Debug)]
pub struct LoopbackTransport {
    air: LoopbackAir,
    address: PeerAddress,
    peers: Vec<PeerAddress>,
    peer_capacity: usize,
    sink: Option<EventSink>,
}

impl LoopbackTransport {
    /// Limit the peer table to `capacity` entries.
    #[must_use]
    pub fn with_peer_capacity(mut self, capacity: usize) -> Self {
        self.peer_capacity = capacity;
        self
    }

    /// Currently registered peers.
    #[must_use]
    pub fn peers(&self) -> &[PeerAddress] { &self.peers }
}

impl Transport for LoopbackTransport {
    fn local_address(&self) -> PeerAddress { self.address }

    fn set_local_address(&mut self, address: PeerAddress) -> Result<(), TransportError> {
        if let Some(sink) = &self.sink {
            self.air.detach(self.address, sink);
            self.air.attach(address, sink.clone());
        }
        self.address = address;
        Ok(())
    }

    fn register_peer(&mut self, address: PeerAddress) -> Result<(), TransportError> {
        if self.peers.contains(&address) {
            return Ok(());
        }
        if self.peers.len() >= self.peer_capacity {
            return Err(TransportError::PeerTableFull {
                capacity: self.peer_capacity,
            });
        }
        self.peers.push(address);
        Ok(())
    }

    fn unregister_peer(&mut self, address: PeerAddress) -> Result<(), TransportError> {
        self.peers.retain(|peer| *peer != address);
        Ok(())
    }

    fn send(&mut self, destination: PeerAddress, frame: &[u8]) -> Result<(), TransportError> {
        let Some(sink) = &self.sink else {
            return Err(TransportError::NotInitialised);
        };
        if !self.peers.contains(&destination) {
            return Err(TransportError::UnknownPeer(destination));
        }
        if frame.len() > LINK_MTU {
            return Err(TransportError::FrameTooLarge {
                len: frame.len(),
                mtu: LINK_MTU,
            });
        }
        let status = self.air.deliver(self.address, destination, frame);
        sink.push(LinkEvent::SendComplete {
            destination,
            status,
        });
        Ok(())
    }

    fn set_event_sink(&mut self, sink: EventSink) {
        if let Some(previous) = self.sink.take() {
            self.air.detach(self.address, &previous);
        }
        self.air.attach(self.address, sink.clone());
        self.sink = Some(sink);
    }
}

impl Drop for LoopbackTransport {
    fn drop(&mut self) {
        if let Some(sink) = self.sink.take() {
            self.air.detach(self.address, &sink);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: PeerAddress = PeerAddress::new([0xaa, 0, 0, 0, 0, 1]);
    const B: PeerAddress = PeerAddress::new([0xbb, 0, 0, 0, 0, 2]);

    #[tokio::test]
    async fn delivers_frames_and_reports_completion() {
        let air = LoopbackAir::new();
        let mut a = air.station(A);
        let mut b = air.station(B);
        let (sink_a, mut rx_a) = EventSink::channel(8);
        let (sink_b, mut rx_b) = EventSink::channel(8);
        a.set_event_sink(sink_a);
        b.set_event_sink(sink_b);

        a.register_peer(B).expect("register");
        a.send(B, b"ping").expect("send");

        assert_eq!(
            rx_b.recv().await,
            Some(LinkEvent::Received {
                sender: A,
                frame: Bytes::from_static(b"ping"),
            })
        );
        assert_eq!(
            rx_a.recv().await,
            Some(LinkEvent::SendComplete {
                destination: B,
                status: SendStatus::Delivered,
            })
        );
    }

    #[tokio::test]
    async fn unknown_destination_completes_as_failed() {
        let air = LoopbackAir::new();
        let mut a = air.station(A);
        let (sink, mut rx) = EventSink::channel(4);
        a.set_event_sink(sink);
        a.register_peer(B).expect("register");
        a.send(B, b"x").expect("submitted");
        assert_eq!(
            rx.recv().await,
            Some(LinkEvent::SendComplete {
                destination: B,
                status: SendStatus::Failed,
            })
        );
    }

    #[test]
    fn unicast_requires_registered_peer() {
        let air = LoopbackAir::new();
        let mut a = air.station(A);
        let (sink, _rx) = EventSink::channel(4);
        a.set_event_sink(sink);
        assert_eq!(a.send(B, b"x"), Err(TransportError::UnknownPeer(B)));
    }

    #[test]
    fn readdressing_moves_the_station() {
        let air = LoopbackAir::new();
        let mut a = air.station(A);
        let (sink, _rx) = EventSink::channel(4);
        a.set_event_sink(sink);
        assert!(air.is_listening(A));

        a.set_local_address(B).expect("readdress");
        assert!(!air.is_listening(A));
        assert!(air.is_listening(B));

        drop(a);
        assert!(!air.is_listening(B));
    }

    #[test]
    fn peer_table_is_bounded() {
        let air = LoopbackAir::new();
        let mut a = air.station(A).with_peer_capacity(1);
        a.register_peer(B).expect("first");
        a.register_peer(B).expect("idempotent");
        assert_eq!(
            a.register_peer(A),
            Err(TransportError::PeerTableFull { capacity: 1 })
        );
    }
}
