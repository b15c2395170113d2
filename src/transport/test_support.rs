//! Recording transport used by unit tests across the crate.

use std::collections::BTreeSet;

use super::{EventSink, Transport, TransportError};
use crate::address::PeerAddress;

/// Transport double that records every interaction.
#[derive(Debug)]
pub(crate) struct RecordingTransport {
    pub(crate) address: PeerAddress,
    pub(crate) address_history: Vec<PeerAddress>,
    pub(crate) peers: BTreeSet<PeerAddress>,
    pub(crate) sent: Vec<(PeerAddress, Vec<u8>)>,
    pub(crate) reject_sends: bool,
    pub(crate) reject_address_change: bool,
    pub(crate) sink: Option<EventSink>,
}

impl RecordingTransport {
    pub(crate) fn new(address: PeerAddress) -> Self {
        Self {
            address,
            address_history: Vec::new(),
            peers: BTreeSet::new(),
            sent: Vec::new(),
            reject_sends: false,
            reject_address_change: false,
            sink: None,
        }
    }

    pub(crate) fn take_sent(&mut self) -> Vec<(PeerAddress, Vec<u8>)> { std::mem::take(&mut self.sent) }
}

impl Transport for RecordingTransport {
    fn local_address(&self) -> PeerAddress { self.address }

    fn set_local_address(&mut self, address: PeerAddress) -> Result<(), TransportError> {
        if self.reject_address_change {
            return Err(TransportError::Rejected("address locked".into()));
        }
        self.address = address;
        self.address_history.push(address);
        Ok(())
    }

    fn register_peer(&mut self, address: PeerAddress) -> Result<(), TransportError> {
        self.peers.insert(address);
        Ok(())
    }

    fn unregister_peer(&mut self, address: PeerAddress) -> Result<(), TransportError> {
        self.peers.remove(&address);
        Ok(())
    }

    fn send(&mut self, destination: PeerAddress, frame: &[u8]) -> Result<(), TransportError> {
        if self.reject_sends {
            return Err(TransportError::Rejected("link down".into()));
        }
        if !self.peers.contains(&destination) {
            return Err(TransportError::UnknownPeer(destination));
        }
        self.sent.push((destination, frame.to_vec()));
        Ok(())
    }

    fn set_event_sink(&mut self, sink: EventSink) { self.sink = Some(sink); }
}
