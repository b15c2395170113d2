//! Inbound frame dispatch for the connection.

use std::time::Instant;

use log::{debug, info, warn};

use super::{Connection, ReceivedMessage};
use crate::{
    address::PeerAddress,
    config::Role,
    envelope::{DecodeError, Envelope, EnvelopeKind, decode},
    fragment::{FragmentIndex, FragmentStatus, ReassemblyError},
    metrics::{self, Direction, ErrorKind},
    pairing::PairOutcome,
    transport::Transport,
};

impl<T: Transport> Connection<T> {
    /// Decode and dispatch one received frame.
    ///
    /// Returns the message completed by this frame, if any. Malformed or
    /// unexpected frames are logged and dropped.
    pub fn handle_frame(&mut self, sender: PeerAddress, frame: &[u8]) -> Option<ReceivedMessage> {
        self.handle_frame_at(sender, frame, Instant::now())
    }

    /// Dispatch one received frame using an explicit clock reading.
    pub fn handle_frame_at(
        &mut self,
        sender: PeerAddress,
        frame: &[u8],
        now: Instant,
    ) -> Option<ReceivedMessage> {
        let envelope = match decode(frame) {
            Ok(envelope) => envelope,
            Err(DecodeError::Truncated { len }) => {
                debug!("dropping truncated frame: sender={sender}, len={len}");
                return None;
            }
            Err(e) => {
                warn!("dropping malformed frame: sender={sender}, error={e}");
                metrics::inc_errors(ErrorKind::Decode);
                return None;
            }
        };
        let kind = envelope.kind();
        if self.config.role() == Role::Client && self.pairing.is_active() && kind != EnvelopeKind::Pair {
            debug!("ignoring {kind} while pairing: sender={sender}");
            return None;
        }
        metrics::inc_fragments(Direction::Inbound);

        match kind {
            EnvelopeKind::Data => self.dispatch_data(sender, &envelope, now),
            EnvelopeKind::Pair => {
                if let Some(address) = announced_address(sender, &envelope) {
                    self.dispatch_pair(sender, address);
                }
                None
            }
            EnvelopeKind::Connect => {
                if let Some(address) = announced_address(sender, &envelope) {
                    info!("peer connected: sender={sender}, address={address}");
                    self.hooks.connected(sender, address);
                }
                None
            }
        }
    }

    fn dispatch_data(
        &mut self,
        sender: PeerAddress,
        envelope: &Envelope<'_>,
        now: Instant,
    ) -> Option<ReceivedMessage> {
        let header = envelope.header();
        if header.is_single_fragment() {
            return Some(self.deliver(sender, envelope.payload().to_vec()));
        }

        let message_id = header.message_id();
        let count = header.fragment_count();
        if header.fragment_index() == FragmentIndex::first() {
            match self.inbound.begin_message_at(sender, message_id, count, now) {
                Ok(()) | Err(ReassemblyError::AlreadyReserved { .. }) => {}
                Err(e) => {
                    warn!(
                        "cannot reserve message: sender={sender}, message_id={message_id}, \
                         count={count}, error={e}"
                    );
                    metrics::inc_errors(ErrorKind::PoolExhausted);
                    return None;
                }
            }
        }

        match self
            .inbound
            .add_fragment(sender, message_id, header.fragment_index(), envelope.payload())
        {
            Ok(FragmentStatus::Complete) => {
                match self.inbound.take_completed_payload(sender, message_id, count) {
                    Ok(payload) => Some(self.deliver(sender, payload)),
                    Err(e) => {
                        warn!("reassembly failed: sender={sender}, message_id={message_id}, error={e}");
                        metrics::inc_errors(ErrorKind::Reassembly);
                        None
                    }
                }
            }
            Ok(FragmentStatus::Incomplete) => None,
            Ok(FragmentStatus::Duplicate) => {
                debug!(
                    "duplicate fragment: sender={sender}, message_id={message_id}, index={}",
                    header.fragment_index()
                );
                None
            }
            Err(e) => {
                debug!("dropping fragment: sender={sender}, message_id={message_id}, error={e}");
                metrics::inc_errors(ErrorKind::Reassembly);
                None
            }
        }
    }

    fn dispatch_pair(&mut self, sender: PeerAddress, address: PeerAddress) {
        match self.pairing.on_pair_received(sender, address) {
            PairOutcome::Paired {
                sender,
                address,
                finish,
            } => {
                info!("peer paired: sender={sender}, address={address}");
                self.hooks.paired(sender, address);
                if finish {
                    self.finish_pairing();
                }
            }
            PairOutcome::Discovered { sender, address } => {
                if let Some(original) = self.pairing.take_saved_address() {
                    self.restore_address(original);
                }
                self.counterpart = Some(address);
                self.hooks.new_counterpart_address(sender, address);
                let own = self.transport.local_address();
                if let Err(e) = self.enqueue(sender, EnvelopeKind::Pair, own.as_bytes()) {
                    warn!("cannot queue PAIR reply: destination={sender}, error={e}");
                }
                self.finish_pairing();
            }
            PairOutcome::Ignored => {}
        }
    }

    fn deliver(&mut self, sender: PeerAddress, payload: Vec<u8>) -> ReceivedMessage {
        metrics::inc_delivered();
        debug!("message delivered: sender={sender}, len={}", payload.len());
        self.hooks.message(sender, &payload);
        ReceivedMessage::new(sender, payload)
    }
}

fn announced_address(sender: PeerAddress, envelope: &Envelope<'_>) -> Option<PeerAddress> {
    match PeerAddress::try_from(envelope.payload()) {
        Ok(address) => Some(address),
        Err(e) => {
            warn!(
                "dropping {} with bad address payload: sender={sender}, error={e}",
                envelope.kind()
            );
            metrics::inc_errors(ErrorKind::Decode);
            None
        }
    }
}
