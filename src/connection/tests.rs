//! Unit tests for the connection facade.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use bincode::{Decode, Encode};
use bytes::Bytes;
use rstest::rstest;

use super::*;
use crate::{
    envelope::{EnvelopeHeader, decode, encode},
    fragment::{FragmentIndex, MessageId},
    transport::{loopback::LoopbackAir, test_support::RecordingTransport},
};

const SERVER: PeerAddress = PeerAddress::new([0x5e, 0x00, 0x00, 0x00, 0x00, 0x01]);
const CLIENT: PeerAddress = PeerAddress::new([0xc1, 0x00, 0x00, 0x00, 0x00, 0x02]);

#[derive(Clone, Debug, PartialEq, Eq)]
enum Seen {
    Message(PeerAddress, Vec<u8>),
    Paired(PeerAddress, PeerAddress),
    Connected(PeerAddress, PeerAddress),
    NewCounterpart(PeerAddress, PeerAddress),
    SendError(PeerAddress),
    SendDone(PeerAddress),
    PairingFinished,
}

type Log = Arc<Mutex<Vec<Seen>>>;

fn recording_hooks(log: &Log) -> ConnectionHooks {
    let push = |log: &Log| {
        let log = Arc::clone(log);
        move |seen: Seen| log.lock().expect("lock").push(seen)
    };
    let message = push(log);
    let paired = push(log);
    let connected = push(log);
    let counterpart = push(log);
    let error = push(log);
    let done = push(log);
    let finished = push(log);
    ConnectionHooks::new()
        .with_on_message(move |sender, payload| message(Seen::Message(sender, payload.to_vec())))
        .with_on_paired(move |sender, address| paired(Seen::Paired(sender, address)))
        .with_on_connected(move |sender, address| connected(Seen::Connected(sender, address)))
        .with_on_new_counterpart_address(move |sender, address| {
            counterpart(Seen::NewCounterpart(sender, address));
        })
        .with_on_send_error(move |destination| error(Seen::SendError(destination)))
        .with_on_send_done(move |destination| done(Seen::SendDone(destination)))
        .with_on_pairing_finished(move || finished(Seen::PairingFinished))
}

fn connection(role: Role, address: PeerAddress) -> (Connection<RecordingTransport>, Log) {
    let log = Log::default();
    let config = ConnectionConfig::builder(role).build().expect("config");
    let mut connection = Connection::new(config, RecordingTransport::new(address))
        .with_hooks(recording_hooks(&log));
    let (sink, _rx) = EventSink::channel(8);
    connection.begin(sink);
    (connection, log)
}

fn seen(log: &Log) -> Vec<Seen> { std::mem::take(&mut *log.lock().expect("lock")) }

fn data_frame(index: u8, count: u8, id: u32, payload: &[u8]) -> Vec<u8> {
    let header = EnvelopeHeader::new(
        EnvelopeKind::Data,
        FragmentIndex::new(index),
        count,
        MessageId::new(id),
    );
    encode(&header, payload).expect("encode")
}

fn control_frame(kind: EnvelopeKind, address: PeerAddress) -> Vec<u8> {
    encode(&EnvelopeHeader::single(kind, MessageId::new(1)), address.as_bytes()).expect("encode")
}

/// Drive the connection until the outbound pool drains, completing every
/// submission as delivered.
fn flush(connection: &mut Connection<RecordingTransport>) -> Vec<(PeerAddress, Vec<u8>)> {
    let mut frames = Vec::new();
    loop {
        connection.tick();
        let sent = connection.transport_mut().take_sent();
        if sent.is_empty() {
            break;
        }
        for (destination, frame) in sent {
            connection.handle_send_complete(destination, SendStatus::Delivered);
            frames.push((destination, frame));
        }
    }
    frames
}

#[test]
fn server_requires_destination() {
    let (mut server, _) = connection(Role::Server, SERVER);
    let err = server.send_message(b"hi", None).expect_err("no destination");
    assert!(matches!(
        err,
        SendError::Validation(ValidationError::MissingDestination)
    ));
    assert!(server.outbound().is_empty());
}

#[test]
fn client_requires_counterpart() {
    let (mut client, _) = connection(Role::Client, CLIENT);
    let err = client.send_message(b"hi", None).expect_err("no counterpart");
    assert!(matches!(
        err,
        SendError::Validation(ValidationError::MissingCounterpart)
    ));

    client.set_counterpart_str("5E0000000001").expect("valid");
    assert_eq!(client.counterpart(), Some(SERVER));
    client.send_message_to_str(b"hi", "").expect("queued");
    assert_eq!(client.outbound().len(), 1);
}

#[rstest]
#[case("5E00000000")]
#[case("5E000000000G")]
fn string_destinations_must_be_twelve_hex_characters(#[case] text: &str) {
    let (mut server, _) = connection(Role::Server, SERVER);
    let err = server.send_message_to_str(b"hi", text).expect_err("bad address");
    assert!(matches!(
        err,
        SendError::Validation(ValidationError::InvalidAddress(_))
    ));
}

#[test]
fn server_cannot_take_counterpart() {
    let (mut server, _) = connection(Role::Server, SERVER);
    assert_eq!(
        server.set_counterpart(CLIENT),
        Err(ValidationError::WrongRole {
            role: Role::Server,
        })
    );
}

#[test]
fn oversized_payload_fails_validation() {
    let (mut server, _) = connection(Role::Server, SERVER);
    let err = server
        .send_message(&vec![0_u8; 235 * 255 + 1], Some(CLIENT))
        .expect_err("too large");
    assert!(matches!(
        err,
        SendError::Validation(ValidationError::PayloadTooLarge { .. })
    ));
}

#[test]
fn single_fragment_data_is_delivered_immediately() {
    let (mut client, log) = connection(Role::Client, CLIENT);
    let message = client
        .handle_frame(SERVER, &data_frame(1, 1, 7, b"hello"))
        .expect("delivered");
    assert_eq!(message, ReceivedMessage::new(SERVER, b"hello".to_vec()));
    assert_eq!(seen(&log), vec![Seen::Message(SERVER, b"hello".to_vec())]);
}

#[test]
fn fragmented_data_is_delivered_on_completion() {
    let (mut client, log) = connection(Role::Client, CLIENT);
    assert!(client.handle_frame(SERVER, &data_frame(1, 3, 9, b"ab")).is_none());
    assert!(client.handle_frame(SERVER, &data_frame(3, 3, 9, b"e")).is_none());
    let message = client
        .handle_frame(SERVER, &data_frame(2, 3, 9, b"cd"))
        .expect("complete");
    assert_eq!(message.payload(), b"abcde");
    assert_eq!(seen(&log), vec![Seen::Message(SERVER, b"abcde".to_vec())]);
    assert_eq!(client.inbound().buffered_len(), 0);
}

#[test]
fn fragment_without_first_is_dropped() {
    let (mut client, log) = connection(Role::Client, CLIENT);
    assert!(client.handle_frame(SERVER, &data_frame(2, 2, 4, b"x")).is_none());
    assert!(seen(&log).is_empty());
}

#[rstest]
#[case(&[][..])]
#[case(&[0x01, 1, 1][..])]
#[case(&[0x7f, 1, 1, 0, 0, 0, 0, 1][..])]
fn malformed_frames_have_no_side_effects(#[case] frame: &[u8]) {
    let (mut client, log) = connection(Role::Client, CLIENT);
    assert!(client.handle_frame(SERVER, frame).is_none());
    assert!(seen(&log).is_empty());
    assert_eq!(client.inbound().buffered_len(), 0);
}

#[test]
fn connect_envelope_reports_connected() {
    let (mut server, log) = connection(Role::Server, SERVER);
    server.handle_frame(CLIENT, &control_frame(EnvelopeKind::Connect, SERVER));
    assert_eq!(seen(&log), vec![Seen::Connected(CLIENT, SERVER)]);
}

#[test]
fn announce_connect_carries_chosen_counterpart() {
    let (mut client, _) = connection(Role::Client, CLIENT);
    client.set_counterpart(SERVER).expect("client");
    client.announce_connect(None).expect("queued");
    let frames = flush(&mut client);
    assert_eq!(frames.len(), 1);
    let envelope = decode(&frames[0].1).expect("decode");
    assert_eq!(envelope.kind(), EnvelopeKind::Connect);
    assert_eq!(envelope.payload(), SERVER.as_bytes());
}

#[test]
fn completions_reach_send_hooks() {
    let (mut server, log) = connection(Role::Server, SERVER);
    server.send_message(b"one", Some(CLIENT)).expect("queued");
    server.send_message(b"two", Some(CLIENT)).expect("queued");

    assert!(server.tick());
    server.handle_send_complete(CLIENT, SendStatus::Failed);
    assert!(!server.tick());
    server.handle_send_complete(CLIENT, SendStatus::Delivered);

    assert_eq!(
        seen(&log),
        vec![Seen::SendError(CLIENT), Seen::SendDone(CLIENT)]
    );
    assert!(server.transport().peers.is_empty());
}

#[test]
fn client_pairing_ignores_everything_but_pair() {
    let (mut client, log) = connection(Role::Client, CLIENT);
    client.start_pairing(30).expect("start");
    assert_eq!(client.local_address(), PeerAddress::DEFAULT_RENDEZVOUS);

    assert!(client.handle_frame(SERVER, &data_frame(1, 1, 1, b"early")).is_none());
    client.handle_frame(SERVER, &control_frame(EnvelopeKind::Connect, SERVER));
    assert!(seen(&log).is_empty());
}

#[test]
fn client_completes_handshake_on_pair() {
    let (mut client, log) = connection(Role::Client, CLIENT);
    client.start_pairing(30).expect("start");
    assert_eq!(
        client.start_pairing(30),
        Err(PairingError::AlreadyPairing)
    );

    client.handle_frame(SERVER, &control_frame(EnvelopeKind::Pair, SERVER));

    assert_eq!(client.local_address(), CLIENT);
    assert_eq!(client.counterpart(), Some(SERVER));
    assert_eq!(client.pairing_state(), PairingState::Idle);
    assert_eq!(
        seen(&log),
        vec![Seen::NewCounterpart(SERVER, SERVER), Seen::PairingFinished]
    );

    let frames = flush(&mut client);
    assert_eq!(frames.len(), 1);
    let (destination, frame) = &frames[0];
    assert_eq!(*destination, SERVER);
    let envelope = decode(frame).expect("decode");
    assert_eq!(envelope.kind(), EnvelopeKind::Pair);
    assert_eq!(envelope.payload(), CLIENT.as_bytes());
}

#[test]
fn client_window_closes_and_restores_address() {
    let (mut client, log) = connection(Role::Client, CLIENT);
    client.start_pairing(10).expect("start");
    client.pairing_retry_tick();
    assert!(client.is_pairing());
    client.pairing_retry_tick();
    assert!(!client.is_pairing());
    assert_eq!(client.local_address(), CLIENT);
    assert_eq!(seen(&log), vec![Seen::PairingFinished]);
}

#[test]
fn server_broadcasts_silently_to_rendezvous() {
    let (mut server, log) = connection(Role::Server, SERVER);
    server.start_pairing(0).expect("start");
    server.pairing_retry_tick();

    let frames = flush(&mut server);
    assert_eq!(frames.len(), 1);
    let (destination, frame) = &frames[0];
    assert_eq!(*destination, PeerAddress::DEFAULT_RENDEZVOUS);
    let envelope = decode(frame).expect("decode");
    assert_eq!(envelope.kind(), EnvelopeKind::Pair);
    assert_eq!(envelope.payload(), SERVER.as_bytes());
    assert!(seen(&log).is_empty(), "rendezvous completions stay silent");

    server.handle_frame(CLIENT, &control_frame(EnvelopeKind::Pair, CLIENT));
    assert_eq!(
        seen(&log),
        vec![Seen::Paired(CLIENT, CLIENT), Seen::PairingFinished]
    );
    assert!(!server.is_pairing());
}

#[test]
fn end_pairing_without_session_fails() {
    let (mut server, _) = connection(Role::Server, SERVER);
    assert_eq!(server.end_pairing(), Err(PairingError::NotStarted));
}

#[test]
fn indicator_blinks_and_returns_to_idle() {
    let writes = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&writes);
    let config = ConnectionConfig::builder(Role::Server)
        .indicator(crate::config::IndicatorConfig {
            pin: 2,
            active_high: true,
        })
        .build()
        .expect("config");
    let mut server = Connection::new(config, RecordingTransport::new(SERVER))
        .with_indicator(move |pin: u8, high: bool| {
            recorder.lock().expect("lock").push((pin, high));
        });
    let (sink, _rx) = EventSink::channel(4);
    server.begin(sink);
    server.indicator_tick();
    server.start_pairing(0).expect("start");
    server.indicator_tick();
    server.indicator_tick();
    server.end_pairing().expect("end");
    server.indicator_tick();

    assert_eq!(
        *writes.lock().expect("lock"),
        vec![(2, false), (2, true), (2, false), (2, false)]
    );
}

#[test]
fn end_drops_queued_work() {
    let (mut server, log) = connection(Role::Server, SERVER);
    server.start_pairing(0).expect("start");
    server.send_message(b"pending", Some(CLIENT)).expect("queued");
    server.end();
    assert!(server.outbound().is_empty());
    assert!(!server.is_started());
    assert_eq!(seen(&log), vec![Seen::PairingFinished]);
}

#[derive(Debug, PartialEq, Encode, Decode)]
struct Reading {
    sensor: u8,
    value: i32,
}

#[test]
fn typed_messages_round_trip() {
    let (mut server, _) = connection(Role::Server, SERVER);
    let (mut client, _) = connection(Role::Client, CLIENT);
    let reading = Reading {
        sensor: 3,
        value: -41,
    };
    server.send_typed(&reading, Some(CLIENT)).expect("queued");
    let frames = flush(&mut server);

    let message = frames
        .iter()
        .find_map(|(_, frame)| client.handle_frame(SERVER, frame))
        .expect("delivered");
    assert_eq!(message.decode::<Reading>().expect("decode"), reading);
}

#[test]
fn purges_abandoned_messages() {
    let (mut client, _) = connection(Role::Client, CLIENT);
    let start = Instant::now();
    client.handle_frame_at(SERVER, &data_frame(1, 2, 5, b"half"), start);
    assert_eq!(client.inbound().buffered_len(), 1);
    assert_eq!(
        client.purge_expired_at(start + crate::fragment::DEFAULT_REASSEMBLY_TIMEOUT),
        1
    );
    assert_eq!(client.inbound().buffered_len(), 0);
}

#[test]
fn data_to_pairing_partner_reports_send_status() {
    let log = Log::default();
    let config = ConnectionConfig::builder(Role::Server)
        .pairing_partner(Some(CLIENT))
        .build()
        .expect("config");
    let mut server = Connection::new(config, RecordingTransport::new(SERVER))
        .with_hooks(recording_hooks(&log));
    let (sink, _rx) = EventSink::channel(8);
    server.begin(sink);

    server.send_message(b"hello", Some(CLIENT)).expect("queued");
    flush(&mut server);

    assert_eq!(seen(&log), vec![Seen::SendDone(CLIENT)]);
}

#[test]
fn stray_completion_keeps_peer_registered() {
    let (mut server, log) = connection(Role::Server, SERVER);
    server.transport_mut().peers.insert(CLIENT);

    server.handle_send_complete(CLIENT, SendStatus::Delivered);

    assert!(server.transport().peers.contains(&CLIENT));
    assert!(seen(&log).is_empty());
}

#[test]
fn dropped_completion_expires_and_sending_resumes() {
    let log = Log::default();
    let air = LoopbackAir::new();
    let config = ConnectionConfig::builder(Role::Server)
        .event_queue_capacity(1)
        .send_timeout(Duration::from_millis(200))
        .build()
        .expect("config");
    let mut server = Connection::new(config, air.station(SERVER)).with_hooks(recording_hooks(&log));
    let (sink, mut events) = EventSink::channel(server.config().event_queue_capacity());
    server.begin(sink.clone());
    let mut client = air.station(CLIENT);
    let (client_sink, mut client_events) = EventSink::channel(8);
    client.set_event_sink(client_sink);

    // A pending inbound frame fills the queue, so the next completion is lost.
    assert!(sink.push(LinkEvent::Received {
        sender: CLIENT,
        frame: Bytes::from(data_frame(1, 1, 9, b"queued")),
    }));
    server.send_message(b"one", Some(CLIENT)).expect("first");
    server.send_message(b"two", Some(CLIENT)).expect("second");

    let start = Instant::now();
    assert!(server.tick_at(start));
    while let Ok(event) = events.try_recv() {
        server.handle_event_at(event, start);
    }
    assert!(matches!(server.flow_state(), FlowState::InFlight { .. }));
    server.tick_at(start + Duration::from_millis(199));
    assert_eq!(server.outbound().len(), 1, "second message waits");

    let overdue = start + Duration::from_millis(200);
    assert!(!server.tick_at(overdue));
    while let Ok(event) = events.try_recv() {
        server.handle_event_at(event, overdue);
    }

    assert_eq!(server.flow_state(), FlowState::Idle);
    assert!(server.outbound().is_empty());
    assert_eq!(
        seen(&log),
        vec![
            Seen::Message(CLIENT, b"queued".to_vec()),
            Seen::SendError(CLIENT),
            Seen::SendDone(CLIENT),
        ]
    );
    let mut delivered = Vec::new();
    while let Ok(LinkEvent::Received { frame, .. }) = client_events.try_recv() {
        delivered.push(decode(&frame).expect("decode").payload().to_vec());
    }
    assert_eq!(delivered, vec![b"one".to_vec(), b"two".to_vec()]);
}

#[test]
fn refused_rendezvous_switch_rolls_pairing_back() {
    let (mut client, log) = connection(Role::Client, CLIENT);
    client.transport_mut().reject_address_change = true;

    assert!(matches!(client.start_pairing(10), Err(PairingError::Transport(_))));

    assert_eq!(client.pairing_state(), PairingState::Idle);
    assert_eq!(client.local_address(), CLIENT);
    assert!(client.start_pairing(10).is_err(), "switch still refused");
    assert!(!client.is_pairing());
    assert!(seen(&log).is_empty());
}
