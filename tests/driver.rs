//! End-to-end behaviour of stations running under `LinkDriver`.

use pairwire::{ConnectionConfig, DriverError, PairingState, PeerAddress, Role};
use pairwire_testing::{recv_expect, request_expect, spawn_station};
use rstest::rstest;
use tokio::time::{self, Duration};

const SERVER: PeerAddress = PeerAddress::new([0x5e, 0x00, 0x00, 0x00, 0x00, 0x01]);
const CLIENT: PeerAddress = PeerAddress::new([0xc1, 0x00, 0x00, 0x00, 0x00, 0x02]);

fn config(role: Role) -> ConnectionConfig { ConnectionConfig::builder(role).build().expect("config") }

#[rstest]
#[tokio::test(start_paused = true)]
async fn pair_then_exchange_messages() {
    let air = pairwire::LoopbackAir::new();
    let mut server = spawn_station(&air, config(Role::Server), SERVER);
    let mut client = spawn_station(&air, config(Role::Client), CLIENT);

    request_expect!(client.handle.start_pairing(None));
    request_expect!(server.handle.start_pairing(None));
    time::sleep(Duration::from_secs(6)).await;

    let status = request_expect!(client.handle.status());
    assert_eq!(status.counterpart, Some(SERVER));

    let request: Vec<u8> = (0..=u8::MAX).cycle().take(500).collect();
    request_expect!(client.handle.send_message(request.clone(), None));
    let received = recv_expect!(server.inbox.recv());
    assert_eq!(received.payload(), request.as_slice());

    request_expect!(server.handle.send_message(b"ack".to_vec(), Some(received.sender())));
    let reply = recv_expect!(client.inbox.recv());
    assert_eq!(reply.payload(), b"ack");
    assert_eq!(reply.sender(), SERVER);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn client_without_server_times_out() {
    let air = pairwire::LoopbackAir::new();
    let client = spawn_station(&air, config(Role::Client), CLIENT);

    request_expect!(client.handle.start_pairing(Some(10)));
    time::sleep(Duration::from_secs(11)).await;

    let status = request_expect!(client.handle.status());
    assert_eq!(status.pairing, PairingState::Idle);
    assert_eq!(status.local_address, CLIENT);
    assert_eq!(status.counterpart, None);
    assert!(!air.is_listening(PeerAddress::DEFAULT_RENDEZVOUS));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn second_pairing_request_is_refused() {
    let air = pairwire::LoopbackAir::new();
    let server = spawn_station(&air, config(Role::Server), SERVER);

    request_expect!(server.handle.start_pairing(None));
    let err = server
        .handle
        .start_pairing(None)
        .await
        .expect_err("already pairing");
    assert!(matches!(err, DriverError::Pairing(_)));

    request_expect!(server.handle.end_pairing());
    let status = request_expect!(server.handle.status());
    assert_eq!(status.pairing, PairingState::Idle);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn stopped_driver_rejects_requests() {
    let air = pairwire::LoopbackAir::new();
    let server = spawn_station(&air, config(Role::Server), SERVER);

    server.handle.shutdown();
    let connection = server.task.await.expect("driver task");
    assert!(!connection.is_started());
    assert!(matches!(
        server.handle.send_message(b"late".to_vec(), Some(CLIENT)).await,
        Err(DriverError::Closed)
    ));
}
