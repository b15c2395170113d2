//! Log output produced by the connection.

use log::Level;
use pairwire::{ConnectionConfig, PeerAddress, Role};
use pairwire_testing::{LoggerHandle, LoopbackPair, logger};
use rstest::rstest;
use serial_test::serial;

const SERVER: PeerAddress = PeerAddress::new([0x5e, 0x00, 0x00, 0x00, 0x00, 0x01]);
const CLIENT: PeerAddress = PeerAddress::new([0xc1, 0x00, 0x00, 0x00, 0x00, 0x02]);

fn pair() -> LoopbackPair {
    LoopbackPair::new(
        ConnectionConfig::builder(Role::Server)
            .build()
            .expect("server config"),
        SERVER,
        ConnectionConfig::builder(Role::Client)
            .build()
            .expect("client config"),
        CLIENT,
    )
}

#[rstest]
#[serial]
fn malformed_frame_is_logged(mut logger: LoggerHandle) {
    let mut pair = pair();
    logger.drain();

    pair.server.handle_frame(CLIENT, &[0xff; 12]);

    assert!(logger.contains(Level::Warn, "dropping malformed frame"));
}

#[rstest]
#[serial]
fn truncated_frame_is_logged_quietly(mut logger: LoggerHandle) {
    let mut pair = pair();
    logger.drain();

    pair.server.handle_frame(CLIENT, &[0x01, 0x01]);

    let records = logger.drain();
    assert!(
        records
            .iter()
            .any(|(level, message)| *level == Level::Debug && message.contains("truncated"))
    );
    assert!(records.iter().all(|(level, _)| *level != Level::Warn));
}

#[rstest]
#[serial]
fn pairing_lifecycle_is_logged(mut logger: LoggerHandle) {
    let mut pair = pair();
    logger.drain();

    pair.client.start_pairing(10).expect("pairing");
    pair.client.pairing_retry_tick();
    pair.client.pairing_retry_tick();

    let records = logger.drain();
    let infos: Vec<&str> = records
        .iter()
        .filter(|(level, _)| *level == Level::Info)
        .map(|(_, message)| message.as_str())
        .collect();
    assert!(infos.iter().any(|m| m.starts_with("pairing started: role=client")));
    assert!(infos.iter().any(|m| m.contains("pairing window closed")));
    assert!(infos.iter().any(|m| m.starts_with("pairing finished: role=client")));
}
