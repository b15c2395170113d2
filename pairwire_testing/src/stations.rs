//! Two-station harnesses over an in-memory link.

use pairwire::{
    Connection,
    ConnectionConfig,
    DriverHandle,
    EventSink,
    LinkDriver,
    LinkEvent,
    LoopbackAir,
    LoopbackTransport,
    PeerAddress,
    ReceivedMessage,
};
use tokio::{sync::mpsc, task::JoinHandle};

const EVENT_QUEUE: usize = 64;
const MAX_ROUNDS: usize = 1024;

/// Messages completed during one [`LoopbackPair::pump`].
#[derive(Debug, Default)]
pub struct Delivered {
    /// Messages the server received.
    pub server: Vec<ReceivedMessage>,
    /// Messages the client received.
    pub client: Vec<ReceivedMessage>,
}

/// Server and client connections driven by hand.
pub struct LoopbackPair {
    /// Shared medium.
    pub air: LoopbackAir,
    /// Server-side connection.
    pub server: Connection<LoopbackTransport>,
    /// Client-side connection.
    pub client: Connection<LoopbackTransport>,
    server_events: mpsc::Receiver<LinkEvent>,
    client_events: mpsc::Receiver<LinkEvent>,
}

impl LoopbackPair {
    /// Start both connections on a fresh medium.
    #[must_use]
    pub fn new(
        server_config: ConnectionConfig,
        server_address: PeerAddress,
        client_config: ConnectionConfig,
        client_address: PeerAddress,
    ) -> Self {
        let air = LoopbackAir::new();
        let (server, server_events) = start(server_config, air.station(server_address));
        let (client, client_events) = start(client_config, air.station(client_address));
        Self {
            air,
            server,
            client,
            server_events,
            client_events,
        }
    }

    /// Submit fragments and apply link events until both stations go quiet.
    pub fn pump(&mut self) -> Delivered {
        let mut delivered = Delivered::default();
        for _ in 0..MAX_ROUNDS {
            self.server.tick();
            self.client.tick();
            let server_moved = drain(&mut self.server, &mut self.server_events, &mut delivered.server);
            let client_moved = drain(&mut self.client, &mut self.client_events, &mut delivered.client);
            if !server_moved && !client_moved {
                break;
            }
        }
        delivered
    }
}

fn start(
    config: ConnectionConfig,
    transport: LoopbackTransport,
) -> (Connection<LoopbackTransport>, mpsc::Receiver<LinkEvent>) {
    let (sink, events) = EventSink::channel(EVENT_QUEUE);
    let mut connection = Connection::new(config, transport);
    connection.begin(sink);
    (connection, events)
}

fn drain(
    connection: &mut Connection<LoopbackTransport>,
    events: &mut mpsc::Receiver<LinkEvent>,
    out: &mut Vec<ReceivedMessage>,
) -> bool {
    let mut moved = false;
    while let Ok(event) = events.try_recv() {
        moved = true;
        out.extend(connection.handle_event(event));
    }
    moved
}

/// A connection running under a spawned [`LinkDriver`].
pub struct DriverStation {
    /// Command handle.
    pub handle: DriverHandle,
    /// Completed messages.
    pub inbox: mpsc::Receiver<ReceivedMessage>,
    /// Driver task, yielding the ended connection.
    pub task: JoinHandle<Connection<LoopbackTransport>>,
}

/// Spawn a driver for a station at `address` on `air`.
///
/// Must be called from within a tokio runtime.
#[must_use]
pub fn spawn_station(air: &LoopbackAir, config: ConnectionConfig, address: PeerAddress) -> DriverStation {
    let (inbox_tx, inbox) = mpsc::channel(EVENT_QUEUE);
    let (driver, handle) = LinkDriver::new(Connection::new(config, air.station(address)));
    let task = tokio::spawn(driver.with_inbox(inbox_tx).run());
    DriverStation { handle, inbox, task }
}
