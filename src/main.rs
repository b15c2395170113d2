//! Demonstration binary for `pairwire`.
//!
//! Runs a server and a client over [`LoopbackAir`], pairs them through the
//! rendezvous address and sends one fragmented message from the client.

mod cli;

use clap::Parser;
use pairwire::{
    Connection,
    ConnectionConfig,
    ConnectionConfigBuilder,
    LinkDriver,
    LoopbackAir,
    PeerAddress,
    Role,
};
use tokio::{
    sync::mpsc,
    time::{self, Duration},
};

const STATUS_POLL: Duration = Duration::from_millis(100);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Enable structured logging for the demonstration.
    // Applications embedding the library should install their own subscriber.
    tracing_subscriber::fmt::init();

    let cli = cli::Cli::parse();
    let server_address: PeerAddress = cli.server.parse()?;
    let client_address: PeerAddress = cli.client.parse()?;
    let air = LoopbackAir::new();

    let server_config = with_cap(ConnectionConfig::builder(Role::Server), cli.fragment_cap)
        .pairing_timeout_secs(cli.timeout)
        .build()?;
    let client_config = with_cap(ConnectionConfig::builder(Role::Client), cli.fragment_cap)
        .pairing_timeout_secs(cli.timeout)
        .build()?;

    let (inbox_tx, mut inbox) = mpsc::channel(4);
    let (server, server_handle) =
        LinkDriver::new(Connection::new(server_config, air.station(server_address)));
    let (client, client_handle) =
        LinkDriver::new(Connection::new(client_config, air.station(client_address)));
    let server_task = tokio::spawn(server.with_inbox(inbox_tx).run());
    let client_task = tokio::spawn(client.run());

    client_handle.start_pairing(None).await?;
    server_handle.start_pairing(None).await?;

    let window = Duration::from_secs(u64::from(cli.timeout) + 1);
    let paired = time::timeout(window, async {
        loop {
            match client_handle.status().await {
                Ok(status) if status.counterpart.is_some() => return Ok(status),
                Ok(_) => time::sleep(STATUS_POLL).await,
                Err(e) => return Err(e),
            }
        }
    })
    .await;
    let status = match paired {
        Ok(status) => status?,
        Err(_) => {
            tracing::warn!(timeout_secs = cli.timeout, "pairing window closed without a server");
            shut_down(&server_handle, &client_handle);
            return Ok(());
        }
    };
    tracing::info!(counterpart = ?status.counterpart, "client paired");

    let payload: Vec<u8> = (0..=u8::MAX).cycle().take(cli.payload_size).collect();
    let id = client_handle.send_message(payload.clone(), None).await?;
    tracing::info!(message_id = %id, len = payload.len(), "message queued");

    match time::timeout(Duration::from_secs(5), inbox.recv()).await {
        Ok(Some(message)) => {
            let intact = message.payload() == payload.as_slice();
            tracing::info!(sender = %message.sender(), len = message.payload().len(), intact, "message received");
        }
        Ok(None) | Err(_) => tracing::warn!("message was not delivered"),
    }

    shut_down(&server_handle, &client_handle);
    server_task.await?;
    client_task.await?;
    Ok(())
}

fn with_cap(builder: ConnectionConfigBuilder, cap: Option<usize>) -> ConnectionConfigBuilder {
    match cap {
        Some(cap) => builder.fragment_payload_cap(cap),
        None => builder,
    }
}

fn shut_down(server: &pairwire::DriverHandle, client: &pairwire::DriverHandle) {
    server.shutdown();
    client.shutdown();
}
