//! Command line interface for the `pairwire` demonstration binary.
//!
//! The binary pairs a simulated server and client over an in-memory link
//! and sends one message between them.

use clap::Parser;

/// Command line arguments for the `pairwire` binary.
#[derive(Debug, Parser)]
#[command(
    name = "pairwire",
    version,
    about = "Pair two simulated stations and exchange a message"
)]
pub struct Cli {
    /// Address of the simulated server as twelve hex characters.
    #[arg(long, default_value = "5E0000000001")]
    pub server: String,
    /// Address of the simulated client as twelve hex characters.
    #[arg(long, default_value = "C10000000002")]
    pub client: String,
    /// Pairing window in seconds.
    #[arg(short, long, default_value_t = 30)]
    pub timeout: u32,
    /// Size in bytes of the message sent once paired.
    #[arg(short, long, default_value_t = 500)]
    pub payload_size: usize,
    /// Largest payload carried by one fragment.
    #[arg(long)]
    pub fragment_cap: Option<usize>,
}
