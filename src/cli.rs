use clap::{Parser, Subcommand};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::client::{DEFAULT_LISTEN_PORT, DEFAULT_SERVER_PORT};

#[derive(Parser, Debug)]
#[command(
    name = "getmymsg",
    version,
    about = "Secret message delivery over a TCP control channel and a UDP side channel"
)]
pub struct Cli {
    /// Path to configuration file (also settable via GETMYMSG_CONFIG env var)
    #[arg(short, long, global = true, default_value = "config.toml", env = "GETMYMSG_CONFIG")]
    pub config: PathBuf,

    /// Log level override (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the control server (default when no subcommand is given)
    Serve,
    /// Validate configuration file
    CheckConfig,
    /// Fetch the secret message of a user from a running server
    Fetch {
        /// Username to present with helloiam
        #[arg(short, long)]
        username: String,
        /// Server IP address
        #[arg(long, default_value = "127.0.0.1")]
        server_ip: IpAddr,
        /// Server control port
        #[arg(long, default_value_t = DEFAULT_SERVER_PORT)]
        server_port: u16,
        /// Local UDP port for the delivery (0 picks a free port)
        #[arg(long, default_value_t = DEFAULT_LISTEN_PORT)]
        listen_port: u16,
        /// Connect timeout in seconds
        #[arg(long, default_value = "10")]
        connect_timeout: u64,
        /// Receive attempts before giving up
        #[arg(long, default_value = "5")]
        max_attempts: u32,
        /// Seconds to wait on each receive attempt
        #[arg(long, default_value = "7")]
        attempt_timeout: u64,
    },
    /// Print the checksum chkmsg expects for a text
    Digest {
        /// Text to hash
        text: String,
    },
}
