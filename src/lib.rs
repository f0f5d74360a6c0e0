//! getmymsg: hands a short secret message to an authenticated client.
//!
//! The client authenticates over a line-oriented TCP control channel, asks the
//! server to push its message as a base64 datagram over UDP, then confirms the
//! MD5 digest of what it decoded before saying goodbye.

pub mod auth;
pub mod checksum;
pub mod cli;
pub mod client;
pub mod config;
pub mod context;
pub mod control;
pub mod delivery;
pub mod error;
pub mod logging;
pub mod server;
pub mod utils;
