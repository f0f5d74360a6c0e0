//! Client sequence: bind the delivery listener, then drive the control channel
//! through `helloiam`, `msglen`, `givememsg`, `chkmsg` and `bye`.

pub mod control;

use crate::checksum;
use crate::control::protocol::{CMD_BYE, CMD_CHKMSG, CMD_GIVEMEMSG, CMD_HELLO, CMD_MSGLEN};
use crate::delivery::{DeliveryReceiver, ReceivePolicy};
use crate::error::ClientError;
use crate::utils::redact;
use control::ControlClient;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_SERVER_PORT: u16 = 19876;
pub const DEFAULT_LISTEN_PORT: u16 = 12345;

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub username: String,
    pub server: SocketAddr,
    /// Local address of the delivery listener. Port 0 picks a free port.
    pub listen: SocketAddr,
    pub connect_timeout: Duration,
    pub receive: ReceivePolicy,
}

impl ClientOptions {
    pub fn new(username: impl Into<String>, server: SocketAddr) -> Self {
        Self {
            username: username.into(),
            server,
            listen: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_LISTEN_PORT),
            connect_timeout: Duration::from_secs(10),
            receive: ReceivePolicy::default(),
        }
    }
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedMessage {
    pub username: String,
    pub message: String,
    /// Length announced by `msglen`.
    pub announced_len: usize,
}

/// Run the whole client sequence once. The first failure aborts the run and
/// no further command is sent.
pub async fn fetch_message(opts: &ClientOptions) -> Result<FetchedMessage, ClientError> {
    // The delivery channel is unacknowledged: listen before asking for the datagram.
    let receiver = DeliveryReceiver::bind(opts.listen, opts.receive).await?;
    let mut control = ControlClient::connect(opts.server, opts.connect_timeout).await?;

    control.request(CMD_HELLO, &[&opts.username]).await?;

    let len_reply = control.request(CMD_MSGLEN, &[]).await?;
    let announced_len: usize = len_reply
        .trim()
        .parse()
        .map_err(|_| ClientError::MalformedResponse(len_reply.clone()))?;

    let port = receiver.port().to_string();
    control.request(CMD_GIVEMEMSG, &[&port]).await?;

    let message = receiver.receive().await?;
    info!(user = %opts.username, payload = %redact(&message), "Secret message received");

    let actual_len = message.chars().count();
    if actual_len != announced_len {
        warn!(
            announced = announced_len,
            received = actual_len,
            "Message length mismatch"
        );
    }

    let digest = checksum::digest_of(&message);
    control.request(CMD_CHKMSG, &[&digest]).await?;
    control.request(CMD_BYE, &[]).await?;

    Ok(FetchedMessage {
        username: opts.username.clone(),
        message,
        announced_len,
    })
}
