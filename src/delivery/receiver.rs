use super::{decode_payload, MAX_DATAGRAM_SIZE};
use crate::error::ClientError;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::{debug, warn};

/// How long and how often the receiver waits for the delivery datagram.
#[derive(Debug, Clone, Copy)]
pub struct ReceivePolicy {
    pub max_attempts: u32,
    pub attempt_timeout: Duration,
}

impl Default for ReceivePolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            attempt_timeout: Duration::from_secs(7),
        }
    }
}

/// Client side of the delivery channel.
///
/// Bound at construction so that the socket is already listening when the
/// client asks the server to send.
pub struct DeliveryReceiver {
    socket: UdpSocket,
    local_addr: SocketAddr,
    policy: ReceivePolicy,
}

impl DeliveryReceiver {
    pub async fn bind(addr: SocketAddr, policy: ReceivePolicy) -> Result<Self, ClientError> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(ClientError::ListenerBind)?;
        let local_addr = socket.local_addr().map_err(ClientError::ListenerBind)?;
        debug!(addr = %local_addr, "Delivery listener bound");
        Ok(Self {
            socket,
            local_addr,
            policy,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Port to announce in `givememsg`.
    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Wait for the datagram and decode it.
    ///
    /// Each attempt is bounded by the policy timeout; the first decodable
    /// datagram ends the loop. A datagram that does not decode uses up its
    /// attempt like a timeout. Fails with `max attempts reached` once every
    /// attempt is spent.
    pub async fn receive(&self) -> Result<String, ClientError> {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

        for attempt in 1..=self.policy.max_attempts {
            match tokio::time::timeout(self.policy.attempt_timeout, self.socket.recv_from(&mut buf))
                .await
            {
                Ok(Ok((n, src))) => match decode_payload(&buf[..n]) {
                    Ok(message) => {
                        debug!(src = %src, bytes = n, attempt = attempt, "Delivery datagram received");
                        return Ok(message);
                    }
                    Err(reason) => {
                        warn!(
                            src = %src,
                            attempt = attempt,
                            max_attempts = self.policy.max_attempts,
                            reason = %reason,
                            "Undecodable datagram rejected"
                        );
                    }
                },
                Ok(Err(e)) => {
                    // ICMP errors from earlier traffic surface here; keep waiting.
                    warn!(
                        attempt = attempt,
                        max_attempts = self.policy.max_attempts,
                        error = %e,
                        "Delivery receive error"
                    );
                }
                Err(_) => {
                    warn!(
                        attempt = attempt,
                        max_attempts = self.policy.max_attempts,
                        "attempt {}/{} timed out", attempt, self.policy.max_attempts
                    );
                }
            }
        }

        Err(ClientError::MaxAttemptsReached)
    }
}
