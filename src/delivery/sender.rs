use super::encode_payload;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::net::UdpSocket;
use tracing::debug;

/// Push `message` to `dest` as a single base64 datagram.
///
/// A fresh socket is bound for every send and dropped when this function
/// returns, on success and on error alike. Loss in transit is not detected.
pub async fn send_payload(message: &str, dest: SocketAddr) -> std::io::Result<usize> {
    let local = match dest.ip() {
        IpAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
        IpAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
    };
    let socket = UdpSocket::bind(local).await?;
    let payload = encode_payload(message);
    let sent = socket.send_to(payload.as_bytes(), dest).await?;
    debug!(dest = %dest, bytes = sent, "Delivery datagram sent");
    Ok(sent)
}
