use crate::control::protocol::{request_line, Response};
use crate::error::ClientError;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tracing::debug;

/// Longest response line the client accepts.
const MAX_RESPONSE_LENGTH: usize = 4096;

/// Client end of the control channel: one request, one response, in order.
pub struct ControlClient {
    framed: Framed<TcpStream, LinesCodec>,
    response_timeout: Duration,
}

impl ControlClient {
    /// Connect within `timeout`. The same bound applies to every response.
    pub async fn connect(addr: SocketAddr, timeout: Duration) -> Result<Self, ClientError> {
        let stream = match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(ClientError::Connect(e.to_string())),
            Err(_) => {
                return Err(ClientError::Connect(format!(
                    "timed out after {}s",
                    timeout.as_secs_f32()
                )))
            }
        };
        debug!(server = %addr, "Control channel connected");
        Ok(Self {
            framed: Framed::new(stream, LinesCodec::new_with_max_length(MAX_RESPONSE_LENGTH)),
            response_timeout: timeout,
        })
    }

    /// Send one command and return the payload of its `ok` reply.
    ///
    /// An `error` reply becomes [`ClientError::Server`] carrying the reason.
    pub async fn request(&mut self, name: &str, args: &[&str]) -> Result<String, ClientError> {
        let line = request_line(name, args);
        debug!(command = %name, "Sending command");
        self.framed.send(line).await.map_err(codec_error)?;

        let reply = match tokio::time::timeout(self.response_timeout, self.framed.next()).await {
            Ok(Some(Ok(reply))) => reply,
            Ok(Some(Err(e))) => return Err(codec_error(e)),
            Ok(None) => return Err(ClientError::ConnectionClosed),
            Err(_) => {
                return Err(ClientError::Transport(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("no reply to {}", name),
                )))
            }
        };

        let response =
            Response::parse(&reply).ok_or_else(|| ClientError::MalformedResponse(reply.clone()))?;
        if response.is_ok() {
            Ok(response.message)
        } else {
            Err(ClientError::Server(response.message))
        }
    }
}

fn codec_error(e: LinesCodecError) -> ClientError {
    match e {
        LinesCodecError::Io(e) => ClientError::Transport(e),
        LinesCodecError::MaxLineLengthExceeded => {
            ClientError::MalformedResponse("response line too long".to_string())
        }
    }
}
