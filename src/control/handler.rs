use crate::context::AppContext;
use crate::control::commands::{reply_for, Outcome, Session};
use crate::control::protocol::{Command, Response};
use crate::error::CommandError;
use crate::utils::generate_correlation_id;
use anyhow::Result;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

/// How a session ended.
#[derive(Debug)]
pub enum SessionEnd {
    /// The client said `bye`.
    Terminated,
    /// A command failed; the reason was sent to the client.
    Failed(CommandError),
    /// The client went away (EOF, reset or a failed write).
    Disconnected,
    /// The server is stopping; closed between two commands.
    ShuttingDown,
}

/// Serve one accepted control connection until it ends.
pub async fn handle_connection(
    stream: TcpStream,
    ctx: Arc<AppContext>,
    shutdown: CancellationToken,
) -> Result<SessionEnd> {
    let peer_addr = stream.peer_addr()?;
    let conn_id = generate_correlation_id();
    let span = info_span!("session", conn_id = %conn_id, peer = %peer_addr);
    async {
        info!(conn_id = %conn_id, peer = %peer_addr, "Connection opened");
        let end = run_session(stream, peer_addr, &ctx, &shutdown).await?;
        info!(conn_id = %conn_id, peer = %peer_addr, end = ?end, "Connection closed");
        Ok(end)
    }
    .instrument(span)
    .await
}

/// Sequential command loop over any byte stream.
///
/// Reads one line at a time, dispatches it, writes exactly one response line.
/// A read window without data is not an error. Any command error is reported
/// and ends the session; so does an unknown command.
pub async fn run_session<S>(
    stream: S,
    peer_addr: SocketAddr,
    ctx: &AppContext,
    shutdown: &CancellationToken,
) -> Result<SessionEnd>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let codec = LinesCodec::new_with_max_length(ctx.config.limits.max_line_length);
    let mut framed = Framed::new(stream, codec);
    let mut session = Session::new(peer_addr);
    let read_timeout = ctx.config.server.read_timeout();

    let end = loop {
        let next = tokio::select! {
            _ = shutdown.cancelled() => break SessionEnd::ShuttingDown,
            next = tokio::time::timeout(read_timeout, framed.next()) => next,
        };

        let line = match next {
            Err(_) => continue,
            Ok(None) => break SessionEnd::Disconnected,
            Ok(Some(Ok(line))) => line,
            Ok(Some(Err(LinesCodecError::MaxLineLengthExceeded))) => {
                warn!(peer = %peer_addr, "Command line too long, rejected");
                break fail(&mut framed, CommandError::InvalidCommand).await;
            }
            Ok(Some(Err(LinesCodecError::Io(e)))) => {
                if e.kind() == std::io::ErrorKind::InvalidData {
                    warn!(peer = %peer_addr, error = %e, "Undecodable command line rejected");
                    break fail(&mut framed, CommandError::InvalidCommand).await;
                }
                debug!(peer = %peer_addr, error = %e, "Control read failed");
                break SessionEnd::Disconnected;
            }
        };

        let command = Command::parse(&line);
        let name = command.name().unwrap_or_default().to_string();
        debug!(peer = %peer_addr, command = %name, "Command received");

        match ctx.dispatcher.dispatch(&mut session, &command).await {
            Ok(outcome) => {
                if let Err(e) = framed.send(reply_for(&outcome).to_string()).await {
                    debug!(peer = %peer_addr, error = %e, "Control write failed");
                    break SessionEnd::Disconnected;
                }
                if outcome == Outcome::Terminate {
                    break SessionEnd::Terminated;
                }
            }
            Err(e) => {
                warn!(
                    peer = %peer_addr,
                    command = %name,
                    reason = %e,
                    error_type = e.kind().as_str(),
                    "Command rejected"
                );
                break fail(&mut framed, e).await;
            }
        }
    };

    session.close();
    let mut stream = framed.into_inner();
    let _ = stream.shutdown().await;
    Ok(end)
}

/// Send `error <reason>` and turn the failure into a session end.
async fn fail<S>(framed: &mut Framed<S, LinesCodec>, err: CommandError) -> SessionEnd
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let response = Response::error(err.to_string());
    if let Err(e) = framed.send(response.to_string()).await {
        debug!(error = %e, "Could not report command failure");
        return SessionEnd::Disconnected;
    }
    SessionEnd::Failed(err)
}
