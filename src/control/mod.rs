pub mod commands;
pub mod handler;
pub mod protocol;
pub mod retry;

use crate::context::AppContext;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};

const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Counting gate bounding concurrently active sessions.
#[derive(Debug, Clone)]
pub struct SessionLimiter {
    semaphore: Arc<Semaphore>,
    capacity: u32,
}

impl SessionLimiter {
    pub fn new(capacity: u32) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity as usize)),
            capacity,
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Slots currently held, including the one parked on a pending accept.
    pub fn in_use(&self) -> usize {
        (self.capacity as usize).saturating_sub(self.semaphore.available_permits())
    }

    /// Wait until every slot is back, up to `timeout`. Returns false on timeout.
    pub async fn drain(&self, timeout: Duration) -> bool {
        match tokio::time::timeout(timeout, self.semaphore.acquire_many(self.capacity)).await {
            Ok(Ok(_all)) => true,
            Ok(Err(_closed)) => true,
            Err(_) => false,
        }
    }
}

/// Wait before accepting again after `accept` failed (e.g. out of file
/// descriptors). Returns false when the server was stopped meanwhile.
async fn pause_after_accept_error(shutdown: &CancellationToken) -> bool {
    tokio::select! {
        _ = shutdown.cancelled() => false,
        _ = tokio::time::sleep(ACCEPT_ERROR_BACKOFF) => true,
    }
}

/// Accept control connections until `shutdown` is cancelled.
///
/// A limiter slot is taken before each accept, so with every slot in use new
/// clients wait in the listen backlog. The slot goes back when the accept
/// window passes without a connection, or when the spawned session ends.
/// On return the listener has been dropped; sessions still running are left
/// to finish on their own.
pub async fn start_control_server(
    listener: TcpListener,
    ctx: Arc<AppContext>,
    limiter: SessionLimiter,
    shutdown: CancellationToken,
) -> Result<()> {
    let accept_timeout = ctx.config.server.accept_timeout();
    info!(
        addr = %listener.local_addr()?,
        max_connections = limiter.capacity(),
        "Control server listening"
    );

    loop {
        let permit = tokio::select! {
            _ = shutdown.cancelled() => break,
            permit = limiter.semaphore.clone().acquire_owned() => permit?,
        };

        let accepted = tokio::select! {
            _ = shutdown.cancelled() => break,
            result = tokio::time::timeout(accept_timeout, listener.accept()) => result,
        };
        let (stream, peer) = match accepted {
            Ok(Ok(pair)) => pair,
            Ok(Err(e)) => {
                error!(error = %e, "Control accept error");
                drop(permit);
                if !pause_after_accept_error(&shutdown).await {
                    break;
                }
                continue;
            }
            Err(_) => continue,
        };

        debug!(peer = %peer, in_use = limiter.in_use(), "Connection accepted");
        let ctx = ctx.clone();
        let session_shutdown = shutdown.clone();
        tokio::spawn(
            async move {
                let _permit = permit;
                if let Err(e) = handler::handle_connection(stream, ctx, session_shutdown).await {
                    warn!(peer = %peer, error = %e, "Control connection error");
                }
            }
            .in_current_span(),
        );
    }

    drop(listener);
    info!("Control server stopped accepting connections");
    Ok(())
}
