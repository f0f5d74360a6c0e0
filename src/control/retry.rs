use anyhow::Result;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Bind policy of the control listener.
#[derive(Debug, Clone, Copy)]
pub struct BindRetry {
    /// Fixed wait between attempts.
    pub delay: Duration,
    /// Attempts after the first one; 0 retries until cancelled.
    pub max_retries: u32,
}

/// Bind `addr`, retrying with a fixed delay.
///
/// - `max_retries == 0`: keep trying until `shutdown` is cancelled.
/// - otherwise up to `1 + max_retries` attempts, then the last error is returned.
///
/// Cancellation during the wait aborts with an error.
pub async fn bind_with_retry(
    addr: SocketAddr,
    policy: BindRetry,
    shutdown: &CancellationToken,
) -> Result<TcpListener> {
    let mut attempt: u32 = 0;
    loop {
        match TcpListener::bind(addr).await {
            Ok(listener) => {
                if attempt > 0 {
                    info!(addr = %addr, attempt = attempt, "Bind succeeded after retry");
                }
                return Ok(listener);
            }
            Err(e) => {
                let exhausted = policy.max_retries != 0 && attempt >= policy.max_retries;
                if exhausted {
                    warn!(addr = %addr, attempt = attempt, error = %e, "Bind failed, no retries remaining");
                    return Err(anyhow::Error::new(e).context(format!("binding {}", addr)));
                }
                warn!(
                    addr = %addr,
                    attempt = attempt,
                    max_retries = policy.max_retries,
                    delay_ms = policy.delay.as_millis() as u64,
                    error = %e,
                    "Bind failed, will retry"
                );
            }
        }

        attempt = attempt.saturating_add(1);
        tokio::select! {
            _ = shutdown.cancelled() => {
                anyhow::bail!("stopped before {} could be bound", addr);
            }
            _ = tokio::time::sleep(policy.delay) => {}
        }
    }
}
