use crate::config::types::AppConfig;
use crate::context::AppContext;
use crate::control::retry::{bind_with_retry, BindRetry};
use crate::control::{self, SessionLimiter};
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Instrument};

/// A running control server.
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: CancellationToken,
    limiter: SessionLimiter,
    shutdown_timeout: Duration,
    task: JoinHandle<Result<()>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting and ask sessions to close between commands.
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Limiter slots in use: running sessions plus the one parked on a pending accept.
    pub fn slots_in_use(&self) -> usize {
        self.limiter.in_use()
    }

    /// Wait for the accept loop to end, then for in-flight sessions to finish
    /// (bounded by the configured shutdown timeout).
    pub async fn wait(self) -> Result<()> {
        let accept_result = self.task.await.context("control server task panicked")?;

        if self.limiter.drain(self.shutdown_timeout).await {
            info!("All sessions drained");
        } else {
            warn!(
                active_sessions = self.limiter.in_use(),
                timeout_secs = self.shutdown_timeout.as_secs(),
                "Shutdown timeout reached with sessions still open"
            );
        }
        accept_result
    }
}

/// Bind the control listener (retrying per config) and start accepting.
pub async fn spawn(config: AppConfig) -> Result<ServerHandle> {
    spawn_with_shutdown(config, CancellationToken::new()).await
}

/// Like [`spawn`], with a caller-owned shutdown token.
pub async fn spawn_with_shutdown(
    config: AppConfig,
    shutdown: CancellationToken,
) -> Result<ServerHandle> {
    let listen_addr = config.server.listen_addr();
    let policy = BindRetry {
        delay: Duration::from_millis(config.server.bind_retry_delay_ms),
        max_retries: config.server.bind_max_retries,
    };
    let shutdown_timeout = Duration::from_secs(config.server.shutdown_timeout);
    let limiter = SessionLimiter::new(config.limits.max_connections);

    info!(addr = %listen_addr, "Starting control server");
    let listener = bind_with_retry(listen_addr, policy, &shutdown).await?;
    let local_addr = listener.local_addr()?;

    let ctx = Arc::new(AppContext::new(config));
    let span = tracing::info_span!("control_server", addr = %local_addr);
    let task = tokio::spawn(
        control::start_control_server(listener, ctx, limiter.clone(), shutdown.clone())
            .instrument(span),
    );

    Ok(ServerHandle {
        local_addr,
        shutdown,
        limiter,
        shutdown_timeout,
        task,
    })
}

/// Run the server until SIGINT or SIGTERM, then shut down cooperatively.
pub async fn run(config: AppConfig) -> Result<()> {
    let shutdown = CancellationToken::new();

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Stop signal received, initiating graceful shutdown");
        signal_token.cancel();
    });

    let handle = match spawn_with_shutdown(config, shutdown).await {
        Ok(handle) => handle,
        Err(e) => {
            error!(error = %e, "Control server could not start");
            return Err(e);
        }
    };
    handle.wait().await?;
    info!("Graceful shutdown complete");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "Failed to install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    let ctrl_c_error = tokio::select! {
        _ = sigterm.recv() => None,
        result = tokio::signal::ctrl_c() => result.err(),
    };
    if let Some(e) = ctrl_c_error {
        error!(error = %e, "Failed to listen for SIGINT");
        sigterm.recv().await;
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
