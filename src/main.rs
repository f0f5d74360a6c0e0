use anyhow::Result;
use clap::Parser;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tracing::{error, info};

use getmymsg::cli::{Cli, Command};
use getmymsg::client::{self, ClientOptions};
use getmymsg::config;
use getmymsg::config::types::LogFormat;
use getmymsg::delivery::ReceivePolicy;

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Command::CheckConfig) => {
            let cfg = config::load_config(&cli.config)?;
            println!("Configuration is valid.");
            println!("  Control listen: {}", cfg.server.listen_addr());
            println!("  Max connections: {}", cfg.limits.max_connections);
            println!("  Users: {}", cfg.users.len());
            Ok(())
        }
        Some(Command::Digest { ref text }) => {
            println!("{}", getmymsg::checksum::digest_of(text));
            Ok(())
        }
        Some(Command::Fetch {
            ref username,
            server_ip,
            server_port,
            listen_port,
            connect_timeout,
            max_attempts,
            attempt_timeout,
        }) => {
            let level = cli.log_level.as_deref().unwrap_or("info");
            getmymsg::logging::setup_logging(level, LogFormat::Pretty, None)?;

            let mut opts = ClientOptions::new(username.clone(), SocketAddr::new(server_ip, server_port));
            opts.listen = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), listen_port);
            opts.connect_timeout = Duration::from_secs(connect_timeout);
            opts.receive = ReceivePolicy {
                max_attempts,
                attempt_timeout: Duration::from_secs(attempt_timeout),
            };

            let rt = tokio::runtime::Runtime::new()?;
            match rt.block_on(client::fetch_message(&opts)) {
                Ok(fetched) => {
                    println!("{}", fetched.message);
                    Ok(())
                }
                Err(e) => {
                    error!(user = %username, error = %e, "Fetch failed");
                    eprintln!("error: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Some(Command::Serve) | None => serve(&cli),
    }
}

fn serve(cli: &Cli) -> Result<()> {
    let app_config = config::load_config(&cli.config)?;

    // CLI override > config
    let log_level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| app_config.logging.level.to_string());
    getmymsg::logging::setup_logging(
        &log_level,
        app_config.logging.format,
        app_config.logging.file.as_deref(),
    )?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %app_config.server.listen_addr(),
        users = app_config.users.len(),
        "Starting getmymsg server"
    );

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        if let Err(e) = getmymsg::server::run(app_config).await {
            error!(error = %e, "Server error");
            std::process::exit(1);
        }
    });

    Ok(())
}
