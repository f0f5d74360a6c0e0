pub mod types;

use anyhow::{Context, Result};
use std::path::Path;
use types::AppConfig;

/// Maximum config file size (1 MB)
const MAX_CONFIG_SIZE: u64 = 1_048_576;

/// Smallest line limit that still fits `chkmsg` with a full digest.
const MIN_LINE_LENGTH: usize = 48;

/// Load and validate configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("reading config metadata: {}", path.display()))?;
    if metadata.len() > MAX_CONFIG_SIZE {
        anyhow::bail!(
            "config file too large: {} bytes (max {} bytes)",
            metadata.len(),
            MAX_CONFIG_SIZE
        );
    }

    check_config_file_permissions(path);

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading config: {}", path.display()))?;
    parse_config(&content)
}

/// The config holds every user's secret message, so warn when others can read it.
#[cfg(unix)]
fn check_config_file_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    match std::fs::metadata(path) {
        Ok(meta) => {
            let mode = meta.permissions().mode();
            if mode & 0o077 != 0 {
                tracing::warn!(
                    path = %path.display(),
                    mode = format!("{:04o}", mode & 0o7777),
                    "Config file is readable by group/others. \
                     Consider restricting permissions to 0600 since it holds secret messages."
                );
            }
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Could not check config file permissions"
            );
        }
    }
}

#[cfg(not(unix))]
fn check_config_file_permissions(_path: &Path) {}

/// Parse configuration from a TOML string
pub fn parse_config(content: &str) -> Result<AppConfig> {
    let config: AppConfig = toml::from_str(content).context("parsing TOML configuration")?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &AppConfig) -> Result<()> {
    validate_server(config)?;
    validate_limits(config)?;
    validate_users(config)?;
    Ok(())
}

fn validate_server(config: &AppConfig) -> Result<()> {
    if config.server.accept_timeout_ms == 0 {
        anyhow::bail!("server.accept_timeout_ms must be > 0");
    }
    if config.server.read_timeout_ms == 0 {
        anyhow::bail!("server.read_timeout_ms must be > 0");
    }
    Ok(())
}

fn validate_limits(config: &AppConfig) -> Result<()> {
    if config.limits.max_connections == 0 {
        anyhow::bail!("limits.max_connections must be >= 1");
    }
    if config.limits.max_line_length < MIN_LINE_LENGTH {
        anyhow::bail!(
            "limits.max_line_length must be >= {} (got {})",
            MIN_LINE_LENGTH,
            config.limits.max_line_length
        );
    }
    Ok(())
}

fn validate_users(config: &AppConfig) -> Result<()> {
    if config.users.is_empty() {
        anyhow::bail!("at least one user is required");
    }

    let mut seen = std::collections::HashSet::new();
    for user in &config.users {
        if user.username.is_empty() {
            anyhow::bail!("user entry has empty username");
        }
        if user.username.chars().any(char::is_whitespace) {
            anyhow::bail!("username '{}' must not contain whitespace", user.username);
        }
        if !seen.insert(&user.username) {
            anyhow::bail!("duplicate username: {}", user.username);
        }
        if user.message.is_empty() {
            tracing::warn!(user = %user.username, "User has an empty secret message");
        }
    }
    Ok(())
}
