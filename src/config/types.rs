use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Log level enum (replaces stringly-typed field)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Pretty => write!(f, "pretty"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default, rename = "users")]
    pub users: Vec<UserConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: IpAddr,
    #[serde(default = "default_bind_port")]
    pub bind_port: u16,
    /// Accept poll window. The limiter slot taken for the accept is handed
    /// back every time this window passes without a new connection.
    #[serde(default = "default_accept_timeout_ms")]
    pub accept_timeout_ms: u64,
    /// Read poll window of a session. An idle window is not an error.
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// Fixed delay between two bind attempts.
    #[serde(default = "default_bind_retry_delay_ms")]
    pub bind_retry_delay_ms: u64,
    /// Extra bind attempts after the first one (0 = retry until stopped).
    #[serde(default)]
    pub bind_max_retries: u32,
    /// Seconds to wait for in-flight sessions once the server is stopping.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            bind_port: default_bind_port(),
            accept_timeout_ms: default_accept_timeout_ms(),
            read_timeout_ms: default_read_timeout_ms(),
            bind_retry_delay_ms: default_bind_retry_delay_ms(),
            bind_max_retries: 0,
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

impl ServerConfig {
    pub fn listen_addr(&self) -> std::net::SocketAddr {
        std::net::SocketAddr::new(self.bind_addr, self.bind_port)
    }

    pub fn accept_timeout(&self) -> Duration {
        Duration::from_millis(self.accept_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

fn default_bind_addr() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_bind_port() -> u16 {
    19876
}

fn default_accept_timeout_ms() -> u64 {
    2000
}

fn default_read_timeout_ms() -> u64 {
    2000
}

fn default_bind_retry_delay_ms() -> u64 {
    2000
}

fn default_shutdown_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LimitsConfig {
    /// Size of the counting limiter bounding concurrent sessions.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Longest command line accepted on the control channel, in bytes.
    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            max_line_length: default_max_line_length(),
        }
    }
}

fn default_max_connections() -> u32 {
    20
}

fn default_max_line_length() -> usize {
    1024
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: LogLevel,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    /// Log destination. Events go to stdout when unset.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
        }
    }
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

/// One directory entry as written in the config file.
#[derive(Clone, Deserialize, Serialize)]
pub struct UserConfig {
    pub username: String,
    /// Source IP the user must connect from.
    pub address: IpAddr,
    pub message: String,
}

impl fmt::Debug for UserConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserConfig")
            .field("username", &self.username)
            .field("address", &self.address)
            .field("message", &"***")
            .finish()
    }
}
