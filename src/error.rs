use thiserror::Error;

/// Failure of a single control-channel command.
///
/// The `Display` text of every variant is the exact reason sent to the peer in
/// `error <reason>`. Any of these ends the session.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("invalid command")]
    InvalidCommand,
    #[error("invalid user name")]
    InvalidUserName,
    #[error("invalid src ip")]
    InvalidSourceIp,
    #[error("unvalidated user")]
    UnvalidatedUser,
    #[error("invalid checksum format")]
    InvalidChecksumFormat,
    #[error("bad checksum")]
    BadChecksum,
    #[error("invalid udp port")]
    InvalidUdpPort,
    #[error("delivery failed")]
    Delivery(#[source] std::io::Error),
}

/// Error class of a [`CommandError`], used for log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Protocol,
    Auth,
    Format,
    Integrity,
    Delivery,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Protocol => "protocol",
            ErrorKind::Auth => "auth",
            ErrorKind::Format => "format",
            ErrorKind::Integrity => "integrity",
            ErrorKind::Delivery => "delivery",
        }
    }
}

impl CommandError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CommandError::InvalidCommand => ErrorKind::Protocol,
            CommandError::InvalidUserName
            | CommandError::InvalidSourceIp
            | CommandError::UnvalidatedUser => ErrorKind::Auth,
            CommandError::InvalidChecksumFormat | CommandError::InvalidUdpPort => {
                ErrorKind::Format
            }
            CommandError::BadChecksum => ErrorKind::Integrity,
            CommandError::Delivery(_) => ErrorKind::Delivery,
        }
    }
}

/// Reasons a client run stops. Every variant aborts the whole sequence.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("listening port busy or invalid: {0}")]
    ListenerBind(#[source] std::io::Error),
    #[error("unable to connect with the server: {0}")]
    Connect(String),
    #[error("{0}")]
    Server(String),
    #[error("malformed server response: {0:?}")]
    MalformedResponse(String),
    #[error("server closed the connection")]
    ConnectionClosed,
    #[error("control channel error: {0}")]
    Transport(#[from] std::io::Error),
    #[error("max attempts reached")]
    MaxAttemptsReached,
}
