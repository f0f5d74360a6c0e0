//! Command registry and handlers of the control channel.
//!
//! The command set is closed: [`CommandKind`] enumerates it and
//! [`CommandRegistry`] maps wire names to kinds. The registry is built once at
//! startup and shared read-only by every session.

use crate::auth::user::UserRecord;
use crate::auth::Directory;
use crate::checksum;
use crate::control::protocol::{
    self, Command, BYE_MESSAGE, CMD_BYE, CMD_CHKMSG, CMD_GIVEMEMSG, CMD_HELLO, CMD_MSGLEN,
};
use crate::delivery;
use crate::error::CommandError;
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Authenticate,
    MessageLength,
    RequestDelivery,
    ConfirmChecksum,
    Terminate,
}

impl CommandKind {
    pub const ALL: [CommandKind; 5] = [
        CommandKind::Authenticate,
        CommandKind::MessageLength,
        CommandKind::RequestDelivery,
        CommandKind::ConfirmChecksum,
        CommandKind::Terminate,
    ];

    pub fn wire_name(&self) -> &'static str {
        match self {
            CommandKind::Authenticate => CMD_HELLO,
            CommandKind::MessageLength => CMD_MSGLEN,
            CommandKind::RequestDelivery => CMD_GIVEMEMSG,
            CommandKind::ConfirmChecksum => CMD_CHKMSG,
            CommandKind::Terminate => CMD_BYE,
        }
    }

    /// Everything but `helloiam` and `bye` needs an authenticated session.
    pub fn requires_auth(&self) -> bool {
        !matches!(self, CommandKind::Authenticate | CommandKind::Terminate)
    }
}

/// Immutable name-to-command table.
#[derive(Debug, Clone)]
pub struct CommandRegistry {
    commands: HashMap<&'static str, CommandKind>,
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRegistry {
    pub fn new() -> Self {
        let commands = CommandKind::ALL
            .iter()
            .map(|kind| (kind.wire_name(), *kind))
            .collect();
        Self { commands }
    }

    pub fn lookup(&self, name: &str) -> Option<CommandKind> {
        self.commands.get(name).copied()
    }
}

/// Authentication state of a session.
#[derive(Debug, Clone)]
pub enum SessionState {
    Unauthenticated,
    Authenticated(Arc<UserRecord>),
    Closed,
}

/// Per-connection state, owned by the task serving that connection.
#[derive(Debug)]
pub struct Session {
    state: SessionState,
    remote_addr: SocketAddr,
}

impl Session {
    pub fn new(remote_addr: SocketAddr) -> Self {
        Self {
            state: SessionState::Unauthenticated,
            remote_addr,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn remote_ip(&self) -> IpAddr {
        self.remote_addr.ip()
    }

    pub fn user(&self) -> Option<&Arc<UserRecord>> {
        match &self.state {
            SessionState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, SessionState::Closed)
    }

    pub fn close(&mut self) {
        self.state = SessionState::Closed;
    }

    fn authenticated_user(&self) -> Result<Arc<UserRecord>, CommandError> {
        self.user().cloned().ok_or(CommandError::UnvalidatedUser)
    }
}

/// What a successful command asks the session loop to do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Reply `ok <payload>` and keep reading.
    Reply(String),
    /// Reply `ok bye` and close.
    Terminate,
}

/// Shared collaborators of the command handlers.
pub struct Dispatcher {
    registry: Arc<CommandRegistry>,
    directory: Arc<Directory>,
}

impl Dispatcher {
    pub fn new(registry: Arc<CommandRegistry>, directory: Arc<Directory>) -> Self {
        Self {
            registry,
            directory,
        }
    }

    /// Resolve and run one command against `session`.
    ///
    /// The authentication gate is applied here for every kind that needs it,
    /// before the handler runs.
    pub async fn dispatch(
        &self,
        session: &mut Session,
        command: &Command,
    ) -> Result<Outcome, CommandError> {
        let kind = command
            .name()
            .and_then(|name| self.registry.lookup(name))
            .ok_or(CommandError::InvalidCommand)?;

        if kind.requires_auth() && session.user().is_none() {
            return Err(CommandError::UnvalidatedUser);
        }

        match kind {
            CommandKind::Authenticate => self.authenticate(session, command),
            CommandKind::MessageLength => message_length(session),
            CommandKind::RequestDelivery => request_delivery(session, command).await,
            CommandKind::ConfirmChecksum => confirm_checksum(session, command),
            CommandKind::Terminate => Ok(Outcome::Terminate),
        }
    }

    fn authenticate(
        &self,
        session: &mut Session,
        command: &Command,
    ) -> Result<Outcome, CommandError> {
        let user = self
            .directory
            .authenticate(command.arg(), &session.remote_ip())?;
        info!(user = %user.username, peer = %session.remote_addr, "auth success");
        session.state = SessionState::Authenticated(user);
        Ok(Outcome::Reply(String::new()))
    }
}

fn message_length(session: &Session) -> Result<Outcome, CommandError> {
    let user = session.authenticated_user()?;
    Ok(Outcome::Reply(user.message_len().to_string()))
}

async fn request_delivery(session: &Session, command: &Command) -> Result<Outcome, CommandError> {
    let user = session.authenticated_user()?;
    let port = parse_port(command.arg())?;
    let dest = SocketAddr::new(session.remote_ip(), port);

    delivery::send_payload(&user.secret_message, dest)
        .await
        .map_err(CommandError::Delivery)?;
    info!(user = %user.username, dest = %dest, "Secret message pushed");
    Ok(Outcome::Reply(String::new()))
}

fn confirm_checksum(session: &Session, command: &Command) -> Result<Outcome, CommandError> {
    let user = session.authenticated_user()?;
    checksum::validate(command.arg(), &user.secret_message)?;
    info!(user = %user.username, "Checksum confirmed");
    Ok(Outcome::Reply(String::new()))
}

fn parse_port(arg: Option<&str>) -> Result<u16, CommandError> {
    match arg.map(str::parse::<u16>) {
        Some(Ok(port)) if port != 0 => Ok(port),
        _ => Err(CommandError::InvalidUdpPort),
    }
}

/// Reply text for a successful outcome.
pub fn reply_for(outcome: &Outcome) -> protocol::Response {
    match outcome {
        Outcome::Reply(payload) => protocol::Response::ok(payload.clone()),
        Outcome::Terminate => protocol::Response::ok(BYE_MESSAGE),
    }
}
