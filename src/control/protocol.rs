//! Control-channel wire format: one ASCII line per request and per response.
//!
//! Request:  `<command> <arg0> <arg1> ...\n`
//! Response: `<status> <message>\n`, status being `ok` or `error`.

use std::fmt;

pub const CMD_HELLO: &str = "helloiam";
pub const CMD_MSGLEN: &str = "msglen";
pub const CMD_GIVEMEMSG: &str = "givememsg";
pub const CMD_CHKMSG: &str = "chkmsg";
pub const CMD_BYE: &str = "bye";

pub const STATUS_OK: &str = "ok";
pub const STATUS_ERROR: &str = "error";

/// Payload of the reply to `bye`.
pub const BYE_MESSAGE: &str = "bye";

/// One parsed request line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    name: Option<String>,
    params: Vec<String>,
}

impl Command {
    /// Split a line on single spaces, skipping empty tokens. Line terminators
    /// are stripped first. An empty line yields a command without a name.
    pub fn parse(line: &str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);
        let mut tokens = line.split(' ').filter(|t| !t.is_empty()).map(str::to_string);
        let name = tokens.next();
        Self {
            name,
            params: tokens.collect(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// First parameter, if any.
    pub fn arg(&self) -> Option<&str> {
        self.params.first().map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Error,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Ok => STATUS_OK,
            Status::Error => STATUS_ERROR,
        }
    }
}

/// One response line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: Status,
    pub message: String,
}

impl Response {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: Status::Ok,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    /// Parse a response line: first token is the status, the rest is the message.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let (status, message) = match line.split_once(' ') {
            Some((s, m)) => (s, m.trim()),
            None => (line, ""),
        };
        let status = match status {
            STATUS_OK => Status::Ok,
            STATUS_ERROR => Status::Error,
            _ => return None,
        };
        Some(Self {
            status,
            message: message.to_string(),
        })
    }
}

/// Line text without terminator; an empty message leaves no trailing space.
impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.status.as_str())
        } else {
            write!(f, "{} {}", self.status.as_str(), self.message)
        }
    }
}

/// Build a request line (without terminator).
pub fn request_line(name: &str, args: &[&str]) -> String {
    let mut line = name.to_string();
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}
