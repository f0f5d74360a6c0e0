use std::fmt;
use std::fs::OpenOptions;
use std::io::IsTerminal;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::{Format, FormatEvent, FormatFields, Writer};
use tracing_subscriber::fmt::{FmtContext, MakeWriter};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::types::LogFormat;

type BoxedSubscriber = Box<dyn Subscriber + Send + Sync>;

/// Tracing formatter that prepends [ALLOW]/[DENY] tags to session outcomes
/// and colorizes known field names.
pub struct PrefixedFormatter<E> {
    inner: E,
    ansi: bool,
}

impl<E> PrefixedFormatter<E> {
    pub fn new(inner: E, ansi: bool) -> Self {
        Self { inner, ansi }
    }
}

impl<S, N, E> FormatEvent<S, N> for PrefixedFormatter<E>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
    E: FormatEvent<S, N>,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut visitor = MessageVisitor {
            message: String::new(),
        };
        event.record(&mut visitor);
        let msg_lower = visitor.message.to_lowercase();

        if is_deny_pattern(&msg_lower) {
            if self.ansi {
                write!(writer, "\x1b[31m[DENY]\x1b[0m ")?;
            } else {
                write!(writer, "[DENY] ")?;
            }
        } else if is_allow_pattern(&msg_lower) {
            if self.ansi {
                write!(writer, "\x1b[34m[ALLOW]\x1b[0m ")?;
            } else {
                write!(writer, "[ALLOW] ")?;
            }
        }

        if self.ansi {
            let mut buf = String::new();
            let buf_writer = Writer::new(&mut buf);
            self.inner.format_event(ctx, buf_writer, event)?;
            write!(writer, "{}", colorize_fields(&buf))
        } else {
            self.inner.format_event(ctx, writer, event)
        }
    }
}

fn colorize_fields(line: &str) -> String {
    let mut result = line.to_string();
    for (field, color) in FIELD_COLORS {
        let pattern = format!("{}=", field);
        if result.contains(&pattern) {
            let colored = format!("\x1b[{}m{}=\x1b[0m", color, field);
            result = result.replace(&pattern, &colored);
        }
    }
    result
}

/// Field name → ANSI color code mapping. Longer names first.
const FIELD_COLORS: &[(&str, &str)] = &[
    // cyan: identity
    ("user", "36"),
    // yellow: what was asked
    ("command", "33"),
    ("dest", "33"),
    // magenta: network addresses
    ("peer", "35"),
    ("addr", "35"),
    // dim: correlation
    ("conn_id", "2"),
    // red: failures
    ("error_type", "31"),
    ("error", "31"),
    ("reason", "31"),
];

struct MessageVisitor {
    message: String,
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        }
    }
}

fn is_deny_pattern(msg: &str) -> bool {
    msg.contains("rejected")
        || msg.contains("mismatch")
        || msg.contains("timed out")
        || msg.contains("bind failed")
        || msg.contains("fetch failed")
}

fn is_allow_pattern(msg: &str) -> bool {
    msg.contains("auth success")
        || msg.contains("checksum confirmed")
        || msg.contains("message pushed")
        || msg.contains("message received")
}

/// Initialize the global tracing subscriber.
///
/// Events go to `file` when given (appended, no ANSI), otherwise to stdout.
/// Pretty mode wraps the default formatter with [`PrefixedFormatter`].
pub fn setup_logging(level: &str, format: LogFormat, file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));

    let installed = match file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            file_subscriber(filter, format, Mutex::new(file))
                .try_init()
                .map_err(Into::<Box<dyn std::error::Error + Send + Sync>>::into)
        }
        None => match format {
            LogFormat::Json => tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .try_init(),
            LogFormat::Pretty => {
                let ansi = std::io::stdout().is_terminal();
                tracing_subscriber::fmt()
                    .event_format(PrefixedFormatter::new(Format::default(), ansi))
                    .with_env_filter(filter)
                    .try_init()
            }
        },
    };

    installed.map_err(|e| anyhow::anyhow!("installing log subscriber: {}", e))
}

/// Subscriber writing plain (never colored) events to `writer`.
fn file_subscriber<W>(filter: EnvFilter, format: LogFormat, writer: W) -> BoxedSubscriber
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    match format {
        LogFormat::Json => Box::new(
            tracing_subscriber::fmt()
                .json()
                .with_ansi(false)
                .with_env_filter(filter)
                .with_writer(writer)
                .finish(),
        ),
        LogFormat::Pretty => Box::new(
            tracing_subscriber::fmt()
                .with_ansi(false)
                .event_format(PrefixedFormatter::new(
                    Format::default().with_ansi(false),
                    false,
                ))
                .with_env_filter(filter)
                .with_writer(writer)
                .finish(),
        ),
    }
}
