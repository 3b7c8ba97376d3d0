//! Tracing setup and log redaction for message contents.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::LogConfig;

/// Longest prefix of a redacted value that is represented in the log.
const REDACT_MAX_CHARS: usize = 32;

/// Install the global tracing subscriber.
///
/// Always logs to stderr. When `log_dir` is set, also writes a daily-rolling
/// file through a non-blocking writer; keep the returned guard alive for the
/// lifetime of the process or buffered lines are lost.
///
/// Calling it again keeps the first subscriber; the conflict is logged at
/// debug level.
pub fn init_tracing(config: &LogConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));
    let stderr_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "smscode-relay.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file_layer = fmt::layer().with_ansi(false).with_writer(writer);
            if let Err(e) = tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .with(file_layer)
                .try_init()
            {
                tracing::debug!(error = %e, "Tracing subscriber already installed");
            }
            Some(guard)
        }
        None => {
            if let Err(e) = tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .try_init()
            {
                tracing::debug!(error = %e, "Tracing subscriber already installed");
            }
            None
        }
    }
}

/// Mask a sender or body for release-build logs.
///
/// Keeps the first and last character so lines can still be correlated.
pub fn redact(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let n = chars.len();
    if n <= 2 {
        return "*".repeat(n);
    }

    let shown = n.min(REDACT_MAX_CHARS);
    let mut out = String::with_capacity(shown + 16);
    out.push(chars[0]);
    out.extend(std::iter::repeat_n('*', shown - 2));
    out.push(chars[n - 1]);
    if n > REDACT_MAX_CHARS {
        out.push_str(&format!(" ({n} chars)"));
    }
    out
}

/// Render message text for a log line: verbatim (escaped) in debug builds or
/// when verbose logging is switched on, redacted otherwise.
pub fn loggable(text: &str, verbose: bool) -> String {
    if verbose || cfg!(debug_assertions) {
        escape(text)
    } else {
        redact(text)
    }
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}
