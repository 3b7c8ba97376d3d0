//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

/// Same-sender messages closer together than this are treated as redelivery.
pub const DEDUP_WINDOW: Duration = Duration::from_millis(5000);

/// Wait after a successful privileged agent activation before broadcasting.
pub const AGENT_GRACE_PERIOD: Duration = Duration::from_secs(1);

/// Delay between the clipboard copy and mark-read/delete.
pub const HOUSEKEEPING_DELAY: Duration = Duration::from_millis(100);

/// How many of the newest inbox entries the matcher scans.
pub const MATCH_SEARCH_LIMIT: usize = 5;

/// Default regex rule for the pattern extractor.
pub const DEFAULT_CODE_PATTERN: &str =
    r"(?i)(?:code|验证码|verification|otp|pin|passcode)\D{0,20}?(\d{4,8})";

/// Empirical timing constants. All overridable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub dedup_window: Duration,
    pub agent_grace_period: Duration,
    pub housekeeping_delay: Duration,
    pub match_search_limit: usize,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            dedup_window: DEDUP_WINDOW,
            agent_grace_period: AGENT_GRACE_PERIOD,
            housekeeping_delay: HOUSEKEEPING_DELAY,
            match_search_limit: MATCH_SEARCH_LIMIT,
        }
    }
}

impl Timings {
    /// Apply `SMSCODE_*` overrides on top of the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            dedup_window: env_millis("SMSCODE_DEDUP_WINDOW_MS").unwrap_or(defaults.dedup_window),
            agent_grace_period: env_millis("SMSCODE_AGENT_GRACE_MS")
                .unwrap_or(defaults.agent_grace_period),
            housekeeping_delay: env_millis("SMSCODE_HOUSEKEEPING_DELAY_MS")
                .unwrap_or(defaults.housekeeping_delay),
            match_search_limit: std::env::var("SMSCODE_SEARCH_LIMIT")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.match_search_limit),
        }
    }
}

fn env_millis(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Logging configuration.
#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    /// Directory for a daily-rolling log file. Stderr only when unset.
    pub log_dir: Option<PathBuf>,
    /// Default filter directive when `RUST_LOG` is unset.
    pub default_filter: String,
}

/// Relay configuration, read from the environment by the binary.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// libSQL database holding the inbox and the dedup record.
    pub db_path: PathBuf,
    /// JSON settings file re-read on every message. In-memory defaults when unset.
    pub settings_path: Option<PathBuf>,
    /// Focus-tracking agent identifier handed to privileged activation.
    pub agent_id: String,
    /// Privileged shell binary (`su` on rooted devices).
    pub shell: String,
    /// Extraction rules, applied in order.
    pub code_patterns: Vec<String>,
    pub timings: Timings,
    pub log: LogConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/smscode.db"),
            settings_path: None,
            agent_id: "com.github.smscode/.AutoInputService".to_string(),
            shell: "su".to_string(),
            code_patterns: vec![DEFAULT_CODE_PATTERN.to_string()],
            timings: Timings::default(),
            log: LogConfig {
                log_dir: None,
                default_filter: "info".to_string(),
            },
        }
    }
}

impl RelayConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let db_path = std::env::var("SMSCODE_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let settings_path = std::env::var("SMSCODE_SETTINGS_PATH")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        let agent_id = std::env::var("SMSCODE_AGENT_ID").unwrap_or(defaults.agent_id);
        let shell = std::env::var("SMSCODE_SHELL").unwrap_or(defaults.shell);

        let code_patterns: Vec<String> = std::env::var("SMSCODE_CODE_PATTERNS")
            .unwrap_or_default()
            .split(";;")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let code_patterns = if code_patterns.is_empty() {
            defaults.code_patterns
        } else {
            code_patterns
        };

        let log = LogConfig {
            log_dir: std::env::var("SMSCODE_LOG_DIR").ok().map(PathBuf::from),
            default_filter: defaults.log.default_filter,
        };

        Self {
            db_path,
            settings_path,
            agent_id,
            shell,
            code_patterns,
            timings: Timings::from_env(),
            log,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timings_match_constants() {
        let t = Timings::default();
        assert_eq!(t.dedup_window, Duration::from_millis(5000));
        assert_eq!(t.agent_grace_period, Duration::from_secs(1));
        assert_eq!(t.housekeeping_delay, Duration::from_millis(100));
        assert_eq!(t.match_search_limit, 5);
    }

    #[test]
    fn default_config_has_one_pattern() {
        let cfg = RelayConfig::default();
        assert_eq!(cfg.code_patterns.len(), 1);
        assert_eq!(cfg.shell, "su");
    }
}
