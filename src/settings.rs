//! User settings snapshot and the providers the pipeline reads it from.
//!
//! The pipeline takes exactly one snapshot per message and never writes
//! settings back. Two providers exist: an in-process [`SharedSettings`]
//! and a [`JsonFileSettings`] that re-reads a file owned by another process.

use std::path::PathBuf;
use std::sync::RwLock;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

/// Which mechanism types the code into the focused field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputStrategy {
    /// Broadcast to the accessibility focus agent.
    #[default]
    Accessibility,
    /// Direct keystroke through a privileged shell.
    Privileged,
}

/// Whether the target field already has focus.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusMode {
    /// The focus agent locates the field itself.
    #[default]
    Auto,
    /// The user has already focused the field.
    Manual,
}

// Unrecognized values fall back to the defaults instead of failing the whole snapshot.
impl<'de> Deserialize<'de> for InputStrategy {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.trim().to_ascii_lowercase().as_str() {
            "privileged" | "root" => Self::Privileged,
            _ => Self::Accessibility,
        })
    }
}

impl<'de> Deserialize<'de> for FocusMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.trim().to_ascii_lowercase().as_str() {
            "manual" => Self::Manual,
            _ => Self::Auto,
        })
    }
}

/// Read-only view of the user's preferences for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Global switch. Nothing happens when off.
    pub enabled: bool,
    /// Auto-fill switch.
    pub auto_fill: bool,
    pub input_strategy: InputStrategy,
    pub focus_mode: FocusMode,
    pub mark_as_read: bool,
    /// Takes priority over `mark_as_read`.
    pub delete_on_success: bool,
    pub show_toast: bool,
    /// Clear the clipboard after a successful privileged keystroke.
    pub clear_clipboard_after_input: bool,
    /// Log message contents unredacted.
    pub verbose_log: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_fill: false,
            input_strategy: InputStrategy::default(),
            focus_mode: FocusMode::default(),
            mark_as_read: false,
            delete_on_success: false,
            show_toast: true,
            clear_clipboard_after_input: false,
            verbose_log: false,
        }
    }
}

/// Capability to read a settings snapshot.
pub trait SettingsProvider: Send + Sync {
    fn snapshot(&self) -> Settings;
}

/// In-process settings that can be changed while the relay runs.
#[derive(Debug, Default)]
pub struct SharedSettings {
    inner: RwLock<Settings>,
}

impl SharedSettings {
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: RwLock::new(settings),
        }
    }

    /// Apply a change to the live settings.
    pub fn update(&self, f: impl FnOnce(&mut Settings)) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        f(&mut guard);
    }
}

impl SettingsProvider for SharedSettings {
    fn snapshot(&self) -> Settings {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// Settings persisted as JSON by another process, re-read on every snapshot.
#[derive(Debug, Clone)]
pub struct JsonFileSettings {
    path: PathBuf,
}

impl JsonFileSettings {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SettingsProvider for JsonFileSettings {
    fn snapshot(&self) -> Settings {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Settings file unreadable, using defaults");
                return Settings::default();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(path = %self.path.display(), error = %e, "Settings file corrupt, using defaults");
            Settings::default()
        })
    }
}
