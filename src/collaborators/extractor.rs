//! Rule-driven code extractor.
//!
//! Applies externally supplied regex rules in order. Capture group 1 is the
//! code when present, otherwise the whole match.

use regex::Regex;
use tracing::debug;

use crate::collaborators::CodeExtractor;
use crate::config::DEFAULT_CODE_PATTERN;
use crate::error::{ConfigError, Result};

/// Extractor over an ordered list of compiled rules.
#[derive(Debug, Clone)]
pub struct PatternExtractor {
    rules: Vec<Regex>,
}

impl PatternExtractor {
    /// Compile `patterns`. An empty list falls back to the default rule.
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut rules = Vec::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            let regex = Regex::new(pattern).map_err(|e| ConfigError::InvalidValue {
                key: "SMSCODE_CODE_PATTERNS".into(),
                message: format!("{pattern}: {e}"),
            })?;
            rules.push(regex);
        }
        if rules.is_empty() {
            return Self::new([DEFAULT_CODE_PATTERN]);
        }
        Ok(Self { rules })
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

impl CodeExtractor for PatternExtractor {
    fn extract(&self, body: &str) -> Option<String> {
        for (i, rule) in self.rules.iter().enumerate() {
            let Some(caps) = rule.captures(body) else {
                continue;
            };
            let Some(m) = caps.get(1).or_else(|| caps.get(0)) else {
                continue;
            };
            let code = m.as_str().trim();
            if !code.is_empty() {
                debug!(rule = i, "Extraction rule matched");
                return Some(code.to_string());
            }
        }
        None
    }
}
