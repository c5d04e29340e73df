//! Log hygiene for command diagnostics
//!
//! Debug logging of executed commands must not leak credentials that
//! scripts pass around, so argv values run through redaction and
//! truncation before they reach a tracing subscriber.

use std::borrow::Cow;
use std::collections::HashSet;

/// Variable-name fragments whose values never get logged.
const SENSITIVE_NAME_PATTERNS: &[&str] = &[
    "PASSWORD", "PASSWD", "SECRET", "TOKEN", "API_KEY", "APIKEY", "CREDENTIAL", "AUTH",
    "PRIVATE", "BEARER", "SESSION", "COOKIE",
];

/// Value prefixes that mark common credential formats.
const SECRET_VALUE_PREFIXES: &[&str] =
    &["sk-", "sk_live_", "sk_test_", "ghp_", "gho_", "xoxb-", "xoxp-", "AKIA", "eyJ"];

/// Configuration for what command logging may reveal.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Whether to redact values that look sensitive (default: true).
    pub redact_sensitive: bool,
    /// Additional variable-name fragments to redact, uppercased.
    pub redact_names: HashSet<String>,
    /// Maximum length of a logged argv element before truncation.
    pub max_value_length: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { redact_sensitive: true, redact_names: HashSet::new(), max_value_length: 120 }
    }
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable redaction. Only for trusted debugging sessions.
    pub fn unsafe_disable_redaction(mut self) -> Self {
        self.redact_sensitive = false;
        self
    }

    /// Add a custom name fragment to redact (case-insensitive).
    pub fn redact_name(mut self, fragment: &str) -> Self {
        self.redact_names.insert(fragment.to_uppercase());
        self
    }

    /// Should a variable with this name have its value hidden?
    pub fn should_redact_name(&self, name: &str) -> bool {
        if !self.redact_sensitive {
            return false;
        }
        let upper = name.to_uppercase();
        SENSITIVE_NAME_PATTERNS.iter().any(|p| upper.contains(p))
            || self.redact_names.iter().any(|p| upper.contains(p.as_str()))
    }

    /// Redact a single value when it looks like a credential.
    pub fn redact_value<'a>(&self, value: &'a str) -> Cow<'a, str> {
        if self.redact_sensitive && looks_like_secret(value) {
            return Cow::Borrowed("[REDACTED]");
        }
        self.truncate(value)
    }

    /// Render an argv for logging: sanitized, redacted, truncated.
    /// `NAME=value` arguments with sensitive names lose their values.
    pub fn format_argv(&self, argv: &[String]) -> String {
        let mut parts = Vec::with_capacity(argv.len());
        for arg in argv {
            let rendered = match arg.split_once('=') {
                Some((name, _)) if self.should_redact_name(name) => {
                    format!("{name}=[REDACTED]")
                }
                _ => self.redact_value(arg).into_owned(),
            };
            parts.push(sanitize(&rendered));
        }
        parts.join(" ")
    }

    fn truncate<'a>(&self, value: &'a str) -> Cow<'a, str> {
        if value.len() <= self.max_value_length {
            return Cow::Borrowed(value);
        }
        let mut end = self.max_value_length;
        while end > 0 && !value.is_char_boundary(end) {
            end -= 1;
        }
        Cow::Owned(format!("{}...[{} bytes]", &value[..end], value.len()))
    }
}

fn looks_like_secret(value: &str) -> bool {
    let trimmed = value.trim();
    SECRET_VALUE_PREFIXES
        .iter()
        .any(|p| trimmed.starts_with(p) && trimmed.len() > p.len() + 10)
}

/// Strip control characters so log lines cannot be forged.
fn sanitize(input: &str) -> String {
    input
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
        .chars()
        .filter(|c| !c.is_control())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn sensitive_names_redacted() {
        let config = LogConfig::new();
        assert!(config.should_redact_name("API_TOKEN"));
        assert!(config.should_redact_name("db_password"));
        assert!(!config.should_redact_name("HOME"));
        assert!(!config.should_redact_name("PATH"));
    }

    #[test]
    fn custom_name_fragment() {
        let config = LogConfig::new().redact_name("internal");
        assert!(config.should_redact_name("MY_INTERNAL_ID"));
    }

    #[test]
    fn assignment_values_hidden_in_argv() {
        let config = LogConfig::new();
        let line = config.format_argv(&argv(&["env", "SECRET_KEY=hunter2", "NAME=ok"]));
        assert_eq!(line, "env SECRET_KEY=[REDACTED] NAME=ok");
    }

    #[test]
    fn credential_shaped_values_hidden() {
        let config = LogConfig::new();
        assert_eq!(config.redact_value("ghp_0123456789abcdef").as_ref(), "[REDACTED]");
        assert_eq!(config.redact_value("plain text").as_ref(), "plain text");
    }

    #[test]
    fn redaction_can_be_disabled() {
        let config = LogConfig::new().unsafe_disable_redaction();
        assert!(!config.should_redact_name("PASSWORD"));
        assert_eq!(config.redact_value("ghp_0123456789abcdef").as_ref(), "ghp_0123456789abcdef");
    }

    #[test]
    fn long_values_truncated_on_char_boundary() {
        let config = LogConfig { max_value_length: 8, ..LogConfig::new() };
        let rendered = config.redact_value("abcdefghij");
        assert!(rendered.starts_with("abcdefgh"));
        assert!(rendered.contains("bytes"));
    }

    #[test]
    fn newlines_cannot_forge_log_lines() {
        let config = LogConfig::new();
        let line = config.format_argv(&argv(&["echo", "a\nfake entry"]));
        assert!(!line.contains('\n'));
        assert!(line.contains("\\n"));
    }
}
