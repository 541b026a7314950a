// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use super::wrap::strip_ansi;
use crate::target::Target;

lazy_static! {
    // "0 errors", "no warnings", "no tests failed"
    static ref NEGATED: Regex =
        Regex::new(r"\b(?:no|0|zero)\s+(?:\w+\s+)?(?:errors?|failed|failures?|warnings?)\b")
            .expect("valid negation pattern");
    static ref ERROR_WORD: Regex =
        Regex::new(r"\b(?:errors?|failed|failures?|fatal)\b|\berr:").expect("valid error pattern");
    static ref WARN_WORD: Regex =
        Regex::new(r"\b(?:warnings?|warn)\b").expect("valid warning pattern");
}

/// Severity of a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Regular output.
    Info,
    /// Warning output.
    Warn,
    /// Error output.
    Error,
}

impl Severity {
    /// Classifies a raw line by the keywords build tools print.
    ///
    /// Keywords only count as whole words, and counts of zero ("0 errors",
    /// "no tests failed") are ignored. Escape sequences are stripped first so
    /// colored tool output classifies the same as plain output.
    pub fn classify(line: &str) -> Self {
        let lower = strip_ansi(line).to_lowercase();
        let lower = NEGATED.replace_all(&lower, " ");
        if ERROR_WORD.is_match(&lower) {
            Severity::Error
        } else if WARN_WORD.is_match(&lower) {
            Severity::Warn
        } else {
            Severity::Info
        }
    }
}

/// Output stream a chunk came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    /// Child standard output.
    Stdout,
    /// Child standard error.
    Stderr,
}

/// One complete line of target output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    /// Target that produced the line.
    pub target: Target,
    /// Severity of the line.
    pub severity: Severity,
    /// Line text without the trailing newline. May contain escape sequences.
    pub text: String,
}

impl LogEntry {
    /// Creates an entry with an explicit severity.
    pub fn new(target: Target, severity: Severity, text: impl Into<String>) -> Self {
        Self {
            target,
            severity,
            text: text.into(),
        }
    }

    /// Creates an entry whose severity is classified from its text.
    pub fn classified(target: Target, text: impl Into<String>) -> Self {
        let text = text.into();
        let severity = Severity::classify(&text);
        Self {
            target,
            severity,
            text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(Severity::classify("Compiled successfully"), Severity::Info);
        assert_eq!(Severity::classify("Error: cannot find module"), Severity::Error);
        assert_eq!(Severity::classify("build FAILED"), Severity::Error);
        assert_eq!(Severity::classify("Warning: deprecated option"), Severity::Warn);
        assert_eq!(
            Severity::classify("\x1b[33mwarn:\x1b[0m large chunk"),
            Severity::Warn
        );
        assert_eq!(Severity::classify("[WARN] slow query"), Severity::Warn);
        assert_eq!(Severity::classify("npm ERR: missing script"), Severity::Error);
    }

    #[test]
    fn test_classify_needs_whole_words() {
        assert_eq!(Severity::classify("errorHandler registered"), Severity::Info);
        assert_eq!(Severity::classify("loaded warningsPanel.ts"), Severity::Info);
        assert_eq!(Severity::classify("GET /api/terrors 200"), Severity::Info);
        assert_eq!(Severity::classify("Found 3 errors"), Severity::Error);
    }

    #[test]
    fn test_classify_ignores_zero_counts() {
        assert_eq!(Severity::classify("Compiled with 0 errors"), Severity::Info);
        assert_eq!(Severity::classify("no tests failed"), Severity::Info);
        assert_eq!(Severity::classify("0 errors, 0 warnings"), Severity::Info);
        assert_eq!(
            Severity::classify("Compiled with 0 errors and 2 warnings"),
            Severity::Warn
        );
        assert_eq!(Severity::classify("no errors, 1 failed"), Severity::Error);
    }
}
