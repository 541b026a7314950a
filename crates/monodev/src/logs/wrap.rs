// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Display-width handling: escape stripping and row re-flow.

use lazy_static::lazy_static;
use regex::Regex;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use super::entry::{LogEntry, Severity};

lazy_static! {
    // CSI sequences, OSC sequences (BEL or ST terminated) and two-byte escapes
    static ref ANSI_ESCAPE: Regex =
        Regex::new(r"\x1b\[[0-?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)|\x1b[@-Z\\-_]")
            .expect("valid escape pattern");
}

const TAB: &str = "    ";

/// One terminal row of a rendered log pane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayRow {
    /// Severity of the entry the row was cut from.
    pub severity: Severity,
    /// Plain row text, at most the viewport width wide.
    pub text: String,
}

/// Removes terminal escape sequences.
pub fn strip_ansi(text: &str) -> String {
    ANSI_ESCAPE.replace_all(text, "").into_owned()
}

/// Width of `text` in terminal columns once escapes are removed.
pub fn display_width(text: &str) -> usize {
    strip_ansi(text).replace('\t', TAB).width()
}

/// Splits an entry into rows no wider than `width` columns.
///
/// Rows are filled to exactly `width` columns except the last one (and rows
/// that stop early because a double-width character would not fit). Every
/// row carries the entry's severity. A zero width is treated as one column.
pub fn wrap_entry(entry: &LogEntry, width: usize) -> Vec<DisplayRow> {
    let width = width.max(1);
    let plain = strip_ansi(&entry.text).replace('\t', TAB);

    if plain.width() <= width {
        return vec![DisplayRow {
            severity: entry.severity,
            text: plain,
        }];
    }

    let mut rows = Vec::new();
    let mut current = String::new();
    let mut current_width = 0;

    for ch in plain.chars() {
        let w = ch.width().unwrap_or(0);
        if current_width + w > width && !current.is_empty() {
            rows.push(DisplayRow {
                severity: entry.severity,
                text: std::mem::take(&mut current),
            });
            current_width = 0;
        }
        current.push(ch);
        current_width += w;
    }
    if !current.is_empty() {
        rows.push(DisplayRow {
            severity: entry.severity,
            text: current,
        });
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::Target;

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi("\x1b[1;31merror\x1b[0m: x"), "error: x");
        assert_eq!(strip_ansi("\x1b]8;;http://a\x07link\x1b]8;;\x07"), "link");
        assert_eq!(display_width("\x1b[32m✓\x1b[0m ok"), 4);
    }

    #[test]
    fn test_wrap_exact_rows() {
        let entry = LogEntry::new(Target::Frontend, Severity::Warn, "abcdefghij");
        let rows = wrap_entry(&entry, 4);
        let texts: Vec<_> = rows.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["abcd", "efgh", "ij"]);
        assert!(rows.iter().all(|r| r.severity == Severity::Warn));
    }

    #[test]
    fn test_escapes_do_not_count_toward_width() {
        let entry = LogEntry::new(Target::Backend, Severity::Info, "\x1b[2mabcd\x1b[0m");
        let rows = wrap_entry(&entry, 4);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].text, "abcd");
    }

    #[test]
    fn test_wide_characters() {
        let entry = LogEntry::new(Target::Backend, Severity::Info, "日本語");
        let rows = wrap_entry(&entry, 3);
        let texts: Vec<_> = rows.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["日", "本", "語"]);
    }
}
