// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Spinner per step with a final ✓/✗ line.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::{Duration, Instant};

/// Output flags shared by every command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Verbosity {
    /// Show child output and extra detail.
    pub verbose: bool,
    /// Only show errors.
    pub quiet: bool,
}

/// One running step.
pub struct Step {
    label: String,
    bar: Option<ProgressBar>,
    start: Instant,
}

impl Step {
    /// Starts a spinner labelled `label` (no spinner in quiet mode).
    pub fn start(label: impl Into<String>, verbosity: Verbosity) -> Self {
        let label = label.into();
        let bar = (!verbosity.quiet).then(|| {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("  {spinner:.cyan} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            pb.set_message(label.clone());
            pb.enable_steady_tick(Duration::from_millis(80));
            pb
        });
        Self {
            label,
            bar,
            start: Instant::now(),
        }
    }

    /// Updates the spinner message.
    pub fn message(&self, msg: impl Into<String>) {
        if let Some(bar) = &self.bar {
            bar.set_message(format!("{} {}", self.label, style(msg.into()).dim()));
        }
    }

    /// Finishes with a ✓ line and the elapsed time.
    pub fn ok(self) {
        self.ok_with(String::new());
    }

    /// Finishes with a ✓ line, `detail` and the elapsed time.
    pub fn ok_with(self, detail: impl Into<String>) {
        let detail = detail.into();
        let elapsed = format!("{}ms", self.start.elapsed().as_millis());
        if let Some(bar) = self.bar {
            bar.finish_and_clear();
            println!(
                "  {} {} {} {}",
                style("✓").green(),
                self.label,
                style(detail).dim(),
                style(elapsed).dim()
            );
        }
    }

    /// Finishes with a ✗ line. Printed in quiet mode too.
    pub fn fail(self, err: &dyn std::fmt::Display) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
        eprintln!(
            "  {} {} {}",
            style("✗").red(),
            self.label,
            style(err.to_string()).red()
        );
    }

    /// Finishes a skipped step.
    pub fn skip(self, reason: &str) {
        if let Some(bar) = self.bar {
            bar.finish_and_clear();
            println!(
                "  {} {} {}",
                style("-").dim(),
                self.label,
                style(reason).dim()
            );
        }
    }
}

/// Runs `f` as a step, printing ✓ or ✗.
pub async fn step<T, E, F>(label: &str, verbosity: Verbosity, f: F) -> Result<T, E>
where
    F: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let step = Step::start(label, verbosity);
    match f.await {
        Ok(value) => {
            step.ok();
            Ok(value)
        }
        Err(e) => {
            step.fail(&e);
            Err(e)
        }
    }
}
