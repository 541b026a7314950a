// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Debounced source watching for the client bundle.

use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_full::{new_debouncer, DebounceEventResult, Debouncer, RecommendedCache};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Quiet period before a batch of changes is reported.
pub const DEBOUNCE: Duration = Duration::from_millis(750);

/// Directory names whose changes never trigger a rebuild.
const IGNORED_DIRS: &[&str] = &["node_modules", ".git", ".cache"];

/// Watches a source tree and reports batches of changed paths.
///
/// Dropping the watcher stops it.
pub struct SourceWatcher {
    _debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
}

impl std::fmt::Debug for SourceWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceWatcher").finish_non_exhaustive()
    }
}

impl SourceWatcher {
    /// Watches `dir` recursively. Paths below `ignore` (the build output)
    /// are filtered out; `on_change` receives paths relative to `dir`.
    pub fn new<F>(dir: &Path, ignore: PathBuf, on_change: F) -> notify::Result<Self>
    where
        F: Fn(Vec<PathBuf>) + Send + 'static,
    {
        let base = dir.to_path_buf();
        let mut debouncer = new_debouncer(DEBOUNCE, None, move |result: DebounceEventResult| {
            match result {
                Ok(events) => {
                    let mut changed: Vec<PathBuf> = events
                        .iter()
                        .flat_map(|e| e.paths.iter())
                        .filter(|p| is_relevant(p, &ignore))
                        .map(|p| p.strip_prefix(&base).unwrap_or(p).to_path_buf())
                        .collect();
                    changed.sort();
                    changed.dedup();
                    if !changed.is_empty() {
                        on_change(changed);
                    }
                }
                Err(errors) => {
                    for e in errors {
                        tracing::warn!("Watch error: {}", e);
                    }
                }
            }
        })?;

        debouncer.watch(dir, RecursiveMode::Recursive)?;
        tracing::debug!("Watching {}", dir.display());

        Ok(Self {
            _debouncer: debouncer,
        })
    }
}

/// Whether a change to `path` should trigger a rebuild.
pub fn is_relevant(path: &Path, ignore: &Path) -> bool {
    if path.starts_with(ignore) {
        return false;
    }
    !path.components().any(|c| {
        c.as_os_str()
            .to_str()
            .is_some_and(|name| IGNORED_DIRS.contains(&name))
    })
}
