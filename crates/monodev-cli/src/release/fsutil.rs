// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Directory copying and cleanup for release assembly.

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Attempts made by [`remove_dir_with_retry`].
pub const REMOVE_ATTEMPTS: u32 = 3;

const REMOVE_BACKOFF_MS: u64 = 100;

/// Removes `path` recursively, retrying transient failures.
///
/// Editors and file indexers briefly hold files open on some platforms.
/// After the last attempt the failure is logged and swallowed; the caller
/// recreates the directory and any leftovers get overwritten.
pub fn remove_dir_with_retry(path: &Path) {
    for attempt in 1..=REMOVE_ATTEMPTS {
        match fs::remove_dir_all(path) {
            Ok(()) => return,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return,
            Err(e) if attempt < REMOVE_ATTEMPTS => {
                tracing::debug!(
                    "Removing {} failed ({}), retrying ({}/{})",
                    path.display(),
                    e,
                    attempt,
                    REMOVE_ATTEMPTS
                );
                std::thread::sleep(Duration::from_millis(REMOVE_BACKOFF_MS * attempt as u64));
            }
            Err(e) => {
                tracing::warn!("Could not remove {}: {}", path.display(), e);
            }
        }
    }
}

/// Removes `path` (with retries) and creates it empty.
pub fn reset_dir(path: &Path) -> io::Result<()> {
    remove_dir_with_retry(path);
    fs::create_dir_all(path)
}

/// Glob patterns excluded from a copy.
///
/// A pattern ending in `/**` also prunes the directory itself so its
/// contents are never walked.
#[derive(Debug, Clone)]
pub struct Excludes {
    files: GlobSet,
    dirs: GlobSet,
}

impl Excludes {
    /// Compiles `patterns`.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, globset::Error> {
        let mut files = GlobSetBuilder::new();
        let mut dirs = GlobSetBuilder::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            files.add(Glob::new(pattern)?);
            if let Some(dir) = pattern.strip_suffix("/**") {
                dirs.add(Glob::new(dir)?);
            }
        }
        Ok(Self {
            files: files.build()?,
            dirs: dirs.build()?,
        })
    }

    /// Excludes nothing.
    pub fn none() -> Self {
        Self {
            files: GlobSet::empty(),
            dirs: GlobSet::empty(),
        }
    }

    /// Whether the relative file path is excluded.
    pub fn file(&self, rel: &Path) -> bool {
        self.files.is_match(rel)
    }

    /// Whether the relative directory path is excluded.
    pub fn dir(&self, rel: &Path) -> bool {
        self.dirs.is_match(rel)
    }
}

/// Files below `root` as sorted relative paths, skipping `excludes`.
pub fn walk_sorted(root: &Path, excludes: &Excludes) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    walk_into(root, Path::new(""), excludes, &mut files)?;
    Ok(files)
}

fn walk_into(root: &Path, rel: &Path, excludes: &Excludes, files: &mut Vec<PathBuf>) -> io::Result<()> {
    let mut entries: Vec<_> = fs::read_dir(root.join(rel))?.collect::<Result<_, _>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let child = rel.join(entry.file_name());
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            if !excludes.dir(&child) {
                walk_into(root, &child, excludes, files)?;
            }
        } else if !excludes.file(&child) {
            files.push(child);
        }
    }
    Ok(())
}

/// Copies the tree at `src` into `dst`. Returns the number of files copied.
pub fn copy_dir(src: &Path, dst: &Path, excludes: &Excludes) -> io::Result<usize> {
    let files = walk_sorted(src, excludes)?;
    fs::create_dir_all(dst)?;
    for rel in &files {
        let target = dst.join(rel);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(src.join(rel), &target)?;
    }
    Ok(files.len())
}

/// `/`-separated form of a relative path, as stored in archives.
pub fn archive_path(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
