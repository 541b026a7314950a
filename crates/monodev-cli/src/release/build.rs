// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! One-shot target builds with freshness stamps.
//!
//! A stamp records a fingerprint of the build command and environment. A
//! target is fresh when its output exists, the fingerprint matches and no
//! source file is newer than the stamp.

use monodev::{Target, TargetSpec};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::SystemTime;

use super::{ReleaseError, ReleaseResult};
use crate::supervisor::child::shell_command;

/// Directories never considered sources.
const NON_SOURCE_DIRS: &[&str] = &["node_modules", ".git", ".cache", ".monodev"];

/// Lines of failing build output kept in the error.
const ERROR_TAIL_LINES: usize = 20;

/// Outcome of [`build_target`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    /// The build command ran and succeeded.
    Built,
    /// The previous output was still fresh.
    Fresh,
}

/// Location of build stamps for one application.
pub fn stamp_path(workspace_root: &Path, app: &str, target: Target) -> PathBuf {
    workspace_root
        .join(".monodev")
        .join("stamps")
        .join(app)
        .join(format!("{}.stamp", target.as_str()))
}

/// Fingerprint of everything besides sources that affects a build.
pub fn fingerprint(spec: &TargetSpec, env: &BTreeMap<String, String>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(spec.build_command.as_bytes());
    hasher.update([0]);
    for (key, value) in env {
        hasher.update(key.as_bytes());
        hasher.update(b"=");
        hasher.update(value.as_bytes());
        hasher.update([0]);
    }
    format!("{:x}", hasher.finalize())
}

/// Newest modification time of any source file below `dir`.
pub fn newest_source(dir: &Path, output_dir: &Path, config_file: &Path) -> io::Result<Option<SystemTime>> {
    let mut newest = None;
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        for entry in fs::read_dir(&current)? {
            let entry = entry?;
            let path = entry.path();
            if path == output_dir || path == config_file {
                continue;
            }
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                let skipped = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| NON_SOURCE_DIRS.contains(&n));
                if !skipped {
                    stack.push(path);
                }
            } else {
                let modified = entry.metadata()?.modified()?;
                if newest.map_or(true, |n| modified > n) {
                    newest = Some(modified);
                }
            }
        }
    }
    Ok(newest)
}

/// Whether the last build of `spec` is still valid.
pub fn is_fresh(spec: &TargetSpec, stamp: &Path, fingerprint: &str) -> io::Result<bool> {
    if !spec.output_dir.is_dir() || !stamp.is_file() {
        return Ok(false);
    }
    if fs::read_to_string(stamp)?.trim() != fingerprint {
        return Ok(false);
    }
    let stamped = fs::metadata(stamp)?.modified()?;
    let newest = newest_source(&spec.dir, &spec.output_dir, &spec.config_file)?;
    Ok(newest.map_or(true, |n| n <= stamped))
}

/// Runs the build command of `spec` unless its output is fresh.
///
/// With `force` the freshness check is skipped.
pub async fn build_target(
    spec: &TargetSpec,
    env: &BTreeMap<String, String>,
    stamp: &Path,
    force: bool,
    verbose: bool,
) -> ReleaseResult<BuildOutcome> {
    let target = spec.target;
    if !spec.dir.is_dir() {
        return Err(ReleaseError::MissingTargetDir {
            target,
            dir: spec.dir.clone(),
        });
    }

    let print = fingerprint(spec, env);
    if !force && is_fresh(spec, stamp, &print)? {
        tracing::info!("{} is up to date, skipping build", target);
        return Ok(BuildOutcome::Fresh);
    }

    crate::supervisor::write_config_file(spec, env)?;

    tracing::info!("Building {}: {}", target, spec.build_command);
    let output = shell_command(&spec.build_command)
        .current_dir(&spec.dir)
        .envs(env)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|source| ReleaseError::Spawn {
            target,
            command: spec.build_command.clone(),
            source,
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    if verbose {
        for line in stdout.lines().chain(stderr.lines()) {
            println!("  {} {}", console::style(target.as_str()).cyan(), line);
        }
    }

    if !output.status.success() {
        let combined: Vec<&str> = stdout.lines().chain(stderr.lines()).collect();
        let tail = combined[combined.len().saturating_sub(ERROR_TAIL_LINES)..].join("\n");
        return Err(ReleaseError::Build {
            target,
            status: output.status.to_string(),
            output: tail,
        });
    }

    if !spec.output_dir.is_dir() {
        return Err(ReleaseError::MissingOutput {
            target,
            dir: spec.output_dir.clone(),
        });
    }

    if let Some(parent) = stamp.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(stamp, &print)?;
    Ok(BuildOutcome::Built)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn spec(dir: &Path, build: &str) -> TargetSpec {
        TargetSpec {
            target: Target::Backend,
            command: String::new(),
            build_command: build.to_string(),
            output_dir: dir.join("dist"),
            config_file: dir.join("env.json"),
            watch_dir: None,
            env: BTreeMap::new(),
            dir: dir.to_path_buf(),
        }
    }

    #[tokio::test]
    async fn test_second_build_is_fresh_until_forced() {
        let root = tempdir().unwrap();
        let dir = root.path().join("server");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("main.ts"), "export {}").unwrap();
        let spec = spec(&dir, "mkdir -p dist && echo built >> dist/log.txt");
        let stamp = stamp_path(root.path(), "shop", Target::Backend);
        let env = BTreeMap::new();

        assert_eq!(
            build_target(&spec, &env, &stamp, false, false).await.unwrap(),
            BuildOutcome::Built
        );
        assert_eq!(
            build_target(&spec, &env, &stamp, false, false).await.unwrap(),
            BuildOutcome::Fresh
        );
        assert_eq!(
            build_target(&spec, &env, &stamp, true, false).await.unwrap(),
            BuildOutcome::Built
        );
        let log = fs::read_to_string(dir.join("dist/log.txt")).unwrap();
        assert_eq!(log.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_env_change_invalidates_stamp() {
        let root = tempdir().unwrap();
        let dir = root.path().join("server");
        fs::create_dir_all(&dir).unwrap();
        let spec = spec(&dir, "mkdir -p dist");
        let stamp = stamp_path(root.path(), "shop", Target::Backend);

        let mut env = BTreeMap::new();
        build_target(&spec, &env, &stamp, false, false).await.unwrap();
        env.insert("BACKEND_HOST".to_string(), "main".to_string());
        assert_eq!(
            build_target(&spec, &env, &stamp, false, false).await.unwrap(),
            BuildOutcome::Built
        );
    }

    #[tokio::test]
    async fn test_failing_build_reports_output_tail() {
        let root = tempdir().unwrap();
        let dir = root.path().join("server");
        fs::create_dir_all(&dir).unwrap();
        let spec = spec(&dir, "echo 'error TS2304: cannot find name' >&2; exit 2");
        let stamp = stamp_path(root.path(), "shop", Target::Backend);

        let err = build_target(&spec, &BTreeMap::new(), &stamp, false, false)
            .await
            .unwrap_err();
        match err {
            ReleaseError::Build { target, output, .. } => {
                assert_eq!(target, Target::Backend);
                assert!(output.contains("TS2304"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(!stamp.exists());
    }
}
