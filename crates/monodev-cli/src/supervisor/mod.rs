// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Launching and stopping the three targets.
//!
//! Backend and frontend run as child processes; the client bundle is served
//! by an in-process server. Both kinds sit behind [`ProcessHandle`] so the
//! shutdown path treats them the same way.
//!
//! All output reaches the caller as [`LogEvent`]s on one unbounded channel.
//! A target that exits on its own is not restarted; its exit status shows up
//! as a line in its pane.

pub mod bundler;
pub mod child;
pub mod livereload;
pub mod watcher;

use monodev::env::resolve_env;
use monodev::logs::LogEvent;
use monodev::{RunContext, Target, TargetSpec};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

pub use bundler::BundlerHandle;
pub use child::ChildHandle;

/// Sender half of the log event channel.
pub type LogSender = UnboundedSender<LogEvent>;

/// Errors raised while preparing or launching a target.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The workspace does not configure the target.
    #[error("Target {0} is not configured")]
    NotConfigured(Target),

    /// The target's working directory does not exist.
    #[error("Working directory of {target} not found: {}", dir.display())]
    MissingDirectory {
        /// Affected target.
        target: Target,
        /// Expected directory.
        dir: PathBuf,
    },

    /// Clearing output or writing the config file failed.
    #[error("Failed to prepare {target}: {source}")]
    Prepare {
        /// Affected target.
        target: Target,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The command could not be spawned.
    #[error("Failed to spawn {target} ({command}): {source}")]
    Spawn {
        /// Affected target.
        target: Target,
        /// Command line.
        command: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The in-process server could not bind its port.
    #[error("Failed to bind client bundle server on port {port}: {source}")]
    Bind {
        /// Requested port.
        port: u16,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The source watcher could not be installed.
    #[error("Failed to watch {}: {source}", dir.display())]
    Watch {
        /// Watched directory.
        dir: PathBuf,
        /// Underlying error.
        #[source]
        source: notify::Error,
    },
}

/// Result alias for supervisor operations.
pub type SupervisorResult<T> = Result<T, SupervisorError>;

/// A running target.
#[derive(Debug)]
pub enum ProcessHandle {
    /// Backend or frontend child process.
    Child(ChildHandle),
    /// Client bundle server and its watcher.
    InProcess(BundlerHandle),
}

impl ProcessHandle {
    /// Target this handle runs.
    pub fn target(&self) -> Target {
        match self {
            ProcessHandle::Child(child) => child.target(),
            ProcessHandle::InProcess(_) => Target::ClientBundle,
        }
    }

    /// Stops the target and waits until it is gone. Safe to call repeatedly.
    pub async fn stop(&mut self) {
        match self {
            ProcessHandle::Child(child) => child.stop().await,
            ProcessHandle::InProcess(server) => server.stop().await,
        }
    }

    /// Whether [`ProcessHandle::stop`] has completed.
    pub fn is_stopped(&self) -> bool {
        match self {
            ProcessHandle::Child(child) => child.is_stopped(),
            ProcessHandle::InProcess(server) => server.is_stopped(),
        }
    }
}

fn spec(ctx: &RunContext, target: Target) -> SupervisorResult<&TargetSpec> {
    let spec = ctx
        .target(target)
        .ok_or(SupervisorError::NotConfigured(target))?;
    if !spec.dir.is_dir() {
        return Err(SupervisorError::MissingDirectory {
            target,
            dir: spec.dir.clone(),
        });
    }
    Ok(spec)
}

/// Clears stale build output and regenerates the target's config file.
///
/// Returns the resolved environment the target must be started with.
pub fn prepare(ctx: &RunContext, target: Target) -> SupervisorResult<BTreeMap<String, String>> {
    let spec = spec(ctx, target)?;
    let env = resolve_env(ctx, target);
    let wrap = |source| SupervisorError::Prepare { target, source };

    if spec.output_dir.exists() {
        tracing::debug!("Clearing {}", spec.output_dir.display());
        fs::remove_dir_all(&spec.output_dir).map_err(wrap)?;
    }

    write_config_file(spec, &env).map_err(wrap)?;
    Ok(env)
}

/// Writes the resolved environment as pretty JSON to the target's config file.
pub fn write_config_file(
    spec: &TargetSpec,
    env: &BTreeMap<String, String>,
) -> std::io::Result<()> {
    if let Some(parent) = spec.config_file.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(env).map_err(std::io::Error::other)?;
    fs::write(&spec.config_file, json + "\n")
}

/// Starts the backend's long-running command.
pub async fn start_backend(ctx: &RunContext, events: LogSender) -> SupervisorResult<ProcessHandle> {
    start_child(ctx, Target::Backend, events)
}

/// Starts the frontend's dev server.
pub async fn start_frontend(ctx: &RunContext, events: LogSender) -> SupervisorResult<ProcessHandle> {
    start_child(ctx, Target::Frontend, events)
}

/// Starts the in-process client bundle server with live reload.
pub async fn start_client_bundle(
    ctx: &RunContext,
    events: LogSender,
) -> SupervisorResult<ProcessHandle> {
    let env = prepare(ctx, Target::ClientBundle)?;
    let spec = spec(ctx, Target::ClientBundle)?;
    let handle = bundler::start(spec, env, ctx.port(Target::ClientBundle), events).await?;
    Ok(ProcessHandle::InProcess(handle))
}

fn start_child(ctx: &RunContext, target: Target, events: LogSender) -> SupervisorResult<ProcessHandle> {
    let env = prepare(ctx, target)?;
    let spec = spec(ctx, target)?;
    let handle = child::spawn(target, &spec.command, &spec.dir, &env, events)?;
    Ok(ProcessHandle::Child(handle))
}

/// Starts one target.
pub async fn start(ctx: &RunContext, target: Target, events: LogSender) -> SupervisorResult<ProcessHandle> {
    match target {
        Target::Backend => start_backend(ctx, events).await,
        Target::Frontend => start_frontend(ctx, events).await,
        Target::ClientBundle => start_client_bundle(ctx, events).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use monodev::RunContext;
    use tempfile::tempdir;

    fn spec_in(root: &std::path::Path, target: Target) -> TargetSpec {
        let dir = root.join(target.as_str());
        TargetSpec {
            target,
            command: "true".to_string(),
            build_command: "true".to_string(),
            output_dir: dir.join("dist"),
            config_file: dir.join("src/env.json"),
            watch_dir: None,
            env: BTreeMap::new(),
            dir,
        }
    }

    #[test]
    fn test_prepare_clears_output_and_writes_config() {
        let root = tempdir().unwrap();
        let spec = spec_in(root.path(), Target::Backend);
        fs::create_dir_all(spec.output_dir.join("old")).unwrap();
        fs::write(spec.output_dir.join("old/main.js"), "stale").unwrap();

        let ctx = RunContext::builder(root.path(), "shop")
            .workspace_offset(1)
            .target(spec.clone())
            .build()
            .unwrap();

        let env = prepare(&ctx, Target::Backend).unwrap();
        assert!(!spec.output_dir.exists());
        assert_eq!(env["PORT"], "8081");

        let written: BTreeMap<String, String> =
            serde_json::from_str(&fs::read_to_string(&spec.config_file).unwrap()).unwrap();
        assert_eq!(written, env);
    }

    #[test]
    fn test_prepare_requires_directory() {
        let root = tempdir().unwrap();
        let ctx = RunContext::builder(root.path(), "shop")
            .target(spec_in(root.path(), Target::Frontend))
            .build()
            .unwrap();

        let err = prepare(&ctx, Target::Frontend).unwrap_err();
        assert!(matches!(err, SupervisorError::MissingDirectory { .. }));
        assert!(matches!(
            prepare(&ctx, Target::Backend).unwrap_err(),
            SupervisorError::NotConfigured(Target::Backend)
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stopping_exited_child_twice() {
        let root = tempdir().unwrap();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let child = child::spawn(Target::Backend, "true", root.path(), &BTreeMap::new(), tx).unwrap();
        let mut handle = ProcessHandle::Child(child);

        // The channel closes once the child has exited and its output is drained
        tokio::time::timeout(std::time::Duration::from_secs(10), async {
            while rx.recv().await.is_some() {}
        })
        .await
        .expect("child exits");

        assert!(!handle.is_stopped());
        handle.stop().await;
        assert!(handle.is_stopped());
        handle.stop().await;
        assert!(handle.is_stopped());
        assert_eq!(handle.target(), Target::Backend);
    }
}
