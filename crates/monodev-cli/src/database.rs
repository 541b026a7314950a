// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Local database container control through the `docker` CLI.
//!
//! There is one container per workspace instance; its name and host port
//! both carry the workspace offset.

use monodev::env::effective_port;
use std::collections::BTreeMap;
use thiserror::Error;
use tokio::process::Command;

use crate::config::DatabaseConfig;

const DOCKER: &str = "docker";

/// Errors from container operations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// The daemon did not answer `docker info`.
    #[error("Container daemon unreachable: {0}\n  Start Docker (or Docker Desktop) and run the command again")]
    DaemonUnreachable(String),

    /// A docker command exited with an error.
    #[error("`docker {command}` failed: {stderr}")]
    Command {
        /// Subcommand that failed.
        command: String,
        /// Trimmed stderr of the command.
        stderr: String,
    },

    /// The configured port does not fit once the offset is applied.
    #[error(transparent)]
    Port(#[from] monodev::Error),

    /// The docker binary could not be executed.
    #[error("Failed to run docker: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for container operations.
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// The database container of one workspace instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Database {
    name: String,
    image: String,
    host_port: u16,
    container_port: u16,
    env: BTreeMap<String, String>,
}

impl Database {
    /// Resolves the container for the workspace with `offset`.
    pub fn new(config: &DatabaseConfig, offset: u16) -> DatabaseResult<Self> {
        Ok(Self {
            name: config.container_name(offset),
            image: config.image.clone(),
            host_port: effective_port(config.port, offset)?,
            container_port: config.container_port,
            env: config.env.clone(),
        })
    }

    /// Container name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Host port the database is published on.
    pub fn host_port(&self) -> u16 {
        self.host_port
    }

    /// Arguments of the `docker run` invocation.
    pub fn run_args(&self) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "-d".to_string(),
            "--name".to_string(),
            self.name.clone(),
            "-p".to_string(),
            format!("{}:{}", self.host_port, self.container_port),
        ];
        for (key, value) in &self.env {
            args.push("-e".to_string());
            args.push(format!("{}={}", key, value));
        }
        args.push(self.image.clone());
        args
    }

    /// Starts the container unless it already runs.
    ///
    /// Returns true when this call started it; only then should the caller
    /// stop it again on shutdown.
    pub async fn up(&self) -> DatabaseResult<bool> {
        ensure_daemon().await?;

        if self.is_running().await? {
            tracing::info!("Database container {} already running", self.name);
            return Ok(false);
        }

        // A stopped container with the same name blocks `run`
        let _ = docker(&["rm", "-f", &self.name]).await;

        let args = self.run_args();
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        docker(&args).await?;
        tracing::info!(
            "Started database container {} on port {}",
            self.name,
            self.host_port
        );
        Ok(true)
    }

    /// Stops and removes the container. A missing container is not an error.
    pub async fn down(&self) -> DatabaseResult<()> {
        ensure_daemon().await?;
        for command in [["stop", self.name.as_str()], ["rm", self.name.as_str()]] {
            match docker(&command).await {
                Ok(_) => {}
                Err(DatabaseError::Command { stderr, .. }) if is_missing(&stderr) => {
                    tracing::debug!("Container {} not present", self.name);
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Whether a container with this name is running.
    pub async fn is_running(&self) -> DatabaseResult<bool> {
        let filter = format!("name=^{}$", self.name);
        let out = docker(&["ps", "-q", "--filter", &filter]).await?;
        Ok(!out.trim().is_empty())
    }
}

fn is_missing(stderr: &str) -> bool {
    stderr.to_lowercase().contains("no such container")
}

/// Fails with a remediation message when the daemon is not reachable.
pub async fn ensure_daemon() -> DatabaseResult<()> {
    let output = Command::new(DOCKER)
        .args(["info", "--format", "{{.ServerVersion}}"])
        .output()
        .await;

    match output {
        Ok(output) if output.status.success() => Ok(()),
        Ok(output) => Err(DatabaseError::DaemonUnreachable(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        )),
        Err(e) => Err(DatabaseError::DaemonUnreachable(format!(
            "`{}` could not be executed ({})",
            DOCKER, e
        ))),
    }
}

async fn docker(args: &[&str]) -> DatabaseResult<String> {
    tracing::debug!("docker {}", args.join(" "));
    let output = Command::new(DOCKER).args(args).output().await?;
    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        Err(DatabaseError::Command {
            command: args.first().copied().unwrap_or_default().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}
