// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! CLI command implementations.
//!
//! Parsed arguments become a [`CommandDescriptor`] that [`dispatch`]
//! interprets:
//!
//! - `start`: launch and supervise the targets of an application
//! - `build`: run target builds only
//! - `release-source`: run the release pipeline and source export
//! - `dbup` / `dbdown`: control the local database container

/// Target build command.
pub mod build;
/// Database container commands.
pub mod db;
/// Release pipeline command.
pub mod release;
/// Supervised development command.
pub mod start;

use anyhow::bail;
use monodev::{BackendHost, Target};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{Config, CONFIG_FILE};
use crate::progress::Verbosity;
use crate::release::ReleaseOptions;

/// Flags of `start`.
#[derive(Debug, Clone, Default)]
pub struct StartOptions {
    /// Open the frontend in the browser once it is launched.
    pub open: bool,
    /// Run the database schema sync before launching.
    pub sync: bool,
    /// Launch only these targets (all when empty).
    pub only: Vec<Target>,
    /// Start the database container for this run.
    pub db: bool,
    /// Backend the frontend targets talk to.
    pub backend_host: BackendHost,
}

/// What to do.
#[derive(Debug, Clone)]
pub enum Action {
    /// Supervise the targets.
    Start(StartOptions),
    /// Build the given targets (all when empty).
    Build(Vec<Target>),
    /// Build and package a release.
    ReleaseSource(ReleaseOptions),
    /// Start the database container.
    DbUp,
    /// Stop the database container.
    DbDown,
}

/// A fully parsed invocation.
#[derive(Debug, Clone)]
pub struct CommandDescriptor {
    /// Application directory name under `apps/`; absent for database commands.
    pub app: Option<String>,
    /// The action.
    pub action: Action,
}

/// Runs `command` against the workspace at `workspace_root`.
pub async fn dispatch(
    workspace_root: &Path,
    command: CommandDescriptor,
    verbosity: Verbosity,
) -> anyhow::Result<()> {
    let config = Config::load(workspace_root)?;
    tracing::debug!(?command, "Dispatching in {}", workspace_root.display());

    let app = command.app;
    match command.action {
        Action::DbUp => db::up(&config, verbosity).await,
        Action::DbDown => db::down(&config, verbosity).await,
        Action::Start(options) => {
            let app = require_app(&config, workspace_root, app)?;
            start::run(&config, workspace_root, &app, options, verbosity).await
        }
        Action::Build(targets) => {
            let app = require_app(&config, workspace_root, app)?;
            build::run(&config, workspace_root, &app, &targets, verbosity).await
        }
        Action::ReleaseSource(options) => {
            let app = require_app(&config, workspace_root, app)?;
            release::run(&config, workspace_root, &app, &options, verbosity).await
        }
    }
}

/// Finds the workspace root: the nearest ancestor with a `monodev.toml`,
/// else `start` itself.
pub fn find_workspace_root(start: &Path) -> PathBuf {
    start
        .ancestors()
        .find(|dir| dir.join(CONFIG_FILE).is_file())
        .unwrap_or(start)
        .to_path_buf()
}

/// Applications found under the apps directory.
pub fn list_apps(config: &Config, workspace_root: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(workspace_root.join(&config.workspace.apps_dir)) else {
        return Vec::new();
    };
    let mut apps: Vec<String> = entries
        .filter_map(Result::ok)
        .filter(|e| e.path().is_dir())
        .filter_map(|e| e.file_name().to_str().map(String::from))
        .collect();
    apps.sort();
    apps
}

fn require_app(config: &Config, workspace_root: &Path, app: Option<String>) -> anyhow::Result<String> {
    let Some(app) = app else {
        bail!("An application name is required");
    };
    check_app(config, workspace_root, &app)?;
    Ok(app)
}

/// Fails when no target directory of `app` exists.
fn check_app(config: &Config, workspace_root: &Path, app: &str) -> anyhow::Result<()> {
    let any_target = Target::ALL.iter().any(|&target| {
        config
            .target_spec(target, workspace_root, app)
            .dir
            .is_dir()
    });
    if any_target {
        return Ok(());
    }

    let apps = list_apps(config, workspace_root);
    if apps.is_empty() {
        bail!(
            "Unknown application '{}': no target directories found under {}",
            app,
            workspace_root.display()
        );
    }
    bail!(
        "Unknown application '{}'. Available: {}",
        app,
        apps.join(", ")
    )
}
