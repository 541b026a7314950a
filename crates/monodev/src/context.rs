// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! The resolved, read-only environment of one CLI invocation.
//!
//! A [`RunContext`] is created once per command through [`RunContextBuilder`]
//! and then handed by reference to every component. Nothing about the
//! workspace is kept in process-wide state.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::env::{effective_port, load_dotenv};
use crate::error::{Error, Result};
use crate::target::{Target, TargetSpec};

/// Whether the targets run against local services or a release build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperationMode {
    /// Local development.
    #[default]
    Local,
    /// Release build.
    Release,
}

impl OperationMode {
    /// Returns the string identifier exported to the targets.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationMode::Local => "local",
            OperationMode::Release => "release",
        }
    }
}

/// Which backend the frontend and client bundle talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendHost {
    /// The backend started by this workspace.
    #[default]
    Local,
    /// Shared debug deployment.
    Debug,
    /// Shared develop deployment.
    Develop,
    /// Production deployment.
    Main,
}

impl BackendHost {
    /// Returns the string identifier for this host.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendHost::Local => "local",
            BackendHost::Debug => "debug",
            BackendHost::Develop => "develop",
            BackendHost::Main => "main",
        }
    }
}

impl std::str::FromStr for BackendHost {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(BackendHost::Local),
            "debug" => Ok(BackendHost::Debug),
            "develop" | "dev" => Ok(BackendHost::Develop),
            "main" | "prod" | "production" => Ok(BackendHost::Main),
            _ => Err(Error::UnknownBackendHost(s.to_string())),
        }
    }
}

/// Resolved environment for one invocation.
#[derive(Debug, Clone)]
pub struct RunContext {
    workspace_root: PathBuf,
    app: String,
    workspace_offset: u16,
    mode: OperationMode,
    backend_host: BackendHost,
    backend_url: String,
    ports: [u16; 3],
    database_port: Option<u16>,
    dotenv: BTreeMap<String, String>,
    targets: BTreeMap<Target, TargetSpec>,
}

impl RunContext {
    /// Starts building a context for `app` inside `workspace_root`.
    pub fn builder(workspace_root: impl Into<PathBuf>, app: impl Into<String>) -> RunContextBuilder {
        RunContextBuilder {
            workspace_root: workspace_root.into(),
            app: app.into(),
            workspace_offset: 0,
            mode: OperationMode::default(),
            backend_host: BackendHost::default(),
            backend_hosts: BTreeMap::new(),
            database_base_port: None,
            dotenv_path: None,
            targets: BTreeMap::new(),
        }
    }

    /// Workspace root directory.
    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// Application name (directory under `apps/`).
    pub fn app(&self) -> &str {
        &self.app
    }

    /// Port shift of this workspace instance.
    pub fn workspace_offset(&self) -> u16 {
        self.workspace_offset
    }

    /// Operation mode.
    pub fn mode(&self) -> OperationMode {
        self.mode
    }

    /// Backend host selection.
    pub fn backend_host(&self) -> BackendHost {
        self.backend_host
    }

    /// URL the frontend targets use to reach the backend.
    pub fn backend_url(&self) -> &str {
        &self.backend_url
    }

    /// Effective port of `target`.
    pub fn port(&self, target: Target) -> u16 {
        self.ports[target.index()]
    }

    /// Effective port of the local database container, if one is configured.
    pub fn database_port(&self) -> Option<u16> {
        self.database_port
    }

    /// Overrides parsed from the workspace `.env` file.
    pub fn dotenv(&self) -> &BTreeMap<String, String> {
        &self.dotenv
    }

    /// Spec of `target`, if the workspace configures it.
    pub fn target(&self, target: Target) -> Option<&TargetSpec> {
        self.targets.get(&target)
    }

    /// All configured target specs in launch order.
    pub fn targets(&self) -> impl Iterator<Item = &TargetSpec> {
        self.targets.values()
    }
}

/// Builder for [`RunContext`].
#[derive(Debug)]
pub struct RunContextBuilder {
    workspace_root: PathBuf,
    app: String,
    workspace_offset: u16,
    mode: OperationMode,
    backend_host: BackendHost,
    backend_hosts: BTreeMap<String, String>,
    database_base_port: Option<u16>,
    dotenv_path: Option<PathBuf>,
    targets: BTreeMap<Target, TargetSpec>,
}

impl RunContextBuilder {
    /// Sets the workspace offset.
    pub fn workspace_offset(mut self, offset: u16) -> Self {
        self.workspace_offset = offset;
        self
    }

    /// Sets the operation mode.
    pub fn mode(mut self, mode: OperationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the backend host selection.
    pub fn backend_host(mut self, host: BackendHost) -> Self {
        self.backend_host = host;
        self
    }

    /// Sets the URLs of the remote backend hosts, keyed by host name.
    pub fn backend_hosts(mut self, hosts: BTreeMap<String, String>) -> Self {
        self.backend_hosts = hosts;
        self
    }

    /// Enables the local database and sets its canonical port.
    pub fn database_port(mut self, base: Option<u16>) -> Self {
        self.database_base_port = base;
        self
    }

    /// Overrides the `.env` location (defaults to `<workspace_root>/.env`).
    pub fn dotenv_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.dotenv_path = Some(path.into());
        self
    }

    /// Registers a target spec.
    pub fn target(mut self, spec: TargetSpec) -> Self {
        self.targets.insert(spec.target, spec);
        self
    }

    /// Resolves ports, the backend URL and the `.env` overrides.
    pub fn build(self) -> Result<RunContext> {
        let offset = self.workspace_offset;
        let mut ports = [0u16; 3];
        for target in Target::ALL {
            ports[target.index()] = effective_port(target.base_port(), offset)?;
        }

        let database_port = self
            .database_base_port
            .map(|base| effective_port(base, offset))
            .transpose()?;

        let backend_url = match self.backend_host {
            BackendHost::Local => {
                format!("http://localhost:{}", ports[Target::Backend.index()])
            }
            host => self
                .backend_hosts
                .get(host.as_str())
                .cloned()
                .ok_or_else(|| Error::MissingBackendHost(host.as_str().to_string()))?,
        };

        let dotenv_path = self
            .dotenv_path
            .unwrap_or_else(|| self.workspace_root.join(".env"));
        let dotenv = load_dotenv(&dotenv_path)?;

        Ok(RunContext {
            workspace_root: self.workspace_root,
            app: self.app,
            workspace_offset: offset,
            mode: self.mode,
            backend_host: self.backend_host,
            backend_url,
            ports,
            database_port,
            dotenv,
            targets: self.targets,
        })
    }
}
