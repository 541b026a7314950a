// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Workspace configuration.
//!
//! Configuration is loaded from `monodev.toml` at the workspace root. Every
//! section is optional; a missing file means all defaults.
//!
//! # Example Configuration
//!
//! ```toml
//! [workspace]
//! offset = 2
//!
//! [targets.backend]
//! dir = "{apps}/{app}/server"
//! command = "npm run watch"
//! env = { LOG_FORMAT = "pretty" }
//!
//! [targets.clientBundle]
//! build = "npx vite build"
//! watch = "src"
//!
//! [backend_hosts]
//! develop = "https://develop.example.com"
//!
//! [logs]
//! max_lines = 2000
//!
//! [database]
//! image = "postgres:16-alpine"
//! sync_command = "npx prisma db push"
//!
//! [export]
//! libraries = ["libs/ui", "libs/shared/utils"]
//! ```

use anyhow::Context;
use monodev::{BackendHost, OperationMode, RunContext, Target, TargetSpec};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the configuration file at the workspace root.
pub const CONFIG_FILE: &str = "monodev.toml";

/// Main configuration structure loaded from `monodev.toml`.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Workspace instance settings.
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    /// Per-target commands and paths.
    #[serde(default)]
    pub targets: TargetsConfig,
    /// URLs of the remote backends, keyed by `debug`, `develop` or `main`.
    #[serde(default)]
    pub backend_hosts: BTreeMap<String, String>,
    /// Log view settings.
    #[serde(default)]
    pub logs: LogsConfig,
    /// Local database container.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Release pipeline settings.
    #[serde(default)]
    pub release: ReleaseConfig,
    /// Source export settings.
    #[serde(default)]
    pub export: ExportConfig,
}

/// `[workspace]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkspaceConfig {
    /// Port shift of this workspace instance (default: 0).
    #[serde(default)]
    pub offset: u16,
    /// Directory holding the applications (default: "apps").
    #[serde(default = "default_apps_dir")]
    pub apps_dir: String,
}

fn default_apps_dir() -> String {
    "apps".to_string()
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            offset: 0,
            apps_dir: default_apps_dir(),
        }
    }
}

/// `[targets]` section with one table per target.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TargetsConfig {
    /// `[targets.backend]`.
    #[serde(default)]
    pub backend: TargetConfig,
    /// `[targets.frontend]`.
    #[serde(default)]
    pub frontend: TargetConfig,
    /// `[targets.clientBundle]`.
    #[serde(default, rename = "clientBundle", alias = "client_bundle")]
    pub client_bundle: TargetConfig,
}

impl TargetsConfig {
    /// Table of `target`.
    pub fn get(&self, target: Target) -> &TargetConfig {
        match target {
            Target::Backend => &self.backend,
            Target::Frontend => &self.frontend,
            Target::ClientBundle => &self.client_bundle,
        }
    }
}

/// One `[targets.*]` table. Unset keys fall back to per-target defaults.
///
/// `dir` is relative to the workspace root and may contain `{apps}` (the
/// `workspace.apps_dir` setting) and `{app}`; the other paths are relative
/// to `dir`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TargetConfig {
    /// Working directory.
    pub dir: Option<String>,
    /// Long-running command for `start`.
    pub command: Option<String>,
    /// One-shot build command.
    pub build: Option<String>,
    /// Build output directory.
    pub output: Option<String>,
    /// Generated config file.
    pub config_file: Option<String>,
    /// Sources watched by the in-process server (client bundle only).
    pub watch: Option<String>,
    /// Environment overrides.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

struct TargetDefaults {
    dir: &'static str,
    command: &'static str,
    build: &'static str,
    output: &'static str,
    config_file: &'static str,
    watch: Option<&'static str>,
}

fn target_defaults(target: Target) -> TargetDefaults {
    match target {
        Target::Backend => TargetDefaults {
            dir: "{apps}/{app}/server",
            command: "npm run watch",
            build: "npm run build",
            output: "dist",
            config_file: "monodev.env.json",
            watch: None,
        },
        Target::Frontend => TargetDefaults {
            dir: "{apps}/{app}/web",
            command: "npm run dev -- --port $PORT",
            build: "npm run build",
            output: "dist",
            config_file: "src/monodev.env.json",
            watch: None,
        },
        Target::ClientBundle => TargetDefaults {
            dir: "{apps}/{app}/client",
            command: "",
            build: "npm run build",
            output: "dist",
            config_file: "src/monodev.env.json",
            watch: Some("src"),
        },
    }
}

impl TargetConfig {
    /// Resolves this table into an absolute [`TargetSpec`].
    pub fn resolve(
        &self,
        target: Target,
        workspace_root: &Path,
        apps_dir: &str,
        app: &str,
    ) -> TargetSpec {
        let defaults = target_defaults(target);
        let dir_template = self.dir.as_deref().unwrap_or(defaults.dir);
        let dir = workspace_root.join(
            dir_template
                .replace("{apps}", apps_dir)
                .replace("{app}", app),
        );

        TargetSpec {
            target,
            command: self
                .command
                .clone()
                .unwrap_or_else(|| defaults.command.to_string()),
            build_command: self
                .build
                .clone()
                .unwrap_or_else(|| defaults.build.to_string()),
            output_dir: dir.join(self.output.as_deref().unwrap_or(defaults.output)),
            config_file: dir.join(self.config_file.as_deref().unwrap_or(defaults.config_file)),
            watch_dir: self
                .watch
                .as_deref()
                .or(defaults.watch)
                .map(|w| dir.join(w)),
            env: self.env.clone(),
            dir,
        }
    }
}

/// `[logs]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct LogsConfig {
    /// Entries kept per target (default: 1000).
    #[serde(default = "default_max_lines")]
    pub max_lines: usize,
}

fn default_max_lines() -> usize {
    1000
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            max_lines: default_max_lines(),
        }
    }
}

/// `[database]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Start the container with every `start` (default: false; `--db` forces it).
    #[serde(default)]
    pub enabled: bool,
    /// Container image (default: "postgres:16-alpine").
    #[serde(default = "default_db_image")]
    pub image: String,
    /// Container name prefix; the workspace offset is appended.
    #[serde(default = "default_db_name")]
    pub name: String,
    /// Canonical host port before the offset (default: 5432).
    #[serde(default = "default_db_port")]
    pub port: u16,
    /// Port the database listens on inside the container (default: 5432).
    #[serde(default = "default_db_port")]
    pub container_port: u16,
    /// Environment passed to the container.
    #[serde(default = "default_db_env")]
    pub env: BTreeMap<String, String>,
    /// Schema sync command run in the backend directory for `start --sync`.
    #[serde(default)]
    pub sync_command: Option<String>,
}

fn default_db_image() -> String {
    "postgres:16-alpine".to_string()
}

fn default_db_name() -> String {
    "monodev-db".to_string()
}

fn default_db_port() -> u16 {
    5432
}

fn default_db_env() -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();
    env.insert("POSTGRES_PASSWORD".to_string(), "postgres".to_string());
    env
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            image: default_db_image(),
            name: default_db_name(),
            port: default_db_port(),
            container_port: default_db_port(),
            env: default_db_env(),
            sync_command: None,
        }
    }
}

impl DatabaseConfig {
    /// Container name of the workspace instance with `offset`.
    pub fn container_name(&self, offset: u16) -> String {
        format!("{}-{}", self.name, offset)
    }
}

/// `[release]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReleaseConfig {
    /// Platform version; falls back to the root `package.json` version.
    pub platform_version: Option<String>,
    /// Build number used when `--build-num` is not given (default: 1).
    #[serde(default)]
    pub build_number: Option<u32>,
}

/// `[export]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ExportConfig {
    /// Library directories copied next to the application.
    #[serde(default)]
    pub libraries: Vec<String>,
    /// Glob patterns skipped while copying.
    #[serde(default = "default_excludes")]
    pub exclude: Vec<String>,
}

fn default_excludes() -> Vec<String> {
    [
        "**/node_modules/**",
        "**/dist/**",
        "**/android/**",
        "**/ios/**",
        "**/.cache/**",
        "**/*.tsbuildinfo",
        "**/monodev.env.json",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            libraries: Vec::new(),
            exclude: default_excludes(),
        }
    }
}

impl Config {
    /// Loads `monodev.toml` from `workspace_root`.
    ///
    /// If no configuration file exists, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be parsed.
    pub fn load(workspace_root: &Path) -> anyhow::Result<Self> {
        let config_path = workspace_root.join(CONFIG_FILE);

        if !config_path.exists() {
            tracing::debug!("No {} found, using defaults", CONFIG_FILE);
            return Ok(Config::default());
        }

        let content = fs::read_to_string(&config_path)?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;
        Ok(config)
    }

    /// Directory of `app` inside the workspace.
    pub fn app_dir(&self, workspace_root: &Path, app: &str) -> PathBuf {
        workspace_root.join(&self.workspace.apps_dir).join(app)
    }

    /// Resolved spec of `target` for `app`.
    pub fn target_spec(&self, target: Target, workspace_root: &Path, app: &str) -> TargetSpec {
        self.targets
            .get(target)
            .resolve(target, workspace_root, &self.workspace.apps_dir, app)
    }

    /// Builds the [`RunContext`] of one invocation.
    ///
    /// `with_database` exports `DATABASE_PORT` to the targets.
    pub fn run_context(
        &self,
        workspace_root: &Path,
        app: &str,
        mode: OperationMode,
        backend_host: BackendHost,
        with_database: bool,
    ) -> monodev::Result<RunContext> {
        let mut builder = RunContext::builder(workspace_root, app)
            .workspace_offset(self.workspace.offset)
            .mode(mode)
            .backend_host(backend_host)
            .backend_hosts(self.backend_hosts.clone())
            .database_port(with_database.then_some(self.database.port));

        for target in Target::ALL {
            builder = builder.target(self.target_spec(target, workspace_root, app));
        }

        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_target_table_keeps_other_defaults() {
        let config: Config = toml::from_str(
            r#"
            [targets.backend]
            command = "cargo watch -x run"
            env = { RUST_LOG = "debug" }
            "#,
        )
        .unwrap();

        let spec = config
            .targets
            .get(Target::Backend)
            .resolve(Target::Backend, Path::new("/ws"), "apps", "shop");
        assert_eq!(spec.command, "cargo watch -x run");
        assert_eq!(spec.build_command, "npm run build");
        assert_eq!(spec.dir, Path::new("/ws/apps/shop/server"));
        assert_eq!(spec.output_dir, Path::new("/ws/apps/shop/server/dist"));
        assert_eq!(spec.env["RUST_LOG"], "debug");
    }

    #[test]
    fn test_client_bundle_table_name() {
        let config: Config = toml::from_str(
            r#"
            [targets.clientBundle]
            dir = "mobile/{app}"
            "#,
        )
        .unwrap();
        let spec = config
            .targets
            .get(Target::ClientBundle)
            .resolve(Target::ClientBundle, Path::new("/ws"), "apps", "shop");
        assert_eq!(spec.dir, Path::new("/ws/mobile/shop"));
        assert_eq!(spec.watch_dir.as_deref(), Some(Path::new("/ws/mobile/shop/src")));
    }

    #[test]
    fn test_default_dirs_follow_apps_dir() {
        let config: Config = toml::from_str(
            r#"
            [workspace]
            apps_dir = "services"

            [targets.frontend]
            dir = "{apps}/{app}/site"
            "#,
        )
        .unwrap();
        let root = Path::new("/ws");

        let backend = config.target_spec(Target::Backend, root, "shop");
        assert_eq!(backend.dir, Path::new("/ws/services/shop/server"));
        assert_eq!(backend.dir.parent(), Some(config.app_dir(root, "shop").as_path()));
        let frontend = config.target_spec(Target::Frontend, root, "shop");
        assert_eq!(frontend.dir, Path::new("/ws/services/shop/site"));
        let bundle = config.target_spec(Target::ClientBundle, root, "shop");
        assert_eq!(bundle.dir, Path::new("/ws/services/shop/client"));

        let ctx = config
            .run_context(root, "shop", OperationMode::Local, BackendHost::Local, false)
            .unwrap();
        assert_eq!(
            ctx.target(Target::Backend).unwrap().dir,
            Path::new("/ws/services/shop/server")
        );
    }

    #[test]
    fn test_database_container_name() {
        let config = Config::default();
        assert_eq!(config.database.container_name(3), "monodev-db-3");
        assert_eq!(config.database.env["POSTGRES_PASSWORD"], "postgres");
    }
}
