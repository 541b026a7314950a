// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Per-target environment resolution.
//!
//! Every target sees a flat map built from three layers, lowest precedence
//! first:
//!
//! 1. the workspace `.env` file (missing file = no overrides)
//! 2. the target's `env` table from `monodev.toml`
//! 3. variables derived from the [`RunContext`] (ports, mode, host)
//!
//! Derived variables always win so a stale `.env` cannot make two workspace
//! instances collide on a port.

use std::collections::BTreeMap;
use std::path::Path;

use crate::context::RunContext;
use crate::error::{Error, Result};
use crate::target::Target;

/// Port the target listens on.
pub const PORT: &str = "PORT";
/// Resolved port of this workspace's backend.
pub const PUBLIC_SERVER_PORT: &str = "PUBLIC_SERVER_PORT";
/// URL of the selected backend.
pub const PUBLIC_SERVER_URL: &str = "PUBLIC_SERVER_URL";
/// Absolute workspace root.
pub const WORKSPACE_ROOT: &str = "WORKSPACE_ROOT";
/// Workspace offset as a decimal string.
pub const WORKSPACE_OFFSET: &str = "WORKSPACE_OFFSET";
/// `local` or `release`.
pub const OPERATION_MODE: &str = "OPERATION_MODE";
/// `local`, `debug`, `develop` or `main`.
pub const BACKEND_HOST: &str = "BACKEND_HOST";
/// Resolved port of the local database container.
pub const DATABASE_PORT: &str = "DATABASE_PORT";

/// Computes `base + offset`, rejecting results outside the TCP port range.
pub fn effective_port(base: u16, offset: u16) -> Result<u16> {
    base.checked_add(offset)
        .ok_or(Error::PortOverflow { base, offset })
}

/// Parses a `.env` file. A missing file yields an empty map.
pub fn load_dotenv(path: &Path) -> Result<BTreeMap<String, String>> {
    if !path.is_file() {
        tracing::debug!("No .env at {}, using no overrides", path.display());
        return Ok(BTreeMap::new());
    }

    let invalid = |e: dotenvy::Error| Error::InvalidDotenv {
        path: path.display().to_string(),
        message: e.to_string(),
    };

    let mut vars = BTreeMap::new();
    for item in dotenvy::from_path_iter(path).map_err(invalid)? {
        let (key, value) = item.map_err(invalid)?;
        vars.insert(key, value);
    }
    Ok(vars)
}

/// Returns the full environment for `target`.
pub fn resolve_env(ctx: &RunContext, target: Target) -> BTreeMap<String, String> {
    let mut env = ctx.dotenv().clone();

    if let Some(spec) = ctx.target(target) {
        env.extend(spec.env.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    env.insert(PORT.to_string(), ctx.port(target).to_string());
    env.insert(
        PUBLIC_SERVER_PORT.to_string(),
        ctx.port(Target::Backend).to_string(),
    );
    env.insert(PUBLIC_SERVER_URL.to_string(), ctx.backend_url().to_string());
    env.insert(
        WORKSPACE_ROOT.to_string(),
        ctx.workspace_root().display().to_string(),
    );
    env.insert(
        WORKSPACE_OFFSET.to_string(),
        ctx.workspace_offset().to_string(),
    );
    env.insert(OPERATION_MODE.to_string(), ctx.mode().as_str().to_string());
    env.insert(
        BACKEND_HOST.to_string(),
        ctx.backend_host().as_str().to_string(),
    );
    if let Some(port) = ctx.database_port() {
        env.insert(DATABASE_PORT.to_string(), port.to_string());
    }

    env
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::TargetSpec;
    use std::fs;
    use tempfile::tempdir;

    fn spec(root: &Path, target: Target, env: &[(&str, &str)]) -> TargetSpec {
        TargetSpec {
            target,
            dir: root.join(target.as_str()),
            command: "true".to_string(),
            build_command: "true".to_string(),
            output_dir: root.join(target.as_str()).join("dist"),
            config_file: root.join(target.as_str()).join("env.json"),
            watch_dir: None,
            env: env
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_backend_port_with_zero_offset() {
        let dir = tempdir().unwrap();
        let ctx = RunContext::builder(dir.path(), "shop").build().unwrap();
        let env = resolve_env(&ctx, Target::Backend);
        assert_eq!(env[PORT], "8080");
    }

    #[test]
    fn test_offset_two_exposes_backend_port_to_every_target() {
        let dir = tempdir().unwrap();
        let ctx = RunContext::builder(dir.path(), "shop")
            .workspace_offset(2)
            .build()
            .unwrap();

        let backend = resolve_env(&ctx, Target::Backend);
        assert_eq!(backend[PORT], "8082");
        assert_eq!(backend[PUBLIC_SERVER_PORT], "8082");

        let frontend = resolve_env(&ctx, Target::Frontend);
        assert_eq!(frontend[PORT], "4202");
        assert_eq!(frontend[PUBLIC_SERVER_PORT], "8082");
        assert_eq!(frontend[PUBLIC_SERVER_URL], "http://localhost:8082");

        let bundle = resolve_env(&ctx, Target::ClientBundle);
        assert_eq!(bundle[PORT], "4203");
        assert_eq!(bundle[WORKSPACE_OFFSET], "2");
    }

    #[test]
    fn test_missing_dotenv_is_empty() {
        let dir = tempdir().unwrap();
        let vars = load_dotenv(&dir.path().join(".env")).unwrap();
        assert!(vars.is_empty());
    }

    #[test]
    fn test_layer_precedence() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(".env"),
            "API_KEY=from-dotenv\nFEATURE=dotenv\nPORT=1\n",
        )
        .unwrap();

        let ctx = RunContext::builder(dir.path(), "shop")
            .target(spec(dir.path(), Target::Frontend, &[("FEATURE", "toml")]))
            .build()
            .unwrap();

        let env = resolve_env(&ctx, Target::Frontend);
        assert_eq!(env["API_KEY"], "from-dotenv");
        assert_eq!(env["FEATURE"], "toml");
        assert_eq!(env[PORT], "4200");
        assert_eq!(env[OPERATION_MODE], "local");
        assert_eq!(env[BACKEND_HOST], "local");
        assert!(!env.contains_key(DATABASE_PORT));
    }

    #[test]
    fn test_database_port_is_offset() {
        let dir = tempdir().unwrap();
        let ctx = RunContext::builder(dir.path(), "shop")
            .workspace_offset(3)
            .database_port(Some(5432))
            .build()
            .unwrap();
        let env = resolve_env(&ctx, Target::Backend);
        assert_eq!(env[DATABASE_PORT], "5435");
    }
}
