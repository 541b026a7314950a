// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Loading `monodev.toml` and turning it into a run context.

use std::fs;

use monodev::env::resolve_env;
use monodev::{BackendHost, OperationMode, Target};
use monodev_cli::config::{Config, CONFIG_FILE};
use tempfile::tempdir;

#[test]
fn test_missing_file_yields_defaults() {
    let dir = tempdir().unwrap();
    let config = Config::load(dir.path()).unwrap();
    assert_eq!(config.workspace.offset, 0);
    assert_eq!(config.workspace.apps_dir, "apps");
    assert_eq!(config.logs.max_lines, 1000);
    assert!(!config.database.enabled);
}

#[test]
fn test_malformed_file_is_an_error() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join(CONFIG_FILE), "[workspace\noffset = 1").unwrap();
    let err = Config::load(dir.path()).unwrap_err();
    assert!(err.to_string().contains(CONFIG_FILE));
}

#[test]
fn test_second_instance_gets_shifted_ports_and_env() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join(CONFIG_FILE),
        r#"
        [workspace]
        offset = 2

        [targets.frontend]
        env = { FEATURE_FLAGS = "beta" }

        [database]
        enabled = true
        "#,
    )
    .unwrap();
    fs::write(dir.path().join(".env"), "FEATURE_FLAGS=none\nSECRET=s3cr3t\n").unwrap();

    let config = Config::load(dir.path()).unwrap();
    let ctx = config
        .run_context(
            dir.path(),
            "shop",
            OperationMode::Local,
            BackendHost::Local,
            config.database.enabled,
        )
        .unwrap();

    assert_eq!(ctx.port(Target::Backend), 8082);
    assert_eq!(ctx.port(Target::ClientBundle), 4203);

    let env = resolve_env(&ctx, Target::Frontend);
    assert_eq!(env["PORT"], "4202");
    assert_eq!(env["PUBLIC_SERVER_URL"], "http://localhost:8082");
    assert_eq!(env["DATABASE_PORT"], "5434");
    assert_eq!(env["FEATURE_FLAGS"], "beta");
    assert_eq!(env["SECRET"], "s3cr3t");
}

#[test]
fn test_unconfigured_remote_host_is_rejected() {
    let dir = tempdir().unwrap();
    let config = Config::load(dir.path()).unwrap();
    let result = config.run_context(
        dir.path(),
        "shop",
        OperationMode::Release,
        BackendHost::Develop,
        false,
    );
    assert!(matches!(result, Err(monodev::Error::MissingBackendHost(_))));
}
