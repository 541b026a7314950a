// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Portable source export.
//!
//! The application directory becomes the export root; declared libraries
//! keep their workspace-relative paths below it. Path aliases are rewritten
//! to the new locations and the root `package.json` is pruned to what the
//! exported sources import.

use monodev::release::aliases::{normalize, rewrite_tsconfig, DirMapping};
use monodev::release::deps::{minimal_manifest, scan_dir, RootManifest, SOURCE_EXTENSIONS};
use monodev::release::ReleaseLayout;
use serde_json::{json, Map, Value};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use super::archive::{write_checksum, write_tar_gz};
use super::fsutil::{copy_dir, reset_dir, Excludes};
use super::{ReleaseError, ReleaseResult};
use crate::config::Config;

/// Workspace file holding the alias table.
pub const TSCONFIG_BASE: &str = "tsconfig.base.json";

/// Generated readme of the export.
pub const QUICKSTART: &str = "QUICKSTART.md";

/// Directory mappings of an export: the app to the root, libraries in place.
pub fn mappings(app_dir: &str, libraries: &[String]) -> Vec<DirMapping> {
    let mut mappings = vec![DirMapping::new(app_dir, "")];
    for lib in libraries {
        let lib = normalize(lib);
        mappings.push(DirMapping::new(&lib, &lib));
    }
    mappings
}

/// Exports `app` and returns the path of the source archive.
pub fn run(config: &Config, workspace_root: &Path, app: &str, version: &str) -> ReleaseResult<PathBuf> {
    let layout = ReleaseLayout::new(workspace_root, app);
    let export_root = layout.source_root();
    let app_rel = normalize(&format!("{}/{}", config.workspace.apps_dir, app));
    let app_dir = workspace_root.join(&app_rel);
    if !app_dir.is_dir() {
        return Err(ReleaseError::MissingAppDir(app_dir));
    }

    let excludes = Excludes::new(&config.export.exclude)?;
    reset_dir(&export_root)?;

    let copied = copy_dir(&app_dir, &export_root, &excludes)?;
    tracing::debug!("Exported {} files of {}", copied, app_rel);

    let mut libraries = Vec::new();
    for lib in &config.export.libraries {
        let lib = normalize(lib);
        let src = workspace_root.join(&lib);
        if !src.is_dir() {
            tracing::warn!("Library {} not found, skipping", lib);
            continue;
        }
        copy_dir(&src, &export_root.join(&lib), &excludes)?;
        libraries.push(lib);
    }

    let mappings = mappings(&app_rel, &libraries);
    let aliases = write_tsconfig(workspace_root, &export_root, &mappings)?;
    write_package_json(workspace_root, &export_root, app, version)?;
    fs::write(
        export_root.join(QUICKSTART),
        quickstart(app, version, &libraries, &aliases),
    )?;

    let archive = layout.source_archive();
    write_tar_gz(&export_root, app, &archive)?;
    write_checksum(&archive)?;
    Ok(archive)
}

/// Writes the rewritten alias table; returns the kept alias names.
fn write_tsconfig(
    workspace_root: &Path,
    export_root: &Path,
    mappings: &[DirMapping],
) -> ReleaseResult<Vec<String>> {
    let source = workspace_root.join(TSCONFIG_BASE);
    if !source.is_file() {
        return Ok(Vec::new());
    }

    let tsconfig: Value = read_json(&source)?;
    let rewritten = rewrite_tsconfig(&tsconfig, mappings);
    let aliases = rewritten["compilerOptions"]["paths"]
        .as_object()
        .map(|paths| paths.keys().cloned().collect())
        .unwrap_or_default();
    fs::write(
        export_root.join(TSCONFIG_BASE),
        serde_json::to_string_pretty(&rewritten)? + "\n",
    )?;

    // The app's own tsconfig extended the workspace file from two levels up
    let app_tsconfig = export_root.join("tsconfig.json");
    if app_tsconfig.is_file() {
        let mut value: Value = read_json(&app_tsconfig)?;
        let extends_base = value
            .get("extends")
            .and_then(Value::as_str)
            .is_some_and(|e| e.ends_with(TSCONFIG_BASE));
        if extends_base {
            value["extends"] = json!(format!("./{}", TSCONFIG_BASE));
            fs::write(&app_tsconfig, serde_json::to_string_pretty(&value)? + "\n")?;
        }
    }
    Ok(aliases)
}

/// Writes the export's `package.json`.
///
/// The app's own manifest (scripts etc.) is the base. Production
/// dependencies are pruned to the packages the exported sources import;
/// development dependencies are kept whole since build tooling is rarely
/// imported.
fn write_package_json(
    workspace_root: &Path,
    export_root: &Path,
    app: &str,
    version: &str,
) -> ReleaseResult<()> {
    let root_path = workspace_root.join("package.json");
    let root = if root_path.is_file() {
        RootManifest::load(&root_path)?
    } else {
        RootManifest::default()
    };

    let referenced = scan_dir(export_root, SOURCE_EXTENSIONS)?;
    let extraction = minimal_manifest(app, version, &referenced, &root);

    let target = export_root.join("package.json");
    let mut manifest = if target.is_file() {
        read_json(&target)?
    } else {
        Value::Object(Map::new())
    };
    if !manifest.is_object() {
        manifest = Value::Object(Map::new());
    }

    if manifest.get("name").is_none() {
        manifest["name"] = json!(app);
    }
    manifest["version"] = json!(version);
    manifest["private"] = json!(true);
    manifest["dependencies"] = json!(extraction.manifest.dependencies);
    manifest["devDependencies"] = json!(root.dev_dependencies);

    fs::write(&target, serde_json::to_string_pretty(&manifest)? + "\n")?;
    Ok(())
}

fn read_json(path: &Path) -> ReleaseResult<Value> {
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|source| {
        ReleaseError::Core(monodev::Error::InvalidManifest {
            path: path.display().to_string(),
            source,
        })
    })
}

/// Renders `QUICKSTART.md`.
pub fn quickstart(app: &str, version: &str, libraries: &[String], aliases: &[String]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {} {}\n", app, version);
    let _ = writeln!(
        out,
        "Standalone source export of `{}`. Everything needed to build it lives in this directory.\n",
        app
    );
    let _ = writeln!(out, "## Getting started\n");
    let _ = writeln!(out, "```sh\nnpm install\nnpm run build\n```\n");

    if !libraries.is_empty() {
        let _ = writeln!(out, "## Bundled libraries\n");
        for lib in libraries {
            let _ = writeln!(out, "- `{}`", lib);
        }
        out.push('\n');
    }

    if !aliases.is_empty() {
        let _ = writeln!(out, "## Path aliases\n");
        let _ = writeln!(out, "Resolved through `{}`:\n", TSCONFIG_BASE);
        for alias in aliases {
            let _ = writeln!(out, "- `{}`", alias);
        }
        out.push('\n');
    }
    out
}
