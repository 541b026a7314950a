// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Production dependency extraction.
//!
//! A bundle only needs the external packages it still imports at runtime.
//! [`scan_imports`] finds those package names in JavaScript source and
//! [`minimal_manifest`] pins them to the versions of the workspace root
//! `package.json`.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

lazy_static! {
    // `from "x"`, `import "x"`, `import("x")`, `require("x")`
    static ref IMPORT_SPECIFIER: Regex = Regex::new(
        r#"(?:\bfrom\s*|\bimport\s*\(?\s*|\brequire\s*\(\s*)["']([^"'\s]+)["']"#
    )
    .expect("valid import pattern");
}

/// Extensions scanned in built bundles.
pub const BUNDLE_EXTENSIONS: &[&str] = &["js", "mjs", "cjs"];

/// Extensions scanned in application and library sources.
pub const SOURCE_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mjs", "cjs"];

const NODE_BUILTINS: &[&str] = &[
    "assert", "async_hooks", "buffer", "child_process", "cluster", "console", "constants",
    "crypto", "dgram", "diagnostics_channel", "dns", "domain", "events", "fs", "http", "http2",
    "https", "inspector", "module", "net", "os", "path", "perf_hooks", "process", "punycode",
    "querystring", "readline", "repl", "stream", "string_decoder", "sys", "timers", "tls",
    "trace_events", "tty", "url", "util", "v8", "vm", "wasi", "worker_threads", "zlib",
];

/// Directories never descended into while scanning.
const SKIPPED_DIRS: &[&str] = &["node_modules", ".git"];

/// Maps an import specifier to the package that provides it.
///
/// Returns `None` for relative and absolute paths, Node built-ins and
/// `node:` URLs. Subpaths are trimmed (`lodash/fp` -> `lodash`,
/// `@scope/pkg/sub` -> `@scope/pkg`).
pub fn package_name(specifier: &str) -> Option<String> {
    if specifier.starts_with('.')
        || specifier.starts_with('/')
        || specifier.starts_with("node:")
        || specifier.contains("://")
    {
        return None;
    }

    let mut parts = specifier.split('/');
    let name = if specifier.starts_with('@') {
        let scope = parts.next()?;
        let pkg = parts.next().filter(|p| !p.is_empty())?;
        format!("{}/{}", scope, pkg)
    } else {
        parts.next()?.to_string()
    };

    if name.is_empty() || NODE_BUILTINS.contains(&name.as_str()) {
        return None;
    }
    Some(name)
}

/// Returns the external packages referenced by `source`.
pub fn scan_imports(source: &str) -> BTreeSet<String> {
    IMPORT_SPECIFIER
        .captures_iter(source)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| package_name(m.as_str()))
        .collect()
}

/// Scans every file with one of `extensions` below `dir`.
pub fn scan_dir(dir: &Path, extensions: &[&str]) -> Result<BTreeSet<String>> {
    let mut packages = BTreeSet::new();
    if dir.is_dir() {
        scan_dir_into(dir, extensions, &mut packages)?;
    }
    Ok(packages)
}

fn scan_dir_into(dir: &Path, extensions: &[&str], packages: &mut BTreeSet<String>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            let skipped = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| SKIPPED_DIRS.contains(&n));
            if !skipped {
                scan_dir_into(&path, extensions, packages)?;
            }
            continue;
        }

        let wanted = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| extensions.contains(&e));
        if wanted {
            let bytes = fs::read(&path)?;
            packages.extend(scan_imports(&String::from_utf8_lossy(&bytes)));
        }
    }
    Ok(())
}

/// The parts of the workspace root `package.json` the pipeline reads.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootManifest {
    /// Workspace name.
    #[serde(default)]
    pub name: Option<String>,
    /// Platform version.
    #[serde(default)]
    pub version: Option<String>,
    /// Production dependencies.
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    /// Optional dependencies.
    #[serde(default)]
    pub optional_dependencies: BTreeMap<String, String>,
    /// Development dependencies (never shipped, used for diagnostics only).
    #[serde(default)]
    pub dev_dependencies: BTreeMap<String, String>,
}

impl RootManifest {
    /// Reads `package.json` from `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|source| Error::InvalidManifest {
            path: path.display().to_string(),
            source,
        })
    }

    /// Version pinned for `package` among the shippable dependencies.
    pub fn pinned(&self, package: &str) -> Option<&str> {
        self.dependencies
            .get(package)
            .or_else(|| self.optional_dependencies.get(package))
            .map(String::as_str)
    }
}

/// A `package.json` that lists only what a bundle actually imports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MinimalManifest {
    /// Package name.
    pub name: String,
    /// Release version.
    pub version: String,
    /// Always true; release manifests are never published.
    pub private: bool,
    /// Referenced packages and their pinned versions.
    pub dependencies: BTreeMap<String, String>,
}

/// Result of [`minimal_manifest`].
#[derive(Debug, Clone)]
pub struct Extraction {
    /// Manifest to write next to the bundle.
    pub manifest: MinimalManifest,
    /// Referenced packages absent from the root production dependencies.
    pub unpinned: Vec<String>,
}

/// Builds the minimal manifest for `referenced` packages.
///
/// Packages the root manifest does not list as production dependencies are
/// left out and reported in [`Extraction::unpinned`].
pub fn minimal_manifest(
    name: &str,
    version: &str,
    referenced: &BTreeSet<String>,
    root: &RootManifest,
) -> Extraction {
    let mut dependencies = BTreeMap::new();
    let mut unpinned = Vec::new();

    for package in referenced {
        match root.pinned(package) {
            Some(pinned) => {
                dependencies.insert(package.clone(), pinned.to_string());
            }
            None => {
                if root.dev_dependencies.contains_key(package) {
                    tracing::warn!("{} is only a dev dependency of the workspace", package);
                }
                unpinned.push(package.clone());
            }
        }
    }

    Extraction {
        manifest: MinimalManifest {
            name: name.to_string(),
            version: version.to_string(),
            private: true,
            dependencies,
        },
        unpinned,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_package_name() {
        assert_eq!(package_name("express"), Some("express".to_string()));
        assert_eq!(package_name("lodash/fp"), Some("lodash".to_string()));
        assert_eq!(package_name("@nestjs/core/lib"), Some("@nestjs/core".to_string()));
        assert_eq!(package_name("./util"), None);
        assert_eq!(package_name("fs"), None);
        assert_eq!(package_name("node:path"), None);
        assert_eq!(package_name("@broken"), None);
    }

    #[test]
    fn test_scan_imports() {
        let source = r#"
            import express from "express";
            import { z } from 'zod';
            import "reflect-metadata";
            export * from "@acme/shared/dto";
            const pg = require("pg");
            const lazy = await import('sharp');
            const path = require("path");
            import local from "./local";
        "#;
        let found: Vec<_> = scan_imports(source).into_iter().collect();
        assert_eq!(
            found,
            vec!["@acme/shared", "express", "pg", "reflect-metadata", "sharp", "zod"]
        );
    }

    #[test]
    fn test_minimal_manifest_pins_root_versions() {
        let root: RootManifest = serde_json::from_str(
            r#"{
                "version": "3.1.0",
                "dependencies": { "express": "^4.19.0", "pg": "8.11.3", "react": "18.2.0" },
                "devDependencies": { "vitest": "1.0.0" }
            }"#,
        )
        .unwrap();

        let referenced: BTreeSet<String> = ["express", "pg", "vitest"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let extraction = minimal_manifest("shop-backend", "3.1.0-9", &referenced, &root);

        assert_eq!(extraction.manifest.dependencies.len(), 2);
        assert_eq!(extraction.manifest.dependencies["pg"], "8.11.3");
        assert!(!extraction.manifest.dependencies.contains_key("react"));
        assert_eq!(extraction.unpinned, vec!["vitest"]);
        assert!(extraction.manifest.private);
    }

    #[test]
    fn test_scan_dir_skips_node_modules() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("chunks")).unwrap();
        fs::create_dir_all(dir.path().join("node_modules/x")).unwrap();
        fs::write(dir.path().join("main.js"), r#"require("express")"#).unwrap();
        fs::write(dir.path().join("chunks/a.mjs"), r#"import "zod""#).unwrap();
        fs::write(dir.path().join("chunks/a.map"), r#"require("ignored")"#).unwrap();
        fs::write(dir.path().join("node_modules/x/i.js"), r#"require("hidden")"#).unwrap();

        let found: Vec<_> = scan_dir(dir.path(), BUNDLE_EXTENSIONS)
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(found, vec!["express", "zod"]);
    }
}
