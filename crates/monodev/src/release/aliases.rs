// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Path-alias rewriting for source exports.
//!
//! The workspace `tsconfig.base.json` maps aliases such as `@acme/ui` to
//! paths inside the monorepo. In an export those directories move, so each
//! alias target is re-rooted through a list of [`DirMapping`]s. Aliases whose
//! targets were not exported are dropped.

use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// A workspace directory and where it lands inside the export root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirMapping {
    /// Workspace-relative source directory, e.g. `libs/ui`.
    pub from: String,
    /// Export-relative destination, e.g. `libs/ui`; empty for the export root.
    pub to: String,
}

impl DirMapping {
    /// Creates a mapping; both sides are normalized.
    pub fn new(from: &str, to: &str) -> Self {
        Self {
            from: normalize(from),
            to: normalize(to),
        }
    }
}

/// Normalizes a `/`-separated relative path (drops `.`, resolves `..`).
pub fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split(['/', '\\']) {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

/// Re-roots one workspace-relative path, or `None` if it was not exported.
pub fn rewrite_path(path: &str, mappings: &[DirMapping]) -> Option<String> {
    let path = normalize(path);
    let mapping = mappings
        .iter()
        .filter(|m| {
            m.from.is_empty() || path == m.from || path.starts_with(&format!("{}/", m.from))
        })
        .max_by_key(|m| m.from.len())?;

    let rest = path[mapping.from.len()..].trim_start_matches('/');
    let joined = match (mapping.to.is_empty(), rest.is_empty()) {
        (true, true) => String::new(),
        (true, false) => rest.to_string(),
        (false, true) => mapping.to.clone(),
        (false, false) => format!("{}/{}", mapping.to, rest),
    };
    Some(format!("./{}", joined))
}

/// Rewrites an alias table. `base_url` is the workspace-relative directory
/// the original paths are relative to.
pub fn rewrite_aliases(
    paths: &BTreeMap<String, Vec<String>>,
    base_url: &str,
    mappings: &[DirMapping],
) -> BTreeMap<String, Vec<String>> {
    let mut rewritten = BTreeMap::new();
    for (alias, targets) in paths {
        let kept: Vec<String> = targets
            .iter()
            .filter_map(|t| rewrite_path(&format!("{}/{}", base_url, t), mappings))
            .collect();
        if kept.is_empty() {
            tracing::debug!("Dropping alias {} (target not exported)", alias);
        } else {
            rewritten.insert(alias.clone(), kept);
        }
    }
    rewritten
}

/// Produces the export's tsconfig from the workspace one.
///
/// Every other compiler option is preserved; `baseUrl` becomes `.` and
/// `paths` is replaced by the rewritten table.
pub fn rewrite_tsconfig(tsconfig: &Value, mappings: &[DirMapping]) -> Value {
    let mut out = tsconfig.clone();
    if !out.is_object() {
        out = json!({});
    }

    let options = out
        .as_object_mut()
        .map(|root| {
            root.entry("compilerOptions")
                .or_insert_with(|| Value::Object(Map::new()))
        })
        .and_then(Value::as_object_mut);

    let Some(options) = options else {
        return out;
    };

    let base_url = options
        .get("baseUrl")
        .and_then(Value::as_str)
        .unwrap_or(".")
        .to_string();
    let paths: BTreeMap<String, Vec<String>> = options
        .get("paths")
        .and_then(|p| serde_json::from_value(p.clone()).ok())
        .unwrap_or_default();

    let rewritten = rewrite_aliases(&paths, &base_url, mappings);
    options.insert("baseUrl".to_string(), json!("."));
    options.insert("paths".to_string(), json!(rewritten));
    out
}
