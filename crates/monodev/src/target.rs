// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! The three supervised build/serve roles of an application.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::Error;

/// One of the supervised targets of an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Target {
    /// Long-running backend service (watch + serve).
    #[serde(rename = "backend")]
    Backend,
    /// Web frontend dev server.
    #[serde(rename = "frontend")]
    Frontend,
    /// Client-only bundle served by the in-process server.
    #[serde(rename = "clientBundle", alias = "client-bundle", alias = "client_bundle")]
    ClientBundle,
}

impl Target {
    /// All targets in launch and tab order.
    pub const ALL: [Target; 3] = [Target::Backend, Target::Frontend, Target::ClientBundle];

    /// Returns the string identifier for this target.
    pub fn as_str(&self) -> &'static str {
        match self {
            Target::Backend => "backend",
            Target::Frontend => "frontend",
            Target::ClientBundle => "clientBundle",
        }
    }

    /// Canonical port before the workspace offset is applied.
    pub fn base_port(&self) -> u16 {
        match self {
            Target::Backend => 8080,
            Target::Frontend => 4200,
            Target::ClientBundle => 4201,
        }
    }

    /// Position of this target in [`Target::ALL`].
    pub fn index(&self) -> usize {
        match self {
            Target::Backend => 0,
            Target::Frontend => 1,
            Target::ClientBundle => 2,
        }
    }

    /// Whether release artifacts for this target get a pruned dependency manifest.
    pub fn ships_dependencies(&self) -> bool {
        matches!(self, Target::Backend | Target::Frontend)
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Target {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "backend" | "server" => Ok(Target::Backend),
            "frontend" | "web" => Ok(Target::Frontend),
            "clientbundle" | "client-bundle" | "client_bundle" | "client" => {
                Ok(Target::ClientBundle)
            }
            _ => Err(Error::UnknownTarget(s.to_string())),
        }
    }
}

/// Fully resolved description of one target for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSpec {
    /// Which target this describes.
    pub target: Target,
    /// Working directory of the target (absolute).
    pub dir: PathBuf,
    /// Long-running command used by `start`.
    pub command: String,
    /// One-shot command used by `build` and the release pipeline.
    pub build_command: String,
    /// Build output directory (absolute).
    pub output_dir: PathBuf,
    /// Config file regenerated before every launch (absolute).
    pub config_file: PathBuf,
    /// Sources watched for rebuilds by the in-process server (absolute).
    pub watch_dir: Option<PathBuf>,
    /// Target-specific environment overrides.
    pub env: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_ports() {
        assert_eq!(Target::Backend.base_port(), 8080);
        assert_eq!(Target::Frontend.base_port(), 4200);
        assert_eq!(Target::ClientBundle.base_port(), 4201);
    }

    #[test]
    fn test_parse_aliases() {
        assert_eq!("backend".parse::<Target>().unwrap(), Target::Backend);
        assert_eq!("clientBundle".parse::<Target>().unwrap(), Target::ClientBundle);
        assert_eq!("client-bundle".parse::<Target>().unwrap(), Target::ClientBundle);
        assert!("mobile".parse::<Target>().is_err());
    }

    #[test]
    fn test_index_matches_all_order() {
        for (i, target) in Target::ALL.iter().enumerate() {
            assert_eq!(target.index(), i);
        }
    }
}
