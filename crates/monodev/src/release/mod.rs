// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Release naming, on-disk layout and the pure parts of release assembly.
//!
//! The filesystem work (building, copying, archiving) lives in the CLI; this
//! module decides *what* goes *where*.
//!
//! # Layout
//!
//! ```text
//! releases/
//!   builds/
//!     {app}/{platformVersion}-{build}/{target}/...
//!     {app}-release.tar.gz
//!     {app}-appBuild.zip
//!   sources/
//!     {app}/...
//!     {app}-source.tar.gz
//! ```

pub mod aliases;
pub mod deps;

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::target::Target;

/// Name of the artifact description written into every versioned directory.
pub const ARTIFACT_FILE: &str = "release.json";

/// Builds the release version string `{platformVersion}-{buildNumber}`.
pub fn release_version(platform_version: &str, build_number: u32) -> String {
    format!("{}-{}", platform_version, build_number)
}

/// Description of one assembled release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseArtifact {
    /// `{platformVersion}-{buildNumber}`.
    pub version: String,
    /// Build number the version was derived from.
    pub build_number: u32,
    /// Targets contained in the release.
    pub targets: Vec<Target>,
    /// Per-target output directory, relative to the build root.
    pub output_paths: BTreeMap<Target, PathBuf>,
}

impl ReleaseArtifact {
    /// Creates an artifact description for the given targets.
    ///
    /// Each target's output lives in `{version}/{target}`.
    pub fn new(platform_version: &str, build_number: u32, targets: &[Target]) -> Self {
        let version = release_version(platform_version, build_number);
        let output_paths = targets
            .iter()
            .map(|t| (*t, Path::new(&version).join(t.as_str())))
            .collect();
        Self {
            version,
            build_number,
            targets: targets.to_vec(),
            output_paths,
        }
    }
}

/// Paths of every release output for one application.
#[derive(Debug, Clone)]
pub struct ReleaseLayout {
    releases_dir: PathBuf,
    app: String,
}

impl ReleaseLayout {
    /// Layout rooted at `<workspace_root>/releases`.
    pub fn new(workspace_root: &Path, app: impl Into<String>) -> Self {
        Self {
            releases_dir: workspace_root.join("releases"),
            app: app.into(),
        }
    }

    /// `releases/builds`.
    pub fn builds_dir(&self) -> PathBuf {
        self.releases_dir.join("builds")
    }

    /// `releases/builds/{app}`: emptied at the start of every release.
    pub fn build_root(&self) -> PathBuf {
        self.builds_dir().join(&self.app)
    }

    /// `releases/builds/{app}/{version}`.
    pub fn version_dir(&self, version: &str) -> PathBuf {
        self.build_root().join(version)
    }

    /// `releases/builds/{app}-release.tar.gz`.
    pub fn release_archive(&self) -> PathBuf {
        self.builds_dir().join(format!("{}-release.tar.gz", self.app))
    }

    /// `releases/builds/{app}-appBuild.zip`.
    pub fn bundle_archive(&self) -> PathBuf {
        self.builds_dir().join(format!("{}-appBuild.zip", self.app))
    }

    /// `releases/sources/{app}`.
    pub fn source_root(&self) -> PathBuf {
        self.releases_dir.join("sources").join(&self.app)
    }

    /// `releases/sources/{app}-source.tar.gz`.
    pub fn source_archive(&self) -> PathBuf {
        self.releases_dir
            .join("sources")
            .join(format!("{}-source.tar.gz", self.app))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_version() {
        assert_eq!(release_version("2.3.0", 17), "2.3.0-17");
    }

    #[test]
    fn test_layout_paths() {
        let layout = ReleaseLayout::new(Path::new("/ws"), "shop");
        assert_eq!(layout.build_root(), Path::new("/ws/releases/builds/shop"));
        assert_eq!(
            layout.version_dir("1.0.0-4"),
            Path::new("/ws/releases/builds/shop/1.0.0-4")
        );
        assert_eq!(
            layout.release_archive(),
            Path::new("/ws/releases/builds/shop-release.tar.gz")
        );
        assert_eq!(
            layout.bundle_archive(),
            Path::new("/ws/releases/builds/shop-appBuild.zip")
        );
        assert_eq!(layout.source_root(), Path::new("/ws/releases/sources/shop"));
        assert_eq!(
            layout.source_archive(),
            Path::new("/ws/releases/sources/shop-source.tar.gz")
        );
    }

    #[test]
    fn test_artifact_output_paths() {
        let artifact = ReleaseArtifact::new("1.2.0", 3, &[Target::Backend, Target::ClientBundle]);
        assert_eq!(artifact.version, "1.2.0-3");
        assert_eq!(
            artifact.output_paths[&Target::Backend],
            Path::new("1.2.0-3/backend")
        );
        let json = serde_json::to_value(&artifact).unwrap();
        assert_eq!(json["buildNumber"], 3);
        assert_eq!(json["targets"][1], "clientBundle");
    }
}
