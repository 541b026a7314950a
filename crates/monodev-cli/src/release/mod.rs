// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Release pipeline: build, extract dependencies, assemble, compress, export.
//!
//! Each step runs behind a spinner and stops the pipeline on failure, so
//! archives are only written once everything before them succeeded.

pub mod archive;
pub mod build;
pub mod export;
pub mod fsutil;

use monodev::env::resolve_env;
use monodev::release::deps::{minimal_manifest, scan_dir, Extraction, RootManifest, BUNDLE_EXTENSIONS};
use monodev::release::{ReleaseArtifact, ReleaseLayout, ARTIFACT_FILE};
use monodev::{BackendHost, OperationMode, RunContext, Target};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;

use crate::config::Config;
use crate::progress::{Step, Verbosity};
use build::{build_target, stamp_path, BuildOutcome};
use fsutil::{copy_dir, reset_dir, Excludes};

/// Errors raised by the release pipeline.
#[derive(Debug, Error)]
pub enum ReleaseError {
    /// Neither `[release] platform_version` nor a root `package.json` version exists.
    #[error("No platform version: set [release] platform_version in monodev.toml or \"version\" in package.json")]
    NoPlatformVersion,

    /// No target of the application has a directory.
    #[error("Application {0} has no buildable targets")]
    NothingToBuild(String),

    /// The target's directory does not exist.
    #[error("Directory of {target} not found: {}", dir.display())]
    MissingTargetDir {
        /// Affected target.
        target: Target,
        /// Expected directory.
        dir: PathBuf,
    },

    /// The build command could not be spawned.
    #[error("Failed to run build of {target} ({command}): {source}")]
    Spawn {
        /// Affected target.
        target: Target,
        /// Command line.
        command: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The build command failed.
    #[error("Build of {target} failed ({status}):\n{output}")]
    Build {
        /// Affected target.
        target: Target,
        /// Exit status.
        status: String,
        /// Tail of the build output.
        output: String,
    },

    /// The build succeeded but left no output directory.
    #[error("Build of {target} produced no output at {}", dir.display())]
    MissingOutput {
        /// Affected target.
        target: Target,
        /// Expected output directory.
        dir: PathBuf,
    },

    /// The application directory to export does not exist.
    #[error("Application directory not found: {}", .0.display())]
    MissingAppDir(PathBuf),

    /// Workspace input error.
    #[error(transparent)]
    Core(#[from] monodev::Error),

    /// Invalid exclude pattern.
    #[error("Invalid exclude pattern: {0}")]
    Glob(#[from] globset::Error),

    /// Zip writing failed.
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// JSON encoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A build task panicked or was cancelled.
    #[error("Build task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for the release pipeline.
pub type ReleaseResult<T> = Result<T, ReleaseError>;

/// Flags of `release-source`.
#[derive(Debug, Clone)]
pub struct ReleaseOptions {
    /// Ignore freshness stamps.
    pub rebuild: bool,
    /// Build number; falls back to `[release] build_number`, then 1.
    pub build_number: Option<u32>,
    /// Backend the release talks to.
    pub environment: BackendHost,
    /// Build in local mode against the local backend.
    pub local: bool,
    /// Skip the source export.
    pub skip_export: bool,
}

impl Default for ReleaseOptions {
    fn default() -> Self {
        Self {
            rebuild: false,
            build_number: None,
            environment: BackendHost::Main,
            local: false,
            skip_export: false,
        }
    }
}

/// What a release run produced.
#[derive(Debug, Clone)]
pub struct ReleaseReport {
    /// Written artifact description.
    pub artifact: ReleaseArtifact,
    /// Targets whose build was skipped as fresh.
    pub fresh: Vec<Target>,
    /// `{app}-release.tar.gz`.
    pub release_archive: PathBuf,
    /// `{app}-appBuild.zip`, when a client bundle was built.
    pub bundle_archive: Option<PathBuf>,
    /// `{app}-source.tar.gz`, unless the export was skipped.
    pub source_archive: Option<PathBuf>,
}

/// Platform version from config, else from the root `package.json`.
pub fn platform_version(config: &Config, workspace_root: &Path) -> ReleaseResult<String> {
    if let Some(version) = &config.release.platform_version {
        return Ok(version.clone());
    }
    let manifest = workspace_root.join("package.json");
    if manifest.is_file() {
        if let Some(version) = RootManifest::load(&manifest)?.version {
            return Ok(version);
        }
    }
    Err(ReleaseError::NoPlatformVersion)
}

fn root_manifest(workspace_root: &Path) -> ReleaseResult<RootManifest> {
    let path = workspace_root.join("package.json");
    if path.is_file() {
        Ok(RootManifest::load(&path)?)
    } else {
        tracing::warn!("No root package.json; extracted manifests will be empty");
        Ok(RootManifest::default())
    }
}

/// Runs the whole pipeline for `app`.
pub async fn run(
    config: &Config,
    workspace_root: &Path,
    app: &str,
    options: &ReleaseOptions,
    verbosity: Verbosity,
) -> ReleaseResult<ReleaseReport> {
    let version_base = platform_version(config, workspace_root)?;
    let build_number = options
        .build_number
        .or(config.release.build_number)
        .unwrap_or(1);

    let (mode, host) = if options.local {
        (OperationMode::Local, BackendHost::Local)
    } else {
        (OperationMode::Release, options.environment)
    };
    let ctx = config.run_context(workspace_root, app, mode, host, false)?;
    let layout = ReleaseLayout::new(workspace_root, app);

    // 1. Initialize
    let step = Step::start("Preparing release directory", verbosity);
    reset_dir(&layout.build_root())?;
    step.ok_with(layout.build_root().display().to_string());

    // 2 + 3. Build and extract, concurrently per target
    let targets: Vec<Target> = ctx
        .targets()
        .filter(|spec| spec.dir.is_dir())
        .map(|spec| spec.target)
        .collect();
    if targets.is_empty() {
        return Err(ReleaseError::NothingToBuild(app.to_string()));
    }

    let artifact = ReleaseArtifact::new(&version_base, build_number, &targets);
    let results = build_all(&ctx, &targets, &artifact.version, options.rebuild, verbosity).await?;

    // 4. Assemble
    let step = Step::start("Assembling", verbosity);
    let version_dir = layout.version_dir(&artifact.version);
    let mut fresh = Vec::new();
    for result in &results {
        if result.outcome == BuildOutcome::Fresh {
            fresh.push(result.target);
        }
        let Some(spec) = ctx.target(result.target) else {
            continue;
        };
        let dest = version_dir.join(result.target.as_str());
        copy_dir(&spec.output_dir, &dest, &Excludes::none())?;
        if let Some(extraction) = &result.extraction {
            let json = serde_json::to_string_pretty(&extraction.manifest)?;
            fs::write(dest.join("package.json"), json + "\n")?;
        }
    }
    let json = serde_json::to_string_pretty(&artifact)?;
    fs::write(version_dir.join(ARTIFACT_FILE), json + "\n")?;
    step.ok_with(version_dir.display().to_string());

    // 5. Compress
    let step = Step::start("Compressing", verbosity);
    let release_archive = layout.release_archive();
    archive::write_tar_gz(&layout.build_root(), app, &release_archive)?;
    archive::write_checksum(&release_archive)?;

    let bundle_dir = version_dir.join(Target::ClientBundle.as_str());
    let bundle_archive = if bundle_dir.is_dir() {
        let dest = layout.bundle_archive();
        archive::write_zip(&bundle_dir, Target::ClientBundle.as_str(), &dest)?;
        archive::write_checksum(&dest)?;
        Some(dest)
    } else {
        None
    };
    step.ok_with(release_archive.display().to_string());

    // 6. Export
    let source_archive = if options.skip_export {
        Step::start("Exporting sources", verbosity).skip("(--skip-export)");
        None
    } else {
        let step = Step::start("Exporting sources", verbosity);
        match export::run(config, workspace_root, app, &artifact.version) {
            Ok(path) => {
                step.ok_with(path.display().to_string());
                Some(path)
            }
            Err(e) => {
                step.fail(&e);
                return Err(e);
            }
        }
    };

    Ok(ReleaseReport {
        artifact,
        fresh,
        release_archive,
        bundle_archive,
        source_archive,
    })
}

/// Result of one target's build task.
#[derive(Debug)]
struct TargetBuild {
    target: Target,
    outcome: BuildOutcome,
    extraction: Option<Extraction>,
}

async fn build_all(
    ctx: &RunContext,
    targets: &[Target],
    version: &str,
    rebuild: bool,
    verbosity: Verbosity,
) -> ReleaseResult<Vec<TargetBuild>> {
    let root = Arc::new(root_manifest(ctx.workspace_root())?);
    let step = Step::start(
        format!(
            "Building {}",
            targets.iter().map(|t| t.as_str()).collect::<Vec<_>>().join(", ")
        ),
        verbosity,
    );

    let mut set = JoinSet::new();
    for &target in targets {
        let Some(spec) = ctx.target(target).cloned() else {
            continue;
        };
        let env = resolve_env(ctx, target);
        let stamp = stamp_path(ctx.workspace_root(), ctx.app(), target);
        let root = Arc::clone(&root);
        let name = format!("{}-{}", ctx.app(), target.as_str());
        let version = version.to_string();
        let verbose = verbosity.verbose;

        set.spawn(async move {
            let outcome = build_target(&spec, &env, &stamp, rebuild, verbose).await?;
            // Extraction only waits on this target's own build
            let extraction = if target.ships_dependencies() {
                let referenced = scan_dir(&spec.output_dir, BUNDLE_EXTENSIONS)?;
                let extraction = minimal_manifest(&name, &version, &referenced, &root);
                for package in &extraction.unpinned {
                    tracing::warn!(
                        "{} imports {} which is not a production dependency of the workspace",
                        target,
                        package
                    );
                }
                Some(extraction)
            } else {
                None
            };
            Ok::<_, ReleaseError>(TargetBuild {
                target,
                outcome,
                extraction,
            })
        });
    }

    let mut results = Vec::with_capacity(targets.len());
    while let Some(joined) = set.join_next().await {
        match joined.map_err(ReleaseError::from).and_then(|r| r) {
            Ok(result) => {
                step.message(format!("{} done", result.target));
                results.push(result);
            }
            Err(e) => {
                set.abort_all();
                step.fail(&e);
                return Err(e);
            }
        }
    }
    results.sort_by_key(|r| r.target);

    let fresh: Vec<&str> = results
        .iter()
        .filter(|r| r.outcome == BuildOutcome::Fresh)
        .map(|r| r.target.as_str())
        .collect();
    if fresh.is_empty() {
        step.ok();
    } else {
        step.ok_with(format!("(fresh: {})", fresh.join(", ")));
    }
    Ok(results)
}
