// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! `release-source`: build, package and export a release.

use console::style;
use std::path::Path;

use crate::config::Config;
use crate::progress::Verbosity;
use crate::release::{self, ReleaseOptions};

/// Runs the release pipeline and prints where everything landed.
pub async fn run(
    config: &Config,
    workspace_root: &Path,
    app: &str,
    options: &ReleaseOptions,
    verbosity: Verbosity,
) -> anyhow::Result<()> {
    if !verbosity.quiet {
        println!(
            "{} {} {}",
            style("Release:").cyan(),
            style(app).green().bold(),
            style(if options.local {
                "(local)".to_string()
            } else {
                format!("({})", options.environment.as_str())
            })
            .dim()
        );
    }

    let report = release::run(config, workspace_root, app, options, verbosity).await?;

    if !verbosity.quiet {
        println!();
        println!(
            "{} {}",
            style("Version:").cyan(),
            style(&report.artifact.version).green().bold()
        );
        println!(
            "{} {}",
            style("Release:").cyan(),
            report.release_archive.display()
        );
        if let Some(bundle) = &report.bundle_archive {
            println!("{} {}", style("Bundle:").cyan(), bundle.display());
        }
        if let Some(source) = &report.source_archive {
            println!("{} {}", style("Source:").cyan(), source.display());
        }
    }
    Ok(())
}
