// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! `build`: run target builds without supervision or packaging.

use anyhow::bail;
use console::style;
use monodev::env::resolve_env;
use monodev::{BackendHost, OperationMode, Target};
use std::path::Path;

use crate::config::Config;
use crate::progress::{Step, Verbosity};
use crate::release::build::{build_target, stamp_path};

/// Builds `targets` of `app` (every target with a directory when empty).
pub async fn run(
    config: &Config,
    workspace_root: &Path,
    app: &str,
    targets: &[Target],
    verbosity: Verbosity,
) -> anyhow::Result<()> {
    let ctx = config.run_context(
        workspace_root,
        app,
        OperationMode::Local,
        BackendHost::Local,
        false,
    )?;

    let selected: Vec<Target> = if targets.is_empty() {
        ctx.targets()
            .filter(|spec| spec.dir.is_dir())
            .map(|spec| spec.target)
            .collect()
    } else {
        targets.to_vec()
    };
    if selected.is_empty() {
        bail!("Nothing to build for {}", app);
    }

    if !verbosity.quiet {
        println!(
            "{} {}",
            style("Building:").cyan(),
            style(app).green().bold()
        );
    }

    for target in selected {
        let Some(spec) = ctx.target(target) else {
            continue;
        };
        let env = resolve_env(&ctx, target);
        let stamp = stamp_path(workspace_root, app, target);

        let step = Step::start(format!("{} ({})", target, spec.build_command), verbosity);
        match build_target(spec, &env, &stamp, true, verbosity.verbose).await {
            Ok(_) => step.ok_with(spec.output_dir.display().to_string()),
            Err(e) => {
                step.fail(&e);
                return Err(e.into());
            }
        }
    }
    Ok(())
}
