// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! `dbup` and `dbdown`.

use console::style;

use crate::config::Config;
use crate::database::Database;
use crate::progress::{step, Verbosity};

/// Starts the database container of this workspace instance.
pub async fn up(config: &Config, verbosity: Verbosity) -> anyhow::Result<()> {
    let db = Database::new(&config.database, config.workspace.offset)?;
    let started = step(&format!("Starting {}", db.name()), verbosity, db.up()).await?;

    if !verbosity.quiet {
        let state = if started { "started" } else { "already running" };
        println!(
            "{} {} {}",
            style("Database:").cyan(),
            style(format!("localhost:{}", db.host_port())).green().bold(),
            style(format!("({})", state)).dim()
        );
    }
    Ok(())
}

/// Stops and removes the database container.
pub async fn down(config: &Config, verbosity: Verbosity) -> anyhow::Result<()> {
    let db = Database::new(&config.database, config.workspace.offset)?;
    step(&format!("Stopping {}", db.name()), verbosity, db.down()).await?;
    Ok(())
}
