// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

use anyhow::Context;
use clap::{Parser, Subcommand};
use monodev::{BackendHost, Target};
use monodev_cli::commands::{self, Action, CommandDescriptor, StartOptions};
use monodev_cli::progress::Verbosity;
use monodev_cli::release::ReleaseOptions;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "monodev")]
#[command(author = "Maravilla Labs")]
#[command(version)]
#[command(about = "Run, supervise and release monorepo applications", long_about = None)]
struct Cli {
    /// Log level: error, warn, info, debug, trace
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Workspace root (defaults to the nearest directory with a monodev.toml)
    #[arg(long, global = true)]
    workspace: Option<PathBuf>,

    /// Verbose mode: show all tool output without filtering
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: only show errors (useful for CI)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start every target of an application with multiplexed logs
    Start {
        /// Application directory name under apps/
        app: String,
        /// Open the frontend in the browser
        #[arg(long)]
        open: bool,
        /// Sync the database schema before launching
        #[arg(long)]
        sync: bool,
        /// Only start these targets (repeatable)
        #[arg(long = "only", value_name = "TARGET")]
        only: Vec<Target>,
        /// Start the database container
        #[arg(long)]
        db: bool,
        /// Backend the frontends talk to: local, debug, develop, main
        #[arg(long, default_value = "local")]
        backend_host: BackendHost,
    },
    /// Build targets without starting them
    Build {
        /// Application directory name under apps/
        app: String,
        /// Targets to build (repeatable, all by default)
        #[arg(long = "target", value_name = "TARGET")]
        targets: Vec<Target>,
    },
    /// Build, package and export a release
    #[command(name = "release-source")]
    ReleaseSource {
        /// Application directory name under apps/
        app: String,
        /// Rebuild targets even when their outputs are fresh
        #[arg(long)]
        rebuild: bool,
        /// Build number appended to the platform version
        #[arg(long = "build-num")]
        build_number: Option<u32>,
        /// Backend host baked into the release: debug, develop, main
        #[arg(long, default_value = "main")]
        environment: BackendHost,
        /// Build against the local backend
        #[arg(long)]
        local: bool,
        /// Skip the source export
        #[arg(long)]
        skip_export: bool,
    },
    /// Start the local database container
    Dbup,
    /// Stop the local database container
    Dbdown,
}

impl Commands {
    fn into_descriptor(self) -> CommandDescriptor {
        match self {
            Commands::Start {
                app,
                open,
                sync,
                only,
                db,
                backend_host,
            } => CommandDescriptor {
                app: Some(app),
                action: Action::Start(StartOptions {
                    open,
                    sync,
                    only,
                    db,
                    backend_host,
                }),
            },
            Commands::Build { app, targets } => CommandDescriptor {
                app: Some(app),
                action: Action::Build(targets),
            },
            Commands::ReleaseSource {
                app,
                rebuild,
                build_number,
                environment,
                local,
                skip_export,
            } => CommandDescriptor {
                app: Some(app),
                action: Action::ReleaseSource(ReleaseOptions {
                    rebuild,
                    build_number,
                    environment,
                    local,
                    skip_export,
                }),
            },
            Commands::Dbup => CommandDescriptor {
                app: None,
                action: Action::DbUp,
            },
            Commands::Dbdown => CommandDescriptor {
                app: None,
                action: Action::DbDown,
            },
        }
    }
}

/// The terminal belongs to the log view during `start`, so tracing goes to a file.
fn init_tracing(log_level: &str, log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("warn"));

    match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let start_dir = match cli.workspace {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    let workspace_root = commands::find_workspace_root(&start_dir);

    let log_file = matches!(cli.command, Commands::Start { .. })
        .then(|| workspace_root.join(".monodev").join("monodev.log"));
    init_tracing(&cli.log_level, log_file.as_deref())?;

    let verbosity = Verbosity {
        verbose: cli.verbose,
        quiet: cli.quiet,
    };
    commands::dispatch(&workspace_root, cli.command.into_descriptor(), verbosity).await
}
