// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! `start`: launch every target of an application and multiplex their logs.

use anyhow::{bail, Context};
use console::style;
use crossterm::event::{self, Event, KeyEvent};
use monodev::env::resolve_env;
use monodev::logs::{LogEntry, LogEvent, LogMultiplexer, Severity};
use monodev::shutdown::{ShutdownCoordinator, ShutdownState, Teardown, TeardownStep};
use monodev::{BackendHost, OperationMode, RunContext, Target};
use ratatui::layout::Rect;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::StartOptions;
use crate::config::Config;
use crate::database::Database;
use crate::progress::{step, Step, Verbosity};
use crate::supervisor::{self, child::shell_command, ProcessHandle};
use crate::tui::{self, KeyOutcome};

const KEY_POLL: Duration = Duration::from_millis(100);
const FRAME_INTERVAL: Duration = Duration::from_millis(50);

/// Everything a `start` run owns and must release on shutdown.
struct Resources {
    handles: BTreeMap<Target, ProcessHandle>,
    log_tx: Option<supervisor::LogSender>,
    log_rx: Option<mpsc::UnboundedReceiver<LogEvent>>,
    database: Option<Database>,
    database_started: bool,
}

impl Resources {
    async fn stop(&mut self, target: Target) {
        if let Some(handle) = self.handles.get_mut(&target) {
            handle.stop().await;
            tracing::info!("{} stopped", target);
        }
    }
}

impl Teardown for Resources {
    fn database_started(&self) -> bool {
        self.database_started
    }

    async fn teardown(&mut self, step: TeardownStep) {
        match step {
            TeardownStep::CloseClientBundle => self.stop(Target::ClientBundle).await,
            TeardownStep::StopBackend => self.stop(Target::Backend).await,
            TeardownStep::StopFrontend => self.stop(Target::Frontend).await,
            TeardownStep::DetachLogListeners => {
                self.log_tx.take();
                if let Some(mut rx) = self.log_rx.take() {
                    rx.close();
                }
            }
            TeardownStep::StopDatabase => {
                if let Some(db) = &self.database {
                    if let Err(e) = db.down().await {
                        tracing::error!("Failed to stop {}: {}", db.name(), e);
                    }
                }
            }
        }
    }
}

/// Targets to launch: `only` (or all) minus those without a directory.
///
/// Explicitly requested targets must exist. A remote backend host means the
/// local backend is not started.
fn select_targets(ctx: &RunContext, options: &StartOptions) -> anyhow::Result<Vec<Target>> {
    let explicit = !options.only.is_empty();
    let requested: Vec<Target> = if explicit {
        options.only.clone()
    } else {
        Target::ALL.to_vec()
    };

    let mut selected = Vec::new();
    for target in requested {
        if target == Target::Backend && options.backend_host != BackendHost::Local {
            tracing::info!(
                "Using {} backend, not starting the local one",
                options.backend_host.as_str()
            );
            continue;
        }
        let Some(spec) = ctx.target(target) else {
            continue;
        };
        if spec.dir.is_dir() {
            selected.push(target);
        } else if explicit {
            bail!("{} directory {} does not exist", target, spec.dir.display());
        } else {
            tracing::debug!("Skipping {}: no {}", target, spec.dir.display());
        }
    }

    if selected.is_empty() {
        bail!("Nothing to start for {}", ctx.app());
    }
    selected.sort();
    selected.dedup();
    Ok(selected)
}

async fn run_sync(ctx: &RunContext, command_line: &str, verbosity: Verbosity) -> anyhow::Result<()> {
    let spec = ctx
        .target(Target::Backend)
        .context("backend target is not configured")?;
    let env = resolve_env(ctx, Target::Backend);

    let step = Step::start(format!("Syncing database ({})", command_line), verbosity);
    let output = shell_command(command_line)
        .current_dir(&spec.dir)
        .envs(&env)
        .output()
        .await
        .with_context(|| format!("failed to run {}", command_line))?;

    if output.status.success() {
        step.ok();
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    step.fail(&output.status);
    bail!("Database sync failed: {}", stderr)
}

fn spawn_key_reader(stop: Arc<AtomicBool>) -> mpsc::UnboundedReceiver<KeyEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        while !stop.load(Ordering::Relaxed) {
            match event::poll(KEY_POLL) {
                Ok(true) => {
                    if let Ok(Event::Key(key)) = event::read() {
                        if tx.send(key).is_err() {
                            break;
                        }
                    }
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!("Terminal event error: {}", e);
                    break;
                }
            }
        }
    });
    rx
}

/// Interrupt requests (SIGINT) for one invocation.
type Interrupts = mpsc::UnboundedReceiver<()>;

/// Installs the only interrupt handler of the invocation.
///
/// Every Ctrl+C becomes a message; the first one read starts the shutdown,
/// later ones are swallowed so they cannot kill the process mid-teardown.
fn listen_for_interrupts() -> (Interrupts, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let listener = tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received");
            if tx.send(()).is_err() {
                break;
            }
        }
    });
    (rx, listener)
}

fn interrupted(interrupts: &mut Interrupts) -> bool {
    interrupts.try_recv().is_ok()
}

/// How far [`launch`] got.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Launch {
    /// Everything requested is running.
    Ready,
    /// An interrupt arrived before startup finished.
    Interrupted,
}

/// Runs the supervised development session until the user quits.
pub async fn run(
    config: &Config,
    workspace_root: &Path,
    app: &str,
    options: StartOptions,
    verbosity: Verbosity,
) -> anyhow::Result<()> {
    let with_database = options.db || config.database.enabled;
    let ctx = config.run_context(
        workspace_root,
        app,
        OperationMode::Local,
        options.backend_host,
        with_database,
    )?;
    let targets = select_targets(&ctx, &options)?;

    if !verbosity.quiet {
        println!(
            "{} {} {}",
            style("Starting:").cyan(),
            style(app).green().bold(),
            style(format!("(offset {})", ctx.workspace_offset())).dim()
        );
    }

    let (log_tx, log_rx) = mpsc::unbounded_channel();
    let mut resources = Resources {
        handles: BTreeMap::new(),
        log_tx: Some(log_tx),
        log_rx: Some(log_rx),
        database: None,
        database_started: false,
    };
    let coordinator = ShutdownCoordinator::new();
    let (mut interrupts, listener) = listen_for_interrupts();

    let launched = launch(
        &ctx,
        config,
        &targets,
        options.sync,
        &mut resources,
        &mut interrupts,
        verbosity,
    )
    .await;

    let session = match launched {
        Err(e) => Err(e),
        Ok(Launch::Interrupted) => {
            tracing::info!("Interrupted during startup");
            Ok(())
        }
        Ok(Launch::Ready) => {
            if options.open && resources.handles.contains_key(&Target::Frontend) {
                let url = format!("http://localhost:{}", ctx.port(Target::Frontend));
                if let Err(e) = open::that(&url) {
                    tracing::warn!("Could not open {}: {}", url, e);
                }
            }
            supervise(&ctx, &mut resources, &mut interrupts, config.logs.max_lines).await
        }
    };

    coordinator.shutdown(&mut resources).await;
    debug_assert_eq!(coordinator.state(), ShutdownState::Terminated);
    listener.abort();
    session
}

/// Starts the database, runs the sync and spawns `targets`, in that order.
///
/// Whatever was started is recorded in `resources` as soon as it is up, so
/// the caller can tear it down however this returns. The container step
/// runs to completion before an interrupt is honoured; the sync command is
/// killed by one.
async fn launch(
    ctx: &RunContext,
    config: &Config,
    targets: &[Target],
    sync: bool,
    resources: &mut Resources,
    interrupts: &mut Interrupts,
    verbosity: Verbosity,
) -> anyhow::Result<Launch> {
    if let Some(port) = ctx.database_port() {
        let db = Database::new(&config.database, ctx.workspace_offset())?;
        let label = format!("Database {} on :{}", db.name(), port);
        let started = step(&label, verbosity, db.up()).await;
        resources.database = Some(db);
        resources.database_started = started?;
        if interrupted(interrupts) {
            return Ok(Launch::Interrupted);
        }
    }

    if sync {
        match &config.database.sync_command {
            Some(command) => {
                tokio::select! {
                    result = run_sync(ctx, command, verbosity) => result?,
                    Some(()) = interrupts.recv() => return Ok(Launch::Interrupted),
                }
            }
            None => tracing::warn!("--sync given but database.sync_command is not set"),
        }
    }

    let Some(log_tx) = resources.log_tx.clone() else {
        return Ok(Launch::Interrupted);
    };
    for &target in targets {
        if interrupted(interrupts) {
            return Ok(Launch::Interrupted);
        }
        let label = format!("{} on :{}", target, ctx.port(target));
        let handle = step(&label, verbosity, supervisor::start(ctx, target, log_tx.clone())).await?;
        resources.handles.insert(target, handle);
    }
    Ok(Launch::Ready)
}

/// Drives the terminal until the user quits or an interrupt arrives.
async fn supervise(
    ctx: &RunContext,
    resources: &mut Resources,
    interrupts: &mut Interrupts,
    max_lines: usize,
) -> anyhow::Result<()> {
    let Some(mut log_rx) = resources.log_rx.take() else {
        return Ok(());
    };

    let mut mux = LogMultiplexer::new(max_lines);
    mux.push_entry(LogEntry::new(
        mux.focused(),
        Severity::Info,
        "[monodev] press q to quit, tab to switch targets",
    ));

    let (mut terminal, guard) = match tui::enter() {
        Ok(entered) => entered,
        Err(e) => {
            resources.log_rx = Some(log_rx);
            return Err(e);
        }
    };
    let stop_keys = Arc::new(AtomicBool::new(false));
    let mut keys = spawn_key_reader(stop_keys.clone());

    let mut tick = tokio::time::interval(FRAME_INTERVAL);
    let result = loop {
        tokio::select! {
            Some(event) = log_rx.recv() => mux.apply(event),
            Some(key) = keys.recv() => {
                if tui::handle_key(&mut mux, key) == KeyOutcome::Quit {
                    break Ok(());
                }
            }
            Some(()) = interrupts.recv() => break Ok(()),
            _ = tick.tick() => {
                let size = match terminal.size() {
                    Ok(size) => size,
                    Err(e) => break Err(e.into()),
                };
                let (height, width) = tui::log_viewport(Rect::new(0, 0, size.width, size.height));
                mux.set_viewport(height, width);
                if let Err(e) = terminal.draw(|frame| tui::draw(frame, &mux, ctx)) {
                    break Err(e.into());
                }
            }
        }
    };

    stop_keys.store(true, Ordering::Relaxed);
    drop(guard);
    resources.log_rx = Some(log_rx);
    result
}
