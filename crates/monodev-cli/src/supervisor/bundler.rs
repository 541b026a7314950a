// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! In-process client bundle server.
//!
//! Serves the bundle output over HTTP, rebuilds it when sources change and
//! tells connected browsers to reload. Diagnostics are published as
//! [`BundlerEvent`]s on a broadcast channel; one adapter task turns them into
//! [`LogEvent`]s for the client bundle pane.

use axum::{
    extract::{State, WebSocketUpgrade},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use monodev::logs::{LogEntry, LogEvent, Severity};
use monodev::{Target, TargetSpec};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tower_http::services::ServeDir;

use super::child::shell_command;
use super::livereload::{handle_websocket, inject_client, SOCKET_PATH};
use super::watcher::SourceWatcher;
use super::{LogSender, SupervisorError, SupervisorResult};

/// Time open connections get to finish after the server is asked to stop.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Diagnostic published by the bundler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundlerEvent {
    /// Progress message.
    Info(String),
    /// Non-fatal problem.
    Warn(String),
    /// Failed build or server error.
    Error(String),
    /// A rebuild started; earlier output is obsolete.
    Clear,
}

impl BundlerEvent {
    /// Classifies one line of build tool output.
    pub fn from_line(line: &str) -> Self {
        match Severity::classify(line) {
            Severity::Info => BundlerEvent::Info(line.to_string()),
            Severity::Warn => BundlerEvent::Warn(line.to_string()),
            Severity::Error => BundlerEvent::Error(line.to_string()),
        }
    }

    /// The equivalent multiplexer event.
    pub fn into_log_event(self) -> LogEvent {
        let entry = |severity: Severity, text: String| {
            LogEvent::Entry(LogEntry::new(Target::ClientBundle, severity, text))
        };
        match self {
            BundlerEvent::Info(text) => entry(Severity::Info, text),
            BundlerEvent::Warn(text) => entry(Severity::Warn, text),
            BundlerEvent::Error(text) => entry(Severity::Error, text),
            BundlerEvent::Clear => LogEvent::Clear(Target::ClientBundle),
        }
    }
}

/// Handle to the running server, watcher and rebuild loop.
#[derive(Debug)]
pub struct BundlerHandle {
    addr: SocketAddr,
    watcher: Option<SourceWatcher>,
    shutdown_tx: Option<watch::Sender<bool>>,
    server: Option<JoinHandle<()>>,
    tasks: Vec<JoinHandle<()>>,
}

impl BundlerHandle {
    /// Address the server listens on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Closes the server, the watcher and the rebuild loop.
    pub async fn stop(&mut self) {
        // Dropping the watcher ends change notifications first
        self.watcher.take();

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(true);
        }
        if let Some(mut server) = self.server.take() {
            if tokio::time::timeout(CLOSE_TIMEOUT, &mut server).await.is_err() {
                tracing::warn!("Client bundle server did not close in time, aborting");
                server.abort();
            }
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }

    /// Whether [`BundlerHandle::stop`] has completed.
    pub fn is_stopped(&self) -> bool {
        self.server.is_none()
    }
}

struct ServerState {
    output_dir: PathBuf,
    reload_tx: broadcast::Sender<()>,
    shutdown_rx: watch::Receiver<bool>,
}

/// Builds once, then serves `spec.output_dir` on `127.0.0.1:port`.
pub async fn start(
    spec: &TargetSpec,
    env: BTreeMap<String, String>,
    port: u16,
    events: LogSender,
) -> SupervisorResult<BundlerHandle> {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| SupervisorError::Bind { port, source })?;

    let (diag_tx, diag_rx) = broadcast::channel::<BundlerEvent>(256);
    let (reload_tx, _) = broadcast::channel::<()>(16);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (rebuild_tx, rebuild_rx) = mpsc::unbounded_channel::<Vec<PathBuf>>();

    let adapter = tokio::spawn(forward_diagnostics(diag_rx, events));

    let builder = Rebuilder {
        command: spec.build_command.clone(),
        dir: spec.dir.clone(),
        env,
        diag_tx: diag_tx.clone(),
        reload_tx: reload_tx.clone(),
    };
    let rebuilds = tokio::spawn(builder.run(rebuild_rx));
    // Initial build
    let _ = rebuild_tx.send(Vec::new());

    let watcher = match &spec.watch_dir {
        Some(dir) if dir.is_dir() => {
            let tx = rebuild_tx.clone();
            let watcher = SourceWatcher::new(dir, spec.output_dir.clone(), move |paths| {
                let _ = tx.send(paths);
            })
            .map_err(|source| SupervisorError::Watch {
                dir: dir.clone(),
                source,
            })?;
            Some(watcher)
        }
        Some(dir) => {
            let _ = diag_tx.send(BundlerEvent::Warn(format!(
                "Watch directory {} not found; rebuilds are disabled",
                dir.display()
            )));
            None
        }
        None => None,
    };

    let state = Arc::new(ServerState {
        output_dir: spec.output_dir.clone(),
        reload_tx,
        shutdown_rx: shutdown_rx.clone(),
    });
    let app = Router::new()
        .route(SOCKET_PATH, get(livereload_handler))
        .route("/", get(index_handler))
        .route("/index.html", get(index_handler))
        .fallback_service(ServeDir::new(&spec.output_dir))
        .with_state(state);

    let mut graceful = shutdown_rx;
    let server_diag = diag_tx.clone();
    let server = tokio::spawn(async move {
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = graceful.changed().await;
            })
            .await;
        if let Err(e) = result {
            let _ = server_diag.send(BundlerEvent::Error(format!("Server error: {}", e)));
        }
    });

    let _ = diag_tx.send(BundlerEvent::Info(format!("Serving on http://{}", addr)));
    tracing::info!("Client bundle server listening on {}", addr);

    Ok(BundlerHandle {
        addr,
        watcher,
        shutdown_tx: Some(shutdown_tx),
        server: Some(server),
        tasks: vec![rebuilds, adapter],
    })
}

async fn forward_diagnostics(mut diag_rx: broadcast::Receiver<BundlerEvent>, events: LogSender) {
    loop {
        match diag_rx.recv().await {
            Ok(event) => {
                if events.send(event.into_log_event()).is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                let _ = events.send(
                    BundlerEvent::Warn(format!("{} diagnostics dropped", n)).into_log_event(),
                );
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

struct Rebuilder {
    command: String,
    dir: PathBuf,
    env: BTreeMap<String, String>,
    diag_tx: broadcast::Sender<BundlerEvent>,
    reload_tx: broadcast::Sender<()>,
}

impl Rebuilder {
    async fn run(self, mut rebuild_rx: mpsc::UnboundedReceiver<Vec<PathBuf>>) {
        while let Some(mut paths) = rebuild_rx.recv().await {
            // Coalesce batches that queued up during the previous build
            while let Ok(more) = rebuild_rx.try_recv() {
                paths.extend(more);
            }
            self.build(&paths).await;
        }
    }

    async fn build(&self, changed: &[PathBuf]) {
        if self.command.trim().is_empty() {
            let _ = self.reload_tx.send(());
            return;
        }

        let _ = self.diag_tx.send(BundlerEvent::Clear);
        if !changed.is_empty() {
            let display = changed
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ");
            let _ = self.diag_tx.send(BundlerEvent::Info(format!("Changed: {}", display)));
        }

        let start = Instant::now();
        let output = shell_command(&self.command)
            .current_dir(&self.dir)
            .envs(&self.env)
            .stdin(std::process::Stdio::null())
            .output()
            .await;

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                let _ = self.diag_tx.send(BundlerEvent::Error(format!(
                    "Failed to run `{}`: {}",
                    self.command, e
                )));
                return;
            }
        };

        for bytes in [&output.stdout, &output.stderr] {
            for line in String::from_utf8_lossy(bytes).lines() {
                if !line.trim().is_empty() {
                    let _ = self.diag_tx.send(BundlerEvent::from_line(line));
                }
            }
        }

        let elapsed = start.elapsed().as_millis();
        if output.status.success() {
            let _ = self
                .diag_tx
                .send(BundlerEvent::Info(format!("Build finished in {}ms", elapsed)));
            let _ = self.reload_tx.send(());
        } else {
            let _ = self.diag_tx.send(BundlerEvent::Error(format!(
                "Build failed ({}) after {}ms",
                output.status, elapsed
            )));
        }
    }
}

async fn livereload_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> impl IntoResponse {
    let rx = state.reload_tx.subscribe();
    let shutdown = state.shutdown_rx.clone();
    ws.on_upgrade(move |socket| handle_websocket(socket, rx, shutdown))
}

async fn index_handler(State(state): State<Arc<ServerState>>) -> Response {
    match tokio::fs::read_to_string(state.output_dir.join("index.html")).await {
        Ok(html) => Html(inject_client(&html)).into_response(),
        Err(_) => (
            StatusCode::NOT_FOUND,
            "Client bundle not built yet; check the clientBundle pane",
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use monodev::logs::LogMultiplexer;
    use std::path::Path;

    #[test]
    fn test_events_map_to_pane() {
        assert_eq!(
            BundlerEvent::Clear.into_log_event(),
            LogEvent::Clear(Target::ClientBundle)
        );
        match BundlerEvent::from_line("ERROR: could not resolve './x'").into_log_event() {
            LogEvent::Entry(entry) => {
                assert_eq!(entry.severity, Severity::Error);
                assert_eq!(entry.target, Target::ClientBundle);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            BundlerEvent::from_line("warning: large chunk"),
            BundlerEvent::Warn(_)
        ));
    }

    #[test]
    fn test_clear_empties_pane() {
        let mut mux = LogMultiplexer::new(100);
        for line in ["Build finished in 12ms", "warning: large chunk"] {
            mux.apply(BundlerEvent::from_line(line).into_log_event());
        }
        assert_eq!(mux.buffer(Target::ClientBundle).len(), 2);

        mux.apply(BundlerEvent::Clear.into_log_event());
        assert!(mux.buffer(Target::ClientBundle).is_empty());
    }

    fn free_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    fn client_spec(root: &Path) -> TargetSpec {
        TargetSpec {
            target: Target::ClientBundle,
            command: String::new(),
            build_command: "mkdir -p dist && printf '<html><body>shop</body></html>' > dist/index.html"
                .to_string(),
            output_dir: root.join("dist"),
            config_file: root.join("src/monodev.env.json"),
            watch_dir: None,
            env: BTreeMap::new(),
            dir: root.to_path_buf(),
        }
    }

    async fn http_get(addr: SocketAddr, path: &str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        let request = format!(
            "GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
            path
        );
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_serves_built_index_and_releases_port_on_stop() {
        let dir = tempfile::tempdir().unwrap();
        let spec = client_spec(dir.path());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut mux = LogMultiplexer::new(100);
        mux.push_entry(LogEntry::new(Target::ClientBundle, Severity::Info, "stale output"));

        let handle = start(&spec, BTreeMap::new(), free_port(), tx).await.unwrap();
        let addr = handle.addr();

        tokio::time::timeout(Duration::from_secs(10), async {
            while let Some(event) = rx.recv().await {
                mux.apply(event);
                let built = mux
                    .buffer(Target::ClientBundle)
                    .iter()
                    .any(|entry| entry.text.starts_with("Build finished"));
                if built {
                    break;
                }
            }
        })
        .await
        .expect("initial build finishes");
        assert!(mux
            .buffer(Target::ClientBundle)
            .iter()
            .all(|entry| entry.text != "stale output"));

        let response = http_get(addr, "/index.html").await;
        assert!(response.starts_with("HTTP/1.1 200"), "{}", response);
        assert!(response.contains("<body>shop"));
        assert!(response.contains(SOCKET_PATH));

        let mut handle = super::super::ProcessHandle::InProcess(handle);
        handle.stop().await;
        assert!(handle.is_stopped());
        handle.stop().await;
        assert!(handle.is_stopped());

        let rebound = tokio::net::TcpListener::bind(addr).await;
        assert!(rebound.is_ok(), "port {} still held", addr.port());
    }

    #[tokio::test]
    async fn test_index_before_first_build_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut spec = client_spec(dir.path());
        spec.build_command = String::new();
        let (tx, _rx) = mpsc::unbounded_channel();

        let mut handle = start(&spec, BTreeMap::new(), free_port(), tx).await.unwrap();
        let response = http_get(handle.addr(), "/").await;
        assert!(response.starts_with("HTTP/1.1 404"), "{}", response);

        handle.stop().await;
        assert!(handle.is_stopped());
    }
}
