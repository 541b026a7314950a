// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Child process targets.
//!
//! Each child runs through the platform shell in its own process group so a
//! stop reaches the whole tree (`npm` -> `node` -> watchers). Output is read
//! in raw chunks; splitting into lines happens in the multiplexer.

use monodev::logs::{LogEntry, LogEvent, Severity, Stream};
use monodev::Target;
use std::collections::BTreeMap;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::{LogSender, SupervisorError, SupervisorResult};

/// Time a process group gets to exit after SIGTERM.
const GRACE_PERIOD: Duration = Duration::from_secs(3);

/// Time the stream readers get to drain after the process exited.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

const CHUNK_SIZE: usize = 8 * 1024;

/// Handle to a supervised child process.
#[derive(Debug)]
pub struct ChildHandle {
    target: Target,
    pid: Option<u32>,
    stop_tx: Option<oneshot::Sender<()>>,
    supervisor: Option<JoinHandle<()>>,
}

impl ChildHandle {
    /// Target this child runs.
    pub fn target(&self) -> Target {
        self.target
    }

    /// OS process id of the group leader.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Terminates the process group and waits for the child to be reaped.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            // Err means the child already exited on its own.
            let _ = tx.send(());
        }
        if let Some(task) = self.supervisor.take() {
            if let Err(e) = task.await {
                tracing::warn!("{} supervisor task failed: {}", self.target, e);
            }
        }
    }

    /// Whether [`ChildHandle::stop`] has completed.
    pub fn is_stopped(&self) -> bool {
        self.supervisor.is_none()
    }
}

/// Builds a shell invocation of `command_line`.
///
/// The shell is killed when the returned command (or its child) is dropped,
/// so an abandoned `output()` future never leaves it running.
pub fn shell_command(command_line: &str) -> Command {
    #[cfg(windows)]
    let mut cmd = {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(command_line);
        cmd
    };
    #[cfg(not(windows))]
    let mut cmd = {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command_line);
        cmd
    };
    cmd.kill_on_drop(true);
    cmd
}

/// Spawns `command_line` in `dir` with `env` added to the inherited environment.
pub fn spawn(
    target: Target,
    command_line: &str,
    dir: &Path,
    env: &BTreeMap<String, String>,
    events: LogSender,
) -> SupervisorResult<ChildHandle> {
    let mut cmd = shell_command(command_line);
    cmd.current_dir(dir)
        .envs(env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    // New process group with leader = child pid
    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = cmd.spawn().map_err(|source| SupervisorError::Spawn {
        target,
        command: command_line.to_string(),
        source,
    })?;
    let pid = child.id();
    tracing::info!("Started {} (pid {:?}): {}", target, pid, command_line);

    let mut readers = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        readers.push(spawn_reader(target, Stream::Stdout, stdout, events.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(spawn_reader(target, Stream::Stderr, stderr, events.clone()));
    }

    let (stop_tx, stop_rx) = oneshot::channel();
    let supervisor = tokio::spawn(supervise(target, child, readers, stop_rx, events));

    Ok(ChildHandle {
        target,
        pid,
        stop_tx: Some(stop_tx),
        supervisor: Some(supervisor),
    })
}

/// Forwards raw chunks of one stream, then an end-of-stream marker.
fn spawn_reader<R>(target: Target, stream: Stream, mut reader: R, events: LogSender) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = vec![0u8; CHUNK_SIZE];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    let chunk = LogEvent::Chunk {
                        target,
                        stream,
                        bytes: buf[..n].to_vec(),
                    };
                    if events.send(chunk).is_err() {
                        // Listener detached
                        return;
                    }
                }
                Err(e) => {
                    tracing::debug!("{} {:?} read error: {}", target, stream, e);
                    break;
                }
            }
        }
        let _ = events.send(LogEvent::Eof { target, stream });
    })
}

async fn supervise(
    target: Target,
    mut child: Child,
    readers: Vec<JoinHandle<()>>,
    stop_rx: oneshot::Receiver<()>,
    events: LogSender,
) {
    let (status, requested) = tokio::select! {
        status = child.wait() => (status, false),
        _ = stop_rx => (terminate(target, &mut child).await, true),
    };

    drain(target, readers).await;

    match status {
        Ok(status) if requested => {
            tracing::debug!("{} stopped ({})", target, status);
        }
        Ok(status) => {
            tracing::warn!("{} exited on its own ({})", target, status);
            let _ = events.send(LogEvent::Entry(exit_entry(target, status)));
        }
        Err(e) => {
            tracing::error!("Failed to wait for {}: {}", target, e);
            let _ = events.send(LogEvent::Entry(LogEntry::new(
                target,
                Severity::Error,
                format!("[monodev] {} could not be awaited: {}", target, e),
            )));
        }
    }
}

/// Log line describing an unrequested exit.
pub fn exit_entry(target: Target, status: ExitStatus) -> LogEntry {
    let severity = if status.success() {
        Severity::Info
    } else {
        Severity::Error
    };
    LogEntry::new(
        target,
        severity,
        format!("[monodev] {} exited with {}; not restarting", target, status),
    )
}

async fn terminate(target: Target, child: &mut Child) -> std::io::Result<ExitStatus> {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            let pgid = pid as i32;
            tracing::debug!("Sending SIGTERM to process group {} ({})", pgid, target);
            // SAFETY: plain syscall on a process group we created.
            unsafe {
                libc::kill(-pgid, libc::SIGTERM);
            }
        }
    }

    match tokio::time::timeout(GRACE_PERIOD, child.wait()).await {
        Ok(status) => status,
        Err(_) => {
            tracing::warn!("{} ignored SIGTERM, killing", target);
            #[cfg(unix)]
            {
                if let Some(pid) = child.id() {
                    // SAFETY: see above.
                    unsafe {
                        libc::kill(-(pid as i32), libc::SIGKILL);
                    }
                }
            }
            child.kill().await?;
            child.wait().await
        }
    }
}

async fn drain(target: Target, readers: Vec<JoinHandle<()>>) {
    for mut reader in readers {
        // Grandchildren outside the group may hold the pipe open.
        if tokio::time::timeout(DRAIN_TIMEOUT, &mut reader).await.is_err() {
            tracing::debug!("{} output did not close, detaching reader", target);
            reader.abort();
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use monodev::logs::LogMultiplexer;
    use tokio::sync::mpsc;

    async fn collect(mut rx: mpsc::UnboundedReceiver<LogEvent>) -> LogMultiplexer {
        let mut mux = LogMultiplexer::new(100);
        while let Some(event) = rx.recv().await {
            mux.apply(event);
        }
        mux
    }

    #[tokio::test]
    async fn test_output_and_exit_status_reach_pane() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        let mut env = BTreeMap::new();
        env.insert("GREETING".to_string(), "hello".to_string());

        let mut handle = spawn(
            Target::Backend,
            "echo $GREETING; printf 'no newline'; echo 'error: boom' >&2; exit 3",
            dir.path(),
            &env,
            tx,
        )
        .unwrap();

        // Let it exit on its own, then stop is a no-op
        tokio::time::sleep(Duration::from_millis(1000)).await;
        handle.stop().await;
        assert!(handle.is_stopped());
        drop(handle);

        let mux = collect(rx).await;
        let texts: Vec<_> = mux
            .buffer(Target::Backend)
            .iter()
            .map(|e| e.text.clone())
            .collect();
        assert!(texts.contains(&"hello".to_string()));
        assert!(texts.contains(&"no newline".to_string()));
        assert!(texts.iter().any(|t| t.contains("exited with") && t.contains("3")));
        let error = mux
            .buffer(Target::Backend)
            .iter()
            .find(|e| e.text == "error: boom")
            .unwrap();
        assert_eq!(error.severity, Severity::Error);
    }

    #[tokio::test]
    async fn test_stop_is_idempotent_and_silent() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        let mut handle = spawn(
            Target::Frontend,
            "sleep 30",
            dir.path(),
            &BTreeMap::new(),
            tx,
        )
        .unwrap();

        handle.stop().await;
        handle.stop().await;
        assert!(handle.is_stopped());
        drop(handle);

        let mux = collect(rx).await;
        assert!(mux
            .buffer(Target::Frontend)
            .iter()
            .all(|e| !e.text.contains("exited")));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_abandoned_shell_command_is_killed() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("shell.pid");

        let mut cmd = shell_command("echo $$ > shell.pid; exec sleep 30");
        cmd.current_dir(dir.path());
        let waited = tokio::time::timeout(Duration::from_millis(500), cmd.output()).await;
        assert!(waited.is_err());

        let pid = std::fs::read_to_string(&pid_file).unwrap();
        let stat = format!("/proc/{}/stat", pid.trim());
        let mut gone = false;
        for _ in 0..100 {
            gone = match std::fs::read_to_string(&stat) {
                Err(_) => true,
                Ok(s) => s.rsplit(')').next().is_some_and(|rest| rest.trim_start().starts_with('Z')),
            };
            if gone {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(gone, "shell {} outlived its command", pid.trim());
    }
}
