// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Ordered, run-once teardown of everything a `start` invocation owns.
//!
//! The coordinator moves `Running -> ShuttingDown -> Terminated` exactly
//! once. Triggers that arrive after the first one are ignored, so a second
//! Ctrl+C during teardown never closes anything twice.

use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    /// Targets are running.
    Running,
    /// Teardown is in progress.
    ShuttingDown,
    /// Teardown finished; the process may exit.
    Terminated,
}

impl ShutdownState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ShutdownState::Running,
            1 => ShutdownState::ShuttingDown,
            _ => ShutdownState::Terminated,
        }
    }
}

/// One teardown step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownStep {
    /// Close the in-process client bundle server.
    CloseClientBundle,
    /// Terminate the backend process.
    StopBackend,
    /// Terminate the frontend process.
    StopFrontend,
    /// Detach every log listener.
    DetachLogListeners,
    /// Stop the database container started for this run.
    StopDatabase,
}

impl TeardownStep {
    /// The fixed teardown order.
    ///
    /// The in-process server holds open sockets and goes first; the database
    /// goes last because earlier steps may still be flushing through it.
    pub const ORDER: [TeardownStep; 5] = [
        TeardownStep::CloseClientBundle,
        TeardownStep::StopBackend,
        TeardownStep::StopFrontend,
        TeardownStep::DetachLogListeners,
        TeardownStep::StopDatabase,
    ];
}

/// Resources the coordinator tears down.
#[allow(async_fn_in_trait)]
pub trait Teardown {
    /// Whether a database container was started by this run.
    fn database_started(&self) -> bool;

    /// Performs one step. Failures are the implementor's to report.
    async fn teardown(&mut self, step: TeardownStep);
}

/// Run-once shutdown state machine.
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    state: AtomicU8,
}

impl ShutdownCoordinator {
    /// Creates a coordinator in the `Running` state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn state(&self) -> ShutdownState {
        ShutdownState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Claims the shutdown. Returns false if it was already claimed.
    pub fn begin(&self) -> bool {
        self.state
            .compare_exchange(0, 1, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Runs the teardown sequence if this is the first trigger.
    ///
    /// Returns true when this call performed the teardown; the caller then
    /// exits the process with code 0.
    pub async fn shutdown<T: Teardown>(&self, resources: &mut T) -> bool {
        if !self.begin() {
            tracing::debug!("Shutdown already in progress, ignoring trigger");
            return false;
        }

        tracing::info!("Shutting down");
        for step in TeardownStep::ORDER {
            if step == TeardownStep::StopDatabase && !resources.database_started() {
                continue;
            }
            tracing::debug!(?step, "Teardown step");
            resources.teardown(step).await;
        }

        self.state.store(2, Ordering::SeqCst);
        true
    }
}
