// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

// Warn on missing documentation for public items
#![warn(missing_docs)]

//! monodev CLI library.
//!
//! Everything in `monodev` that spawns processes, binds sockets, talks to
//! Docker or draws to the terminal lives here; the pure parts are in the
//! `monodev` crate.
//!
//! # Usage
//!
//! This crate is primarily used through the `monodev` binary:
//!
//! ```bash
//! monodev start shop --db      # Supervise backend, frontend and client bundle
//! monodev build shop           # Build targets only
//! monodev release-source shop  # Build, package and export a release
//! monodev dbup                 # Start the database container
//! ```
//!
//! # Configuration
//!
//! Workspaces are configured via `monodev.toml` at the workspace root.

/// CLI commands (start, build, release-source, dbup, dbdown).
pub mod commands;
/// Workspace configuration from `monodev.toml`.
pub mod config;
/// Local database container.
pub mod database;
/// Step spinners and ✓/✗ lines.
pub mod progress;
/// Release pipeline and source export.
pub mod release;
/// Target processes and the in-process client bundle server.
pub mod supervisor;
/// Terminal log view.
pub mod tui;
