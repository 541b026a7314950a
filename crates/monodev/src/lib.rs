// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

// Warn on missing documentation for public items
#![warn(missing_docs)]

//! # monodev
//!
//! Core of the monodev development orchestrator for monorepo applications.
//!
//! Every application in the workspace has three targets (backend, frontend,
//! client bundle). This crate holds the parts of running and releasing them
//! that do not touch processes or terminals:
//!
//! - [`RunContext`] and the per-target environment ([`env::resolve_env`])
//! - the [`logs::LogMultiplexer`] with its bounded buffers and scrollback
//! - the [`shutdown::ShutdownCoordinator`] teardown state machine
//! - release naming, dependency extraction and alias rewriting ([`release`])
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use monodev::{env::resolve_env, RunContext, Target};
//!
//! let ctx = RunContext::builder("/work/platform", "shop")
//!     .workspace_offset(2)
//!     .build()?;
//! let env = resolve_env(&ctx, Target::Backend);
//! assert_eq!(env["PORT"], "8082");
//! ```

/// Resolved per-invocation context.
pub mod context;
/// Environment resolution and port arithmetic.
pub mod env;
/// Error types.
pub mod error;
/// Log buffering, multiplexing and display re-flow.
pub mod logs;
/// Release layout, dependency extraction and alias rewriting.
pub mod release;
/// Ordered shutdown state machine.
pub mod shutdown;
/// The supervised targets.
pub mod target;

pub use context::{BackendHost, OperationMode, RunContext, RunContextBuilder};
pub use error::{Error, Result};
pub use target::{Target, TargetSpec};
