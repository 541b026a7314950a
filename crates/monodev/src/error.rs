// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Error types for the monodev core.
//!
//! # Error Categories
//!
//! - **Setup errors**: invalid workspace input that stops a command before
//!   anything is launched (unknown target, unconfigured backend host,
//!   malformed `.env` or manifest)
//! - **I/O errors**: filesystem failures while reading workspace files

use thiserror::Error;

/// The main error type for monodev core operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A target name did not match `backend`, `frontend` or `clientBundle`.
    #[error("Unknown target: {0} (expected backend, frontend or clientBundle)")]
    UnknownTarget(String),

    /// A backend host selection name was not recognised.
    #[error("Unknown backend host: {0} (expected local, debug, develop or main)")]
    UnknownBackendHost(String),

    /// A remote backend host was selected but no URL is configured for it.
    #[error("No URL configured for backend host '{0}'; add it under [backend_hosts] in monodev.toml")]
    MissingBackendHost(String),

    /// The `.env` file exists but could not be parsed.
    #[error("Invalid .env file at {path}: {message}")]
    InvalidDotenv {
        /// Path of the offending file.
        path: String,
        /// Parser message.
        message: String,
    },

    /// A JSON manifest (package.json, tsconfig) could not be read.
    #[error("Invalid manifest {path}: {source}")]
    InvalidManifest {
        /// Path of the offending file.
        path: String,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// A port computation overflowed `u16`.
    #[error("Port {base} + offset {offset} does not fit in a TCP port")]
    PortOverflow {
        /// Canonical base port of the target.
        base: u16,
        /// Workspace offset.
        offset: u16,
    },

    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for Results with [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
