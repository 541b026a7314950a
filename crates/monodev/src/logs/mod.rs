// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Log multiplexing for the supervised targets.
//!
//! Output of every target ends up as [`LogEntry`] values in that target's
//! [`LogBuffer`]. The [`LogMultiplexer`] owns one buffer and one
//! [`ScrollState`] per target and answers "what is visible right now".
//!
//! # Partial lines
//!
//! Child output arrives in arbitrary chunks. Complete lines become entries
//! immediately; a trailing partial line is buffered per target and stream
//! until a later chunk completes it or the stream ends.

mod buffer;
mod entry;
mod multiplexer;
mod splitter;
mod wrap;

pub use buffer::LogBuffer;
pub use entry::{LogEntry, Severity, Stream};
pub use multiplexer::{LogEvent, LogMultiplexer, ScrollState, FAST_SCROLL};
pub use splitter::LineSplitter;
pub use wrap::{display_width, strip_ansi, wrap_entry, DisplayRow};
