// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

use super::buffer::LogBuffer;
use super::entry::{LogEntry, Stream};
use super::splitter::LineSplitter;
use super::wrap::{wrap_entry, DisplayRow};
use crate::target::Target;

/// Scroll distance of one fast scroll step.
pub const FAST_SCROLL: usize = 10;

/// Per-target scrollback cursor.
///
/// `position` counts entries back from the newest one. It is kept within
/// `[0, buffer_len - viewport_height]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScrollState {
    /// Entries between the bottom of the view and the newest entry.
    pub position: usize,
    /// Whether the user is scrolled back.
    pub active: bool,
}

/// Something a target's output source delivered to the multiplexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEvent {
    /// Raw bytes read from a child stream.
    Chunk {
        /// Producing target.
        target: Target,
        /// Stream the bytes came from.
        stream: Stream,
        /// The raw chunk.
        bytes: Vec<u8>,
    },
    /// An already complete entry (in-process server, supervisor notices).
    Entry(LogEntry),
    /// The stream ended; flush its partial line.
    Eof {
        /// Producing target.
        target: Target,
        /// Stream that ended.
        stream: Stream,
    },
    /// Drop everything shown for the target.
    Clear(Target),
}

#[derive(Debug)]
struct Pane {
    buffer: LogBuffer,
    scroll: ScrollState,
    stdout: LineSplitter,
    stderr: LineSplitter,
}

impl Pane {
    fn new(max_length: usize) -> Self {
        Self {
            buffer: LogBuffer::new(max_length),
            scroll: ScrollState::default(),
            stdout: LineSplitter::new(),
            stderr: LineSplitter::new(),
        }
    }

    fn splitter(&mut self, stream: Stream) -> &mut LineSplitter {
        match stream {
            Stream::Stdout => &mut self.stdout,
            Stream::Stderr => &mut self.stderr,
        }
    }
}

/// Routes target output into per-target buffers and tracks what is shown.
///
/// Each target owns its own [`LogBuffer`], [`ScrollState`] and partial-line
/// state, so targets never share mutable data.
#[derive(Debug)]
pub struct LogMultiplexer {
    panes: [Pane; 3],
    focused: Target,
    viewport_height: usize,
    viewport_width: usize,
}

impl LogMultiplexer {
    /// Creates a multiplexer whose buffers hold `max_length` entries each.
    pub fn new(max_length: usize) -> Self {
        Self {
            panes: [
                Pane::new(max_length),
                Pane::new(max_length),
                Pane::new(max_length),
            ],
            focused: Target::Backend,
            viewport_height: 20,
            viewport_width: 80,
        }
    }

    /// Target whose pane is shown.
    pub fn focused(&self) -> Target {
        self.focused
    }

    /// Records the size of the log area.
    pub fn set_viewport(&mut self, height: usize, width: usize) {
        self.viewport_height = height;
        self.viewport_width = width.max(1);
        for pane in &mut self.panes {
            let max = pane.buffer.len().saturating_sub(height);
            pane.scroll.position = pane.scroll.position.min(max);
            pane.scroll.active &= pane.scroll.position > 0;
        }
    }

    /// Height of the log area.
    pub fn viewport_height(&self) -> usize {
        self.viewport_height
    }

    /// Buffer of `target`.
    pub fn buffer(&self, target: Target) -> &LogBuffer {
        &self.pane(target).buffer
    }

    /// Scroll state of `target`.
    pub fn scroll_state(&self, target: Target) -> ScrollState {
        self.pane(target).scroll
    }

    /// Splits a raw chunk into lines and appends the complete ones.
    ///
    /// Returns the number of entries added. Partial lines wait for the next
    /// chunk of the same stream or for [`LogMultiplexer::flush`].
    pub fn append(&mut self, target: Target, stream: Stream, chunk: &[u8]) -> usize {
        let pane = self.pane_mut(target);
        let lines = pane.splitter(stream).push(chunk);
        let added = lines.len();
        pane.buffer
            .extend(lines.into_iter().map(|line| LogEntry::classified(target, line)));
        added
    }

    /// Appends the pending partial line of a finished stream.
    pub fn flush(&mut self, target: Target, stream: Stream) {
        let pane = self.pane_mut(target);
        if let Some(line) = pane.splitter(stream).finish() {
            pane.buffer.push(LogEntry::classified(target, line));
        }
    }

    /// Appends a complete entry to its target's buffer.
    pub fn push_entry(&mut self, entry: LogEntry) {
        self.pane_mut(entry.target).buffer.push(entry);
    }

    /// Empties the buffer of `target` and resets its scroll state.
    pub fn clear(&mut self, target: Target) {
        let pane = self.pane_mut(target);
        pane.buffer.clear();
        pane.scroll = ScrollState::default();
    }

    /// Applies one delivered event.
    pub fn apply(&mut self, event: LogEvent) {
        match event {
            LogEvent::Chunk {
                target,
                stream,
                bytes,
            } => {
                self.append(target, stream, &bytes);
            }
            LogEvent::Entry(entry) => self.push_entry(entry),
            LogEvent::Eof { target, stream } => self.flush(target, stream),
            LogEvent::Clear(target) => self.clear(target),
        }
    }

    /// Returns the entries visible in a viewport `viewport_height` entries tall.
    ///
    /// Inactive scroll: the newest `min(height, len)` entries. Active scroll:
    /// `height` entries ending `position` entries before the newest one.
    pub fn render(&self, target: Target, viewport_height: usize) -> Vec<&LogEntry> {
        let pane = self.pane(target);
        let len = pane.buffer.len();
        let back = if pane.scroll.active {
            pane.scroll.position.min(len.saturating_sub(viewport_height))
        } else {
            0
        };
        let end = len - back;
        let start = end.saturating_sub(viewport_height);
        pane.buffer.range(start, end)
    }

    /// Rows for the focused pane, re-flowed to the viewport width.
    ///
    /// When wrapping produces more rows than fit, the newest rows are kept.
    pub fn rows(&self) -> Vec<DisplayRow> {
        let mut rows: Vec<DisplayRow> = self
            .render(self.focused, self.viewport_height)
            .into_iter()
            .flat_map(|entry| wrap_entry(entry, self.viewport_width))
            .collect();
        if rows.len() > self.viewport_height {
            rows.drain(..rows.len() - self.viewport_height);
        }
        rows
    }

    /// Scrolls the focused pane back by `amount` entries.
    pub fn scroll_up(&mut self, amount: usize) {
        let height = self.viewport_height;
        let pane = self.pane_mut(self.focused);
        let max = pane.buffer.len().saturating_sub(height);
        pane.scroll.position = pane.scroll.position.saturating_add(amount).min(max);
        pane.scroll.active = pane.scroll.position > 0;
    }

    /// Scrolls the focused pane forward by `amount` entries.
    pub fn scroll_down(&mut self, amount: usize) {
        let pane = self.pane_mut(self.focused);
        pane.scroll.position = pane.scroll.position.saturating_sub(amount);
        if pane.scroll.position == 0 {
            pane.scroll.active = false;
        }
    }

    /// Returns the focused pane to the newest output.
    pub fn jump_to_latest(&mut self) {
        self.pane_mut(self.focused).scroll = ScrollState::default();
    }

    /// Focuses `next`, resetting its scroll state.
    pub fn switch_target(&mut self, next: Target) {
        self.focused = next;
        self.pane_mut(next).scroll = ScrollState::default();
    }

    /// Focuses the tab after the current one.
    pub fn next_target(&mut self) {
        let next = Target::ALL[(self.focused.index() + 1) % Target::ALL.len()];
        self.switch_target(next);
    }

    /// Focuses the tab before the current one.
    pub fn previous_target(&mut self) {
        let len = Target::ALL.len();
        let previous = Target::ALL[(self.focused.index() + len - 1) % len];
        self.switch_target(previous);
    }

    fn pane(&self, target: Target) -> &Pane {
        &self.panes[target.index()]
    }

    fn pane_mut(&mut self, target: Target) -> &mut Pane {
        &mut self.panes[target.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logs::entry::Severity;
    use proptest::prelude::*;

    fn filled(count: usize, height: usize) -> LogMultiplexer {
        let mut mux = LogMultiplexer::new(1000);
        mux.set_viewport(height, 80);
        for i in 0..count {
            mux.append(Target::Backend, Stream::Stdout, format!("line {}\n", i).as_bytes());
        }
        mux
    }

    fn texts(entries: Vec<&LogEntry>) -> Vec<String> {
        entries.into_iter().map(|e| e.text.clone()).collect()
    }

    #[test]
    fn test_render_inactive_returns_tail() {
        let mux = filled(30, 10);
        let shown = texts(mux.render(Target::Backend, 10));
        let expected: Vec<_> = (20..30).map(|i| format!("line {}", i)).collect();
        assert_eq!(shown, expected);

        let short = filled(3, 10);
        assert_eq!(short.render(Target::Backend, 10).len(), 3);
    }

    #[test]
    fn test_render_active_window() {
        let mut mux = filled(30, 10);
        mux.scroll_up(5);
        let shown = texts(mux.render(Target::Backend, 10));
        let expected: Vec<_> = (15..25).map(|i| format!("line {}", i)).collect();
        assert_eq!(shown, expected);
    }

    #[test]
    fn test_scroll_up_clamps_at_top() {
        let mut mux = filled(30, 10);
        mux.scroll_up(FAST_SCROLL);
        mux.scroll_up(FAST_SCROLL);
        mux.scroll_up(FAST_SCROLL);
        let state = mux.scroll_state(Target::Backend);
        assert_eq!(state.position, 20);
        assert!(state.active);
    }

    #[test]
    fn test_scroll_down_deactivates_at_zero() {
        let mut mux = filled(30, 10);
        mux.scroll_up(3);
        mux.scroll_down(10);
        assert_eq!(mux.scroll_state(Target::Backend), ScrollState::default());
    }

    #[test]
    fn test_jump_to_latest() {
        let mut mux = filled(30, 10);
        mux.scroll_up(7);
        mux.jump_to_latest();
        assert_eq!(mux.scroll_state(Target::Backend), ScrollState::default());
    }

    #[test]
    fn test_switch_target_resets_scroll() {
        let mut mux = filled(30, 10);
        for i in 0..30 {
            mux.push_entry(LogEntry::new(Target::Frontend, Severity::Info, format!("{}", i)));
        }
        mux.switch_target(Target::Frontend);
        mux.scroll_up(4);
        mux.switch_target(Target::Backend);
        mux.scroll_up(2);
        mux.switch_target(Target::Frontend);

        assert_eq!(mux.focused(), Target::Frontend);
        assert_eq!(mux.scroll_state(Target::Frontend), ScrollState::default());
    }

    #[test]
    fn test_partial_lines_per_stream() {
        let mut mux = LogMultiplexer::new(100);
        mux.append(Target::Backend, Stream::Stdout, b"hel");
        mux.append(Target::Backend, Stream::Stderr, b"warning: x\n");
        mux.append(Target::Backend, Stream::Stdout, b"lo\n");
        let shown = texts(mux.render(Target::Backend, 10));
        assert_eq!(shown, vec!["warning: x", "hello"]);

        mux.apply(LogEvent::Chunk {
            target: Target::Backend,
            stream: Stream::Stdout,
            bytes: b"tail".to_vec(),
        });
        mux.apply(LogEvent::Eof {
            target: Target::Backend,
            stream: Stream::Stdout,
        });
        assert_eq!(mux.buffer(Target::Backend).len(), 3);
    }

    #[test]
    fn test_rows_keep_newest_when_wrapping() {
        let mut mux = LogMultiplexer::new(100);
        mux.set_viewport(3, 4);
        mux.append(Target::Backend, Stream::Stdout, b"aaaabbbb\nccccdddd\n");
        let rows: Vec<_> = mux.rows().into_iter().map(|r| r.text).collect();
        assert_eq!(rows, vec!["bbbb", "cccc", "dddd"]);
    }

    #[test]
    fn test_clear_event() {
        let mut mux = filled(30, 10);
        mux.scroll_up(2);
        mux.apply(LogEvent::Clear(Target::Backend));
        assert!(mux.buffer(Target::Backend).is_empty());
        assert_eq!(mux.scroll_state(Target::Backend), ScrollState::default());
    }

    proptest! {
        #[test]
        fn prop_scroll_round_trip(
            count in 0usize..200,
            height in 1usize..40,
            start in 0usize..100,
            amount in 0usize..50,
        ) {
            let mut mux = filled(count, height);
            mux.scroll_up(start);
            let before = mux.scroll_state(Target::Backend).position;
            let max = count.saturating_sub(height);

            mux.scroll_up(amount);
            mux.scroll_down(amount);
            let after = mux.scroll_state(Target::Backend).position;

            if before + amount <= max {
                prop_assert_eq!(after, before);
            } else {
                prop_assert_eq!(after, max.saturating_sub(amount));
            }
        }

        #[test]
        fn prop_switch_always_resets(
            ups in prop::collection::vec(0usize..20, 0..10),
            target_index in 0usize..3,
        ) {
            let mut mux = filled(100, 10);
            for up in ups {
                mux.scroll_up(up);
            }
            let next = Target::ALL[target_index];
            mux.switch_target(next);
            prop_assert_eq!(mux.scroll_state(next), ScrollState::default());
        }

        #[test]
        fn prop_inactive_render_is_tail(count in 0usize..300, height in 0usize..50) {
            let mux = filled(count, 10);
            let shown = mux.render(Target::Backend, height);
            prop_assert_eq!(shown.len(), height.min(count));
            if let Some(last) = shown.last() {
                prop_assert_eq!(&last.text, &format!("line {}", count - 1));
            }
        }
    }
}
