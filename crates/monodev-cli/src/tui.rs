// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Terminal view of the multiplexed logs.
//!
//! One tab per target above a log pane showing the focused target. Key
//! handling only mutates the [`LogMultiplexer`]; quitting is reported back
//! to the caller, which owns the shutdown.

use anyhow::Context;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use monodev::logs::{LogMultiplexer, Severity, FAST_SCROLL};
use monodev::{RunContext, Target};
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Tabs};
use ratatui::{backend::CrosstermBackend, Frame, Terminal};
use std::io::{self, Stdout};

/// Terminal type used by `start`.
pub type Term = Terminal<CrosstermBackend<Stdout>>;

/// What the caller should do after a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Keep running.
    Continue,
    /// Begin shutdown.
    Quit,
}

/// Restores the terminal when dropped.
pub struct TerminalGuard;

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let mut stdout = io::stdout();
        let _ = execute!(stdout, LeaveAlternateScreen);
    }
}

/// Switches to raw mode and the alternate screen.
pub fn enter() -> anyhow::Result<(Term, TerminalGuard)> {
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
    let guard = TerminalGuard;

    let terminal = Terminal::new(CrosstermBackend::new(stdout))
        .context("failed to initialize terminal backend")?;
    Ok((terminal, guard))
}

/// Applies a key press to the multiplexer.
pub fn handle_key(mux: &mut LogMultiplexer, key: KeyEvent) -> KeyOutcome {
    if key.kind != KeyEventKind::Press {
        return KeyOutcome::Continue;
    }

    let fast = key.modifiers.contains(KeyModifiers::SHIFT);
    let step = if fast { FAST_SCROLL } else { 1 };

    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            return KeyOutcome::Quit
        }
        KeyCode::Char('q') => return KeyOutcome::Quit,
        KeyCode::Tab | KeyCode::Right => mux.next_target(),
        KeyCode::BackTab | KeyCode::Left => mux.previous_target(),
        KeyCode::Char(c @ '1'..='3') => {
            let index = c as usize - '1' as usize;
            mux.switch_target(Target::ALL[index]);
        }
        KeyCode::Up | KeyCode::Char('k') => mux.scroll_up(step),
        KeyCode::Down | KeyCode::Char('j') => mux.scroll_down(step),
        KeyCode::Char('K') => mux.scroll_up(FAST_SCROLL),
        KeyCode::Char('J') => mux.scroll_down(FAST_SCROLL),
        KeyCode::PageUp => mux.scroll_up(FAST_SCROLL),
        KeyCode::PageDown => mux.scroll_down(FAST_SCROLL),
        KeyCode::End | KeyCode::Char('G') => mux.jump_to_latest(),
        _ => {}
    }
    KeyOutcome::Continue
}

/// Splits the frame into tab bar, log pane and help line.
pub fn layout(area: Rect) -> [Rect; 3] {
    let chunks = Layout::vertical([
        Constraint::Length(3),
        Constraint::Min(3),
        Constraint::Length(1),
    ])
    .split(area);
    [chunks[0], chunks[1], chunks[2]]
}

/// Inner size (rows, columns) of the log pane for a terminal of `area`.
pub fn log_viewport(area: Rect) -> (usize, usize) {
    let pane = layout(area)[1];
    (
        pane.height.saturating_sub(2) as usize,
        pane.width.saturating_sub(2) as usize,
    )
}

fn severity_style(severity: Severity) -> Style {
    match severity {
        Severity::Info => Style::default(),
        Severity::Warn => Style::default().fg(Color::Yellow),
        Severity::Error => Style::default().fg(Color::Red),
    }
}

/// Draws one frame.
pub fn draw(frame: &mut Frame<'_>, mux: &LogMultiplexer, ctx: &RunContext) {
    let [tabs_area, log_area, help_area] = layout(frame.area());

    let titles: Vec<Line> = Target::ALL
        .iter()
        .enumerate()
        .map(|(i, target)| {
            Line::from(format!(
                "{} {} :{}",
                i + 1,
                target.as_str(),
                ctx.port(*target)
            ))
        })
        .collect();
    let tabs = Tabs::new(titles)
        .select(mux.focused().index())
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" monodev · {} · offset {} ", ctx.app(), ctx.workspace_offset())),
        )
        .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));
    frame.render_widget(tabs, tabs_area);

    let focused = mux.focused();
    let scroll = mux.scroll_state(focused);
    let title = if scroll.active {
        format!(
            " {} ({} lines, {} back, End to follow) ",
            focused,
            mux.buffer(focused).len(),
            scroll.position
        )
    } else {
        format!(" {} ({} lines) ", focused, mux.buffer(focused).len())
    };

    let lines: Vec<Line> = mux
        .rows()
        .into_iter()
        .map(|row| Line::from(Span::styled(row.text, severity_style(row.severity))))
        .collect();
    let logs = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(logs, log_area);

    let help = Paragraph::new(
        "q quit | tab/1-3 switch | ↑/↓ scroll (shift ×10) | PgUp/PgDn | End follow",
    )
    .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(help, help_area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use monodev::logs::LogEntry;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    fn filled(lines: usize) -> LogMultiplexer {
        let mut mux = LogMultiplexer::new(100);
        mux.set_viewport(5, 80);
        for i in 0..lines {
            mux.push_entry(LogEntry::classified(Target::Backend, format!("line {}", i)));
        }
        mux
    }

    #[test]
    fn test_quit_keys() {
        let mut mux = filled(0);
        assert_eq!(handle_key(&mut mux, key(KeyCode::Char('q'), KeyModifiers::NONE)), KeyOutcome::Quit);
        assert_eq!(
            handle_key(&mut mux, key(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            KeyOutcome::Quit
        );
        assert_eq!(
            handle_key(&mut mux, key(KeyCode::Char('c'), KeyModifiers::NONE)),
            KeyOutcome::Continue
        );
    }

    #[test]
    fn test_shift_scrolls_fast() {
        let mut mux = filled(40);
        handle_key(&mut mux, key(KeyCode::Up, KeyModifiers::SHIFT));
        assert_eq!(mux.scroll_state(Target::Backend).position, FAST_SCROLL);
        handle_key(&mut mux, key(KeyCode::Down, KeyModifiers::NONE));
        assert_eq!(mux.scroll_state(Target::Backend).position, FAST_SCROLL - 1);
        handle_key(&mut mux, key(KeyCode::End, KeyModifiers::NONE));
        assert!(!mux.scroll_state(Target::Backend).active);
    }

    #[test]
    fn test_number_keys_switch_tabs() {
        let mut mux = filled(10);
        handle_key(&mut mux, key(KeyCode::Char('3'), KeyModifiers::NONE));
        assert_eq!(mux.focused(), Target::ClientBundle);
        handle_key(&mut mux, key(KeyCode::Tab, KeyModifiers::NONE));
        assert_eq!(mux.focused(), Target::Backend);
    }

    #[test]
    fn test_log_viewport_excludes_chrome() {
        assert_eq!(log_viewport(Rect::new(0, 0, 100, 30)), (24, 98));
    }
}
