//! Terminal frontend
//!
//! Renders [`ConsoleSnapshot`]s with ratatui and feeds crossterm key events
//! to the console runtime. Key releases are only reported by terminals that
//! support keyboard enhancement; elsewhere every press becomes a tap.

use crate::runtime::{ConsoleHandle, ConsoleInput, ConsoleSnapshot};
use crossterm::{
    event::{
        Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers,
        KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
    },
    terminal::{
        disable_raw_mode, enable_raw_mode, supports_keyboard_enhancement, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
    ExecutableCommand,
};
use futures_util::StreamExt;
use ratatui::{prelude::*, widgets::*};
use std::collections::{HashMap, VecDeque};
use std::io::{self, stdout};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use xytable_core::{Axis, ConnectionState, ConsoleEvent};
use xytable_input::{Key, KeyInput, KeyPhase, DEFAULT_HOLD_DELAY};

const REDRAW_INTERVAL: Duration = Duration::from_millis(100);
const ACTIVITY_LINES: usize = 6;
/// Presses of one key closer together than this are auto-repeat
const TAP_REPEAT_WINDOW: Duration = DEFAULT_HOLD_DELAY;

/// Whether the event loop should keep running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Frontend-only state
#[derive(Debug, Default)]
struct ConsoleView {
    /// Move-to prompt text; the prompt has focus while this is set
    prompt: Option<String>,
    prompt_error: Option<String>,
    /// Every press is followed by a synthetic release
    tap_only: bool,
    /// Last press per motion key, tap-only mode only
    last_press: HashMap<Key, Instant>,
    activity: VecDeque<String>,
}

impl ConsoleView {
    fn new(tap_only: bool) -> Self {
        Self {
            tap_only,
            ..Default::default()
        }
    }

    fn record(&mut self, event: &ConsoleEvent) {
        if matches!(event, ConsoleEvent::PositionChanged(_)) {
            return;
        }
        if self.activity.len() == ACTIVITY_LINES {
            self.activity.pop_front();
        }
        self.activity.push_back(event.to_string());
    }

    fn handle_key(&mut self, handle: &ConsoleHandle, key: KeyEvent) -> Flow {
        let pressed = key.kind == KeyEventKind::Press;
        if pressed && key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Flow::Quit;
        }

        // Motion keys always reach the translator so releases are never lost.
        if let Some(motion) = motion_key(key.code) {
            for input in self.motion_inputs(motion, key.kind, Instant::now()) {
                handle.send(ConsoleInput::Key(input));
            }
        }

        if key.kind == KeyEventKind::Release {
            return Flow::Continue;
        }
        if self.prompt.is_some() {
            self.edit_prompt(handle, key.code);
            return Flow::Continue;
        }
        if !pressed {
            return Flow::Continue;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return Flow::Quit,
            KeyCode::Char('+') | KeyCode::Char('=') => {
                handle.send(ConsoleInput::CoarserIncrement);
            }
            KeyCode::Char('-') => {
                handle.send(ConsoleInput::FinerIncrement);
            }
            KeyCode::Char(' ') => {
                handle.send(ConsoleInput::EmergencyStop);
            }
            KeyCode::Char('c') => {
                handle.send(ConsoleInput::ClearEmergencyStop);
            }
            KeyCode::Char('h') => {
                handle.send(ConsoleInput::Home);
            }
            KeyCode::Char('g') => {
                self.prompt = Some(String::new());
                self.prompt_error = None;
            }
            _ => {}
        }
        Flow::Continue
    }

    /// Translator inputs for one terminal key event
    ///
    /// Without release reporting, a held key arrives as a stream of presses.
    /// Only a press after a quiet gap of [`TAP_REPEAT_WINDOW`] becomes a tap.
    fn motion_inputs(&mut self, key: Key, kind: KeyEventKind, now: Instant) -> Vec<KeyInput> {
        let focused = self.prompt.is_some();
        if self.tap_only {
            if kind != KeyEventKind::Press {
                return Vec::new();
            }
            let repeated = self
                .last_press
                .insert(key, now)
                .is_some_and(|at| now.saturating_duration_since(at) < TAP_REPEAT_WINDOW);
            if repeated {
                return Vec::new();
            }
            return vec![
                KeyInput::new(key, KeyPhase::Down).in_text_field(focused),
                KeyInput::up(key).in_text_field(focused),
            ];
        }

        let phase = match kind {
            KeyEventKind::Press => KeyPhase::Down,
            KeyEventKind::Repeat => KeyPhase::Repeat,
            KeyEventKind::Release => KeyPhase::Up,
        };
        vec![KeyInput::new(key, phase).in_text_field(focused)]
    }

    fn edit_prompt(&mut self, handle: &ConsoleHandle, code: KeyCode) {
        let Some(text) = self.prompt.as_mut() else {
            return;
        };
        match code {
            KeyCode::Esc => {
                self.prompt = None;
                self.prompt_error = None;
            }
            KeyCode::Enter => match parse_target(text) {
                Some((x, y)) => {
                    handle.send(ConsoleInput::MoveTo { x, y });
                    self.prompt = None;
                    self.prompt_error = None;
                }
                None => self.prompt_error = Some(format!("Expected \"X Y\", got \"{}\"", text)),
            },
            KeyCode::Backspace => {
                text.pop();
            }
            KeyCode::Char(c) if c.is_ascii_digit() || matches!(c, '.' | '-' | ',' | ' ') => {
                text.push(c);
            }
            _ => {}
        }
    }
}

/// Keys the translator understands
fn motion_key(code: KeyCode) -> Option<Key> {
    match code {
        KeyCode::Up => Some(Key::ArrowUp),
        KeyCode::Down => Some(Key::ArrowDown),
        KeyCode::Left => Some(Key::ArrowLeft),
        KeyCode::Right => Some(Key::ArrowRight),
        KeyCode::Char(c) if matches!(c.to_ascii_lowercase(), 'w' | 'a' | 's' | 'd' | '.' | ',') => {
            Some(Key::char(c))
        }
        _ => None,
    }
}

/// Parse a move-to target written as `X Y` or `X,Y`
fn parse_target(text: &str) -> Option<(f64, f64)> {
    let mut parts = text
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|part| !part.is_empty());
    let x = parts.next()?.parse().ok()?;
    let y = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((x, y))
}

/// Run the terminal frontend until the operator quits
///
/// Sends [`ConsoleInput::Shutdown`] before returning.
pub async fn run_terminal(handle: ConsoleHandle) -> io::Result<()> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;

    let enhanced = supports_keyboard_enhancement().unwrap_or(false);
    if enhanced {
        stdout().execute(PushKeyboardEnhancementFlags(
            KeyboardEnhancementFlags::REPORT_EVENT_TYPES,
        ))?;
    } else {
        tracing::info!("Terminal does not report key releases, motion keys act as taps");
    }

    let result = event_loop(&handle, ConsoleView::new(!enhanced)).await;
    handle.send(ConsoleInput::Shutdown);

    if enhanced {
        let _ = stdout().execute(PopKeyboardEnhancementFlags);
    }
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;
    result
}

async fn event_loop(handle: &ConsoleHandle, mut view: ConsoleView) -> io::Result<()> {
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    let mut events = EventStream::new();
    let mut console_events = handle.subscribe();
    let mut redraw = tokio::time::interval(REDRAW_INTERVAL);

    loop {
        let snapshot = handle.snapshot();
        if !snapshot.running {
            tracing::warn!("Console runtime ended");
            return Ok(());
        }
        terminal.draw(|f| ui(f, &snapshot, &view))?;

        tokio::select! {
            maybe_event = events.next() => match maybe_event {
                Some(Ok(Event::Key(key))) => {
                    if view.handle_key(handle, key) == Flow::Quit {
                        return Ok(());
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e),
                None => return Ok(()),
            },
            received = console_events.recv() => match received {
                Ok(event) => view.record(&event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!("Activity view skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(()),
            },
            _ = redraw.tick() => {}
        }
    }
}

fn ui(f: &mut Frame, snapshot: &ConsoleSnapshot, view: &ConsoleView) {
    let prompt_height = if view.prompt.is_some() { 3 } else { 0 };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),             // Connection
            Constraint::Length(7),             // Table
            Constraint::Min(4),                // Activity
            Constraint::Length(prompt_height), // Move-to prompt
            Constraint::Length(3),             // Help
        ])
        .split(f.area());

    render_connection(f, snapshot, chunks[0]);
    render_table(f, snapshot, chunks[1]);
    render_activity(f, snapshot, view, chunks[2]);
    if let Some(text) = &view.prompt {
        render_prompt(f, text, view.prompt_error.as_deref(), chunks[3]);
    }

    let tap_hint = if view.tap_only { "  (tap only)" } else { "" };
    let help = Paragraph::new(format!(
        "arrows/wasd move  +/- increment  g move to  space e-stop  c clear  h home  ./, output  q quit{}",
        tap_hint
    ))
    .style(Style::default().fg(Color::DarkGray))
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(help, chunks[4]);
}

fn render_connection(f: &mut Frame, snapshot: &ConsoleSnapshot, area: Rect) {
    let color = match snapshot.connection {
        ConnectionState::Connected => Color::Green,
        ConnectionState::Reconnecting => Color::Yellow,
        ConnectionState::Disconnected | ConnectionState::Failed => Color::Red,
    };
    let mut spans = vec![Span::styled(
        snapshot.connection.label(),
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    )];
    if snapshot.connection == ConnectionState::Reconnecting {
        spans.push(Span::raw(format!(
            "  attempt {}/{}",
            snapshot.attempts, snapshot.max_attempts
        )));
    }
    let link = if snapshot.link_ready {
        Span::styled("  jog link ready", Style::default().fg(Color::Green))
    } else {
        Span::styled("  jog link down", Style::default().fg(Color::DarkGray))
    };
    spans.push(link);

    let paragraph = Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::ALL).title("XY Table"));
    f.render_widget(paragraph, area);
}

fn render_table(f: &mut Frame, snapshot: &ConsoleSnapshot, area: Rect) {
    let mut lines = Vec::new();
    for axis in Axis::ALL {
        let mut spans = vec![Span::styled(
            format!("{}: {:>10.4}", axis, snapshot.position.get(axis)),
            Style::default().add_modifier(Modifier::BOLD),
        )];
        if let Some(limits) = snapshot.limits.as_ref().map(|l| l.axis(axis)) {
            spans.push(Span::raw(format!("  [{:.3}, {:.3}]", limits.min, limits.max)));
        }
        if snapshot.is_jogging(axis) {
            spans.push(Span::styled("  JOGGING", Style::default().fg(Color::Cyan)));
        }
        lines.push(Line::from(spans));
    }

    lines.push(Line::from(format!("Increment: {}", snapshot.increment)));
    if let Some((output, state)) = snapshot.last_output {
        lines.push(Line::from(format!(
            "Output {}: {}",
            output,
            if state { "on" } else { "off" }
        )));
    }
    if snapshot.emergency_stop {
        lines.push(Line::from(Span::styled(
            "EMERGENCY STOP ACTIVE",
            Style::default().fg(Color::White).bg(Color::Red).add_modifier(Modifier::BOLD),
        )));
    }

    let paragraph =
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Position"));
    f.render_widget(paragraph, area);
}

fn render_activity(f: &mut Frame, snapshot: &ConsoleSnapshot, view: &ConsoleView, area: Rect) {
    let mut lines: Vec<Line> = Vec::new();
    if let Some(banner) = &snapshot.banner {
        lines.push(Line::from(Span::styled(
            banner.clone(),
            Style::default().fg(Color::Yellow),
        )));
    }
    lines.extend(
        view.activity
            .iter()
            .rev()
            .map(|entry| Line::from(Span::raw(entry.clone()))),
    );

    let paragraph = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title("Activity"));
    f.render_widget(paragraph, area);
}

fn render_prompt(f: &mut Frame, text: &str, error: Option<&str>, area: Rect) {
    let mut spans = vec![Span::raw(format!("> {}", text))];
    if let Some(error) = error {
        spans.push(Span::styled(format!("  {}", error), Style::default().fg(Color::Red)));
    }
    let paragraph = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Move to X Y [Enter/Esc]"),
    );
    f.render_widget(paragraph, area);
}
