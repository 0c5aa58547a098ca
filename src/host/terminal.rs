//! Terminal host - crossterm display with an emulated fixed-rate refresh.
//!
//! The terminal has no vertical sync, so refreshes are paced against
//! `Instant` deadlines; input is polled until each deadline passes and
//! stamped with its arrival time. The document's visible text is drawn
//! top-left, alerts on the bottom row.
//!
//! Terminal signals map onto page events:
//!
//! - Ctrl+C → `beforeunload` (a second Ctrl+C leaves if the first was prevented)
//! - focus lost / gained → visibility hidden / visible
//! - resize → window resize (cells are treated as 8×16 CSS px)

use std::io::{self, Stdout, Write};
use std::time::{Duration, Instant};

use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{
    self, DisableFocusChange, DisableMouseCapture, EnableFocusChange, EnableMouseCapture,
    Event as CrosstermEvent, KeyCode, KeyEvent as CrosstermKeyEvent, KeyEventKind, KeyModifiers,
    MouseButton as CrosstermMouseButton, MouseEvent as CrosstermMouseEvent, MouseEventKind,
};
use crossterm::style::Print;
use crossterm::terminal::{
    self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::{execute, queue};

use super::{Environment, Frame, Host, HostEvent, TimedEvent};
use crate::dom::{
    Element, KeyState, KeyboardEvent, Modifiers, MouseAction, MouseButton, MouseEvent,
};

const CELL_WIDTH: f64 = 8.0;
const CELL_HEIGHT: f64 = 16.0;
const DEFAULT_REFRESH_HZ: f64 = 60.0;

pub struct TerminalHost {
    out: Stdout,
    origin: Instant,
    interval: Duration,
    deadline: Instant,
    environment: Environment,
    drawn: Vec<String>,
    status: Option<String>,
    leave_armed: bool,
    quit: bool,
}

impl TerminalHost {
    /// Take over the terminal: raw mode, alternate screen, mouse and focus reporting.
    pub fn new() -> io::Result<Self> {
        let mut out = io::stdout();
        terminal::enable_raw_mode()?;
        execute!(
            out,
            EnterAlternateScreen,
            Hide,
            EnableMouseCapture,
            EnableFocusChange
        )?;

        let (width, height) = terminal::size().unwrap_or((80, 24));
        let window_width = f64::from(width) * CELL_WIDTH;
        let window_height = f64::from(height) * CELL_HEIGHT;
        let now = Instant::now();
        let interval = Duration::from_secs_f64(1.0 / DEFAULT_REFRESH_HZ);

        Ok(Self {
            out,
            origin: now,
            interval,
            deadline: now + interval,
            environment: Environment {
                pixel_ratio: 1.0,
                screen_width: window_width,
                screen_height: window_height,
                window_width,
                window_height,
                visible: true,
            },
            drawn: Vec::new(),
            status: None,
            leave_armed: false,
            quit: false,
        })
    }

    /// Emulated refresh rate in Hz.
    pub fn with_refresh_rate(mut self, hz: f64) -> Self {
        self.interval = Duration::from_secs_f64(1.0 / hz);
        self.deadline = Instant::now() + self.interval;
        self
    }

    fn millis(&self, at: Instant) -> f64 {
        at.duration_since(self.origin).as_secs_f64() * 1000.0
    }

    fn convert(&mut self, event: CrosstermEvent) -> Option<HostEvent> {
        match event {
            CrosstermEvent::Key(key) if is_interrupt(&key) => {
                if self.leave_armed {
                    self.quit = true;
                    None
                } else {
                    Some(HostEvent::BeforeUnload)
                }
            }
            CrosstermEvent::Key(key) => Some(HostEvent::Key(convert_key_event(key))),
            CrosstermEvent::Mouse(mouse) => convert_mouse_event(mouse).map(HostEvent::Mouse),
            CrosstermEvent::Resize(width, height) => {
                let width = f64::from(width) * CELL_WIDTH;
                let height = f64::from(height) * CELL_HEIGHT;
                self.environment.window_width = width;
                self.environment.window_height = height;
                Some(HostEvent::Resize { width, height })
            }
            CrosstermEvent::FocusLost => {
                self.environment.visible = false;
                Some(HostEvent::Visibility(false))
            }
            CrosstermEvent::FocusGained => {
                self.environment.visible = true;
                Some(HostEvent::Visibility(true))
            }
            CrosstermEvent::Paste(_) => None,
        }
    }

    fn draw(&mut self) -> io::Result<()> {
        queue!(self.out, Clear(ClearType::All))?;
        for (row, line) in self.drawn.iter().enumerate() {
            queue!(self.out, MoveTo(0, row as u16), Print(line))?;
        }
        if let Some(status) = &self.status {
            let (_, height) = terminal::size().unwrap_or((80, 24));
            queue!(self.out, MoveTo(0, height.saturating_sub(1)), Print(status))?;
        }
        self.out.flush()
    }
}

impl Host for TerminalHost {
    fn next_frame(&mut self) -> io::Result<Frame> {
        let mut events = Vec::new();
        loop {
            if self.quit {
                return Err(io::Error::new(io::ErrorKind::Interrupted, "session ended"));
            }
            let now = Instant::now();
            if now >= self.deadline {
                break;
            }
            if event::poll(self.deadline - now)? {
                let raw = event::read()?;
                let timestamp = self.millis(Instant::now());
                if let Some(event) = self.convert(raw) {
                    events.push(TimedEvent { timestamp, event });
                }
            }
        }

        let timestamp = self.millis(self.deadline);
        self.deadline += self.interval;
        let now = Instant::now();
        if self.deadline <= now {
            // Missed refreshes are dropped, not replayed.
            log::debug!("terminal refresh fell behind");
            self.deadline = now + self.interval;
        }
        Ok(Frame { timestamp, events })
    }

    fn present(&mut self, body: &Element) -> io::Result<()> {
        let lines = body.visible_lines();
        if lines == self.drawn {
            return Ok(());
        }
        self.drawn = lines;
        self.draw()
    }

    /// Blocks until a key is pressed, like a browser alert.
    fn alert(&mut self, message: &str) {
        self.status = Some(format!("{message} [press any key]"));
        if let Err(err) = self.draw() {
            log::error!("failed to draw alert: {err}");
        }
        loop {
            match event::read() {
                Ok(CrosstermEvent::Key(key)) if key.kind == KeyEventKind::Press => break,
                Ok(_) => {}
                Err(err) => {
                    log::error!("failed to read alert acknowledgement: {err}");
                    break;
                }
            }
        }
        self.status = None;
        let _ = self.draw();
        self.deadline = Instant::now() + self.interval;
    }

    fn reload(&mut self) {
        self.quit = true;
    }

    fn unload(&mut self, prevented: bool) {
        if prevented {
            self.leave_armed = true;
            self.status = Some("Leaving ends the session. Press Ctrl+C again to leave.".into());
            let _ = self.draw();
        } else {
            self.quit = true;
        }
    }

    fn environment(&self) -> Environment {
        self.environment
    }
}

impl Drop for TerminalHost {
    fn drop(&mut self) {
        let _ = execute!(
            self.out,
            DisableFocusChange,
            DisableMouseCapture,
            Show,
            LeaveAlternateScreen
        );
        let _ = terminal::disable_raw_mode();
    }
}

// =============================================================================
// CONVERSION
// =============================================================================

fn is_interrupt(key: &CrosstermKeyEvent) -> bool {
    key.kind == KeyEventKind::Press
        && key.modifiers.contains(KeyModifiers::CONTROL)
        && key.code == KeyCode::Char('c')
}

/// Convert crossterm KeyEvent to a DOM-style KeyboardEvent
pub fn convert_key_event(event: CrosstermKeyEvent) -> KeyboardEvent {
    let key = match event.code {
        KeyCode::Char(c) => c.to_string(),
        KeyCode::Enter => "Enter".to_string(),
        KeyCode::Tab => "Tab".to_string(),
        KeyCode::Backspace => "Backspace".to_string(),
        KeyCode::Delete => "Delete".to_string(),
        KeyCode::Esc => "Escape".to_string(),
        KeyCode::Up => "ArrowUp".to_string(),
        KeyCode::Down => "ArrowDown".to_string(),
        KeyCode::Left => "ArrowLeft".to_string(),
        KeyCode::Right => "ArrowRight".to_string(),
        KeyCode::Home => "Home".to_string(),
        KeyCode::End => "End".to_string(),
        KeyCode::PageUp => "PageUp".to_string(),
        KeyCode::PageDown => "PageDown".to_string(),
        KeyCode::F(n) => format!("F{n}"),
        KeyCode::Insert => "Insert".to_string(),
        _ => "Unidentified".to_string(),
    };

    let state = match event.kind {
        KeyEventKind::Press => KeyState::Press,
        KeyEventKind::Repeat => KeyState::Repeat,
        KeyEventKind::Release => KeyState::Release,
    };

    KeyboardEvent {
        key,
        modifiers: convert_modifiers(event.modifiers),
        state,
    }
}

/// Convert crossterm MouseEvent. Scrolling has no counterpart and yields None.
pub fn convert_mouse_event(event: CrosstermMouseEvent) -> Option<MouseEvent> {
    let (action, button) = match event.kind {
        MouseEventKind::Down(btn) => (MouseAction::Down, convert_mouse_button(btn)),
        MouseEventKind::Up(btn) => (MouseAction::Up, convert_mouse_button(btn)),
        MouseEventKind::Drag(btn) => (MouseAction::Move, convert_mouse_button(btn)),
        MouseEventKind::Moved => (MouseAction::Move, MouseButton::Left),
        MouseEventKind::ScrollUp
        | MouseEventKind::ScrollDown
        | MouseEventKind::ScrollLeft
        | MouseEventKind::ScrollRight => return None,
    };

    Some(MouseEvent {
        action,
        button,
        x: event.column,
        y: event.row,
        modifiers: convert_modifiers(event.modifiers),
    })
}

fn convert_mouse_button(btn: CrosstermMouseButton) -> MouseButton {
    match btn {
        CrosstermMouseButton::Left => MouseButton::Left,
        CrosstermMouseButton::Right => MouseButton::Right,
        CrosstermMouseButton::Middle => MouseButton::Middle,
    }
}

fn convert_modifiers(mods: KeyModifiers) -> Modifiers {
    let mut out = Modifiers::empty();
    out.set(Modifiers::CTRL, mods.contains(KeyModifiers::CONTROL));
    out.set(Modifiers::ALT, mods.contains(KeyModifiers::ALT));
    out.set(Modifiers::SHIFT, mods.contains(KeyModifiers::SHIFT));
    out.set(
        Modifiers::META,
        mods.intersects(KeyModifiers::SUPER | KeyModifiers::META),
    );
    out
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventState;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> CrosstermKeyEvent {
        CrosstermKeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    #[test]
    fn test_convert_key_names() {
        assert_eq!(convert_key_event(key(KeyCode::Char(' '), KeyModifiers::NONE)).key, " ");
        assert_eq!(convert_key_event(key(KeyCode::Esc, KeyModifiers::NONE)).key, "Escape");
        assert_eq!(convert_key_event(key(KeyCode::Left, KeyModifiers::NONE)).key, "ArrowLeft");
        assert_eq!(convert_key_event(key(KeyCode::F(5), KeyModifiers::NONE)).key, "F5");
    }

    #[test]
    fn test_convert_modifiers() {
        let ev = convert_key_event(key(
            KeyCode::Char('a'),
            KeyModifiers::CONTROL | KeyModifiers::SHIFT,
        ));
        assert!(ev.modifiers.contains(Modifiers::CTRL | Modifiers::SHIFT));
        assert!(!ev.modifiers.contains(Modifiers::ALT));
    }

    #[test]
    fn test_ctrl_c_is_interrupt() {
        assert!(is_interrupt(&key(KeyCode::Char('c'), KeyModifiers::CONTROL)));
        assert!(!is_interrupt(&key(KeyCode::Char('c'), KeyModifiers::NONE)));
    }

    #[test]
    fn test_convert_mouse() {
        let down = CrosstermMouseEvent {
            kind: MouseEventKind::Down(CrosstermMouseButton::Right),
            column: 3,
            row: 7,
            modifiers: KeyModifiers::NONE,
        };
        let ev = convert_mouse_event(down).unwrap();
        assert_eq!(ev.action, MouseAction::Down);
        assert_eq!(ev.button, MouseButton::Right);
        assert_eq!((ev.x, ev.y), (3, 7));

        let scroll = CrosstermMouseEvent {
            kind: MouseEventKind::ScrollUp,
            column: 0,
            row: 0,
            modifiers: KeyModifiers::NONE,
        };
        assert!(convert_mouse_event(scroll).is_none());
    }
}
