use std::io::{self, IsTerminal, Write};
use std::time::Duration;

use crossterm::style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor};
use crossterm::{cursor, queue, terminal};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};
use thiserror::Error;

use crate::environment::Environment;

/// Errors raised by console operations.
#[derive(Debug, Error)]
pub enum ConsoleError {
    /// The terminal could not be queried or written to.
    #[error("Console IO error: {0}")]
    Io(#[from] io::Error),
}

/// The sixteen colors a console can display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr)]
pub enum TextColor {
    Black,
    White,
    DarkBlue,
    DarkGreen,
    DarkCyan,
    DarkRed,
    DarkMagenta,
    DarkYellow,
    DarkGray,
    Blue,
    Green,
    Cyan,
    Red,
    Magenta,
    Yellow,
    Gray,
}

impl TextColor {
    /// Foreground used when a console is reset.
    pub const DEFAULT_FOREGROUND: TextColor = TextColor::Gray;
    /// Background used when a console is reset.
    pub const DEFAULT_BACKGROUND: TextColor = TextColor::Black;

    pub fn name(self) -> &'static str {
        self.into()
    }

    fn to_crossterm(self) -> Color {
        match self {
            TextColor::Black => Color::Black,
            TextColor::White => Color::White,
            TextColor::DarkBlue => Color::DarkBlue,
            TextColor::DarkGreen => Color::DarkGreen,
            TextColor::DarkCyan => Color::DarkCyan,
            TextColor::DarkRed => Color::DarkRed,
            TextColor::DarkMagenta => Color::DarkMagenta,
            TextColor::DarkYellow => Color::DarkYellow,
            TextColor::DarkGray => Color::DarkGrey,
            TextColor::Blue => Color::Blue,
            TextColor::Green => Color::Green,
            TextColor::Cyan => Color::Cyan,
            TextColor::Red => Color::Red,
            TextColor::Magenta => Color::Magenta,
            TextColor::Yellow => Color::Yellow,
            TextColor::Gray => Color::Grey,
        }
    }
}

/// A zero-based cursor location, `x` being the column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CursorPosition {
    pub x: u16,
    pub y: u16,
}

/// Text console capabilities.
///
/// [`TerminalConsole`] drives a real terminal; tests and headless callers can
/// provide their own implementation.
pub trait Console {
    fn cursor_position(&mut self) -> Result<CursorPosition, ConsoleError>;

    fn set_cursor_position(&mut self, position: CursorPosition) -> Result<(), ConsoleError>;

    /// Returns the visible `(width, height)` in character cells.
    fn dimension(&self) -> Result<(u16, u16), ConsoleError>;

    fn clear_screen(&mut self) -> Result<(), ConsoleError>;

    fn set_text_color(&mut self, foreground: TextColor, background: TextColor) -> Result<(), ConsoleError>;

    /// Restores the terminal's own default colors.
    fn set_default_text_color(&mut self) -> Result<(), ConsoleError>;

    /// Returns the `(foreground, background)` pair currently in effect.
    fn text_color(&self) -> (TextColor, TextColor);

    fn print(&mut self, text: &str) -> Result<(), ConsoleError>;
}

/// A [`Console`] writing terminal commands to `W`, stdout by default.
///
/// Only output goes through `W`. [`Console::cursor_position`] and
/// [`Console::dimension`] always query the process's controlling terminal,
/// so a `TerminalConsole<Vec<u8>>` still reports the real terminal's state.
pub struct TerminalConsole<W: Write = io::Stdout> {
    out: W,
    foreground: TextColor,
    background: TextColor,
}

impl TerminalConsole<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl Default for TerminalConsole<io::Stdout> {
    fn default() -> Self {
        Self::stdout()
    }
}

impl<W: Write> TerminalConsole<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            foreground: TextColor::DEFAULT_FOREGROUND,
            background: TextColor::DEFAULT_BACKGROUND,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Console for TerminalConsole<W> {
    /// Flushes `W`, then asks the controlling terminal, not `W`.
    fn cursor_position(&mut self) -> Result<CursorPosition, ConsoleError> {
        // Pending output would otherwise land after the position query.
        self.out.flush()?;
        let (x, y) = cursor::position()?;
        Ok(CursorPosition { x, y })
    }

    fn set_cursor_position(&mut self, position: CursorPosition) -> Result<(), ConsoleError> {
        queue!(self.out, cursor::MoveTo(position.x, position.y))?;
        self.out.flush()?;
        Ok(())
    }

    fn dimension(&self) -> Result<(u16, u16), ConsoleError> {
        Ok(terminal::size()?)
    }

    fn clear_screen(&mut self) -> Result<(), ConsoleError> {
        queue!(
            self.out,
            terminal::Clear(terminal::ClearType::All),
            cursor::MoveTo(0, 0)
        )?;
        self.out.flush()?;
        Ok(())
    }

    fn set_text_color(&mut self, foreground: TextColor, background: TextColor) -> Result<(), ConsoleError> {
        queue!(
            self.out,
            SetForegroundColor(foreground.to_crossterm()),
            SetBackgroundColor(background.to_crossterm())
        )?;
        self.out.flush()?;
        self.foreground = foreground;
        self.background = background;
        Ok(())
    }

    fn set_default_text_color(&mut self) -> Result<(), ConsoleError> {
        queue!(self.out, ResetColor)?;
        self.out.flush()?;
        self.foreground = TextColor::DEFAULT_FOREGROUND;
        self.background = TextColor::DEFAULT_BACKGROUND;
        Ok(())
    }

    fn text_color(&self) -> (TextColor, TextColor) {
        (self.foreground, self.background)
    }

    fn print(&mut self, text: &str) -> Result<(), ConsoleError> {
        queue!(self.out, Print(text))?;
        self.out.flush()?;
        Ok(())
    }
}

/// Saved cursor positions, restored last-in first-out.
#[derive(Debug, Default)]
pub struct CursorStack {
    positions: Vec<CursorPosition>,
}

impl CursorStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Saves the current cursor position of `console`.
    pub fn push<C: Console + ?Sized>(&mut self, console: &mut C) -> Result<(), ConsoleError> {
        let position = console.cursor_position()?;
        self.positions.push(position);
        Ok(())
    }

    /// Moves the cursor back to the last saved position and forgets it.
    ///
    /// Returns `None` without touching the console when nothing was saved.
    pub fn pop<C: Console + ?Sized>(&mut self, console: &mut C) -> Result<Option<CursorPosition>, ConsoleError> {
        let Some(position) = self.positions.pop() else {
            return Ok(None);
        };
        console.set_cursor_position(position)?;
        Ok(Some(position))
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

const ANIMATION_SPRITES: [char; 4] = ['-', '\\', '|', '/'];

/// Delay between two frames of [`print_animation_cursor`].
pub const ANIMATION_REFRESH_RATE: Duration = Duration::from_millis(150);

/// Returns the spinner frame to show after `elapsed`, advancing every `refresh_rate`.
pub fn animation_sprite(elapsed: Duration, refresh_rate: Duration) -> char {
    if refresh_rate.is_zero() {
        return ANIMATION_SPRITES[0];
    }
    let frame = (elapsed.as_secs_f64() / refresh_rate.as_secs_f64()) as usize;
    ANIMATION_SPRITES[frame % ANIMATION_SPRITES.len()]
}

/// Draws the current spinner frame without moving the cursor.
pub fn print_animation_cursor<C: Console + ?Sized>(
    console: &mut C,
    stack: &mut CursorStack,
    elapsed: Duration,
) -> Result<(), ConsoleError> {
    stack.push(console)?;
    let sprite = animation_sprite(elapsed, ANIMATION_REFRESH_RATE);
    console.print(sprite.encode_utf8(&mut [0u8; 4]))?;
    stack.pop(console)?;
    Ok(())
}

/// Returns true if a graphical desktop session is reachable.
pub fn is_desktop_gui_available<E: Environment + ?Sized>(env: &E) -> bool {
    if cfg!(windows) {
        return true;
    }
    ["DISPLAY", "WAYLAND_DISPLAY"]
        .iter()
        .any(|name| env.var(name).is_some_and(|v| !v.is_empty()))
}

/// Returns true if the process was not started from an interactive terminal.
pub fn is_run_from_desktop() -> bool {
    !io::stdin().is_terminal()
}
