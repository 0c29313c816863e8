// SPDX-License-Identifier: MIT
//
// ANSI escape sequence generation.
//
// Pure functions that write escape sequences to any `impl Write`. Argument
// validation happens one level up in `Session`, so everything here assumes
// well-formed input and only knows the byte-level encoding.
//
// Cursor positions are 0-indexed in our API and converted to the terminal's
// 1-indexed coordinates on the way out. Scroll-region lines are the one
// exception: they are passed through as terminal line numbers.

use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;

use crate::attr::{AttributeSet, Rgb};
use crate::error::Error;

// ─── Session Modes ──────────────────────────────────────────────────────────

/// Hide the cursor, disable line wrap, enter the alternate screen, and turn
/// on button/drag mouse tracking in SGR format.
pub const ENTER: &[u8] = b"\x1b[?25;7l\x1b[?1049;1000;1002;1006h";

/// Undo [`ENTER`].
pub const LEAVE: &[u8] = b"\x1b[?25;7h\x1b[?1049;1000;1002;1006l";

// ─── Cursor ──────────────────────────────────────────────────────────────────

/// Move the cursor to `(x, y)` using CUP.
#[inline]
pub fn cursor_to(w: &mut impl Write, x: u16, y: u16) -> io::Result<()> {
    goto(w, u32::from(x), u32::from(y))
}

// Wide coordinates so box edges past u16::MAX - 1 can't overflow.
fn goto(w: &mut impl Write, x: u32, y: u32) -> io::Result<()> {
    write!(w, "\x1b[{};{}H", y + 1, x + 1)
}

/// Show or hide the cursor (DECTCEM).
#[inline]
pub fn cursor_visible(w: &mut impl Write, visible: bool) -> io::Result<()> {
    w.write_all(if visible { b"\x1b[?25h" } else { b"\x1b[?25l" })
}

/// Terminal cursor style (DECSCUSR).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorStyle {
    /// Whatever the terminal is configured to use.
    #[default]
    Default,
    BlinkingBlock,
    SteadyBlock,
    BlinkingUnderline,
    SteadyUnderline,
    BlinkingBar,
    SteadyBar,
}

impl CursorStyle {
    const NAMES: [(&'static str, Self); 7] = [
        ("default", Self::Default),
        ("blinking_block", Self::BlinkingBlock),
        ("steady_block", Self::SteadyBlock),
        ("blinking_underline", Self::BlinkingUnderline),
        ("steady_underline", Self::SteadyUnderline),
        ("blinking_bar", Self::BlinkingBar),
        ("steady_bar", Self::SteadyBar),
    ];

    /// The DECSCUSR parameter.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Default => 0,
            Self::BlinkingBlock => 1,
            Self::SteadyBlock => 2,
            Self::BlinkingUnderline => 3,
            Self::SteadyUnderline => 4,
            Self::BlinkingBar => 5,
            Self::SteadyBar => 6,
        }
    }
}

impl FromStr for CursorStyle {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        Self::NAMES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(s))
            .map(|&(_, style)| style)
            .ok_or_else(|| Error::invalid(format!("unknown cursor style '{s}'")))
    }
}

impl fmt::Display for CursorStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = Self::NAMES[usize::from(self.code())].0;
        f.write_str(name)
    }
}

/// Set the cursor style.
#[inline]
pub fn cursor_style(w: &mut impl Write, style: CursorStyle) -> io::Result<()> {
    write!(w, "\x1b[{} q", style.code())
}

// ─── Erase ───────────────────────────────────────────────────────────────────

/// Which region [`clear`] erases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearMode {
    /// Whole screen (ED 2).
    Screen,
    /// Cursor to end of screen (ED 0).
    Below,
    /// Start of screen to cursor (ED 1).
    Above,
    /// Whole line (EL 2).
    Line,
    /// Cursor to end of line (EL 0).
    Right,
    /// Start of line to cursor (EL 1).
    Left,
}

impl FromStr for ClearMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "screen" => Self::Screen,
            "below" => Self::Below,
            "above" => Self::Above,
            "line" => Self::Line,
            "right" => Self::Right,
            "left" => Self::Left,
            _ => return Err(Error::invalid(format!("unknown clear mode '{s}'"))),
        })
    }
}

pub fn clear(w: &mut impl Write, mode: ClearMode) -> io::Result<()> {
    let seq: &[u8] = match mode {
        ClearMode::Screen => b"\x1b[2J",
        ClearMode::Below => b"\x1b[J",
        ClearMode::Above => b"\x1b[1J",
        ClearMode::Line => b"\x1b[2K",
        ClearMode::Right => b"\x1b[K",
        ClearMode::Left => b"\x1b[1K",
    };
    w.write_all(seq)
}

// ─── Attributes and Color ────────────────────────────────────────────────────

/// Emit every code in `set` as one SGR sequence, ascending and
/// semicolon-separated. An empty set writes `ESC [ m`, which terminals
/// read as SGR 0.
pub fn attrs(w: &mut impl Write, set: AttributeSet) -> io::Result<()> {
    w.write_all(b"\x1b[")?;
    for (i, code) in set.codes().enumerate() {
        if i > 0 {
            w.write_all(b";")?;
        }
        write!(w, "{code}")?;
    }
    w.write_all(b"m")
}

/// 24-bit foreground color (SGR 38;2).
#[inline]
pub fn fg_rgb(w: &mut impl Write, Rgb { r, g, b }: Rgb) -> io::Result<()> {
    write!(w, "\x1b[38;2;{r};{g};{b}m")
}

/// 24-bit background color (SGR 48;2).
#[inline]
pub fn bg_rgb(w: &mut impl Write, Rgb { r, g, b }: Rgb) -> io::Result<()> {
    write!(w, "\x1b[48;2;{r};{g};{b}m")
}

// ─── Scrolling ───────────────────────────────────────────────────────────────

/// Scroll lines `first..=last` by `amount`: positive scrolls content up
/// (SU), negative down (SD). The scroll region is reset afterwards.
pub fn scroll(w: &mut impl Write, first: u16, last: u16, amount: i32) -> io::Result<()> {
    if amount == 0 {
        return Ok(());
    }
    let dir = if amount > 0 { 'S' } else { 'T' };
    let n = amount.unsigned_abs();
    write!(w, "\x1b[{first};{last}r\x1b[{n}{dir}\x1b[r")
}

// ─── Boxes ───────────────────────────────────────────────────────────────────

/// A screen rectangle in 0-indexed cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rectangle {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl Rectangle {
    #[must_use]
    pub const fn new(x: u16, y: u16, width: u16, height: u16) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

const GRAPHICS_ON: &[u8] = b"\x1b(0";
const GRAPHICS_OFF: &[u8] = b"\x1b(B";

/// Horizontal run of one DEC graphics glyph.
fn run(w: &mut impl Write, glyph: u8, count: u32) -> io::Result<()> {
    for _ in 0..count {
        w.write_all(&[glyph])?;
    }
    Ok(())
}

/// Draw a single-line border on the rectangle's outermost cells.
///
/// Expects `width >= 2` and `height >= 2`.
pub fn linebox(w: &mut impl Write, rect: Rectangle) -> io::Result<()> {
    let (x, y) = (u32::from(rect.x), u32::from(rect.y));
    let right = x + u32::from(rect.width) - 1;
    let bottom = y + u32::from(rect.height) - 1;
    let inner = u32::from(rect.width) - 2;

    w.write_all(GRAPHICS_ON)?;
    goto(w, x, y)?;
    w.write_all(b"l")?;
    run(w, b'q', inner)?;
    w.write_all(b"k")?;
    for row in y + 1..bottom {
        goto(w, x, row)?;
        w.write_all(b"x")?;
        goto(w, right, row)?;
        w.write_all(b"x")?;
    }
    goto(w, x, bottom)?;
    w.write_all(b"m")?;
    run(w, b'q', inner)?;
    w.write_all(b"j")?;
    w.write_all(GRAPHICS_OFF)
}

/// Blank every cell of the rectangle with ECH, one row at a time.
pub fn fill_box(w: &mut impl Write, rect: Rectangle) -> io::Result<()> {
    if rect.is_empty() {
        return Ok(());
    }
    let y = u32::from(rect.y);
    for row in y..y + u32::from(rect.height) {
        goto(w, u32::from(rect.x), row)?;
        write!(w, "\x1b[{}X", rect.width)?;
    }
    Ok(())
}

/// Checkerboard shadow along the rectangle's bottom and right edges, offset
/// one cell down and to the right.
pub fn shadow(w: &mut impl Write, rect: Rectangle) -> io::Result<()> {
    if rect.is_empty() {
        return Ok(());
    }
    let (x, y) = (u32::from(rect.x), u32::from(rect.y));
    let right = x + u32::from(rect.width);
    let bottom = y + u32::from(rect.height);

    w.write_all(GRAPHICS_ON)?;
    goto(w, x + 1, bottom)?;
    run(w, b'a', u32::from(rect.width))?;
    for row in y + 1..bottom {
        goto(w, right, row)?;
        w.write_all(b"a")?;
    }
    w.write_all(GRAPHICS_OFF)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
