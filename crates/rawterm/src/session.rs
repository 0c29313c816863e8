// SPDX-License-Identifier: MIT
//
// Terminal session: the one object applications hold.
//
// A session owns a `TerminalDevice`, switches it into raw mode plus the
// alternate screen on creation and switches it back exactly once, whether
// that happens through `disable`, `Drop`, a fatal signal, `exit()`, or a
// panic. Sessions on the real controlling terminal are registered in the
// process-wide slot so the signal layer can reach them; sessions over any
// other device (in-memory ones in particular) are private and unregistered.
//
// Output is buffered by the device. Drawing calls queue bytes; call
// `flush` once per frame.

use std::io::{self, Write};
use std::time::Duration;

use tracing::{debug, warn};

use crate::ansi::{self, ClearMode, CursorStyle, Rectangle, ENTER, LEAVE};
use crate::attr::{AttributeSet, Rgb};
use crate::config::SessionConfig;
use crate::decoder::Decoder;
use crate::device::{Size, TermMode, TerminalDevice, Tty};
use crate::error::{Error, Result};
use crate::key::InputEvent;
use crate::registry::{SizeCell, SLOT};
use crate::signals;

/// Size assumed when the device can't report one.
const FALLBACK_SIZE: Size = Size { cols: 80, rows: 24 };

/// Where a session's dimensions live.
enum SizeSource {
    /// The registry slot, updated by the SIGWINCH handler.
    Shared,
    Local(SizeCell),
}

impl SizeSource {
    fn cell(&self) -> &SizeCell {
        match self {
            Self::Shared => SLOT.size(),
            Self::Local(cell) => cell,
        }
    }
}

/// An active raw-mode terminal session.
pub struct Session<D: TerminalDevice = Tty> {
    device: D,
    decoder: Decoder,
    saved: TermMode,
    raw: TermMode,
    size: SizeSource,
    registered: bool,
    active: bool,
}

// ─── Lifecycle ──────────────────────────────────────────────────────────────

impl Session<Tty> {
    /// Take over the controlling terminal with default settings.
    ///
    /// # Errors
    ///
    /// See [`enable_with`](Self::enable_with).
    pub fn enable() -> Result<Self> {
        Self::enable_with(&SessionConfig::default())
    }

    /// Take over the terminal named by `config.device`.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyActive`] if another registered session exists.
    /// - [`Error::DeviceOpen`] if the device can't be opened.
    /// - [`Error::ModeSwitch`] if its attributes can't be read or changed.
    pub fn enable_with(config: &SessionConfig) -> Result<Self> {
        if !SLOT.claim() {
            return Err(Error::AlreadyActive);
        }
        let session = Tty::open(&config.device).and_then(|tty| Self::start(tty, config, true));
        if session.is_err() {
            SLOT.release();
        }
        session
    }
}

impl<D: TerminalDevice> Session<D> {
    /// Run a private session over `device`. Not reachable from signal
    /// handlers, so restoration relies on `disable` or `Drop`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ModeSwitch`] if the device's mode can't be read or
    /// changed, or [`Error::Stream`] if the mode sequence can't be written.
    pub fn open(device: D, config: &SessionConfig) -> Result<Self> {
        Self::start(device, config, false)
    }

    fn start(mut device: D, config: &SessionConfig, registered: bool) -> Result<Self> {
        let saved = device.mode().map_err(Error::ModeSwitch)?;
        let raw = saved.raw();
        device.set_mode(&raw).map_err(Error::ModeSwitch)?;

        let size = device.size().unwrap_or(FALLBACK_SIZE);
        let size_source = if registered {
            SLOT.size().reset(size);
            SizeSource::Shared
        } else {
            let cell = SizeCell::new();
            cell.reset(size);
            SizeSource::Local(cell)
        };

        let mut session = Self {
            device,
            decoder: Decoder::new(config.double_click, config.escape_timeout),
            saved,
            raw,
            size: size_source,
            registered,
            active: false,
        };

        if registered {
            session.arm();
            if let Err(err) = signals::install() {
                warn!(error = %err, "signal handlers not installed; restore relies on exit hooks");
            }
        }

        if let Err(err) = session.write_mode(ENTER) {
            let _ = session.leave_mode();
            if registered {
                signals::uninstall();
            }
            return Err(err);
        }

        session.active = true;
        debug!(
            cols = size.cols,
            rows = size.rows,
            registered,
            "terminal session enabled"
        );
        Ok(session)
    }

    /// Restore the saved mode and leave the alternate screen.
    ///
    /// Idempotent: calls after the first are no-ops.
    ///
    /// # Errors
    ///
    /// Returns the first failure. Every step is still attempted.
    pub fn disable(&mut self) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;

        let flushed = self.device.flush().map_err(Error::from);
        let left = self.leave_mode();
        if self.registered {
            signals::uninstall();
            SLOT.release();
        }
        debug!("terminal session disabled");
        flushed.and(left)
    }

    /// Stop the process as if the user pressed Ctrl-Z, restoring the
    /// terminal first and re-entering raw mode once continued.
    ///
    /// Private sessions don't stop the process: they only leave and
    /// re-enter, which is what the terminal observes around a stop.
    ///
    /// # Errors
    ///
    /// Returns a stream or mode-switch error from either transition.
    pub fn suspend(&mut self) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        self.device.flush()?;
        debug!("suspending terminal session");

        if self.registered && signals::installed_count() > 0 {
            // The SIGTSTP handler restores, stops, and re-enters.
            signals::suspend_process()?;
        } else {
            self.leave_mode()?;
            if self.registered {
                signals::suspend_process()?;
            }
            self.device.set_mode(&self.raw).map_err(Error::ModeSwitch)?;
            self.arm();
            self.write_mode(ENTER)?;
        }

        self.refresh_size();
        debug!("terminal session resumed");
        Ok(())
    }

    /// Whether the session still owns the terminal.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Whether the signal layer can reach this session.
    #[must_use]
    pub const fn is_registered(&self) -> bool {
        self.registered
    }

    #[must_use]
    pub const fn device(&self) -> &D {
        &self.device
    }

    pub const fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    fn arm(&self) {
        if !self.registered {
            return;
        }
        if let Some(fd) = self.device.raw_fd() {
            SLOT.arm(fd, &self.saved, &self.raw);
        }
    }

    fn write_mode(&mut self, seq: &[u8]) -> Result<()> {
        self.device.write_all(seq)?;
        self.device.flush()?;
        Ok(())
    }

    /// Best-effort restore. Skipped when a handler or hook already did it.
    fn leave_mode(&mut self) -> Result<()> {
        if self.registered && !SLOT.disarm() {
            return Ok(());
        }
        let mode = self.device.set_mode(&self.saved).map_err(Error::ModeSwitch);
        let out = self.write_mode(LEAVE);
        mode.and(out)
    }
}

impl<D: TerminalDevice> Drop for Session<D> {
    fn drop(&mut self) {
        if let Err(err) = self.disable() {
            warn!(error = %err, "terminal restore on drop failed");
        }
    }
}

// ─── Input ──────────────────────────────────────────────────────────────────

impl<D: TerminalDevice> Session<D> {
    /// Wait up to `timeout` for the next key or mouse event (`None` waits
    /// indefinitely).
    ///
    /// `Ok(None)` covers timeouts, unrecognized sequences, and waits cut
    /// short by a signal; check [`size_changed`](Self::size_changed) after
    /// each one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Stream`] when the device fails or is closed.
    pub fn decode_next(&mut self, timeout: Option<Duration>) -> Result<Option<InputEvent>> {
        Ok(self.decoder.decode_next(&mut self.device, timeout)?)
    }
}

// ─── Drawing ────────────────────────────────────────────────────────────────

impl<D: TerminalDevice> Session<D> {
    /// Move the cursor to the 0-indexed cell `(x, y)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Stream`] when the write fails.
    pub fn move_cursor(&mut self, x: u16, y: u16) -> Result<()> {
        Ok(ansi::cursor_to(&mut self.device, x, y)?)
    }

    /// Apply a set of SGR attributes as one sequence. An empty set resets.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the set contains the reserved
    /// extended-color bits (use the RGB setters instead).
    pub fn set_attributes(&mut self, attrs: AttributeSet) -> Result<()> {
        if attrs.has_reserved() {
            return Err(Error::invalid(
                "SGR 38/48 are reserved for the RGB color setters",
            ));
        }
        Ok(ansi::attrs(&mut self.device, attrs)?)
    }

    pub fn set_foreground_rgb(&mut self, r: u8, g: u8, b: u8) -> Result<()> {
        Ok(ansi::fg_rgb(&mut self.device, Rgb::new(r, g, b))?)
    }

    pub fn set_background_rgb(&mut self, r: u8, g: u8, b: u8) -> Result<()> {
        Ok(ansi::bg_rgb(&mut self.device, Rgb::new(r, g, b))?)
    }

    /// Foreground from `0xRRGGBB`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for values above `0xFFFFFF`.
    pub fn set_foreground_hex(&mut self, hex: u32) -> Result<()> {
        let color = Rgb::from_hex(hex)?;
        Ok(ansi::fg_rgb(&mut self.device, color)?)
    }

    /// Background from `0xRRGGBB`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for values above `0xFFFFFF`.
    pub fn set_background_hex(&mut self, hex: u32) -> Result<()> {
        let color = Rgb::from_hex(hex)?;
        Ok(ansi::bg_rgb(&mut self.device, color)?)
    }

    /// Scroll terminal lines `first..=last` (1-based, as the terminal
    /// numbers them) by `amount`. Positive moves content up.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] when `first > last`.
    pub fn scroll(&mut self, first: u16, last: u16, amount: i32) -> Result<()> {
        if first > last {
            return Err(Error::invalid(format!(
                "scroll region {first}..={last} is inverted"
            )));
        }
        Ok(ansi::scroll(&mut self.device, first, last, amount)?)
    }

    pub fn clear(&mut self, mode: ClearMode) -> Result<()> {
        Ok(ansi::clear(&mut self.device, mode)?)
    }

    /// Single-line border on the rectangle's outer cells.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] when the rectangle is narrower or
    /// shorter than two cells.
    pub fn draw_linebox(&mut self, rect: Rectangle) -> Result<()> {
        if rect.width < 2 || rect.height < 2 {
            return Err(Error::invalid(format!(
                "line box needs at least 2x2 cells, got {}x{}",
                rect.width, rect.height
            )));
        }
        Ok(ansi::linebox(&mut self.device, rect)?)
    }

    pub fn fill_box(&mut self, rect: Rectangle) -> Result<()> {
        Ok(ansi::fill_box(&mut self.device, rect)?)
    }

    pub fn draw_shadow(&mut self, rect: Rectangle) -> Result<()> {
        Ok(ansi::shadow(&mut self.device, rect)?)
    }

    pub fn set_cursor_visible(&mut self, visible: bool) -> Result<()> {
        Ok(ansi::cursor_visible(&mut self.device, visible)?)
    }

    pub fn set_cursor_style(&mut self, style: CursorStyle) -> Result<()> {
        Ok(ansi::cursor_style(&mut self.device, style)?)
    }
}

impl<D: TerminalDevice> Write for Session<D> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.device.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.device.flush()
    }
}

// ─── Dimensions ─────────────────────────────────────────────────────────────

impl<D: TerminalDevice> Session<D> {
    /// Width in columns as of the last measurement.
    #[must_use]
    pub fn width(&self) -> u16 {
        self.size.cell().load().cols
    }

    /// Height in rows as of the last measurement.
    #[must_use]
    pub fn height(&self) -> u16 {
        self.size.cell().load().rows
    }

    #[must_use]
    pub fn size(&self) -> Size {
        self.size.cell().load()
    }

    /// Whether the dimensions changed since the flag was last cleared.
    #[must_use]
    pub fn size_changed(&self) -> bool {
        self.size.cell().changed()
    }

    pub fn clear_size_changed(&self) {
        self.size.cell().clear_changed();
    }

    /// Read and clear the changed flag in one step.
    pub fn take_size_changed(&self) -> bool {
        self.size.cell().take_changed()
    }

    /// Ask the device for its size now instead of waiting for SIGWINCH.
    /// Returns whether it changed.
    pub fn refresh_size(&self) -> bool {
        self.device
            .size()
            .is_some_and(|size| self.size.cell().update(size))
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
