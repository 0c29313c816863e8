// SPDX-License-Identifier: MIT
//
// Terminal devices: the byte pipe plus its line discipline.
//
// Safety: termios (tcgetattr, tcsetattr), ioctl (TIOCGWINSZ), poll and read
// have no safe std wrappers. Every unsafe block is a single libc call on a
// file descriptor we own for the duration of the call.
#![allow(unsafe_code)]
//
// `TerminalDevice` is the seam between `Session` and the OS. `Tty` is the
// real implementation over an opened device path; tests substitute an
// in-memory device so the whole lifecycle runs without a terminal.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::Path;
use std::time::Duration;

use crate::decoder::ByteSource;
use crate::error::{Error, Result};

// ─── Size ───────────────────────────────────────────────────────────────────

/// Terminal dimensions in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    pub cols: u16,
    pub rows: u16,
}

/// Query the window size of `fd` via `ioctl(TIOCGWINSZ)`.
///
/// Async-signal-safe. Returns `None` when `fd` is not a terminal or reports
/// a zero dimension.
#[must_use]
pub fn query_size(fd: RawFd) -> Option<Size> {
    let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
    let result = unsafe { libc::ioctl(fd, libc::TIOCGWINSZ, &raw mut ws) };

    if result == 0 && ws.ws_col > 0 && ws.ws_row > 0 {
        Some(Size {
            cols: ws.ws_col,
            rows: ws.ws_row,
        })
    } else {
        None
    }
}

// ─── TermMode ───────────────────────────────────────────────────────────────

/// A snapshot of a terminal's termios settings.
#[derive(Clone, Copy)]
pub struct TermMode(libc::termios);

impl TermMode {
    /// The raw-mode variant of this mode (the `cfmakeraw` transformation):
    /// no echo, no canonical line editing, no signal keys, no output
    /// post-processing, 8-bit characters. `read` returns after one byte.
    #[must_use]
    pub fn raw(&self) -> Self {
        let mut t = self.0;
        t.c_iflag &= !(libc::IGNBRK
            | libc::BRKINT
            | libc::PARMRK
            | libc::ISTRIP
            | libc::INLCR
            | libc::IGNCR
            | libc::ICRNL
            | libc::IXON);
        t.c_oflag &= !libc::OPOST;
        t.c_lflag &= !(libc::ECHO | libc::ECHONL | libc::ICANON | libc::ISIG | libc::IEXTEN);
        t.c_cflag &= !(libc::CSIZE | libc::PARENB);
        t.c_cflag |= libc::CS8;
        t.c_cc[libc::VMIN] = 1;
        t.c_cc[libc::VTIME] = 0;
        Self(t)
    }

    /// Whether echo and canonical mode are both off.
    #[must_use]
    pub const fn is_raw(&self) -> bool {
        self.0.c_lflag & (libc::ECHO | libc::ICANON) == 0
    }

    #[must_use]
    pub const fn as_termios(&self) -> &libc::termios {
        &self.0
    }

    /// Input and output baud rates.
    #[must_use]
    pub fn speeds(&self) -> (libc::speed_t, libc::speed_t) {
        unsafe { (libc::cfgetispeed(&raw const self.0), libc::cfgetospeed(&raw const self.0)) }
    }

    /// A typical cooked-mode snapshot for tests.
    #[cfg(test)]
    pub(crate) fn cooked() -> Self {
        let mut t: libc::termios = unsafe { std::mem::zeroed() };
        t.c_iflag = libc::ICRNL | libc::IXON | libc::BRKINT;
        t.c_oflag = libc::OPOST;
        t.c_cflag = libc::CS8 | libc::CREAD;
        t.c_lflag = libc::ECHO | libc::ICANON | libc::ISIG | libc::IEXTEN;
        t.c_cc[libc::VMIN] = 1;
        t.c_cc[libc::VTIME] = 0;
        Self(t)
    }
}

impl From<libc::termios> for TermMode {
    fn from(t: libc::termios) -> Self {
        Self(t)
    }
}

/// Every field `tcsetattr` applies: flags, control characters, line
/// discipline (Linux) and both speeds.
impl PartialEq for TermMode {
    fn eq(&self, other: &Self) -> bool {
        let (a, b) = (&self.0, &other.0);
        #[cfg(any(target_os = "linux", target_os = "android"))]
        if a.c_line != b.c_line {
            return false;
        }
        a.c_iflag == b.c_iflag
            && a.c_oflag == b.c_oflag
            && a.c_cflag == b.c_cflag
            && a.c_lflag == b.c_lflag
            && a.c_cc == b.c_cc
            && self.speeds() == other.speeds()
    }
}

impl Eq for TermMode {}

impl fmt::Debug for TermMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TermMode")
            .field("iflag", &format_args!("{:#x}", self.0.c_iflag))
            .field("oflag", &format_args!("{:#x}", self.0.c_oflag))
            .field("cflag", &format_args!("{:#x}", self.0.c_cflag))
            .field("lflag", &format_args!("{:#x}", self.0.c_lflag))
            .finish_non_exhaustive()
    }
}

// ─── Device Trait ───────────────────────────────────────────────────────────

/// A bidirectional terminal: bytes in, bytes out, plus mode and size.
pub trait TerminalDevice: ByteSource + Write {
    /// Current line-discipline settings.
    ///
    /// # Errors
    ///
    /// Returns the OS error when the settings can't be read.
    fn mode(&self) -> io::Result<TermMode>;

    /// Apply line-discipline settings.
    ///
    /// # Errors
    ///
    /// Returns the OS error when the settings can't be applied.
    fn set_mode(&mut self, mode: &TermMode) -> io::Result<()>;

    /// Current window size, if the device can report one.
    fn size(&self) -> Option<Size>;

    /// Descriptor the signal handlers may use for restore and resize.
    /// In-memory devices have none.
    fn raw_fd(&self) -> Option<RawFd> {
        None
    }
}

impl<D: TerminalDevice + ?Sized> TerminalDevice for &mut D {
    fn mode(&self) -> io::Result<TermMode> {
        (**self).mode()
    }

    fn set_mode(&mut self, mode: &TermMode) -> io::Result<()> {
        (**self).set_mode(mode)
    }

    fn size(&self) -> Option<Size> {
        (**self).size()
    }

    fn raw_fd(&self) -> Option<RawFd> {
        (**self).raw_fd()
    }
}

// ─── Tty ────────────────────────────────────────────────────────────────────

/// A real terminal device opened read/write.
pub struct Tty {
    input: File,
    output: BufWriter<File>,
}

impl Tty {
    /// Open the terminal at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceOpen`] when the path can't be opened, or is
    /// not a terminal.
    pub fn open(path: &Path) -> Result<Self> {
        let device_open = |source| Error::DeviceOpen {
            path: path.to_path_buf(),
            source,
        };

        let input = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(device_open)?;
        if unsafe { libc::isatty(input.as_raw_fd()) } == 0 {
            return Err(device_open(io::Error::last_os_error()));
        }
        let output = input.try_clone().map_err(device_open)?;

        Ok(Self {
            input,
            output: BufWriter::new(output),
        })
    }
}

impl fmt::Debug for Tty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tty")
            .field("fd", &self.input.as_raw_fd())
            .finish_non_exhaustive()
    }
}

/// Poll timeout in milliseconds, `-1` for "forever".
fn poll_millis(timeout: Option<Duration>) -> libc::c_int {
    timeout.map_or(-1, |t| {
        libc::c_int::try_from(t.as_millis()).unwrap_or(libc::c_int::MAX)
    })
}

impl ByteSource for Tty {
    fn read_byte(&mut self, timeout: Option<Duration>) -> io::Result<Option<u8>> {
        let fd = self.input.as_raw_fd();

        let ready = unsafe {
            let mut pfd = libc::pollfd {
                fd,
                events: libc::POLLIN,
                revents: 0,
            };
            libc::poll(&raw mut pfd, 1, poll_millis(timeout))
        };
        // EINTR surfaces as `Interrupted`; the decoder decides what it means.
        if ready < 0 {
            return Err(io::Error::last_os_error());
        }
        if ready == 0 {
            return Ok(None);
        }

        let mut byte = 0u8;
        let n = unsafe { libc::read(fd, (&raw mut byte).cast(), 1) };
        match n {
            1 => Ok(Some(byte)),
            0 => Err(io::ErrorKind::UnexpectedEof.into()),
            _ => Err(io::Error::last_os_error()),
        }
    }
}

impl Write for Tty {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.output.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.output.flush()
    }
}

impl TerminalDevice for Tty {
    fn mode(&self) -> io::Result<TermMode> {
        let mut t: libc::termios = unsafe { std::mem::zeroed() };
        if unsafe { libc::tcgetattr(self.input.as_raw_fd(), &raw mut t) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(TermMode(t))
    }

    fn set_mode(&mut self, mode: &TermMode) -> io::Result<()> {
        if unsafe { libc::tcsetattr(self.input.as_raw_fd(), libc::TCSAFLUSH, &raw const mode.0) }
            != 0
        {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn size(&self) -> Option<Size> {
        query_size(self.input.as_raw_fd())
    }

    fn raw_fd(&self) -> Option<RawFd> {
        Some(self.input.as_raw_fd())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
