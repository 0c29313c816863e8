// SPDX-License-Identifier: MIT
//
// rawterm: raw-mode terminal control.
//
// The low layer under a full-screen terminal program: put the controlling
// terminal into raw mode on the alternate screen, turn its input bytes into
// key and mouse events, turn drawing requests into escape sequences, and
// put everything back the way it was on every exit path, signals included.
//
// There is no screen model here: each drawing call writes its bytes and
// forgets them. What state there is lives in the decoder (click timing)
// and the session (saved terminal mode, window size).
//
// The encoder (`ansi`, `attr`) and decoder (`decoder`, `key`) are pure and
// portable. Everything that touches termios or signals is unix-only.

pub mod ansi;
pub mod attr;
pub mod config;
pub mod decoder;
pub mod error;
pub mod key;

#[cfg(unix)]
pub mod device;
#[cfg(unix)]
mod registry;
#[cfg(unix)]
pub mod session;
#[cfg(unix)]
mod signals;

pub use ansi::{ClearMode, CursorStyle, Rectangle};
pub use attr::{AttributeSet, Rgb};
pub use config::SessionConfig;
pub use decoder::{ByteSource, Decoder};
pub use error::{Error, Result};
pub use key::{keyname, keynamed, InputEvent, Key, KeyCode, Modifiers, MouseAction, MousePosition};

#[cfg(unix)]
pub use device::{Size, TermMode, TerminalDevice, Tty};
#[cfg(unix)]
pub use session::Session;
