// SPDX-License-Identifier: MIT
//
// Session configuration.
//
// Plain data with sensible defaults. Embedding applications can build one
// with the `with_*` helpers, or (with the `serde` feature) deserialize it
// from their own config file.

use std::path::PathBuf;
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Path of the controlling terminal on unix systems.
pub const DEFAULT_DEVICE: &str = "/dev/tty";

/// Maximum gap between two same-button releases merged into a double click.
pub const DEFAULT_DOUBLE_CLICK: Duration = Duration::from_millis(200);

/// How long to wait for the rest of an escape sequence.
///
/// A lone ESC is ambiguous: it is either the Escape key or the first byte
/// of a sequence. If nothing follows within this window it's the key.
pub const DEFAULT_ESCAPE_TIMEOUT: Duration = Duration::from_millis(25);

/// Tunables for a terminal session.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SessionConfig {
    /// Terminal device opened by [`Session::enable_with`](crate::Session::enable_with).
    pub device: PathBuf,
    /// Double-click threshold for mouse releases.
    pub double_click: Duration,
    /// Wait for continuation bytes of an escape sequence.
    pub escape_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            device: PathBuf::from(DEFAULT_DEVICE),
            double_click: DEFAULT_DOUBLE_CLICK,
            escape_timeout: DEFAULT_ESCAPE_TIMEOUT,
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn with_device(mut self, device: impl Into<PathBuf>) -> Self {
        self.device = device.into();
        self
    }

    #[must_use]
    pub const fn with_double_click(mut self, threshold: Duration) -> Self {
        self.double_click = threshold;
        self
    }

    #[must_use]
    pub const fn with_escape_timeout(mut self, timeout: Duration) -> Self {
        self.escape_timeout = timeout;
        self
    }
}
