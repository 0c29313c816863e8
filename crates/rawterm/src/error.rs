// SPDX-License-Identifier: MIT
//
// Error type shared by every fallible rawterm operation.
//
// Malformed terminal input is deliberately absent: the decoder reports it as
// "no event" (`Ok(None)`), because terminals routinely emit vendor sequences
// we don't recognize and that must never take the application down.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong while driving a terminal.
#[derive(Debug, Error)]
pub enum Error {
    /// The terminal device could not be opened.
    #[error("cannot open terminal device {}", path.display())]
    DeviceOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The terminal attributes could not be read or changed.
    #[error("cannot switch terminal mode")]
    ModeSwitch(#[source] io::Error),

    /// Another session already owns the controlling terminal.
    #[error("a terminal session is already active in this process")]
    AlreadyActive,

    /// A read or write on an open session failed.
    ///
    /// Recoverable: the caller may disable and re-enable the session.
    #[error("terminal stream failed")]
    Stream(#[from] io::Error),

    /// A caller-supplied value was rejected before any output was emitted.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

/// Shorthand used across the crate.
pub type Result<T> = std::result::Result<T, Error>;
