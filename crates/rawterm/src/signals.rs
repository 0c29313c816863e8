// SPDX-License-Identifier: MIT
//
// Signal handlers and process-exit hooks for the registered session.
//
// Safety: `sigaction`, `raise` and `atexit` are raw libc calls. The handler
// bodies only touch the registry slot (atomics plus the pre-published
// termios copies) and call async-signal-safe functions: no allocation, no
// locks, no logging.
#![allow(unsafe_code)]
//
// Three kinds of handler:
//
//   fatal   (TERM INT XCPU XFSZ VTALRM PROF SEGV)
//           restore the terminal, then re-raise. SA_RESETHAND has already
//           put the default disposition back, so the re-raise terminates
//           the process the way the signal normally would.
//   SIGTSTP restore, re-raise (the default action stops the process), and
//           when a SIGCONT resumes us, re-enter raw mode and re-install.
//   SIGWINCH re-query the window size into the slot.
//
// The panic hook and the atexit callback cover the non-signal exits. All
// of them funnel into `Slot::restore`, which runs at most once.

use std::io;
use std::sync::{Mutex, Once};

use libc::c_int;

use crate::registry::SLOT;

/// Signals that end the process and need the terminal restored first.
pub const FATAL_SIGNALS: [c_int; 7] = [
    libc::SIGTERM,
    libc::SIGINT,
    libc::SIGXCPU,
    libc::SIGXFSZ,
    libc::SIGVTALRM,
    libc::SIGPROF,
    libc::SIGSEGV,
];

const ONE_SHOT: c_int = libc::SA_NODEFER | libc::SA_RESETHAND;

/// Dispositions replaced by [`install`], restored by [`uninstall`].
/// Only touched from the thread that owns the session, never from handlers.
static PREVIOUS: Mutex<Vec<(c_int, libc::sigaction)>> = Mutex::new(Vec::new());

static HOOKS_INSTALLED: Once = Once::new();

// ─── Install / Uninstall ────────────────────────────────────────────────────

/// Install every handler. Idempotent while installed.
///
/// # Errors
///
/// Returns the OS error from the first `sigaction` that fails. Handlers
/// installed before the failure stay in place until [`uninstall`].
pub fn install() -> io::Result<()> {
    install_exit_hooks();

    let mut previous = PREVIOUS
        .lock()
        .map_err(|_| io::Error::other("signal table lock poisoned"))?;
    if !previous.is_empty() {
        return Ok(());
    }

    let old = set_handler(libc::SIGWINCH, winch_handler, libc::SA_RESTART)?;
    previous.push((libc::SIGWINCH, old));
    for sig in FATAL_SIGNALS {
        let old = set_handler(sig, fatal_handler, ONE_SHOT)?;
        previous.push((sig, old));
    }
    let old = set_handler(libc::SIGTSTP, tstp_handler, ONE_SHOT)?;
    previous.push((libc::SIGTSTP, old));

    tracing::debug!(count = previous.len(), "signal handlers installed");
    Ok(())
}

/// Put back the dispositions that were active before [`install`].
pub fn uninstall() {
    let Ok(mut previous) = PREVIOUS.lock() else {
        tracing::warn!("signal table lock poisoned; handlers left in place");
        return;
    };
    for (sig, old) in previous.drain(..) {
        if unsafe { libc::sigaction(sig, &raw const old, std::ptr::null_mut()) } != 0 {
            tracing::warn!(
                signal = sig,
                error = %io::Error::last_os_error(),
                "failed to restore signal disposition"
            );
        }
    }
    tracing::debug!("signal handlers uninstalled");
}

/// Number of dispositions currently replaced.
#[must_use]
pub fn installed_count() -> usize {
    PREVIOUS.lock().map_or(0, |previous| previous.len())
}

/// Send ourselves SIGTSTP. Returns once the process is continued.
///
/// # Errors
///
/// Returns the OS error when `raise` fails.
pub fn suspend_process() -> io::Result<()> {
    if unsafe { libc::raise(libc::SIGTSTP) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Point `sig` at `handler`, returning the previous disposition.
/// Async-signal-safe.
fn set_handler(
    sig: c_int,
    handler: extern "C" fn(c_int),
    flags: c_int,
) -> io::Result<libc::sigaction> {
    unsafe {
        let mut sa: libc::sigaction = std::mem::zeroed();
        sa.sa_sigaction = handler as *const () as usize;
        sa.sa_flags = flags;
        libc::sigemptyset(&raw mut sa.sa_mask);

        let mut old: libc::sigaction = std::mem::zeroed();
        if libc::sigaction(sig, &raw const sa, &raw mut old) != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(old)
    }
}

// ─── Handlers ───────────────────────────────────────────────────────────────

extern "C" fn fatal_handler(sig: c_int) {
    SLOT.restore();
    unsafe {
        libc::raise(sig);
    }
}

extern "C" fn tstp_handler(sig: c_int) {
    SLOT.restore();
    unsafe {
        libc::raise(sig);
    }
    // Resumed by SIGCONT.
    SLOT.reenter();
    SLOT.refresh_size();
    let _ = set_handler(sig, tstp_handler, ONE_SHOT);
}

extern "C" fn winch_handler(_sig: c_int) {
    SLOT.refresh_size();
}

// ─── Exit Hooks ─────────────────────────────────────────────────────────────

extern "C" fn restore_at_exit() {
    SLOT.restore();
}

/// Panic hook plus atexit callback, installed once per process.
///
/// The panic hook restores before delegating to the previous hook, so the
/// panic message lands on a cooked, main-screen terminal. Only panics on
/// the thread that enabled the session restore; that includes panics the
/// owner later catches with `catch_unwind`, after which the session stays
/// in cooked mode until it is suspended and resumed or re-enabled.
fn install_exit_hooks() {
    HOOKS_INSTALLED.call_once(|| {
        if unsafe { libc::atexit(restore_at_exit) } != 0 {
            tracing::warn!("atexit registration failed");
        }

        let original = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            if SLOT.owned_by_current_thread() {
                SLOT.restore();
            }
            original(info);
        }));
    });
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicI32, Ordering};

    static SEEN: AtomicI32 = AtomicI32::new(0);

    extern "C" fn record(sig: c_int) {
        SEEN.store(sig, Ordering::SeqCst);
    }

    #[test]
    fn fatal_set_excludes_stop_and_resize() {
        assert!(!FATAL_SIGNALS.contains(&libc::SIGTSTP));
        assert!(!FATAL_SIGNALS.contains(&libc::SIGWINCH));
        assert!(FATAL_SIGNALS.contains(&libc::SIGSEGV));
    }

    #[test]
    fn set_handler_routes_and_returns_previous() {
        let old = set_handler(libc::SIGUSR2, record, libc::SA_RESTART).unwrap();
        unsafe {
            libc::raise(libc::SIGUSR2);
        }
        assert_eq!(SEEN.load(Ordering::SeqCst), libc::SIGUSR2);

        let mine = set_handler(libc::SIGUSR2, record, 0).unwrap();
        assert_eq!(mine.sa_sigaction, record as *const () as usize);
        unsafe {
            libc::sigaction(libc::SIGUSR2, &raw const old, std::ptr::null_mut());
        }
    }

    #[test]
    fn install_then_uninstall() {
        let _serial = crate::registry::serial();
        install().unwrap();
        assert_eq!(installed_count(), FATAL_SIGNALS.len() + 2);
        install().unwrap();
        assert_eq!(installed_count(), FATAL_SIGNALS.len() + 2);

        // Nothing is armed, so a resize is a harmless no-op.
        unsafe {
            libc::raise(libc::SIGWINCH);
        }

        uninstall();
        assert_eq!(installed_count(), 0);
    }
}
