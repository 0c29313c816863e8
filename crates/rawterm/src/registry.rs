// SPDX-License-Identifier: MIT
//
// Process-wide slot for the active terminal session.
//
// Safety: signal handlers can't reach a `Session` value, so everything they
// need is published here ahead of time: the descriptor, the saved and raw
// termios copies, and the window size. The termios copies live in
// `UnsafeCell`s and follow a publish/consume protocol:
//
//   - the owning thread writes both copies, then sets `armed` (Release);
//   - a handler takes `armed` with `swap(false)` (Acquire) and only then
//     reads the copies;
//   - the owning thread never writes the copies while `armed` is set.
//
// `swap` makes restoration happen at most once, however many handlers,
// exit paths and panic hooks race for it.
#![allow(unsafe_code)]

use std::cell::UnsafeCell;
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU16, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread::{self, ThreadId};

use crate::ansi::{ENTER, LEAVE};
use crate::device::{query_size, Size, TermMode};

// ─── SizeCell ───────────────────────────────────────────────────────────────

/// Last known window size plus a sticky "changed" flag.
///
/// Writers only ever set the flag; readers clear it.
#[derive(Debug)]
pub(crate) struct SizeCell {
    cols: AtomicU16,
    rows: AtomicU16,
    changed: AtomicBool,
}

impl SizeCell {
    pub(crate) const fn new() -> Self {
        Self {
            cols: AtomicU16::new(0),
            rows: AtomicU16::new(0),
            changed: AtomicBool::new(false),
        }
    }

    pub(crate) fn load(&self) -> Size {
        Size {
            cols: self.cols.load(Ordering::Relaxed),
            rows: self.rows.load(Ordering::Relaxed),
        }
    }

    /// Record `size` without raising the flag (initial measurement).
    pub(crate) fn reset(&self, size: Size) {
        self.cols.store(size.cols, Ordering::Relaxed);
        self.rows.store(size.rows, Ordering::Relaxed);
        self.changed.store(false, Ordering::Relaxed);
    }

    /// Record `size`; raises the flag when it differs from the stored one.
    pub(crate) fn update(&self, size: Size) -> bool {
        let old_cols = self.cols.swap(size.cols, Ordering::Relaxed);
        let old_rows = self.rows.swap(size.rows, Ordering::Relaxed);
        let differs = old_cols != size.cols || old_rows != size.rows;
        if differs {
            self.changed.store(true, Ordering::Release);
        }
        differs
    }

    pub(crate) fn changed(&self) -> bool {
        self.changed.load(Ordering::Acquire)
    }

    pub(crate) fn clear_changed(&self) {
        self.changed.store(false, Ordering::Release);
    }

    pub(crate) fn take_changed(&self) -> bool {
        self.changed.swap(false, Ordering::AcqRel)
    }
}

// ─── Slot ───────────────────────────────────────────────────────────────────

pub(crate) struct Slot {
    claimed: AtomicBool,
    armed: AtomicBool,
    fd: AtomicI32,
    size: SizeCell,
    /// Thread that claimed the slot. Never touched from signal handlers.
    owner: Mutex<Option<ThreadId>>,
    saved: UnsafeCell<libc::termios>,
    raw: UnsafeCell<libc::termios>,
}

// SAFETY: the termios cells are only accessed under the protocol above.
unsafe impl Sync for Slot {}

impl Slot {
    pub(crate) const fn new() -> Self {
        Self {
            claimed: AtomicBool::new(false),
            armed: AtomicBool::new(false),
            fd: AtomicI32::new(-1),
            size: SizeCell::new(),
            owner: Mutex::new(None),
            saved: UnsafeCell::new(unsafe { std::mem::zeroed() }),
            raw: UnsafeCell::new(unsafe { std::mem::zeroed() }),
        }
    }

    /// Take ownership of the slot. `false` if another session holds it.
    pub(crate) fn claim(&self) -> bool {
        let won = self
            .claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if won {
            *self.owner() = Some(thread::current().id());
        }
        won
    }

    pub(crate) fn release(&self) {
        self.armed.store(false, Ordering::Release);
        self.fd.store(-1, Ordering::Release);
        *self.owner() = None;
        self.claimed.store(false, Ordering::Release);
    }

    /// Whether the calling thread is the one that claimed the slot.
    pub(crate) fn owned_by_current_thread(&self) -> bool {
        *self.owner() == Some(thread::current().id())
    }

    fn owner(&self) -> std::sync::MutexGuard<'_, Option<ThreadId>> {
        self.owner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::Acquire)
    }

    /// Publish the termios copies for `fd` and mark the terminal as needing
    /// restoration. Must not be called while armed.
    pub(crate) fn arm(&self, fd: RawFd, saved: &TermMode, raw: &TermMode) {
        debug_assert!(!self.armed.load(Ordering::Acquire));
        unsafe {
            *self.saved.get() = *saved.as_termios();
            *self.raw.get() = *raw.as_termios();
        }
        self.fd.store(fd, Ordering::Release);
        self.armed.store(true, Ordering::Release);
    }

    /// Withdraw the restoration duty. `true` if it was still pending, i.e.
    /// the caller is now responsible for restoring the terminal.
    pub(crate) fn disarm(&self) -> bool {
        self.armed.swap(false, Ordering::AcqRel)
    }

    /// Put the terminal back in its saved mode and leave the alternate
    /// screen. Async-signal-safe; does nothing unless armed.
    pub(crate) fn restore(&self) {
        if !self.disarm() {
            return;
        }
        let fd = self.fd.load(Ordering::Acquire);
        unsafe {
            libc::tcsetattr(fd, libc::TCSANOW, self.saved.get());
        }
        write_all_raw(fd, LEAVE);
    }

    /// Re-apply the raw mode after a stop/continue cycle. Async-signal-safe.
    pub(crate) fn reenter(&self) {
        if !self.is_claimed() || self.armed.load(Ordering::Acquire) {
            return;
        }
        let fd = self.fd.load(Ordering::Acquire);
        if fd < 0 {
            return;
        }
        unsafe {
            libc::tcsetattr(fd, libc::TCSANOW, self.raw.get());
        }
        write_all_raw(fd, ENTER);
        self.armed.store(true, Ordering::Release);
    }

    /// Re-query the window size of the registered descriptor.
    /// Async-signal-safe.
    pub(crate) fn refresh_size(&self) -> bool {
        let fd = self.fd.load(Ordering::Acquire);
        match query_size(fd) {
            Some(size) => self.size.update(size),
            None => false,
        }
    }

    pub(crate) const fn size(&self) -> &SizeCell {
        &self.size
    }
}

/// Write `buf` with bare `write(2)` calls, retrying on partial writes and
/// EINTR. Gives up silently on any other failure.
fn write_all_raw(fd: RawFd, mut buf: &[u8]) {
    while !buf.is_empty() {
        let n = unsafe { libc::write(fd, buf.as_ptr().cast(), buf.len()) };
        if n > 0 {
            #[allow(clippy::cast_sign_loss)]
            let n = n as usize;
            buf = &buf[n..];
        } else if n < 0 && errno_is_eintr() {
            continue;
        } else {
            return;
        }
    }
}

fn errno_is_eintr() -> bool {
    std::io::Error::last_os_error().raw_os_error() == Some(libc::EINTR)
}

/// The one slot shared by the signal handlers and the registered session.
pub(crate) static SLOT: Slot = Slot::new();

/// Serializes tests that touch `SLOT` or the process signal dispositions.
#[cfg(test)]
pub(crate) fn serial() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: Mutex<()> = Mutex::new(());
    LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const fn size(cols: u16, rows: u16) -> Size {
        Size { cols, rows }
    }

    #[test]
    fn size_update_raises_flag_only_on_change() {
        let cell = SizeCell::new();
        cell.reset(size(80, 24));
        assert!(!cell.changed());

        assert!(!cell.update(size(80, 24)));
        assert!(!cell.changed());

        assert!(cell.update(size(100, 30)));
        assert!(cell.changed());
        assert_eq!(cell.load(), size(100, 30));
    }

    #[test]
    fn size_flag_is_sticky_until_cleared() {
        let cell = SizeCell::new();
        cell.reset(size(80, 24));
        cell.update(size(81, 24));
        cell.update(size(81, 24));
        assert!(cell.changed());
        assert!(cell.changed());
        cell.clear_changed();
        assert!(!cell.changed());
    }

    #[test]
    fn take_changed_consumes() {
        let cell = SizeCell::new();
        cell.update(size(10, 10));
        assert!(cell.take_changed());
        assert!(!cell.take_changed());
    }

    #[test]
    fn claim_is_exclusive() {
        let slot = Slot::new();
        assert!(slot.claim());
        assert!(!slot.claim());
        slot.release();
        assert!(slot.claim());
    }

    #[test]
    fn owner_is_the_claiming_thread() {
        let slot = Slot::new();
        assert!(!slot.owned_by_current_thread());
        assert!(slot.claim());
        assert!(slot.owned_by_current_thread());
        thread::scope(|s| {
            s.spawn(|| assert!(!slot.owned_by_current_thread()));
        });
        slot.release();
        assert!(!slot.owned_by_current_thread());
    }

    #[test]
    fn disarm_hands_over_exactly_once() {
        let slot = Slot::new();
        assert!(slot.claim());
        let saved = TermMode::cooked();
        slot.arm(-1, &saved, &saved.raw());
        assert!(slot.disarm());
        assert!(!slot.disarm());
    }

    #[test]
    fn restore_consumes_the_armed_state() {
        let slot = Slot::new();
        assert!(slot.claim());
        let saved = TermMode::cooked();
        // fd -1: the libc calls fail with EBADF, which restore ignores.
        slot.arm(-1, &saved, &saved.raw());
        slot.restore();
        assert!(!slot.disarm());
        slot.restore();
    }

    #[test]
    fn reenter_requires_a_claimed_descriptor() {
        let slot = Slot::new();
        slot.reenter();
        assert!(!slot.disarm());

        assert!(slot.claim());
        slot.reenter();
        assert!(!slot.disarm());
    }

    #[test]
    fn release_clears_everything() {
        let slot = Slot::new();
        assert!(slot.claim());
        let saved = TermMode::cooked();
        slot.arm(-1, &saved, &saved.raw());
        slot.release();
        assert!(!slot.is_claimed());
        assert!(!slot.disarm());
    }

    #[test]
    fn refresh_without_terminal_keeps_size() {
        let slot = Slot::new();
        slot.size().reset(size(80, 24));
        assert!(!slot.refresh_size());
        assert_eq!(slot.size().load(), size(80, 24));
    }
}
