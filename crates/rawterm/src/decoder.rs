// SPDX-License-Identifier: MIT
//
// Key/mouse decoder: turns the terminal's byte stream into input events.
//
// The grammar is small enough to be an explicit state machine:
//
//   Ground ──ESC──▶ Escape ──[──▶ CsiEntry ──digit──▶ CsiParam ──;──▶ CsiModifier
//                     │              │                    │                │
//                     │              └──<──▶ Mouse        └──final byte────┴──▶ key
//                     ├──O──▶ Ss3 ──P/Q/R/S──▶ F1–F4
//                     ├──P──▶ (DCS, rejected)
//                     └──other──▶ Alt+byte
//
// `State::advance` is a pure `(state, byte) -> Step` function, so every
// sequence can be tested without a terminal. `Decoder` drives it from a
// `ByteSource`, waiting for the first byte up to the caller's timeout and
// for continuation bytes up to the (much shorter) escape timeout. When the
// stream runs dry mid-sequence, `State::at_end` decides what the partial
// input means: a lone ESC is the Escape key, `ESC [` is Alt+[. A signal
// landing mid-sequence only restarts the wait for the remaining budget.
//
// CSI modifier parameters follow xterm (`mask = param - 1`, Shift = 1).
//
// Double-click promotion is the one time-dependent step. The decoder keeps
// the last release kind and its monotonic timestamp, scoped to itself
// rather than to the process.

use std::io;
use std::time::{Duration, Instant};

use crate::config::{DEFAULT_DOUBLE_CLICK, DEFAULT_ESCAPE_TIMEOUT};
use crate::key::{InputEvent, Key, KeyCode, Modifiers, MouseAction};

const ESC: u8 = 0x1B;

// ─── Byte Sources ───────────────────────────────────────────────────────────

/// Anything the decoder can pull single bytes from.
pub trait ByteSource {
    /// Read one byte, waiting at most `timeout` (`None` waits forever).
    ///
    /// `Ok(None)` means no byte arrived in time. A wait cut short by a
    /// signal is an [`io::ErrorKind::Interrupted`] error, not a timeout.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error (`Interrupted` included), or
    /// `UnexpectedEof` when the stream is closed.
    fn read_byte(&mut self, timeout: Option<Duration>) -> io::Result<Option<u8>>;
}

/// A byte slice as a source. Running out of bytes behaves like a timeout.
impl ByteSource for &[u8] {
    fn read_byte(&mut self, _timeout: Option<Duration>) -> io::Result<Option<u8>> {
        match self.split_first() {
            Some((&b, rest)) => {
                *self = rest;
                Ok(Some(b))
            }
            None => Ok(None),
        }
    }
}

impl<S: ByteSource + ?Sized> ByteSource for &mut S {
    fn read_byte(&mut self, timeout: Option<Duration>) -> io::Result<Option<u8>> {
        (**self).read_byte(timeout)
    }
}

// ─── State Machine ──────────────────────────────────────────────────────────

/// Decoder position within an escape sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Between events.
    Ground,
    /// After ESC.
    Escape,
    /// After `ESC [`.
    CsiEntry,
    /// Accumulating the leading numeric parameter.
    CsiParam { ps: u32 },
    /// After `Ps ;`, accumulating the modifier parameter.
    CsiModifier { ps: u32, modifier: u32 },
    /// After `ESC [ <`, accumulating `button ; column ; row`.
    Mouse { fields: [u32; 3], index: usize },
    /// After `ESC O`.
    Ss3,
}

/// Outcome of feeding one byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// More bytes needed.
    Pending(State),
    /// A complete event (before double-click promotion).
    Emit(InputEvent),
    /// The sequence matches no known grammar.
    Reject,
}

impl State {
    /// Feed one byte.
    #[must_use]
    pub fn advance(self, byte: u8) -> Step {
        match self {
            Self::Ground => match byte {
                ESC => Step::Pending(Self::Escape),
                b => emit(KeyCode::Byte(b), Modifiers::empty()),
            },
            Self::Escape => match byte {
                ESC => emit(KeyCode::ESCAPE, Modifiers::empty()),
                b'[' => Step::Pending(Self::CsiEntry),
                b'O' => Step::Pending(Self::Ss3),
                // DCS strings are not supported.
                b'P' => Step::Reject,
                b => emit(KeyCode::Byte(b), Modifiers::ALT),
            },
            Self::CsiEntry => match byte {
                b'<' => Step::Pending(Self::Mouse {
                    fields: [0; 3],
                    index: 0,
                }),
                d @ b'0'..=b'9' => Step::Pending(Self::CsiParam { ps: digit(0, d) }),
                b => csi_final(0, None, b),
            },
            Self::CsiParam { ps } => match byte {
                d @ b'0'..=b'9' => Step::Pending(Self::CsiParam { ps: digit(ps, d) }),
                b';' => Step::Pending(Self::CsiModifier { ps, modifier: 0 }),
                b => csi_final(ps, None, b),
            },
            Self::CsiModifier { ps, modifier } => match byte {
                d @ b'0'..=b'9' => Step::Pending(Self::CsiModifier {
                    ps,
                    modifier: digit(modifier, d),
                }),
                b => csi_final(ps, Some(modifier), b),
            },
            Self::Mouse { mut fields, index } => match byte {
                d @ b'0'..=b'9' => {
                    fields[index] = digit(fields[index], d);
                    Step::Pending(Self::Mouse { fields, index })
                }
                b';' if index < 2 => Step::Pending(Self::Mouse {
                    fields,
                    index: index + 1,
                }),
                b'M' if index == 2 => sgr_mouse(fields, false),
                b'm' if index == 2 => sgr_mouse(fields, true),
                _ => Step::Reject,
            },
            Self::Ss3 => match byte {
                b'P' => emit(KeyCode::F(1), Modifiers::empty()),
                b'Q' => emit(KeyCode::F(2), Modifiers::empty()),
                b'R' => emit(KeyCode::F(3), Modifiers::empty()),
                b'S' => emit(KeyCode::F(4), Modifiers::empty()),
                _ => Step::Reject,
            },
        }
    }

    /// What a partial sequence means when no further byte arrives.
    #[must_use]
    pub const fn at_end(self) -> Option<InputEvent> {
        match self {
            Self::Escape => Some(InputEvent::key(Key::new(KeyCode::ESCAPE))),
            Self::CsiEntry => Some(InputEvent::key(Key::with(
                KeyCode::Byte(b'['),
                Modifiers::ALT,
            ))),
            _ => None,
        }
    }
}

const fn emit(code: KeyCode, modifiers: Modifiers) -> Step {
    Step::Emit(InputEvent::key(Key::with(code, modifiers)))
}

fn digit(acc: u32, d: u8) -> u32 {
    acc.saturating_mul(10).saturating_add(u32::from(d - b'0'))
}

/// Decode an xterm modifier parameter (`1 + mask`, Shift=1 Alt=2 Ctrl=4 Meta=8).
#[must_use]
pub const fn decode_modifiers(param: u32) -> Modifiers {
    let mask = param.saturating_sub(1);
    let mut mods = Modifiers::empty();
    if mask & 1 != 0 {
        mods = mods.union(Modifiers::SHIFT);
    }
    if mask & 2 != 0 {
        mods = mods.union(Modifiers::ALT);
    }
    if mask & 4 != 0 {
        mods = mods.union(Modifiers::CTRL);
    }
    if mask & 8 != 0 {
        mods = mods.union(Modifiers::META);
    }
    mods
}

/// Select the key for a CSI final byte.
fn csi_final(ps: u32, modifier: Option<u32>, byte: u8) -> Step {
    let mods = modifier.map_or(Modifiers::empty(), decode_modifiers);
    let code = match byte {
        b'A' => KeyCode::Up,
        b'B' => KeyCode::Down,
        b'C' => KeyCode::Right,
        b'D' => KeyCode::Left,
        b'F' => KeyCode::End,
        b'H' => KeyCode::Home,
        // rxvt-style variants.
        b'J' if ps == 2 => return emit(KeyCode::Home, Modifiers::SHIFT),
        b'K' => return emit(KeyCode::End, Modifiers::SHIFT),
        b'M' => return emit(KeyCode::Delete, Modifiers::CTRL),
        b'P' if ps == 1 => KeyCode::F(1),
        b'P' => KeyCode::Delete,
        b'Q' if ps == 1 => KeyCode::F(2),
        b'R' if ps == 1 => KeyCode::F(3),
        b'S' if ps == 1 => KeyCode::F(4),
        b'~' => match tilde_key(ps) {
            Some(code) => code,
            None => return Step::Reject,
        },
        _ => return Step::Reject,
    };
    emit(code, mods)
}

/// The `CSI Ps ~` table.
const fn tilde_key(ps: u32) -> Option<KeyCode> {
    Some(match ps {
        1 | 7 => KeyCode::Home,
        2 => KeyCode::Insert,
        3 => KeyCode::Delete,
        4 | 8 => KeyCode::End,
        5 => KeyCode::PageUp,
        6 => KeyCode::PageDown,
        10 => KeyCode::F(0),
        11 => KeyCode::F(1),
        12 => KeyCode::F(2),
        13 => KeyCode::F(3),
        14 => KeyCode::F(4),
        15 => KeyCode::F(5),
        17 => KeyCode::F(6),
        18 => KeyCode::F(7),
        19 => KeyCode::F(8),
        20 => KeyCode::F(9),
        21 => KeyCode::F(10),
        23 => KeyCode::F(11),
        24 => KeyCode::F(12),
        _ => return None,
    })
}

/// Finish an SGR mouse report: `button ; column ; row` + `M` or `m`.
fn sgr_mouse([button, col, row]: [u32; 3], release: bool) -> Step {
    let mut mods = Modifiers::empty();
    if button & 4 != 0 {
        mods |= Modifiers::SHIFT;
    }
    if button & 8 != 0 {
        mods |= Modifiers::META;
    }
    if button & 16 != 0 {
        mods |= Modifiers::CTRL;
    }

    let action = match (button & !(4 | 8 | 16), release) {
        (0, false) => MouseAction::LeftPress,
        (0, true) => MouseAction::LeftRelease,
        (1, false) => MouseAction::MiddlePress,
        (1, true) => MouseAction::MiddleRelease,
        (2, false) => MouseAction::RightPress,
        (2, true) => MouseAction::RightRelease,
        (32, _) => MouseAction::LeftDrag,
        (33, _) => MouseAction::MiddleDrag,
        (34, _) => MouseAction::RightDrag,
        (64, _) => MouseAction::WheelUp,
        (65, _) => MouseAction::WheelDown,
        _ => return Step::Reject,
    };

    // Wire coordinates are 1-based.
    let x = u16::try_from(col.saturating_sub(1)).unwrap_or(u16::MAX);
    let y = u16::try_from(row.saturating_sub(1)).unwrap_or(u16::MAX);
    Step::Emit(InputEvent::mouse(action, mods, x, y))
}

// ─── Decoder ────────────────────────────────────────────────────────────────

/// Stateful decoder: the state machine plus double-click memory.
#[derive(Debug, Clone)]
pub struct Decoder {
    double_click: Duration,
    escape_timeout: Duration,
    last_release: Option<(MouseAction, Instant)>,
}

impl Decoder {
    #[must_use]
    pub const fn new(double_click: Duration, escape_timeout: Duration) -> Self {
        Self {
            double_click,
            escape_timeout,
            last_release: None,
        }
    }

    /// Read and decode the next event.
    ///
    /// Blocks up to `timeout` for the first byte (`None` blocks until input
    /// arrives). Returns `Ok(None)` on timeout, when a signal interrupts the
    /// wait for the first byte, and for input that matches no known
    /// sequence.
    ///
    /// # Errors
    ///
    /// Returns the source's I/O error when the stream fails or closes.
    pub fn decode_next(
        &mut self,
        src: &mut impl ByteSource,
        timeout: Option<Duration>,
    ) -> io::Result<Option<InputEvent>> {
        let first = match src.read_byte(timeout) {
            Ok(Some(b)) => b,
            Ok(None) => return Ok(None),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => return Ok(None),
            Err(err) => return Err(err),
        };

        let mut step = State::Ground.advance(first);
        loop {
            match step {
                Step::Emit(event) => return Ok(Some(self.promote(event, Instant::now()))),
                Step::Reject => return Ok(None),
                Step::Pending(state) => match self.continuation(src)? {
                    Some(b) => step = state.advance(b),
                    None => return Ok(state.at_end()),
                },
            }
        }
    }

    /// Wait for the next byte of a sequence, retrying interrupted waits
    /// until the escape timeout is spent.
    fn continuation(&self, src: &mut impl ByteSource) -> io::Result<Option<u8>> {
        let deadline = Instant::now() + self.escape_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match src.read_byte(Some(remaining)) {
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {
                    if remaining.is_zero() {
                        return Ok(None);
                    }
                }
                other => return other,
            }
        }
    }

    /// Apply double-click detection to a decoded event observed at `now`.
    fn promote(&mut self, mut event: InputEvent, now: Instant) -> InputEvent {
        let KeyCode::Mouse(action) = event.key.code else {
            return event;
        };
        if !action.is_release() {
            return event;
        }

        let mut kind = action;
        if let Some((last, at)) = self.last_release {
            if last == action && now.saturating_duration_since(at) < self.double_click {
                kind = action.doubled();
            }
        }
        self.last_release = Some((kind, now));
        event.key.code = KeyCode::Mouse(kind);
        event
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new(DEFAULT_DOUBLE_CLICK, DEFAULT_ESCAPE_TIMEOUT)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Helper: run the pure state machine over a complete byte string.
    fn run(bytes: &[u8]) -> Option<InputEvent> {
        let mut state = State::Ground;
        for &b in bytes {
            match state.advance(b) {
                Step::Pending(next) => state = next,
                Step::Emit(event) => return Some(event),
                Step::Reject => return None,
            }
        }
        state.at_end()
    }

    /// Helper: decode one event from a byte slice through the `Decoder`.
    fn decode(bytes: &[u8]) -> Option<InputEvent> {
        let mut src = bytes;
        Decoder::default().decode_next(&mut src, None).unwrap()
    }

    fn key(code: KeyCode) -> Option<InputEvent> {
        Some(InputEvent::key(Key::new(code)))
    }

    fn key_mod(code: KeyCode, modifiers: Modifiers) -> Option<InputEvent> {
        Some(InputEvent::key(Key::with(code, modifiers)))
    }

    fn mouse_at(action: MouseAction) -> InputEvent {
        InputEvent::mouse(action, Modifiers::empty(), 9, 9)
    }

    // ── Ground ──────────────────────────────────────────────────────────

    #[test]
    fn plain_bytes_are_literal() {
        assert_eq!(decode(b"a"), key(KeyCode::Byte(b'a')));
        assert_eq!(decode(b"\x03"), key(KeyCode::Byte(0x03)));
        assert_eq!(decode(b"\r"), key(KeyCode::ENTER));
        assert_eq!(decode(b"\x7f"), key(KeyCode::BACKSPACE));
        assert_eq!(decode(&[0xC3]), key(KeyCode::Byte(0xC3)));
    }

    #[test]
    fn empty_input_is_no_event() {
        assert_eq!(decode(b""), None);
    }

    // ── Escape ──────────────────────────────────────────────────────────

    #[test]
    fn lone_escape_is_escape_key() {
        assert_eq!(decode(b"\x1b"), key(KeyCode::ESCAPE));
    }

    #[test]
    fn double_escape_is_escape_key() {
        assert_eq!(decode(b"\x1b\x1b"), key(KeyCode::ESCAPE));
    }

    #[test]
    fn escape_then_byte_is_alt() {
        assert_eq!(decode(b"\x1bx"), key_mod(KeyCode::Byte(b'x'), Modifiers::ALT));
        assert_eq!(
            decode(b"\x1b\x01"),
            key_mod(KeyCode::Byte(0x01), Modifiers::ALT)
        );
    }

    #[test]
    fn csi_introducer_alone_is_alt_bracket() {
        assert_eq!(decode(b"\x1b["), key_mod(KeyCode::Byte(b'['), Modifiers::ALT));
    }

    #[test]
    fn dcs_is_rejected() {
        assert_eq!(decode(b"\x1bPq"), None);
        assert_eq!(State::Escape.advance(b'P'), Step::Reject);
    }

    // ── CSI ─────────────────────────────────────────────────────────────

    #[test]
    fn arrows() {
        assert_eq!(decode(b"\x1b[A"), key(KeyCode::Up));
        assert_eq!(decode(b"\x1b[B"), key(KeyCode::Down));
        assert_eq!(decode(b"\x1b[C"), key(KeyCode::Right));
        assert_eq!(decode(b"\x1b[D"), key(KeyCode::Left));
    }

    #[test]
    fn up_arrow_has_no_mouse_position() {
        let event = decode(b"\x1b[A").unwrap();
        assert_eq!(event.key.modifiers, Modifiers::empty());
        assert_eq!(event.mouse, None);
    }

    #[test]
    fn home_end_letters() {
        assert_eq!(decode(b"\x1b[H"), key(KeyCode::Home));
        assert_eq!(decode(b"\x1b[F"), key(KeyCode::End));
    }

    #[test]
    fn tilde_table() {
        let table: &[(&[u8], KeyCode)] = &[
            (b"\x1b[1~", KeyCode::Home),
            (b"\x1b[2~", KeyCode::Insert),
            (b"\x1b[3~", KeyCode::Delete),
            (b"\x1b[4~", KeyCode::End),
            (b"\x1b[5~", KeyCode::PageUp),
            (b"\x1b[6~", KeyCode::PageDown),
            (b"\x1b[7~", KeyCode::Home),
            (b"\x1b[8~", KeyCode::End),
            (b"\x1b[10~", KeyCode::F(0)),
            (b"\x1b[11~", KeyCode::F(1)),
            (b"\x1b[15~", KeyCode::F(5)),
            (b"\x1b[17~", KeyCode::F(6)),
            (b"\x1b[21~", KeyCode::F(10)),
            (b"\x1b[23~", KeyCode::F(11)),
            (b"\x1b[24~", KeyCode::F(12)),
        ];
        for (bytes, code) in table {
            assert_eq!(decode(bytes), key(*code), "{bytes:?}");
        }
    }

    #[test]
    fn unknown_tilde_numbers_are_rejected() {
        assert_eq!(decode(b"\x1b[9~"), None);
        assert_eq!(decode(b"\x1b[16~"), None);
        assert_eq!(decode(b"\x1b[99~"), None);
        assert_eq!(decode(b"\x1b[~"), None);
    }

    #[test]
    fn modifier_parameter() {
        assert_eq!(
            decode(b"\x1b[1;5C"),
            key_mod(KeyCode::Right, Modifiers::CTRL)
        );
        assert_eq!(
            decode(b"\x1b[1;2A"),
            key_mod(KeyCode::Up, Modifiers::SHIFT)
        );
        assert_eq!(
            decode(b"\x1b[3;3~"),
            key_mod(KeyCode::Delete, Modifiers::ALT)
        );
        assert_eq!(
            decode(b"\x1b[1;6D"),
            key_mod(KeyCode::Left, Modifiers::CTRL | Modifiers::SHIFT)
        );
        assert_eq!(
            decode(b"\x1b[24;9~"),
            key_mod(KeyCode::F(12), Modifiers::META)
        );
    }

    #[test]
    fn empty_modifier_parameter_means_none() {
        assert_eq!(decode(b"\x1b[1;A"), key(KeyCode::Up));
    }

    #[test]
    fn rxvt_variants() {
        assert_eq!(decode(b"\x1b[2J"), key_mod(KeyCode::Home, Modifiers::SHIFT));
        assert_eq!(decode(b"\x1b[J"), None);
        assert_eq!(decode(b"\x1b[K"), key_mod(KeyCode::End, Modifiers::SHIFT));
        assert_eq!(decode(b"\x1b[M"), key_mod(KeyCode::Delete, Modifiers::CTRL));
        assert_eq!(decode(b"\x1b[1P"), key(KeyCode::F(1)));
        assert_eq!(decode(b"\x1b[P"), key(KeyCode::Delete));
        assert_eq!(decode(b"\x1b[1Q"), key(KeyCode::F(2)));
        assert_eq!(decode(b"\x1b[1R"), key(KeyCode::F(3)));
        assert_eq!(decode(b"\x1b[1S"), key(KeyCode::F(4)));
        assert_eq!(decode(b"\x1b[Q"), None);
    }

    #[test]
    fn garbage_after_csi_is_rejected() {
        assert_eq!(decode(b"\x1b[z"), None);
        assert_eq!(decode(b"\x1b[1;2;3A"), None);
    }

    #[test]
    fn truncated_csi_is_no_event() {
        assert_eq!(decode(b"\x1b[1"), None);
        assert_eq!(decode(b"\x1b[1;5"), None);
    }

    #[test]
    fn huge_parameters_saturate() {
        assert_eq!(decode(b"\x1b[99999999999999999999~"), None);
    }

    // ── SS3 ─────────────────────────────────────────────────────────────

    #[test]
    fn ss3_function_keys() {
        assert_eq!(decode(b"\x1bOP"), key(KeyCode::F(1)));
        assert_eq!(decode(b"\x1bOQ"), key(KeyCode::F(2)));
        assert_eq!(decode(b"\x1bOR"), key(KeyCode::F(3)));
        assert_eq!(decode(b"\x1bOS"), key(KeyCode::F(4)));
    }

    #[test]
    fn ss3_other_is_rejected() {
        assert_eq!(decode(b"\x1bOA"), None);
        assert_eq!(decode(b"\x1bO"), None);
    }

    // ── SGR Mouse ───────────────────────────────────────────────────────

    #[test]
    fn mouse_left_press() {
        assert_eq!(
            decode(b"\x1b[<0;5;3M"),
            Some(InputEvent::mouse(MouseAction::LeftPress, Modifiers::empty(), 4, 2))
        );
    }

    #[test]
    fn mouse_buttons() {
        let table: &[(&[u8], MouseAction)] = &[
            (b"\x1b[<0;1;1m", MouseAction::LeftRelease),
            (b"\x1b[<1;1;1M", MouseAction::MiddlePress),
            (b"\x1b[<1;1;1m", MouseAction::MiddleRelease),
            (b"\x1b[<2;1;1M", MouseAction::RightPress),
            (b"\x1b[<2;1;1m", MouseAction::RightRelease),
            (b"\x1b[<32;1;1M", MouseAction::LeftDrag),
            (b"\x1b[<33;1;1M", MouseAction::MiddleDrag),
            (b"\x1b[<34;1;1M", MouseAction::RightDrag),
            (b"\x1b[<64;1;1M", MouseAction::WheelUp),
            (b"\x1b[<65;1;1M", MouseAction::WheelDown),
        ];
        for (bytes, action) in table {
            assert_eq!(
                run(bytes),
                Some(InputEvent::mouse(*action, Modifiers::empty(), 0, 0)),
                "{bytes:?}"
            );
        }
    }

    #[test]
    fn mouse_modifier_bits() {
        assert_eq!(
            decode(b"\x1b[<4;10;20M"),
            Some(InputEvent::mouse(MouseAction::LeftPress, Modifiers::SHIFT, 9, 19))
        );
        assert_eq!(
            decode(b"\x1b[<8;1;1M"),
            Some(InputEvent::mouse(MouseAction::LeftPress, Modifiers::META, 0, 0))
        );
        assert_eq!(
            decode(b"\x1b[<18;1;1M"),
            Some(InputEvent::mouse(MouseAction::RightPress, Modifiers::CTRL, 0, 0))
        );
        assert_eq!(
            decode(b"\x1b[<60;1;1M"),
            Some(InputEvent::mouse(
                MouseAction::LeftDrag,
                Modifiers::SHIFT | Modifiers::META | Modifiers::CTRL,
                0,
                0
            ))
        );
    }

    #[test]
    fn mouse_motion_without_button_is_rejected() {
        assert_eq!(decode(b"\x1b[<35;4;4M"), None);
    }

    #[test]
    fn malformed_mouse_is_rejected() {
        assert_eq!(decode(b"\x1b[<0;5M"), None);
        assert_eq!(decode(b"\x1b[<0;5;3;1M"), None);
        assert_eq!(decode(b"\x1b[<0;5;3x"), None);
        assert_eq!(decode(b"\x1b[<0;5;3"), None);
    }

    #[test]
    fn mouse_zero_coordinates_clamp() {
        assert_eq!(
            decode(b"\x1b[<0;0;0M"),
            Some(InputEvent::mouse(MouseAction::LeftPress, Modifiers::empty(), 0, 0))
        );
    }

    #[test]
    fn mouse_large_coordinates() {
        assert_eq!(
            decode(b"\x1b[<0;300;120M"),
            Some(InputEvent::mouse(MouseAction::LeftPress, Modifiers::empty(), 299, 119))
        );
        assert_eq!(
            decode(b"\x1b[<0;99999;1M"),
            Some(InputEvent::mouse(MouseAction::LeftPress, Modifiers::empty(), u16::MAX, 0))
        );
    }

    // ── Determinism ─────────────────────────────────────────────────────

    #[test]
    fn same_bytes_same_event() {
        let inputs: &[&[u8]] = &[b"\x1b[1;5C", b"\x1b[<2;7;8M", b"q", b"\x1bOS"];
        let mut decoder = Decoder::default();
        for bytes in inputs {
            let mut a = *bytes;
            let mut b = *bytes;
            let first = decoder.decode_next(&mut a, None).unwrap();
            let second = decoder.decode_next(&mut b, None).unwrap();
            assert_eq!(first, second);
        }
    }

    #[test]
    fn consecutive_events_from_one_stream() {
        let mut src: &[u8] = b"a\x1b[Bb\x1b[<0;2;2M";
        let mut decoder = Decoder::default();
        assert_eq!(decoder.decode_next(&mut src, None).unwrap(), key(KeyCode::Byte(b'a')));
        assert_eq!(decoder.decode_next(&mut src, None).unwrap(), key(KeyCode::Down));
        assert_eq!(decoder.decode_next(&mut src, None).unwrap(), key(KeyCode::Byte(b'b')));
        assert!(decoder.decode_next(&mut src, None).unwrap().unwrap().is_mouse());
        assert_eq!(decoder.decode_next(&mut src, None).unwrap(), None);
    }

    #[test]
    fn rejected_sequence_does_not_poison_the_next_one() {
        let mut src: &[u8] = b"\x1b[z\x1b[A";
        let mut decoder = Decoder::default();
        assert_eq!(decoder.decode_next(&mut src, None).unwrap(), None);
        assert_eq!(decoder.decode_next(&mut src, None).unwrap(), key(KeyCode::Up));
    }

    // ── Stream failures ─────────────────────────────────────────────────

    struct Closed;

    impl ByteSource for Closed {
        fn read_byte(&mut self, _timeout: Option<Duration>) -> io::Result<Option<u8>> {
            Err(io::ErrorKind::UnexpectedEof.into())
        }
    }

    #[test]
    fn closed_stream_is_an_error() {
        let err = Decoder::default().decode_next(&mut Closed, None).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    /// Scripted bytes with a signal landing before the byte at each index
    /// in `interrupt_before`.
    struct Interrupting {
        bytes: Vec<u8>,
        pos: usize,
        interrupt_before: Vec<usize>,
    }

    impl Interrupting {
        fn new(bytes: &[u8], interrupt_before: &[usize]) -> Self {
            Self {
                bytes: bytes.to_vec(),
                pos: 0,
                interrupt_before: interrupt_before.to_vec(),
            }
        }
    }

    impl ByteSource for Interrupting {
        fn read_byte(&mut self, _timeout: Option<Duration>) -> io::Result<Option<u8>> {
            if let Some(i) = self.interrupt_before.iter().position(|&at| at == self.pos) {
                self.interrupt_before.remove(i);
                return Err(io::ErrorKind::Interrupted.into());
            }
            let byte = self.bytes.get(self.pos).copied();
            if byte.is_some() {
                self.pos += 1;
            }
            Ok(byte)
        }
    }

    #[test]
    fn signal_mid_sequence_does_not_split_it() {
        let mut src = Interrupting::new(b"\x1b[1;5C", &[2]);
        let mut decoder = Decoder::default();
        assert_eq!(
            decoder.decode_next(&mut src, None).unwrap(),
            key_mod(KeyCode::Right, Modifiers::CTRL)
        );
        assert_eq!(decoder.decode_next(&mut src, None).unwrap(), None);
    }

    #[test]
    fn repeated_signals_mid_sequence() {
        let mut src = Interrupting::new(b"\x1b[<0;5;3M", &[1, 1, 4, 8]);
        let event = Decoder::default().decode_next(&mut src, None).unwrap();
        assert_eq!(
            event,
            Some(InputEvent::mouse(MouseAction::LeftPress, Modifiers::empty(), 4, 2))
        );
    }

    #[test]
    fn signal_before_first_byte_is_no_event() {
        let mut src = Interrupting::new(b"\x1b[A", &[0]);
        let mut decoder = Decoder::default();
        assert_eq!(decoder.decode_next(&mut src, None).unwrap(), None);
        assert_eq!(decoder.decode_next(&mut src, None).unwrap(), key(KeyCode::Up));
    }

    #[test]
    fn signal_after_lone_escape_is_still_escape() {
        let mut src = Interrupting::new(b"\x1b", &[1]);
        let event = Decoder::default().decode_next(&mut src, None).unwrap();
        assert_eq!(event, key(KeyCode::ESCAPE));
    }

    // ── Double click ────────────────────────────────────────────────────

    #[test]
    fn quick_second_release_is_double_click() {
        let mut decoder = Decoder::default();
        let t0 = Instant::now();
        let first = decoder.promote(mouse_at(MouseAction::LeftRelease), t0);
        let second =
            decoder.promote(mouse_at(MouseAction::LeftRelease), t0 + Duration::from_millis(120));
        assert_eq!(first.key.code, KeyCode::Mouse(MouseAction::LeftRelease));
        assert_eq!(second.key.code, KeyCode::Mouse(MouseAction::LeftDouble));
        assert_eq!(second.mouse, first.mouse);
    }

    #[test]
    fn slow_second_release_stays_release() {
        let mut decoder = Decoder::default();
        let t0 = Instant::now();
        decoder.promote(mouse_at(MouseAction::LeftRelease), t0);
        let second =
            decoder.promote(mouse_at(MouseAction::LeftRelease), t0 + Duration::from_millis(250));
        assert_eq!(second.key.code, KeyCode::Mouse(MouseAction::LeftRelease));
    }

    #[test]
    fn different_buttons_do_not_pair() {
        let mut decoder = Decoder::default();
        let t0 = Instant::now();
        decoder.promote(mouse_at(MouseAction::LeftRelease), t0);
        let second =
            decoder.promote(mouse_at(MouseAction::RightRelease), t0 + Duration::from_millis(10));
        assert_eq!(second.key.code, KeyCode::Mouse(MouseAction::RightRelease));
    }

    #[test]
    fn third_quick_release_starts_over() {
        let mut decoder = Decoder::default();
        let t0 = Instant::now();
        let ms = Duration::from_millis;
        decoder.promote(mouse_at(MouseAction::MiddleRelease), t0);
        let second = decoder.promote(mouse_at(MouseAction::MiddleRelease), t0 + ms(50));
        let third = decoder.promote(mouse_at(MouseAction::MiddleRelease), t0 + ms(100));
        assert_eq!(second.key.code, KeyCode::Mouse(MouseAction::MiddleDouble));
        assert_eq!(third.key.code, KeyCode::Mouse(MouseAction::MiddleRelease));
    }

    #[test]
    fn presses_do_not_touch_click_memory() {
        let mut decoder = Decoder::default();
        let t0 = Instant::now();
        let ms = Duration::from_millis;
        decoder.promote(mouse_at(MouseAction::LeftRelease), t0);
        decoder.promote(mouse_at(MouseAction::LeftPress), t0 + ms(40));
        let second = decoder.promote(mouse_at(MouseAction::LeftRelease), t0 + ms(80));
        assert_eq!(second.key.code, KeyCode::Mouse(MouseAction::LeftDouble));
    }

    #[test]
    fn custom_threshold() {
        let mut decoder = Decoder::new(Duration::from_millis(500), DEFAULT_ESCAPE_TIMEOUT);
        let t0 = Instant::now();
        decoder.promote(mouse_at(MouseAction::LeftRelease), t0);
        let second =
            decoder.promote(mouse_at(MouseAction::LeftRelease), t0 + Duration::from_millis(400));
        assert_eq!(second.key.code, KeyCode::Mouse(MouseAction::LeftDouble));
    }

    #[test]
    fn back_to_back_decoded_releases_promote() {
        let mut decoder = Decoder::default();
        let mut src: &[u8] = b"\x1b[<0;3;3m\x1b[<0;3;3m";
        let first = decoder.decode_next(&mut src, None).unwrap().unwrap();
        let second = decoder.decode_next(&mut src, None).unwrap().unwrap();
        assert_eq!(first.key.code, KeyCode::Mouse(MouseAction::LeftRelease));
        assert_eq!(second.key.code, KeyCode::Mouse(MouseAction::LeftDouble));
    }

    // ── Helpers ─────────────────────────────────────────────────────────

    #[test]
    fn modifier_decoding() {
        assert_eq!(decode_modifiers(0), Modifiers::empty());
        assert_eq!(decode_modifiers(1), Modifiers::empty());
        assert_eq!(decode_modifiers(2), Modifiers::SHIFT);
        assert_eq!(decode_modifiers(3), Modifiers::ALT);
        assert_eq!(decode_modifiers(5), Modifiers::CTRL);
        assert_eq!(decode_modifiers(9), Modifiers::META);
        assert_eq!(decode_modifiers(16), Modifiers::all());
    }
}
