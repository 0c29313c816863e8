// SPDX-License-Identifier: MIT
//
// Key codes, modifiers, decoded input events, and the key name table.
//
// A decoded key is a code plus a modifier set. Codes are either literal
// bytes (everything the terminal sends unescaped, control characters
// included), named keys recovered from escape sequences, or mouse actions.
//
// The name table is the single source for human-readable key names. It is
// ordered: the first entry for a code is that code's canonical name, later
// entries are accepted aliases ("Return" for Enter, "Page Up" for PgUp).
// `keynamed(&keyname(k)) == k` holds for every table code and every byte
// under every combination of modifiers. Where a plain spelling would read
// back as a different key ("Ctrl-c" names byte 0x03, not Ctrl + 'c'),
// `keyname` spells the byte as `\xNN` instead.

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;

use crate::error::Error;

// ─── Key Codes ──────────────────────────────────────────────────────────────

/// Identity of a key or mouse action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    /// A byte delivered as-is: printable ASCII, control characters,
    /// or one byte of a UTF-8 sequence.
    Byte(u8),
    /// Function key F0 through F12.
    F(u8),
    Insert,
    Delete,
    Home,
    End,
    PageUp,
    PageDown,
    Up,
    Down,
    Left,
    Right,
    /// A mouse button, drag, or wheel action.
    Mouse(MouseAction),
}

impl KeyCode {
    pub const CTRL_AT: Self = Self::Byte(0x00);
    pub const TAB: Self = Self::Byte(0x09);
    pub const ENTER: Self = Self::Byte(0x0D);
    pub const ESCAPE: Self = Self::Byte(0x1B);
    pub const SPACE: Self = Self::Byte(0x20);
    pub const BACKSPACE: Self = Self::Byte(0x7F);

    /// `Ctrl-<letter>` as the control byte the terminal sends for it.
    ///
    /// Returns `None` for anything other than an ASCII letter.
    #[must_use]
    pub const fn ctrl(letter: u8) -> Option<Self> {
        if letter.is_ascii_alphabetic() {
            Some(Self::Byte(letter.to_ascii_lowercase() - b'a' + 1))
        } else {
            None
        }
    }
}

/// Mouse action reported through the SGR mouse protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseAction {
    LeftPress,
    RightPress,
    MiddlePress,
    LeftDrag,
    RightDrag,
    MiddleDrag,
    LeftRelease,
    RightRelease,
    MiddleRelease,
    LeftDouble,
    RightDouble,
    MiddleDouble,
    WheelUp,
    WheelDown,
}

impl MouseAction {
    /// Whether this is a plain button release (candidate for double click).
    #[must_use]
    pub const fn is_release(self) -> bool {
        matches!(
            self,
            Self::LeftRelease | Self::RightRelease | Self::MiddleRelease
        )
    }

    /// The double-click variant of a release, or `self` for anything else.
    #[must_use]
    pub const fn doubled(self) -> Self {
        match self {
            Self::LeftRelease => Self::LeftDouble,
            Self::RightRelease => Self::RightDouble,
            Self::MiddleRelease => Self::MiddleDouble,
            other => other,
        }
    }
}

bitflags! {
    /// Modifier keys held during a key or mouse event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct Modifiers: u8 {
        const META  = 0b0001;
        const CTRL  = 0b0010;
        const ALT   = 0b0100;
        const SHIFT = 0b1000;
    }
}

/// A key code together with its modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key {
    pub code: KeyCode,
    pub modifiers: Modifiers,
}

impl Key {
    /// A key with no modifiers.
    #[must_use]
    pub const fn new(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: Modifiers::empty(),
        }
    }

    #[must_use]
    pub const fn with(code: KeyCode, modifiers: Modifiers) -> Self {
        Self { code, modifiers }
    }
}

impl From<KeyCode> for Key {
    fn from(code: KeyCode) -> Self {
        Self::new(code)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&keyname(*self))
    }
}

impl FromStr for Key {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        keynamed(s).ok_or_else(|| Error::invalid(format!("unknown key name '{s}'")))
    }
}

// ─── Input Events ───────────────────────────────────────────────────────────

/// 0-based cell position of a mouse event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MousePosition {
    /// Column.
    pub x: u16,
    /// Row.
    pub y: u16,
}

/// One decoded unit of terminal input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InputEvent {
    pub key: Key,
    /// Present only for mouse events.
    pub mouse: Option<MousePosition>,
}

impl InputEvent {
    #[must_use]
    pub const fn key(key: Key) -> Self {
        Self { key, mouse: None }
    }

    #[must_use]
    pub const fn mouse(action: MouseAction, modifiers: Modifiers, x: u16, y: u16) -> Self {
        Self {
            key: Key::with(KeyCode::Mouse(action), modifiers),
            mouse: Some(MousePosition { x, y }),
        }
    }

    #[must_use]
    pub const fn is_mouse(&self) -> bool {
        self.mouse.is_some()
    }
}

// ─── Name Table ─────────────────────────────────────────────────────────────

use KeyCode::{Byte, Mouse};
use MouseAction as M;

/// Code ↔ name table. First entry per code is canonical.
#[rustfmt::skip]
static KEY_NAMES: &[(KeyCode, &str)] = &[
    (Byte(0x20), "Space"), (Byte(0x7F), "Backspace"),
    (KeyCode::F(0), "F0"), (KeyCode::F(1), "F1"), (KeyCode::F(2), "F2"),
    (KeyCode::F(3), "F3"), (KeyCode::F(4), "F4"), (KeyCode::F(5), "F5"),
    (KeyCode::F(6), "F6"), (KeyCode::F(7), "F7"), (KeyCode::F(8), "F8"),
    (KeyCode::F(9), "F9"), (KeyCode::F(10), "F10"), (KeyCode::F(11), "F11"),
    (KeyCode::F(12), "F12"),
    (KeyCode::Insert, "Insert"), (KeyCode::Delete, "Delete"),
    (KeyCode::Home, "Home"), (KeyCode::End, "End"),
    (KeyCode::PageUp, "PgUp"), (KeyCode::PageUp, "Page Up"),
    (KeyCode::PageDown, "PgDn"), (KeyCode::PageDown, "Page Down"),
    (KeyCode::Up, "Up"), (KeyCode::Down, "Down"),
    (KeyCode::Left, "Left"), (KeyCode::Right, "Right"),
    (Mouse(M::LeftPress), "Left press"), (Mouse(M::RightPress), "Right press"),
    (Mouse(M::MiddlePress), "Middle press"),
    (Mouse(M::LeftDrag), "Left drag"), (Mouse(M::RightDrag), "Right drag"),
    (Mouse(M::MiddleDrag), "Middle drag"),
    (Mouse(M::LeftRelease), "Left release"), (Mouse(M::RightRelease), "Right release"),
    (Mouse(M::MiddleRelease), "Middle release"),
    (Mouse(M::LeftRelease), "Left up"), (Mouse(M::RightRelease), "Right up"),
    (Mouse(M::MiddleRelease), "Middle up"),
    (Mouse(M::LeftRelease), "Left click"), (Mouse(M::RightRelease), "Right click"),
    (Mouse(M::MiddleRelease), "Middle click"),
    (Mouse(M::LeftDouble), "Double left click"), (Mouse(M::RightDouble), "Double right click"),
    (Mouse(M::MiddleDouble), "Double middle click"),
    (Mouse(M::WheelUp), "Mouse wheel up"), (Mouse(M::WheelDown), "Mouse wheel down"),
    (Byte(0x09), "Tab"), (Byte(0x0D), "Enter"), (Byte(0x0D), "Return"),
    (Byte(0x01), "Ctrl-a"), (Byte(0x02), "Ctrl-b"), (Byte(0x03), "Ctrl-c"),
    (Byte(0x04), "Ctrl-d"), (Byte(0x05), "Ctrl-e"), (Byte(0x06), "Ctrl-f"),
    (Byte(0x07), "Ctrl-g"), (Byte(0x08), "Ctrl-h"), (Byte(0x09), "Ctrl-i"),
    (Byte(0x0A), "Ctrl-j"), (Byte(0x0B), "Ctrl-k"), (Byte(0x0C), "Ctrl-l"),
    (Byte(0x0D), "Ctrl-m"), (Byte(0x0E), "Ctrl-n"), (Byte(0x0F), "Ctrl-o"),
    (Byte(0x10), "Ctrl-p"), (Byte(0x11), "Ctrl-q"), (Byte(0x12), "Ctrl-r"),
    (Byte(0x13), "Ctrl-s"), (Byte(0x14), "Ctrl-t"), (Byte(0x15), "Ctrl-u"),
    (Byte(0x16), "Ctrl-v"), (Byte(0x17), "Ctrl-w"), (Byte(0x18), "Ctrl-x"),
    (Byte(0x19), "Ctrl-y"), (Byte(0x1A), "Ctrl-z"),
    (Byte(0x1B), "Esc"), (Byte(0x1B), "Escape"),
    (Byte(0x1E), "Ctrl-~"), (Byte(0x1C), "Ctrl-\\"),
    (Byte(0x1B), "Ctrl-["), (Byte(0x1D), "Ctrl-]"),
    (Byte(0x1F), "Ctrl-_"), (Byte(0x1F), "Ctrl-/"),
    (Byte(0x00), "Ctrl-@"), (Byte(0x1E), "Ctrl-^"), (Byte(0x00), "Ctrl-`"),
    (Byte(0x00), "Ctrl-2"), (Byte(0x1B), "Ctrl-3"), (Byte(0x1C), "Ctrl-4"),
    (Byte(0x1D), "Ctrl-5"), (Byte(0x1E), "Ctrl-6"), (Byte(0x1F), "Ctrl-7"),
    (Byte(0x7F), "Ctrl-8"),
    (Byte(b':'), "Colon"),
];

/// Modifier name prefixes in the order [`keyname`] emits them.
const MODIFIER_PREFIXES: [(&str, Modifiers); 4] = [
    ("Super-", Modifiers::META),
    ("Ctrl-", Modifiers::CTRL),
    ("Alt-", Modifiers::ALT),
    ("Shift-", Modifiers::SHIFT),
];

fn name_of(code: KeyCode) -> Option<&'static str> {
    KEY_NAMES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
}

fn code_named(name: &str) -> Option<KeyCode> {
    KEY_NAMES
        .iter()
        .find(|(_, n)| *n == name)
        .map(|(code, _)| *code)
}

/// Every code that has an entry in the name table, without duplicates.
pub fn named_codes() -> impl Iterator<Item = KeyCode> {
    KEY_NAMES
        .iter()
        .enumerate()
        .filter(|(i, (code, _))| !KEY_NAMES[..*i].iter().any(|(c, _)| c == code))
        .map(|(_, (code, _))| *code)
}

/// Human-readable name of a key, modifiers first (`"Ctrl-Shift-Up"`).
///
/// Codes without a table entry fall back to the character itself for
/// printable ASCII, `\xNN` for other bytes, and `F<n>` for function keys.
/// A modified byte whose usual name means another key is written as
/// `\xNN` (`"Ctrl-\x63"` for Ctrl + 'c').
#[must_use]
pub fn keyname(key: Key) -> String {
    let name = spell(key, false);
    match key.code {
        Byte(_) if keynamed(&name) != Some(key) => spell(key, true),
        _ => name,
    }
}

fn spell(key: Key, escape_bytes: bool) -> String {
    let mut out = String::new();
    for (prefix, modifier) in MODIFIER_PREFIXES {
        if key.modifiers.contains(modifier) {
            out.push_str(prefix);
        }
    }

    if let Byte(b) = key.code {
        if escape_bytes {
            out.push_str(&format!("\\x{b:02X}"));
            return out;
        }
    }

    if let Some(name) = name_of(key.code) {
        out.push_str(name);
        return out;
    }

    match key.code {
        Byte(b @ 0x21..=0x7E) => out.push(char::from(b)),
        Byte(b) => out.push_str(&format!("\\x{b:02X}")),
        KeyCode::F(n) => out.push_str(&format!("F{n}")),
        // Every named key and mouse action has a table entry.
        other => out.push_str(&format!("{other:?}")),
    }
    out
}

/// The key with the given name, if one exists.
///
/// Accepts every canonical name and alias from the table, any stack of
/// `Super-`/`Ctrl-`/`Alt-`/`Shift-` prefixes, single ASCII characters,
/// `\xNN` byte escapes, and `F<n>`.
#[must_use]
pub fn keynamed(name: &str) -> Option<Key> {
    let mut modifiers = Modifiers::empty();
    let mut rest = name;

    'prefixes: loop {
        if let Some(code) = code_named(rest) {
            return Some(Key::with(code, modifiers));
        }
        for (prefix, modifier) in MODIFIER_PREFIXES {
            if let Some(stripped) = rest.strip_prefix(prefix) {
                if !stripped.is_empty() {
                    modifiers |= modifier;
                    rest = stripped;
                    continue 'prefixes;
                }
            }
        }
        break;
    }

    let code = match rest.as_bytes() {
        [b] if b.is_ascii() => Byte(*b),
        [b'\\', b'x', hex @ ..] if hex.len() == 2 => {
            Byte(u8::from_str_radix(std::str::from_utf8(hex).ok()?, 16).ok()?)
        }
        [b'F', digits @ ..] if !digits.is_empty() && digits.iter().all(u8::is_ascii_digit) => {
            KeyCode::F(std::str::from_utf8(digits).ok()?.parse().ok()?)
        }
        _ => return None,
    };
    Some(Key::with(code, modifiers))
}

// ─── Tests ───────────────────────────────────────────────────────────────────
