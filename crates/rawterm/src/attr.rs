// SPDX-License-Identifier: MIT
//
// Text attributes and colors.
//
// `AttributeSet` is a 64-bit set where bit N means "emit SGR code N". That
// makes encoding trivial (walk the bits in ascending order) and keeps the
// numeric values stable for anything that stores them. Bits 38 and 48 are
// the extended-color introducers: they're reserved for the truecolor
// helpers and never accepted from callers.

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;

use crate::error::{Error, Result};

bitflags! {
    /// A set of SGR attributes, one bit per SGR code.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AttributeSet: u64 {
        const NORMAL               = 1 << 0;
        const BOLD                 = 1 << 1;
        const FAINT                = 1 << 2;
        const ITALIC               = 1 << 3;
        const UNDERLINE            = 1 << 4;
        const BLINK_SLOW           = 1 << 5;
        const BLINK_FAST           = 1 << 6;
        const REVERSE              = 1 << 7;
        const CONCEAL              = 1 << 8;
        const STRIKETHROUGH        = 1 << 9;
        const FRAKTUR              = 1 << 20;
        const DOUBLE_UNDERLINE     = 1 << 21;
        const NO_BOLD_OR_FAINT     = 1 << 22;
        const NO_ITALIC_OR_FRAKTUR = 1 << 23;
        const NO_UNDERLINE         = 1 << 24;
        const NO_BLINK             = 1 << 25;
        const NO_REVERSE           = 1 << 27;
        const NO_CONCEAL           = 1 << 28;
        const NO_STRIKETHROUGH     = 1 << 29;
        const FG_BLACK             = 1 << 30;
        const FG_RED               = 1 << 31;
        const FG_GREEN             = 1 << 32;
        const FG_YELLOW            = 1 << 33;
        const FG_BLUE              = 1 << 34;
        const FG_MAGENTA           = 1 << 35;
        const FG_CYAN              = 1 << 36;
        const FG_WHITE             = 1 << 37;
        const FG_NORMAL            = 1 << 39;
        const BG_BLACK             = 1 << 40;
        const BG_RED               = 1 << 41;
        const BG_GREEN             = 1 << 42;
        const BG_YELLOW            = 1 << 43;
        const BG_BLUE              = 1 << 44;
        const BG_MAGENTA           = 1 << 45;
        const BG_CYAN              = 1 << 46;
        const BG_WHITE             = 1 << 47;
        const BG_NORMAL            = 1 << 49;
        const FRAMED               = 1 << 51;
        const ENCIRCLED            = 1 << 52;
        const OVERLINED            = 1 << 53;
    }
}

/// SGR 38 / 48: extended foreground/background color introducers.
pub(crate) const EXTENDED_COLORS: u64 = (1 << 38) | (1 << 48);

const FOREGROUNDS: AttributeSet = AttributeSet::from_bits_retain(0xFF << 30);
const BACKGROUNDS: AttributeSet = AttributeSet::from_bits_retain(0xFF << 40);

/// Names accepted by [`AttributeSet::from_str`]. `dim` is an alias of `faint`.
const NAMES: &[(&str, AttributeSet)] = &[
    ("normal", AttributeSet::NORMAL),
    ("bold", AttributeSet::BOLD),
    ("faint", AttributeSet::FAINT),
    ("dim", AttributeSet::FAINT),
    ("italic", AttributeSet::ITALIC),
    ("underline", AttributeSet::UNDERLINE),
    ("blink_slow", AttributeSet::BLINK_SLOW),
    ("blink_fast", AttributeSet::BLINK_FAST),
    ("reverse", AttributeSet::REVERSE),
    ("conceal", AttributeSet::CONCEAL),
    ("strikethrough", AttributeSet::STRIKETHROUGH),
    ("fraktur", AttributeSet::FRAKTUR),
    ("double_underline", AttributeSet::DOUBLE_UNDERLINE),
    ("no_bold_or_faint", AttributeSet::NO_BOLD_OR_FAINT),
    ("no_italic_or_fraktur", AttributeSet::NO_ITALIC_OR_FRAKTUR),
    ("no_underline", AttributeSet::NO_UNDERLINE),
    ("no_blink", AttributeSet::NO_BLINK),
    ("no_reverse", AttributeSet::NO_REVERSE),
    ("no_conceal", AttributeSet::NO_CONCEAL),
    ("no_strikethrough", AttributeSet::NO_STRIKETHROUGH),
    ("fg_black", AttributeSet::FG_BLACK),
    ("fg_red", AttributeSet::FG_RED),
    ("fg_green", AttributeSet::FG_GREEN),
    ("fg_yellow", AttributeSet::FG_YELLOW),
    ("fg_blue", AttributeSet::FG_BLUE),
    ("fg_magenta", AttributeSet::FG_MAGENTA),
    ("fg_cyan", AttributeSet::FG_CYAN),
    ("fg_white", AttributeSet::FG_WHITE),
    ("fg_normal", AttributeSet::FG_NORMAL),
    ("bg_black", AttributeSet::BG_BLACK),
    ("bg_red", AttributeSet::BG_RED),
    ("bg_green", AttributeSet::BG_GREEN),
    ("bg_yellow", AttributeSet::BG_YELLOW),
    ("bg_blue", AttributeSet::BG_BLUE),
    ("bg_magenta", AttributeSet::BG_MAGENTA),
    ("bg_cyan", AttributeSet::BG_CYAN),
    ("bg_white", AttributeSet::BG_WHITE),
    ("bg_normal", AttributeSet::BG_NORMAL),
    ("framed", AttributeSet::FRAMED),
    ("encircled", AttributeSet::ENCIRCLED),
    ("overlined", AttributeSet::OVERLINED),
];

impl AttributeSet {
    /// SGR codes in this set, ascending.
    pub fn codes(self) -> impl Iterator<Item = u8> {
        // Bit indices are < 64, so the cast is lossless.
        (0u8..64).filter(move |&i| self.bits() & (1 << i) != 0)
    }

    /// Whether any bit is a reserved extended-color introducer.
    #[must_use]
    pub const fn has_reserved(self) -> bool {
        self.bits() & EXTENDED_COLORS != 0
    }

    /// The set of attributes that turns off everything in `self`.
    ///
    /// `NORMAL` and the "no_*" codes have no inverse and are dropped.
    #[must_use]
    pub fn inverse(self) -> Self {
        let mut out = Self::empty();
        if self.intersects(Self::BOLD | Self::FAINT) {
            out |= Self::NO_BOLD_OR_FAINT;
        }
        if self.intersects(Self::ITALIC | Self::FRAKTUR) {
            out |= Self::NO_ITALIC_OR_FRAKTUR;
        }
        if self.intersects(Self::UNDERLINE | Self::DOUBLE_UNDERLINE) {
            out |= Self::NO_UNDERLINE;
        }
        if self.intersects(Self::BLINK_SLOW | Self::BLINK_FAST) {
            out |= Self::NO_BLINK;
        }
        if self.contains(Self::REVERSE) {
            out |= Self::NO_REVERSE;
        }
        if self.contains(Self::CONCEAL) {
            out |= Self::NO_CONCEAL;
        }
        if self.contains(Self::STRIKETHROUGH) {
            out |= Self::NO_STRIKETHROUGH;
        }
        if self.intersects(FOREGROUNDS) {
            out |= Self::FG_NORMAL;
        }
        if self.intersects(BACKGROUNDS) {
            out |= Self::BG_NORMAL;
        }
        out
    }
}

/// Parses one attribute name (`"bold"`) or several joined by `|` or `,`
/// (`"bold|fg_red"`). Names are case-insensitive.
impl FromStr for AttributeSet {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut set = Self::empty();
        for part in s.split(['|', ',']).map(str::trim) {
            let found = NAMES
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(part))
                .map(|&(_, attr)| attr);
            match found {
                Some(attr) => set |= attr,
                None => return Err(Error::invalid(format!("unknown attribute '{part}'"))),
            }
        }
        Ok(set)
    }
}

// ─── Rgb ────────────────────────────────────────────────────────────────────

/// A 24-bit color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Unpack `0xRRGGBB`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for values above `0xFFFFFF`.
    pub fn from_hex(hex: u32) -> Result<Self> {
        if hex > 0x00FF_FFFF {
            return Err(Error::invalid(format!("color 0x{hex:X} exceeds 0xFFFFFF")));
        }
        let [_, r, g, b] = hex.to_be_bytes();
        Ok(Self { r, g, b })
    }

    /// Scale `[0.0, 1.0]` channels to bytes. Out-of-range input is clamped;
    /// NaN maps to 0.
    #[must_use]
    pub fn from_normalized(r: f64, g: f64, b: f64) -> Self {
        Self {
            r: scale(r),
            g: scale(g),
            b: scale(b),
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn scale(channel: f64) -> u8 {
    if channel.is_nan() {
        return 0;
    }
    (channel.clamp(0.0, 1.0) * 255.0).round() as u8
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}
