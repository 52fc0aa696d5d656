//! Log positions
//!
//! A log position is a byte address into the total ordering of the
//! write-ahead log. It is rendered as two hexadecimal halves separated by
//! a slash (`high/low`), the same form used for input and output.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Byte address into the write-ahead log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Lsn(pub u64);

impl Lsn {
    /// The invalid (unset) position.
    pub const INVALID: Lsn = Lsn(0);

    /// Returns true unless this is `Lsn::INVALID`.
    pub fn is_valid(self) -> bool {
        self.0 != 0
    }

    /// Raw 64-bit value.
    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// High 32 bits.
    pub fn high(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Low 32 bits.
    pub fn low(self) -> u32 {
        self.0 as u32
    }

    /// Position advanced by `bytes`.
    pub fn advance(self, bytes: u64) -> Lsn {
        Lsn(self.0 + bytes)
    }

    /// Position rounded up to the next multiple of `alignment`.
    pub fn align_up(self, alignment: u64) -> Lsn {
        let rem = self.0 % alignment;
        if rem == 0 {
            self
        } else {
            Lsn(self.0 + (alignment - rem))
        }
    }

    /// Parses the `high/low` hexadecimal form.
    pub fn parse(text: &str) -> Option<Lsn> {
        let (high, low) = text.trim().split_once('/')?;
        let high = u32::from_str_radix(high, 16).ok()?;
        let low = u32::from_str_radix(low, 16).ok()?;
        Some(Lsn(((high as u64) << 32) | low as u64))
    }
}

impl fmt::Display for Lsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}/{:X}", self.high(), self.low())
    }
}

impl FromStr for Lsn {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Lsn::parse(s).ok_or_else(|| format!("invalid log position: {:?}", s))
    }
}

impl From<u64> for Lsn {
    fn from(value: u64) -> Self {
        Lsn(value)
    }
}

impl Serialize for Lsn {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Lsn {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
