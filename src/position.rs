// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Replication stream positions.
//!
//! A [`LogPosition`] is a 64-bit byte offset into the replication log. It is
//! displayed as `HIGH/LOW`, the upper and lower 32 bits in uppercase hex
//! without padding (`0x16_3A2F10` is `"16/3A2F10"`). The text form shows up
//! in logs and in flush feedback, so it must round-trip exactly.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A position in the replication stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct LogPosition(u64);

impl LogPosition {
    /// Start of the log.
    pub const ZERO: LogPosition = LogPosition(0);

    /// Largest representable position.
    pub const MAX: LogPosition = LogPosition(u64::MAX);

    pub const fn new(value: u64) -> Self {
        LogPosition(value)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Upper 32 bits.
    pub const fn segment(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Lower 32 bits.
    pub const fn offset(self) -> u32 {
        self.0 as u32
    }

    /// Bytes between `other` and `self`, 0 if `other` is ahead.
    pub const fn diff(self, other: LogPosition) -> u64 {
        self.0.saturating_sub(other.0)
    }

    /// Position `bytes` further along the log (saturating).
    pub const fn advance(self, bytes: u64) -> LogPosition {
        LogPosition(self.0.saturating_add(bytes))
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for LogPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}/{:X}", self.segment(), self.offset())
    }
}

impl FromStr for LogPosition {
    type Err = LogPositionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (high, low) = s
            .split_once('/')
            .ok_or_else(|| LogPositionParseError::InvalidFormat(s.to_string()))?;

        Ok(LogPosition((u64::from(parse_half(high)?) << 32) | u64::from(parse_half(low)?)))
    }
}

/// Parse one half: hex digits only, so no sign or whitespace.
fn parse_half(text: &str) -> Result<u32, LogPositionParseError> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(LogPositionParseError::InvalidHex(text.to_string()));
    }
    u32::from_str_radix(text, 16).map_err(|_| LogPositionParseError::InvalidHex(text.to_string()))
}

impl From<u64> for LogPosition {
    fn from(value: u64) -> Self {
        LogPosition(value)
    }
}

impl From<LogPosition> for u64 {
    fn from(position: LogPosition) -> Self {
        position.0
    }
}

impl Serialize for LogPosition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for LogPosition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Errors from parsing the `X/Y` text form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LogPositionParseError {
    /// No `/` separator.
    #[error("invalid log position format (expected X/Y): {0}")]
    InvalidFormat(String),

    /// A half is not a 32-bit hex number.
    #[error("invalid hex in log position: {0}")]
    InvalidHex(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_example() {
        assert_eq!(LogPosition::new(0x16_3A2F10).to_string(), "16/3A2F10");
    }

    #[test]
    fn test_parse_example() {
        let pos: LogPosition = "16/3A2F10".parse().unwrap();
        assert_eq!(pos.as_u64(), 0x16_3A2F10);
        assert_eq!(pos.segment(), 0x16);
        assert_eq!(pos.offset(), 0x3A2F10);
    }

    #[test]
    fn test_display_zero_and_max() {
        assert_eq!(LogPosition::ZERO.to_string(), "0/0");
        assert_eq!(LogPosition::MAX.to_string(), "FFFFFFFF/FFFFFFFF");
    }

    #[test]
    fn test_parse_lowercase_and_padded() {
        let a: LogPosition = "a/bc1234".parse().unwrap();
        let b: LogPosition = "0000000A/00BC1234".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "A/BC1234");
    }

    #[test]
    fn test_parse_splits_on_first_slash() {
        // The low half "2/3" is not hex, so the whole thing is rejected.
        assert_eq!(
            "1/2/3".parse::<LogPosition>(),
            Err(LogPositionParseError::InvalidHex("2/3".to_string()))
        );
    }

    #[test]
    fn test_parse_invalid() {
        assert!("12345".parse::<LogPosition>().is_err());
        assert!("ZZ/1".parse::<LogPosition>().is_err());
        assert!("1/".parse::<LogPosition>().is_err());
        assert!("/1".parse::<LogPosition>().is_err());
        assert!("100000000/0".parse::<LogPosition>().is_err());
        assert!(" 1/2".parse::<LogPosition>().is_err());
        assert_eq!(
            "+1/+2".parse::<LogPosition>(),
            Err(LogPositionParseError::InvalidHex("+1".to_string()))
        );
        assert_eq!(
            "1/-2".parse::<LogPosition>(),
            Err(LogPositionParseError::InvalidHex("-2".to_string()))
        );
    }

    #[test]
    fn test_ordering() {
        let a: LogPosition = "0/FFFFFFFF".parse().unwrap();
        let b: LogPosition = "1/0".parse().unwrap();
        assert!(a < b);
        assert_eq!(b.diff(a), 1);
        assert_eq!(a.diff(b), 0);
    }

    #[test]
    fn test_advance_saturates() {
        assert_eq!(LogPosition::new(0x100).advance(0x100), LogPosition::new(0x200));
        assert_eq!(LogPosition::MAX.advance(1), LogPosition::MAX);
    }

    #[test]
    fn test_u64_conversions() {
        let pos = LogPosition::from(42u64);
        let raw: u64 = pos.into();
        assert_eq!(raw, 42);
        assert!(!pos.is_zero());
        assert!(LogPosition::default().is_zero());
    }

    #[test]
    fn test_serde_as_text() {
        let pos = LogPosition::new(0x1_0000_00FF);
        let json = serde_json::to_string(&pos).unwrap();
        assert_eq!(json, "\"1/FF\"");
        let parsed: LogPosition = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, pos);
        assert!(serde_json::from_str::<LogPosition>("\"garbage\"").is_err());
    }
}
