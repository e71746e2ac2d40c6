//! RouterOS duration codec
//!
//! RouterOS writes durations as concatenated `<count><unit>` pairs such as
//! `1d2h3m4s`. [`RouterOsDuration`] stores the value as whole seconds and
//! converts to and from that compact form.
//!
//! ```rust
//! use mtprov_core::duration::RouterOsDuration;
//!
//! let ttl: RouterOsDuration = "1d1h1s".parse().unwrap();
//! assert_eq!(ttl.as_secs(), 90061);
//! assert_eq!(ttl.to_string(), "1d1h1s");
//! ```

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Seconds per unit, most significant first
const UNITS: [(char, i64); 4] = [('d', 86_400), ('h', 3_600), ('m', 60), ('s', 1)];

/// Failure to parse a duration string
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Input was empty
    #[error("invalid duration: empty string")]
    Empty,

    /// A unit appeared without a count in front of it
    #[error("invalid duration {0:?}: expected a number")]
    MissingNumber(String),

    /// A count was not followed by a unit
    #[error("missing unit in duration {0:?}")]
    MissingUnit(String),

    /// Unit is not one of d, h, m, s
    #[error("unknown unit {unit:?} in duration {input:?}")]
    UnknownUnit {
        /// The unrecognized unit text
        unit: String,
        /// Full input
        input: String,
    },

    /// Value does not fit in 64 bits
    #[error("invalid duration {0:?}: overflow")]
    Overflow(String),
}

/// A duration in whole seconds with RouterOS text formatting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RouterOsDuration(i64);

impl RouterOsDuration {
    /// Wrap a number of seconds
    pub const fn from_secs(secs: i64) -> Self {
        Self(secs)
    }

    /// Number of seconds
    pub const fn as_secs(self) -> i64 {
        self.0
    }

    /// Parse the compact form
    ///
    /// The literal `"0"` is accepted as zero. Units may appear in any order
    /// and may repeat; their values are summed.
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        if s == "0" {
            return Ok(Self(0));
        }
        if s.is_empty() {
            return Err(ParseError::Empty);
        }

        let overflow = || ParseError::Overflow(s.to_string());
        let mut total: i64 = 0;
        let mut rest = s;

        while !rest.is_empty() {
            let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
            if digits == 0 {
                return Err(ParseError::MissingNumber(s.to_string()));
            }

            let mut count: i64 = 0;
            for b in rest[..digits].bytes() {
                count = count
                    .checked_mul(10)
                    .and_then(|v| v.checked_add(i64::from(b - b'0')))
                    .ok_or_else(overflow)?;
            }
            rest = &rest[digits..];

            let unit_len = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
            if unit_len == 0 {
                return Err(ParseError::MissingUnit(s.to_string()));
            }
            let unit = &rest[..unit_len];
            rest = &rest[unit_len..];

            let multiplier = unit_seconds(unit).ok_or_else(|| ParseError::UnknownUnit {
                unit: unit.to_string(),
                input: s.to_string(),
            })?;

            total = count
                .checked_mul(multiplier)
                .and_then(|v| total.checked_add(v))
                .ok_or_else(overflow)?;
        }

        Ok(Self(total))
    }
}

fn unit_seconds(unit: &str) -> Option<i64> {
    let mut chars = unit.chars();
    let (c, None) = (chars.next()?, chars.next()) else {
        return None;
    };
    UNITS.iter().find(|(u, _)| *u == c).map(|(_, secs)| *secs)
}

impl fmt::Display for RouterOsDuration {
    /// Emits non-zero components, most significant first. Zero is `0`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            return f.write_str("0");
        }
        if self.0 < 0 {
            f.write_str("-")?;
        }

        let mut remaining = self.0.unsigned_abs();
        for (unit, secs) in UNITS {
            let secs = secs.unsigned_abs();
            let count = remaining / secs;
            if count > 0 {
                write!(f, "{count}{unit}")?;
                remaining %= secs;
            }
        }
        Ok(())
    }
}

impl FromStr for RouterOsDuration {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<i64> for RouterOsDuration {
    fn from(secs: i64) -> Self {
        Self(secs)
    }
}

impl Serialize for RouterOsDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RouterOsDuration {
    /// Accepts the compact string form or a plain number of seconds.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct DurationVisitor;

        impl Visitor<'_> for DurationVisitor {
            type Value = RouterOsDuration;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a duration such as \"1d2h\" or a number of seconds")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                RouterOsDuration::parse(v).map_err(E::custom)
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(RouterOsDuration(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                i64::try_from(v)
                    .map(RouterOsDuration)
                    .map_err(|_| E::custom(format!("duration {v} overflows")))
            }
        }

        deserializer.deserialize_any(DurationVisitor)
    }
}
