// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Fixed-point asset amounts with 8 decimal places.
//!
//! Amounts travel as decimal strings (`"0.5"`) and are held as signed
//! minor units so balances may go negative without losing precision.

use std::fmt;
use std::ops::{Add, Neg, Sub};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use utoipa::ToSchema;

/// Number of decimal places carried by every amount.
pub const DECIMALS: u32 = 8;
const SCALE: i128 = 10i128.pow(DECIMALS);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("amount must be a valid non-negative number")]
    Invalid,

    #[error("amount must have at most {DECIMALS} decimal places")]
    TooPrecise,

    #[error("amount is too large")]
    Overflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, ToSchema)]
#[schema(value_type = String, example = "1.5")]
pub struct Amount(i128);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    #[cfg(test)]
    pub(crate) const fn from_minor(minor: i128) -> Self {
        Amount(minor)
    }

    pub const fn minor(self) -> i128 {
        self.0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    /// Parse a non-negative decimal such as `2`, `0.5`, or `1.12345678`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (whole_part, fraction_part) = match trimmed.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (trimmed, ""),
        };

        if whole_part.is_empty() && fraction_part.is_empty() {
            return Err(AmountError::Invalid);
        }
        let all_digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
        if !all_digits(whole_part) || !all_digits(fraction_part) {
            return Err(AmountError::Invalid);
        }
        if fraction_part.len() > DECIMALS as usize {
            return Err(AmountError::TooPrecise);
        }

        let whole = if whole_part.is_empty() {
            0
        } else {
            whole_part.parse::<i128>().map_err(|_| AmountError::Overflow)?
        };
        let fraction = if fraction_part.is_empty() {
            0
        } else {
            // Pad with zeros to the full scale
            format!("{:0<width$}", fraction_part, width = DECIMALS as usize)
                .parse::<i128>()
                .map_err(|_| AmountError::Invalid)?
        };

        whole
            .checked_mul(SCALE)
            .and_then(|w| w.checked_add(fraction))
            .map(Amount)
            .ok_or(AmountError::Overflow)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let whole = abs / SCALE as u128;
        let remainder = abs % SCALE as u128;

        if remainder == 0 {
            return write!(f, "{sign}{whole}");
        }
        let decimal_str = format!("{:0>width$}", remainder, width = DECIMALS as usize);
        write!(f, "{sign}{whole}.{}", decimal_str.trim_end_matches('0'))
    }
}

impl Add for Amount {
    type Output = Amount;
    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0.saturating_add(rhs.0))
    }
}

impl Sub for Amount {
    type Output = Amount;
    fn sub(self, rhs: Amount) -> Amount {
        Amount(self.0.saturating_sub(rhs.0))
    }
}

impl Neg for Amount {
    type Output = Amount;
    fn neg(self) -> Amount {
        Amount(self.0.saturating_neg())
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Amount {
    /// Accepts a decimal string or a JSON number.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(serde_json::Number),
        }

        let raw = match Raw::deserialize(deserializer)? {
            Raw::Text(text) => text,
            Raw::Number(number) => number.to_string(),
        };
        if let Some(magnitude) = raw.trim().strip_prefix('-') {
            return magnitude
                .parse::<Amount>()
                .map(|a| -a)
                .map_err(serde::de::Error::custom);
        }
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_whole_and_fractional() {
        assert_eq!("2".parse::<Amount>().unwrap().minor(), 200_000_000);
        assert_eq!("0.5".parse::<Amount>().unwrap().minor(), 50_000_000);
        assert_eq!(".5".parse::<Amount>().unwrap().minor(), 50_000_000);
        assert_eq!("1.00000001".parse::<Amount>().unwrap().minor(), 100_000_001);
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert_eq!("".parse::<Amount>(), Err(AmountError::Invalid));
        assert_eq!("-1".parse::<Amount>(), Err(AmountError::Invalid));
        assert_eq!("1.2.3".parse::<Amount>(), Err(AmountError::Invalid));
        assert_eq!("abc".parse::<Amount>(), Err(AmountError::Invalid));
        assert_eq!("0.123456789".parse::<Amount>(), Err(AmountError::TooPrecise));
    }

    #[test]
    fn display_trims_trailing_zeros() {
        assert_eq!(Amount::from_minor(150_000_000).to_string(), "1.5");
        assert_eq!(Amount::from_minor(200_000_000).to_string(), "2");
        assert_eq!(Amount::from_minor(-50_000_000).to_string(), "-0.5");
        assert_eq!(Amount::ZERO.to_string(), "0");
    }

    #[test]
    fn arithmetic_is_exact() {
        let received: Amount = "2".parse().unwrap();
        let sent: Amount = "0.5".parse().unwrap();
        assert_eq!((received - sent).to_string(), "1.5");
        assert_eq!((Amount::ZERO - sent).to_string(), "-0.5");
    }

    #[test]
    fn serde_accepts_strings_and_numbers() {
        let from_str: Amount = serde_json::from_str(r#""0.25""#).unwrap();
        let from_num: Amount = serde_json::from_str("0.25").unwrap();
        assert_eq!(from_str, from_num);
        assert_eq!(serde_json::to_string(&from_str).unwrap(), r#""0.25""#);

        let negative: Amount = serde_json::from_str(r#""-1.5""#).unwrap();
        assert_eq!(negative.minor(), -150_000_000);
    }
}
