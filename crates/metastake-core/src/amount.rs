//! Fixed-point amount codec.
//!
//! On-chain amounts are integers scaled by 10^18. Users type decimal strings,
//! so every amount crossing the UI boundary goes through [`to_chain_units`]
//! and [`to_display_string`].

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Number of fractional digits in the on-chain representation.
pub const DECIMALS: usize = 18;

/// One whole token in chain units.
pub const UNIT: u128 = 10u128.pow(DECIMALS as u32);

/// Reasons a decimal string cannot be turned into an [`Amount`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("Invalid amount: input is empty")]
    Empty,

    #[error("Invalid amount: '{0}' is not a decimal number")]
    NotNumeric(String),

    #[error("Invalid amount: negative values are not allowed")]
    Negative,

    #[error("Invalid amount: at most 18 fractional digits are supported")]
    TooPrecise,

    #[error("Invalid amount: value is too large")]
    Overflow,
}

/// An unsigned fixed-point amount in chain units (10^-18 of a token).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(u128);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    /// Wrap a raw chain-unit integer.
    pub const fn from_raw(raw: u128) -> Self {
        Self(raw)
    }

    /// Whole tokens, e.g. `Amount::from_tokens(5)` is 5.0.
    ///
    /// Meant for literal constants; saturates at `u128::MAX` chain units.
    /// Use [`Amount::checked_from_tokens`] for untrusted counts.
    pub const fn from_tokens(tokens: u128) -> Self {
        Self(tokens.saturating_mul(UNIT))
    }

    /// Whole tokens, or `None` when they do not fit in chain units.
    pub const fn checked_from_tokens(tokens: u128) -> Option<Self> {
        match tokens.checked_mul(UNIT) {
            Some(raw) => Some(Self(raw)),
            None => None,
        }
    }

    /// The raw chain-unit integer.
    pub const fn raw(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    pub fn saturating_sub(self, other: Amount) -> Amount {
        Amount(self.0.saturating_sub(other.0))
    }
}

impl From<u128> for Amount {
    fn from(raw: u128) -> Self {
        Self(raw)
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        to_chain_units(s)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&to_display_string(*self))
    }
}

// Amounts travel as decimal strings: u128 does not survive JSON number parsing
// in most consumers.
impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        to_chain_units(&s).map_err(serde::de::Error::custom)
    }
}

/// Parse a base-10 string into chain units.
///
/// Accepts an optional fractional part of at most [`DECIMALS`] digits.
/// Surrounding whitespace is ignored; `"1."` and `".5"` are accepted.
pub fn to_chain_units(input: &str) -> Result<Amount, AmountError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(AmountError::Empty);
    }
    if s.starts_with('-') {
        return Err(AmountError::Negative);
    }

    let (whole, frac) = s.split_once('.').unwrap_or((s, ""));
    let is_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if (whole.is_empty() && frac.is_empty()) || !is_digits(whole) || !is_digits(frac) {
        return Err(AmountError::NotNumeric(s.to_string()));
    }
    if frac.len() > DECIMALS {
        return Err(AmountError::TooPrecise);
    }

    // Only digits remain, so a parse failure can only mean overflow.
    let whole_units = if whole.is_empty() {
        0
    } else {
        whole.parse::<u128>().map_err(|_| AmountError::Overflow)?
    };
    let frac_units = if frac.is_empty() {
        0
    } else {
        format!("{frac:0<width$}", width = DECIMALS)
            .parse::<u128>()
            .map_err(|_| AmountError::Overflow)?
    };

    whole_units
        .checked_mul(UNIT)
        .and_then(|v| v.checked_add(frac_units))
        .map(Amount)
        .ok_or(AmountError::Overflow)
}

/// Render chain units as a decimal string with trailing zeros trimmed.
pub fn to_display_string(amount: Amount) -> String {
    let whole = amount.0 / UNIT;
    let frac = amount.0 % UNIT;
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{frac:0>width$}", width = DECIMALS);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}


#[cfg(test)]
mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_display_then_parse_is_identity(raw in any::<u128>()) {
            let amount = Amount::from_raw(raw);
            prop_assert_eq!(to_chain_units(&to_display_string(amount)), Ok(amount));
        }

        #[test]
        fn test_parse_then_display_keeps_value(
            whole in "[0-9]{1,20}",
            frac in "[0-9]{0,18}",
        ) {
            let input = if frac.is_empty() {
                whole.clone()
            } else {
                format!("{}.{}", whole, frac)
            };
            let amount = to_chain_units(&input).unwrap();
            let rendered = to_display_string(amount);
            // Same numeric value, possibly normalized.
            prop_assert_eq!(to_chain_units(&rendered), Ok(amount));
            prop_assert!(!rendered.ends_with('.'));
            if rendered.contains('.') {
                prop_assert!(!rendered.ends_with('0'));
            }
        }

        #[test]
        fn test_parse_never_panics(input in ".*") {
            let _ = to_chain_units(&input);
        }

        #[test]
        fn test_excess_fraction_always_rejected(
            whole in "[0-9]{1,5}",
            frac in "[0-9]{19,30}",
        ) {
            let input = format!("{}.{}", whole, frac);
            prop_assert_eq!(to_chain_units(&input), Err(AmountError::TooPrecise));
        }
    }
}
