//! Units ⇄ coins conversion.
//!
//! A token amount has two representations:
//! - **units**: the integer base-unit amount as the chain stores it, e.g.
//!   `"1500000000000000000"`
//! - **coins**: the decimal string a human reads, e.g. `"1.5"` for 18 decimals
//!
//! Both directions are pure string manipulations. Nothing is ever rounded:
//! a coins string with more fractional digits than `decimals` is rejected,
//! not truncated.

use std::fmt;

use crate::error::AmountError;

/// Convert a base-unit digit string into its decimal representation.
///
/// `units` must match `^\d+$`. With `decimals == 0` the input is returned
/// unchanged; otherwise it is left-padded with zeros to at least
/// `decimals + 1` characters and a point is inserted `decimals` characters
/// from the end. Trailing fractional zeros are dropped (and the point with
/// them when nothing is left), so 1.5 ether prints as `"1.5"`.
pub fn to_coins(units: &str, decimals: u32) -> Result<String, AmountError> {
    if !is_valid(units, 0) {
        return Err(AmountError::invalid(units, decimals));
    }
    Ok(format_coins(units, decimals))
}

/// Convert a decimal string into its base-unit digit string.
///
/// `coins` must match `^\d+(\.\d{1,decimals})?$` (`^\d+$` when
/// `decimals == 0`). The fraction is right-padded to exactly `decimals`
/// digits and glued to the integer part. Leading zeros are stripped from
/// the result, so `"0.05"` at 2 decimals yields `"5"`.
pub fn to_units(coins: &str, decimals: u32) -> Result<String, AmountError> {
    if !is_valid(coins, decimals) {
        return Err(AmountError::invalid(coins, decimals));
    }
    let (int, frac) = coins.split_once('.').unwrap_or((coins, ""));
    let mut out = String::with_capacity(int.len() + decimals as usize);
    out.push_str(int);
    out.push_str(frac);
    out.extend(std::iter::repeat('0').take(decimals as usize - frac.len()));
    Ok(canonical(&out).to_string())
}

/// Assumes `units` is already validated.
fn format_coins(units: &str, decimals: u32) -> String {
    if decimals == 0 {
        return units.to_string();
    }
    let d = decimals as usize;
    let padded = format!("{units:0>width$}", width = d + 1);
    let (int, frac) = padded.split_at(padded.len() - d);
    let frac = frac.trim_end_matches('0');
    if frac.is_empty() {
        int.to_string()
    } else {
        format!("{int}.{frac}")
    }
}

fn is_valid(amount: &str, decimals: u32) -> bool {
    fn digits(s: &str) -> bool {
        !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
    }

    match amount.split_once('.') {
        None => digits(amount),
        Some((int, frac)) => {
            decimals > 0 && digits(int) && digits(frac) && frac.len() <= decimals as usize
        }
    }
}

fn canonical(digits: &str) -> &str {
    let trimmed = digits.trim_start_matches('0');
    if trimmed.is_empty() {
        "0"
    } else {
        trimmed
    }
}

/// A validated token amount: base units plus the token's decimal count.
///
/// The units string is kept canonical (no leading zeros), so two amounts
/// compare equal exactly when they denote the same quantity at the same
/// precision.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Amount {
    units: String,
    decimals: u32,
}

impl Amount {
    /// Build from a base-unit digit string.
    pub fn from_units(units: &str, decimals: u32) -> Result<Self, AmountError> {
        if !is_valid(units, 0) {
            return Err(AmountError::invalid(units, decimals));
        }
        Ok(Self {
            units: canonical(units).to_string(),
            decimals,
        })
    }

    /// Build from a decimal string.
    pub fn from_coins(coins: &str, decimals: u32) -> Result<Self, AmountError> {
        Ok(Self {
            units: to_units(coins, decimals)?,
            decimals,
        })
    }

    pub fn zero(decimals: u32) -> Self {
        Self {
            units: "0".to_string(),
            decimals,
        }
    }

    pub fn units(&self) -> &str {
        &self.units
    }

    pub fn decimals(&self) -> u32 {
        self.decimals
    }

    pub fn coins(&self) -> String {
        format_coins(&self.units, self.decimals)
    }

    pub fn is_zero(&self) -> bool {
        self.units == "0"
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.coins())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn one_and_a_half_ether() {
        assert_eq!(to_coins("1500000000000000000", 18).unwrap(), "1.5");
        assert_eq!(to_units("1.5", 18).unwrap(), "1500000000000000000");
    }

    #[test]
    fn zero_decimals_is_identity() {
        assert_eq!(to_coins("5", 0).unwrap(), "5");
        assert_eq!(to_units("5", 0).unwrap(), "5");
    }

    #[test]
    fn small_units_are_left_padded() {
        assert_eq!(to_coins("5", 3).unwrap(), "0.005");
        assert_eq!(to_coins("12345", 2).unwrap(), "123.45");
        assert_eq!(to_coins("00012", 4).unwrap(), "0.0012");
    }

    #[test]
    fn whole_amounts_drop_the_point() {
        assert_eq!(to_coins("0", 2).unwrap(), "0");
        assert_eq!(to_coins("1000000", 6).unwrap(), "1");
        assert_eq!(to_coins("1230", 2).unwrap(), "12.3");
    }

    #[test]
    fn excess_precision_is_rejected() {
        assert_eq!(
            to_units("12.345", 2),
            Err(AmountError::InvalidAmount {
                amount: "12.345".into(),
                decimals: 2
            })
        );
    }

    #[test]
    fn malformed_strings_are_rejected() {
        for bad in ["", ".", "1.", ".5", "-1", "1e18", "1.2.3", " 1", "0x10"] {
            assert!(to_units(bad, 18).is_err(), "accepted {bad:?}");
        }
        assert!(to_units("1.5", 0).is_err());
        assert!(to_coins("1.5", 2).is_err());
        assert!(to_coins("", 2).is_err());
        assert!(to_coins("abc", 2).is_err());
    }

    #[test]
    fn fraction_is_right_padded() {
        assert_eq!(to_units("0.05", 2).unwrap(), "5");
        assert_eq!(to_units("10.1", 6).unwrap(), "10100000");
        assert_eq!(to_units("0", 6).unwrap(), "0");
    }

    #[test]
    fn amount_accessors() {
        let a = Amount::from_coins("2.25", 6).unwrap();
        assert_eq!(a.units(), "2250000");
        assert_eq!(a.coins(), "2.25");
        assert_eq!(a.to_string(), "2.25");
        assert!(!a.is_zero());

        let b = Amount::from_units("0002250000", 6).unwrap();
        assert_eq!(a, b);
        assert!(Amount::zero(18).is_zero());
    }

    proptest! {
        #[test]
        fn coins_then_units_is_identity(
            units in "(0|[1-9][0-9]{0,60})",
            decimals in 0u32..40,
        ) {
            let coins = to_coins(&units, decimals).unwrap();
            prop_assert_eq!(to_units(&coins, decimals).unwrap(), units);
        }
    }
}
