use std::{
    fmt,
    ops::{Add, AddAssign, Neg, Sub},
    str::FromStr,
};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::EngineError;

/// Number of fractional digits carried by [`Money`] and [`Rate`].
pub const SCALE: u32 = 6;
const UNIT: i64 = 10_i64.pow(SCALE);

/// Signed money amount represented as **integer micro-units** (6 decimals).
///
/// Every monetary value in the ledger (balances, budget, spend amounts, report
/// sums) uses this type so that conversions never drift through floats.
///
/// # Examples
///
/// ```rust
/// use engine::Money;
///
/// let amount: Money = "12.5".parse().unwrap();
/// assert_eq!(amount.micros(), 12_500_000);
/// assert_eq!(amount.to_string(), "12.5");
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    /// Creates a new amount from integer micro-units.
    #[must_use]
    pub const fn new(micros: i64) -> Self {
        Self(micros)
    }

    /// Creates an amount from whole units.
    #[must_use]
    pub const fn from_units(units: i64) -> Self {
        Self(units * UNIT)
    }

    #[must_use]
    pub const fn micros(self) -> i64 {
        self.0
    }

    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Display-currency amount to canonical: `amount / ratio`.
    pub fn to_canonical(self, rate: Rate) -> Result<Money, EngineError> {
        if !rate.is_positive() {
            return Err(EngineError::Conversion(format!("invalid ratio {rate}")));
        }
        let micros = div_round(i128::from(self.0) * i128::from(UNIT), i128::from(rate.0));
        i64::try_from(micros)
            .map(Money)
            .map_err(|_| EngineError::Conversion("amount out of range".to_string()))
    }

    /// Canonical amount to display currency: `amount * ratio`.
    pub fn from_canonical(self, rate: Rate) -> Result<Money, EngineError> {
        if !rate.is_positive() {
            return Err(EngineError::Conversion(format!("invalid ratio {rate}")));
        }
        let micros = div_round(i128::from(self.0) * i128::from(rate.0), i128::from(UNIT));
        i64::try_from(micros)
            .map(Money)
            .map_err(|_| EngineError::Conversion("amount out of range".to_string()))
    }

    /// Lossy view used on the RPC boundary.
    #[must_use]
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / UNIT as f64
    }
}

/// Integer division rounding half away from zero.
fn div_round(num: i128, den: i128) -> i128 {
    let quotient = num / den;
    let remainder = num % den;
    if remainder.abs() * 2 >= den.abs() {
        if (num < 0) ^ (den < 0) {
            quotient - 1
        } else {
            quotient + 1
        }
    } else {
        quotient
    }
}

fn write_fixed(f: &mut fmt::Formatter<'_>, value: i64) -> fmt::Result {
    let sign = if value < 0 { "-" } else { "" };
    let abs = value.unsigned_abs();
    let units = abs / UNIT as u64;
    let frac = abs % UNIT as u64;
    if frac == 0 {
        return write!(f, "{sign}{units}");
    }
    let digits = format!("{frac:06}");
    write!(f, "{sign}{units}.{}", digits.trim_end_matches('0'))
}

fn parse_fixed(s: &str) -> Result<i64, EngineError> {
    let invalid = || EngineError::Validation(format!("invalid amount: {s}"));
    let overflow = || EngineError::Validation("amount too large".to_string());

    let trimmed = s.trim();
    let (negative, rest) = match trimmed.strip_prefix('-') {
        Some(stripped) => (true, stripped),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    if rest.is_empty() {
        return Err(invalid());
    }

    let rest = rest.replace(',', ".");
    let (int_part, frac_part) = match rest.split_once('.') {
        Some((int_part, frac_part)) => (int_part, frac_part),
        None => (rest.as_str(), ""),
    };
    if int_part.is_empty() || !int_part.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    if !frac_part.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    if frac_part.len() > SCALE as usize {
        return Err(EngineError::Validation(format!(
            "too many decimals: {s}"
        )));
    }

    let units: i64 = int_part.parse().map_err(|_| overflow())?;
    let frac: i64 = if frac_part.is_empty() {
        0
    } else {
        let padded = format!("{frac_part:0<6}");
        padded.parse().map_err(|_| invalid())?
    };

    let total = units
        .checked_mul(UNIT)
        .and_then(|v| v.checked_add(frac))
        .ok_or_else(overflow)?;
    Ok(if negative { -total } else { total })
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_fixed(f, self.0)
    }
}

impl FromStr for Money {
    type Err = EngineError;

    /// Parses a decimal string into micro-units.
    ///
    /// Accepts `.` or `,` as decimal separator, at most 6 fractional digits.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_fixed(s).map(Money)
    }
}

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Money> for i64 {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Self::Output {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Self::Output {
        Money(self.0 - rhs.0)
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Self::Output {
        Money(-self.0)
    }
}

/// Exchange ratio: display-currency units per one canonical unit, in micro-units.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Rate(i64);

impl Rate {
    /// Ratio of the canonical currency to itself.
    pub const ONE: Rate = Rate(UNIT);

    #[must_use]
    pub const fn new(micros: i64) -> Self {
        Self(micros)
    }

    #[must_use]
    pub const fn micros(self) -> i64 {
        self.0
    }

    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_fixed(f, self.0)
    }
}

impl FromStr for Rate {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_fixed(s).map(Rate)
    }
}

/// Serialized as a decimal string so snapshots read like `"0.011"`.
impl Serialize for Rate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Rate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_trims_trailing_zeros() {
        assert_eq!(Money::new(0).to_string(), "0");
        assert_eq!(Money::new(1).to_string(), "0.000001");
        assert_eq!(Money::new(1_500_000).to_string(), "1.5");
        assert_eq!(Money::from_units(500).to_string(), "500");
        assert_eq!(Money::new(-10_250_000).to_string(), "-10.25");
    }

    #[test]
    fn rate_serializes_as_decimal_string() {
        let rate: Rate = serde_json::from_str("\"0.011\"").unwrap();
        assert_eq!(rate.micros(), 11_000);
        assert_eq!(serde_json::to_string(&rate).unwrap(), "\"0.011\"");
    }

    #[test]
    fn parse_accepts_dot_or_comma() {
        assert_eq!("10".parse::<Money>().unwrap().micros(), 10_000_000);
        assert_eq!("10.5".parse::<Money>().unwrap().micros(), 10_500_000);
        assert_eq!("10,05".parse::<Money>().unwrap().micros(), 10_050_000);
        assert_eq!("-0.000001".parse::<Money>().unwrap().micros(), -1);
        assert_eq!(" 2.3 ".parse::<Money>().unwrap().micros(), 2_300_000);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("".parse::<Money>().is_err());
        assert!("abc".parse::<Money>().is_err());
        assert!("1.2.3".parse::<Money>().is_err());
        assert!(".5".parse::<Money>().is_err());
        assert!("0.0000001".parse::<Money>().is_err());
    }

    #[test]
    fn converts_display_amount_to_canonical() {
        let rate: Rate = "90".parse().unwrap();
        let canonical = Money::from_units(100).to_canonical(rate).unwrap();
        assert_eq!(canonical.micros(), 1_111_111);

        let balance = Money::from_units(500) - canonical;
        assert_eq!(balance.to_string(), "498.888889");
    }

    #[test]
    fn conversion_rounds_half_away_from_zero() {
        let rate = Rate::new(3 * UNIT);
        assert_eq!(Money::new(2).to_canonical(rate).unwrap().micros(), 1);
        assert_eq!(Money::new(-2).to_canonical(rate).unwrap().micros(), -1);
        assert_eq!(Money::new(1).to_canonical(rate).unwrap().micros(), 0);
    }

    #[test]
    fn canonical_rate_is_identity() {
        let amount = Money::new(123_456_789);
        assert_eq!(amount.to_canonical(Rate::ONE).unwrap(), amount);
        assert_eq!(amount.from_canonical(Rate::ONE).unwrap(), amount);
    }

    #[test]
    fn zero_rate_is_a_conversion_error() {
        assert!(matches!(
            Money::from_units(1).to_canonical(Rate::new(0)),
            Err(EngineError::Conversion(_))
        ));
    }
}
