//! Credit amounts
//!
//! Fixed-point currency type used for cost estimates and tenant balances.
//! Stored as integer hundredths to avoid float rounding; serialized as
//! decimal strings ("150.00") to match the billing service wire format.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};
use std::str::FromStr;

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A credit amount in hundredths of a credit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Credits(i64);

impl Credits {
    pub const ZERO: Credits = Credits(0);

    /// Creates an amount from whole credits.
    pub const fn from_major(credits: i64) -> Self {
        Credits(credits * 100)
    }

    /// Creates an amount from hundredths of a credit.
    pub const fn from_hundredths(hundredths: i64) -> Self {
        Credits(hundredths)
    }

    /// Returns the amount in hundredths of a credit.
    pub const fn hundredths(self) -> i64 {
        self.0
    }

    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }
}

impl Add for Credits {
    type Output = Credits;

    fn add(self, rhs: Credits) -> Credits {
        Credits(self.0 + rhs.0)
    }
}

impl AddAssign for Credits {
    fn add_assign(&mut self, rhs: Credits) {
        self.0 += rhs.0;
    }
}

impl Sub for Credits {
    type Output = Credits;

    fn sub(self, rhs: Credits) -> Credits {
        Credits(self.0 - rhs.0)
    }
}

impl Sum for Credits {
    fn sum<I: Iterator<Item = Credits>>(iter: I) -> Credits {
        iter.fold(Credits::ZERO, Add::add)
    }
}

impl fmt::Display for Credits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

/// Parse error for credit amounts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid credit amount: {0}")]
pub struct ParseCreditsError(String);

impl FromStr for Credits {
    type Err = ParseCreditsError;

    /// Parses a decimal string with at most two fractional digits,
    /// e.g. "150", "150.5", "150.00".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseCreditsError(s.to_string());

        let (sign, rest) = match s.strip_prefix('-') {
            Some(rest) => (-1i64, rest),
            None => (1i64, s),
        };

        let (whole, frac) = match rest.split_once('.') {
            Some((w, f)) => (w, f),
            None => (rest, ""),
        };

        if whole.is_empty() || frac.len() > 2 {
            return Err(err());
        }

        // i64::from_str would also accept a leading '+'; only bare digits
        // are valid here
        if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(err());
        }

        let whole: i64 = whole.parse().map_err(|_| err())?;

        let frac: i64 = if frac.is_empty() {
            0
        } else {
            let parsed: i64 = frac.parse().map_err(|_| err())?;
            // "5" means fifty hundredths, "05" means five
            if frac.len() == 1 { parsed * 10 } else { parsed }
        };

        Ok(Credits(sign * (whole * 100 + frac)))
    }
}

impl Serialize for Credits {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Credits {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(DeError::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_formats_two_decimals() {
        assert_eq!(Credits::from_major(150).to_string(), "150.00");
        assert_eq!(Credits::from_hundredths(12345).to_string(), "123.45");
        assert_eq!(Credits::from_hundredths(5).to_string(), "0.05");
        assert_eq!(Credits::from_hundredths(-250).to_string(), "-2.50");
    }

    #[test]
    fn test_parse_round_trips() {
        for raw in ["150.00", "0.05", "9999.99", "-2.50"] {
            let credits: Credits = raw.parse().unwrap();
            assert_eq!(credits.to_string(), raw);
        }
    }

    #[test]
    fn test_parse_partial_fractions() {
        assert_eq!("150".parse::<Credits>().unwrap(), Credits::from_major(150));
        assert_eq!(
            "150.5".parse::<Credits>().unwrap(),
            Credits::from_hundredths(15050)
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for raw in ["", ".", "1.234", "abc", "1.x", "--1", "+5", "1.+5", "1.-5", "- 1"] {
            assert!(raw.parse::<Credits>().is_err(), "accepted {:?}", raw);
        }
    }

    #[test]
    fn test_arithmetic_and_ordering() {
        let a = Credits::from_major(100);
        let b = Credits::from_major(50);
        assert_eq!(a + b, Credits::from_major(150));
        assert_eq!(a - b, Credits::from_major(50));
        assert!(b < a);

        let total: Credits = [a, b, b].into_iter().sum();
        assert_eq!(total, Credits::from_major(200));
    }

    #[test]
    fn test_serde_uses_decimal_strings() {
        let credits = Credits::from_hundredths(15000);
        let json = serde_json::to_string(&credits).unwrap();
        assert_eq!(json, "\"150.00\"");

        let back: Credits = serde_json::from_str(&json).unwrap();
        assert_eq!(back, credits);
    }
}
