// Copyright 2024 The Kubernetes Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Resource quantities (CPU, memory) with fixed-point milli-unit precision.
//!
//! This is the subset of k8s.io/apimachinery/pkg/api/resource.Quantity that
//! admission plugins need: exact integer arithmetic, value comparison across
//! display formats, and canonical rendering. A quantity is stored as a signed
//! number of milli-units, so "0.1" and "100m" are the same value.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Format describes the suffix family a quantity renders with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Format {
    /// BinarySI uses 1024-based suffixes (Ki, Mi, Gi, Ti).
    BinarySI,
    /// DecimalSI uses 1000-based suffixes (m, k, M, G, T).
    #[default]
    DecimalSI,
}

/// Binary suffixes, largest first, paired with their unit scale.
const BINARY_SUFFIXES: &[(&str, i64)] = &[
    ("Ti", 1 << 40),
    ("Gi", 1 << 30),
    ("Mi", 1 << 20),
    ("Ki", 1 << 10),
];

/// Decimal suffixes, largest first, paired with their unit scale.
const DECIMAL_SUFFIXES: &[(&str, i64)] = &[
    ("T", 1_000_000_000_000),
    ("G", 1_000_000_000),
    ("M", 1_000_000),
    ("k", 1_000),
];

/// Quantity is a fixed-point number with a display format tag.
///
/// Equality and ordering compare the numeric value only; the format is a
/// rendering hint and never participates in comparison.
#[derive(Debug, Clone, Copy)]
pub struct Quantity {
    milli: i64,
    format: Format,
}

impl Quantity {
    /// Create a quantity from a whole number of units.
    pub const fn new(value: i64, format: Format) -> Self {
        Self {
            milli: value.saturating_mul(1000),
            format,
        }
    }

    /// Create a quantity from a number of milli-units (e.g. CPU millicores).
    pub const fn new_milli(milli: i64, format: Format) -> Self {
        Self { milli, format }
    }

    /// The value in whole units, rounded up.
    pub fn value(&self) -> i64 {
        // ceiling division; matches resource.Quantity::Value()
        self.milli.saturating_add(999).div_euclid(1000)
    }

    /// The value in milli-units.
    pub fn milli_value(&self) -> i64 {
        self.milli
    }

    /// The display format tag.
    pub fn format(&self) -> Format {
        self.format
    }
}

impl PartialEq for Quantity {
    fn eq(&self, other: &Self) -> bool {
        self.milli == other.milli
    }
}

impl Eq for Quantity {}

impl PartialOrd for Quantity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Quantity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.milli.cmp(&other.milli)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.milli % 1000 != 0 {
            // sub-unit values only have a decimal rendering
            return write!(f, "{}m", self.milli);
        }
        let value = self.milli / 1000;
        let suffixes = match self.format {
            Format::BinarySI => BINARY_SUFFIXES,
            Format::DecimalSI => DECIMAL_SUFFIXES,
        };
        if value != 0 {
            for (suffix, scale) in suffixes {
                if value % scale == 0 {
                    return write!(f, "{}{}", value / scale, suffix);
                }
            }
        }
        write!(f, "{}", value)
    }
}

/// Error returned when a quantity string cannot be parsed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseQuantityError {
    #[error("quantity is empty")]
    Empty,
    #[error("invalid number in quantity {0:?}")]
    InvalidNumber(String),
    #[error("unknown suffix in quantity {0:?}")]
    UnknownSuffix(String),
    #[error("quantity {0:?} overflows the representable range")]
    OutOfRange(String),
}

impl FromStr for Quantity {
    type Err = ParseQuantityError;

    /// Parse the suffix set used by container resources: plain integers,
    /// decimal fractions, "m", and the k/M/G/T and Ki/Mi/Gi/Ti families.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ParseQuantityError::Empty);
        }

        let (sign, body) = match s.strip_prefix('-') {
            Some(rest) => (-1i128, rest),
            None => (1i128, s),
        };

        let digits_end = body
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .unwrap_or(body.len());
        let (number, suffix) = body.split_at(digits_end);
        if number.is_empty() {
            return Err(ParseQuantityError::InvalidNumber(s.to_string()));
        }

        let (scale_milli, format): (i64, Format) = match suffix {
            "" => (1000, Format::DecimalSI),
            "m" => (1, Format::DecimalSI),
            "k" => (1_000_000, Format::DecimalSI),
            "M" => (1_000_000_000, Format::DecimalSI),
            "G" => (1_000_000_000_000, Format::DecimalSI),
            "T" => (1_000_000_000_000_000, Format::DecimalSI),
            "Ki" => (1000 << 10, Format::BinarySI),
            "Mi" => (1000 << 20, Format::BinarySI),
            "Gi" => (1000 << 30, Format::BinarySI),
            "Ti" => (1000 << 40, Format::BinarySI),
            _ => return Err(ParseQuantityError::UnknownSuffix(s.to_string())),
        };

        // Split a decimal mantissa into integer digits and fraction digits so
        // the arithmetic stays exact.
        let (int_part, frac_part) = match number.split_once('.') {
            Some((i, frac)) => (i, frac),
            None => (number, ""),
        };
        if frac_part.contains('.') || (int_part.is_empty() && frac_part.is_empty()) {
            return Err(ParseQuantityError::InvalidNumber(s.to_string()));
        }

        let parse_digits = |d: &str| -> Result<i128, ParseQuantityError> {
            if d.is_empty() {
                return Ok(0);
            }
            d.parse::<i128>()
                .map_err(|_| ParseQuantityError::InvalidNumber(s.to_string()))
        };
        let int_digits = parse_digits(int_part)?;
        let frac_digits = parse_digits(frac_part)?;
        let frac_len = frac_part.len() as u32;
        if frac_len > 9 {
            return Err(ParseQuantityError::InvalidNumber(s.to_string()));
        }
        let denom = 10i128.pow(frac_len);

        let mantissa = int_digits
            .checked_mul(denom)
            .and_then(|v| v.checked_add(frac_digits))
            .ok_or_else(|| ParseQuantityError::OutOfRange(s.to_string()))?;
        let scaled = mantissa
            .checked_mul(scale_milli as i128)
            .ok_or_else(|| ParseQuantityError::OutOfRange(s.to_string()))?;
        if scaled % denom != 0 {
            // e.g. "0.0001" with no suffix has no exact milli representation
            return Err(ParseQuantityError::InvalidNumber(s.to_string()));
        }
        let milli = sign * (scaled / denom);
        let milli = i64::try_from(milli).map_err(|_| ParseQuantityError::OutOfRange(s.to_string()))?;

        Ok(Quantity { milli, format })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(s: &str) -> Quantity {
        s.parse().expect(s)
    }

    #[test]
    fn test_parse_whole_units() {
        assert_eq!(q("0").milli_value(), 0);
        assert_eq!(q("2").milli_value(), 2000);
        assert_eq!(q("-1").milli_value(), -1000);
        assert_eq!(q("1Ki").value(), 1024);
        assert_eq!(q("1Mi").value(), 1024 * 1024);
        assert_eq!(q("2Gi").value(), 2147483648);
        assert_eq!(q("1k").value(), 1000);
        assert_eq!(q("5M").value(), 5_000_000);
        assert_eq!(q("3G").value(), 3_000_000_000);
    }

    #[test]
    fn test_parse_milli_and_fractions() {
        assert_eq!(q("100m").milli_value(), 100);
        assert_eq!(q("1500m").milli_value(), 1500);
        assert_eq!(q("0.1").milli_value(), 100);
        assert_eq!(q("1.5").milli_value(), 1500);
        assert_eq!(q("1.5Gi").value(), 1610612736);
        assert_eq!(q("0.5Ki").value(), 512);
    }

    #[test]
    fn test_parse_formats() {
        assert_eq!(q("1Mi").format(), Format::BinarySI);
        assert_eq!(q("1M").format(), Format::DecimalSI);
        assert_eq!(q("100m").format(), Format::DecimalSI);
        assert_eq!(q("7").format(), Format::DecimalSI);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("".parse::<Quantity>(), Err(ParseQuantityError::Empty));
        assert!(matches!(
            "1Qi".parse::<Quantity>(),
            Err(ParseQuantityError::UnknownSuffix(_))
        ));
        assert!(matches!(
            "Mi".parse::<Quantity>(),
            Err(ParseQuantityError::InvalidNumber(_))
        ));
        assert!(matches!(
            "1.2.3".parse::<Quantity>(),
            Err(ParseQuantityError::InvalidNumber(_))
        ));
        // no exact milli representation
        assert!(matches!(
            "0.0001".parse::<Quantity>(),
            Err(ParseQuantityError::InvalidNumber(_))
        ));
    }

    #[test]
    fn test_value_rounds_up() {
        assert_eq!(Quantity::new_milli(1, Format::DecimalSI).value(), 1);
        assert_eq!(Quantity::new_milli(999, Format::DecimalSI).value(), 1);
        assert_eq!(Quantity::new_milli(1000, Format::DecimalSI).value(), 1);
        assert_eq!(Quantity::new_milli(1001, Format::DecimalSI).value(), 2);
        assert_eq!(Quantity::new_milli(-1500, Format::DecimalSI).value(), -1);
    }

    #[test]
    fn test_equality_ignores_format() {
        // value equality, not representation equality
        assert_eq!(q("100m"), q("0.1"));
        assert_eq!(q("1Mi"), q("1048576"));
        assert_eq!(q("1000m"), q("1"));
        assert_ne!(q("100m"), q("101m"));
    }

    #[test]
    fn test_ordering() {
        assert!(q("1m") < q("100m"));
        assert!(q("1Mi") > q("1M"));
        assert!(q("512Mi") < q("1Gi"));
        assert_eq!(q("2Gi").cmp(&q("2048Mi")), Ordering::Equal);
    }

    #[test]
    fn test_display_canonical() {
        assert_eq!(q("200m").to_string(), "200m");
        assert_eq!(q("0.1").to_string(), "100m");
        assert_eq!(q("1").to_string(), "1");
        assert_eq!(
            Quantity::new(536870912, Format::BinarySI).to_string(),
            "512Mi"
        );
        assert_eq!(
            Quantity::new(536870912, Format::DecimalSI).to_string(),
            "536870912"
        );
        assert_eq!(Quantity::new(2_000_000, Format::DecimalSI).to_string(), "2M");
        assert_eq!(Quantity::new(0, Format::BinarySI).to_string(), "0");
    }

    #[test]
    fn test_copy_semantics() {
        let a = q("1Gi");
        let mut b = a;
        b = Quantity::new(b.value() * 2, b.format());
        assert_eq!(a.value(), 1073741824);
        assert_eq!(b.value(), 2147483648);
    }
}
