//! Calendar periods (`P1Y`, `P6M`, `P2W3D`, ...) for record validity.
//!
//! Months and years have no fixed length, so a [`Period`] is applied with
//! calendar arithmetic anchored at the issuing instant: one month after
//! January 31st is the last day of February.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Days, Months, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::OAuthError;

/// An ISO-8601 date-based period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Period {
    years: i32,
    months: i32,
    days: i32,
}

impl Period {
    pub const fn new(years: i32, months: i32, days: i32) -> Self {
        Self {
            years,
            months,
            days,
        }
    }

    pub const fn years(years: i32) -> Self {
        Self::new(years, 0, 0)
    }

    pub const fn days(days: i32) -> Self {
        Self::new(0, 0, days)
    }

    /// Whether any component is negative.
    pub fn is_negative(&self) -> bool {
        self.years < 0 || self.months < 0 || self.days < 0
    }

    pub fn is_zero(&self) -> bool {
        self.years == 0 && self.months == 0 && self.days == 0
    }

    /// Adds the period to `t`: total months first, then days.
    ///
    /// Returns `None` when the result leaves the representable range.
    pub fn add_to(&self, t: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let months = i64::from(self.years) * 12 + i64::from(self.months);
        let t = match u32::try_from(months.unsigned_abs()) {
            Ok(m) if months >= 0 => t.checked_add_months(Months::new(m))?,
            Ok(m) => t.checked_sub_months(Months::new(m))?,
            Err(_) => return None,
        };
        let days = Days::new(u64::from(self.days.unsigned_abs()));
        if self.days >= 0 {
            t.checked_add_days(days)
        } else {
            t.checked_sub_days(days)
        }
    }
}

impl FromStr for Period {
    type Err = OAuthError;

    /// Parses `[-+]P[nY][nM][nW][nD]`, components optionally signed,
    /// letters case-insensitive. Weeks fold into days.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || OAuthError::Period(s.to_owned());

        let (negate, rest) = match s.as_bytes().first() {
            Some(b'-') => (true, &s[1..]),
            Some(b'+') => (false, &s[1..]),
            _ => (false, s),
        };
        let mut rest = rest
            .strip_prefix('P')
            .or_else(|| rest.strip_prefix('p'))
            .ok_or_else(invalid)?;

        let mut period = Period::default();
        let mut seen_unit = 0usize;
        let mut any = false;
        const UNITS: [char; 4] = ['Y', 'M', 'W', 'D'];

        while !rest.is_empty() {
            let digits_end = rest
                .char_indices()
                .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
                .map(|(i, _)| i)
                .ok_or_else(invalid)?;
            let value: i32 = rest[..digits_end].parse().map_err(|_| invalid())?;
            let unit = rest[digits_end..]
                .chars()
                .next()
                .map(|c| c.to_ascii_uppercase())
                .ok_or_else(invalid)?;
            let index = UNITS.iter().position(|&u| u == unit).ok_or_else(invalid)?;
            if index < seen_unit {
                return Err(invalid());
            }
            seen_unit = index + 1;
            match unit {
                'Y' => period.years = value,
                'M' => period.months = value,
                'W' => {
                    period.days = value
                        .checked_mul(7)
                        .and_then(|d| d.checked_add(period.days))
                        .ok_or_else(invalid)?
                }
                _ => period.days = period.days.checked_add(value).ok_or_else(invalid)?,
            }
            any = true;
            rest = &rest[digits_end + 1..];
        }

        if !any {
            return Err(invalid());
        }
        if negate {
            period = Period::new(
                period.years.checked_neg().ok_or_else(invalid)?,
                period.months.checked_neg().ok_or_else(invalid)?,
                period.days.checked_neg().ok_or_else(invalid)?,
            );
        }
        Ok(period)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return f.write_str("P0D");
        }
        f.write_str("P")?;
        if self.years != 0 {
            write!(f, "{}Y", self.years)?;
        }
        if self.months != 0 {
            write!(f, "{}M", self.months)?;
        }
        if self.days != 0 {
            write!(f, "{}D", self.days)?;
        }
        Ok(())
    }
}

impl Serialize for Period {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Period {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
