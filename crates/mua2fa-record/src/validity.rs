//! The answer a signature check gives: "valid until", or "never valid".

use chrono::{DateTime, Utc};

/// Time-dependent outcome of a verification.
///
/// A correct signature is valid at every instant up to and including its
/// expiry; anything else is valid at no instant. Callers ask
/// [`is_valid_at`](Self::is_valid_at) with their own clock reading, which
/// keeps verification pure and tests deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    /// Bad signature, wrong key, wrong profile, or an unencodable payload.
    Never,
    /// Valid for every `t <= expiry`.
    Until(DateTime<Utc>),
}

impl Validity {
    pub fn is_valid_at(&self, t: DateTime<Utc>) -> bool {
        match self {
            Self::Never => false,
            Self::Until(expiry) => t <= *expiry,
        }
    }

    /// Logical "or" of two predicates: valid whenever either one is.
    ///
    /// Both are closed-below intervals ending at an expiry, so the union is
    /// the one with the later expiry.
    pub fn or(self, other: Self) -> Self {
        match (self, other) {
            (Self::Never, v) | (v, Self::Never) => v,
            (Self::Until(a), Self::Until(b)) => Self::Until(a.max(b)),
        }
    }

    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Never => None,
            Self::Until(expiry) => Some(*expiry),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn test_is_valid_at_includes_expiry_instant() {
        let v = Validity::Until(at(100));
        assert!(v.is_valid_at(at(99)));
        assert!(v.is_valid_at(at(100)));
        assert!(!v.is_valid_at(at(100) + TimeDelta::milliseconds(1)));
    }

    #[test]
    fn test_never_is_false_everywhere() {
        assert!(!Validity::Never.is_valid_at(at(0)));
        assert!(!Validity::Never.is_valid_at(DateTime::<Utc>::MIN_UTC));
    }

    #[test]
    fn test_or_takes_later_expiry() {
        let a = Validity::Until(at(10));
        let b = Validity::Until(at(20));
        assert_eq!(a.or(b), b);
        assert_eq!(Validity::Never.or(a), a);
        assert_eq!(a.or(Validity::Never), a);
    }
}
