//! The `mua=` entity-selector argument.
//!
//! Commands can target players by the union identity they proved:
//!
//! | Argument   | Matches                                  |
//! |------------|------------------------------------------|
//! | `*`, `*:*` | any player with an identity              |
//! | `c:*`      | identities starting with `c:`            |
//! | `c:s`      | exactly `c:s`                            |
//! | `c`        | exactly `c`                              |
//! | `!…`       | the negation of any of the above         |
//!
//! A player who skipped (or never configured) has no identity, so only an
//! inverted selector can match them.

use std::fmt;
use std::str::FromStr;

use crate::SessionError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher {
    Everything,
    Prefix(String),
    Exact(String),
}

impl Matcher {
    pub fn test(&self, sub: &str) -> bool {
        match self {
            Self::Everything => true,
            Self::Prefix(prefix) => sub.starts_with(prefix.as_str()),
            Self::Exact(exact) => sub == exact,
        }
    }
}

/// A parsed `mua=` argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MuaSelector {
    matcher: Matcher,
    inverted: bool,
}

impl MuaSelector {
    pub fn new(matcher: Matcher, inverted: bool) -> Self {
        Self { matcher, inverted }
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    pub fn is_inverted(&self) -> bool {
        self.inverted
    }

    /// Tests a player's identifier (`None` for players without one).
    pub fn matches(&self, identifier: Option<&str>) -> bool {
        self.inverted != identifier.is_some_and(|sub| self.matcher.test(sub))
    }
}

impl FromStr for MuaSelector {
    type Err = SessionError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let mut cursor = Cursor { input, pos: 0 };
        let inverted = cursor.eat('!');
        let matcher = if cursor.eat('*') {
            if cursor.rest().starts_with(":*") {
                cursor.pos += 2;
            }
            Matcher::Everything
        } else {
            let c = cursor.read_unquoted();
            if cursor.eat(':') {
                if cursor.eat('*') {
                    Matcher::Prefix(format!("{c}:"))
                } else {
                    let s = cursor.read_unquoted();
                    Matcher::Exact(format!("{c}:{s}"))
                }
            } else {
                Matcher::Exact(c.to_owned())
            }
        };
        if !cursor.rest().is_empty() {
            return Err(SessionError::InvalidSelector {
                input: input.to_owned(),
                position: cursor.pos,
            });
        }
        Ok(Self { matcher, inverted })
    }
}

impl fmt::Display for MuaSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.inverted {
            f.write_str("!")?;
        }
        match &self.matcher {
            Matcher::Everything => f.write_str("*"),
            Matcher::Prefix(prefix) => write!(f, "{prefix}*"),
            Matcher::Exact(exact) => f.write_str(exact),
        }
    }
}

struct Cursor<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn eat(&mut self, c: char) -> bool {
        if self.rest().starts_with(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    /// Characters allowed in an unquoted command argument.
    fn read_unquoted(&mut self) -> &'a str {
        let rest = self.rest();
        let len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '+')))
            .unwrap_or(rest.len());
        self.pos += len;
        &rest[..len]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> MuaSelector {
        s.parse().unwrap()
    }

    // =====================================================================
    // parse
    // =====================================================================

    #[test]
    fn test_parse_star_forms_are_everything() {
        assert_eq!(parse("*").matcher(), &Matcher::Everything);
        assert_eq!(parse("*:*").matcher(), &Matcher::Everything);
    }

    #[test]
    fn test_parse_namespace_star_is_prefix_with_colon() {
        assert_eq!(parse("mua:*").matcher(), &Matcher::Prefix("mua:".into()));
    }

    #[test]
    fn test_parse_namespaced_and_bare_are_exact() {
        assert_eq!(parse("mua:1001").matcher(), &Matcher::Exact("mua:1001".into()));
        assert_eq!(parse("1001").matcher(), &Matcher::Exact("1001".into()));
    }

    #[test]
    fn test_parse_bang_inverts() {
        let selector = parse("!mua:*");
        assert!(selector.is_inverted());
        assert_eq!(selector.to_string(), "!mua:*");
    }

    #[test]
    fn test_parse_trailing_garbage_returns_error() {
        let err = "mua:1 2".parse::<MuaSelector>().unwrap_err();
        assert!(matches!(err, SessionError::InvalidSelector { position: 5, .. }));
        assert!("**".parse::<MuaSelector>().is_err());
    }

    // =====================================================================
    // matches()
    // =====================================================================

    #[test]
    fn test_matches_everything_requires_identity() {
        let selector = parse("*");
        assert!(selector.matches(Some("anything")));
        assert!(!selector.matches(None));
    }

    #[test]
    fn test_matches_prefix_and_exact() {
        assert!(parse("mua:*").matches(Some("mua:1001")));
        assert!(!parse("mua:*").matches(Some("muax:1001")));
        assert!(parse("mua:1001").matches(Some("mua:1001")));
        assert!(!parse("mua:1001").matches(Some("mua:10010")));
    }

    #[test]
    fn test_matches_inverted_selects_players_without_identity() {
        let selector = parse("!*");
        assert!(selector.matches(None));
        assert!(!selector.matches(Some("mua:1")));
        assert!(parse("!mua:1").matches(Some("mua:2")));
    }
}
