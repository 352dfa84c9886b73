//! Label selectors (`key=value`, `key==value`, `key!=value`)

use crate::error::{Error, Result};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::Eq => f.write_str("="),
            Operator::Ne => f.write_str("!="),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    pub key: String,
    pub value: String,
    pub operator: Operator,
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.key, self.operator, self.value)
    }
}

/// Split `s` on `sep` only when `sep` occurs exactly once.
fn split_exactly_once<'a>(s: &'a str, sep: &str) -> Option<(&'a str, &'a str)> {
    if s.matches(sep).count() == 1 {
        s.split_once(sep)
    } else {
        None
    }
}

impl Selector {
    pub fn new(key: impl Into<String>, value: impl Into<String>, operator: Operator) -> Self {
        Self { key: key.into(), value: value.into(), operator }
    }

    pub fn parse(s: &str) -> Result<Self> {
        let invalid = |reason: &str| {
            tracing::error!("❌ Invalid label selector format: {}", s);
            Error::InvalidSelector { selector: s.to_string(), reason: reason.to_string() }
        };

        let (key, value, operator) = if let Some((k, v)) = split_exactly_once(s, "!=") {
            (k, v, Operator::Ne)
        } else if let Some((k, v)) = split_exactly_once(s, "==") {
            (k, v, Operator::Eq)
        } else if s.contains("==") {
            return Err(invalid("invalid format"));
        } else if let Some((k, v)) = split_exactly_once(s, "=") {
            (k, v, Operator::Eq)
        } else {
            return Err(invalid("invalid format"));
        };

        let key = key.trim();
        let value = value.trim();

        if key.is_empty() || value.is_empty() {
            return Err(invalid("empty key or value"));
        }
        if key.contains(['!', '=']) {
            return Err(invalid("key contains invalid characters"));
        }
        if value.contains(['!', '=']) {
            return Err(invalid("value contains invalid characters"));
        }

        Ok(Selector::new(key, value, operator))
    }

    /// Parse a comma-separated selector list. Blank segments are skipped.
    pub fn parse_list(s: &str) -> Result<Vec<Self>> {
        s.split(',').map(str::trim).filter(|part| !part.is_empty()).map(Selector::parse).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_operators() {
        assert_eq!(Selector::parse("team=infra").unwrap(), Selector::new("team", "infra", Operator::Eq));
        assert_eq!(Selector::parse("team==infra").unwrap(), Selector::new("team", "infra", Operator::Eq));
        assert_eq!(Selector::parse("team!=infra").unwrap(), Selector::new("team", "infra", Operator::Ne));
        assert_eq!(
            Selector::parse("  team  =  infra ").unwrap(),
            Selector::new("team", "infra", Operator::Eq)
        );
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["team", "=infra", "team=", "a=b=c", "a===b", "a!=b!=c", "a!b=c", ""] {
            assert!(
                matches!(Selector::parse(bad), Err(Error::InvalidSelector { .. })),
                "expected '{}' to be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_parse_list() {
        let selectors = Selector::parse_list("a=1, b!=2,,").unwrap();
        assert_eq!(selectors.len(), 2);
        assert_eq!(selectors[1].operator, Operator::Ne);
        assert!(Selector::parse_list("a=1,broken").is_err());
    }

    #[test]
    fn test_display_roundtrips_format() {
        assert_eq!(Selector::new("team", "infra", Operator::Ne).to_string(), "team!=infra");
    }
}
