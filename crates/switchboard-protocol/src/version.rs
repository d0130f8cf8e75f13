//! Version match expressions.
//!
//! A registration declares which API versions it applies to using a match
//! expression: a bare number, a string term, or a list of either. String
//! terms support exact numerals (`"3"`), inclusive ranges (`"1-4"`),
//! open-ended ranges (`"2-"`, `"2+"`, `"-3"`), and comma-separated
//! combinations. Lists and commas are evaluated as an OR.
//!
//! Absence of an expression means "every version" — that default lives in
//! the registry, not here.

use serde::{Deserialize, Serialize};

/// Concrete API version number (the `N` in `/v{N}` routes).
pub type ApiVersion = u32;

/// A version match expression.
///
/// Serde-untagged so JSON `3`, `"1-4"`, and `["1-2", "4+"]` all
/// deserialize. Booleans, null, and objects are rejected at
/// deserialization time, which covers the "expression is not a number,
/// list, or string" error class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VersionSpec {
    Number(u64),
    Text(String),
    Many(Vec<VersionSpec>),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionSpecError {
    #[error("invalid version expression: {0:?}")]
    InvalidExpression(String),
}

impl VersionSpec {
    /// Build a list expression from anything convertible to a spec.
    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<VersionSpec>,
    {
        Self::Many(items.into_iter().map(Into::into).collect())
    }

    /// Decide whether `version` is a member of this expression.
    ///
    /// An empty list matches nothing. A reversed range (`"7-5"`) is
    /// well-formed and matches nothing.
    pub fn matches(&self, version: ApiVersion) -> Result<bool, VersionSpecError> {
        match self {
            Self::Number(n) => Ok(u64::from(version) == *n),
            Self::Text(expr) => text_matches(expr, version),
            Self::Many(items) => {
                let mut any = false;
                for item in items {
                    if item.matches(version)? {
                        any = true;
                    }
                }
                Ok(any)
            }
        }
    }
}

impl From<u32> for VersionSpec {
    fn from(n: u32) -> Self {
        Self::Number(u64::from(n))
    }
}

impl From<u64> for VersionSpec {
    fn from(n: u64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for VersionSpec {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for VersionSpec {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// Evaluate a string expression: comma-separated OR of terms.
///
/// Every term is checked for validity even after a match, so a malformed
/// trailing term still fails the whole expression.
fn text_matches(expr: &str, version: ApiVersion) -> Result<bool, VersionSpecError> {
    let trimmed = expr.trim();
    if trimmed.is_empty() {
        return Err(VersionSpecError::InvalidExpression(expr.to_string()));
    }

    let mut any = false;
    for term in trimmed.split(',') {
        match term_matches(term.trim(), version) {
            Ok(true) => any = true,
            Ok(false) => {}
            Err(()) => return Err(VersionSpecError::InvalidExpression(expr.to_string())),
        }
    }
    Ok(any)
}

fn term_matches(term: &str, version: ApiVersion) -> Result<bool, ()> {
    let v = u64::from(version);

    if term.is_empty() {
        return Err(());
    }
    // Exact numeral: "5"
    if term.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(v == parse_numeral(term)?);
    }
    // Upper-bounded: "-5"
    if let Some(rest) = term.strip_prefix('-') {
        return Ok(v <= parse_numeral(rest)?);
    }
    // Lower-bounded: "5-" or "5+"
    if let Some(rest) = term.strip_suffix('+').or_else(|| term.strip_suffix('-')) {
        return Ok(v >= parse_numeral(rest)?);
    }
    // Inclusive range: "1-4"
    if let Some((lo, hi)) = term.split_once('-') {
        let lo = parse_numeral(lo)?;
        let hi = parse_numeral(hi)?;
        return Ok(v >= lo && v <= hi);
    }
    Err(())
}

fn parse_numeral(s: &str) -> Result<u64, ()> {
    let s = s.trim();
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(());
    }
    s.parse().map_err(|_| ())
}
