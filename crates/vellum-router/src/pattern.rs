//! Pattern compilation and matching for route paths.
//!
//! A pattern is a `/`-separated sequence of segment specifiers:
//! - a plain segment matches itself literally,
//! - `:name` captures exactly one path segment,
//! - `:name*` captures zero or more trailing segments and must be the
//!   final specifier.
//!
//! Matching is structural over the percent-decoded path. A segment that
//! cannot be decoded is a distinct failure (`DecodeError`), never treated
//! as "no match", so callers can answer 400 instead of falling through
//! to 404.

use std::collections::HashMap;

use thiserror::Error;

/// Raised at compile time for patterns that cannot be built.
///
/// These are startup-time misuse of the route table, not request-time
/// conditions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatternError {
    /// A `:name*` wildcard appeared before other segments.
    #[error("wildcard capture `:{0}*` must be the final segment")]
    WildcardNotLast(String),
    /// A capture specifier with no name, e.g. `:` or `:*`.
    #[error("capture segment `{0}` has an empty name")]
    EmptyCaptureName(String),
}

/// Raised when a request path carries an invalid percent-escape.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid percent-encoding in path segment `{segment}`")]
pub struct DecodeError {
    pub segment: String,
}

/// One compiled segment specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Static text, compared verbatim against the decoded path segment.
    Literal(String),
    /// `:name` — captures exactly one segment.
    Param(String),
    /// `:name*` — captures the remaining segments (possibly none).
    Wildcard(String),
}

/// A captured parameter value: a single segment or an ordered sequence.
///
/// Wildcard captures are always `Many`, even when they matched zero
/// segments. Consumers pattern-match rather than assume shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Single(String),
    Many(Vec<String>),
}

impl ParamValue {
    pub fn as_single(&self) -> Option<&str> {
        match self {
            ParamValue::Single(value) => Some(value),
            ParamValue::Many(_) => None,
        }
    }

    pub fn as_many(&self) -> Option<&[String]> {
        match self {
            ParamValue::Single(_) => None,
            ParamValue::Many(values) => Some(values),
        }
    }
}

/// Captured parameters from a successful match, keyed by capture name.
pub type Params = HashMap<String, ParamValue>;

/// A compiled route pattern. Built once at startup, immutable thereafter.
///
/// # Examples
///
/// ```
/// use vellum_router::{ParamValue, PathPattern};
///
/// let pattern = PathPattern::compile("/static/:path*").unwrap();
///
/// let params = pattern.matches("/static/a/b/c").unwrap().unwrap();
/// assert_eq!(
///     params.get("path"),
///     Some(&ParamValue::Many(vec!["a".into(), "b".into(), "c".into()]))
/// );
///
/// // The wildcard is optional: zero trailing segments still match.
/// let params = pattern.matches("/static").unwrap().unwrap();
/// assert_eq!(params.get("path"), Some(&ParamValue::Many(vec![])));
/// ```
#[derive(Debug, Clone)]
pub struct PathPattern {
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Compiles a pattern string into a matcher.
    pub fn compile(pattern: &str) -> Result<Self, PatternError> {
        let mut segments = Vec::new();
        for raw in pattern.split('/').filter(|s| !s.is_empty()) {
            if let Some(Segment::Wildcard(name)) = segments.last() {
                return Err(PatternError::WildcardNotLast(name.clone()));
            }
            segments.push(classify_segment(raw)?);
        }
        Ok(Self { segments })
    }

    /// Matches a request path against this pattern.
    ///
    /// Matching is case-sensitive and trailing-slash insensitive. Returns
    /// `Ok(None)` on a structural mismatch and `Err(DecodeError)` when a
    /// path segment carries an invalid percent-escape.
    ///
    /// Since at most one wildcard is permitted and it is terminal, this is
    /// a straight prefix scan with an optional greedy tail capture — no
    /// backtracking.
    pub fn matches(&self, path: &str) -> Result<Option<Params>, DecodeError> {
        let decoded = decode_path(path)?;
        let mut params = Params::new();
        let mut next = 0;

        for segment in &self.segments {
            match segment {
                Segment::Literal(literal) => match decoded.get(next) {
                    Some(actual) if actual == literal => next += 1,
                    _ => return Ok(None),
                },
                Segment::Param(name) => match decoded.get(next) {
                    Some(actual) => {
                        params.insert(name.clone(), ParamValue::Single(actual.clone()));
                        next += 1;
                    }
                    None => return Ok(None),
                },
                Segment::Wildcard(name) => {
                    params.insert(name.clone(), ParamValue::Many(decoded[next..].to_vec()));
                    next = decoded.len();
                }
            }
        }

        if next == decoded.len() {
            Ok(Some(params))
        } else {
            Ok(None)
        }
    }
}

/// Classifies one raw pattern segment into its specifier.
fn classify_segment(raw: &str) -> Result<Segment, PatternError> {
    match raw.strip_prefix(':') {
        Some(rest) => {
            if let Some(name) = rest.strip_suffix('*') {
                if name.is_empty() {
                    return Err(PatternError::EmptyCaptureName(raw.to_string()));
                }
                Ok(Segment::Wildcard(name.to_string()))
            } else if rest.is_empty() {
                Err(PatternError::EmptyCaptureName(raw.to_string()))
            } else {
                Ok(Segment::Param(rest.to_string()))
            }
        }
        None => Ok(Segment::Literal(raw.to_string())),
    }
}

/// Splits a path into percent-decoded segments, dropping empty ones so
/// trailing and doubled slashes are insignificant.
pub fn decode_path(path: &str) -> Result<Vec<String>, DecodeError> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(decode_segment)
        .collect()
}

fn decode_segment(raw: &str) -> Result<String, DecodeError> {
    // `urlencoding::decode` passes malformed escapes through verbatim, so
    // check the triplets first: every `%` must be followed by two hex digits.
    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if i + 2 >= bytes.len()
                || !bytes[i + 1].is_ascii_hexdigit()
                || !bytes[i + 2].is_ascii_hexdigit()
            {
                return Err(DecodeError {
                    segment: raw.to_string(),
                });
            }
            i += 3;
        } else {
            i += 1;
        }
    }

    urlencoding::decode(raw)
        .map(|decoded| decoded.into_owned())
        .map_err(|_| DecodeError {
            segment: raw.to_string(),
        })
}
