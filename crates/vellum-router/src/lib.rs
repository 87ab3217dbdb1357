//! # Vellum Router
//!
//! An ordered, first-match-wins pattern router:
//! - Literal segments (`/about`)
//! - Named captures (`/users/:id`)
//! - Trailing wildcard captures (`/static/:path*`, zero or more segments)
//!
//! The route table is a plain ordered list: registration order is
//! semantically significant, and the first entry whose pattern matches the
//! request path wins. There is no priority sorting — callers that need
//! more specific routes to win must register them first. This is what lets
//! a server claim reserved namespaces ahead of a generic catch-all.
//!
//! Percent-decoding failures surface as [`DecodeError`] from
//! [`Router::recognize`], distinct from "no route matched", so the caller
//! can answer 400 instead of 404.
//!
//! ## Example
//!
//! ```
//! use vellum_router::{PathPattern, Router};
//!
//! let mut router = Router::new();
//! router.push(PathPattern::compile("/_next/:path*").unwrap(), "reserved");
//! router.push(PathPattern::compile("/:path*").unwrap(), "page");
//!
//! let matched = router.recognize("/_next/static/app.js").unwrap().unwrap();
//! assert_eq!(*matched.handler, "reserved");
//! ```

pub mod pattern;

pub use pattern::{
    decode_path, DecodeError, Params, ParamValue, PathPattern, PatternError, Segment,
};

/// A pattern paired with its handler payload.
///
/// The handler type is generic so the server can store plain method
/// references (an enum of dispatch targets) rather than closures.
#[derive(Debug, Clone)]
pub struct RouteEntry<H> {
    pattern: PathPattern,
    handler: H,
}

impl<H> RouteEntry<H> {
    pub fn handler(&self) -> &H {
        &self.handler
    }
}

/// A successful recognition: the matched entry's handler plus captures.
#[derive(Debug)]
pub struct RouteMatch<'a, H> {
    pub handler: &'a H,
    pub params: Params,
}

/// Ordered route table. First match wins.
#[derive(Debug, Clone, Default)]
pub struct Router<H> {
    entries: Vec<RouteEntry<H>>,
}

impl<H> Router<H> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Appends an entry. Order is load-bearing: earlier entries shadow
    /// later ones for any path both would match.
    pub fn push(&mut self, pattern: PathPattern, handler: H) {
        self.entries.push(RouteEntry { pattern, handler });
    }

    /// Tries each entry in insertion order against the request path.
    ///
    /// Returns the first match, `Ok(None)` if nothing matched, or
    /// `Err(DecodeError)` as soon as any pattern hits an invalid
    /// percent-escape — the scan aborts rather than falling through.
    pub fn recognize(&self, path: &str) -> Result<Option<RouteMatch<'_, H>>, DecodeError> {
        for entry in &self.entries {
            if let Some(params) = entry.pattern.matches(path)? {
                return Ok(Some(RouteMatch {
                    handler: &entry.handler,
                    params,
                }));
            }
        }
        Ok(None)
    }

    /// The registered entries, in match order.
    pub fn entries(&self) -> &[RouteEntry<H>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
