//! HTTP method tokens as a closed enumeration.
//!
//! Route entries keep their methods in a `BTreeSet<RouteMethod>`, so the ordering
//! defined here is what ends up in `Allow` and `Access-Control-Allow-Methods`.
//! The ordering is lexicographic on the token, which keeps extension methods
//! (`PURGE`, `CUSTOM`, ...) in a deterministic position next to the standard ones.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::error::RouterError;

/// A request method as seen by the router.
///
/// Equality, hashing and ordering all go through [`RouteMethod::as_str`], so
/// `Extension("GET")` and `Get` are the same method.
#[derive(Debug, Clone)]
pub enum RouteMethod {
    Connect,
    Delete,
    Get,
    Head,
    Options,
    Patch,
    Post,
    Put,
    Trace,
    /// Any other token, stored verbatim
    Extension(String),
}

impl RouteMethod {
    /// The nine methods an "any method" registration stands for.
    pub const STANDARD: [RouteMethod; 9] = [
        RouteMethod::Connect,
        RouteMethod::Delete,
        RouteMethod::Get,
        RouteMethod::Head,
        RouteMethod::Options,
        RouteMethod::Patch,
        RouteMethod::Post,
        RouteMethod::Put,
        RouteMethod::Trace,
    ];

    /// The wire token of this method.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            RouteMethod::Connect => "CONNECT",
            RouteMethod::Delete => "DELETE",
            RouteMethod::Get => "GET",
            RouteMethod::Head => "HEAD",
            RouteMethod::Options => "OPTIONS",
            RouteMethod::Patch => "PATCH",
            RouteMethod::Post => "POST",
            RouteMethod::Put => "PUT",
            RouteMethod::Trace => "TRACE",
            RouteMethod::Extension(token) => token,
        }
    }

    /// Parse a method token. Tokens are case-sensitive, so `get` is an extension
    /// method here; registration upper-cases before parsing.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::InvalidMethod`] for an empty token or one containing
    /// characters that are not valid in an HTTP method.
    pub fn parse(token: &str) -> Result<Self, RouterError> {
        let method = match token {
            "CONNECT" => RouteMethod::Connect,
            "DELETE" => RouteMethod::Delete,
            "GET" => RouteMethod::Get,
            "HEAD" => RouteMethod::Head,
            "OPTIONS" => RouteMethod::Options,
            "PATCH" => RouteMethod::Patch,
            "POST" => RouteMethod::Post,
            "PUT" => RouteMethod::Put,
            "TRACE" => RouteMethod::Trace,
            other => {
                if http::Method::from_bytes(other.as_bytes()).is_err() {
                    return Err(RouterError::InvalidMethod {
                        method: other.to_string(),
                    });
                }
                RouteMethod::Extension(other.to_string())
            }
        };
        Ok(method)
    }
}

impl PartialEq for RouteMethod {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for RouteMethod {}

impl Hash for RouteMethod {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl Ord for RouteMethod {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl PartialOrd for RouteMethod {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for RouteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RouteMethod {
    type Err = RouterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RouteMethod::parse(s)
    }
}

impl From<&http::Method> for RouteMethod {
    fn from(method: &http::Method) -> Self {
        match *method {
            http::Method::CONNECT => RouteMethod::Connect,
            http::Method::DELETE => RouteMethod::Delete,
            http::Method::GET => RouteMethod::Get,
            http::Method::HEAD => RouteMethod::Head,
            http::Method::OPTIONS => RouteMethod::Options,
            http::Method::PATCH => RouteMethod::Patch,
            http::Method::POST => RouteMethod::Post,
            http::Method::PUT => RouteMethod::Put,
            http::Method::TRACE => RouteMethod::Trace,
            ref other => RouteMethod::Extension(other.as_str().to_string()),
        }
    }
}

impl From<http::Method> for RouteMethod {
    fn from(method: http::Method) -> Self {
        RouteMethod::from(&method)
    }
}
