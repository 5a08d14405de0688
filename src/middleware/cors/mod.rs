//! # CORS Policy Engine
//!
//! A [`CorsPolicy`] is compiled once from configuration and bound to route entries
//! by the router builder. Each route's handler chain then gets a
//! [`CorsMiddleware`] that evaluates every request independently:
//!
//! | Request | Outcome |
//! |---|---|
//! | no `Origin` | forwarded; `Allow` added for OPTIONS or an unlisted method |
//! | origin not allowed | same as no `Origin`, no `Access-Control-*` headers |
//! | allowed origin, not OPTIONS | `Access-Control-Allow-Origin` (+ credentials, expose headers), forwarded |
//! | allowed origin, OPTIONS | preflight answered here: 204, 400 without a request method, 405 for an unlisted one |
//!
//! Every response gets `Vary: Origin`; OPTIONS responses also vary on
//! `Access-Control-Request-Method` and `Access-Control-Request-Headers`.
//!
//! With `allow_credentials` the policy never emits a literal `*` for the origin or
//! the allowed headers; the matched values are echoed.

mod builder;
mod error;
mod middleware;

pub use builder::CorsPolicyBuilder;
pub use error::CorsConfigError;
pub use middleware::CorsMiddleware;

use std::fmt;
use std::sync::Arc;

use crate::handler::{canonical_header_key, header, HandlerRequest, HandlerResponse, HeaderVec};
use crate::router::RouteEntry;

/// Function deciding whether an origin is allowed, given the request it came with.
pub type OriginPredicate = Arc<dyn Fn(&HandlerRequest, &str) -> bool + Send + Sync>;

/// Allow-list entry with a single `*`, split around it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct WildcardOrigin {
    prefix: String,
    suffix: String,
}

impl WildcardOrigin {
    /// Split at the first `*`; callers guarantee there is exactly one.
    pub(crate) fn parse(origin: &str) -> Self {
        let (prefix, suffix) = origin.split_once('*').unwrap_or((origin, ""));
        Self {
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
        }
    }

    /// The `*` must stand for at least one character.
    #[inline]
    pub(crate) fn matches(&self, origin: &str) -> bool {
        origin.len() > self.prefix.len() + self.suffix.len()
            && origin.starts_with(&self.prefix)
            && origin.ends_with(&self.suffix)
    }
}

/// Compiled CORS configuration.
pub struct CorsPolicy {
    pub(crate) allowed_origins_all: bool,
    pub(crate) allowed_origins: Vec<String>,
    pub(crate) wildcard_origins: Vec<WildcardOrigin>,
    pub(crate) allow_origin_fn: Option<OriginPredicate>,
    pub(crate) allowed_headers_all: bool,
    pub(crate) allowed_headers: Vec<String>,
    pub(crate) exposed_headers: Vec<String>,
    pub(crate) allow_credentials: bool,
    pub(crate) max_age: u32,
}

impl fmt::Debug for CorsPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CorsPolicy")
            .field("allowed_origins_all", &self.allowed_origins_all)
            .field("allowed_origins", &self.allowed_origins)
            .field("wildcard_origins", &self.wildcard_origins)
            .field(
                "allow_origin_fn",
                &self.allow_origin_fn.as_ref().map(|_| "<function>"),
            )
            .field("allowed_headers_all", &self.allowed_headers_all)
            .field("allowed_headers", &self.allowed_headers)
            .field("exposed_headers", &self.exposed_headers)
            .field("allow_credentials", &self.allow_credentials)
            .field("max_age", &self.max_age)
            .finish()
    }
}

impl CorsPolicy {
    #[must_use]
    pub fn builder() -> CorsPolicyBuilder {
        CorsPolicyBuilder::new()
    }

    /// Whether `origin` may access resources guarded by this policy.
    ///
    /// A configured predicate decides alone; otherwise the lower-cased origin is
    /// checked against the exact entries and then the wildcard entries.
    #[must_use]
    pub fn is_origin_allowed(&self, req: &HandlerRequest, origin: &str) -> bool {
        if let Some(predicate) = &self.allow_origin_fn {
            return predicate(req, origin);
        }
        if self.allowed_origins_all {
            return true;
        }
        let origin = origin.to_ascii_lowercase();
        self.allowed_origins.iter().any(|o| *o == origin)
            || self.wildcard_origins.iter().any(|w| w.matches(&origin))
    }

    #[must_use]
    pub fn allows_all_origins(&self) -> bool {
        self.allowed_origins_all
    }

    #[must_use]
    pub fn allows_all_headers(&self) -> bool {
        self.allowed_headers_all
    }

    #[must_use]
    pub fn allowed_origins(&self) -> &[String] {
        &self.allowed_origins
    }

    #[must_use]
    pub fn allowed_headers(&self) -> &[String] {
        &self.allowed_headers
    }

    #[must_use]
    pub fn exposed_headers(&self) -> &[String] {
        &self.exposed_headers
    }

    #[must_use]
    pub fn allow_credentials(&self) -> bool {
        self.allow_credentials
    }

    #[must_use]
    pub fn max_age(&self) -> u32 {
        self.max_age
    }

    /// `Access-Control-Allow-Origin` and `Access-Control-Allow-Credentials` for an
    /// origin that passed [`CorsPolicy::is_origin_allowed`].
    pub(crate) fn push_origin_headers(&self, headers: &mut HeaderVec, origin: &str) {
        let value = if self.allowed_origins_all && !self.allow_credentials {
            "*"
        } else {
            origin
        };
        headers.push((
            Arc::from(header::ACCESS_CONTROL_ALLOW_ORIGIN),
            value.to_string(),
        ));
        if self.allow_credentials {
            headers.push((
                Arc::from(header::ACCESS_CONTROL_ALLOW_CREDENTIALS),
                "true".to_string(),
            ));
        }
    }

    /// Value of `Access-Control-Allow-Headers` for a preflight, if any.
    fn allow_headers_value(&self, req: &HandlerRequest) -> Option<String> {
        if self.allowed_headers_all && !self.allow_credentials {
            return Some("*".to_string());
        }
        let mut granted: Vec<String> = Vec::new();
        for raw in req.get_header_values(header::ACCESS_CONTROL_REQUEST_HEADERS) {
            for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                let name = canonical_header_key(name);
                let allowed =
                    self.allowed_headers_all || self.allowed_headers.iter().any(|h| *h == name);
                if allowed && !granted.contains(&name) {
                    granted.push(name);
                }
            }
        }
        if granted.is_empty() {
            None
        } else {
            Some(granted.join(", "))
        }
    }

    /// Answer a preflight from an allowed origin; `headers` already carries the
    /// `Vary` and origin headers.
    pub(crate) fn preflight(
        &self,
        req: &HandlerRequest,
        entry: &RouteEntry,
        mut headers: HeaderVec,
    ) -> HandlerResponse {
        headers.push((
            Arc::from(header::ACCESS_CONTROL_ALLOW_METHODS),
            entry.allow_value(),
        ));
        if self.max_age > 0 {
            headers.push((
                Arc::from(header::ACCESS_CONTROL_MAX_AGE),
                self.max_age.to_string(),
            ));
        }
        if let Some(value) = self.allow_headers_value(req) {
            headers.push((Arc::from(header::ACCESS_CONTROL_ALLOW_HEADERS), value));
        }

        let requested = req
            .get_header(header::ACCESS_CONTROL_REQUEST_METHOD)
            .map(str::trim)
            .unwrap_or_default();
        let status = if requested.is_empty() {
            400
        } else if entry
            .allowed_methods()
            .iter()
            .any(|m| m.as_str() == requested)
        {
            204
        } else {
            405
        };

        let mut res = HandlerResponse::new(status);
        res.headers = headers;
        res
    }
}
