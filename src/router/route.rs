//! Per-pattern method bookkeeping and the handlers derived from it.
//!
//! Every concrete pattern the builder touches gets one [`RouteEntry`]. The entry is
//! shared between the builder (which keeps adding methods while routes are
//! registered) and the OPTIONS / fallback handlers installed for the pattern, which
//! read it on every request through an `ArcSwap`.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::handler::{header, BoxedHandler, Handler, HandlerRequest, HandlerResponse, HeaderVec};
use crate::method::RouteMethod;
use crate::middleware::cors::CorsPolicy;

/// Preflight and OPTIONS cache lifetime used when none is configured (one day).
pub const DEFAULT_OPTIONS_MAX_AGE: u32 = 86_400;

/// Route entry as seen by request-time handlers.
pub type SharedRoute = Arc<ArcSwap<RouteEntry>>;

/// Allowed methods and CORS binding of one composed pattern.
#[derive(Clone)]
pub struct RouteEntry {
    allowed_methods: BTreeSet<RouteMethod>,
    options_max_age: u32,
    cors: Option<Arc<CorsPolicy>>,
    options_override: Option<BoxedHandler>,
}

impl RouteEntry {
    #[must_use]
    pub fn new(options_max_age: u32, cors: Option<Arc<CorsPolicy>>) -> Self {
        Self {
            allowed_methods: BTreeSet::new(),
            options_max_age,
            cors,
            options_override: None,
        }
    }

    /// Record a method. `GET` brings `HEAD` along, and any method brings `OPTIONS`.
    pub fn add_method(&mut self, method: RouteMethod) {
        if method == RouteMethod::Get {
            self.allowed_methods.insert(RouteMethod::Head);
        }
        self.allowed_methods.insert(method);
        self.allowed_methods.insert(RouteMethod::Options);
    }

    /// Record every standard method, for handlers registered without one.
    pub fn add_any_method(&mut self) {
        for method in RouteMethod::STANDARD {
            self.add_method(method);
        }
    }

    /// Allowed methods in canonical order
    #[must_use]
    pub fn allowed_methods(&self) -> &BTreeSet<RouteMethod> {
        &self.allowed_methods
    }

    #[inline]
    #[must_use]
    pub fn allows(&self, method: &RouteMethod) -> bool {
        self.allowed_methods.contains(method)
    }

    /// Whether a real handler was registered, as opposed to the automatic OPTIONS one.
    #[must_use]
    pub fn has_handlers(&self) -> bool {
        self.allowed_methods
            .iter()
            .any(|m| *m != RouteMethod::Options)
    }

    /// Allowed methods joined for an `Allow` style header, e.g. `GET, HEAD, OPTIONS`.
    #[must_use]
    pub fn allow_value(&self) -> String {
        let tokens: Vec<&str> = self.allowed_methods.iter().map(RouteMethod::as_str).collect();
        tokens.join(", ")
    }

    #[must_use]
    pub fn options_max_age(&self) -> u32 {
        self.options_max_age
    }

    #[must_use]
    pub fn cors(&self) -> Option<&Arc<CorsPolicy>> {
        self.cors.as_ref()
    }

    pub(crate) fn options_override(&self) -> Option<&BoxedHandler> {
        self.options_override.as_ref()
    }

    pub(crate) fn set_options_override(&mut self, handler: BoxedHandler) {
        self.options_override = Some(handler);
    }

    /// `Allow` and `Cache-Control` headers describing this entry.
    #[must_use]
    pub fn allow_headers(&self) -> HeaderVec {
        let mut headers = HeaderVec::new();
        if self.allowed_methods.is_empty() {
            return headers;
        }
        headers.push((Arc::from(header::ALLOW), self.allow_value()));
        if self.options_max_age > 0 {
            headers.push((
                Arc::from(header::CACHE_CONTROL),
                format!("public, max-age={}", self.options_max_age),
            ));
        }
        headers
    }
}

impl fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteEntry")
            .field("allowed_methods", &self.allow_value())
            .field("options_max_age", &self.options_max_age)
            .field("cors", &self.cors.is_some())
            .field("options_override", &self.options_override.is_some())
            .finish()
    }
}

/// Add headers the response does not already carry.
pub(crate) fn merge_missing_headers(res: &mut HandlerResponse, headers: HeaderVec) {
    for (name, value) in headers {
        if res.get_header(&name).is_none() {
            res.headers.push((name, value));
        }
    }
}

/// Default not-found handler: `404 not found`.
#[must_use]
pub fn not_found(_req: HandlerRequest) -> HandlerResponse {
    HandlerResponse::text(404, "404 not found")
}

/// Default method-not-allowed handler: `405 method not allowed`, or an empty 204
/// for an OPTIONS request.
#[must_use]
pub fn method_not_allowed(req: HandlerRequest) -> HandlerResponse {
    if req.method == RouteMethod::Options {
        return HandlerResponse::new(204);
    }
    HandlerResponse::text(405, "405 method not allowed")
}

/// Any-method handler registered once per pattern string.
///
/// Answers 405 (with `Allow`, unless CORS owns the entry) once the entry has a
/// real handler, and 404 otherwise.
pub(crate) struct FallbackHandler {
    pub(crate) entry: SharedRoute,
    pub(crate) not_found: BoxedHandler,
    pub(crate) method_not_allowed: BoxedHandler,
}

impl Handler for FallbackHandler {
    fn handle(&self, req: HandlerRequest) -> HandlerResponse {
        let entry = self.entry.load();
        if !entry.has_handlers() {
            return self.not_found.handle(req);
        }
        let mut res = self.method_not_allowed.handle(req);
        if entry.cors().is_none() {
            merge_missing_headers(&mut res, entry.allow_headers());
        }
        res
    }
}

/// Automatic OPTIONS handler of an entry.
pub(crate) struct OptionsHandler {
    pub(crate) entry: SharedRoute,
}

impl Handler for OptionsHandler {
    fn handle(&self, req: HandlerRequest) -> HandlerResponse {
        let entry = self.entry.load();
        if let Some(handler) = entry.options_override() {
            return handler.handle(req);
        }
        let mut res = HandlerResponse::new(204);
        if entry.cors().is_none() {
            res.headers = entry.allow_headers();
        }
        res
    }
}
