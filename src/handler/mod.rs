//! Request and response values exchanged between the multiplexer, middleware and
//! handlers, and the [`Handler`] trait every piece of the chain implements.
//!
//! Route defaults, CORS-wrapped handlers, mounted routers and plain closures are all
//! `Handler`s, so they compose freely:
//!
//! ```rust
//! use routemux::handler::{Handler, HandlerRequest, HandlerResponse};
//! use routemux::RouteMethod;
//!
//! let hello = |req: HandlerRequest| HandlerResponse::text(200, &format!("hello {}", req.path));
//! let res = hello.handle(HandlerRequest::new(RouteMethod::Get, "/world"));
//! assert_eq!(res.body_text(), "hello /world");
//! ```

pub mod header;

use std::sync::Arc;

use serde_json::Value;
use smallvec::SmallVec;

use crate::ids::RequestId;
use crate::method::RouteMethod;

pub use header::canonical_header_key;

/// Maximum inline headers before heap allocation
pub const MAX_INLINE_HEADERS: usize = 16;

/// Maximum inline path parameters before heap allocation
pub const MAX_INLINE_PARAMS: usize = 8;

/// Header storage; names are shared `Arc<str>` because the same few names repeat
/// on every request.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Path parameters extracted by the multiplexer, in match order.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Something that turns a request into a response.
pub trait Handler: Send + Sync {
    fn handle(&self, req: HandlerRequest) -> HandlerResponse;
}

impl<F> Handler for F
where
    F: Fn(HandlerRequest) -> HandlerResponse + Send + Sync,
{
    #[inline]
    fn handle(&self, req: HandlerRequest) -> HandlerResponse {
        self(req)
    }
}

/// Shared, type-erased handler as stored in the multiplexer.
pub type BoxedHandler = Arc<dyn Handler>;

/// An incoming request as seen by the routing layer.
#[derive(Debug, Clone)]
pub struct HandlerRequest {
    /// Correlation id, replaced by the logging middleware when the client sent one
    pub request_id: RequestId,
    pub method: RouteMethod,
    /// Host the request was addressed to, without port
    pub host: String,
    /// Request path, relative to the enclosing mount point if any
    pub path: String,
    /// Pattern key that matched, e.g. `GET /user/{id}`; empty until dispatched
    pub pattern: String,
    /// Path parameters (stack-allocated for ≤8 params)
    pub path_params: ParamVec,
    /// HTTP headers (stack-allocated for ≤16 headers)
    pub headers: HeaderVec,
    pub body: Vec<u8>,
    /// Peer address as reported by the transport, `ip:port`
    pub remote_addr: Option<String>,
    /// Absolute pattern of the mount point this request was delegated through
    pub mount_pattern: Option<String>,
}

impl HandlerRequest {
    /// Create a request with no headers, host or body.
    #[must_use]
    pub fn new(method: RouteMethod, path: &str) -> Self {
        Self {
            request_id: RequestId::new(),
            method,
            host: String::new(),
            path: path.to_string(),
            pattern: String::new(),
            path_params: ParamVec::new(),
            headers: HeaderVec::new(),
            body: Vec::new(),
            remote_addr: None,
            mount_pattern: None,
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((Arc::from(name), value.to_string()));
        self
    }

    /// Set the target host; a `:port` suffix is dropped.
    #[must_use]
    pub fn with_host(mut self, host: &str) -> Self {
        self.host = strip_port(host).to_string();
        self
    }

    #[must_use]
    pub fn with_remote_addr(mut self, addr: &str) -> Self {
        self.remote_addr = Some(addr.to_string());
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Get a path parameter by name
    ///
    /// Uses "last write wins" semantics: when a mounted router matches a parameter
    /// with the same name as its mount point, the inner value is returned.
    #[inline]
    #[must_use]
    pub fn path_value(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Get a header by name (case-insensitive per RFC 7230)
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Every value of a header that may be repeated
    pub fn get_header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Response produced by a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerResponse {
    /// HTTP status code (200, 404, 500, etc.)
    pub status: u16,
    /// HTTP response headers (stack-allocated for ≤16 headers)
    pub headers: HeaderVec,
    pub body: Vec<u8>,
}

impl HandlerResponse {
    /// Empty response with the given status
    #[must_use]
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HeaderVec::new(),
            body: Vec::new(),
        }
    }

    /// Plain-text response
    #[must_use]
    pub fn text(status: u16, body: &str) -> Self {
        let mut res = Self::new(status);
        res.set_header(header::CONTENT_TYPE, "text/plain; charset=utf-8");
        res.body = body.as_bytes().to_vec();
        res
    }

    /// JSON response
    #[must_use]
    pub fn json(status: u16, body: &Value) -> Self {
        let mut res = Self::new(status);
        res.set_header(header::CONTENT_TYPE, "application/json");
        res.body = body.to_string().into_bytes();
        res
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.add_header(name, value);
        self
    }

    /// Get the first value of a header (case-insensitive)
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Every value of a header, in insertion order
    #[must_use]
    pub fn get_header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Replace every value of a header with a single one
    pub fn set_header(&mut self, name: &str, value: &str) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value.to_string()));
    }

    /// Append a value, keeping existing ones
    pub fn add_header(&mut self, name: &str, value: &str) {
        self.headers.push((Arc::from(name), value.to_string()));
    }

    /// Body decoded as UTF-8, lossily
    #[must_use]
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

fn strip_port(host: &str) -> &str {
    // Bracketed IPv6 literals keep their colons.
    if let Some(rest) = host.strip_prefix('[') {
        return match rest.find(']') {
            Some(end) => &host[..end + 2],
            None => host,
        };
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.bytes().all(|b| b.is_ascii_digit()) => name,
        _ => host,
    }
}
