use std::sync::Arc;

use crate::handler::{canonical_header_key, HandlerRequest};
use crate::router::DEFAULT_OPTIONS_MAX_AGE;

use super::{CorsConfigError, CorsPolicy, OriginPredicate, WildcardOrigin};

/// Builder for [`CorsPolicy`] with a fluent API
///
/// # Example
///
/// ```rust
/// use routemux::middleware::CorsPolicyBuilder;
///
/// let policy = CorsPolicyBuilder::new()
///     .allowed_origins(&["https://example.com", "https://*.example.org"])
///     .allowed_headers(&["Content-Type", "Authorization"])
///     .exposed_headers(&["X-Total-Count"])
///     .allow_credentials(true)
///     .max_age(3600)
///     .build()
///     .expect("valid CORS configuration");
/// assert!(!policy.allows_all_origins());
/// ```
pub struct CorsPolicyBuilder {
    allowed_origins: Vec<String>,
    allow_origin_fn: Option<OriginPredicate>,
    allowed_headers: Vec<String>,
    exposed_headers: Vec<String>,
    allow_credentials: bool,
    max_age: u32,
}

impl CorsPolicyBuilder {
    /// Create a builder that allows every origin and every header, without
    /// credentials, caching preflights for one day.
    #[must_use]
    pub fn new() -> Self {
        Self {
            allowed_origins: Vec::new(),
            allow_origin_fn: None,
            allowed_headers: Vec::new(),
            exposed_headers: Vec::new(),
            allow_credentials: false,
            max_age: DEFAULT_OPTIONS_MAX_AGE,
        }
    }

    /// Set allowed origins
    ///
    /// # Arguments
    ///
    /// * `origins` - Exact origins (`https://example.com`), origins with one
    ///   wildcard (`https://*.example.com`), or `*` for all origins. An empty list
    ///   allows every origin. Matching is case-insensitive.
    #[must_use]
    pub fn allowed_origins(mut self, origins: &[&str]) -> Self {
        self.allowed_origins = origins.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Decide origins with a function instead of the allow-list
    ///
    /// When set, the allow-list is ignored entirely. The function receives the
    /// request and the raw `Origin` header value.
    #[must_use]
    pub fn allow_origin_fn<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&HandlerRequest, &str) -> bool + Send + Sync + 'static,
    {
        self.allow_origin_fn = Some(Arc::new(predicate));
        self
    }

    /// Set allowed request headers
    ///
    /// An empty list or one containing `*` allows every header.
    #[must_use]
    pub fn allowed_headers(mut self, headers: &[&str]) -> Self {
        self.allowed_headers = headers.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Set headers exposed to scripts on actual (non-preflight) responses
    #[must_use]
    pub fn exposed_headers(mut self, headers: &[&str]) -> Self {
        self.exposed_headers = headers.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Enable or disable credentials
    ///
    /// With credentials the policy never answers with a literal `*`; the request
    /// origin and the requested headers are echoed instead.
    #[must_use]
    pub fn allow_credentials(mut self, allow: bool) -> Self {
        self.allow_credentials = allow;
        self
    }

    /// Preflight cache lifetime in seconds; `0` omits `Access-Control-Max-Age`.
    #[must_use]
    pub fn max_age(mut self, seconds: u32) -> Self {
        self.max_age = seconds;
        self
    }

    /// Compile the configuration into a policy
    ///
    /// Origins are lower-cased and de-duplicated; header names are put in
    /// canonical form and de-duplicated. Blank entries are skipped.
    ///
    /// # Errors
    ///
    /// - [`CorsConfigError::InvalidOriginPattern`] for an origin with more than one `*`
    /// - [`CorsConfigError::InvalidHeaderName`] for a header that is not an HTTP token
    pub fn build(self) -> Result<CorsPolicy, CorsConfigError> {
        let mut policy = CorsPolicy {
            allowed_origins_all: false,
            allowed_origins: Vec::new(),
            wildcard_origins: Vec::new(),
            allow_origin_fn: None,
            allowed_headers_all: false,
            allowed_headers: Vec::new(),
            exposed_headers: compile_headers(&self.exposed_headers)?,
            allow_credentials: self.allow_credentials,
            max_age: self.max_age,
        };

        if let Some(predicate) = self.allow_origin_fn {
            policy.allow_origin_fn = Some(predicate);
        } else if self.allowed_origins.is_empty() {
            policy.allowed_origins_all = true;
        } else {
            for origin in &self.allowed_origins {
                let origin = origin.trim().to_ascii_lowercase();
                if origin.is_empty() {
                    continue;
                }
                if origin == "*" {
                    policy.allowed_origins_all = true;
                    policy.allowed_origins.clear();
                    policy.wildcard_origins.clear();
                    break;
                }
                match origin.matches('*').count() {
                    0 => {
                        if !policy.allowed_origins.contains(&origin) {
                            policy.allowed_origins.push(origin);
                        }
                    }
                    1 => {
                        let wildcard = WildcardOrigin::parse(&origin);
                        if !policy.wildcard_origins.contains(&wildcard) {
                            policy.wildcard_origins.push(wildcard);
                        }
                    }
                    _ => return Err(CorsConfigError::InvalidOriginPattern { origin }),
                }
            }
        }

        if self.allowed_headers.iter().any(|h| h.trim() == "*") {
            policy.allowed_headers_all = true;
        } else {
            policy.allowed_headers = compile_headers(&self.allowed_headers)?;
            policy.allowed_headers_all = policy.allowed_headers.is_empty();
        }

        Ok(policy)
    }
}

impl Default for CorsPolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn compile_headers(headers: &[String]) -> Result<Vec<String>, CorsConfigError> {
    let mut out: Vec<String> = Vec::with_capacity(headers.len());
    for header in headers {
        let header = header.trim();
        if header.is_empty() {
            continue;
        }
        if http::HeaderName::from_bytes(header.as_bytes()).is_err() {
            return Err(CorsConfigError::InvalidHeaderName {
                header: header.to_string(),
            });
        }
        let header = canonical_header_key(header);
        if !out.contains(&header) {
            out.push(header);
        }
    }
    Ok(out)
}
