use std::sync::Arc;

use tracing::warn;

use crate::handler::{header, Handler, HandlerRequest, HandlerResponse, HeaderVec};
use crate::method::RouteMethod;
use crate::middleware::Middleware;
use crate::router::SharedRoute;

use super::CorsPolicy;

/// CORS handling for one route entry
///
/// Installed by the router builder around every handler registered on an entry
/// that carries a policy. Preflights from allowed origins are answered here and
/// never reach the wrapped handler.
pub struct CorsMiddleware {
    policy: Arc<CorsPolicy>,
    entry: SharedRoute,
}

impl CorsMiddleware {
    #[must_use]
    pub fn new(policy: Arc<CorsPolicy>, entry: SharedRoute) -> Self {
        Self { policy, entry }
    }
}

impl Middleware for CorsMiddleware {
    fn handle(&self, req: HandlerRequest, next: &dyn Handler) -> HandlerResponse {
        let is_options = req.method == RouteMethod::Options;

        let mut headers = HeaderVec::new();
        headers.push((Arc::from(header::VARY), header::ORIGIN.to_string()));
        if is_options {
            headers.push((
                Arc::from(header::VARY),
                header::ACCESS_CONTROL_REQUEST_METHOD.to_string(),
            ));
            headers.push((
                Arc::from(header::VARY),
                header::ACCESS_CONTROL_REQUEST_HEADERS.to_string(),
            ));
        }

        let entry = self.entry.load();
        let origin = req
            .get_header(header::ORIGIN)
            .filter(|o| !o.is_empty())
            .map(str::to_string);
        let allowed_origin = match origin {
            Some(origin) if self.policy.is_origin_allowed(&req, &origin) => Some(origin),
            Some(origin) => {
                warn!(origin = %origin, path = %req.path, "CORS: origin not allowed");
                None
            }
            None => None,
        };

        let Some(origin) = allowed_origin else {
            if is_options || (entry.has_handlers() && !entry.allows(&req.method)) {
                headers.extend(entry.allow_headers());
            }
            return decorate(next.handle(req), headers);
        };

        self.policy.push_origin_headers(&mut headers, &origin);
        if is_options {
            return self.policy.preflight(&req, &entry, headers);
        }

        if !self.policy.exposed_headers.is_empty() {
            headers.push((
                Arc::from(header::ACCESS_CONTROL_EXPOSE_HEADERS),
                self.policy.exposed_headers.join(", "),
            ));
        }
        decorate(next.handle(req), headers)
    }
}

/// Put the CORS headers in front of the handler's own. `Vary` accumulates; any
/// other header the handler already set is left alone.
fn decorate(mut res: HandlerResponse, headers: HeaderVec) -> HandlerResponse {
    let mut merged = HeaderVec::new();
    for (name, value) in headers {
        if name.eq_ignore_ascii_case(header::VARY) || res.get_header(&name).is_none() {
            merged.push((name, value));
        }
    }
    merged.extend(res.headers.drain(..));
    res.headers = merged;
    res
}
