use tracing::{field, info_span};

use super::logging::route_of;
use super::Middleware;
use crate::handler::{Handler, HandlerRequest, HandlerResponse};

/// Runs the rest of the chain inside an `http_request` span.
///
/// The span carries `http.route` (the path part of the matched pattern, absolute
/// behind a mount), `http.request.method`, `log.id` and, once the handler has
/// returned, `http.response.status_code`. `log.id` is the request id, so this
/// goes after [`LoggingMiddleware`](super::LoggingMiddleware) and before
/// [`RecoverMiddleware`](super::RecoverMiddleware).
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMiddleware;

impl Middleware for TracingMiddleware {
    fn handle(&self, req: HandlerRequest, next: &dyn Handler) -> HandlerResponse {
        let span = info_span!(
            "http_request",
            http.route = %route_of(&req.pattern),
            http.request.method = %req.method,
            log.id = %req.request_id,
            http.response.status_code = field::Empty,
        );
        let res = span.in_scope(|| next.handle(req));
        span.record("http.response.status_code", res.status);
        res
    }
}
