use std::sync::Arc;

use crate::handler::{BoxedHandler, Handler, HandlerRequest, HandlerResponse};

/// Code that runs around a handler.
///
/// A middleware receives the request and the rest of the chain; it may change the
/// request, answer without calling `next`, or decorate the response `next` returns.
pub trait Middleware: Send + Sync {
    fn handle(&self, req: HandlerRequest, next: &dyn Handler) -> HandlerResponse;
}

impl<F> Middleware for F
where
    F: Fn(HandlerRequest, &dyn Handler) -> HandlerResponse + Send + Sync,
{
    #[inline]
    fn handle(&self, req: HandlerRequest, next: &dyn Handler) -> HandlerResponse {
        self(req, next)
    }
}

/// Shared middleware as stored in a scope's stack.
pub type SharedMiddleware = Arc<dyn Middleware>;

struct Wrapped {
    middleware: SharedMiddleware,
    next: BoxedHandler,
}

impl Handler for Wrapped {
    #[inline]
    fn handle(&self, req: HandlerRequest) -> HandlerResponse {
        self.middleware.handle(req, self.next.as_ref())
    }
}

/// Put `middleware` in front of `next`.
#[must_use]
pub fn wrap(middleware: SharedMiddleware, next: BoxedHandler) -> BoxedHandler {
    Arc::new(Wrapped { middleware, next })
}

/// Wrap `handler` in a whole stack; the first middleware ends up outermost.
#[must_use]
pub fn chain(middlewares: &[SharedMiddleware], handler: BoxedHandler) -> BoxedHandler {
    middlewares
        .iter()
        .rev()
        .fold(handler, |next, middleware| wrap(Arc::clone(middleware), next))
}
