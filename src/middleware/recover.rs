use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::error;

use super::Middleware;
use crate::handler::{Handler, HandlerRequest, HandlerResponse};

/// Turns a panicking handler into a `500 internal server error` response.
///
/// Needs the default `panic = "unwind"` strategy; with `abort` the process still
/// goes down.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecoverMiddleware;

impl Middleware for RecoverMiddleware {
    fn handle(&self, req: HandlerRequest, next: &dyn Handler) -> HandlerResponse {
        let method = req.method.clone();
        let path = req.path.clone();
        let pattern = req.pattern.clone();
        let request_id = req.request_id;

        match catch_unwind(AssertUnwindSafe(|| next.handle(req))) {
            Ok(res) => res,
            Err(payload) => {
                error!(
                    request_id = %request_id,
                    method = %method,
                    path = %path,
                    pattern = %pattern,
                    panic = %panic_message(payload.as_ref()),
                    "handler panicked"
                );
                HandlerResponse::text(500, "500 internal server error")
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
