//! Middleware: code wrapped around route handlers.
//!
//! Scope middleware is applied by the router builder in registration order, the
//! first one registered being the outermost. [`CorsMiddleware`] is installed by the
//! builder itself, innermost, on routes whose configuration carries a policy.

mod core;
pub mod cors;
mod logging;
mod recover;
mod tracing;

pub use core::{chain, wrap, Middleware, SharedMiddleware};
pub use cors::{CorsConfigError, CorsMiddleware, CorsPolicy, CorsPolicyBuilder};
pub use logging::{real_ip, round_elapsed, LoggingMiddleware};
pub use recover::RecoverMiddleware;
pub use tracing::TracingMiddleware;
