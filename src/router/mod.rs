//! # Router Module
//!
//! Turns scoped route registrations into a method-aware, CORS-aware dispatch table.
//!
//! ## Overview
//!
//! - [`PatternRoute`] parses and composes `host/path` patterns, rejecting host
//!   conflicts and repeated wildcard names at build time.
//! - [`RouteEntry`] records the methods registered per composed pattern. `GET`
//!   implies `HEAD`, and every entry answers `OPTIONS`.
//! - [`RouterBuilder`] is the composition API (`use_middleware`, `with`, `group`,
//!   `route`, `mount`, per-method registration). For each route it also installs
//!   an automatic OPTIONS handler and a 404/405 fallback.
//! - [`Multiplexer`] is the final lookup; [`PatternMux`] is the in-process one.
//!
//! ## Example
//!
//! ```rust
//! use routemux::{HandlerRequest, HandlerResponse, RouteMethod, RouterBuilder, RouterOptions};
//!
//! # fn main() -> Result<(), routemux::RouterError> {
//! let root = RouterBuilder::new(RouterOptions::new());
//! let admin = root.group("/admin")?;
//! admin.get("/users", |_req: HandlerRequest| HandlerResponse::text(200, "users"))?;
//! let router = root.finalize()?;
//!
//! let res = router.dispatch(HandlerRequest::new(RouteMethod::Options, "/admin/users"));
//! assert_eq!(res.status, 204);
//! assert_eq!(res.get_header("Allow"), Some("GET, HEAD, OPTIONS"));
//! assert_eq!(res.get_header("Cache-Control"), Some("public, max-age=86400"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Lifecycle
//!
//! Registration is single-threaded and happens before serving. The finalized
//! [`Router`] is immutable, `Send + Sync`, and is itself a
//! [`Handler`](crate::handler::Handler), so it can be mounted into another tree.

mod builder;
mod core;
mod pattern;
mod route;

pub use builder::{Router, RouterBuilder, RouterOptions};
pub use core::{Multiplexer, PatternMux};
pub use pattern::PatternRoute;
pub use route::{
    method_not_allowed, not_found, RouteEntry, SharedRoute, DEFAULT_OPTIONS_MAX_AGE,
};
