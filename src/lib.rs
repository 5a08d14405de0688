//! # routemux
//!
//! **routemux** turns a tree of `host/path` patterns, per-scope middleware stacks
//! and per-route method registrations into a method-aware, CORS-aware dispatch
//! table on top of a pattern multiplexer.
//!
//! ## Overview
//!
//! - Scoped composition: [`RouterBuilder::group`], [`RouterBuilder::route`],
//!   [`RouterBuilder::with`], [`RouterBuilder::use_middleware`] and
//!   [`RouterBuilder::mount`].
//! - Derived behavior: registering a method on a pattern gives it an `OPTIONS`
//!   answer with an `Allow` header, and a 405 for every other method. Unknown
//!   paths get a 404. `GET` implies `HEAD`.
//! - CORS: a [`CorsPolicy`](middleware::CorsPolicy) attached through
//!   [`RouterOptions::with_cors`] answers preflights and decorates actual
//!   responses, including wildcard origins and credentialed requests.
//! - Build errors (host conflicts, repeated wildcard names, missing handlers,
//!   invalid methods) are returned as [`RouterError`] while the router is being
//!   built, never at request time.
//!
//! ## Architecture
//!
//! - **[`router`]** - pattern composition, route entries, the builder and the multiplexer
//! - **[`middleware`]** - middleware trait, CORS engine, access log, request spans, panic recovery
//! - **[`handler`]** - request/response values and the `Handler` trait
//! - **[`config`]** - YAML/JSON configuration with environment overrides
//! - **[`telemetry`]** - `tracing-subscriber` initialization
//!
//! ### Registration Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant App
//!     participant Builder as RouterBuilder
//!     participant Pattern as PatternRoute
//!     participant Entry as RouteEntry
//!     participant Mux as Multiplexer
//!
//!     App->>Builder: get("/user/{id}", handler)
//!     Builder->>Pattern: prefix.join("/user/{id}")
//!     Pattern-->>Builder: composed pattern or RouterError
//!     Builder->>Mux: register("/") 404 fallback (once per host)
//!     Builder->>Entry: create entry, register "OPTIONS /user/{id}"
//!     Builder->>Mux: register("/user/{id}") 405 fallback (once)
//!     Builder->>Entry: add_method(GET) adds GET, HEAD, OPTIONS
//!     Builder->>Mux: register("GET /user/{id}", cors + middleware + handler)
//!     App->>Builder: finalize()
//!     Builder-->>App: Router
//! ```
//!
//! ## Example
//!
//! ```rust
//! use routemux::middleware::{CorsPolicyBuilder, LoggingMiddleware};
//! use routemux::{HandlerRequest, HandlerResponse, RouteMethod, RouterBuilder, RouterOptions};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cors = CorsPolicyBuilder::new()
//!     .allowed_origins(&["https://app.example.com"])
//!     .build()?;
//! let mut root = RouterBuilder::new(RouterOptions::new().with_cors(cors));
//! root.use_middleware(LoggingMiddleware);
//! root.get("/health", |_req: HandlerRequest| HandlerResponse::text(200, "ok"))?;
//! let router = root.finalize()?;
//!
//! let preflight = HandlerRequest::new(RouteMethod::Options, "/health")
//!     .with_header("Origin", "https://app.example.com")
//!     .with_header("Access-Control-Request-Method", "GET");
//! let res = router.dispatch(preflight);
//! assert_eq!(res.status, 204);
//! assert_eq!(
//!     res.get_header("Access-Control-Allow-Origin"),
//!     Some("https://app.example.com")
//! );
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod handler;
pub mod ids;
pub mod method;
pub mod middleware;
pub mod router;
pub mod telemetry;

pub use config::{CorsConfig, RouterConfig};
pub use error::RouterError;
pub use handler::{BoxedHandler, Handler, HandlerRequest, HandlerResponse};
pub use method::RouteMethod;
pub use router::{PatternRoute, Router, RouterBuilder, RouterOptions};
