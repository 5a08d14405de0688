//! Router Builder: scopes, middleware stacks and route registration.
//!
//! All scopes derived from one root share a registration context (route entries,
//! installed fallbacks, the multiplexer). Registration is single-threaded and
//! must be complete before serving: [`RouterBuilder::finalize`] hands the
//! multiplexer to an immutable [`Router`] and every later registration fails
//! with [`RouterError::Finalized`].

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::{debug, info};

use super::core::{Multiplexer, PatternMux};
use super::pattern::PatternRoute;
use super::route::{
    self, FallbackHandler, OptionsHandler, RouteEntry, SharedRoute, DEFAULT_OPTIONS_MAX_AGE,
};
use crate::config::RouterConfig;
use crate::error::RouterError;
use crate::handler::{BoxedHandler, Handler, HandlerRequest, HandlerResponse};
use crate::method::RouteMethod;
use crate::middleware::{chain, wrap, CorsMiddleware, CorsPolicy, Middleware, SharedMiddleware};

/// Construction-time settings shared by every scope of a router.
#[derive(Clone)]
pub struct RouterOptions {
    not_found: BoxedHandler,
    method_not_allowed: BoxedHandler,
    options_max_age: u32,
    cors: Option<Arc<CorsPolicy>>,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            not_found: Arc::new(route::not_found),
            method_not_allowed: Arc::new(route::method_not_allowed),
            options_max_age: DEFAULT_OPTIONS_MAX_AGE,
            cors: None,
        }
    }
}

impl RouterOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Handler for requests no pattern accepts; `None` restores `404 not found`.
    #[must_use]
    pub fn with_not_found(mut self, handler: Option<BoxedHandler>) -> Self {
        self.not_found = handler.unwrap_or_else(|| Arc::new(route::not_found));
        self
    }

    /// Handler for a known pattern hit with an unlisted method; `None` restores
    /// `405 method not allowed`.
    #[must_use]
    pub fn with_method_not_allowed(mut self, handler: Option<BoxedHandler>) -> Self {
        self.method_not_allowed = handler.unwrap_or_else(|| Arc::new(route::method_not_allowed));
        self
    }

    /// `Cache-Control` lifetime of automatic OPTIONS and 405 responses; `0` omits it.
    #[must_use]
    pub fn with_options_max_age(mut self, seconds: u32) -> Self {
        self.options_max_age = seconds;
        self
    }

    /// Attach a CORS policy to every route registered through this router.
    #[must_use]
    pub fn with_cors(mut self, policy: CorsPolicy) -> Self {
        self.cors = Some(Arc::new(policy));
        self
    }

    /// Build options from deserialized configuration.
    ///
    /// # Errors
    ///
    /// [`RouterError::Cors`] when the CORS block does not compile.
    pub fn from_config(config: &RouterConfig) -> Result<Self, RouterError> {
        let mut options = Self::new().with_options_max_age(config.options_max_age);
        if let Some(cors) = &config.cors {
            options = options.with_cors(cors.to_builder().build()?);
        }
        Ok(options)
    }

    #[must_use]
    pub fn options_max_age(&self) -> u32 {
        self.options_max_age
    }

    #[must_use]
    pub fn cors(&self) -> Option<&Arc<CorsPolicy>> {
        self.cors.as_ref()
    }
}

/// State shared by every scope derived from one root.
struct Registry {
    /// Taken by `finalize`
    mux: Option<Box<dyn Multiplexer>>,
    routes: HashMap<String, SharedRoute>,
    fallbacks: HashSet<String>,
    mounts: HashSet<String>,
}

impl Registry {
    fn mux(&mut self) -> Result<&mut dyn Multiplexer, RouterError> {
        match self.mux.as_deref_mut() {
            Some(mux) => Ok(mux),
            None => Err(RouterError::Finalized),
        }
    }
}

/// One registration scope: a pattern prefix plus a middleware stack.
///
/// ```rust
/// use routemux::{HandlerRequest, HandlerResponse, RouteMethod, RouterBuilder, RouterOptions};
///
/// # fn main() -> Result<(), routemux::RouterError> {
/// let root = RouterBuilder::new(RouterOptions::new());
/// root.route("/user", |user| {
///     user.get("/{id}", |req: HandlerRequest| {
///         HandlerResponse::text(200, req.path_value("id").unwrap_or_default())
///     })?;
///     Ok(())
/// })?;
/// let router = root.finalize()?;
///
/// let res = router.dispatch(HandlerRequest::new(RouteMethod::Get, "/user/42"));
/// assert_eq!(res.body_text(), "42");
/// let res = router.dispatch(HandlerRequest::new(RouteMethod::Post, "/user/42"));
/// assert_eq!(res.status, 405);
/// assert_eq!(res.get_header("Allow"), Some("GET, HEAD, OPTIONS"));
/// # Ok(())
/// # }
/// ```
///
/// [`RouterBuilder::mount`] deliberately does not apply the scope's middleware to
/// the mounted handler, unlike [`RouterBuilder::group`] and [`RouterBuilder::route`].
#[derive(Clone)]
pub struct RouterBuilder {
    registry: Rc<RefCell<Registry>>,
    options: Arc<RouterOptions>,
    prefix: PatternRoute,
    middlewares: Vec<SharedMiddleware>,
}

impl RouterBuilder {
    /// Root scope over a fresh [`PatternMux`].
    #[must_use]
    pub fn new(options: RouterOptions) -> Self {
        Self::with_multiplexer(PatternMux::new(), options)
    }

    /// Root scope over a caller-provided multiplexer.
    pub fn with_multiplexer<M>(mux: M, options: RouterOptions) -> Self
    where
        M: Multiplexer + 'static,
    {
        Self {
            registry: Rc::new(RefCell::new(Registry {
                mux: Some(Box::new(mux)),
                routes: HashMap::new(),
                fallbacks: HashSet::new(),
                mounts: HashSet::new(),
            })),
            options: Arc::new(options),
            prefix: PatternRoute::default(),
            middlewares: Vec::new(),
        }
    }

    /// Pattern prefix of this scope
    #[must_use]
    pub fn prefix(&self) -> &PatternRoute {
        &self.prefix
    }

    /// Append a middleware to this scope. Routes registered earlier, and scopes
    /// derived earlier, keep the stack they were created with.
    pub fn use_middleware<M>(&mut self, middleware: M) -> &mut Self
    where
        M: Middleware + 'static,
    {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    /// A copy of this scope with one more middleware; this scope is unchanged.
    #[must_use]
    pub fn with<M>(&self, middleware: M) -> RouterBuilder
    where
        M: Middleware + 'static,
    {
        let mut scope = self.clone();
        scope.middlewares.push(Arc::new(middleware));
        scope
    }

    /// A nested scope under `pattern`, inheriting the current middleware stack.
    ///
    /// # Errors
    ///
    /// Host conflicts and repeated wildcard names, see [`PatternRoute::join`].
    pub fn group(&self, pattern: &str) -> Result<RouterBuilder, RouterError> {
        let mut scope = self.clone();
        scope.prefix = self.prefix.join(pattern)?;
        Ok(scope)
    }

    /// Like [`RouterBuilder::group`], then run `register` on the new scope.
    ///
    /// # Errors
    ///
    /// Composition errors, or whatever `register` returns.
    pub fn route<F>(&self, pattern: &str, register: F) -> Result<RouterBuilder, RouterError>
    where
        F: FnOnce(&mut RouterBuilder) -> Result<(), RouterError>,
    {
        let mut scope = self.group(pattern)?;
        register(&mut scope)?;
        Ok(scope)
    }

    /// Delegate everything under `pattern` to `handler`, typically another
    /// finalized [`Router`].
    ///
    /// The mount prefix is stripped from the request path before delegation and
    /// the absolute mount pattern is put on [`HandlerRequest::mount_pattern`], so
    /// routes inside report their full pattern. This scope's middleware is not
    /// applied.
    ///
    /// Mounting at a host root (`/` or `example.com/`) takes over that host's
    /// 404/405 fallback, before or after routes are registered there. Any other
    /// mount point conflicts with a route whose pattern is the same subtree.
    ///
    /// # Errors
    ///
    /// Composition errors, [`RouterError::Finalized`], or a multiplexer conflict
    /// (including a second mount at the same point).
    pub fn mount<H>(&self, pattern: &str, handler: H) -> Result<(), RouterError>
    where
        H: Handler + 'static,
    {
        let target = self.prefix.join(pattern)?;
        let mount_pattern = format!("{}{}", target.host(), target.trimmed_path());
        let key = format!("{mount_pattern}/");

        let mut registry = self.registry.borrow_mut();
        registry.mux()?;
        if registry.mounts.contains(&key) {
            return Err(RouterError::PatternConflict { pattern: key });
        }

        let mounted = Arc::new(MountHandler {
            strip: target.trimmed_path().to_string(),
            mount_pattern,
            inner: Arc::new(handler),
            not_found: Arc::clone(&self.options.not_found),
        });
        if key == target.host_root() {
            if registry.fallbacks.contains(&key) {
                registry.mux()?.replace(&key, mounted)?;
            } else {
                registry.mux()?.register(&key, mounted)?;
                registry.fallbacks.insert(key.clone());
            }
        } else {
            registry.mux()?.register(&key, mounted)?;
        }
        registry.mounts.insert(key.clone());
        debug!(pattern = %key, "Handler mounted");
        Ok(())
    }

    pub fn connect<H: Handler + 'static>(&self, pattern: &str, handler: H) -> Result<(), RouterError> {
        self.add_route(RouteMethod::Connect, pattern, Arc::new(handler))
    }

    pub fn delete<H: Handler + 'static>(&self, pattern: &str, handler: H) -> Result<(), RouterError> {
        self.add_route(RouteMethod::Delete, pattern, Arc::new(handler))
    }

    /// Registers `GET`; `HEAD` requests are served by the same handler.
    pub fn get<H: Handler + 'static>(&self, pattern: &str, handler: H) -> Result<(), RouterError> {
        self.add_route(RouteMethod::Get, pattern, Arc::new(handler))
    }

    pub fn head<H: Handler + 'static>(&self, pattern: &str, handler: H) -> Result<(), RouterError> {
        self.add_route(RouteMethod::Head, pattern, Arc::new(handler))
    }

    pub fn patch<H: Handler + 'static>(&self, pattern: &str, handler: H) -> Result<(), RouterError> {
        self.add_route(RouteMethod::Patch, pattern, Arc::new(handler))
    }

    pub fn post<H: Handler + 'static>(&self, pattern: &str, handler: H) -> Result<(), RouterError> {
        self.add_route(RouteMethod::Post, pattern, Arc::new(handler))
    }

    pub fn put<H: Handler + 'static>(&self, pattern: &str, handler: H) -> Result<(), RouterError> {
        self.add_route(RouteMethod::Put, pattern, Arc::new(handler))
    }

    pub fn trace<H: Handler + 'static>(&self, pattern: &str, handler: H) -> Result<(), RouterError> {
        self.add_route(RouteMethod::Trace, pattern, Arc::new(handler))
    }

    /// Replace the automatic OPTIONS response of `pattern`.
    ///
    /// The handler runs inside the entry's automatic OPTIONS chain, so CORS
    /// preflights are still answered first and the middleware is the one active
    /// when the entry was created.
    ///
    /// # Errors
    ///
    /// [`RouterError::PatternConflict`] when the entry already has an override,
    /// plus the usual composition errors.
    pub fn options<H: Handler + 'static>(&self, pattern: &str, handler: H) -> Result<(), RouterError> {
        let target = self.prefix.join(pattern)?;
        let key = target.to_string();
        let mut registry = self.registry.borrow_mut();
        registry.mux()?;

        self.ensure_fallback(&mut registry, &target.host_root())?;
        let entry = self.ensure_entry(&mut registry, &key)?;
        let current = entry.load_full();
        if current.options_override().is_some() {
            return Err(RouterError::PatternConflict {
                pattern: format!("OPTIONS {key}"),
            });
        }
        let mut updated = RouteEntry::clone(&current);
        updated.set_options_override(Arc::new(handler));
        entry.store(Arc::new(updated));
        debug!(pattern = %key, "OPTIONS handler overridden");
        Ok(())
    }

    /// Register a handler under an arbitrary method token. The token is
    /// upper-cased first, so `get` registers `GET` (and with it `HEAD`).
    ///
    /// # Errors
    ///
    /// [`RouterError::InvalidMethod`] for an empty token or `OPTIONS` (use
    /// [`RouterBuilder::options`]), plus composition and registration errors.
    pub fn method<H: Handler + 'static>(
        &self,
        method: &str,
        pattern: &str,
        handler: H,
    ) -> Result<(), RouterError> {
        self.handle(method, pattern, Some(Arc::new(handler)))
    }

    /// Register an optional, already shared handler under a method token; this is
    /// the entry point for handler tables built at runtime.
    ///
    /// # Errors
    ///
    /// [`RouterError::NilHandler`] when `handler` is `None`, otherwise as
    /// [`RouterBuilder::method`].
    pub fn handle(
        &self,
        method: &str,
        pattern: &str,
        handler: Option<BoxedHandler>,
    ) -> Result<(), RouterError> {
        let handler = handler.ok_or(RouterError::NilHandler)?;
        let method = RouteMethod::parse(&method.to_ascii_uppercase())?;
        if method == RouteMethod::Options {
            return Err(RouterError::InvalidMethod {
                method: method.to_string(),
            });
        }
        self.add_route(method, pattern, handler)
    }

    /// Methods recorded for a composed pattern, in `Allow` order.
    #[must_use]
    pub fn allowed_methods(&self, pattern: &str) -> Option<Vec<String>> {
        let registry = self.registry.borrow();
        let entry = registry.routes.get(pattern)?.load();
        Some(
            entry
                .allowed_methods()
                .iter()
                .map(|m| m.as_str().to_string())
                .collect(),
        )
    }

    /// Every pattern that has a route entry, sorted.
    #[must_use]
    pub fn route_patterns(&self) -> Vec<String> {
        let mut patterns: Vec<String> = self.registry.borrow().routes.keys().cloned().collect();
        patterns.sort();
        patterns
    }

    /// Stop accepting registrations and return the servable router.
    ///
    /// # Errors
    ///
    /// [`RouterError::Finalized`] if any scope of this tree was already finalized.
    pub fn finalize(&self) -> Result<Router, RouterError> {
        let mut registry = self.registry.borrow_mut();
        let mux = registry.mux.take().ok_or(RouterError::Finalized)?;
        let mux: Arc<dyn Multiplexer> = Arc::from(mux);
        info!(
            routes_count = registry.routes.len(),
            patterns_count = mux.patterns().len(),
            "Routing table finalized"
        );
        Ok(Router { mux })
    }

    fn add_route(
        &self,
        method: RouteMethod,
        pattern: &str,
        handler: BoxedHandler,
    ) -> Result<(), RouterError> {
        let target = self.prefix.join(pattern)?;
        let key = target.to_string();
        let mut registry = self.registry.borrow_mut();
        registry.mux()?;

        self.ensure_fallback(&mut registry, &target.host_root())?;
        let entry = self.ensure_entry(&mut registry, &key)?;

        // `/files/{path...}` also owns the `/files/` subtree root.
        let subtree = target.method_not_allowed_pattern();
        if subtree != key {
            let subtree_entry = self.ensure_entry(&mut registry, &subtree)?;
            add_method(&subtree_entry, &method);
        }
        self.ensure_fallback(&mut registry, &subtree)?;
        add_method(&entry, &method);

        let handler = Arc::new(MountPatternRewrite {
            method: method.clone(),
            pattern: target,
            next: self.decorate(handler, &entry),
        });
        let full = format!("{method} {key}");
        registry.mux()?.register(&full, handler)?;
        debug!(method = %method, pattern = %key, "Route registered");
        Ok(())
    }

    /// Route entry for `key`, created with its automatic OPTIONS handler on first use.
    fn ensure_entry(&self, registry: &mut Registry, key: &str) -> Result<SharedRoute, RouterError> {
        if let Some(entry) = registry.routes.get(key) {
            return Ok(Arc::clone(entry));
        }

        let mut created = RouteEntry::new(self.options.options_max_age, self.options.cors.clone());
        created.add_method(RouteMethod::Options);
        let entry: SharedRoute = Arc::new(ArcSwap::from_pointee(created));

        let options = Arc::new(OptionsHandler {
            entry: Arc::clone(&entry),
        });
        let handler = Arc::new(MountPatternRewrite {
            method: RouteMethod::Options,
            pattern: PatternRoute::parse(key)?,
            next: self.decorate(options, &entry),
        });
        registry.mux()?.register(&format!("OPTIONS {key}"), handler)?;
        registry.routes.insert(key.to_string(), Arc::clone(&entry));
        Ok(entry)
    }

    /// Any-method 404/405 handler for `key`, installed once.
    fn ensure_fallback(&self, registry: &mut Registry, key: &str) -> Result<(), RouterError> {
        if registry.fallbacks.contains(key) {
            return Ok(());
        }
        let entry = self.ensure_entry(registry, key)?;
        let fallback = Arc::new(FallbackHandler {
            entry: Arc::clone(&entry),
            not_found: Arc::clone(&self.options.not_found),
            method_not_allowed: Arc::clone(&self.options.method_not_allowed),
        });
        registry.mux()?.register(key, self.decorate(fallback, &entry))?;
        registry.fallbacks.insert(key.to_string());
        Ok(())
    }

    /// CORS innermost, then this scope's stack with the first middleware outermost.
    fn decorate(&self, handler: BoxedHandler, entry: &SharedRoute) -> BoxedHandler {
        let handler = match &self.options.cors {
            Some(policy) => wrap(
                Arc::new(CorsMiddleware::new(Arc::clone(policy), Arc::clone(entry))),
                handler,
            ),
            None => handler,
        };
        chain(&self.middlewares, handler)
    }
}

fn add_method(entry: &SharedRoute, method: &RouteMethod) {
    entry.rcu(|current| {
        let mut updated = RouteEntry::clone(current);
        updated.add_method(method.clone());
        updated
    });
}

/// Reports the absolute pattern when the router runs behind a mount point.
struct MountPatternRewrite {
    method: RouteMethod,
    pattern: PatternRoute,
    next: BoxedHandler,
}

impl Handler for MountPatternRewrite {
    fn handle(&self, mut req: HandlerRequest) -> HandlerResponse {
        if let Some(mount) = req.mount_pattern.as_deref() {
            let absolute = PatternRoute::parse(mount)
                .and_then(|prefix| prefix.join_route(&self.pattern))
                .map(|joined| joined.to_string())
                .unwrap_or_else(|_| format!("{mount}{}", self.pattern.path()));
            req.pattern = format!("{} {absolute}", self.method);
        }
        self.next.handle(req)
    }
}

/// Strips the mount prefix and delegates.
struct MountHandler {
    /// Path part of the mount prefix, without trailing slash
    strip: String,
    /// `host/path` of the mount point, relative to this router's root
    mount_pattern: String,
    inner: BoxedHandler,
    not_found: BoxedHandler,
}

impl Handler for MountHandler {
    fn handle(&self, mut req: HandlerRequest) -> HandlerResponse {
        let Some(rest) = strip_mount_prefix(&self.strip, &req.path) else {
            return self.not_found.handle(req);
        };
        req.path = rest;
        req.mount_pattern = Some(match req.mount_pattern.take() {
            Some(outer) => PatternRoute::parse(&outer)
                .and_then(|prefix| prefix.join(&self.mount_pattern))
                .map(|joined| joined.to_string())
                .unwrap_or_else(|_| format!("{outer}{}", self.mount_pattern)),
            None => self.mount_pattern.clone(),
        });
        self.inner.handle(req)
    }
}

/// Remove `prefix` from the front of `path` segment by segment; a `{name}`
/// segment in the prefix matches any non-empty segment.
pub(crate) fn strip_mount_prefix(prefix: &str, path: &str) -> Option<String> {
    let Some(segments) = prefix.strip_prefix('/') else {
        return Some(path.to_string());
    };

    let mut rest = path;
    for expected in segments.split('/') {
        let after_slash = rest.strip_prefix('/')?;
        let (segment, tail) = match after_slash.find('/') {
            Some(idx) => after_slash.split_at(idx),
            None => (after_slash, ""),
        };
        let wildcard = expected.starts_with('{') && expected.ends_with('}');
        if segment.is_empty() || (!wildcard && segment != expected) {
            return None;
        }
        rest = tail;
    }

    if rest.is_empty() {
        Some("/".to_string())
    } else {
        Some(rest.to_string())
    }
}

/// A finalized routing table. Cheap to clone and safe to share across threads.
#[derive(Clone)]
pub struct Router {
    mux: Arc<dyn Multiplexer>,
}

impl Router {
    /// Route one request through the table.
    #[inline]
    #[must_use]
    pub fn dispatch(&self, req: HandlerRequest) -> HandlerResponse {
        self.mux.dispatch(req)
    }

    /// Every key registered with the multiplexer, including the automatic
    /// OPTIONS and fallback patterns.
    #[must_use]
    pub fn patterns(&self) -> Vec<String> {
        self.mux.patterns()
    }
}

impl Handler for Router {
    #[inline]
    fn handle(&self, req: HandlerRequest) -> HandlerResponse {
        self.mux.dispatch(req)
    }
}
