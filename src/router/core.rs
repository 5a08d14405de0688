//! The multiplexer contract and a reference implementation.
//!
//! The router builder only needs two things from the component that performs the
//! final request-to-handler lookup: `register("METHOD host/path", handler)` at build
//! time and `dispatch(request)` at serve time. [`PatternMux`] provides both in
//! process, so a built router can be exercised without any server around it.

use std::cmp::Ordering;
use std::sync::Arc;

use tracing::debug;

use crate::error::RouterError;
use crate::handler::{BoxedHandler, HandlerRequest, HandlerResponse, ParamVec};
use crate::method::RouteMethod;

/// Final string-to-handler lookup used by the router builder.
pub trait Multiplexer: Send + Sync {
    /// Register `handler` under `pattern` (`"[METHOD ]host/path"`; no method means any).
    ///
    /// # Errors
    ///
    /// Implementations reject keys they cannot parse or already hold.
    fn register(&mut self, pattern: &str, handler: BoxedHandler) -> Result<(), RouterError>;

    /// Swap the handler already registered under `pattern`, registering it if absent.
    ///
    /// # Errors
    ///
    /// The default reports [`RouterError::PatternConflict`]; implementations that
    /// can swap handlers override it.
    fn replace(&mut self, pattern: &str, handler: BoxedHandler) -> Result<(), RouterError> {
        let _ = handler;
        Err(RouterError::PatternConflict {
            pattern: pattern.to_string(),
        })
    }

    /// Route a request. Implementations set [`HandlerRequest::pattern`] to the key
    /// that matched and append the wildcard values to `path_params`.
    fn dispatch(&self, req: HandlerRequest) -> HandlerResponse;

    /// Registered keys, in registration order.
    fn patterns(&self) -> Vec<String>;
}

#[derive(Debug, Clone)]
enum Segment {
    Literal(String),
    Param(Arc<str>),
}

/// How a pattern treats what follows its last fixed segment.
#[derive(Debug, Clone)]
enum Tail {
    /// `/a/b`: nothing
    Exact,
    /// `/a/{$}`: exactly a trailing slash
    EndSlash,
    /// `/a/{rest...}`: anything, captured
    Rest(Arc<str>),
    /// `/a/`: anything
    Subtree,
}

impl Tail {
    fn rank(&self) -> u8 {
        match self {
            Tail::Exact | Tail::EndSlash => 2,
            Tail::Rest(_) => 1,
            Tail::Subtree => 0,
        }
    }
}

/// Ordering key between patterns that match the same request; greater wins.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Specificity {
    host: bool,
    segments: Vec<u8>,
    tail: u8,
    method: u8,
}

struct MuxRoute {
    key: String,
    method: Option<RouteMethod>,
    host: String,
    segments: Vec<Segment>,
    tail: Tail,
    handler: BoxedHandler,
}

impl MuxRoute {
    fn parse(key: &str, handler: BoxedHandler) -> Result<Self, RouterError> {
        let (method, rest) = match key.split_once(' ') {
            Some((method, rest)) => (Some(RouteMethod::parse(method)?), rest.trim_start()),
            None => (None, key),
        };
        let (host, path) = match rest.find('/') {
            Some(idx) => rest.split_at(idx),
            None => (rest, "/"),
        };

        let mut raw: Vec<&str> = path[1..].split('/').collect();
        let tail = match raw.last().copied() {
            Some("") => {
                raw.pop();
                Tail::Subtree
            }
            Some("{$}") => {
                raw.pop();
                Tail::EndSlash
            }
            Some(last) if last.starts_with('{') && last.ends_with("...}") => {
                raw.pop();
                Tail::Rest(Arc::from(&last[1..last.len() - 4]))
            }
            _ => Tail::Exact,
        };
        let segments = raw
            .into_iter()
            .map(|s| match s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                Some(name) => Segment::Param(Arc::from(name)),
                None => Segment::Literal(s.to_string()),
            })
            .collect();

        Ok(Self {
            key: key.to_string(),
            method,
            host: host.to_string(),
            segments,
            tail,
            handler,
        })
    }

    fn method_rank(&self, method: &RouteMethod) -> Option<u8> {
        match &self.method {
            None => Some(0),
            Some(m) if m == method => Some(2),
            Some(m) if *m == RouteMethod::Get && *method == RouteMethod::Head => Some(1),
            Some(_) => None,
        }
    }

    fn matches(&self, req: &HandlerRequest, path: &[&str]) -> Option<Specificity> {
        let method = self.method_rank(&req.method)?;
        if !self.host.is_empty() && !self.host.eq_ignore_ascii_case(&req.host) {
            return None;
        }

        let fixed = self.segments.len();
        let length_ok = match self.tail {
            Tail::Exact => path.len() == fixed,
            Tail::EndSlash => path.len() == fixed + 1 && path[fixed].is_empty(),
            Tail::Rest(_) | Tail::Subtree => path.len() > fixed,
        };
        if !length_ok {
            return None;
        }

        let mut ranks = Vec::with_capacity(fixed);
        for (segment, value) in self.segments.iter().zip(path) {
            match segment {
                Segment::Literal(lit) if lit == value => ranks.push(2),
                Segment::Param(_) if !value.is_empty() => ranks.push(1),
                _ => return None,
            }
        }

        Some(Specificity {
            host: !self.host.is_empty(),
            segments: ranks,
            tail: self.tail.rank(),
            method,
        })
    }

    fn capture(&self, path: &[&str], params: &mut ParamVec) {
        for (segment, value) in self.segments.iter().zip(path) {
            if let Segment::Param(name) = segment {
                params.push((Arc::clone(name), (*value).to_string()));
            }
        }
        if let Tail::Rest(name) = &self.tail {
            params.push((Arc::clone(name), path[self.segments.len()..].join("/")));
        }
    }
}

/// In-process multiplexer over `"[METHOD ]host/path"` keys.
///
/// Wildcard syntax: `{name}` matches one non-empty segment, `{name...}` the rest
/// of the path (possibly empty), `{$}` only the trailing slash; a path ending in
/// `/` matches its whole subtree. When several keys match, a host-specific key
/// beats a hostless one, then segments are compared left to right (literal beats
/// wildcard, longer beats shorter), exact leaves beat subtrees, and finally a
/// method-specific key beats an any-method one. `GET` keys also serve `HEAD`.
///
/// Lookup is a linear scan over the registered keys.
#[derive(Default)]
pub struct PatternMux {
    routes: Vec<MuxRoute>,
}

impl PatternMux {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl Multiplexer for PatternMux {
    fn register(&mut self, pattern: &str, handler: BoxedHandler) -> Result<(), RouterError> {
        if self.routes.iter().any(|r| r.key == pattern) {
            return Err(RouterError::PatternConflict {
                pattern: pattern.to_string(),
            });
        }
        let route = MuxRoute::parse(pattern, handler)?;
        debug!(pattern = %pattern, "Pattern registered");
        self.routes.push(route);
        Ok(())
    }

    fn replace(&mut self, pattern: &str, handler: BoxedHandler) -> Result<(), RouterError> {
        let route = MuxRoute::parse(pattern, handler)?;
        match self.routes.iter_mut().find(|r| r.key == pattern) {
            Some(existing) => *existing = route,
            None => self.routes.push(route),
        }
        debug!(pattern = %pattern, "Pattern replaced");
        Ok(())
    }

    fn dispatch(&self, mut req: HandlerRequest) -> HandlerResponse {
        let Some(rest) = req.path.strip_prefix('/') else {
            return HandlerResponse::text(404, "404 page not found");
        };
        let path: Vec<&str> = rest.split('/').collect();

        let mut best: Option<(&MuxRoute, Specificity)> = None;
        for route in &self.routes {
            let Some(rank) = route.matches(&req, &path) else {
                continue;
            };
            let better = match &best {
                Some((_, current)) => rank.cmp(current) == Ordering::Greater,
                None => true,
            };
            if better {
                best = Some((route, rank));
            }
        }

        let Some((route, _)) = best else {
            debug!(method = %req.method, path = %req.path, "No pattern matched");
            return HandlerResponse::text(404, "404 page not found");
        };

        let mut params = ParamVec::new();
        route.capture(&path, &mut params);
        drop(path);
        req.path_params.extend(params);
        req.pattern.clone_from(&route.key);
        route.handler.handle(req)
    }

    fn patterns(&self) -> Vec<String> {
        self.routes.iter().map(|r| r.key.clone()).collect()
    }
}
