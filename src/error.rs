//! Construction-time errors raised while composing patterns and registering routes.
//!
//! Request-time problems (unknown path, wrong method, rejected preflight) never
//! surface here; they are answered with ordinary HTTP responses.

use std::fmt;

use crate::middleware::cors::CorsConfigError;

/// Error returned by every composition and registration call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterError {
    /// Two non-empty hosts that differ were composed together.
    HostConflict {
        /// Host of the enclosing pattern
        prefix: String,
        /// Host of the pattern being joined onto it
        suffix: String,
    },
    /// A wildcard name appears twice in one composed pattern.
    DuplicateWildcard {
        /// The repeated wildcard name
        name: String,
    },
    /// A registration was given no handler.
    NilHandler,
    /// The method token is empty, or is `OPTIONS` passed through the generic entry point.
    InvalidMethod {
        /// The rejected token (empty when none was given)
        method: String,
    },
    /// The exact same pattern key was registered twice.
    PatternConflict {
        /// The conflicting `"METHOD host/path"` key
        pattern: String,
    },
    /// Registration was attempted after the router was finalized.
    Finalized,
    /// The CORS block of the configuration is invalid.
    Cors(CorsConfigError),
}

impl fmt::Display for RouterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouterError::HostConflict { prefix, suffix } => {
                write!(f, "host {prefix} conflicts with host {suffix}")
            }
            RouterError::DuplicateWildcard { name } => {
                write!(f, "duplicate wildcard name {name:?}")
            }
            RouterError::NilHandler => write!(f, "nil handler"),
            RouterError::InvalidMethod { method } if method.is_empty() => {
                write!(f, "method not specified")
            }
            RouterError::InvalidMethod { method } => {
                write!(f, "method {method} cannot be registered directly")
            }
            RouterError::PatternConflict { pattern } => {
                write!(f, "pattern {pattern:?} is already registered")
            }
            RouterError::Finalized => {
                write!(f, "router is finalized, no further registrations are accepted")
            }
            RouterError::Cors(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for RouterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RouterError::Cors(err) => Some(err),
            _ => None,
        }
    }
}

impl From<CorsConfigError> for RouterError {
    fn from(err: CorsConfigError) -> Self {
        RouterError::Cors(err)
    }
}
