use std::fmt;

/// CORS configuration error
///
/// Returned by `CorsPolicyBuilder::build()` when an allow-list entry cannot be
/// compiled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsConfigError {
    /// Origin pattern with more than one `*`
    ///
    /// Only a single wildcard is supported (`https://*.example.com`); the part
    /// before it becomes the prefix and the part after it the suffix.
    InvalidOriginPattern {
        /// The rejected origin pattern
        origin: String,
    },
    /// Header name that is not a valid HTTP token
    InvalidHeaderName {
        /// The rejected header name
        header: String,
    },
}

impl fmt::Display for CorsConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorsConfigError::InvalidOriginPattern { origin } => {
                write!(
                    f,
                    "CORS configuration error: origin pattern '{origin}' has more than one '*'. \
                    Use a single wildcard, e.g. https://*.example.com"
                )
            }
            CorsConfigError::InvalidHeaderName { header } => {
                write!(
                    f,
                    "CORS configuration error: '{header}' is not a valid header name"
                )
            }
        }
    }
}

impl std::error::Error for CorsConfigError {}
