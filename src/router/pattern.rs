//! Parsing and composition of `host/path` patterns.
//!
//! A pattern is split at its first `/` into a host (possibly empty) and a path.
//! Scopes compose their patterns with [`PatternRoute::join`], which is where host
//! conflicts and repeated wildcard names are detected, long before any request
//! is served.

use std::collections::BTreeSet;
use std::fmt;

use crate::error::RouterError;

/// A parsed, immutable `host/path` pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternRoute {
    host: String,
    path: String,
    end_slash: bool,
    multi_name: Option<String>,
    wildcards: BTreeSet<String>,
}

impl Default for PatternRoute {
    /// The root pattern `/`.
    fn default() -> Self {
        Self {
            host: String::new(),
            path: "/".to_string(),
            end_slash: true,
            multi_name: None,
            wildcards: BTreeSet::new(),
        }
    }
}

impl PatternRoute {
    /// Parse a pattern such as `example.com/user/{id}` or `/files/{path...}`.
    ///
    /// An empty pattern is the root `/`; a bare host (`example.com`) denotes that
    /// host's root (`example.com/`).
    ///
    /// # Errors
    ///
    /// [`RouterError::DuplicateWildcard`] when one wildcard name is used twice.
    pub fn parse(pattern: &str) -> Result<Self, RouterError> {
        let (host, path) = match pattern.find('/') {
            Some(idx) => pattern.split_at(idx),
            None => (pattern, "/"),
        };

        let mut wildcards = BTreeSet::new();
        let mut multi_name = None;
        for segment in path.split('/') {
            let Some(name) = segment
                .strip_prefix('{')
                .and_then(|s| s.strip_suffix('}'))
            else {
                continue;
            };
            let name = match name.strip_suffix("...") {
                Some(rest) => {
                    if !rest.is_empty() {
                        multi_name = Some(rest.to_string());
                    }
                    rest
                }
                None => name,
            };
            // `{$}` anchors the match and binds nothing.
            if name.is_empty() || name == "$" {
                continue;
            }
            if !wildcards.insert(name.to_string()) {
                return Err(RouterError::DuplicateWildcard {
                    name: name.to_string(),
                });
            }
        }

        Ok(Self {
            host: host.to_string(),
            path: path.to_string(),
            end_slash: path.ends_with('/'),
            multi_name,
            wildcards,
        })
    }

    /// Parse `suffix` and compose it under this pattern.
    ///
    /// # Errors
    ///
    /// See [`PatternRoute::join_route`].
    pub fn join(&self, suffix: &str) -> Result<Self, RouterError> {
        self.join_route(&Self::parse(suffix)?)
    }

    /// Compose `suffix` under this pattern.
    ///
    /// The suffix host wins when both are set and equal; the path is the prefix
    /// path without its trailing slash followed by the suffix path. Joining a
    /// non-root prefix with a bare `/` yields the prefix as an exact leaf, so
    /// `/admin` + `/` stays `/admin` instead of becoming the `/admin/` subtree.
    ///
    /// # Errors
    ///
    /// - [`RouterError::HostConflict`] when both hosts are set and differ
    /// - [`RouterError::DuplicateWildcard`] when both sides bind the same name
    pub fn join_route(&self, suffix: &PatternRoute) -> Result<Self, RouterError> {
        let host = if suffix.host.is_empty() {
            self.host.clone()
        } else if self.host.is_empty() || self.host == suffix.host {
            suffix.host.clone()
        } else {
            return Err(RouterError::HostConflict {
                prefix: self.host.clone(),
                suffix: suffix.host.clone(),
            });
        };

        let mut wildcards = self.wildcards.clone();
        for name in &suffix.wildcards {
            if !wildcards.insert(name.clone()) {
                return Err(RouterError::DuplicateWildcard { name: name.clone() });
            }
        }

        let end_slash = suffix.end_slash && (self.path == "/" || suffix.path != "/");
        let mut path = String::with_capacity(self.path.len() + suffix.path.len());
        path.push_str(self.trimmed_path());
        path.push_str(suffix.trimmed_path());
        if end_slash {
            path.push('/');
        }

        Ok(Self {
            host,
            path,
            end_slash,
            multi_name: suffix.multi_name.clone(),
            wildcards,
        })
    }

    #[inline]
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[inline]
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether the path is a subtree (ends in `/`)
    #[inline]
    #[must_use]
    pub fn end_slash(&self) -> bool {
        self.end_slash
    }

    /// Name of the trailing `{name...}` wildcard, if any
    #[must_use]
    pub fn multi_name(&self) -> Option<&str> {
        self.multi_name.as_deref()
    }

    #[must_use]
    pub fn wildcards(&self) -> &BTreeSet<String> {
        &self.wildcards
    }

    /// Path without its trailing slash; the root path becomes empty.
    #[must_use]
    pub fn trimmed_path(&self) -> &str {
        if self.end_slash {
            &self.path[..self.path.len() - 1]
        } else {
            &self.path
        }
    }

    /// Root of this pattern's host, e.g. `example.com/` or `/`.
    #[must_use]
    pub fn host_root(&self) -> String {
        format!("{}/", self.host)
    }

    /// The pattern with a trailing `{name...}` segment removed.
    ///
    /// `/files/{path...}` becomes `/files/`: the subtree root that should answer
    /// 405 rather than 404 for methods the rest-of-path route does not accept.
    #[must_use]
    pub fn method_not_allowed_pattern(&self) -> String {
        let path = match &self.multi_name {
            Some(name) => {
                let segment = format!("{{{name}...}}");
                self.path.strip_suffix(segment.as_str()).unwrap_or(&self.path)
            }
            None => &self.path,
        };
        format!("{}{}", self.host, path)
    }
}

impl fmt::Display for PatternRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.host, self.path)
    }
}
