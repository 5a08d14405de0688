//! # Router Configuration
//!
//! Settings that are fixed when the router is built, loaded from YAML or JSON and
//! optionally overridden from the environment.
//!
//! ## File format
//!
//! ```yaml
//! options_max_age: 3600
//! cors:
//!   allowed_origins: ["https://app.example.com", "https://*.example.org"]
//!   allowed_headers: ["Content-Type", "Authorization"]
//!   exposed_headers: ["X-Total-Count"]
//!   allow_credentials: true
//!   max_age: 600
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Overrides |
//! |---|---|
//! | `ROUTEMUX_OPTIONS_MAX_AGE` | `options_max_age` |
//! | `ROUTEMUX_CORS_MAX_AGE` | `cors.max_age` (creates the block if missing) |
//! | `ROUTEMUX_CORS_ALLOWED_ORIGINS` | `cors.allowed_origins`, comma separated |
//!
//! Unparseable numbers are ignored with a warning.

use std::env;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

use crate::middleware::CorsPolicyBuilder;
use crate::router::DEFAULT_OPTIONS_MAX_AGE;

/// Router-wide configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouterConfig {
    /// `Cache-Control` lifetime of automatic OPTIONS and 405 responses
    #[serde(default = "default_max_age")]
    pub options_max_age: u32,
    /// CORS policy applied to every route; absent means no CORS processing
    #[serde(default)]
    pub cors: Option<CorsConfig>,
}

/// CORS block of [`RouterConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CorsConfig {
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    #[serde(default)]
    pub allowed_headers: Vec<String>,
    #[serde(default)]
    pub exposed_headers: Vec<String>,
    #[serde(default)]
    pub allow_credentials: bool,
    /// Preflight cache lifetime; one day when omitted
    #[serde(default)]
    pub max_age: Option<u32>,
}

fn default_max_age() -> u32 {
    DEFAULT_OPTIONS_MAX_AGE
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            options_max_age: DEFAULT_OPTIONS_MAX_AGE,
            cors: None,
        }
    }
}

impl RouterConfig {
    /// Parse YAML text.
    ///
    /// # Errors
    ///
    /// Syntax errors and unknown fields.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).context("Failed to parse router configuration YAML")
    }

    /// Parse JSON text.
    ///
    /// # Errors
    ///
    /// Syntax errors and unknown fields.
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Failed to parse router configuration JSON")
    }

    /// Load a `.json` file as JSON and anything else as YAML.
    ///
    /// # Errors
    ///
    /// I/O and parse errors, with the path in the context.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read router configuration {}", path.display()))?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let parsed = if is_json {
            Self::from_json_str(&text)
        } else {
            Self::from_yaml_str(&text)
        };
        parsed.with_context(|| format!("Invalid router configuration {}", path.display()))
    }

    /// Apply `ROUTEMUX_*` environment overrides.
    #[must_use]
    pub fn apply_env(self) -> Self {
        self.apply_overrides(|key| env::var(key).ok())
    }

    /// Apply overrides from any key lookup; [`RouterConfig::apply_env`] uses the
    /// process environment.
    #[must_use]
    pub fn apply_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("ROUTEMUX_OPTIONS_MAX_AGE") {
            match value.trim().parse() {
                Ok(seconds) => self.options_max_age = seconds,
                Err(_) => warn!(value = %value, "Ignoring invalid ROUTEMUX_OPTIONS_MAX_AGE"),
            }
        }
        if let Some(value) = lookup("ROUTEMUX_CORS_MAX_AGE") {
            match value.trim().parse() {
                Ok(seconds) => {
                    self.cors.get_or_insert_with(CorsConfig::default).max_age = Some(seconds);
                }
                Err(_) => warn!(value = %value, "Ignoring invalid ROUTEMUX_CORS_MAX_AGE"),
            }
        }
        if let Some(value) = lookup("ROUTEMUX_CORS_ALLOWED_ORIGINS") {
            self.cors.get_or_insert_with(CorsConfig::default).allowed_origins = value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        self
    }
}

impl CorsConfig {
    /// Builder pre-filled from this block; add an origin predicate before
    /// building if one is needed.
    #[must_use]
    pub fn to_builder(&self) -> CorsPolicyBuilder {
        let origins: Vec<&str> = self.allowed_origins.iter().map(String::as_str).collect();
        let allowed: Vec<&str> = self.allowed_headers.iter().map(String::as_str).collect();
        let exposed: Vec<&str> = self.exposed_headers.iter().map(String::as_str).collect();
        let mut builder = CorsPolicyBuilder::new()
            .allowed_origins(&origins)
            .allowed_headers(&allowed)
            .exposed_headers(&exposed)
            .allow_credentials(self.allow_credentials);
        if let Some(max_age) = self.max_age {
            builder = builder.max_age(max_age);
        }
        builder
    }
}
