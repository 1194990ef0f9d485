//! Cache configuration shared by every request of a pipeline.
//!
//! A [`CacheConfig`] is validated once at startup; each request then gets a
//! fresh [`CacheContext`](super::CacheContext) seeded from it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::CacheControl;
use crate::http::Method;

/// Errors raised while building or loading a [`CacheConfig`].
///
/// These are wiring mistakes, reported before the first request is served.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid HTTP method name {name:?}")]
    InvalidMethod { name: String },

    #[error("status code {code} is outside 100..=599")]
    InvalidStatusCode { code: u16 },
}

/// Methods whose responses may carry cache headers by default.
pub const DEFAULT_CACHEABLE_METHODS: [&str; 2] = ["GET", "HEAD"];

/// Status codes whose responses may carry cache headers by default.
pub const DEFAULT_CACHEABLE_STATUS_CODES: [u16; 6] = [200, 201, 203, 204, 206, 404];

/// Allow-lists and default directives for the cache header stage.
///
/// # Examples
///
/// ```
/// use revalidate::cache::CacheConfig;
///
/// let config = CacheConfig::from_json(
///     r#"{ "cacheable_methods": ["GET"], "cache_control": { "max-age": 60, "visibility": "public" } }"#,
/// ).unwrap();
/// assert_eq!(config.cacheable_methods, vec!["GET".to_owned()]);
/// assert_eq!(config.cacheable_status_codes, vec![200, 201, 203, 204, 206, 404]);
/// assert_eq!(config.cache_control.max_age, Some(60));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Request methods eligible for cache headers outside no-cache mode.
    pub cacheable_methods: Vec<String>,
    /// Response status codes eligible for cache headers outside no-cache mode.
    pub cacheable_status_codes: Vec<u16>,
    /// Directives every request starts with.
    pub cache_control: CacheControl,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cacheable_methods: DEFAULT_CACHEABLE_METHODS
                .iter()
                .map(|m| (*m).to_owned())
                .collect(),
            cacheable_status_codes: DEFAULT_CACHEABLE_STATUS_CODES.to_vec(),
            cache_control: CacheControl::default(),
        }
    }
}

impl CacheConfig {
    /// Parses and validates a JSON document. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::Parse`]: the document is not valid JSON for this shape.
    /// - [`ConfigError::InvalidMethod`] / [`ConfigError::InvalidStatusCode`]: see [`validate`](Self::validate).
    pub fn from_json(document: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(document)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every method is an HTTP token and every status code is in range.
    ///
    /// # Errors
    ///
    /// Returns the first offending entry.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(name) = self
            .cacheable_methods
            .iter()
            .find(|name| !Method::is_token(name))
        {
            return Err(ConfigError::InvalidMethod { name: name.clone() });
        }
        if let Some(code) = self
            .cacheable_status_codes
            .iter()
            .find(|code| !(100..=599).contains(*code))
        {
            return Err(ConfigError::InvalidStatusCode { code: *code });
        }
        Ok(())
    }

    /// Returns the cacheable methods as parsed [`Method`]s.
    pub fn methods(&self) -> impl Iterator<Item = Method> + '_ {
        self.cacheable_methods.iter().map(|name| {
            let Ok(method) = name.parse::<Method>();
            method
        })
    }
}
