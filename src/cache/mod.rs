//! Cache validators, directives, and the per-request cache context.
//!
//! - [`Etag`]: entity tags with weak/strong comparison.
//! - [`CacheControl`]: `Cache-Control` response directives.
//! - [`CacheContext`] / [`CacheContextHandle`]: what a request will emit.
//! - [`CacheConfig`]: allow-lists and default directives, validated at startup.
//! - [`ConditionalMatcher`]: evaluates `If-*` request headers.

pub mod config;
pub mod context;
pub mod control;
pub mod etag;
pub mod matcher;

pub use config::{CacheConfig, ConfigError};
pub use context::{CacheContext, CacheContextHandle, format_http_date};
pub use control::{CacheControl, Visibility};
pub use etag::Etag;
pub use matcher::{ConditionalMatcher, MatchVerdict, Rfc7232Matcher, TimeVerdict};
