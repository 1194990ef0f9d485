//! Per-request cache intent.
//!
//! The conditional stages record validators here and the header stage flushes
//! them onto the response. One [`CacheContext`] exists per in-flight request;
//! it is reached through a [`CacheContextHandle`] and is never shared between
//! requests.

use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, UNIX_EPOCH};

use super::{CacheConfig, CacheControl, Etag, Visibility};
use crate::http::{Headers, Method};

/// Accumulated cache headers and allow-lists for one request.
///
/// Starts in no-cache mode with no validators. Adding a freshness directive
/// (`max-age`, `public`, ...) leaves no-cache mode; [`set_no_cache`](Self::set_no_cache)
/// and [`set_no_store`](Self::set_no_store) re-enter it.
///
/// # Examples
///
/// ```
/// use revalidate::cache::{CacheContext, Etag};
///
/// let mut context = CacheContext::new();
/// assert!(context.is_no_cache());
/// assert!(!context.has_headers());
///
/// context.set_etag_if_absent(Etag::strong("v1"));
/// context.set_etag_if_absent(Etag::strong("v2"));
/// assert_eq!(context.etag().map(|e| e.to_header_value()).as_deref(), Some(r#""v1""#));
///
/// context.set_max_age(3600).set_public();
/// assert!(!context.is_no_cache());
/// ```
#[derive(Debug, Clone)]
pub struct CacheContext {
    etag: Option<Etag>,
    last_modified: Option<u64>,
    cache_control: CacheControl,
    no_cache: bool,
    cacheable_methods: HashSet<Method>,
    cacheable_status_codes: BTreeSet<u16>,
}

impl Default for CacheContext {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

impl CacheContext {
    /// Creates a context with the default allow-lists, in no-cache mode.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context seeded from `config`.
    ///
    /// The configured directives are applied the same way
    /// [`set_cache_control`](Self::set_cache_control) applies them.
    pub fn from_config(config: &CacheConfig) -> Self {
        let mut context = Self {
            etag: None,
            last_modified: None,
            cache_control: CacheControl::default(),
            no_cache: true,
            cacheable_methods: config.methods().collect(),
            cacheable_status_codes: config.cacheable_status_codes.iter().copied().collect(),
        };
        context.set_cache_control(config.cache_control.clone());
        context
    }

    // ── ETag ──────────────────────────────────────────────────────────────────

    /// Stores `etag`, replacing any current one. Blank tags are ignored.
    pub fn set_etag(&mut self, etag: impl Into<Etag>) -> &mut Self {
        let etag = etag.into();
        if !etag.is_blank() {
            self.etag = Some(etag);
        }
        self
    }

    /// Stores `etag` only when none is recorded yet.
    ///
    /// Returns `true` if the tag was stored.
    pub fn set_etag_if_absent(&mut self, etag: impl Into<Etag>) -> bool {
        if self.etag.is_some() {
            return false;
        }
        self.set_etag(etag);
        self.etag.is_some()
    }

    /// Forgets the current ETag.
    pub fn remove_etag(&mut self) -> &mut Self {
        self.etag = None;
        self
    }

    pub fn has_etag(&self) -> bool {
        self.etag.is_some()
    }

    pub fn etag(&self) -> Option<&Etag> {
        self.etag.as_ref()
    }

    // ── Last-Modified ─────────────────────────────────────────────────────────

    /// Stores the last-modified time (epoch seconds), replacing any current one.
    pub fn set_last_modified(&mut self, epoch_secs: u64) -> &mut Self {
        self.last_modified = Some(epoch_secs);
        self
    }

    /// Stores the last-modified time only when none is recorded yet.
    ///
    /// Returns `true` if the time was stored.
    pub fn set_last_modified_if_absent(&mut self, epoch_secs: u64) -> bool {
        if self.last_modified.is_some() {
            return false;
        }
        self.last_modified = Some(epoch_secs);
        true
    }

    pub fn has_last_modified(&self) -> bool {
        self.last_modified.is_some()
    }

    pub fn last_modified(&self) -> Option<u64> {
        self.last_modified
    }

    // ── Cache-Control ─────────────────────────────────────────────────────────

    /// Replaces the directive set and recomputes the mode from it.
    ///
    /// The context is in no-cache mode afterwards unless the new set carries a
    /// freshness directive and neither `no-cache` nor `no-store`.
    pub fn set_cache_control(&mut self, cache_control: CacheControl) -> &mut Self {
        self.no_cache =
            !cache_control.has_freshness() || cache_control.no_cache || cache_control.no_store;
        self.cache_control = cache_control;
        self
    }

    pub fn cache_control(&self) -> &CacheControl {
        &self.cache_control
    }

    /// Adds `max-age=<secs>`.
    pub fn set_max_age(&mut self, secs: u64) -> &mut Self {
        self.cache_control.max_age = Some(secs);
        self.no_cache = false;
        self
    }

    /// Adds `s-maxage=<secs>`.
    pub fn set_shared_max_age(&mut self, secs: u64) -> &mut Self {
        self.cache_control.s_maxage = Some(secs);
        self.no_cache = false;
        self
    }

    /// Adds `public`.
    pub fn set_public(&mut self) -> &mut Self {
        self.cache_control.visibility = Some(Visibility::Public);
        self.no_cache = false;
        self
    }

    /// Adds `private`.
    pub fn set_private(&mut self) -> &mut Self {
        self.cache_control.visibility = Some(Visibility::Private);
        self.no_cache = false;
        self
    }

    /// Adds `immutable`.
    pub fn set_immutable(&mut self) -> &mut Self {
        self.cache_control.immutable = true;
        self.no_cache = false;
        self
    }

    /// Adds `must-revalidate`. Does not change the no-cache mode.
    pub fn set_must_revalidate(&mut self) -> &mut Self {
        self.cache_control.must_revalidate = true;
        self
    }

    /// Enters no-cache mode, dropping freshness directives.
    pub fn set_no_cache(&mut self) -> &mut Self {
        self.cache_control.clear_freshness();
        self.cache_control.no_cache = true;
        self.no_cache = true;
        self
    }

    /// Enters no-cache mode and adds `no-store`.
    pub fn set_no_store(&mut self) -> &mut Self {
        self.set_no_cache();
        self.cache_control.no_store = true;
        self
    }

    pub fn is_no_cache(&self) -> bool {
        self.no_cache
    }

    // ── Allow-lists ───────────────────────────────────────────────────────────

    pub fn set_cacheable_methods(&mut self, methods: impl IntoIterator<Item = Method>) -> &mut Self {
        self.cacheable_methods = methods.into_iter().collect();
        self
    }

    pub fn cacheable_methods(&self) -> &HashSet<Method> {
        &self.cacheable_methods
    }

    pub fn set_cacheable_status_codes(&mut self, codes: impl IntoIterator<Item = u16>) -> &mut Self {
        self.cacheable_status_codes = codes.into_iter().collect();
        self
    }

    pub fn cacheable_status_codes(&self) -> &BTreeSet<u16> {
        &self.cacheable_status_codes
    }

    pub fn is_cacheable_method(&self, method: &Method) -> bool {
        self.cacheable_methods.contains(method)
    }

    pub fn is_cacheable_status(&self, code: u16) -> bool {
        self.cacheable_status_codes.contains(&code)
    }

    // ── Output ────────────────────────────────────────────────────────────────

    /// Returns `true` if the context would contribute at least one header.
    ///
    /// No-cache mode on its own contributes nothing.
    pub fn has_headers(&self) -> bool {
        self.etag.is_some() || self.last_modified.is_some() || !self.cache_control.is_empty()
    }

    /// Renders the `ETag`, `Last-Modified`, and `Cache-Control` headers.
    ///
    /// In no-cache mode `Cache-Control` always carries `no-cache`. Empty when
    /// [`has_headers`](Self::has_headers) is `false`.
    pub fn headers(&self) -> Headers {
        let mut headers = Headers::with_capacity(3);
        if !self.has_headers() {
            return headers;
        }

        if let Some(etag) = &self.etag {
            headers.insert("ETag", etag.to_header_value());
        }
        if let Some(secs) = self.last_modified {
            headers.insert("Last-Modified", format_http_date(secs));
        }

        let mut directives = self.cache_control.clone();
        if self.no_cache {
            directives.no_cache = true;
        }
        if let Some(value) = directives.to_header_value() {
            headers.insert("Cache-Control", value);
        }

        headers
    }

    /// Drops every header contribution and returns to no-cache mode.
    ///
    /// The allow-lists are kept.
    pub fn reset(&mut self) -> &mut Self {
        self.etag = None;
        self.last_modified = None;
        self.cache_control = CacheControl::default();
        self.no_cache = true;
        self
    }
}

/// Formats epoch seconds as an IMF-fixdate (`Wed, 01 Jan 2020 00:00:00 GMT`).
pub fn format_http_date(epoch_secs: u64) -> String {
    httpdate::fmt_http_date(UNIX_EPOCH + Duration::from_secs(epoch_secs))
}

/// Cloneable, thread-safe handle to a request's [`CacheContext`].
///
/// Stages clone the handle before forwarding the request so they can read
/// what the handler recorded once it returns. The lock is only ever held for
/// the duration of a single read or write, never across an `.await`.
#[derive(Debug, Clone, Default)]
pub struct CacheContextHandle {
    inner: Arc<Mutex<CacheContext>>,
}

impl CacheContextHandle {
    pub fn new(context: CacheContext) -> Self {
        Self {
            inner: Arc::new(Mutex::new(context)),
        }
    }

    /// Locks the context.
    ///
    /// The context holds plain data, so a lock poisoned by a panicking writer
    /// is recovered rather than propagated.
    pub fn lock(&self) -> MutexGuard<'_, CacheContext> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a copy of the current state.
    pub fn snapshot(&self) -> CacheContext {
        self.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn etag_set_and_remove() {
        let mut context = CacheContext::new();
        assert!(!context.has_etag());
        context.set_etag("test");
        assert_eq!(context.etag().map(Etag::to_header_value).as_deref(), Some("test"));
        context.remove_etag();
        assert!(!context.has_etag());
    }

    #[test]
    fn blank_etag_never_stored() {
        let mut context = CacheContext::new();
        context.set_etag("");
        assert!(!context.has_etag());
        context.set_etag("   ");
        assert!(!context.has_etag());
        assert!(!context.set_etag_if_absent(Etag::strong("")));
        assert!(!context.has_etag());
    }

    #[test]
    fn set_if_absent_keeps_first_value() {
        let mut context = CacheContext::new();
        assert!(context.set_etag_if_absent("\"abc123\""));
        assert!(!context.set_etag_if_absent("\"def456\""));
        assert_eq!(context.etag(), Some(&Etag::strong("abc123")));

        context.set_etag("\"def456\"");
        assert_eq!(context.etag(), Some(&Etag::strong("def456")));

        assert!(context.set_last_modified_if_absent(100));
        assert!(!context.set_last_modified_if_absent(200));
        assert_eq!(context.last_modified(), Some(100));
        context.set_last_modified(200);
        assert_eq!(context.last_modified(), Some(200));
    }

    #[test]
    fn defaults() {
        let context = CacheContext::new();
        assert!(context.is_no_cache());
        assert!(!context.has_headers());
        assert!(context.headers().is_empty());

        let methods: HashSet<Method> = [Method::Get, Method::Head].into_iter().collect();
        assert_eq!(context.cacheable_methods(), &methods);
        let codes: Vec<u16> = context.cacheable_status_codes().iter().copied().collect();
        assert_eq!(codes, vec![200, 201, 203, 204, 206, 404]);
    }

    #[test]
    fn freshness_leaves_no_cache_mode() {
        let mut context = CacheContext::new();
        context.set_must_revalidate();
        assert!(context.is_no_cache());
        context.set_max_age(3600).set_public();
        assert!(!context.is_no_cache());
        assert_eq!(
            context.headers().get("cache-control"),
            Some("max-age=3600, public, must-revalidate")
        );
    }

    #[test]
    fn no_store_reenters_no_cache_mode() {
        let mut context = CacheContext::new();
        context.set_max_age(60).set_public();
        context.set_no_store();
        assert!(context.is_no_cache());
        assert_eq!(context.headers().get("cache-control"), Some("no-cache, no-store"));
    }

    #[test]
    fn replacing_directives_recomputes_mode() {
        let mut context = CacheContext::new();
        context.set_max_age(60).set_public();
        context.set_cache_control(CacheControl {
            no_cache: true,
            no_store: true,
            ..CacheControl::default()
        });
        assert!(context.is_no_cache());

        context.set_cache_control(CacheControl {
            max_age: Some(30),
            ..CacheControl::default()
        });
        assert!(!context.is_no_cache());

        context.set_cache_control(CacheControl::default());
        assert!(context.is_no_cache());
    }

    #[test]
    fn headers_in_no_cache_mode_carry_no_cache() {
        let mut context = CacheContext::new();
        context.set_etag(Etag::weak("v1")).set_last_modified(1_577_836_800);
        let headers = context.headers();
        assert_eq!(headers.get("etag"), Some("W/\"v1\""));
        assert_eq!(
            headers.get("last-modified"),
            Some("Wed, 01 Jan 2020 00:00:00 GMT")
        );
        assert_eq!(headers.get("cache-control"), Some("no-cache"));
    }

    #[test]
    fn reset_keeps_allow_lists() {
        let mut context = CacheContext::new();
        context
            .set_cacheable_methods([Method::Get])
            .set_cacheable_status_codes([200])
            .set_max_age(10)
            .set_etag("\"x\"");
        context.reset();
        assert!(!context.has_headers());
        assert!(context.is_no_cache());
        assert_eq!(context.cacheable_methods().len(), 1);
        assert!(context.is_cacheable_status(200));
        assert!(!context.is_cacheable_status(404));
    }

    #[test]
    fn seeded_from_config() {
        let config = CacheConfig::from_json(
            r#"{ "cacheable_methods": ["GET"], "cache_control": { "max-age": 3600, "visibility": "public" } }"#,
        )
        .unwrap();
        let context = CacheContext::from_config(&config);
        assert!(!context.is_no_cache());
        assert!(context.has_headers());
        assert!(context.is_cacheable_method(&Method::Get));
        assert!(!context.is_cacheable_method(&Method::Head));
    }

    #[test]
    fn handles_share_one_context() {
        let handle = CacheContextHandle::new(CacheContext::new());
        let clone = handle.clone();
        clone.lock().set_etag("\"shared\"");
        assert!(handle.lock().has_etag());
        assert_eq!(handle.snapshot().etag(), Some(&Etag::strong("shared")));
    }

    #[test]
    fn separate_handles_are_isolated() {
        let first = CacheContextHandle::default();
        let second = CacheContextHandle::default();
        first.lock().set_etag("\"only-first\"");
        assert!(!second.lock().has_etag());
    }
}
