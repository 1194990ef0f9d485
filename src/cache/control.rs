//! `Cache-Control` response directives (RFC 9111 §5.2.2).

use serde::{Deserialize, Serialize};

/// Who may store the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// `public`: any cache.
    Public,
    /// `private`: the user agent's cache only.
    Private,
}

/// A set of `Cache-Control` response directives.
///
/// Rendered in a fixed order so that identical sets always produce identical
/// header values.
///
/// # Examples
///
/// ```
/// use revalidate::cache::CacheControl;
///
/// let mut directives = CacheControl::default();
/// directives.max_age = Some(3600);
/// directives.visibility = Some(revalidate::cache::Visibility::Public);
/// assert_eq!(directives.to_header_value().as_deref(), Some("max-age=3600, public"));
/// assert!(directives.has_freshness());
///
/// assert_eq!(CacheControl::default().to_header_value(), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CacheControl {
    pub max_age: Option<u64>,
    pub s_maxage: Option<u64>,
    pub visibility: Option<Visibility>,
    pub no_cache: bool,
    pub no_store: bool,
    pub must_revalidate: bool,
    pub proxy_revalidate: bool,
    pub no_transform: bool,
    pub immutable: bool,
    pub stale_while_revalidate: Option<u64>,
    pub stale_if_error: Option<u64>,
}

impl CacheControl {
    /// Returns `true` if no directive is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Returns `true` if a directive that makes the response reusable is set.
    pub fn has_freshness(&self) -> bool {
        self.max_age.is_some()
            || self.s_maxage.is_some()
            || self.visibility.is_some()
            || self.immutable
            || self.stale_while_revalidate.is_some()
            || self.stale_if_error.is_some()
    }

    /// Drops every directive that makes the response reusable.
    pub fn clear_freshness(&mut self) {
        self.max_age = None;
        self.s_maxage = None;
        self.visibility = None;
        self.immutable = false;
        self.stale_while_revalidate = None;
        self.stale_if_error = None;
    }

    /// Renders the header value, or `None` when no directive is set.
    pub fn to_header_value(&self) -> Option<String> {
        let mut parts: Vec<String> = Vec::new();

        if let Some(secs) = self.max_age {
            parts.push(format!("max-age={secs}"));
        }
        if let Some(secs) = self.s_maxage {
            parts.push(format!("s-maxage={secs}"));
        }
        match self.visibility {
            Some(Visibility::Public) => parts.push("public".to_owned()),
            Some(Visibility::Private) => parts.push("private".to_owned()),
            None => {}
        }
        if self.no_cache {
            parts.push("no-cache".to_owned());
        }
        if self.no_store {
            parts.push("no-store".to_owned());
        }
        if self.must_revalidate {
            parts.push("must-revalidate".to_owned());
        }
        if self.proxy_revalidate {
            parts.push("proxy-revalidate".to_owned());
        }
        if self.no_transform {
            parts.push("no-transform".to_owned());
        }
        if self.immutable {
            parts.push("immutable".to_owned());
        }
        if let Some(secs) = self.stale_while_revalidate {
            parts.push(format!("stale-while-revalidate={secs}"));
        }
        if let Some(secs) = self.stale_if_error {
            parts.push(format!("stale-if-error={secs}"));
        }

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }
}
