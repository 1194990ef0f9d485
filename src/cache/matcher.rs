//! Evaluation of conditional request headers ([RFC 7232 §3](https://datatracker.ietf.org/doc/html/rfc7232#section-3)).
//!
//! A [`ConditionalMatcher`] turns a request's header map plus the current
//! validator into a verdict. The verdicts only report facts; the middleware
//! decides what status to answer with.

use std::time::UNIX_EPOCH;

use httpdate::parse_http_date;
use tracing::debug;

use super::etag::{EtagCondition, parse_etag_list};
use super::Etag;
use crate::http::Headers;

pub const IF_MATCH: &str = "If-Match";
pub const IF_NONE_MATCH: &str = "If-None-Match";
pub const IF_MODIFIED_SINCE: &str = "If-Modified-Since";
pub const IF_UNMODIFIED_SINCE: &str = "If-Unmodified-Since";

/// Outcome of comparing an ETag with `If-Match` / `If-None-Match`.
///
/// The flags are independent; [`EtagMatchMiddleware`](crate::middleware::EtagMatchMiddleware)
/// checks them in priority order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchVerdict {
    /// `If-None-Match` is present and lists the ETag (weak comparison) or `*`.
    pub matched_if_none_match: bool,
    /// `If-Match` is present and lists the ETag (strong comparison) or `*`.
    pub matched_if_match: bool,
    /// `If-Match` is present at all.
    pub has_if_match_header: bool,
    /// `If-None-Match` is present at all.
    pub has_if_none_match_header: bool,
}

/// Outcome of comparing a last-modified time with the date preconditions.
///
/// Without the corresponding header, `is_modified_since` and
/// `is_unmodified_since` are `true`: nothing constrains the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeVerdict {
    /// The resource changed after the `If-Modified-Since` date.
    pub is_modified_since: bool,
    /// The resource did not change after the `If-Unmodified-Since` date.
    pub is_unmodified_since: bool,
    /// `If-Modified-Since` carries a valid HTTP-date.
    pub has_if_modified_since_header: bool,
    /// `If-Unmodified-Since` carries a valid HTTP-date.
    pub has_if_unmodified_since_header: bool,
}

impl Default for TimeVerdict {
    fn default() -> Self {
        Self {
            is_modified_since: true,
            is_unmodified_since: true,
            has_if_modified_since_header: false,
            has_if_unmodified_since_header: false,
        }
    }
}

/// Compares validators against conditional request headers.
///
/// Injected into the conditional middleware; the default is [`Rfc7232Matcher`].
pub trait ConditionalMatcher: Send + Sync {
    fn match_etag(&self, headers: &Headers, etag: &Etag) -> MatchVerdict;

    /// `last_modified` is in epoch seconds.
    fn match_modified(&self, headers: &Headers, last_modified: u64) -> TimeVerdict;
}

/// The standard rules:
///
/// - `If-None-Match` uses weak comparison, `If-Match` strong comparison.
/// - `*` matches any current representation.
/// - Every header line is consulted; each may hold a comma-separated list.
/// - Dates compare at one-second resolution; equal means "not modified".
/// - A date header that is not a valid HTTP-date is ignored.
/// - `If-Modified-Since` is ignored when `If-None-Match` is present.
///
/// # Examples
///
/// ```
/// use revalidate::cache::{ConditionalMatcher, Etag, Rfc7232Matcher};
/// use revalidate::http::Headers;
///
/// let mut headers = Headers::new();
/// headers.insert("If-None-Match", r#"W/"v1", "v2""#);
///
/// let verdict = Rfc7232Matcher.match_etag(&headers, &Etag::strong("v1"));
/// assert!(verdict.matched_if_none_match);
/// assert!(!verdict.has_if_match_header);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Rfc7232Matcher;

impl ConditionalMatcher for Rfc7232Matcher {
    fn match_etag(&self, headers: &Headers, etag: &Etag) -> MatchVerdict {
        let has_if_match_header = headers.contains(IF_MATCH);
        let has_if_none_match_header = headers.contains(IF_NONE_MATCH);

        let matched_if_match = has_if_match_header
            && header_conditions(headers, IF_MATCH).any(|condition| match condition {
                EtagCondition::Any => true,
                EtagCondition::Tag(candidate) => candidate.strong_eq(etag),
            });

        let matched_if_none_match = has_if_none_match_header
            && header_conditions(headers, IF_NONE_MATCH).any(|condition| match condition {
                EtagCondition::Any => true,
                EtagCondition::Tag(candidate) => candidate.weak_eq(etag),
            });

        MatchVerdict {
            matched_if_none_match,
            matched_if_match,
            has_if_match_header,
            has_if_none_match_header,
        }
    }

    fn match_modified(&self, headers: &Headers, last_modified: u64) -> TimeVerdict {
        let mut verdict = TimeVerdict::default();

        let since = if headers.contains(IF_NONE_MATCH) {
            None
        } else {
            header_as_epoch_secs(headers, IF_MODIFIED_SINCE)
        };
        if let Some(since) = since {
            verdict.has_if_modified_since_header = true;
            verdict.is_modified_since = last_modified > since;
        }
        if let Some(since) = header_as_epoch_secs(headers, IF_UNMODIFIED_SINCE) {
            verdict.has_if_unmodified_since_header = true;
            verdict.is_unmodified_since = last_modified <= since;
        }

        verdict
    }
}

fn header_conditions<'a>(
    headers: &'a Headers,
    name: &'a str,
) -> impl Iterator<Item = EtagCondition> + 'a {
    headers.get_all(name).flat_map(parse_etag_list)
}

/// Parses the first `name` header as an HTTP-date, in epoch seconds.
///
/// Returns `None` when the header is absent or not a valid HTTP-date.
pub fn header_as_epoch_secs(headers: &Headers, name: &str) -> Option<u64> {
    let value = headers.get(name)?;
    match parse_http_date(value.trim()) {
        Ok(time) => time.duration_since(UNIX_EPOCH).ok().map(|d| d.as_secs()),
        Err(e) => {
            debug!(header = name, value, error = %e, "ignoring invalid HTTP-date");
            None
        }
    }
}
