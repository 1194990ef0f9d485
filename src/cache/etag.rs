//! Entity tags (RFC 7232 §2.3).
//!
//! An [`Etag`] is either taken verbatim from a header-style string
//! (`"v1"`, `W/"v1"`, or a legacy unquoted `v1`) or built from a bare value
//! with [`Etag::strong`] / [`Etag::weak`], which add the quotes.

use std::fmt;

const WEAK_PREFIX: &str = "W/";

/// A normalized entity tag.
///
/// `tag` holds the opaque-tag exactly as it goes on the wire (quotes
/// included); `weak` records the `W/` prefix.
///
/// # Examples
///
/// ```
/// use revalidate::cache::Etag;
///
/// assert_eq!(Etag::strong("abc567").to_header_value(), r#""abc567""#);
/// assert_eq!(Etag::weak("abc567").to_header_value(), r#"W/"abc567""#);
///
/// let parsed = Etag::parse(r#"W/"123456""#).unwrap();
/// assert!(parsed.is_weak());
/// assert!(parsed.weak_eq(&Etag::strong("123456")));
/// assert!(!parsed.strong_eq(&Etag::strong("123456")));
///
/// assert!(Etag::parse("   ").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Etag {
    tag: String,
    weak: bool,
}

impl Etag {
    /// Builds a strong tag from a bare value, quoting it if needed.
    pub fn strong(value: impl AsRef<str>) -> Self {
        Self {
            tag: quote(value.as_ref()),
            weak: false,
        }
    }

    /// Builds a weak tag from a bare value, quoting it if needed.
    pub fn weak(value: impl AsRef<str>) -> Self {
        Self {
            tag: quote(value.as_ref()),
            weak: true,
        }
    }

    /// Parses a single header-style entity tag.
    ///
    /// Surrounding whitespace is trimmed and the rest is kept verbatim, so an
    /// unquoted legacy value round-trips unchanged. Returns `None` for blank
    /// input.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let (weak, tag) = match raw.strip_prefix(WEAK_PREFIX) {
            Some(rest) => (true, rest.trim_start()),
            None => (false, raw),
        };
        if tag.is_empty() {
            return None;
        }
        Some(Self {
            tag: tag.to_owned(),
            weak,
        })
    }

    /// Returns the opaque-tag as written on the wire, without the weak prefix.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Returns `true` for `W/` tags.
    pub fn is_weak(&self) -> bool {
        self.weak
    }

    /// Returns `true` when the tag carries no usable value.
    pub fn is_blank(&self) -> bool {
        self.tag.trim().is_empty()
    }

    /// Strong comparison: both strong and byte-identical opaque-tags.
    pub fn strong_eq(&self, other: &Etag) -> bool {
        !self.weak && !other.weak && self.tag == other.tag
    }

    /// Weak comparison: opaque-tags match, weakness ignored.
    pub fn weak_eq(&self, other: &Etag) -> bool {
        self.tag == other.tag
    }

    /// Renders the canonical header value (`"v"` or `W/"v"`).
    pub fn to_header_value(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Etag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.weak {
            f.write_str(WEAK_PREFIX)?;
        }
        f.write_str(&self.tag)
    }
}

impl From<&str> for Etag {
    /// Header-style conversion; blank input yields a blank tag, which every
    /// consumer treats as "no ETag".
    fn from(raw: &str) -> Self {
        Self::parse(raw).unwrap_or_else(|| Self {
            tag: String::new(),
            weak: false,
        })
    }
}

impl From<String> for Etag {
    fn from(raw: String) -> Self {
        Self::from(raw.as_str())
    }
}

fn quote(value: &str) -> String {
    let value = value.trim();
    if value.is_empty() || is_quoted(value) {
        value.to_owned()
    } else {
        format!("\"{value}\"")
    }
}

fn is_quoted(value: &str) -> bool {
    value.len() >= 2 && value.starts_with('"') && value.ends_with('"')
}

/// One member of an `If-Match` / `If-None-Match` field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EtagCondition {
    /// `*`: any current representation.
    Any,
    /// A concrete entity tag.
    Tag(Etag),
}

/// Splits a comma-separated entity-tag list into its members.
///
/// Quoted tags may contain commas. Unquoted legacy tags run up to the next
/// comma. Empty members are skipped.
///
/// # Examples
///
/// ```
/// use revalidate::cache::etag::{parse_etag_list, EtagCondition};
/// use revalidate::cache::Etag;
///
/// let members = parse_etag_list(r#""a,b", W/"c" , d"#);
/// assert_eq!(
///     members,
///     vec![
///         EtagCondition::Tag(Etag::strong("a,b")),
///         EtagCondition::Tag(Etag::weak("c")),
///         EtagCondition::Tag(Etag::parse("d").unwrap()),
///     ]
/// );
/// assert_eq!(parse_etag_list("*"), vec![EtagCondition::Any]);
/// ```
pub fn parse_etag_list(value: &str) -> Vec<EtagCondition> {
    let mut members = Vec::new();
    let mut rest = value;

    loop {
        rest = rest.trim_start_matches(|c: char| c == ',' || c.is_ascii_whitespace());
        if rest.is_empty() {
            break;
        }

        let (weak, body) = match rest.strip_prefix(WEAK_PREFIX) {
            Some(after) => (true, after),
            None => (false, rest),
        };

        let (tag, remaining) = if let Some(quoted) = body.strip_prefix('"') {
            match quoted.find('"') {
                // closing quote included
                Some(end) => body.split_at(end + 2),
                // unterminated quote swallows the remainder
                None => (body, ""),
            }
        } else {
            let end = body.find(',').unwrap_or(body.len());
            (body[..end].trim_end(), &body[end..])
        };

        if !weak && tag == "*" {
            members.push(EtagCondition::Any);
        } else if !tag.is_empty() {
            members.push(EtagCondition::Tag(Etag {
                tag: tag.to_owned(),
                weak,
            }));
        }

        // skip trailing garbage up to the next delimiter
        rest = match remaining.find(',') {
            Some(pos) => &remaining[pos..],
            None => "",
        };
    }

    members
}
