//! Validator resolvers: how the application tells the conditional
//! middleware what the current representation looks like.
//!
//! Both traits are implemented for plain closures, so most applications never
//! name them:
//!
//! ```
//! use revalidate::cache::Etag;
//! use revalidate::resolver::{EtagResolver, LastModifiedResolver};
//! use revalidate::Request;
//!
//! let by_query = |req: &Request| req.query_param("etag").map(Etag::from);
//! let fixed = |_: &Request| Some(1_577_836_800_u64);
//!
//! let (req, _) = Request::parse(b"GET /?etag=abc123 HTTP/1.1\r\n\r\n").unwrap();
//! assert_eq!(EtagResolver::resolve(&by_query, &req), Some(Etag::from("abc123")));
//! assert_eq!(LastModifiedResolver::resolve(&fixed, &req), Some(1_577_836_800));
//! ```

use crate::Request;
use crate::cache::Etag;

/// Produces the current ETag for a request.
///
/// Returning `None` (or a blank tag) disables ETag checking for that request.
pub trait EtagResolver: Send + Sync {
    fn resolve(&self, request: &Request) -> Option<Etag>;
}

impl<F> EtagResolver for F
where
    F: Fn(&Request) -> Option<Etag> + Send + Sync,
{
    fn resolve(&self, request: &Request) -> Option<Etag> {
        (self)(request)
    }
}

/// Produces the last-modified time of the requested resource, in epoch seconds.
///
/// Returning `None` disables date checking for that request.
pub trait LastModifiedResolver: Send + Sync {
    fn resolve(&self, request: &Request) -> Option<u64>;
}

impl<F> LastModifiedResolver for F
where
    F: Fn(&Request) -> Option<u64> + Send + Sync,
{
    fn resolve(&self, request: &Request) -> Option<u64> {
        (self)(request)
    }
}
