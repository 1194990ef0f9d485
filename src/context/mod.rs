//! Per-request context passed down the middleware chain.
//!
//! A [`Context`] owns the parsed [`Request`] and a handle to the request's
//! [`CacheContext`]. Middleware clones the handle before forwarding the
//! context so it can read what downstream layers recorded.

use crate::Request;
use crate::cache::{CacheContext, CacheContextHandle};

/// Per-request state threaded through the middleware chain.
pub struct Context {
    request: Request,
    cache: CacheContextHandle,
}

impl Context {
    /// Create a new context from a request, with a default cache context.
    pub fn new(request: Request) -> Self {
        Self::with_cache(request, CacheContext::new())
    }

    /// Create a new context from a request and a freshly built cache context.
    pub fn with_cache(request: Request, cache: CacheContext) -> Self {
        Self {
            request,
            cache: CacheContextHandle::new(cache),
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Handle to this request's cache context.
    pub fn cache(&self) -> &CacheContextHandle {
        &self.cache
    }
}
