//! Flushes the request's cache context onto the response.

use std::{future::Future, pin::Pin};

use tracing::{debug, trace};

use super::{Middleware, Next};
use crate::context::Context;
use crate::http::Headers;
use crate::{Response, StatusCode};

/// Stamps `ETag`, `Last-Modified`, and `Cache-Control` onto the response once
/// the inner chain has produced it.
///
/// Runs outermost, so the `304` / `412` short-circuits of the conditional
/// stages are decorated too. Rules, in order:
///
/// 1. A context with nothing to contribute leaves the response untouched.
/// 2. In cacheable mode (a freshness directive was set) headers are only
///    added for an allow-listed method *and* status code.
/// 3. In no-cache mode headers are added unconditionally.
///
/// Headers replace any same-named ones the handler set.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheHeaderMiddleware;

impl CacheHeaderMiddleware {
    pub fn new() -> Self {
        Self
    }
}

impl Middleware for CacheHeaderMiddleware {
    fn handle(&self, ctx: Context, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        let method = ctx.request().method().clone();
        let cache = ctx.cache().clone();

        Box::pin(async move {
            let mut response = next.run(ctx).await;
            let status = response.status();

            let headers = {
                let context = cache.lock();
                if !context.has_headers() {
                    trace!("cache context is empty, response untouched");
                    return response;
                }
                if !context.is_no_cache()
                    && !(context.is_cacheable_method(&method)
                        && context.is_cacheable_status(status.as_u16()))
                {
                    trace!(%method, %status, "not cacheable, response untouched");
                    return response;
                }
                context.headers()
            };

            stamp(&mut response, &headers, status);
            response
        })
    }
}

fn stamp(response: &mut Response, headers: &Headers, status: StatusCode) {
    for (name, value) in headers.iter() {
        response.set_header(name, value);
    }
    debug!(%status, count = headers.len(), "cache headers emitted");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheConfig, CacheContext, CacheControl, Etag};
    use crate::middleware::into_handler;
    use crate::middleware::test_support::{ok_handler, request, run_one, status_handler};

    fn cacheable() -> CacheContext {
        let mut context = CacheContext::new();
        context.set_max_age(3600).set_public();
        context
    }

    #[tokio::test]
    async fn default_context_leaves_response_untouched() {
        let (response, _) = run_one(
            CacheHeaderMiddleware::new(),
            request("GET / HTTP/1.1\r\n\r\n"),
            CacheContext::new(),
            ok_handler(),
        )
        .await;
        assert!(response.headers().is_empty());
        assert_eq!(response.payload(), b"fresh");
    }

    #[tokio::test]
    async fn cacheable_context_depends_on_method() {
        let (post, _) = run_one(
            CacheHeaderMiddleware::new(),
            request("POST / HTTP/1.1\r\n\r\n"),
            cacheable(),
            ok_handler(),
        )
        .await;
        assert!(!post.headers().contains("cache-control"));

        let (get, _) = run_one(
            CacheHeaderMiddleware::new(),
            request("GET / HTTP/1.1\r\n\r\n"),
            cacheable(),
            ok_handler(),
        )
        .await;
        assert_eq!(get.headers().get("cache-control"), Some("max-age=3600, public"));
    }

    #[tokio::test]
    async fn cacheable_context_depends_on_status() {
        let allowed = CacheConfig::default().cacheable_status_codes;
        let statuses = [
            StatusCode::Ok,
            StatusCode::Created,
            StatusCode::NoContent,
            StatusCode::NotModified,
            StatusCode::BadRequest,
            StatusCode::NotFound,
            StatusCode::PreconditionFailed,
            StatusCode::InternalServerError,
        ];
        for status in statuses {
            let (response, _) = run_one(
                CacheHeaderMiddleware::new(),
                request("GET / HTTP/1.1\r\n\r\n"),
                cacheable(),
                status_handler(status),
            )
            .await;
            assert_eq!(
                response.headers().contains("cache-control"),
                allowed.contains(&status.as_u16()),
                "{status}"
            );
        }
    }

    #[tokio::test]
    async fn custom_allow_lists_are_respected() {
        let mut context = cacheable();
        context
            .set_cacheable_methods(["POST".parse().unwrap()])
            .set_cacheable_status_codes([201]);

        let (created, _) = run_one(
            CacheHeaderMiddleware::new(),
            request("POST / HTTP/1.1\r\n\r\n"),
            context.clone(),
            status_handler(StatusCode::Created),
        )
        .await;
        assert!(created.headers().contains("cache-control"));

        let (ok, _) = run_one(
            CacheHeaderMiddleware::new(),
            request("POST / HTTP/1.1\r\n\r\n"),
            context,
            ok_handler(),
        )
        .await;
        assert!(!ok.headers().contains("cache-control"));
    }

    #[tokio::test]
    async fn no_cache_mode_emits_for_any_method_and_status() {
        let mut context = CacheContext::new();
        context.set_no_store();
        let (response, _) = run_one(
            CacheHeaderMiddleware::new(),
            request("DELETE / HTTP/1.1\r\n\r\n"),
            context,
            status_handler(StatusCode::InternalServerError),
        )
        .await;
        assert_eq!(response.headers().get("cache-control"), Some("no-cache, no-store"));
    }

    #[tokio::test]
    async fn validators_recorded_by_handler_are_emitted() {
        let handler = into_handler(|ctx: Context| async move {
            ctx.cache()
                .lock()
                .set_etag(Etag::weak("v7"))
                .set_last_modified(1_577_836_800);
            Response::new(StatusCode::Ok)
        });
        let (response, _) = run_one(
            CacheHeaderMiddleware::new(),
            request("GET / HTTP/1.1\r\n\r\n"),
            CacheContext::new(),
            handler,
        )
        .await;
        assert_eq!(response.headers().get("etag"), Some("W/\"v7\""));
        assert_eq!(
            response.headers().get("last-modified"),
            Some("Wed, 01 Jan 2020 00:00:00 GMT")
        );
        assert_eq!(response.headers().get("cache-control"), Some("no-cache"));
    }

    #[tokio::test]
    async fn emitted_headers_replace_handler_headers() {
        let handler = into_handler(|_ctx: Context| async move {
            Response::new(StatusCode::Ok)
                .header("Cache-Control", "private")
                .header("cache-control", "max-age=1")
                .header("X-Kept", "1")
        });
        let (response, _) = run_one(
            CacheHeaderMiddleware::new(),
            request("GET / HTTP/1.1\r\n\r\n"),
            cacheable(),
            handler,
        )
        .await;
        let values: Vec<_> = response.headers().get_all("cache-control").collect();
        assert_eq!(values, vec!["max-age=3600, public"]);
        assert_eq!(response.headers().get("x-kept"), Some("1"));
    }

    #[tokio::test]
    async fn explicit_directives_without_freshness_stay_in_no_cache_mode() {
        let mut context = CacheContext::new();
        context.set_cache_control(CacheControl {
            must_revalidate: true,
            ..CacheControl::default()
        });
        let (response, _) = run_one(
            CacheHeaderMiddleware::new(),
            request("POST / HTTP/1.1\r\n\r\n"),
            context,
            ok_handler(),
        )
        .await;
        assert_eq!(
            response.headers().get("cache-control"),
            Some("no-cache, must-revalidate")
        );
    }

    #[tokio::test]
    async fn replacing_freshness_with_no_store_reenters_no_cache_mode() {
        let mut context = CacheContext::new();
        context.set_max_age(60).set_public();
        context.set_cache_control(CacheControl {
            no_cache: true,
            no_store: true,
            ..CacheControl::default()
        });
        let (response, _) = run_one(
            CacheHeaderMiddleware::new(),
            request("POST / HTTP/1.1\r\n\r\n"),
            context,
            status_handler(StatusCode::InternalServerError),
        )
        .await;
        assert_eq!(response.headers().get("cache-control"), Some("no-cache, no-store"));
    }
}
