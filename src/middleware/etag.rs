//! `If-Match` / `If-None-Match` handling.

use std::{future::Future, pin::Pin, sync::Arc};

use tracing::{debug, trace};

use super::{Middleware, Next};
use crate::cache::{ConditionalMatcher, Rfc7232Matcher};
use crate::context::Context;
use crate::http::{EmptyResponseFactory, ResponseFactory};
use crate::resolver::EtagResolver;
use crate::{Response, StatusCode};

/// Answers ETag preconditions before the handler runs.
///
/// For each request the resolver supplies the current ETag; a `None` or blank
/// tag turns the stage into a pass-through. Otherwise, first match wins:
///
/// | Condition                        | Outcome                                          |
/// |----------------------------------|--------------------------------------------------|
/// | `If-None-Match` matches          | record ETag, `304 Not Modified`                  |
/// | `If-Match` matches               | run handler, ETag not recorded                   |
/// | `If-Match` present, no match     | `412 Precondition Failed`                        |
/// | otherwise                        | run handler, then record ETag if none was set    |
///
/// # Examples
///
/// ```rust,no_run
/// use revalidate::cache::Etag;
/// use revalidate::middleware::EtagMatchMiddleware;
/// use revalidate::Request;
///
/// let stage = EtagMatchMiddleware::new(|req: &Request| {
///     req.query_param("version").map(Etag::strong)
/// });
/// ```
pub struct EtagMatchMiddleware {
    resolver: Arc<dyn EtagResolver>,
    matcher: Arc<dyn ConditionalMatcher>,
    responses: Arc<dyn ResponseFactory>,
}

impl EtagMatchMiddleware {
    /// Creates the stage with the standard matcher and empty short-circuit responses.
    pub fn new(resolver: impl EtagResolver + 'static) -> Self {
        Self::from_parts(
            Arc::new(resolver),
            Arc::new(Rfc7232Matcher),
            Arc::new(EmptyResponseFactory),
        )
    }

    /// Creates the stage from shared collaborators.
    pub fn from_parts(
        resolver: Arc<dyn EtagResolver>,
        matcher: Arc<dyn ConditionalMatcher>,
        responses: Arc<dyn ResponseFactory>,
    ) -> Self {
        Self {
            resolver,
            matcher,
            responses,
        }
    }

    /// Replaces the matcher.
    #[must_use]
    pub fn with_matcher(mut self, matcher: impl ConditionalMatcher + 'static) -> Self {
        self.matcher = Arc::new(matcher);
        self
    }

    /// Replaces the factory for `304` / `412` responses.
    #[must_use]
    pub fn with_response_factory(mut self, responses: impl ResponseFactory + 'static) -> Self {
        self.responses = Arc::new(responses);
        self
    }
}

impl Middleware for EtagMatchMiddleware {
    fn handle(&self, ctx: Context, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        let Some(etag) = self
            .resolver
            .resolve(ctx.request())
            .filter(|etag| !etag.is_blank())
        else {
            trace!(path = %ctx.request().path(), "no ETag resolved, skipping");
            return Box::pin(next.run(ctx));
        };

        let verdict = self.matcher.match_etag(ctx.request().headers(), &etag);
        let cache = ctx.cache().clone();

        if verdict.matched_if_none_match {
            debug!(etag = %etag, "If-None-Match matched, responding 304");
            cache.lock().set_etag(etag);
            let response = self.responses.make(StatusCode::NotModified);
            return Box::pin(async move { response });
        }

        if verdict.matched_if_match {
            trace!(etag = %etag, "If-Match matched, passing through");
            return Box::pin(next.run(ctx));
        }

        if verdict.has_if_match_header {
            debug!(etag = %etag, "If-Match did not match, responding 412");
            let response = self.responses.make(StatusCode::PreconditionFailed);
            return Box::pin(async move { response });
        }

        Box::pin(async move {
            let response = next.run(ctx).await;
            if !cache.lock().set_etag_if_absent(etag) {
                trace!("handler recorded its own ETag, keeping it");
            }
            response
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Request;
    use crate::cache::{CacheContext, Etag};
    use crate::middleware::into_handler;
    use crate::middleware::test_support::{ok_handler, request, run_one};

    fn fixed(value: &'static str) -> EtagMatchMiddleware {
        EtagMatchMiddleware::new(move |_: &Request| Some(Etag::from(value)))
    }

    #[tokio::test]
    async fn unresolved_etag_is_pass_through() {
        let none = EtagMatchMiddleware::new(|_: &Request| -> Option<Etag> { None });
        let (response, cache) = run_one(
            none,
            request("GET / HTTP/1.1\r\nIf-Match: \"x\"\r\n\r\n"),
            CacheContext::new(),
            ok_handler(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::Ok);
        assert!(!cache.has_etag());
    }

    #[tokio::test]
    async fn blank_etags_are_pass_through() {
        for blank in ["", "   ", "\t"] {
            let (response, cache) = run_one(
                fixed(blank),
                request("GET / HTTP/1.1\r\nIf-Match: \"x\"\r\n\r\n"),
                CacheContext::new(),
                ok_handler(),
            )
            .await;
            assert_eq!(response.status(), StatusCode::Ok);
            assert!(!cache.has_etag());
        }

        let empty_builder = EtagMatchMiddleware::new(|_: &Request| Some(Etag::strong("")));
        let (_, cache) = run_one(
            empty_builder,
            request("GET / HTTP/1.1\r\n\r\n"),
            CacheContext::new(),
            ok_handler(),
        )
        .await;
        assert!(!cache.has_etag());
    }

    #[tokio::test]
    async fn resolved_from_request() {
        let by_query = EtagMatchMiddleware::new(|req: &Request| req.query_param("etag").map(Etag::from));
        let (response, cache) = run_one(
            by_query,
            request("GET /?etag=abc123 HTTP/1.1\r\n\r\n"),
            CacheContext::new(),
            ok_handler(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::Ok);
        assert_eq!(cache.etag().map(Etag::to_header_value).as_deref(), Some("abc123"));
    }

    #[tokio::test]
    async fn resolved_forms_are_recorded_canonically() {
        let cases: [(Etag, &str); 4] = [
            (Etag::from("\"abc123\""), "\"abc123\""),
            (Etag::from("W/\"123456\""), "W/\"123456\""),
            (Etag::strong("abc567"), "\"abc567\""),
            (Etag::weak("abc567"), "W/\"abc567\""),
        ];
        for (etag, expected) in cases {
            let stage = EtagMatchMiddleware::new(move |_: &Request| Some(etag.clone()));
            let (_, cache) = run_one(
                stage,
                request("GET / HTTP/1.1\r\n\r\n"),
                CacheContext::new(),
                ok_handler(),
            )
            .await;
            assert_eq!(cache.etag().map(Etag::to_header_value).as_deref(), Some(expected));
        }
    }

    #[tokio::test]
    async fn handler_etag_is_not_overwritten() {
        let handler = into_handler(|ctx: Context| async move {
            ctx.cache().lock().set_etag("\"def456\"");
            Response::new(StatusCode::Ok)
        });
        let (_, cache) = run_one(
            fixed("\"abc123\""),
            request("GET / HTTP/1.1\r\n\r\n"),
            CacheContext::new(),
            handler,
        )
        .await;
        assert_eq!(cache.etag(), Some(&Etag::strong("def456")));
    }

    #[tokio::test]
    async fn handler_response_is_returned_unchanged() {
        let handler = into_handler(|_ctx: Context| async move {
            Response::new(StatusCode::Created)
                .header("X-Handler", "yes")
                .body("payload")
        });
        let (response, _) = run_one(
            fixed("\"abc123\""),
            request("GET / HTTP/1.1\r\n\r\n"),
            CacheContext::new(),
            handler,
        )
        .await;
        assert_eq!(
            response,
            Response::new(StatusCode::Created)
                .header("X-Handler", "yes")
                .body("payload")
        );
    }

    #[tokio::test]
    async fn if_none_match_hit_is_304() {
        for header in ["\"abc123\"", "W/\"abc123\"", "\"zzz\", \"abc123\"", "*"] {
            let raw = format!("GET / HTTP/1.1\r\nIf-None-Match: {header}\r\n\r\n");
            let (response, cache) = run_one(
                fixed("\"abc123\""),
                request(&raw),
                CacheContext::new(),
                ok_handler(),
            )
            .await;
            assert_eq!(response.status(), StatusCode::NotModified, "{header}");
            assert!(response.payload().is_empty());
            assert_eq!(cache.etag(), Some(&Etag::strong("abc123")));
        }
    }

    #[tokio::test]
    async fn if_none_match_miss_runs_handler() {
        let (response, cache) = run_one(
            fixed("\"abc123\""),
            request("GET / HTTP/1.1\r\nIf-None-Match: \"other\"\r\n\r\n"),
            CacheContext::new(),
            ok_handler(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::Ok);
        assert_eq!(cache.etag(), Some(&Etag::strong("abc123")));
    }

    #[tokio::test]
    async fn if_match_hit_passes_without_recording() {
        let (response, cache) = run_one(
            fixed("\"abc123\""),
            request("PUT / HTTP/1.1\r\nIf-Match: \"abc123\"\r\n\r\n"),
            CacheContext::new(),
            ok_handler(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::Ok);
        assert!(!cache.has_etag());
    }

    #[tokio::test]
    async fn if_match_miss_is_412() {
        for (current, header) in [("\"cde456\"", "\"abc123\""), ("W/\"abc123\"", "W/\"abc123\"")] {
            let raw = format!("PUT / HTTP/1.1\r\nIf-Match: {header}\r\n\r\n");
            let (response, cache) = run_one(
                fixed(current),
                request(&raw),
                CacheContext::new(),
                ok_handler(),
            )
            .await;
            assert_eq!(response.status(), StatusCode::PreconditionFailed);
            assert!(!cache.has_etag());
        }
    }

    #[tokio::test]
    async fn if_none_match_takes_priority_over_if_match() {
        let (response, _) = run_one(
            fixed("\"abc123\""),
            request("GET / HTTP/1.1\r\nIf-Match: \"nope\"\r\nIf-None-Match: \"abc123\"\r\n\r\n"),
            CacheContext::new(),
            ok_handler(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NotModified);
    }

    #[tokio::test]
    async fn custom_response_factory_is_used() {
        let stage = fixed("\"abc123\"").with_response_factory(|status: StatusCode| {
            Response::new(status).header("X-Short-Circuit", "etag")
        });
        let (response, _) = run_one(
            stage,
            request("GET / HTTP/1.1\r\nIf-None-Match: \"abc123\"\r\n\r\n"),
            CacheContext::new(),
            ok_handler(),
        )
        .await;
        assert_eq!(response.headers().get("x-short-circuit"), Some("etag"));
    }

    #[tokio::test]
    async fn custom_matcher_is_used() {
        struct NeverMatches;
        impl ConditionalMatcher for NeverMatches {
            fn match_etag(&self, _: &crate::http::Headers, _: &Etag) -> crate::cache::MatchVerdict {
                crate::cache::MatchVerdict::default()
            }
            fn match_modified(&self, _: &crate::http::Headers, _: u64) -> crate::cache::TimeVerdict {
                crate::cache::TimeVerdict::default()
            }
        }

        let (response, _) = run_one(
            fixed("\"abc123\"").with_matcher(NeverMatches),
            request("GET / HTTP/1.1\r\nIf-None-Match: \"abc123\"\r\n\r\n"),
            CacheContext::new(),
            ok_handler(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::Ok);
    }
}
