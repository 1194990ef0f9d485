//! `If-Modified-Since` / `If-Unmodified-Since` handling.

use std::{future::Future, pin::Pin, sync::Arc};

use tracing::{debug, trace};

use super::{Middleware, Next};
use crate::cache::{ConditionalMatcher, Rfc7232Matcher};
use crate::context::Context;
use crate::http::{EmptyResponseFactory, ResponseFactory};
use crate::resolver::LastModifiedResolver;
use crate::{Response, StatusCode};

/// Answers date preconditions before the handler runs.
///
/// The resolver supplies the resource's last-modified time in epoch seconds.
/// Dates compare at one-second resolution.
///
/// - `If-Modified-Since: d` with `t <= d` records `t` and answers `304`;
///   otherwise the handler runs and `t` is recorded unless the handler set one.
/// - `If-Unmodified-Since: d` with `t > d` answers `412`; otherwise the
///   handler runs. `t` is recorded unless already set in both cases.
/// - `If-Modified-Since` wins when both are sent. Without either (or with
///   unparseable dates) the stage does nothing.
/// - With the default matcher, `If-None-Match` disables `If-Modified-Since`.
pub struct ModifiedSinceMiddleware {
    resolver: Arc<dyn LastModifiedResolver>,
    matcher: Arc<dyn ConditionalMatcher>,
    responses: Arc<dyn ResponseFactory>,
}

impl ModifiedSinceMiddleware {
    pub fn new(resolver: impl LastModifiedResolver + 'static) -> Self {
        Self::from_parts(
            Arc::new(resolver),
            Arc::new(Rfc7232Matcher),
            Arc::new(EmptyResponseFactory),
        )
    }

    /// Creates the stage from shared collaborators.
    pub fn from_parts(
        resolver: Arc<dyn LastModifiedResolver>,
        matcher: Arc<dyn ConditionalMatcher>,
        responses: Arc<dyn ResponseFactory>,
    ) -> Self {
        Self {
            resolver,
            matcher,
            responses,
        }
    }

    #[must_use]
    pub fn with_matcher(mut self, matcher: impl ConditionalMatcher + 'static) -> Self {
        self.matcher = Arc::new(matcher);
        self
    }

    #[must_use]
    pub fn with_response_factory(mut self, responses: impl ResponseFactory + 'static) -> Self {
        self.responses = Arc::new(responses);
        self
    }
}

impl Middleware for ModifiedSinceMiddleware {
    fn handle(&self, ctx: Context, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        let Some(last_modified) = self.resolver.resolve(ctx.request()) else {
            trace!(path = %ctx.request().path(), "no last-modified time resolved, skipping");
            return Box::pin(next.run(ctx));
        };

        let verdict = self.matcher.match_modified(ctx.request().headers(), last_modified);
        let cache = ctx.cache().clone();

        if verdict.has_if_modified_since_header {
            if !verdict.is_modified_since {
                debug!(last_modified, "not modified since, responding 304");
                cache.lock().set_last_modified(last_modified);
                let response = self.responses.make(StatusCode::NotModified);
                return Box::pin(async move { response });
            }

            return Box::pin(async move {
                let response = next.run(ctx).await;
                cache.lock().set_last_modified_if_absent(last_modified);
                response
            });
        }

        if verdict.has_if_unmodified_since_header {
            if !verdict.is_unmodified_since {
                debug!(last_modified, "modified since precondition date, responding 412");
                cache.lock().set_last_modified_if_absent(last_modified);
                let response = self.responses.make(StatusCode::PreconditionFailed);
                return Box::pin(async move { response });
            }

            return Box::pin(async move {
                let response = next.run(ctx).await;
                cache.lock().set_last_modified_if_absent(last_modified);
                response
            });
        }

        trace!("no date preconditions, passing through");
        Box::pin(next.run(ctx))
    }
}
