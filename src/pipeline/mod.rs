//! Composition root: wires the conditional stages around an endpoint handler.
//!
//! A [`Pipeline`] is assembled once at startup through [`PipelineBuilder`] and
//! then shared by every connection. Each call to [`Pipeline::dispatch`] gets
//! its own [`Context`] and [`CacheContext`]; nothing is shared between
//! requests apart from the immutable stages themselves.
//!
//! Stage order, outermost first:
//!
//! | Stage                         | Present when                          |
//! |-------------------------------|---------------------------------------|
//! | [`CacheHeaderMiddleware`]     | always                                |
//! | [`EtagMatchMiddleware`]       | an ETag resolver is configured        |
//! | [`ModifiedSinceMiddleware`]   | a last-modified resolver is configured|

use std::sync::Arc;

use tracing::{Instrument, debug, debug_span};

use crate::cache::{CacheConfig, CacheContext, ConditionalMatcher, ConfigError, Rfc7232Matcher};
use crate::context::Context;
use crate::http::{EmptyResponseFactory, ResponseFactory};
use crate::middleware::{
    CacheHeaderMiddleware, EtagMatchMiddleware, Handler, IntoHandler, Middleware,
    MiddlewareHandler, ModifiedSinceMiddleware, Next, from_middleware, into_handler,
};
use crate::resolver::{EtagResolver, LastModifiedResolver};
use crate::{Request, Response};

/// A ready-to-serve middleware stack.
///
/// Cheap to clone; clones share the same stages and handler.
///
/// # Examples
///
/// ```rust,no_run
/// use revalidate::cache::Etag;
/// use revalidate::context::Context;
/// use revalidate::pipeline::Pipeline;
/// use revalidate::{Request, Response, StatusCode};
///
/// # async fn demo() -> Result<(), revalidate::cache::ConfigError> {
/// let pipeline = Pipeline::builder(|_ctx: Context| async {
///     Response::new(StatusCode::Ok).body("hello")
/// })
///     .etag_resolver(|_: &Request| Some(Etag::strong("v1")))
///     .build()?;
///
/// let (request, _) = Request::parse(b"GET / HTTP/1.1\r\nIf-None-Match: \"v1\"\r\n\r\n").unwrap();
/// let response = pipeline.dispatch(request).await;
/// assert_eq!(response.status(), StatusCode::NotModified);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Pipeline {
    middlewares: Arc<[MiddlewareHandler]>,
    endpoint: Handler,
    // Every request starts from a clone of this.
    template: Arc<CacheContext>,
}

impl Pipeline {
    /// Starts building a pipeline around `handler`.
    pub fn builder(handler: impl IntoHandler) -> PipelineBuilder {
        PipelineBuilder::new(into_handler(handler))
    }

    /// Runs `request` through the stages and the handler.
    pub async fn dispatch(&self, request: Request) -> Response {
        let span = debug_span!("dispatch", method = %request.method(), path = %request.path());
        let ctx = Context::with_cache(request, CacheContext::clone(&self.template));
        let next = Next::new(Arc::clone(&self.middlewares), Arc::clone(&self.endpoint));

        async move {
            let response = next.run(ctx).await;
            debug!(status = %response.status(), "request completed");
            response
        }
        .instrument(span)
        .await
    }

    /// Number of middleware stages in front of the handler.
    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }
}

/// Collects the collaborators of a [`Pipeline`].
///
/// Everything but the handler is optional; [`build`](Self::build) validates
/// the configuration.
pub struct PipelineBuilder {
    endpoint: Handler,
    etag_resolver: Option<Arc<dyn EtagResolver>>,
    last_modified_resolver: Option<Arc<dyn LastModifiedResolver>>,
    matcher: Arc<dyn ConditionalMatcher>,
    responses: Arc<dyn ResponseFactory>,
    config: CacheConfig,
    inner: Vec<MiddlewareHandler>,
}

impl PipelineBuilder {
    fn new(endpoint: Handler) -> Self {
        Self {
            endpoint,
            etag_resolver: None,
            last_modified_resolver: None,
            matcher: Arc::new(Rfc7232Matcher),
            responses: Arc::new(EmptyResponseFactory),
            config: CacheConfig::default(),
            inner: Vec::new(),
        }
    }

    /// Enables the ETag stage.
    #[must_use]
    pub fn etag_resolver(mut self, resolver: impl EtagResolver + 'static) -> Self {
        self.etag_resolver = Some(Arc::new(resolver));
        self
    }

    /// Enables the Modified-Since stage.
    #[must_use]
    pub fn last_modified_resolver(mut self, resolver: impl LastModifiedResolver + 'static) -> Self {
        self.last_modified_resolver = Some(Arc::new(resolver));
        self
    }

    /// Replaces the matcher used by both conditional stages.
    #[must_use]
    pub fn matcher(mut self, matcher: impl ConditionalMatcher + 'static) -> Self {
        self.matcher = Arc::new(matcher);
        self
    }

    /// Replaces the factory for `304` / `412` responses.
    #[must_use]
    pub fn response_factory(mut self, responses: impl ResponseFactory + 'static) -> Self {
        self.responses = Arc::new(responses);
        self
    }

    #[must_use]
    pub fn config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Adds an application middleware between the conditional stages and the
    /// handler. Added middleware run in insertion order.
    #[must_use]
    pub fn middleware(mut self, middleware: impl Middleware + 'static) -> Self {
        self.inner.push(from_middleware(Arc::new(middleware)));
        self
    }

    /// Validates the configuration and assembles the stack.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the [`CacheConfig`] is invalid.
    pub fn build(self) -> Result<Pipeline, ConfigError> {
        self.config.validate()?;

        let mut middlewares = vec![from_middleware(Arc::new(CacheHeaderMiddleware::new()))];
        if let Some(resolver) = self.etag_resolver {
            middlewares.push(from_middleware(Arc::new(EtagMatchMiddleware::from_parts(
                resolver,
                Arc::clone(&self.matcher),
                Arc::clone(&self.responses),
            ))));
        }
        if let Some(resolver) = self.last_modified_resolver {
            middlewares.push(from_middleware(Arc::new(
                ModifiedSinceMiddleware::from_parts(
                    resolver,
                    Arc::clone(&self.matcher),
                    Arc::clone(&self.responses),
                ),
            )));
        }
        middlewares.extend(self.inner);

        debug!(stages = middlewares.len(), "pipeline built");
        Ok(Pipeline {
            middlewares: Arc::from(middlewares),
            endpoint: self.endpoint,
            template: Arc::new(CacheContext::from_config(&self.config)),
        })
    }
}
