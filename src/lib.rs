//! # revalidate
//!
//! HTTP conditional-request middleware (RFC 7232) for async Rust services.
//!
//! A request passes through three stages before reaching your handler:
//!
//! 1. [`CacheHeaderMiddleware`](middleware::CacheHeaderMiddleware) stamps
//!    `ETag`, `Last-Modified`, and `Cache-Control` on the way out.
//! 2. [`EtagMatchMiddleware`](middleware::EtagMatchMiddleware) answers
//!    `If-None-Match` with `304` and a failed `If-Match` with `412`.
//! 3. [`ModifiedSinceMiddleware`](middleware::ModifiedSinceMiddleware) does the
//!    same for `If-Modified-Since` / `If-Unmodified-Since`.
//!
//! The stages communicate through a per-request
//! [`CacheContext`](cache::CacheContext), which handlers may also write to.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use revalidate::cache::Etag;
//! use revalidate::context::Context;
//! use revalidate::pipeline::Pipeline;
//! use revalidate::server::Server;
//! use revalidate::{Request, Response, StatusCode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pipeline = Pipeline::builder(|ctx: Context| async move {
//!         ctx.cache().lock().set_max_age(60).set_public();
//!         Response::new(StatusCode::Ok).body("Hello, World!")
//!     })
//!     .etag_resolver(|_: &Request| Some(Etag::strong("hello-v1")))
//!     .build()?;
//!
//!     let server = Server::bind("127.0.0.1:8080").await?;
//!     println!("Listening on http://127.0.0.1:8080");
//!     server.run(pipeline).await?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod context;
pub mod http;
pub mod middleware;
pub mod pipeline;
pub mod resolver;
pub mod server;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use cache::{CacheConfig, CacheContext, ConfigError, Etag};
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use server::{Server, ServerError};
