//! Serves a small in-memory article store with validators.
//!
//! ```text
//! cargo run --example conditional_get [config.json]
//!
//! curl -i http://127.0.0.1:8080/articles?id=1
//! curl -i -H 'If-None-Match: "article-1-v3"' http://127.0.0.1:8080/articles?id=1
//! curl -i -X PUT -H 'If-Match: "stale"' http://127.0.0.1:8080/articles?id=1
//! ```
//!
//! Set `RUST_LOG=revalidate=debug` to see every precondition decision.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use revalidate::cache::{CacheConfig, Etag};
use revalidate::context::Context;
use revalidate::pipeline::Pipeline;
use revalidate::server::Server;
use revalidate::{Request, Response, StatusCode};
use tracing_subscriber::EnvFilter;

struct Article {
    version: u32,
    updated_at: u64,
    body: &'static str,
}

type Store = Arc<HashMap<String, Article>>;

fn seed() -> Store {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();

    let mut articles = HashMap::new();
    articles.insert(
        "1".to_owned(),
        Article {
            version: 3,
            updated_at: now.saturating_sub(3600),
            body: "Conditional requests save bandwidth.",
        },
    );
    articles.insert(
        "2".to_owned(),
        Article {
            version: 1,
            updated_at: now.saturating_sub(86_400),
            body: "Weak validators compare by meaning, not bytes.",
        },
    );
    Arc::new(articles)
}

fn load_config() -> Result<CacheConfig, Box<dyn std::error::Error>> {
    match std::env::args().nth(1) {
        Some(path) => Ok(CacheConfig::from_json(&std::fs::read_to_string(path)?)?),
        None => Ok(CacheConfig::from_json(
            r#"{ "cache_control": { "max-age": 60, "visibility": "public", "must-revalidate": true } }"#,
        )?),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("revalidate=info")),
        )
        .compact()
        .init();

    let store = seed();

    let etags = Arc::clone(&store);
    let times = Arc::clone(&store);
    let bodies = Arc::clone(&store);

    let pipeline = Pipeline::builder(move |ctx: Context| {
        let store = Arc::clone(&bodies);
        async move {
            match ctx.request().query_param("id").and_then(|id| store.get(id)) {
                Some(article) => Response::new(StatusCode::Ok).body(article.body),
                None => {
                    // never cache misses
                    ctx.cache().lock().set_no_store();
                    Response::new(StatusCode::NotFound).body("no such article")
                }
            }
        }
    })
    .etag_resolver(move |req: &Request| {
        let id = req.query_param("id")?;
        let article = etags.get(id)?;
        Some(Etag::strong(format!("article-{id}-v{}", article.version)))
    })
    .last_modified_resolver(move |req: &Request| {
        times.get(req.query_param("id")?).map(|article| article.updated_at)
    })
    .config(load_config()?)
    .build()?;

    let addr = std::env::var("REVALIDATE_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_owned());
    let server = Server::bind(&addr).await?;
    println!("Listening on http://{}", server.local_addr());
    server.run(pipeline).await?;
    Ok(())
}
