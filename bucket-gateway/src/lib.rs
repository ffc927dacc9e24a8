//! # bucket-gateway: presigned access to an object-storage bucket
//!
//! `bucket-gateway` sits between client applications and an object-storage bucket so that
//! clients never hold storage credentials. The gateway holds them and, per request, either
//! hands out a short-lived presigned upload URL, lists keys, or deletes an object on the
//! client's behalf.
//!
//! ## Request Flow
//!
//! There is one path-routed endpoint. The path (minus its leading `/`) is the object name,
//! the method selects the operation and a small set of headers selects where an upload goes:
//!
//! 1. The `code` header must be present and non-empty, otherwise the request is rejected
//!    before any storage call.
//! 2. `GET` presigns `standards*` object names as-is, or lists `{code}/gallery/` for
//!    `gallery*` object names.
//! 3. `POST`/`PUT` read `code` from the JSON body, pick a [`routing::Category`] from the
//!    request headers and presign an upload to `{code}/{category}/{object_name}`.
//! 4. `DELETE` removes the object stored at the object name.
//!
//! Each request makes exactly one logical storage call and shares no mutable state with
//! other requests.
//!
//! ## Core Components
//!
//! - [`api`]: the dispatcher handler and its request/response bodies
//! - [`routing`]: the category priority table and key construction
//! - [`storage`]: the [`storage::ObjectStorage`] trait with S3 and in-memory backends
//! - [`config`]: YAML + environment configuration
//! - [`telemetry`]: tracing setup with optional OTLP export
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use bucket_gateway::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = bucket_gateway::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     bucket_gateway::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```
pub mod api;
pub mod config;
pub mod errors;
pub mod routing;
pub mod storage;
pub mod telemetry;

#[cfg(test)]
pub mod test_utils;

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderName, HeaderValue, Method, header::CONTENT_TYPE},
    routing::get,
};
use bon::Builder;
pub use config::Config;
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info};

use crate::{
    api::handlers::objects::{self, CODE_HEADER},
    config::{CorsConfig, CorsOrigin},
    routing::Category,
    storage::ObjectStorage,
};

/// Application state shared across all request handlers.
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .config(config)
///     .storage(storage)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub storage: Arc<dyn ObjectStorage>,
}

/// Build the CORS layer, or `None` when no origin is allowed.
///
/// Preflights must allow the `code` header and every category header, since browsers send
/// them as custom headers.
fn create_cors_layer(config: &CorsConfig) -> anyhow::Result<Option<CorsLayer>> {
    if config.allowed_origins.is_empty() {
        return Ok(None);
    }

    let allow_origin = if config.allowed_origins.iter().any(|origin| matches!(origin, CorsOrigin::Wildcard)) {
        AllowOrigin::any()
    } else {
        let mut origins = Vec::new();
        for origin in &config.allowed_origins {
            if let CorsOrigin::Url(url) = origin {
                origins.push(url.origin().ascii_serialization().parse::<HeaderValue>()?);
            }
        }
        AllowOrigin::list(origins)
    };

    let mut allowed_headers = vec![CONTENT_TYPE, HeaderName::from_static(CODE_HEADER)];
    allowed_headers.extend(Category::PRIORITY.iter().map(|category| HeaderName::from_static(category.header_name())));

    let mut cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(allowed_headers);

    if let Some(max_age) = config.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(Some(cors))
}

/// Build the application router.
///
/// `GET /healthz` is answered directly; every other request, including other methods on
/// `/healthz`, goes to the object dispatcher.
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    let mut router = Router::new()
        .route("/healthz", get(|| async { "OK" }).fallback(objects::dispatch))
        .fallback(objects::dispatch)
        .layer(DefaultBodyLimit::max(state.config.max_body_size))
        .with_state(state.clone());

    if let Some(cors_layer) = create_cors_layer(&state.config.cors)? {
        router = router.layer(cors_layer);
    }

    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// Main application struct.
///
/// 1. **Create**: [`Application::new`] builds the storage backend from configuration and
///    assembles the router
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and starts handling requests
/// 3. **Shutdown**: when the shutdown future resolves, in-flight requests drain and
///    telemetry is flushed
pub struct Application {
    router: Router,
    config: Config,
}

impl Application {
    /// Create a new application instance with the configured storage backend
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting gateway with configuration: {:#?}", config);

        let storage = storage::create_storage(&config.storage, &config.presign).await;
        Self::with_storage(config, storage)
    }

    /// Create an application around an already constructed storage backend
    pub fn with_storage(config: Config, storage: Arc<dyn ObjectStorage>) -> anyhow::Result<Self> {
        info!("Using object storage bucket '{}'", storage.bucket());

        let app_state = AppState::builder().config(config.clone()).storage(storage).build();
        let router = build_router(&app_state)?;

        Ok(Self { router, config })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("Gateway listening on http://{}", bind_addr);

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
