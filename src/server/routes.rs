//! Router configuration.
//!
//! # Route Structure
//!
//! ```text
//! /       - Image transformation (validated per request)
//! /ping   - Liveness check (no validation)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use pixrelay::fetch::HttpFetcher;
//! use pixrelay::server::{create_router, AppState};
//! use pixrelay::Settings;
//!
//! let settings = Settings::default();
//! let fetcher = HttpFetcher::new(&settings)?;
//! let router = create_router(AppState::new(settings, fetcher));
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8888").await?;
//! axum::serve(listener, router).await?;
//! ```

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use super::handlers::{image_handler, ping_handler, AppState};

/// Configuration for the HTTP router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Whether to enable request tracing
    pub enable_tracing: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            enable_tracing: true,
        }
    }
}

impl RouterConfig {
    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

/// Create the application router with default configuration.
pub fn create_router(state: AppState) -> Router {
    create_router_with_config(state, RouterConfig::default())
}

/// Create the application router.
pub fn create_router_with_config(state: AppState, config: RouterConfig) -> Router {
    let router = Router::new()
        .route("/", get(image_handler))
        .route("/ping", get(ping_handler))
        .with_state(state);

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}
