//! # pixrelay
//!
//! An on-demand image transformation proxy.
//!
//! A client asks for an image by URL together with a chain of operations.
//! pixrelay validates the request, fetches the source over HTTP, applies
//! the operations in order and streams the re-encoded result back.
//!
//! ## Features
//!
//! - **Operations**: `region`, `resize` (adapt/clip/crop/fill/scale), `rotate`,
//!   `watermark` (text or image) and `noop`, chained in request order
//! - **Signed requests**: optional HMAC-SHA256 query signatures and client names
//! - **Host allow-list**: restrict where source images may come from
//! - **Bounded fetching**: a shared semaphore caps concurrent upstream requests
//! - **Graceful shutdown**: in-flight requests get a fixed drain deadline
//!
//! ## Architecture
//!
//! - [`request`] - query parsing, option resolution and validation
//! - [`codec`] - decoding, transforms, watermarks and encoding
//! - [`pipeline`] - applies a validated operation chain to source bytes
//! - [`fetch`] - upstream HTTP fetching
//! - [`server`] - Axum-based HTTP server, signatures and shutdown
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use pixrelay::{create_router, AppState, HttpFetcher, Settings};
//!
//! #[tokio::main]
//! async fn main() {
//!     let settings = Settings::default()
//!         .with_client("my-app", "my-secret-key")
//!         .with_allowed_hosts(["images.example.com"]);
//!
//!     let fetcher = HttpFetcher::new(&settings).unwrap();
//!     let router = create_router(AppState::new(settings, fetcher));
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8888").await.unwrap();
//!     axum::serve(listener, router).await.unwrap();
//! }
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod fetch;
pub mod pipeline;
pub mod request;
pub mod server;
pub mod settings;

// Re-export commonly used types
pub use codec::{Image, OutputFormat, WatermarkFont};
pub use config::{Cli, Command, ServeConfig, SignConfig, SignOutputFormat};
pub use error::{FetcherBuildError, ImageError, ProxyError};
pub use fetch::{resolve_url, FetchResult, HttpFetcher, SourceFetcher};
pub use pipeline::{OperationPipeline, PipelineOutput};
pub use request::{validate, ImageQuery, Operation, TransformPlan, ValidatedRequest};
pub use server::{
    create_router, create_router_with_config, image_handler, ping_handler, shutdown_signal,
    AppState, DrainOutcome, ErrorResponse, QuerySigner, RouterConfig, ServerState,
    ShutdownCoordinator,
};
pub use settings::{OptionDefaults, Settings};
