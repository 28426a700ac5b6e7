//! HTTP server layer.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │                            HTTP Layer                              │
//! │                     GET /?url=...    GET /ping                     │
//! │                                                                    │
//! │  ┌──────────┐  ┌──────────┐  ┌───────────┐  ┌──────────────────┐   │
//! │  │ handlers │  │  render  │  │ signature │  │     shutdown     │   │
//! │  │(requests)│  │(headers, │  │  (HMAC    │  │ (drain deadline) │   │
//! │  │          │  │ chunks)  │  │  queries) │  │                  │   │
//! │  └──────────┘  └──────────┘  └───────────┘  └──────────────────┘   │
//! └────────────────────────────────────────────────────────────────────┘
//! ```

pub mod handlers;
pub mod render;
pub mod routes;
pub mod shutdown;
pub mod signature;

pub use handlers::{image_handler, ping_handler, AppState, ErrorResponse, HandlerError, PingResponse};
pub use render::{render_image, CHUNK_SIZE, FORWARD_HEADERS};
pub use routes::{create_router, create_router_with_config, RouterConfig};
pub use shutdown::{block_on_then_abandon, shutdown_signal, DrainOutcome, ServerState, ShutdownCoordinator};
pub use signature::QuerySigner;
