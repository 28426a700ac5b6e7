//! HTTP request handlers.
//!
//! # Endpoints
//!
//! - `GET /?url=...&op=...` - Fetch, transform and return an image
//! - `GET /ping` - Liveness check

use std::sync::Arc;

use axum::{
    extract::{RawQuery, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::error::{ImageError, ProxyError};
use crate::fetch::SourceFetcher;
use crate::pipeline::OperationPipeline;
use crate::request::{validate, ImageQuery};
use crate::settings::Settings;

use super::render::render_image;

// =============================================================================
// Application State
// =============================================================================

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub fetcher: Arc<dyn SourceFetcher>,
}

impl AppState {
    pub fn new(settings: Settings, fetcher: impl SourceFetcher + 'static) -> Self {
        Self {
            settings: Arc::new(settings),
            fetcher: Arc::new(fetcher),
        }
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON body returned for every classified error.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// HTTP status code
    pub status_code: u16,

    /// Stable error identifier (e.g. "url_error")
    pub error_code: String,

    /// Human-readable error message
    pub error: String,
}

impl ErrorResponse {
    pub fn from_error(err: &ProxyError) -> Self {
        Self {
            status_code: err.status().as_u16(),
            error_code: err.code(),
            error: err.to_string(),
        }
    }
}

/// Liveness check response.
#[derive(Debug, Serialize)]
pub struct PingResponse {
    pub message: String,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Convert ProxyError to HTTP response.
///
/// Fetch failures are logged at DEBUG (the cause was already logged by the
/// fetcher), security rejections at WARN, everything else at DEBUG.
impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorResponse::from_error(&self);

        match &self {
            ProxyError::Signature(_) | ProxyError::Client(_) | ProxyError::Host(_) => {
                warn!(
                    error_code = %body.error_code,
                    status = status.as_u16(),
                    "Request rejected: {}",
                    body.error
                );
            }
            _ => {
                debug!(
                    error_code = %body.error_code,
                    status = status.as_u16(),
                    "Client error: {}",
                    body.error
                );
            }
        }

        (status, Json(body)).into_response()
    }
}

/// Failure of an image request.
///
/// Only [`ProxyError`] reaches the client with detail; codec faults and
/// worker failures become a bare 500.
#[derive(Debug)]
pub enum HandlerError {
    Proxy(ProxyError),
    Image(ImageError),
    Task(String),
}

impl From<ProxyError> for HandlerError {
    fn from(err: ProxyError) -> Self {
        HandlerError::Proxy(err)
    }
}

impl From<ImageError> for HandlerError {
    fn from(err: ImageError) -> Self {
        HandlerError::Image(err)
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        match self {
            HandlerError::Proxy(err) => err.into_response(),
            HandlerError::Image(err) => {
                error!(error = %err, "Image processing failed");
                internal_error()
            }
            HandlerError::Task(message) => {
                error!(error = %message, "Image worker failed");
                internal_error()
            }
        }
    }
}

fn internal_error() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle `GET /`.
///
/// Validation runs to completion before anything is fetched. The source
/// (and, for image watermarks, the mark) is then fetched through the
/// shared fetcher, transformed on the blocking pool and streamed back.
pub async fn image_handler(
    State(state): State<AppState>,
    RawQuery(raw_query): RawQuery,
) -> Result<Response, HandlerError> {
    let raw_query = raw_query.unwrap_or_default();
    let query = ImageQuery::parse(&raw_query);
    let request = validate(&query, &raw_query, &state.settings)?;

    debug!(
        url = %request.url,
        operations = ?request.plan.operations,
        "Image request accepted"
    );

    let source = state.fetcher.fetch(&request.url).await?;

    let mark: Option<Bytes> = match &request.plan.watermark {
        Some(params) if !request.plan.is_passthrough() => match &params.image_url {
            Some(url) => Some(state.fetcher.fetch(url).await?.body),
            None => None,
        },
        _ => None,
    };

    let from_format = request.format_requested || state.settings.content_type_from_image;
    let plan = request.plan;
    let settings = Arc::clone(&state.settings);
    let body = source.body.clone();

    let output = tokio::task::spawn_blocking(move || {
        OperationPipeline::new(&plan)
            .with_watermark_image(mark.as_deref())
            .with_font(settings.watermark_font.as_ref())
            .run(body)
    })
    .await
    .map_err(|e| HandlerError::Task(e.to_string()))??;

    Ok(render_image(output, &source, from_format))
}

/// Handle `GET /ping`.
pub async fn ping_handler() -> Json<PingResponse> {
    Json(PingResponse {
        message: "success".to_string(),
    })
}
