//! Response rendering for transformed images.

use std::convert::Infallible;

use axum::body::Body;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use http::header::{CACHE_CONTROL, CONTENT_TYPE, EXPIRES, LAST_MODIFIED};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};

use crate::codec::OutputFormat;
use crate::fetch::FetchResult;
use crate::pipeline::PipelineOutput;

/// Size of each body chunk written to the client.
pub const CHUNK_SIZE: usize = 65536;

/// Upstream headers copied onto the response when present and non-empty.
pub const FORWARD_HEADERS: [HeaderName; 3] = [CACHE_CONTROL, EXPIRES, LAST_MODIFIED];

/// MIME type for an encoded output format.
pub fn mime_type(format: OutputFormat) -> &'static str {
    match format {
        OutputFormat::Gif => "image/gif",
        OutputFormat::Jpeg => "image/jpeg",
        OutputFormat::Png => "image/png",
        OutputFormat::Webp => "image/webp",
        OutputFormat::Tiff => "image/tiff",
    }
}

/// Split `data` into [`CHUNK_SIZE`] slices without copying.
pub fn chunks(data: Bytes) -> impl Iterator<Item = Bytes> {
    let len = data.len();
    (0..len)
        .step_by(CHUNK_SIZE)
        .map(move |start| data.slice(start..usize::min(start + CHUNK_SIZE, len)))
}

/// Resolve the headers of an image response.
///
/// When `from_format` is set and the pipeline encoded the image, the
/// Content-Type follows the encoded format; otherwise the upstream
/// Content-Type is forwarded unchanged.
pub fn response_headers(
    output_format: Option<OutputFormat>,
    upstream: &FetchResult,
    from_format: bool,
) -> HeaderMap {
    let mut headers = HeaderMap::new();

    match output_format {
        Some(format) if from_format => {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(mime_type(format)));
        }
        _ => {
            if let Some(value) = upstream.headers.get(CONTENT_TYPE) {
                headers.insert(CONTENT_TYPE, value.clone());
            }
        }
    }

    for name in FORWARD_HEADERS {
        if let Some(value) = upstream.headers.get(&name) {
            if !value.is_empty() {
                headers.insert(name, value.clone());
            }
        }
    }

    headers
}

/// Build the streamed 200 response for a pipeline result.
pub fn render_image(output: PipelineOutput, upstream: &FetchResult, from_format: bool) -> Response {
    let headers = response_headers(output.format, upstream, from_format);
    let stream = futures::stream::iter(chunks(output.data).map(Ok::<_, Infallible>));

    (StatusCode::OK, headers, Body::from_stream(stream)).into_response()
}
