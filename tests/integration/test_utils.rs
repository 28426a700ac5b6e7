//! Test utilities for integration tests.
//!
//! This module provides a mock fetcher that counts and records every fetch,
//! helpers for building source images, and helpers for driving the router.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Request, StatusCode};
use axum::Router;
use bytes::Bytes;
use http_body_util::BodyExt;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use url::form_urlencoded;

use pixrelay::{create_router_with_config, AppState, FetchResult, ProxyError, RouterConfig};
use pixrelay::{Settings, SourceFetcher};

// =============================================================================
// Mock Fetcher with Request Tracking
// =============================================================================

/// An in-memory fetcher that tracks every fetch.
///
/// Unknown URLs fail with a fetch error, like an upstream 404.
#[derive(Clone, Default)]
pub struct MockFetcher {
    responses: HashMap<String, FetchResult>,
    fetch_count: Arc<AtomicUsize>,
    fetched: Arc<Mutex<Vec<String>>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` at `url` with the given Content-Type.
    pub fn with_image(mut self, url: &str, body: Bytes, content_type: &str) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::CONTENT_TYPE,
            HeaderValue::from_str(content_type).unwrap(),
        );
        self.responses.insert(
            url.to_string(),
            FetchResult {
                body,
                headers,
                content_type: Some(content_type.to_string()),
            },
        );
        self
    }

    /// Add an upstream header to an already registered URL.
    pub fn with_header(mut self, url: &str, name: &'static str, value: &str) -> Self {
        let result = self.responses.get_mut(url).expect("url registered");
        result.headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_str(value).unwrap(),
        );
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }

    pub fn fetched_urls(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResult, ProxyError> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        self.fetched.lock().unwrap().push(url.to_string());

        self.responses
            .get(url)
            .cloned()
            .ok_or_else(|| ProxyError::Fetch("Failed to fetch image".to_string()))
    }
}

// =============================================================================
// Image Builders
// =============================================================================

/// Encode an image with the given format.
pub fn encode(img: &DynamicImage, format: ImageFormat) -> Bytes {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, format).unwrap();
    Bytes::from(buf.into_inner())
}

/// A `width`x`height` PNG: left half red, right half blue.
pub fn create_png(width: u32, height: u32) -> Bytes {
    let img = RgbImage::from_fn(width, height, |x, _| {
        if x < width / 2 {
            Rgb([255, 0, 0])
        } else {
            Rgb([0, 0, 255])
        }
    });
    encode(&DynamicImage::ImageRgb8(img), ImageFormat::Png)
}

/// A `width`x`height` JPEG of a horizontal gradient.
pub fn create_jpeg(width: u32, height: u32) -> Bytes {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 255 / width.max(1)) as u8, (y * 255 / height.max(1)) as u8, 128])
    });
    encode(&DynamicImage::ImageRgb8(img), ImageFormat::Jpeg)
}

/// A fully opaque single-colour RGBA PNG, used as a watermark.
pub fn create_mark(width: u32, height: u32, color: [u8; 4]) -> Bytes {
    let img = RgbaImage::from_pixel(width, height, Rgba(color));
    encode(&DynamicImage::ImageRgba8(img), ImageFormat::Png)
}

/// Decode a response body.
pub fn decode(body: &[u8]) -> DynamicImage {
    image::load_from_memory(body).expect("response body is an image")
}

// =============================================================================
// Router Helpers
// =============================================================================

pub const SOURCE_URL: &str = "http://images.example.com/photo.png";

/// Router without request tracing.
pub fn test_router(settings: Settings, fetcher: MockFetcher) -> Router {
    create_router_with_config(
        AppState::new(settings, fetcher),
        RouterConfig::default().with_tracing(false),
    )
}

/// Percent-encode query pairs in order.
pub fn query(pairs: &[(&str, &str)]) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}

/// Response parts of a request, with the body collected.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("JSON body")
    }

    pub fn error_code(&self) -> String {
        self.json()["error_code"].as_str().unwrap_or_default().to_string()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get("content-type")
            .and_then(|value| value.to_str().ok())
    }
}

/// Issue `GET uri` against `router`.
pub async fn get(router: Router, uri: &str) -> TestResponse {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = router.oneshot(request).await.unwrap();

    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes();

    TestResponse {
        status,
        headers,
        body,
    }
}

/// Issue `GET /?<query>`.
pub async fn get_image(router: Router, query: &str) -> TestResponse {
    get(router, &format!("/?{}", query)).await
}
