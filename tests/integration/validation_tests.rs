//! Request validation tests.
//!
//! Every rejection here must happen before the source is fetched, so each
//! test also checks the mock fetcher was never called.

use axum::http::StatusCode;

use pixrelay::{Operation, OptionDefaults, Settings};

use super::test_utils::{create_png, get_image, query, test_router, MockFetcher, SOURCE_URL};

fn fetcher() -> MockFetcher {
    MockFetcher::new().with_image(SOURCE_URL, create_png(40, 20), "image/png")
}

/// Run `pairs` against `settings` and assert a rejection with no fetch.
async fn assert_rejected(
    settings: Settings,
    pairs: &[(&str, &str)],
    status: StatusCode,
    error_code: &str,
) -> serde_json::Value {
    let fetcher = fetcher();
    let response = get_image(test_router(settings, fetcher.clone()), &query(pairs)).await;

    assert_eq!(response.status, status, "body: {:?}", response.json());
    assert_eq!(response.error_code(), error_code);
    assert_eq!(fetcher.fetch_count(), 0, "rejected request was fetched");
    response.json()
}

// =============================================================================
// Operations
// =============================================================================

#[tokio::test]
async fn test_disallowed_operation() {
    let settings = Settings::default().with_allowed_operations([Operation::Resize]);
    let body = assert_rejected(
        settings,
        &[("url", SOURCE_URL), ("op", "rotate"), ("deg", "90")],
        StatusCode::BAD_REQUEST,
        "operation_error",
    )
    .await;
    assert_eq!(body["error"], "Unsupported operation");
    assert_eq!(body["status_code"], 400);
}

#[tokio::test]
async fn test_unknown_operation() {
    assert_rejected(
        Settings::default(),
        &[("url", SOURCE_URL), ("op", "resize,blur"), ("w", "10")],
        StatusCode::BAD_REQUEST,
        "operation_error",
    )
    .await;
}

#[tokio::test]
async fn test_too_many_operations() {
    let settings = Settings::default().with_max_operations(1);
    let body = assert_rejected(
        settings,
        &[
            ("url", SOURCE_URL),
            ("op", "resize,rotate"),
            ("w", "10"),
            ("deg", "90"),
        ],
        StatusCode::BAD_REQUEST,
        "operation_error",
    )
    .await;
    assert_eq!(body["error"], "Too many operations");
}

#[tokio::test]
async fn test_operation_checked_before_url() {
    let settings = Settings::default().with_allowed_operations([Operation::Resize]);
    assert_rejected(
        settings,
        &[("op", "rotate")],
        StatusCode::BAD_REQUEST,
        "operation_error",
    )
    .await;
}

// =============================================================================
// URL and Host
// =============================================================================

#[tokio::test]
async fn test_missing_url() {
    let body = assert_rejected(
        Settings::default(),
        &[("w", "10")],
        StatusCode::BAD_REQUEST,
        "url_error",
    )
    .await;
    assert_eq!(body["error"], "Missing url");
}

#[tokio::test]
async fn test_schemeless_url_without_base() {
    let body = assert_rejected(
        Settings::default(),
        &[("url", "/a.jpg"), ("w", "10")],
        StatusCode::BAD_REQUEST,
        "url_error",
    )
    .await;
    assert_eq!(body["error"], "Unsupported protocol");

    assert_rejected(
        Settings::default(),
        &[("url", "ftp://example.com/a.jpg"), ("w", "10")],
        StatusCode::BAD_REQUEST,
        "url_error",
    )
    .await;
}

#[tokio::test]
async fn test_root_relative_url_with_base_is_accepted() {
    let fetcher = MockFetcher::new();
    let settings = Settings::default().with_implicit_base_url("https://example.com");

    let response = get_image(
        test_router(settings, fetcher.clone()),
        &query(&[("url", "/a.jpg"), ("w", "10")]),
    )
    .await;

    // Validation passed; the mock has nothing at that URL
    assert_eq!(response.error_code(), "fetch_error");
    assert_eq!(fetcher.fetched_urls(), vec!["/a.jpg".to_string()]);
}

#[tokio::test]
async fn test_host_not_allowed() {
    let settings = Settings::default().with_allowed_hosts(["cdn.example.com"]);
    let body = assert_rejected(
        settings,
        &[("url", SOURCE_URL), ("w", "10")],
        StatusCode::FORBIDDEN,
        "host_error",
    )
    .await;
    assert_eq!(body["error"], "Invalid host");
}

#[tokio::test]
async fn test_relative_url_checked_against_base_host() {
    let settings = Settings::default()
        .with_implicit_base_url("https://other.example.com")
        .with_allowed_hosts(["images.example.com"]);
    assert_rejected(
        settings,
        &[("url", "/a.jpg"), ("w", "10")],
        StatusCode::FORBIDDEN,
        "host_error",
    )
    .await;
}

#[tokio::test]
async fn test_allowed_host_passes() {
    let fetcher = fetcher();
    let settings = Settings::default().with_allowed_hosts(["images.example.com"]);

    let response = get_image(
        test_router(settings, fetcher.clone()),
        &query(&[("url", SOURCE_URL), ("w", "10")]),
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(fetcher.fetch_count(), 1);
}

// =============================================================================
// Per-operation Arguments
// =============================================================================

#[tokio::test]
async fn test_resize_limits() {
    let body = assert_rejected(
        Settings::default(),
        &[("url", SOURCE_URL), ("w", "20000")],
        StatusCode::BAD_REQUEST,
        "dimensions_error",
    )
    .await;
    assert_eq!(body["error"], "Exceeds maximum allowed width");

    assert_rejected(
        Settings::default().with_max_resize(100, 50),
        &[("url", SOURCE_URL), ("h", "51")],
        StatusCode::BAD_REQUEST,
        "dimensions_error",
    )
    .await;
}

#[tokio::test]
async fn test_resize_requires_dimensions() {
    let body = assert_rejected(
        Settings::default(),
        &[("url", SOURCE_URL)],
        StatusCode::BAD_REQUEST,
        "dimensions_error",
    )
    .await;
    assert_eq!(body["error"], "Missing dimensions");

    assert_rejected(
        Settings::default(),
        &[("url", SOURCE_URL), ("w", "ten")],
        StatusCode::BAD_REQUEST,
        "dimensions_error",
    )
    .await;
}

#[tokio::test]
async fn test_invalid_degree() {
    for deg in ["360", "-90", "left", ""] {
        assert_rejected(
            Settings::default(),
            &[("url", SOURCE_URL), ("op", "rotate"), ("deg", deg)],
            StatusCode::BAD_REQUEST,
            "dimensions_error",
        )
        .await;
    }
}

#[tokio::test]
async fn test_invalid_rectangle() {
    for rect in ["0,0,10", "0,0,0,10", "a,b,c,d", "-1,0,10,10"] {
        assert_rejected(
            Settings::default(),
            &[("url", SOURCE_URL), ("op", "region"), ("rect", rect)],
            StatusCode::BAD_REQUEST,
            "dimensions_error",
        )
        .await;
    }
}

#[tokio::test]
async fn test_watermark_arguments() {
    let body = assert_rejected(
        Settings::default(),
        &[("url", SOURCE_URL), ("op", "watermark")],
        StatusCode::BAD_REQUEST,
        "dimensions_error",
    )
    .await;
    assert_eq!(
        body["error"],
        "Watermark requires either watermark_img or watermark_txt"
    );

    let body = assert_rejected(
        Settings::default(),
        &[("url", SOURCE_URL), ("op", "watermark"), ("watermark_txt", "")],
        StatusCode::BAD_REQUEST,
        "dimensions_error",
    )
    .await;
    assert_eq!(body["error"], "Watermark text cannot be empty");

    // Empty text is rejected even next to an image
    assert_rejected(
        Settings::default(),
        &[
            ("url", SOURCE_URL),
            ("op", "watermark"),
            ("watermark_txt", ""),
            ("watermark_img", "http://images.example.com/mark.png"),
        ],
        StatusCode::BAD_REQUEST,
        "dimensions_error",
    )
    .await;

    assert_rejected(
        Settings::default(),
        &[
            ("url", SOURCE_URL),
            ("op", "watermark"),
            ("watermark_img", "file:///etc/passwd"),
        ],
        StatusCode::BAD_REQUEST,
        "dimensions_error",
    )
    .await;
}

// =============================================================================
// Option Sanity
// =============================================================================

#[tokio::test]
async fn test_invalid_options() {
    let cases = [
        ("mode", "zoom", "mode_error"),
        ("filter", "sharp", "filter_error"),
        ("pos", "middle", "position_error"),
        ("bg", "ggg", "background_error"),
        ("fmt", "bmp", "format_error"),
        ("q", "101", "quality_error"),
        ("retain", "100", "retain_error"),
        ("opt", "maybe", "optimize_error"),
    ];

    for (name, value, code) in cases {
        assert_rejected(
            Settings::default(),
            &[("url", SOURCE_URL), ("w", "10"), (name, value)],
            StatusCode::BAD_REQUEST,
            code,
        )
        .await;
    }
}

#[tokio::test]
async fn test_configured_default_is_used() {
    let fetcher = fetcher();
    let settings = Settings::default().with_defaults(OptionDefaults {
        format: Some("webp".to_string()),
        ..OptionDefaults::default()
    });

    let response = get_image(
        test_router(settings, fetcher),
        &query(&[("url", SOURCE_URL), ("w", "10")]),
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.content_type(), Some("image/webp"));
}

#[tokio::test]
async fn test_request_value_overrides_default() {
    let fetcher = fetcher();
    let settings = Settings::default().with_defaults(OptionDefaults {
        format: Some("webp".to_string()),
        ..OptionDefaults::default()
    });

    let response = get_image(
        test_router(settings, fetcher),
        &query(&[("url", SOURCE_URL), ("w", "10"), ("fmt", "png")]),
    )
    .await;

    assert_eq!(response.content_type(), Some("image/png"));
}
