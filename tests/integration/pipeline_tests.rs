//! End-to-end pixel checks for the operation pipeline.
//!
//! Tests verify:
//! - Image watermarks are fetched through the shared fetcher and composited
//! - Fill mode pads with the requested background
//! - EXIF is carried over to JPEG output only when asked for

use axum::http::StatusCode;
use image::{GenericImageView, Rgba};

use pixrelay::codec::jpeg::{exif_segment, insert_segment};
use pixrelay::Settings;

use super::test_utils::{
    create_jpeg, create_mark, create_png, decode, get_image, query, test_router, MockFetcher,
    SOURCE_URL,
};

const MARK_URL: &str = "http://images.example.com/mark.png";

// =============================================================================
// Watermark
// =============================================================================

#[tokio::test]
async fn test_image_watermark_bottom_right() {
    let fetcher = MockFetcher::new()
        .with_image(SOURCE_URL, create_png(40, 20), "image/png")
        .with_image(MARK_URL, create_mark(10, 10, [0, 255, 0, 255]), "image/png");
    let router = test_router(Settings::default(), fetcher.clone());

    let response = get_image(
        router,
        &query(&[
            ("url", SOURCE_URL),
            ("op", "watermark"),
            ("watermark_img", MARK_URL),
        ]),
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        fetcher.fetched_urls(),
        vec![SOURCE_URL.to_string(), MARK_URL.to_string()]
    );

    // 25% of 40px wide, anchored bottom-right
    let img = decode(&response.body);
    assert_eq!(img.dimensions(), (40, 20));
    assert_eq!(img.get_pixel(35, 15), Rgba([0, 255, 0, 255]));
    assert_eq!(img.get_pixel(35, 5), Rgba([0, 0, 255, 255]));
    assert_eq!(img.get_pixel(5, 15), Rgba([255, 0, 0, 255]));
}

#[tokio::test]
async fn test_watermark_ratio_and_position() {
    let fetcher = MockFetcher::new()
        .with_image(SOURCE_URL, create_png(40, 20), "image/png")
        .with_image(MARK_URL, create_mark(10, 10, [0, 255, 0, 255]), "image/png");
    let router = test_router(Settings::default(), fetcher);

    let response = get_image(
        router,
        &query(&[
            ("url", SOURCE_URL),
            ("op", "watermark"),
            ("watermark_img", MARK_URL),
            ("watermark_pos", "top-left"),
            ("watermark_img_ratio", "0.5"),
        ]),
    )
    .await;

    let img = decode(&response.body);
    assert_eq!(img.get_pixel(2, 2), Rgba([0, 255, 0, 255]));
    assert_eq!(img.get_pixel(18, 18), Rgba([0, 255, 0, 255]));
    assert_eq!(img.get_pixel(25, 2), Rgba([0, 0, 255, 255]));
}

#[tokio::test]
async fn test_missing_watermark_image_is_fetch_error() {
    let fetcher = MockFetcher::new().with_image(SOURCE_URL, create_png(40, 20), "image/png");
    let router = test_router(Settings::default(), fetcher.clone());

    let response = get_image(
        router,
        &query(&[
            ("url", SOURCE_URL),
            ("op", "watermark"),
            ("watermark_img", MARK_URL),
        ]),
    )
    .await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.error_code(), "fetch_error");
    assert_eq!(fetcher.fetch_count(), 2);
}

#[tokio::test]
async fn test_noop_skips_watermark_fetch() {
    let fetcher = MockFetcher::new().with_image(SOURCE_URL, create_png(40, 20), "image/png");
    let router = test_router(Settings::default(), fetcher.clone());

    let response = get_image(
        router,
        &query(&[
            ("url", SOURCE_URL),
            ("op", "watermark,noop"),
            ("watermark_img", MARK_URL),
        ]),
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(fetcher.fetched_urls(), vec![SOURCE_URL.to_string()]);
}

// =============================================================================
// Resize Modes
// =============================================================================

#[tokio::test]
async fn test_fill_pads_with_background() {
    let fetcher = MockFetcher::new().with_image(SOURCE_URL, create_png(40, 20), "image/png");
    let router = test_router(Settings::default(), fetcher);

    let response = get_image(
        router,
        &query(&[
            ("url", SOURCE_URL),
            ("w", "40"),
            ("h", "40"),
            ("mode", "fill"),
            ("bg", "00ff00"),
        ]),
    )
    .await;

    let img = decode(&response.body);
    assert_eq!(img.dimensions(), (40, 40));
    assert_eq!(img.get_pixel(20, 2), Rgba([0, 255, 0, 255]));
    assert_eq!(img.get_pixel(5, 20), Rgba([255, 0, 0, 255]));
    assert_eq!(img.get_pixel(20, 37), Rgba([0, 255, 0, 255]));
}

#[tokio::test]
async fn test_clip_never_enlarges() {
    let fetcher = MockFetcher::new().with_image(SOURCE_URL, create_png(40, 20), "image/png");
    let router = test_router(Settings::default(), fetcher);

    let response = get_image(
        router,
        &query(&[
            ("url", SOURCE_URL),
            ("w", "400"),
            ("h", "400"),
            ("mode", "clip"),
        ]),
    )
    .await;

    assert_eq!(decode(&response.body).dimensions(), (40, 20));
}

// =============================================================================
// EXIF
// =============================================================================

fn jpeg_with_exif() -> bytes::Bytes {
    // Little-endian TIFF header with an empty IFD
    let payload: &[u8] = b"II\x2a\x00\x08\x00\x00\x00\x00\x00\x00\x00\x00\x00";
    let mut segment = vec![0xFF, 0xE1];
    let len = (2 + 6 + payload.len()) as u16;
    segment.extend_from_slice(&len.to_be_bytes());
    segment.extend_from_slice(b"Exif\0\0");
    segment.extend_from_slice(payload);

    bytes::Bytes::from(insert_segment(create_jpeg(32, 32).to_vec(), &segment))
}

#[tokio::test]
async fn test_exif_preserved_on_request() {
    let source = jpeg_with_exif();
    assert!(exif_segment(&source).is_some());
    let fetcher = MockFetcher::new().with_image(SOURCE_URL, source, "image/jpeg");

    let kept = get_image(
        test_router(Settings::default(), fetcher.clone()),
        &query(&[("url", SOURCE_URL), ("w", "16"), ("exif", "1")]),
    )
    .await;
    let dropped = get_image(
        test_router(Settings::default(), fetcher),
        &query(&[("url", SOURCE_URL), ("w", "16")]),
    )
    .await;

    assert_eq!(kept.status, StatusCode::OK);
    assert!(exif_segment(&kept.body).is_some());
    assert!(exif_segment(&dropped.body).is_none());
    assert_eq!(decode(&kept.body).dimensions(), (16, 16));
}
