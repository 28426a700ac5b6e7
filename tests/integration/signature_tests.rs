//! Signed query and client name tests.

use axum::http::StatusCode;

use pixrelay::{QuerySigner, Settings};

use super::test_utils::{create_png, get_image, query, test_router, MockFetcher, SOURCE_URL};

const KEY: &str = "integration-test-key";

fn settings() -> Settings {
    Settings::default().with_client("gallery", KEY)
}

fn fetcher() -> MockFetcher {
    MockFetcher::new().with_image(SOURCE_URL, create_png(40, 20), "image/png")
}

fn unsigned() -> String {
    query(&[("url", SOURCE_URL), ("w", "10"), ("client", "gallery")])
}

#[tokio::test]
async fn test_valid_signature() {
    let fetcher = fetcher();
    let signed = QuerySigner::new(KEY).signed_query(&unsigned());

    let response = get_image(test_router(settings(), fetcher.clone()), &signed).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(fetcher.fetch_count(), 1);
}

#[tokio::test]
async fn test_signature_position_does_not_matter() {
    let signature = QuerySigner::new(KEY).sign_query(&unsigned());
    let reordered = format!("sig={}&{}", signature, unsigned());

    let response = get_image(test_router(settings(), fetcher()), &reordered).await;

    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_missing_signature() {
    let fetcher = fetcher();
    let response = get_image(test_router(settings(), fetcher.clone()), &unsigned()).await;

    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.error_code(), "signature_error");
    assert_eq!(response.json()["error"], "Invalid signature");
    assert_eq!(fetcher.fetch_count(), 0);
}

#[tokio::test]
async fn test_tampered_query() {
    let fetcher = fetcher();
    let signed = QuerySigner::new(KEY).signed_query(&unsigned());
    let tampered = signed.replace("w=10", "w=11");

    let response = get_image(test_router(settings(), fetcher.clone()), &tampered).await;

    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.error_code(), "signature_error");
    assert_eq!(fetcher.fetch_count(), 0);
}

#[tokio::test]
async fn test_wrong_key() {
    let signed = QuerySigner::new("some-other-key").signed_query(&unsigned());

    let response = get_image(test_router(settings(), fetcher()), &signed).await;

    assert_eq!(response.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_signature_checked_before_client() {
    // Wrong client and no signature: the signature failure wins
    let raw = query(&[("url", SOURCE_URL), ("w", "10"), ("client", "intruder")]);

    let response = get_image(test_router(settings(), fetcher()), &raw).await;

    assert_eq!(response.error_code(), "signature_error");
}

#[tokio::test]
async fn test_invalid_client() {
    let fetcher = fetcher();
    let raw = query(&[("url", SOURCE_URL), ("w", "10"), ("client", "intruder")]);
    let signed = QuerySigner::new(KEY).signed_query(&raw);

    let response = get_image(test_router(settings(), fetcher.clone()), &signed).await;

    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.error_code(), "client_error");
    assert_eq!(response.json()["error"], "Invalid client");
    assert_eq!(fetcher.fetch_count(), 0);
}

#[tokio::test]
async fn test_client_without_key() {
    let mut settings = Settings::default();
    settings.client_name = Some("gallery".to_string());

    let missing = get_image(
        test_router(settings.clone(), fetcher()),
        &query(&[("url", SOURCE_URL), ("w", "10")]),
    )
    .await;
    assert_eq!(missing.error_code(), "client_error");

    let ok = get_image(test_router(settings, fetcher()), &unsigned()).await;
    assert_eq!(ok.status, StatusCode::OK);
}
