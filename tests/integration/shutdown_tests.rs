//! Graceful shutdown tests against a real listener.

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Notify};

use pixrelay::{DrainOutcome, ServerState, Settings, ShutdownCoordinator};

use super::test_utils::{test_router, MockFetcher};

/// Serve `router` under a coordinator; the returned sender triggers the drain.
async fn serve(
    router: Router,
    coordinator: Arc<ShutdownCoordinator>,
) -> (
    std::net::SocketAddr,
    oneshot::Sender<()>,
    tokio::task::JoinHandle<DrainOutcome>,
) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (trigger, signal) = oneshot::channel::<()>();

    let server = axum::serve(listener, router)
        .with_graceful_shutdown(coordinator.draining())
        .into_future();
    let handle = tokio::spawn(async move {
        coordinator
            .run(server, async {
                let _ = signal.await;
            })
            .await
    });

    (addr, trigger, handle)
}

#[tokio::test]
async fn test_drain_stops_accepting() {
    let coordinator = Arc::new(ShutdownCoordinator::with_timing(
        Duration::from_secs(2),
        Duration::from_millis(50),
    ));
    let router = test_router(Settings::default(), MockFetcher::new());
    let (addr, trigger, handle) = serve(router, Arc::clone(&coordinator)).await;

    let client = reqwest::Client::new();
    let ping = client
        .get(format!("http://{}/ping", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(ping.status(), reqwest::StatusCode::OK);
    drop(client);

    trigger.send(()).unwrap();
    let outcome = handle.await.unwrap();

    assert_eq!(outcome, DrainOutcome::Quiescent);
    assert_eq!(coordinator.state(), ServerState::Stopped);
    assert!(tokio::net::TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn test_deadline_abandons_in_flight_requests() {
    let deadline = Duration::from_millis(300);
    let coordinator = Arc::new(ShutdownCoordinator::with_timing(
        deadline,
        Duration::from_millis(50),
    ));

    let entered = Arc::new(Notify::new());
    let router = {
        let entered = Arc::clone(&entered);
        Router::new().route(
            "/hang",
            get(move || {
                let entered = Arc::clone(&entered);
                async move {
                    entered.notify_one();
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    "late"
                }
            }),
        )
    };
    let (addr, trigger, handle) = serve(router, Arc::clone(&coordinator)).await;

    let request = tokio::spawn(async move {
        reqwest::get(format!("http://{}/hang", addr)).await
    });
    entered.notified().await;

    let started = Instant::now();
    trigger.send(()).unwrap();
    let outcome = handle.await.unwrap();

    assert_eq!(outcome, DrainOutcome::DeadlineElapsed);
    assert_eq!(coordinator.state(), ServerState::Stopped);
    assert!(started.elapsed() >= deadline);
    assert!(started.elapsed() < deadline + Duration::from_secs(1));

    request.abort();
}
