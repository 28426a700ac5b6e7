//! Graceful shutdown coordination.
//!
//! ```text
//!            signal                 quiescent or deadline
//! RUNNING ───────────► DRAINING ───────────────────────────► STOPPED
//! ```
//!
//! The current state is published on a `watch` channel. Entering
//! `DRAINING` releases the future handed to axum's
//! `with_graceful_shutdown`, so the listener stops accepting at once. The
//! coordinator then ticks every [`POLL_INTERVAL`] until the server future
//! finishes on its own or [`DRAIN_DEADLINE`] has passed since the signal,
//! at which point the server future is dropped with whatever is still in
//! flight.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{error, info, warn};

/// Time in-flight requests get after a termination signal.
pub const DRAIN_DEADLINE: Duration = Duration::from_secs(5);

/// How often the drain loop checks the deadline.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Server lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Running,
    Draining,
    Stopped,
}

/// How the server came to a stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// The server future completed (no work left, or it failed)
    Quiescent,
    /// The deadline passed with work still in flight
    DeadlineElapsed,
}

/// Drives the `RUNNING -> DRAINING -> STOPPED` state machine.
#[derive(Debug)]
pub struct ShutdownCoordinator {
    state: watch::Sender<ServerState>,
    deadline: Duration,
    poll_interval: Duration,
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::with_timing(DRAIN_DEADLINE, POLL_INTERVAL)
    }

    /// Coordinator with a custom deadline and poll interval.
    pub fn with_timing(deadline: Duration, poll_interval: Duration) -> Self {
        let (state, _) = watch::channel(ServerState::Running);
        Self {
            state,
            deadline,
            poll_interval,
        }
    }

    pub fn state(&self) -> ServerState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ServerState> {
        self.state.subscribe()
    }

    /// Move from `RUNNING` to `DRAINING`. Returns `false` if already past it.
    pub fn begin_drain(&self) -> bool {
        self.state.send_if_modified(|state| {
            if *state == ServerState::Running {
                *state = ServerState::Draining;
                true
            } else {
                false
            }
        })
    }

    fn stop(&self) {
        self.state.send_replace(ServerState::Stopped);
    }

    /// Resolves once the coordinator leaves `RUNNING`.
    ///
    /// Pass this to `axum::serve(..).with_graceful_shutdown`.
    pub fn draining(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.subscribe();
        async move {
            // A closed channel means the coordinator is gone: stop too
            let _ = rx.wait_for(|state| *state != ServerState::Running).await;
        }
    }

    /// Run `server` until `trigger` fires, then drain with a deadline.
    ///
    /// `server` should be the graceful-shutdown future wired to
    /// [`ShutdownCoordinator::draining`].
    pub async fn run<S, E, T>(&self, server: S, trigger: T) -> DrainOutcome
    where
        S: Future<Output = Result<(), E>>,
        E: std::fmt::Display,
        T: Future<Output = ()>,
    {
        tokio::pin!(server);

        tokio::select! {
            result = &mut server => {
                if let Err(e) = result {
                    error!(error = %e, "Server error");
                }
                self.stop();
                return DrainOutcome::Quiescent;
            }
            () = trigger => {
                self.begin_drain();
            }
        }

        let started = Instant::now();
        info!(
            deadline_secs = self.deadline.as_secs_f64(),
            "Draining: no longer accepting connections"
        );

        let mut ticker = tokio::time::interval_at(started + self.poll_interval, self.poll_interval);
        loop {
            tokio::select! {
                result = &mut server => {
                    if let Err(e) = result {
                        error!(error = %e, "Server error while draining");
                    }
                    info!("Drained, stopping");
                    self.stop();
                    return DrainOutcome::Quiescent;
                }
                _ = ticker.tick() => {
                    let elapsed = started.elapsed();
                    if elapsed >= self.deadline {
                        warn!("Drain deadline reached, abandoning in-flight requests");
                        self.stop();
                        return DrainOutcome::DeadlineElapsed;
                    }
                    info!(
                        remaining_secs = (self.deadline - elapsed).as_secs_f64(),
                        "Waiting for in-flight requests"
                    );
                }
            }
        }
    }
}

/// Drive `future` on `runtime`, then tear the runtime down without
/// waiting for blocking work.
///
/// Dropping a runtime joins every `spawn_blocking` task, so an image still
/// being transformed would keep the process alive past the drain deadline.
pub fn block_on_then_abandon<F: Future>(runtime: tokio::runtime::Runtime, future: F) -> F::Output {
    let output = runtime.block_on(future);
    runtime.shutdown_background();
    output
}

/// Resolves on SIGINT (Ctrl-C) or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            warn!("Caught SIGINT, shutting down");
        },
        () = terminate => {
            warn!("Caught SIGTERM, shutting down");
        },
    }
}
