//! pixrelay - an on-demand image transformation proxy.
//!
//! This binary parses the command line, builds the shared settings and
//! fetcher, and runs the HTTP server until a termination signal.

use std::future::IntoFuture;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pixrelay::{
    config::{Cli, Command, ServeConfig, SignConfig, SignOutputFormat},
    fetch::HttpFetcher,
    server::{
        block_on_then_abandon, create_router_with_config, shutdown_signal,
        signature::strip_signature, AppState, DrainOutcome, QuerySigner, RouterConfig,
        ShutdownCoordinator,
    },
};

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Serve(config) => {
            let runtime = match build_runtime(config.workers) {
                Ok(runtime) => runtime,
                Err(e) => {
                    eprintln!("Error: failed to start runtime: {}", e);
                    return ExitCode::FAILURE;
                }
            };
            block_on_then_abandon(runtime, run_serve(config))
        }
        Command::Sign(config) => run_sign(config),
    }
}

/// Multi-threaded runtime with `workers` threads (0 = one per CPU).
fn build_runtime(workers: usize) -> std::io::Result<tokio::runtime::Runtime> {
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if workers > 0 {
        builder.worker_threads(workers);
    }
    builder.build()
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    init_logging(config.debug);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let settings = match config.to_settings() {
        Ok(settings) => settings,
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let fetcher = match HttpFetcher::new(&settings) {
        Ok(fetcher) => fetcher,
        Err(e) => {
            error!("Failed to build HTTP client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("pixrelay v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Max concurrent fetches: {}", settings.max_requests);
    info!("  Fetch timeout: {:?}", settings.timeout);
    info!(
        "  Max resize: {}x{}",
        settings.max_resize_width, settings.max_resize_height
    );
    if settings.allowed_hosts.is_empty() {
        info!("  Allowed hosts: any");
    } else {
        info!("  Allowed hosts: {}", config.allowed_hosts.join(", "));
    }
    if let Some(base) = &settings.implicit_base_url {
        info!("  Implicit base URL: {}", base);
    }

    if settings.client_key.is_some() {
        info!("  Signatures: required");
    } else {
        warn!("  Signatures: DISABLED - any query is accepted");
        warn!("        Enable for production: --client-key=<key>");
    }
    if !settings.validate_cert {
        warn!("  Upstream certificate validation is DISABLED");
    }
    if settings.watermark_font.is_none() {
        info!("  Text watermarks unavailable (no --watermark-font)");
    }

    let router_config = RouterConfig::default().with_tracing(!config.no_tracing);
    let router = create_router_with_config(AppState::new(settings, fetcher), router_config);

    let addr = config.bind_address();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    info!("Listening on http://{}", addr);
    info!("  curl http://{}/ping", addr);

    let coordinator = ShutdownCoordinator::new();
    let server = axum::serve(listener, router)
        .with_graceful_shutdown(coordinator.draining())
        .into_future();

    match coordinator.run(server, shutdown_signal()).await {
        DrainOutcome::Quiescent => info!("Server stopped"),
        DrainOutcome::DeadlineElapsed => {
            warn!("Server stopped with requests still in flight")
        }
    }

    ExitCode::SUCCESS
}

/// Initialize the tracing/logging subsystem.
fn init_logging(debug: bool) {
    let env_filter = if debug {
        "pixrelay=debug,tower_http=debug"
    } else {
        "pixrelay=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

// =============================================================================
// Sign Command
// =============================================================================

fn run_sign(config: SignConfig) -> ExitCode {
    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    let signer = QuerySigner::new(&config.key);
    let query = signer.signed_query(config.query());
    let signature = signer.sign_query(&strip_signature(config.query()));
    let url = config
        .base_url
        .as_deref()
        .map(|base| format!("{}/?{}", base.trim_end_matches('/'), query));

    match config.format {
        SignOutputFormat::Query => println!("{}", query),
        SignOutputFormat::Signature => println!("{}", signature),
        SignOutputFormat::Url => match url {
            Some(url) => println!("{}", url),
            None => println!("?{}", query),
        },
        SignOutputFormat::Json => {
            let json = serde_json::json!({
                "signature": signature,
                "query": query,
                "url": url,
            });
            match serde_json::to_string_pretty(&json) {
                Ok(text) => println!("{}", text),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    return ExitCode::FAILURE;
                }
            }
        }
    }

    ExitCode::SUCCESS
}

