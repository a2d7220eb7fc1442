//! docconv-server – entry point.
//!
//! Startup order:
//! 1. Parse configuration from environment variables.
//! 2. Initialise structured tracing (JSON in production, pretty in dev).
//! 3. Prepare the scratch directory and wire the converters.
//! 4. Start the scratch sweeper in a background task.
//! 5. Build the Axum router and start the HTTP server with graceful shutdown.

mod config;
mod download;
mod error;
mod middleware;
mod routes;
mod schemas;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use docconv_core::{
    ConversionService, Dispatcher, OfficeConverter, PdfToDocxConverter, ProcessInvoker, ScratchDir,
};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::Config;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Configuration ───────────────────────────────────────────────────────
    let cfg = Config::from_env()?;

    // ── 2. Tracing ─────────────────────────────────────────────────────────────
    // Held until exit so buffered file logs are flushed.
    let _log_guard = init_tracing(&cfg);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        variant = %cfg.variant,
        "docconv-server starting"
    );

    // ── 3. Scratch directory + converters ──────────────────────────────────────
    let scratch = ScratchDir::create(&cfg.tmp_dir)?;
    info!(tmp_dir = %scratch.path().display(), "scratch directory ready");

    let invoker = ProcessInvoker::new(cfg.convert_timeout);
    let office = OfficeConverter::new(&cfg.office_bin, invoker)
        .with_isolated_profile(cfg.isolate_profile);
    let pdf_to_docx = PdfToDocxConverter::new(&cfg.pdf2docx_bin, invoker);
    let dispatcher = Dispatcher::new(Arc::new(office), Arc::new(pdf_to_docx));
    info!(
        office_bin = %cfg.office_bin.display(),
        pdf2docx_bin = %cfg.pdf2docx_bin.display(),
        timeout_secs = cfg.convert_timeout.as_secs(),
        "converters configured"
    );

    let service = ConversionService::new(scratch.clone(), cfg.variant, dispatcher);

    // ── 4. Scratch sweeper ─────────────────────────────────────────────────────
    if let Some(interval) = cfg.sweep_interval {
        let max_age = cfg.sweep_max_age;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let scratch = scratch.clone();
                match tokio::task::spawn_blocking(move || scratch.sweep(max_age)).await {
                    Ok(Ok(0)) => debug!("scratch sweep found nothing to remove"),
                    Ok(Ok(removed)) => info!(removed, "scratch sweep removed stale entries"),
                    Ok(Err(e)) => warn!(error = %e, "scratch sweep failed"),
                    Err(e) => warn!(error = %e, "scratch sweep task panicked"),
                }
            }
        });
    }

    // ── 5. HTTP server with graceful shutdown ──────────────────────────────────
    let addr: SocketAddr = cfg.bind_address().parse()?;
    let state = Arc::new(AppState {
        config: Arc::new(cfg),
        service: Arc::new(service),
    });
    let app = routes::build(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("docconv-server stopped");
    Ok(())
}

/// Install the global subscriber: stdout always, plus a daily-rolling file
/// when `DOCCONV_LOG_DIR` is set.
fn init_tracing(cfg: &Config) -> Option<WorkerGuard> {
    // Build the log-level filter, warning loudly if the configured value is
    // not a valid tracing filter expression.
    let env_filter = || match EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match cfg.log_level.parse::<EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: DOCCONV_LOG='{}' is not a valid tracing filter ({}); \
                     falling back to 'info'",
                    cfg.log_level, e
                );
                EnvFilter::new("info")
            }
        },
    };

    let stdout_layer = if cfg.log_json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_filter(env_filter())
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_filter(env_filter())
            .boxed()
    };

    let (file_layer, guard) = match &cfg.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "docconv-server.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(env_filter())
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .init();

    guard
}

/// Returns a future that resolves when SIGINT (Ctrl-C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received; starting graceful shutdown");
}
