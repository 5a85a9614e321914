//! BottleGate Server: bottle deposit captive portal.
//!
//! Main entry point that wires all crates together and starts the server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, fmt};

use bottlegate_access::{
    EnforcerDispatch, IdentityResolver, InsertionSweeper, SessionController, SessionStoreDispatch,
    SystemClock, SystemMacResolver,
};
use bottlegate_api::{AppState, build_app};
use bottlegate_core::config::{AppConfig, SessionBackend};
use bottlegate_core::error::AppError;
use bottlegate_database::DatabasePool;

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
}

/// Load configuration from `config/` and the environment.
///
/// `BOTTLEGATE_CONFIG` points at an explicit file; otherwise
/// `config/default.toml` is overlaid with `config/{BOTTLEGATE_ENV}.toml`.
fn load_configuration() -> Result<AppConfig, AppError> {
    if let Ok(path) = std::env::var("BOTTLEGATE_CONFIG") {
        return AppConfig::load_file(&path);
    }

    let env = std::env::var("BOTTLEGATE_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load(&env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        backend = ?config.session.backend,
        mock_sensor = config.mock_sensor,
        "Starting BottleGate"
    );

    // ── Step 1: Database connection + migrations ─────────────────
    let db = match config.session.backend {
        SessionBackend::Postgres => {
            let db = DatabasePool::connect(&config.database).await?;
            bottlegate_database::migration::run_migrations(db.pool()).await?;
            Some(db)
        }
        SessionBackend::Memory => {
            tracing::warn!("Using the in-memory session store; sessions are lost on restart");
            None
        }
    };

    // ── Step 2: Session store, identity, enforcement ─────────────
    let store = Arc::new(SessionStoreDispatch::from_config(
        &config.session,
        db.as_ref(),
    )?);
    let identity = Arc::new(IdentityResolver::new(Arc::new(SystemMacResolver::new(
        config.network.clone(),
    ))));
    let enforcer = Arc::new(EnforcerDispatch::from_config(
        &config.enforcement,
        config.mock_sensor,
    )?);
    let clock = Arc::new(SystemClock);

    // ── Step 3: Controller + timer reconciliation ────────────────
    let controller = Arc::new(SessionController::new(
        store.clone(),
        enforcer,
        clock.clone(),
        config.session.clone(),
    ));
    controller.reconciler().reconcile().await?;

    // ── Step 4: Insertion sweeper ────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = InsertionSweeper::new(store, clock, &config.session);
    let sweeper_handle = tokio::spawn(async move {
        sweeper.run(shutdown_rx).await;
    });

    // ── Step 5: Build and start HTTP server ──────────────────────
    let config = Arc::new(config);
    let state = AppState::new(
        config.clone(),
        controller.clone(),
        identity,
        db.map(DatabasePool::into_pool),
    );
    let app = build_app(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {addr}: {e}")))?;

    tracing::info!(address = %addr, "BottleGate server listening");

    // ── Step 6: Graceful shutdown ────────────────────────────────
    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received, starting graceful shutdown...");
        let _ = shutdown_tx.send(true);
    });

    server
        .await
        .map_err(|e| AppError::internal(format!("Server error: {e}")))?;

    let grace = Duration::from_secs(config.server.shutdown_grace_seconds);
    if tokio::time::timeout(grace, sweeper_handle).await.is_err() {
        tracing::warn!("Insertion sweeper did not stop in time");
    }
    controller.scheduler().shutdown();

    tracing::info!("BottleGate server shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
