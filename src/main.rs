use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Result, anyhow};
use sqlx::SqlitePool;
use tracing::{error, info, warn};

use bookshelf_api::{AppState, Config, build_rate_limiter, build_router, db, services::UserService};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,bookshelf_api=debug,sqlx=warn".into()),
        )
        .json()
        .init();

    info!("Starting Bookshelf API v{}", env!("CARGO_PKG_VERSION"));

    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    let db = connect_with_retry(&config.database_url, config.db_max_connections)
        .await
        .map_err(|e| anyhow!("Failed to open the database after retries: {e}"))?;

    info!("Running database migrations...");
    db::migrate(&db)
        .await
        .map_err(|e| anyhow!("Migration failed: {e}"))?;
    info!("Database migrations completed successfully");

    if let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) {
        UserService::new(&db)
            .seed_admin(email, password)
            .await
            .map_err(|e| anyhow!("Admin bootstrap failed: {e}"))?;
    }

    let rate_limiter = build_rate_limiter(config.rate_limit_per_minute);

    let state = Arc::new(AppState {
        db,
        config: config.clone(),
        rate_limiter,
    });

    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow!("Server error: {e}"))?;

    info!("Server shut down gracefully");
    Ok(())
}

async fn connect_with_retry(database_url: &str, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
    let mut delay = Duration::from_millis(500);
    let max_attempts = 30;
    let mut attempt = 1;

    loop {
        match db::connect(database_url, max_connections).await {
            Ok(pool) => {
                info!("Connected to the database on attempt {attempt}");
                return Ok(pool);
            }
            Err(e) if attempt >= max_attempts => {
                error!("All connection attempts failed");
                return Err(e);
            }
            Err(e) => {
                warn!(
                    "Database connection failed (attempt {}/{}): {e}, retrying in {:?}",
                    attempt, max_attempts, delay
                );
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(Duration::from_secs(5));
                attempt += 1;
            }
        }
    }
}

// Graceful shutdown on Ctrl+C (SIGINT) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {e}");
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
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("Received Ctrl+C"); }
        () = terminate => { info!("Received SIGTERM"); }
    }

    info!("Shutdown signal received, closing server...");
}
