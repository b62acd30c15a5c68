//! Majstor Backend Service
//!
//! Main entry point for the trades marketplace backend.
//! This service provides:
//! - REST API for customers, providers and admins
//! - WebSocket server for real-time bid and chat notifications
//! - Background sweep that expires stale cases

use anyhow::Context;
use majstor_backend::auth::JwtKeys;
use majstor_backend::config::{AppConfig, StorageBackend};
use majstor_backend::database::{create_pool, run_migrations, Database};
use majstor_backend::repositories::Repositories;
use majstor_backend::services::{AuditTrailService, CaseExpirySweeper};
use majstor_backend::websocket::WebSocketServer;
use majstor_backend::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "majstor_backend={},tower_http=info,sqlx=warn",
            config.log_level
        )
        .into()
    });

    if config.log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(false)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables first
    dotenv::dotenv().ok();

    let config = AppConfig::from_env().map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    init_tracing(&config);

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║           Majstor Backend Service Starting               ║");
    info!("╚══════════════════════════════════════════════════════════╝");
    info!("Environment: {}", config.environment);
    info!("Log level: {}", config.log_level);
    info!("Storage backend: {}", config.storage.as_str());
    info!("HTTP port: {}", config.http_port);
    if let Some(ws_port) = config.ws_port {
        info!("WebSocket port: {}", ws_port);
    }

    // =========================================================================
    // STORAGE SETUP
    // =========================================================================
    let (repos, database) = match config.storage {
        StorageBackend::Postgres => {
            info!("Connecting to database...");
            let pool = create_pool(&config.database)
                .await
                .context("Failed to create database pool")?;
            info!("Database connection pool created successfully");
            info!("Max connections: {}", config.database.max_connections);

            info!("Running migrations from {}...", config.database.migrations_path);
            let applied = run_migrations(&pool, &config.database)
                .await
                .context("Database migration failed")?;
            info!("Database schema up to date ({} migrations)", applied);

            (Repositories::postgres(pool.clone()), Some(Database::new(pool)))
        }
        StorageBackend::Memory => {
            if config.is_production() {
                warn!("In-memory storage selected in production");
            }
            warn!("Using in-memory storage - data is lost on restart");
            (Repositories::in_memory(), None)
        }
    };

    // =========================================================================
    // CORE SERVICES INITIALIZATION
    // =========================================================================
    info!("Initializing core services...");

    let ws_server = WebSocketServer::new().with_access(JwtKeys::new(&config.auth), repos.clone());
    info!("✓ WebSocket hub initialized");

    let audit_log_dir = PathBuf::from(&config.audit_log_dir);
    if let Err(e) = std::fs::create_dir_all(&audit_log_dir) {
        warn!("Could not create audit log directory: {}", e);
    }
    let audit = match AuditTrailService::new(audit_log_dir) {
        Ok(audit) => {
            info!("✓ Audit trail service initialized");
            audit
        }
        Err(e) => {
            warn!("Audit trail disabled: {}", e);
            AuditTrailService::disabled()
        }
    };

    let expiry = config.expiry.clone();
    let http_port = config.http_port;
    let ws_port = config.ws_port;
    let environment = config.environment.clone();

    let state = AppState::new(config, repos, ws_server.clone(), Arc::new(audit), database);
    info!("✓ Application state initialized");

    // =========================================================================
    // BACKGROUND TASKS
    // =========================================================================
    let sweep_secs = expiry.sweep_interval_secs;
    let sweeper = CaseExpirySweeper::new(state.cases.clone(), expiry);
    let sweeper_handle = tokio::spawn(async move {
        sweeper.start().await;
    });
    info!("✓ Case expiry sweeper started ({}s interval)", sweep_secs);

    // =========================================================================
    // START SERVERS
    // =========================================================================
    let ws_handle = if let Some(ws_port) = ws_port {
        let ws_addr = SocketAddr::from(([0, 0, 0, 0], ws_port));
        let listener = TcpListener::bind(ws_addr)
            .await
            .with_context(|| format!("Failed to bind WebSocket server on {}", ws_addr))?;

        let ws = ws_server.clone();
        let handle = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        info!("New WebSocket connection from {}", addr);
                        let ws = ws.clone();
                        tokio::spawn(async move {
                            if let Err(e) = ws.handle_connection(stream).await {
                                error!("WebSocket connection error: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("WebSocket accept error: {}", e);
                    }
                }
            }
        });

        info!("✓ WebSocket server started on {}", ws_addr);
        Some(handle)
    } else {
        warn!("WS_PORT not configured - WebSocket server not started");
        None
    };

    let http_addr = SocketAddr::from(([0, 0, 0, 0], http_port));
    let listener = TcpListener::bind(http_addr)
        .await
        .with_context(|| format!("Failed to bind HTTP server on {}", http_addr))?;
    let app = majstor_backend::app(state);

    let http_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("HTTP server error: {}", e);
        }
    });
    info!("✓ HTTP server started on {}", http_addr);

    // =========================================================================
    // READY
    // =========================================================================
    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║           Majstor Backend Service Ready!                 ║");
    info!("╠══════════════════════════════════════════════════════════╣");
    info!("║  REST API:     0.0.0.0:{}/api/v1", http_port);
    if let Some(ws_port) = ws_port {
        info!("║  WebSocket:    0.0.0.0:{}", ws_port);
    }
    info!("║  Environment:  {}", environment);
    info!("╚══════════════════════════════════════════════════════════╝");
    info!("Press Ctrl+C to shutdown gracefully");

    // =========================================================================
    // SHUTDOWN HANDLING
    // =========================================================================
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received, shutting down gracefully...");
        }
        _ = http_handle => {
            error!("HTTP server exited unexpectedly");
        }
        _ = sweeper_handle => {
            error!("Case expiry sweeper exited unexpectedly");
        }
        _ = async {
            if let Some(handle) = ws_handle {
                handle.await.ok();
            } else {
                // Never completes if WebSocket is not running
                futures::future::pending::<()>().await;
            }
        } => {
            error!("WebSocket server exited unexpectedly");
        }
    }

    info!("Majstor backend service shutdown complete");
    Ok(())
}
