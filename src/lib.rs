//! Majstor Backend Library
//!
//! This module exposes the backend components for use by the binary and tests.

pub mod api;
pub mod auth;
pub mod bidding;
pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod repositories;
pub mod services;
pub mod websocket;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AppError, AppResult};

use auth::JwtKeys;
use database::Database;
use repositories::Repositories;
use services::{
    AuditTrailService, AuthService, BiddingService, CaseService, ChatService, PointsService,
    ProviderService, ReviewService,
};
use std::sync::Arc;
use websocket::WebSocketServer;

/// Application state shared by every request handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub database: Option<Database>,
    pub jwt: JwtKeys,
    pub ws: WebSocketServer,
    pub auth: Arc<AuthService>,
    pub cases: Arc<CaseService>,
    pub bidding: Arc<BiddingService>,
    pub points: Arc<PointsService>,
    pub providers: Arc<ProviderService>,
    pub chat: Arc<ChatService>,
    pub reviews: Arc<ReviewService>,
}

impl AppState {
    /// Wire services over the given repositories
    pub fn new(
        config: AppConfig,
        repos: Repositories,
        ws: WebSocketServer,
        audit: Arc<AuditTrailService>,
        database: Option<Database>,
    ) -> Self {
        let jwt = JwtKeys::new(&config.auth);
        let rules = config.bidding.clone();

        Self {
            auth: Arc::new(AuthService::new(repos.clone(), jwt.clone(), &rules)),
            cases: Arc::new(CaseService::new(
                repos.clone(),
                rules.clone(),
                ws.clone(),
                audit.clone(),
            )),
            bidding: Arc::new(BiddingService::new(repos.clone(), rules.clone(), ws.clone(), audit)),
            points: Arc::new(PointsService::new(repos.clone())),
            providers: Arc::new(ProviderService::new(repos.clone(), &rules)),
            chat: Arc::new(ChatService::new(repos.clone(), ws.clone())),
            reviews: Arc::new(ReviewService::new(repos)),
            config: Arc::new(config),
            database,
            jwt,
            ws,
        }
    }

    /// In-memory state with audit logging off
    pub fn in_memory(config: AppConfig) -> Self {
        let repos = Repositories::in_memory();
        let ws = WebSocketServer::new().with_access(JwtKeys::new(&config.auth), repos.clone());
        Self::new(
            config,
            repos,
            ws,
            Arc::new(AuditTrailService::disabled()),
            None,
        )
    }
}

/// Build the HTTP router for the given state
pub fn app(state: AppState) -> axum::Router {
    api::router(state)
}
