//! # Optics Server
//!
//! JSON API for the optics shop back end.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Optics Server Routes                           │
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────────┐│
//! │  │  /auth         │  │  /api/sales    │  │  /api/stock                ││
//! │  │                │  │                │  │                            ││
//! │  │ • login        │  │ • create/edit  │  │ • products, categories     ││
//! │  │ • logout       │  │ • payments     │  │ • suppliers, laboratories  ││
//! │  │ • me           │  │ • credit/debit │  │ • movements, adjust        ││
//! │  └────────────────┘  └────────────────┘  └────────────────────────────┘│
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────────┐│
//! │  │ /api/customers │  │  /api/reports  │  │ /api/settings, employees,  ││
//! │  │                │  │                │  │ groups                     ││
//! │  │ • exams        │  │ • dashboard    │  │                            ││
//! │  │ • notifications│  │ • revenue, vat │  │ • company, payment methods ││
//! │  └────────────────┘  └────────────────┘  └────────────────────────────┘│
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                      Infrastructure                               │  │
//! │  │  SQLite via optics-db  ·  argon2 sessions  ·  tower-http tracing  │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! See [`config::ServerConfig`]. Environment variables use the
//! `OPTICS__` prefix, e.g. `OPTICS__PORT=9090`.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

// Re-exports
pub use config::ServerConfig;
pub use error::{ApiError, ApiResult};

use optics_db::Database;

/// Shared application state.
pub struct AppState {
    pub db: Database,
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(db: Database, config: ServerConfig) -> Arc<Self> {
        Arc::new(AppState { db, config })
    }
}

/// The complete router with request tracing and CORS.
pub fn build_router(state: Arc<AppState>) -> Router {
    routes::router()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
