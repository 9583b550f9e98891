//! AppleBites Valuation Server
//!
//! The server-side subsystem behind the AppleBites assessment wizards:
//! a deterministic valuation pipeline with durable assessment storage,
//! an HTTP API, an asynchronous narrative report step, and a retrying
//! CRM export dispatcher.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                 applebites-server (Rust Service)                │
//! │                           :4480                                 │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐  ┌──────────────┐  ┌───────────────────────┐  │
//! │  │  Valuation   │  │  Assessment  │  │  CRM Export           │  │
//! │  │  Engine      │  │  Store       │  │  Dispatcher           │  │
//! │  └──────────────┘  └──────────────┘  └───────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Pipeline
//!
//! One submission flows left to right, once:
//! normalize → adjust → score → select multiple → calculate range,
//! then persist, queue the CRM export, and spawn the report step.

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod export;
pub mod naics;
pub mod report;
pub mod routes;
pub mod session;
pub mod store;
pub mod valuation;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

use applebites_common::config::Config;

use crate::export::{build_transport, ExportDispatcher};
use crate::store::AssessmentStore;
use crate::valuation::ValuationEngine;

/// Request bodies above this size are rejected.
const MAX_BODY_BYTES: usize = 256 * 1024;

/// Valuation service state
pub struct AppState {
    /// Configuration
    pub config: Config,
    /// The pure valuation pipeline
    pub engine: ValuationEngine,
    /// Assessment and outbox persistence
    pub store: Arc<AssessmentStore>,
    /// CRM export dispatcher
    pub dispatcher: Arc<ExportDispatcher>,
}

impl AppState {
    /// Create state over an already-open store (used by tests).
    pub fn with_store(config: Config, store: Arc<AssessmentStore>) -> Result<Self> {
        let transport = build_transport(&config.export)
            .map_err(|e| anyhow::anyhow!("export transport: {}", e))?;
        let dispatcher = Arc::new(ExportDispatcher::new(
            Arc::clone(&store),
            transport,
            &config.export,
        ));

        Ok(Self {
            config,
            engine: ValuationEngine::new(),
            store,
            dispatcher,
        })
    }

    /// Create state, opening the store at its configured path.
    pub fn new(config: Config) -> Result<Self> {
        let store = Arc::new(AssessmentStore::open(config.storage.resolved_db_path())?);
        Self::with_store(config, store)
    }
}

/// Main valuation service
pub struct ValuationService {
    state: Arc<AppState>,
}

impl ValuationService {
    /// Create a new valuation service
    pub fn new(config: Config) -> Result<Self> {
        let state = Arc::new(AppState::new(config)?);
        Ok(Self { state })
    }

    /// Build the HTTP router over the service state.
    pub fn router(state: Arc<AppState>) -> Router {
        Router::new()
            .route("/health", get(routes::health))
            .route(
                "/api/v1/assessments",
                post(routes::submit_assessment).get(routes::list_assessments),
            )
            // Tier-specific aliases kept for the wizard surfaces
            .route("/api/v1/assessments/free", post(routes::submit_free))
            .route("/api/v1/assessments/growth", post(routes::submit_growth))
            .route("/api/v1/assessments/capital", post(routes::submit_capital))
            .route("/api/v1/assessments/:id", get(routes::get_assessment))
            .route("/api/v1/status", get(routes::get_status))
            .route("/api/v1/drivers", get(routes::list_drivers))
            .route("/api/v1/industries", get(routes::list_industries))
            .route("/api/v1/exports/flush", post(routes::flush_exports))
            .layer(TimeoutLayer::new(Duration::from_secs(30)))
            .layer(CorsLayer::permissive())
            .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
            .with_state(state)
    }

    /// Start the valuation service
    pub async fn start(self) -> Result<()> {
        let host = self.state.config.server.host.clone();
        let port = self.state.config.server.port;

        let app = Self::router(self.state.clone());

        // Start the export dispatcher loop
        if self.state.config.export.enabled {
            let dispatcher = Arc::clone(&self.state.dispatcher);
            tracing::info!(
                transport = dispatcher.transport_kind(),
                "Starting CRM export dispatcher"
            );
            tokio::spawn(dispatcher.run());
        } else {
            tracing::info!("CRM export disabled, dispatcher not started");
        }

        // Start HTTP server
        let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
        tracing::info!(address = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}
