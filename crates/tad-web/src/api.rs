use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

use tad_core::config::SimulatorConfig;
use tad_core::database::Database;

use crate::handlers;

#[derive(Clone)]
pub struct ApiServer {
    pub(crate) db: Arc<dyn Database>,
    pub(crate) config: SimulatorConfig,
}

impl ApiServer {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self::with_config(db, SimulatorConfig::default())
    }

    /// The handler that creates runs needs the lifecycle timings to schedule
    /// the transition jobs, so the config rides along with the state.
    pub fn with_config(db: Arc<dyn Database>, config: SimulatorConfig) -> Self {
        Self { db, config }
    }

    pub async fn serve(self, addr: SocketAddr) -> JoinHandle<()> {
        let router = build_router(self);
        tokio::spawn(async move {
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .expect("bind address");
            axum::serve(listener, router).await.expect("server error");
        })
    }
}

pub fn build_router(api: ApiServer) -> Router {
    let cors = tower_http::cors::CorsLayer::very_permissive();
    Router::new()
        .route("/health", get(handlers::health))
        .route("/tasks", get(handlers::list_tasks))
        .route("/runs", post(handlers::create_run))
        .route("/runs/{id}", get(handlers::run_detail))
        .with_state(api)
        .layer(cors)
}

pub(crate) fn fmt_time(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}
