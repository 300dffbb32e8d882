//! # Dashboard Adapter
//!
//! HTTP API for the operator dashboard. Reads come from the controller's
//! status handle and the latest `levels.history` event; writes are turned
//! into `button.pressed` and `manual.valve_command` bus events, so the
//! controller remains the only owner of the state.

pub mod handlers;
pub mod routes;

pub use handlers::ApiError;
pub use routes::RouteTable;

use crate::container::config::DashboardConfig;
use async_trait::async_trait;
use axum::{
    extract::{MatchedPath, Request},
    http::Method,
    middleware::{self, Next},
    response::Response,
    Router,
};
use parking_lot::RwLock;
use shared_bus::{Handler, InMemoryEventBus, Payload, SubscriptionId, TopicMap};
use shared_types::{LevelReading, Service, ServiceError, ServiceResult};
use std::net::SocketAddr;
use std::sync::Arc;
use tank_controller::StatusQuery;
use tank_telemetry::metrics as telemetry;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

const ADAPTER: &str = "dashboard";

/// State shared by every handler.
#[derive(Clone)]
pub struct DashboardState {
    pub bus: Arc<InMemoryEventBus>,
    pub topics: TopicMap,
    pub status: Arc<dyn StatusQuery>,
    /// Latest `levels.history` payload, oldest first
    pub readings: Arc<RwLock<Vec<LevelReading>>>,
    pub readings_limit: usize,
}

pub struct DashboardAdapter {
    config: DashboardConfig,
    state: DashboardState,
    listener: Option<TcpListener>,
    local_addr: Option<SocketAddr>,
    history_subscription: Option<SubscriptionId>,
}

impl DashboardAdapter {
    pub fn new(
        config: DashboardConfig,
        bus: Arc<InMemoryEventBus>,
        topics: TopicMap,
        status: Arc<dyn StatusQuery>,
    ) -> Self {
        let state = DashboardState {
            bus,
            topics,
            status,
            readings: Arc::new(RwLock::new(Vec::new())),
            readings_limit: config.readings_limit,
        };
        Self {
            config,
            state,
            listener: None,
            local_addr: None,
            history_subscription: None,
        }
    }

    /// Address the server is bound to, once set up.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// The full application: route table, request metrics, tracing and CORS.
    pub fn router(&self) -> Router {
        RouteTable::dashboard(&self.config.api_prefix)
            .into_router()
            .route_layer(middleware::from_fn(track_requests))
            .layer(TraceLayer::new_for_http())
            .layer(create_cors_layer(&self.config.cors_origins))
            .with_state(self.state.clone())
    }

    fn track_history(&mut self) {
        let readings = Arc::clone(&self.state.readings);
        let id = self.state.bus.subscribe(
            &self.state.topics.levels_history,
            Handler::inline(move |event| {
                if let Payload::LevelsHistory { readings: latest } = &event.payload {
                    *readings.write() = latest.clone();
                }
                Ok(())
            }),
        );
        self.history_subscription = Some(id);
    }
}

#[async_trait]
impl Service for DashboardAdapter {
    fn name(&self) -> &'static str {
        ADAPTER
    }

    async fn setup(&mut self) -> ServiceResult<()> {
        let listener = TcpListener::bind(self.config.bind_addr)
            .await
            .map_err(|e| {
                ServiceError::setup(ADAPTER, format!("bind {}: {e}", self.config.bind_addr))
            })?;
        self.local_addr = listener.local_addr().ok();
        self.listener = Some(listener);
        self.track_history();
        info!(
            addr = ?self.local_addr,
            prefix = %self.config.api_prefix,
            "[dashboard] Listening"
        );
        Ok(())
    }

    async fn run(&mut self) -> ServiceResult<()> {
        let listener = self
            .listener
            .take()
            .ok_or_else(|| ServiceError::setup(ADAPTER, "listener not bound"))?;
        axum::serve(listener, self.router())
            .await
            .map_err(|e| ServiceError::runtime(ADAPTER, e.to_string()))
    }

    async fn cleanup(&mut self) {
        self.listener = None;
        if let Some(id) = self.history_subscription.take() {
            self.state
                .bus
                .unsubscribe(&self.state.topics.levels_history, id);
        }
    }
}

/// Count requests by matched route and status.
async fn track_requests(request: Request, next: Next) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());
    let response = next.run(request).await;
    telemetry::record_http_request(&route, response.status().as_u16());
    response
}

/// CORS for the configured origins. `*` allows any origin.
pub fn create_cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    if origins.iter().any(|o| o == "*") {
        cors.allow_origin(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        cors.allow_origin(origins)
    }
}
