//! Declarative route table for the dashboard.
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | GET | `{prefix}/readings?limit=N` | last N history readings |
//! | GET | `{prefix}/status` | controller snapshot |
//! | POST | `{prefix}/mode` | mode switch request |
//! | POST | `{prefix}/valve` | manual valve command |
//! | GET | `{prefix}/health` | liveness |
//! | GET | `/metrics` | Prometheus text |

use super::{handlers, DashboardState};
use axum::{
    routing::{on, MethodFilter, MethodRouter},
    Router,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Post,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Readings,
    Status,
    Mode,
    Valve,
    Health,
    Metrics,
}

/// Every dashboard route as `(path, verb, endpoint)`.
pub const ROUTES: &[(&str, Verb, Endpoint)] = &[
    ("/readings", Verb::Get, Endpoint::Readings),
    ("/status", Verb::Get, Endpoint::Status),
    ("/mode", Verb::Post, Endpoint::Mode),
    ("/valve", Verb::Post, Endpoint::Valve),
    ("/health", Verb::Get, Endpoint::Health),
    ("/metrics", Verb::Get, Endpoint::Metrics),
];

impl Endpoint {
    /// Scrapers expect `/metrics` at the root, so it skips the API prefix.
    fn under_prefix(self) -> bool {
        self != Self::Metrics
    }

    fn method_router(self, verb: Verb) -> MethodRouter<DashboardState> {
        let filter = match verb {
            Verb::Get => MethodFilter::GET,
            Verb::Post => MethodFilter::POST,
        };
        match self {
            Self::Readings => on(filter, handlers::readings),
            Self::Status => on(filter, handlers::status),
            Self::Mode => on(filter, handlers::set_mode),
            Self::Valve => on(filter, handlers::set_valve),
            Self::Health => on(filter, handlers::health),
            Self::Metrics => on(filter, handlers::metrics),
        }
    }
}

/// Resolved routes for one API prefix (empty or `/segment`).
pub struct RouteTable {
    prefix: String,
}

impl RouteTable {
    pub fn dashboard(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
        }
    }

    /// `(full path, verb, endpoint)` for every entry of [`ROUTES`].
    pub fn routes(&self) -> Vec<(String, Verb, Endpoint)> {
        ROUTES
            .iter()
            .map(|&(path, verb, endpoint)| {
                let full = if endpoint.under_prefix() {
                    format!("{}{path}", self.prefix)
                } else {
                    path.to_string()
                };
                (full, verb, endpoint)
            })
            .collect()
    }

    pub fn into_router(self) -> Router<DashboardState> {
        self.routes()
            .into_iter()
            .fold(Router::new(), |router, (path, verb, endpoint)| {
                router.route(&path, endpoint.method_router(verb))
            })
    }
}
