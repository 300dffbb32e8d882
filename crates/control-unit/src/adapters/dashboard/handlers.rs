//! HTTP handlers for the operator dashboard.

use super::DashboardState;
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use shared_bus::{EventPublisher, Payload};
use shared_types::{AutomaticSubState, LevelReading, SystemState, ValveOpening};
use tank_telemetry::metrics as telemetry;
use thiserror::Error;
use tracing::info;

/// Errors returned to dashboard clients as `{"error": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("System is not connected to the level sensor")]
    NotConnected,

    #[error("System not in MANUAL mode")]
    NotManual,

    #[error("{0}")]
    BadRequest(String),

    #[error("Metrics unavailable: {0}")]
    Metrics(String),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotConnected | Self::NotManual => StatusCode::CONFLICT,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Metrics(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            Json(json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct ReadingsQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ReadingDto {
    /// Unix seconds
    pub ts: f64,
    pub value: f64,
}

impl From<&LevelReading> for ReadingDto {
    fn from(reading: &LevelReading) -> Self {
        Self {
            ts: reading.timestamp.timestamp_millis() as f64 / 1000.0,
            value: reading.water_level,
        }
    }
}

/// Coarse health of the tank for the dashboard banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Ok,
    Warning,
    Error,
}

impl Severity {
    fn of(state: SystemState, sub_state: Option<AutomaticSubState>) -> Self {
        match (state, sub_state) {
            (SystemState::Unconnected, _) => Self::Error,
            (_, Some(AutomaticSubState::Alarm)) => Self::Error,
            (_, Some(AutomaticSubState::PreAlarm | AutomaticSubState::TrackingPreAlarm)) => {
                Self::Warning
            }
            _ => Self::Ok,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusDto {
    pub state: SystemState,
    pub sub_state: Option<AutomaticSubState>,
    /// Same value as `state`; the web client reads this field.
    pub mode: SystemState,
    pub status: Severity,
    pub valve_opening: f64,
    pub water_level: Option<f64>,
    pub history_len: usize,
    /// Unix seconds of the last reading
    pub timestamp: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct ModeRequest {
    pub mode: String,
}

#[derive(Debug, Deserialize)]
pub struct ValveRequest {
    pub opening: f64,
}

pub async fn readings(
    State(state): State<DashboardState>,
    Query(query): Query<ReadingsQuery>,
) -> Json<Vec<ReadingDto>> {
    let limit = query.limit.unwrap_or(state.readings_limit);
    let readings = state.readings.read();
    let skip = readings.len().saturating_sub(limit);
    Json(readings.iter().skip(skip).map(ReadingDto::from).collect())
}

pub async fn status(State(state): State<DashboardState>) -> Json<StatusDto> {
    let status = state.status.status();
    Json(StatusDto {
        state: status.state,
        sub_state: status.sub_state,
        mode: status.state,
        status: Severity::of(status.state, status.sub_state),
        valve_opening: status.valve_opening.percent(),
        water_level: status.water_level,
        history_len: status.history_len,
        timestamp: status
            .last_reading_at
            .map(|at| at.timestamp_millis() as f64 / 1000.0),
    })
}

/// Request a mode switch. The button toggle is the only way in, so a
/// request for the current mode is a no-op.
pub async fn set_mode(
    State(state): State<DashboardState>,
    Json(request): Json<ModeRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let requested = match request.mode.as_str() {
        "AUTOMATIC" => SystemState::Automatic,
        "MANUAL" => SystemState::Manual,
        other => return Err(ApiError::BadRequest(format!("Invalid mode: {other}"))),
    };

    let current = state.status.state();
    if !current.is_connected() {
        return Err(ApiError::NotConnected);
    }

    let changed = requested != current;
    if changed {
        info!(from = %current, to = %requested, "[dashboard] Mode change requested");
        state
            .bus
            .publish(&state.topics.button_pressed, Payload::ButtonPressed);
    }
    Ok(Json(json!({ "result": "ok", "changed": changed })))
}

pub async fn set_valve(
    State(state): State<DashboardState>,
    Json(request): Json<ValveRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if state.status.state() != SystemState::Manual {
        return Err(ApiError::NotManual);
    }
    let opening = ValveOpening::try_new(request.opening)
        .map_err(|_| ApiError::BadRequest("Valve opening must be between 0 and 100".into()))?;

    info!(%opening, "[dashboard] Manual valve command");
    state.bus.publish(
        &state.topics.manual_valve_command,
        Payload::ManualValve { opening },
    );
    Ok(Json(json!({ "result": "ok" })))
}

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "alive" }))
}

pub async fn metrics(State(state): State<DashboardState>) -> Result<Response, ApiError> {
    telemetry::set_bus_handler_failures(state.bus.stats().handler_failures);
    let body = tank_telemetry::gather_metrics().map_err(|e| ApiError::Metrics(e.to_string()))?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response())
}
