//! HTTP API handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Html,
    Json,
};
use std::sync::Arc;

use crate::session::{RelayStats, SessionInfo};
use crate::ui::server::AppState;

/// API response wrapper
#[derive(serde::Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

/// Relay status
#[derive(serde::Serialize)]
pub struct SystemStatus {
    #[serde(flatten)]
    pub stats: RelayStats,
    pub uptime_seconds: u64,
}

/// Get relay-wide counters
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<ApiResponse<SystemStatus>> {
    let status = SystemStatus {
        stats: state.sessions.stats(),
        uptime_seconds: state.uptime().as_secs(),
    };

    Json(ApiResponse::ok(status))
}

/// Get one session
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> (StatusCode, Json<ApiResponse<SessionInfo>>) {
    match state.sessions.session_info(&token) {
        Some(info) => (StatusCode::OK, Json(ApiResponse::ok(info))),
        None => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error(format!("no session for token {}", token))),
        ),
    }
}

/// Browser viewer opened through the shareable URL
pub async fn stream_page() -> Html<&'static str> {
    Html(include_str!("../../assets/stream.html"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_shape() {
        let body = serde_json::to_value(ApiResponse::<()>::error("missing")).unwrap();
        assert_eq!(body, serde_json::json!({ "success": false, "error": "missing" }));
    }

    #[test]
    fn test_status_is_flat() {
        let status = SystemStatus {
            stats: RelayStats {
                sessions: 1,
                producers: 1,
                consumers: 2,
                frames_relayed: 40,
            },
            uptime_seconds: 5,
        };
        let body = serde_json::to_value(ApiResponse::ok(status)).unwrap();
        assert_eq!(body["data"]["consumers"], 2);
        assert_eq!(body["data"]["uptime_seconds"], 5);
    }
}
