use crate::SignalingService;
use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceServersQuery {
    pub api_key: Option<String>,
}

/// `GET /api/ice-servers?apiKey=...`
pub async fn ice_servers_handler(
    Query(query): Query<IceServersQuery>,
    State(service): State<SignalingService>,
) -> Response {
    let Some(expected) = service.api_key() else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if query.api_key.as_deref() != Some(expected) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    Json(service.get_ice_servers()).into_response()
}
