//! `POST /invoke/:channel`
//!
//! Body: `{"args": [...]}` (empty body means no arguments).
//! Caller identity comes from `x-caller-id`; when a shared secret is
//! configured the caller is authenticated only if `x-caller-token` matches it.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{ApiError, ApiResult};
use crate::middleware::Caller;
use crate::AppState;

pub const CALLER_ID_HEADER: &str = "x-caller-id";
pub const CALLER_TOKEN_HEADER: &str = "x-caller-token";

const ANONYMOUS: &str = "anonymous";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct InvokeBody {
    pub args: Vec<Value>,
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Resolve the caller from request headers
pub fn caller_from_headers(headers: &HeaderMap, shared_secret: Option<&str>) -> Caller {
    let id = header(headers, CALLER_ID_HEADER)
        .filter(|id| !id.trim().is_empty())
        .unwrap_or(ANONYMOUS);

    let authenticated = match shared_secret {
        None => true,
        Some(secret) => header(headers, CALLER_TOKEN_HEADER) == Some(secret),
    };

    Caller {
        id: id.to_string(),
        authenticated,
    }
}

pub async fn invoke(
    State(state): State<AppState>,
    Path(channel): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let body: InvokeBody = if body.is_empty() {
        InvokeBody::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?
    };

    let caller = caller_from_headers(&headers, state.shared_secret.as_deref());

    match state.pipeline.invoke(caller, &channel, body.args).await {
        Ok(value) => Ok(Json(value)),
        Err(e) => {
            *state.last_error.write().await = Some(e.to_string());
            Err(ApiError::Pipeline(e))
        }
    }
}

pub fn invoke_routes() -> Router<AppState> {
    Router::new().route("/invoke/:channel", post(invoke))
}
