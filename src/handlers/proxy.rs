use axum::body::Body;
use axum::extract::{Request, State};
use axum::response::Response;

use crate::error::AppResult;
use crate::state::AppState;

/// Fallback handler: every path the gateway does not serve itself goes upstream.
pub async fn forward(State(state): State<AppState>, request: Request) -> AppResult<Response<Body>> {
    state.proxy.forward(request).await
}
