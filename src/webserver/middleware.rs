/// Webserver middleware
///
/// Request interceptors for the /api routes
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{
    logger::{self, LogTag},
    webserver::{
        state::AppState,
        ws::admission::{check_credentials, query_api_key},
    },
};

/// API key gate
///
/// Applies the same credential check as the upgrade endpoint. With auth
/// disabled every request passes.
pub async fn api_key_gate(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let query_key = query_api_key(request.uri().query());

    match check_credentials(request.headers(), query_key.as_deref(), &state.config.security) {
        Ok(()) => next.run(request).await,
        Err(e) => {
            logger::warning(
                LogTag::Webserver,
                &format!("Blocked request to {}: {}", request.uri().path(), e),
            );
            e.into_response()
        }
    }
}
