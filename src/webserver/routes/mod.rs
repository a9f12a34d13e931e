use std::sync::Arc;

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware, Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config::SecurityConfig;
use crate::webserver::{
    middleware::api_key_gate,
    state::AppState,
    ws::admission::{origin_allowed, API_KEY_HEADER},
};

pub mod jobs;
pub mod status;
pub mod ws;

pub fn create_router(state: Arc<AppState>) -> Router {
    let ws_path = state.config.server.ws_path.clone();

    Router::new()
        .route(&ws_path, axum::routing::get(ws::ws_handler))
        .nest("/api", api_routes(&state))
        .with_state(state)
}

/// API routes, behind the API key gate and CORS
fn api_routes(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .merge(status::routes())
        .merge(jobs::routes())
        .layer(middleware::from_fn_with_state(Arc::clone(state), api_key_gate))
        .layer(cors_layer(&state.config.security))
}

/// CORS driven by the same allow-list as the upgrade endpoint
fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::PUT, Method::POST])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static(API_KEY_HEADER)]);

    if !security.auth_enabled {
        return layer.allow_origin(Any);
    }

    let allowed = security.allowed_origins.clone();
    layer.allow_origin(AllowOrigin::predicate(
        move |origin: &HeaderValue, _parts: &axum::http::request::Parts| {
            origin
                .to_str()
                .map(|origin| origin_allowed(origin, &allowed))
                .unwrap_or(false)
        },
    ))
}
