/// WebSocket upgrade endpoint
///
/// Admission runs before anything touches the hub: credentials, then origin,
/// then upgrade validity. Only a successful upgrade creates a client, and
/// every new client starts with a fresh `status` + `jobs` snapshot.
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, WebSocketUpgrade},
        ConnectInfo, RawQuery, State,
    },
    http::HeaderMap,
    response::{IntoResponse, Response},
};

use crate::{
    logger::{self, LogTag},
    webserver::{
        state::AppState,
        ws::{admission, connection::handle_connection, producers::connect_snapshot},
    },
};

/// GET {ws_path}
pub async fn ws_handler(
    State(state): State<Arc<AppState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let peer = connect_info
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let query_key = admission::query_api_key(query.as_deref());
    if let Err(e) = admission::admit(&headers, query_key.as_deref(), &state.config.security) {
        logger::warning(
            LogTag::Webserver,
            &format!("WebSocket connection from {} rejected: {}", peer, e),
        );
        return e.into_response();
    }

    let upgrade = match upgrade {
        Ok(upgrade) => upgrade,
        Err(rejection) => {
            logger::debug(
                LogTag::Webserver,
                &format!("Non-upgrade request from {} on the ws path: {}", peer, rejection),
            );
            return rejection.into_response();
        }
    };

    logger::debug(LogTag::Webserver, &format!("Upgrading connection from {}", peer));

    let hub = Arc::clone(&state.hub);
    let jobs = Arc::clone(&state.jobs);
    let config = state.health_config();

    upgrade.on_upgrade(move |socket| async move {
        let initial = connect_snapshot(jobs.as_ref());
        handle_connection(socket, hub, config, initial).await;
    })
}
