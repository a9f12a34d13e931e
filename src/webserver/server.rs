/// Axum webserver implementation
///
/// Server lifecycle: bind, serve, and graceful termination when the hub's
/// cancellation signal fires.
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::{
    errors::ServerError,
    logger::{self, LogTag},
    webserver::{routes, state::AppState, ws::Signal},
};

/// Start the webserver
///
/// This function blocks until `shutdown` is triggered and in-flight
/// requests have finished.
pub async fn start_server(state: Arc<AppState>, shutdown: Signal) -> Result<(), ServerError> {
    let server = &state.config.server;
    let bind = format!("{}:{}", server.host, server.port);

    let addr: SocketAddr = bind
        .parse()
        .map_err(|_| ServerError::InvalidAddress(bind.clone()))?;

    logger::debug(
        LogTag::Webserver,
        &format!("Starting webserver on {}", addr),
    );

    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        // Provide helpful error message for common cases
        let message = match e.kind() {
            std::io::ErrorKind::AddrInUse => format!(
                "Address already in use\n\
                 \n\
                 Another streamhub instance (or another service) is bound to port {}.\n\
                 Stop it or change [server].port in the configuration.",
                addr.port()
            ),
            std::io::ErrorKind::PermissionDenied => format!(
                "Permission denied\n\
                 \n\
                 Port {} requires elevated privileges on this system.\n\
                 Consider using a port above 1024 or running with appropriate permissions.",
                addr.port()
            ),
            _ => e.to_string(),
        };
        ServerError::Bind {
            addr: addr.to_string(),
            message,
        }
    })?;

    let app = build_app(Arc::clone(&state));

    logger::info(
        LogTag::Webserver,
        &format!(
            "Listening on http://{} (websocket path {})",
            addr, state.config.server.ws_path
        ),
    );

    let shutdown_signal = async move {
        shutdown.triggered().await;
        logger::debug(
            LogTag::Webserver,
            "Received shutdown signal, stopping webserver...",
        );
    };

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal)
    .await?;

    logger::info(LogTag::Webserver, "Webserver stopped");

    Ok(())
}

/// Build the Axum application with all routes and middleware
fn build_app(state: Arc<AppState>) -> Router {
    routes::create_router(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::jobs::JobBoard;
    use crate::webserver::ws::WsHub;
    use std::time::Duration;

    #[tokio::test]
    async fn test_invalid_address() {
        let mut config = Config::default();
        config.server.host = "not a host".to_string();
        let hub = WsHub::new(&config.hub);
        let state = Arc::new(AppState::new(config, hub, JobBoard::new()));

        let result = start_server(state, Signal::new()).await;
        assert!(matches!(result, Err(ServerError::InvalidAddress(_))));
    }

    #[tokio::test]
    async fn test_stops_on_signal() {
        let mut config = Config::default();
        config.server.port = 0;
        let hub = WsHub::new(&config.hub);
        let state = Arc::new(AppState::new(config, hub, JobBoard::new()));
        let shutdown = Signal::new();

        let server = tokio::spawn(start_server(state, shutdown.clone()));
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.trigger();

        let result = tokio::time::timeout(Duration::from_secs(2), server)
            .await
            .expect("server did not stop")
            .unwrap();
        assert!(result.is_ok());
    }
}
