use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use streamhub::{
    arguments::Arguments,
    config::load_config_from_path,
    jobs::JobBoard,
    logger::{self, LogTag},
    webserver::{
        start_server,
        state::AppState,
        ws::{producers::SnapshotProducer, WsHub},
    },
};

/// Upper bound for background tasks to wind down after shutdown
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Main entry point for the streamhub daemon
///
/// Startup order: logger -> config -> hub -> producers -> webserver.
/// Ctrl-C shuts the hub down, which cancels producers, every client task
/// and the webserver through the shared signal.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Arguments::parse();
    logger::init(args.logger_config(None));

    let config = load_config_from_path(&args.config_path).with_context(|| {
        format!("failed to load configuration from {}", args.config_path.display())
    })?;

    if !config.logging.file.is_empty() {
        logger::init(args.logger_config(Some(PathBuf::from(&config.logging.file))));
    }

    logger::info(LogTag::System, "streamhub starting up...");

    let hub = WsHub::new(&config.hub);
    let dispatch = hub.start().context("failed to start hub dispatch loop")?;

    let jobs = JobBoard::new();
    let producer = SnapshotProducer::new(
        Arc::clone(&hub),
        jobs.clone(),
        config.producers.snapshot_interval(),
    );
    let producer_handle = producer.start(hub.shutdown_signal());

    let state = Arc::new(AppState::new(config, Arc::clone(&hub), jobs));
    let mut server = tokio::spawn(start_server(state, hub.shutdown_signal()));

    let early_exit = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                logger::error(LogTag::System, &format!("Failed to listen for Ctrl-C: {}", e));
            }
            logger::info(LogTag::System, "Shutdown requested");
            None
        }
        result = &mut server => Some(result),
    };

    hub.shutdown();

    let server_result = match early_exit {
        Some(result) => result,
        None => server.await,
    };

    let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
        let _ = producer_handle.await;
        let _ = dispatch.await;
    })
    .await;
    if drained.is_err() {
        logger::warning(LogTag::System, "Background tasks did not stop in time");
    }

    logger::info(LogTag::System, "streamhub stopped");
    logger::flush();

    server_result.context("webserver task failed")??;
    Ok(())
}
