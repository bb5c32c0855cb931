use anyhow::Result;
use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info, warn};

use lib_runtime::loggers::setup_logging;
use lib_runtime::{StopHandle, TopicRegistry};

mod pipeline_logic;
use pipeline_logic::{config, Pipeline};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config::LoadedConfig { config, tree, notes } = config::load_config()?;
    let log_dir = config.log_dir.clone().unwrap_or_else(|| PathBuf::from("./logs"));
    let log_level = config.log_level.clone().unwrap_or_else(|| "info".to_string());
    let _log_guard = setup_logging(&log_dir, &log_level, "server_pipeline")?;
    for note in &notes {
        warn!("{}", note);
    }
    info!("Configuration loaded from {:?}", config.config_file);

    let registry = TopicRegistry::new();
    let pipeline = Pipeline::build(tree, &registry)?;
    info!("{} service(s) registered", pipeline.manager().len());

    let watcher = tokio::spawn(stop_on_signal(pipeline.stop_handle()));

    let result = pipeline.run().await;
    watcher.abort();
    pipeline.shutdown();

    match result {
        Ok(()) => info!("Pipeline complete."),
        Err(e) if e.is_cancelled() => info!("Pipeline stopped."),
        Err(e) => {
            error!("Pipeline failed: {}", e);
            return Err(e.into());
        }
    }

    info!("Shutdown complete.");
    Ok(())
}

async fn stop_on_signal(stop: StopHandle) {
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Ctrl-C received, initiating shutdown.");
        }
        _ = async {
            #[cfg(unix)]
            {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut term_signal) => {
                        term_signal.recv().await;
                        info!("SIGTERM received, initiating shutdown.");
                    }
                    Err(e) => {
                        error!("Failed to listen for SIGTERM: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            }
            #[cfg(not(unix))]
            {
                // On non-unix platforms, just wait forever.
                std::future::pending::<()>().await;
            }
        } => {}
    }
    stop.stop();
}
