//! tether daemon: serves the control and event plane over HTTP.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use tt_core::config::Config;
use tt_core::config_store::ConfigStore;
use tt_daemon::daemon::Daemon;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

const PORT_ENV: &str = "TETHER_PORT";

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = Config::default_path();
    let store = Arc::new(ConfigStore::open(&config_path));
    let config = store.get();

    tt_telemetry::logging::init("tether-daemon", &config.general.log_level, config.general.log_json);
    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = std::process::id(),
        config = %config_path.display(),
        "tether daemon starting"
    );

    if let Err(e) = config.validate() {
        warn!(error = %e, "config failed validation, continuing with sanitized values");
    }

    let mut daemon = Daemon::new(store);
    if let Some(port) = port_from_env().context("invalid TETHER_PORT")? {
        info!(port, "listen port overridden from environment");
        daemon = daemon.with_port(port);
    }

    let shutdown = daemon.shutdown_handle();

    // Wire ctrl-c to trigger graceful shutdown.
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            return;
        }
        info!("ctrl-c received, initiating shutdown");
        shutdown.trigger();
    });

    if let Err(e) = daemon.run().await {
        error!(error = %e, "daemon execution failed");
        return Err(e);
    }
    Ok(())
}

fn port_from_env() -> Result<Option<u16>> {
    match std::env::var(PORT_ENV) {
        Ok(raw) => {
            let port = raw
                .trim()
                .parse::<u16>()
                .with_context(|| format!("{PORT_ENV}={raw} is not a port number"))?;
            Ok(Some(port))
        }
        Err(_) => Ok(None),
    }
}
