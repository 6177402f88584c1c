//! Taskboard notification hub server.
//!
//! ```bash
//! # Run on default address 0.0.0.0:9000
//! taskboard-hub
//!
//! # Run on custom address
//! taskboard-hub --bind 127.0.0.1:8080
//! HUB_ADDR=127.0.0.1:8080 taskboard-hub
//! ```
//!
//! Ctrl-C sends a close frame to every connected client before exiting.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use taskboard_hub::config::{HubCliArgs, HubConfig};
use taskboard_hub::hub::{self, HubState};

const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

#[tokio::main]
async fn main() {
    let cli = HubCliArgs::parse();

    let config = match HubConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::info!(addr = %config.bind_addr, "starting taskboard hub");

    let state = Arc::new(HubState::with_config(config.max_frame_size));
    match hub::start_server_with_state(&config.bind_addr, Arc::clone(&state)).await {
        Ok((bound_addr, mut handle)) => {
            tracing::info!(addr = %bound_addr, "hub listening");
            tokio::select! {
                result = &mut handle => {
                    if let Err(e) = result {
                        tracing::error!(error = %e, "hub server task failed");
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    let closed = state.close_all_connections().await;
                    tracing::info!(clients = closed, "shutting down hub");
                    // Give writers a moment to flush the close frames.
                    tokio::time::sleep(SHUTDOWN_GRACE).await;
                    handle.abort();
                }
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to start hub");
            std::process::exit(1);
        }
    }
}
