//! robot-gateway entry point.
//!
//! Opens the serial link to the motor controller, joins WiFi and serves
//! command/telemetry clients over TCP.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

use robot_gateway::app_state::AppState;
use robot_gateway::config::GatewayConfig;
use robot_gateway::domain::{ClientRegistry, StatusBus};
use robot_gateway::error::GatewayError;
use robot_gateway::indicator;
use robot_gateway::network::{Connectivity, ConnectivityState, NetworkSelector, NmcliDriver};
use robot_gateway::serial::{self, SerialWriter};
use robot_gateway::server::Acceptor;
use robot_gateway::service::TelemetryPublisher;

const LINK_POLL_INTERVAL: Duration = Duration::from_secs(2);
const SIGNAL_REFRESH_INTERVAL: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = GatewayConfig::from_env().context("loading configuration")?;
    tracing::info!(addr = %config.listen_addr, "starting robot-gateway");

    // Shared state
    let status = StatusBus::new(config.status_bus_capacity);
    let _indicator = tokio::spawn(indicator::run_log_indicator(status.subscribe()));
    let connectivity = Connectivity::new();
    let registry = Arc::new(ClientRegistry::new(config.client_capacity));

    // Serial bridge: a pending read on a tokio File blocks writes, so the
    // device is opened twice
    let port_rx = tokio::fs::File::open(&config.serial_device)
        .await
        .with_context(|| format!("opening {} for reading", config.serial_device.display()))?;
    let port_tx = tokio::fs::OpenOptions::new()
        .write(true)
        .open(&config.serial_device)
        .await
        .with_context(|| format!("opening {} for writing", config.serial_device.display()))?;
    let (serial_writer, writer_task) = SerialWriter::spawn(port_tx, config.serial_outbound_capacity);
    let (snapshots, snapshot_rx) = serial::snapshot_queue(config.snapshot_queue_capacity);
    let ingest_task = tokio::spawn(serial::run_ingestion(port_rx, config.motor_count, snapshots));
    supervise("serial writer", writer_task);
    supervise("serial ingestion", ingest_task);

    let state = AppState::new(
        Arc::clone(&registry),
        Arc::new(serial_writer),
        status.clone(),
        connectivity.clone(),
    );
    let publisher = TelemetryPublisher::new(&state, config.telemetry_connect_timeout);
    let _telemetry = tokio::spawn(publisher.run(snapshot_rx));

    // Networking: the acceptor waits for the join to settle
    let acceptor = Arc::new(Acceptor::new(&config, state));
    let server = acceptor.start();

    let driver = Arc::new(NmcliDriver::new(config.wifi_interface.clone(), LINK_POLL_INTERVAL));
    let selector = NetworkSelector::new(
        driver,
        config.wifi_candidates.clone(),
        config.wifi_max_retry,
        connectivity,
        status,
    );
    let _link_monitor = match selector.join().await {
        ConnectivityState::Connected => Some(selector.spawn_link_monitor(SIGNAL_REFRESH_INTERVAL)),
        other => {
            tracing::error!(state = %other, retries = selector.retry_count(), "wifi join failed");
            None
        }
    };

    if let Some(server) = server {
        tokio::select! {
            joined = server => {
                match joined {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => tracing::error!(
                        code = e.error_code(),
                        class = ?e.class(),
                        error = %e,
                        "networking down, serial bridge keeps running"
                    ),
                    Err(e) => tracing::error!(error = %e, "acceptor task aborted"),
                }
                tokio::signal::ctrl_c().await.context("waiting for shutdown signal")?;
            }
            signal = tokio::signal::ctrl_c() => signal.context("waiting for shutdown signal")?,
        }
    }

    let drained = registry.drain().await;
    tracing::info!(clients = drained, "shutting down");
    Ok(())
}

fn supervise<T>(name: &'static str, task: JoinHandle<Result<T, GatewayError>>)
where
    T: std::fmt::Debug + Send + 'static,
{
    tokio::spawn(async move {
        match task.await {
            Ok(Ok(summary)) => tracing::info!(task = name, ?summary, "task finished"),
            Ok(Err(e)) => tracing::error!(
                task = name,
                code = e.error_code(),
                class = ?e.class(),
                error = %e,
                "task failed"
            ),
            Err(e) => tracing::error!(task = name, error = %e, "task aborted"),
        }
    });
}
