//! # RC Link
//!
//! Transmitter side of the RC link, driving a radio co-processor over a
//! serial bridge.

use anyhow::{Context, Result};
use std::path::Path;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use rc_link::config::{Config, LoggingConfig};
use rc_link::link::{LinkController, LinkEvent, LogNotifier};
use rc_link::protocol::types::ControlFrame;
use rc_link::serial::open_bridge_port;
use rc_link::settings::{self, JsonSettingsStore, SettingsStore};
use rc_link::telemetry::{TelemetryLogger, TelemetryRecord};
use rc_link::transport::{select_transport, SerialBridge, Transport};

/// Config file used when none is given on the command line
const DEFAULT_CONFIG_PATH: &str = "rc-link.toml";

/// Number of ticks between status log messages
const STATUS_LOG_INTERVAL_TICKS: u64 = 1000;

/// Main entry point for the RC link transmitter
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration and set up logging
///    - Load stored settings (peer, channel, PA level)
///    - Open the serial bridge and bring the co-processor up
///    - Pair if no peer is stored or pairing was requested
///
/// 2. **Main Loop**
///    - Send a control frame when due (changed, keep-alive ping, or retry)
///    - Latch and log telemetry from the receiver
///    - Report link quality changes
///    - Handle Ctrl+C for graceful shutdown
///
/// # Errors
///
/// Returns error if:
/// - The configuration file is invalid
/// - No bridge serial port can be opened
/// - The co-processor does not come up
#[tokio::main]
async fn main() -> Result<()> {
    let config_arg = std::env::args().nth(1);
    let config = load_config(config_arg.as_deref())?;
    let _log_guard = init_logging(&config.logging);

    info!("RC Link v{} starting...", env!("CARGO_PKG_VERSION"));

    let own = config.link.address()?;
    let mut store = JsonSettingsStore::new(config.settings.path());
    let mut stored = settings::load_or_default(&mut store);

    let paths: Vec<&str> = config.bridge.device_paths.iter().map(String::as_str).collect();
    let bus = open_bridge_port(&paths, config.bridge.baud_rate)?;
    let candidates: Vec<Box<dyn Transport>> = vec![Box::new(SerialBridge::new(bus))];
    let transport = select_transport(candidates, own, stored.rf_channel, stored.pa_level).await?;

    let mut link = LinkController::new(transport, LogNotifier)
        .with_min_link_quality(config.link.min_link_quality)
        .with_battery_low_mv(config.link.battery_low_mv);

    if !stored.peer.is_none() {
        link.transport_mut()
            .set_peer(stored.peer)
            .await
            .context("Failed to restore peer address")?;
        info!("Restored peer {}", stored.peer);
    }

    if config.pairing.pair_on_start || !link.transport().is_paired() {
        match link.pair_with_timeout(config.pairing.timeout()).await {
            Some(peer) => {
                info!("Paired with {}", peer);
                stored.peer = peer;
                stored.rf_channel = link.transport().rf_channel();
                if let Err(e) = store.save(&stored) {
                    warn!("Failed to save settings: {}", e);
                }
            }
            None if link.transport().is_paired() => info!("Keeping peer {}", stored.peer),
            None => warn!("Not paired, control frames will fail until the receiver pairs"),
        }
    }

    let mut telemetry_log = if config.telemetry.enabled {
        Some(TelemetryLogger::new(
            &config.telemetry.log_dir,
            config.telemetry.max_records_per_file,
            config.telemetry.max_files_to_keep,
        )?)
    } else {
        None
    };

    let mut tick = interval(config.link.tick_interval());
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!("Starting control loop at {}Hz", config.link.packet_rate_hz);
    info!("Press Ctrl+C to exit");

    // No input source yet; the transmitter holds every channel centered
    let frame = ControlFrame::neutral();
    let mut last_sent: Option<ControlFrame> = None;
    let mut tick_count: u64 = 0;
    let mut sent_count: u64 = 0;

    loop {
        tokio::select! {
            _ = tick.tick() => {
                tick_count += 1;

                if link.control_due(last_sent != Some(frame)) && link.send_control(&frame).await {
                    last_sent = Some(frame);
                    sent_count += 1;
                }

                if let Some(reading) = link.handle().await {
                    info!("Receiver battery: {} mV", reading.battery_mv);
                    if let Some(logger) = telemetry_log.as_mut() {
                        let record = TelemetryRecord::now(reading.battery_mv, link.link_quality());
                        if let Err(e) = logger.log(&record) {
                            warn!("Failed to log telemetry: {}", e);
                        }
                    }
                }

                match link.take_event() {
                    Some(LinkEvent::Degraded { quality }) => warn!("Link degraded ({}%)", quality),
                    Some(LinkEvent::Recovered { quality }) => info!("Link recovered ({}%)", quality),
                    None => {}
                }

                if tick_count % STATUS_LOG_INTERVAL_TICKS == 0 {
                    info!(
                        "Link quality {}%, {} control frames sent",
                        link.link_quality(),
                        sent_count
                    );
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                info!("Total control frames sent: {}", sent_count);
                break;
            }
        }
    }

    debug!("Final link quality: {}%", link.link_quality());
    Ok(())
}

/// Load the given config file, or the default file if it exists
fn load_config(arg: Option<&str>) -> Result<Config> {
    match arg {
        Some(path) => Config::load(path).with_context(|| format!("Failed to load config {}", path)),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => Config::load(DEFAULT_CONFIG_PATH)
            .with_context(|| format!("Failed to load config {}", DEFAULT_CONFIG_PATH)),
        None => Ok(Config::default()),
    }
}

/// Console logging, plus a daily file when `file_dir` is set
///
/// `RUST_LOG` overrides the configured level.
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let registry = tracing_subscriber::registry().with(filter).with(fmt::layer());

    match &config.file_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "rc-link.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            registry
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .init();
            Some(guard)
        }
        None => {
            registry.init();
            None
        }
    }
}
