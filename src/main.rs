//! # Pad Tracker
//!
//! Connects to a Tello drone and prints its absolute position over the
//! mission pad grid until Ctrl+C.
//!
//! ```bash
//! cargo run --release -- config/pad-tracker.toml
//! ```
//!
//! Expected output:
//! ```text
//! INFO pad_tracker: Pad Tracker v0.1.0 starting...
//! INFO pad_tracker::link::tello: Connected to Tello at 192.168.10.1:8889
//! INFO pad_tracker: Calibrated bat 87% | pad   2 | (-5.0, 35.0, 10.0) fresh
//! ```

use anyhow::{Context, Result};
use tokio::time::{interval, Duration};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pad_tracker::config::Config;
use pad_tracker::link::tello::TelloLink;
use pad_tracker::telemetry::{MarkerId, TelemetrySnapshot};
use pad_tracker::vehicle::Vehicle;

#[tokio::main]
async fn main() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(&path).with_context(|| format!("loading {}", path))?,
        None => Config::default(),
    };

    // Held until exit so buffered file logs are flushed
    let _log_guard = init_logging(&config.display.log_dir);

    info!("Pad Tracker v{} starting...", env!("CARGO_PKG_VERSION"));

    let link = TelloLink::bind(config.link.clone())
        .await
        .with_context(|| format!("binding state port {}", config.link.state_port))?;
    let vehicle = Vehicle::spawn(link, &config);
    if let Err(e) = vehicle.set_host(&config.vehicle.host).await {
        warn!("{} (position display continues)", e);
    }

    let mut refresh = interval(Duration::from_millis(config.display.refresh_ms));
    info!("Press Ctrl+C to exit");

    loop {
        tokio::select! {
            _ = refresh.tick() => {
                let snapshot = vehicle.snapshot();
                if config.display.format == "jsonl" {
                    println!("{}", serde_json::to_string(&snapshot)?);
                } else {
                    info!("{}", status_line(&snapshot));
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    vehicle.shutdown().await;
    Ok(())
}

/// Log to stdout, and to a daily rolling file when `log_dir` is set
fn init_logging(log_dir: &str) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = || EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    if log_dir.is_empty() {
        tracing_subscriber::fmt().with_env_filter(filter()).init();
        return None;
    }

    let appender = tracing_appender::rolling::daily(log_dir, "pad-tracker.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Some(guard)
}

/// One-line human readable status
fn status_line(snapshot: &TelemetrySnapshot) -> String {
    let position = snapshot.absolute_position;
    format!(
        "{} bat {}% | pad {:>3} | ({:.1}, {:.1}, {:.1}) {}",
        snapshot.connection_status,
        snapshot.battery_percent,
        snapshot.last_seen_marker_id.map_or(0, MarkerId::get),
        position.x,
        position.y,
        position.z,
        if snapshot.is_fresh { "fresh" } else { "stale" }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pad_tracker::telemetry::{ConnectionStatus, Position};

    #[test]
    fn test_status_line_fresh() {
        let snapshot = TelemetrySnapshot {
            battery_percent: 87,
            last_seen_marker_id: MarkerId::new(2),
            absolute_position: Position::new(-5.0, 35.0, 10.0),
            is_fresh: true,
            connection_status: ConnectionStatus::Calibrated,
            ..TelemetrySnapshot::default()
        };
        assert_eq!(status_line(&snapshot), "Calibrated bat 87% | pad   2 | (-5.0, 35.0, 10.0) fresh");
    }

    #[test]
    fn test_status_line_never_seen() {
        let line = status_line(&TelemetrySnapshot::default());
        assert_eq!(line, "Idle bat 0% | pad   0 | (0.0, 0.0, 0.0) stale");
    }
}
