//! # Vehicle Handle
//!
//! Consumer-facing handle for one vehicle: owns the link, the shared
//! telemetry state and the telemetry poller.
//!
//! Connecting and flight commands take the command lock for their whole
//! duration, so at most one of them is in progress at a time. The poller does
//! not take that lock and keeps tracking the vehicle while it flies.
//!
//! ## Usage
//!
//! ```no_run
//! use pad_tracker::config::Config;
//! use pad_tracker::link::tello::TelloLink;
//! use pad_tracker::vehicle::Vehicle;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     let vehicle = Vehicle::spawn(TelloLink::bind(config.link.clone()).await?, &config);
//!
//!     vehicle.set_host("192.168.10.1").await?;
//!     let snapshot = vehicle.snapshot();
//!     println!("pad {:?} at {:?}", snapshot.last_seen_marker_id, snapshot.absolute_position);
//!
//!     vehicle.shutdown().await;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;
use tokio::sync::{watch, Mutex, MutexGuard};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{LinkError, PadTrackerError, Result};
use crate::link::{DetectionDirection, MoveCommand, VehicleLink};
use crate::telemetry::{ConnectionStatus, PollerHandle, SharedState, TelemetryPoller, TelemetrySnapshot};

/// Handle to one vehicle and its telemetry
pub struct Vehicle<L> {
    link: Arc<L>,
    commands: Mutex<()>,
    state: Arc<SharedState>,
    status: watch::Sender<ConnectionStatus>,
    detection_direction: DetectionDirection,
    poller: PollerHandle,
}

impl<L> std::fmt::Debug for Vehicle<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vehicle")
            .field("status", &*self.status.borrow())
            .field("detection_direction", &self.detection_direction)
            .finish_non_exhaustive()
    }
}

impl<L: VehicleLink + 'static> Vehicle<L> {
    /// Create the handle and start its telemetry poller
    ///
    /// The vehicle starts `Idle`; call [`set_host`](Self::set_host) to connect.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime, or when the configured poll
    /// interval is zero (rejected by [`Config::validate`]).
    pub fn spawn(link: L, config: &Config) -> Self {
        let link = Arc::new(link);
        let state = Arc::new(SharedState::new());
        let (status, status_rx) = watch::channel(ConnectionStatus::Idle);

        let poller = TelemetryPoller::new(
            Arc::clone(&link),
            Arc::clone(&state),
            status_rx,
            config.grid.clone(),
            config.poller.interval(),
        )
        .spawn();

        Self {
            link,
            commands: Mutex::new(()),
            state,
            status,
            detection_direction: config.vehicle.detection_direction,
            poller,
        }
    }

    /// Point the vehicle at `host`, connect, and enable pad detection
    ///
    /// The vehicle counts as disconnected from the moment this is called.
    /// Position data from before is kept.
    ///
    /// # Errors
    ///
    /// Returns `Connection` if connecting or configuring pad detection fails;
    /// the status is then `Failed`.
    pub async fn set_host(&self, host: &str) -> Result<()> {
        let host = host.trim();
        self.status.send_replace(ConnectionStatus::Connecting);

        match self.connect_and_calibrate(host).await {
            Ok(()) => {
                self.status.send_replace(ConnectionStatus::Calibrated);
                info!("Vehicle at {} connected, pad detection enabled", host);
                Ok(())
            }
            Err(source) => {
                self.status.send_replace(ConnectionStatus::Failed);
                warn!("Failed to connect to vehicle at {}: {}", host, source);
                Err(PadTrackerError::Connection { host: host.to_string(), source })
            }
        }
    }

    async fn connect_and_calibrate(&self, host: &str) -> std::result::Result<(), LinkError> {
        if host.is_empty() {
            return Err(LinkError::InvalidHost("empty host".to_string()));
        }

        let _command = self.commands.lock().await;
        info!("Connecting to vehicle at {}", host);
        self.link.connect(host).await?;
        self.status.send_replace(ConnectionStatus::Connected);

        self.status.send_replace(ConnectionStatus::Calibrating);
        self.link.enable_marker_detection().await?;
        self.link.set_detection_direction(self.detection_direction).await?;
        Ok(())
    }

    /// Latest telemetry snapshot
    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.state.read()
    }

    /// Receiver notified on every published snapshot
    pub fn subscribe(&self) -> watch::Receiver<TelemetrySnapshot> {
        self.state.subscribe()
    }

    /// Current connection status
    ///
    /// Can be ahead of the snapshot's status by up to one poll cycle.
    pub fn connection_status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.connection_status().is_connected()
    }

    pub async fn takeoff(&self) -> Result<()> {
        let _command = self.command_lock().await?;
        info!("Taking off");
        Ok(self.link.takeoff().await?)
    }

    pub async fn land(&self) -> Result<()> {
        let _command = self.command_lock().await?;
        info!("Landing");
        Ok(self.link.land().await?)
    }

    /// Fly a pad-relative move
    ///
    /// # Errors
    ///
    /// Returns `Command(InvalidArgument)` without touching the link when an
    /// argument is out of range.
    pub async fn move_to(&self, command: MoveCommand) -> Result<()> {
        command.validate()?;
        let _command = self.command_lock().await?;
        info!(
            "Moving to ({}, {}, {}) from pad {} to pad {}",
            command.x,
            command.y,
            command.z,
            command.from.get(),
            command.to.get()
        );
        Ok(self.link.move_to(command).await?)
    }

    /// Wait until no other command is in progress
    async fn command_lock(&self) -> Result<MutexGuard<'_, ()>> {
        if !self.is_connected() {
            return Err(PadTrackerError::NotConnected);
        }
        Ok(self.commands.lock().await)
    }

    /// Stop the poller and wait for it to exit
    pub async fn shutdown(self) {
        self.poller.shutdown().await;
    }
}
