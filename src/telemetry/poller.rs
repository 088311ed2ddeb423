//! # Telemetry Poller
//!
//! Background task that reads the vehicle link at a fixed interval and
//! publishes one [`TelemetrySnapshot`] per cycle into [`SharedState`].
//!
//! ## Cycle
//!
//! 1. Not connected: publish the previous snapshot marked stale, skip all queries.
//! 2. Otherwise refresh the link once, then query yaw, speed, battery and pad
//!    id, plus the pad distances when a pad in the layout is in view. Every
//!    query of the cycle answers from that one refresh.
//! 3. Publish the successor snapshot. A failed query makes the whole cycle
//!    stale; it is logged and never stops the poller.
//!
//! The poller is the only writer of [`SharedState`] and never changes the
//! connection status. It keeps polling while a flight command is in progress.
//! Stopping takes effect between cycles; a query already in flight is allowed
//! to finish.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::shared::SharedState;
use super::snapshot::{
    ConnectionStatus, MarkerId, MarkerReading, Position, TelemetryReading, TelemetrySnapshot, Velocity,
};
use crate::config::GridConfig;
use crate::error::LinkResult;
use crate::link::VehicleLink;

/// Query one full reading from the link
///
/// Pad distances are only requested when the reported pad is part of `grid`.
pub async fn read_telemetry<L: VehicleLink + ?Sized>(
    link: &L,
    grid: &GridConfig,
) -> LinkResult<TelemetryReading> {
    link.refresh().await?;
    let yaw_degrees = link.yaw().await?;
    let speed = Velocity::new(link.speed_x().await?, link.speed_y().await?, link.speed_z().await?);
    let battery_percent = link.battery_percent().await?;

    let marker = match MarkerId::in_layout(link.marker_id().await?, grid) {
        Some(id) => {
            let offset = Position::new(
                link.marker_distance_x().await?,
                link.marker_distance_y().await?,
                link.marker_distance_z().await?,
            );
            Some(MarkerReading { id, offset })
        }
        None => None,
    };

    Ok(TelemetryReading { yaw_degrees, speed, battery_percent, marker })
}

/// Periodic telemetry reader for one vehicle
pub struct TelemetryPoller<L> {
    link: Arc<L>,
    state: Arc<SharedState>,
    status: watch::Receiver<ConnectionStatus>,
    grid: GridConfig,
    period: Duration,
}

impl<L: VehicleLink + 'static> TelemetryPoller<L> {
    pub fn new(
        link: Arc<L>,
        state: Arc<SharedState>,
        status: watch::Receiver<ConnectionStatus>,
        grid: GridConfig,
        period: Duration,
    ) -> Self {
        Self { link, state, status, grid, period }
    }

    /// Start polling on the current tokio runtime
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn spawn(self) -> PollerHandle {
        let (stop, stop_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(stop_rx));
        PollerHandle { stop, task: Some(task) }
    }

    async fn run(self, mut stop: watch::Receiver<bool>) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Telemetry poller started ({:?} interval)", self.period);

        loop {
            tokio::select! {
                biased;
                // Err means the handle is gone, which also stops polling
                _ = stop.changed() => break,
                _ = ticker.tick() => {
                    if *stop.borrow() {
                        break;
                    }
                    let snapshot = self.poll_once().await;
                    self.state.publish(snapshot);
                }
            }
        }

        info!("Telemetry poller stopped");
    }

    /// Produce the snapshot for one cycle
    pub async fn poll_once(&self) -> TelemetrySnapshot {
        let previous = self.state.read();
        let status = *self.status.borrow();

        if !status.is_connected() {
            debug!("Skipping telemetry queries ({})", status);
            return previous.stale(status);
        }

        match read_telemetry(&*self.link, &self.grid).await {
            Ok(reading) => {
                let next = previous.advance(status, &reading, &self.grid);
                debug!(
                    "Cycle {}: pad {:?}, position ({:.1}, {:.1}, {:.1}), fresh {}",
                    next.sequence,
                    next.marker_id.map(MarkerId::get),
                    next.absolute_position.x,
                    next.absolute_position.y,
                    next.absolute_position.z,
                    next.is_fresh
                );
                next
            }
            Err(e) => {
                warn!("Telemetry query failed, keeping previous values: {}", e);
                previous.stale(status)
            }
        }
    }
}

/// Stop control for a running poller
///
/// Dropping the handle also stops the poller.
#[derive(Debug)]
pub struct PollerHandle {
    stop: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    /// Ask the poller to stop before its next cycle
    pub fn stop(&self) {
        self.stop.send_replace(true);
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Stop the poller and wait for it to exit
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Telemetry poller ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.stop.send_replace(true);
    }
}
