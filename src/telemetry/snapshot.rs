//! # Telemetry Snapshot
//!
//! The value published once per poll cycle, and how one cycle's snapshot is
//! derived from the previous one.

use serde::Serialize;

use super::estimator::estimate_position;
use crate::config::GridConfig;

/// Connection lifecycle of the vehicle link
///
/// `Idle → Connecting → {Connected, Failed}`, then
/// `Connected → Calibrating → Calibrated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ConnectionStatus {
    #[default]
    Idle,
    Connecting,
    Connected,
    Failed,
    Calibrating,
    Calibrated,
}

impl ConnectionStatus {
    /// Whether the link is up and may be queried
    pub fn is_connected(self) -> bool {
        matches!(
            self,
            ConnectionStatus::Connected | ConnectionStatus::Calibrating | ConnectionStatus::Calibrated
        )
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// Validated mission pad id (1 or greater)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct MarkerId(u32);

impl MarkerId {
    /// `None` for zero and negative ids
    pub fn new(raw: i32) -> Option<Self> {
        u32::try_from(raw).ok().filter(|&id| id >= 1).map(MarkerId)
    }

    /// Validate a raw reading against the pad layout
    ///
    /// Ids that are absent, not positive, or beyond `max_marker_id` all mean
    /// "no pad in view".
    pub fn in_layout(raw: Option<i32>, grid: &GridConfig) -> Option<Self> {
        raw.and_then(Self::new).filter(|id| id.0 <= grid.max_marker_id)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

/// Point in the pad grid frame, cm
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Velocity components, cm/s
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Velocity {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Velocity {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean norm
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// Pad in view and the vehicle's distance from it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerReading {
    pub id: MarkerId,
    pub offset: Position,
}

/// Everything read from the link in one successful poll cycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryReading {
    pub yaw_degrees: f64,
    pub speed: Velocity,
    pub battery_percent: u8,
    pub marker: Option<MarkerReading>,
}

/// One consistent set of telemetry, produced by a single poll cycle
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct TelemetrySnapshot {
    /// Publication counter, 0 for the initial snapshot
    pub sequence: u64,
    pub yaw_degrees: f64,
    pub speed: Velocity,
    pub total_speed: f64,
    pub battery_percent: u8,
    /// Pad in view during the cycle that produced this snapshot
    pub marker_id: Option<MarkerId>,
    /// Last known absolute position
    pub absolute_position: Position,
    pub last_seen_marker_id: Option<MarkerId>,
    /// A pad was in view during this cycle and `absolute_position` is current
    pub is_fresh: bool,
    pub connection_status: ConnectionStatus,
}

impl TelemetrySnapshot {
    pub fn connected(&self) -> bool {
        self.connection_status.is_connected()
    }

    /// Successor for a cycle that produced no data
    ///
    /// Every field is retained except `is_fresh`, which is forced false.
    #[must_use]
    pub fn stale(&self, status: ConnectionStatus) -> Self {
        Self {
            sequence: self.sequence + 1,
            is_fresh: false,
            connection_status: status,
            ..*self
        }
    }

    /// Successor for a cycle that read `reading` from the link
    ///
    /// The absolute position only moves when a pad was in view; otherwise the
    /// previous position and last seen pad are kept.
    #[must_use]
    pub fn advance(&self, status: ConnectionStatus, reading: &TelemetryReading, grid: &GridConfig) -> Self {
        let marker_id = reading.marker.map(|m| m.id);
        let estimate = reading
            .marker
            .and_then(|m| estimate_position(Some(m.id), m.offset, grid));

        let (absolute_position, last_seen_marker_id, is_fresh) = match estimate {
            Some(position) => (position, marker_id, true),
            None => (self.absolute_position, self.last_seen_marker_id, false),
        };

        Self {
            sequence: self.sequence + 1,
            yaw_degrees: reading.yaw_degrees,
            speed: reading.speed,
            total_speed: reading.speed.magnitude(),
            battery_percent: reading.battery_percent,
            marker_id,
            absolute_position,
            last_seen_marker_id,
            is_fresh,
            connection_status: status,
        }
    }
}
