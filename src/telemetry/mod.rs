//! # Telemetry Module
//!
//! Turns raw vehicle readings into a continuously refreshed, thread-safe
//! snapshot of the vehicle's state.
//!
//! This module handles:
//! - Converting pad-relative readings into absolute grid positions
//! - Polling the vehicle link at a fixed interval
//! - Publishing one consistent snapshot per cycle to any number of readers
//! - Keeping the last known position while no pad is in view

pub mod estimator;
pub mod poller;
pub mod shared;
pub mod snapshot;

pub use estimator::{estimate_position, grid_cell};
pub use poller::{read_telemetry, PollerHandle, TelemetryPoller};
pub use shared::SharedState;
pub use snapshot::{
    ConnectionStatus, MarkerId, MarkerReading, Position, TelemetryReading, TelemetrySnapshot, Velocity,
};
