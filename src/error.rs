//! # Error Types
//!
//! Custom error types for Pad Tracker using `thiserror`.
//!
//! Two layers exist:
//! - [`LinkError`]: outcome of a single operation on a vehicle link. Query
//!   failures stay at this layer and are absorbed by the telemetry poller.
//! - [`PadTrackerError`]: failures surfaced to callers of the vehicle handle.

use std::time::Duration;
use thiserror::Error;

/// Error reported by a [`VehicleLink`](crate::link::VehicleLink) operation
#[derive(Debug, Error)]
pub enum LinkError {
    /// Socket I/O errors
    #[error("link I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No reply arrived for a command, retries included
    #[error("no response to '{0}'")]
    Timeout(String),

    /// The vehicle answered a command with something other than `ok`
    #[error("'{command}' rejected: {response}")]
    Rejected { command: String, response: String },

    /// No state datagram has been received yet
    #[error("no telemetry state received")]
    NoState,

    /// The newest state datagram is too old to be trusted
    #[error("telemetry state is stale ({0:?} old)")]
    StaleState(Duration),

    /// A datagram could not be decoded
    #[error("malformed datagram: {0}")]
    Malformed(String),

    /// The host could not be resolved to a socket address
    #[error("invalid host: {0}")]
    InvalidHost(String),

    /// A command argument is outside the range the vehicle accepts
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation attempted before `connect`
    #[error("link is not connected")]
    NotConnected,
}

/// Main error type for Pad Tracker
#[derive(Debug, Error)]
pub enum PadTrackerError {
    /// Establishing or configuring the link failed
    #[error("failed to connect to {host}: {source}")]
    Connection {
        host: String,
        #[source]
        source: LinkError,
    },

    /// A flight command failed
    #[error("command failed: {0}")]
    Command(#[from] LinkError),

    /// A flight command was issued while the vehicle is not connected
    #[error("vehicle is not connected")]
    NotConnected,

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Pad Tracker
pub type Result<T> = std::result::Result<T, PadTrackerError>;

/// Result type alias for vehicle link operations
pub type LinkResult<T> = std::result::Result<T, LinkError>;
