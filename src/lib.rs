//! # Pad Tracker Library
//!
//! Absolute position and live telemetry for a Tello drone flying over a grid
//! of mission pads.
//!
//! The drone only reports its distance from the pad currently in view. This
//! library polls it in the background, converts pad-relative readings into
//! absolute grid coordinates, and publishes a thread-safe snapshot that any
//! number of consumers can read.

pub mod config;
pub mod error;
pub mod link;
pub mod telemetry;
pub mod vehicle;
