//! # Vehicle Link Module
//!
//! Abstraction over the connection to the vehicle.
//!
//! This module handles:
//! - The [`VehicleLink`] trait consumed by the telemetry poller and the vehicle handle
//! - Mission pad detection direction
//! - Pad-to-pad move commands and their argument ranges
//! - A UDP implementation for Tello drones ([`tello::TelloLink`])

pub mod protocol;
pub mod tello;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{LinkError, LinkResult};
use crate::telemetry::MarkerId;

/// Which camera the vehicle uses to look for mission pads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionDirection {
    /// Downward camera only
    Downward,
    /// Forward camera only
    Forward,
    /// Both cameras
    #[default]
    Both,
}

impl DetectionDirection {
    /// Numeric code used on the wire
    pub fn code(self) -> u8 {
        match self {
            DetectionDirection::Downward => 0,
            DetectionDirection::Forward => 1,
            DetectionDirection::Both => 2,
        }
    }
}

/// Coordinate range accepted for a pad-relative move, in cm
pub const MOVE_DISTANCE_RANGE: std::ops::RangeInclusive<i32> = -500..=500;

/// Speed range accepted for a pad-relative move, in cm/s
pub const MOVE_SPEED_RANGE: std::ops::RangeInclusive<u32> = 10..=100;

/// Yaw range accepted for a pad-relative move, in degrees
pub const MOVE_YAW_RANGE: std::ops::RangeInclusive<i32> = -360..=360;

/// Fly to `(x, y, z)` relative to pad `from`, then find pad `to` and turn to `yaw`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveCommand {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub speed: u32,
    pub yaw: i32,
    pub from: MarkerId,
    pub to: MarkerId,
}

impl MoveCommand {
    /// Check every argument against the ranges the vehicle accepts
    pub fn validate(&self) -> LinkResult<()> {
        for (axis, value) in [("x", self.x), ("y", self.y), ("z", self.z)] {
            if !MOVE_DISTANCE_RANGE.contains(&value) {
                return Err(LinkError::InvalidArgument(format!(
                    "{} = {} is outside {:?}",
                    axis, value, MOVE_DISTANCE_RANGE
                )));
            }
        }

        if !MOVE_SPEED_RANGE.contains(&self.speed) {
            return Err(LinkError::InvalidArgument(format!(
                "speed = {} is outside {:?}",
                self.speed, MOVE_SPEED_RANGE
            )));
        }

        if !MOVE_YAW_RANGE.contains(&self.yaw) {
            return Err(LinkError::InvalidArgument(format!(
                "yaw = {} is outside {:?}",
                self.yaw, MOVE_YAW_RANGE
            )));
        }

        Ok(())
    }
}

/// Operations the core needs from a vehicle connection
///
/// Every operation may fail and reports failure as a [`LinkError`]. Connection
/// lifecycle and retry policy belong to the implementation.
///
/// Telemetry queries answer from the state captured by the last
/// [`refresh`](Self::refresh), so one refresh followed by any number of
/// queries describes a single instant. Queries must not wait on flight
/// commands: the poller keeps reading while a command is in progress.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VehicleLink: Send + Sync {
    /// (Re)target the link at `host` and establish the connection
    async fn connect(&self, host: &str) -> LinkResult<()>;

    /// Turn on mission pad detection
    async fn enable_marker_detection(&self) -> LinkResult<()>;

    /// Choose the camera used for mission pad detection
    async fn set_detection_direction(&self, direction: DetectionDirection) -> LinkResult<()>;

    /// Capture the vehicle's current state for the queries that follow
    async fn refresh(&self) -> LinkResult<()> {
        Ok(())
    }

    /// Heading in degrees
    async fn yaw(&self) -> LinkResult<f64>;

    async fn speed_x(&self) -> LinkResult<f64>;

    async fn speed_y(&self) -> LinkResult<f64>;

    async fn speed_z(&self) -> LinkResult<f64>;

    /// Remaining battery, 0-100
    async fn battery_percent(&self) -> LinkResult<u8>;

    /// Raw id of the pad currently in view, `None` when no pad is seen
    async fn marker_id(&self) -> LinkResult<Option<i32>>;

    /// Distance along the vehicle's x axis from the pad in view
    async fn marker_distance_x(&self) -> LinkResult<f64>;

    async fn marker_distance_y(&self) -> LinkResult<f64>;

    async fn marker_distance_z(&self) -> LinkResult<f64>;

    async fn takeoff(&self) -> LinkResult<()>;

    async fn land(&self) -> LinkResult<()>;

    /// Fly a pad-relative move
    async fn move_to(&self, command: MoveCommand) -> LinkResult<()>;
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Values the mock link reports to queries
    #[derive(Debug, Clone, Default)]
    pub struct MockFrame {
        pub yaw: f64,
        pub speed: (f64, f64, f64),
        pub battery: u8,
        pub marker: Option<i32>,
        pub distance: (f64, f64, f64),
    }

    /// Mock vehicle link for testing
    ///
    /// Clones share state, so a test keeps one clone to steer the link after
    /// handing another to the code under test.
    #[derive(Clone, Default)]
    pub struct MockLink {
        pub frame: Arc<Mutex<MockFrame>>,
        pub fail_queries: Arc<Mutex<bool>>,
        pub connect_error: Arc<Mutex<bool>>,
        pub calibration_error: Arc<Mutex<bool>>,
        pub commands: Arc<Mutex<Vec<String>>>,
        pub query_count: Arc<AtomicUsize>,
        pub command_delay: Arc<Mutex<Duration>>,
    }

    impl MockLink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_frame(&self, frame: MockFrame) {
            *self.frame.lock().unwrap() = frame;
        }

        pub fn set_marker(&self, marker: Option<i32>, distance: (f64, f64, f64)) {
            let mut frame = self.frame.lock().unwrap();
            frame.marker = marker;
            frame.distance = distance;
        }

        pub fn set_fail_queries(&self, fail: bool) {
            *self.fail_queries.lock().unwrap() = fail;
        }

        pub fn set_connect_error(&self, fail: bool) {
            *self.connect_error.lock().unwrap() = fail;
        }

        pub fn set_calibration_error(&self, fail: bool) {
            *self.calibration_error.lock().unwrap() = fail;
        }

        /// Make flight commands take `delay` before they complete
        pub fn set_command_delay(&self, delay: Duration) {
            *self.command_delay.lock().unwrap() = delay;
        }

        pub fn get_commands(&self) -> Vec<String> {
            self.commands.lock().unwrap().clone()
        }

        pub fn queries(&self) -> usize {
            self.query_count.load(Ordering::SeqCst)
        }

        fn query<T>(&self, read: impl FnOnce(&MockFrame) -> T) -> LinkResult<T> {
            self.query_count.fetch_add(1, Ordering::SeqCst);
            if *self.fail_queries.lock().unwrap() {
                return Err(LinkError::Timeout("mock query".to_string()));
            }
            Ok(read(&self.frame.lock().unwrap()))
        }

        fn record(&self, command: String) {
            self.commands.lock().unwrap().push(command);
        }

        /// Wait out the command delay, then record the command as completed
        async fn fly(&self, command: String) {
            let delay = *self.command_delay.lock().unwrap();
            tokio::time::sleep(delay).await;
            self.record(command);
        }
    }

    #[async_trait]
    impl VehicleLink for MockLink {
        async fn connect(&self, host: &str) -> LinkResult<()> {
            self.record(format!("connect {}", host));
            if *self.connect_error.lock().unwrap() {
                return Err(LinkError::Timeout("command".to_string()));
            }
            Ok(())
        }

        async fn enable_marker_detection(&self) -> LinkResult<()> {
            self.record("mon".to_string());
            if *self.calibration_error.lock().unwrap() {
                return Err(LinkError::Rejected {
                    command: "mon".to_string(),
                    response: "error".to_string(),
                });
            }
            Ok(())
        }

        async fn set_detection_direction(&self, direction: DetectionDirection) -> LinkResult<()> {
            self.record(format!("mdirection {}", direction.code()));
            Ok(())
        }

        async fn refresh(&self) -> LinkResult<()> {
            self.query(|_| ())
        }

        async fn yaw(&self) -> LinkResult<f64> {
            self.query(|f| f.yaw)
        }

        async fn speed_x(&self) -> LinkResult<f64> {
            self.query(|f| f.speed.0)
        }

        async fn speed_y(&self) -> LinkResult<f64> {
            self.query(|f| f.speed.1)
        }

        async fn speed_z(&self) -> LinkResult<f64> {
            self.query(|f| f.speed.2)
        }

        async fn battery_percent(&self) -> LinkResult<u8> {
            self.query(|f| f.battery)
        }

        async fn marker_id(&self) -> LinkResult<Option<i32>> {
            self.query(|f| f.marker)
        }

        async fn marker_distance_x(&self) -> LinkResult<f64> {
            self.query(|f| f.distance.0)
        }

        async fn marker_distance_y(&self) -> LinkResult<f64> {
            self.query(|f| f.distance.1)
        }

        async fn marker_distance_z(&self) -> LinkResult<f64> {
            self.query(|f| f.distance.2)
        }

        async fn takeoff(&self) -> LinkResult<()> {
            self.fly("takeoff".to_string()).await;
            Ok(())
        }

        async fn land(&self) -> LinkResult<()> {
            self.fly("land".to_string()).await;
            Ok(())
        }

        async fn move_to(&self, command: MoveCommand) -> LinkResult<()> {
            command.validate()?;
            self.fly(format!(
                "move {} {} {} -> m{}",
                command.x, command.y, command.z, command.to.get()
            ))
            .await;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pad(id: i32) -> MarkerId {
        MarkerId::new(id).unwrap()
    }

    fn valid_move() -> MoveCommand {
        MoveCommand { x: 0, y: -50, z: 100, speed: 50, yaw: 0, from: pad(1), to: pad(2) }
    }

    #[test]
    fn test_detection_direction_codes() {
        assert_eq!(DetectionDirection::Downward.code(), 0);
        assert_eq!(DetectionDirection::Forward.code(), 1);
        assert_eq!(DetectionDirection::Both.code(), 2);
        assert_eq!(DetectionDirection::default(), DetectionDirection::Both);
    }

    #[test]
    fn test_valid_move_command() {
        assert!(valid_move().validate().is_ok());
    }

    #[test]
    fn test_move_distance_out_of_range() {
        let command = MoveCommand { z: 501, ..valid_move() };
        match command.validate() {
            Err(LinkError::InvalidArgument(msg)) => assert!(msg.starts_with("z = 501")),
            other => panic!("Expected InvalidArgument, got: {:?}", other),
        }
    }

    #[test]
    fn test_move_speed_out_of_range() {
        assert!(MoveCommand { speed: 9, ..valid_move() }.validate().is_err());
        assert!(MoveCommand { speed: 101, ..valid_move() }.validate().is_err());
        assert!(MoveCommand { speed: 10, ..valid_move() }.validate().is_ok());
    }

    #[test]
    fn test_move_yaw_out_of_range() {
        assert!(MoveCommand { yaw: -361, ..valid_move() }.validate().is_err());
        assert!(MoveCommand { yaw: 360, ..valid_move() }.validate().is_ok());
    }
}
