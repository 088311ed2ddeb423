//! # Tello SDK Protocol
//!
//! Text protocol spoken by Tello drones over UDP.
//!
//! ## Commands
//!
//! Commands are plain ASCII datagrams sent to port 8889. The drone answers
//! each one with `ok` or an error message from the same port.
//!
//! | Command | Meaning |
//! |---------|---------|
//! | `command` | Enter SDK mode |
//! | `mon` | Enable mission pad detection |
//! | `mdirection N` | Pad detection camera (0 down, 1 forward, 2 both) |
//! | `takeoff` / `land` | Auto takeoff / landing |
//! | `jump x y z speed yaw mA mB` | Fly relative to pad A, then align over pad B |
//!
//! ## State
//!
//! The drone broadcasts a state datagram to port 8890 roughly every 100ms:
//!
//! ```text
//! mid:1;x:12;y:-3;z:80;mpry:0,0,0;pitch:0;roll:0;yaw:90;vgx:0;vgy:0;vgz:0;templ:60;temph:63;tof:80;h:80;bat:87;baro:12.34;time:5;agx:0.00;agy:0.00;agz:-1000.00;
//! ```
//!
//! `mid` is `-1` when no pad is in view. Pad distances and speeds are in cm and cm/s.

use std::collections::HashMap;
use std::fmt;

use super::{DetectionDirection, MoveCommand};
use crate::error::{LinkError, LinkResult};

/// Port the drone listens on for commands
pub const TELLO_COMMAND_PORT: u16 = 8889;

/// Port the drone sends state datagrams to
pub const TELLO_STATE_PORT: u16 = 8890;

/// `mid` value meaning no pad is in view
pub const NO_MISSION_PAD: i32 = -1;

/// Reply to a successful command
const RESPONSE_OK: &str = "ok";

/// A command understood by the drone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelloCommand {
    EnterSdkMode,
    MissionPadsOn,
    MissionPadDirection(DetectionDirection),
    Takeoff,
    Land,
    Jump(MoveCommand),
}

impl TelloCommand {
    /// Whether the drone only replies once the maneuver is finished
    pub fn is_motion(&self) -> bool {
        matches!(self, TelloCommand::Takeoff | TelloCommand::Land | TelloCommand::Jump(_))
    }
}

impl fmt::Display for TelloCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelloCommand::EnterSdkMode => write!(f, "command"),
            TelloCommand::MissionPadsOn => write!(f, "mon"),
            TelloCommand::MissionPadDirection(direction) => {
                write!(f, "mdirection {}", direction.code())
            }
            TelloCommand::Takeoff => write!(f, "takeoff"),
            TelloCommand::Land => write!(f, "land"),
            TelloCommand::Jump(m) => write!(
                f,
                "jump {} {} {} {} {} m{} m{}",
                m.x, m.y, m.z, m.speed, m.yaw, m.from.get(), m.to.get()
            ),
        }
    }
}

/// Interpret the drone's reply to `command`
///
/// # Errors
///
/// Returns `Rejected` for anything but `ok`, `Malformed` for non-UTF-8 replies.
pub fn parse_response(command: &TelloCommand, reply: &[u8]) -> LinkResult<()> {
    let text = std::str::from_utf8(reply)
        .map_err(|_| LinkError::Malformed(format!("non UTF-8 reply to '{}'", command)))?
        .trim();

    if text.eq_ignore_ascii_case(RESPONSE_OK) {
        Ok(())
    } else {
        Err(LinkError::Rejected {
            command: command.to_string(),
            response: text.to_string(),
        })
    }
}

/// One decoded state datagram
///
/// Only the fields the telemetry poller reads are kept.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TelloState {
    /// Pad in view, or [`NO_MISSION_PAD`]
    pub mid: i32,
    /// Distance from the pad in view, cm
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Heading, degrees
    pub yaw: f64,
    /// Ground speed, cm/s
    pub vgx: f64,
    pub vgy: f64,
    pub vgz: f64,
    /// Battery, percent
    pub bat: u8,
}

impl TelloState {
    /// Pad id when one is in view
    pub fn mission_pad(&self) -> Option<i32> {
        (self.mid != NO_MISSION_PAD).then_some(self.mid)
    }
}

/// Decode a state datagram
///
/// `yaw`, `vgx`, `vgy`, `vgz` and `bat` are required. Pad fields are absent
/// when mission pads are disabled and decode as "no pad".
///
/// # Examples
///
/// ```
/// use pad_tracker::link::protocol::parse_state;
///
/// let state = parse_state("mid:4;x:10;y:-5;z:80;yaw:90;vgx:1;vgy:0;vgz:0;bat:76;").unwrap();
/// assert_eq!(state.mission_pad(), Some(4));
/// assert_eq!(state.bat, 76);
/// ```
pub fn parse_state(datagram: &str) -> LinkResult<TelloState> {
    let fields: HashMap<&str, &str> = datagram
        .trim()
        .split(';')
        .filter_map(|pair| pair.split_once(':'))
        .map(|(key, value)| (key.trim(), value.trim()))
        .collect();

    let number = |key: &str| -> LinkResult<Option<f64>> {
        match fields.get(key) {
            None => Ok(None),
            Some(raw) => raw
                .parse::<f64>()
                .map(Some)
                .map_err(|_| LinkError::Malformed(format!("{}:{} is not a number", key, raw))),
        }
    };
    let required = |key: &str| -> LinkResult<f64> {
        number(key)?.ok_or_else(|| LinkError::Malformed(format!("missing field '{}'", key)))
    };
    let optional = |key: &str| -> LinkResult<f64> { Ok(number(key)?.unwrap_or(0.0)) };

    let bat = required("bat")?;
    if !(0.0..=100.0).contains(&bat) {
        return Err(LinkError::Malformed(format!("bat:{} out of range", bat)));
    }

    Ok(TelloState {
        mid: number("mid")?.map_or(NO_MISSION_PAD, |mid| mid as i32),
        x: optional("x")?,
        y: optional("y")?,
        z: optional("z")?,
        yaw: required("yaw")?,
        vgx: required("vgx")?,
        vgy: required("vgy")?,
        vgz: required("vgz")?,
        bat: bat as u8,
    })
}
