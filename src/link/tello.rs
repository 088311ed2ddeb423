//! # Tello UDP Link
//!
//! [`VehicleLink`] implementation for Tello drones speaking the SDK text
//! protocol (see [`protocol`](super::protocol)).
//!
//! Two sockets are used:
//! - a command socket on an ephemeral port, exchanging command/reply pairs
//!   with `host:command_port`
//! - a state socket bound to `state_port`, receiving the periodic state datagrams
//!
//! The two sides never share a lock. A command holds the command channel until
//! its reply arrives, which for a maneuver can take many seconds, while
//! [`refresh`](VehicleLink::refresh) keeps draining the state socket. Queries
//! never touch the network; they answer from the state latched by the last
//! refresh.

use async_trait::async_trait;
use std::net::SocketAddr;
use tokio::net::{lookup_host, UdpSocket};
use tokio::sync::Mutex;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

use super::protocol::{parse_response, parse_state, TelloCommand, TelloState};
use super::{DetectionDirection, MoveCommand, VehicleLink};
use crate::config::LinkConfig;
use crate::error::{LinkError, LinkResult};

/// Largest datagram the drone sends
const MAX_DATAGRAM_SIZE: usize = 2048;

/// Tello drone connection over UDP
pub struct TelloLink {
    config: LinkConfig,
    command_socket: UdpSocket,
    state_socket: UdpSocket,
    /// Drone address; held for a whole command/reply exchange
    target: Mutex<Option<SocketAddr>>,
    /// Newest state datagram and when it arrived
    latest: Mutex<Option<(TelloState, Instant)>>,
}

impl std::fmt::Debug for TelloLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelloLink")
            .field("command_addr", &self.command_socket.local_addr().ok())
            .field("state_addr", &self.state_socket.local_addr().ok())
            .finish_non_exhaustive()
    }
}

impl TelloLink {
    /// Bind the command and state sockets; the link is not connected yet
    ///
    /// # Errors
    ///
    /// Returns `Io` when either socket cannot be bound, typically because
    /// another process already listens on `state_port`.
    pub async fn bind(config: LinkConfig) -> LinkResult<Self> {
        let command_socket = UdpSocket::bind((config.bind_address.as_str(), 0)).await?;
        debug!("Command socket bound to {}", command_socket.local_addr()?);

        let state_socket = UdpSocket::bind((config.bind_address.as_str(), config.state_port)).await?;
        debug!("State socket bound to {}", state_socket.local_addr()?);

        Ok(Self {
            config,
            command_socket,
            state_socket,
            target: Mutex::new(None),
            latest: Mutex::new(None),
        })
    }

    /// Address commands are sent to, once connected
    pub async fn target(&self) -> Option<SocketAddr> {
        *self.target.lock().await
    }

    /// Local address state datagrams are received on
    pub fn state_addr(&self) -> LinkResult<SocketAddr> {
        Ok(self.state_socket.local_addr()?)
    }

    /// Send a command to `target` and wait for the reply, retrying on timeout
    ///
    /// The caller holds the target lock, so exchanges never overlap.
    async fn exchange(&self, target: SocketAddr, command: TelloCommand) -> LinkResult<()> {
        let socket = &self.command_socket;
        let wait = if command.is_motion() {
            self.config.motion_timeout()
        } else {
            self.config.response_timeout()
        };
        let text = command.to_string();
        let mut buf = [0u8; MAX_DATAGRAM_SIZE];

        // Late replies to earlier commands would be taken as ours
        while let Ok((n, _)) = socket.try_recv_from(&mut buf) {
            debug!("Discarding late reply: {}", String::from_utf8_lossy(&buf[..n]).trim());
        }

        for attempt in 0..=self.config.retry_count {
            socket.send_to(text.as_bytes(), target).await?;
            debug!("Sent '{}' to {} (attempt {})", text, target, attempt + 1);

            match timeout(wait, socket.recv_from(&mut buf)).await {
                Ok(Ok((n, _))) => return parse_response(&command, &buf[..n]),
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => debug!("No reply to '{}' within {:?}", text, wait),
            }
        }

        Err(LinkError::Timeout(text))
    }

    /// Send a command to the connected drone
    async fn send_command(&self, command: TelloCommand) -> LinkResult<()> {
        let target = self.target.lock().await;
        let addr = (*target).ok_or(LinkError::NotConnected)?;
        self.exchange(addr, command).await
    }

    /// Wait for the first state datagram after connecting
    async fn wait_for_state(&self) -> LinkResult<()> {
        let deadline = Instant::now() + self.config.response_timeout();
        let mut buf = [0u8; MAX_DATAGRAM_SIZE];

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let (n, _) = timeout(remaining, self.state_socket.recv_from(&mut buf))
                .await
                .map_err(|_| LinkError::NoState)??;

            match parse_state(&String::from_utf8_lossy(&buf[..n])) {
                Ok(state) => {
                    *self.latest.lock().await = Some((state, Instant::now()));
                    return Ok(());
                }
                Err(e) => debug!("Ignoring state datagram: {}", e),
            }
        }
    }

    /// Answer a query from the latched state
    async fn latched<T>(&self, read: impl FnOnce(&TelloState) -> T) -> LinkResult<T> {
        if let Some((state, _)) = &*self.latest.lock().await {
            return Ok(read(state));
        }

        // Not under the state lock: `connect` takes the target lock first
        if self.target().await.is_none() {
            Err(LinkError::NotConnected)
        } else {
            Err(LinkError::NoState)
        }
    }
}

#[async_trait]
impl VehicleLink for TelloLink {
    async fn connect(&self, host: &str) -> LinkResult<()> {
        let host = host.trim();
        let addr = lookup_host((host, self.config.command_port))
            .await
            .map_err(|e| LinkError::InvalidHost(format!("{}: {}", host, e)))?
            .next()
            .ok_or_else(|| LinkError::InvalidHost(host.to_string()))?;

        let mut target = self.target.lock().await;
        *target = None;
        *self.latest.lock().await = None;

        if let Err(e) = self.exchange(addr, TelloCommand::EnterSdkMode).await {
            warn!("Tello at {} did not enter SDK mode: {}", addr, e);
            return Err(e);
        }

        self.wait_for_state().await?;
        *target = Some(addr);
        info!("Connected to Tello at {}", addr);
        Ok(())
    }

    async fn enable_marker_detection(&self) -> LinkResult<()> {
        self.send_command(TelloCommand::MissionPadsOn).await
    }

    async fn set_detection_direction(&self, direction: DetectionDirection) -> LinkResult<()> {
        self.send_command(TelloCommand::MissionPadDirection(direction)).await
    }

    /// Drain queued state datagrams and latch the newest one
    ///
    /// # Errors
    ///
    /// `NoState` before any datagram arrived, `StaleState` when the newest one
    /// is older than `state_timeout_ms`.
    async fn refresh(&self) -> LinkResult<()> {
        let mut latest = self.latest.lock().await;
        let mut buf = [0u8; MAX_DATAGRAM_SIZE];

        loop {
            match self.state_socket.try_recv_from(&mut buf) {
                Ok((n, _)) => match parse_state(&String::from_utf8_lossy(&buf[..n])) {
                    Ok(state) => *latest = Some((state, Instant::now())),
                    Err(e) => debug!("Ignoring state datagram: {}", e),
                },
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e.into()),
            }
        }

        match &*latest {
            Some((_, received)) if received.elapsed() <= self.config.state_timeout() => Ok(()),
            Some((_, received)) => Err(LinkError::StaleState(received.elapsed())),
            None => Err(LinkError::NoState),
        }
    }

    async fn yaw(&self) -> LinkResult<f64> {
        self.latched(|s| s.yaw).await
    }

    async fn speed_x(&self) -> LinkResult<f64> {
        self.latched(|s| s.vgx).await
    }

    async fn speed_y(&self) -> LinkResult<f64> {
        self.latched(|s| s.vgy).await
    }

    async fn speed_z(&self) -> LinkResult<f64> {
        self.latched(|s| s.vgz).await
    }

    async fn battery_percent(&self) -> LinkResult<u8> {
        self.latched(|s| s.bat).await
    }

    async fn marker_id(&self) -> LinkResult<Option<i32>> {
        self.latched(TelloState::mission_pad).await
    }

    async fn marker_distance_x(&self) -> LinkResult<f64> {
        self.latched(|s| s.x).await
    }

    async fn marker_distance_y(&self) -> LinkResult<f64> {
        self.latched(|s| s.y).await
    }

    async fn marker_distance_z(&self) -> LinkResult<f64> {
        self.latched(|s| s.z).await
    }

    async fn takeoff(&self) -> LinkResult<()> {
        self.send_command(TelloCommand::Takeoff).await
    }

    async fn land(&self) -> LinkResult<()> {
        self.send_command(TelloCommand::Land).await
    }

    async fn move_to(&self, command: MoveCommand) -> LinkResult<()> {
        command.validate()?;
        self.send_command(TelloCommand::Jump(command)).await
    }
}
