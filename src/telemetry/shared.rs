//! # Shared Telemetry State
//!
//! Holds the latest [`TelemetrySnapshot`] for one writer (the poller) and any
//! number of readers.
//!
//! The snapshot lives in a `tokio::sync::watch` channel. Publishing replaces
//! the whole value under the channel's lock and reading copies it out under
//! the same lock, so a reader never sees fields from two different cycles.
//! Neither side ever waits on vehicle I/O.

use tokio::sync::watch;

use super::snapshot::TelemetrySnapshot;

/// Latest published telemetry
#[derive(Debug)]
pub struct SharedState {
    current: watch::Sender<TelemetrySnapshot>,
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedState {
    /// Start with the initial (sequence 0) snapshot
    pub fn new() -> Self {
        let (current, _) = watch::channel(TelemetrySnapshot::default());
        Self { current }
    }

    /// Replace the current snapshot
    pub fn publish(&self, snapshot: TelemetrySnapshot) {
        self.current.send_replace(snapshot);
    }

    /// Copy of the most recently published snapshot
    pub fn read(&self) -> TelemetrySnapshot {
        *self.current.borrow()
    }

    /// Receiver notified on every publish
    pub fn subscribe(&self) -> watch::Receiver<TelemetrySnapshot> {
        self.current.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::{MarkerId, Position, Velocity};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;

    /// Snapshot whose every field is derived from `n`
    fn cycle(n: u64) -> TelemetrySnapshot {
        let v = n as f64;
        TelemetrySnapshot {
            sequence: n,
            yaw_degrees: v,
            speed: Velocity::new(v, 0.0, 0.0),
            total_speed: v,
            battery_percent: (n % 101) as u8,
            marker_id: MarkerId::new((n % 8 + 1) as i32),
            absolute_position: Position::new(v, -v, v * 2.0),
            last_seen_marker_id: MarkerId::new((n % 8 + 1) as i32),
            is_fresh: n % 2 == 0,
            ..TelemetrySnapshot::default()
        }
    }

    #[test]
    fn test_read_returns_initial_snapshot() {
        let state = SharedState::new();
        assert_eq!(state.read(), TelemetrySnapshot::default());
    }

    #[test]
    fn test_publish_replaces_snapshot() {
        let state = SharedState::new();
        state.publish(cycle(1));
        state.publish(cycle(2));
        assert_eq!(state.read(), cycle(2));
    }

    #[test]
    fn test_read_is_a_copy() {
        let state = SharedState::new();
        state.publish(cycle(1));
        let copy = state.read();
        state.publish(cycle(2));
        assert_eq!(copy, cycle(1));
    }

    #[tokio::test]
    async fn test_subscriber_sees_publish() {
        let state = SharedState::new();
        let mut rx = state.subscribe();
        state.publish(cycle(3));
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), cycle(3));
    }

    #[test]
    fn test_concurrent_reads_are_consistent_and_monotonic() {
        const CYCLES: u64 = 20_000;
        const READERS: usize = 4;

        let state = Arc::new(SharedState::new());
        state.publish(cycle(0));
        let done = Arc::new(AtomicBool::new(false));

        let readers: Vec<_> = (0..READERS)
            .map(|_| {
                let state = Arc::clone(&state);
                let done = Arc::clone(&done);
                thread::spawn(move || {
                    let mut last = 0;
                    let mut reads = 0u64;
                    loop {
                        let finished = done.load(Ordering::Acquire);
                        let snapshot = state.read();
                        assert_eq!(snapshot, cycle(snapshot.sequence), "torn snapshot");
                        assert!(snapshot.sequence >= last, "sequence went backwards");
                        last = snapshot.sequence;
                        reads += 1;
                        if finished {
                            break;
                        }
                    }
                    (reads, last)
                })
            })
            .collect();

        for n in 1..=CYCLES {
            state.publish(cycle(n));
        }
        done.store(true, Ordering::Release);

        for reader in readers {
            let (reads, last) = reader.join().unwrap();
            assert!(reads > 0);
            assert_eq!(last, CYCLES);
        }
        assert_eq!(state.read().sequence, CYCLES);
    }
}
