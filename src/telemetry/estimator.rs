//! # Position Estimator
//!
//! Converts a pad-relative reading into an absolute position on the pad grid.
//!
//! Pads are laid out row-major, `columns` pads per row, `spacing` apart:
//!
//! ```text
//!            col 0   col 1   col 2
//!   row 0     m1      m2      m3
//!   row 1     m4      m5      m6
//!   row 2     m7      m8
//! ```
//!
//! A pad's absolute origin is `(spacing * row, spacing * col)`. The drone
//! reports its distance from the pad in its own forward/right frame, which
//! points opposite to the grid axes, so x and y are subtracted:
//!
//! ```text
//! abs_x = spacing * row - local_x
//! abs_y = spacing * col - local_y
//! abs_z = local_z
//! ```

use super::snapshot::{MarkerId, Position};
use crate::config::GridConfig;

/// Row and column of a pad in the layout, `None` for a grid without columns
#[must_use]
pub fn grid_cell(marker: MarkerId, grid: &GridConfig) -> Option<(u32, u32)> {
    let index = marker.get() - 1;
    Some((index.checked_div(grid.columns)?, index.checked_rem(grid.columns)?))
}

/// Absolute position of the vehicle, or `None` when no pad is in view
///
/// A grid with zero columns places no pad, so it also yields `None`.
///
/// # Examples
///
/// ```
/// use pad_tracker::config::GridConfig;
/// use pad_tracker::telemetry::{estimate_position, MarkerId, Position};
///
/// let grid = GridConfig::default(); // 3 columns, 40cm apart
/// let pad = MarkerId::new(4);
/// let position = estimate_position(pad, Position::new(10.0, -5.0, 80.0), &grid);
/// assert_eq!(position, Some(Position::new(30.0, 5.0, 80.0)));
///
/// assert_eq!(estimate_position(None, Position::new(10.0, -5.0, 80.0), &grid), None);
/// ```
#[must_use]
pub fn estimate_position(
    marker: Option<MarkerId>,
    local: Position,
    grid: &GridConfig,
) -> Option<Position> {
    let marker = marker?;
    let (row, col) = grid_cell(marker, grid)?;

    Some(Position {
        x: grid.spacing * f64::from(row) - local.x,
        y: grid.spacing * f64::from(col) - local.y,
        z: local.z,
    })
}
