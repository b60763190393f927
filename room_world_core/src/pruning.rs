//! Random door closure that never breaks a certified path.

use rand::{Rng, seq::IndexedRandom};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::{
    Direction, Position,
    engine::GridWorld,
    rooms::{RoomCoord, RoomGrid},
    search::PathCertificate,
};

/// Number of closure trials for a square grid of `grid_size` rooms per side:
/// `floor(grid_size² · 4 · fraction)`.
pub fn close_doors_trials(grid_size: usize, fraction: f64) -> usize {
    ((grid_size * grid_size * 4) as f64 * fraction) as usize
}

/// A door that was turned into wall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosedDoor {
    pub room: RoomCoord,
    pub dir: Direction,
    pub pos: Position,
}

/// What happened over a pruning run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PruneReport {
    pub trials: usize,
    pub closed: Vec<ClosedDoor>,
    /// Trials that hit an edge of the certified path.
    pub protected: usize,
    /// Trials that hit a door occupied by the agent or the goal.
    pub occupied: usize,
    /// Trials that picked a room without any open door.
    pub no_door: usize,
}

/// Runs `trials` independent attempts to wall off one door each.
///
/// Each trial draws a room uniformly and one of its open doors uniformly.
/// Doors on an edge of `certificate` and doors at any of the `occupied`
/// positions (the agent's start, the goal) are left alone; anything else is
/// walled and the slot cleared on both rooms.
pub fn prune_doors<R: Rng + ?Sized>(
    grid: &mut RoomGrid,
    world: &mut GridWorld,
    certificate: &PathCertificate,
    trials: usize,
    occupied: &[Position],
    rng: &mut R,
) -> PruneReport {
    let mut report = PruneReport {
        trials,
        ..PruneReport::default()
    };

    for _ in 0..trials {
        let room = (
            rng.random_range(0..grid.num_cols()),
            rng.random_range(0..grid.num_rows()),
        );
        let doors: Vec<(Direction, Position)> = match grid.room(room) {
            Some(r) => r.open_doors().collect(),
            None => continue,
        };
        let Some(&(dir, pos)) = doors.choose(rng) else {
            report.no_door += 1;
            continue;
        };
        let Some(neighbor) = grid.neighbor(room, dir) else {
            continue;
        };

        if certificate.protects(room, neighbor) {
            report.protected += 1;
            continue;
        }
        if occupied.contains(&pos) {
            report.occupied += 1;
            continue;
        }
        if grid.close_door(room, dir, world).is_some() {
            trace!(?room, ?dir, ?pos, "closed door");
            report.closed.push(ClosedDoor { room, dir, pos });
        }
    }

    debug!(
        trials,
        closed = report.closed.len(),
        protected = report.protected,
        "pruned doors"
    );
    report
}
