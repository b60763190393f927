//! Randomized depth-first search for a simple room path from start to goal.
//!
//! The path it returns is a certificate that the goal room is reachable; door
//! pruning uses it to know which edges must stay open. It is not meant as a
//! route for the agent.

use std::collections::HashSet;

use rand::{Rng, seq::SliceRandom};
use serde::{Deserialize, Serialize};

use crate::{
    Direction,
    rooms::{RoomCoord, RoomGrid},
};

/// Ordered, duplicate-free room sequence whose consecutive entries are joined
/// by open doors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathCertificate {
    rooms: Vec<RoomCoord>,
}

impl PathCertificate {
    pub fn rooms(&self) -> &[RoomCoord] {
        &self.rooms
    }

    pub fn start(&self) -> RoomCoord {
        self.rooms[0]
    }

    pub fn goal(&self) -> RoomCoord {
        self.rooms[self.rooms.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Consecutive room pairs along the path.
    pub fn edges(&self) -> impl Iterator<Item = (RoomCoord, RoomCoord)> + '_ {
        self.rooms.windows(2).map(|w| (w[0], w[1]))
    }

    /// Whether the edge `room`–`neighbor` is part of the path, i.e. `neighbor`
    /// is the immediate predecessor or successor of `room`.
    pub fn protects(&self, room: RoomCoord, neighbor: RoomCoord) -> bool {
        let Some(i) = self.rooms.iter().position(|r| *r == room) else {
            return false;
        };
        (i > 0 && self.rooms[i - 1] == neighbor)
            || self.rooms.get(i + 1).is_some_and(|next| *next == neighbor)
    }
}

/// Searches for a path from the last room of `visited_prefix` to `goal`.
///
/// The four move directions are shuffled once and that order is used as the
/// priority at every depth. Rooms already in the path are never revisited,
/// and the search backtracks through the whole graph, so it finds a path
/// whenever one exists through open doors. Returns `None` when the goal is
/// unreachable or the prefix is empty.
pub fn connect_rooms<R: Rng + ?Sized>(
    grid: &RoomGrid,
    visited_prefix: Vec<RoomCoord>,
    goal: RoomCoord,
    rng: &mut R,
) -> Option<PathCertificate> {
    let mut moves = Direction::ALL;
    moves.shuffle(rng);

    let mut path = visited_prefix;
    if *path.last()? == goal {
        return Some(PathCertificate { rooms: path });
    }
    let mut on_path: HashSet<RoomCoord> = path.iter().copied().collect();

    // One cursor per room from the end of the prefix onwards: the index of the
    // next direction to try from that room.
    let mut cursors: Vec<usize> = vec![0];

    while let Some(cursor) = cursors.last_mut() {
        if *cursor == moves.len() {
            cursors.pop();
            if !cursors.is_empty() {
                if let Some(room) = path.pop() {
                    on_path.remove(&room);
                }
            }
            continue;
        }
        let dir = moves[*cursor];
        *cursor += 1;

        let current = *path.last()?;
        let Some(next) = grid.neighbor(current, dir) else {
            continue;
        };
        if !grid.is_open(current, dir) || on_path.contains(&next) {
            continue;
        }

        path.push(next);
        on_path.insert(next);
        if next == goal {
            return Some(PathCertificate { rooms: path });
        }
        cursors.push(0);
    }
    None
}

/// Convenience wrapper starting from a single room.
pub fn search<R: Rng + ?Sized>(
    grid: &RoomGrid,
    start: RoomCoord,
    goal: RoomCoord,
    rng: &mut R,
) -> Option<PathCertificate> {
    connect_rooms(grid, vec![start], goal, rng)
}
