//! Partitioning of the play area into a grid of rooms joined by doors.
//!
//! Rooms share their one-tile-thick walls, so a grid of `cols × rows` rooms of
//! side `room_size` spans `(room_size - 1) * cols + 1` tiles horizontally.
//! Every internal edge gets exactly one door slot on the shared wall, stored
//! on both rooms under opposite directions.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    Direction, Position,
    engine::{GridWorld, Tile},
};

/// Room coordinate as `(col, row)`.
pub type RoomCoord = (usize, usize);

/// Where a door is cut along a shared wall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoorPlacement {
    /// Uniformly random interior offset.
    #[default]
    Random,
    /// Exact midpoint of the wall.
    Middle,
}

impl DoorPlacement {
    /// Picks an offset in `lo..hi`.
    fn offset<R: Rng + ?Sized>(self, lo: usize, hi: usize, rng: &mut R) -> usize {
        match self {
            DoorPlacement::Random => rng.random_range(lo..hi),
            DoorPlacement::Middle => lo + (hi - lo) / 2,
        }
    }
}

/// One node of the room graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub coord: RoomCoord,
    /// Top-left wall tile.
    pub top: Position,
    /// Outer size including walls.
    pub size: (usize, usize),
    /// Neighbouring rooms indexed by [`Direction`].
    pub neighbors: [Option<RoomCoord>; 4],
    /// Door slot per direction; `None` when there is no passage that way.
    pub door_pos: [Option<Position>; 4],
}

impl Room {
    /// Top-left corner and size of the floor area inside the walls.
    pub fn interior(&self) -> (Position, (usize, usize)) {
        (
            Position::new(self.top.x + 1, self.top.y + 1),
            (self.size.0 - 2, self.size.1 - 2),
        )
    }

    pub fn open_doors(&self) -> impl Iterator<Item = (Direction, Position)> + '_ {
        Direction::ALL
            .into_iter()
            .filter_map(|d| self.door_pos[d.index()].map(|p| (d, p)))
    }
}

/// The `cols × rows` array of rooms, stored row-major.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomGrid {
    num_rows: usize,
    num_cols: usize,
    room_size: usize,
    rooms: Vec<Room>,
}

impl RoomGrid {
    /// Tile dimensions `(width, height)` of a room grid.
    pub fn dimensions(num_rows: usize, num_cols: usize, room_size: usize) -> (usize, usize) {
        (
            (room_size - 1) * num_cols + 1,
            (room_size - 1) * num_rows + 1,
        )
    }

    /// Lays out the rooms on `world`, walls them and opens every door slot.
    ///
    /// `world` must be at least [`RoomGrid::dimensions`] large.
    pub fn build<R: Rng + ?Sized>(
        num_rows: usize,
        num_cols: usize,
        room_size: usize,
        placement: DoorPlacement,
        world: &mut GridWorld,
        rng: &mut R,
    ) -> Self {
        let step = room_size - 1;
        let mut rooms = Vec::with_capacity(num_rows * num_cols);
        for row in 0..num_rows {
            for col in 0..num_cols {
                let top = Position::new(col * step, row * step);
                world.wall_rect(top, room_size, room_size);
                rooms.push(Room {
                    coord: (col, row),
                    top,
                    size: (room_size, room_size),
                    neighbors: [None; 4],
                    door_pos: [None; 4],
                });
            }
        }

        let mut grid = RoomGrid {
            num_rows,
            num_cols,
            room_size,
            rooms,
        };

        // Right and down slots are drawn here; left and up mirror a neighbour
        // that was already visited in row-major order.
        for row in 0..num_rows {
            for col in 0..num_cols {
                let idx = grid.index((col, row));
                let top = grid.rooms[idx].top;
                let (x_l, y_l) = (top.x + 1, top.y + 1);
                let (x_m, y_m) = (top.x + room_size - 1, top.y + room_size - 1);

                if col + 1 < num_cols {
                    let pos = Position::new(x_m, placement.offset(y_l, y_m, rng));
                    grid.rooms[idx].neighbors[Direction::Right.index()] = Some((col + 1, row));
                    grid.rooms[idx].door_pos[Direction::Right.index()] = Some(pos);
                }
                if row + 1 < num_rows {
                    let pos = Position::new(placement.offset(x_l, x_m, rng), y_m);
                    grid.rooms[idx].neighbors[Direction::Down.index()] = Some((col, row + 1));
                    grid.rooms[idx].door_pos[Direction::Down.index()] = Some(pos);
                }
                if col > 0 {
                    let left = grid.index((col - 1, row));
                    grid.rooms[idx].neighbors[Direction::Left.index()] = Some((col - 1, row));
                    grid.rooms[idx].door_pos[Direction::Left.index()] =
                        grid.rooms[left].door_pos[Direction::Right.index()];
                }
                if row > 0 {
                    let up = grid.index((col, row - 1));
                    grid.rooms[idx].neighbors[Direction::Up.index()] = Some((col, row - 1));
                    grid.rooms[idx].door_pos[Direction::Up.index()] =
                        grid.rooms[up].door_pos[Direction::Down.index()];
                }
            }
        }

        for room in &grid.rooms {
            for (_, pos) in room.open_doors() {
                if let Some(tile) = world.tiles_mut().get_mut(pos) {
                    if *tile == Tile::Wall {
                        *tile = Tile::Floor;
                    }
                }
            }
        }

        debug!(
            rows = num_rows,
            cols = num_cols,
            room_size,
            doors = grid.edge_count(),
            "built room grid"
        );
        grid
    }

    #[inline]
    fn index(&self, (col, row): RoomCoord) -> usize {
        row * self.num_cols + col
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_cols(&self) -> usize {
        self.num_cols
    }

    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    pub fn contains(&self, (col, row): RoomCoord) -> bool {
        col < self.num_cols && row < self.num_rows
    }

    pub fn room(&self, coord: RoomCoord) -> Option<&Room> {
        self.contains(coord).then(|| &self.rooms[self.index(coord)])
    }

    /// The room whose floor contains `pos`.
    ///
    /// Tiles on the far outer wall are attributed to the last room.
    pub fn room_of(&self, pos: Position) -> RoomCoord {
        let step = self.room_size - 1;
        (
            (pos.x / step).min(self.num_cols - 1),
            (pos.y / step).min(self.num_rows - 1),
        )
    }

    /// Coordinate of the room adjacent to `coord` in `dir`, if inside the grid.
    pub fn neighbor(&self, (col, row): RoomCoord, dir: Direction) -> Option<RoomCoord> {
        let (dx, dy) = dir.delta();
        let next = (col.checked_add_signed(dx)?, row.checked_add_signed(dy)?);
        self.contains(next).then_some(next)
    }

    /// Whether the door slot from `coord` towards `dir` is still open.
    pub fn is_open(&self, coord: RoomCoord, dir: Direction) -> bool {
        self.room(coord)
            .is_some_and(|room| room.door_pos[dir.index()].is_some())
    }

    /// Walls off the door from `coord` towards `dir` and clears the slot on
    /// both rooms. Returns the walled position, or `None` if there was no door
    /// or its tile lies outside `world`; the slots are left untouched then.
    pub fn close_door(
        &mut self,
        coord: RoomCoord,
        dir: Direction,
        world: &mut GridWorld,
    ) -> Option<Position> {
        let idx = self.contains(coord).then(|| self.index(coord))?;
        let pos = self.rooms[idx].door_pos[dir.index()]?;
        world.set(pos, Tile::Wall).ok()?;

        self.rooms[idx].door_pos[dir.index()] = None;
        if let Some(other) = self.neighbor(coord, dir) {
            let other = self.index(other);
            self.rooms[other].door_pos[dir.opposite().index()] = None;
        }
        Some(pos)
    }

    /// Number of distinct open door edges.
    pub fn edge_count(&self) -> usize {
        self.rooms
            .iter()
            .map(|room| {
                [Direction::Right, Direction::Down]
                    .into_iter()
                    .filter(|d| room.door_pos[d.index()].is_some())
                    .count()
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn build(rows: usize, cols: usize, placement: DoorPlacement, seed: u64) -> (RoomGrid, GridWorld) {
        let (w, h) = RoomGrid::dimensions(rows, cols, 7);
        let mut world = GridWorld::new(w, h, 100);
        let mut rng = StdRng::seed_from_u64(seed);
        let grid = RoomGrid::build(rows, cols, 7, placement, &mut world, &mut rng);
        (grid, world)
    }

    #[test]
    fn dimensions_share_walls() {
        assert_eq!(RoomGrid::dimensions(3, 3, 7), (19, 19));
        assert_eq!(RoomGrid::dimensions(1, 2, 6), (11, 6));
    }

    #[test]
    fn door_slots_are_mirrored() {
        let (grid, _) = build(3, 3, DoorPlacement::Random, 11);
        for room in grid.rooms() {
            for dir in Direction::ALL {
                match grid.neighbor(room.coord, dir) {
                    Some(other) => {
                        let other = grid.room(other).unwrap();
                        assert_eq!(
                            room.door_pos[dir.index()],
                            other.door_pos[dir.opposite().index()],
                            "room {:?} dir {:?}",
                            room.coord,
                            dir
                        );
                        assert!(room.door_pos[dir.index()].is_some());
                    }
                    None => {
                        assert_eq!(room.door_pos[dir.index()], None);
                        assert_eq!(room.neighbors[dir.index()], None);
                    }
                }
            }
        }
        assert_eq!(grid.edge_count(), 12);
    }

    #[test]
    fn doors_are_carved_on_shared_walls() {
        let (grid, world) = build(2, 2, DoorPlacement::Random, 5);
        for room in grid.rooms() {
            for (dir, pos) in room.open_doors() {
                assert_eq!(world.get(pos), Some(&Tile::Floor));
                match dir {
                    Direction::Right | Direction::Left => assert_eq!(pos.x % 6, 0),
                    Direction::Down | Direction::Up => assert_eq!(pos.y % 6, 0),
                }
            }
        }
    }

    #[test]
    fn middle_doors_are_centered() {
        let (grid, _) = build(2, 2, DoorPlacement::Middle, 0);
        let room = grid.room((0, 0)).unwrap();
        assert_eq!(room.door_pos[Direction::Right.index()], Some(Position::new(6, 3)));
        assert_eq!(room.door_pos[Direction::Down.index()], Some(Position::new(3, 6)));
    }

    #[test]
    fn close_door_clears_both_sides() {
        let (mut grid, mut world) = build(2, 2, DoorPlacement::Random, 9);
        let pos = grid.close_door((0, 0), Direction::Right, &mut world).unwrap();
        assert_eq!(world.get(pos), Some(&Tile::Wall));
        assert!(!grid.is_open((0, 0), Direction::Right));
        assert!(!grid.is_open((1, 0), Direction::Left));
        assert_eq!(grid.close_door((1, 0), Direction::Left, &mut world), None);
    }

    #[test]
    fn door_outside_world_stays_open() {
        let mut world = GridWorld::new(1, 1, 10);
        let mut rng = StdRng::seed_from_u64(5);
        let mut grid = RoomGrid::build(2, 2, 7, DoorPlacement::Middle, &mut world, &mut rng);
        assert_eq!(grid.close_door((0, 0), Direction::Right, &mut world), None);
        assert!(grid.is_open((0, 0), Direction::Right));
        assert!(grid.is_open((1, 0), Direction::Left));
    }

    #[test]
    fn room_of_maps_tiles_to_rooms() {
        let (grid, _) = build(3, 3, DoorPlacement::Random, 1);
        assert_eq!(grid.room_of(Position::new(1, 1)), (0, 0));
        assert_eq!(grid.room_of(Position::new(8, 13)), (1, 2));
        assert_eq!(grid.room_of(Position::new(18, 18)), (2, 2));
    }
}
