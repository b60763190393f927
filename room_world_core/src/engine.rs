use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    Color, Direction, ObjectKind, Position, WorldObject,
    error::PlacementError,
    map::{Grid, GridError},
};

/// Upper bound on rejection samples for a single random placement.
pub const MAX_PLACEMENT_ATTEMPTS: usize = 1000;

/// Contents of one grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Tile {
    #[default]
    Floor,
    Wall,
    Goal,
    Lava,
    Door {
        color: Color,
        open: bool,
        locked: bool,
    },
    Object(WorldObject),
}

impl Tile {
    /// The object kind on this tile, `None` for bare floor.
    pub fn kind(&self) -> Option<ObjectKind> {
        match self {
            Tile::Floor => None,
            Tile::Wall => Some(ObjectKind::Wall),
            Tile::Goal => Some(ObjectKind::Goal),
            Tile::Lava => Some(ObjectKind::Lava),
            Tile::Door { .. } => Some(ObjectKind::Door),
            Tile::Object(obj) => Some(obj.kind),
        }
    }

    /// Whether the agent can step onto this tile.
    pub fn is_passable(&self) -> bool {
        match self {
            Tile::Floor => true,
            Tile::Door { open, .. } => *open,
            other => other.kind().is_some_and(ObjectKind::can_overlap),
        }
    }
}

/// Primitive agent actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Action {
    Left = 0,
    Right = 1,
    Forward = 2,
    Pickup = 3,
    Drop = 4,
    Toggle = 5,
    Done = 6,
}

impl Action {
    pub const ALL: [Action; 7] = [
        Action::Left,
        Action::Right,
        Action::Forward,
        Action::Pickup,
        Action::Drop,
        Action::Toggle,
        Action::Done,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid action index {0} (expected 0..=6)")]
pub struct InvalidAction(pub u8);

impl TryFrom<u8> for Action {
    type Error = InvalidAction;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        Action::ALL.get(v as usize).copied().ok_or(InvalidAction(v))
    }
}

/// Result of one primitive step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Primitive {
    pub reward: f32,
    pub done: bool,
}

/// The tile world plus the agent's pose and hands.
///
/// Until the agent is placed it sits on `(0, 0)`, which every layout in this
/// crate walls off.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridWorld {
    tiles: Grid<Tile>,
    pub agent_pos: Position,
    pub agent_dir: Direction,
    pub carrying: Option<WorldObject>,
    pub step_count: u32,
    pub max_steps: u32,
}

impl GridWorld {
    pub fn new(width: usize, height: usize, max_steps: u32) -> Self {
        GridWorld {
            tiles: Grid::new(width, height),
            agent_pos: Position::new(0, 0),
            agent_dir: Direction::Right,
            carrying: None,
            step_count: 0,
            max_steps,
        }
    }

    pub fn width(&self) -> usize {
        self.tiles.width()
    }

    pub fn height(&self) -> usize {
        self.tiles.height()
    }

    pub fn tiles(&self) -> &Grid<Tile> {
        &self.tiles
    }

    pub fn tiles_mut(&mut self) -> &mut Grid<Tile> {
        &mut self.tiles
    }

    pub fn get(&self, pos: Position) -> Option<&Tile> {
        self.tiles.get(pos)
    }

    /// Writes a tile, returning the one it replaced.
    pub fn set(&mut self, pos: Position, tile: Tile) -> Result<Tile, GridError> {
        self.tiles.set(pos, tile)
    }

    pub fn horz_wall(&mut self, x: usize, y: usize, length: usize) {
        for i in 0..length {
            if let Some(cell) = self.tiles.get_mut(Position::new(x + i, y)) {
                *cell = Tile::Wall;
            }
        }
    }

    pub fn vert_wall(&mut self, x: usize, y: usize, length: usize) {
        for i in 0..length {
            if let Some(cell) = self.tiles.get_mut(Position::new(x, y + i)) {
                *cell = Tile::Wall;
            }
        }
    }

    /// Draws the outline of a `w × h` rectangle whose top-left corner is `top`.
    pub fn wall_rect(&mut self, top: Position, w: usize, h: usize) {
        if w == 0 || h == 0 {
            return;
        }
        self.horz_wall(top.x, top.y, w);
        self.horz_wall(top.x, top.y + h - 1, w);
        self.vert_wall(top.x, top.y, h);
        self.vert_wall(top.x + w - 1, top.y, h);
    }

    /// The tile position directly in front of the agent.
    pub fn front_pos(&self) -> Option<Position> {
        self.agent_pos.step(self.agent_dir)
    }

    /// Puts `tile` on a uniformly random floor cell inside the rectangle
    /// `top .. top + size`, avoiding the agent.
    pub fn place_obj<R: Rng + ?Sized>(
        &mut self,
        tile: Tile,
        top: Position,
        size: (usize, usize),
        rng: &mut R,
    ) -> Result<Position, PlacementError> {
        let pos = self.sample_free(top, size, rng)?;
        self.tiles[pos] = tile;
        Ok(pos)
    }

    /// Moves the agent to a random free cell of the rectangle and gives it a
    /// random heading.
    pub fn place_agent<R: Rng + ?Sized>(
        &mut self,
        top: Position,
        size: (usize, usize),
        rng: &mut R,
    ) -> Result<Position, PlacementError> {
        let pos = self.sample_free(top, size, rng)?;
        self.agent_pos = pos;
        self.agent_dir = Direction::from_index(rng.random_range(0..4));
        Ok(pos)
    }

    fn sample_free<R: Rng + ?Sized>(
        &self,
        top: Position,
        size: (usize, usize),
        rng: &mut R,
    ) -> Result<Position, PlacementError> {
        let x_end = (top.x + size.0).min(self.width());
        let y_end = (top.y + size.1).min(self.height());
        if top.x >= x_end || top.y >= y_end {
            return Err(PlacementError::Exhausted { attempts: 0 });
        }
        for _ in 0..MAX_PLACEMENT_ATTEMPTS {
            let pos = Position::new(rng.random_range(top.x..x_end), rng.random_range(top.y..y_end));
            if pos != self.agent_pos && self.tiles[pos] == Tile::Floor {
                return Ok(pos);
            }
        }
        Err(PlacementError::Exhausted {
            attempts: MAX_PLACEMENT_ATTEMPTS,
        })
    }

    /// Clears the per-episode counters and the agent's hands.
    pub fn reset_episode(&mut self) {
        self.step_count = 0;
        self.carrying = None;
    }

    /// Reward for reaching the goal, discounted by elapsed steps.
    pub fn success_reward(&self) -> f32 {
        1.0 - 0.9 * (self.step_count as f32 / self.max_steps as f32)
    }

    /// Executes one primitive action.
    pub fn step(&mut self, action: Action) -> Primitive {
        self.step_count += 1;
        let mut reward = 0.0;
        let mut done = false;
        let front = self.front_pos().filter(|p| self.tiles.contains(*p));

        match action {
            Action::Left => self.agent_dir = self.agent_dir.turn_left(),
            Action::Right => self.agent_dir = self.agent_dir.turn_right(),
            Action::Forward => {
                if let Some(pos) = front {
                    let tile = self.tiles[pos];
                    if tile.is_passable() {
                        self.agent_pos = pos;
                    }
                    match tile {
                        Tile::Goal => {
                            done = true;
                            reward = self.success_reward();
                        }
                        Tile::Lava => done = true,
                        _ => {}
                    }
                }
            }
            Action::Pickup => {
                if let Some(pos) = front {
                    if let Tile::Object(obj) = self.tiles[pos] {
                        if obj.kind.can_pickup() && self.carrying.is_none() {
                            self.carrying = Some(obj);
                            self.tiles[pos] = Tile::Floor;
                        }
                    }
                }
            }
            Action::Drop => {
                if let (Some(pos), Some(obj)) = (front, self.carrying) {
                    if self.tiles[pos] == Tile::Floor {
                        self.tiles[pos] = Tile::Object(obj);
                        self.carrying = None;
                    }
                }
            }
            Action::Toggle => {
                if let Some(pos) = front {
                    if let Tile::Door {
                        color,
                        open,
                        locked,
                    } = self.tiles[pos]
                    {
                        self.tiles[pos] = if locked {
                            let has_key = matches!(
                                self.carrying,
                                Some(WorldObject { kind: ObjectKind::Key, color: key, .. }) if key == color
                            );
                            Tile::Door {
                                color,
                                open: has_key,
                                locked: !has_key,
                            }
                        } else {
                            Tile::Door {
                                color,
                                open: !open,
                                locked: false,
                            }
                        };
                    }
                }
            }
            Action::Done => {}
        }

        if self.step_count >= self.max_steps {
            done = true;
        }
        Primitive { reward, done }
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn boxed_world() -> GridWorld {
        let mut world = GridWorld::new(5, 5, 10);
        world.wall_rect(Position::new(0, 0), 5, 5);
        world.agent_pos = Position::new(1, 1);
        world.agent_dir = Direction::Right;
        world
    }

    #[test]
    fn action_from_u8() {
        assert_eq!(Action::try_from(3), Ok(Action::Pickup));
        assert_eq!(Action::try_from(7), Err(InvalidAction(7)));
    }

    #[test]
    fn forward_is_blocked_by_walls_and_objects() {
        let mut world = boxed_world();
        world
            .set(Position::new(2, 1), Tile::Object(WorldObject::new(ObjectKind::Ball, Color::Red)))
            .unwrap();
        world.step(Action::Forward);
        assert_eq!(world.agent_pos, Position::new(1, 1));
        world.step(Action::Left);
        world.step(Action::Forward);
        assert_eq!(world.agent_pos, Position::new(1, 1), "wall above the start");
    }

    #[test]
    fn pickup_and_drop_roundtrip_through_hands() {
        let mut world = boxed_world();
        let ball = WorldObject::with_id(ObjectKind::Ball, Color::Blue, 4);
        world.set(Position::new(2, 1), Tile::Object(ball)).unwrap();

        world.step(Action::Pickup);
        assert_eq!(world.carrying, Some(ball));
        assert_eq!(world.get(Position::new(2, 1)), Some(&Tile::Floor));

        world.step(Action::Pickup);
        assert_eq!(world.carrying, Some(ball), "hands are already full");

        world.step(Action::Drop);
        assert_eq!(world.carrying, None);
        assert_eq!(world.get(Position::new(2, 1)), Some(&Tile::Object(ball)));
    }

    #[test]
    fn locked_door_needs_matching_key() {
        let mut world = boxed_world();
        let door = Position::new(2, 1);
        world
            .set(door, Tile::Door { color: Color::Yellow, open: false, locked: true })
            .unwrap();

        world.step(Action::Toggle);
        assert_eq!(
            world.get(door),
            Some(&Tile::Door { color: Color::Yellow, open: false, locked: true })
        );

        world.carrying = Some(WorldObject::new(ObjectKind::Key, Color::Yellow));
        world.step(Action::Toggle);
        assert_eq!(
            world.get(door),
            Some(&Tile::Door { color: Color::Yellow, open: true, locked: false })
        );
        world.step(Action::Forward);
        assert_eq!(world.agent_pos, door);
    }

    #[test]
    fn goal_ends_episode_with_discounted_reward() {
        let mut world = boxed_world();
        world.set(Position::new(2, 1), Tile::Goal).unwrap();
        let out = world.step(Action::Forward);
        assert!(out.done);
        assert!((out.reward - 0.91).abs() < 1e-6);
    }

    #[test]
    fn step_budget_ends_episode() {
        let mut world = boxed_world();
        let mut last = world.step(Action::Left);
        for _ in 1..10 {
            last = world.step(Action::Left);
        }
        assert!(last.done);
        assert_eq!(last.reward, 0.0);
    }

    #[test]
    fn placement_fails_when_room_is_full() {
        let mut world = boxed_world();
        let mut rng = StdRng::seed_from_u64(0);
        for y in 1..4 {
            for x in 1..4 {
                world.set(Position::new(x, y), Tile::Lava).unwrap();
            }
        }
        let res = world.place_obj(Tile::Goal, Position::new(1, 1), (3, 3), &mut rng);
        assert_eq!(
            res,
            Err(PlacementError::Exhausted {
                attempts: MAX_PLACEMENT_ATTEMPTS
            })
        );
    }

    #[test]
    fn placement_avoids_agent() {
        let mut world = GridWorld::new(3, 3, 10);
        world.wall_rect(Position::new(0, 0), 3, 3);
        world.agent_pos = Position::new(1, 1);
        let mut rng = StdRng::seed_from_u64(3);
        let res = world.place_obj(Tile::Goal, Position::new(0, 0), (3, 3), &mut rng);
        assert!(res.is_err(), "the only floor cell is under the agent");
    }
}
