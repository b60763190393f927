use serde::{Deserialize, Serialize};

pub mod agent;
pub mod config;
pub mod empty;
pub mod engine;
pub mod environment;
pub mod error;
pub mod map;
pub mod maze;
pub mod multi_object;
pub mod pruning;
pub mod rooms;
pub mod search;
pub mod tasks;

/// Identifier of a collectible object inside a task pool.
pub type ObjectId = usize;

/// Represents a 2D tile coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

impl Position {
    pub const fn new(x: usize, y: usize) -> Self {
        Position { x, y }
    }

    /// The neighbouring tile in `dir`, or `None` when it would leave the
    /// non-negative quadrant.
    pub fn step(self, dir: Direction) -> Option<Position> {
        let (dx, dy) = dir.delta();
        Some(Position {
            x: self.x.checked_add_signed(dx)?,
            y: self.y.checked_add_signed(dy)?,
        })
    }
}

/// Cardinal directions, in door-slot order.
///
/// The discriminant doubles as the agent heading (0 = facing right).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Direction {
    Right = 0,
    Down = 1,
    Left = 2,
    Up = 3,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Right,
        Direction::Down,
        Direction::Left,
        Direction::Up,
    ];

    pub fn from_index(index: usize) -> Direction {
        Self::ALL[index % 4]
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn opposite(self) -> Direction {
        Self::from_index(self.index() + 2)
    }

    pub fn turn_right(self) -> Direction {
        Self::from_index(self.index() + 1)
    }

    pub fn turn_left(self) -> Direction {
        Self::from_index(self.index() + 3)
    }

    pub fn delta(self) -> (isize, isize) {
        match self {
            Direction::Right => (1, 0),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Up => (0, -1),
        }
    }
}

/// Kinds of objects that can occupy a tile or the agent's hands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Wall,
    Door,
    Key,
    Ball,
    Box,
    Goal,
    Lava,
}

impl ObjectKind {
    /// Whether the agent may pick this kind up.
    pub fn can_pickup(self) -> bool {
        matches!(self, ObjectKind::Key | ObjectKind::Ball | ObjectKind::Box)
    }

    /// Whether the agent may stand on a tile holding this kind.
    pub fn can_overlap(self) -> bool {
        matches!(self, ObjectKind::Goal | ObjectKind::Lava)
    }

    pub fn name(self) -> &'static str {
        match self {
            ObjectKind::Wall => "wall",
            ObjectKind::Door => "door",
            ObjectKind::Key => "key",
            ObjectKind::Ball => "ball",
            ObjectKind::Box => "box",
            ObjectKind::Goal => "goal",
            ObjectKind::Lava => "lava",
        }
    }
}

/// Object colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Color {
    Red,
    Green,
    Blue,
    Purple,
    Yellow,
    Grey,
}

impl Color {
    pub const ALL: [Color; 6] = [
        Color::Red,
        Color::Green,
        Color::Blue,
        Color::Purple,
        Color::Yellow,
        Color::Grey,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Color::Red => "red",
            Color::Green => "green",
            Color::Blue => "blue",
            Color::Purple => "purple",
            Color::Yellow => "yellow",
            Color::Grey => "grey",
        }
    }
}

/// A movable object (key, ball, box) living on a tile or in the agent's hands.
///
/// Objects that belong to a task pool carry their identifier from
/// construction onwards; free-standing objects have `id == None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldObject {
    pub kind: ObjectKind,
    pub color: Color,
    pub id: Option<ObjectId>,
}

impl WorldObject {
    pub fn new(kind: ObjectKind, color: Color) -> Self {
        WorldObject {
            kind,
            color,
            id: None,
        }
    }

    pub fn with_id(kind: ObjectKind, color: Color, id: ObjectId) -> Self {
        WorldObject {
            kind,
            color,
            id: Some(id),
        }
    }
}
