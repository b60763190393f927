//! Serializable environment configuration.
//!
//! Every struct uses `#[serde(default)]` so partial JSON documents work; all
//! validation happens in the environment constructors, before the first
//! episode is generated.

use serde::{Deserialize, Serialize};

use crate::{
    Color, ObjectKind, Position,
    empty::EmptyRoom,
    environment::Environment,
    error::ConfigError,
    maze::{GridMaze, GridRooms},
    multi_object::MultiObject,
    pruning::close_doors_trials,
    rooms::{DoorPlacement, RoomGrid},
};

/// A grid of rooms with every door open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridRoomsConfig {
    pub num_rows: usize,
    pub num_cols: usize,
    /// Room side in tiles, walls included.
    pub room_size: usize,
    pub max_steps: u32,
    /// Fixed agent start; random when absent.
    pub agent_pos: Option<Position>,
    /// Fixed goal; random when absent.
    pub goal_pos: Option<Position>,
    /// Cut doors at the middle of each wall instead of a random offset.
    pub middle_door: bool,
    pub seed: u64,
}

impl Default for GridRoomsConfig {
    fn default() -> Self {
        Self {
            num_rows: 3,
            num_cols: 3,
            room_size: 7,
            max_steps: 400,
            agent_pos: None,
            goal_pos: None,
            middle_door: false,
            seed: 0,
        }
    }
}

impl GridRoomsConfig {
    pub fn door_placement(&self) -> DoorPlacement {
        if self.middle_door {
            DoorPlacement::Middle
        } else {
            DoorPlacement::Random
        }
    }

    pub fn dimensions(&self) -> (usize, usize) {
        RoomGrid::dimensions(self.num_rows, self.num_cols, self.room_size)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.room_size < 3 {
            return Err(ConfigError::InvalidRoomSize(self.room_size));
        }
        if self.num_rows == 0 || self.num_cols == 0 {
            return Err(ConfigError::EmptyGrid);
        }
        let (width, height) = self.dimensions();
        for pos in [self.agent_pos, self.goal_pos].into_iter().flatten() {
            check_interior(pos, width, height)?;
        }
        check_distinct(self.agent_pos, self.goal_pos)
    }
}

/// A square room grid whose doors are pruned at random while keeping the
/// goal reachable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridMazeConfig {
    /// Rooms per side.
    pub grid_size: usize,
    /// Explicit row count; must equal `grid_size` when given.
    pub num_rows: Option<usize>,
    /// Explicit column count; must equal `grid_size` when given.
    pub num_cols: Option<usize>,
    pub room_size: usize,
    pub max_steps: u32,
    pub agent_pos: Option<Position>,
    pub goal_pos: Option<Position>,
    pub middle_door: bool,
    /// Fraction of `grid_size² · 4` used as the number of closure trials.
    pub close_doors_trials: f64,
    /// Put a random goal inside the central room rather than anywhere.
    pub goal_center_room: bool,
    pub seed: u64,
}

impl Default for GridMazeConfig {
    fn default() -> Self {
        Self {
            grid_size: 3,
            num_rows: None,
            num_cols: None,
            room_size: 7,
            max_steps: 400,
            agent_pos: None,
            goal_pos: None,
            middle_door: false,
            close_doors_trials: 0.4,
            goal_center_room: true,
            seed: 0,
        }
    }
}

impl GridMazeConfig {
    pub fn rooms(&self) -> GridRoomsConfig {
        GridRoomsConfig {
            num_rows: self.grid_size,
            num_cols: self.grid_size,
            room_size: self.room_size,
            max_steps: self.max_steps,
            agent_pos: self.agent_pos,
            goal_pos: self.goal_pos,
            middle_door: self.middle_door,
            seed: self.seed,
        }
    }

    pub fn trials(&self) -> usize {
        close_doors_trials(self.grid_size, self.close_doors_trials)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let rows = self.num_rows.unwrap_or(self.grid_size);
        let cols = self.num_cols.unwrap_or(self.grid_size);
        if rows != cols || rows != self.grid_size || self.grid_size == 0 {
            return Err(ConfigError::NonSquareMaze { rows, cols });
        }
        // A plain multiplier on the door count; above 1 just means more trials.
        if !self.close_doors_trials.is_finite() || self.close_doors_trials < 0.0 {
            return Err(ConfigError::InvalidClosureFraction(self.close_doors_trials));
        }
        self.rooms().validate()
    }
}

/// A single room holding one task's worth of collectible objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiObjectConfig {
    pub room_size: usize,
    /// Objects per task.
    pub task_size: usize,
    pub num_tasks: usize,
    /// Seed of the task pool.
    pub task_id: u64,
    /// Grant the full reward only for collecting in assignment order.
    pub full_task: bool,
    /// Grant `0.5 / task_size` per collected object.
    pub reward_pickup: bool,
    /// Completion policy: 0 = all, 1 = split.
    pub policy: u8,
    /// Always play this task instead of drawing one per episode.
    pub fixed_task: Option<usize>,
    pub object_types: Vec<ObjectKind>,
    pub colors: Vec<Color>,
    /// Attach object positions and agent pose to every observation.
    pub diagnostics: bool,
    /// Seed for layout randomness.
    pub seed: u64,
}

impl Default for MultiObjectConfig {
    fn default() -> Self {
        Self {
            room_size: 7,
            task_size: 3,
            num_tasks: 1,
            task_id: 1,
            full_task: true,
            reward_pickup: false,
            policy: 0,
            fixed_task: None,
            object_types: vec![ObjectKind::Box, ObjectKind::Ball, ObjectKind::Key],
            colors: Color::ALL.to_vec(),
            diagnostics: false,
            seed: 0,
        }
    }
}

impl MultiObjectConfig {
    pub fn max_steps(&self) -> u32 {
        (16 * self.room_size * self.room_size) as u32
    }
}

/// A single walled room with a goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmptyRoomConfig {
    pub size: usize,
    /// Fixed start; random when absent.
    pub agent_pos: Option<Position>,
    /// Fixed heading 0..=3 (clamped); random when absent.
    pub agent_dir: Option<u8>,
    /// Goal anchor; bottom-right corner when absent.
    pub goal_pos: Option<Position>,
    /// Maximum per-axis jitter applied to `goal_pos`.
    pub goal_rand_offset: usize,
    pub max_steps: u32,
    pub seed: u64,
}

impl Default for EmptyRoomConfig {
    fn default() -> Self {
        Self {
            size: 16,
            agent_pos: Some(Position::new(1, 1)),
            agent_dir: None,
            goal_pos: Some(Position::new(8, 8)),
            goal_rand_offset: 0,
            max_steps: 400,
            seed: 0,
        }
    }
}

impl EmptyRoomConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.size < 4 {
            return Err(ConfigError::InvalidRoomSize(self.size));
        }
        for pos in [self.agent_pos, self.goal_pos].into_iter().flatten() {
            check_interior(pos, self.size, self.size)?;
        }
        // A jittered goal is resampled off the start, so only an unjittered one can collide.
        let fixed_goal = match self.goal_pos {
            Some(_) if self.goal_rand_offset > 0 => None,
            Some(pos) => Some(pos),
            None => Some(Position::new(self.size - 2, self.size - 2)),
        };
        check_distinct(self.agent_pos, fixed_goal)
    }
}

fn check_interior(pos: Position, width: usize, height: usize) -> Result<(), ConfigError> {
    if pos.x == 0 || pos.y == 0 || pos.x + 1 >= width || pos.y + 1 >= height {
        return Err(ConfigError::PositionOutOfBounds { pos, width, height });
    }
    Ok(())
}

fn check_distinct(agent: Option<Position>, goal: Option<Position>) -> Result<(), ConfigError> {
    match (agent, goal) {
        (Some(agent), Some(goal)) if agent == goal => Err(ConfigError::AgentOnGoal(agent)),
        _ => Ok(()),
    }
}

/// Any environment, tagged by `kind` in JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EnvConfig {
    GridRooms(GridRoomsConfig),
    GridMaze(GridMazeConfig),
    MultiObject(MultiObjectConfig),
    EmptyRoom(EmptyRoomConfig),
}

impl EnvConfig {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Default configuration for an environment kind name.
    pub fn default_for(kind: &str) -> Option<Self> {
        Some(match kind {
            "grid_rooms" => EnvConfig::GridRooms(GridRoomsConfig::default()),
            "grid_maze" => EnvConfig::GridMaze(GridMazeConfig::default()),
            "multi_object" => EnvConfig::MultiObject(MultiObjectConfig::default()),
            "empty_room" => EnvConfig::EmptyRoom(EmptyRoomConfig::default()),
            _ => return None,
        })
    }

    pub fn seed(&self) -> u64 {
        match self {
            EnvConfig::GridRooms(c) => c.seed,
            EnvConfig::GridMaze(c) => c.seed,
            EnvConfig::MultiObject(c) => c.seed,
            EnvConfig::EmptyRoom(c) => c.seed,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        match &mut self {
            EnvConfig::GridRooms(c) => c.seed = seed,
            EnvConfig::GridMaze(c) => c.seed = seed,
            EnvConfig::MultiObject(c) => c.seed = seed,
            EnvConfig::EmptyRoom(c) => c.seed = seed,
        }
        self
    }

    /// Validates the configuration and constructs the environment.
    pub fn build(&self) -> Result<Box<dyn Environment>, ConfigError> {
        Ok(match self {
            EnvConfig::GridRooms(c) => Box::new(GridRooms::new(c.clone())?),
            EnvConfig::GridMaze(c) => Box::new(GridMaze::new(c.clone())?),
            EnvConfig::MultiObject(c) => Box::new(MultiObject::new(c.clone())?),
            EnvConfig::EmptyRoom(c) => Box::new(EmptyRoom::new(c.clone())?),
        })
    }
}
