use crate::{ObjectKind, Position, map::GridError};

/// Fatal configuration problems, raised while building an environment.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Unknown task completion policy {0} (expected 0 = all, 1 = split)")]
    UnknownPolicy(u8),
    #[error("Maze grids must be square, got {rows} rows and {cols} columns")]
    NonSquareMaze { rows: usize, cols: usize },
    #[error("Room grid needs at least one row and one column")]
    EmptyGrid,
    #[error("Room size {0} is too small to hold an agent and a goal")]
    InvalidRoomSize(usize),
    #[error("Invalid task shape: task_size={task_size}, num_tasks={num_tasks}")]
    InvalidTaskShape { task_size: usize, num_tasks: usize },
    #[error("Task index {index} out of range for {num_tasks} tasks")]
    TaskIndexOutOfRange { index: usize, num_tasks: usize },
    #[error("Object pool of {requested} exceeds the {available} unique (type, color) pairs")]
    PoolTooLarge { requested: usize, available: usize },
    #[error("Object pool stalled before reaching {requested} entries after {attempts} draws")]
    PoolExhausted { requested: usize, attempts: usize },
    #[error("{0:?} objects cannot be picked up and so cannot be collected")]
    NotCollectible(ObjectKind),
    #[error("Door closure fraction {0} must be finite and non-negative")]
    InvalidClosureFraction(f64),
    #[error("Agent start {0:?} coincides with the goal")]
    AgentOnGoal(Position),
    #[error("Position {pos:?} lies outside the {width}x{height} grid interior")]
    PositionOutOfBounds {
        pos: Position,
        width: usize,
        height: usize,
    },
}

/// Random placement failed to find a free cell.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlacementError {
    #[error("No free cell found after {attempts} placement attempts")]
    Exhausted { attempts: usize },
}

/// Retryable failures while generating an episode.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GenerationError {
    #[error("Goal room {goal:?} unreachable from start room {start:?} after {attempts} attempts")]
    Unreachable {
        start: (usize, usize),
        goal: (usize, usize),
        attempts: usize,
    },
    #[error(transparent)]
    Placement(#[from] PlacementError),
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
