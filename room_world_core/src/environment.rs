use serde::{Deserialize, Serialize};

use crate::{
    Direction, ObjectId, Position, WorldObject,
    engine::{Action, GridWorld, Tile},
    error::GenerationError,
};

/// Task-specific part of an observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskObservation {
    /// Object collected on this step, if any.
    pub collected: Option<ObjectId>,
    /// One flag per pool entry: live in the room and not yet collected.
    pub available_obj: Vec<bool>,
}

/// Extra state exposed when diagnostics are enabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Last known position of every pool object (`None` if never placed).
    pub object_positions: Vec<Option<Position>>,
    /// Identifiers of the active task, in assignment order.
    pub object_ids: Vec<ObjectId>,
    pub agent_pos: Position,
    pub agent_dir: Direction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub agent_pos: Position,
    pub agent_dir: Direction,
    pub carrying: Option<WorldObject>,
    pub step_count: u32,
    pub mission: String,
    pub task: Option<TaskObservation>,
    pub diagnostics: Option<Diagnostics>,
}

impl Observation {
    pub fn from_world(world: &GridWorld, mission: &str) -> Self {
        Observation {
            agent_pos: world.agent_pos,
            agent_dir: world.agent_dir,
            carrying: world.carrying,
            step_count: world.step_count,
            mission: mission.to_string(),
            task: None,
            diagnostics: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepInfo {
    /// The whole task was completed as assigned.
    pub full_task_achieved: bool,
}

/// Outcome of [`Environment::step`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub observation: Observation,
    pub reward: f32,
    pub done: bool,
    pub info: StepInfo,
}

/// What an agent gets to look at when choosing an action.
#[derive(Debug)]
pub struct AgentView<'a> {
    pub world: &'a GridWorld,
    /// Tiles the agent should head for, most urgent first.
    pub targets: Vec<Position>,
}

/// A generated episode that can be stepped.
pub trait Environment {
    /// Builds a fresh episode and returns its first observation.
    fn generate(&mut self) -> Result<Observation, GenerationError>;

    /// Advances the episode by one action.
    fn step(&mut self, action: Action) -> Step;

    fn world(&self) -> &GridWorld;

    fn mission(&self) -> &str;

    /// Whether the current episode has ended.
    fn is_done(&self) -> bool;

    /// View for agents; by default every goal tile is a target.
    fn view(&self) -> AgentView<'_> {
        let world = self.world();
        let targets = world
            .tiles()
            .enumerate()
            .filter(|(_, tile)| **tile == Tile::Goal)
            .map(|(pos, _)| pos)
            .collect();
        AgentView { world, targets }
    }
}
