//! Single-room object collection tasks.
//!
//! A [`TaskPool`] fixes every collectible `(kind, color)` pair up front. Each
//! episode picks one task group, scatters its objects in the room and tracks
//! which of them the agent has picked up. Picked objects leave play at once;
//! the [`CompletionPolicy`] decides reward and termination.

use rand::{SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::{
    ObjectId, Position, WorldObject,
    config::MultiObjectConfig,
    engine::{Action, GridWorld, InvalidAction, Tile},
    environment::{
        AgentView, Diagnostics, Environment, Observation, Step, StepInfo, TaskObservation,
    },
    error::{ConfigError, GenerationError},
    tasks::{TaskPool, TaskSelection},
};

const MISSION: &str = "collect the assigned objects";

/// How a task is judged complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum CompletionPolicy {
    /// Ends once `task_size` objects are collected; `+1` only for the exact
    /// assignment order.
    All = 0,
    /// The last `task_size / 2` objects are traps worth `-1`; collecting all
    /// the others is worth `+1`.
    Split = 1,
}

impl TryFrom<u8> for CompletionPolicy {
    type Error = ConfigError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(CompletionPolicy::All),
            1 => Ok(CompletionPolicy::Split),
            other => Err(ConfigError::UnknownPolicy(other)),
        }
    }
}

/// A primitive action aimed at one pool object, packed as
/// `(target + 1) * 10 + action`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeAction {
    /// `None` when the encoded value is below 10.
    pub target: Option<ObjectId>,
    pub action: Action,
}

impl CompositeAction {
    pub fn decode(encoded: u32) -> Result<Self, InvalidAction> {
        let action = Action::try_from((encoded % 10) as u8)?;
        let target = (encoded / 10).checked_sub(1).map(|t| t as ObjectId);
        Ok(CompositeAction { target, action })
    }

    pub fn encode(self) -> u32 {
        let slot = self.target.map_or(0, |t| t as u32 + 1);
        slot * 10 + self.action as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EpisodePhase {
    Collecting,
    Done,
}

/// Per-episode bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskState {
    pub selection: TaskSelection,
    /// Collected identifiers in pickup order.
    pub collected: Vec<ObjectId>,
    /// One flag per pool entry: placed this episode and not yet collected.
    pub available: Vec<bool>,
    /// Last known position of each pool entry.
    pub positions: Vec<Option<Position>>,
}

impl TaskState {
    fn empty(pool_len: usize) -> Self {
        TaskState {
            selection: TaskSelection {
                index: 0,
                ids: Vec::new(),
            },
            collected: Vec::new(),
            available: vec![false; pool_len],
            positions: vec![None; pool_len],
        }
    }

    /// Split policy: identifiers that end the episode with a penalty.
    fn negatives(&self) -> &[ObjectId] {
        let ids = &self.selection.ids;
        &ids[ids.len() - ids.len() / 2..]
    }

    /// Split policy: identifiers that must all be collected.
    fn positives(&self) -> &[ObjectId] {
        let ids = &self.selection.ids;
        &ids[..ids.len() - ids.len() / 2]
    }
}

/// Which carried objects count as collected on a step.
#[derive(Debug, Clone, Copy)]
enum Accept {
    Any,
    Only(Option<ObjectId>),
}

#[derive(Debug)]
pub struct MultiObject {
    config: MultiObjectConfig,
    policy: CompletionPolicy,
    pool: TaskPool,
    fixed_task: Option<usize>,
    partial_reward: f32,
    rng: StdRng,
    world: GridWorld,
    state: TaskState,
    phase: EpisodePhase,
}

impl MultiObject {
    pub fn new(config: MultiObjectConfig) -> Result<Self, ConfigError> {
        let policy = CompletionPolicy::try_from(config.policy)?;
        if config.room_size < 3 {
            return Err(ConfigError::InvalidRoomSize(config.room_size));
        }
        let pool = TaskPool::build(
            config.task_id,
            &config.object_types,
            &config.colors,
            config.task_size,
            config.num_tasks,
        )?;
        if let Some(index) = config.fixed_task {
            pool.task_range(index)?;
        }

        let world = Self::empty_room(&config);
        Ok(MultiObject {
            policy,
            fixed_task: config.fixed_task,
            partial_reward: 0.5 / config.task_size as f32,
            rng: StdRng::seed_from_u64(config.seed),
            world,
            state: TaskState::empty(pool.len()),
            phase: EpisodePhase::Done,
            pool,
            config,
        })
    }

    fn empty_room(config: &MultiObjectConfig) -> GridWorld {
        let mut world = GridWorld::new(config.room_size, config.room_size, config.max_steps());
        world.wall_rect(Position::new(0, 0), config.room_size, config.room_size);
        world
    }

    fn interior(&self) -> (Position, (usize, usize)) {
        let inner = self.config.room_size - 2;
        (Position::new(1, 1), (inner, inner))
    }

    pub fn pool(&self) -> &TaskPool {
        &self.pool
    }

    pub fn policy(&self) -> CompletionPolicy {
        self.policy
    }

    pub fn phase(&self) -> EpisodePhase {
        self.phase
    }

    pub fn task_state(&self) -> &TaskState {
        &self.state
    }

    pub fn object_position(&self, id: ObjectId) -> Option<Position> {
        self.state.positions.get(id).copied().flatten()
    }

    /// Pins the task played by subsequent episodes; `None` draws at random.
    pub fn set_fixed_task(&mut self, task: Option<usize>) -> Result<(), ConfigError> {
        if let Some(index) = task {
            self.pool.task_range(index)?;
        }
        self.fixed_task = task;
        Ok(())
    }

    /// Redraws the object pool from a new seed; takes effect at the next
    /// [`Environment::generate`].
    pub fn reshuffle_pool(&mut self, task_id: u64) -> Result<(), ConfigError> {
        self.pool = TaskPool::build(
            task_id,
            &self.config.object_types,
            &self.config.colors,
            self.config.task_size,
            self.config.num_tasks,
        )?;
        self.config.task_id = task_id;
        Ok(())
    }

    /// Steps with a [`CompositeAction`]: only the targeted object is
    /// collected, anything else picked up is put back at a random free cell.
    pub fn step_composite(&mut self, encoded: u32) -> Result<Step, InvalidAction> {
        let composite = CompositeAction::decode(encoded)?;
        Ok(self.advance(composite.action, Accept::Only(composite.target)))
    }

    fn advance(&mut self, action: Action, accept: Accept) -> Step {
        if self.phase == EpisodePhase::Done {
            return Step {
                observation: self.observe(None),
                reward: 0.0,
                done: true,
                info: StepInfo::default(),
            };
        }

        let out = self.world.step(action);
        let mut reward = 0.0;
        let mut done = out.done;
        let mut info = StepInfo::default();
        let mut collected = None;

        if let Some(obj) = self.world.carrying.take() {
            match (obj.id, accept) {
                (Some(id), Accept::Any) => collected = Some(id),
                (Some(id), Accept::Only(Some(target))) if id == target => collected = Some(id),
                _ => self.put_back(obj),
            }
        }

        if let Some(id) = collected {
            self.state.collected.push(id);
            if let Some(flag) = self.state.available.get_mut(id) {
                *flag = false;
            }
            if self.config.reward_pickup {
                reward += self.partial_reward;
            }
            trace!(id, collected = self.state.collected.len(), "collected object");

            match self.policy {
                CompletionPolicy::All => {
                    if self.state.collected.len() == self.config.task_size {
                        if self.config.full_task && self.state.collected == self.state.selection.ids {
                            reward = 1.0;
                            info.full_task_achieved = true;
                        }
                        done = true;
                    }
                }
                CompletionPolicy::Split => {
                    if self.state.negatives().contains(&id) {
                        reward = -1.0;
                        done = true;
                    } else {
                        let positives = self.state.positives();
                        let gathered = self
                            .state
                            .collected
                            .iter()
                            .filter(|c| positives.contains(c))
                            .count();
                        if gathered == positives.len() {
                            reward = 1.0;
                            info.full_task_achieved = true;
                            done = true;
                        }
                    }
                }
            }
        }

        if done {
            self.phase = EpisodePhase::Done;
            debug!(
                task = self.state.selection.index,
                collected = ?self.state.collected,
                reward,
                steps = self.world.step_count,
                "episode finished"
            );
        }

        Step {
            observation: self.observe(collected),
            reward,
            done,
            info,
        }
    }

    /// Returns a wrongly picked object to the room.
    fn put_back(&mut self, obj: WorldObject) {
        let (top, size) = self.interior();
        let pos = match self
            .world
            .place_obj(Tile::Object(obj), top, size, &mut self.rng)
        {
            Ok(pos) => pos,
            // The cell it was lifted from is free again.
            Err(_) => {
                let front = self
                    .world
                    .front_pos()
                    .filter(|p| self.world.get(*p) == Some(&Tile::Floor));
                match front.map(|p| self.world.set(p, Tile::Object(obj)).map(|_| p)) {
                    Some(Ok(pos)) => pos,
                    _ => {
                        warn!(?obj, "no free cell to return object to");
                        return;
                    }
                }
            }
        };
        if let Some(id) = obj.id {
            if let Some(slot) = self.state.positions.get_mut(id) {
                *slot = Some(pos);
            }
        }
    }

    fn observe(&self, collected: Option<ObjectId>) -> Observation {
        let mut obs = Observation::from_world(&self.world, MISSION);
        obs.task = Some(TaskObservation {
            collected,
            available_obj: self.state.available.clone(),
        });
        if self.config.diagnostics {
            obs.diagnostics = Some(Diagnostics {
                object_positions: self.state.positions.clone(),
                object_ids: self.state.selection.ids.clone(),
                agent_pos: self.world.agent_pos,
                agent_dir: self.world.agent_dir,
            });
        }
        obs
    }
}

impl Environment for MultiObject {
    fn generate(&mut self) -> Result<Observation, GenerationError> {
        self.world = Self::empty_room(&self.config);
        self.state = TaskState::empty(self.pool.len());

        let selection = self.pool.select(self.fixed_task, &mut self.rng)?;
        let (top, size) = self.interior();
        for &id in &selection.ids {
            let Some((kind, color)) = self.pool.get(id) else {
                continue;
            };
            let obj = WorldObject::with_id(kind, color, id);
            let pos = self
                .world
                .place_obj(Tile::Object(obj), top, size, &mut self.rng)?;
            self.state.positions[id] = Some(pos);
            self.state.available[id] = true;
        }
        self.world.place_agent(top, size, &mut self.rng)?;
        self.world.reset_episode();

        debug!(task = selection.index, ids = ?selection.ids, "selected task");
        self.state.selection = selection;
        self.phase = EpisodePhase::Collecting;
        Ok(self.observe(None))
    }

    fn step(&mut self, action: Action) -> Step {
        self.advance(action, Accept::Any)
    }

    fn world(&self) -> &GridWorld {
        &self.world
    }

    fn mission(&self) -> &str {
        MISSION
    }

    fn is_done(&self) -> bool {
        self.phase == EpisodePhase::Done
    }

    /// Targets the next object the active policy rewards: the first
    /// uncollected identifier in assignment order, skipping split traps.
    fn view(&self) -> AgentView<'_> {
        let wanted: &[ObjectId] = match self.policy {
            CompletionPolicy::All => &self.state.selection.ids,
            CompletionPolicy::Split => self.state.positives(),
        };
        let targets = wanted
            .iter()
            .filter(|id| self.state.available.get(**id).copied().unwrap_or(false))
            .filter_map(|id| self.object_position(*id))
            .collect();
        AgentView {
            world: &self.world,
            targets,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Direction;

    fn env(task_size: usize, num_tasks: usize, policy: u8) -> MultiObject {
        MultiObject::new(MultiObjectConfig {
            room_size: 8,
            task_size,
            num_tasks,
            policy,
            seed: 17,
            ..MultiObjectConfig::default()
        })
        .unwrap()
    }

    /// Moves the agent next to object `id`, facing it, and picks it up.
    fn grab(env: &mut MultiObject, id: ObjectId) -> Step {
        let target = env.object_position(id).expect("object was placed");
        let (spot, dir) = Direction::ALL
            .into_iter()
            .filter_map(|d| target.step(d).map(|p| (p, d.opposite())))
            .find(|(p, _)| env.world.get(*p).is_some_and(|t| *t != Tile::Wall))
            .expect("interior objects always have an interior neighbour");
        env.world.agent_pos = spot;
        env.world.agent_dir = dir;
        env.step(Action::Pickup)
    }

    #[test]
    fn unknown_policy_is_rejected() {
        let res = MultiObject::new(MultiObjectConfig {
            policy: 2,
            ..MultiObjectConfig::default()
        });
        assert!(matches!(res, Err(ConfigError::UnknownPolicy(2))));
    }

    #[test]
    fn composite_action_roundtrip() {
        let decoded = CompositeAction::decode(23).unwrap();
        assert_eq!(decoded.target, Some(1));
        assert_eq!(decoded.action, Action::Pickup);
        assert_eq!(decoded.encode(), 23);

        let bare = CompositeAction::decode(2).unwrap();
        assert_eq!(bare.target, None);
        assert_eq!(bare.action, Action::Forward);
        assert_eq!(CompositeAction::decode(18), Err(InvalidAction(8)));
    }

    #[test]
    fn in_order_collection_earns_full_reward() {
        let mut env = env(3, 1, 0);
        env.generate().unwrap();
        let ids = env.task_state().selection.ids.clone();

        let first = grab(&mut env, ids[0]);
        assert_eq!(first.observation.task.as_ref().unwrap().collected, Some(ids[0]));
        assert!(!first.done);
        assert_eq!(first.observation.carrying, None, "collected objects leave the hands");
        assert!(!first.observation.task.unwrap().available_obj[ids[0]]);

        assert!(!grab(&mut env, ids[1]).done);
        let last = grab(&mut env, ids[2]);
        assert!(last.done);
        assert_eq!(last.reward, 1.0);
        assert!(last.info.full_task_achieved);
        assert_eq!(env.phase(), EpisodePhase::Done);
    }

    #[test]
    fn out_of_order_collection_earns_nothing() {
        let mut env = env(3, 1, 0);
        env.generate().unwrap();
        let ids = env.task_state().selection.ids.clone();

        grab(&mut env, ids[1]);
        grab(&mut env, ids[0]);
        let last = grab(&mut env, ids[2]);
        assert!(last.done);
        assert_eq!(last.reward, 0.0);
        assert!(!last.info.full_task_achieved);
        assert_eq!(env.task_state().collected, vec![ids[1], ids[0], ids[2]]);
    }

    #[test]
    fn pickup_shaping_adds_partial_reward() {
        let mut env = MultiObject::new(MultiObjectConfig {
            room_size: 8,
            task_size: 4,
            reward_pickup: true,
            seed: 2,
            ..MultiObjectConfig::default()
        })
        .unwrap();
        env.generate().unwrap();
        let ids = env.task_state().selection.ids.clone();
        let step = grab(&mut env, ids[0]);
        assert!((step.reward - 0.125).abs() < 1e-6);
    }

    #[test]
    fn split_trap_ends_episode_with_penalty() {
        let mut env = env(4, 1, 1);
        env.generate().unwrap();
        let ids = env.task_state().selection.ids.clone();

        let positive = grab(&mut env, ids[0]);
        assert!(!positive.done);
        let trap = grab(&mut env, ids[3]);
        assert!(trap.done);
        assert_eq!(trap.reward, -1.0);
    }

    #[test]
    fn split_positives_complete_the_task() {
        let mut env = env(4, 1, 1);
        env.generate().unwrap();
        let ids = env.task_state().selection.ids.clone();

        assert!(!grab(&mut env, ids[1]).done);
        let done = grab(&mut env, ids[0]);
        assert!(done.done);
        assert_eq!(done.reward, 1.0);
        assert!(env.task_state().available[ids[2]]);
    }

    #[test]
    fn composite_step_only_collects_target() {
        let mut env = env(3, 1, 0);
        env.generate().unwrap();
        let ids = env.task_state().selection.ids.clone();
        let target = env.object_position(ids[0]).unwrap();
        let (spot, dir) = Direction::ALL
            .into_iter()
            .filter_map(|d| target.step(d).map(|p| (p, d.opposite())))
            .find(|(p, _)| env.world.get(*p).is_some_and(|t| *t != Tile::Wall))
            .unwrap();
        env.world.agent_pos = spot;
        env.world.agent_dir = dir;

        let wrong = CompositeAction {
            target: Some(ids[1]),
            action: Action::Pickup,
        };
        let step = env.step_composite(wrong.encode()).unwrap();
        assert_eq!(step.observation.task.as_ref().unwrap().collected, None);
        assert!(env.task_state().collected.is_empty());
        assert!(env.task_state().available[ids[0]]);
        let (kind, color) = env.pool().get(ids[0]).unwrap();
        let moved = env.object_position(ids[0]).unwrap();
        assert_eq!(
            env.world.get(moved),
            Some(&Tile::Object(WorldObject::with_id(kind, color, ids[0])))
        );
        assert_eq!(env.world.carrying, None);
    }

    #[test]
    fn diagnostics_expose_positions() {
        let mut env = MultiObject::new(MultiObjectConfig {
            diagnostics: true,
            task_size: 2,
            num_tasks: 2,
            fixed_task: Some(1),
            ..MultiObjectConfig::default()
        })
        .unwrap();
        let obs = env.generate().unwrap();
        let diag = obs.diagnostics.unwrap();
        assert_eq!(diag.object_ids, vec![2, 3]);
        assert_eq!(diag.object_positions[0], None);
        assert!(diag.object_positions[2].is_some());
        assert_eq!(diag.agent_pos, obs.agent_pos);
    }

    #[test]
    fn fixed_task_must_exist() {
        let mut env = env(2, 2, 0);
        assert!(env.set_fixed_task(Some(1)).is_ok());
        assert!(matches!(
            env.set_fixed_task(Some(2)),
            Err(ConfigError::TaskIndexOutOfRange { index: 2, num_tasks: 2 })
        ));
    }
}
