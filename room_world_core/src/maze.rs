//! Room-grid navigation environments.
//!
//! [`GridRooms`] opens every door of the room grid. [`GridMaze`] additionally
//! certifies a room path from the agent to the goal and then walls off random
//! doors that are not on that path.

use rand::{Rng, SeedableRng, rngs::StdRng};
use tracing::{debug, warn};

use crate::{
    Direction, Position,
    config::{GridMazeConfig, GridRoomsConfig},
    engine::{Action, GridWorld, Tile},
    environment::{Environment, Observation, Step, StepInfo},
    error::{ConfigError, GenerationError},
    pruning::{PruneReport, prune_doors},
    rooms::{RoomCoord, RoomGrid},
    search::{PathCertificate, search},
};

/// Regeneration budget when the goal turns out to be unreachable.
pub const MAX_GENERATION_ATTEMPTS: usize = 16;

const MISSION: &str = "get to the green goal square";

/// Where to drop a goal that has no fixed position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GoalArea {
    Anywhere,
    Room(RoomCoord),
}

#[derive(Debug)]
pub struct GridRooms {
    config: GridRoomsConfig,
    goal_area: GoalArea,
    rng: StdRng,
    world: GridWorld,
    rooms: RoomGrid,
    goal_pos: Position,
    done: bool,
}

impl GridRooms {
    pub fn new(config: GridRoomsConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::with_goal_area(config, GoalArea::Anywhere))
    }

    fn with_goal_area(config: GridRoomsConfig, goal_area: GoalArea) -> Self {
        let (width, height) = config.dimensions();
        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut world = GridWorld::new(width, height, config.max_steps);
        let rooms = RoomGrid::build(
            config.num_rows,
            config.num_cols,
            config.room_size,
            config.door_placement(),
            &mut world,
            &mut rng,
        );
        GridRooms {
            config,
            goal_area,
            rng,
            world,
            rooms,
            goal_pos: Position::new(0, 0),
            done: false,
        }
    }

    pub fn rooms(&self) -> &RoomGrid {
        &self.rooms
    }

    pub fn goal_pos(&self) -> Position {
        self.goal_pos
    }

    /// Rebuilds the room grid and places the agent and the goal.
    fn layout(&mut self) -> Result<(), GenerationError> {
        let (width, height) = self.config.dimensions();
        self.world = GridWorld::new(width, height, self.config.max_steps);
        self.rooms = RoomGrid::build(
            self.config.num_rows,
            self.config.num_cols,
            self.config.room_size,
            self.config.door_placement(),
            &mut self.world,
            &mut self.rng,
        );

        // A fixed goal goes down first so random agent sampling sees it as occupied.
        if let Some(pos) = self.config.goal_pos {
            self.world.set(pos, Tile::Goal)?;
        }

        match self.config.agent_pos {
            Some(pos) => {
                self.world.set(pos, Tile::Floor)?;
                self.world.agent_pos = pos;
                self.world.agent_dir = Direction::from_index(self.rng.random_range(0..4));
            }
            None => {
                self.world
                    .place_agent(Position::new(0, 0), (width, height), &mut self.rng)?;
            }
        }

        self.goal_pos = match (self.config.goal_pos, self.goal_area) {
            (Some(pos), _) => pos,
            (None, GoalArea::Anywhere) => {
                self.world
                    .place_obj(Tile::Goal, Position::new(0, 0), (width, height), &mut self.rng)?
            }
            (None, GoalArea::Room(coord)) => {
                let (top, size) = self
                    .rooms
                    .room(coord)
                    .map(|room| room.interior())
                    .unwrap_or((Position::new(1, 1), (width - 2, height - 2)));
                self.world.place_obj(Tile::Goal, top, size, &mut self.rng)?
            }
        };
        self.world.reset_episode();
        self.done = false;
        Ok(())
    }

    fn observe(&self) -> Observation {
        Observation::from_world(&self.world, MISSION)
    }
}

impl Environment for GridRooms {
    fn generate(&mut self) -> Result<Observation, GenerationError> {
        self.layout()?;
        Ok(self.observe())
    }

    fn step(&mut self, action: Action) -> Step {
        if self.done {
            return Step {
                observation: self.observe(),
                reward: 0.0,
                done: true,
                info: StepInfo::default(),
            };
        }
        let out = self.world.step(action);
        self.done = out.done;
        Step {
            observation: self.observe(),
            reward: out.reward,
            done: out.done,
            info: StepInfo::default(),
        }
    }

    fn world(&self) -> &GridWorld {
        &self.world
    }

    fn mission(&self) -> &str {
        MISSION
    }

    fn is_done(&self) -> bool {
        self.done
    }
}

/// A square [`GridRooms`] with doors pruned around a certified path.
#[derive(Debug)]
pub struct GridMaze {
    inner: GridRooms,
    trials: usize,
    certificate: Option<PathCertificate>,
    report: PruneReport,
}

impl GridMaze {
    pub fn new(config: GridMazeConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let goal_area = if config.goal_center_room {
            GoalArea::Room((config.grid_size / 2, config.grid_size / 2))
        } else {
            GoalArea::Anywhere
        };
        Ok(GridMaze {
            inner: GridRooms::with_goal_area(config.rooms(), goal_area),
            trials: config.trials(),
            certificate: None,
            report: PruneReport::default(),
        })
    }

    pub fn rooms(&self) -> &RoomGrid {
        &self.inner.rooms
    }

    pub fn goal_pos(&self) -> Position {
        self.inner.goal_pos
    }

    pub fn trials(&self) -> usize {
        self.trials
    }

    /// Room path certified for the current episode.
    pub fn certificate(&self) -> Option<&PathCertificate> {
        self.certificate.as_ref()
    }

    pub fn prune_report(&self) -> &PruneReport {
        &self.report
    }

    /// Room containing the agent and room containing the goal.
    pub fn endpoints(&self) -> (RoomCoord, RoomCoord) {
        let rooms = &self.inner.rooms;
        (
            rooms.room_of(self.inner.world.agent_pos),
            rooms.room_of(self.inner.goal_pos),
        )
    }
}

impl Environment for GridMaze {
    fn generate(&mut self) -> Result<Observation, GenerationError> {
        let mut endpoints = ((0, 0), (0, 0));
        for attempt in 1..=MAX_GENERATION_ATTEMPTS {
            self.inner.layout()?;
            endpoints = self.endpoints();
            let (start, goal) = endpoints;

            let Some(certificate) = search(&self.inner.rooms, start, goal, &mut self.inner.rng)
            else {
                warn!(attempt, ?start, ?goal, "goal room unreachable, regenerating");
                continue;
            };
            debug!(path = ?certificate.rooms(), "certified room path");

            let occupied = [self.inner.world.agent_pos, self.inner.goal_pos];
            self.report = prune_doors(
                &mut self.inner.rooms,
                &mut self.inner.world,
                &certificate,
                self.trials,
                &occupied,
                &mut self.inner.rng,
            );
            self.certificate = Some(certificate);
            return Ok(self.inner.observe());
        }
        self.certificate = None;
        Err(GenerationError::Unreachable {
            start: endpoints.0,
            goal: endpoints.1,
            attempts: MAX_GENERATION_ATTEMPTS,
        })
    }

    fn step(&mut self, action: Action) -> Step {
        self.inner.step(action)
    }

    fn world(&self) -> &GridWorld {
        &self.inner.world
    }

    fn mission(&self) -> &str {
        MISSION
    }

    fn is_done(&self) -> bool {
        self.inner.done
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_rooms_places_agent_and_goal() {
        let mut env = GridRooms::new(GridRoomsConfig {
            seed: 3,
            ..GridRoomsConfig::default()
        })
        .unwrap();
        let obs = env.generate().unwrap();
        let world = env.world();
        assert_eq!((world.width(), world.height()), (19, 19));
        assert_eq!(world.get(env.goal_pos()), Some(&Tile::Goal));
        assert_ne!(obs.agent_pos, env.goal_pos());
        assert_eq!(world.get(obs.agent_pos), Some(&Tile::Floor));
        assert_eq!(env.rooms().edge_count(), 12);
    }

    #[test]
    fn fixed_positions_are_honoured() {
        let mut env = GridRooms::new(GridRoomsConfig {
            num_rows: 2,
            num_cols: 2,
            agent_pos: Some(Position::new(1, 1)),
            goal_pos: Some(Position::new(11, 11)),
            ..GridRoomsConfig::default()
        })
        .unwrap();
        let obs = env.generate().unwrap();
        assert_eq!(obs.agent_pos, Position::new(1, 1));
        assert_eq!(env.world().get(Position::new(11, 11)), Some(&Tile::Goal));
    }

    #[test]
    fn random_start_never_lands_on_fixed_goal() {
        let goal = Position::new(3, 3);
        for seed in 0..300 {
            let mut env = GridRooms::new(GridRoomsConfig {
                num_rows: 1,
                num_cols: 1,
                goal_pos: Some(goal),
                seed,
                ..GridRoomsConfig::default()
            })
            .unwrap();
            let obs = env.generate().unwrap();
            assert_ne!(obs.agent_pos, goal, "seed {seed}");
            assert_eq!(env.goal_pos(), goal);
            assert_eq!(env.world().get(goal), Some(&Tile::Goal));
        }

        for seed in 0..100 {
            let mut env = GridMaze::new(GridMazeConfig {
                grid_size: 2,
                goal_pos: Some(goal),
                seed,
                ..GridMazeConfig::default()
            })
            .unwrap();
            let obs = env.generate().unwrap();
            assert_ne!(obs.agent_pos, goal, "seed {seed}");
            assert_eq!(env.world().get(goal), Some(&Tile::Goal));
        }
    }

    #[test]
    fn maze_goal_lands_in_center_room() {
        let mut env = GridMaze::new(GridMazeConfig {
            seed: 8,
            ..GridMazeConfig::default()
        })
        .unwrap();
        env.generate().unwrap();
        assert_eq!(env.endpoints().1, (1, 1));
        assert_eq!(env.trials(), 14);
    }

    #[test]
    fn steps_after_done_are_inert() {
        let mut env = GridRooms::new(GridRoomsConfig {
            num_rows: 1,
            num_cols: 1,
            room_size: 5,
            agent_pos: Some(Position::new(1, 1)),
            goal_pos: Some(Position::new(2, 1)),
            ..GridRoomsConfig::default()
        })
        .unwrap();
        env.generate().unwrap();
        while env.world().agent_dir != Direction::Right {
            env.step(Action::Left);
        }
        let step = env.step(Action::Forward);
        assert!(step.done);
        assert!(step.reward > 0.0);
        let after = env.step(Action::Forward);
        assert!(after.done);
        assert_eq!(after.reward, 0.0);
    }
}
