//! A single walled room with one goal square.

use rand::{Rng, SeedableRng, rngs::StdRng};
use tracing::debug;

use crate::{
    Direction, Position,
    config::EmptyRoomConfig,
    engine::{Action, GridWorld, MAX_PLACEMENT_ATTEMPTS, Tile},
    environment::{Environment, Observation, Step, StepInfo},
    error::{ConfigError, GenerationError, PlacementError},
};

const MISSION: &str = "get to the green goal square";

#[derive(Debug)]
pub struct EmptyRoom {
    config: EmptyRoomConfig,
    rng: StdRng,
    world: GridWorld,
    goal_pos: Position,
    done: bool,
}

impl EmptyRoom {
    pub fn new(config: EmptyRoomConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(EmptyRoom {
            rng: StdRng::seed_from_u64(config.seed),
            world: GridWorld::new(config.size, config.size, config.max_steps),
            goal_pos: Position::new(config.size - 2, config.size - 2),
            done: false,
            config,
        })
    }

    pub fn goal_pos(&self) -> Position {
        self.goal_pos
    }

    /// The goal anchor shifted by up to `goal_rand_offset` per axis, kept
    /// inside the walls and off the forbidden cell.
    fn jitter_goal(
        &mut self,
        anchor: Position,
        forbidden: Position,
    ) -> Result<Position, PlacementError> {
        let off = self.config.goal_rand_offset as i64;
        let hi = self.config.size as i64 - 2;
        for _ in 0..MAX_PLACEMENT_ATTEMPTS {
            let dx = self.rng.random_range(-off..=off);
            let dy = self.rng.random_range(-off..=off);
            let pos = Position::new(
                (anchor.x as i64 + dx).clamp(1, hi) as usize,
                (anchor.y as i64 + dy).clamp(1, hi) as usize,
            );
            if pos != forbidden {
                return Ok(pos);
            }
        }
        Err(PlacementError::Exhausted {
            attempts: MAX_PLACEMENT_ATTEMPTS,
        })
    }
}

impl Environment for EmptyRoom {
    fn generate(&mut self) -> Result<Observation, GenerationError> {
        let size = self.config.size;
        self.world = GridWorld::new(size, size, self.config.max_steps);
        self.world.wall_rect(Position::new(0, 0), size, size);

        self.goal_pos = match self.config.goal_pos {
            Some(anchor) if self.config.goal_rand_offset == 0 => anchor,
            Some(anchor) => {
                let forbidden = self.config.agent_pos.unwrap_or(Position::new(1, 1));
                self.jitter_goal(anchor, forbidden)?
            }
            None => Position::new(size - 2, size - 2),
        };
        self.world.set(self.goal_pos, Tile::Goal)?;

        match self.config.agent_pos {
            Some(pos) => {
                self.world.agent_pos = pos;
                self.world.agent_dir = Direction::from_index(self.rng.random_range(0..4));
            }
            None => {
                self.world
                    .place_agent(Position::new(1, 1), (size - 2, size - 2), &mut self.rng)?;
            }
        }
        if let Some(dir) = self.config.agent_dir {
            self.world.agent_dir = Direction::from_index(dir.min(3) as usize);
        }
        self.world.reset_episode();
        self.done = false;

        debug!(agent = ?self.world.agent_pos, goal = ?self.goal_pos, "generated empty room");
        Ok(Observation::from_world(&self.world, MISSION))
    }

    fn step(&mut self, action: Action) -> Step {
        if self.done {
            return Step {
                observation: Observation::from_world(&self.world, MISSION),
                reward: 0.0,
                done: true,
                info: StepInfo::default(),
            };
        }
        let out = self.world.step(action);
        self.done = out.done;
        Step {
            observation: Observation::from_world(&self.world, MISSION),
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_room_matches_fixed_layout() {
        let mut env = EmptyRoom::new(EmptyRoomConfig::default()).unwrap();
        let obs = env.generate().unwrap();
        assert_eq!(obs.agent_pos, Position::new(1, 1));
        assert_eq!(env.goal_pos(), Position::new(8, 8));
        assert_eq!(env.world().get(Position::new(8, 8)), Some(&Tile::Goal));
        assert_eq!(env.world().get(Position::new(0, 5)), Some(&Tile::Wall));
        assert_eq!(env.world().get(Position::new(15, 15)), Some(&Tile::Wall));
    }

    #[test]
    fn missing_goal_goes_to_corner() {
        let mut env = EmptyRoom::new(EmptyRoomConfig {
            size: 6,
            goal_pos: None,
            ..EmptyRoomConfig::default()
        })
        .unwrap();
        env.generate().unwrap();
        assert_eq!(env.goal_pos(), Position::new(4, 4));
    }

    #[test]
    fn jittered_goal_stays_inside_and_off_start() {
        for seed in 0..50 {
            let mut env = EmptyRoom::new(EmptyRoomConfig {
                size: 5,
                goal_pos: Some(Position::new(2, 2)),
                goal_rand_offset: 3,
                seed,
                ..EmptyRoomConfig::default()
            })
            .unwrap();
            env.generate().unwrap();
            let goal = env.goal_pos();
            assert!((1..=3).contains(&goal.x) && (1..=3).contains(&goal.y), "{goal:?}");
            assert_ne!(goal, Position::new(1, 1));
        }
    }

    #[test]
    fn zero_offset_keeps_goal_on_anchor() {
        for seed in 0..20 {
            let mut env = EmptyRoom::new(EmptyRoomConfig {
                size: 6,
                agent_pos: None,
                goal_pos: Some(Position::new(1, 1)),
                goal_rand_offset: 0,
                seed,
                ..EmptyRoomConfig::default()
            })
            .unwrap();
            let obs = env.generate().unwrap();
            assert_eq!(env.goal_pos(), Position::new(1, 1));
            assert_ne!(obs.agent_pos, Position::new(1, 1));
        }
    }

    #[test]
    fn start_on_unjittered_goal_is_rejected() {
        let config = EmptyRoomConfig {
            size: 6,
            agent_pos: Some(Position::new(4, 4)),
            goal_pos: None,
            ..EmptyRoomConfig::default()
        };
        assert_eq!(
            EmptyRoom::new(config).err(),
            Some(ConfigError::AgentOnGoal(Position::new(4, 4)))
        );
    }

    #[test]
    fn heading_is_clamped() {
        let mut env = EmptyRoom::new(EmptyRoomConfig {
            agent_dir: Some(9),
            ..EmptyRoomConfig::default()
        })
        .unwrap();
        let obs = env.generate().unwrap();
        assert_eq!(obs.agent_dir, Direction::Up);
    }

    #[test]
    fn random_start_avoids_goal() {
        let mut env = EmptyRoom::new(EmptyRoomConfig {
            size: 4,
            agent_pos: None,
            goal_pos: Some(Position::new(2, 2)),
            seed: 4,
            ..EmptyRoomConfig::default()
        })
        .unwrap();
        for _ in 0..10 {
            let obs = env.generate().unwrap();
            assert_ne!(obs.agent_pos, env.goal_pos());
        }
    }
}
