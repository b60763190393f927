use std::{
    cmp::Ordering,
    collections::{BinaryHeap, HashMap},
};

use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{
    Direction, ObjectKind, Position, WorldObject,
    engine::{Action, GridWorld, Tile},
    environment::AgentView,
};

/// Trait defining the behavior of an agent.
/// Agents decide which action to take based on the AgentView.
pub trait Agent {
    /// Determines the action to perform next.
    /// `&mut self` allows the agent to keep internal state between ticks.
    fn act(&mut self, view: &AgentView) -> Action;
}

/// Picks uniformly among the six primitive actions that change something.
#[derive(Debug)]
pub struct RandomWalker {
    rng: StdRng,
}

impl RandomWalker {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Agent for RandomWalker {
    fn act(&mut self, _view: &AgentView) -> Action {
        Action::ALL[self.rng.random_range(0..6)]
    }
}

/// Walks to the first reachable target with A*, opening doors on the way,
/// then steps onto it (goals) or picks it up (objects).
///
/// The plan is recomputed every tick, so objects moved by the environment
/// are followed without extra bookkeeping.
#[derive(Debug, Default)]
pub struct PlanningAgent;

impl PlanningAgent {
    pub fn new() -> Self {
        Self
    }

    /// Returns manhattan distance between two positions
    fn manhattan_distance(a: &Position, b: &Position) -> usize {
        a.x.abs_diff(b.x) + a.y.abs_diff(b.y)
    }

    /// The heading that moves `src` onto the adjacent `dst`.
    fn direction_to(src: Position, dst: Position) -> Option<Direction> {
        Direction::ALL
            .into_iter()
            .find(|dir| src.step(*dir) == Some(dst))
    }

    /// Turns the short way round towards `want`.
    fn turn_towards(current: Direction, want: Direction) -> Action {
        if current.turn_left() == want {
            Action::Left
        } else {
            Action::Right
        }
    }

    /// A* pathfinding implementation. The path includes both endpoints.
    fn a_star_path(&self, start: Position, goal: Position, world: &GridWorld) -> Option<Vec<Position>> {
        // For priority queue
        #[derive(Clone, Eq, PartialEq)]
        struct PrioritizedItem {
            priority: usize,
            position: Position,
        }

        impl Ord for PrioritizedItem {
            fn cmp(&self, other: &Self) -> Ordering {
                // Reverse ordering for min-heap behavior
                other.priority.cmp(&self.priority)
            }
        }

        impl PartialOrd for PrioritizedItem {
            fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                Some(self.cmp(other))
            }
        }

        let mut frontier = BinaryHeap::new();
        let mut came_from: HashMap<Position, Position> = HashMap::new();
        let mut cost_so_far: HashMap<Position, usize> = HashMap::new();

        frontier.push(PrioritizedItem {
            priority: 0,
            position: start,
        });
        cost_so_far.insert(start, 0);

        let mut goal_reached = false;

        while let Some(PrioritizedItem {
            position: current, ..
        }) = frontier.pop()
        {
            if current == goal {
                goal_reached = true;
                break;
            }

            let new_cost = cost_so_far.get(&current).copied().unwrap_or(usize::MAX) + 1;
            for neighbor in self.valid_neighbors(current, goal, world) {
                if cost_so_far.get(&neighbor).is_none_or(|old| new_cost < *old) {
                    cost_so_far.insert(neighbor, new_cost);
                    let priority = new_cost + Self::manhattan_distance(&neighbor, &goal);
                    frontier.push(PrioritizedItem {
                        priority,
                        position: neighbor,
                    });
                    came_from.insert(neighbor, current);
                }
            }
        }

        if !goal_reached {
            return None;
        }

        // Reconstruct path
        let mut path = vec![goal];
        let mut current = goal;
        while current != start {
            current = *came_from.get(&current)?;
            path.push(current);
        }
        path.reverse();
        Some(path)
    }

    /// Neighbours the agent can move through. The goal cell itself is always
    /// allowed so blocking targets (objects) can be approached.
    fn valid_neighbors(&self, position: Position, goal: Position, world: &GridWorld) -> Vec<Position> {
        Direction::ALL
            .into_iter()
            .filter_map(|dir| position.step(dir))
            .filter(|pos| {
                *pos == goal
                    || world
                        .get(*pos)
                        .is_some_and(|tile| Self::traversable(tile, world.carrying))
            })
            .collect()
    }

    fn traversable(tile: &Tile, carrying: Option<WorldObject>) -> bool {
        match tile {
            Tile::Lava => false,
            Tile::Door {
                locked: true,
                color,
                ..
            } => matches!(
                carrying,
                Some(WorldObject { kind: ObjectKind::Key, color: key, .. }) if key == *color
            ),
            Tile::Door { .. } => true,
            other => other.is_passable(),
        }
    }
}

impl Agent for PlanningAgent {
    fn act(&mut self, view: &AgentView) -> Action {
        let world = view.world;
        let current_pos = world.agent_pos;

        // 1. Plan to the most urgent reachable target
        let plan = view
            .targets
            .iter()
            .find_map(|target| self.a_star_path(current_pos, *target, world));
        let Some(plan) = plan else {
            return Action::Done;
        };

        // 2. Already standing on it (overlappable targets only)
        let Some(&next_pos) = plan.get(1) else {
            return Action::Done;
        };

        // 3. Face the next cell
        let Some(want) = Self::direction_to(current_pos, next_pos) else {
            return Action::Done;
        };
        if world.agent_dir != want {
            return Self::turn_towards(world.agent_dir, want);
        }

        // 4. Interact with what is in front
        match world.get(next_pos) {
            Some(Tile::Door { open: false, .. }) => Action::Toggle,
            Some(Tile::Object(obj)) if obj.kind.can_pickup() && plan.len() == 2 => Action::Pickup,
            _ => Action::Forward,
        }
    }
}
