//! Deterministic pools of collectible objects split into task groups.

use std::ops::Range;

use rand::{Rng, SeedableRng, rngs::StdRng, seq::IndexedRandom};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Color, ObjectId, ObjectKind, error::ConfigError};

/// Draw budget per requested pool entry before giving up.
const DRAWS_PER_ENTRY: usize = 1000;

/// `task_size × num_tasks` distinct `(kind, color)` pairs; task `t` owns the
/// identifiers `t * task_size .. (t + 1) * task_size`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPool {
    objects: Vec<(ObjectKind, Color)>,
    task_size: usize,
    num_tasks: usize,
}

/// The task chosen for one episode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSelection {
    pub index: usize,
    /// Object identifiers in assignment order.
    pub ids: Vec<ObjectId>,
}

impl TaskPool {
    /// Draws the pool from a generator seeded with `seed`.
    ///
    /// Kinds and colors are drawn independently and duplicates rejected until
    /// the pool is full. Fails up front if the requested size exceeds the
    /// number of distinct pairs, and after a bounded number of draws otherwise.
    pub fn build(
        seed: u64,
        object_types: &[ObjectKind],
        colors: &[Color],
        task_size: usize,
        num_tasks: usize,
    ) -> Result<Self, ConfigError> {
        if task_size == 0 || num_tasks == 0 {
            return Err(ConfigError::InvalidTaskShape {
                task_size,
                num_tasks,
            });
        }
        if let Some(kind) = object_types.iter().find(|k| !k.can_pickup()) {
            return Err(ConfigError::NotCollectible(*kind));
        }

        let requested = task_size * num_tasks;
        let available = distinct(object_types) * distinct(colors);
        if requested > available {
            return Err(ConfigError::PoolTooLarge {
                requested,
                available,
            });
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let mut objects = Vec::with_capacity(requested);
        let budget = requested * DRAWS_PER_ENTRY;
        let mut draws = 0;
        while objects.len() < requested {
            let drawn = (draws < budget)
                .then(|| Some((*object_types.choose(&mut rng)?, *colors.choose(&mut rng)?)))
                .flatten();
            let Some(pair) = drawn else {
                return Err(ConfigError::PoolExhausted {
                    requested,
                    attempts: draws,
                });
            };
            draws += 1;
            if !objects.contains(&pair) {
                objects.push(pair);
            }
        }

        debug!(seed, size = objects.len(), draws, "built task pool");
        Ok(TaskPool {
            objects,
            task_size,
            num_tasks,
        })
    }

    pub fn objects(&self) -> &[(ObjectKind, Color)] {
        &self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn get(&self, id: ObjectId) -> Option<(ObjectKind, Color)> {
        self.objects.get(id).copied()
    }

    /// Identifier range of task `index`.
    pub fn task_range(&self, index: usize) -> Result<Range<ObjectId>, ConfigError> {
        if index >= self.num_tasks {
            return Err(ConfigError::TaskIndexOutOfRange {
                index,
                num_tasks: self.num_tasks,
            });
        }
        let start = index * self.task_size;
        Ok(start..start + self.task_size)
    }

    /// Picks `fixed` if given, otherwise a uniformly random task.
    pub fn select<R: Rng + ?Sized>(
        &self,
        fixed: Option<usize>,
        rng: &mut R,
    ) -> Result<TaskSelection, ConfigError> {
        let index = match fixed {
            Some(index) => index,
            None => rng.random_range(0..self.num_tasks),
        };
        Ok(TaskSelection {
            index,
            ids: self.task_range(index)?.collect(),
        })
    }
}

fn distinct<T: PartialEq>(items: &[T]) -> usize {
    items
        .iter()
        .enumerate()
        .filter(|(i, item)| !items[..*i].contains(item))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TYPES: [ObjectKind; 3] = [ObjectKind::Box, ObjectKind::Ball, ObjectKind::Key];

    #[test]
    fn pool_is_deterministic_and_duplicate_free() {
        let a = TaskPool::build(1, &TYPES, &Color::ALL, 6, 3).unwrap();
        let b = TaskPool::build(1, &TYPES, &Color::ALL, 6, 3).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 18);
        for (i, pair) in a.objects().iter().enumerate() {
            assert!(!a.objects()[..i].contains(pair), "duplicate {pair:?}");
        }
    }

    #[test]
    fn task_ranges_are_contiguous() {
        let pool = TaskPool::build(1, &TYPES, &Color::ALL, 6, 3).unwrap();
        assert_eq!(pool.task_range(0).unwrap(), 0..6);
        assert_eq!(pool.task_range(1).unwrap(), 6..12);
        assert_eq!(pool.task_range(2).unwrap(), 12..18);
        assert!(matches!(
            pool.task_range(3),
            Err(ConfigError::TaskIndexOutOfRange { index: 3, num_tasks: 3 })
        ));
    }

    #[test]
    fn full_pool_is_reachable() {
        let pool = TaskPool::build(5, &TYPES, &Color::ALL, 9, 2).unwrap();
        assert_eq!(pool.len(), 18);
    }

    #[test]
    fn oversized_pool_is_rejected() {
        let res = TaskPool::build(5, &TYPES, &[Color::Red, Color::Red, Color::Blue], 7, 1);
        assert_eq!(
            res,
            Err(ConfigError::PoolTooLarge {
                requested: 7,
                available: 6
            })
        );
    }

    #[test]
    fn non_collectible_kinds_are_rejected() {
        let res = TaskPool::build(5, &[ObjectKind::Ball, ObjectKind::Door], &Color::ALL, 2, 1);
        assert_eq!(res, Err(ConfigError::NotCollectible(ObjectKind::Door)));
    }

    #[test]
    fn select_honours_fixed_task() {
        let pool = TaskPool::build(1, &TYPES, &Color::ALL, 6, 3).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let sel = pool.select(Some(2), &mut rng).unwrap();
        assert_eq!(sel.index, 2);
        assert_eq!(sel.ids, (12..18).collect::<Vec<_>>());
        for _ in 0..20 {
            let sel = pool.select(None, &mut rng).unwrap();
            assert!(sel.index < 3);
            assert_eq!(sel.ids.len(), 6);
        }
    }
}
