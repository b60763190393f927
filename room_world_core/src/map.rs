use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

use crate::Position;

/// Errors raised by tile writes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    #[error("Coordinates ({x}, {y}) are out of bounds for grid size ({width}, {height})")]
    OutOfBounds {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    },
}

/// A dense 2D grid stored row-major.
///
/// All accessors take a [`Position`]; reads outside the grid return `None`
/// and writes outside the grid return [`GridError::OutOfBounds`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid<T> {
    width: usize,
    height: usize,
    cells: Vec<T>,
}

impl<T> Grid<T> {
    /// Creates a `width × height` grid filled with `T::default()`.
    ///
    /// # Panics
    ///
    /// Panics if `width * height` overflows `usize`.
    pub fn new(width: usize, height: usize) -> Self
    where
        T: Default + Clone,
    {
        let size = width.checked_mul(height).expect("Grid size overflow");
        Grid {
            width,
            height,
            cells: vec![T::default(); size],
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    fn offset(&self, pos: Position) -> Option<usize> {
        self.contains(pos).then(|| pos.y * self.width + pos.x)
    }

    #[inline]
    pub fn contains(&self, pos: Position) -> bool {
        pos.x < self.width && pos.y < self.height
    }

    pub fn get(&self, pos: Position) -> Option<&T> {
        self.offset(pos).map(|i| &self.cells[i])
    }

    pub fn get_mut(&mut self, pos: Position) -> Option<&mut T> {
        self.offset(pos).map(|i| &mut self.cells[i])
    }

    /// Replaces the value at `pos`, returning the previous one.
    pub fn set(&mut self, pos: Position, value: T) -> Result<T, GridError> {
        let index = self.offset(pos).ok_or(GridError::OutOfBounds {
            x: pos.x,
            y: pos.y,
            width: self.width,
            height: self.height,
        })?;
        Ok(std::mem::replace(&mut self.cells[index], value))
    }

    /// Yields `(position, &cell)` in row-major order.
    pub fn enumerate(&self) -> impl Iterator<Item = (Position, &T)> {
        let width = self.width;
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, cell)| (Position::new(i % width, i / width), cell))
    }

    /// Iterates one row, left to right.
    pub fn row(&self, y: usize) -> &[T] {
        let start = y * self.width;
        &self.cells[start..start + self.width]
    }
}

impl<T> Index<Position> for Grid<T> {
    type Output = T;

    #[inline]
    fn index(&self, pos: Position) -> &Self::Output {
        match self.offset(pos) {
            Some(i) => &self.cells[i],
            None => panic!(
                "Grid index ({}, {}) out of bounds for grid size ({}, {})",
                pos.x, pos.y, self.width, self.height
            ),
        }
    }
}

impl<T> IndexMut<Position> for Grid<T> {
    #[inline]
    fn index_mut(&mut self, pos: Position) -> &mut Self::Output {
        let (width, height) = (self.width, self.height);
        match self.offset(pos) {
            Some(i) => &mut self.cells[i],
            None => panic!(
                "Grid index ({}, {}) out of bounds for grid size ({}, {})",
                pos.x, pos.y, width, height
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_returns_previous_value() {
        let mut grid: Grid<u8> = Grid::new(3, 2);
        assert_eq!(grid.set(Position::new(2, 1), 7), Ok(0));
        assert_eq!(grid.set(Position::new(2, 1), 9), Ok(7));
        assert_eq!(grid[Position::new(2, 1)], 9);
    }

    #[test]
    fn out_of_bounds_access() {
        let mut grid: Grid<u8> = Grid::new(3, 2);
        assert!(grid.get(Position::new(3, 0)).is_none());
        assert_eq!(
            grid.set(Position::new(0, 2), 1),
            Err(GridError::OutOfBounds {
                x: 0,
                y: 2,
                width: 3,
                height: 2
            })
        );
    }

    #[test]
    fn enumerate_is_row_major() {
        let grid: Grid<u8> = Grid::new(2, 2);
        let order: Vec<Position> = grid.enumerate().map(|(p, _)| p).collect();
        assert_eq!(
            order,
            vec![
                Position::new(0, 0),
                Position::new(1, 0),
                Position::new(0, 1),
                Position::new(1, 1)
            ]
        );
    }
}
