//! Occupancy grid and A* pathfinding.
//!
//! The world is a square of `size × size` unit cells centred on the origin.
//! `world_to_grid` / `grid_to_world` convert between the two frames. Paths
//! use 4-directional movement with a Manhattan heuristic; ties in the open
//! set are broken by heuristic then cell index so results are deterministic.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};

use crate::constants::GRID_SIZE;

/// One cell of the occupancy grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCell {
    pub x: i32,
    pub z: i32,
}

impl GridCell {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    pub fn manhattan(&self, other: &GridCell) -> u32 {
        self.x.abs_diff(other.x) + self.z.abs_diff(other.z)
    }

    /// Orthogonal neighbours in a fixed order (+x, -x, +z, -z).
    pub fn neighbors(&self) -> [GridCell; 4] {
        [
            GridCell::new(self.x + 1, self.z),
            GridCell::new(self.x - 1, self.z),
            GridCell::new(self.x, self.z + 1),
            GridCell::new(self.x, self.z - 1),
        ]
    }
}

/// World coordinate → grid index on a grid of the given size. Halves round
/// up, so -0.5 lands on 0 rather than -1.
pub fn world_to_grid_sized(v: f32, size: i32) -> i32 {
    (v + size as f32 / 2.0 + 0.5).floor() as i32
}

/// Grid index → world coordinate on a grid of the given size.
pub fn grid_to_world_sized(v: i32, size: i32) -> f32 {
    v as f32 - size as f32 / 2.0
}

pub fn world_to_grid(v: f32) -> i32 {
    world_to_grid_sized(v, GRID_SIZE)
}

pub fn grid_to_world(v: i32) -> f32 {
    grid_to_world_sized(v, GRID_SIZE)
}

/// Fixed-size occupancy grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    size: i32,
    blocked: Vec<bool>,
}

impl Default for Grid {
    fn default() -> Self {
        Self::new(GRID_SIZE)
    }
}

impl Grid {
    pub fn new(size: i32) -> Self {
        let size = size.max(1);
        Self {
            size,
            blocked: vec![false; (size * size) as usize],
        }
    }

    pub fn size(&self) -> i32 {
        self.size
    }

    /// Whether the occupancy vector covers exactly `size × size` cells.
    /// Deserialized grids are not checked on their own.
    pub fn is_well_formed(&self) -> bool {
        self.size >= 1 && self.blocked.len() as u64 == (self.size as u64).pow(2)
    }

    pub fn in_bounds(&self, x: i32, z: i32) -> bool {
        (0..self.size).contains(&x) && (0..self.size).contains(&z)
    }

    fn index(&self, x: i32, z: i32) -> usize {
        (z * self.size + x) as usize
    }

    fn cell_at(&self, index: usize) -> GridCell {
        let i = index as i32;
        GridCell::new(i % self.size, i / self.size)
    }

    pub fn world_to_cell(&self, x: f32, z: f32) -> GridCell {
        GridCell::new(
            world_to_grid_sized(x, self.size),
            world_to_grid_sized(z, self.size),
        )
    }

    /// World-space (x, z) centre of a cell.
    pub fn cell_to_world(&self, cell: GridCell) -> (f32, f32) {
        (
            grid_to_world_sized(cell.x, self.size),
            grid_to_world_sized(cell.z, self.size),
        )
    }

    /// Marks a cell non-traversable. Out-of-range cells are ignored.
    pub fn set_blocked(&mut self, x: i32, z: i32) {
        if self.in_bounds(x, z) {
            let i = self.index(x, z);
            self.blocked[i] = true;
        } else {
            log::warn!("ignoring block request outside grid: ({x}, {z})");
        }
    }

    pub fn clear_blocked(&mut self, x: i32, z: i32) {
        if self.in_bounds(x, z) {
            let i = self.index(x, z);
            self.blocked[i] = false;
        }
    }

    pub fn clear(&mut self) {
        self.blocked.iter_mut().for_each(|b| *b = false);
    }

    pub fn is_walkable(&self, x: i32, z: i32) -> bool {
        self.in_bounds(x, z) && !self.blocked[self.index(x, z)]
    }

    pub fn blocked_count(&self) -> usize {
        self.blocked.iter().filter(|b| **b).count()
    }

    /// Clamp a cell into range. Out-of-range input is logged, not rejected.
    pub fn clamp_cell(&self, cell: GridCell) -> GridCell {
        let clamped = GridCell::new(
            cell.x.clamp(0, self.size - 1),
            cell.z.clamp(0, self.size - 1),
        );
        if clamped != cell {
            log::warn!(
                "grid cell ({}, {}) out of range, clamped to ({}, {})",
                cell.x,
                cell.z,
                clamped.x,
                clamped.z
            );
        }
        clamped
    }

    /// A* from `from` to `to`, inclusive of both endpoints.
    ///
    /// Returns an empty path when `from == to` or when `to` is unreachable.
    /// The start cell may itself be blocked (a worker standing on a freshly
    /// placed building can still walk off it); the goal must be walkable.
    pub fn find_path(&self, from: GridCell, to: GridCell) -> Vec<GridCell> {
        let start = self.clamp_cell(from);
        let goal = self.clamp_cell(to);

        if start == goal || !self.is_walkable(goal.x, goal.z) {
            return Vec::new();
        }

        let cells = (self.size * self.size) as usize;
        let mut g_cost = vec![u32::MAX; cells];
        let mut came_from: Vec<Option<usize>> = vec![None; cells];
        let mut closed = vec![false; cells];
        let mut open = BinaryHeap::new();

        let start_idx = self.index(start.x, start.z);
        let goal_idx = self.index(goal.x, goal.z);
        g_cost[start_idx] = 0;
        let h = start.manhattan(&goal);
        open.push(Reverse((h, h, start_idx)));

        while let Some(Reverse((_, _, current_idx))) = open.pop() {
            if current_idx == goal_idx {
                return self.reconstruct(&came_from, current_idx);
            }
            if closed[current_idx] {
                continue;
            }
            closed[current_idx] = true;

            let current = self.cell_at(current_idx);
            let next_g = g_cost[current_idx] + 1;
            for next in current.neighbors() {
                if !self.is_walkable(next.x, next.z) {
                    continue;
                }
                let next_idx = self.index(next.x, next.z);
                if closed[next_idx] || next_g >= g_cost[next_idx] {
                    continue;
                }
                g_cost[next_idx] = next_g;
                came_from[next_idx] = Some(current_idx);
                let h = next.manhattan(&goal);
                open.push(Reverse((next_g + h, h, next_idx)));
            }
        }

        Vec::new()
    }

    fn reconstruct(&self, came_from: &[Option<usize>], goal_idx: usize) -> Vec<GridCell> {
        let mut path = vec![self.cell_at(goal_idx)];
        let mut node = goal_idx;
        while let Some(prev) = came_from[node] {
            path.push(self.cell_at(prev));
            node = prev;
        }
        path.reverse();
        path
    }

    /// `target` if walkable, else the first walkable orthogonal probe at
    /// radius 1..=`max_radius`, else the clamped target.
    pub fn find_nearest_walkable(&self, target: GridCell, max_radius: i32) -> GridCell {
        let target = self.clamp_cell(target);
        if self.is_walkable(target.x, target.z) {
            return target;
        }
        for r in 1..=max_radius {
            let probes = [
                GridCell::new(target.x + r, target.z),
                GridCell::new(target.x - r, target.z),
                GridCell::new(target.x, target.z + r),
                GridCell::new(target.x, target.z - r),
            ];
            if let Some(found) = probes.into_iter().find(|c| self.is_walkable(c.x, c.z)) {
                return found;
            }
        }
        target
    }
}
