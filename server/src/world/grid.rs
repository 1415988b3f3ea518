// world_server_core/server/src/world/grid.rs
//! Map partitioning into grids (catalog tiles) and cells (object buckets).
//!
//! Both coordinate kinds are derived from the same divisor constants so a
//! cell always falls inside exactly one geometry tile.

use crate::core::constants::*;
use std::fmt;

/// Coordinate pair bounded by `LIMIT` on each axis.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CoordPair<const LIMIT: u32> {
    pub x: u32,
    pub y: u32,
}

pub type CellCoord = CoordPair<TOTAL_NUMBER_OF_CELLS_PER_MAP>;
pub type GridCoord = CoordPair<MAX_NUMBER_OF_GRIDS>;

impl<const LIMIT: u32> CoordPair<LIMIT> {
    /// Builds a pair, clamping each axis into `[0, LIMIT)`.
    pub fn new(x: u32, y: u32) -> Self {
        CoordPair { x: x.min(LIMIT - 1), y: y.min(LIMIT - 1) }
    }

    pub fn is_valid(&self) -> bool {
        self.x < LIMIT && self.y < LIMIT
    }

    /// Linear id, row-major on `y`.
    pub fn id(&self) -> u32 {
        self.y * LIMIT + self.x
    }

    pub fn from_id(id: u32) -> Self {
        CoordPair::new(id % LIMIT, id / LIMIT)
    }

    /// Every coordinate within `radius` steps on both axes, clipped to the map.
    pub fn area(&self, radius: u32) -> impl Iterator<Item = CoordPair<LIMIT>> {
        let lo_x = self.x.saturating_sub(radius);
        let hi_x = (self.x + radius).min(LIMIT - 1);
        let lo_y = self.y.saturating_sub(radius);
        let hi_y = (self.y + radius).min(LIMIT - 1);
        (lo_y..=hi_y).flat_map(move |y| (lo_x..=hi_x).map(move |x| CoordPair { x, y }))
    }
}

impl<const LIMIT: u32> fmt::Debug for CoordPair<LIMIT> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl CellCoord {
    pub fn grid(&self) -> GridCoord {
        GridCoord::new(self.x / MAX_NUMBER_OF_CELLS, self.y / MAX_NUMBER_OF_CELLS)
    }

    /// Cell-local index inside its grid.
    pub fn in_grid(&self) -> (u32, u32) {
        (self.x % MAX_NUMBER_OF_CELLS, self.y % MAX_NUMBER_OF_CELLS)
    }

    /// World x/y at the middle of this cell.
    pub fn center(&self) -> (f32, f32) {
        let cx = (self.x as f32 - CENTER_GRID_CELL_ID as f32 + 0.5) * SIZE_OF_GRID_CELL;
        let cy = (self.y as f32 - CENTER_GRID_CELL_ID as f32 + 0.5) * SIZE_OF_GRID_CELL;
        (cx, cy)
    }
}

impl GridCoord {
    /// Tile coordinates as addressed by the geometry catalog. The catalog
    /// numbers tiles from the opposite corner.
    pub fn tile(&self) -> (u32, u32) {
        (MAX_NUMBER_OF_GRIDS - 1 - self.x, MAX_NUMBER_OF_GRIDS - 1 - self.y)
    }

    pub fn from_tile(tile_x: u32, tile_y: u32) -> Self {
        GridCoord::new(
            (MAX_NUMBER_OF_GRIDS - 1).saturating_sub(tile_x),
            (MAX_NUMBER_OF_GRIDS - 1).saturating_sub(tile_y),
        )
    }

    pub fn cells(&self) -> impl Iterator<Item = CellCoord> {
        let base_x = self.x * MAX_NUMBER_OF_CELLS;
        let base_y = self.y * MAX_NUMBER_OF_CELLS;
        (0..MAX_NUMBER_OF_CELLS)
            .flat_map(move |dy| (0..MAX_NUMBER_OF_CELLS).map(move |dx| CellCoord::new(base_x + dx, base_y + dy)))
    }
}

fn compute<const LIMIT: u32>(x: f32, y: f32, center_offset: f32, size: f32, center_val: u32) -> CoordPair<LIMIT> {
    // f64 keeps results identical to the offline extractor
    let axis = |v: f32| -> u32 {
        let offset = (v as f64 - center_offset as f64) / size as f64;
        let val = (offset + center_val as f64 + 0.5).floor();
        if !val.is_finite() || val < 0.0 {
            0
        } else {
            (val as u64).min(LIMIT as u64 - 1) as u32
        }
    };
    CoordPair { x: axis(x), y: axis(y) }
}

pub fn compute_cell_coord(x: f32, y: f32) -> CellCoord {
    compute(x, y, CENTER_GRID_CELL_OFFSET, SIZE_OF_GRID_CELL, CENTER_GRID_CELL_ID)
}

pub fn compute_grid_coord(x: f32, y: f32) -> GridCoord {
    compute(x, y, CENTER_GRID_OFFSET, SIZE_OF_GRIDS, CENTER_GRID_ID)
}

pub fn is_valid_map_coord(x: f32, y: f32) -> bool {
    x.is_finite() && y.is_finite() && x.abs() <= MAP_HALFSIZE - 0.5 && y.abs() <= MAP_HALFSIZE - 0.5
}
