//! Spatial hash grid for neighbor and area queries
//!
//! Divides the world into square cells and buckets enemies by cell.
//! Rebuilt once per tick from the pre-tick positions, so every AI decision
//! in a tick reads the same snapshot.

use hashbrown::HashMap;

use crate::game::state::{EnemyKind, EntityId};
use crate::util::vec2::Vec2;

/// Default cell size (world units). Roughly 2x the largest separation radius.
pub const ENEMY_GRID_CELL_SIZE: f32 = 96.0;

/// Initial capacity for grid cells (number of expected non-empty cells)
const GRID_INITIAL_CAPACITY: usize = 256;

/// Initial capacity for entity vectors within cells
const CELL_INITIAL_CAPACITY: usize = 8;

/// Grid cell key - (x, y) cell coordinates
pub type CellKey = (i32, i32);

/// Entity data stored in the grid
#[derive(Debug, Clone, Copy)]
pub struct SpatialEntry {
    pub id: EntityId,
    pub kind: EnemyKind,
    pub position: Vec2,
    pub radius: f32,
}

pub struct SpatialGrid {
    cell_size: f32,
    /// Inverse cell size for fast position-to-cell conversion
    inv_cell_size: f32,
    cells: HashMap<CellKey, Vec<SpatialEntry>>,
    len: usize,
}

impl SpatialGrid {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size,
            inv_cell_size: 1.0 / cell_size,
            cells: HashMap::with_capacity(GRID_INITIAL_CAPACITY),
            len: 0,
        }
    }

    #[inline]
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Clear all entries but keep cell allocations for the next rebuild
    pub fn clear(&mut self) {
        for cell in self.cells.values_mut() {
            cell.clear();
        }
        self.len = 0;
    }

    #[inline]
    fn position_to_cell(&self, position: Vec2) -> CellKey {
        (
            (position.x * self.inv_cell_size).floor() as i32,
            (position.y * self.inv_cell_size).floor() as i32,
        )
    }

    pub fn insert(&mut self, entry: SpatialEntry) {
        let key = self.position_to_cell(entry.position);
        self.cells
            .entry(key)
            .or_insert_with(|| Vec::with_capacity(CELL_INITIAL_CAPACITY))
            .push(entry);
        self.len += 1;
    }

    /// Visit every entry in cells overlapping the query circle.
    /// The search expands by `ceil(radius / cell_size)` cells around the center cell.
    pub fn for_each_in_radius<F>(&self, position: Vec2, radius: f32, mut visit: F)
    where
        F: FnMut(&SpatialEntry),
    {
        let reach = (radius.max(0.0) * self.inv_cell_size).ceil() as i32;
        let (cx, cy) = self.position_to_cell(position);
        for ix in (cx - reach)..=(cx + reach) {
            for iy in (cy - reach)..=(cy + reach) {
                if let Some(cell) = self.cells.get(&(ix, iy)) {
                    cell.iter().for_each(&mut visit);
                }
            }
        }
    }

    /// Entries whose centers lie within `radius` of `position`
    pub fn query_radius(&self, position: Vec2, radius: f32) -> Vec<SpatialEntry> {
        let radius_sq = radius * radius;
        let mut out = Vec::new();
        self.for_each_in_radius(position, radius, |e| {
            if e.position.distance_sq_to(position) <= radius_sq {
                out.push(*e);
            }
        });
        out
    }
}

impl Default for SpatialGrid {
    fn default() -> Self {
        Self::new(ENEMY_GRID_CELL_SIZE)
    }
}
